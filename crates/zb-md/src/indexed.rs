//! GraphQL-backed indexed market source.
//!
//! Posts a `markets` query to the configured endpoint and decodes
//! `data.markets` straight into canonical [`Market`] values. The endpoint is
//! expected to shape reserves the same way the canonical types serialize.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use zb_schemas::Market;

use crate::provider::{IndexedMarketSource, IndexedMarketsRequest, ProviderError};

const MARKETS_QUERY: &str = r#"
query Markets($request: MarketsRequest!) {
  markets(request: $request) {
    address
    totalMarketSize
    totalAvailableLiquidity
    supplyReserves { ...ReserveFields }
    borrowReserves { ...ReserveFields }
    eModeCategories {
      id
      label
      maxLTV { value }
      liquidationThreshold { value }
      liquidationPenalty { value }
    }
    userState {
      netWorth
      healthFactor
      eModeEnabled
      isInIsolationMode
    }
  }
}

fragment Token on Currency { address symbol name decimals }
fragment Amount on TokenAmount { amount { value } usd }

fragment ReserveFields on Reserve {
  underlyingToken { ...Token }
  aToken { ...Token }
  vToken { ...Token }
  size { ...Amount }
  supplyInfo {
    apy { value }
    total { ...Amount }
    supplyCap { ...Amount }
    maxLTV { value }
    liquidationThreshold { value }
    liquidationBonus { value }
  }
  borrowInfo {
    apy { value }
    total { ...Amount }
    borrowCap { ...Amount }
    borrowingState
    utilizationRate { value }
    reserveFactor { value }
    baseVariableBorrowRate { value raw }
    optimalUsageRate { value raw }
    variableRateSlope1 { value raw }
    variableRateSlope2 { value raw }
  }
  isolationModeConfig {
    canBeCollateral
    debtCeiling { ...Amount }
    totalBorrows { ...Amount }
  }
  isFrozen
  isPaused
  acceptsNative
  incentives {
    __typename
    apy { value }
    token { ...Token }
  }
}
"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketsVariables<'a> {
    chain_ids: [u64; 1],
    pool_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<MarketsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct MarketsData {
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Indexed source speaking GraphQL over HTTP.
#[derive(Debug, Clone)]
pub struct GraphqlMarketSource {
    http: reqwest::Client,
    endpoint: String,
}

impl GraphqlMarketSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl IndexedMarketSource for GraphqlMarketSource {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn fetch_markets(&self, req: &IndexedMarketsRequest) -> Result<Vec<Market>, ProviderError> {
        let variables = MarketsVariables {
            chain_ids: [req.chain_id],
            pool_address: &req.pool_address,
            user: req.user.as_deref(),
        };
        let body = json!({
            "query": MARKETS_QUERY,
            "variables": { "request": variables },
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                code: Some(i64::from(status.as_u16())),
                message: text.chars().take(200).collect(),
            });
        }

        let parsed: GraphqlResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))?;

        if !parsed.errors.is_empty() {
            let message = parsed
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::Api {
                code: None,
                message,
            });
        }

        let markets = parsed
            .data
            .ok_or_else(|| ProviderError::Decode("response has neither data nor errors".to_string()))?
            .markets;

        debug!(
            endpoint = %self.endpoint,
            chain_id = req.chain_id,
            markets = markets.len(),
            "indexed markets fetched"
        );
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rust_decimal::Decimal;
    use zb_schemas::BorrowingState;

    fn request() -> IndexedMarketsRequest {
        IndexedMarketsRequest {
            chain_id: 11_155_111,
            pool_address: "0xPool".to_string(),
            user: None,
        }
    }

    const ONE_MARKET: &str = r#"{
      "data": {
        "markets": [{
          "address": "0xPool",
          "totalMarketSize": "1500.5",
          "totalAvailableLiquidity": "900",
          "supplyReserves": [{
            "underlyingToken": { "address": "0xDAI", "symbol": "DAI", "name": "Dai", "decimals": 18 },
            "aToken": { "address": "0xA", "symbol": "aDAI", "name": "Zaibots Dai", "decimals": 18 },
            "vToken": { "address": "0xV", "symbol": "variableDebtDAI", "name": "Variable Debt Dai", "decimals": 18 },
            "size": { "amount": { "value": "1500.5" }, "usd": "1500.5" },
            "supplyInfo": {
              "apy": { "value": "0.02" },
              "supplyCap": { "amount": { "value": "0" }, "usd": "0" },
              "maxLTV": { "value": "0.75" },
              "liquidationThreshold": { "value": "0.8" },
              "liquidationBonus": { "value": "0.05" }
            },
            "borrowInfo": {
              "apy": { "value": "0.04" },
              "total": { "amount": { "value": "600.5" }, "usd": "600.5" },
              "borrowCap": { "amount": { "value": "0" }, "usd": "0" },
              "borrowingState": "ENABLED",
              "utilizationRate": { "value": "0.4" },
              "reserveFactor": { "value": "0.1" },
              "baseVariableBorrowRate": { "value": "0", "raw": "0" },
              "optimalUsageRate": { "value": "0.9", "raw": "0.9" },
              "variableRateSlope1": { "value": "0.04", "raw": "0.04" },
              "variableRateSlope2": { "value": "0.6", "raw": "0.6" }
            },
            "isolationModeConfig": null,
            "isFrozen": false,
            "isPaused": false,
            "acceptsNative": false,
            "incentives": []
          }],
          "borrowReserves": [],
          "eModeCategories": [],
          "userState": null
        }]
      }
    }"#;

    #[tokio::test]
    async fn decodes_markets_from_graphql_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/graphql")
                    .body_contains("\"chainIds\":[11155111]")
                    .body_contains("\"poolAddress\":\"0xPool\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(ONE_MARKET);
            })
            .await;

        let src = GraphqlMarketSource::new(server.url("/graphql"));
        let markets = src.fetch_markets(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(markets.len(), 1);
        let m = &markets[0];
        assert!(m.has_address("0xpool"));
        assert_eq!(m.total_market_size, Decimal::new(15005, 1));
        assert_eq!(m.supply_reserves.len(), 1);
        let r = &m.supply_reserves[0];
        assert_eq!(r.id, "");
        assert_eq!(r.borrowing_state(), Some(BorrowingState::Enabled));
        assert!(r.isolation_mode_config.is_none());
        assert!(m.user_state.is_none());
    }

    #[tokio::test]
    async fn graphql_errors_map_to_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(200)
                    .body(r#"{"data":null,"errors":[{"message":"unknown chain"},{"message":"rate limited"}]}"#);
            })
            .await;

        let src = GraphqlMarketSource::new(server.url("/graphql"));
        let err = src.fetch_markets(&request()).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Api {
                code: None,
                message: "unknown chain; rate limited".to_string()
            }
        );
    }

    #[tokio::test]
    async fn http_status_maps_to_api_error_with_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(503).body("upstream down");
            })
            .await;

        let src = GraphqlMarketSource::new(server.url("/graphql"));
        match src.fetch_markets(&request()).await {
            Err(ProviderError::Api { code, message }) => {
                assert_eq!(code, Some(503));
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(200).body("{not json");
            })
            .await;

        let src = GraphqlMarketSource::new(server.url("/graphql"));
        let err = src.fetch_markets(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let src = GraphqlMarketSource::new("http://127.0.0.1:9/graphql");
        let err = src.fetch_markets(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn empty_market_list_is_ok() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/graphql");
                then.status(200).body(r#"{"data":{"markets":[]}}"#);
            })
            .await;

        let src = GraphqlMarketSource::new(server.url("/graphql"));
        assert!(src.fetch_markets(&request()).await.unwrap().is_empty());
    }
}
