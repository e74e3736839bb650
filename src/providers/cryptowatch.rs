//! Cryptowatch market summaries provider implementation

use crate::{
    constants::{CRYPTOWATCH_SUMMARIES_ENDPOINT, USER_AGENT},
    error::ProviderError,
    provider::MarketDataSource,
    types::{MarketKey, MarketSummary, Snapshot},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Cryptowatch API response for `/markets/summaries`
#[derive(Debug, Deserialize)]
struct SummariesResponse {
    #[serde(default)]
    result: HashMap<String, CryptowatchSummary>,
}

#[derive(Debug, Default, Deserialize)]
struct CryptowatchSummary {
    #[serde(default)]
    price: CryptowatchPrice,
}

#[derive(Debug, Default, Deserialize)]
struct CryptowatchPrice {
    #[serde(default, deserialize_with = "decimal_text")]
    last: String,
    #[serde(default, deserialize_with = "decimal_text")]
    high: String,
    #[serde(default, deserialize_with = "decimal_text")]
    low: String,
    #[serde(default)]
    change: CryptowatchChange,
}

#[derive(Debug, Default, Deserialize)]
struct CryptowatchChange {
    #[serde(default, deserialize_with = "decimal_text")]
    percentage: String,
    #[serde(default, deserialize_with = "decimal_text")]
    absolute: String,
}

/// Keeps a JSON number or string as its decimal text; anything else is empty
fn decimal_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text,
        _ => String::new(),
    })
}

/// Cryptowatch REST provider
pub struct CryptowatchProvider {
    client: Client,
    base_url: String,
}

impl CryptowatchProvider {
    /// Creates a new Cryptowatch provider
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds the summaries URL
    fn build_url(&self) -> String {
        format!("{}{}", self.base_url, CRYPTOWATCH_SUMMARIES_ENDPOINT)
    }

    /// Converts the Cryptowatch response into a snapshot keyed by normalized market id
    ///
    /// Ids that only differ by case collapse onto one key. The id already in
    /// normalized form wins, otherwise the lexicographically smallest one.
    fn parse_response(response: SummariesResponse) -> Snapshot {
        let mut chosen: HashMap<String, (String, MarketSummary)> = HashMap::new();

        for (market_id, summary) in response.result {
            let Some(key) = MarketKey::parse(&market_id) else {
                continue;
            };
            let normalized = key.market_id();
            let price = summary.price;
            let summary = MarketSummary {
                last: price.last,
                high_24h: price.high,
                low_24h: price.low,
                change_absolute: price.change.absolute,
                change_percent: price.change.percentage,
            };

            match chosen.get(&normalized) {
                Some((existing, _)) => {
                    let rank = |id: &String| (id != &normalized, id.clone());
                    let keep_existing = rank(existing) <= rank(&market_id);
                    let (kept, dropped) = if keep_existing {
                        (existing, &market_id)
                    } else {
                        (&market_id, existing)
                    };
                    tracing::debug!(
                        market = %normalized,
                        kept = %kept,
                        dropped = %dropped,
                        "Market id reported under several spellings"
                    );
                    if !keep_existing {
                        chosen.insert(normalized, (market_id, summary));
                    }
                }
                None => {
                    chosen.insert(normalized, (market_id, summary));
                }
            }
        }

        chosen
            .into_iter()
            .map(|(normalized, (_, summary))| (normalized, summary))
            .collect()
    }

    fn decode(body: &str) -> Result<Snapshot, ProviderError> {
        let response: SummariesResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse Cryptowatch response: {}",
                e
            ))
        })?;
        Ok(Self::parse_response(response))
    }
}

#[async_trait]
impl MarketDataSource for CryptowatchProvider {
    async fn fetch_summaries(&self) -> Result<Snapshot, ProviderError> {
        let url = self.build_url();
        tracing::debug!(url = %url, "Fetching market summaries from Cryptowatch");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body = response.text().await.map_err(ProviderError::from_request)?;
        let snapshot = Self::decode(&body)?;

        tracing::debug!(
            markets = snapshot.len(),
            "Successfully fetched market summaries from Cryptowatch"
        );

        Ok(snapshot)
    }

    fn source_name(&self) -> &'static str {
        "cryptowatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Answers a single HTTP request with `status` and `body` after `delay`,
    /// reporting the request line it received
    async fn serve_once(
        status: &'static str,
        body: &'static str,
        delay: Duration,
    ) -> (SocketAddr, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = vec![0u8; 4096];
            let read = stream.read(&mut buffer).await.unwrap();
            let request = String::from_utf8_lossy(&buffer[..read]);
            let _ = request_tx.send(request.lines().next().unwrap_or_default().to_string());

            tokio::time::sleep(delay).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        });

        (addr, request_rx)
    }

    fn local_provider(addr: SocketAddr, timeout: Duration) -> CryptowatchProvider {
        CryptowatchProvider {
            client: Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .no_proxy()
                .build()
                .unwrap(),
            base_url: format!("http://{}", addr),
        }
    }

    const BODY: &str = r#"{
        "result": {
            "kraken:btcusd": {
                "price": {
                    "last": 50000.5,
                    "high": 51000,
                    "low": "49000.25",
                    "change": { "percentage": 0.0123, "absolute": 600.5 }
                },
                "volume": 1234.5,
                "volumeQuote": 61725000
            },
            "Bitstamp:LTCUSD": {
                "price": { "last": 70.1, "high": 72, "low": 69 }
            },
            "not-a-market": { "price": { "last": 1 } }
        },
        "allowance": { "cost": 0.015, "remaining": 9.985 }
    }"#;

    #[test]
    fn test_decode_summaries() {
        let snapshot = CryptowatchProvider::decode(BODY).unwrap();

        assert_eq!(snapshot.len(), 2);
        let kraken = &snapshot["kraken:btcusd"];
        assert_eq!(kraken.last, "50000.5");
        assert_eq!(kraken.high_24h, "51000");
        assert_eq!(kraken.low_24h, "49000.25");
        assert_eq!(kraken.change_percent, "0.0123");
        assert_eq!(kraken.change_absolute, "600.5");
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let snapshot = CryptowatchProvider::decode(BODY).unwrap();
        let bitstamp = &snapshot["bitstamp:ltcusd"];

        assert_eq!(bitstamp.last, "70.1");
        assert_eq!(bitstamp.change_absolute, "");
        assert_eq!(bitstamp.change_percent, "");
        assert!(bitstamp.parse().change_absolute.value().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = CryptowatchProvider::decode("<html>down</html>").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let provider =
            CryptowatchProvider::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.build_url(), "http://localhost:8080/markets/summaries");
    }

    #[test]
    fn test_case_variants_prefer_normalized_id() {
        let body = r#"{
            "result": {
                "Kraken:BTCUSD": { "price": { "last": 1 } },
                "kraken:btcusd": { "price": { "last": 2 } },
                "KRAKEN:btcusd": { "price": { "last": 3 } }
            }
        }"#;

        let snapshot = CryptowatchProvider::decode(body).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["kraken:btcusd"].last, "2");
    }

    #[test]
    fn test_case_variants_without_normalized_id_are_stable() {
        let body = r#"{
            "result": {
                "kraken:BTCUSD": { "price": { "last": 1 } },
                "Kraken:btcusd": { "price": { "last": 2 } }
            }
        }"#;

        let snapshot = CryptowatchProvider::decode(body).unwrap();
        assert_eq!(snapshot.len(), 1);
        // "Kraken:btcusd" sorts before "kraken:BTCUSD"
        assert_eq!(snapshot["kraken:btcusd"].last, "2");
    }

    #[tokio::test]
    async fn test_fetch_summaries_ok() {
        let (addr, request) = serve_once("200 OK", BODY, Duration::ZERO).await;
        let provider = local_provider(addr, Duration::from_secs(5));

        let snapshot = provider.fetch_summaries().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["kraken:btcusd"].last, "50000.5");
        assert_eq!(
            request.await.unwrap(),
            "GET /markets/summaries HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_fetch_summaries_rate_limited() {
        let (addr, _request) =
            serve_once("429 Too Many Requests", "slow down", Duration::ZERO).await;
        let provider = local_provider(addr, Duration::from_secs(5));

        let err = provider.fetch_summaries().await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimitExceeded), "{:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_summaries_server_error() {
        let (addr, _request) =
            serve_once("500 Internal Server Error", "boom", Duration::ZERO).await;
        let provider = local_provider(addr, Duration::from_secs(5));

        match provider.fetch_summaries().await {
            Err(ProviderError::ApiError(message)) => {
                assert_eq!(message, "HTTP 500 Internal Server Error: boom");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_summaries_invalid_body() {
        let (addr, _request) = serve_once("200 OK", "<html>down</html>", Duration::ZERO).await;
        let provider = local_provider(addr, Duration::from_secs(5));

        let err = provider.fetch_summaries().await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_summaries_timeout() {
        let (addr, _request) = serve_once("200 OK", BODY, Duration::from_secs(5)).await;
        let provider = local_provider(addr, Duration::from_millis(100));

        let err = provider.fetch_summaries().await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout), "{:?}", err);
    }
}
