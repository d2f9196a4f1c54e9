//! Duckling-backed slot enrichers
//!
//! Sends a raw slot value to a Duckling server's `/parse` endpoint and keeps
//! the value of the first entity of the wanted dimension. Enrichment never
//! rejects a slot: when Duckling is unreachable or finds nothing, the raw
//! text is kept.

use crate::error::CapabilityError;
use crate::registry::{CapabilityRegistry, Enricher};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_LOCALE: &str = "en_GB";

/// Enricher name and the Duckling dimension it extracts
pub const STANDARD_DIMENSIONS: &[(&str, &str)] = &[
    ("enrich_amount_of_money", "amount-of-money"),
    ("enrich_credit_card_number", "credit-card-number"),
    ("enrich_distance", "distance"),
    ("enrich_duration", "duration"),
    ("enrich_email", "email"),
    ("enrich_numeral", "number"),
    ("enrich_ordinal", "ordinal"),
    ("enrich_phone_number", "phone-number"),
    ("enrich_quantity", "quantity"),
    ("enrich_temperature", "temperature"),
    ("enrich_time", "time"),
    ("enrich_url", "url"),
    ("enrich_volume", "volume"),
];

/// Connection settings shared by every dimension's enricher
#[derive(Debug, Clone)]
pub struct DucklingClient {
    client: Client,
    base_url: String,
    locale: String,
}

impl DucklingClient {
    pub fn new(base_url: impl Into<String>, locale: impl Into<String>) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CapabilityError::new("duckling", format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            locale: locale.into(),
        })
    }

    /// `DUCKLING_URL` and `DUCKLING_LOCALE`, with local defaults
    pub fn from_env() -> Result<Self, CapabilityError> {
        Self::new(
            std::env::var("DUCKLING_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            std::env::var("DUCKLING_LOCALE").unwrap_or_else(|_| DEFAULT_LOCALE.to_string()),
        )
    }

    pub fn enricher(&self, dimension: impl Into<String>) -> DucklingEnricher {
        DucklingEnricher {
            client: self.clone(),
            dimension: dimension.into(),
        }
    }

    /// Register one enricher per standard dimension
    pub fn register_standard(&self, registry: &mut CapabilityRegistry) {
        for (name, dimension) in STANDARD_DIMENSIONS {
            registry.insert_enricher(*name, Arc::new(self.enricher(*dimension)));
        }
    }

    async fn parse(&self, text: &str) -> Result<Vec<Value>, reqwest::Error> {
        self.client
            .post(format!("{}/parse", self.base_url))
            .form(&[("text", text), ("locale", self.locale.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// Extracts one Duckling dimension from a slot value
#[derive(Debug, Clone)]
pub struct DucklingEnricher {
    client: DucklingClient,
    dimension: String,
}

impl DucklingEnricher {
    pub fn dimension(&self) -> &str {
        &self.dimension
    }
}

#[async_trait]
impl Enricher for DucklingEnricher {
    async fn enrich(&self, value: &Value) -> Result<Value, CapabilityError> {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        match self.client.parse(&text).await {
            Ok(entities) => Ok(first_value_for_dim(&entities, &self.dimension).unwrap_or(Value::String(text))),
            Err(e) => {
                tracing::error!(dimension = %self.dimension, error = %e, "Duckling parse failed, keeping raw value");
                Ok(Value::String(text))
            }
        }
    }
}

/// `value` of the first entity whose `dim` is `dimension`
pub fn first_value_for_dim(entities: &[Value], dimension: &str) -> Option<Value> {
    entities
        .iter()
        .find(|entity| entity.get("dim").and_then(Value::as_str) == Some(dimension))
        .and_then(|entity| entity.get("value").cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn entities() -> Vec<Value> {
        vec![
            json!({ "dim": "number", "body": "50", "value": { "type": "value", "value": 50 } }),
            json!({ "dim": "amount-of-money", "body": "50 pounds", "value": { "type": "value", "value": 50, "unit": "GBP" } }),
            json!({ "dim": "amount-of-money", "body": "3 euros", "value": { "type": "value", "value": 3, "unit": "EUR" } }),
        ]
    }

    #[test]
    fn test_first_value_for_dim() {
        let money = first_value_for_dim(&entities(), "amount-of-money").unwrap();
        assert_eq!(money["unit"], "GBP");
        assert_eq!(first_value_for_dim(&entities(), "number").unwrap()["value"], 50);
        assert!(first_value_for_dim(&entities(), "time").is_none());
        assert!(first_value_for_dim(&[], "time").is_none());
    }

    /// Serve one canned HTTP response and return the request it received
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });
        (url, handle)
    }

    /// Read headers plus a `content-length` body
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let expected = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if body.len() >= expected {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[tokio::test]
    async fn test_enrich_against_server() {
        let (url, handle) = serve_once(
            r#"[{"dim":"amount-of-money","body":"50 quid","value":{"type":"value","value":50,"unit":"GBP"}}]"#,
        )
        .await;
        let enricher = DucklingClient::new(url, "en_GB").unwrap().enricher("amount-of-money");

        let enriched = enricher.enrich(&json!("50 quid")).await.unwrap();
        assert_eq!(enriched, json!({ "type": "value", "value": 50, "unit": "GBP" }));

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /parse"));
    }

    #[tokio::test]
    async fn test_no_match_keeps_raw_text() {
        let (url, _handle) = serve_once("[]").await;
        let enricher = DucklingClient::new(url, "en_GB").unwrap().enricher("time");
        assert_eq!(enricher.enrich(&json!("someday")).await.unwrap(), json!("someday"));
    }

    #[tokio::test]
    async fn test_unreachable_server_keeps_raw_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let enricher = DucklingClient::new(url, "en_GB").unwrap().enricher("time");
        assert_eq!(enricher.enrich(&json!("tomorrow")).await.unwrap(), json!("tomorrow"));
    }

    #[test]
    fn test_register_standard() {
        let mut registry = CapabilityRegistry::new();
        DucklingClient::new("http://duckling:8000/", "en_US")
            .unwrap()
            .register_standard(&mut registry);
        for (name, _) in STANDARD_DIMENSIONS {
            assert!(registry.has_enricher(name));
        }
    }
}
