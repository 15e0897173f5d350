//! Price-lookup collaborators
//!
//! Three request types are understood:
//! - `quote`: one instrument (`symbol`, optional `date` / `price_type`)
//! - `snapshot`: every instrument of a market on a date (bulk mode)
//! - `history`: ordered closes for one instrument, oldest first

use super::{ensure_object_parameters, optional_str, require_str, Collaborator, RetryPolicy};
use crate::error::OrchestrationError;
use crate::models::{
    Capability, CollaboratorRequest, CollaboratorResponse, Market, MarketRecord, PriceType,
    ResponseStatus,
};
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Owned market snapshot plus per-symbol close series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketDataset {
    #[serde(default)]
    pub records: Vec<MarketRecord>,
    /// symbol (or company name) -> closes, oldest first
    #[serde(default)]
    pub histories: HashMap<String, Vec<f64>>,
}

pub struct InMemoryMarketData {
    dataset: MarketDataset,
}

impl InMemoryMarketData {
    pub fn new(dataset: MarketDataset) -> Self {
        Self { dataset }
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let dataset: MarketDataset = serde_json::from_str(&raw)?;
        debug!(
            records = dataset.records.len(),
            histories = dataset.histories.len(),
            "Loaded market fixture"
        );
        Ok(Self::new(dataset))
    }

    fn matches_target(record: &MarketRecord, target: &str) -> bool {
        record.symbol == target || record.name.as_deref() == Some(target)
    }

    fn date_matches(record: &MarketRecord, date: Option<&str>) -> bool {
        match (date, record.date.as_deref()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }

    fn quote(&self, params: &Value) -> Result<CollaboratorResponse> {
        let symbol = require_str(params, "symbol")?;
        let date = optional_str(params, "date");
        let price_type = params
            .get("price_type")
            .cloned()
            .map(serde_json::from_value::<PriceType>)
            .transpose()?
            .unwrap_or(PriceType::Current);

        let Some(record) = self
            .dataset
            .records
            .iter()
            .find(|r| Self::matches_target(r, symbol) && Self::date_matches(r, date))
        else {
            return Ok(CollaboratorResponse::error(format!(
                "no quote for '{}'{}",
                symbol,
                date.map(|d| format!(" on {}", d)).unwrap_or_default()
            )));
        };

        let mut data = serde_json::to_value(record)?;
        data["price_type"] = json!(price_type);
        data["price"] = json!(record.price(price_type));
        Ok(CollaboratorResponse::success(data))
    }

    fn snapshot(&self, params: &Value) -> Result<CollaboratorResponse> {
        let market = params
            .get("market")
            .cloned()
            .map(serde_json::from_value::<Market>)
            .transpose()?
            .unwrap_or(Market::All);
        let date = optional_str(params, "date");

        let records: Vec<&MarketRecord> = self
            .dataset
            .records
            .iter()
            .filter(|r| market.includes(r.market) && Self::date_matches(r, date))
            .collect();

        Ok(CollaboratorResponse::success(json!({
            "market": market,
            "date": date,
            "records": records,
        })))
    }

    fn history(&self, params: &Value) -> Result<CollaboratorResponse> {
        let symbol = require_str(params, "symbol")?;

        let closes = self.dataset.histories.get(symbol).or_else(|| {
            self.dataset
                .records
                .iter()
                .find(|r| Self::matches_target(r, symbol))
                .and_then(|r| {
                    self.dataset
                        .histories
                        .get(&r.symbol)
                        .or_else(|| r.name.as_ref().and_then(|n| self.dataset.histories.get(n)))
                })
        });

        match closes {
            Some(closes) => Ok(CollaboratorResponse::success(json!({
                "symbol": symbol,
                "closes": closes,
            }))),
            None => Ok(CollaboratorResponse::error(format!(
                "no price history for '{}'",
                symbol
            ))),
        }
    }
}

#[async_trait::async_trait]
impl Collaborator for InMemoryMarketData {
    fn capability(&self) -> Capability {
        Capability::PriceLookup
    }

    fn description(&self) -> &'static str {
        "Serve quotes, market snapshots and close histories from a local dataset"
    }

    async fn execute(&self, request: &CollaboratorRequest) -> Result<CollaboratorResponse> {
        ensure_object_parameters(request)?;
        match request.request_type.as_str() {
            "quote" => self.quote(&request.parameters),
            "snapshot" => self.snapshot(&request.parameters),
            "history" => self.history(&request.parameters),
            other => Err(OrchestrationError::InvalidCollaboratorInput(format!(
                "price-lookup does not handle '{}' requests",
                other
            ))),
        }
    }
}

/// Market data served by the financial API backend.
pub struct HttpMarketData {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpMarketData {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::CollaboratorError(format!(
                    "Market data request failed for {}: {}",
                    path, e
                ))
            })?;

        let status = response.status();
        let body = response.json::<Value>().await.map_err(|e| {
            OrchestrationError::CollaboratorError(format!("Invalid JSON response: {}", e))
        })?;

        if !status.is_success() {
            return Err(OrchestrationError::CollaboratorError(format!(
                "Market data API returned {} for {}: {}",
                status, path, body
            )));
        }

        Ok(body)
    }
}

#[async_trait::async_trait]
impl Collaborator for HttpMarketData {
    fn capability(&self) -> Capability {
        Capability::PriceLookup
    }

    fn description(&self) -> &'static str {
        "Fetch quotes, snapshots and histories from /api/v1/market/{type}"
    }

    async fn execute(&self, request: &CollaboratorRequest) -> Result<CollaboratorResponse> {
        ensure_object_parameters(request)?;
        let path = format!("/api/v1/market/{}", request.request_type);

        let body = self
            .retry
            .run(&path, || self.post_json(&path, &request.parameters))
            .await?;

        // Backends may answer with the full envelope or with bare data
        let is_envelope = matches!(
            body.get("status").and_then(|s| s.as_str()),
            Some("success") | Some("error")
        );
        if is_envelope {
            let response: CollaboratorResponse = serde_json::from_value(body)?;
            if response.status == ResponseStatus::Error && response.message.is_none() {
                return Ok(CollaboratorResponse::error(format!(
                    "{} request failed without a message",
                    path
                )));
            }
            return Ok(response);
        }

        Ok(CollaboratorResponse::success(body))
    }
}

/// Registered when no market source is configured.
pub struct UnconfiguredMarketData;

#[async_trait::async_trait]
impl Collaborator for UnconfiguredMarketData {
    fn capability(&self) -> Capability {
        Capability::PriceLookup
    }

    fn description(&self) -> &'static str {
        "Placeholder price lookup (no data source configured)"
    }

    async fn execute(&self, _request: &CollaboratorRequest) -> Result<CollaboratorResponse> {
        Err(OrchestrationError::CollaboratorError(
            "market data source is not configured (set FINANCIAL_API_BASE_URL or MARKET_FIXTURE_PATH)"
                .to_string(),
        ))
    }
}
