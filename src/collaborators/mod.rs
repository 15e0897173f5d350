//! Collaborator trait and registry
//!
//! A collaborator is a downstream data source or decision step reached
//! through the `{type, parameters} -> {status, data, message}` contract.
//! The dispatcher only sees this trait.

pub mod corp_codes;
pub mod filings;
pub mod listings;
pub mod market_data;
pub mod retry;
pub mod signal;

use crate::config::Settings;
use crate::error::OrchestrationError;
use crate::models::{Capability, CollaboratorRequest, CollaboratorResponse};
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub use corp_codes::{CorpCodeRepository, CorpEntry};
pub use filings::DartFilingLookup;
pub use listings::ListingLookup;
pub use market_data::{HttpMarketData, InMemoryMarketData, MarketDataset, UnconfiguredMarketData};
pub use retry::RetryPolicy;
pub use signal::SignalEvaluator;

/// One capability implementation
#[async_trait::async_trait]
pub trait Collaborator: Send + Sync {
    fn capability(&self) -> Capability;
    fn description(&self) -> &'static str;
    async fn execute(&self, request: &CollaboratorRequest) -> Result<CollaboratorResponse>;
}

/// Capability -> collaborator lookup
pub struct CollaboratorRegistry {
    collaborators: HashMap<Capability, Arc<dyn Collaborator>>,
}

impl CollaboratorRegistry {
    pub fn new() -> Self {
        Self {
            collaborators: HashMap::new(),
        }
    }

    /// Registering a second collaborator for the same capability replaces the first.
    pub fn register(&mut self, collaborator: Arc<dyn Collaborator>) {
        self.collaborators
            .insert(collaborator.capability(), collaborator);
    }

    pub fn get(&self, capability: Capability) -> Option<Arc<dyn Collaborator>> {
        self.collaborators.get(&capability).cloned()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        let mut list: Vec<Capability> = self.collaborators.keys().copied().collect();
        list.sort_by_key(|c| c.as_str());
        list
    }

    pub fn describe(&self) -> Vec<(Capability, &'static str)> {
        self.capabilities()
            .into_iter()
            .filter_map(|c| self.collaborators.get(&c).map(|x| (c, x.description())))
            .collect()
    }
}

impl Default for CollaboratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Parameter helpers =================
//

pub(crate) fn ensure_object_parameters(request: &CollaboratorRequest) -> Result<()> {
    if request.parameters.is_object() {
        Ok(())
    } else {
        Err(OrchestrationError::InvalidCollaboratorInput(
            "parameters must be a JSON object".to_string(),
        ))
    }
}

pub(crate) fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    optional_str(params, key).ok_or_else(|| {
        OrchestrationError::InvalidCollaboratorInput(format!("Expected '{}' in parameters", key))
    })
}

/// Build the registry used by both binaries.
///
/// Market data comes from the HTTP backend when configured, otherwise from the
/// fixture file. Filing and listing lookups share one corporate-code repository.
pub async fn create_default_registry(settings: &Settings) -> Result<CollaboratorRegistry> {
    let mut registry = CollaboratorRegistry::new();
    let retry = RetryPolicy::fixed(settings.retry_delay, settings.max_retries);

    let market: Arc<dyn Collaborator> = match (
        &settings.financial_api_base_url,
        &settings.market_fixture_path,
    ) {
        (Some(base_url), _) => {
            info!(base_url = %base_url, "Price lookup backed by HTTP market data");
            Arc::new(HttpMarketData::new(base_url.clone(), retry)?)
        }
        (None, Some(path)) => {
            info!(path = %path.display(), "Price lookup backed by fixture file");
            Arc::new(InMemoryMarketData::from_file(path).await?)
        }
        (None, None) => {
            warn!("No market data source configured; price lookups will fail");
            Arc::new(UnconfiguredMarketData)
        }
    };
    registry.register(market);
    registry.register(Arc::new(SignalEvaluator));

    if let Some(path) = &settings.corp_code_path {
        let corp_codes = Arc::new(CorpCodeRepository::from_path(path.clone()));
        registry.register(Arc::new(ListingLookup::new(corp_codes.clone())));

        match &settings.dart_api_key {
            Some(key) => registry.register(Arc::new(DartFilingLookup::new(
                key.clone(),
                corp_codes,
                retry,
            )?)),
            None => warn!("DART_API_KEY is not set; filing lookup disabled"),
        }
    }

    info!(capabilities = ?registry.capabilities(), "Collaborator registry ready");
    Ok(registry)
}
