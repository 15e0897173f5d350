//! Dispatcher
//!
//! Routes a classified intent to its capabilities and collects one
//! `CollaboratorResult` per invocation.
//!
//! - Independent capabilities run concurrently and are all awaited.
//! - Dependent stages (technical signals) run strictly in order; a failed
//!   stage ends the pipeline.
//! - Errors, error-status responses, timeouts and panics all become
//!   error-status results. Nothing is retried here.
//! - No task is spawned: dropping the dispatch future cancels every call.

use crate::collaborators::CollaboratorRegistry;
use crate::error::OrchestrationError;
use crate::models::{
    Capability, CollaboratorRequest, CollaboratorResult, QueryType, ResponseStatus,
    StructuredIntent,
};
use futures::future::join_all;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchPlan {
    /// Nothing to invoke; the caller answers with usage hints
    Unsupported,
    /// Independent capabilities, invoked concurrently
    Parallel(Vec<Capability>),
    /// Each stage receives the previous stage's payload as `upstream`
    Pipeline(Vec<Capability>),
}

/// Static `query_type -> plan` mapping
#[derive(Debug, Clone)]
pub struct DispatchTable {
    routes: HashMap<QueryType, DispatchPlan>,
}

static UNSUPPORTED: DispatchPlan = DispatchPlan::Unsupported;

impl DispatchTable {
    pub fn new() -> Self {
        let bulk = DispatchPlan::Parallel(vec![Capability::PriceLookup]);
        let routes = HashMap::from([
            (
                QueryType::StockPriceInquiry,
                DispatchPlan::Parallel(vec![Capability::PriceLookup]),
            ),
            (QueryType::RankingInquiry, bulk.clone()),
            (QueryType::ConditionalSearch, bulk.clone()),
            (QueryType::MarketStatistics, bulk),
            (
                QueryType::TechnicalSignal,
                DispatchPlan::Pipeline(vec![Capability::PriceLookup, Capability::SignalEvaluation]),
            ),
            (QueryType::Unknown, DispatchPlan::Unsupported),
        ]);
        Self { routes }
    }

    pub fn route(&self, query_type: QueryType) -> &DispatchPlan {
        self.routes.get(&query_type).unwrap_or(&UNSUPPORTED)
    }

    pub fn with_route(mut self, query_type: QueryType, plan: DispatchPlan) -> Self {
        self.routes.insert(query_type, plan);
        self
    }

    /// Add capabilities that run next to the existing parallel set.
    /// Duplicates are ignored; pipelines are left untouched.
    pub fn with_parallel(mut self, query_type: QueryType, extra: &[Capability]) -> Self {
        let entry = self
            .routes
            .entry(query_type)
            .or_insert(DispatchPlan::Unsupported);

        if let DispatchPlan::Parallel(caps) = entry {
            for capability in extra {
                if !caps.contains(capability) {
                    caps.push(*capability);
                }
            }
        } else if *entry == DispatchPlan::Unsupported && !extra.is_empty() {
            *entry = DispatchPlan::Parallel(extra.to_vec());
        }
        self
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Unsupported,
    /// At least one capability succeeded
    Completed(Vec<CollaboratorResult>),
    /// Every invoked capability failed; `message` is the first failure's
    TotalFailure {
        results: Vec<CollaboratorResult>,
        message: String,
    },
}

impl DispatchOutcome {
    fn from_results(results: Vec<CollaboratorResult>) -> Self {
        if results.iter().any(CollaboratorResult::is_ok) {
            return DispatchOutcome::Completed(results);
        }
        let message = results
            .iter()
            .find_map(|r| r.error.clone())
            .unwrap_or_else(|| "no capability produced a result".to_string());
        DispatchOutcome::TotalFailure { results, message }
    }

    pub fn results(&self) -> &[CollaboratorResult] {
        match self {
            DispatchOutcome::Unsupported => &[],
            DispatchOutcome::Completed(results) => results,
            DispatchOutcome::TotalFailure { results, .. } => results,
        }
    }

    pub fn into_results(self) -> crate::Result<Vec<CollaboratorResult>> {
        match self {
            DispatchOutcome::Unsupported => Ok(Vec::new()),
            DispatchOutcome::Completed(results) => Ok(results),
            DispatchOutcome::TotalFailure { message, .. } => {
                Err(OrchestrationError::TotalDispatchFailure(message))
            }
        }
    }
}

pub struct Dispatcher {
    registry: CollaboratorRegistry,
    table: DispatchTable,
    capability_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: CollaboratorRegistry,
        table: DispatchTable,
        capability_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            table,
            capability_timeout,
        }
    }

    pub fn registry(&self) -> &CollaboratorRegistry {
        &self.registry
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub async fn dispatch(&self, intent: &StructuredIntent) -> DispatchOutcome {
        let plan = self.table.route(intent.query_type);
        debug!(query_type = %intent.query_type, plan = ?plan, "Dispatching intent");

        let results = match plan {
            DispatchPlan::Unsupported => return DispatchOutcome::Unsupported,
            DispatchPlan::Parallel(caps) if caps.is_empty() => return DispatchOutcome::Unsupported,
            DispatchPlan::Pipeline(stages) if stages.is_empty() => {
                return DispatchOutcome::Unsupported
            }
            DispatchPlan::Parallel(caps) => {
                join_all(
                    caps.iter()
                        .map(|&c| self.invoke(c, build_request(c, intent, None))),
                )
                .await
            }
            DispatchPlan::Pipeline(stages) => self.run_pipeline(stages, intent).await,
        };

        let outcome = DispatchOutcome::from_results(results);
        info!(
            query_type = %intent.query_type,
            invoked = outcome.results().len(),
            succeeded = outcome.results().iter().filter(|r| r.is_ok()).count(),
            "Dispatch finished"
        );
        outcome
    }

    async fn run_pipeline(
        &self,
        stages: &[Capability],
        intent: &StructuredIntent,
    ) -> Vec<CollaboratorResult> {
        let mut results: Vec<CollaboratorResult> = Vec::with_capacity(stages.len());

        for &capability in stages {
            let upstream = results.last().map(|r| &r.payload);
            let result = self
                .invoke(capability, build_request(capability, intent, upstream))
                .await;
            let failed = !result.is_ok();
            results.push(result);

            if failed {
                warn!(capability = %capability, "Pipeline stage failed; skipping remaining stages");
                break;
            }
        }

        results
    }

    /// Invoke one capability under the per-call timeout.
    async fn invoke(&self, capability: Capability, request: CollaboratorRequest) -> CollaboratorResult {
        let start = Instant::now();

        let Some(collaborator) = self.registry.get(capability) else {
            warn!(capability = %capability, "Capability not registered");
            return CollaboratorResult::failed(
                capability,
                OrchestrationError::CapabilityNotRegistered(capability.to_string()).to_string(),
                0,
            );
        };

        let call = AssertUnwindSafe(collaborator.execute(&request)).catch_unwind();
        let outcome = tokio::time::timeout(self.capability_timeout, call).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Err(_) => CollaboratorResult::failed(
                capability,
                OrchestrationError::CapabilityTimeout {
                    capability: capability.to_string(),
                    timeout_ms: self.capability_timeout.as_millis() as u64,
                }
                .to_string(),
                elapsed_ms,
            ),
            Ok(Err(_panic)) => CollaboratorResult::failed(
                capability,
                format!("{} panicked during execution", capability),
                elapsed_ms,
            ),
            Ok(Ok(Err(e))) => CollaboratorResult::failed(capability, e.to_string(), elapsed_ms),
            Ok(Ok(Ok(response))) => match response.status {
                ResponseStatus::Success => {
                    CollaboratorResult::ok(capability, response.data, elapsed_ms)
                }
                ResponseStatus::Error => CollaboratorResult::failed(
                    capability,
                    response
                        .message
                        .unwrap_or_else(|| format!("{} returned an error", capability)),
                    elapsed_ms,
                ),
            },
        };

        match &result.error {
            Some(error) => warn!(capability = %capability, elapsed_ms, error = %error, "Capability failed"),
            None => debug!(capability = %capability, elapsed_ms, "Capability succeeded"),
        }
        result
    }
}

/// Request type for a capability given the intent category.
fn request_type(capability: Capability, query_type: QueryType) -> &'static str {
    match capability {
        Capability::PriceLookup => match query_type {
            QueryType::StockPriceInquiry => "quote",
            QueryType::TechnicalSignal => "history",
            _ => "snapshot",
        },
        Capability::SignalEvaluation => "moving_average",
        Capability::FilingLookup => "filings",
        Capability::ListingLookup => "listing",
    }
}

fn build_request(
    capability: Capability,
    intent: &StructuredIntent,
    upstream: Option<&Value>,
) -> CollaboratorRequest {
    let mut parameters = match serde_json::to_value(&intent.parameters) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if let Some(sub_type) = &intent.sub_type {
        parameters.insert("sub_type".to_string(), Value::String(sub_type.clone()));
    }
    if let Some(upstream) = upstream {
        parameters.insert("upstream".to_string(), upstream.clone());
    }

    CollaboratorRequest {
        request_type: request_type(capability, intent.query_type).to_string(),
        parameters: Value::Object(parameters),
    }
}
