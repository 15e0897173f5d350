//! Listed-company lookup (`listing-lookup`)

use super::{ensure_object_parameters, require_str, Collaborator, CorpCodeRepository};
use crate::error::OrchestrationError;
use crate::models::{Capability, CollaboratorRequest, CollaboratorResponse};
use crate::Result;
use serde_json::json;
use std::sync::Arc;

pub struct ListingLookup {
    corp_codes: Arc<CorpCodeRepository>,
}

impl ListingLookup {
    pub fn new(corp_codes: Arc<CorpCodeRepository>) -> Self {
        Self { corp_codes }
    }
}

#[async_trait::async_trait]
impl Collaborator for ListingLookup {
    fn capability(&self) -> Capability {
        Capability::ListingLookup
    }

    fn description(&self) -> &'static str {
        "Find listed companies whose name contains the target"
    }

    async fn execute(&self, request: &CollaboratorRequest) -> Result<CollaboratorResponse> {
        ensure_object_parameters(request)?;
        if request.request_type != "listing" {
            return Err(OrchestrationError::InvalidCollaboratorInput(format!(
                "listing-lookup does not handle '{}' requests",
                request.request_type
            )));
        }

        let target = require_str(&request.parameters, "symbol")?;
        let companies: Vec<_> = self
            .corp_codes
            .search(target)
            .await?
            .into_iter()
            .filter(|e| e.is_listed())
            .map(|e| json!({"corp_name": e.corp_name, "stock_code": e.stock_code}))
            .collect();

        Ok(CollaboratorResponse::success(json!({
            "target": target,
            "count": companies.len(),
            "companies": companies,
        })))
    }
}
