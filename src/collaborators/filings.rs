//! OpenDART disclosure lookup (`filing-lookup`)

use super::{ensure_object_parameters, optional_str, Collaborator, CorpCodeRepository, RetryPolicy};
use crate::error::OrchestrationError;
use crate::models::{Capability, CollaboratorRequest, CollaboratorResponse};
use crate::Result;
use chrono::Local;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DART_BASE_URL: &str = "https://opendart.fss.or.kr/api";
const PAGE_COUNT: u32 = 10;

pub struct DartFilingLookup {
    client: Client,
    api_key: String,
    base_url: String,
    corp_codes: Arc<CorpCodeRepository>,
    retry: RetryPolicy,
}

impl DartFilingLookup {
    pub fn new(
        api_key: impl Into<String>,
        corp_codes: Arc<CorpCodeRepository>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DART_BASE_URL.to_string(),
            corp_codes,
            retry,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Disclosures filed since January 1st of the current year.
    async fn fetch_list(&self, corp_code: &str) -> Result<Value> {
        let today = Local::now().date_naive();
        let url = format!("{}/list.json", self.base_url);
        let query = [
            ("crtfc_key", self.api_key.clone()),
            ("corp_code", corp_code.to_string()),
            ("bgn_de", today.format("%Y0101").to_string()),
            ("end_de", today.format("%Y%m%d").to_string()),
            ("page_count", PAGE_COUNT.to_string()),
        ];

        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|e| OrchestrationError::CollaboratorError(format!("DART request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrchestrationError::CollaboratorError(format!(
                "DART returned HTTP {}",
                status
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}

/// `status == "000"` is the only success code OpenDART uses.
fn interpret_dart_body(corp_name: &str, corp_code: &str, body: &Value) -> CollaboratorResponse {
    match body.get("status").and_then(|s| s.as_str()) {
        Some("000") => CollaboratorResponse::success(json!({
            "corp_name": corp_name,
            "corp_code": corp_code,
            "filings": body.get("list").cloned().unwrap_or_else(|| json!([])),
        })),
        status => CollaboratorResponse::error(format!(
            "DART error {}: {}",
            status.unwrap_or("unknown"),
            body.get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("no message")
        )),
    }
}

#[async_trait::async_trait]
impl Collaborator for DartFilingLookup {
    fn capability(&self) -> Capability {
        Capability::FilingLookup
    }

    fn description(&self) -> &'static str {
        "List this year's corporate disclosures from OpenDART"
    }

    async fn execute(&self, request: &CollaboratorRequest) -> Result<CollaboratorResponse> {
        ensure_object_parameters(request)?;
        if request.request_type != "filings" {
            return Err(OrchestrationError::InvalidCollaboratorInput(format!(
                "filing-lookup does not handle '{}' requests",
                request.request_type
            )));
        }

        let Some(target) = optional_str(&request.parameters, "symbol") else {
            return Ok(CollaboratorResponse::error("no target company given"));
        };

        let Some(corp) = self.corp_codes.resolve(target).await? else {
            return Ok(CollaboratorResponse::error(format!(
                "no corp_code found for '{}'",
                target
            )));
        };

        debug!(target = %target, corp_code = %corp.corp_code, "Fetching DART filings");
        let body = self
            .retry
            .run("dart list.json", || self.fetch_list(&corp.corp_code))
            .await?;

        Ok(interpret_dart_body(&corp.corp_name, &corp.corp_code, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::corp_codes::tests::sample_entries;
    use crate::models::ResponseStatus;

    fn lookup() -> DartFilingLookup {
        let repo = Arc::new(CorpCodeRepository::from_entries(sample_entries()));
        DartFilingLookup::new("test-key", repo, RetryPolicy::no_retry())
            .unwrap()
            .with_base_url("http://127.0.0.1:9")
    }

    fn request(symbol: &str) -> CollaboratorRequest {
        CollaboratorRequest {
            request_type: "filings".into(),
            parameters: json!({"symbol": symbol}),
        }
    }

    #[test]
    fn test_dart_status_codes() {
        let ok = interpret_dart_body(
            "삼성전자",
            "00126380",
            &json!({"status": "000", "list": [{"report_nm": "분기보고서"}]}),
        );
        assert_eq!(ok.status, ResponseStatus::Success);
        assert_eq!(ok.data["filings"][0]["report_nm"], json!("분기보고서"));

        let empty = interpret_dart_body(
            "삼성전자",
            "00126380",
            &json!({"status": "013", "message": "조회된 데이타가 없습니다."}),
        );
        assert_eq!(empty.status, ResponseStatus::Error);
        assert!(empty.message.unwrap().contains("013"));
    }

    #[tokio::test]
    async fn test_unknown_company_is_error_status() {
        let response = lookup().execute(&request("네이버")).await.unwrap();
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.unwrap().contains("네이버"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let err = lookup().execute(&request("삼성전자")).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::CollaboratorError(_)));
    }
}
