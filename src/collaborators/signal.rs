//! Moving-average signal evaluation
//!
//! Second stage of a technical-signal query: takes the close series produced
//! by price-lookup (passed in as `upstream`) and computes the simple moving
//! average for the latest and the previous session.

use super::{ensure_object_parameters, Collaborator};
use crate::error::OrchestrationError;
use crate::models::{Capability, CollaboratorRequest, CollaboratorResponse};
use crate::Result;
use serde_json::{json, Value};

pub struct SignalEvaluator;

/// Mean of the last `period` values, or `None` if there are fewer.
pub fn simple_moving_average(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

fn closes_from(upstream: &Value) -> Result<Vec<f64>> {
    let series = upstream
        .get("closes")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            OrchestrationError::InvalidCollaboratorInput(
                "Expected 'upstream.closes' price series".to_string(),
            )
        })?;

    series
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                OrchestrationError::InvalidCollaboratorInput(format!(
                    "non-numeric close in series: {}",
                    v
                ))
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl Collaborator for SignalEvaluator {
    fn capability(&self) -> Capability {
        Capability::SignalEvaluation
    }

    fn description(&self) -> &'static str {
        "Compute moving averages over a close series for breakout/cross signals"
    }

    async fn execute(&self, request: &CollaboratorRequest) -> Result<CollaboratorResponse> {
        ensure_object_parameters(request)?;
        if request.request_type != "moving_average" {
            return Err(OrchestrationError::InvalidCollaboratorInput(format!(
                "signal-evaluation does not handle '{}' requests",
                request.request_type
            )));
        }

        let params = &request.parameters;
        let upstream = params.get("upstream").unwrap_or(&Value::Null);
        let closes = closes_from(upstream)?;

        let ma_period = params
            .get("ma_period")
            .and_then(|v| v.as_u64())
            .filter(|p| *p > 0)
            .ok_or_else(|| {
                OrchestrationError::InvalidCollaboratorInput(
                    "Expected positive 'ma_period'".to_string(),
                )
            })? as usize;

        let Some(moving_average) = simple_moving_average(&closes, ma_period) else {
            return Ok(CollaboratorResponse::error(format!(
                "{} closes available, {} needed for the moving average",
                closes.len(),
                ma_period
            )));
        };

        let latest_close = closes[closes.len() - 1];
        let previous = &closes[..closes.len() - 1];
        let previous_close = previous.last().copied();
        let previous_moving_average = simple_moving_average(previous, ma_period);

        let symbol = upstream
            .get("symbol")
            .or_else(|| params.get("symbol"))
            .cloned()
            .unwrap_or(Value::Null);

        Ok(CollaboratorResponse::success(json!({
            "symbol": symbol,
            "ma_period": ma_period,
            "latest_close": latest_close,
            "previous_close": previous_close,
            "moving_average": moving_average,
            "previous_moving_average": previous_moving_average,
        })))
    }
}
