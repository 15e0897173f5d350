//! Result aggregation
//!
//! Turns the collaborator results of one dispatch into a single
//! `AggregatedResult` shaped after the intent category: pass-through quote,
//! top-N ranking, threshold list, market statistics or signal judgement.
//! Sorting is stable so ties keep collaborator order.

use crate::models::{
    AggregatedResult, Capability, CapabilityFailure, CollaboratorResult, Direction, Market,
    MarketRecord, QueryType, RankedRecord, RankingField, ResultView, SignalType, SourcedPayload,
    StructuredIntent,
};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_RANKING_LIMIT: usize = 10;
pub const THRESHOLD_DISPLAY_CAP: usize = 15;

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    default_limit: usize,
    display_cap: usize,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_RANKING_LIMIT,
            display_cap: THRESHOLD_DISPLAY_CAP,
        }
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(
        &self,
        intent: &StructuredIntent,
        results: &[CollaboratorResult],
    ) -> AggregatedResult {
        let primary_capability = match intent.query_type {
            QueryType::TechnicalSignal => Capability::SignalEvaluation,
            _ => Capability::PriceLookup,
        };
        let primary = results
            .iter()
            .find(|r| r.capability == primary_capability)
            .or_else(|| results.first());

        let view = match primary {
            None => ResultView::Single {
                source: primary_capability,
                payload: None,
                error: Some("no capability was invoked".to_string()),
            },
            Some(result) if !result.is_ok() => ResultView::Single {
                source: result.capability,
                payload: None,
                error: result.error.clone(),
            },
            Some(result) => self.shape(intent, result),
        };

        let supplements = results
            .iter()
            .filter(|r| r.is_ok() && !primary.is_some_and(|p| std::ptr::eq(p, *r)))
            .map(|r| SourcedPayload {
                capability: r.capability,
                payload: r.payload.clone(),
            })
            .collect();

        let failures = results
            .iter()
            .filter(|r| !r.is_ok())
            .map(|r| CapabilityFailure {
                capability: r.capability,
                message: r.error.clone().unwrap_or_default(),
            })
            .collect();

        AggregatedResult {
            view,
            supplements,
            failures,
        }
    }

    fn shape(&self, intent: &StructuredIntent, result: &CollaboratorResult) -> ResultView {
        let source = result.capability;
        let params = &intent.parameters;

        let shaped = match intent.query_type {
            QueryType::StockPriceInquiry | QueryType::Unknown => Ok(ResultView::Single {
                source,
                payload: Some(result.payload.clone()),
                error: None,
            }),
            QueryType::RankingInquiry => records_from(&result.payload).map(|records| {
                let field = ranking_field(intent.sub_type.as_deref());
                let limit = params.limit.unwrap_or(self.default_limit);
                let total_count = records.len();
                let items = rank_records(records, field, limit)
                    .into_iter()
                    .enumerate()
                    .map(|(i, record)| RankedRecord {
                        rank: i + 1,
                        source,
                        record,
                    })
                    .collect();
                ResultView::Ranking {
                    source,
                    field,
                    limit,
                    total_count,
                    items,
                }
            }),
            QueryType::ConditionalSearch => records_from(&result.payload).map(|records| {
                let threshold = params.threshold.unwrap_or(0.0);
                let mut matches = filter_threshold(records, threshold, params.direction);
                let match_count = matches.len();
                matches.truncate(self.display_cap);
                ResultView::Threshold {
                    source,
                    threshold,
                    direction: params.direction,
                    match_count,
                    no_matches: match_count == 0,
                    items: matches,
                }
            }),
            QueryType::MarketStatistics => records_from(&result.payload).map(|records| {
                let sub_type = intent
                    .sub_type
                    .clone()
                    .unwrap_or_else(|| "total_count".to_string());
                let movement = match sub_type.as_str() {
                    "movement_count" => params.movement,
                    _ => None,
                };
                ResultView::Statistics {
                    source,
                    count: count_movement(&records, movement),
                    universe: records.len(),
                    sub_type,
                    movement,
                    market: params.market.unwrap_or(Market::All),
                    date: params.date.clone(),
                }
            }),
            QueryType::TechnicalSignal => signal_view(intent, result),
        };

        shaped.unwrap_or_else(|error| {
            warn!(capability = %source, error = %error, "Unusable collaborator payload");
            ResultView::Single {
                source,
                payload: Some(result.payload.clone()),
                error: Some(error),
            }
        })
    }
}

/// Bulk payloads are either a bare array or an object with `records`.
fn records_from(payload: &Value) -> Result<Vec<MarketRecord>, String> {
    let list = match payload {
        Value::Array(_) => payload,
        _ => payload
            .get("records")
            .ok_or_else(|| "payload has no records".to_string())?,
    };
    serde_json::from_value(list.clone()).map_err(|e| format!("malformed records: {}", e))
}

fn ranking_field(sub_type: Option<&str>) -> RankingField {
    match sub_type {
        Some("top_losers") => RankingField::Loss,
        Some("top_volume") => RankingField::Volume,
        _ => RankingField::Gain,
    }
}

/// Stable sort by `field` (best first), then keep the first `limit`.
pub fn rank_records(
    mut records: Vec<MarketRecord>,
    field: RankingField,
    limit: usize,
) -> Vec<MarketRecord> {
    records.sort_by(|a, b| match field {
        RankingField::Gain => b.change_rate.total_cmp(&a.change_rate),
        RankingField::Loss => a.change_rate.total_cmp(&b.change_rate),
        RankingField::Volume => b.volume.cmp(&a.volume),
    });
    records.truncate(limit);
    records
}

/// Records whose signed change meets the comparison, in input order.
///
/// Without a direction the magnitude is compared.
pub fn filter_threshold(
    records: Vec<MarketRecord>,
    threshold: f64,
    direction: Option<Direction>,
) -> Vec<MarketRecord> {
    records
        .into_iter()
        .filter(|r| match direction {
            Some(Direction::Up) => r.change_rate >= threshold,
            Some(Direction::Down) => r.change_rate <= -threshold,
            None => r.change_rate.abs() >= threshold,
        })
        .collect()
}

fn count_movement(records: &[MarketRecord], movement: Option<Direction>) -> usize {
    records
        .iter()
        .filter(|r| match movement {
            Some(Direction::Up) => r.change_rate > 0.0,
            Some(Direction::Down) => r.change_rate < 0.0,
            None => true,
        })
        .count()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn signal_view(intent: &StructuredIntent, result: &CollaboratorResult) -> Result<ResultView, String> {
    let payload = &result.payload;
    let number = |key: &str| payload.get(key).and_then(Value::as_f64);

    let latest_close = number("latest_close").ok_or("signal payload has no latest_close")?;
    let moving_average = number("moving_average")
        .filter(|ma| *ma != 0.0)
        .ok_or("signal payload has no usable moving_average")?;

    let params = &intent.parameters;
    let signal_type = params.signal_type.unwrap_or(SignalType::Breakout);
    let threshold = params.threshold.unwrap_or(0.0);
    let gap_ratio = round2((latest_close - moving_average) / moving_average * 100.0);

    let direction = params.direction.unwrap_or(Direction::Up);

    let judgement = match (signal_type, direction) {
        (SignalType::Breakout, Direction::Up) => gap_ratio >= threshold,
        (SignalType::Breakout, Direction::Down) => gap_ratio <= -threshold,
        (SignalType::Cross, _) => {
            match (number("previous_close"), number("previous_moving_average")) {
                (Some(prev_close), Some(prev_ma)) => match direction {
                    Direction::Up => latest_close > moving_average && prev_close <= prev_ma,
                    Direction::Down => latest_close < moving_average && prev_close >= prev_ma,
                },
                _ => false,
            }
        }
    };

    let symbol = payload
        .get("symbol")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| params.symbol.clone())
        .unwrap_or_default();

    let ma_period = payload
        .get("ma_period")
        .and_then(Value::as_u64)
        .map(|p| p as u32)
        .or(params.ma_period)
        .unwrap_or_default();

    debug!(symbol = %symbol, gap_ratio, judgement, "Signal evaluated");

    Ok(ResultView::Signal {
        source: result.capability,
        symbol,
        signal_type,
        direction,
        ma_period,
        threshold,
        latest_close,
        moving_average,
        gap_ratio,
        judgement,
    })
}
