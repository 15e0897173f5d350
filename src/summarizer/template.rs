//! Deterministic Korean answer templates

use super::{SummaryRequest, SummaryResponse, Summarizer};
use crate::models::{
    AggregatedResult, Capability, Direction, MarketRecord, RankingField, ResultView, SignalType,
};
use crate::Result;
use serde_json::Value;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummarizer;

/// Up/down breadth of a record set.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSentiment {
    pub label: &'static str,
    pub up_count: usize,
    pub down_count: usize,
    pub up_ratio: f64,
    pub avg_change: f64,
}

pub fn market_sentiment<'a, I>(records: I) -> MarketSentiment
where
    I: IntoIterator<Item = &'a MarketRecord>,
{
    let (mut total, mut up, mut down, mut sum) = (0usize, 0usize, 0usize, 0.0f64);
    for record in records {
        total += 1;
        sum += record.change_rate;
        if record.change_rate > 0.0 {
            up += 1;
        } else if record.change_rate < 0.0 {
            down += 1;
        }
    }

    if total == 0 {
        return MarketSentiment {
            label: "중립",
            up_count: 0,
            down_count: 0,
            up_ratio: 0.0,
            avg_change: 0.0,
        };
    }

    let up_ratio = up as f64 / total as f64;
    let label = if up_ratio > 0.7 {
        "매우 긍정적"
    } else if up_ratio > 0.6 {
        "긍정적"
    } else if up_ratio > 0.4 {
        "중립적"
    } else if up_ratio > 0.3 {
        "부정적"
    } else {
        "매우 부정적"
    };

    MarketSentiment {
        label,
        up_count: up,
        down_count: down,
        up_ratio,
        avg_change: sum / total as f64,
    }
}

/// Thousands-separated amount; fractions only when present.
pub fn format_number(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    if frac == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{:02}", sign, grouped, frac)
    }
}

fn trend_marker(change_rate: f64) -> &'static str {
    if change_rate > 0.0 {
        "📈"
    } else if change_rate < 0.0 {
        "📉"
    } else {
        "➡️"
    }
}

fn price_label(price_type: Option<&str>) -> &'static str {
    match price_type {
        Some("open") => "시가",
        Some("close") => "종가",
        Some("high") => "고가",
        Some("low") => "저가",
        _ => "현재가",
    }
}

fn render_quote(payload: &Value) -> String {
    let Ok(record) = serde_json::from_value::<MarketRecord>(payload.clone()) else {
        return format!("조회 결과: {}", payload);
    };

    let price_type = payload.get("price_type").and_then(Value::as_str);
    let price = payload
        .get("price")
        .and_then(Value::as_f64)
        .unwrap_or(record.current_price);

    let mut out = format!(
        "{} {}",
        trend_marker(record.change_rate),
        record.display_name()
    );
    if let Some(date) = &record.date {
        let _ = write!(out, " ({})", date);
    }
    let _ = write!(
        out,
        "\n{}: {}원 ({:+.2}%)\n거래량: {}주",
        price_label(price_type),
        format_number(price),
        record.change_rate,
        format_number(record.volume as f64)
    );
    out
}

fn render_record_line(rank: usize, record: &MarketRecord, field: Option<RankingField>) -> String {
    match field {
        Some(RankingField::Volume) => format!(
            "{}. {}: 거래량 {}주 ({:+.2}%)",
            rank,
            record.display_name(),
            format_number(record.volume as f64),
            record.change_rate
        ),
        _ => format!(
            "{}. {}: {}원 ({:+.2}%)",
            rank,
            record.display_name(),
            format_number(record.current_price),
            record.change_rate
        ),
    }
}

fn render_view(view: &ResultView) -> String {
    match view {
        ResultView::Single {
            error: Some(error), ..
        } => format!("요청하신 정보를 가져오지 못했습니다: {}", error),
        ResultView::Single {
            payload: Some(payload),
            ..
        } => render_quote(payload),
        ResultView::Single { .. } => "조회된 정보가 없습니다.".to_string(),

        ResultView::Ranking {
            field,
            total_count,
            items,
            ..
        } => {
            if items.is_empty() {
                return "조회된 종목이 없습니다.".to_string();
            }
            let title = match field {
                RankingField::Gain => "상승률 상위",
                RankingField::Loss => "하락률 상위",
                RankingField::Volume => "거래량 상위",
            };
            let mut out = format!("{} {}개 종목 (전체 {}개 중)\n", title, items.len(), total_count);
            for item in items {
                out.push_str(&render_record_line(item.rank, &item.record, Some(*field)));
                out.push('\n');
            }
            let sentiment = market_sentiment(items.iter().map(|i| &i.record));
            let _ = write!(
                out,
                "시장 심리: {} (상승 {} / 하락 {}, 평균 {:+.2}%)",
                sentiment.label, sentiment.up_count, sentiment.down_count, sentiment.avg_change
            );
            out
        }

        ResultView::Threshold {
            threshold,
            direction,
            match_count,
            no_matches,
            items,
            ..
        } => {
            let condition = match direction {
                Some(Direction::Up) => format!("{}% 이상 상승", threshold),
                Some(Direction::Down) => format!("{}% 이상 하락", threshold),
                None => format!("{}% 이상 변동", threshold),
            };
            if *no_matches {
                return format!("{}한 종목이 없습니다.", condition);
            }
            let mut out = format!("{}한 종목 {}개\n", condition, match_count);
            for (i, record) in items.iter().enumerate() {
                out.push_str(&render_record_line(i + 1, record, None));
                out.push('\n');
            }
            if *match_count > items.len() {
                let _ = write!(out, "(처음 {}개만 표시)", items.len());
            }
            out.trim_end().to_string()
        }

        ResultView::Statistics {
            movement,
            market,
            date,
            count,
            universe,
            ..
        } => {
            let when = date.as_deref().map(|d| format!("{} ", d)).unwrap_or_default();
            match movement {
                Some(Direction::Up) => format!(
                    "{}{} 상승 종목 수: {}개 (전체 {}개)",
                    when, market, count, universe
                ),
                Some(Direction::Down) => format!(
                    "{}{} 하락 종목 수: {}개 (전체 {}개)",
                    when, market, count, universe
                ),
                None => format!("{}{} 거래 종목 수: {}개", when, market, count),
            }
        }

        ResultView::Signal {
            symbol,
            signal_type,
            direction,
            ma_period,
            threshold,
            latest_close,
            moving_average,
            gap_ratio,
            judgement,
            ..
        } => {
            let mut out = format!(
                "{} 종가 {}원, {}일 이동평균 {}원 (괴리율 {:+.2}%)\n",
                symbol,
                format_number(*latest_close),
                ma_period,
                format_number(*moving_average),
                gap_ratio
            );
            let way = match direction {
                Direction::Up => "상향",
                Direction::Down => "하향",
            };
            let verdict = match (signal_type, judgement) {
                (SignalType::Breakout, true) => {
                    format!("이동평균 {}% {} 돌파 신호가 발생했습니다.", threshold, way)
                }
                (SignalType::Breakout, false) => {
                    format!("이동평균 {}% {} 돌파 신호는 없습니다.", threshold, way)
                }
                (SignalType::Cross, true) => format!("종가가 이동평균을 {} 교차했습니다.", way),
                (SignalType::Cross, false) => format!("이동평균 {} 교차는 없습니다.", way),
            };
            out.push_str(&verdict);
            out
        }
    }
}

fn render_extras(result: &AggregatedResult, out: &mut String) {
    for supplement in &result.supplements {
        match supplement.capability {
            Capability::FilingLookup => {
                let count = supplement
                    .payload
                    .get("filings")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or(0);
                let _ = write!(out, "\n올해 공시: {}건", count);
            }
            Capability::ListingLookup => {
                let count = supplement
                    .payload
                    .get("count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                let _ = write!(out, "\n관련 상장사: {}곳", count);
            }
            Capability::PriceLookup | Capability::SignalEvaluation => {}
        }
    }

    if !result.failures.is_empty() {
        let names: Vec<&str> = result.failures.iter().map(|f| f.capability.as_str()).collect();
        let _ = write!(out, "\n일부 정보를 가져오지 못했습니다: {}", names.join(", "));
    }
}

impl TemplateSummarizer {
    pub fn render(&self, result: &AggregatedResult) -> String {
        let mut out = render_view(&result.view);
        render_extras(result, &mut out);
        out
    }
}

#[async_trait::async_trait]
impl Summarizer for TemplateSummarizer {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<SummaryResponse> {
        Ok(SummaryResponse {
            final_answer: self.render(request.result),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapabilityFailure, Market, RankedRecord, SourcedPayload};
    use serde_json::json;

    fn rec(name: &str, change_rate: f64) -> MarketRecord {
        MarketRecord {
            symbol: "000000".into(),
            name: Some(name.into()),
            market: Some(Market::Kospi),
            date: None,
            current_price: 71_000.0,
            change_rate,
            volume: 1_234_567,
            open: None,
            close: None,
            high: None,
            low: None,
        }
    }

    fn result(view: ResultView) -> AggregatedResult {
        AggregatedResult {
            view,
            supplements: vec![],
            failures: vec![],
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(71000.0), "71,000");
        assert_eq!(format_number(1234567.0), "1,234,567");
        assert_eq!(format_number(999.5), "999.50");
        assert_eq!(format_number(-1500.0), "-1,500");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn test_sentiment_buckets() {
        let up = |n: usize, total: usize| -> Vec<MarketRecord> {
            (0..total)
                .map(|i| rec("x", if i < n { 1.0 } else { -1.0 }))
                .collect()
        };
        assert_eq!(market_sentiment(&up(8, 10)).label, "매우 긍정적");
        assert_eq!(market_sentiment(&up(7, 10)).label, "긍정적");
        assert_eq!(market_sentiment(&up(5, 10)).label, "중립적");
        assert_eq!(market_sentiment(&up(4, 10)).label, "부정적");
        assert_eq!(market_sentiment(&up(3, 10)).label, "매우 부정적");
        assert_eq!(market_sentiment(&Vec::<MarketRecord>::new()).label, "중립");
    }

    #[test]
    fn test_quote_rendering() {
        let text = TemplateSummarizer.render(&result(ResultView::Single {
            source: Capability::PriceLookup,
            payload: Some(json!({
                "symbol": "005930",
                "name": "삼성전자",
                "date": "2024-07-01",
                "current_price": 71000.0,
                "change_rate": 1.5,
                "volume": 15000000,
                "price_type": "close",
                "price": 70500.0,
            })),
            error: None,
        }));
        assert!(text.contains("삼성전자 (2024-07-01)"));
        assert!(text.contains("종가: 70,500원 (+1.50%)"));
        assert!(text.contains("15,000,000주"));
    }

    #[test]
    fn test_ranking_rendering() {
        let items = vec![
            RankedRecord { rank: 1, source: Capability::PriceLookup, record: rec("에코프로비엠", 6.8) },
            RankedRecord { rank: 2, source: Capability::PriceLookup, record: rec("SK하이닉스", 4.2) },
        ];
        let text = TemplateSummarizer.render(&result(ResultView::Ranking {
            source: Capability::PriceLookup,
            field: RankingField::Gain,
            limit: 2,
            total_count: 5,
            items,
        }));
        assert!(text.starts_with("상승률 상위 2개 종목 (전체 5개 중)"));
        assert!(text.contains("1. 에코프로비엠: 71,000원 (+6.80%)"));
        assert!(text.contains("시장 심리: 매우 긍정적"));
    }

    #[test]
    fn test_no_matches_is_explicit() {
        let text = TemplateSummarizer.render(&result(ResultView::Threshold {
            source: Capability::PriceLookup,
            threshold: 30.0,
            direction: Some(Direction::Up),
            match_count: 0,
            no_matches: true,
            items: vec![],
        }));
        assert_eq!(text, "30% 이상 상승한 종목이 없습니다.");
    }

    #[test]
    fn test_extras_list_supplements_and_failures() {
        let mut aggregated = result(ResultView::Statistics {
            source: Capability::PriceLookup,
            sub_type: "movement_count".into(),
            movement: Some(Direction::Up),
            market: Market::Kosdaq,
            date: Some("2024-07-01".into()),
            count: 12,
            universe: 30,
        });
        aggregated.supplements.push(SourcedPayload {
            capability: Capability::FilingLookup,
            payload: json!({"filings": [{}, {}]}),
        });
        aggregated.failures.push(CapabilityFailure {
            capability: Capability::ListingLookup,
            message: "down".into(),
        });

        let text = TemplateSummarizer.render(&aggregated);
        assert!(text.contains("2024-07-01 KOSDAQ 상승 종목 수: 12개 (전체 30개)"));
        assert!(text.contains("올해 공시: 2건"));
        assert!(text.contains("일부 정보를 가져오지 못했습니다: listing-lookup"));
    }
}
