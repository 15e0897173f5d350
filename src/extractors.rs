//! Parameter extractors
//!
//! Pure `text -> value` functions used by the classifier rules and by the
//! parameter-completion pass. None of them fail: a missing value is `None`
//! (or the documented default for price type and market).

use crate::models::{Market, PriceType};
use chrono::{Datelike, Duration, Local, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

/// Corporate-name endings that make a Hangul run look like a listed company.
const CORP_SUFFIXES: &[&str] = &[
    "전자", "화학", "건설", "금융", "통신", "바이오", "제약", "식품", "유통", "물산",
    "중공업", "그룹", "홀딩스", "제철", "카드", "은행", "보험", "증권", "자산", "투자",
    "개발", "엔지니어링", "에너지", "소재", "머티리얼", "테크", "시스템", "솔루션",
];

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("valid date regex");
    static ref MONTH_DAY: Regex =
        Regex::new(r"(\d{1,2})월\s*(\d{1,2})일").expect("valid month/day regex");
    static ref SUFFIXED_NAME: Regex = Regex::new(&format!(
        r"([가-힣]+(?:{})(?:우선주|우)?)",
        CORP_SUFFIXES.join("|")
    ))
    .expect("valid corporate name regex");
    static ref HANGUL_TOKEN: Regex =
        Regex::new(r"([가-힣]{2,}(?:우선주|우)?)").expect("valid hangul token regex");
    static ref STOCK_CODE: Regex = Regex::new(r"(\d{6})").expect("valid stock code regex");
    static ref DECIMAL: Regex = Regex::new(r"\d+(?:\.\d+)?").expect("valid number regex");
}

/// Date as `YYYY-MM-DD`, resolved against the local wall clock.
pub fn extract_date(text: &str) -> Option<String> {
    extract_date_on(text, Local::now().date_naive())
}

/// Date as `YYYY-MM-DD`, resolving relative tokens against `today`.
///
/// Rules, first hit wins: literal `YYYY-MM-DD`, `M월 D일` in the current
/// year, then 오늘/어제.
pub fn extract_date_on(text: &str, today: NaiveDate) -> Option<String> {
    if let Some(caps) = ISO_DATE.captures(text) {
        return Some(caps[1].to_string());
    }

    if let Some(caps) = MONTH_DAY.captures(text) {
        let month = caps[1].parse::<u32>().ok();
        let day = caps[2].parse::<u32>().ok();
        if let Some(date) = month
            .zip(day)
            .and_then(|(m, d)| NaiveDate::from_ymd_opt(today.year(), m, d))
        {
            return Some(format_date(date));
        }
    }

    if text.contains("오늘") {
        return Some(format_date(today));
    }
    if text.contains("어제") {
        return Some(format_date(today - Duration::days(1)));
    }

    None
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Company name or 6-digit code.
///
/// Tries the suffix heuristic first, then any 2+ syllable Hangul run, then a
/// numeric stock code.
pub fn extract_symbol(text: &str) -> Option<String> {
    [&*SUFFIXED_NAME, &*HANGUL_TOKEN, &*STOCK_CODE]
        .iter()
        .find_map(|pattern| pattern.captures(text).map(|caps| caps[1].to_string()))
}

pub fn extract_price_type(text: &str) -> PriceType {
    if text.contains("시가") {
        PriceType::Open
    } else if text.contains("종가") {
        PriceType::Close
    } else if text.contains("고가") {
        PriceType::High
    } else if text.contains("저가") {
        PriceType::Low
    } else {
        // 현재가, 주가 and no token at all
        PriceType::Current
    }
}

pub fn extract_market(text: &str) -> Market {
    let upper = text.to_uppercase();
    if upper.contains("KOSPI") || text.contains("코스피") {
        Market::Kospi
    } else if upper.contains("KOSDAQ") || text.contains("코스닥") {
        Market::Kosdaq
    } else {
        Market::All
    }
}

/// `text` with `YYYY-MM-DD` and `M월 D일` spans blanked out.
pub fn strip_dates(text: &str) -> String {
    let without_iso = ISO_DATE.replace_all(text, " ");
    MONTH_DAY.replace_all(&without_iso, " ").into_owned()
}

/// Every decimal literal in the text, left to right.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    DECIMAL
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_iso_date_is_returned_verbatim() {
        let today = day(2025, 3, 10);
        assert_eq!(
            extract_date_on("삼성전자의 2024-07-01 종가는?", today).as_deref(),
            Some("2024-07-01")
        );
        // Literal wins even when a relative token is present
        assert_eq!(
            extract_date_on("오늘 말고 2023-12-28 거래량", today).as_deref(),
            Some("2023-12-28")
        );
    }

    #[test]
    fn test_month_day_uses_current_year() {
        let today = day(2025, 3, 10);
        assert_eq!(
            extract_date_on("7월 1일 상승률 상위 5개", today).as_deref(),
            Some("2025-07-01")
        );
        assert_eq!(
            extract_date_on("12월 5일 거래량", today).as_deref(),
            Some("2025-12-05")
        );
    }

    #[test]
    fn test_invalid_month_day_falls_through() {
        let today = day(2025, 3, 10);
        assert_eq!(extract_date_on("13월 40일", today), None);
        assert_eq!(
            extract_date_on("13월 40일 오늘", today).as_deref(),
            Some("2025-03-10")
        );
    }

    #[test]
    fn test_relative_dates() {
        let today = day(2025, 3, 1);
        assert_eq!(
            extract_date_on("오늘 코스피 상승 종목", today).as_deref(),
            Some("2025-03-01")
        );
        assert_eq!(
            extract_date_on("어제 거래량 상위", today).as_deref(),
            Some("2025-02-28")
        );
        assert_eq!(extract_date_on("상승률 상위 5개", today), None);
    }

    #[test]
    fn test_symbol_suffix_heuristic() {
        assert_eq!(extract_symbol("삼성전자 주가 알려줘").as_deref(), Some("삼성전자"));
        assert_eq!(
            extract_symbol("롯데케미칼 말고 한화솔루션 시가").as_deref(),
            Some("한화솔루션")
        );
        assert_eq!(extract_symbol("미래에셋증권 현재가").as_deref(), Some("미래에셋증권"));
        assert_eq!(extract_symbol("삼성전자우 현재가").as_deref(), Some("삼성전자우"));
    }

    #[test]
    fn test_symbol_generic_hangul_and_code() {
        assert_eq!(extract_symbol("카카오 주가").as_deref(), Some("카카오"));
        assert_eq!(extract_symbol("005930 price").as_deref(), Some("005930"));
        assert_eq!(extract_symbol("AAPL 1"), None);
    }

    #[test]
    fn test_price_type_tokens() {
        assert_eq!(extract_price_type("시가"), PriceType::Open);
        assert_eq!(extract_price_type("종가는?"), PriceType::Close);
        assert_eq!(extract_price_type("고가"), PriceType::High);
        assert_eq!(extract_price_type("저가"), PriceType::Low);
        assert_eq!(extract_price_type("현재가"), PriceType::Current);
        assert_eq!(extract_price_type("주가"), PriceType::Current);
        assert_eq!(extract_price_type("얼마야"), PriceType::Current);
    }

    #[test]
    fn test_market_tokens() {
        assert_eq!(extract_market("코스피 상승률"), Market::Kospi);
        assert_eq!(extract_market("KOSDAQ 거래량"), Market::Kosdaq);
        assert_eq!(extract_market("kosdaq 거래량"), Market::Kosdaq);
        assert_eq!(extract_market("상승률 상위"), Market::All);
    }

    #[test]
    fn test_strip_dates_leaves_other_numbers() {
        let stripped = strip_dates("2024-07-01 20일 이동평균 7월 1일 3% 돌파");
        assert_eq!(extract_numbers(&stripped), vec![20.0, 3.0]);
    }

    #[test]
    fn test_numbers_in_order() {
        assert_eq!(extract_numbers("50일 이동평균 10.5% 돌파"), vec![50.0, 10.5]);
        assert!(extract_numbers("숫자 없음").is_empty());
    }
}
