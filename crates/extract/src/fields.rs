//! Vendor, dates, line items and totals lines from grouped spans.

use chrono::NaiveDate;
use ryoshu_core::{Span, Yen};
use serde::{Deserialize, Serialize};

use crate::keywords::{
    contains_any, COMPANY_KEYWORDS, DUE_DATE_LABELS, ISSUE_DATE_LABELS, LINE_HEADERS,
    SUBTOTAL_LINE_LABELS, TAX_LINE_LABELS, TOTAL_LINE_LABELS,
};
use crate::lines::{group_lines, Line, LINE_TOLERANCE_PX};
use crate::number::scan_numbers;

re!(re_date,
    r"(?P<year>20\d{2}|19\d{2})[./年-]?\s*(?P<month>\d{1,2})[./月-]?\s*(?P<day>\d{1,2})日?");
re!(re_item_number, r"-?\d[\d,.]*");

const VENDOR_SEARCH_LINES: usize = 5;
const HEADER_SEARCH_LINES: usize = 10;
const MIN_HEADER_MATCHES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Option<f64>,
    pub unit_price: Option<Yen>,
    pub amount: Yen,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Option<Yen>,
    pub tax: Option<Yen>,
    pub total: Option<Yen>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredFields {
    pub vendor: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub line_items: Vec<LineItem>,
    pub totals: Totals,
}

pub fn extract_structured(spans: &[Span]) -> StructuredFields {
    let lines = group_lines(spans, LINE_TOLERANCE_PX);
    if lines.is_empty() {
        return StructuredFields::default();
    }

    let vendor = lines
        .iter()
        .take(VENDOR_SEARCH_LINES)
        .find(|l| contains_any(&l.normalized_text(), COMPANY_KEYWORDS))
        .or_else(|| lines.first())
        .map(Line::text);

    let issue_date = find_line(&lines, ISSUE_DATE_LABELS).and_then(parse_date);
    let due_date = find_line(&lines, DUE_DATE_LABELS).and_then(parse_date);

    let header = lines.iter().take(HEADER_SEARCH_LINES).position(|l| {
        let text = l.normalized_text();
        LINE_HEADERS.iter().filter(|h| text.contains(*h)).count() >= MIN_HEADER_MATCHES
    });
    let detail = match header {
        Some(index) => &lines[index + 1..],
        None => &lines[..],
    };
    let line_items = detail.iter().filter_map(detect_line_item).collect();

    let totals = Totals {
        subtotal: find_line(&lines, SUBTOTAL_LINE_LABELS).and_then(last_amount),
        tax: find_line(&lines, TAX_LINE_LABELS).and_then(last_amount),
        total: find_line(&lines, TOTAL_LINE_LABELS).and_then(last_amount),
    };

    StructuredFields { vendor, issue_date, due_date, line_items, totals }
}

fn find_line<'l>(lines: &'l [Line], labels: &[&str]) -> Option<&'l Line> {
    lines.iter().find(|l| contains_any(&l.normalized_text(), labels))
}

/// First `YYYY[./年-]M[./月-]D[日]` on the line; impossible dates are absent.
fn parse_date(line: &Line) -> Option<NaiveDate> {
    let text = line.normalized_text();
    let caps = re_date().captures(&text)?;
    let year = caps["year"].parse().ok()?;
    let month = caps["month"].parse().ok()?;
    let day = caps["day"].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// First amount inside one token; trailing notes like `(税率10%)` are ignored.
fn token_amount(token: &str) -> Option<Yen> {
    scan_numbers(token).first().map(|m| m.value)
}

fn last_amount(line: &Line) -> Option<Yen> {
    line.normalized.iter().rev().find_map(|t| token_amount(t))
}

fn token_quantity(token: &str) -> Option<f64> {
    let m = re_item_number().find(token)?;
    m.as_str().replace(',', "").trim_end_matches('.').parse().ok()
}

fn detect_line_item(line: &Line) -> Option<LineItem> {
    let numeric: Vec<usize> = line
        .normalized
        .iter()
        .enumerate()
        .filter(|(_, t)| re_item_number().is_match(t))
        .map(|(i, _)| i)
        .collect();
    if numeric.len() < 2 {
        return None;
    }

    let amount = token_amount(&line.normalized[numeric[numeric.len() - 1]])?;

    let description = line.tokens[..numeric[0]]
        .join(" ")
        .trim_matches(|c: char| matches!(c, ' ' | ':' | '：'))
        .to_string();
    let description = if description.is_empty() { line.text() } else { description };

    let (quantity, unit_price) = if numeric.len() >= 3 {
        let n = numeric.len();
        (
            token_quantity(&line.normalized[numeric[n - 3]]),
            token_amount(&line.normalized[numeric[n - 2]]),
        )
    } else {
        (token_quantity(&line.normalized[numeric[0]]), None)
    };

    Some(LineItem { description, quantity, unit_price, amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ryoshu_core::Quad;

    fn span(text: &str, x: i32, y: i32, w: i32, h: i32) -> Span {
        Span::new(text, 0.95, Quad::from_rect(x, y, w, h))
    }

    fn invoice() -> Vec<Span> {
        vec![
            span("株式会社テスト商事", 10, 10, 180, 28),
            span("請求書", 220, 10, 80, 28),
            span("発行日 2024/04/01", 10, 60, 220, 24),
            span("支払期日 2024/04/30", 10, 90, 240, 24),
            span("品目", 10, 140, 60, 20),
            span("数量", 120, 140, 60, 20),
            span("単価", 220, 140, 60, 20),
            span("金額", 320, 140, 60, 20),
            span("設計サービス", 10, 180, 140, 20),
            span("10", 160, 180, 30, 20),
            span("5,000", 220, 180, 60, 20),
            span("50,000", 320, 180, 80, 20),
            span("保守サポート", 10, 210, 160, 20),
            span("1", 160, 210, 30, 20),
            span("30,000", 220, 210, 80, 20),
            span("30,000", 320, 210, 80, 20),
            span("小計 80,000", 10, 260, 140, 20),
            span("消費税 8,000", 10, 290, 140, 20),
            span("合計 88,000", 10, 320, 160, 20),
        ]
    }

    #[test]
    fn invoice_fields() {
        let fields = extract_structured(&invoice());
        assert_eq!(fields.vendor.as_deref(), Some("株式会社テスト商事 請求書"));
        assert_eq!(fields.issue_date, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(fields.due_date, NaiveDate::from_ymd_opt(2024, 4, 30));

        assert_eq!(fields.line_items.len(), 2);
        let first = &fields.line_items[0];
        assert_eq!(first.description, "設計サービス");
        assert_eq!(first.quantity, Some(10.0));
        assert_eq!(first.unit_price, Some(Yen::new(5_000)));
        assert_eq!(first.amount, Yen::new(50_000));
        assert_eq!(fields.line_items[1].quantity, Some(1.0));

        assert_eq!(
            fields.totals,
            Totals {
                subtotal: Some(Yen::new(80_000)),
                tax: Some(Yen::new(8_000)),
                total: Some(Yen::new(88_000)),
            }
        );
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let fields = extract_structured(&[]);
        assert_eq!(fields.vendor, None);
        assert!(fields.line_items.is_empty());
        assert_eq!(fields.totals, Totals::default());
    }

    #[test]
    fn vendor_falls_back_to_first_line() {
        let spans = vec![span("カフェ ミモザ", 10, 10, 200, 20), span("合計 980", 10, 60, 200, 20)];
        let fields = extract_structured(&spans);
        assert_eq!(fields.vendor.as_deref(), Some("カフェ ミモザ"));
        assert_eq!(fields.totals.total, Some(Yen::new(980)));
    }

    #[test]
    fn era_and_kanji_dates() {
        let spans = vec![
            span("請求日 令和6年4月1日", 10, 10, 300, 20),
            span("お支払期日 2024年13月1日", 10, 60, 300, 20),
        ];
        let fields = extract_structured(&spans);
        assert_eq!(fields.issue_date, NaiveDate::from_ymd_opt(2024, 4, 1));
        // Month 13 does not exist.
        assert_eq!(fields.due_date, None);
    }

    #[test]
    fn two_numeric_tokens_give_quantity_only() {
        let spans = vec![
            span("ランチ", 10, 10, 100, 20),
            span("2", 150, 10, 20, 20),
            span("1,800円", 250, 10, 80, 20),
        ];
        let fields = extract_structured(&spans);
        assert_eq!(fields.line_items.len(), 1);
        let item = &fields.line_items[0];
        assert_eq!(item.description, "ランチ");
        assert_eq!(item.quantity, Some(2.0));
        assert_eq!(item.unit_price, None);
        assert_eq!(item.amount, Yen::new(1_800));
    }

    #[test]
    fn trailing_rate_notes_do_not_replace_amounts() {
        let spans = vec![
            span("合計 88,000円 (税率10%)", 10, 10, 260, 20),
            span("設計", 10, 60, 60, 20),
            span("2", 120, 60, 20, 20),
            span("3,300 (10%)", 200, 60, 120, 20),
            span("保守", 10, 110, 60, 20),
            span("1", 120, 110, 20, 20),
            span("1,100 (税込)", 200, 110, 120, 20),
            span("1,100 (8%)", 340, 110, 120, 20),
        ];
        let fields = extract_structured(&spans);
        assert_eq!(fields.totals.total, Some(Yen::new(88_000)));

        assert_eq!(fields.line_items.len(), 2);
        let design = &fields.line_items[0];
        assert_eq!(design.description, "設計");
        assert_eq!(design.quantity, Some(2.0));
        assert_eq!(design.amount, Yen::new(3_300));
        let upkeep = &fields.line_items[1];
        assert_eq!(upkeep.quantity, Some(1.0));
        assert_eq!(upkeep.unit_price, Some(Yen::new(1_100)));
        assert_eq!(upkeep.amount, Yen::new(1_100));
    }

    #[test]
    fn description_falls_back_to_whole_line() {
        let spans = vec![span("3", 10, 10, 20, 20), span("900", 100, 10, 60, 20)];
        let fields = extract_structured(&spans);
        assert_eq!(fields.line_items[0].description, "3 900");
    }

    #[test]
    fn serializes_dates_as_iso_strings() {
        let json = serde_json::to_value(extract_structured(&invoice())).unwrap();
        assert_eq!(json["issue_date"], "2024-04-01");
        assert_eq!(json["line_items"][0]["quantity"], 10.0);
        assert_eq!(json["totals"]["total"], 88000);
    }
}
