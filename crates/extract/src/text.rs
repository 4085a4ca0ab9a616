use tracing::trace;

use crate::amounts::{
    AmountCandidate, AmountExtraction, AmountExtractor, CandidateSets, KeywordRegion, KEYWORD_BONUS,
};
use crate::keywords::{matched_amount_keywords, AmountLabel};
use crate::normalize::normalize;
use crate::number::{has_digit, scan_numbers};

/// Unlabeled values below this are treated as quantities or line numbers.
const TRAILING_TOTAL_FLOOR: i64 = 100;

pub(crate) struct TextScan {
    pub line_count: usize,
    pub sets: CandidateSets,
    pub regions: Vec<KeywordRegion>,
}

/// Text-only amount extraction with the default configuration.
pub fn extract_amounts_from_text(raw: &str) -> AmountExtraction {
    AmountExtractor::default().extract_from_text(raw)
}

/// Walk the text line by line.
///
/// A labeled line with no digits leaves its label pending for the next line
/// that has digits. Unlabeled lines containing `-` are skipped. The last value
/// seen for a label ranks first. When no total was labeled and subtotal or tax
/// is missing, the last unlabeled value of at least 100 stands in for it.
pub(crate) fn scan_lines(raw: &str) -> TextScan {
    let mut sets = CandidateSets::default();
    let mut regions = Vec::new();
    let mut pending: Option<AmountLabel> = None;
    let mut trailing: Option<AmountCandidate> = None;
    let mut line_count = 0;

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        line_count += 1;
        let normalized = normalize(line);
        let own = AmountLabel::classify(&normalized);

        let keywords = matched_amount_keywords(&normalized);
        if !keywords.is_empty() {
            regions.push(KeywordRegion {
                text: line.to_string(),
                normalized: normalized.clone(),
                bbox: None,
                keywords: keywords.into_iter().map(str::to_string).collect(),
            });
        }

        if !has_digit(&normalized) {
            if own.is_some() {
                pending = own;
            }
            continue;
        }

        let label = own.or(pending.take());
        if label.is_none() && normalized.contains('-') {
            trace!(line, "skipping unlabeled line with minus sign");
            continue;
        }

        for number in scan_numbers(&normalized) {
            match label {
                Some(label) => sets.get_mut(label).insert(
                    0,
                    AmountCandidate {
                        label,
                        value: number.value,
                        score: 1.0 + KEYWORD_BONUS,
                        text: line.to_string(),
                        bbox: None,
                        has_keyword: true,
                        confidence: None,
                    },
                ),
                None if number.value.value() >= TRAILING_TOTAL_FLOOR => {
                    trailing = Some(AmountCandidate {
                        label: AmountLabel::Total,
                        value: number.value,
                        score: 1.0,
                        text: line.to_string(),
                        bbox: None,
                        has_keyword: false,
                        confidence: None,
                    });
                }
                None => {}
            }
        }
    }

    let can_infer = !sets.subtotal.is_empty() && !sets.tax.is_empty();
    if sets.total.is_empty() && !can_infer {
        if let Some(candidate) = trailing {
            sets.total.push(candidate);
        }
    }

    TextScan { line_count, sets, regions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amounts::ExtractionSource;
    use ryoshu_core::Yen;

    fn yen(v: i64) -> Option<Yen> {
        Some(Yen::new(v))
    }

    #[test]
    fn pending_label_carries_to_next_numeric_line() {
        let text = ["合計", "¥123,456", "小計 110,000", "消費税 13,456"].join("\n");
        let result = extract_amounts_from_text(&text);
        assert_eq!(result.total, yen(123_456));
        assert_eq!(result.subtotal, yen(110_000));
        assert_eq!(result.tax, yen(13_456));
        assert_eq!(result.debug.consistent, Some(true));
        assert_eq!(result.debug.source, ExtractionSource::Text);
        assert_eq!(result.debug.token_count, 4);
    }

    #[test]
    fn total_is_inferred_from_subtotal_and_tax() {
        let text = ["小計", "99,800", "税額", "9,980"].join("\n");
        let result = extract_amounts_from_text(&text);
        assert_eq!(result.subtotal, yen(99_800));
        assert_eq!(result.tax, yen(9_980));
        assert_eq!(result.total, yen(109_780));
        assert!(result.debug.inferred_total);
        assert_eq!(result.debug.consistent, Some(true));
    }

    #[test]
    fn out_of_range_sum_is_not_inferred() {
        let result = extract_amounts_from_text("小計 5000000000000000000\n消費税 5000000000000000000");
        assert_eq!(result.subtotal, yen(5_000_000_000_000_000_000));
        assert_eq!(result.tax, yen(5_000_000_000_000_000_000));
        assert_eq!(result.total, None);
        assert!(!result.debug.inferred_total);
        assert_eq!(result.debug.consistent, Some(false));
    }

    #[test]
    fn labeled_lines_on_one_line_each() {
        let text = "合計 123,456\n小計 110,000\n消費税 13,456";
        let result = extract_amounts_from_text(text);
        assert_eq!(result.total, yen(123_456));
        assert_eq!(result.subtotal, yen(110_000));
        assert_eq!(result.tax, yen(13_456));
    }

    #[test]
    fn full_width_digits_after_pending_label() {
        let result = extract_amounts_from_text("請求金額\n１２３４５円");
        assert_eq!(result.total, yen(12_345));
    }

    #[test]
    fn plain_and_negative_totals() {
        assert_eq!(extract_amounts_from_text("合計 12345 円").total, yen(12_345));
        assert_eq!(extract_amounts_from_text("合計 -12,000円").total, yen(-12_000));
    }

    #[test]
    fn tax_inclusive_line_is_the_total() {
        let text = "小計 10000円\n消費税 1000円\n税込 11000円";
        let result = extract_amounts_from_text(text);
        assert_eq!(result.subtotal, yen(10_000));
        assert_eq!(result.tax, yen(1_000));
        assert_eq!(result.total, yen(11_000));
    }

    #[test]
    fn last_value_per_label_wins() {
        let text = "合計 1,000\nお釣り 0\n合計 1,200";
        let result = extract_amounts_from_text(text);
        assert_eq!(result.total, yen(1_200));
        let ranked: Vec<i64> = result
            .candidates_for(AmountLabel::Total)
            .map(|c| c.value.value())
            .collect();
        assert_eq!(ranked, vec![1_200, 1_000]);
    }

    #[test]
    fn unlabeled_minus_line_contributes_nothing() {
        let text = "小計 1,000\n- 300\n消費税 100";
        let result = extract_amounts_from_text(text);
        assert_eq!(result.total, yen(1_100));
        assert!(result.candidates.iter().all(|c| c.value != Yen::new(-300)));
        assert!(result.candidates.iter().all(|c| c.value != Yen::new(300)));

        let result = extract_amounts_from_text("値引 -2,500");
        assert_eq!(result.total, None);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn trailing_unlabeled_value_is_the_fallback_total() {
        let text = "コーヒー 2 450\nお会計 1,280\n点数 3";
        let result = extract_amounts_from_text(text);
        assert_eq!(result.total, yen(1_280));
        assert_eq!(result.subtotal, None);
        assert!(!result.candidates[0].has_keyword);
    }

    #[test]
    fn trailing_value_not_used_when_inference_is_possible() {
        let text = "小計 1,000\n消費税 100\n伝票番号 5555";
        let result = extract_amounts_from_text(text);
        assert_eq!(result.total, yen(1_100));
        assert!(result.debug.inferred_total);
    }

    #[test]
    fn text_results_have_no_confidence() {
        let result = extract_amounts_from_text("合計 500");
        assert_eq!(result.confidence, None);
        assert!(result.needs_review(0.7));
    }
}
