//! Scored total/subtotal/tax extraction over recognized spans.
//!
//! Every numeric match in every token competes for all three labels. Scores
//! combine recognizer confidence, a right-column bias and keyword proximity;
//! the winners are then cross-checked (`subtotal + tax ≈ total`) and a missing
//! total is inferred from the other two.

use ryoshu_core::{Quad, Span, Yen};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keywords::{matched_amount_keywords, AmountLabel};
use crate::number::scan_numbers;
use crate::text;
use crate::tokens::{tokenize, Token};

pub const CURRENCY: &str = "JPY";

const BASE_SCORE: f32 = 1.0;
const CONFIDENCE_WEIGHT: f32 = 2.0;
const RIGHT_BIAS_BONUS: f32 = 1.0;
const IN_TOKEN_KEYWORD: f32 = 1.5;
const NEIGHBOUR_KEYWORD: f32 = 1.2;
pub(crate) const KEYWORD_BONUS: f32 = 3.0;
const MAX_VALUE_BONUS: f32 = 2.0;
const INCONSISTENCY_PENALTY: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountConfig {
    /// Tokens whose right edge reaches this fraction of the widest right edge
    /// get the right-column bonus.
    pub right_bias_ratio: f32,
    /// How many nearest tokens are searched for a label keyword.
    pub neighbour_count: usize,
    /// Largest tolerated `|subtotal + tax - total|`, in yen.
    pub consistency_tolerance: u64,
    /// Ranked candidates reported per label.
    pub candidate_limit: usize,
    /// Mean confidence below which a result is flagged for review.
    pub review_threshold: f32,
}

impl Default for AmountConfig {
    fn default() -> Self {
        Self {
            right_bias_ratio: 0.65,
            neighbour_count: 5,
            consistency_tolerance: 1,
            candidate_limit: 5,
            review_threshold: 0.7,
        }
    }
}

/// One value competing for a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountCandidate {
    #[serde(rename = "type")]
    pub label: AmountLabel,
    pub value: Yen,
    pub score: f32,
    /// Raw text of the token the value came from.
    pub text: String,
    pub bbox: Option<Quad>,
    pub has_keyword: bool,
    #[serde(skip)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Spans,
    Text,
}

/// A token that carries at least one amount keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRegion {
    pub text: String,
    pub normalized: String,
    pub bbox: Option<Quad>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountDebug {
    pub source: ExtractionSource,
    pub token_count: usize,
    /// Score of the selected total after any consistency penalty; 0 when absent.
    pub total_score: f32,
    /// `None` unless subtotal, tax and total were all found.
    pub consistent: Option<bool>,
    pub inferred_total: bool,
    pub keyword_regions: Vec<KeywordRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountExtraction {
    pub currency: String,
    pub subtotal: Option<Yen>,
    pub tax: Option<Yen>,
    pub total: Option<Yen>,
    pub candidates: Vec<AmountCandidate>,
    pub confidence: Option<f32>,
    pub debug: AmountDebug,
}

impl AmountExtraction {
    /// Low confidence, a missing total or a failed cross-check.
    pub fn needs_review(&self, threshold: f32) -> bool {
        self.total.is_none()
            || self.debug.consistent == Some(false)
            || self.confidence.map_or(true, |c| c < threshold)
    }

    pub fn candidates_for(&self, label: AmountLabel) -> impl Iterator<Item = &AmountCandidate> {
        self.candidates.iter().filter(move |c| c.label == label)
    }
}

/// Ranked candidates per label, best first.
#[derive(Debug, Default)]
pub(crate) struct CandidateSets {
    pub total: Vec<AmountCandidate>,
    pub subtotal: Vec<AmountCandidate>,
    pub tax: Vec<AmountCandidate>,
}

impl CandidateSets {
    pub fn get(&self, label: AmountLabel) -> &Vec<AmountCandidate> {
        match label {
            AmountLabel::Total => &self.total,
            AmountLabel::Subtotal => &self.subtotal,
            AmountLabel::Tax => &self.tax,
        }
    }

    pub fn get_mut(&mut self, label: AmountLabel) -> &mut Vec<AmountCandidate> {
        match label {
            AmountLabel::Total => &mut self.total,
            AmountLabel::Subtotal => &mut self.subtotal,
            AmountLabel::Tax => &mut self.tax,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AmountExtractor {
    config: AmountConfig,
}

impl AmountExtractor {
    pub fn new(config: AmountConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AmountConfig {
        &self.config
    }

    pub fn extract(&self, spans: &[Span]) -> AmountExtraction {
        let tokens = tokenize(spans);
        let sets = self.score_tokens(&tokens);
        let regions = tokens
            .iter()
            .filter_map(|t| {
                let keywords = matched_amount_keywords(&t.normalized);
                (!keywords.is_empty()).then(|| KeywordRegion {
                    text: t.text.clone(),
                    normalized: t.normalized.clone(),
                    bbox: Some(t.span.bbox),
                    keywords: keywords.into_iter().map(str::to_string).collect(),
                })
            })
            .collect();
        self.finalize(ExtractionSource::Spans, tokens.len(), sets, regions)
    }

    /// Degraded path for text without geometry.
    pub fn extract_from_text(&self, raw: &str) -> AmountExtraction {
        let scan = text::scan_lines(raw);
        self.finalize(ExtractionSource::Text, scan.line_count, scan.sets, scan.regions)
    }

    fn score_tokens(&self, tokens: &[Token<'_>]) -> CandidateSets {
        let max_right = tokens.iter().map(Token::right).fold(0.0_f32, f32::max);
        let mut sets = CandidateSets::default();

        for (index, token) in tokens.iter().enumerate() {
            let numbers = scan_numbers(&token.normalized);
            if numbers.is_empty() {
                continue;
            }
            let mut base = BASE_SCORE + token.confidence() * CONFIDENCE_WEIGHT;
            if token.right() >= self.config.right_bias_ratio * max_right {
                base += RIGHT_BIAS_BONUS;
            }
            let neighbours = self.nearest(index, tokens);

            for label in AmountLabel::ALL {
                let proximity = keyword_proximity(label, token, &neighbours);
                let has_keyword = proximity > 0.0;
                let score = if has_keyword {
                    base + KEYWORD_BONUS + proximity
                } else {
                    base
                };
                for number in &numbers {
                    sets.get_mut(label).push(AmountCandidate {
                        label,
                        value: number.value,
                        score,
                        text: token.text.clone(),
                        bbox: Some(token.span.bbox),
                        has_keyword,
                        confidence: Some(token.confidence()),
                    });
                }
            }
        }

        for label in AmountLabel::ALL {
            let candidates = sets.get_mut(label);
            if let Some(max) = candidates.iter().map(|c| c.value).max() {
                for candidate in candidates.iter_mut().filter(|c| c.value == max) {
                    candidate.score += MAX_VALUE_BONUS;
                }
            }
            rank(candidates);
        }
        sets
    }

    /// The `neighbour_count` tokens closest to `tokens[index]` by center
    /// distance; equal distances keep token order.
    fn nearest<'t, 'a>(&self, index: usize, tokens: &'t [Token<'a>]) -> Vec<&'t Token<'a>> {
        let origin = &tokens[index];
        let mut others: Vec<(f32, &Token<'a>)> = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, t)| (origin.distance(t), t))
            .collect();
        others.sort_by(|a, b| a.0.total_cmp(&b.0));
        others
            .into_iter()
            .take(self.config.neighbour_count)
            .map(|(_, t)| t)
            .collect()
    }

    pub(crate) fn finalize(
        &self,
        source: ExtractionSource,
        token_count: usize,
        mut sets: CandidateSets,
        keyword_regions: Vec<KeywordRegion>,
    ) -> AmountExtraction {
        let subtotal = sets.subtotal.first().cloned();
        let tax = sets.tax.first().cloned();

        // Outer `None`: a side is missing. Inner `None`: the sum leaves the i64 range.
        let expected = match (&subtotal, &tax) {
            (Some(s), Some(t)) => Some(s.value.checked_add(t.value)),
            _ => None,
        };
        if expected == Some(None) {
            debug!("subtotal plus tax out of range; no total inferred");
        }

        let mut inferred_total = false;
        if sets.total.is_empty() {
            if let (Some(s), Some(t), Some(Some(value))) = (&subtotal, &tax, expected) {
                sets.total.insert(
                    0,
                    AmountCandidate {
                        label: AmountLabel::Total,
                        value,
                        score: s.score + t.score,
                        text: format!("{} + {}", s.text, t.text),
                        bbox: None,
                        has_keyword: false,
                        confidence: None,
                    },
                );
                inferred_total = true;
            }
        }

        let mut consistent = None;
        if let (Some(sum), Some(total)) = (expected, sets.total.first_mut()) {
            let ok = sum.is_some_and(|sum| sum.abs_diff(total.value) <= self.config.consistency_tolerance);
            if !ok {
                debug!(
                    expected = ?sum,
                    total = %total.value,
                    "amounts disagree; penalising total"
                );
                total.score -= INCONSISTENCY_PENALTY;
            }
            consistent = Some(ok);
        } else if expected == Some(None) {
            consistent = Some(false);
        }

        let total = sets.total.first();
        let selected = [total, subtotal.as_ref(), tax.as_ref()];
        let confidences: Vec<f32> = selected
            .iter()
            .flatten()
            .filter_map(|c| c.confidence)
            .collect();
        let confidence = (!confidences.is_empty())
            .then(|| confidences.iter().sum::<f32>() / confidences.len() as f32);

        let debug = AmountDebug {
            source,
            token_count,
            total_score: total.map_or(0.0, |c| c.score),
            consistent,
            inferred_total,
            keyword_regions,
        };
        let total = total.map(|c| c.value);

        let candidates = AmountLabel::ALL
            .into_iter()
            .flat_map(|label| sets.get(label).iter().take(self.config.candidate_limit).cloned())
            .collect();

        debug!(
            ?source,
            token_count,
            total = ?total,
            subtotal = ?subtotal.as_ref().map(|c| c.value),
            tax = ?tax.as_ref().map(|c| c.value),
            "amount extraction finished"
        );

        AmountExtraction {
            currency: CURRENCY.to_string(),
            subtotal: subtotal.map(|c| c.value),
            tax: tax.map(|c| c.value),
            total,
            candidates,
            confidence,
            debug,
        }
    }
}

/// Extract amounts with the default configuration.
pub fn extract_amounts(spans: &[Span]) -> AmountExtraction {
    AmountExtractor::default().extract(spans)
}

fn keyword_proximity(label: AmountLabel, token: &Token<'_>, neighbours: &[&Token<'_>]) -> f32 {
    if label.matches(&token.normalized) {
        return IN_TOKEN_KEYWORD;
    }
    neighbours
        .iter()
        .position(|n| label.matches(&n.normalized))
        .map_or(0.0, |rank| NEIGHBOUR_KEYWORD / (rank as f32 + 1.0))
}

/// Highest score first; equal scores keep encounter order.
fn rank(candidates: &mut [AmountCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, y: i32) -> Span {
        Span::new(text, 0.9, Quad::from_rect(40, y, 300, 20))
    }

    /// Invoice with the amount due printed under the letterhead and the
    /// breakdown at the bottom of the item list.
    fn invoice(total: &str) -> Vec<Span> {
        vec![
            span("株式会社サンプル", 10),
            span(&format!("ご請求金額 {total}"), 40),
            span("コーヒー 450", 200),
            span("サンドイッチ 680", 230),
            span("クッキー 200", 260),
            span("ケーキ 520", 290),
            span("小計 1,850", 330),
            span("消費税 185", 360),
        ]
    }

    #[test]
    fn invoice_amounts_are_selected_and_consistent() {
        let result = extract_amounts(&invoice("¥2,035"));
        assert_eq!(result.currency, "JPY");
        assert_eq!(result.total, Some(Yen::new(2_035)));
        assert_eq!(result.subtotal, Some(Yen::new(1_850)));
        assert_eq!(result.tax, Some(Yen::new(185)));
        assert_eq!(result.debug.consistent, Some(true));
        assert!(!result.debug.inferred_total);
        assert_eq!(result.debug.token_count, 8);
        assert_eq!(result.debug.source, ExtractionSource::Spans);
        let confidence = result.confidence.unwrap();
        assert!((confidence - 0.9).abs() < 1e-6);
        assert!(!result.needs_review(0.7));
    }

    #[test]
    fn inconsistent_total_is_penalised_not_replaced() {
        let consistent = extract_amounts(&invoice("¥2,035"));
        let result = extract_amounts(&invoice("¥2,100"));
        assert_eq!(result.total, Some(Yen::new(2_100)));
        assert_eq!(result.debug.consistent, Some(false));
        assert!((consistent.debug.total_score - result.debug.total_score - 2.0).abs() < 1e-5);
        assert!(result.needs_review(0.7));
    }

    #[test]
    fn keyword_adjacent_value_beats_larger_isolated_value() {
        let rect = |text: &str, x: i32, y: i32| Span::new(text, 0.9, Quad::from_rect(x, y, 80, 20));
        let spans = vec![
            rect("品名", 400, 100),
            rect("12,000", 500, 100),
            rect("A", 400, 130),
            rect("C", 500, 130),
            rect("B", 400, 160),
            rect("D", 500, 160),
            rect("合計", 400, 900),
            rect("3,300", 500, 900),
        ];
        let result = extract_amounts(&spans);
        assert_eq!(result.total, Some(Yen::new(3_300)));
        let best = result.candidates_for(AmountLabel::Total).next().unwrap();
        assert!(best.has_keyword);
        let isolated = result
            .candidates_for(AmountLabel::Total)
            .find(|c| c.value == Yen::new(12_000))
            .unwrap();
        assert!(!isolated.has_keyword);
    }

    #[test]
    fn right_edge_bias_breaks_even_scores() {
        let spans = vec![
            Span::new("1,000", 0.8, Quad::from_rect(10, 10, 80, 20)),
            Span::new("1,000", 0.8, Quad::from_rect(400, 300, 80, 20)),
        ];
        let result = extract_amounts(&spans);
        let best = result.candidates_for(AmountLabel::Total).next().unwrap();
        assert_eq!(best.bbox.unwrap().min_x(), 400);
    }

    #[test]
    fn candidates_are_capped_per_label() {
        let spans: Vec<Span> = (0..8)
            .map(|i| span(&format!("{}", 100 + i), i * 40))
            .collect();
        let result = extract_amounts(&spans);
        for label in AmountLabel::ALL {
            assert_eq!(result.candidates_for(label).count(), 5);
        }
        assert_eq!(result.candidates.len(), 15);
    }

    #[test]
    fn keyword_regions_list_matched_keywords() {
        let result = extract_amounts(&invoice("¥2,035"));
        let regions = &result.debug.keyword_regions;
        assert_eq!(regions.len(), 3);
        assert!(regions[0].keywords.contains(&"請求金額".to_string()));
        assert!(regions[2].keywords.contains(&"消費税".to_string()));
    }

    #[test]
    fn empty_spans_yield_empty_result() {
        let result = extract_amounts(&[]);
        assert_eq!(result.total, None);
        assert_eq!(result.confidence, None);
        assert!(result.candidates.is_empty());
        assert_eq!(result.debug.consistent, None);
        assert!(result.needs_review(0.7));
    }

    #[test]
    fn nineteen_digit_reference_does_not_overflow() {
        let spans = [Span::new("伝票番号 5000000000000000000", 0.9, Quad::from_rect(0, 0, 300, 20))];
        let result = extract_amounts(&spans);
        let huge = Yen::new(5_000_000_000_000_000_000);
        assert_eq!(result.total, Some(huge));
        assert_eq!(result.subtotal, Some(huge));
        assert_eq!(result.tax, Some(huge));
        assert!(!result.debug.inferred_total);
        assert_eq!(result.debug.consistent, Some(false));
        assert!(result.needs_review(0.7));
    }

    #[test]
    fn serialized_shape_uses_type_key_and_plain_integers() {
        let result = extract_amounts(&invoice("¥2,035"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["total"], 2035);
        assert_eq!(json["candidates"][0]["type"], "total");
        assert_eq!(json["debug"]["source"], "spans");
        assert!(json["candidates"][0].get("confidence").is_none());
    }
}
