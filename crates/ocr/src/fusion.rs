//! Merging span sets from several backends for one orientation.

use ryoshu_core::Span;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeRules {
    /// Fraction of the larger box dimension two centers may differ by.
    pub distance_ratio: f32,
    /// Extra slack in pixels.
    pub distance_pad: f32,
}

impl Default for MergeRules {
    fn default() -> Self {
        Self { distance_ratio: 0.6, distance_pad: 8.0 }
    }
}

/// Same text, and centers no further apart than
/// `ratio × max(width, height of both boxes) + pad`.
pub fn is_duplicate(a: &Span, b: &Span, rules: &MergeRules) -> bool {
    if a.text != b.text {
        return false;
    }
    let extent = a.bbox.max_dimension().max(b.bbox.max_dimension()) as f32;
    a.center_distance(b) <= rules.distance_ratio * extent + rules.distance_pad
}

/// The higher-confidence of two duplicates, box and strategy tag included.
/// Ties keep `a`.
pub fn merge(a: &Span, b: &Span) -> Span {
    if b.confidence > a.confidence { b.clone() } else { a.clone() }
}

/// Fold span sets, in backend priority order, into one duplicate-free list.
/// Blank spans are dropped.
pub fn merge_spans<'a>(sets: impl IntoIterator<Item = &'a [Span]>, rules: &MergeRules) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for span in sets.into_iter().flatten() {
        if span.text.trim().is_empty() {
            continue;
        }
        match merged.iter_mut().find(|kept| is_duplicate(kept, span, rules)) {
            Some(kept) => *kept = merge(kept, span),
            None => merged.push(span.clone()),
        }
    }
    merged
}

pub fn mean_confidence(spans: &[Span]) -> f32 {
    if spans.is_empty() {
        return 0.0;
    }
    spans.iter().map(|s| s.confidence).sum::<f32>() / spans.len() as f32
}

/// Orientation quality plus ten times the mean span confidence; an empty
/// span set scales the quality by `empty_penalty` instead.
pub fn composite_score(quality: f32, spans: &[Span], empty_penalty: f32) -> f32 {
    if spans.is_empty() {
        quality * empty_penalty
    } else {
        quality + mean_confidence(spans) * 10.0
    }
}
