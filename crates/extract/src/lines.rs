use ryoshu_core::Span;

use crate::normalize::normalize;

/// Vertical distance (px) under which consecutive spans share a line.
pub const LINE_TOLERANCE_PX: f32 = 14.0;

/// A visual text line: the spans sharing a vertical band, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Mean vertical key of the member spans.
    pub y: f32,
    /// Trimmed raw span texts.
    pub tokens: Vec<String>,
    /// `tokens`, normalized.
    pub normalized: Vec<String>,
}

impl Line {
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn normalized_text(&self) -> String {
        self.normalized.join(" ")
    }
}

fn line_key(span: &Span) -> f32 {
    span.bbox.mean_y()
}

/// Group spans into lines.
///
/// Spans are ordered by (mean y, first corner x); each span joins the current
/// line when its key is within `tolerance` of the previous span's key. Lines
/// whose spans are all blank are dropped.
pub fn group_lines(spans: &[Span], tolerance: f32) -> Vec<Line> {
    let mut sorted: Vec<&Span> = spans.iter().collect();
    sorted.sort_by(|a, b| {
        line_key(a)
            .total_cmp(&line_key(b))
            .then(a.bbox.0[0].x.cmp(&b.bbox.0[0].x))
    });

    let mut buckets: Vec<Vec<&Span>> = Vec::new();
    for span in sorted {
        let joins = buckets
            .last()
            .and_then(|bucket| bucket.last())
            .is_some_and(|prev| (line_key(prev) - line_key(span)).abs() <= tolerance);
        if let Some(bucket) = buckets.last_mut().filter(|_| joins) {
            bucket.push(span);
        } else {
            buckets.push(vec![span]);
        }
    }

    buckets
        .into_iter()
        .filter_map(|mut bucket| {
            let y = bucket.iter().map(|s| line_key(s)).sum::<f32>() / bucket.len() as f32;
            bucket.sort_by_key(|s| s.bbox.min_x());
            let tokens: Vec<String> = bucket
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if tokens.is_empty() {
                return None;
            }
            let normalized = tokens.iter().map(|t| normalize(t)).collect();
            Some(Line { y, tokens, normalized })
        })
        .collect()
}
