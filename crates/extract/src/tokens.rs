use ryoshu_core::Span;

use crate::normalize::normalize;

/// A normalized, line-split view of a [`Span`] with resolved pixel geometry.
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub text: String,
    pub normalized: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub span: &'a Span,
}

impl Token<'_> {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn distance(&self, other: &Token<'_>) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).hypot(ay - by)
    }

    pub fn confidence(&self) -> f32 {
        self.span.confidence
    }
}

/// Split each span on embedded line breaks. Each line gets an equal vertical
/// slice of the parent box; blank lines keep their slice but emit no token.
pub fn tokenize(spans: &[Span]) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for span in spans {
        let mut parts: Vec<&str> = span.text.lines().collect();
        if parts.is_empty() {
            parts.push(span.text.as_str());
        }
        let bbox = &span.bbox;
        let slice = bbox.height() as f32 / parts.len() as f32;
        for (index, part) in parts.iter().enumerate() {
            let text = part.trim();
            if text.is_empty() {
                continue;
            }
            tokens.push(Token {
                text: text.to_string(),
                normalized: normalize(text),
                x: bbox.min_x() as f32,
                y: bbox.min_y() as f32 + slice * index as f32,
                width: bbox.width() as f32,
                height: slice,
                span,
            });
        }
    }
    tokens
}
