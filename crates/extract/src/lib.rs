//! Field and amount extraction over recognized spans.
//!
//! Everything here is deterministic and geometry-aware: spans in, typed
//! financial fields out. Raw text (no geometry) goes through
//! [`AmountExtractor::extract_from_text`].

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod amounts;
pub mod fields;
pub mod keywords;
pub mod lines;
pub mod normalize;
pub mod number;
pub mod text;
pub mod tokens;

pub use amounts::{
    extract_amounts, AmountCandidate, AmountConfig, AmountDebug, AmountExtraction,
    AmountExtractor, ExtractionSource, KeywordRegion,
};
pub use fields::{extract_structured, LineItem, StructuredFields, Totals};
pub use keywords::AmountLabel;
pub use normalize::normalize;
pub use number::{scan_numbers, NumberMatch};
pub use text::extract_amounts_from_text;
pub use tokens::{tokenize, Token};
