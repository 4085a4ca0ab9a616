pub mod money;
pub mod span;

pub use money::{Yen, YenParseError};
pub use span::{Point, Quad, Span};
