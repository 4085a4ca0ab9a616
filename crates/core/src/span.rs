use serde::{Deserialize, Serialize};

/// Integer pixel coordinate. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Point { x, y }
    }
}

impl From<Point> for [i32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Four ordered corners (top-left, top-right, bottom-right, bottom-left for
/// axis-aligned boxes; recognizers may emit rotated quads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn from_rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        Quad([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn min_x(&self) -> i32 {
        self.0.iter().map(|p| p.x).min().unwrap_or(0)
    }

    pub fn max_x(&self) -> i32 {
        self.0.iter().map(|p| p.x).max().unwrap_or(0)
    }

    pub fn min_y(&self) -> i32 {
        self.0.iter().map(|p| p.y).min().unwrap_or(0)
    }

    pub fn max_y(&self) -> i32 {
        self.0.iter().map(|p| p.y).max().unwrap_or(0)
    }

    pub fn width(&self) -> i32 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> i32 {
        self.max_y() - self.min_y()
    }

    /// Center of the axis-aligned bounding box.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x() + self.max_x()) as f32 / 2.0,
            (self.min_y() + self.max_y()) as f32 / 2.0,
        )
    }

    /// Mean of the four corner y-coordinates; the vertical key used for line grouping.
    pub fn mean_y(&self) -> f32 {
        self.0.iter().map(|p| p.y as f32).sum::<f32>() / 4.0
    }

    pub fn max_dimension(&self) -> i32 {
        self.width().max(self.height())
    }
}

/// One recognized text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    /// Recognizer confidence (0.0–1.0).
    pub confidence: f32,
    pub bbox: Quad,
    /// Name of the recognition backend that produced the retained box.
    #[serde(default)]
    pub strategy: String,
}

impl Span {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: Quad) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
            strategy: String::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Euclidean distance between the two boxes' centers.
    pub fn center_distance(&self, other: &Span) -> f32 {
        let (ax, ay) = self.bbox.center();
        let (bx, by) = other.bbox.center();
        (ax - bx).hypot(ay - by)
    }
}
