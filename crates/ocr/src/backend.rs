use std::sync::Arc;

use image::GrayImage;
use ryoshu_core::{Quad, Span};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    NotAvailable(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Failed to encode page for OCR: {0}")]
    ImageEncode(String),
}

/// How a backend's spans are filtered and which layouts it tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyRole {
    Primary,
    Baseline,
}

/// Page-segmentation hint passed to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLayout {
    Auto,
    SingleBlock,
    SingleLine,
    SparseText,
}

impl PageLayout {
    /// Tesseract page-segmentation mode.
    pub fn psm(self) -> u8 {
        match self {
            PageLayout::Auto => 3,
            PageLayout::SingleBlock => 6,
            PageLayout::SingleLine => 7,
            PageLayout::SparseText => 11,
        }
    }
}

/// Abstraction over an OCR engine. Implementations take a binary page
/// (ink 0, paper 255) and return positioned text spans.
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> StrategyRole;

    /// Layouts to attempt, in order.
    fn layouts(&self) -> Vec<PageLayout> {
        match self.role() {
            StrategyRole::Primary => vec![PageLayout::Auto],
            StrategyRole::Baseline => vec![PageLayout::SingleBlock, PageLayout::SingleLine],
        }
    }

    fn detect(&self, page: &GrayImage, layout: PageLayout) -> Result<Vec<Span>, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

type DetectFn = dyn Fn(&GrayImage, PageLayout) -> Vec<Span> + Send + Sync;

enum MockOutput {
    Fixed(Vec<Span>),
    Computed(Box<DetectFn>),
    Unavailable,
}

/// Backend without an engine: returns preset spans, or spans computed from
/// the page by a closure. Also stands in for callers that already hold
/// recognizer output.
pub struct MockBackend {
    name: String,
    role: StrategyRole,
    output: MockOutput,
}

impl MockBackend {
    pub fn new(name: impl Into<String>, role: StrategyRole, spans: Vec<Span>) -> Self {
        Self { name: name.into(), role, output: MockOutput::Fixed(spans) }
    }

    pub fn from_fn(
        name: impl Into<String>,
        role: StrategyRole,
        detect: impl Fn(&GrayImage, PageLayout) -> Vec<Span> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), role, output: MockOutput::Computed(Box::new(detect)) }
    }

    /// A backend whose engine is missing.
    pub fn unavailable(name: impl Into<String>, role: StrategyRole) -> Self {
        Self { name: name.into(), role, output: MockOutput::Unavailable }
    }
}

impl OcrBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> StrategyRole {
        self.role
    }

    fn detect(&self, page: &GrayImage, layout: PageLayout) -> Result<Vec<Span>, OcrError> {
        match &self.output {
            MockOutput::Fixed(spans) => Ok(spans.clone()),
            MockOutput::Computed(detect) => Ok(detect(page, layout)),
            MockOutput::Unavailable => Err(OcrError::NotAvailable(self.name.clone())),
        }
    }
}

/// Word-level spans from Tesseract TSV output. Rows below word level, rows
/// with negative confidence and blank words are skipped; confidence is
/// rescaled from 0–100.
pub fn spans_from_tsv(tsv: &str, strategy: &str) -> Vec<Span> {
    tsv.lines()
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let text = cols[11].trim();
            let confidence: f32 = cols[10].trim().parse().ok()?;
            if text.is_empty() || confidence < 0.0 {
                return None;
            }
            let rect: Vec<i32> = cols[6..10].iter().filter_map(|c| c.trim().parse().ok()).collect();
            let [left, top, width, height] = rect[..] else {
                return None;
            };
            Some(
                Span::new(text, confidence / 100.0, Quad::from_rect(left, top, width, height))
                    .with_strategy(strategy),
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub data_path: Option<String>,
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self { data_path: None, language: "jpn+eng".to_string() }
    }
}

/// Engine backends compiled into this build, in priority order. Empty
/// without the `tesseract` feature.
pub fn default_backends(config: &TesseractConfig) -> Vec<Arc<dyn OcrBackend>> {
    #[cfg(feature = "tesseract")]
    {
        use tesseract_backend::TesseractBackend;
        vec![
            Arc::new(TesseractBackend::new(StrategyRole::Primary, config.clone())) as Arc<dyn OcrBackend>,
            Arc::new(TesseractBackend::new(StrategyRole::Baseline, config.clone())),
        ]
    }
    #[cfg(not(feature = "tesseract"))]
    {
        let _ = config;
        Vec::new()
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageFormat};
    use leptess::{LepTess, Variable};
    use ryoshu_core::Span;

    use super::{spans_from_tsv, OcrBackend, OcrError, PageLayout, StrategyRole, TesseractConfig};

    const SOURCE_DPI: i32 = 300;

    pub struct TesseractBackend {
        name: String,
        role: StrategyRole,
        config: TesseractConfig,
    }

    impl TesseractBackend {
        pub fn new(role: StrategyRole, config: TesseractConfig) -> Self {
            let name = match role {
                StrategyRole::Primary => "tesseract",
                StrategyRole::Baseline => "tesseract-baseline",
            };
            Self { name: name.to_string(), role, config }
        }
    }

    impl OcrBackend for TesseractBackend {
        fn name(&self) -> &str {
            &self.name
        }

        fn role(&self) -> StrategyRole {
            self.role
        }

        fn detect(&self, page: &GrayImage, layout: PageLayout) -> Result<Vec<Span>, OcrError> {
            let mut png = Vec::new();
            DynamicImage::ImageLuma8(page.clone())
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| OcrError::ImageEncode(e.to_string()))?;

            let mut lt = LepTess::new(self.config.data_path.as_deref(), &self.config.language)
                .map_err(|e| OcrError::NotAvailable(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, &layout.psm().to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_source_resolution(SOURCE_DPI);
            let tsv = lt.get_tsv_text(0).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(spans_from_tsv(&tsv, &self.name))
        }
    }
}
