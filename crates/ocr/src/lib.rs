//! Page images to recognized spans and extracted financial fields.

pub mod backend;
pub mod binarize;
pub mod config;
pub mod fusion;
pub mod geometry;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use backend::{default_backends, MockBackend, OcrBackend, OcrError, PageLayout, StrategyRole, TesseractConfig};
pub use config::{ConfigError, RyoshuConfig};
pub use fusion::{merge, merge_spans, MergeRules};
pub use hash::document_id;
pub use pipeline::{DocumentPipeline, DocumentRequest, DocumentResult, PipelineError};
pub use preprocess::{
    Binarization, ImageSource, OrientationCandidate, OrientationSummary, PrepareOptions,
    PreprocessConfig, PreprocessError, Preprocessor,
};
pub use recognizer::{
    RecognitionCandidate, RecognitionConfig, RecognitionError, RecognitionResult,
    RecognitionSummary, Recognizer,
};
pub use types::{DocumentKind, Rotation};
