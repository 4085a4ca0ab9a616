use std::path::Path;
use std::sync::Arc;

use ryoshu_core::Span;
use ryoshu_extract::{extract_structured, AmountExtraction, AmountExtractor, StructuredFields};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::backend::OcrBackend;
use crate::config::RyoshuConfig;
use crate::hash::document_id;
use crate::preprocess::{ImageSource, PrepareOptions, PreprocessError, Preprocessor};
use crate::recognizer::{RecognitionError, RecognitionSummary, Recognizer};
use crate::types::{DocumentKind, Rotation};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Text recognition failed: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("Pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentRequest {
    pub enhance: bool,
    /// Empty means all four.
    pub rotations: Vec<Rotation>,
    pub kind: DocumentKind,
}

/// Everything learned about one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// SHA-256 hex digest of the source bytes.
    pub document_id: String,
    pub kind: DocumentKind,
    pub recognition: RecognitionSummary,
    pub spans: Vec<Span>,
    pub amounts: AmountExtraction,
    pub fields: StructuredFields,
    pub needs_review: bool,
}

struct PipelineInner {
    preprocessor: Preprocessor,
    recognizer: Recognizer,
    amounts: AmountExtractor,
}

/// Orchestrates: hash → preprocess → recognize → amounts + fields.
///
/// Cheap to clone; build once at startup and share.
#[derive(Clone)]
pub struct DocumentPipeline {
    inner: Arc<PipelineInner>,
}

impl DocumentPipeline {
    pub fn new(config: &RyoshuConfig, backends: Vec<Arc<dyn OcrBackend>>) -> Self {
        let inner = PipelineInner {
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            recognizer: Recognizer::new(config.recognition.clone(), backends),
            amounts: AmountExtractor::new(config.amounts.clone()),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Process a file on disk.
    pub async fn process_file(
        &self,
        path: &Path,
        request: DocumentRequest,
    ) -> Result<DocumentResult, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        self.process_bytes(bytes, request).await
    }

    /// Process raw image bytes on the blocking pool.
    pub async fn process_bytes(
        &self,
        bytes: Vec<u8>,
        request: DocumentRequest,
    ) -> Result<DocumentResult, PipelineError> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.run(&bytes, &request)).await?
    }

    /// Synchronous run for callers without a runtime.
    pub fn run(&self, bytes: &[u8], request: &DocumentRequest) -> Result<DocumentResult, PipelineError> {
        let inner = &self.inner;

        // 1. Hash for content addressing.
        let document_id = document_id(bytes);
        info!(%document_id, kind = %request.kind, enhance = request.enhance, "Processing document");

        // 2. Preprocess into one binary page per rotation.
        let options = PrepareOptions { enhance: request.enhance, rotations: request.rotations.clone() };
        let orientations = inner.preprocessor.prepare(ImageSource::Bytes(bytes), &options)?;

        // 3. Run OCR on every orientation and keep the winner.
        let recognition = inner.recognizer.recognize(orientations)?;

        // 4. Extract amounts and structured fields.
        let spans = recognition.spans().to_vec();
        let amounts = inner.amounts.extract(&spans);
        let fields = extract_structured(&spans);

        // 5. Flag for review.
        let needs_review = amounts.needs_review(inner.amounts.config().review_threshold);
        let recognition = recognition.summary();

        info!(
            %document_id,
            rotation = recognition.rotation.degrees(),
            spans = spans.len(),
            total = ?amounts.total,
            needs_review,
            "Document processed"
        );

        Ok(DocumentResult {
            document_id,
            kind: request.kind,
            recognition,
            spans,
            amounts,
            fields,
            needs_review,
        })
    }
}
