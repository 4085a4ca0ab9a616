use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use ryoshu_core::Span;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backend::{OcrBackend, OcrError, PageLayout, StrategyRole};
use crate::fusion::{composite_score, mean_confidence, merge_spans, MergeRules};
use crate::preprocess::{OrientationCandidate, OrientationSummary};
use crate::types::Rotation;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("No text recognized in any of {orientations} orientation(s)")]
    NoSpans { orientations: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub primary_min_confidence: f32,
    pub baseline_min_confidence: f32,
    pub merge_distance_ratio: f32,
    pub merge_distance_pad: f32,
    /// Score multiplier for an orientation that produced no spans.
    pub empty_penalty: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            primary_min_confidence: 0.5,
            baseline_min_confidence: 0.6,
            merge_distance_ratio: 0.6,
            merge_distance_pad: 8.0,
            empty_penalty: 0.2,
        }
    }
}

impl RecognitionConfig {
    fn min_confidence(&self, role: StrategyRole) -> f32 {
        match role {
            StrategyRole::Primary => self.primary_min_confidence,
            StrategyRole::Baseline => self.baseline_min_confidence,
        }
    }

    fn merge_rules(&self) -> MergeRules {
        MergeRules {
            distance_ratio: self.merge_distance_ratio,
            distance_pad: self.merge_distance_pad,
        }
    }
}

/// What one backend contributed to one orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendScore {
    pub role: StrategyRole,
    /// Layout of the retained attempt; absent when every attempt failed.
    pub layout: Option<PageLayout>,
    pub span_count: usize,
    pub mean_confidence: f32,
}

/// An orientation together with the fused spans recognized on it.
#[derive(Debug, Clone)]
pub struct RecognitionCandidate {
    pub orientation: OrientationCandidate,
    pub spans: Vec<Span>,
    pub score: f32,
    pub backend_scores: BTreeMap<String, BackendScore>,
}

#[derive(Debug, Clone)]
pub struct RecognitionResult {
    pub best: RecognitionCandidate,
    /// Every prepared orientation, in preprocessing rank order.
    pub orientations: Vec<OrientationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionSummary {
    pub rotation: Rotation,
    pub angle: f32,
    pub score: f32,
    pub backend_scores: BTreeMap<String, BackendScore>,
    pub span_count: usize,
    pub orientations: Vec<OrientationSummary>,
}

impl RecognitionResult {
    pub fn spans(&self) -> &[Span] {
        &self.best.spans
    }

    pub fn summary(&self) -> RecognitionSummary {
        RecognitionSummary {
            rotation: self.best.orientation.rotation,
            angle: self.best.orientation.angle,
            score: self.best.score,
            backend_scores: self.best.backend_scores.clone(),
            span_count: self.best.spans.len(),
            orientations: self.orientations.clone(),
        }
    }
}

/// Runs the registered backends over every orientation and picks the best.
/// Backends are consulted in registration order, which is also their merge
/// priority.
#[derive(Clone, Default)]
pub struct Recognizer {
    config: RecognitionConfig,
    backends: Vec<Arc<dyn OcrBackend>>,
}

impl Recognizer {
    pub fn new(config: RecognitionConfig, backends: Vec<Arc<dyn OcrBackend>>) -> Self {
        Self { config, backends }
    }

    pub fn with_backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn recognize(
        &self,
        orientations: Vec<OrientationCandidate>,
    ) -> Result<RecognitionResult, RecognitionError> {
        let summaries: Vec<OrientationSummary> =
            orientations.iter().map(OrientationCandidate::summary).collect();
        let count = orientations.len();

        let candidates: Vec<RecognitionCandidate> = orientations
            .into_par_iter()
            .map(|orientation| self.recognize_orientation(orientation))
            .collect();

        if candidates.iter().all(|c| c.spans.is_empty()) {
            return Err(RecognitionError::NoSpans { orientations: count });
        }

        let best = select_best(candidates).ok_or(RecognitionError::NoSpans { orientations: count })?;
        Ok(RecognitionResult { best, orientations: summaries })
    }

    fn recognize_orientation(&self, orientation: OrientationCandidate) -> RecognitionCandidate {
        let mut sets: Vec<Vec<Span>> = Vec::with_capacity(self.backends.len());
        let mut backend_scores = BTreeMap::new();

        for backend in &self.backends {
            let (spans, score) = self.run_backend(backend.as_ref(), &orientation);
            backend_scores.insert(backend.name().to_string(), score);
            sets.push(spans);
        }

        let spans = merge_spans(sets.iter().map(Vec::as_slice), &self.config.merge_rules());
        let score = composite_score(orientation.quality.score, &spans, self.config.empty_penalty);
        debug!(
            rotation = orientation.rotation.degrees(),
            spans = spans.len(),
            score,
            "Orientation recognized"
        );
        RecognitionCandidate { orientation, spans, score, backend_scores }
    }

    /// Every layout the backend offers; the attempt with the highest mean
    /// confidence (after the role's confidence floor) is kept.
    fn run_backend(
        &self,
        backend: &dyn OcrBackend,
        orientation: &OrientationCandidate,
    ) -> (Vec<Span>, BackendScore) {
        let role = backend.role();
        let floor = self.config.min_confidence(role);
        let mut best: Option<(PageLayout, Vec<Span>, f32)> = None;

        for layout in backend.layouts() {
            let spans = match backend.detect(&orientation.image, layout) {
                Ok(spans) => spans,
                Err(OcrError::NotAvailable(reason)) => {
                    debug!(backend = backend.name(), %reason, "OCR backend unavailable");
                    break;
                }
                Err(e) => {
                    debug!(backend = backend.name(), ?layout, error = %e, "OCR backend failed");
                    continue;
                }
            };
            let spans: Vec<Span> = spans
                .into_iter()
                .filter(|s| s.confidence >= floor)
                .map(|s| if s.strategy.is_empty() { s.with_strategy(backend.name()) } else { s })
                .collect();
            let mean = mean_confidence(&spans);
            if best.as_ref().map_or(true, |(_, _, m)| mean > *m) {
                best = Some((layout, spans, mean));
            }
        }

        match best {
            Some((layout, spans, mean)) => {
                let score = BackendScore {
                    role,
                    layout: Some(layout),
                    span_count: spans.len(),
                    mean_confidence: mean,
                };
                (spans, score)
            }
            None => (
                Vec::new(),
                BackendScore { role, layout: None, span_count: 0, mean_confidence: 0.0 },
            ),
        }
    }
}

/// Highest score; ties go to the smaller deskew correction, then to the
/// earlier candidate.
fn select_best(candidates: Vec<RecognitionCandidate>) -> Option<RecognitionCandidate> {
    let mut best: Option<RecognitionCandidate> = None;
    for candidate in candidates {
        let better = match &best {
            None => true,
            Some(current) => {
                candidate.score > current.score
                    || (candidate.score == current.score
                        && candidate.orientation.angle.abs() < current.orientation.angle.abs())
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}
