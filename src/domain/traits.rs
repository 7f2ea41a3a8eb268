// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to the classifier through this
// trait only, so it never needs to know which burn backend or
// which parameter file sits behind it.
//
// Implementations:
//   - LeukemiaPredictor<B> → the CvT network on backend B
//   - ModelSlot<B>         → gates a predictor behind a
//                            "loaded yet?" check
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::ClassifierResult;
use crate::domain::prediction::PredictionResponse;

/// Anything that can classify an encoded blood-cell image.
pub trait ImageClassifier {
    /// Classify raw image bytes.
    ///
    /// Decode and inference failures are reported inside the
    /// response. The outer Result is reserved for readiness
    /// failures that must not be downgraded to a response.
    fn classify(&self, image_bytes: &[u8]) -> ClassifierResult<PredictionResponse>;

    /// Labels in head output order.
    fn labels(&self) -> &[&'static str];
}
