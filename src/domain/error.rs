// ============================================================
// Layer 3 — Classifier Error Taxonomy
// ============================================================
// Every failure the classification core can report.
//
//   Decode    — bytes are not a BMP / JPEG / PNG image
//   Shape     — a stage received a token count that its
//               attention window does not divide
//   Load      — parameter file missing, unreadable, or
//               built for a different topology
//   NotReady  — inference requested before parameters loaded
//   Inference — anything else raised during the forward pass
//
// Decode / Shape / Inference are folded into the `error`
// field of a PredictionResponse at the predictor boundary.
// Load and NotReady are surfaced to the caller as-is.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)

use thiserror::Error;

/// Errors raised by the classification core.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Input bytes could not be decoded as a supported image.
    #[error("Cannot decode image: {reason}")]
    Decode {
        reason: String,
    },

    /// Token count is not an exact multiple of the attention window.
    #[error("Input sequence length N ({tokens}) must be divisible by window_size ({window_size})")]
    Shape {
        tokens:      usize,
        window_size: usize,
    },

    /// Parameters could not be loaded into the model.
    #[error("Cannot load model parameters from '{path}': {reason}")]
    Load {
        path:   String,
        reason: String,
    },

    /// The model has not finished loading.
    #[error("Model not loaded yet. Please try again in a moment.")]
    NotReady,

    /// Any other failure during the forward pass.
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl ClassifierError {
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode { reason: reason.into() }
    }

    pub fn shape(tokens: usize, window_size: usize) -> Self {
        Self::Shape { tokens, window_size }
    }

    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load { path: path.into(), reason: reason.into() }
    }
}

/// Result alias used throughout the core.
pub type ClassifierResult<T> = Result<T, ClassifierError>;
