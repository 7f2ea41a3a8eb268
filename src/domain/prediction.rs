// ============================================================
// Layer 3 — Prediction Domain Types
// ============================================================
// The class labels the classification head was trained on,
// and the structured value handed back to the caller for
// every inference call.
//
// JSON shape on success:
//   {
//     "prediction":    "Leukemia",
//     "confidence":    0.93,
//     "probabilities": { "Healthy": 0.07, "Leukemia": 0.93 }
//   }
//
// JSON shape on failure:
//   { "error": "Error during prediction: ..." }
//
// Reference: Rust Book §6 (Enums), serde untagged enums

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Class labels in the order of the classification head outputs.
/// Index 0 = Healthy (HEM), index 1 = Leukemia (ALL).
pub const CLASS_NAMES: [&str; 2] = ["Healthy", "Leukemia"];

/// A successful classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Label with the highest probability
    pub prediction: String,

    /// Probability of `prediction`, always in [0, 1]
    pub confidence: f32,

    /// Probability for every known label
    pub probabilities: BTreeMap<String, f32>,
}

impl PredictionResult {
    /// Build a result from a probability vector aligned with `labels`.
    /// Returns None when the vector is empty or lengths differ.
    pub fn from_probabilities(labels: &[&str], probs: &[f32]) -> Option<Self> {
        if probs.is_empty() || probs.len() != labels.len() {
            return None;
        }

        // First maximum wins on ties, matching argmax semantics.
        let mut best = 0;
        for (i, &p) in probs.iter().enumerate().skip(1) {
            if p > probs[best] {
                best = i;
            }
        }

        let probabilities = labels
            .iter()
            .zip(probs)
            .map(|(name, &p)| (name.to_string(), p))
            .collect();

        Some(Self {
            prediction: labels[best].to_string(),
            confidence: probs[best],
            probabilities,
        })
    }
}

/// What the predictor returns: either a result or an error message.
/// Callers must check for the error variant before using the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success(PredictionResult),
    Failure { error: String },
}

impl PredictionResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure { error: error.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            Self::Success(r) => Some(r),
            Self::Failure { .. } => None,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_picks_highest_label() {
        let r = PredictionResult::from_probabilities(&CLASS_NAMES, &[0.2, 0.8]).unwrap();
        assert_eq!(r.prediction, "Leukemia");
        assert_eq!(r.confidence, r.probabilities["Leukemia"]);
    }

    #[test]
    fn test_tie_goes_to_first_label() {
        let r = PredictionResult::from_probabilities(&CLASS_NAMES, &[0.5, 0.5]).unwrap();
        assert_eq!(r.prediction, "Healthy");
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        assert!(PredictionResult::from_probabilities(&CLASS_NAMES, &[1.0]).is_none());
        assert!(PredictionResult::from_probabilities(&CLASS_NAMES, &[]).is_none());
    }

    #[test]
    fn test_failure_serialises_to_error_key_only() {
        let resp = PredictionResponse::failure("bad bytes");
        let json: serde_json::Value = serde_json::to_value(&resp).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["error"], "bad bytes");
    }

    #[test]
    fn test_success_serialises_flat() {
        let r = PredictionResult::from_probabilities(&CLASS_NAMES, &[0.9, 0.1]).unwrap();
        let json = serde_json::to_value(PredictionResponse::Success(r)).unwrap();
        assert_eq!(json["prediction"], "Healthy");
        assert!(json.get("error").is_none());
        assert!(json["probabilities"].get("Leukemia").is_some());
    }
}
