// ============================================================
// Layer 5 — Predictor
// ============================================================
// Owns a loaded model and turns image bytes into a
// PredictionResponse:
//
//   bytes → ImagePreprocessor → [1, 3, 224, 224] tensor
//         → LeukemiaCvt (Mode::Inference) → logits [1, 2]
//         → softmax → argmax → { prediction, confidence,
//                                probabilities }
//
// `predict` never returns an Err: decode, shape and backend
// failures are folded into the response's error field so the
// caller has a single shape to inspect.

use burn::{
    prelude::*,
    tensor::{activation::softmax, TensorData},
};

use crate::data::preprocessor::{ImagePreprocessor, PreprocessConfig, PreprocessedImage};
use crate::domain::{
    error::{ClassifierError, ClassifierResult},
    prediction::{PredictionResponse, PredictionResult, CLASS_NAMES},
    traits::ImageClassifier,
};
use crate::ml::{
    mode::Mode,
    model::{LeukemiaCvt, LeukemiaCvtConfig},
};

pub struct LeukemiaPredictor<B: Backend> {
    model:        LeukemiaCvt<B>,
    preprocessor: ImagePreprocessor,
    labels:       [&'static str; 2],
    device:       B::Device,
}

impl<B: Backend> LeukemiaPredictor<B> {
    /// Wrap an already-loaded model.
    ///
    /// Fails if the preprocessing resolution does not fit every
    /// stage's attention window, so a misconfigured input size is
    /// caught once here instead of on every request.
    pub fn new(
        model:      LeukemiaCvt<B>,
        config:     &LeukemiaCvtConfig,
        preprocess: PreprocessConfig,
        device:     B::Device,
    ) -> ClassifierResult<Self> {
        if config.num_classes != CLASS_NAMES.len() {
            return Err(ClassifierError::Inference(format!(
                "model has {} classes but {} labels are known",
                config.num_classes,
                CLASS_NAMES.len()
            )));
        }

        let size = preprocess.image_size as usize;
        let grids = config.check_resolution(size, size)?;
        tracing::debug!(
            "Token grids at {}px: {:?}",
            size,
            grids.map(|g| (g.height, g.width))
        );

        Ok(Self {
            model,
            preprocessor: ImagePreprocessor::new(preprocess),
            labels: CLASS_NAMES,
            device,
        })
    }

    /// Classify encoded image bytes. Never propagates an error.
    pub fn predict(&self, image_bytes: &[u8]) -> PredictionResponse {
        match self.try_predict(image_bytes) {
            Ok(result) => {
                tracing::debug!(
                    "Predicted '{}' (confidence {:.4})",
                    result.prediction,
                    result.confidence
                );
                PredictionResponse::Success(result)
            }
            Err(e) => {
                tracing::warn!("Prediction failed: {}", e);
                PredictionResponse::failure(format!("Error during prediction: {e}"))
            }
        }
    }

    /// The fallible pipeline behind `predict`.
    pub fn try_predict(&self, image_bytes: &[u8]) -> ClassifierResult<PredictionResult> {
        let image = self.preprocessor.preprocess(image_bytes)?;
        let probs = self.probabilities(&image)?;

        PredictionResult::from_probabilities(&self.labels, &probs).ok_or_else(|| {
            ClassifierError::Inference(format!(
                "expected {} probabilities, got {}",
                self.labels.len(),
                probs.len()
            ))
        })
    }

    /// Softmax over the logits of one preprocessed image.
    pub fn probabilities(&self, image: &PreprocessedImage) -> ClassifierResult<Vec<f32>> {
        let input = Tensor::<B, 4>::from_data(
            TensorData::new(image.data.clone(), image.shape()),
            &self.device,
        );

        let logits = self.model.forward(input, Mode::Inference)?;
        let probs  = softmax(logits, 1);

        probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("cannot read probabilities: {e:?}")))
    }
}

impl<B: Backend> ImageClassifier for LeukemiaPredictor<B> {
    fn classify(&self, image_bytes: &[u8]) -> ClassifierResult<PredictionResponse> {
        Ok(self.predict(image_bytes))
    }

    fn labels(&self) -> &[&'static str] {
        &self.labels
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::tests::encoded_image;
    use burn::backend::NdArray;
    use image::ImageFormat;

    type TestBackend = NdArray;

    fn predictor() -> LeukemiaPredictor<TestBackend> {
        let device = Default::default();
        let config = LeukemiaCvtConfig::new();
        let model  = config.init::<TestBackend>(&device);
        LeukemiaPredictor::new(model, &config, PreprocessConfig::new(), device).unwrap()
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let p     = predictor();
        let bytes = encoded_image(64, 48, [180, 60, 200], ImageFormat::Png);

        let resp  = p.predict(&bytes);
        let r     = resp.result().expect("valid image should classify");
        let total: f32 = r.probabilities.values().sum();

        assert!((total - 1.0).abs() < 1e-5, "sum = {total}");
        assert_eq!(r.confidence, r.probabilities[&r.prediction]);
        assert!((0.0..=1.0).contains(&r.confidence));
        assert_eq!(r.probabilities.len(), 2);
    }

    #[test]
    fn test_repeat_calls_are_identical() {
        let p     = predictor();
        let bytes = encoded_image(32, 32, [90, 10, 140], ImageFormat::Bmp);
        assert_eq!(p.predict(&bytes), p.predict(&bytes));
    }

    #[test]
    fn test_garbage_bytes_become_error_field() {
        let p    = predictor();
        let resp = p.predict(b"\x00\x01not an image at all");

        assert!(resp.is_error());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert!(json["error"].as_str().unwrap().starts_with("Error during prediction"));
    }

    #[test]
    fn test_incompatible_resolution_rejected_at_construction() {
        let device = Default::default();
        let config = LeukemiaCvtConfig::new();
        let model  = config.init::<TestBackend>(&device);
        let result = LeukemiaPredictor::new(
            model,
            &config,
            PreprocessConfig::new().with_image_size(100),
            device,
        );
        assert!(matches!(result, Err(ClassifierError::Shape { .. })));
    }

    #[test]
    fn test_classifier_trait_reports_labels() {
        let p = predictor();
        assert_eq!(p.labels(), &["Healthy", "Leukemia"]);
    }
}
