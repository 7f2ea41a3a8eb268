// ============================================================
// Layer 6 — Model Slot (readiness gate)
// ============================================================
// A handle the front end holds from process start. It stays
// empty until the parameters finish loading; any request that
// arrives earlier is rejected with ClassifierError::NotReady
// instead of being queued.
//
// The slot is filled exactly once. After that the predictor is
// only ever borrowed immutably, so concurrent callers need no
// locking beyond the one-time initialisation.

use std::sync::OnceLock;

use burn::prelude::*;

use crate::domain::{
    error::{ClassifierError, ClassifierResult},
    prediction::{PredictionResponse, CLASS_NAMES},
    traits::ImageClassifier,
};
use crate::ml::inferencer::LeukemiaPredictor;

pub struct ModelSlot<B: Backend> {
    predictor: OnceLock<LeukemiaPredictor<B>>,
}

impl<B: Backend> ModelSlot<B> {
    pub fn empty() -> Self {
        Self { predictor: OnceLock::new() }
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.get().is_some()
    }

    /// Install the loaded predictor. A second install is refused.
    pub fn install(&self, predictor: LeukemiaPredictor<B>) -> ClassifierResult<()> {
        self.predictor.set(predictor).map_err(|_| {
            ClassifierError::load("<model slot>", "a model is already installed")
        })?;
        tracing::info!("Model loaded successfully!");
        Ok(())
    }

    /// Borrow the predictor, or NotReady while loading.
    pub fn get(&self) -> ClassifierResult<&LeukemiaPredictor<B>> {
        self.predictor.get().ok_or(ClassifierError::NotReady)
    }
}

impl<B: Backend> Default for ModelSlot<B> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<B: Backend> ImageClassifier for ModelSlot<B> {
    fn classify(&self, image_bytes: &[u8]) -> ClassifierResult<PredictionResponse> {
        Ok(self.get()?.predict(image_bytes))
    }

    fn labels(&self) -> &[&'static str] {
        &CLASS_NAMES
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::{tests::encoded_image, PreprocessConfig};
    use crate::ml::model::LeukemiaCvtConfig;
    use burn::backend::NdArray;
    use image::ImageFormat;

    type TestBackend = NdArray;

    fn loaded_predictor() -> LeukemiaPredictor<TestBackend> {
        let device = Default::default();
        let config = LeukemiaCvtConfig::new();
        let model  = config.init::<TestBackend>(&device);
        LeukemiaPredictor::new(model, &config, PreprocessConfig::new(), device).unwrap()
    }

    #[test]
    fn test_empty_slot_rejects_with_not_ready() {
        let slot  = ModelSlot::<TestBackend>::empty();
        let bytes = encoded_image(8, 8, [0, 0, 0], ImageFormat::Png);

        assert!(!slot.is_ready());
        assert!(matches!(slot.classify(&bytes), Err(ClassifierError::NotReady)));
    }

    #[test]
    fn test_installed_slot_classifies() {
        let slot = ModelSlot::<TestBackend>::empty();
        slot.install(loaded_predictor()).unwrap();
        assert!(slot.is_ready());

        let bytes = encoded_image(8, 8, [200, 100, 50], ImageFormat::Jpeg);
        let resp  = slot.classify(&bytes).unwrap();
        assert!(!resp.is_error());
    }

    #[test]
    fn test_second_install_is_refused() {
        let slot = ModelSlot::<TestBackend>::empty();
        slot.install(loaded_predictor()).unwrap();
        assert!(matches!(slot.install(loaded_predictor()), Err(ClassifierError::Load { .. })));
    }

    #[test]
    fn test_installed_slot_still_reports_bad_bytes_in_body() {
        let slot = ModelSlot::<TestBackend>::empty();
        slot.install(loaded_predictor()).unwrap();
        let resp = slot.classify(b"GIF89a-not-supported").unwrap();
        assert!(resp.is_error());
    }
}
