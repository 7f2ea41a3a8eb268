// ============================================================
// Layer 2 — Classify Use Case
// ============================================================
// Startup + request flow for classifying image files:
//
//   Step 1: Create an empty ModelSlot     (Layer 6 - infra)
//   Step 2: Load config + weights         (Layer 6 - infra)
//           → any failure aborts startup
//   Step 3: Build the predictor           (Layer 5 - ml)
//   Step 4: Install it into the slot
//   Step 5: For each image: read bytes, classify through the
//           slot, collect the JSON-ready response
//
// The predictor is owned by this use case and handed out by
// reference; nothing is stored in a global.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::prelude::*;

use crate::data::preprocessor::PreprocessConfig;
use crate::domain::{prediction::PredictionResponse, traits::ImageClassifier};
use crate::infra::{checkpoint::CheckpointManager, readiness::ModelSlot};
use crate::ml::{inferencer::LeukemiaPredictor, model::LeukemiaCvtConfig};

/// Everything needed to bring up a predictor.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// .pth / .pt state dict or .mpk.gz record
    pub weights: PathBuf,

    /// Optional architecture JSON; defaults to the file next to
    /// the weights, then to the built-in architecture
    pub model_config: Option<PathBuf>,

    /// Optional preprocessing JSON; defaults to ImageNet stats
    pub preprocess_config: Option<PathBuf>,
}

pub struct ClassifyUseCase<B: Backend> {
    slot: ModelSlot<B>,
}

impl<B: Backend> ClassifyUseCase<B> {
    /// Load everything up front. Returns an error (and the caller
    /// should exit) if the parameters cannot be loaded.
    pub fn start(cfg: &ClassifyConfig, device: B::Device) -> Result<Self> {
        let slot = ModelSlot::empty();

        let model_cfg  = Self::model_config(cfg)?;
        let preprocess = match &cfg.preprocess_config {
            Some(path) => PreprocessConfig::load(path)
                .map_err(|e| anyhow::anyhow!("Cannot read preprocess config '{}': {e:?}", path.display()))?,
            None => PreprocessConfig::new(),
        };

        let model = CheckpointManager::load_model::<B>(&cfg.weights, &model_cfg, &device)
            .with_context(|| format!("Could not load model from '{}'", cfg.weights.display()))?;

        let predictor = LeukemiaPredictor::new(model, &model_cfg, preprocess, device)?;
        slot.install(predictor)?;

        Ok(Self { slot })
    }

    fn model_config(cfg: &ClassifyConfig) -> Result<LeukemiaCvtConfig> {
        if let Some(path) = &cfg.model_config {
            return Ok(CheckpointManager::read_config(path)?);
        }
        let dir = cfg.weights.parent().unwrap_or_else(|| Path::new("."));
        Ok(CheckpointManager::new(dir).load_config()?)
    }

    /// Classify one image file. File-system errors are reported
    /// inside the response, the same way decode errors are.
    pub fn classify_file(&self, path: &Path) -> Result<PredictionResponse> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cannot read '{}': {}", path.display(), e);
                return Ok(PredictionResponse::failure(format!(
                    "Image file not found at '{}': {e}",
                    path.display()
                )));
            }
        };

        tracing::info!("Classifying '{}' ({} bytes)", path.display(), bytes.len());
        Ok(self.slot.classify(&bytes)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::tests::encoded_image;
    use crate::ml::stage::StageConfig;
    use burn::backend::NdArray;
    use image::ImageFormat;
    use tempfile::{tempdir, TempDir};

    type TestBackend = NdArray;

    fn checkpoint_dir() -> TempDir {
        let dir    = tempdir().unwrap();
        let config = LeukemiaCvtConfig::new();
        let model  = config.init::<TestBackend>(&Default::default());
        CheckpointManager::new(dir.path()).save_model(&model, &config).unwrap();
        dir
    }

    fn config_for(dir: &Path) -> ClassifyConfig {
        ClassifyConfig {
            weights:           CheckpointManager::new(dir).weights_path(),
            model_config:      None,
            preprocess_config: None,
        }
    }

    #[test]
    fn test_missing_weights_abort_startup() {
        let cfg = ClassifyConfig {
            weights:           PathBuf::from("/nowhere/model_weights.pth"),
            model_config:      None,
            preprocess_config: None,
        };
        assert!(ClassifyUseCase::<TestBackend>::start(&cfg, Default::default()).is_err());
    }

    #[test]
    fn test_classifies_image_file() {
        let dir = checkpoint_dir();
        let uc  = ClassifyUseCase::<TestBackend>::start(&config_for(dir.path()), Default::default()).unwrap();

        let image = dir.path().join("cell.png");
        std::fs::write(&image, encoded_image(48, 48, [120, 40, 160], ImageFormat::Png)).unwrap();

        let resp = uc.classify_file(&image).unwrap();
        assert!(!resp.is_error());
    }

    #[test]
    fn test_unreadable_file_is_reported_in_body() {
        let dir  = checkpoint_dir();
        let uc   = ClassifyUseCase::<TestBackend>::start(&config_for(dir.path()), Default::default()).unwrap();
        let resp = uc.classify_file(&dir.path().join("nope.bmp")).unwrap();
        assert!(resp.is_error());
    }

    #[test]
    fn test_explicit_config_with_bad_heads_aborts_startup() {
        let dir  = checkpoint_dir();
        let bad  = dir.path().join("bad_config.json");
        LeukemiaCvtConfig::new()
            .with_stage3(StageConfig::new(96, 190, 3, 4, 1, 14))
            .save(&bad)
            .unwrap();

        let cfg = ClassifyConfig { model_config: Some(bad), ..config_for(dir.path()) };
        let err = ClassifyUseCase::<TestBackend>::start(&cfg, Default::default()).err().unwrap();
        assert!(format!("{err:#}").contains("num_heads"), "{err:#}");
    }

    /// Needs the pretrained weights plus one reference image per class:
    ///   LEUKEMIA_WEIGHTS=models/model_weights.pth
    ///   LEUKEMIA_HEALTHY_IMAGE=images/hem.bmp
    ///   LEUKEMIA_MALIGNANT_IMAGE=images/all.bmp
    #[test]
    #[ignore = "requires pretrained weights and reference images"]
    fn test_pretrained_reference_images() {
        let var = |name: &str| PathBuf::from(std::env::var(name).unwrap_or_else(|_| panic!("{name} not set")));
        let cfg = ClassifyConfig {
            weights:           var("LEUKEMIA_WEIGHTS"),
            model_config:      None,
            preprocess_config: None,
        };
        let uc = ClassifyUseCase::<TestBackend>::start(&cfg, Default::default()).unwrap();

        let healthy = uc.classify_file(&var("LEUKEMIA_HEALTHY_IMAGE")).unwrap();
        assert_eq!(healthy.result().unwrap().prediction, "Healthy");

        let malignant = uc.classify_file(&var("LEUKEMIA_MALIGNANT_IMAGE")).unwrap();
        assert_eq!(malignant.result().unwrap().prediction, "Leukemia");
    }
}
