// ============================================================
// Layer 2 — Convert Use Case
// ============================================================
// Imports the original PyTorch state dict once and writes it
// back out as a Burn record next to its architecture config,
// so later runs skip the PyTorch import entirely.
//
//   Step 1: Read architecture (JSON or built-in default)
//   Step 2: Load + topology-check the .pth    (Layer 6)
//   Step 3: Save model.mpk.gz + model_config.json

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::prelude::*;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::LeukemiaCvtConfig;

#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub weights:      PathBuf,
    pub out_dir:      PathBuf,
    pub model_config: Option<PathBuf>,
}

pub struct ConvertUseCase {
    config: ConvertConfig,
}

impl ConvertUseCase {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    /// Returns the path of the written weights file.
    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<PathBuf> {
        let model_cfg = match &self.config.model_config {
            Some(path) => CheckpointManager::read_config(path)?,
            None => LeukemiaCvtConfig::new(),
        };

        let model = CheckpointManager::load_model::<B>(&self.config.weights, &model_cfg, device)
            .with_context(|| format!("Cannot import '{}'", self.config.weights.display()))?;

        let out = CheckpointManager::new(&self.config.out_dir);
        out.save_model(&model, &model_cfg)?;

        Ok(out.weights_path())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{mode::Mode, stage::StageConfig};
    use burn::backend::NdArray;
    use std::path::Path;
    use tempfile::tempdir;

    type TestBackend = NdArray;

    #[test]
    fn test_converted_state_dict_reloads_identically() {
        let device = Default::default();
        let dir    = tempdir().unwrap();

        let tiny = LeukemiaCvtConfig::new()
            .with_stage1(StageConfig::new(3, 16, 3, 1, 1, 16))
            .with_stage2(StageConfig::new(16, 16, 3, 2, 1, 16))
            .with_stage3(StageConfig::new(16, 16, 3, 2, 1, 4));
        let tiny_path = dir.path().join("tiny.json");
        tiny.save(&tiny_path).unwrap();

        let weights = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/tiny_cvt.pt");
        let written = ConvertUseCase::new(ConvertConfig {
            weights:      weights.clone(),
            out_dir:      dir.path().join("converted"),
            model_config: Some(tiny_path),
        })
        .execute::<TestBackend>(&device)
        .unwrap();

        let ckpt      = CheckpointManager::new(dir.path().join("converted"));
        let stored    = ckpt.load_config().unwrap();
        let original  = CheckpointManager::load_model::<TestBackend>(&weights, &tiny, &device).unwrap();
        let converted = CheckpointManager::load_model::<TestBackend>(&written, &stored, &device).unwrap();

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        original
            .forward(x.clone(), Mode::Inference)
            .unwrap()
            .into_data()
            .assert_eq(&converted.forward(x, Mode::Inference).unwrap().into_data(), true);
    }
}
