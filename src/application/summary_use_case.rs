// ============================================================
// Layer 2 — Summary Use Case
// ============================================================
// Self-check of the architecture without any weights:
// builds a randomly initialised model, reports each stage's
// grid and window fit for the requested resolution, and runs
// one dummy forward pass to confirm the logits shape.

use anyhow::Result;
use burn::{prelude::*, tensor::Distribution};

use crate::ml::{mode::Mode, model::LeukemiaCvtConfig};

/// One row of the stage table.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub index:       usize,
    pub channels:    (usize, usize),
    pub grid:        (usize, usize),
    pub tokens:      usize,
    pub window_size: usize,
}

#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub stages:       Vec<StageSummary>,
    pub num_params:   usize,
    pub logits_shape: [usize; 2],
}

pub struct SummaryUseCase {
    config:     LeukemiaCvtConfig,
    image_size: usize,
}

impl SummaryUseCase {
    pub fn new(config: LeukemiaCvtConfig, image_size: usize) -> Self {
        Self { config, image_size }
    }

    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<ModelSummary> {
        let grids = self.config.check_resolution(self.image_size, self.image_size)?;

        let stages = self
            .config
            .stages()
            .into_iter()
            .zip(grids)
            .enumerate()
            .map(|(i, (stage, grid))| StageSummary {
                index:       i + 1,
                channels:    (stage.in_channels, stage.out_channels),
                grid:        (grid.height, grid.width),
                tokens:      grid.tokens(),
                window_size: stage.window_size,
            })
            .collect();

        let model = self.config.init::<B>(device);
        let input = Tensor::<B, 4>::random(
            [1, 3, self.image_size, self.image_size],
            Distribution::Normal(0.0, 1.0),
            device,
        );
        let logits = model.forward(input, Mode::Inference)?;

        Ok(ModelSummary {
            stages,
            num_params: model.num_params(),
            logits_shape: logits.dims(),
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_summary_of_default_model() {
        let summary = SummaryUseCase::new(LeukemiaCvtConfig::new(), 224)
            .execute::<NdArray>(&Default::default())
            .unwrap();

        assert_eq!(summary.logits_shape, [1, 2]);
        assert_eq!(summary.stages.len(), 3);
        assert_eq!(summary.stages[2].grid, (28, 28));
        assert_eq!(summary.stages[2].channels, (96, 192));
        assert!(summary.num_params > 0);
    }

    #[test]
    fn test_summary_rejects_bad_resolution() {
        let result = SummaryUseCase::new(LeukemiaCvtConfig::new(), 100).execute::<NdArray>(&Default::default());
        assert!(result.is_err());
    }
}
