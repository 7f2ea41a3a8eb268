use burn::{
    nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::domain::error::ClassifierResult;
use crate::ml::{
    embedding::TokenGrid,
    mode::Mode,
    stage::{Stage, StageConfig},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct LeukemiaCvtConfig {
    #[config(default = 2)]
    pub num_classes: usize,
    #[config(default = "StageConfig::new(3, 32, 7, 1, 3, 32)")]
    pub stage1: StageConfig,
    #[config(default = "StageConfig::new(32, 96, 3, 2, 1, 32)")]
    pub stage2: StageConfig,
    #[config(default = "StageConfig::new(96, 192, 3, 4, 1, 14)")]
    pub stage3: StageConfig,
}

impl LeukemiaCvtConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LeukemiaCvt<B> {
        let width = self.stage3.out_channels;
        LeukemiaCvt {
            stage1: self.stage1.init(device),
            stage2: self.stage2.init(device),
            stage3: self.stage3.init(device),
            head: ClassificationHead {
                norm: LayerNormConfig::new(width).init(device),
                fc:   LinearConfig::new(width, self.num_classes).init(device),
            },
        }
    }

    /// Check every stage and that consecutive stages agree on width.
    pub fn validate(&self) -> Result<(), String> {
        if self.num_classes == 0 {
            return Err("num_classes must be positive".to_string());
        }
        if self.stage1.in_channels != 3 {
            return Err(format!("stage1 expects 3 input channels, got {}", self.stage1.in_channels));
        }
        for (i, stage) in self.stages().into_iter().enumerate() {
            stage.validate().map_err(|e| format!("stage{}: {e}", i + 1))?;
        }
        for (i, pair) in self.stages().windows(2).enumerate() {
            if pair[0].out_channels != pair[1].in_channels {
                return Err(format!(
                    "stage{} outputs {} channels but stage{} expects {}",
                    i + 1,
                    pair[0].out_channels,
                    i + 2,
                    pair[1].in_channels
                ));
            }
        }
        Ok(())
    }

    pub fn stages(&self) -> [&StageConfig; 3] {
        [&self.stage1, &self.stage2, &self.stage3]
    }

    /// Walk an input resolution through every stage and fail with
    /// the first token count its attention window cannot divide.
    /// Returns the grid of each stage on success.
    pub fn check_resolution(&self, height: usize, width: usize) -> ClassifierResult<[TokenGrid; 3]> {
        let mut grids = [TokenGrid { height, width }; 3];
        let (mut h, mut w) = (height, width);
        for (i, stage) in self.stages().into_iter().enumerate() {
            let grid = stage.output_grid(h, w);
            stage.check_grid(grid)?;
            grids[i] = grid;
            (h, w) = (grid.height, grid.width);
        }
        Ok(grids)
    }
}

/// LayerNorm followed by a single linear projection to class logits.
#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    pub norm: LayerNorm<B>,
    pub fc:   Linear<B>,
}

impl<B: Backend> ClassificationHead<B> {
    /// pooled: [batch, C] → logits: [batch, num_classes]
    pub fn forward(&self, pooled: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc.forward(self.norm.forward(pooled))
    }
}

/// Three-stage convolutional transformer with a classification head.
#[derive(Module, Debug)]
pub struct LeukemiaCvt<B: Backend> {
    pub stage1: Stage<B>,
    pub stage2: Stage<B>,
    pub stage3: Stage<B>,
    pub head:   ClassificationHead<B>,
}

impl<B: Backend> LeukemiaCvt<B> {
    /// images: [batch, 3, H, W] → pooled features: [batch, C3]
    pub fn features(&self, images: Tensor<B, 4>, mode: Mode) -> ClassifierResult<Tensor<B, 2>> {
        let x = self.stage1.forward(images, mode)?;
        let x = self.stage2.forward(x, mode)?;
        let x = self.stage3.forward(x, mode)?;

        // Global average pool over the remaining spatial positions.
        let [b, c, _, _] = x.dims();
        Ok(x.mean_dim(3).mean_dim(2).reshape([b, c]))
    }

    /// images: [batch, 3, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> ClassifierResult<Tensor<B, 2>> {
        let pooled = self.features(images, mode)?;
        Ok(self.head.forward(pooled))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ClassifierError;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    #[test]
    fn test_default_resolution_fits_every_window() {
        let grids = LeukemiaCvtConfig::new().check_resolution(224, 224).unwrap();
        assert_eq!(grids[0].tokens(), 50176);
        assert_eq!(grids[1].tokens(), 12544);
        assert_eq!(grids[2].tokens(), 784);
    }

    #[test]
    fn test_bad_resolution_names_offending_stage() {
        // 100×100 → 10000 tokens at stage 1, not a multiple of 32.
        let err = LeukemiaCvtConfig::new().check_resolution(100, 100).unwrap_err();
        assert!(matches!(err, ClassifierError::Shape { tokens: 10000, window_size: 32 }));
    }

    #[test]
    fn test_224_input_yields_two_logits() {
        let device = Default::default();
        let model  = LeukemiaCvtConfig::new().init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 4>::random([1, 3, 224, 224], Distribution::Normal(0.0, 1.0), &device);

        let logits = model.forward(x, Mode::Inference).unwrap();
        assert_eq!(logits.dims(), [1, 2]);
    }

    #[test]
    fn test_forward_surfaces_shape_error() {
        let device = Default::default();
        let model  = LeukemiaCvtConfig::new().init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 4>::zeros([1, 3, 20, 20], &device);
        assert!(matches!(
            model.forward(x, Mode::Inference),
            Err(ClassifierError::Shape { tokens: 400, window_size: 32 })
        ));
    }

    #[test]
    fn test_validate_catches_channel_chain_breaks() {
        assert!(LeukemiaCvtConfig::new().validate().is_ok());

        let broken = LeukemiaCvtConfig::new().with_stage2(StageConfig::new(16, 96, 3, 2, 1, 32));
        let err = broken.validate().unwrap_err();
        assert!(err.contains("stage1 outputs 32"), "{err}");

        let odd_heads = LeukemiaCvtConfig::new().with_stage3(StageConfig::new(96, 190, 3, 4, 1, 14));
        assert!(odd_heads.validate().unwrap_err().starts_with("stage3"));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let cfg  = LeukemiaCvtConfig::new();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: LeukemiaCvtConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stage3.window_size, 14);
        assert_eq!(back.stage2.stride, 2);
        assert_eq!(back.num_classes, 2);
    }
}
