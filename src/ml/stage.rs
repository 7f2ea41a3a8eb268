// ============================================================
// Layer 5 — Stage
// ============================================================
// One full spatial → spatial step of the backbone:
//
//   [B, Cin, H, W]
//     → TokenEmbedding      [B, N, Cout] + grid (H', W')
//     → TransformerBlock    [B, N, Cout]
//     → fold                [B, Cout, H', W']
//     → ChannelRecalibration
//     → DropBlock (train only)
//
// Each stage owns only its own parameters and configuration;
// the backbone composes three of them.

use burn::prelude::*;

use crate::domain::error::{ClassifierError, ClassifierResult};
use crate::ml::{
    block::{TransformerBlock, TransformerBlockConfig},
    dropblock::{DropBlock, DropBlockConfig},
    embedding::{fold_tokens, TokenEmbedding, TokenEmbeddingConfig, TokenGrid},
    mode::Mode,
    recalibration::{ChannelRecalibration, ChannelRecalibrationConfig},
};

#[derive(Config, Debug)]
pub struct StageConfig {
    pub in_channels:  usize,
    pub out_channels: usize,
    pub kernel_size:  usize,
    pub stride:       usize,
    pub padding:      usize,
    pub window_size:  usize,
    #[config(default = 4)]
    pub num_heads: usize,
    #[config(default = 2.0)]
    pub mlp_ratio: f64,
    #[config(default = 16)]
    pub reduction: usize,
    #[config(default = 3)]
    pub block_size: usize,
    #[config(default = 0.1)]
    pub drop_prob: f64,
}

impl StageConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Stage<B> {
        Stage {
            embed: self.embedding().init(device),
            transformer: TransformerBlockConfig::new(self.out_channels)
                .with_mlp_ratio(self.mlp_ratio)
                .with_num_heads(self.num_heads)
                .with_window_size(self.window_size)
                .init(device),
            recalibration: ChannelRecalibrationConfig::new(self.out_channels)
                .with_reduction(self.reduction)
                .init(device),
            dropblock: DropBlockConfig::new()
                .with_block_size(self.block_size)
                .with_drop_prob(self.drop_prob)
                .init(),
        }
    }

    fn embedding(&self) -> TokenEmbeddingConfig {
        TokenEmbeddingConfig::new(
            self.in_channels,
            self.out_channels,
            self.kernel_size,
            self.stride,
            self.padding,
        )
    }

    /// Grid this stage produces for an input of `height × width`.
    pub fn output_grid(&self, height: usize, width: usize) -> TokenGrid {
        self.embedding().output_grid(height, width)
    }

    /// Reject hyperparameters the modules cannot be built from.
    pub fn validate(&self) -> Result<(), String> {
        let sizes = [
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("kernel_size", self.kernel_size),
            ("stride", self.stride),
            ("window_size", self.window_size),
            ("num_heads", self.num_heads),
            ("reduction", self.reduction),
            ("block_size", self.block_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(format!("{name} must be positive"));
        }
        if self.out_channels % self.num_heads != 0 {
            return Err(format!(
                "out_channels {} must be divisible by num_heads {}",
                self.out_channels, self.num_heads
            ));
        }
        if self.mlp_ratio.is_nan() || self.mlp_ratio <= 0.0 {
            return Err(format!("mlp_ratio {} must be positive", self.mlp_ratio));
        }
        if !(0.0..=1.0).contains(&self.drop_prob) {
            return Err(format!("drop_prob {} must lie in [0, 1]", self.drop_prob));
        }
        Ok(())
    }

    /// Check that the token count at this resolution fits the window.
    pub fn check_grid(&self, grid: TokenGrid) -> ClassifierResult<()> {
        let tokens = grid.tokens();
        if self.window_size == 0 || tokens % self.window_size != 0 {
            return Err(ClassifierError::shape(tokens, self.window_size));
        }
        Ok(())
    }
}

#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    pub embed:         TokenEmbedding<B>,
    pub transformer:   TransformerBlock<B>,
    pub recalibration: ChannelRecalibration<B>,
    pub dropblock:     DropBlock,
}

impl<B: Backend> Stage<B> {
    pub fn forward(&self, x: Tensor<B, 4>, mode: Mode) -> ClassifierResult<Tensor<B, 4>> {
        let (tokens, grid) = self.embed.forward(x);
        let tokens = self.transformer.forward(tokens)?;

        let x = fold_tokens(tokens, grid);
        let x = self.recalibration.forward(x);
        Ok(self.dropblock.forward(x, mode))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    #[test]
    fn test_stage_downsamples_and_widens() {
        let device = Default::default();
        let cfg    = StageConfig::new(8, 16, 3, 2, 1, 16);
        let stage  = cfg.init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 4>::random([1, 8, 16, 16], Distribution::Default, &device);

        let y = stage.forward(x, Mode::Inference).unwrap();
        assert_eq!(y.dims(), [1, 16, 8, 8]);
        assert_eq!(cfg.output_grid(16, 16), TokenGrid { height: 8, width: 8 });
    }

    #[test]
    fn test_inference_is_deterministic() {
        let device = Default::default();
        let stage  = StageConfig::new(3, 8, 3, 1, 1, 16)
            .with_drop_prob(0.5)
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([1, 3, 8, 8], Distribution::Default, &device);

        let a = stage.forward(x.clone(), Mode::Inference).unwrap();
        let b = stage.forward(x, Mode::Inference).unwrap();
        a.into_data().assert_eq(&b.into_data(), true);
    }

    #[test]
    fn test_validate_rejects_unbuildable_stages() {
        assert!(StageConfig::new(3, 32, 7, 1, 3, 32).validate().is_ok());

        let err = StageConfig::new(3, 30, 7, 1, 3, 32).validate().unwrap_err();
        assert!(err.contains("num_heads"), "{err}");

        assert!(StageConfig::new(3, 32, 7, 0, 3, 32).validate().is_err());
        assert!(StageConfig::new(3, 32, 7, 1, 3, 32).with_num_heads(0).validate().is_err());
        assert!(StageConfig::new(3, 32, 7, 1, 3, 32).with_drop_prob(1.5).validate().is_err());
    }

    #[test]
    fn test_check_grid_reports_tokens() {
        let cfg = StageConfig::new(3, 8, 3, 1, 1, 32);
        assert!(cfg.check_grid(TokenGrid { height: 8, width: 8 }).is_ok());
        assert!(matches!(
            cfg.check_grid(TokenGrid { height: 10, width: 10 }),
            Err(ClassifierError::Shape { tokens: 100, window_size: 32 })
        ));
    }
}
