// ============================================================
// Layer 5 — DropBlock Regularisation
// ============================================================
// Drops contiguous spatial blocks instead of single pixels.
// Only active in Mode::Train with drop_prob > 0; otherwise the
// input is returned untouched.
//
//   γ    = drop_prob / block_size²
//   seed = Bernoulli(γ) over [B, 1, H, W]
//   mask = 1 - maxpool(seed, k = block_size, stride 1, pad k/2)
//   y    = x · mask · numel(mask) / sum(mask)
//
// Reference: Ghiasi et al. (2018) DropBlock

use burn::{
    nn::{
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::Distribution,
};

use crate::ml::mode::Mode;

#[derive(Config, Debug)]
pub struct DropBlockConfig {
    #[config(default = 3)]
    pub block_size: usize,
    #[config(default = 0.1)]
    pub drop_prob: f64,
}

impl DropBlockConfig {
    pub fn init(&self) -> DropBlock {
        DropBlock { block_size: self.block_size, drop_prob: self.drop_prob }
    }
}

/// Parameter-free, like burn's own Dropout.
#[derive(Module, Clone, Debug)]
pub struct DropBlock {
    pub block_size: usize,
    pub drop_prob:  f64,
}

impl DropBlock {
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>, mode: Mode) -> Tensor<B, 4> {
        if !mode.is_training() || self.drop_prob == 0.0 || self.block_size == 0 {
            return x;
        }

        let [b, _, h, w] = x.dims();
        let gamma = self.drop_prob / (self.block_size * self.block_size) as f64;

        let seed = Tensor::<B, 4>::random([b, 1, h, w], Distribution::Default, &x.device())
            .lower_elem(gamma)
            .float();

        let pad  = self.block_size / 2;
        let pool: MaxPool2d = MaxPool2dConfig::new([self.block_size, self.block_size])
            .with_strides([1, 1])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .init();

        // Even block sizes grow the map by one; crop back to H × W.
        let dropped = pool.forward(seed).slice([0..b, 0..1, 0..h, 0..w]);
        let keep    = dropped.neg().add_scalar(1.0);

        let numel = (b * h * w) as f32;
        let kept: f32 = keep.clone().sum().into_scalar().elem();
        let scale = numel / kept.max(1.0);

        tracing::trace!("DropBlock kept {:.0}/{:.0} positions", kept, numel);

        x * keep.mul_scalar(scale)
    }
}
