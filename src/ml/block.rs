// ============================================================
// Layer 5 — Convolutional Transformer Block
// ============================================================
// Pre-norm transformer block over a token sequence:
//
//   x = x + attn(norm1(x))
//   x = x + mlp(norm2(x))       mlp = Linear → GELU → Linear
//
// Activation recomputation for training belongs to the
// autodiff backend's checkpointing strategy, not to the
// module, so there is no mode-dependent branch here.

use burn::{
    nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::gelu,
};

use crate::domain::error::ClassifierResult;
use crate::ml::attention::{WindowAttention, WindowAttentionConfig};

#[derive(Config, Debug)]
pub struct TransformerBlockConfig {
    pub dim: usize,
    #[config(default = 2.0)]
    pub mlp_ratio: f64,
    #[config(default = 4)]
    pub num_heads: usize,
    #[config(default = 32)]
    pub window_size: usize,
}

impl TransformerBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerBlock<B> {
        let hidden = (self.dim as f64 * self.mlp_ratio) as usize;
        let attn = WindowAttentionConfig::new(self.dim)
            .with_num_heads(self.num_heads)
            .with_window_size(self.window_size)
            .init(device);

        TransformerBlock {
            norm1:   LayerNormConfig::new(self.dim).init(device),
            attn,
            norm2:   LayerNormConfig::new(self.dim).init(device),
            mlp_in:  LinearConfig::new(self.dim, hidden).init(device),
            mlp_out: LinearConfig::new(hidden, self.dim).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct TransformerBlock<B: Backend> {
    pub norm1:   LayerNorm<B>,
    pub attn:    WindowAttention<B>,
    pub norm2:   LayerNorm<B>,
    pub mlp_in:  Linear<B>,
    pub mlp_out: Linear<B>,
}

impl<B: Backend> TransformerBlock<B> {
    /// x: [B, N, C] → [B, N, C]
    pub fn forward(&self, x: Tensor<B, 3>) -> ClassifierResult<Tensor<B, 3>> {
        let attn_out = self.attn.forward(self.norm1.forward(x.clone()))?;
        let x = x + attn_out;

        let mlp_out = self.mlp_out.forward(gelu(self.mlp_in.forward(self.norm2.forward(x.clone()))));
        Ok(x + mlp_out)
    }
}
