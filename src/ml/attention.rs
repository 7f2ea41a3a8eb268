// ============================================================
// Layer 5 — Windowed Self-Attention
// ============================================================
// Multi-head self-attention restricted to contiguous windows
// of `window_size` tokens.
//
//   x [B, N, C]
//     → qkv Linear(C, 3C) → [B, N, 3, heads, d]
//     → q, k, v: [B, heads, N, d]
//     → split N into N/W windows: [B, heads, N/W, W, d]
//     → softmax(q·kᵀ · d^-0.5) · v   (per window)
//     → [B, heads, N, d] → reshape [B, N, C]
//     → proj Linear(C, C)
//
// Cost is O(N·W) instead of O(N²). Tokens never attend across
// a window boundary.
//
// N must be an exact multiple of W. Anything else is a
// configuration error and fails with ClassifierError::Shape;
// tokens are never padded or dropped.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Liu et al. (2021) Swin Transformer (local windows)

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

use crate::domain::error::{ClassifierError, ClassifierResult};

#[derive(Config, Debug)]
pub struct WindowAttentionConfig {
    pub dim: usize,
    #[config(default = 4)]
    pub num_heads: usize,
    #[config(default = 32)]
    pub window_size: usize,
}

impl WindowAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> WindowAttention<B> {
        assert!(
            self.dim % self.num_heads == 0,
            "dim {} must be divisible by num_heads {}",
            self.dim,
            self.num_heads
        );

        WindowAttention {
            qkv:         LinearConfig::new(self.dim, self.dim * 3).init(device),
            proj:        LinearConfig::new(self.dim, self.dim).init(device),
            num_heads:   self.num_heads,
            window_size: self.window_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct WindowAttention<B: Backend> {
    pub qkv:         Linear<B>,
    pub proj:        Linear<B>,
    pub num_heads:   usize,
    pub window_size: usize,
}

impl<B: Backend> WindowAttention<B> {
    /// Fails unless `tokens` is a positive multiple of the window size.
    pub fn check_tokens(&self, tokens: usize) -> ClassifierResult<()> {
        if self.window_size == 0 || tokens % self.window_size != 0 {
            return Err(ClassifierError::shape(tokens, self.window_size));
        }
        Ok(())
    }

    /// x: [B, N, C] → [B, N, C]
    pub fn forward(&self, x: Tensor<B, 3>) -> ClassifierResult<Tensor<B, 3>> {
        let [b, n, c] = x.dims();
        self.check_tokens(n)?;

        let head_dim = c / self.num_heads;

        // [B, N, 3C] → [3, B, heads, N, d]
        let qkv = self
            .qkv
            .forward(x)
            .reshape([b, n, 3, self.num_heads, head_dim])
            .permute([2, 0, 3, 1, 4]);

        let take = |i: usize| {
            qkv.clone()
                .narrow(0, i, 1)
                .reshape([b, self.num_heads, n, head_dim])
        };
        let (q, k, v) = (take(0), take(1), take(2));

        let out = self.attend_windows(q, k, v);

        // Heads are folded straight into the channel axis by a
        // row-major reshape, without moving the head axis behind
        // the token axis. The pretrained parameters depend on it.
        let out = out.reshape([b, n, c]);
        Ok(self.proj.forward(out))
    }

    /// Scaled dot-product attention inside each window.
    /// q, k, v: [B, heads, N, d] → [B, heads, N, d]
    pub fn attend_windows(
        &self,
        q: Tensor<B, 4>,
        k: Tensor<B, 4>,
        v: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [b, h, n, d] = q.dims();
        let w     = self.window_size;
        let shape = [b, h, n / w, w, d];
        let scale = (d as f64).powf(-0.5);

        let q = q.reshape(shape);
        let k = k.reshape(shape);
        let v = v.reshape(shape);

        let scores = q.matmul(k.transpose()).mul_scalar(scale); // [B, h, N/W, W, W]
        let attn   = softmax(scores, 4);

        attn.matmul(v).reshape([b, h, n, d])
    }
}
