// ============================================================
// Layer 5 — Convolutional Token Embedding
// ============================================================
// Opens every stage: turns a spatial map into a token
// sequence.
//
//   [B, Cin, H, W]
//     → depthwise k×k conv (groups = Cin, stride s)
//     → pointwise 1×1 conv (Cin → Cout)
//     → [B, Cout, H', W']
//     → flatten rows → [B, H'·W', Cout]
//     → LayerNorm over channels
//
// H' = (H + 2p - k) / s + 1, likewise for W'.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        LayerNorm, LayerNormConfig, PaddingConfig2d,
    },
    prelude::*,
};

/// Spatial extent of a token sequence, needed to fold it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGrid {
    pub height: usize,
    pub width:  usize,
}

impl TokenGrid {
    pub fn tokens(&self) -> usize {
        self.height * self.width
    }
}

#[derive(Config, Debug)]
pub struct TokenEmbeddingConfig {
    pub in_channels:  usize,
    pub out_channels: usize,
    pub kernel_size:  usize,
    pub stride:       usize,
    pub padding:      usize,
}

impl TokenEmbeddingConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenEmbedding<B> {
        let depthwise = Conv2dConfig::new(
            [self.in_channels, self.in_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
        .with_groups(self.in_channels)
        .init(device);

        let pointwise = Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
            .init(device);

        let layer_norm = LayerNormConfig::new(self.out_channels).init(device);

        TokenEmbedding { depthwise, pointwise, layer_norm }
    }

    /// Output grid for a given input resolution.
    pub fn output_grid(&self, height: usize, width: usize) -> TokenGrid {
        let out = |n: usize| (n + 2 * self.padding - self.kernel_size) / self.stride + 1;
        TokenGrid { height: out(height), width: out(width) }
    }
}

#[derive(Module, Debug)]
pub struct TokenEmbedding<B: Backend> {
    pub depthwise:  Conv2d<B>,
    pub pointwise:  Conv2d<B>,
    pub layer_norm: LayerNorm<B>,
}

impl<B: Backend> TokenEmbedding<B> {
    /// x: [B, Cin, H, W] → tokens [B, H'·W', Cout] and the grid (H', W').
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 3>, TokenGrid) {
        let x = self.pointwise.forward(self.depthwise.forward(x));
        let [b, c, h, w] = x.dims();

        let tokens = x.permute([0, 2, 3, 1]).reshape([b, h * w, c]);
        let tokens = self.layer_norm.forward(tokens);

        (tokens, TokenGrid { height: h, width: w })
    }
}

/// Fold [B, N, C] tokens back into a [B, C, H, W] map.
pub fn fold_tokens<B: Backend>(tokens: Tensor<B, 3>, grid: TokenGrid) -> Tensor<B, 4> {
    let [b, _n, c] = tokens.dims();
    tokens.swap_dims(1, 2).reshape([b, c, grid.height, grid.width])
}
