// ============================================================
// Layer 5 — Channel Recalibration (Squeeze-and-Excitation)
// ============================================================
//   s = mean over H, W of x          [B, C]
//   g = sigmoid(fc2(relu(fc1(s))))   [B, C]   fc1: C → C/r
//   y = x * g[:, :, None, None]      [B, C, H, W]
//
// Both projections are bias-free. Output shape always equals
// input shape; only per-channel magnitudes change.
//
// Reference: Hu et al. (2018) Squeeze-and-Excitation Networks

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

#[derive(Config, Debug)]
pub struct ChannelRecalibrationConfig {
    pub channels: usize,
    #[config(default = 16)]
    pub reduction: usize,
}

impl ChannelRecalibrationConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ChannelRecalibration<B> {
        let squeezed = (self.channels / self.reduction).max(1);
        ChannelRecalibration {
            fc1: LinearConfig::new(self.channels, squeezed).with_bias(false).init(device),
            fc2: LinearConfig::new(squeezed, self.channels).with_bias(false).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct ChannelRecalibration<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
}

impl<B: Backend> ChannelRecalibration<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [b, c, _, _] = x.dims();

        let pooled = x.clone().mean_dim(3).mean_dim(2).reshape([b, c]);
        let gate   = sigmoid(self.fc2.forward(relu(self.fc1.forward(pooled))));

        x * gate.reshape([b, c, 1, 1])
    }
}
