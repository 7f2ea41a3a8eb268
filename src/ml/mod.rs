// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer builds tensors or modules — only this one.
//
// What's in this layer, leaves first:
//
//   mode.rs          — Train / Inference switch passed to
//                      every forward call
//   embedding.rs     — depthwise + pointwise conv tokenizer
//   attention.rs     — multi-head attention inside fixed
//                      token windows
//   block.rs         — pre-norm transformer block
//                      (attention + GELU MLP, residuals)
//   recalibration.rs — squeeze-and-excitation channel gate
//   dropblock.rs     — structured block dropout (train only)
//   stage.rs         — embed → block → fold → gate → drop
//   model.rs         — three stages + pooled classification head
//   inferencer.rs    — bytes in, PredictionResponse out
//
// Reference: Burn Book §3 (Building Blocks)
//            Wu et al. (2021) CvT: Introducing Convolutions
//            to Vision Transformers

/// Execution mode flag
pub mod mode;

/// Convolutional token embedding
pub mod embedding;

/// Windowed multi-head self-attention
pub mod attention;

/// Transformer block used inside each stage
pub mod block;

/// Squeeze-and-excitation channel recalibration
pub mod recalibration;

/// DropBlock structured regularisation
pub mod dropblock;

/// One backbone stage
pub mod stage;

/// Full CvT backbone and classification head
pub mod model;

/// Inference engine — preprocess, forward, softmax
pub mod inferencer;
