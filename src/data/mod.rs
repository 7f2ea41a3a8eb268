// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw uploaded bytes
// to the normalised float buffer the network consumes.
//
// The pipeline flows in this order:
//
//   BMP / JPEG / PNG bytes
//       │
//       ▼
//   format sniff + decode   → DynamicImage (or DecodeError)
//       │
//       ▼
//   RGB8 + resize 224×224
//       │
//       ▼
//   per-channel normalise   → [3, 224, 224] planar f32
//
// Turning that buffer into a tensor happens in the ML layer,
// so this layer stays independent of any backend choice.
//
// Reference: image crate docs

/// Decodes and normalises encoded images
pub mod preprocessor;
