// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs — Loading and saving model weights
//                   Reads the original PyTorch state dict or
//                   Burn's MessagePack record, and refuses any
//                   checkpoint whose topology differs from the
//                   configured architecture.
//
//   manifest.rs   — Parameter name → shape listings
//                   for a model, a Burn record or a PyTorch
//                   state dict; what the topology check
//                   compares.
//
//   readiness.rs  — The ModelSlot handle
//                   Rejects requests with NotReady until the
//                   parameters have been loaded.
//
// Reference: Rust Book §9 (Error Handling)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint loading, conversion and topology checks
pub mod checkpoint;

/// Parameter listings for the topology check
pub mod manifest;

/// Readiness gate around the loaded predictor
pub mod readiness;
