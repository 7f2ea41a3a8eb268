// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish a
// specific goal.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Load weights, then classify image files
pub mod classify_use_case;

// Import a PyTorch state dict into a Burn record
pub mod convert_use_case;

// Architecture self-check with a dummy forward pass
pub mod summary_use_case;
