// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define the core
// concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Error taxonomy shared by every layer
pub mod error;

// Class labels and the per-call prediction result
pub mod prediction;

// Core abstractions (traits) that other layers implement
pub mod traits;
