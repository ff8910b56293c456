// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that belong to no single business layer:
//
//   checkpoint.rs — model weight + config persistence via Burn's
//                   CompactRecorder
//   metrics.rs    — per-epoch loss rows appended to a CSV
//
// The dataset cache itself lives in the data layer (store.rs)
// because its format is coupled to the sample model.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
