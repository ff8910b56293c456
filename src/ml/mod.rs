// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn-specific code lives here; the data layer hands over
// plain vectors and this layer turns them into device tensors.
//
//   model.rs      — GRU encoder-decoder with dot attention and
//                   a weight-masked cross-entropy loss
//   trainer.rs    — epoch loop, Adam updates, validation pass,
//                   metrics + checkpoints per epoch
//   inferencer.rs — loads a checkpoint and greedy-decodes replies
//
// Reference: Luong et al. (2015) Effective Approaches to
//            Attention-based Neural Machine Translation

/// Attention seq2seq architecture
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads checkpoint and decodes replies
pub mod inferencer;
