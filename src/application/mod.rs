// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: these modules wire the data, ml,
// and infra layers together for one goal each and contain no
// model math, no parsing, and no printing of their own.

// The training workflow
pub mod train_use_case;

// The chat/inference workflow
pub mod chat_use_case;
