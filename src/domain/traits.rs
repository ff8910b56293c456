// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The corpus builder only ever sees this trait, never a concrete
// file format. KvretLoader implements it for the KVRET JSON
// corpus; a future source format only needs a new impl.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::conversation::Conversation;

// ─── ConversationSource ───────────────────────────────────────────────────────
/// Any component that can supply a list of conversations,
/// each with ordered turns and a knowledge-base table.
pub trait ConversationSource {
    /// Load every conversation from this source.
    fn conversations(&self) -> Result<Vec<Conversation>>;
}
