// ============================================================
// Layer 3 — Conversation Domain Types
// ============================================================
// A conversation is an ordered list of turns plus the knowledge
// base the assistant had access to while producing its answers.
// By the time a Conversation exists, all corpus-format details
// (KVRET JSON nesting, column layouts) have been resolved.
//
// Reference: Eric et al. (2017) — Key-Value Retrieval Networks
//            for Task-Oriented Dialogue (the KVRET corpus)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who produced a turn. The corpus alternates driver / assistant;
/// samples are only ever extracted from (Driver, Assistant) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Driver,
    Assistant,
}

/// One utterance by one speaker within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnLine {
    pub speaker:   Speaker,
    pub utterance: String,

    /// Slot annotations on assistant turns (slot name → value).
    /// BTreeMap keeps iteration deterministic.
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

/// A (subject, relation, object) fact available to a conversation,
/// e.g. ("dinner", "time", "8pm") from a calendar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbRow {
    pub subject:  String,
    pub relation: String,
    pub object:   String,
}

impl KbRow {
    pub fn new(
        subject:  impl Into<String>,
        relation: impl Into<String>,
        object:   impl Into<String>,
    ) -> Self {
        Self {
            subject:  subject.into(),
            relation: relation.into(),
            object:   object.into(),
        }
    }
}

/// A full dialogue: ordered turns, the knowledge base table,
/// and the task intent ("navigate", "schedule", "weather").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub lines:  Vec<TurnLine>,
    pub kb:     Vec<KbRow>,
    pub intent: Option<String>,
}

impl Conversation {
    pub fn new(lines: Vec<TurnLine>, kb: Vec<KbRow>, intent: Option<String>) -> Self {
        Self { lines, kb, intent }
    }
}
