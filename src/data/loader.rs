// ============================================================
// Layer 4 — KVRET Corpus Loader
// ============================================================
// Reads one KVRET-format JSON file (the in-car assistant corpus)
// and normalises it into domain Conversations.
//
// KVRET layout per dialogue:
//   dialogue:  [{turn: "driver"|"assistant",
//                data: {utterance, slots?, ...}}, ...]
//   scenario:  {kb: {items, column_names, ...},
//               task: {intent}}
//
// KB items are flat column→value records. They become
// (subject, relation, object) rows by taking the primary column
// (first of column_names) as the subject and emitting one row per
// remaining non-null column. Columns are walked in column_names
// order, which keeps downstream entity extraction deterministic.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::PathBuf};

use crate::domain::conversation::{Conversation, KbRow, Speaker, TurnLine};
use crate::domain::traits::ConversationSource;

/// Loads all conversations from a single KVRET JSON file.
pub struct KvretLoader {
    path: PathBuf,
}

impl KvretLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConversationSource for KvretLoader {
    fn conversations(&self) -> Result<Vec<Conversation>> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read corpus file '{}'", self.path.display()))?;
        let dialogues: Vec<KvretDialogue> = serde_json::from_str(&json)
            .with_context(|| format!("cannot parse corpus file '{}'", self.path.display()))?;

        let conversations: Vec<Conversation> =
            dialogues.into_iter().map(into_conversation).collect();

        tracing::info!(
            "Loaded {} conversations from '{}'",
            conversations.len(),
            self.path.display()
        );
        Ok(conversations)
    }
}

// ─── KVRET JSON shapes ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct KvretDialogue {
    #[serde(default)]
    dialogue: Vec<KvretTurn>,
    scenario: KvretScenario,
}

#[derive(Debug, Deserialize)]
struct KvretTurn {
    turn: String,
    data: KvretTurnData,
}

#[derive(Debug, Deserialize)]
struct KvretTurnData {
    utterance: String,
    #[serde(default)]
    slots: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct KvretScenario {
    kb:   KvretKb,
    task: KvretTask,
}

#[derive(Debug, Deserialize)]
struct KvretKb {
    /// Null in dialogues that never touched the knowledge base.
    #[serde(default)]
    items: Option<Vec<BTreeMap<String, Option<String>>>>,
    #[serde(default)]
    column_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KvretTask {
    #[serde(default)]
    intent: Option<String>,
}

fn into_conversation(dialogue: KvretDialogue) -> Conversation {
    let kb = kb_rows(&dialogue.scenario.kb);
    let lines = dialogue
        .dialogue
        .into_iter()
        .filter_map(|turn| {
            let speaker = match turn.turn.as_str() {
                "driver"    => Speaker::Driver,
                "assistant" => Speaker::Assistant,
                other => {
                    tracing::warn!("Skipping turn with unknown speaker '{other}'");
                    return None;
                }
            };
            Some(TurnLine {
                speaker,
                utterance: turn.data.utterance,
                slots:     turn.data.slots.unwrap_or_default(),
            })
        })
        .collect();

    Conversation::new(lines, kb, dialogue.scenario.task.intent)
}

/// Flatten one KB table into (subject, relation, object) rows.
fn kb_rows(kb: &KvretKb) -> Vec<KbRow> {
    let Some(items) = &kb.items else {
        return Vec::new();
    };
    let Some(primary) = kb.column_names.first() else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for item in items {
        let Some(Some(subject)) = item.get(primary) else {
            continue;
        };
        for column in kb.column_names.iter().skip(1) {
            if let Some(Some(object)) = item.get(column) {
                rows.push(KbRow::new(subject.clone(), column.clone(), object.clone()));
            }
        }
    }
    rows
}
