// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Bidirectional word <-> id mapping with per-id usage counters.
//
// Invariants:
//   - word2id and id2word are exact inverses at all times
//   - ids are dense, assigned from 0 in creation order
//   - the five reserved tokens exist from construction and are
//     never subject to frequency filtering
//
// The reserved-id fields are NOT serialized. After a load they
// must be restored from word2id (see restore_reserved); the
// store treats a failed lookup as a corrupt cache.
//
// Reference: Rust Book §8 (HashMaps)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Integer word identifier. Stable only within one vocabulary
/// epoch: the full and the filtered corpus have distinct id spaces.
pub type WordId = usize;

pub const PAD_WORD:     &str = "<pad>";
pub const GO_WORD:      &str = "<go>";
pub const EOU_WORD:     &str = "<eou>";
pub const EOS_WORD:     &str = "<eos>";
pub const UNKNOWN_WORD: &str = "<unknown>";

/// All words a dataset knows about, in both directions,
/// plus how often each one was seen during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    word2id:  HashMap<String, WordId>,
    id2word:  HashMap<WordId, String>,
    id_count: HashMap<WordId, usize>,

    // Restored from word2id after deserialization, never persisted.
    #[serde(skip)]
    pub pad_token: WordId,
    #[serde(skip)]
    pub go_token: WordId,
    #[serde(skip)]
    pub eou_token: WordId,
    #[serde(skip)]
    pub eos_token: WordId,
    #[serde(skip)]
    pub unknown_token: WordId,
}

impl Vocabulary {
    /// Create a vocabulary holding only the five reserved tokens.
    /// `<pad>` is registered first so it always gets id 0.
    pub fn new() -> Self {
        let mut vocab = Self {
            word2id:       HashMap::new(),
            id2word:       HashMap::new(),
            id_count:      HashMap::new(),
            pad_token:     0,
            go_token:      0,
            eou_token:     0,
            eos_token:     0,
            unknown_token: 0,
        };
        vocab.pad_token     = vocab.get_or_create_id(PAD_WORD, true);
        vocab.go_token      = vocab.get_or_create_id(GO_WORD, true);
        vocab.eou_token     = vocab.get_or_create_id(EOU_WORD, true);
        vocab.eos_token     = vocab.get_or_create_id(EOS_WORD, true);
        vocab.unknown_token = vocab.get_or_create_id(UNKNOWN_WORD, true);
        vocab
    }

    /// Look up (and optionally create) the id for a word.
    ///
    /// All lookups are case-insensitive. With `create = false` an
    /// absent word resolves to the unknown-token id and nothing is
    /// mutated — this is the inference path, which must never grow
    /// the vocabulary.
    pub fn get_or_create_id(&mut self, word: &str, create: bool) -> WordId {
        let word = word.to_lowercase();

        if !create {
            return self.word2id.get(&word).copied().unwrap_or(self.unknown_token);
        }

        if let Some(&id) = self.word2id.get(&word) {
            *self.id_count.entry(id).or_insert(0) += 1;
            return id;
        }

        let id = self.word2id.len();
        self.word2id.insert(word.clone(), id);
        self.id2word.insert(id, word);
        self.id_count.insert(id, 1);
        id
    }

    pub fn len(&self) -> usize {
        self.word2id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word2id.is_empty()
    }

    pub fn id_of(&self, word: &str) -> Option<WordId> {
        self.word2id.get(&word.to_lowercase()).copied()
    }

    pub fn word_of(&self, id: WordId) -> Option<&str> {
        self.id2word.get(&id).map(String::as_str)
    }

    pub fn count_of(&self, id: WordId) -> usize {
        self.id_count.get(&id).copied().unwrap_or(0)
    }

    pub fn is_reserved(&self, id: WordId) -> bool {
        id == self.pad_token
            || id == self.go_token
            || id == self.eou_token
            || id == self.eos_token
            || id == self.unknown_token
    }

    /// Decrement a usage counter when a sample is dropped.
    pub fn decrement_count(&mut self, id: WordId) {
        if let Some(count) = self.id_count.get_mut(&id) {
            *count = count.saturating_sub(1);
        }
    }

    /// Replace all three tables at once. Used by the vocabulary
    /// filter, which rebuilds the id space wholesale; the caller
    /// must follow up with restore_reserved().
    pub(crate) fn replace_tables(
        &mut self,
        word2id:  HashMap<String, WordId>,
        id2word:  HashMap<WordId, String>,
        id_count: HashMap<WordId, usize>,
    ) {
        self.word2id  = word2id;
        self.id2word  = id2word;
        self.id_count = id_count;
    }

    /// Re-derive the reserved-token ids from word2id.
    ///
    /// Called after deserialization and after a filter pass. A
    /// missing reserved token means the artifact is corrupt, which
    /// must surface as an error rather than a stale id of 0.
    pub fn restore_reserved(&mut self) -> Result<()> {
        self.pad_token     = self.reserved_id(PAD_WORD)?;
        self.go_token      = self.reserved_id(GO_WORD)?;
        self.eou_token     = self.reserved_id(EOU_WORD)?;
        self.eos_token     = self.reserved_id(EOS_WORD)?;
        self.unknown_token = self.reserved_id(UNKNOWN_WORD)?;
        Ok(())
    }

    fn reserved_id(&self, word: &str) -> Result<WordId> {
        match self.word2id.get(word) {
            Some(&id) => Ok(id),
            None => bail!("corrupt vocabulary: reserved token '{word}' is missing"),
        }
    }

    /// Ids ranked by descending usage count, reserved tokens
    /// excluded. Ties break by ascending original id so the
    /// ranking is fully deterministic.
    pub fn ranked_ids(&self) -> Vec<WordId> {
        let mut ids: Vec<WordId> = (0..self.len())
            .filter(|&id| !self.is_reserved(id))
            .collect();
        ids.sort_by(|&a, &b| self.count_of(b).cmp(&self.count_of(a)).then(a.cmp(&b)));
        ids
    }

    /// Render a word-id sequence as readable text.
    ///
    /// With `clean` set, `<pad>` and `<go>` are skipped and decoding
    /// stops at the first `<eos>` — the shape a chat reply wants.
    pub fn sequence_to_string(&self, sequence: &[WordId], clean: bool) -> String {
        if !clean {
            return sequence
                .iter()
                .filter_map(|&id| self.word_of(id))
                .collect::<Vec<_>>()
                .join(" ");
        }

        let mut words = Vec::new();
        for &id in sequence {
            if id == self.eos_token {
                break;
            }
            if id == self.pad_token || id == self.go_token {
                continue;
            }
            if let Some(word) = self.word_of(id) {
                words.push(word);
            }
        }
        detokenize(&words)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

/// Join tokens with spaces, except punctuation and clitics
/// ("'s", "n't") which attach to the previous token. The first
/// letter is capitalised for display.
fn detokenize(tokens: &[&str]) -> String {
    let mut out = String::new();
    for token in tokens {
        let attach = token.starts_with('\'')
            || (token.chars().count() == 1
                && token.chars().all(|c| c.is_ascii_punctuation()));
        if !out.is_empty() && !attach {
            out.push(' ');
        }
        out.push_str(token);
    }
    let mut chars = out.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => out,
    }
}
