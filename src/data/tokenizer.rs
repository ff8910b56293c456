// ============================================================
// Layer 4 — Entity Extractor / Tokenizer
// ============================================================
// Turns one raw utterance plus the conversation's knowledge-base
// rows into a sequence of word ids.
//
// The extraction is two-level: a text span matching a KB field
// value is first rewritten to an anonymised `_entity_<k>_`
// placeholder (so matching decisions are made on anonymised
// text), but the emitted id is the id of the ORIGINAL field
// text, never of the placeholder string. A multi-word field
// value such as "palo alto garage r" therefore becomes a single
// vocabulary entry.
//
// Token pattern: runs of word characters / apostrophes, or a
// single other non-space character — punctuation survives
// tokenization as its own token and is stripped afterwards.

use regex::Regex;
use std::collections::HashMap;

use crate::data::vocabulary::{Vocabulary, WordId};
use crate::domain::conversation::KbRow;

/// Splits on whitespace while keeping punctuation as separate tokens.
const TOKEN_PATTERN: &str = r"[\w']+|[^\s\w']";

/// Punctuation stripped from the edges of ordinary tokens.
const STRIP_CHARS: [char; 6] = [',', '.', ':', '?', '!', ';'];

pub struct EntityExtractor {
    token_re: Regex,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self {
            token_re: Regex::new(TOKEN_PATTERN).expect("token pattern compiles"),
        }
    }

    /// Extract the word ids of an utterance, anonymising KB entity
    /// mentions during matching (see module docs).
    ///
    /// With `create = false` the vocabulary is only consulted, never
    /// grown — unknown words resolve to the unknown-token id.
    pub fn extract_text(
        &self,
        vocab:   &mut Vocabulary,
        line:    &str,
        kb_rows: &[KbRow],
        create:  bool,
    ) -> Vec<WordId> {
        let mut line = line.to_lowercase();

        // placeholder -> original field text
        let mut entities: HashMap<String, String> = HashMap::new();
        let mut count = 0usize;

        for row in kb_rows {
            let subject  = row.subject.trim().to_lowercase();
            let relation = row.relation.trim().to_lowercase();
            let object   = row.object.trim().to_lowercase();

            if self.is_day_list(&relation, &object) {
                // Day names are short words ("monday") that substring
                // matching would find inside longer tokens, so each
                // one is matched as a whole token instead.
                for day in object.split(',').map(str::trim) {
                    if self.tokenize(&line).any(|token| token == day) {
                        count += 1;
                        substitute(&mut line, day, count, &mut entities);
                    }
                }
            } else if !object.is_empty() && line.contains(&object) {
                count += 1;
                substitute(&mut line, &object, count, &mut entities);
            }

            if !subject.is_empty() && line.contains(&subject) {
                count += 1;
                substitute(&mut line, &subject, count, &mut entities);
            }

            // Weather relations are themselves day names, so they get
            // the same whole-token treatment as day-list objects.
            let relation_matches = if relation.contains("day") {
                self.tokenize(&line).any(|token| token == relation)
            } else {
                !relation.is_empty() && line.contains(&relation)
            };
            if relation_matches {
                count += 1;
                substitute(&mut line, &relation, count, &mut entities);
            }
        }

        let tokens: Vec<String> = self.tokenize(&line).map(str::to_string).collect();

        let mut ids = Vec::with_capacity(tokens.len());
        for token in &tokens {
            if let Some(original) = entities.get(token) {
                // Placeholder resolves back to the true field text.
                ids.push(vocab.get_or_create_id(original, create));
                continue;
            }
            let token = token.trim_matches(|c: char| STRIP_CHARS.contains(&c) || c.is_whitespace());
            if token.is_empty() {
                continue;
            }
            ids.push(vocab.get_or_create_id(token, create));
        }
        ids
    }

    /// Convert every KB row's three fields directly into word ids
    /// (lower-cased, no tokenization) for use as a sample's triples.
    pub fn extract_kb(&self, vocab: &mut Vocabulary, kb_rows: &[KbRow]) -> Vec<[WordId; 3]> {
        kb_rows
            .iter()
            .map(|row| {
                [
                    vocab.get_or_create_id(&row.subject.to_lowercase(), true),
                    vocab.get_or_create_id(&row.relation.to_lowercase(), true),
                    vocab.get_or_create_id(&row.object.to_lowercase(), true),
                ]
            })
            .collect()
    }

    fn tokenize<'a>(&'a self, line: &'a str) -> impl Iterator<Item = &'a str> {
        self.token_re.find_iter(line).map(|m| m.as_str())
    }

    /// A "day" relation whose object is a comma-separated list of
    /// two or three day names, e.g. "monday, tuesday".
    fn is_day_list(&self, relation: &str, object: &str) -> bool {
        let parts = object.split(',').count();
        relation.contains("day") && (2..=3).contains(&parts)
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite every occurrence of `value` in `line` to the k-th
/// placeholder and remember the original text. Placeholder keys are
/// numbered per match event; a colliding key is overwritten, so the
/// later row wins.
fn substitute(
    line:     &mut String,
    value:    &str,
    k:        usize,
    entities: &mut HashMap<String, String>,
) {
    let placeholder = format!("_entity_{k}_");
    *line = line.replace(value, &placeholder);
    entities.insert(placeholder, value.to_string());
}
