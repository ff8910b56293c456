// ============================================================
// Layer 4 — Corpus Builder
// ============================================================
// Walks every conversation from a source, runs the entity
// extractor, and accumulates per-turn samples into the three
// partitions.
//
// Input accumulation: within one conversation, the input of the
// n-th sample is the full dialogue history so far —
//
//   prev_input <eou> prev_reply <eou> current_driver_utterance
//
// so later samples carry everything said before them. The target
// is always the current assistant reply on its own.
//
// Raw utterance text for training/validation samples is mirrored
// alongside for human inspection of the extraction.

use anyhow::Result;

use crate::data::dataset::{DialogDataset, Partition, RawSample, Sample};
use crate::data::tokenizer::EntityExtractor;
use crate::data::vocabulary::{Vocabulary, WordId};
use crate::domain::conversation::{Conversation, Speaker};
use crate::domain::traits::ConversationSource;

/// Sequences at or above this length are truncated when the
/// truncate option is on: inputs keep their tail, targets their head.
pub const TRUNCATE_LEN: usize = 40;

pub struct CorpusBuilder {
    extractor: EntityExtractor,
    truncate:  bool,

    vocab:      Vocabulary,
    training:   Vec<Sample>,
    validation: Vec<Sample>,
    test:       Vec<Sample>,

    raw_training:   Vec<RawSample>,
    raw_validation: Vec<RawSample>,
}

impl CorpusBuilder {
    pub fn new(truncate: bool) -> Self {
        Self {
            extractor:      EntityExtractor::new(),
            truncate,
            vocab:          Vocabulary::new(),
            training:       Vec::new(),
            validation:     Vec::new(),
            test:           Vec::new(),
            raw_training:   Vec::new(),
            raw_validation: Vec::new(),
        }
    }

    /// Extract every conversation of `source` into `partition`.
    pub fn ingest(&mut self, source: &dyn ConversationSource, partition: Partition) -> Result<()> {
        let conversations = source.conversations()?;
        tracing::info!(
            "Extracting {} conversations into {:?}",
            conversations.len(),
            partition
        );
        for conversation in &conversations {
            self.extract_conversation(conversation, partition);
        }
        Ok(())
    }

    /// Consume the builder, yielding the dataset and the raw-text
    /// mirrors of the training and validation partitions.
    pub fn finish(self) -> (DialogDataset, Vec<RawSample>, Vec<RawSample>) {
        let data = DialogDataset::new(self.vocab, self.training, self.validation, self.test);
        (data, self.raw_training, self.raw_validation)
    }

    /// Walk driver/assistant turn pairs in stride 2 from the first
    /// driver turn, emitting one sample per pair.
    fn extract_conversation(&mut self, conversation: &Conversation, partition: Partition) {
        let triples = self.extractor.extract_kb(&mut self.vocab, &conversation.kb);

        let lines = &conversation.lines;
        let start = match lines.iter().position(|l| l.speaker == Speaker::Driver) {
            Some(index) => index,
            None => return,
        };

        let mut input_history: Vec<WordId> = Vec::new();
        let mut prev_target:   Vec<WordId> = Vec::new();
        let mut input_text  = String::new();
        let mut target_text = String::new();
        let mut first = true;

        let mut i = start;
        while i + 1 < lines.len() {
            let driver = &lines[i];
            let reply  = &lines[i + 1];
            i += 2;
            if driver.speaker != Speaker::Driver || reply.speaker != Speaker::Assistant {
                continue;
            }

            if !first {
                // History grows by the previous reply, bracketed by
                // end-of-utterance markers.
                input_history.push(self.vocab.eou_token);
                input_history.extend(prev_target.iter().copied());
                input_history.push(self.vocab.eou_token);

                input_text.push_str(" <eou> ");
                input_text.push_str(&target_text);
                input_text.push_str(" <eou> ");
            }

            input_history.extend(self.extractor.extract_text(
                &mut self.vocab,
                &driver.utterance,
                &conversation.kb,
                true,
            ));
            prev_target = self.extractor.extract_text(
                &mut self.vocab,
                &reply.utterance,
                &conversation.kb,
                true,
            );

            input_text.push_str(&driver.utterance);
            target_text = reply.utterance.clone();

            self.push_sample(
                partition,
                input_history.clone(),
                prev_target.clone(),
                triples.clone(),
                RawSample { input: input_text.clone(), target: target_text.clone() },
            );
            first = false;
        }
    }

    fn push_sample(
        &mut self,
        partition:  Partition,
        mut input:  Vec<WordId>,
        mut target: Vec<WordId>,
        triples:    Vec<[WordId; 3]>,
        raw:        RawSample,
    ) {
        // Test samples are never truncated; training/validation only
        // when the option was requested.
        if self.truncate && partition != Partition::Test {
            if input.len() >= TRUNCATE_LEN {
                input.drain(..input.len() - TRUNCATE_LEN);
            }
            if target.len() >= TRUNCATE_LEN {
                target.truncate(TRUNCATE_LEN);
            }
        }

        let sample = Sample { input_ids: input, target_ids: target, kb_triples: triples };
        match partition {
            Partition::Training => {
                self.training.push(sample);
                self.raw_training.push(raw);
            }
            Partition::Validation => {
                self.validation.push(sample);
                self.raw_validation.push(raw);
            }
            Partition::Test => self.test.push(sample),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{KbRow, TurnLine};
    use std::collections::BTreeMap;

    struct FixedSource(Vec<Conversation>);

    impl ConversationSource for FixedSource {
        fn conversations(&self) -> Result<Vec<Conversation>> {
            Ok(self.0.clone())
        }
    }

    fn turn(speaker: Speaker, utterance: &str) -> TurnLine {
        TurnLine { speaker, utterance: utterance.to_string(), slots: BTreeMap::new() }
    }

    fn two_turn_conversation() -> Conversation {
        Conversation::new(
            vec![
                turn(Speaker::Driver, "where is my dinner"),
                turn(Speaker::Assistant, "dinner is at home"),
                turn(Speaker::Driver, "thanks"),
                turn(Speaker::Assistant, "you are welcome"),
            ],
            vec![KbRow::new("dinner", "room", "home")],
            Some("schedule".to_string()),
        )
    }

    #[test]
    fn test_history_accumulates_with_eou_separators() {
        let mut builder = CorpusBuilder::new(false);
        let source = FixedSource(vec![two_turn_conversation()]);
        builder.ingest(&source, Partition::Training).unwrap();
        let (data, raw_train, _) = builder.finish();

        assert_eq!(data.training.len(), 2);
        assert_eq!(raw_train.len(), 2);

        let first = &data.training[0];
        let second = &data.training[1];
        let eou = data.vocab.eou_token;

        // Second input = first input + <eou> + first target + <eou> + "thanks"
        let mut expected = first.input_ids.clone();
        expected.push(eou);
        expected.extend(first.target_ids.iter().copied());
        expected.push(eou);
        expected.push(data.vocab.id_of("thanks").unwrap());
        assert_eq!(second.input_ids, expected);

        // Both samples carry the conversation's KB triples.
        assert_eq!(first.kb_triples.len(), 1);
        assert_eq!(second.kb_triples, first.kb_triples);
    }

    #[test]
    fn test_partition_routing() {
        let mut builder = CorpusBuilder::new(false);
        let source = FixedSource(vec![two_turn_conversation()]);
        builder.ingest(&source, Partition::Validation).unwrap();
        builder.ingest(&source, Partition::Test).unwrap();
        let (data, raw_train, raw_valid) = builder.finish();

        assert!(data.training.is_empty());
        assert_eq!(data.validation.len(), 2);
        assert_eq!(data.test.len(), 2);
        assert!(raw_train.is_empty());
        assert_eq!(raw_valid.len(), 2);
    }

    fn long_conversation() -> Conversation {
        let long_line = vec!["word"; 50].join(" ");
        Conversation::new(
            vec![
                turn(Speaker::Driver, &long_line),
                turn(Speaker::Assistant, &long_line),
            ],
            Vec::new(),
            None,
        )
    }

    #[test]
    fn test_truncation_keeps_input_tail_and_target_head() {
        let mut builder = CorpusBuilder::new(true);
        let source = FixedSource(vec![long_conversation()]);
        builder.ingest(&source, Partition::Training).unwrap();
        let (data, _, _) = builder.finish();

        let sample = &data.training[0];
        assert_eq!(sample.input_ids.len(), TRUNCATE_LEN);
        assert_eq!(sample.target_ids.len(), TRUNCATE_LEN);
    }

    #[test]
    fn test_test_partition_is_never_truncated() {
        let mut builder = CorpusBuilder::new(true);
        let source = FixedSource(vec![long_conversation()]);
        builder.ingest(&source, Partition::Test).unwrap();
        let (data, _, _) = builder.finish();

        assert_eq!(data.test[0].input_ids.len(), 50);
        assert_eq!(data.test[0].target_ids.len(), 50);
    }
}
