// ============================================================
// Layer 4 — Dialogue Dataset
// ============================================================
// The product of corpus extraction: one vocabulary plus three
// disjoint sample partitions. Partitions are populated once
// during the corpus build and never merged.
//
// This struct is exactly what the dataset store persists; the
// reserved-token ids on the vocabulary are re-derived after a
// load rather than stored.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::data::vocabulary::{Vocabulary, WordId};

/// One training example extracted from a conversation turn.
///
/// `input_ids` is the dialogue history up to the current driver
/// turn, `<eou>`-separated. `target_ids` is the assistant reply,
/// without `<go>`/`<eos>` — those are added at batch time.
/// `kb_triples` holds one (subject, relation, object) id tuple per
/// knowledge-base row of the source conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub input_ids:  Vec<WordId>,
    pub target_ids: Vec<WordId>,
    pub kb_triples: Vec<[WordId; 3]>,
}

/// Raw utterance strings mirroring a sample, kept only for human
/// inspection of the extracted corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    pub input:  String,
    pub target: String,
}

/// Which of the three disjoint sample sets to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    Training,
    Validation,
    Test,
}

/// Vocabulary + the three sample partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogDataset {
    pub vocab:      Vocabulary,
    pub training:   Vec<Sample>,
    pub validation: Vec<Sample>,
    pub test:       Vec<Sample>,
}

impl DialogDataset {
    pub fn new(
        vocab:      Vocabulary,
        training:   Vec<Sample>,
        validation: Vec<Sample>,
        test:       Vec<Sample>,
    ) -> Self {
        Self { vocab, training, validation, test }
    }

    pub fn partition(&self, which: Partition) -> &[Sample] {
        match which {
            Partition::Training   => &self.training,
            Partition::Validation => &self.validation,
            Partition::Test       => &self.test,
        }
    }

    pub fn partition_mut(&mut self, which: Partition) -> &mut Vec<Sample> {
        match which {
            Partition::Training   => &mut self.training,
            Partition::Validation => &mut self.validation,
            Partition::Test       => &mut self.test,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.training.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocab.len()
    }

    /// Shuffle all three partitions, each with its own pass so the
    /// orderings stay independent of one another.
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.training.shuffle(&mut rng);
        self.validation.shuffle(&mut rng);
        self.test.shuffle(&mut rng);
    }
}
