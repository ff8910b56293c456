// ============================================================
// Layer 2 — Chat Use Case
// ============================================================
// Loads the filtered dataset cache and the latest checkpoint,
// then answers free-text queries with greedy decoding.
//
// The dataset must come from the filtered cache: the checkpoint
// was trained against the filtered id space, and the vocabulary
// is consulted read-only (unknown words map to <unknown>).

use anyhow::Result;

use crate::data::dataset::DialogDataset;
use crate::data::store::DatasetStore;
use crate::data::tokenizer::EntityExtractor;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Inferencer;

pub struct ChatUseCase {
    data:       DialogDataset,
    extractor:  EntityExtractor,
    inferencer: Inferencer,
}

impl ChatUseCase {
    pub fn new(samples_dir: &str, checkpoint_dir: &str) -> Result<Self> {
        let store = DatasetStore::new(samples_dir);
        let data  = store.load_filtered()?;

        let ckpt_manager = CheckpointManager::new(checkpoint_dir);
        let inferencer = Inferencer::from_checkpoint(&ckpt_manager, data.vocabulary_size())?;

        Ok(Self {
            data,
            extractor: EntityExtractor::new(),
            inferencer,
        })
    }

    /// Answer one query. Oversized or empty queries surface as
    /// errors for the caller to report; they are never fatal.
    pub fn respond(&mut self, question: &str) -> Result<String> {
        self.inferencer.respond(&mut self.data, &self.extractor, question)
    }
}
