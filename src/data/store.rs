// ============================================================
// Layer 4 — Dataset Store
// ============================================================
// Persists and restores the extracted dataset (vocabulary maps,
// usage counters, three partitions) as JSON, and owns the
// two-tier cache policy:
//
//   filtered cache exists  → load it, done
//   full cache exists      → load, filter, write filtered
//   neither                → build from the corpus source,
//                            write full, filter, write filtered
//
// The split exists so changing the vocabulary cap never re-runs
// the expensive corpus extraction.
//
// Cache writes are write-then-rename: a partially written file is
// never visible under the cache name, so an interrupted run can
// not poison the next one.

use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::data::corpus::CorpusBuilder;
use crate::data::dataset::{DialogDataset, Partition, RawSample};
use crate::data::filter::filter_to_vocabulary_size;
use crate::domain::traits::ConversationSource;

pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn full_path(&self) -> PathBuf {
        self.dir.join("dataset-kvret.json")
    }

    pub fn filtered_path(&self) -> PathBuf {
        self.dir.join("dataset-kvret-filtered.json")
    }

    /// Resolve the cache, building whatever stages are missing.
    pub fn load_or_build(
        &self,
        train:     &dyn ConversationSource,
        valid:     &dyn ConversationSource,
        test:      &dyn ConversationSource,
        vocab_cap: usize,
        truncate:  bool,
    ) -> Result<DialogDataset> {
        let filtered_path = self.filtered_path();
        if filtered_path.exists() {
            return self.load(&filtered_path);
        }
        tracing::info!("Filtered samples not found. Creating dataset...");

        let full_path = self.full_path();
        let mut data = if full_path.exists() {
            self.load(&full_path)?
        } else {
            tracing::info!("Constructing full dataset...");
            let mut builder = CorpusBuilder::new(truncate);
            builder.ingest(train, Partition::Training)?;
            builder.ingest(valid, Partition::Validation)?;
            builder.ingest(test, Partition::Test)?;
            let (data, raw_training, raw_validation) = builder.finish();

            self.save(&full_path, &data)?;
            self.write_mirror("train.txt", &raw_training)?;
            self.write_mirror("valid.txt", &raw_validation)?;
            data
        };

        tracing::info!(
            "Filtering words (vocabulary size = {}, cap = {})",
            data.vocabulary_size(),
            vocab_cap
        );
        filter_to_vocabulary_size(&mut data, vocab_cap)?;
        self.save(&filtered_path, &data)?;
        Ok(data)
    }

    /// Load the filtered cache, the only stage inference needs.
    pub fn load_filtered(&self) -> Result<DialogDataset> {
        let path = self.filtered_path();
        self.load(&path).with_context(|| {
            format!(
                "no filtered dataset at '{}'. Run 'train' first to build the cache.",
                path.display()
            )
        })
    }

    pub fn load(&self, path: &Path) -> Result<DialogDataset> {
        tracing::info!("Loading dataset from '{}'", path.display());
        let json = fs::read_to_string(path)
            .with_context(|| format!("cannot read dataset cache '{}'", path.display()))?;
        let mut data: DialogDataset = serde_json::from_str(&json)
            .with_context(|| format!("corrupt dataset cache '{}'", path.display()))?;

        // The reserved ids are not stored; a cache they cannot be
        // derived from is corrupt and must not load.
        data.vocab
            .restore_reserved()
            .with_context(|| format!("corrupt dataset cache '{}'", path.display()))?;
        Ok(data)
    }

    /// Serialize the dataset, all-or-nothing.
    pub fn save(&self, path: &Path, data: &DialogDataset) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create samples directory '{}'", self.dir.display()))?;

        let json = serde_json::to_string(data)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("cannot write dataset cache '{}'", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("cannot move dataset cache into '{}'", path.display()))?;

        tracing::debug!("Saved dataset cache '{}'", path.display());
        Ok(())
    }

    /// Tab-delimited dump of raw sample text, for human inspection
    /// only — never read back by the pipeline.
    fn write_mirror(&self, name: &str, samples: &[RawSample]) -> Result<()> {
        let path = self.dir.join(name);
        let mut file = fs::File::create(&path)
            .with_context(|| format!("cannot create mirror file '{}'", path.display()))?;
        for sample in samples {
            writeln!(file, "{}\t{}", sample.input, sample.target)?;
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{Conversation, KbRow, Speaker, TurnLine};
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

    fn source() -> FixedSource {
        FixedSource(vec![Conversation::new(
            vec![
                turn(Speaker::Driver, "what time is my dinner"),
                turn(Speaker::Assistant, "dinner is at 8pm"),
            ],
            vec![KbRow::new("dinner", "time", "8pm")],
            Some("schedule".to_string()),
        )])
    }

    #[test]
    fn test_save_load_round_trip_restores_reserved_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());

        let mut builder = CorpusBuilder::new(false);
        builder.ingest(&source(), Partition::Training).unwrap();
        let (data, _, _) = builder.finish();

        let path = store.full_path();
        store.save(&path, &data).unwrap();
        let restored = store.load(&path).unwrap();

        assert_eq!(restored.training, data.training);
        assert_eq!(restored.vocab.pad_token, data.vocab.pad_token);
        assert_eq!(restored.vocab.eos_token, data.vocab.eos_token);
        assert_eq!(restored.vocab.unknown_token, data.vocab.unknown_token);
        assert_eq!(restored.vocabulary_size(), data.vocabulary_size());
    }

    #[test]
    fn test_missing_reserved_token_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());

        let mut builder = CorpusBuilder::new(false);
        builder.ingest(&source(), Partition::Training).unwrap();
        let (data, _, _) = builder.finish();

        let path = store.full_path();
        store.save(&path, &data).unwrap();

        // Corrupt the artifact: rename <unknown> away.
        let json = fs::read_to_string(&path).unwrap().replace("<unknown>", "<gone>");
        fs::write(&path, json).unwrap();

        assert!(store.load(&path).is_err());
    }

    #[test]
    fn test_two_tier_cache_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let src = source();

        // Cold start: builds both stages plus the raw mirrors.
        let built = store.load_or_build(&src, &src, &src, 0, false).unwrap();
        assert!(store.full_path().exists());
        assert!(store.filtered_path().exists());
        assert!(dir.path().join("train.txt").exists());
        assert_eq!(built.training.len(), 1);

        // Warm start resolves straight from the filtered cache, even
        // with a source that would fail if it were consulted.
        struct FailingSource;
        impl ConversationSource for FailingSource {
            fn conversations(&self) -> Result<Vec<Conversation>> {
                anyhow::bail!("source must not be read on a warm start")
            }
        }
        let reloaded = store
            .load_or_build(&FailingSource, &FailingSource, &FailingSource, 0, false)
            .unwrap();
        assert_eq!(reloaded.training.len(), built.training.len());

        // Dropping only the filtered stage re-filters from the full
        // cache without touching the source.
        fs::remove_file(store.filtered_path()).unwrap();
        let refiltered = store
            .load_or_build(&FailingSource, &FailingSource, &FailingSource, 0, false)
            .unwrap();
        assert_eq!(refiltered.training.len(), built.training.len());
        assert!(store.filtered_path().exists());
    }
}
