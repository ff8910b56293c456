// ============================================================
// Layer 4 — Vocabulary Filter
// ============================================================
// Re-derives a frequency-capped vocabulary and remaps every
// sample onto the new compact id space.
//
// Membership is decided by rank (count descending, ties by
// ascending original id), but the NEW ids are assigned in
// ascending original-id order — relative order among kept ids
// is preserved. Dropped ids map to the unknown token.
//
// The old-to-new table lives only inside this pass; it is built,
// applied, and discarded, never kept as ambient state.
//
// kb_triples keep their full-vocabulary ids. Downstream code
// that reads triples must use the pre-filter vocabulary or treat
// triple ids as opaque keys.

use anyhow::{anyhow, Result};
use std::collections::HashSet;

use crate::data::dataset::{DialogDataset, Sample};
use crate::data::vocabulary::{WordId, UNKNOWN_WORD};

/// Cap the vocabulary at `cap` non-reserved words (0 keeps all)
/// and remap every partition's samples.
///
/// A sample survives only if, after remapping, its input contains
/// at least one non-unknown id, its target contains at least one
/// non-unknown id, and its target contains NO unknown id at all.
/// Out-of-vocabulary input words are tolerated; out-of-vocabulary
/// target words invalidate the sample.
pub fn filter_to_vocabulary_size(data: &mut DialogDataset, cap: usize) -> Result<()> {
    let old_len = data.vocab.len();

    // ── Step 1: decide membership by rank ─────────────────────────────────────
    let ranked = data.vocab.ranked_ids();
    let keep_n = if cap == 0 { ranked.len() } else { cap };
    let mut selected: HashSet<WordId> = ranked
        .iter()
        .copied()
        .filter(|&id| data.vocab.count_of(id) > 0)
        .take(keep_n)
        .collect();
    selected.extend([
        data.vocab.pad_token,
        data.vocab.go_token,
        data.vocab.eou_token,
        data.vocab.eos_token,
        data.vocab.unknown_token,
    ]);

    // ── Step 2: build the remap table and the new vocabulary ──────────────────
    let mut mapping: Vec<Option<WordId>> = vec![None; old_len];
    let mut word2id  = std::collections::HashMap::new();
    let mut id2word  = std::collections::HashMap::new();
    let mut id_count = std::collections::HashMap::new();
    let mut next_id = 0;

    for old_id in 0..old_len {
        if !selected.contains(&old_id) {
            continue;
        }
        if let Some(word) = data.vocab.word_of(old_id) {
            mapping[old_id] = Some(next_id);
            word2id.insert(word.to_string(), next_id);
            id2word.insert(next_id, word.to_string());
            id_count.insert(next_id, data.vocab.count_of(old_id));
            next_id += 1;
        }
    }

    let unknown = *word2id
        .get(UNKNOWN_WORD)
        .ok_or_else(|| anyhow!("filter lost the reserved '{UNKNOWN_WORD}' token"))?;

    data.vocab.replace_tables(word2id, id2word, id_count);
    data.vocab.restore_reserved()?;

    // ── Step 3: remap samples, dropping the ones reduced to nothing ───────────
    let mut dropped_ids = Vec::new();
    let dropped = remap_partition(&mut data.training, &mapping, unknown, &mut dropped_ids)
        + remap_partition(&mut data.validation, &mapping, unknown, &mut dropped_ids)
        + remap_partition(&mut data.test, &mapping, unknown, &mut dropped_ids);

    // A dropped sample's words are no longer used anywhere; keep
    // the counters honest.
    for id in dropped_ids {
        data.vocab.decrement_count(id);
    }

    tracing::info!(
        "Vocabulary filtered: {} -> {} words, {} samples dropped",
        old_len,
        data.vocab.len(),
        dropped
    );
    Ok(())
}

/// Remap one partition in place. The word ids of dropped samples are
/// appended to `dropped_ids` so their usage counters can be
/// decremented. Returns how many samples were dropped.
fn remap_partition(
    samples:     &mut Vec<Sample>,
    mapping:     &[Option<WordId>],
    unknown:     WordId,
    dropped_ids: &mut Vec<WordId>,
) -> usize {
    let before = samples.len();
    let mut kept = Vec::with_capacity(before);

    for mut sample in samples.drain(..) {
        let input_valid  = remap_sequence(&mut sample.input_ids, mapping, unknown);
        let target_valid = remap_sequence(&mut sample.target_ids, mapping, unknown);
        let target_clean = !sample.target_ids.contains(&unknown);

        if input_valid && target_valid && target_clean {
            kept.push(sample);
        } else {
            dropped_ids.extend(sample.input_ids.iter().copied());
            dropped_ids.extend(sample.target_ids.iter().copied());
        }
    }

    let dropped = before - kept.len();
    *samples = kept;
    dropped
}

/// Rewrite a sequence through the remap table. Returns whether the
/// result contains at least one non-unknown id.
fn remap_sequence(seq: &mut [WordId], mapping: &[Option<WordId>], unknown: WordId) -> bool {
    let mut valid = false;
    for id in seq.iter_mut() {
        *id = mapping.get(*id).copied().flatten().unwrap_or(unknown);
        if *id != unknown {
            valid = true;
        }
    }
    valid
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocabulary::Vocabulary;

    /// Vocabulary with words at chosen usage counts, plus samples.
    fn vocab_with(words: &[(&str, usize)]) -> Vocabulary {
        let mut vocab = Vocabulary::new();
        for (word, count) in words {
            for _ in 0..*count {
                vocab.get_or_create_id(word, true);
            }
        }
        vocab
    }

    fn sample(input: Vec<WordId>, target: Vec<WordId>) -> Sample {
        Sample { input_ids: input, target_ids: target, kb_triples: Vec::new() }
    }

    #[test]
    fn test_reserved_tokens_survive_cap_of_one() {
        let vocab = vocab_with(&[("alpha", 3), ("beta", 1)]);
        let mut data = DialogDataset::new(vocab, Vec::new(), Vec::new(), Vec::new());
        filter_to_vocabulary_size(&mut data, 1).unwrap();

        for word in ["<pad>", "<go>", "<eou>", "<eos>", "<unknown>"] {
            assert!(data.vocab.id_of(word).is_some(), "{word} was filtered out");
        }
        // cap 1: only "alpha" kept among non-reserved words.
        assert!(data.vocab.id_of("alpha").is_some());
        assert!(data.vocab.id_of("beta").is_none());
        assert_eq!(data.vocab.len(), 6);
    }

    #[test]
    fn test_cap_zero_keeps_all_words_and_samples() {
        let mut vocab = vocab_with(&[("alpha", 2), ("beta", 1)]);
        let a = vocab.id_of("alpha").unwrap();
        let b = vocab.id_of("beta").unwrap();
        let mut data = DialogDataset::new(
            vocab,
            vec![sample(vec![a, b], vec![a]), sample(vec![b], vec![b])],
            Vec::new(),
            Vec::new(),
        );
        let words_before = data.vocab.len();

        filter_to_vocabulary_size(&mut data, 0).unwrap();

        assert_eq!(data.vocab.len(), words_before);
        assert_eq!(data.training.len(), 2);
    }

    #[test]
    fn test_new_ids_preserve_original_order_among_kept() {
        // "rare" is created before "common" but ranks below it;
        // both are kept, and the new ids keep the creation order.
        let vocab = vocab_with(&[("rare", 1), ("common", 5)]);
        let mut data = DialogDataset::new(vocab, Vec::new(), Vec::new(), Vec::new());
        filter_to_vocabulary_size(&mut data, 2).unwrap();

        let rare = data.vocab.id_of("rare").unwrap();
        let common = data.vocab.id_of("common").unwrap();
        assert!(rare < common);
        // Dense id space: 5 reserved + 2 kept.
        assert_eq!(data.vocab.len(), 7);
        assert_eq!(rare, 5);
        assert_eq!(common, 6);
    }

    #[test]
    fn test_unknown_target_invalidates_sample_but_unknown_input_does_not() {
        let vocab = vocab_with(&[("common", 5), ("rare", 1)]);
        let common = vocab.id_of("common").unwrap();
        let rare = vocab.id_of("rare").unwrap();
        let mut data = DialogDataset::new(
            vocab,
            vec![
                // rare in the input: tolerated
                sample(vec![rare, common], vec![common]),
                // rare in the target: dropped
                sample(vec![common], vec![rare, common]),
            ],
            Vec::new(),
            Vec::new(),
        );

        filter_to_vocabulary_size(&mut data, 1).unwrap();

        assert_eq!(data.training.len(), 1);
        let kept = &data.training[0];
        assert!(kept.input_ids.contains(&data.vocab.unknown_token));
        assert!(!kept.target_ids.contains(&data.vocab.unknown_token));
    }

    #[test]
    fn test_all_unknown_sequences_are_dropped() {
        let vocab = vocab_with(&[("common", 5), ("rare", 1)]);
        let common = vocab.id_of("common").unwrap();
        let rare = vocab.id_of("rare").unwrap();
        let mut data = DialogDataset::new(
            vocab,
            vec![sample(vec![rare], vec![common]), sample(vec![], vec![common])],
            Vec::new(),
            Vec::new(),
        );

        filter_to_vocabulary_size(&mut data, 1).unwrap();
        assert!(data.training.is_empty());
    }

    #[test]
    fn test_kb_triples_keep_full_vocabulary_ids() {
        let vocab = vocab_with(&[("common", 5), ("rare", 1)]);
        let common = vocab.id_of("common").unwrap();
        let rare = vocab.id_of("rare").unwrap();
        let mut data = DialogDataset::new(
            vocab,
            vec![Sample {
                input_ids:  vec![common],
                target_ids: vec![common],
                kb_triples: vec![[rare, common, rare]],
            }],
            Vec::new(),
            Vec::new(),
        );

        filter_to_vocabulary_size(&mut data, 1).unwrap();

        // The triple still holds pre-filter ids, untouched by the remap.
        assert_eq!(data.training[0].kb_triples, vec![[rare, common, rare]]);
    }

    #[test]
    fn test_remap_applies_to_validation_and_test() {
        let vocab = vocab_with(&[("common", 5), ("rare", 1)]);
        let common = vocab.id_of("common").unwrap();
        let rare = vocab.id_of("rare").unwrap();
        let mut data = DialogDataset::new(
            vocab,
            Vec::new(),
            vec![sample(vec![common], vec![rare])],
            vec![sample(vec![common], vec![common])],
        );

        filter_to_vocabulary_size(&mut data, 1).unwrap();

        assert!(data.validation.is_empty());
        assert_eq!(data.test.len(), 1);
        let new_common = data.vocab.id_of("common").unwrap();
        assert_eq!(data.test[0].input_ids, vec![new_common]);
    }
}
