// ============================================================
// Layer 4 — Batcher
// ============================================================
// Slices a shuffled partition into fixed-size groups and turns
// each group into a rectangular Batch:
//
//   encoder_seqs  left-padded inputs
//   decoder_seqs  <go> + target + <eos>, right-padded
//   target_seqs   decoder_seqs shifted left by one
//   weights       1.0 over real target positions, 0.0 over padding
//   kb_inputs     per-sample triple lists, unpadded
//
// Pad widths are the maxima over the ENTIRE active partition, not
// per batch, so every batch in one call has the same shape.
//
// The final batch of every call is discarded on purpose: trailing
// short batches would break consumers compiled for a fixed batch
// shape. When the partition size is an exact multiple of the batch
// size this throws away a full batch of data — see the DESIGN
// notes before "fixing" it.

use anyhow::{bail, Result};

use crate::data::dataset::{DialogDataset, Partition, Sample};
use crate::data::tokenizer::EntityExtractor;
use crate::data::vocabulary::{Vocabulary, WordId};

/// One rectangular slice of a partition, ready for tensor
/// conversion. Immutable once built; never reused across steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub encoder_seqs:     Vec<Vec<WordId>>,
    pub encoder_seqs_len: Vec<usize>,
    pub decoder_seqs:     Vec<Vec<WordId>>,
    pub decoder_seqs_len: Vec<usize>,
    pub target_seqs:      Vec<Vec<WordId>>,
    pub weights:          Vec<Vec<f32>>,
    pub kb_inputs:        Vec<Vec<[WordId; 3]>>,
}

impl Batch {
    /// Number of samples in the batch. With `transpose` the outer
    /// axis is time, so the sample count lives in the inner rows.
    pub fn len(&self) -> usize {
        self.encoder_seqs_len.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder_seqs_len.is_empty()
    }
}

/// Prepare the batches for one epoch over `partition`.
///
/// All three partitions are reshuffled (each with its own pass),
/// the chosen one is cut into `batch_size` groups, each group is
/// sorted by descending input length, and the last batch is
/// dropped unconditionally.
pub fn get_batches(
    data:       &mut DialogDataset,
    partition:  Partition,
    batch_size: usize,
    transpose:  bool,
) -> Vec<Batch> {
    if batch_size == 0 {
        return Vec::new();
    }
    data.shuffle();

    let samples = data.partition(partition);
    if samples.is_empty() {
        return Vec::new();
    }

    let (max_input, max_target, max_triples) = pad_targets(samples);

    let mut batches: Vec<Batch> = samples
        .chunks(batch_size)
        .map(|group| create_batch(group, &data.vocab, max_input, max_target, max_triples, transpose))
        .collect();

    // Intentional: trailing batch is discarded regardless of size.
    batches.pop();
    batches
}

/// Maxima over a whole partition: input length, target length,
/// KB-triple count. These become the pad targets for every batch
/// of one get_batches call.
fn pad_targets(samples: &[Sample]) -> (usize, usize, usize) {
    let max_input   = samples.iter().map(|s| s.input_ids.len()).max().unwrap_or(0);
    let max_target  = samples.iter().map(|s| s.target_ids.len()).max().unwrap_or(0);
    let max_triples = samples.iter().map(|s| s.kb_triples.len()).max().unwrap_or(0);
    (max_input, max_target, max_triples)
}

/// Assemble one group of samples into a Batch.
pub(crate) fn create_batch(
    group:       &[Sample],
    vocab:       &Vocabulary,
    max_input:   usize,
    max_target:  usize,
    max_triples: usize,
    transpose:   bool,
) -> Batch {
    // Length-sorted batches are required by downstream
    // packed-sequence consumers.
    let mut group: Vec<&Sample> = group.iter().collect();
    group.sort_by(|a, b| b.input_ids.len().cmp(&a.input_ids.len()));

    let decoder_width = max_target + 2;
    let mut batch = Batch {
        encoder_seqs:     Vec::with_capacity(group.len()),
        encoder_seqs_len: Vec::with_capacity(group.len()),
        decoder_seqs:     Vec::with_capacity(group.len()),
        decoder_seqs_len: Vec::with_capacity(group.len()),
        target_seqs:      Vec::with_capacity(group.len()),
        weights:          Vec::with_capacity(group.len()),
        kb_inputs:        Vec::with_capacity(group.len()),
    };

    for sample in &group {
        let input_len  = sample.input_ids.len();
        let target_len = sample.target_ids.len();
        debug_assert!(input_len <= max_input);
        debug_assert!(target_len <= max_target);
        debug_assert!(sample.kb_triples.len() <= max_triples);

        // Left padding for the encoder input.
        let mut encoder = vec![vocab.pad_token; max_input - input_len];
        encoder.extend(sample.input_ids.iter().copied());

        // <go> + target + <eos>, right-padded.
        let mut decoder = Vec::with_capacity(decoder_width);
        decoder.push(vocab.go_token);
        decoder.extend(sample.target_ids.iter().copied());
        decoder.push(vocab.eos_token);
        decoder.resize(decoder_width, vocab.pad_token);

        // Same as the decoder row, shifted left by one (no <go>).
        let mut target = decoder[1..].to_vec();
        target.resize(decoder_width, vocab.pad_token);

        // target_len + 1 real positions: the target plus its <eos>.
        let mut weights = vec![1.0f32; target_len + 1];
        weights.resize(decoder_width, 0.0);

        batch.encoder_seqs.push(encoder);
        batch.encoder_seqs_len.push(input_len);
        batch.decoder_seqs.push(decoder);
        batch.decoder_seqs_len.push(target_len + 2);
        batch.target_seqs.push(target);
        batch.weights.push(weights);
        batch.kb_inputs.push(sample.kb_triples.clone());
    }

    if transpose {
        batch.encoder_seqs = transpose_rows(&batch.encoder_seqs);
        batch.decoder_seqs = transpose_rows(&batch.decoder_seqs);
        batch.target_seqs  = transpose_rows(&batch.target_seqs);
        batch.weights      = transpose_rows(&batch.weights);
        // kb_inputs and the length vectors stay sample-major.
    }

    batch
}

/// Sample-major to time-major: out[t][b] = rows[b][t]. All rows
/// have the same (statically known) width by construction.
fn transpose_rows<T: Copy>(rows: &[Vec<T>]) -> Vec<Vec<T>> {
    let width = rows.first().map_or(0, Vec::len);
    (0..width)
        .map(|t| rows.iter().map(|row| row[t]).collect())
        .collect()
}

/// Encode a free-text query as a single-sample Batch for inference.
///
/// Vocabulary lookups never create entries: unknown words resolve
/// to the unknown token. A query longer than `max_length` tokens is
/// reported as unencodable rather than truncated.
pub fn encode_query(
    vocab:      &mut Vocabulary,
    extractor:  &EntityExtractor,
    line:       &str,
    max_length: usize,
) -> Result<Batch> {
    if line.trim().is_empty() {
        bail!("cannot encode an empty query");
    }

    let ids = extractor.extract_text(vocab, line, &[], false);
    if ids.len() > max_length {
        bail!(
            "cannot encode: query is {} tokens, the maximum is {}",
            ids.len(),
            max_length
        );
    }

    let sample = Sample { input_ids: ids, target_ids: Vec::new(), kb_triples: Vec::new() };
    let max_input = sample.input_ids.len();
    Ok(create_batch(&[sample], vocab, max_input, 0, 0, false))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        let mut vocab = Vocabulary::new();
        for word in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            vocab.get_or_create_id(word, true);
        }
        vocab
    }

    fn sample(input: Vec<WordId>, target: Vec<WordId>) -> Sample {
        Sample { input_ids: input, target_ids: target, kb_triples: Vec::new() }
    }

    /// Input lengths [3, 5, 2] for the padding round-trip checks.
    fn uneven_samples() -> Vec<Sample> {
        vec![
            sample(vec![5, 6, 7], vec![5]),
            sample(vec![5, 6, 7, 8, 9], vec![6, 7]),
            sample(vec![8, 9], vec![5, 6, 7, 8]),
        ]
    }

    #[test]
    fn test_left_padding_round_trip() {
        let vocab = vocab();
        let samples = uneven_samples();
        let batch = create_batch(&samples, &vocab, 5, 4, 0, false);

        // Sorted by descending input length: [5, 3, 2].
        assert_eq!(batch.encoder_seqs_len, vec![5, 3, 2]);
        for row in &batch.encoder_seqs {
            assert_eq!(row.len(), 5);
        }
        // Width 5 - len 3 = 2 pads, then the original tokens in order.
        assert_eq!(batch.encoder_seqs[1], vec![vocab.pad_token, vocab.pad_token, 5, 6, 7]);
        assert_eq!(batch.encoder_seqs[2], vec![vocab.pad_token, vocab.pad_token, vocab.pad_token, 8, 9]);
    }

    #[test]
    fn test_decoder_and_target_framing() {
        let vocab = vocab();
        let samples = vec![sample(vec![5], vec![6, 7])];
        let batch = create_batch(&samples, &vocab, 1, 3, 0, false);

        // Width is max_target + 2.
        assert_eq!(batch.decoder_seqs[0].len(), 5);
        assert_eq!(
            batch.decoder_seqs[0],
            vec![vocab.go_token, 6, 7, vocab.eos_token, vocab.pad_token]
        );
        // Target = decoder shifted left by one, padded to the same width.
        assert_eq!(
            batch.target_seqs[0],
            vec![6, 7, vocab.eos_token, vocab.pad_token, vocab.pad_token]
        );
        assert_eq!(batch.decoder_seqs_len, vec![4]);
    }

    #[test]
    fn test_weight_mask_covers_target_plus_eos() {
        let vocab = vocab();
        let samples = vec![sample(vec![5], vec![5, 6, 7, 8])];
        let batch = create_batch(&samples, &vocab, 1, 6, 0, false);

        let weights = &batch.weights[0];
        // max_target + 2 wide; target_len + 1 leading ones.
        assert_eq!(weights.len(), 8);
        assert_eq!(&weights[..5], &[1.0, 1.0, 1.0, 1.0, 1.0]);
        assert!(weights[5..].iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_transpose_equivalence() {
        let vocab = vocab();
        let samples = uneven_samples();
        let flat = create_batch(&samples, &vocab, 5, 4, 0, false);
        let tall = create_batch(&samples, &vocab, 5, 4, 0, true);

        for (b, row) in flat.encoder_seqs.iter().enumerate() {
            for (t, &id) in row.iter().enumerate() {
                assert_eq!(tall.encoder_seqs[t][b], id);
            }
        }
        for (b, row) in flat.weights.iter().enumerate() {
            for (t, &w) in row.iter().enumerate() {
                assert_eq!(tall.weights[t][b], w);
            }
        }
        // Lengths and kb inputs are never transposed.
        assert_eq!(tall.encoder_seqs_len, flat.encoder_seqs_len);
        assert_eq!(tall.kb_inputs, flat.kb_inputs);
    }

    #[test]
    fn test_trailing_batch_is_dropped() {
        let vocab = vocab();
        let training: Vec<Sample> = (0..8).map(|_| sample(vec![5, 6], vec![7])).collect();
        let mut data = DialogDataset::new(vocab, training, Vec::new(), Vec::new());

        // Exactly 2 * batch_size samples still yield a single batch.
        let batches = get_batches(&mut data, Partition::Training, 4, false);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 4);

        // A partition that fits in one batch yields nothing at all.
        let batches = get_batches(&mut data, Partition::Training, 8, false);
        assert!(batches.is_empty());
    }

    #[test]
    fn test_pad_targets_are_partition_global() {
        let vocab = vocab();
        let mut training = vec![sample(vec![5; 9], vec![6; 7])];
        for _ in 0..8 {
            training.push(sample(vec![5], vec![6]));
        }
        let mut data = DialogDataset::new(vocab, training, Vec::new(), Vec::new());

        let batches = get_batches(&mut data, Partition::Training, 3, false);
        assert_eq!(batches.len(), 2);
        for batch in &batches {
            // Every batch is padded to the partition-wide maxima,
            // wherever the longest sample was shuffled to.
            for row in &batch.encoder_seqs {
                assert_eq!(row.len(), 9);
            }
            for row in &batch.decoder_seqs {
                assert_eq!(row.len(), 7 + 2);
            }
        }
    }

    #[test]
    fn test_batches_are_sorted_by_descending_input_length() {
        let vocab = vocab();
        let training: Vec<Sample> = (1..=9)
            .map(|n| sample(vec![5; n], vec![6]))
            .collect();
        let mut data = DialogDataset::new(vocab, training, Vec::new(), Vec::new());
        let batches = get_batches(&mut data, Partition::Training, 3, false);

        for batch in &batches {
            for pair in batch.encoder_seqs_len.windows(2) {
                assert!(pair[0] >= pair[1]);
            }
        }
    }

    #[test]
    fn test_encode_query_single_sample() {
        let mut vocab = Vocabulary::new();
        for word in ["where", "is", "the", "gas", "station"] {
            vocab.get_or_create_id(word, true);
        }
        let extractor = EntityExtractor::new();

        let batch = encode_query(&mut vocab, &extractor, "where is the gas station", 40).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.encoder_seqs_len, vec![5]);
        assert_eq!(batch.decoder_seqs[0], vec![vocab.go_token, vocab.eos_token]);

        // Unknown words map to <unknown> instead of failing.
        let batch = encode_query(&mut vocab, &extractor, "where is waldo", 40).unwrap();
        assert!(batch.encoder_seqs[0].contains(&vocab.unknown_token));

        // Oversized queries are reported, not truncated.
        let long = vec!["where"; 41].join(" ");
        assert!(encode_query(&mut vocab, &extractor, &long, 40).is_err());
        assert!(encode_query(&mut vocab, &extractor, "   ", 40).is_err());
    }
}
