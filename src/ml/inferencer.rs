// ============================================================
// Layer 5 — Inferencer
// ============================================================
use anyhow::Result;

use crate::data::batcher::encode_query;
use crate::data::dataset::DialogDataset;
use crate::data::tokenizer::EntityExtractor;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{Seq2SeqModel, Seq2SeqConfig};
use crate::ml::trainer::int_tensor;

type InferBackend = burn::backend::Wgpu;

/// Longest reply the greedy decoder will produce.
const MAX_RESPONSE_LEN: usize = 40;

pub struct Inferencer {
    model:      Seq2SeqModel<InferBackend>,
    max_length: usize,
    device:     burn::backend::wgpu::WgpuDevice,
}

impl Inferencer {
    /// Rebuild the trained model from the latest checkpoint.
    /// `vocab_size` comes from the loaded filtered dataset, which is
    /// the vocabulary the checkpoint was trained against.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        vocab_size:   usize,
    ) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let cfg    = ckpt_manager.load_config()?;

        let model_cfg = Seq2SeqConfig::new(vocab_size, cfg.hidden_size).with_dropout(0.0);
        let model: Seq2SeqModel<InferBackend> = model_cfg.init(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");

        Ok(Self { model, max_length: cfg.max_length, device })
    }

    /// Encode a free-text query, greedy-decode a reply, and render
    /// it as readable text.
    pub fn respond(
        &self,
        data:      &mut DialogDataset,
        extractor: &EntityExtractor,
        question:  &str,
    ) -> Result<String> {
        // create = false under the hood: the query can never grow
        // the vocabulary, unknown words become <unknown>.
        let batch = encode_query(&mut data.vocab, extractor, question, self.max_length)?;
        let encoder = int_tensor::<InferBackend>(&batch.encoder_seqs, &self.device);

        let reply_ids = self.model.generate(
            encoder,
            data.vocab.go_token,
            data.vocab.eos_token,
            MAX_RESPONSE_LEN,
            &self.device,
        );

        tracing::debug!("Generated {} reply tokens", reply_ids.len());
        Ok(data.vocab.sequence_to_string(&reply_ids, true))
    }
}
