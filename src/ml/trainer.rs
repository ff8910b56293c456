// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop over freshly drawn batches.
//
// Backend split:
//   - Training runs on MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on MyInnerBackend (Wgpu)
//     with dropout disabled for deterministic evaluation
//
// Batches arrive sample-major (transpose = false) and are turned
// into tensors right here, at the point of use.
//
// Reference: Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::get_batches;
use crate::data::dataset::{DialogDataset, Partition};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{Seq2SeqModel, Seq2SeqConfig};

type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
type MyInnerBackend = burn::backend::Wgpu;

pub fn run_training(
    cfg:          &TrainConfig,
    data:         &mut DialogDataset,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop(cfg, data, ckpt_manager, metrics, device)
}

fn train_loop(
    cfg:          &TrainConfig,
    data:         &mut DialogDataset,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
    device:       burn::backend::wgpu::WgpuDevice,
) -> Result<()> {

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = Seq2SeqConfig::new(data.vocabulary_size(), cfg.hidden_size)
        .with_dropout(cfg.dropout);
    let mut model: Seq2SeqModel<MyBackend> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: vocab={}, hidden={}",
        data.vocabulary_size(),
        cfg.hidden_size
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        // get_batches reshuffles and drops the trailing batch, so a
        // partition smaller than two batches yields nothing at all.
        let batches = get_batches(data, Partition::Training, cfg.batch_size, false);
        if batches.is_empty() {
            bail!(
                "no training batches: {} samples cannot fill two batches of {}",
                data.sample_count(),
                cfg.batch_size
            );
        }

        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in &batches {
            let encoder = int_tensor::<MyBackend>(&batch.encoder_seqs, &device);
            let decoder = int_tensor::<MyBackend>(&batch.decoder_seqs, &device);
            let targets = int_tensor::<MyBackend>(&batch.target_seqs, &device);
            let weights = float_tensor::<MyBackend>(&batch.weights, &device);

            let loss = model.forward_loss(encoder, decoder, targets, weights);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = train_loss_sum / train_batches as f64;

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;

        for batch in &get_batches(data, Partition::Validation, cfg.batch_size, false) {
            let encoder = int_tensor::<MyInnerBackend>(&batch.encoder_seqs, &device);
            let decoder = int_tensor::<MyInnerBackend>(&batch.decoder_seqs, &device);
            let targets = int_tensor::<MyInnerBackend>(&batch.target_seqs, &device);
            let weights = float_tensor::<MyInnerBackend>(&batch.weights, &device);

            let loss = model_valid.forward_loss(encoder, decoder, targets, weights);
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches  += 1;
        }

        let avg_val_loss = if val_batches > 0 {
            val_loss_sum / val_batches as f64
        } else { f64::NAN };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4}",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss,
        );

        metrics.log(&EpochMetrics::new(epoch, avg_train_loss, avg_val_loss))?;
        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete!");
    Ok(())
}

/// Flatten sample-major id rows into a 2-D Int tensor.
pub(crate) fn int_tensor<B: Backend>(
    rows:   &[Vec<usize>],
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    let flat: Vec<i32> = rows
        .iter()
        .flat_map(|row| row.iter().map(|&id| id as i32))
        .collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([batch, width])
}

/// Flatten sample-major weight rows into a 2-D float tensor.
pub(crate) fn float_tensor<B: Backend>(
    rows:   &[Vec<f32>],
    device: &B::Device,
) -> Tensor<B, 2> {
    let batch = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([batch, width])
}
