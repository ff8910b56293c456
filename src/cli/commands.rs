// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `chat`, and their
// configurable flags. clap's derive macros generate the help
// text, error messages, and type conversion.

use clap::{Args, Subcommand};
use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the dataset cache and train the seq2seq model
    Train(TrainArgs),

    /// Answer a query using a trained checkpoint
    Chat(ChatArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// KVRET training corpus (JSON)
    #[arg(long, default_value = "data/kvret_train_public.json")]
    pub train_file: String,

    /// KVRET validation corpus (JSON)
    #[arg(long, default_value = "data/kvret_dev_public.json")]
    pub valid_file: String,

    /// KVRET test corpus (JSON)
    #[arg(long, default_value = "data/kvret_test_public.json")]
    pub test_file: String,

    /// Directory for the dataset caches and raw-text mirrors
    #[arg(long, default_value = "data/samples")]
    pub samples_dir: String,

    /// Directory for model checkpoints and the metrics CSV
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Keep only the most frequent N non-reserved words (0 keeps all)
    #[arg(long, default_value_t = 0)]
    pub vocab_cap: usize,

    /// Truncate long training/validation sequences during extraction
    #[arg(long, default_value_t = false)]
    pub truncate: bool,

    /// Maximum query length (tokens) accepted by the chat surface
    #[arg(long, default_value_t = 40)]
    pub max_length: usize,

    /// Number of samples processed together in one step
    #[arg(long, default_value_t = 126)]
    pub batch_size: usize,

    /// Number of full passes through the training partition
    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// GRU hidden state width (also the embedding width)
    #[arg(long, default_value_t = 300)]
    pub hidden_size: usize,

    /// Dropout probability on the embeddings during training
    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_file:     a.train_file,
            valid_file:     a.valid_file,
            test_file:      a.test_file,
            samples_dir:    a.samples_dir,
            checkpoint_dir: a.checkpoint_dir,
            vocab_cap:      a.vocab_cap,
            truncate:       a.truncate,
            max_length:     a.max_length,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            hidden_size:    a.hidden_size,
            dropout:        a.dropout,
        }
    }
}

/// All arguments for the `chat` command
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The query to answer
    #[arg(long)]
    pub question: String,

    /// Directory holding the dataset caches (same as during training)
    #[arg(long, default_value = "data/samples")]
    pub samples_dir: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}
