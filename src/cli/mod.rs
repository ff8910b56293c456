// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All business logic is delegated to Layer 2 (application).

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{ChatArgs, Commands, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "kvret-seq2seq",
    version = "0.1.0",
    about = "Train an attention seq2seq assistant on the KVRET in-car corpus, then chat with it."
)]
pub struct Cli {
    /// The subcommand to run (train or chat)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => self.run_train(args),
            Commands::Chat(args)  => self.run_chat(args),
        }
    }

    fn run_train(&self, args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on corpus: {}", args.train_file);

        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    fn run_chat(&self, args: ChatArgs) -> Result<()> {
        use crate::application::chat_use_case::ChatUseCase;

        let mut use_case = ChatUseCase::new(&args.samples_dir, &args.checkpoint_dir)?;

        let reply = use_case.respond(&args.question)?;
        println!("\n{}", reply);
        Ok(())
    }
}
