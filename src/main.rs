use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use toy_gpt_rs::logging::{init_logging, log_header};
use toy_gpt_rs::stages;
use toy_gpt_rs::{
    InferenceSession, ProjectPaths, SamplingConfig, TrainConfig, generate_tokens_context2,
    run_training,
};

#[derive(Parser, Debug)]
#[command(
    name = "toy-gpt",
    version,
    about = "Train a toy context-2 next-token model and generate text from its artifacts."
)]
struct Cli {
    /// Project root holding corpus/, artifacts/ and outputs/
    #[arg(long, global = true, env = "TOY_GPT_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Corpus file (default: <base-dir>/corpus/001_animals.txt)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tokenize the corpus and show a few statistics
    Tokenize,
    /// Build the vocabulary and look up a sample token
    Vocab,
    /// Forward pass of an untrained model
    Model,
    /// Train the model and write artifacts
    Train(TrainArgs),
    /// Generate text from saved artifacts
    Infer(InferArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Learning rate
    #[arg(long, default_value_t = 0.1)]
    lr: f32,

    /// Passes over the training pairs
    #[arg(long, default_value_t = 50)]
    epochs: usize,
}

#[derive(Args, Debug)]
struct InferArgs {
    /// Start token (default: first token in the vocabulary)
    #[arg(long = "start", default_value = "")]
    start_token: String,

    /// Number of tokens to generate, not counting the start token
    #[arg(long = "num", default_value_t = 10)]
    num_tokens: usize,

    /// Show top-k next-token probabilities for the start token
    #[arg(long, default_value_t = 3)]
    topk: usize,

    /// Sampling temperature (0 = greedy)
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Top-p threshold used when temperature > 0
    #[arg(long = "top-p", default_value_t = 0.9)]
    top_p: f32,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Load weights from the binary checkpoint instead of the CSV table
    #[arg(long)]
    binary: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let mut paths = ProjectPaths::new(&cli.base_dir);
    if let Some(corpus) = &cli.corpus {
        paths = paths.with_corpus(corpus);
    }

    match cli.command {
        Command::Tokenize => tokenize_demo(&paths)?,
        Command::Vocab => vocab_demo(&paths)?,
        Command::Model => model_demo(&paths)?,
        Command::Train(args) => train(&paths, &args)?,
        Command::Infer(args) => infer(&paths, &args)?,
    }
    Ok(())
}

fn tokenize_demo(paths: &ProjectPaths) -> Result<(), Box<dyn std::error::Error>> {
    log_header("Tokenizer Demo");
    stages::tokenizer_summary(paths)?;
    Ok(())
}

fn vocab_demo(paths: &ProjectPaths) -> Result<(), Box<dyn std::error::Error>> {
    log_header("Vocabulary Demo");
    stages::vocab_summary(paths)?;
    Ok(())
}

fn model_demo(paths: &ProjectPaths) -> Result<(), Box<dyn std::error::Error>> {
    log_header("Simple Next-Token Model Demo (Context-2)");
    stages::model_preview(paths)?;
    Ok(())
}

fn train(paths: &ProjectPaths, args: &TrainArgs) -> Result<(), Box<dyn std::error::Error>> {
    log_header("Training Demo: Next-Token Softmax Regression");

    let config = TrainConfig {
        learning_rate: args.lr,
        epochs: args.epochs,
    };
    let report = run_training(paths, &config)?;

    if let Some(last) = report.history.last() {
        println!(
            "Trained {} epochs on {} pairs: avg_loss={:.4} accuracy={:.3}",
            last.epoch, report.pair_count, last.avg_loss, last.accuracy
        );
    }
    Ok(())
}

fn infer(paths: &ProjectPaths, args: &InferArgs) -> Result<(), Box<dyn std::error::Error>> {
    log_header("Inference Demo: Load Artifacts and Generate Text");

    let session = InferenceSession::load(paths, args.binary)?;
    let start = if args.start_token.is_empty() {
        session.default_start_token().to_string()
    } else {
        args.start_token.clone()
    };

    tracing::info!(
        "Loaded repo_name={} model_kind={}",
        session.meta.repo_name,
        session.meta.model_kind
    );
    tracing::info!("Vocab size: {}", session.vocab.vocab_size());
    tracing::info!("Start token: {}", start);
    tracing::info!("Context-2 bootstrap: ({}, {})", start, start);

    tracing::info!("Top next-token predictions after {}|{}:", start, start);
    for (tok, prob) in session.top_predictions(&start, args.topk.max(1))? {
        tracing::info!("  {} (ID {:?}): {:.4}", tok, session.vocab.token_id(&tok), prob);
    }

    let sampling = SamplingConfig {
        temperature: args.temperature,
        top_p: args.top_p,
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    let generated = generate_tokens_context2(
        &session.model,
        &session.vocab,
        &start,
        args.num_tokens,
        &sampling,
        &mut rng,
    )?;

    tracing::info!("Generated sequence:");
    println!("{}", generated.join(" "));
    Ok(())
}
