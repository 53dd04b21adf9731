use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mcqgen_cli::{
    apply_descriptions, build_orchestrator, build_retriever, init_tracing, load_config,
};
use mcqgen_core::types::{Difficulty, GenerationRequest, Topic};

#[derive(Parser)]
#[command(name = "mcqgen", about = "Generate multiple-choice questions from an indexed corpus")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate questions for a list of topics.
    Generate {
        /// JSON array of names or {name, description} objects, or a comma-separated list.
        #[arg(long)]
        topics: String,
        /// NAME=DESCRIPTION, repeatable.
        #[arg(long = "topic-description")]
        topic_descriptions: Vec<String>,
        #[arg(long, default_value = "medium")]
        difficulty: String,
        #[arg(long)]
        count: usize,
        /// Fix the final shuffle.
        #[arg(long)]
        seed: Option<u64>,
        /// Write the JSON array here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the chunks nearest to a query.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = load_config()?;

    match cli.command {
        Command::Generate { topics, topic_descriptions, difficulty, count, seed, output } => {
            let mut topics = Topic::parse_list(&topics);
            apply_descriptions(&mut topics, &topic_descriptions)?;
            let difficulty: Difficulty = difficulty.parse()?;
            if seed.is_some() {
                config.generation.shuffle_seed = seed;
            }

            let orchestrator = build_orchestrator(&config)?;
            let request = GenerationRequest { topics, difficulty, num_questions: count };
            let report = orchestrator.generate(&request).await?;

            let json = serde_json::to_string_pretty(&report.questions)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Wrote {} questions to {}", report.questions.len(), path.display());
                }
                None => println!("{json}"),
            }

            let failed = report.exhausted_topics();
            if !failed.is_empty() {
                eprintln!("Failed topics: {}", failed.join(", "));
            }
            if report.questions.is_empty() {
                bail!("no questions could be generated");
            }
        }
        Command::Search { query, limit } => {
            let retriever = build_retriever(&config)?;
            let hits = tokio::task::spawn_blocking(move || retriever.search(&query, limit)).await??;
            if hits.is_empty() {
                println!("No results.");
            }
            for (rank, (hit, text)) in hits.iter().enumerate() {
                println!("{}. [chunk {}] score={:.4}\n   {}\n", rank + 1, hit.id, hit.score, text);
            }
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
