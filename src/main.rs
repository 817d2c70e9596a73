use std::path::Path;

use clap::Parser;
use clap::Subcommand;
use quizgen::config::AppConfig;
use quizgen::database::Database;
use quizgen::output::OutputDir;
use quizgen::pipeline::selector;
use quizgen::pipeline::PipelineController;
use quizgen::Result;
use tracing::info;
use tracing::warn;

#[derive(Parser)]
#[command(name = "quizgen")]
#[command(about = "Interview quiz question generation pipeline")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to config.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full generation pipeline until the unsolved target is met
    Run,
    /// Show leaf category statistics and the current unsolved total
    Stats,
    /// Show which category the next round would target
    Select,
    /// Create the database schema (tables, pgvector extension)
    Init,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run => {
            let output = OutputDir::create(Path::new(config.output_dir()))?;
            quizgen::logging::init_logging(&config.logging, output.path())?;
            info!("Configuration loaded");

            let mut controller = PipelineController::new(&config).await?;

            tokio::select! {
                result = controller.run(&output) => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, shutting down");
                }
            }
        }
        Commands::Stats => {
            quizgen::logging::init_simple_logging()?;
            let db = Database::from_config(&config).await?;
            let categories = db.leaf_category_stats().await?;
            let unsolved = db.total_unsolved().await?;

            println!("Leaf categories: {}", categories.len());
            println!(
                "Unsolved total: {unsolved} (threshold: {})",
                config.unsolved_threshold()
            );
            for category in &categories {
                println!(
                    "  {:>6}  {:<40} questions: {:>4}  unsolved: {:>4}",
                    category.id, category.path, category.question_count, category.unsolved_count
                );
            }
        }
        Commands::Select => {
            quizgen::logging::init_simple_logging()?;
            let db = Database::from_config(&config).await?;
            let categories = db.leaf_category_stats().await?;
            let excluded = std::collections::HashSet::new();

            match selector::select_next(&categories, &excluded, config.unsolved_threshold()) {
                Some(category) => println!(
                    "Next target: {} (id: {}, unsolved: {}, needs: {})",
                    category.path,
                    category.id,
                    category.unsolved_count,
                    category.needed(config.unsolved_threshold())
                ),
                None => println!("No category needs questions"),
            }
        }
        Commands::Init => {
            quizgen::logging::init_simple_logging()?;
            let db = Database::from_config(&config).await?;
            db.ensure_schema(config.clova.embedding_dimension).await?;
            println!("Schema ready");
        }
    }

    Ok(())
}
