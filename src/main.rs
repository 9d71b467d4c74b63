//! council CLI - Ask a council of models, get one answer.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use council::client::HealthStatus;
use council::{
    Config, ConsensusOrchestrator, ConversationState, LLMClient, RosterSelector,
    SynthesisResult, Tier,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "council")]
#[command(author = "Infernet <dev@infernet.org>")]
#[command(version)]
#[command(about = "Ask several models at once and let a judge synthesize one answer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "council.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The question
        query: String,

        /// Tier: lite, pro or meta
        #[arg(short, long, default_value = "meta")]
        tier: String,

        /// Overall deadline in seconds (overrides config)
        #[arg(long)]
        deadline: Option<u64>,

        /// Print per-model probe outcomes after the answer
        #[arg(long)]
        show_probes: bool,
    },

    /// Interactive session (/tier <name>, /clear, /quit)
    Chat {
        /// Starting tier: lite, pro or meta
        #[arg(short, long, default_value = "meta")]
        tier: String,
    },

    /// List the models on each tier's roster
    Rosters {
        /// Only this tier (aliases accepted)
        tier: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Also ping the endpoint
        #[arg(long)]
        check: bool,
    },

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# council configuration file

[openrouter]
# API key (can also use OPENROUTER_API_KEY env var)
# api_key = "sk-..."
base_url = "https://openrouter.ai/api/v1"
timeout_secs = 180
max_retries = 3

[council]
judge_model = "openai/gpt-4o"
probe_max_tokens = 500
# judge_max_tokens = 1024
max_concurrent_probes = 5
# deadline_secs = 120
# judge_system_prompt = "You are the final judge..."

# Roster overrides (unset tiers keep the built-in roster)
[tiers]
# lite = ["openai/gpt-4o-mini", "anthropic/claude-3-haiku"]
# pro = ["openai/gpt-4o-mini", "anthropic/claude-3-haiku", "google/gemini-flash-1.5"]
# meta = [
#     "openai/gpt-4o-mini",
#     "anthropic/claude-3-haiku",
#     "google/gemini-flash-1.5",
#     "meta-llama/llama-3.1-8b-instruct",
#     "mistralai/mistral-7b-instruct",
# ]
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load_or_default(path).with_context(|| format!("Failed to load config from {path:?}"))
}

fn build_orchestrator(config: &Config) -> Result<(ConsensusOrchestrator, Arc<LLMClient>)> {
    let client = Arc::new(LLMClient::from_config(config).context("Failed to create client")?);
    let orchestrator = ConsensusOrchestrator::from_config(config, client.clone())
        .context("Failed to build council")?;
    Ok((orchestrator, client))
}

fn print_roster(tier: Tier, models: &[String]) {
    println!("{tier}:");
    for model in models {
        println!("  {model}");
    }
}

fn spinner(tier: Tier) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Consulting the {tier} council..."));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_probes(result: &SynthesisResult) {
    println!(
        "\n--- {}/{} models answered ({} ms) ---",
        result.succeeded(),
        result.probes.len(),
        result.elapsed_ms
    );
    for probe in &result.probes {
        match probe.failure_reason() {
            None => println!("  ok    {} ({} ms)", probe.model, probe.elapsed_ms),
            Some(reason) => println!("  fail  {}: {reason}", probe.model),
        }
    }
}

async fn run_chat(orchestrator: &ConsensusOrchestrator, tier: Tier) -> Result<()> {
    let mut state = ConversationState::new(tier);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("council chat ({tier}). /tier <name>, /clear, /quit");
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        if line == "/clear" {
            state.clear();
            println!("History cleared.");
            continue;
        }
        if let Some(name) = line.strip_prefix("/tier") {
            match name.trim().parse::<Tier>() {
                Ok(tier) => {
                    state.tier = tier;
                    println!("Tier set to {tier}.");
                }
                Err(e) => println!("{e}"),
            }
            continue;
        }

        let pb = spinner(state.tier);
        let outcome = state.ask(orchestrator, line).await;
        pb.finish_and_clear();

        match outcome {
            Ok(result) => println!("\n{}\n", result.text),
            Err(e) => println!("Could not produce an answer: {e}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Rosters { tier } => {
            let config = load_config(&cli.config)?;
            let rosters = RosterSelector::from_config(&config.tiers)?;
            match tier {
                Some(name) => {
                    let (tier, models) = rosters.resolve(&name)?;
                    print_roster(tier, models);
                }
                None => {
                    for tier in Tier::ALL {
                        print_roster(tier, rosters.roster(tier));
                    }
                }
            }
            println!("judge: {}", config.council.judge_model);
        }

        Commands::Validate { check } => {
            let config = load_config(&cli.config)?;
            let client = LLMClient::from_config(&config).context("Failed to resolve API key")?;
            RosterSelector::from_config(&config.tiers)?;

            info!("Configuration is valid");
            info!("  Endpoint: {}", client.base_url());
            info!("  Judge: {}", config.council.judge_model);
            info!(
                "  Probes: {} tokens, {} concurrent",
                config.council.probe_max_tokens, config.council.max_concurrent_probes
            );

            if check {
                let health = client.health_check().await;
                match health.status {
                    HealthStatus::Healthy => info!(
                        latency_ms = health.latency_ms.unwrap_or_default(),
                        "Endpoint healthy"
                    ),
                    status => anyhow::bail!(
                        "Endpoint {status}: {}",
                        health.error.unwrap_or_else(|| "unknown".to_string())
                    ),
                }
            }
        }

        Commands::Ask {
            query,
            tier,
            deadline,
            show_probes,
        } => {
            // Tier is checked before any client is built
            let tier: Tier = tier.parse()?;
            let config = load_config(&cli.config)?;
            let (orchestrator, client) = build_orchestrator(&config)?;
            let deadline = deadline
                .map(Duration::from_secs)
                .or(config.council.deadline());

            let pb = spinner(tier);
            let outcome = orchestrator
                .synthesize_with_deadline(&query, tier, deadline)
                .await;
            pb.finish_and_clear();

            let (input_tokens, output_tokens) = client.total_tokens();
            debug!(input_tokens, output_tokens, "Token usage");

            let result = outcome.context("Could not produce an answer")?;
            println!("{}", result.text);
            if show_probes {
                print_probes(&result);
            }
        }

        Commands::Chat { tier } => {
            let tier: Tier = tier.parse()?;
            let config = load_config(&cli.config)?;
            let (orchestrator, _) = build_orchestrator(&config)?;
            run_chat(&orchestrator, tier).await?;
        }
    }

    Ok(())
}
