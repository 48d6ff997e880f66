//! Command-line client for the dining recommendation engine.
//!
//! Drives a recommendation session directly against the live providers,
//! without going through the WebSocket server. Useful for smoke-testing
//! the full pipeline and for inspecting past recommendations.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use providers::{GeminiClient, GooglePlaceClient, ReviewServiceClient};
use scorer_client::ScorerClient;
use server::{Config, RecommendationItem, SessionDeps, SessionDriver, SessionEvent, SessionSettings};
use storage::Store;

#[derive(Parser)]
#[command(name = "dining-cli")]
#[command(about = "Conversational restaurant recommendations, in your terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive recommendation chat against the live providers
    Chat {
        #[command(flatten)]
        config: Config,
    },
    /// Show recently delivered recommendations
    History {
        /// SQLite database URL
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite://dining.db")]
        database_url: String,

        /// How many records to show
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (quiet by default; RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { config } => run_chat(config).await,
        Commands::History {
            database_url,
            limit,
        } => show_history(&database_url, limit).await,
    }
}

async fn run_chat(config: Config) -> Result<()> {
    println!("{}", "Connecting to services...".dimmed());

    let store = Store::connect(&config.database_url).await?;
    let scorer = ScorerClient::connect(config.scorer_addr.clone()).await?;

    let deps = SessionDeps {
        places: Arc::new(GooglePlaceClient::new(config.google_maps_api_key.clone())),
        reviews: Arc::new(ReviewServiceClient::new(config.review_service_url.clone())),
        generator: Arc::new(GeminiClient::new(config.gemini_api_key.clone())),
        scorer: Arc::new(scorer),
        store,
    };
    let mut driver = SessionDriver::new(deps, SessionSettings::from(&config));

    println!("{}", "你好！想找哪裡的什麼餐廳？".bold().blue());
    println!("{}", "(exit 或 quit 離開)".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        // Print events as they stream out so progress shows up live.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_event(&event);
            }
        });
        driver.handle_utterance(&line, &tx).await;
        drop(tx);
        printer.await?;

        if driver.phase().is_terminal() {
            println!("{}", "(這輪結束了，輸入新的需求可以重新開始)".dimmed());
        }
    }

    println!("{}", "再見！".bold().blue());
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Progress { text } => println!("  {}", text.dimmed()),
        SessionEvent::Message { text } => println!("{}", text.cyan()),
        SessionEvent::Recommendations { data } => print_recommendations(data),
        SessionEvent::Error { text } => println!("{} {}", "✗".red(), text.red()),
    }
}

fn print_recommendations(items: &[RecommendationItem]) {
    println!("\n{}", "✓ 為你找到這幾家：".green().bold());
    for (i, item) in items.iter().enumerate() {
        println!(
            "{}. {} {}",
            i + 1,
            item.name.bold(),
            format!("★{:.1}", item.rating).yellow()
        );
        println!("   {}", item.address);
        println!("   {}", item.reason);
        println!("   {}", item.map_url.dimmed());
    }
    println!();
}

async fn show_history(database_url: &str, limit: i64) -> Result<()> {
    let store = Store::connect(database_url).await?;
    let records = store.recent_recommendations(limit).await?;

    if records.is_empty() {
        println!("{}", "No recommendations recorded yet".yellow());
        return Ok(());
    }

    println!("{}", format!("Last {} recommendations:", records.len()).bold());
    for record in records {
        println!(
            "{} {} ({} / {})",
            record.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            record.user_input.bold(),
            record.location,
            record.category
        );
        println!("   {}", record.top_place_ids.dimmed());
    }
    Ok(())
}
