//! percept-client - command-line driver for the perception client
//!
//! Runs one client session against the SQLite database under the root
//! folder and prints what the corresponding view would show.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use percept_client::rating::RatingOutcome;
use percept_client::PerceptionApp;
use percept_common::config::ClientConfig;
use percept_common::db::NewProfession;
use percept_common::human_time::format_relative;

#[derive(Parser, Debug)]
#[command(name = "percept-client")]
#[command(about = "Rate how AI is perceived across professions")]
#[command(version)]
struct Cli {
    /// Folder holding the database and local preferences
    #[arg(long, global = true)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dashboard figures and chart data
    Stats,
    /// Most-rated professions
    Popular {
        /// Additional pages to load after the first
        #[arg(long, default_value_t = 0)]
        more: u32,
    },
    /// Search professions by name, category or description
    Search { query: String },
    /// Profession detail with latest comments
    Show { id: Uuid },
    /// Rate a profession; slider position 0-100
    Rate { id: Uuid, slider: i64 },
    /// Comment on a profession
    Comment { id: Uuid, text: String },
    /// Add a profession
    Add {
        #[arg(long)]
        category: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Recent ratings and comments
    Activity,
    /// Follow realtime changes until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::load(cli.root_folder.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting percept-client v{} (root folder {})",
        env!("CARGO_PKG_VERSION"),
        config.root_folder.display()
    );

    let app = PerceptionApp::open(&config)
        .await
        .context("Failed to open client session")?;

    let result = run(&app, cli.command).await;
    app.shutdown().await;
    result
}

async fn run(app: &PerceptionApp, command: Command) -> Result<()> {
    match command {
        Command::Stats => {
            let stats = app.stats.compute_dashboard_stats().await?;
            println!("Total votes:      {}", stats.total_votes);
            println!("Mean perception:  {:.2}", stats.mean_perception);
            println!("Professions:      {}", stats.profession_count);

            let histogram = app.stats.perception_distribution().await?;
            for (i, count) in histogram.iter().enumerate() {
                println!("  score {}: {}", i + 1, count);
            }
            for category in app.stats.category_distribution().await? {
                println!("  {}: {} votes", category.category, category.total_ratings);
            }
        }
        Command::Popular { more } => {
            let mut professions = app.directory.popular().await?;
            for _ in 0..more {
                let page = app.directory.load_more().await?;
                if page.is_empty() {
                    break;
                }
                professions.extend(page);
            }
            for p in professions {
                println!(
                    "{}  {} > {}  {:.1} ({} votes, {} comments)",
                    p.id, p.category, p.name, p.avg_rating, p.total_ratings, p.comments_count
                );
            }
        }
        Command::Search { query } => {
            let results = app.search.search(&query).await?;
            if results.offer_create {
                println!(
                    "No match for \"{}\"; add it with: percept-client add --category <category> --name \"{}\"",
                    results.query,
                    results.prefill_name.unwrap_or_default()
                );
            }
            for p in results.professions {
                println!("{}  {} > {}  {:.1}", p.id, p.category, p.name, p.avg_rating);
            }
        }
        Command::Show { id } => {
            let detail = app.directory.open_detail(id).await?;
            let p = &detail.profession;
            println!("{} > {}", p.category, p.name);
            if let Some(description) = &p.description {
                println!("{}", description);
            }
            println!(
                "Rating {:.1} from {} votes, perception {}%",
                p.avg_rating, p.total_ratings, detail.perception_percent
            );
            let now = Utc::now();
            for c in &detail.comments {
                println!("  [{}] {}: {}", format_relative(c.created_at, now), c.username, c.content);
            }
        }
        Command::Rate { id, slider } => {
            app.directory.open_detail(id).await?;
            match app.ratings.submit(id, slider).await? {
                RatingOutcome::Submitted { score, stats, .. } => println!(
                    "Rated {} points; average now {:.2} over {} votes",
                    score, stats.avg_rating, stats.total_ratings
                ),
                RatingOutcome::AlreadyVoted => println!("You have already rated this profession"),
            }
        }
        Command::Comment { id, text } => {
            let comment = app.comments.submit(id, &text).await?;
            println!("Posted as {}", comment.username);
        }
        Command::Add {
            category,
            name,
            description,
        } => {
            let profession = app
                .directory
                .add_profession(NewProfession {
                    category,
                    name,
                    description,
                })
                .await?;
            println!("Added {} ({})", profession.name, profession.id);
        }
        Command::Activity => {
            let now = Utc::now();
            for item in app.activity.recent_activity().await? {
                println!("{}", item.describe(now));
            }
        }
        Command::Watch => watch(app).await?,
    }
    Ok(())
}

async fn watch(app: &PerceptionApp) -> Result<()> {
    let mut refresh = app.refresh.subscribe();
    let live = app.start_realtime().await;
    if app
        .watch_external_changes()
        .await
        .context("Failed to watch the database for external changes")?
    {
        debug!("Polling the database for writes from other processes");
    }
    info!("Watching {} realtime channels, Ctrl-C to stop", live);

    loop {
        tokio::select! {
            received = refresh.recv() => match received {
                Ok(target) => info!(%target, "Refresh requested"),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Refresh requests dropped"),
                Err(RecvError::Closed) => break,
            },
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Stopping");
                break;
            }
        }
    }
    Ok(())
}
