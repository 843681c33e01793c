//! crosspost-queue - Manage the publish job queue
//!
//! Operator tool for inspecting and adjusting queued publish jobs.

use clap::{Parser, Subcommand};
use libcrosspost::{Config, Database, JobQueue, Result, RetryPolicy};

#[derive(Parser, Debug)]
#[command(name = "crosspost-queue")]
#[command(version)]
#[command(about = "Manage the publish job queue")]
#[command(long_about = "\
crosspost-queue - Manage the publish job queue

DESCRIPTION:
    crosspost-queue inspects and adjusts the delayed publish jobs that the
    worker consumes. Use it to list pending and parked jobs, cancel one,
    move one to a different time, fire one immediately, or view totals.

COMMANDS:
    list        List queued jobs
    cancel      Cancel a queued job
    reschedule  Move a job to a different time
    now         Mark a job due immediately
    stats       Show queue totals

USAGE EXAMPLES:
    # List all jobs
    crosspost-queue list

    # List jobs in JSON format
    crosspost-queue list --format json

    # Cancel the job for a post
    crosspost-queue cancel <POST_ID>

    # Reschedule to an RFC 3339 instant
    crosspost-queue reschedule <POST_ID> 2026-09-01T15:00:00Z

    # Publish as soon as the worker polls
    crosspost-queue now <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/crosspost/config.toml
    Override with CROSSPOST_CONFIG.

EXIT CODES:
    0 - Success
    1 - Operation failed
    3 - Invalid input (bad post ID, time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List queued jobs
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cancel a queued job
    Cancel {
        /// Post ID whose job to cancel
        post_id: String,
    },

    /// Move a job to a different time
    Reschedule {
        /// Post ID whose job to move
        post_id: String,

        /// New time, RFC 3339 (e.g. 2026-09-01T15:00:00Z)
        time: String,
    },

    /// Mark a job due immediately
    Now {
        /// Post ID to publish now
        post_id: String,
    },

    /// Show queue totals
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let queue = JobQueue::new(db.clone(), RetryPolicy::from(&config.retry));

    match cli.command {
        Commands::List { format } => cmd_list(&db, &queue, &format).await?,
        Commands::Cancel { post_id } => cmd_cancel(&queue, &post_id).await?,
        Commands::Reschedule { post_id, time } => cmd_reschedule(&queue, &post_id, &time).await?,
        Commands::Now { post_id } => cmd_now(&queue, &post_id).await?,
        Commands::Stats { format } => cmd_stats(&queue, &format).await?,
    }

    Ok(())
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(libcrosspost::CrosspostError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

async fn cmd_list(db: &Database, queue: &JobQueue, format: &str) -> Result<()> {
    validate_format(format)?;

    let jobs = queue.all().await?;

    if format == "json" {
        let json: Vec<serde_json::Value> = jobs
            .iter()
            .map(|j| {
                serde_json::json!({
                    "post_id": j.post_id,
                    "run_at": j.run_at,
                    "attempts": j.attempts,
                    "parked": j.is_parked(),
                    "last_error": j.last_error,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp();
    for job in &jobs {
        let preview = match db.get_post(&job.post_id).await? {
            Some(post) => truncate_content(&post.content, 50),
            None => "<post missing>".to_string(),
        };
        let when = match job.run_at {
            Some(ts) => format_time_until(now, ts),
            None => format!(
                "parked after {} attempts: {}",
                job.attempts,
                job.last_error.as_deref().unwrap_or("unknown error")
            ),
        };
        println!("{} | {} | {}", job.post_id, preview, when);
    }

    Ok(())
}

async fn cmd_cancel(queue: &JobQueue, post_id: &str) -> Result<()> {
    if queue.cancel(post_id).await? {
        println!("Cancelled job for post {}", post_id);
        Ok(())
    } else {
        Err(libcrosspost::CrosspostError::InvalidInput(format!(
            "No queued job for post {}",
            post_id
        )))
    }
}

async fn cmd_reschedule(queue: &JobQueue, post_id: &str, time: &str) -> Result<()> {
    let at = chrono::DateTime::parse_from_rfc3339(time)
        .map_err(|e| {
            libcrosspost::CrosspostError::InvalidInput(format!(
                "Could not parse time '{}': {}",
                time, e
            ))
        })?
        .with_timezone(&chrono::Utc);

    if queue.get(post_id).await?.is_none() {
        return Err(libcrosspost::CrosspostError::InvalidInput(format!(
            "No queued job for post {}",
            post_id
        )));
    }

    queue.schedule(post_id, at).await?;
    println!("Rescheduled post {} to {}", post_id, at.to_rfc3339());
    Ok(())
}

async fn cmd_now(queue: &JobQueue, post_id: &str) -> Result<()> {
    if queue.get(post_id).await?.is_none() {
        return Err(libcrosspost::CrosspostError::InvalidInput(format!(
            "No queued job for post {}",
            post_id
        )));
    }

    queue.schedule(post_id, chrono::Utc::now()).await?;
    println!("Post {} will publish on the next worker poll", post_id);
    Ok(())
}

async fn cmd_stats(queue: &JobQueue, format: &str) -> Result<()> {
    validate_format(format)?;

    let jobs = queue.all().await?;
    let now = chrono::Utc::now().timestamp();

    let due = jobs
        .iter()
        .filter(|j| j.run_at.is_some_and(|t| t <= now))
        .count();
    let pending = jobs
        .iter()
        .filter(|j| j.run_at.is_some_and(|t| t > now))
        .count();
    let parked = jobs.iter().filter(|j| j.is_parked()).count();

    if format == "json" {
        println!(
            "{}",
            serde_json::json!({
                "total": jobs.len(),
                "due": due,
                "pending": pending,
                "parked": parked,
            })
        );
    } else {
        println!("Total:   {}", jobs.len());
        println!("Due:     {}", due);
        println!("Pending: {}", pending);
        println!("Parked:  {}", parked);
    }

    Ok(())
}

/// Truncate content to max length with ellipsis
fn truncate_content(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_len).collect();
        format!("{}...", truncated)
    }
}

/// Human-readable time distance ("in 2h 5m" / "due 3m ago")
fn format_time_until(now: i64, target: i64) -> String {
    let delta = target - now;
    let (prefix, suffix, magnitude) = if delta >= 0 {
        ("in ", "", delta)
    } else {
        ("due ", " ago", -delta)
    };

    let hours = magnitude / 3600;
    let minutes = (magnitude % 3600) / 60;

    if hours > 0 {
        format!("{}{}h {}m{}", prefix, hours, minutes, suffix)
    } else if minutes > 0 {
        format!("{}{}m{}", prefix, minutes, suffix)
    } else {
        format!("{}{}s{}", prefix, magnitude, suffix)
    }
}
