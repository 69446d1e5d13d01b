//! Tempo binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the meeting store (SQLite or in-memory)
//! 3. Pick the completion client (HTTP or unavailable)
//! 4. Run an interactive chat loop on stdin, with slash commands for
//!    statistics, insights and free-time search

mod cli;
mod commands;

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use tempo_chat::{
    ChatReply, CompletionClient, DialogueEngine, HttpCompletionClient, UnavailableCompletionClient,
};
use tempo_core::config::{StorageBackend, TempoConfig};
use tempo_schedule::analytics::{meeting_analytics, schedule_insights};
use tempo_schedule::{Database, InMemoryMeetingStore, MeetingStore, SqliteMeetingStore};

use cli::{expand_home, CliArgs};
use commands::SlotArgs;

fn open_store(
    config: &TempoConfig,
    force_memory: bool,
) -> Result<Arc<dyn MeetingStore>, Box<dyn std::error::Error>> {
    if force_memory || config.storage.backend == StorageBackend::Memory {
        tracing::info!("Using in-memory meeting store");
        return Ok(Arc::new(InMemoryMeetingStore::new()));
    }

    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join(&config.storage.sqlite_path);
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");
    Ok(Arc::new(SqliteMeetingStore::new(Arc::new(db))))
}

fn completion_client(config: &TempoConfig) -> Arc<dyn CompletionClient> {
    if !config.completion.enabled {
        tracing::info!("Completion service disabled, using rule-based replies");
        return Arc::new(UnavailableCompletionClient);
    }
    match HttpCompletionClient::from_config(&config.completion) {
        Ok(client) => {
            tracing::info!(model = %config.completion.model, "Completion service configured");
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Completion client unavailable, using rule-based replies");
            Arc::new(UnavailableCompletionClient)
        }
    }
}

fn print_reply(reply: &ChatReply) {
    println!("{}", reply.message);
    for moved in &reply.rescheduled {
        println!("  moved: '{}' ({})", moved.title, moved.reason);
    }
    for stuck in &reply.unresolved_conflicts {
        println!("  unresolved: '{}' ({})", stuck.title, stuck.reason);
    }
}

async fn print_stats(engine: &DialogueEngine, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let tz = engine.time_context();
    let today = tz.today();
    let stats = meeting_analytics(
        engine.store().as_ref(),
        user,
        today - Duration::days(30),
        today + Duration::days(30),
        &tz,
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn print_insights(
    engine: &DialogueEngine,
    user: &str,
    arg: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let tz = engine.time_context();
    let date = match arg {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?,
        None => tz.today(),
    };
    let insights = schedule_insights(engine.store().as_ref(), user, date, &tz).await?;
    if insights.is_empty() {
        println!("Nothing notable on {}.", date);
    }
    for insight in &insights {
        println!("- {}", insight.describe(&tz));
    }
    Ok(())
}

/// `/suggest` lists ranked slots; `/optimal` prints only the best one.
async fn print_slots(
    engine: &DialogueEngine,
    user: &str,
    args: &[&str],
    best_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tz = engine.time_context();
    let slot_args = SlotArgs::parse(user, args, tz.today())?;
    let query = slot_args.query(tz.now());
    let search = engine.slot_search();
    let slots: Vec<_> = if best_only {
        search.optimal(&query, &tz).await?.into_iter().collect()
    } else {
        search.suggest(&query, &tz).await?
    };
    tracing::debug!(
        participants = slot_args.participants.len(),
        found = slots.len(),
        "Slot command answered"
    );

    if slots.is_empty() {
        println!(
            "No time between {} and {} works for {}.",
            slot_args.from,
            slot_args.to,
            slot_args.participants.join(", ")
        );
    }
    for (i, slot) in slots.iter().enumerate() {
        println!(
            "{}. {} to {} (score {:.2})",
            i + 1,
            tz.describe(slot.start),
            tz.describe_time(slot.end),
            slot.score
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config = TempoConfig::load_or_default(&config_file);
    let level = args.resolve_log_level(&config.general.log_level);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Tempo v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let store = open_store(&config, args.memory)?;
    let completion = completion_client(&config);
    let engine = DialogueEngine::new(store, completion, &config);
    let user = args.resolve_user();
    tracing::info!(user = %user, "Chat session ready");

    println!(
        "Tempo is ready. Type a message, /stats, /insights [YYYY-MM-DD], \
         /suggest <people> [minutes] [from] [to], /optimal <people> [minutes] [from] [to] or /quit."
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let result = match parts.next() {
            Some("/quit") | Some("/exit") => break,
            Some("/stats") => print_stats(&engine, &user).await,
            Some("/insights") => print_insights(&engine, &user, parts.next()).await,
            Some(cmd @ ("/suggest" | "/optimal")) => {
                let rest: Vec<&str> = parts.collect();
                print_slots(&engine, &user, &rest, cmd == "/optimal").await
            }
            _ => match engine.process_message(&user, line).await {
                Ok(reply) => {
                    print_reply(&reply);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Command failed");
            println!("Sorry, that didn't work: {}", e);
        }
    }

    tracing::info!("Goodbye");
    Ok(())
}
