// src/main.rs
//
// Runs one library reconciliation and prints the result.
//
// Usage: animenow-sync [config.json] [sort] [title filter]
// Log level comes from RUST_LOG (default: info).

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use animenow_sync::application::AppState;
use animenow_sync::config::SyncConfig;
use animenow_sync::domain::{
    filter_by_title, group_by_status, sort_library, LibraryStatusCounts, SortType,
};
use animenow_sync::events::{LibrarySyncCompleted, LibrarySyncFailed, PinnedQueryRefreshed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("animenow-sync.json"));
    let sort = match args.next() {
        Some(raw) => raw.parse::<SortType>()?,
        None => SortType::default(),
    };
    let title_filter = args.next();

    // 1. CONFIGURATION
    let config = SyncConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // 2. APPLICATION STATE
    let state = AppState::from_config(config).context("initializing sync state")?;
    state.verify_integrity().context("checking database integrity")?;

    // 3. EVENT HANDLER REGISTRATION
    state
        .event_bus
        .subscribe::<LibrarySyncCompleted, _>(|event| {
            log::info!(
                "Sync of '{}' finished: {} entities ({} fetched, list refreshed: {})",
                event.partition,
                event.entity_count,
                event.remote_fetched,
                event.was_stale
            );
        });
    state.event_bus.subscribe::<LibrarySyncFailed, _>(|event| {
        log::warn!(
            "Sync of '{}' failed in {} (retryable: {}): {}",
            event.partition,
            event.phase,
            event.retryable,
            event.reason
        );
    });
    state
        .event_bus
        .subscribe::<PinnedQueryRefreshed, _>(|event| {
            log::info!("Pinned query '{}' refreshed", event.pin);
        });

    // 4. RECONCILE
    let partition = state.config.library_partition.clone();
    let report = state
        .reconciler
        .reconcile_with_report(&partition, state.config.max_age_days)
        .await
        .with_context(|| format!("reconciling '{}'", partition))?;

    log::info!(
        "{} requested, {} from cache, {} from network, {} unresolved",
        report.stats.requested_ids,
        report.stats.local_hits,
        report.stats.remote_fetched,
        report.stats.unresolved
    );

    let db_stats = state.database_stats()?;
    log::debug!(
        "Database: {} cached entities ({} pinned), {} progress records, {} bytes",
        db_stats.cached_entity_count,
        db_stats.pinned_entity_count,
        db_stats.progress_count,
        db_stats.size_bytes
    );

    // 5. OUTPUT
    let mut library = match title_filter.as_deref() {
        Some(query) => filter_by_title(&report.entities, query),
        None => report.entities,
    };
    sort_library(&mut library, sort);

    let counts = LibraryStatusCounts::from_entities(&library);
    println!(
        "{} titles: {} watching, {} completed, {} on hold, {} dropped, {} planning, {} untracked",
        counts.total(),
        counts.watching,
        counts.completed,
        counts.on_hold,
        counts.dropped,
        counts.planning,
        counts.untracked
    );

    for (status, entries) in group_by_status(&library) {
        println!("\n[{}]", status.as_str());
        for merged in entries {
            let progress = merged
                .progress
                .as_ref()
                .map(|p| format!("{} eps, score {}", p.episodes_watched, p.score))
                .unwrap_or_default();
            println!("  {:>6}  {}  {}", merged.entity.external_id.0, merged.entity.title, progress);
        }
    }

    Ok(())
}
