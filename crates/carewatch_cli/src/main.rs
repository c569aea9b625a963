//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `carewatch_core` linkage, logging setup, the seed path and one
//!   reminder pass without a paired device.
//! - Keep output deterministic for quick local sanity checks.

use carewatch_core::clock::now_epoch_ms;
use carewatch_core::notify::{CollectingSink, TaskChecker};
use carewatch_core::sync::seed_if_empty;
use carewatch_core::{init_logging, CacheStore, CareRepositories, CoreConfig};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("carewatch_core ping={}", carewatch_core::ping());
    println!("carewatch_core version={}", carewatch_core::core_version());

    let config = CoreConfig::from_env();
    match init_logging(config.log_level, &config.log_dir.to_string_lossy()) {
        Ok(()) => println!(
            "carewatch_core logging level={} dir={}",
            config.log_level,
            config.log_dir.display()
        ),
        Err(err) => eprintln!("carewatch_core logging disabled: {err}"),
    }

    match seed_smoke_run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("carewatch_core seed_smoke_run failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn seed_smoke_run(config: &CoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = CacheStore::open_in_memory()?;
    let now_ms = now_epoch_ms();
    let seeded = seed_if_empty(&store, now_ms)?;
    let counts = store.counts()?;
    println!(
        "carewatch_core seeded={} children={} tasks={} medications={} meals={} health_checks={}",
        seeded.map_or(0, |outcome| outcome.written),
        counts.children,
        counts.tasks,
        counts.medications,
        counts.meals,
        counts.health_checks
    );

    let sink = Arc::new(CollectingSink::new());
    let mut checker = TaskChecker::new(
        CareRepositories::from_store(&store),
        sink.clone(),
        config.task_checker(),
    );
    let report = checker.tick(now_ms)?;
    println!(
        "carewatch_core reminders={} missed={} lookahead_min={}",
        report.reminders,
        report.missed,
        config.reminder_lookahead.as_secs() / 60
    );
    for notification in sink.take() {
        println!(
            "  [{}] {} - {}",
            notification.channel.id(),
            notification.title,
            notification.message
        );
    }
    Ok(())
}
