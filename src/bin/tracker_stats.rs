//! Prints notification tracker statistics and a few example slots.
//!
//! Usage: `tracker_stats [--sweep-days N] [--examples N]`

use anyhow::{bail, Context, Result};
use chrono::Duration;
use slot_notify_tracker::{init_tracing, SlotKey, SlotNotificationTracker, TrackerConfig};

const DEFAULT_EXAMPLES: usize = 5;

#[derive(Debug, Default)]
struct Args {
    sweep_days: Option<i64>,
    examples: Option<usize>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--sweep-days" => {
                let v = it.next().context("--sweep-days needs a value")?;
                args.sweep_days = Some(v.parse().with_context(|| format!("bad --sweep-days {v:?}"))?);
            }
            "--examples" => {
                let v = it.next().context("--examples needs a value")?;
                args.examples = Some(v.parse().with_context(|| format!("bad --examples {v:?}"))?);
            }
            "-h" | "--help" => {
                println!("usage: tracker_stats [--sweep-days N] [--examples N]");
                std::process::exit(0);
            }
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = parse_args()?;

    let cfg = TrackerConfig::from_env()?;
    let tracker = SlotNotificationTracker::connect(&cfg)
        .await
        .context("connecting notification tracker")?;

    if let Some(days) = args.sweep_days {
        let older_than = Duration::try_days(days)
            .with_context(|| format!("--sweep-days {days} is out of range"))?;
        let removed = tracker.sweep_expired(older_than).await?;
        println!("Swept {removed} entries older than {days} days");
    }

    let stats = tracker.stats().await?;
    println!("{stats}");

    let total = stats.total_notified_slots;
    if total > 0 {
        let limit = args.examples.unwrap_or(DEFAULT_EXAMPLES);
        println!("\n=== Example Notified Slots ===");
        for key in tracker.sample_keys(limit).await? {
            match SlotKey::decode(&cfg.key_prefix, &key) {
                Ok(slot) => println!("  {key}  ({} @ {})", slot.resource_id(), slot.slot_time()),
                Err(_) => println!("  {key}"),
            }
        }
        if total > limit {
            println!("  ... and {} more", total - limit);
        }
    }
    Ok(())
}
