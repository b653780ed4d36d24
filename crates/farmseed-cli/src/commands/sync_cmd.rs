use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use farmseed_core::sync::{SyncOutcome, SyncScheduler, SyncState};

use crate::cli::SyncCommands;
use crate::commands::common::open_engine;
use crate::error::CliError;

pub async fn run(command: SyncCommands, data_dir: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_dir).await?;
    match command {
        SyncCommands::Now => {
            match engine.sync_now().await? {
                SyncOutcome::Completed => println!("Sync completed"),
                SyncOutcome::AlreadyInFlight => println!("Sync already running"),
                SyncOutcome::NotConnected => {
                    println!("Not connected to a farm; run `farmseed farm join` first");
                }
            }
            Ok(())
        }
        SyncCommands::Status => {
            let status = engine.status().await;
            match &status.farm {
                Some(farm) => {
                    let role = if farm.is_admin { "admin" } else { "member" };
                    println!("Farm:      {} ({}) as {role}", farm.name, farm.id);
                }
                None => println!("Farm:      not connected"),
            }
            println!("State:     {}", state_label(status.state));
            match status.last_sync_at {
                Some(at) => println!("Last sync: {} ({})", at.to_rfc3339(), relative_time(at)),
                None => println!("Last sync: never"),
            }
            if let Some(error) = &status.last_error {
                println!("Error:     {error}");
            }
            println!("Members:   {}", status.members.len());
            Ok(())
        }
        SyncCommands::Watch { interval_secs } => {
            if engine.current_farm_id().await.is_none() {
                println!("Not connected to a farm; run `farmseed farm join` first");
                return Ok(());
            }
            let interval = Duration::from_secs(interval_secs.max(1));
            println!("Syncing every {}s; press Ctrl-C to stop", interval.as_secs());
            let scheduler = SyncScheduler::start(engine, interval);
            tokio::signal::ctrl_c().await?;
            scheduler.shutdown().await;
            println!("Stopped");
            Ok(())
        }
    }
}

const fn state_label(state: SyncState) -> &'static str {
    match state {
        SyncState::Disconnected => "disconnected",
        SyncState::Idle => "idle",
        SyncState::Syncing => "syncing",
        SyncState::Error => "error",
    }
}

fn relative_time(at: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(at);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 24 * 60 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (24 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(relative_time(now), "just now");
        assert_eq!(relative_time(now - ChronoDuration::minutes(5)), "5m ago");
        assert_eq!(relative_time(now - ChronoDuration::hours(3)), "3h ago");
        assert_eq!(relative_time(now - ChronoDuration::days(2)), "2d ago");
    }
}
