//! # Example: procfs dump
//!
//! Snapshots `/proc`, opens one stream and logs every event until Ctrl-C.
//! Live transitions come from rescanning `/proc` once per second and diffing
//! against the previous scan, so short-lived processes are missed.
//!
//! ```text
//! RUST_LOG=procmon=info cargo run --example procmon_dump --features logging
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use procmon::{
    Broadcaster, Config, LiveTracker, LogWriter, Pid, ProcessInfo, ProcessTable, Subscribe,
    SubscriberSet, Transition,
};
use tracing_subscriber::EnvFilter;

const PROC_ROOT: &str = "/proc";

/// Reports differences between two scans as transitions and applies them to the table.
fn apply_rescan(table: &ProcessTable, broadcaster: &Broadcaster, fresh: &ProcessTable) {
    let before: HashMap<Pid, ProcessInfo> =
        table.processes().into_iter().map(|p| (p.pid, p)).collect();
    let after: HashMap<Pid, ProcessInfo> =
        fresh.processes().into_iter().map(|p| (p.pid, p)).collect();

    for (pid, old) in &before {
        if !after.contains_key(pid) {
            table.remove(*pid);
            broadcaster.notify(old, Transition::Exit);
        }
    }

    let mut news: Vec<&ProcessInfo> = after.values().collect();
    news.sort_unstable_by_key(|p| p.pid);
    for new in news {
        match before.get(&new.pid) {
            None => {
                table.insert(new.clone());
                broadcaster.notify(new, Transition::Clone);
            }
            Some(old) if old.comm != new.comm => {
                table.insert(new.clone());
                broadcaster.notify(new, Transition::Execve);
            }
            Some(old) if (old.uid, old.euid) != (new.uid, new.euid) => {
                table.insert(new.clone());
                broadcaster.notify(new, Transition::Setuid);
            }
            Some(_) => {}
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("procmon=info")),
        )
        .init();

    let table = Arc::new(ProcessTable::from_procfs(PROC_ROOT)?);
    println!("[dump] {} processes in snapshot", table.len());

    let broadcaster = Broadcaster::new(Config::default(), table.clone());
    let tracker = Arc::new(LiveTracker::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), tracker.clone()];
    let set = SubscriberSet::new(&broadcaster, subs)?;

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => {
                match ProcessTable::from_procfs(PROC_ROOT) {
                    Ok(fresh) => apply_rescan(&table, &broadcaster, &fresh),
                    Err(e) => eprintln!("[dump] rescan failed: {e}"),
                }
            }
        }
    }

    for (name, handled) in set.shutdown().await {
        println!("[dump] {name}: {handled} events");
    }
    println!(
        "[dump] tracker saw {} live processes, {} gaps",
        tracker.len(),
        tracker.gaps()
    );
    Ok(())
}
