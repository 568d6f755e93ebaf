//! # Example: Custom Subscriber
//!
//! Counts events per kind and flags privilege changes, next to a raw reader
//! that decodes the 164-byte records itself.
//!
//! ```text
//! cargo run --example custom_subscriber
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use procmon::{
    Broadcaster, Config, EventKind, ProcessEvent, ProcessInfo, ProcessTable, Subscribe,
    SubscriberSet, Transition, EVENT_SIZE,
};

/// Counts events by kind and prints uid changes.
#[derive(Default)]
struct KindCounter {
    counts: Mutex<BTreeMap<&'static str, u64>>,
}

#[async_trait]
impl Subscribe for KindCounter {
    async fn on_event(&self, ev: &ProcessEvent) {
        if ev.kind == EventKind::Setuid {
            println!(
                "[counter] pid={} now uid={} euid={} ({})",
                ev.pid, ev.uid, ev.euid, ev.comm
            );
        }
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry(ev.kind.as_label()).or_default() += 1;
    }

    fn name(&self) -> &'static str {
        "kind-counter"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let table = Arc::new(ProcessTable::from_processes([
        ProcessInfo::new(1, 0, "init"),
        ProcessInfo::new(300, 1, "sshd"),
    ]));
    let broadcaster = Broadcaster::new(Config::default(), table.clone());

    let counter = Arc::new(KindCounter::default());
    let set = SubscriberSet::new(&broadcaster, vec![counter.clone() as Arc<dyn Subscribe>])?;

    // A raw reader on its own stream.
    let mut raw = broadcaster.open()?;
    let raw_closer = raw.closer();
    let reader = tokio::spawn(async move {
        let mut buf = [0u8; EVENT_SIZE];
        loop {
            match raw.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => match ProcessEvent::decode(&buf[..n]) {
                    Ok(ev) => println!("[raw] {} pid={} comm={}", ev.kind.as_label(), ev.pid, ev.comm),
                    Err(e) => eprintln!("[raw] {e}"),
                },
                Err(e) => {
                    eprintln!("[raw] {e}");
                    break;
                }
            }
        }
    });

    // Simulated registry activity: sshd forks a session that drops to a user and runs a shell.
    let session = ProcessInfo::new(301, 300, "sshd");
    table.insert(session.clone());
    broadcaster.notify(&session, Transition::Clone);

    let user = table
        .update(301, |p| {
            p.uid = 1000;
            p.euid = 1000;
            p.suid = 1000;
            p.fsuid = 1000;
        })
        .unwrap_or(session);
    broadcaster.notify(&user, Transition::Setuid);

    let shell = table
        .update(301, |p| p.comm = "bash".to_string())
        .unwrap_or(user);
    broadcaster.notify(&shell, Transition::Execve);

    if let Some(gone) = table.remove(301) {
        broadcaster.notify(&gone.with_exit_status(0), Transition::Exit);
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    raw_closer.close();
    reader.await?;
    set.shutdown().await;

    let counts = counter.counts.lock().unwrap_or_else(|e| e.into_inner());
    for (kind, n) in counts.iter() {
        println!("[counter] {kind}: {n}");
    }
    Ok(())
}
