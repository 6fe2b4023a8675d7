//! `logs` and `status` command implementations

use crate::cli::output::{format_display_json, StreamPrinter};
use crate::cli::{ctrl_c, LogsArgs, StatusArgs};
use crate::config::OptimConfig;
use crate::registry::{ConnectionRegistry, ResourceId};
use crate::stream::{StreamManager, Subscription};
use std::sync::Arc;

/// How following a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// The server finished the stream (job completed)
    Finished,
    /// The user pressed Ctrl-C
    Interrupted,
}

/// Handle `optim logs`
pub async fn run_logs(
    args: &LogsArgs,
    config: &OptimConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = StreamManager::from_config(Arc::new(ConnectionRegistry::new()), config)?;
    let subscription = manager.subscribe_logs(&ResourceId::new(&args.prompt_hash, &args.tc_hash));
    follow(&manager, subscription, args.json).await;
    manager.shutdown().await;
    Ok(())
}

/// Handle `optim status`
pub async fn run_status(
    args: &StatusArgs,
    config: &OptimConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = StreamManager::from_config(Arc::new(ConnectionRegistry::new()), config)?;
    let subscription = manager.subscribe_status(
        &ResourceId::new(&args.prompt_hash, &args.tc_hash),
        args.initial,
    );
    follow(&manager, subscription, args.json).await;
    manager.shutdown().await;
    Ok(())
}

/// Print every update of `subscription` until the stream ends or the user
/// interrupts, then close the stream explicitly.
pub async fn follow(
    manager: &StreamManager,
    mut subscription: Subscription,
    json: bool,
) -> FollowOutcome {
    let key = subscription.key().clone();
    let kind = subscription.kind();
    let mut printer = StreamPrinter::new();

    let mut emit = |subscription: &Subscription| {
        let display = subscription.display();
        if json {
            println!("{}", format_display_json(&key, kind, &display));
        } else {
            for line in printer.update(&display) {
                println!("{}", line);
            }
        }
    };

    emit(&subscription);
    let outcome = loop {
        tokio::select! {
            _ = ctrl_c() => break FollowOutcome::Interrupted,
            changed = subscription.changed() => {
                if !changed {
                    break FollowOutcome::Finished;
                }
                emit(&subscription);
            }
        }
    };

    if outcome == FollowOutcome::Interrupted {
        manager.close(&key);
    }
    tracing::debug!(key = %key, outcome = ?outcome, "Stopped following stream");
    outcome
}
