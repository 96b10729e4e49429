//! Dead-lettered operation commands.

use clap::Subcommand;
use focusync_core::sync::{DeadLetterLog, FailureReason};

#[derive(Subcommand)]
pub enum FailedAction {
    /// List operations dropped after failing
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget every failed operation
    Clear,
}

pub fn run(action: FailedAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut log = DeadLetterLog::open_default()?;
    match action {
        FailedAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(log.entries())?);
                return Ok(());
            }
            if log.is_empty() {
                println!("no failed operations");
            }
            for failed in log.entries() {
                let reason = match failed.reason {
                    FailureReason::RetriesExhausted => "retries exhausted",
                    FailureReason::Permanent => "permanent",
                };
                let op = &failed.operation;
                println!(
                    "{}  {} {} {}  ({reason}, attempts={}): {}",
                    failed.failed_at.format("%Y-%m-%d %H:%M:%S"),
                    op.op_type,
                    op.entity_type,
                    op.entity_id,
                    op.attempts,
                    op.last_error.as_deref().unwrap_or("-")
                );
            }
        }
        FailedAction::Clear => {
            let count = log.len();
            log.clear()?;
            println!("cleared {count} failed operation(s)");
        }
    }
    Ok(())
}
