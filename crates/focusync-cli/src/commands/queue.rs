//! Pending operation queue commands.

use chrono::Utc;
use clap::Subcommand;
use focusync_core::sync::{EntityType, OperationQueue, OperationType, SyncOperation};

#[derive(Subcommand)]
pub enum QueueAction {
    /// List pending operations in drain order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a mutation
    Enqueue {
        /// Operation type: create, update or delete
        op_type: OperationType,
        /// Entity type: task, goal, achievement, user or streak
        entity_type: EntityType,
        /// Entity ID
        entity_id: String,
        /// Row as a JSON object (create/update only)
        #[arg(long)]
        payload: Option<String>,
    },
    /// Remove pending operations for an entity
    Remove {
        /// Entity ID
        entity_id: String,
    },
    /// Drop every pending operation
    Clear,
}

pub fn run(action: QueueAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut queue = OperationQueue::open_default()?;
    match action {
        QueueAction::List { json } => {
            let ops = queue.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&ops)?);
            } else if ops.is_empty() {
                println!("queue is empty");
            } else {
                for op in ops {
                    let error = op.last_error.as_deref().unwrap_or("-");
                    println!(
                        "{}  {:<6} {:<11} {}  attempts={} last_error={}",
                        op.created_at.format("%Y-%m-%d %H:%M:%S"),
                        op.op_type,
                        op.entity_type,
                        op.entity_id,
                        op.attempts,
                        error
                    );
                }
            }
        }
        QueueAction::Enqueue {
            op_type,
            entity_type,
            entity_id,
            payload,
        } => {
            let payload = match op_type {
                OperationType::Delete => None,
                OperationType::Create | OperationType::Update => {
                    Some(build_row(&entity_id, payload.as_deref())?)
                }
            };
            let op = SyncOperation::new(op_type, entity_type, entity_id, payload);
            let summary = format!("{} {} {}", op.op_type, op.entity_type, op.entity_id);
            queue.enqueue(op)?;
            println!("queued {summary}");
            println!("pending: {}", queue.len());
        }
        QueueAction::Remove { entity_id } => {
            let removed = queue.remove_by_entity(&entity_id)?;
            println!("removed {removed} operation(s)");
        }
        QueueAction::Clear => {
            queue.clear()?;
            println!("queue cleared");
        }
    }
    Ok(())
}

/// Parse the payload object, filling in `id` and `updated_at` when missing.
fn build_row(
    entity_id: &str,
    payload: Option<&str>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut row = match payload {
        Some(raw) => serde_json::from_str::<serde_json::Value>(raw)?,
        None => serde_json::json!({}),
    };
    let object = row
        .as_object_mut()
        .ok_or("payload must be a JSON object")?;
    object
        .entry("id")
        .or_insert_with(|| serde_json::Value::String(entity_id.to_string()));
    object
        .entry("updated_at")
        .or_insert_with(|| serde_json::Value::String(Utc::now().to_rfc3339()));
    Ok(row)
}
