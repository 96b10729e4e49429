//! Core types for offline synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of mutation carried by a [`SyncOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(OperationType::Create),
            "update" => Ok(OperationType::Update),
            "delete" => Ok(OperationType::Delete),
            other => Err(format!("unknown operation type: {other}")),
        }
    }
}

/// Syncable entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Task,
    Goal,
    Achievement,
    User,
    Streak,
}

impl EntityType {
    /// Pull order used by full reconciliation.
    pub const ALL: [EntityType; 5] = [
        EntityType::Task,
        EntityType::Goal,
        EntityType::Achievement,
        EntityType::User,
        EntityType::Streak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Task => "task",
            EntityType::Goal => "goal",
            EntityType::Achievement => "achievement",
            EntityType::User => "user",
            EntityType::Streak => "streak",
        }
    }

    /// Remote table holding this entity type.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Task => "tasks",
            EntityType::Goal => "goals",
            EntityType::Achievement => "achievements",
            EntityType::User => "users",
            EntityType::Streak => "streaks",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || t.table_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// A single queued mutation targeting one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub entity_type: EntityType,
    pub entity_id: String,
    /// Serialized entity snapshot. Absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncOperation {
    pub fn new(
        op_type: OperationType,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op_type,
            entity_type,
            entity_id: entity_id.into(),
            payload,
            created_at: Utc::now(),
            attempts: 0,
            last_attempt: None,
            last_error: None,
        }
    }

    pub fn create(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(OperationType::Create, entity_type, entity_id, Some(payload))
    }

    pub fn update(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(OperationType::Update, entity_type, entity_id, Some(payload))
    }

    pub fn delete(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self::new(OperationType::Delete, entity_type, entity_id, None)
    }

    /// Whether this operation targets the same entity as `other`.
    pub fn same_entity(&self, other: &SyncOperation) -> bool {
        self.entity_type == other.entity_type && self.entity_id == other.entity_id
    }
}

/// Aggregate sync state exposed to observers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing { progress: f64 },
    Success { synced_count: usize },
    Error { message: String },
    Offline,
}

impl SyncState {
    /// True while a drain or full sync is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing { .. })
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Syncing { progress } => write!(f, "syncing ({:.0}%)", progress * 100.0),
            SyncState::Success { synced_count } => write!(f, "synced {synced_count}"),
            SyncState::Error { message } => write!(f, "error: {message}"),
            SyncState::Offline => write!(f, "offline"),
        }
    }
}

/// Why an operation was moved to the dead-letter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    RetriesExhausted,
    Permanent,
}

/// An operation permanently dropped from the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub operation: SyncOperation,
    pub reason: FailureReason,
    pub failed_at: DateTime<Utc>,
}

/// Read-only aggregate for UI and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub state: SyncState,
    pub pending_count: usize,
    pub last_successful_sync: Option<DateTime<Utc>>,
    pub failed_operations_count: usize,
    pub needs_sync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_has_no_payload() {
        let op = SyncOperation::delete(EntityType::Task, "task-1");
        assert_eq!(op.op_type, OperationType::Delete);
        assert!(op.payload.is_none());
        assert_eq!(op.attempts, 0);
    }

    #[test]
    fn same_entity_requires_matching_type() {
        let a = SyncOperation::delete(EntityType::Task, "x");
        let b = SyncOperation::delete(EntityType::Goal, "x");
        let c = SyncOperation::update(EntityType::Task, "x", serde_json::json!({}));
        assert!(!a.same_entity(&b));
        assert!(a.same_entity(&c));
    }

    #[test]
    fn only_syncing_is_active() {
        assert!(SyncState::Syncing { progress: 0.5 }.is_active());
        assert!(!SyncState::Idle.is_active());
        assert!(!SyncState::Offline.is_active());
        assert!(!SyncState::Success { synced_count: 1 }.is_active());
    }

    #[test]
    fn entity_type_parses_singular_and_table_names() {
        assert_eq!("task".parse::<EntityType>().unwrap(), EntityType::Task);
        assert_eq!("Streaks".parse::<EntityType>().unwrap(), EntityType::Streak);
        assert!("habit".parse::<EntityType>().is_err());
    }

    #[test]
    fn operation_serializes_type_field() {
        let op =
            SyncOperation::update(EntityType::Goal, "g-1", serde_json::json!({"title": "Run"}));
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["entity_type"], "goal");
        assert_eq!(json["payload"]["title"], "Run");
    }
}
