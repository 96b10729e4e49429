//! Encoding/decoding between entity records, operation payloads and the
//! flat JSON rows the remote store speaks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::sync::types::{EntityType, OperationType, SyncOperation};

/// The core's view of a local or remote entity.
///
/// Only `id` and `updated_at` carry meaning for sync; every other column is
/// kept opaque in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub entity_type: EntityType,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl EntityRecord {
    pub fn new(entity_type: EntityType, id: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            entity_type,
            updated_at,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

// ============================================================================
// Row Encoding/Decoding
// ============================================================================

/// Flatten a record into a single JSON object row.
pub fn record_to_row(record: &EntityRecord) -> Value {
    let mut row = record.fields.clone();
    row.insert("id".into(), Value::String(record.id.clone()));
    row.insert("updated_at".into(), Value::String(record.updated_at.to_rfc3339()));
    Value::Object(row)
}

/// Parse a flat JSON row into a record of the given type.
pub fn row_to_record(entity_type: EntityType, row: &Value) -> Result<EntityRecord, GatewayError> {
    let obj = row.as_object().ok_or_else(|| {
        GatewayError::InvalidPayload(format!("{entity_type} row is not an object"))
    })?;

    let id = match obj.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(GatewayError::InvalidPayload(format!(
                "{entity_type} row is missing id"
            )))
        }
    };

    let updated_str = obj
        .get("updated_at")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GatewayError::InvalidPayload(format!("{entity_type} {id} is missing updated_at"))
        })?;
    let updated_at = DateTime::parse_from_rfc3339(updated_str)
        .map_err(|e| {
            GatewayError::InvalidPayload(format!("Invalid timestamp on {entity_type} {id}: {e}"))
        })?
        .with_timezone(&Utc);

    let fields = obj
        .iter()
        .filter(|(k, _)| k.as_str() != "id" && k.as_str() != "updated_at")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(EntityRecord {
        id,
        entity_type,
        updated_at,
        fields,
    })
}

// ============================================================================
// Operation Payloads
// ============================================================================

/// Build the queued operation for a local record change.
pub fn record_to_operation(op_type: OperationType, record: &EntityRecord) -> SyncOperation {
    let payload = match op_type {
        OperationType::Delete => None,
        _ => Some(record_to_row(record)),
    };
    SyncOperation::new(op_type, record.entity_type, record.id.clone(), payload)
}

/// Decode the entity snapshot carried by a create/update operation.
///
/// A missing or malformed payload is a permanent failure; the operation can
/// never succeed as queued.
pub fn operation_record(op: &SyncOperation) -> Result<EntityRecord, GatewayError> {
    let payload = op.payload.as_ref().ok_or_else(|| {
        GatewayError::InvalidPayload(format!("{} {} has no payload", op.op_type, op.entity_id))
    })?;
    let record = row_to_record(op.entity_type, payload)?;
    if record.id != op.entity_id {
        return Err(GatewayError::InvalidPayload(format!(
            "payload id {} does not match entity {}",
            record.id, op.entity_id
        )));
    }
    Ok(record)
}
