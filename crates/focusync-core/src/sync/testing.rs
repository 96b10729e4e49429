//! In-memory gateway used by coordinator tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::GatewayError;
use crate::sync::connectivity::{ConnectivityMonitor, PathUpdate};
use crate::sync::gateway::RemoteGateway;
use crate::sync::record_codec::EntityRecord;
use crate::sync::types::EntityType;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upsert(EntityType, String),
    Delete(EntityType, String),
    Fetch(EntityType),
}

/// Pushes answer with scripted results in order, then succeed once the script
/// runs out. Pulls answer from `remote`.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<(), GatewayError>>>,
    calls: Mutex<Vec<Call>>,
    remote: Mutex<HashMap<EntityType, Vec<EntityRecord>>>,
    failing_fetch: Mutex<Option<(EntityType, GatewayError)>>,
    drop_connection_after: Mutex<Option<(usize, Arc<ConnectivityMonitor>)>>,
    latency: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_results(&self, results: impl IntoIterator<Item = Result<(), GatewayError>>) {
        self.script.lock().unwrap().extend(results);
    }

    pub fn fail_always(&self, err: GatewayError, times: usize) {
        self.push_results(std::iter::repeat(Err(err)).take(times));
    }

    pub fn set_remote(&self, entity_type: EntityType, records: Vec<EntityRecord>) {
        self.remote.lock().unwrap().insert(entity_type, records);
    }

    pub fn fail_fetch(&self, entity_type: EntityType, err: GatewayError) {
        *self.failing_fetch.lock().unwrap() = Some((entity_type, err));
    }

    /// Report the connection as lost once `calls` pushes have been answered.
    pub fn drop_connection_after(&self, calls: usize, monitor: Arc<ConnectivityMonitor>) {
        *self.drop_connection_after.lock().unwrap() = Some((calls, monitor));
    }

    /// Make every push take `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Hold every push until `gate` is notified, once per push.
    pub fn hold_pushes(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !matches!(c, Call::Fetch(_)))
            .count()
    }

    async fn answer(&self, call: Call) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(call);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let result = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        let pushes = self.push_count();
        if let Some((after, monitor)) = self.drop_connection_after.lock().unwrap().as_ref() {
            if pushes >= *after {
                monitor.apply_path_update(PathUpdate::offline());
            }
        }
        result
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn create_or_update(
        &self,
        entity_type: EntityType,
        record: &EntityRecord,
    ) -> Result<(), GatewayError> {
        self.answer(Call::Upsert(entity_type, record.id.clone())).await
    }

    async fn delete(&self, entity_type: EntityType, id: &str) -> Result<(), GatewayError> {
        self.answer(Call::Delete(entity_type, id.to_string())).await
    }

    async fn fetch_all(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, GatewayError> {
        self.calls.lock().unwrap().push(Call::Fetch(entity_type));
        if let Some((failing, err)) = self.failing_fetch.lock().unwrap().as_ref() {
            if *failing == entity_type {
                return Err(err.clone());
            }
        }
        Ok(self
            .remote
            .lock()
            .unwrap()
            .get(&entity_type)
            .cloned()
            .unwrap_or_default())
    }
}
