//! Network reachability tracking.
//!
//! The platform adapter feeds [`PathUpdate`]s in; the monitor derives a
//! coarse quality grade and fires edge-triggered restored/lost notifications.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Online,
    Offline,
    Connecting,
}

/// Coarse connection quality, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    Unknown,
    Poor,
    Moderate,
    Good,
    Excellent,
}

impl NetworkQuality {
    fn downgrade(self) -> Self {
        match self {
            NetworkQuality::Excellent => NetworkQuality::Good,
            NetworkQuality::Good => NetworkQuality::Moderate,
            NetworkQuality::Moderate | NetworkQuality::Poor => NetworkQuality::Poor,
            NetworkQuality::Unknown => NetworkQuality::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    Wifi,
    Cellular,
    Wired,
    Other,
    None,
}

/// A reachability change reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathUpdate {
    pub status: ConnectionStatus,
    pub interface: InterfaceType,
    /// Metered connection (cellular, personal hotspot).
    pub is_expensive: bool,
    /// Low data mode or similar OS-level constraint.
    pub is_constrained: bool,
}

impl PathUpdate {
    pub fn online(interface: InterfaceType) -> Self {
        Self {
            status: ConnectionStatus::Online,
            interface,
            is_expensive: interface == InterfaceType::Cellular,
            is_constrained: false,
        }
    }

    pub fn offline() -> Self {
        Self {
            status: ConnectionStatus::Offline,
            interface: InterfaceType::None,
            is_expensive: false,
            is_constrained: false,
        }
    }
}

/// Current connectivity as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    pub status: ConnectionStatus,
    pub quality: NetworkQuality,
    pub interface: InterfaceType,
    pub is_expensive: bool,
    pub is_constrained: bool,
}

impl ConnectivitySnapshot {
    fn from_update(update: &PathUpdate) -> Self {
        Self {
            status: update.status,
            quality: derive_quality(update),
            interface: update.interface,
            is_expensive: update.is_expensive,
            is_constrained: update.is_constrained,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ConnectionStatus::Online
    }

    pub fn should_defer_sync(&self) -> bool {
        self.quality < NetworkQuality::Moderate || self.is_expensive || self.is_constrained
    }
}

/// Edge between offline and online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityTransition {
    Restored,
    Lost,
}

/// Grade a path by interface type, downgraded one step when constrained.
pub fn derive_quality(update: &PathUpdate) -> NetworkQuality {
    if update.status != ConnectionStatus::Online {
        return NetworkQuality::Unknown;
    }
    let base = match update.interface {
        InterfaceType::Wired => NetworkQuality::Excellent,
        InterfaceType::Wifi => NetworkQuality::Good,
        InterfaceType::Cellular => NetworkQuality::Moderate,
        InterfaceType::Other => NetworkQuality::Poor,
        InterfaceType::None => NetworkQuality::Unknown,
    };
    if update.is_constrained {
        base.downgrade()
    } else {
        base
    }
}

fn settled(status: ConnectionStatus) -> Option<bool> {
    match status {
        ConnectionStatus::Online => Some(true),
        ConnectionStatus::Offline => Some(false),
        ConnectionStatus::Connecting => None,
    }
}

type Callback = Box<dyn Fn() + Send + Sync>;

pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivitySnapshot>,
    transitions: broadcast::Sender<ConnectivityTransition>,
    /// Last non-`Connecting` reachability; `None` until one is known.
    settled_online: Mutex<Option<bool>>,
    on_restored: Mutex<Vec<Callback>>,
    on_lost: Mutex<Vec<Callback>>,
}

impl ConnectivityMonitor {
    /// Monitor that starts in `Connecting` until the first path update.
    pub fn new() -> Self {
        Self::with_initial(PathUpdate {
            status: ConnectionStatus::Connecting,
            interface: InterfaceType::None,
            is_expensive: false,
            is_constrained: false,
        })
    }

    pub fn with_initial(update: PathUpdate) -> Self {
        let (state, _) = watch::channel(ConnectivitySnapshot::from_update(&update));
        let (transitions, _) = broadcast::channel(16);
        Self {
            state,
            transitions,
            settled_online: Mutex::new(settled(update.status)),
            on_restored: Mutex::new(Vec::new()),
            on_lost: Mutex::new(Vec::new()),
        }
    }

    /// Monitor that assumes an online wired connection. Used by headless
    /// callers with no reachability source.
    pub fn assume_online() -> Self {
        Self::with_initial(PathUpdate::online(InterfaceType::Wired))
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        *self.state.borrow()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.snapshot().status
    }

    pub fn quality(&self) -> NetworkQuality {
        self.snapshot().quality
    }

    pub fn is_online(&self) -> bool {
        self.snapshot().is_online()
    }

    /// True when non-critical syncs should wait for a better connection.
    pub fn should_defer_sync(&self) -> bool {
        self.snapshot().should_defer_sync()
    }

    /// Register a callback fired on every offline to online edge.
    pub fn on_restored(&self, callback: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut callbacks) = self.on_restored.lock() {
            callbacks.push(Box::new(callback));
        }
    }

    /// Register a callback fired on every online to offline edge.
    pub fn on_lost(&self, callback: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut callbacks) = self.on_lost.lock() {
            callbacks.push(Box::new(callback));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityTransition> {
        self.transitions.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectivitySnapshot> {
        self.state.subscribe()
    }

    /// Apply a platform path change. Returns the edge it caused, if any.
    pub fn apply_path_update(&self, update: PathUpdate) -> Option<ConnectivityTransition> {
        let next = ConnectivitySnapshot::from_update(&update);
        self.state.send_replace(next);
        debug!(status = ?next.status, quality = ?next.quality, "connectivity path updated");

        let now = settled(update.status)?;
        let before = match self.settled_online.lock() {
            Ok(mut guard) => guard.replace(now),
            Err(_) => return None,
        };
        let transition = match (before, now) {
            (Some(true), true) | (Some(false) | None, false) => return None,
            (_, true) => ConnectivityTransition::Restored,
            (_, false) => ConnectivityTransition::Lost,
        };

        match transition {
            ConnectivityTransition::Restored => {
                info!(quality = ?next.quality, "connectivity restored");
                self.fire(&self.on_restored);
            }
            ConnectivityTransition::Lost => {
                warn!("connectivity lost");
                self.fire(&self.on_lost);
            }
        }
        // No receivers is fine; the callbacks above already ran.
        let _ = self.transitions.send(transition);
        Some(transition)
    }

    fn fire(&self, callbacks: &Mutex<Vec<Callback>>) {
        if let Ok(callbacks) = callbacks.lock() {
            for callback in callbacks.iter() {
                callback();
            }
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
