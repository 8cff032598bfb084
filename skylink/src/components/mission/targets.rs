use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A person or object spotted by the onboard vision system.
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq)]
pub struct DetectedTarget {
    /// Identifier of the tag that was detected.
    pub id: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// When the ground station learned about the target.
    pub detected_at: DateTime<Utc>,
}

impl DetectedTarget {
    /// Create a target detected now.
    pub fn new(id: u32, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
            detected_at: Utc::now(),
        }
    }
}

/// Notified every time a target is added to the mission.
pub trait TargetObserver: Send + Sync {
    fn on_target_detected(&self, target: &DetectedTarget);
}

/// Targets found during a mission, in arrival order.
#[derive(Default)]
pub struct TargetList {
    targets: Vec<DetectedTarget>,
    observers: Vec<Arc<dyn TargetObserver>>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target and notify observers in registration order.
    ///
    /// * `target`: detected target.
    pub fn add_target(&mut self, target: DetectedTarget) {
        info!(
            "Target {} detected at ({}, {})",
            target.id, target.latitude, target.longitude
        );
        for observer in &self.observers {
            observer.on_target_detected(&target);
        }
        self.targets.push(target);
    }

    /// Register an observer, false if it was already registered.
    pub fn add_observer(&mut self, observer: Arc<dyn TargetObserver>) -> bool {
        if self.observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return false;
        }
        self.observers.push(observer);
        true
    }

    /// Remove an observer if present.
    pub fn remove_observer(&mut self, observer: &Arc<dyn TargetObserver>) {
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    pub fn targets(&self) -> &[DetectedTarget] {
        &self.targets
    }
}
