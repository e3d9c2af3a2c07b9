pub mod config;
mod round;

pub use round::{RoundState, RoundStateWriter};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::actors::Actor;
use crate::store::{JsonFileStore, KeyValueStore};
use config::SystemConfig;

/// Root of the host's shared state: cached config, round context, the
/// per-user record store, and the running actors.
///
/// Passed as `Arc<SystemState>` to all actors.
pub struct SystemState {
    pub system: SystemConfig,
    pub round: RoundState,
    store: Arc<dyn KeyValueStore>,
    actors: RwLock<HashMap<String, (Box<dyn Actor>, Arc<AtomicBool>)>>,
}

impl SystemState {
    /// Load config from `config_path` and open the JSON store it points at.
    pub fn new(config_path: PathBuf) -> (Self, RoundStateWriter) {
        let system = SystemConfig::new(config_path);
        let data_dir = system.snapshot().storage.data_dir;
        let store = Arc::new(JsonFileStore::from_config(data_dir.as_deref()));
        tracing::debug!("store: {}", store.dir().display());
        Self::with_store(system, store)
    }

    /// Build around an existing config cache and store.
    pub fn with_store(
        system: SystemConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> (Self, RoundStateWriter) {
        let (round, writer) = RoundState::new();
        (
            Self {
                system,
                round,
                store,
                actors: RwLock::new(HashMap::new()),
            },
            writer,
        )
    }

    /// Calibration and learning records, shared by every engine.
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    // ----- Actor registry -----

    pub fn register_actor(&self, id: String, actor: Box<dyn Actor>, shutdown: Arc<AtomicBool>) {
        self.actors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (actor, shutdown));
    }

    /// Registered actor IDs, sorted.
    pub fn actor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .actors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Stop an actor by setting its shutdown flag and calling `stop()`.
    /// Returns false for an unknown ID.
    pub fn stop_actor(&self, id: &str) -> bool {
        let guard = self.actors.read().unwrap_or_else(|e| e.into_inner());
        let Some((actor, shutdown)) = guard.get(id) else {
            return false;
        };
        shutdown.store(true, Ordering::Relaxed);
        actor.stop();
        true
    }

    /// Stop every registered actor. The engine goes last so it can still
    /// consume what the producers sent before they stopped.
    pub fn stop_all(&self) {
        let (engine, others): (Vec<String>, Vec<String>) =
            self.actor_ids().into_iter().partition(|id| id == "engine");
        for id in others.iter().chain(&engine) {
            tracing::debug!("stopping actor '{id}'");
            self.stop_actor(id);
        }
    }
}
