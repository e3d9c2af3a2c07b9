//! Actor infrastructure: shared trait, bus helpers, and actor resolution.

pub mod engine;
pub mod mock;
pub mod system;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::broadcast;

use crate::bus::{BusReceiver, BusSender};
use crate::state::SystemState;
use crate::state::config::{SwingSenseConfig, global_id};
use swingsense::EngineMessage;

// ---------------------------------------------------------------------------
// Actor trait
// ---------------------------------------------------------------------------

/// Common trait for self-managed actors. Each actor struct holds its own config;
/// `start()` clones what it needs and spawns a thread.
pub trait Actor: Send + Sync {
    /// Spawn the actor's run loop.
    fn start(&self, state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver);

    /// Request the actor to stop. Default: no-op (actors check the shutdown
    /// flag via `BusReceiver::is_shutdown()`).
    fn stop(&self) {}
}

/// Spawn a named actor thread, logging instead of panicking if the OS
/// refuses.
pub(crate) fn spawn_named(name: String, f: impl FnOnce() + Send + 'static) {
    if let Err(e) = std::thread::Builder::new().name(name.clone()).spawn(f) {
        tracing::error!("failed to spawn thread '{name}': {e}");
    }
}

// ---------------------------------------------------------------------------
// Actor resolution
// ---------------------------------------------------------------------------

/// A concrete actor ready to be started, resolved from config.
pub struct ResolvedActor {
    pub id: String,
    pub name: String,
    pub actor: Box<dyn Actor>,
}

/// Build a flat list of config-driven actors (mock sensors, mock round
/// managers). The system and engine actors are always-on and started by
/// the host.
pub fn resolve_actors(config: &SwingSenseConfig) -> Vec<ResolvedActor> {
    let mut actors = Vec::new();

    for (index, section) in &config.mock_sensor {
        let id = global_id("mock_sensor", index);
        actors.push(ResolvedActor {
            id,
            name: section.name.clone(),
            actor: Box::new(mock::sensor::MockSensorActor::from_section(section)),
        });
    }

    for (index, section) in &config.mock_round {
        let id = global_id("mock_round", index);
        actors.push(ResolvedActor {
            id,
            name: section.name.clone(),
            actor: Box::new(mock::round::MockRoundActor),
        });
    }

    actors.sort_by(|a, b| a.id.cmp(&b.id));
    actors
}

/// Start a resolved actor: create bus wrappers, call start(), register in state.
pub fn start_actor(
    id: String,
    actor: Box<dyn Actor>,
    state: &Arc<SystemState>,
    bus_tx: &broadcast::Sender<EngineMessage>,
) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let sender = BusSender::new(id.clone(), bus_tx.clone(), Arc::clone(&shutdown));
    let receiver = sender.subscribe();
    actor.start(Arc::clone(state), sender, receiver);
    state.register_actor(id, actor, shutdown);
}

/// Map of config-driven actor IDs to display names.
pub fn actor_names(config: &SwingSenseConfig) -> HashMap<String, String> {
    resolve_actors(config)
        .into_iter()
        .map(|ra| (ra.id, ra.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use swingsense::{MockRoundSection, MockSensorSection};

    #[test]
    fn test_resolve_actors_from_sections() {
        let mut config = SwingSenseConfig::default();
        assert!(resolve_actors(&config).is_empty());

        config.mock_sensor.insert(
            "0".into(),
            MockSensorSection {
                name: "Band".into(),
                interval_secs: Some(5),
                handheld: false,
            },
        );
        config.mock_round.insert(
            "0".into(),
            MockRoundSection {
                name: "Caddie".into(),
            },
        );
        let ids: Vec<_> = resolve_actors(&config).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["mock_round.0", "mock_sensor.0"]);

        let names = actor_names(&config);
        assert_eq!(names["mock_sensor.0"], "Band");
        assert_eq!(names["mock_round.0"], "Caddie");
    }
}
