//! System actor: default actor that always runs and keeps `RoundState`
//! in sync.
//!
//! Subscribes to the bus and processes `RoundCommand` events. After each
//! applied command it publishes the resulting `RoundSnapshot` so consumers
//! never have to poll shared state.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::actors::{Actor, spawn_named};
use crate::bus::{BusReceiver, BusSender, PollError};
use crate::state::{RoundStateWriter, SystemState};
use swingsense::{EngineEvent, EngineMessage, RoundCommandEvent};

/// System actor. Always-on internal housekeeping, not config-driven.
///
/// Holds the sole `RoundStateWriter`, enforcing that all round mutations
/// flow through bus events processed here.
pub struct SystemActor {
    writer: Mutex<Option<RoundStateWriter>>,
    ready_tx: Mutex<Option<std_mpsc::SyncSender<()>>>,
}

impl SystemActor {
    pub fn new(writer: RoundStateWriter) -> (Self, std_mpsc::Receiver<()>) {
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(0);
        let actor = Self {
            writer: Mutex::new(Some(writer)),
            ready_tx: Mutex::new(Some(ready_tx)),
        };
        (actor, ready_rx)
    }
}

impl Actor for SystemActor {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        let writer = self.writer.lock().ok().and_then(|mut w| w.take());
        let ready_tx = self.ready_tx.lock().ok().and_then(|mut r| r.take());
        let (Some(writer), Some(ready_tx)) = (writer, ready_tx) else {
            tracing::warn!("system: start() called more than once, ignoring");
            return;
        };
        spawn_named("system".into(), move || {
            run(writer, state, sender, receiver, ready_tx)
        });
    }
}

/// Apply one round command to the writer.
pub(crate) fn apply_command(writer: &RoundStateWriter, cmd: &RoundCommandEvent) {
    match cmd {
        RoundCommandEvent::SetRoundActive { active } => {
            tracing::info!("round: {}", if *active { "started" } else { "ended" });
            writer.set_round_active(*active);
        }
        RoundCommandEvent::SetClub { club } => {
            tracing::debug!("round: club {club}");
            writer.set_club(*club);
        }
        RoundCommandEvent::SetHandedness { handedness } => {
            tracing::debug!("round: handedness {handedness}");
            writer.set_handedness(*handedness);
        }
    }
}

fn run(
    writer: RoundStateWriter,
    state: Arc<SystemState>,
    sender: BusSender,
    mut receiver: BusReceiver,
    ready_tx: std_mpsc::SyncSender<()>,
) {
    // Signal main thread that we're up and polling.
    let _ = ready_tx.send(());
    drop(ready_tx);

    loop {
        match receiver.poll() {
            Err(PollError::Shutdown) => return,
            Ok(None) => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(Some(msg)) => {
                if let EngineEvent::RoundCommand(cmd) = &msg.event {
                    apply_command(&writer, &cmd.event);
                    sender.send(EngineMessage::new(state.round.snapshot()));
                }
            }
        }
    }
}
