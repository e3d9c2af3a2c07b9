//! Mock round manager: starts a round, then picks a random club after each
//! analyzed swing and answers every swing with feedback.
//!
//! Feedback marks a swing correct when validation accepted it, which drives
//! adaptive learning the same way a user confirming swings would.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{next_rand, now_seed};
use crate::actors::{Actor, spawn_named};
use crate::bus::{BusReceiver, BusSender, PollError};
use crate::state::SystemState;
use swingsense::{
    ActorState, ActorStatus, Club, EngineEvent, EngineMessage, Handedness, RoundCommandEvent,
    SwingAnalysis, SwingFeedback,
};

/// Mock round manager actor.
pub struct MockRoundActor;

impl Actor for MockRoundActor {
    fn start(&self, _state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        spawn_named(format!("mock:{}", sender.actor_id()), move || run(sender, receiver));
    }
}

fn emit_status(sender: &BusSender, club: Club, swings: u64) {
    let telemetry = HashMap::from([
        ("club".to_string(), club.to_string()),
        ("swings".to_string(), swings.to_string()),
    ]);
    sender.send(EngineMessage::new(ActorState::new(
        ActorStatus::Running,
        telemetry,
    )));
}

/// Feedback for an analyzed swing, when it belongs to a known user.
pub(crate) fn feedback_for(analysis: &SwingAnalysis) -> Option<SwingFeedback> {
    Some(SwingFeedback {
        user_id: analysis.user_id.clone()?,
        swing_id: analysis.swing.id,
        correct: analysis.validation.is_valid,
    })
}

fn run(sender: BusSender, mut receiver: BusReceiver) {
    let name = sender.actor_id().to_string();
    tracing::info!("mock_round '{name}': started");

    let mut seed = now_seed();
    let mut club = Club::ALL[next_rand(&mut seed) % Club::ALL.len()];
    let mut swings = 0u64;

    sender.send(EngineMessage::new(RoundCommandEvent::SetRoundActive {
        active: true,
    }));
    sender.send(EngineMessage::new(RoundCommandEvent::SetHandedness {
        handedness: Handedness::Right,
    }));
    sender.send(EngineMessage::new(RoundCommandEvent::SetClub { club }));
    emit_status(&sender, club, swings);

    loop {
        match receiver.poll() {
            Err(PollError::Shutdown) => {
                tracing::info!("mock_round '{name}': shutting down");
                return;
            }
            Ok(None) => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Ok(Some(msg)) => {
                let EngineEvent::SwingAnalyzed(analysis) = &msg.event else {
                    continue;
                };
                swings += 1;
                let best = analysis
                    .best_match()
                    .map(|m| format!("{} {:.0}", m.template_id, m.overall_match))
                    .unwrap_or_else(|| "no match".into());
                tracing::info!(
                    "mock_round '{name}': swing #{swings} with {club}: {best}, valid={}",
                    analysis.validation.is_valid
                );
                if let Some(feedback) = feedback_for(analysis) {
                    sender.send(EngineMessage::new(feedback));
                }

                club = Club::ALL[next_rand(&mut seed) % Club::ALL.len()];
                sender.send(EngineMessage::new(RoundCommandEvent::SetClub { club }));
                emit_status(&sender, club, swings);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SwingEngine;
    use crate::store::MemoryStore;
    use crate::testutil::synthetic_swing;
    use swingsense::{SwingSenseConfig, ValidationContext};

    fn analyze(engine: &mut SwingEngine) -> SwingAnalysis {
        let swing = synthetic_swing(0)
            .into_iter()
            .find_map(|s| engine.ingest(s).ok().flatten())
            .unwrap();
        engine.analyze(swing, &ValidationContext::default(), None)
    }

    #[test]
    fn test_feedback_follows_validation() {
        let mut engine = SwingEngine::new(SwingSenseConfig::default(), Arc::new(MemoryStore::new()))
            .with_user("bob");
        let analysis = analyze(&mut engine);
        let feedback = feedback_for(&analysis).unwrap();
        assert_eq!(feedback.user_id, "bob");
        assert_eq!(feedback.swing_id, analysis.swing.id);
        assert_eq!(feedback.correct, analysis.validation.is_valid);
    }

    #[test]
    fn test_no_feedback_without_user() {
        let mut engine =
            SwingEngine::new(SwingSenseConfig::default(), Arc::new(MemoryStore::new()));
        assert!(feedback_for(&analyze(&mut engine)).is_none());
    }
}
