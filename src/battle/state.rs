use crate::battle::phase::Phase;
use crate::battle::rewards::{BattleOutcome, Rewards};
use crate::battler::BattlerId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schema::Param;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Fire-and-forget audio requests for the host.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCue {
    BattleBgm,
    VictoryMe,
    DefeatMe,
    Escape,
    /// Resume the music that was playing before the battle.
    ReplayBgm,
    StopBgm,
}

/// Scene changes the host should perform once the battle winds down.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneRequest {
    PopBattle,
    GameOver,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum BattleEvent {
    // Battle Flow
    BattleStarted {
        troop_id: u32,
    },
    EnemyEmerged {
        name: String,
    },
    Preemptive,
    Surprise,
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    TurnStarted {
        turn_number: u32,
    },
    TurnEnded {
        turn_number: u32,
    },

    // Actions
    ActionStarted {
        subject: BattlerId,
        subject_name: String,
        item_name: String,
    },
    ActionMissed {
        target: BattlerId,
        target_name: String,
    },
    ActionEvaded {
        target: BattlerId,
        target_name: String,
    },
    CriticalHit {
        target: BattlerId,
        target_name: String,
    },
    ActionFailed {
        target: BattlerId,
        target_name: String,
    },
    Counterattack {
        battler: BattlerId,
        battler_name: String,
    },
    MagicReflection {
        battler: BattlerId,
        battler_name: String,
    },
    Substitute {
        substitute: BattlerId,
        substitute_name: String,
        target_name: String,
    },

    // Battler Changes
    /// Positive `damage` is a loss, negative a gain.
    HpChanged {
        target: BattlerId,
        target_name: String,
        damage: i32,
        drain: bool,
        hp: i32,
    },
    MpChanged {
        target: BattlerId,
        target_name: String,
        damage: i32,
        drain: bool,
        mp: i32,
    },
    TpChanged {
        target: BattlerId,
        target_name: String,
        damage: i32,
        tp: i32,
    },
    StateAdded {
        target: BattlerId,
        target_name: String,
        state_id: u32,
        message: String,
    },
    StateRemoved {
        target: BattlerId,
        target_name: String,
        state_id: u32,
        message: String,
    },
    BuffAdded {
        target: BattlerId,
        target_name: String,
        param: Param,
    },
    DebuffAdded {
        target: BattlerId,
        target_name: String,
        param: Param,
    },
    BuffRemoved {
        target: BattlerId,
        target_name: String,
        param: Param,
    },
    CommonEventReserved {
        event_id: u32,
    },

    // Outcome
    EscapeAttempted {
        success: bool,
        ratio: f64,
    },
    Victory {
        rewards: Rewards,
    },
    LevelUp {
        actor: BattlerId,
        actor_name: String,
        level: u32,
        learned_skills: Vec<String>,
    },
    Defeat,
    BattleEnded {
        outcome: BattleOutcome,
    },

    // Host Requests
    Audio(AudioCue),
    Scene(SceneRequest),
}

impl BattleEvent {
    /// Formats the event into a human-readable log line.
    /// Returns None for silent events that should not produce user-visible text.
    pub fn format(&self) -> Option<String> {
        match self {
            // === Battle Flow ===
            BattleEvent::BattleStarted { .. } => None,
            BattleEvent::EnemyEmerged { name } => Some(format!("{} emerged!", name)),
            BattleEvent::Preemptive => Some("The party gained the initiative!".to_string()),
            BattleEvent::Surprise => Some("The party was surprised!".to_string()),
            BattleEvent::PhaseChanged { .. } => None,
            BattleEvent::TurnStarted { turn_number } => {
                Some(format!("=== Turn {} ===", turn_number))
            }
            BattleEvent::TurnEnded { .. } => None,

            // === Actions ===
            BattleEvent::ActionStarted {
                subject_name,
                item_name,
                ..
            } => Some(format!("{} uses {}!", subject_name, item_name)),
            BattleEvent::ActionMissed { target_name, .. } => {
                Some(format!("Miss! {} was not affected.", target_name))
            }
            BattleEvent::ActionEvaded { target_name, .. } => {
                Some(format!("{} evaded the attack!", target_name))
            }
            BattleEvent::CriticalHit { .. } => Some("A critical hit!".to_string()),
            BattleEvent::ActionFailed { target_name, .. } => {
                Some(format!("There was no effect on {}!", target_name))
            }
            BattleEvent::Counterattack { battler_name, .. } => {
                Some(format!("{} counterattacked!", battler_name))
            }
            BattleEvent::MagicReflection { battler_name, .. } => {
                Some(format!("{} reflected the magic!", battler_name))
            }
            BattleEvent::Substitute {
                substitute_name,
                target_name,
                ..
            } => Some(format!("{} protected {}!", substitute_name, target_name)),

            // === Battler Changes ===
            BattleEvent::HpChanged {
                target_name,
                damage,
                drain,
                ..
            } => Some(match (*damage, *drain) {
                (d, true) if d > 0 => format!("{} was drained of {} HP!", target_name, d),
                (d, false) if d > 0 => format!("{} took {} damage!", target_name, d),
                (d, _) if d < 0 => format!("{} recovered {} HP!", target_name, -d),
                _ => format!("{} took no damage!", target_name),
            }),
            BattleEvent::MpChanged {
                target_name,
                damage,
                drain,
                ..
            } => match (*damage, *drain) {
                (0, _) => None,
                (d, true) if d > 0 => Some(format!("{} was drained of {} MP!", target_name, d)),
                (d, false) if d > 0 => Some(format!("{} lost {} MP!", target_name, d)),
                (d, _) => Some(format!("{} recovered {} MP!", target_name, -d)),
            },
            BattleEvent::TpChanged {
                target_name,
                damage,
                ..
            } => match *damage {
                0 => None,
                d if d > 0 => Some(format!("{} lost {} TP!", target_name, d)),
                d => Some(format!("{} gained {} TP!", target_name, -d)),
            },
            BattleEvent::StateAdded {
                target_name,
                message,
                ..
            }
            | BattleEvent::StateRemoved {
                target_name,
                message,
                ..
            } => {
                if message.is_empty() {
                    None
                } else {
                    Some(format!("{}{}", target_name, message))
                }
            }
            BattleEvent::BuffAdded {
                target_name, param, ..
            } => Some(format!("{}'s {} went up!", target_name, param)),
            BattleEvent::DebuffAdded {
                target_name, param, ..
            } => Some(format!("{}'s {} went down!", target_name, param)),
            BattleEvent::BuffRemoved {
                target_name, param, ..
            } => Some(format!("{}'s {} returned to normal!", target_name, param)),
            BattleEvent::CommonEventReserved { .. } => None,

            // === Outcome ===
            BattleEvent::EscapeAttempted { success, .. } => Some(if *success {
                "The party escaped!".to_string()
            } else {
                "However, it was unable to escape!".to_string()
            }),
            BattleEvent::Victory { rewards } => Some(format!(
                "Victory! Gained {} EXP and {} gold.",
                rewards.exp, rewards.gold
            )),
            BattleEvent::LevelUp {
                actor_name,
                level,
                learned_skills,
                ..
            } => {
                let mut text = format!("{} is now level {}!", actor_name, level);
                for skill in learned_skills {
                    text.push_str(&format!(" {} learned {}!", actor_name, skill));
                }
                Some(text)
            }
            BattleEvent::Defeat => Some("The party was defeated...".to_string()),
            BattleEvent::BattleEnded { .. } => None,

            // === Host Requests ===
            BattleEvent::Audio(_) | BattleEvent::Scene(_) => None,
        }
    }
}

/// A simple event bus for collecting battle events during execution.
///
/// The engine only ever pushes to the bus; the host drains it to drive its
/// presentation layer.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    events: Vec<BattleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: BattleEvent) {
        trace!(?event, "battle event");
        self.events.push(event);
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    /// Hand over everything collected so far and start empty.
    pub fn drain(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.events)
    }
}

#[derive(Debug, Clone)]
enum RngSource {
    Scripted { outcomes: Vec<f64>, index: usize },
    Seeded(StdRng),
}

/// The single random source of a battle. Every draw is a uniform value in
/// `[0, 1)` tagged with the reason it was taken.
#[derive(Debug, Clone)]
pub struct TurnRng {
    source: RngSource,
    draws: usize,
}

impl TurnRng {
    /// Replays `outcomes` in order. Each value must lie in `[0, 1)`.
    pub fn new_for_test(outcomes: Vec<f64>) -> Self {
        Self {
            source: RngSource::Scripted { outcomes, index: 0 },
            draws: 0,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            source: RngSource::Seeded(StdRng::seed_from_u64(seed)),
            draws: 0,
        }
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn next_f64(&mut self, reason: &str) -> f64 {
        let outcome = match &mut self.source {
            RngSource::Scripted { outcomes, index } => {
                if *index >= outcomes.len() {
                    panic!(
                        "TurnRng exhausted! Tried to get a value for: '{}'. Need more random values.",
                        reason
                    );
                }
                let outcome = outcomes[*index];
                *index += 1;
                outcome
            }
            RngSource::Seeded(rng) => rng.random::<f64>(),
        };
        self.draws += 1;

        #[cfg(test)]
        println!("[RNG] Consumed {} for: {}", outcome, reason);
        trace!(outcome, reason, "rng draw");

        outcome
    }

    /// Uniform integer in `0..max`. Ranges with a single value do not draw.
    pub fn random_int(&mut self, max: u32, reason: &str) -> u32 {
        if max <= 1 {
            return 0;
        }
        let value = (self.next_f64(reason) * max as f64).floor() as u32;
        value.min(max - 1)
    }

    /// True with probability `p`. Certain outcomes (`p <= 0`, `p >= 1`) do not draw.
    pub fn chance(&mut self, p: f64, reason: &str) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.next_f64(reason) < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scripted_rng_replays_values() {
        let mut rng = TurnRng::new_for_test(vec![0.25, 0.75]);
        assert_eq!(rng.random_int(4, "first"), 1);
        assert!(!rng.chance(0.5, "second"));
        assert_eq!(rng.draws(), 2);
    }

    #[test]
    fn certain_outcomes_do_not_draw() {
        let mut rng = TurnRng::new_for_test(vec![]);
        assert!(rng.chance(1.0, "certain"));
        assert!(!rng.chance(0.0, "impossible"));
        assert_eq!(rng.random_int(1, "single value"), 0);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    #[should_panic(expected = "TurnRng exhausted")]
    fn scripted_rng_panics_when_exhausted() {
        let mut rng = TurnRng::new_for_test(vec![]);
        rng.next_f64("one too many");
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut a = TurnRng::seeded(42);
        let mut b = TurnRng::seeded(42);
        let first: Vec<u32> = (0..8).map(|_| a.random_int(100, "a")).collect();
        let second: Vec<u32> = (0..8).map(|_| b.random_int(100, "b")).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn hp_events_format_by_direction() {
        let event = |damage, drain| BattleEvent::HpChanged {
            target: BattlerId::Enemy(0),
            target_name: "Slime".to_string(),
            damage,
            drain,
            hp: 10,
        };
        assert_eq!(event(12, false).format().as_deref(), Some("Slime took 12 damage!"));
        assert_eq!(event(-5, false).format().as_deref(), Some("Slime recovered 5 HP!"));
        assert_eq!(event(7, true).format().as_deref(), Some("Slime was drained of 7 HP!"));
    }

    #[test]
    fn bookkeeping_events_are_silent() {
        let phase = BattleEvent::PhaseChanged {
            from: Phase::Input,
            to: Phase::Turn,
        };
        assert_eq!(phase.format(), None);
        assert_eq!(BattleEvent::Audio(AudioCue::VictoryMe).format(), None);
    }
}
