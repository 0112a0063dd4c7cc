//! RPG Battle Engine
//!
//! A deterministic, turn-based battle core: a party of actors against a troop
//! of enemies, driven one `update` tick at a time by a phase controller.
//! Presentation is left to the host, which reads the emitted [`BattleEvent`]s.

// --- MODULE DECLARATIONS ---
pub mod battle;
pub mod battler;
pub mod database;
pub mod errors;
pub mod party;
pub mod troop;
pub mod unit;

// --- PUBLIC API RE-EXPORTS ---

// --- From the `schema` crate ---
pub use schema::{
    ActorData, ClassData, Damage, DamageType, Effect, EffectCode, EnemyData, Formula, HitType,
    ItemData, Param, Restriction, Scope, SkillData, StateData, SystemData, Trait, TraitCode,
    TroopData, Usage, XParam, SParam,
};

// --- From this crate's modules (`src/`) ---

// Battle control.
pub use battle::action::{Action, ForcedTarget};
pub use battle::ai::{Behavior, PatternAI, ScoringAI};
pub use battle::context::BattleContext;
pub use battle::engine::{BattleHost, BattleManager, NullHost};
pub use battle::phase::Phase;
pub use battle::rewards::{BattleOutcome, Rewards};
pub use battle::state::{BattleEvent, EventBus, TurnRng};

// Runtime battlers and their units.
pub use battler::{Actor, Battler, BattlerId, BattlerStatus, BattlerTraits, Enemy, Side};
pub use party::Party;
pub use troop::Troop;
pub use unit::Unit;

// Data access.
pub use database::Database;

// Crate-specific error and result types.
pub use errors::{
    ActionError, BattleEngineError, BattleResult, BattleStateError, DataError, DataResult,
};
