//! Combatants: the shared mutable core, the trait-folding layer and the two
//! concrete kinds (party actors and troop enemies).

pub mod actor;
pub mod enemy;
pub mod result;
pub mod states;
pub mod traits;

pub use actor::{Actor, EquipItem, LevelUp};
pub use enemy::Enemy;
pub use result::ActionResult;
pub use states::BattlerStatus;
pub use traits::{BattlerTraits, TraitSource};

use crate::battle::action::Action;
use crate::database::Database;
use schema::{Param, ParamSet, SkillData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum::EnumCount;

/// Which roster a battler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Party,
    Troop,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Party => Side::Troop,
            Side::Troop => Side::Party,
        }
    }
}

/// Stable handle to a battler: its index within the party or the troop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattlerId {
    Actor(usize),
    Enemy(usize),
}

impl BattlerId {
    pub fn side(self) -> Side {
        match self {
            BattlerId::Actor(_) => Side::Party,
            BattlerId::Enemy(_) => Side::Troop,
        }
    }

    pub fn index(self) -> usize {
        match self {
            BattlerId::Actor(index) | BattlerId::Enemy(index) => index,
        }
    }

    pub fn is_actor(self) -> bool {
        matches!(self, BattlerId::Actor(_))
    }
}

impl fmt::Display for BattlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattlerId::Actor(index) => write!(f, "actor#{}", index),
            BattlerId::Enemy(index) => write!(f, "enemy#{}", index),
        }
    }
}

/// Mutable state every battler carries. Derived stats are never stored here;
/// they are folded from trait sources on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlerCore {
    pub(crate) id: BattlerId,
    pub(crate) hp: i32,
    pub(crate) mp: i32,
    pub(crate) tp: i32,
    /// Active state ids, highest priority first.
    pub(crate) states: Vec<u32>,
    pub(crate) state_turns: HashMap<u32, u32>,
    pub(crate) buffs: [i32; Param::COUNT],
    pub(crate) buff_turns: [u32; Param::COUNT],
    /// Permanent flat bonuses from growth effects.
    pub(crate) param_plus: ParamSet,
    pub(crate) hidden: bool,
    pub(crate) actions: Vec<Action>,
    pub(crate) speed: f64,
    pub(crate) result: ActionResult,
    pub(crate) last_target_index: Option<usize>,
}

impl BattlerCore {
    pub fn new(id: BattlerId) -> Self {
        Self {
            id,
            hp: 0,
            mp: 0,
            tp: 0,
            states: Vec::new(),
            state_turns: HashMap::new(),
            buffs: [0; Param::COUNT],
            buff_turns: [0; Param::COUNT],
            param_plus: ParamSet::default(),
            hidden: false,
            actions: Vec::new(),
            speed: 0.0,
            result: ActionResult::default(),
            last_target_index: None,
        }
    }
}

/// The capability set shared by actors and enemies.
///
/// Implementors provide identity and their own trait sources; everything
/// else (derived stats, state handling, lifecycle hooks) is supplied by the
/// [`BattlerTraits`] and [`BattlerStatus`] extension traits.
pub trait Battler: fmt::Debug {
    fn core(&self) -> &BattlerCore;
    fn core_mut(&mut self) -> &mut BattlerCore;

    fn name(&self) -> String;

    /// Trait sources other than active states.
    fn own_trait_sources<'a>(&'a self, db: &'a Database) -> Vec<TraitSource<'a>>;

    fn param_base(&self, db: &Database, param: Param) -> f64;

    fn param_plus(&self, _db: &Database, param: Param) -> f64 {
        self.core().param_plus.get(param)
    }

    fn param_max(&self, param: Param) -> f64 {
        match param {
            Param::Mhp => 999_999.0,
            Param::Mmp => 9_999.0,
            _ => 999.0,
        }
    }

    fn level(&self) -> u32 {
        1
    }

    /// Elements added to normal attacks on top of attack-element traits.
    fn extra_attack_elements(&self, _db: &Database) -> Vec<u32> {
        Vec::new()
    }

    /// Equipment requirements a skill places on its user.
    fn meets_skill_requirements(&self, _db: &Database, _skill: &SkillData) -> bool {
        true
    }

    fn as_actor(&self) -> Option<&Actor> {
        None
    }

    fn as_actor_mut(&mut self) -> Option<&mut Actor> {
        None
    }

    fn id(&self) -> BattlerId {
        self.core().id
    }

    fn is_actor(&self) -> bool {
        self.id().is_actor()
    }

    fn hp(&self) -> i32 {
        self.core().hp
    }

    fn mp(&self) -> i32 {
        self.core().mp
    }

    fn tp(&self) -> i32 {
        self.core().tp
    }

    fn result(&self) -> &ActionResult {
        &self.core().result
    }

    fn speed(&self) -> f64 {
        self.core().speed
    }

    fn actions(&self) -> &[Action] {
        &self.core().actions
    }

    fn current_action(&self) -> Option<&Action> {
        self.core().actions.first()
    }

    fn num_actions(&self) -> usize {
        self.core().actions.len()
    }

    fn last_target_index(&self) -> Option<usize> {
        self.core().last_target_index
    }

    fn is_hidden(&self) -> bool {
        self.core().hidden
    }

    fn is_appeared(&self) -> bool {
        !self.core().hidden
    }

    fn is_state_affected(&self, state_id: u32) -> bool {
        self.core().states.contains(&state_id)
    }

    fn state_ids(&self) -> &[u32] {
        &self.core().states
    }

    fn state_turns(&self, state_id: u32) -> Option<u32> {
        self.core().state_turns.get(&state_id).copied()
    }

    fn buff(&self, param: Param) -> i32 {
        self.core().buffs[param.index()]
    }

    fn buff_turns(&self, param: Param) -> u32 {
        self.core().buff_turns[param.index()]
    }

    fn is_buff_affected(&self, param: Param) -> bool {
        self.buff(param) > 0
    }

    fn is_debuff_affected(&self, param: Param) -> bool {
        self.buff(param) < 0
    }

    fn is_buff_or_debuff_affected(&self, param: Param) -> bool {
        self.buff(param) != 0
    }

    fn is_max_buff_affected(&self, param: Param) -> bool {
        self.buff(param) == 2
    }

    fn is_max_debuff_affected(&self, param: Param) -> bool {
        self.buff(param) == -2
    }

    fn is_death_state_affected(&self, db: &Database) -> bool {
        self.is_state_affected(db.death_state_id())
    }

    fn is_alive(&self, db: &Database) -> bool {
        self.is_appeared() && !self.is_death_state_affected(db)
    }

    fn is_dead(&self, db: &Database) -> bool {
        self.is_appeared() && self.is_death_state_affected(db)
    }

    // --- ACTION QUEUE ---

    fn clear_actions(&mut self) {
        self.core_mut().actions.clear();
    }

    fn set_actions(&mut self, actions: Vec<Action>) {
        self.core_mut().actions = actions;
    }

    fn push_action(&mut self, action: Action) {
        self.core_mut().actions.push(action);
    }

    fn action_mut(&mut self, index: usize) -> Option<&mut Action> {
        self.core_mut().actions.get_mut(index)
    }

    fn remove_current_action(&mut self) -> Option<Action> {
        let actions = &mut self.core_mut().actions;
        if actions.is_empty() {
            None
        } else {
            Some(actions.remove(0))
        }
    }

    fn set_speed(&mut self, speed: f64) {
        self.core_mut().speed = speed;
    }

    fn set_last_target(&mut self, target: BattlerId) {
        self.core_mut().last_target_index = Some(target.index());
    }

    fn clear_result(&mut self) {
        self.core_mut().result.clear();
    }

    fn result_mut(&mut self) -> &mut ActionResult {
        &mut self.core_mut().result
    }

    fn hide(&mut self) {
        self.core_mut().hidden = true;
    }

    fn appear(&mut self) {
        self.core_mut().hidden = false;
    }
}
