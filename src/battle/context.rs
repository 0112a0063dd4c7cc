use crate::battle::state::{EventBus, TurnRng};
use crate::battler::{Battler, BattlerId, Side};
use crate::database::Database;
use crate::party::Party;
use crate::troop::Troop;
use crate::unit::Unit;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Game variables readable from damage formulas as `v[n]`. Unset ids read 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variables {
    values: HashMap<u32, f64>,
}

impl Variables {
    pub fn get(&self, id: u32) -> f64 {
        self.values.get(&id).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, id: u32, value: f64) {
        self.values.insert(id, value);
    }
}

/// Everything an action or a phase step may read or mutate, passed
/// explicitly instead of living in globals.
#[derive(Debug)]
pub struct BattleContext {
    pub db: Arc<Database>,
    pub party: Party,
    pub troop: Troop,
    pub variables: Variables,
    pub switches: HashSet<u32>,
    pub rng: TurnRng,
    pub bus: EventBus,
    pub in_battle: bool,
}

/// Looks a battler up in the given rosters. A free function so callers can
/// hold it alongside a mutable borrow of another context field.
pub fn battler_in<'a>(party: &'a Party, troop: &'a Troop, id: BattlerId) -> Option<&'a dyn Battler> {
    match id {
        BattlerId::Actor(index) => party.member(index),
        BattlerId::Enemy(index) => troop.member(index),
    }
}

/// The unit of one side, borrowed from the rosters alone.
pub fn unit_in<'a>(party: &'a Party, troop: &'a Troop, side: Side) -> &'a dyn Unit {
    match side {
        Side::Party => party,
        Side::Troop => troop,
    }
}

impl BattleContext {
    pub fn new(db: Arc<Database>, party: Party, rng: TurnRng) -> Self {
        Self {
            db,
            party,
            troop: Troop::new(),
            variables: Variables::default(),
            switches: HashSet::new(),
            rng,
            bus: EventBus::new(),
            in_battle: false,
        }
    }

    pub fn battler(&self, id: BattlerId) -> Option<&dyn Battler> {
        battler_in(&self.party, &self.troop, id)
    }

    pub fn battler_mut(&mut self, id: BattlerId) -> Option<&mut dyn Battler> {
        match id {
            BattlerId::Actor(index) => self.party.member_mut(index),
            BattlerId::Enemy(index) => self.troop.member_mut(index),
        }
    }

    /// A battler together with the database and the random source, for
    /// mutations that need all three.
    pub fn split(&mut self, id: BattlerId) -> Option<(&mut dyn Battler, &Database, &mut TurnRng)> {
        let battler = match id {
            BattlerId::Actor(index) => self.party.member_mut(index)?,
            BattlerId::Enemy(index) => self.troop.member_mut(index)?,
        };
        Some((battler, &*self.db, &mut self.rng))
    }

    pub fn battler_name(&self, id: BattlerId) -> String {
        self.battler(id)
            .map(|battler| battler.name())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn unit(&self, side: Side) -> &dyn Unit {
        unit_in(&self.party, &self.troop, side)
    }

    pub fn friends_unit(&self, id: BattlerId) -> &dyn Unit {
        self.unit(id.side())
    }

    pub fn opponents_unit(&self, id: BattlerId) -> &dyn Unit {
        self.unit(id.side().opponent())
    }

    /// Party battle members followed by the troop.
    pub fn all_battle_members(&self) -> Vec<BattlerId> {
        let mut ids = self.party.member_ids();
        ids.extend(self.troop.member_ids());
        ids
    }

    pub fn is_switch_on(&self, id: u32) -> bool {
        self.switches.contains(&id)
    }
}
