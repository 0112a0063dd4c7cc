use crate::battler::{Actor, Battler, BattlerId, BattlerStatus, BattlerTraits, Side};
use crate::database::Database;
use crate::errors::DataResult;
use crate::unit::Unit;
use schema::{ItemKind, PartyAbility};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_MAX_ITEM_COUNT: u32 = 99;

/// Items, weapons and armors held by the party, keyed by data id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    items: BTreeMap<u32, u32>,
    weapons: BTreeMap<u32, u32>,
    armors: BTreeMap<u32, u32>,
    max_count: u32,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_ITEM_COUNT)
    }
}

impl Inventory {
    pub fn with_limit(max_count: u32) -> Self {
        Self {
            items: BTreeMap::new(),
            weapons: BTreeMap::new(),
            armors: BTreeMap::new(),
            max_count,
        }
    }

    fn container(&self, kind: ItemKind) -> &BTreeMap<u32, u32> {
        match kind {
            ItemKind::Item => &self.items,
            ItemKind::Weapon => &self.weapons,
            ItemKind::Armor => &self.armors,
        }
    }

    fn container_mut(&mut self, kind: ItemKind) -> &mut BTreeMap<u32, u32> {
        match kind {
            ItemKind::Item => &mut self.items,
            ItemKind::Weapon => &mut self.weapons,
            ItemKind::Armor => &mut self.armors,
        }
    }

    pub fn count(&self, kind: ItemKind, id: u32) -> u32 {
        self.container(kind).get(&id).copied().unwrap_or(0)
    }

    pub fn has(&self, kind: ItemKind, id: u32) -> bool {
        self.count(kind, id) > 0
    }

    pub fn gain(&mut self, kind: ItemKind, id: u32, amount: u32) {
        let max = self.max_count;
        let count = self.container_mut(kind).entry(id).or_insert(0);
        *count = count.saturating_add(amount).min(max);
    }

    pub fn lose(&mut self, kind: ItemKind, id: u32, amount: u32) {
        let container = self.container_mut(kind);
        if let Some(count) = container.get_mut(&id) {
            *count = count.saturating_sub(amount);
            if *count == 0 {
                container.remove(&id);
            }
        }
    }

    /// Uses up one of a consumable item. Non-consumables are kept.
    pub fn consume_item(&mut self, db: &Database, item_id: u32) {
        if db.item(item_id).is_some_and(|item| item.consumable) {
            self.lose(ItemKind::Item, item_id, 1);
        }
    }

    pub fn entries(&self, kind: ItemKind) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.container(kind).iter().map(|(id, count)| (*id, *count))
    }
}

/// The player's roster, gold and inventory. The first `max_battle_members`
/// actors fight; the rest are reserve members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    actors: Vec<Actor>,
    gold: u32,
    max_gold: u32,
    max_battle_members: usize,
    inventory: Inventory,
}

impl Party {
    pub fn new(db: &Database) -> Self {
        Self {
            actors: Vec::new(),
            gold: 0,
            max_gold: db.system.max_gold,
            max_battle_members: db.system.max_battle_members,
            inventory: Inventory::with_limit(db.system.max_item_count),
        }
    }

    /// Adds the actor unless it is already in the party.
    pub fn add_actor(&mut self, db: &Database, actor_id: u32) -> DataResult<BattlerId> {
        if let Some(existing) = self.actors.iter().find(|a| a.actor_id() == actor_id) {
            return Ok(existing.id());
        }
        let actor = Actor::new(db, actor_id, self.actors.len())?;
        let id = actor.id();
        self.actors.push(actor);
        Ok(id)
    }

    pub fn push_actor(&mut self, mut actor: Actor) -> BattlerId {
        actor.set_index(self.actors.len());
        let id = actor.id();
        self.actors.push(actor);
        id
    }

    pub fn remove_actor(&mut self, actor_id: u32) {
        self.actors.retain(|a| a.actor_id() != actor_id);
        for (index, actor) in self.actors.iter_mut().enumerate() {
            actor.set_index(index);
        }
    }

    pub fn all_actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn size(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn actor(&self, index: usize) -> Option<&Actor> {
        self.actors.get(index)
    }

    pub fn actor_mut(&mut self, index: usize) -> Option<&mut Actor> {
        self.actors.get_mut(index)
    }

    pub fn battle_member_count(&self) -> usize {
        self.actors.len().min(self.max_battle_members)
    }

    pub fn battle_members(&self) -> &[Actor] {
        &self.actors[..self.battle_member_count()]
    }

    pub fn is_battle_member(&self, index: usize) -> bool {
        index < self.battle_member_count()
    }

    pub fn highest_level(&self) -> u32 {
        self.actors.iter().map(|a| a.level()).max().unwrap_or(0)
    }

    // --- GOLD AND ITEMS ---

    pub fn gold(&self) -> u32 {
        self.gold
    }

    pub fn gain_gold(&mut self, amount: u32) {
        self.gold = self.gold.saturating_add(amount).min(self.max_gold);
    }

    pub fn lose_gold(&mut self, amount: u32) {
        self.gold = self.gold.saturating_sub(amount);
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    /// Actor and inventory borrowed together, for equipment changes.
    pub fn actor_with_inventory(&mut self, index: usize) -> Option<(&mut Actor, &mut Inventory)> {
        let actor = self.actors.get_mut(index)?;
        Some((actor, &mut self.inventory))
    }

    // --- PARTY ABILITIES ---

    pub fn party_ability(&self, db: &Database, ability: PartyAbility) -> bool {
        self.battle_members()
            .iter()
            .any(|actor| actor.party_ability(db, ability))
    }

    pub fn has_gold_double(&self, db: &Database) -> bool {
        self.party_ability(db, PartyAbility::GoldDouble)
    }

    pub fn has_drop_item_double(&self, db: &Database) -> bool {
        self.party_ability(db, PartyAbility::DropItemDouble)
    }

    pub fn has_encounter_half(&self, db: &Database) -> bool {
        self.party_ability(db, PartyAbility::EncounterHalf)
    }

    pub fn has_encounter_none(&self, db: &Database) -> bool {
        self.party_ability(db, PartyAbility::EncounterNone)
    }

    pub fn rate_preemptive(&self, db: &Database, troop_agi: f64) -> f64 {
        let mut rate = if self.agility(db) >= troop_agi {
            0.05
        } else {
            0.03
        };
        if self.party_ability(db, PartyAbility::RaisePreemptive) {
            rate *= 4.0;
        }
        rate
    }

    pub fn rate_surprise(&self, db: &Database, troop_agi: f64) -> f64 {
        if self.party_ability(db, PartyAbility::CancelSurprise) {
            return 0.0;
        }
        if self.agility(db) >= troop_agi {
            0.03
        } else {
            0.05
        }
    }

    pub fn can_input(&self, db: &Database) -> bool {
        self.battle_members().iter().any(|actor| actor.can_input(db))
    }

    /// Brings fallen battle members back to 1 HP.
    pub fn revive_battle_members(&mut self, db: &Database) {
        let count = self.battle_member_count();
        for actor in &mut self.actors[..count] {
            if actor.is_dead(db) {
                actor.set_hp(db, 1);
            }
        }
    }
}

impl Unit for Party {
    fn side(&self) -> Side {
        Side::Party
    }

    fn members(&self) -> Vec<&dyn Battler> {
        self.battle_members()
            .iter()
            .map(|actor| actor as &dyn Battler)
            .collect()
    }

    fn member(&self, index: usize) -> Option<&dyn Battler> {
        if self.is_battle_member(index) {
            self.actors.get(index).map(|actor| actor as &dyn Battler)
        } else {
            None
        }
    }

    fn member_mut(&mut self, index: usize) -> Option<&mut dyn Battler> {
        if self.is_battle_member(index) {
            self.actors.get_mut(index).map(|actor| actor as &mut dyn Battler)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::test_database;
    use pretty_assertions::assert_eq;

    #[test]
    fn inventory_gain_clamps_and_lose_removes() {
        let mut inventory = Inventory::with_limit(5);
        inventory.gain(ItemKind::Item, 1, 3);
        inventory.gain(ItemKind::Item, 1, 4);
        assert_eq!(inventory.count(ItemKind::Item, 1), 5);

        inventory.lose(ItemKind::Item, 1, 9);
        assert!(!inventory.has(ItemKind::Item, 1));
        assert_eq!(inventory.entries(ItemKind::Item).count(), 0);
    }

    #[test]
    fn reserve_members_are_not_battle_members() {
        let mut db = test_database();
        db.system.max_battle_members = 1;
        let mut party = Party::new(&db);
        party.add_actor(&db, 1).expect("actor 1");
        party.add_actor(&db, 2).expect("actor 2");

        assert_eq!(party.size(), 2);
        assert_eq!(party.members().len(), 1);
        assert!(party.member(1).is_none());
        assert!(party.actor(1).is_some());
    }

    #[test]
    fn adding_an_actor_twice_keeps_one_copy() {
        let db = test_database();
        let mut party = Party::new(&db);
        let first = party.add_actor(&db, 1).expect("actor 1");
        let second = party.add_actor(&db, 1).expect("actor 1 again");

        assert_eq!(first, second);
        assert_eq!(party.size(), 1);
    }

    #[test]
    fn revive_brings_dead_members_to_one_hp() {
        let db = test_database();
        let mut party = Party::new(&db);
        party.add_actor(&db, 1).expect("actor 1");
        let actor = party.actor_mut(0).expect("actor");
        actor.set_hp(&db, 0);
        assert!(party.is_all_dead(&db));

        party.revive_battle_members(&db);

        assert_eq!(party.actor(0).map(|a| a.hp()), Some(1));
        assert!(!party.is_all_dead(&db));
    }

    #[test]
    fn gold_is_capped() {
        let mut db = test_database();
        db.system.max_gold = 1_000;
        let mut party = Party::new(&db);
        party.gain_gold(600);
        party.gain_gold(600);
        assert_eq!(party.gold(), 1_000);
        party.lose_gold(2_000);
        assert_eq!(party.gold(), 0);
    }
}
