use crate::battle::state::TurnRng;
use crate::battler::{Battler, BattlerId, Enemy, Side};
use crate::database::Database;
use crate::errors::DataResult;
use crate::unit::Unit;
use schema::ItemKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

const LETTERS: &[&str] = &[
    " A", " B", " C", " D", " E", " F", " G", " H", " I", " J", " K", " L", " M", " N", " O",
    " P", " Q", " R", " S", " T", " U", " V", " W", " X", " Y", " Z",
];

/// The enemy side of a battle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Troop {
    troop_id: u32,
    enemies: Vec<Enemy>,
    turn_count: u32,
    names_count: HashMap<String, usize>,
}

impl Troop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates every member of the troop record. Members whose enemy
    /// record is missing are skipped with a warning.
    pub fn setup(&mut self, db: &Database, troop_id: u32) -> DataResult<()> {
        let data = db.troop(troop_id)?;
        self.clear();
        self.troop_id = troop_id;
        for member in &data.members {
            match Enemy::new(db, member.enemy_id, self.enemies.len()) {
                Ok(mut enemy) => {
                    if member.hidden {
                        enemy.hide();
                    }
                    self.enemies.push(enemy);
                }
                Err(err) => warn!(troop_id, %err, "skipping troop member"),
            }
        }
        self.make_unique_names(db);
        Ok(())
    }

    /// Appends an already built enemy, renumbering it to its slot.
    pub fn push_enemy(&mut self, mut enemy: Enemy) -> BattlerId {
        enemy.set_index(self.enemies.len());
        let id = enemy.id();
        self.enemies.push(enemy);
        id
    }

    pub fn clear(&mut self) {
        self.troop_id = 0;
        self.enemies.clear();
        self.turn_count = 0;
        self.names_count.clear();
    }

    pub fn troop_id(&self) -> u32 {
        self.troop_id
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn enemy(&self, index: usize) -> Option<&Enemy> {
        self.enemies.get(index)
    }

    pub fn enemy_mut(&mut self, index: usize) -> Option<&mut Enemy> {
        self.enemies.get_mut(index)
    }

    /// Adds a suffix letter to every living enemy and marks names shared by
    /// more than one enemy as plural.
    pub fn make_unique_names(&mut self, db: &Database) {
        for enemy in &mut self.enemies {
            if enemy.is_alive(db) && enemy.is_letter_empty() {
                let count = self
                    .names_count
                    .entry(enemy.original_name().to_string())
                    .or_insert(0);
                enemy.set_letter(LETTERS[*count % LETTERS.len()]);
                *count += 1;
            }
        }
        for enemy in &mut self.enemies {
            let count = self
                .names_count
                .get(enemy.original_name())
                .copied()
                .unwrap_or(0);
            if count >= 2 {
                enemy.set_plural(true);
            }
        }
    }

    /// Distinct names of the living enemies, in troop order.
    pub fn enemy_names(&self, db: &Database) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for enemy in self.enemies.iter().filter(|e| e.is_alive(db)) {
            let name = enemy.original_name().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn increase_turn(&mut self) {
        self.turn_count += 1;
    }

    pub fn exp_total(&self, db: &Database) -> u32 {
        self.enemies
            .iter()
            .filter(|e| e.is_dead(db))
            .map(|e| e.exp(db))
            .sum()
    }

    pub fn gold_total(&self, db: &Database, gold_rate: f64) -> u32 {
        let base: u32 = self
            .enemies
            .iter()
            .filter(|e| e.is_dead(db))
            .map(|e| e.gold(db))
            .sum();
        (base as f64 * gold_rate) as u32
    }

    pub fn make_drop_items(
        &self,
        db: &Database,
        rng: &mut TurnRng,
        drop_rate: f64,
    ) -> Vec<(ItemKind, u32)> {
        self.enemies
            .iter()
            .filter(|e| e.is_dead(db))
            .flat_map(|e| e.make_drop_items(db, rng, drop_rate))
            .collect()
    }
}

impl Unit for Troop {
    fn side(&self) -> Side {
        Side::Troop
    }

    fn members(&self) -> Vec<&dyn Battler> {
        self.enemies.iter().map(|e| e as &dyn Battler).collect()
    }

    fn member(&self, index: usize) -> Option<&dyn Battler> {
        self.enemies.get(index).map(|e| e as &dyn Battler)
    }

    fn member_mut(&mut self, index: usize) -> Option<&mut dyn Battler> {
        self.enemies.get_mut(index).map(|e| e as &mut dyn Battler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::test_database;
    use crate::battler::BattlerStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn duplicate_enemies_get_letters() {
        let db = test_database();
        let mut troop = Troop::new();
        troop.setup(&db, 2).expect("troop 2");

        let names: Vec<String> = troop.enemies().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Slime A", "Slime B", "Bat"]);
        assert_eq!(troop.enemy_names(&db), vec!["Slime", "Bat"]);
    }

    #[test]
    fn hidden_members_are_not_alive_until_they_appear() {
        let db = test_database();
        let mut troop = Troop::new();
        troop.setup(&db, 3).expect("troop 3");

        assert_eq!(troop.alive_members(&db).len(), 1);
        troop.enemy_mut(1).expect("hidden enemy").appear();
        assert_eq!(troop.alive_members(&db).len(), 2);
    }

    #[test]
    fn rewards_count_only_defeated_enemies() {
        let db = test_database();
        let mut troop = Troop::new();
        troop.setup(&db, 2).expect("troop 2");
        troop.enemy_mut(0).expect("slime").set_hp(&db, 0);

        assert_eq!(troop.exp_total(&db), 10);
        assert_eq!(troop.gold_total(&db, 1.0), 5);
        assert_eq!(troop.gold_total(&db, 2.0), 10);
    }

    #[test]
    fn unknown_troop_is_an_error() {
        let db = test_database();
        let mut troop = Troop::new();
        assert!(troop.setup(&db, 99).is_err());
    }
}
