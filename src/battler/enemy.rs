use super::{Battler, BattlerCore, BattlerId, BattlerStatus, TraitSource};
use crate::battle::state::TurnRng;
use crate::database::Database;
use crate::errors::{DataError, DataResult};
use schema::{EnemyData, ItemKind, Param};
use serde::{Deserialize, Serialize};

/// A troop member instantiated from an enemy record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    core: BattlerCore,
    enemy_id: u32,
    original_name: String,
    letter: String,
    plural: bool,
}

impl Enemy {
    pub fn new(db: &Database, enemy_id: u32, index: usize) -> DataResult<Self> {
        let data = db.enemy(enemy_id).ok_or(DataError::NotFound {
            kind: "enemy",
            id: enemy_id,
        })?;
        let mut enemy = Self {
            core: BattlerCore::new(BattlerId::Enemy(index)),
            enemy_id,
            original_name: data.name.clone(),
            letter: String::new(),
            plural: false,
        };
        enemy.recover_all(db);
        Ok(enemy)
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.core.id = BattlerId::Enemy(index);
    }

    pub fn enemy_id(&self) -> u32 {
        self.enemy_id
    }

    pub fn enemy_data<'a>(&self, db: &'a Database) -> Option<&'a EnemyData> {
        db.enemy(self.enemy_id)
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn letter(&self) -> &str {
        &self.letter
    }

    pub fn is_letter_empty(&self) -> bool {
        self.letter.is_empty()
    }

    pub fn set_letter(&mut self, letter: impl Into<String>) {
        self.letter = letter.into();
    }

    pub fn set_plural(&mut self, plural: bool) {
        self.plural = plural;
    }

    pub fn exp(&self, db: &Database) -> u32 {
        self.enemy_data(db).map(|data| data.exp).unwrap_or(0)
    }

    pub fn gold(&self, db: &Database) -> u32 {
        self.enemy_data(db).map(|data| data.gold).unwrap_or(0)
    }

    /// One roll per drop slot: the item drops when `random * denominator < drop_rate`.
    pub fn make_drop_items(
        &self,
        db: &Database,
        rng: &mut TurnRng,
        drop_rate: f64,
    ) -> Vec<(ItemKind, u32)> {
        let Some(data) = self.enemy_data(db) else {
            return Vec::new();
        };
        data.drop_items
            .iter()
            .filter(|drop| drop.data_id > 0)
            .filter(|drop| {
                let chance = drop_rate / drop.denominator.max(1) as f64;
                rng.chance(chance, "enemy drop")
            })
            .map(|drop| (drop.kind, drop.data_id))
            .collect()
    }
}

impl Battler for Enemy {
    fn core(&self) -> &BattlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BattlerCore {
        &mut self.core
    }

    fn name(&self) -> String {
        if self.plural {
            format!("{}{}", self.original_name, self.letter)
        } else {
            self.original_name.clone()
        }
    }

    fn own_trait_sources<'a>(&'a self, db: &'a Database) -> Vec<TraitSource<'a>> {
        self.enemy_data(db)
            .map(|data| vec![TraitSource::Enemy(data)])
            .unwrap_or_default()
    }

    fn param_base(&self, db: &Database, param: Param) -> f64 {
        self.enemy_data(db)
            .map(|data| data.params.get(param))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{test_database, TestEnemyBuilder};
    use crate::battler::BattlerTraits;
    use pretty_assertions::assert_eq;

    #[test]
    fn enemy_params_come_from_its_record() {
        let db = test_database();
        let enemy = TestEnemyBuilder::new(1).build(&db);

        assert_eq!(enemy.mhp(&db), 200);
        assert_eq!(enemy.hp(), 200);
        assert_eq!(enemy.param(&db, Param::Def), 20);
    }

    #[test]
    fn letter_only_shows_when_plural() {
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).build(&db);
        enemy.set_letter(" A");

        assert_eq!(enemy.name(), "Slime");
        enemy.set_plural(true);
        assert_eq!(enemy.name(), "Slime A");
    }

    #[test]
    fn drops_roll_against_denominator() {
        let db = test_database();
        let enemy = TestEnemyBuilder::new(1).build(&db);

        // Slime drops item 1 at 1/2: 0.3 < 0.5 drops, 0.7 does not.
        let mut rng = TurnRng::new_for_test(vec![0.3]);
        assert_eq!(enemy.make_drop_items(&db, &mut rng, 1.0), vec![(ItemKind::Item, 1)]);

        let mut rng = TurnRng::new_for_test(vec![0.7]);
        assert_eq!(enemy.make_drop_items(&db, &mut rng, 1.0), vec![]);

        // Doubled drop rate makes a 1/2 drop certain without a roll.
        let mut rng = TurnRng::new_for_test(vec![]);
        assert_eq!(enemy.make_drop_items(&db, &mut rng, 2.0), vec![(ItemKind::Item, 1)]);
    }
}
