use crate::errors::{DataError, DataResult};
use schema::{
    ActorData, ArmorData, ClassData, EnemyData, ItemData, SkillData, StateData, SystemData,
    TroopData, Usage, WeaponData,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// A reference to a skill or an inventory item by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsableItem {
    Skill(u32),
    Item(u32),
}

/// A resolved skill or item record.
#[derive(Debug, Clone, Copy)]
pub enum UsableRef<'a> {
    Skill(&'a SkillData),
    Item(&'a ItemData),
}

impl<'a> UsableRef<'a> {
    pub fn usage(&self) -> &'a Usage {
        match self {
            UsableRef::Skill(skill) => &skill.usage,
            UsableRef::Item(item) => &item.usage,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            UsableRef::Skill(skill) => &skill.name,
            UsableRef::Item(item) => &item.name,
        }
    }

    pub fn as_skill(&self) -> Option<&'a SkillData> {
        match self {
            UsableRef::Skill(skill) => Some(skill),
            UsableRef::Item(_) => None,
        }
    }

    pub fn is_item(&self) -> bool {
        matches!(self, UsableRef::Item(_))
    }
}

/// All static game data the battle engine reads.
#[derive(Debug, Clone, Default)]
pub struct Database {
    pub system: SystemData,
    skills: HashMap<u32, SkillData>,
    items: HashMap<u32, ItemData>,
    weapons: HashMap<u32, WeaponData>,
    armors: HashMap<u32, ArmorData>,
    states: HashMap<u32, StateData>,
    classes: HashMap<u32, ClassData>,
    actors: HashMap<u32, ActorData>,
    enemies: HashMap<u32, EnemyData>,
    troops: HashMap<u32, TroopData>,
}

fn read_ron<T: DeserializeOwned>(path: &Path) -> DataResult<Option<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "data file absent, using defaults");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|err| DataError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let value = ron::from_str(&content).map_err(|err| DataError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(Some(value))
}

fn read_table<T: DeserializeOwned>(
    dir: &Path,
    file: &str,
    id_of: impl Fn(&T) -> u32,
) -> DataResult<HashMap<u32, T>> {
    let records: Vec<T> = read_ron(&dir.join(file))?.unwrap_or_default();
    Ok(records.into_iter().map(|record| (id_of(&record), record)).collect())
}

impl Database {
    /// Load every table from `<dir>/<table>.ron`. Absent files leave their
    /// table empty (or, for `system.ron`, at defaults).
    pub fn load_from_dir(dir: &Path) -> DataResult<Self> {
        let db = Self {
            system: read_ron(&dir.join("system.ron"))?.unwrap_or_default(),
            skills: read_table(dir, "skills.ron", |s: &SkillData| s.id)?,
            items: read_table(dir, "items.ron", |i: &ItemData| i.id)?,
            weapons: read_table(dir, "weapons.ron", |w: &WeaponData| w.id)?,
            armors: read_table(dir, "armors.ron", |a: &ArmorData| a.id)?,
            states: read_table(dir, "states.ron", |s: &StateData| s.id)?,
            classes: read_table(dir, "classes.ron", |c: &ClassData| c.id)?,
            actors: read_table(dir, "actors.ron", |a: &ActorData| a.id)?,
            enemies: read_table(dir, "enemies.ron", |e: &EnemyData| e.id)?,
            troops: read_table(dir, "troops.ron", |t: &TroopData| t.id)?,
        };
        info!(
            skills = db.skills.len(),
            states = db.states.len(),
            enemies = db.enemies.len(),
            troops = db.troops.len(),
            "database loaded from {}",
            dir.display()
        );
        Ok(db)
    }

    pub fn skill(&self, id: u32) -> Option<&SkillData> {
        self.skills.get(&id)
    }

    pub fn item(&self, id: u32) -> Option<&ItemData> {
        self.items.get(&id)
    }

    pub fn weapon(&self, id: u32) -> Option<&WeaponData> {
        self.weapons.get(&id)
    }

    pub fn armor(&self, id: u32) -> Option<&ArmorData> {
        self.armors.get(&id)
    }

    pub fn state(&self, id: u32) -> Option<&StateData> {
        self.states.get(&id)
    }

    pub fn class(&self, id: u32) -> Option<&ClassData> {
        self.classes.get(&id)
    }

    pub fn actor(&self, id: u32) -> Option<&ActorData> {
        self.actors.get(&id)
    }

    pub fn enemy(&self, id: u32) -> Option<&EnemyData> {
        self.enemies.get(&id)
    }

    pub fn troop(&self, id: u32) -> DataResult<&TroopData> {
        self.troops
            .get(&id)
            .ok_or(DataError::NotFound { kind: "troop", id })
    }

    pub fn usable(&self, item: UsableItem) -> Option<UsableRef<'_>> {
        match item {
            UsableItem::Skill(id) => self.skill(id).map(UsableRef::Skill),
            UsableItem::Item(id) => self.item(id).map(UsableRef::Item),
        }
    }

    pub fn death_state_id(&self) -> u32 {
        self.system.death_state_id
    }

    // --- BUILDERS ---

    pub fn insert_skill(&mut self, skill: SkillData) -> &mut Self {
        self.skills.insert(skill.id, skill);
        self
    }

    pub fn insert_item(&mut self, item: ItemData) -> &mut Self {
        self.items.insert(item.id, item);
        self
    }

    pub fn insert_weapon(&mut self, weapon: WeaponData) -> &mut Self {
        self.weapons.insert(weapon.id, weapon);
        self
    }

    pub fn insert_armor(&mut self, armor: ArmorData) -> &mut Self {
        self.armors.insert(armor.id, armor);
        self
    }

    pub fn insert_state(&mut self, state: StateData) -> &mut Self {
        self.states.insert(state.id, state);
        self
    }

    pub fn insert_class(&mut self, class: ClassData) -> &mut Self {
        self.classes.insert(class.id, class);
        self
    }

    pub fn insert_actor(&mut self, actor: ActorData) -> &mut Self {
        self.actors.insert(actor.id, actor);
        self
    }

    pub fn insert_enemy(&mut self, enemy: EnemyData) -> &mut Self {
        self.enemies.insert(enemy.id, enemy);
        self
    }

    pub fn insert_troop(&mut self, troop: TroopData) -> &mut Self {
        self.troops.insert(troop.id, troop);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bundled_data() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
    }

    #[test]
    fn bundled_data_loads() {
        let db = Database::load_from_dir(&bundled_data()).expect("bundled data parses");
        assert_eq!(db.system.death_state_id, 1);
        let attack = db.skill(db.system.attack_skill_id).expect("attack skill");
        assert!(attack.usage.damage.formula.is_valid());
        assert!(db.troop(1).is_ok());
        assert!(db.state(db.death_state_id()).is_some());
    }

    #[test]
    fn missing_directory_yields_empty_tables() {
        let db = Database::load_from_dir(Path::new("/nonexistent/rpg-battle-data"))
            .expect("absent files are not an error");
        assert_eq!(db.system, SystemData::default());
        assert!(db.skill(1).is_none());
        assert_eq!(
            db.troop(3),
            Err(DataError::NotFound { kind: "troop", id: 3 })
        );
    }

    #[test]
    fn usable_resolves_skills_and_items() {
        let mut db = Database::default();
        db.insert_skill(SkillData {
            id: 7,
            name: "Fire".to_string(),
            stype_id: 1,
            mp_cost: 5,
            tp_cost: 0,
            required_wtype_ids: vec![],
            message: String::new(),
            usage: Usage::default(),
        })
        .insert_item(ItemData {
            id: 7,
            name: "Potion".to_string(),
            consumable: true,
            price: 50,
            usage: Usage::default(),
        });

        assert_eq!(db.usable(UsableItem::Skill(7)).map(|u| u.name()), Some("Fire"));
        assert_eq!(db.usable(UsableItem::Item(7)).map(|u| u.name()), Some("Potion"));
        assert!(db.usable(UsableItem::Skill(8)).is_none());
    }
}
