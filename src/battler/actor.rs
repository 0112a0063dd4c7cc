use super::{Battler, BattlerCore, BattlerId, BattlerStatus, BattlerTraits, TraitSource};
use crate::battle::action::Action;
use crate::database::{Database, UsableItem};
use crate::errors::{DataError, DataResult};
use crate::party::Inventory;
use schema::{ArmorData, ClassData, ItemKind, Param, SParam, SkillData, WeaponData};
use serde::{Deserialize, Serialize};

/// Something that can sit in an equipment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipItem {
    Weapon(u32),
    Armor(u32),
}

impl EquipItem {
    pub fn kind(self) -> ItemKind {
        match self {
            EquipItem::Weapon(_) => ItemKind::Weapon,
            EquipItem::Armor(_) => ItemKind::Armor,
        }
    }

    pub fn data_id(self) -> u32 {
        match self {
            EquipItem::Weapon(id) | EquipItem::Armor(id) => id,
        }
    }

    pub fn etype_id(self, db: &Database) -> Option<u32> {
        match self {
            EquipItem::Weapon(id) => db.weapon(id).map(|_| WeaponData::ETYPE_ID),
            EquipItem::Armor(id) => db.armor(id).map(|armor| armor.etype_id),
        }
    }
}

/// Reported when experience raises an actor's level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub level: u32,
    pub learned_skills: Vec<u32>,
}

/// A party member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    core: BattlerCore,
    actor_id: u32,
    name: String,
    class_id: u32,
    level: u32,
    max_level: u32,
    exp: u32,
    skills: Vec<u32>,
    equips: Vec<Option<EquipItem>>,
    action_input_index: usize,
}

impl Actor {
    pub fn new(db: &Database, actor_id: u32, index: usize) -> DataResult<Self> {
        let data = db.actor(actor_id).ok_or(DataError::NotFound {
            kind: "actor",
            id: actor_id,
        })?;
        let class = db.class(data.class_id).ok_or(DataError::NotFound {
            kind: "class",
            id: data.class_id,
        })?;

        let slot_count = db.system.equip_types.len();
        let mut equips = vec![None; slot_count];
        for (slot, item_id) in data.equips.iter().enumerate().take(slot_count) {
            if *item_id == 0 {
                continue;
            }
            equips[slot] = if slot == 0 {
                db.weapon(*item_id).map(|_| EquipItem::Weapon(*item_id))
            } else {
                db.armor(*item_id).map(|_| EquipItem::Armor(*item_id))
            };
        }

        let level = data.initial_level.max(1);
        let mut actor = Self {
            core: BattlerCore::new(BattlerId::Actor(index)),
            actor_id,
            name: data.name.clone(),
            class_id: data.class_id,
            level,
            max_level: data.max_level.max(level),
            exp: class.exp_curve.exp_for_level(level),
            skills: Vec::new(),
            equips,
            action_input_index: 0,
        };
        for learning in &class.learnings {
            if learning.level <= level {
                actor.learn_skill(learning.skill_id);
            }
        }
        actor.recover_all(db);
        Ok(actor)
    }

    pub fn actor_id(&self) -> u32 {
        self.actor_id
    }

    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.core.id = BattlerId::Actor(index);
    }

    fn class<'a>(&self, db: &'a Database) -> Option<&'a ClassData> {
        db.class(self.class_id)
    }

    // --- EXPERIENCE ---

    pub fn exp_for_level(&self, db: &Database, level: u32) -> u32 {
        self.class(db)
            .map(|class| class.exp_curve.exp_for_level(level))
            .unwrap_or(0)
    }

    pub fn current_exp(&self) -> u32 {
        self.exp
    }

    pub fn current_level_exp(&self, db: &Database) -> u32 {
        self.exp_for_level(db, self.level)
    }

    pub fn next_level_exp(&self, db: &Database) -> u32 {
        self.exp_for_level(db, self.level + 1)
    }

    pub fn next_required_exp(&self, db: &Database) -> u32 {
        self.next_level_exp(db).saturating_sub(self.exp)
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn is_max_level(&self) -> bool {
        self.level >= self.max_level
    }

    /// Sets total experience, levelling up or down to match.
    pub fn change_exp(&mut self, db: &Database, exp: u32) -> Option<LevelUp> {
        self.exp = exp;
        let last_level = self.level;
        let mut learned = Vec::new();
        while !self.is_max_level() && self.exp >= self.next_level_exp(db) {
            learned.extend(self.level_up(db));
        }
        while self.level > 1 && self.exp < self.current_level_exp(db) {
            self.level -= 1;
        }
        self.refresh(db);
        (self.level > last_level).then(|| LevelUp {
            level: self.level,
            learned_skills: learned,
        })
    }

    pub fn change_level(&mut self, db: &Database, level: u32) -> Option<LevelUp> {
        let level = level.clamp(1, self.max_level);
        let exp = self.exp_for_level(db, level);
        self.change_exp(db, exp)
    }

    fn level_up(&mut self, db: &Database) -> Vec<u32> {
        self.level += 1;
        let mut learned = Vec::new();
        if let Some(class) = self.class(db) {
            for learning in &class.learnings {
                if learning.level == self.level && !self.is_learned_skill(learning.skill_id) {
                    learned.push(learning.skill_id);
                }
            }
        }
        for skill_id in &learned {
            self.learn_skill(*skill_id);
        }
        learned
    }

    /// Experience multiplier: EXR, and the reserve-member rule for actors
    /// outside the battle formation.
    pub fn final_exp_rate(&self, db: &Database, is_battle_member: bool) -> f64 {
        let bench_rate = if is_battle_member || db.system.opt_extra_exp {
            1.0
        } else {
            0.0
        };
        self.sparam(db, SParam::Exr) * bench_rate
    }

    pub fn gain_exp(&mut self, db: &Database, exp: u32, is_battle_member: bool) -> Option<LevelUp> {
        let gained = (exp as f64 * self.final_exp_rate(db, is_battle_member)).round() as u32;
        self.change_exp(db, self.exp.saturating_add(gained))
    }

    // --- SKILLS ---

    pub fn learn_skill(&mut self, skill_id: u32) {
        if !self.is_learned_skill(skill_id) {
            self.skills.push(skill_id);
            self.skills.sort_unstable();
        }
    }

    pub fn forget_skill(&mut self, skill_id: u32) {
        self.skills.retain(|id| *id != skill_id);
    }

    pub fn is_learned_skill(&self, skill_id: u32) -> bool {
        self.skills.contains(&skill_id)
    }

    /// Learned skills plus those granted by traits.
    pub fn skills(&self, db: &Database) -> Vec<u32> {
        let mut skills = self.skills.clone();
        for skill_id in self.added_skills(db) {
            if !skills.contains(&skill_id) {
                skills.push(skill_id);
            }
        }
        skills.sort_unstable();
        skills
    }

    pub fn usable_skills(&self, db: &Database, in_battle: bool, inventory: &Inventory) -> Vec<u32> {
        self.skills(db)
            .into_iter()
            .filter(|id| self.can_use(db, UsableItem::Skill(*id), in_battle, inventory))
            .collect()
    }

    // --- EQUIPMENT ---

    /// Equipment type id of every slot, in slot order.
    pub fn equip_slots(&self, db: &Database) -> Vec<u32> {
        (1..=db.system.equip_types.len() as u32).collect()
    }

    pub fn equips(&self) -> &[Option<EquipItem>] {
        &self.equips
    }

    pub fn weapons<'a>(&self, db: &'a Database) -> Vec<&'a WeaponData> {
        self.equips
            .iter()
            .filter_map(|slot| match slot {
                Some(EquipItem::Weapon(id)) => db.weapon(*id),
                _ => None,
            })
            .collect()
    }

    pub fn armors<'a>(&self, db: &'a Database) -> Vec<&'a ArmorData> {
        self.equips
            .iter()
            .filter_map(|slot| match slot {
                Some(EquipItem::Armor(id)) => db.armor(*id),
                _ => None,
            })
            .collect()
    }

    pub fn has_no_weapons(&self, db: &Database) -> bool {
        self.weapons(db).is_empty()
    }

    pub fn is_wtype_equipped(&self, db: &Database, wtype_id: u32) -> bool {
        self.weapons(db).iter().any(|weapon| weapon.wtype_id == wtype_id)
    }

    pub fn can_equip(&self, db: &Database, item: EquipItem) -> bool {
        match item {
            EquipItem::Weapon(id) => db.weapon(id).is_some_and(|weapon| {
                self.is_equip_wtype_ok(db, weapon.wtype_id)
                    && !self.is_equip_type_sealed(db, WeaponData::ETYPE_ID)
            }),
            EquipItem::Armor(id) => db.armor(id).is_some_and(|armor| {
                self.is_equip_atype_ok(db, armor.atype_id)
                    && !self.is_equip_type_sealed(db, armor.etype_id)
            }),
        }
    }

    pub fn is_equip_change_ok(&self, db: &Database, slot: usize) -> bool {
        match self.equip_slots(db).get(slot) {
            Some(etype_id) => {
                !self.is_equip_type_locked(db, *etype_id) && !self.is_equip_type_sealed(db, *etype_id)
            }
            None => false,
        }
    }

    /// Swaps equipment with the party inventory. `None` unequips the slot.
    /// Returns false (and changes nothing) when the swap is not allowed.
    pub fn change_equip(
        &mut self,
        db: &Database,
        slot: usize,
        item: Option<EquipItem>,
        inventory: &mut Inventory,
    ) -> bool {
        if !self.is_equip_change_ok(db, slot) {
            return false;
        }
        if let Some(new_item) = item {
            let slot_type = self.equip_slots(db).get(slot).copied();
            if !self.can_equip(db, new_item) || new_item.etype_id(db) != slot_type {
                return false;
            }
            if !inventory.has(new_item.kind(), new_item.data_id()) {
                return false;
            }
            inventory.lose(new_item.kind(), new_item.data_id(), 1);
        }
        if let Some(old_item) = self.equips[slot] {
            inventory.gain(old_item.kind(), old_item.data_id(), 1);
        }
        self.equips[slot] = item;
        self.refresh(db);
        true
    }

    // --- COMMAND INPUT ---

    pub fn action_input_index(&self) -> usize {
        self.action_input_index
    }

    pub fn reset_input(&mut self) {
        self.action_input_index = 0;
    }

    pub fn select_next_command(&mut self) -> bool {
        if self.action_input_index + 1 < self.core.actions.len() {
            self.action_input_index += 1;
            true
        } else {
            false
        }
    }

    pub fn select_previous_command(&mut self) -> bool {
        if self.action_input_index > 0 {
            self.action_input_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn inputting_action_mut(&mut self) -> Option<&mut Action> {
        self.core.actions.get_mut(self.action_input_index)
    }
}

impl Battler for Actor {
    fn core(&self) -> &BattlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BattlerCore {
        &mut self.core
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn own_trait_sources<'a>(&'a self, db: &'a Database) -> Vec<TraitSource<'a>> {
        let mut sources = Vec::new();
        if let Some(data) = db.actor(self.actor_id) {
            sources.push(TraitSource::Actor(data));
        }
        if let Some(class) = self.class(db) {
            sources.push(TraitSource::Class(class));
        }
        sources.extend(self.weapons(db).into_iter().map(TraitSource::Weapon));
        sources.extend(self.armors(db).into_iter().map(TraitSource::Armor));
        sources
    }

    fn param_base(&self, db: &Database, param: Param) -> f64 {
        self.class(db)
            .map(|class| class.param_at(param, self.level))
            .unwrap_or(0.0)
    }

    fn param_plus(&self, db: &Database, param: Param) -> f64 {
        let equipment: f64 = self
            .weapons(db)
            .iter()
            .map(|weapon| weapon.params.get(param))
            .chain(self.armors(db).iter().map(|armor| armor.params.get(param)))
            .sum();
        self.core.param_plus.get(param) + equipment
    }

    fn param_max(&self, param: Param) -> f64 {
        match param {
            Param::Mhp => 9_999.0,
            Param::Mmp => 9_999.0,
            _ => 999.0,
        }
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn extra_attack_elements(&self, db: &Database) -> Vec<u32> {
        if self.has_no_weapons(db) {
            vec![db.system.bare_hands_element_id]
        } else {
            Vec::new()
        }
    }

    fn meets_skill_requirements(&self, db: &Database, skill: &SkillData) -> bool {
        skill.required_wtype_ids.is_empty()
            || skill
                .required_wtype_ids
                .iter()
                .any(|wtype_id| self.is_wtype_equipped(db, *wtype_id))
    }

    fn as_actor(&self) -> Option<&Actor> {
        Some(self)
    }

    fn as_actor_mut(&mut self) -> Option<&mut Actor> {
        Some(self)
    }

    fn clear_actions(&mut self) {
        self.core.actions.clear();
        self.action_input_index = 0;
    }
}
