use super::Battler;
use crate::database::{Database, UsableItem, UsableRef};
use crate::party::Inventory;
use schema::{
    ActorData, ArmorData, ClassData, EnemyData, ItemKind, Param, PartyAbility, Restriction,
    SParam, SkillData, SpecialFlag, StateData, Trait, TraitCode, WeaponData, XParam,
};

/// Every kind of object that can contribute traits to a battler.
#[derive(Debug, Clone, Copy)]
pub enum TraitSource<'a> {
    State(&'a StateData),
    Actor(&'a ActorData),
    Class(&'a ClassData),
    Weapon(&'a WeaponData),
    Armor(&'a ArmorData),
    Enemy(&'a EnemyData),
}

impl<'a> TraitSource<'a> {
    pub fn traits(&self) -> &'a [Trait] {
        match self {
            TraitSource::State(state) => &state.traits,
            TraitSource::Actor(actor) => &actor.traits,
            TraitSource::Class(class) => &class.traits,
            TraitSource::Weapon(weapon) => &weapon.traits,
            TraitSource::Armor(armor) => &armor.traits,
            TraitSource::Enemy(enemy) => &enemy.traits,
        }
    }
}

/// Derived stats and capability queries, all folded from trait sources on
/// demand.
pub trait BattlerTraits: Battler {
    /// Active states, highest priority first. Unknown ids are skipped.
    fn states<'a>(&'a self, db: &'a Database) -> Vec<&'a StateData> {
        self.state_ids()
            .iter()
            .filter_map(|id| db.state(*id))
            .collect()
    }

    fn trait_sources<'a>(&'a self, db: &'a Database) -> Vec<TraitSource<'a>> {
        let mut sources: Vec<TraitSource<'a>> = self
            .states(db)
            .into_iter()
            .map(TraitSource::State)
            .collect();
        sources.extend(self.own_trait_sources(db));
        sources
    }

    fn traits_with<'a>(&'a self, db: &'a Database, code: TraitCode) -> Vec<&'a Trait> {
        self.trait_sources(db)
            .into_iter()
            .flat_map(|source| source.traits().iter())
            .filter(|t| t.code == code)
            .collect()
    }

    fn traits_pi(&self, db: &Database, code: TraitCode, data_id: u32) -> f64 {
        self.traits_with(db, code)
            .into_iter()
            .filter(|t| t.data_id == data_id)
            .map(|t| t.value)
            .product()
    }

    fn traits_sum(&self, db: &Database, code: TraitCode, data_id: u32) -> f64 {
        self.traits_with(db, code)
            .into_iter()
            .filter(|t| t.data_id == data_id)
            .map(|t| t.value)
            .sum()
    }

    fn traits_sum_all(&self, db: &Database, code: TraitCode) -> f64 {
        self.traits_with(db, code).into_iter().map(|t| t.value).sum()
    }

    fn traits_set(&self, db: &Database, code: TraitCode) -> Vec<u32> {
        let mut ids: Vec<u32> = Vec::new();
        for t in self.traits_with(db, code) {
            if !ids.contains(&t.data_id) {
                ids.push(t.data_id);
            }
        }
        ids
    }

    fn has_trait(&self, db: &Database, code: TraitCode, data_id: u32) -> bool {
        self.traits_with(db, code)
            .into_iter()
            .any(|t| t.matches(code, data_id))
    }

    // --- PARAMETERS ---

    fn param_min(&self, param: Param) -> f64 {
        match param {
            Param::Mmp => 0.0,
            _ => 1.0,
        }
    }

    fn param_rate(&self, db: &Database, param: Param) -> f64 {
        self.traits_pi(db, TraitCode::Param, param as u32)
    }

    fn param_buff_rate(&self, param: Param) -> f64 {
        1.0 + 0.25 * self.buff(param) as f64
    }

    /// `round(clamp((base + plus) * rate * buff_rate, min, max))`
    fn param(&self, db: &Database, param: Param) -> i32 {
        let value = (self.param_base(db, param) + self.param_plus(db, param))
            * self.param_rate(db, param)
            * self.param_buff_rate(param);
        let max = self.param_max(param);
        let min = self.param_min(param);
        value.clamp(min, max).round() as i32
    }

    fn mhp(&self, db: &Database) -> i32 {
        self.param(db, Param::Mhp)
    }

    fn mmp(&self, db: &Database) -> i32 {
        self.param(db, Param::Mmp)
    }

    fn agi(&self, db: &Database) -> i32 {
        self.param(db, Param::Agi)
    }

    fn luk(&self, db: &Database) -> i32 {
        self.param(db, Param::Luk)
    }

    fn xparam(&self, db: &Database, xparam: XParam) -> f64 {
        self.traits_sum(db, TraitCode::XParam, xparam as u32)
    }

    fn sparam(&self, db: &Database, sparam: SParam) -> f64 {
        self.traits_pi(db, TraitCode::SParam, sparam as u32)
    }

    fn max_tp(&self, db: &Database) -> i32 {
        db.system.max_tp as i32
    }

    fn hp_rate(&self, db: &Database) -> f64 {
        self.hp() as f64 / self.mhp(db).max(1) as f64
    }

    fn mp_rate(&self, db: &Database) -> f64 {
        let mmp = self.mmp(db);
        if mmp > 0 {
            self.mp() as f64 / mmp as f64
        } else {
            0.0
        }
    }

    fn tp_rate(&self, db: &Database) -> f64 {
        self.tp() as f64 / self.max_tp(db).max(1) as f64
    }

    fn is_dying(&self, db: &Database) -> bool {
        self.is_alive(db) && (self.hp() as f64) < self.mhp(db) as f64 / 4.0
    }

    // --- RATES AND SETS ---

    fn element_rate(&self, db: &Database, element_id: u32) -> f64 {
        self.traits_pi(db, TraitCode::ElementRate, element_id)
    }

    fn debuff_rate(&self, db: &Database, param: Param) -> f64 {
        self.traits_pi(db, TraitCode::DebuffRate, param as u32)
    }

    fn state_rate(&self, db: &Database, state_id: u32) -> f64 {
        self.traits_pi(db, TraitCode::StateRate, state_id)
    }

    fn state_resist_set(&self, db: &Database) -> Vec<u32> {
        self.traits_set(db, TraitCode::StateResist)
    }

    fn is_state_resist(&self, db: &Database, state_id: u32) -> bool {
        self.has_trait(db, TraitCode::StateResist, state_id)
    }

    fn attack_elements(&self, db: &Database) -> Vec<u32> {
        let mut elements = self.traits_set(db, TraitCode::AttackElement);
        for element in self.extra_attack_elements(db) {
            if !elements.contains(&element) {
                elements.push(element);
            }
        }
        elements
    }

    fn attack_states(&self, db: &Database) -> Vec<u32> {
        self.traits_set(db, TraitCode::AttackState)
    }

    fn attack_states_rate(&self, db: &Database, state_id: u32) -> f64 {
        self.traits_sum(db, TraitCode::AttackState, state_id)
    }

    fn attack_speed(&self, db: &Database) -> f64 {
        self.traits_sum_all(db, TraitCode::AttackSpeed)
    }

    fn attack_times_add(&self, db: &Database) -> u32 {
        self.traits_sum_all(db, TraitCode::AttackTimes).max(0.0) as u32
    }

    fn added_skill_types(&self, db: &Database) -> Vec<u32> {
        self.traits_set(db, TraitCode::SkillTypeAdd)
    }

    fn is_skill_type_sealed(&self, db: &Database, stype_id: u32) -> bool {
        self.has_trait(db, TraitCode::SkillTypeSeal, stype_id)
    }

    fn added_skills(&self, db: &Database) -> Vec<u32> {
        self.traits_set(db, TraitCode::SkillAdd)
    }

    fn is_skill_sealed(&self, db: &Database, skill_id: u32) -> bool {
        self.has_trait(db, TraitCode::SkillSeal, skill_id)
    }

    fn is_equip_wtype_ok(&self, db: &Database, wtype_id: u32) -> bool {
        self.has_trait(db, TraitCode::EquipWeaponType, wtype_id)
    }

    fn is_equip_atype_ok(&self, db: &Database, atype_id: u32) -> bool {
        self.has_trait(db, TraitCode::EquipArmorType, atype_id)
    }

    fn is_equip_type_locked(&self, db: &Database, etype_id: u32) -> bool {
        self.has_trait(db, TraitCode::EquipLock, etype_id)
    }

    fn is_equip_type_sealed(&self, db: &Database, etype_id: u32) -> bool {
        self.has_trait(db, TraitCode::EquipSeal, etype_id)
    }

    /// Chances of each extra action per turn.
    fn action_plus_set(&self, db: &Database) -> Vec<f64> {
        self.traits_with(db, TraitCode::ActionPlus)
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    fn special_flag(&self, db: &Database, flag: SpecialFlag) -> bool {
        self.has_trait(db, TraitCode::SpecialFlag, flag as u32)
    }

    fn party_ability(&self, db: &Database, ability: PartyAbility) -> bool {
        self.has_trait(db, TraitCode::PartyAbility, ability as u32)
    }

    fn is_auto_battle(&self, db: &Database) -> bool {
        self.special_flag(db, SpecialFlag::AutoBattle)
    }

    fn is_guard(&self, db: &Database) -> bool {
        self.special_flag(db, SpecialFlag::Guard) && self.can_move(db)
    }

    fn is_substitute(&self, db: &Database) -> bool {
        self.special_flag(db, SpecialFlag::Substitute) && self.can_move(db)
    }

    fn is_preserve_tp(&self, db: &Database) -> bool {
        self.special_flag(db, SpecialFlag::PreserveTp)
    }

    // --- RESTRICTION ---

    fn restriction(&self, db: &Database) -> Restriction {
        self.states(db)
            .into_iter()
            .map(|state| state.restriction)
            .max()
            .unwrap_or(Restriction::None)
    }

    fn is_restricted(&self, db: &Database) -> bool {
        self.is_appeared() && self.restriction(db) > Restriction::None
    }

    fn can_move(&self, db: &Database) -> bool {
        self.is_appeared() && self.restriction(db) < Restriction::CannotMove
    }

    fn can_input(&self, db: &Database) -> bool {
        self.is_appeared() && !self.is_restricted(db) && !self.is_auto_battle(db)
    }

    fn is_confused(&self, db: &Database) -> bool {
        self.is_appeared()
            && matches!(
                self.restriction(db),
                Restriction::AttackEnemy | Restriction::AttackAnyone | Restriction::AttackAlly
            )
    }

    /// 0 when not confused, otherwise the restriction level (1..=3).
    fn confusion_level(&self, db: &Database) -> u8 {
        if self.is_confused(db) {
            self.restriction(db).level()
        } else {
            0
        }
    }

    // --- USABILITY ---

    fn skill_mp_cost(&self, db: &Database, skill: &SkillData) -> i32 {
        (skill.mp_cost as f64 * self.sparam(db, SParam::Mcr)).floor() as i32
    }

    fn skill_tp_cost(&self, _db: &Database, skill: &SkillData) -> i32 {
        skill.tp_cost as i32
    }

    fn can_pay_skill_cost(&self, db: &Database, skill: &SkillData) -> bool {
        self.tp() >= self.skill_tp_cost(db, skill) && self.mp() >= self.skill_mp_cost(db, skill)
    }

    fn meets_skill_conditions(&self, db: &Database, skill: &SkillData) -> bool {
        self.meets_skill_requirements(db, skill)
            && self.can_pay_skill_cost(db, skill)
            && !self.is_skill_sealed(db, skill.id)
            && !self.is_skill_type_sealed(db, skill.stype_id)
    }

    /// Movement, occasion, costs, seals and (for items) stock.
    fn can_use(
        &self,
        db: &Database,
        item: UsableItem,
        in_battle: bool,
        inventory: &Inventory,
    ) -> bool {
        let Some(usable) = db.usable(item) else {
            return false;
        };
        if !self.can_move(db) || !usable.usage().occasion.allows(in_battle) {
            return false;
        }
        match usable {
            UsableRef::Skill(skill) => self.meets_skill_conditions(db, skill),
            UsableRef::Item(data) => inventory.has(ItemKind::Item, data.id),
        }
    }

    fn can_attack(&self, db: &Database, in_battle: bool, inventory: &Inventory) -> bool {
        self.can_use(
            db,
            UsableItem::Skill(db.system.attack_skill_id),
            in_battle,
            inventory,
        )
    }

    fn can_guard(&self, db: &Database, in_battle: bool, inventory: &Inventory) -> bool {
        self.can_use(
            db,
            UsableItem::Skill(db.system.guard_skill_id),
            in_battle,
            inventory,
        )
    }
}

impl<T: Battler + ?Sized> BattlerTraits for T {}
