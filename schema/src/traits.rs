use crate::params::{Param, SParam, XParam};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitCode {
    ElementRate,
    DebuffRate,
    StateRate,
    StateResist,
    Param,
    XParam,
    SParam,
    AttackElement,
    AttackState,
    AttackSpeed,
    AttackTimes,
    SkillTypeAdd,
    SkillTypeSeal,
    SkillAdd,
    SkillSeal,
    EquipWeaponType,
    EquipArmorType,
    EquipLock,
    EquipSeal,
    ActionPlus,
    SpecialFlag,
    PartyAbility,
}

/// Flags carried by `TraitCode::SpecialFlag` traits, keyed by `data_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialFlag {
    AutoBattle = 0,
    Guard = 1,
    Substitute = 2,
    PreserveTp = 3,
}

/// Party-wide abilities carried by `TraitCode::PartyAbility` traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyAbility {
    EncounterHalf = 0,
    EncounterNone = 1,
    CancelSurprise = 2,
    RaisePreemptive = 3,
    GoldDouble = 4,
    DropItemDouble = 5,
}

/// A single `(code, data id, value)` contribution from a state, class,
/// actor, enemy or piece of equipment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    pub code: TraitCode,
    #[serde(default)]
    pub data_id: u32,
    #[serde(default)]
    pub value: f64,
}

impl Trait {
    pub fn new(code: TraitCode, data_id: u32, value: f64) -> Self {
        Self {
            code,
            data_id,
            value,
        }
    }

    pub fn param(param: Param, rate: f64) -> Self {
        Self::new(TraitCode::Param, param as u32, rate)
    }

    pub fn xparam(xparam: XParam, value: f64) -> Self {
        Self::new(TraitCode::XParam, xparam as u32, value)
    }

    pub fn sparam(sparam: SParam, rate: f64) -> Self {
        Self::new(TraitCode::SParam, sparam as u32, rate)
    }

    pub fn element_rate(element_id: u32, rate: f64) -> Self {
        Self::new(TraitCode::ElementRate, element_id, rate)
    }

    pub fn state_rate(state_id: u32, rate: f64) -> Self {
        Self::new(TraitCode::StateRate, state_id, rate)
    }

    pub fn state_resist(state_id: u32) -> Self {
        Self::new(TraitCode::StateResist, state_id, 0.0)
    }

    pub fn special_flag(flag: SpecialFlag) -> Self {
        Self::new(TraitCode::SpecialFlag, flag as u32, 0.0)
    }

    pub fn party_ability(ability: PartyAbility) -> Self {
        Self::new(TraitCode::PartyAbility, ability as u32, 0.0)
    }

    pub fn matches(&self, code: TraitCode, data_id: u32) -> bool {
        self.code == code && self.data_id == data_id
    }
}
