use crate::formula::Formula;
use serde::{Deserialize, Serialize};

/// Targeting rule of a skill or item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    None,
    OneEnemy,
    AllEnemies,
    /// `n` independent random picks among living enemies.
    RandomEnemies(u8),
    OneAlly,
    AllAllies,
    OneDeadAlly,
    AllDeadAllies,
    User,
}

impl Scope {
    pub fn is_for_opponent(self) -> bool {
        matches!(
            self,
            Scope::OneEnemy | Scope::AllEnemies | Scope::RandomEnemies(_)
        )
    }

    pub fn is_for_friend(self) -> bool {
        matches!(
            self,
            Scope::OneAlly
                | Scope::AllAllies
                | Scope::OneDeadAlly
                | Scope::AllDeadAllies
                | Scope::User
        )
    }

    pub fn is_for_dead_friend(self) -> bool {
        matches!(self, Scope::OneDeadAlly | Scope::AllDeadAllies)
    }

    pub fn is_for_user(self) -> bool {
        self == Scope::User
    }

    pub fn is_for_one(self) -> bool {
        matches!(
            self,
            Scope::OneEnemy
                | Scope::RandomEnemies(1)
                | Scope::OneAlly
                | Scope::OneDeadAlly
                | Scope::User
        )
    }

    pub fn is_for_random(self) -> bool {
        matches!(self, Scope::RandomEnemies(_))
    }

    pub fn is_for_all(self) -> bool {
        matches!(
            self,
            Scope::AllEnemies | Scope::AllAllies | Scope::AllDeadAllies
        )
    }

    pub fn needs_selection(self) -> bool {
        matches!(self, Scope::OneEnemy | Scope::OneAlly | Scope::OneDeadAlly)
    }

    pub fn num_random_targets(self) -> usize {
        match self {
            Scope::RandomEnemies(n) => n as usize,
            _ => 0,
        }
    }
}

/// When a skill or item may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Occasion {
    #[default]
    Always,
    BattleScreen,
    MenuScreen,
    Never,
}

impl Occasion {
    pub fn allows(self, in_battle: bool) -> bool {
        match self {
            Occasion::Always => true,
            Occasion::BattleScreen => in_battle,
            Occasion::MenuScreen => !in_battle,
            Occasion::Never => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HitType {
    #[default]
    CertainHit,
    Physical,
    Magical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageType {
    #[default]
    None,
    HpDamage,
    MpDamage,
    HpRecover,
    MpRecover,
    HpDrain,
    MpDrain,
}

impl DamageType {
    pub fn is_hp_effect(self) -> bool {
        matches!(
            self,
            DamageType::HpDamage | DamageType::HpRecover | DamageType::HpDrain
        )
    }

    pub fn is_mp_effect(self) -> bool {
        matches!(
            self,
            DamageType::MpDamage | DamageType::MpRecover | DamageType::MpDrain
        )
    }

    pub fn is_recover(self) -> bool {
        matches!(self, DamageType::HpRecover | DamageType::MpRecover)
    }

    pub fn is_drain(self) -> bool {
        matches!(self, DamageType::HpDrain | DamageType::MpDrain)
    }

    /// `-1` for recovery kinds, `+1` otherwise.
    pub fn sign(self) -> f64 {
        if self.is_recover() {
            -1.0
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Element {
    /// Use the subject's attack elements (the strongest one against the target).
    NormalAttack,
    #[default]
    None,
    Fixed(u32),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Damage {
    #[serde(rename = "type")]
    pub kind: DamageType,
    pub element: Element,
    pub formula: Formula,
    /// Percent spread around the computed value.
    pub variance: u32,
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectCode {
    RecoverHp,
    RecoverMp,
    GainTp,
    /// `data_id` 0 applies the subject's attack states.
    AddState,
    RemoveState,
    AddBuff,
    AddDebuff,
    RemoveBuff,
    RemoveDebuff,
    /// `data_id` 0 makes the target escape from battle.
    Special,
    Grow,
    LearnSkill,
    CommonEvent,
}

pub const SPECIAL_EFFECT_ESCAPE: u32 = 0;

/// A secondary effect. `value1`/`value2` meanings depend on `code`: a rate and
/// a flat amount for recovery, a chance for states, a turn count for buffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub code: EffectCode,
    #[serde(default)]
    pub data_id: u32,
    #[serde(default)]
    pub value1: f64,
    #[serde(default)]
    pub value2: f64,
}

impl Effect {
    pub fn new(code: EffectCode, data_id: u32, value1: f64, value2: f64) -> Self {
        Self {
            code,
            data_id,
            value1,
            value2,
        }
    }
}

/// Everything a skill and an item share about how they are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub scope: Scope,
    pub occasion: Occasion,
    pub speed: i32,
    /// Percent.
    pub success_rate: f64,
    pub repeats: u32,
    pub tp_gain: i32,
    pub hit_type: HitType,
    pub damage: Damage,
    pub effects: Vec<Effect>,
}

impl Default for Usage {
    fn default() -> Self {
        Self {
            scope: Scope::None,
            occasion: Occasion::Always,
            speed: 0,
            success_rate: 100.0,
            repeats: 1,
            tp_gain: 0,
            hit_type: HitType::CertainHit,
            damage: Damage::default(),
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillData {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub stype_id: u32,
    #[serde(default)]
    pub mp_cost: u32,
    #[serde(default)]
    pub tp_cost: u32,
    /// Weapon types of which at least one must be equipped. Empty means none.
    #[serde(default)]
    pub required_wtype_ids: Vec<u32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemData {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_true")]
    pub consumable: bool,
    #[serde(default)]
    pub price: u32,
    #[serde(default)]
    pub usage: Usage,
}

fn default_true() -> bool {
    true
}
