use crate::params::ParamSet;
use crate::traits::Trait;
use serde::{Deserialize, Serialize};

/// How strongly a state limits what its bearer can do. Ordered, so the
/// effective restriction of a battler is the maximum over its states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Restriction {
    #[default]
    None = 0,
    AttackEnemy = 1,
    AttackAnyone = 2,
    AttackAlly = 3,
    CannotMove = 4,
}

impl Restriction {
    pub fn level(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoRemovalTiming {
    #[default]
    None,
    ActionEnd,
    TurnEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateData {
    pub id: u32,
    pub name: String,
    pub restriction: Restriction,
    pub priority: u32,
    pub remove_at_battle_end: bool,
    pub remove_by_restriction: bool,
    pub auto_removal_timing: AutoRemovalTiming,
    pub min_turns: u32,
    pub max_turns: u32,
    pub remove_by_damage: bool,
    /// Percent.
    pub chance_by_damage: u32,
    /// Shown when an actor gains the state.
    pub message_actor: String,
    /// Shown when an enemy gains the state.
    pub message_enemy: String,
    pub message_removed: String,
    pub traits: Vec<Trait>,
}

impl Default for StateData {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            restriction: Restriction::None,
            priority: 50,
            remove_at_battle_end: false,
            remove_by_restriction: false,
            auto_removal_timing: AutoRemovalTiming::None,
            min_turns: 1,
            max_turns: 1,
            remove_by_damage: false,
            chance_by_damage: 100,
            message_actor: String::new(),
            message_enemy: String::new(),
            message_removed: String::new(),
            traits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Item,
    Weapon,
    Armor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropItem {
    pub kind: ItemKind,
    pub data_id: u32,
    /// The drop succeeds with probability `1 / denominator`.
    pub denominator: u32,
}

/// Gate on an enemy action pattern entry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ActionCondition {
    #[default]
    Always,
    /// `b == 0`: exactly turn `a`; otherwise turns `a, a+b, a+2b, ...`.
    Turn { a: u32, b: u32 },
    HpRate { min: f64, max: f64 },
    MpRate { min: f64, max: f64 },
    State(u32),
    PartyLevel(u32),
    Switch(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyAction {
    pub skill_id: u32,
    /// 1..=9, higher is preferred.
    pub rating: u32,
    #[serde(default)]
    pub condition: ActionCondition,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyData {
    pub id: u32,
    pub name: String,
    pub params: ParamSet,
    pub exp: u32,
    pub gold: u32,
    pub drop_items: Vec<DropItem>,
    pub actions: Vec<EnemyAction>,
    pub traits: Vec<Trait>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopMember {
    pub enemy_id: u32,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TroopData {
    pub id: u32,
    pub name: String,
    pub members: Vec<TroopMember>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorData {
    pub id: u32,
    pub name: String,
    pub class_id: u32,
    pub initial_level: u32,
    pub max_level: u32,
    /// Starting equipment, one entry per slot; 0 leaves the slot empty.
    pub equips: Vec<u32>,
    pub traits: Vec<Trait>,
}

/// Experience curve coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpCurve {
    pub basis: f64,
    pub extra: f64,
    pub acc_a: f64,
    pub acc_b: f64,
}

impl Default for ExpCurve {
    fn default() -> Self {
        Self {
            basis: 30.0,
            extra: 20.0,
            acc_a: 30.0,
            acc_b: 30.0,
        }
    }
}

impl ExpCurve {
    /// Total experience required to reach `level`.
    pub fn exp_for_level(&self, level: u32) -> u32 {
        let lv = level as f64;
        let value = self.basis
            * (lv - 1.0).powf(0.9 + self.acc_a / 250.0)
            * lv
            * (lv + 1.0)
            / (6.0 + lv.powi(2) / 50.0 / self.acc_b)
            + (lv - 1.0) * self.extra;
        value.round().max(0.0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learning {
    pub level: u32,
    pub skill_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassData {
    pub id: u32,
    pub name: String,
    pub exp_curve: ExpCurve,
    /// Parameters at level 1.
    pub base_params: ParamSet,
    /// Parameter gain per level above 1.
    pub growth: ParamSet,
    pub learnings: Vec<Learning>,
    pub traits: Vec<Trait>,
}

impl ClassData {
    pub fn param_at(&self, param: crate::params::Param, level: u32) -> f64 {
        let steps = level.saturating_sub(1) as f64;
        (self.base_params.get(param) + self.growth.get(param) * steps).floor()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponData {
    pub id: u32,
    pub name: String,
    pub wtype_id: u32,
    pub price: u32,
    pub params: ParamSet,
    pub traits: Vec<Trait>,
}

impl WeaponData {
    /// Weapons always go in the first equipment slot type.
    pub const ETYPE_ID: u32 = 1;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmorData {
    pub id: u32,
    pub name: String,
    pub atype_id: u32,
    pub etype_id: u32,
    pub price: u32,
    pub params: ParamSet,
    pub traits: Vec<Trait>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Param;

    #[test]
    fn exp_curve_starts_at_zero_and_increases() {
        let curve = ExpCurve::default();
        assert_eq!(curve.exp_for_level(1), 0);
        let mut previous = 0;
        for level in 2..=20 {
            let exp = curve.exp_for_level(level);
            assert!(exp > previous, "level {} needs more exp than {}", level, level - 1);
            previous = exp;
        }
    }

    #[test]
    fn class_params_grow_linearly_with_level() {
        let class = ClassData {
            base_params: ParamSet {
                mhp: 400.0,
                atk: 20.0,
                ..Default::default()
            },
            growth: ParamSet {
                mhp: 50.5,
                atk: 3.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(class.param_at(Param::Mhp, 1), 400.0);
        assert_eq!(class.param_at(Param::Atk, 5), 32.0);
        assert_eq!(class.param_at(Param::Mhp, 3), 501.0);
    }

    #[test]
    fn restrictions_order_by_severity() {
        assert!(Restriction::CannotMove > Restriction::AttackAlly);
        assert!(Restriction::AttackEnemy > Restriction::None);
        assert_eq!(Restriction::AttackAnyone.level(), 2);
    }
}
