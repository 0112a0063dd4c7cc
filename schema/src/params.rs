use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumCount, EnumIter};

/// The eight base parameters every battler carries. The discriminant doubles
/// as the trait `data_id` for `TraitCode::Param` and as the buff slot index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount,
)]
pub enum Param {
    Mhp = 0,
    Mmp = 1,
    Atk = 2,
    Def = 3,
    Mat = 4,
    Mdf = 5,
    Agi = 6,
    Luk = 7,
}

impl Param {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Param> {
        use Param::*;
        [Mhp, Mmp, Atk, Def, Mat, Mdf, Agi, Luk].get(index).copied()
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Param::Mhp => "Max HP",
            Param::Mmp => "Max MP",
            Param::Atk => "Attack",
            Param::Def => "Defense",
            Param::Mat => "M.Attack",
            Param::Mdf => "M.Defense",
            Param::Agi => "Agility",
            Param::Luk => "Luck",
        };
        write!(f, "{}", name)
    }
}

/// Additive rates (hit, evasion, regeneration...). Summed across traits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount,
)]
pub enum XParam {
    Hit = 0,
    Eva = 1,
    Cri = 2,
    Cev = 3,
    Mev = 4,
    Mrf = 5,
    Cnt = 6,
    Hrg = 7,
    Mrg = 8,
    Trg = 9,
}

/// Multiplicative rates (target rate, guard effect, recovery...). Multiplied
/// across traits, so a battler with no such trait has a rate of 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount,
)]
pub enum SParam {
    Tgr = 0,
    Grd = 1,
    Rec = 2,
    Pha = 3,
    Mcr = 4,
    Tcr = 5,
    Pdr = 6,
    Mdr = 7,
    Fdr = 8,
    Exr = 9,
}

/// A full set of base parameter values, used for enemy stats, class curves
/// and equipment bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamSet {
    pub mhp: f64,
    pub mmp: f64,
    pub atk: f64,
    pub def: f64,
    pub mat: f64,
    pub mdf: f64,
    pub agi: f64,
    pub luk: f64,
}

impl ParamSet {
    pub fn get(&self, param: Param) -> f64 {
        match param {
            Param::Mhp => self.mhp,
            Param::Mmp => self.mmp,
            Param::Atk => self.atk,
            Param::Def => self.def,
            Param::Mat => self.mat,
            Param::Mdf => self.mdf,
            Param::Agi => self.agi,
            Param::Luk => self.luk,
        }
    }

    pub fn get_mut(&mut self, param: Param) -> &mut f64 {
        match param {
            Param::Mhp => &mut self.mhp,
            Param::Mmp => &mut self.mmp,
            Param::Atk => &mut self.atk,
            Param::Def => &mut self.def,
            Param::Mat => &mut self.mat,
            Param::Mdf => &mut self.mdf,
            Param::Agi => &mut self.agi,
            Param::Luk => &mut self.luk,
        }
    }
}
