use schema::ItemKind;
use serde::{Deserialize, Serialize};

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    Victory,
    Escaped,
    Aborted,
    Defeat,
}

/// Spoils of a won battle, computed once at victory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    pub gold: u32,
    pub exp: u32,
    pub items: Vec<(ItemKind, u32)>,
}

impl Rewards {
    pub fn is_empty(&self) -> bool {
        self.gold == 0 && self.exp == 0 && self.items.is_empty()
    }
}
