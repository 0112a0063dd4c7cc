use serde::{Deserialize, Serialize};

/// Engine-wide configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemData {
    pub death_state_id: u32,
    pub attack_skill_id: u32,
    pub guard_skill_id: u32,
    pub max_tp: u32,
    /// Added to the escape ratio after every failed attempt.
    pub escape_ratio_step: f64,
    pub max_battle_members: usize,
    /// Equipment slot types, in slot order. Slot type ids start at 1.
    pub equip_types: Vec<String>,
    /// Element added to attacks made without a weapon.
    pub bare_hands_element_id: u32,
    /// Regeneration may reduce HP to 0.
    pub opt_slip_death: bool,
    /// Reserve members earn the full victory experience.
    pub opt_extra_exp: bool,
    pub max_gold: u32,
    pub max_item_count: u32,
    pub currency_unit: String,
}

impl Default for SystemData {
    fn default() -> Self {
        Self {
            death_state_id: 1,
            attack_skill_id: 1,
            guard_skill_id: 2,
            max_tp: 100,
            escape_ratio_step: 0.1,
            max_battle_members: 4,
            equip_types: vec![
                "Weapon".to_string(),
                "Shield".to_string(),
                "Head".to_string(),
                "Body".to_string(),
                "Accessory".to_string(),
            ],
            bare_hands_element_id: 1,
            opt_slip_death: false,
            opt_extra_exp: false,
            max_gold: 99_999_999,
            max_item_count: 99,
            currency_unit: "G".to_string(),
        }
    }
}
