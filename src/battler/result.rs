use schema::Param;
use serde::{Deserialize, Serialize};

/// What the last action did to a battler. Overwritten by every new action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub used: bool,
    pub missed: bool,
    pub evaded: bool,
    pub physical: bool,
    pub drain: bool,
    pub critical: bool,
    pub success: bool,
    pub hp_affected: bool,
    /// Positive values are damage, negative values recovery.
    pub hp_damage: i32,
    pub mp_damage: i32,
    pub tp_damage: i32,
    pub added_states: Vec<u32>,
    pub removed_states: Vec<u32>,
    pub added_buffs: Vec<Param>,
    pub added_debuffs: Vec<Param>,
    pub removed_buffs: Vec<Param>,
}

impl ActionResult {
    pub fn clear(&mut self) {
        *self = ActionResult::default();
    }

    pub fn is_hit(&self) -> bool {
        self.used && !self.missed && !self.evaded
    }

    pub fn is_status_affected(&self) -> bool {
        !self.added_states.is_empty()
            || !self.removed_states.is_empty()
            || !self.added_buffs.is_empty()
            || !self.added_debuffs.is_empty()
            || !self.removed_buffs.is_empty()
    }

    pub fn is_state_added(&self, state_id: u32) -> bool {
        self.added_states.contains(&state_id)
    }

    pub fn is_state_removed(&self, state_id: u32) -> bool {
        self.removed_states.contains(&state_id)
    }

    pub fn push_added_state(&mut self, state_id: u32) {
        if !self.is_state_added(state_id) {
            self.added_states.push(state_id);
        }
    }

    pub fn push_removed_state(&mut self, state_id: u32) {
        if !self.is_state_removed(state_id) {
            self.removed_states.push(state_id);
        }
    }

    pub fn push_added_buff(&mut self, param: Param) {
        if !self.added_buffs.contains(&param) {
            self.added_buffs.push(param);
        }
    }

    pub fn push_added_debuff(&mut self, param: Param) {
        if !self.added_debuffs.contains(&param) {
            self.added_debuffs.push(param);
        }
    }

    pub fn push_removed_buff(&mut self, param: Param) {
        if !self.removed_buffs.contains(&param) {
            self.removed_buffs.push(param);
        }
    }
}
