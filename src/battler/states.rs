use super::traits::BattlerTraits;
use crate::battle::state::TurnRng;
use crate::database::Database;
use schema::{AutoRemovalTiming, Param, SParam, XParam};
use strum::IntoEnumIterator;

pub const INITIAL_TP_RANGE: u32 = 25;

/// Mutation of resources, states and buffs, plus the per-turn and per-battle
/// lifecycle hooks.
///
/// Every write to hp/mp/tp goes through [`BattlerStatus::refresh`], which
/// clamps the resources and keeps `hp == 0` and the death state in step.
pub trait BattlerStatus: BattlerTraits {
    // --- RESOURCES ---

    fn set_hp(&mut self, db: &Database, hp: i32) {
        self.core_mut().hp = hp;
        self.refresh(db);
    }

    fn set_mp(&mut self, db: &Database, mp: i32) {
        self.core_mut().mp = mp;
        self.refresh(db);
    }

    fn set_tp(&mut self, db: &Database, tp: i32) {
        self.core_mut().tp = tp;
        self.refresh(db);
    }

    fn gain_hp(&mut self, db: &Database, value: i32) {
        let result = self.result_mut();
        result.hp_damage = -value;
        result.hp_affected = true;
        let hp = self.hp() + value;
        self.set_hp(db, hp);
    }

    fn gain_mp(&mut self, db: &Database, value: i32) {
        self.result_mut().mp_damage = -value;
        let mp = self.mp() + value;
        self.set_mp(db, mp);
    }

    fn gain_tp(&mut self, db: &Database, value: i32) {
        self.result_mut().tp_damage = -value;
        let tp = self.tp() + value;
        self.set_tp(db, tp);
    }

    /// TP change that is not reported in the action result.
    fn gain_silent_tp(&mut self, db: &Database, value: i32) {
        let tp = self.tp() + value;
        self.set_tp(db, tp);
    }

    fn init_tp(&mut self, db: &Database, rng: &mut TurnRng) {
        let tp = rng.random_int(INITIAL_TP_RANGE, "initial tp") as i32;
        self.set_tp(db, tp);
    }

    fn clear_tp(&mut self, db: &Database) {
        self.set_tp(db, 0);
    }

    fn recover_all(&mut self, db: &Database) {
        self.clear_states();
        let mhp = self.mhp(db);
        let mmp = self.mmp(db);
        self.core_mut().hp = mhp;
        self.core_mut().mp = mmp;
        self.refresh(db);
    }

    /// Re-clamp resources, drop resisted states and reconcile the death state
    /// with `hp`.
    fn refresh(&mut self, db: &Database) {
        let death = db.death_state_id();
        for state_id in self.state_resist_set(db) {
            if state_id != death {
                self.erase_state(state_id);
            }
        }

        let mhp = self.mhp(db);
        let mmp = self.mmp(db);
        let max_tp = self.max_tp(db);
        let core = self.core_mut();
        core.hp = core.hp.clamp(0, mhp);
        core.mp = core.mp.clamp(0, mmp);
        core.tp = core.tp.clamp(0, max_tp);

        let dead = self.is_state_affected(death);
        if self.hp() == 0 && !dead {
            self.add_new_state(db, death);
            let turns = db.state(death).map(|s| s.min_turns).unwrap_or(0);
            self.core_mut().state_turns.insert(death, turns);
            self.result_mut().push_added_state(death);
        } else if self.hp() > 0 && dead {
            self.erase_state(death);
            self.result_mut().push_removed_state(death);
        }
    }

    fn die(&mut self) {
        self.core_mut().hp = 0;
        self.clear_states();
        self.clear_buffs();
    }

    fn revive(&mut self) {
        if self.hp() == 0 {
            self.core_mut().hp = 1;
        }
    }

    // --- STATES ---

    fn is_state_restrict(&self, db: &Database, state_id: u32) -> bool {
        db.state(state_id)
            .is_some_and(|state| state.remove_by_restriction)
            && self.is_restricted(db)
    }

    fn is_state_addable(&self, db: &Database, state_id: u32) -> bool {
        self.is_alive(db)
            && db.state(state_id).is_some()
            && !self.is_state_resist(db, state_id)
            && !self.result().is_state_removed(state_id)
            && !self.is_state_restrict(db, state_id)
    }

    /// Adds the state if allowed. A state that is already present keeps its
    /// remaining turns; a new one rolls them from its turn range.
    fn add_state(&mut self, db: &Database, rng: &mut TurnRng, state_id: u32) -> bool {
        if !self.is_state_addable(db, state_id) {
            return false;
        }
        if !self.is_state_affected(state_id) {
            self.add_new_state(db, state_id);
            self.refresh(db);
            self.reset_state_counts(db, rng, state_id);
        }
        self.result_mut().push_added_state(state_id);
        true
    }

    fn add_new_state(&mut self, db: &Database, state_id: u32) {
        if state_id == db.death_state_id() {
            self.die();
        }
        let was_restricted = self.is_restricted(db);
        let core = self.core_mut();
        core.states.push(state_id);
        core.state_turns.entry(state_id).or_insert(0);
        self.sort_states(db);
        if !was_restricted && self.is_restricted(db) {
            self.on_restrict(db);
        }
    }

    fn sort_states(&mut self, db: &Database) {
        let priority = |id: &u32| db.state(*id).map(|s| s.priority).unwrap_or(0);
        self.core_mut()
            .states
            .sort_by(|a, b| priority(b).cmp(&priority(a)).then(a.cmp(b)));
    }

    fn on_restrict(&mut self, db: &Database) {
        self.clear_actions();
        let removable: Vec<u32> = self
            .states(db)
            .into_iter()
            .filter(|state| state.remove_by_restriction)
            .map(|state| state.id)
            .collect();
        for state_id in removable {
            self.remove_state(db, state_id);
        }
    }

    fn reset_state_counts(&mut self, db: &Database, rng: &mut TurnRng, state_id: u32) {
        let Some(state) = db.state(state_id) else {
            return;
        };
        let variance = 1 + state.max_turns.saturating_sub(state.min_turns);
        let turns = state.min_turns + rng.random_int(variance, "state turns");
        self.core_mut().state_turns.insert(state_id, turns);
    }

    fn erase_state(&mut self, state_id: u32) {
        let core = self.core_mut();
        core.states.retain(|id| *id != state_id);
        core.state_turns.remove(&state_id);
    }

    fn clear_states(&mut self) {
        let core = self.core_mut();
        core.states.clear();
        core.state_turns.clear();
    }

    fn remove_state(&mut self, db: &Database, state_id: u32) {
        if !self.is_state_affected(state_id) {
            return;
        }
        if state_id == db.death_state_id() {
            self.revive();
        }
        self.erase_state(state_id);
        self.refresh(db);
        self.result_mut().push_removed_state(state_id);
    }

    fn update_state_turns(&mut self) {
        for turns in self.core_mut().state_turns.values_mut() {
            if *turns > 0 {
                *turns -= 1;
            }
        }
    }

    fn is_state_expired(&self, state_id: u32) -> bool {
        self.state_turns(state_id) == Some(0)
    }

    fn remove_states_auto(&mut self, db: &Database, timing: AutoRemovalTiming) {
        let expired: Vec<u32> = self
            .states(db)
            .into_iter()
            .filter(|state| {
                state.auto_removal_timing == timing
                    && timing != AutoRemovalTiming::None
                    && self.is_state_expired(state.id)
            })
            .map(|state| state.id)
            .collect();
        for state_id in expired {
            self.remove_state(db, state_id);
        }
    }

    fn remove_battle_states(&mut self, db: &Database) {
        let battle_only: Vec<u32> = self
            .states(db)
            .into_iter()
            .filter(|state| state.remove_at_battle_end)
            .map(|state| state.id)
            .collect();
        for state_id in battle_only {
            self.remove_state(db, state_id);
        }
    }

    fn remove_states_by_damage(&mut self, db: &Database, rng: &mut TurnRng) {
        let candidates: Vec<(u32, u32)> = self
            .states(db)
            .into_iter()
            .filter(|state| state.remove_by_damage)
            .map(|state| (state.id, state.chance_by_damage))
            .collect();
        for (state_id, chance) in candidates {
            if chance >= 100 || rng.random_int(100, "remove state by damage") < chance {
                self.remove_state(db, state_id);
            }
        }
    }

    // --- BUFFS ---

    fn add_buff(&mut self, db: &Database, param: Param, turns: u32) {
        if !self.is_alive(db) {
            return;
        }
        if !self.is_max_buff_affected(param) {
            self.core_mut().buffs[param.index()] += 1;
        }
        if self.is_buff_affected(param) {
            self.overwrite_buff_turns(param, turns);
        }
        self.result_mut().push_added_buff(param);
        self.refresh(db);
    }

    fn add_debuff(&mut self, db: &Database, param: Param, turns: u32) {
        if !self.is_alive(db) {
            return;
        }
        if !self.is_max_debuff_affected(param) {
            self.core_mut().buffs[param.index()] -= 1;
        }
        if self.is_debuff_affected(param) {
            self.overwrite_buff_turns(param, turns);
        }
        self.result_mut().push_added_debuff(param);
        self.refresh(db);
    }

    /// Buff durations only ever grow when re-applied.
    fn overwrite_buff_turns(&mut self, param: Param, turns: u32) {
        let current = &mut self.core_mut().buff_turns[param.index()];
        if *current < turns {
            *current = turns;
        }
    }

    fn remove_buff(&mut self, db: &Database, param: Param) {
        if self.is_alive(db) && self.is_buff_or_debuff_affected(param) {
            self.erase_buff(param);
            self.result_mut().push_removed_buff(param);
            self.refresh(db);
        }
    }

    fn erase_buff(&mut self, param: Param) {
        let core = self.core_mut();
        core.buffs[param.index()] = 0;
        core.buff_turns[param.index()] = 0;
    }

    fn clear_buffs(&mut self) {
        for param in Param::iter() {
            self.erase_buff(param);
        }
    }

    fn remove_all_buffs(&mut self, db: &Database) {
        for param in Param::iter() {
            self.remove_buff(db, param);
        }
    }

    fn update_buff_turns(&mut self) {
        for turns in self.core_mut().buff_turns.iter_mut() {
            if *turns > 0 {
                *turns -= 1;
            }
        }
    }

    fn remove_buffs_auto(&mut self, db: &Database) {
        if !self.is_alive(db) {
            return;
        }
        for param in Param::iter() {
            if self.is_buff_or_debuff_affected(param) && self.buff_turns(param) == 0 {
                self.remove_buff(db, param);
            }
        }
    }

    fn add_param(&mut self, db: &Database, param: Param, value: f64) {
        *self.core_mut().param_plus.get_mut(param) += value;
        self.refresh(db);
    }

    // --- REGENERATION AND DAMAGE SIDE EFFECTS ---

    fn max_slip_damage(&self, db: &Database) -> i32 {
        if db.system.opt_slip_death {
            self.hp()
        } else {
            (self.hp() - 1).max(0)
        }
    }

    fn regenerate_hp(&mut self, db: &Database) {
        let value = (self.mhp(db) as f64 * self.xparam(db, XParam::Hrg)).floor() as i32;
        let value = value.max(-self.max_slip_damage(db));
        if value != 0 {
            self.gain_hp(db, value);
        }
    }

    fn regenerate_mp(&mut self, db: &Database) {
        let value = (self.mmp(db) as f64 * self.xparam(db, XParam::Mrg)).floor() as i32;
        if value != 0 {
            self.gain_mp(db, value);
        }
    }

    fn regenerate_tp(&mut self, db: &Database) {
        let value = (self.max_tp(db) as f64 * self.xparam(db, XParam::Trg)).floor() as i32;
        self.gain_silent_tp(db, value);
    }

    fn regenerate_all(&mut self, db: &Database) {
        if self.is_alive(db) {
            self.regenerate_hp(db);
            self.regenerate_mp(db);
            self.regenerate_tp(db);
        }
    }

    fn charge_tp_by_damage(&mut self, db: &Database, damage_rate: f64) {
        let value = (50.0 * damage_rate * self.sparam(db, SParam::Tcr)).floor() as i32;
        self.gain_silent_tp(db, value);
    }

    fn on_damage(&mut self, db: &Database, rng: &mut TurnRng, value: i32) {
        self.remove_states_by_damage(db, rng);
        let rate = value as f64 / self.mhp(db).max(1) as f64;
        self.charge_tp_by_damage(db, rate);
    }

    // --- LIFECYCLE ---

    fn on_battle_start(&mut self, db: &Database, rng: &mut TurnRng) {
        self.set_speed(0.0);
        if !self.is_preserve_tp(db) {
            self.init_tp(db, rng);
        }
    }

    fn on_battle_end(&mut self, db: &Database) {
        self.clear_result();
        self.remove_battle_states(db);
        self.remove_all_buffs(db);
        self.clear_actions();
        if !self.is_preserve_tp(db) {
            self.clear_tp(db);
        }
        self.appear();
    }

    /// Regeneration, then state and buff countdown (skipped on forced turns),
    /// then removal of turn-end states that ran out.
    fn on_turn_end(&mut self, db: &Database, forced_turn: bool) {
        self.clear_result();
        self.regenerate_all(db);
        if !forced_turn {
            self.update_state_turns();
            self.update_buff_turns();
        }
        self.remove_states_auto(db, AutoRemovalTiming::TurnEnd);
    }

    fn on_all_actions_end(&mut self, db: &Database) {
        self.clear_result();
        self.remove_states_auto(db, AutoRemovalTiming::ActionEnd);
        self.remove_buffs_auto(db);
    }

    fn escape(&mut self, in_battle: bool) {
        if in_battle {
            self.hide();
        }
        self.clear_actions();
        self.clear_states();
    }
}

impl<T: BattlerTraits + ?Sized> BattlerStatus for T {}
