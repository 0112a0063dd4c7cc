//! Rosters: the shared queries over a side's battle members.

use crate::battle::state::TurnRng;
use crate::battler::{Battler, BattlerId, BattlerTraits, Side};
use crate::database::Database;
use schema::SParam;

/// A side of the battle. Member indices are the indices carried by
/// [`BattlerId`], so `members()[i].id().index() == i`.
pub trait Unit {
    fn side(&self) -> Side;

    /// Members taking part in battle, in formation order.
    fn members(&self) -> Vec<&dyn Battler>;

    fn member(&self, index: usize) -> Option<&dyn Battler>;

    fn member_mut(&mut self, index: usize) -> Option<&mut dyn Battler>;

    fn member_ids(&self) -> Vec<BattlerId> {
        self.members().iter().map(|member| member.id()).collect()
    }

    fn alive_members(&self, db: &Database) -> Vec<&dyn Battler> {
        self.members()
            .into_iter()
            .filter(|member| member.is_alive(db))
            .collect()
    }

    fn dead_members(&self, db: &Database) -> Vec<&dyn Battler> {
        self.members()
            .into_iter()
            .filter(|member| member.is_dead(db))
            .collect()
    }

    fn alive_ids(&self, db: &Database) -> Vec<BattlerId> {
        self.alive_members(db).iter().map(|m| m.id()).collect()
    }

    fn dead_ids(&self, db: &Database) -> Vec<BattlerId> {
        self.dead_members(db).iter().map(|m| m.id()).collect()
    }

    fn movable_ids(&self, db: &Database) -> Vec<BattlerId> {
        self.members()
            .into_iter()
            .filter(|member| member.can_move(db))
            .map(|member| member.id())
            .collect()
    }

    fn is_all_dead(&self, db: &Database) -> bool {
        self.alive_members(db).is_empty()
    }

    /// Mean AGI of the members; 1 for an empty roster.
    fn agility(&self, db: &Database) -> f64 {
        let members = self.members();
        if members.is_empty() {
            return 1.0;
        }
        let sum: f64 = members.iter().map(|m| m.agi(db) as f64).sum();
        sum / members.len() as f64
    }

    fn tgr_sum(&self, db: &Database) -> f64 {
        self.alive_members(db)
            .iter()
            .map(|m| m.sparam(db, SParam::Tgr))
            .sum()
    }

    /// A living member, weighted by target rate.
    fn random_target(&self, db: &Database, rng: &mut TurnRng) -> Option<BattlerId> {
        let alive = self.alive_members(db);
        match alive.len() {
            0 => return None,
            1 => return Some(alive[0].id()),
            _ => {}
        }
        let mut roll = rng.next_f64("random target") * self.tgr_sum(db);
        for member in &alive {
            roll -= member.sparam(db, SParam::Tgr);
            if roll <= 0.0 {
                return Some(member.id());
            }
        }
        alive.last().map(|m| m.id())
    }

    fn random_dead_target(&self, db: &Database, rng: &mut TurnRng) -> Option<BattlerId> {
        let dead = self.dead_ids(db);
        if dead.is_empty() {
            return None;
        }
        let index = rng.random_int(dead.len() as u32, "random dead target") as usize;
        dead.get(index).copied()
    }

    /// The member at `index` if it is alive, otherwise the first living one.
    fn smooth_target(&self, db: &Database, index: Option<usize>) -> Option<BattlerId> {
        index
            .and_then(|i| self.member(i))
            .filter(|member| member.is_alive(db))
            .map(|member| member.id())
            .or_else(|| self.alive_ids(db).first().copied())
    }

    fn smooth_dead_target(&self, db: &Database, index: Option<usize>) -> Option<BattlerId> {
        index
            .and_then(|i| self.member(i))
            .filter(|member| member.is_dead(db))
            .map(|member| member.id())
            .or_else(|| self.dead_ids(db).first().copied())
    }

    fn substitute_battler(&self, db: &Database) -> Option<BattlerId> {
        self.members()
            .into_iter()
            .find(|member| member.is_substitute(db))
            .map(|member| member.id())
    }

    fn clear_results(&mut self) {
        for id in self.member_ids() {
            if let Some(member) = self.member_mut(id.index()) {
                member.clear_result();
            }
        }
    }

    fn clear_actions(&mut self) {
        for id in self.member_ids() {
            if let Some(member) = self.member_mut(id.index()) {
                member.clear_actions();
            }
        }
    }
}
