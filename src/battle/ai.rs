//! Action selection for battlers nobody steers: auto-battle actors,
//! confused actors and enemies.

use crate::battle::action::Action;
use crate::battle::context::BattleContext;
use crate::battler::{Battler, BattlerId, BattlerTraits};
use crate::database::UsableItem;
use ordered_float::OrderedFloat;
use schema::{ActionCondition, EnemyAction};
use std::sync::Arc;
use tracing::{debug, trace};

/// A trait for any system that can fill a battler's action slots.
/// This provides a common interface for different strategies.
pub trait Behavior {
    /// Decides every already allocated action slot of `battler`.
    fn decide_actions(&self, ctx: &mut BattleContext, battler: BattlerId);
}

/// Picks, per slot, the candidate action with the best heuristic value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringAI;

impl ScoringAI {
    pub fn new() -> Self {
        Self
    }

    /// The normal attack plus every skill the battler can use right now.
    fn make_action_list(&self, ctx: &BattleContext, id: BattlerId) -> Vec<Action> {
        let db = &*ctx.db;
        let mut list = Vec::new();
        let mut attack = Action::new(id, false);
        attack.set_attack(db);
        list.push(attack);

        let skill_ids: Vec<u32> = match id {
            BattlerId::Actor(index) => ctx
                .party
                .actor(index)
                .map(|actor| actor.usable_skills(db, ctx.in_battle, ctx.party.inventory()))
                .unwrap_or_default(),
            BattlerId::Enemy(index) => ctx
                .troop
                .enemy(index)
                .and_then(|enemy| enemy.enemy_data(db))
                .map(|data| data.actions.iter().map(|a| a.skill_id).collect())
                .unwrap_or_default(),
        };
        for skill_id in skill_ids {
            if skill_id == db.system.attack_skill_id {
                continue;
            }
            let usable = ctx.battler(id).is_some_and(|battler| {
                battler.can_use(db, UsableItem::Skill(skill_id), ctx.in_battle, ctx.party.inventory())
            });
            if usable {
                let mut action = Action::new(id, false);
                action.set_skill(skill_id);
                list.push(action);
            }
        }
        list
    }
}

impl Behavior for ScoringAI {
    fn decide_actions(&self, ctx: &mut BattleContext, battler: BattlerId) {
        let slots = ctx.battler(battler).map(|b| b.num_actions()).unwrap_or(0);
        for slot in 0..slots {
            let candidates = self.make_action_list(ctx, battler);
            // Only a strictly positive value beats doing nothing.
            let mut best: Option<(OrderedFloat<f64>, Action)> = None;
            for mut action in candidates {
                let value = OrderedFloat(action.evaluate(ctx));
                let threshold = best
                    .as_ref()
                    .map(|(v, _)| *v)
                    .unwrap_or(OrderedFloat(f64::MIN_POSITIVE));
                if value > threshold {
                    best = Some((value, action));
                }
            }
            if let Some((value, action)) = best {
                trace!(%battler, slot, value = value.0, "auto battle pick");
                if let Some(target) = ctx.battler_mut(battler).and_then(|b| b.action_mut(slot)) {
                    *target = action;
                }
            }
        }
    }
}

/// Chooses from an enemy's weighted action pattern.
///
/// Entries whose condition fails or whose skill is unusable are dropped;
/// only ratings within 2 of the best remaining one stay in the draw, each
/// weighted by how far it clears `best - 3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternAI;

impl PatternAI {
    pub fn new() -> Self {
        Self
    }

    fn meets_condition(ctx: &BattleContext, id: BattlerId, condition: ActionCondition) -> bool {
        let db = &*ctx.db;
        let Some(battler) = ctx.battler(id) else {
            return false;
        };
        match condition {
            ActionCondition::Always => true,
            ActionCondition::Turn { a, b } => {
                let n = ctx.troop.turn_count();
                if b == 0 {
                    n == a
                } else {
                    n > 0 && n >= a && n % b == a % b
                }
            }
            ActionCondition::HpRate { min, max } => {
                let rate = battler.hp_rate(db);
                rate >= min && rate <= max
            }
            ActionCondition::MpRate { min, max } => {
                let rate = battler.mp_rate(db);
                rate >= min && rate <= max
            }
            ActionCondition::State(state_id) => battler.is_state_affected(state_id),
            ActionCondition::PartyLevel(level) => ctx.party.highest_level() >= level,
            ActionCondition::Switch(switch_id) => ctx.is_switch_on(switch_id),
        }
    }

    fn is_action_valid(ctx: &BattleContext, id: BattlerId, action: &EnemyAction) -> bool {
        Self::meets_condition(ctx, id, action.condition)
            && ctx.battler(id).is_some_and(|battler| {
                battler.can_use(
                    &ctx.db,
                    UsableItem::Skill(action.skill_id),
                    ctx.in_battle,
                    ctx.party.inventory(),
                )
            })
    }

    fn select_action(
        ctx: &mut BattleContext,
        candidates: &[EnemyAction],
        rating_zero: i64,
    ) -> Option<u32> {
        let sum: i64 = candidates
            .iter()
            .map(|a| a.rating as i64 - rating_zero)
            .sum();
        if sum <= 0 {
            return None;
        }
        let mut value = ctx.rng.random_int(sum as u32, "enemy action") as i64;
        for candidate in candidates {
            value -= candidate.rating as i64 - rating_zero;
            if value < 0 {
                return Some(candidate.skill_id);
            }
        }
        None
    }
}

impl Behavior for PatternAI {
    fn decide_actions(&self, ctx: &mut BattleContext, battler: BattlerId) {
        let db = Arc::clone(&ctx.db);
        let Some(data) = ctx
            .troop
            .enemy(battler.index())
            .and_then(|enemy| enemy.enemy_data(&db))
        else {
            return;
        };
        let valid: Vec<EnemyAction> = data
            .actions
            .iter()
            .filter(|action| Self::is_action_valid(ctx, battler, action))
            .copied()
            .collect();
        let Some(rating_max) = valid.iter().map(|a| a.rating as i64).max() else {
            debug!(%battler, "no usable pattern entry");
            return;
        };
        let rating_zero = rating_max - 3;
        let candidates: Vec<EnemyAction> = valid
            .into_iter()
            .filter(|a| a.rating as i64 > rating_zero)
            .collect();

        let slots = ctx.battler(battler).map(|b| b.num_actions()).unwrap_or(0);
        for slot in 0..slots {
            let chosen = Self::select_action(ctx, &candidates, rating_zero);
            if let Some(action) = ctx.battler_mut(battler).and_then(|b| b.action_mut(slot)) {
                match chosen {
                    Some(skill_id) => action.set_skill(skill_id),
                    None => action.clear(),
                }
            }
        }
    }
}

/// One slot, plus one more for every action-plus trait that succeeds.
pub fn make_action_times(ctx: &mut BattleContext, id: BattlerId) -> usize {
    let db = Arc::clone(&ctx.db);
    let plus = ctx
        .battler(id)
        .map(|battler| battler.action_plus_set(&db))
        .unwrap_or_default();
    1 + plus
        .into_iter()
        .filter(|p| ctx.rng.chance(*p, "action plus"))
        .count()
}

/// Allocates this turn's action slots for `id` and fills the ones the
/// player does not choose: auto battle, confusion and enemy patterns.
pub fn make_actions(ctx: &mut BattleContext, id: BattlerId) {
    let db = Arc::clone(&ctx.db);
    let Some(battler) = ctx.battler_mut(id) else {
        return;
    };
    battler.clear_actions();
    if !battler.can_move(&db) {
        return;
    }
    let times = make_action_times(ctx, id);
    if let Some(battler) = ctx.battler_mut(id) {
        battler.set_actions(vec![Action::new(id, false); times]);
    }

    match id {
        BattlerId::Actor(_) => {
            let (auto, confused) = ctx
                .battler(id)
                .map(|b| (b.is_auto_battle(&db), b.is_confused(&db)))
                .unwrap_or((false, false));
            if auto {
                ScoringAI::new().decide_actions(ctx, id);
            } else if confused {
                if let Some(battler) = ctx.battler_mut(id) {
                    for slot in 0..times {
                        if let Some(action) = battler.action_mut(slot) {
                            action.set_confusion(&db);
                        }
                    }
                }
            }
        }
        BattlerId::Enemy(_) => PatternAI::new().decide_actions(ctx, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{
        test_context, TestActorBuilder, TestEnemyBuilder, ATTACK_SKILL, CONFUSION_STATE,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn enemy_with_single_pattern_entry_picks_it_without_weighting_draws() {
        // Slime: one Attack entry at rating 5 -> sum 3, one random_int draw.
        let mut ctx = test_context(vec![TestActorBuilder::new(1)], vec![TestEnemyBuilder::new(1)], vec![0.9]);

        make_actions(&mut ctx, BattlerId::Enemy(0));

        let enemy = ctx.battler(BattlerId::Enemy(0)).expect("slime");
        assert_eq!(enemy.num_actions(), 1);
        assert_eq!(enemy.actions()[0].item(), Some(UsableItem::Skill(ATTACK_SKILL)));
    }

    #[test]
    fn confused_actor_gets_normal_attacks() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1).with_state(CONFUSION_STATE)],
            vec![TestEnemyBuilder::new(1)],
            vec![],
        );

        make_actions(&mut ctx, BattlerId::Actor(0));

        let actor = ctx.battler(BattlerId::Actor(0)).expect("actor");
        assert_eq!(actor.actions()[0].item(), Some(UsableItem::Skill(ATTACK_SKILL)));
    }

    #[test]
    fn battler_that_cannot_move_gets_no_slots() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1).with_state(crate::battle::tests::common::SLEEP_STATE)],
            vec![TestEnemyBuilder::new(1)],
            vec![],
        );

        make_actions(&mut ctx, BattlerId::Actor(0));

        assert_eq!(ctx.battler(BattlerId::Actor(0)).map(|b| b.num_actions()), Some(0));
    }

    #[rstest]
    #[case(0, 2, 0, false)]
    #[case(0, 2, 2, true)]
    #[case(0, 2, 3, false)]
    #[case(1, 2, 3, true)]
    #[case(1, 2, 4, false)]
    #[case(3, 0, 3, true)]
    #[case(3, 0, 4, false)]
    fn turn_condition_follows_a_plus_bx(
        #[case] a: u32,
        #[case] b: u32,
        #[case] turn: u32,
        #[case] expected: bool,
    ) {
        let mut ctx = test_context(vec![], vec![TestEnemyBuilder::new(1)], vec![]);
        for _ in 0..turn {
            ctx.troop.increase_turn();
        }

        let met = PatternAI::meets_condition(&ctx, BattlerId::Enemy(0), ActionCondition::Turn { a, b });

        assert_eq!(met, expected);
    }

    #[test]
    fn rating_window_drops_entries_three_below_the_best() {
        let mut ctx = test_context(vec![], vec![TestEnemyBuilder::new(1)], vec![0.0, 0.99]);
        let candidates = vec![
            EnemyAction {
                skill_id: 1,
                rating: 9,
                condition: ActionCondition::Always,
            },
            EnemyAction {
                skill_id: 2,
                rating: 7,
                condition: ActionCondition::Always,
            },
        ];

        // rating_zero 6: weights 3 and 1, sum 4.
        assert_eq!(PatternAI::select_action(&mut ctx, &candidates, 6), Some(1));
        assert_eq!(PatternAI::select_action(&mut ctx, &candidates, 6), Some(2));
    }
}
