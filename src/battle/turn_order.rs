use crate::battle::context::BattleContext;
use crate::battler::{Battler, BattlerId};
use crate::unit::Unit;
use std::collections::VecDeque;
use tracing::debug;

/// A battler's turn speed is the slowest of its actions; a battler with no
/// actions has speed 0.
pub fn make_speed(ctx: &mut BattleContext, id: BattlerId) -> f64 {
    let actions = ctx
        .battler(id)
        .map(|battler| battler.actions().to_vec())
        .unwrap_or_default();
    let speed = actions
        .iter()
        .map(|action| action.speed(ctx))
        .reduce(f64::min)
        .unwrap_or(0.0);
    if let Some(battler) = ctx.battler_mut(id) {
        battler.set_speed(speed);
    }
    speed
}

/// Everybody who acts this turn, fastest first. Ties keep party-then-troop
/// roster order. A surprised party and a pre-empted troop sit the turn out.
pub fn make_action_orders(ctx: &mut BattleContext, surprise: bool, preemptive: bool) -> VecDeque<BattlerId> {
    let mut battlers = Vec::new();
    if !surprise {
        battlers.extend(ctx.party.member_ids());
    }
    if !preemptive {
        battlers.extend(ctx.troop.member_ids());
    }

    let mut ordered: Vec<(BattlerId, f64)> = battlers
        .into_iter()
        .map(|id| (id, make_speed(ctx, id)))
        .collect();
    ordered.sort_by(|(_, a), (_, b)| b.total_cmp(a));

    debug!(
        order = ?ordered.iter().map(|(id, speed)| format!("{id}@{speed}")).collect::<Vec<_>>(),
        "action order"
    );
    ordered.into_iter().map(|(id, _)| id).collect()
}
