//! One use of a skill or item by one battler: targeting, applicability,
//! the damage pipeline and secondary effects.

use crate::battle::context::{battler_in, unit_in, BattleContext, Variables};
use crate::battle::state::{BattleEvent, TurnRng};
use crate::battler::{Battler, BattlerId, BattlerStatus, BattlerTraits};
use crate::database::{Database, UsableItem, UsableRef};
use crate::unit::Unit;
use schema::{
    DamageType, Effect, EffectCode, Element, FormulaScope, HitType, Operand, Param, SParam,
    Scope, Stat, Usage, XParam, SPECIAL_EFFECT_ESCAPE,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const CRITICAL_MULTIPLIER: f64 = 3.0;

/// Target choice for a forced action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForcedTarget {
    Random,
    /// Whatever the battler targeted last.
    Last,
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    subject: BattlerId,
    forcing: bool,
    item: Option<UsableItem>,
    /// `None` means undecided: the target is picked at random.
    target_index: Option<usize>,
    /// Set on reflected actions so drains credit the reflector.
    reflection_target: Option<BattlerId>,
}

/// Formula variables bound to a subject and a target.
struct DamageScope<'a> {
    db: &'a Database,
    subject: &'a dyn Battler,
    target: &'a dyn Battler,
    variables: &'a Variables,
    rng: &'a mut TurnRng,
}

impl DamageScope<'_> {
    fn who(&self, operand: Operand) -> &dyn Battler {
        match operand {
            Operand::Subject => self.subject,
            Operand::Target => self.target,
        }
    }
}

impl FormulaScope for DamageScope<'_> {
    fn stat(&self, who: Operand, stat: Stat) -> f64 {
        let battler = self.who(who);
        match stat {
            Stat::Hp => battler.hp() as f64,
            Stat::Mp => battler.mp() as f64,
            Stat::Tp => battler.tp() as f64,
            Stat::Level => battler.level() as f64,
            Stat::Param(param) => battler.param(self.db, param) as f64,
            Stat::XParam(xparam) => battler.xparam(self.db, xparam),
            Stat::SParam(sparam) => battler.sparam(self.db, sparam),
        }
    }

    fn variable(&self, id: u32) -> f64 {
        self.variables.get(id)
    }

    fn is_state_affected(&self, who: Operand, state_id: u32) -> bool {
        self.who(who).is_state_affected(state_id)
    }

    fn random(&mut self) -> f64 {
        self.rng.next_f64("formula random")
    }
}

impl Action {
    pub fn new(subject: BattlerId, forcing: bool) -> Self {
        Self {
            subject,
            forcing,
            item: None,
            target_index: None,
            reflection_target: None,
        }
    }

    // --- CONFIGURATION ---

    pub fn clear(&mut self) {
        self.item = None;
        self.target_index = None;
    }

    pub fn subject(&self) -> BattlerId {
        self.subject
    }

    pub fn set_subject(&mut self, subject: BattlerId) {
        self.subject = subject;
    }

    pub fn is_forcing(&self) -> bool {
        self.forcing
    }

    pub fn item(&self) -> Option<UsableItem> {
        self.item
    }

    pub fn set_item_object(&mut self, item: UsableItem) {
        self.item = Some(item);
    }

    pub fn set_skill(&mut self, skill_id: u32) {
        self.item = Some(UsableItem::Skill(skill_id));
    }

    pub fn set_item(&mut self, item_id: u32) {
        self.item = Some(UsableItem::Item(item_id));
    }

    pub fn set_attack(&mut self, db: &Database) {
        self.set_skill(db.system.attack_skill_id);
    }

    pub fn set_guard(&mut self, db: &Database) {
        self.set_skill(db.system.guard_skill_id);
    }

    pub fn set_confusion(&mut self, db: &Database) {
        self.set_attack(db);
    }

    pub fn target_index(&self) -> Option<usize> {
        self.target_index
    }

    pub fn set_target(&mut self, index: usize) {
        self.target_index = Some(index);
    }

    pub fn reflection_target(&self) -> Option<BattlerId> {
        self.reflection_target
    }

    pub fn set_reflection_target(&mut self, target: BattlerId) {
        self.reflection_target = Some(target);
    }

    // --- ITEM QUERIES ---

    pub fn usable<'a>(&self, db: &'a Database) -> Option<UsableRef<'a>> {
        self.item.and_then(|item| db.usable(item))
    }

    pub fn usage<'a>(&self, db: &'a Database) -> Option<&'a Usage> {
        self.usable(db).map(|usable| usable.usage())
    }

    pub fn item_name(&self, db: &Database) -> String {
        self.usable(db)
            .map(|usable| usable.name().to_string())
            .unwrap_or_default()
    }

    pub fn is_skill(&self) -> bool {
        matches!(self.item, Some(UsableItem::Skill(_)))
    }

    pub fn is_item(&self) -> bool {
        matches!(self.item, Some(UsableItem::Item(_)))
    }

    pub fn is_attack(&self, db: &Database) -> bool {
        self.item == Some(UsableItem::Skill(db.system.attack_skill_id))
    }

    pub fn is_guard(&self, db: &Database) -> bool {
        self.item == Some(UsableItem::Skill(db.system.guard_skill_id))
    }

    pub fn scope(&self, db: &Database) -> Scope {
        self.usage(db).map(|usage| usage.scope).unwrap_or_default()
    }

    fn hit_type(&self, db: &Database) -> HitType {
        self.usage(db).map(|usage| usage.hit_type).unwrap_or_default()
    }

    fn damage_type(&self, db: &Database) -> DamageType {
        self.usage(db)
            .map(|usage| usage.damage.kind)
            .unwrap_or_default()
    }

    pub fn is_certain_hit(&self, db: &Database) -> bool {
        self.hit_type(db) == HitType::CertainHit
    }

    pub fn is_physical(&self, db: &Database) -> bool {
        self.hit_type(db) == HitType::Physical
    }

    pub fn is_magical(&self, db: &Database) -> bool {
        self.hit_type(db) == HitType::Magical
    }

    pub fn is_drain(&self, db: &Database) -> bool {
        self.damage_type(db).is_drain()
    }

    pub fn num_repeats(&self, ctx: &BattleContext) -> usize {
        let db = &*ctx.db;
        let mut repeats = self.usage(db).map(|usage| usage.repeats).unwrap_or(1);
        if self.is_attack(db) {
            if let Some(subject) = ctx.battler(self.subject) {
                repeats += subject.attack_times_add(db);
            }
        }
        repeats.max(1) as usize
    }

    // --- PREPARATION ---

    /// Confused subjects lose their chosen action to a normal attack unless
    /// the action is forced.
    pub fn prepare(&mut self, ctx: &BattleContext) {
        let confused = ctx
            .battler(self.subject)
            .is_some_and(|subject| subject.is_confused(&ctx.db));
        if confused && !self.forcing {
            self.set_confusion(&ctx.db);
        }
    }

    pub fn is_valid(&self, ctx: &BattleContext) -> bool {
        let Some(item) = self.item else {
            return false;
        };
        if self.forcing {
            return true;
        }
        ctx.battler(self.subject).is_some_and(|subject| {
            subject.can_use(&ctx.db, item, ctx.in_battle, ctx.party.inventory())
        })
    }

    /// `agi + random(floor(5 + agi / 4)) + item speed`, plus attack speed for
    /// normal attacks.
    pub fn speed(&self, ctx: &mut BattleContext) -> f64 {
        let db = Arc::clone(&ctx.db);
        let Some(subject) = ctx.battler(self.subject) else {
            return 0.0;
        };
        let agi = subject.agi(&db);
        let attack_speed = subject.attack_speed(&db);
        let jitter_range = (5.0 + agi as f64 / 4.0).floor().max(0.0) as u32;
        let mut speed = agi as f64 + ctx.rng.random_int(jitter_range, "speed") as f64;
        if let Some(usage) = self.usage(&db) {
            speed += usage.speed as f64;
        }
        if self.is_attack(&db) {
            speed += attack_speed;
        }
        speed
    }

    // --- TARGETING ---

    pub fn make_targets(&self, ctx: &mut BattleContext) -> Vec<BattlerId> {
        let db = Arc::clone(&ctx.db);
        let confused = ctx
            .battler(self.subject)
            .is_some_and(|subject| subject.is_confused(&db));
        let scope = self.scope(&db);
        let targets = if !self.forcing && confused {
            self.confusion_target(ctx).into_iter().collect()
        } else if scope.is_for_opponent() {
            self.targets_for_opponents(ctx, scope)
        } else if scope.is_for_friend() {
            self.targets_for_friends(ctx, scope)
        } else {
            Vec::new()
        };
        self.repeat_targets(ctx, targets)
    }

    fn repeat_targets(&self, ctx: &BattleContext, targets: Vec<BattlerId>) -> Vec<BattlerId> {
        let repeats = self.num_repeats(ctx);
        targets
            .into_iter()
            .flat_map(|target| std::iter::repeat(target).take(repeats))
            .collect()
    }

    fn confusion_target(&self, ctx: &mut BattleContext) -> Option<BattlerId> {
        let db = &*ctx.db;
        let level = ctx
            .battler(self.subject)
            .map(|subject| subject.confusion_level(db))
            .unwrap_or(0);
        let side = self.subject.side();
        let hits_opponent = match level {
            1 => true,
            2 => ctx.rng.random_int(2, "confusion side") == 0,
            _ => false,
        };
        let side = if hits_opponent { side.opponent() } else { side };
        unit_in(&ctx.party, &ctx.troop, side).random_target(db, &mut ctx.rng)
    }

    fn targets_for_opponents(&self, ctx: &mut BattleContext, scope: Scope) -> Vec<BattlerId> {
        let db = &*ctx.db;
        let unit = unit_in(&ctx.party, &ctx.troop, self.subject.side().opponent());
        if scope.is_for_random() {
            (0..scope.num_random_targets())
                .filter_map(|_| unit.random_target(db, &mut ctx.rng))
                .collect()
        } else if scope.is_for_one() {
            let target = match self.target_index {
                None => unit.random_target(db, &mut ctx.rng),
                Some(index) => unit.smooth_target(db, Some(index)),
            };
            target.into_iter().collect()
        } else {
            unit.alive_ids(db)
        }
    }

    fn targets_for_friends(&self, ctx: &mut BattleContext, scope: Scope) -> Vec<BattlerId> {
        let db = &*ctx.db;
        let unit = unit_in(&ctx.party, &ctx.troop, self.subject.side());
        if scope.is_for_user() {
            vec![self.subject]
        } else if scope.is_for_dead_friend() {
            if scope.is_for_one() {
                unit.smooth_dead_target(db, self.target_index)
                    .into_iter()
                    .collect()
            } else {
                unit.dead_ids(db)
            }
        } else if scope.is_for_one() {
            let target = match self.target_index {
                None => unit.random_target(db, &mut ctx.rng),
                Some(index) => unit.smooth_target(db, Some(index)),
            };
            target.into_iter().collect()
        } else {
            unit.alive_ids(db)
        }
    }

    /// Picks a target index at random for an action that has none. Clears
    /// the action when there is nobody to target.
    pub fn decide_random_target(&mut self, ctx: &mut BattleContext) {
        let db = &*ctx.db;
        let scope = self.scope(db);
        let side = self.subject.side();
        let friends = unit_in(&ctx.party, &ctx.troop, side);
        let target = if scope.is_for_dead_friend() {
            friends.random_dead_target(db, &mut ctx.rng)
        } else if scope.is_for_friend() {
            friends.random_target(db, &mut ctx.rng)
        } else {
            unit_in(&ctx.party, &ctx.troop, side.opponent()).random_target(db, &mut ctx.rng)
        };
        match target {
            Some(id) => self.target_index = Some(id.index()),
            None => self.clear(),
        }
    }

    // --- EVALUATION ---

    fn target_candidates(&self, ctx: &BattleContext) -> Vec<BattlerId> {
        if !self.is_valid(ctx) {
            return Vec::new();
        }
        let db = &*ctx.db;
        let scope = self.scope(db);
        if scope.is_for_opponent() {
            ctx.opponents_unit(self.subject).alive_ids(db)
        } else if scope.is_for_user() {
            vec![self.subject]
        } else if scope.is_for_dead_friend() {
            ctx.friends_unit(self.subject).dead_ids(db)
        } else {
            ctx.friends_unit(self.subject).alive_ids(db)
        }
    }

    /// Heuristic worth of the action for automatic play. Single-target
    /// actions also remember the best target.
    pub fn evaluate(&mut self, ctx: &mut BattleContext) -> f64 {
        let db = Arc::clone(&ctx.db);
        let for_all = self.scope(&db).is_for_all();
        let mut value: f64 = 0.0;
        for target in self.target_candidates(ctx) {
            let target_value = self.evaluate_with_target(ctx, target);
            if for_all {
                value += target_value;
            } else if target_value > value {
                value = target_value;
                self.target_index = Some(target.index());
            }
        }
        value *= self.num_repeats(ctx) as f64;
        if value > 0.0 {
            value += ctx.rng.next_f64("evaluation tiebreak");
        }
        value
    }

    fn evaluate_with_target(&self, ctx: &mut BattleContext, target: BattlerId) -> f64 {
        let db = Arc::clone(&ctx.db);
        if !self.damage_type(&db).is_hp_effect() {
            return 0.0;
        }
        let value = self.make_damage_value(ctx, target, false) as f64;
        let Some(battler) = ctx.battler(target) else {
            return 0.0;
        };
        if self.scope(&db).is_for_opponent() {
            value / battler.hp().max(1) as f64
        } else {
            let mhp = battler.mhp(&db).max(1);
            let recovery = (-value).min((mhp - battler.hp()) as f64);
            recovery / mhp as f64
        }
    }

    // --- APPLICABILITY ---

    pub fn test_apply(&self, ctx: &BattleContext, target: BattlerId) -> bool {
        let db = &*ctx.db;
        let (Some(usage), Some(battler)) = (self.usage(db), ctx.battler(target)) else {
            return false;
        };
        let kind = usage.damage.kind;
        usage.scope.is_for_dead_friend() == battler.is_dead(db)
            && (ctx.in_battle
                || usage.scope.is_for_opponent()
                || (kind == DamageType::HpRecover && battler.hp() < battler.mhp(db))
                || (kind == DamageType::MpRecover && battler.mp() < battler.mmp(db))
                || self.has_item_any_valid_effects(ctx, target))
    }

    fn has_item_any_valid_effects(&self, ctx: &BattleContext, target: BattlerId) -> bool {
        let db = &*ctx.db;
        self.usage(db).is_some_and(|usage| {
            usage
                .effects
                .iter()
                .any(|effect| self.test_item_effect(ctx, target, effect))
        })
    }

    pub fn test_item_effect(&self, ctx: &BattleContext, target: BattlerId, effect: &Effect) -> bool {
        let db = &*ctx.db;
        let Some(battler) = ctx.battler(target) else {
            return false;
        };
        let param = Param::from_index(effect.data_id as usize);
        match effect.code {
            EffectCode::RecoverHp => {
                battler.hp() < battler.mhp(db) || effect.value1 < 0.0 || effect.value2 < 0.0
            }
            EffectCode::RecoverMp => {
                battler.mp() < battler.mmp(db) || effect.value1 < 0.0 || effect.value2 < 0.0
            }
            EffectCode::AddState => !battler.is_state_affected(effect.data_id),
            EffectCode::RemoveState => battler.is_state_affected(effect.data_id),
            EffectCode::AddBuff => param.is_some_and(|p| !battler.is_max_buff_affected(p)),
            EffectCode::AddDebuff => param.is_some_and(|p| !battler.is_max_debuff_affected(p)),
            EffectCode::RemoveBuff => param.is_some_and(|p| battler.is_buff_affected(p)),
            EffectCode::RemoveDebuff => param.is_some_and(|p| battler.is_debuff_affected(p)),
            EffectCode::LearnSkill => battler
                .as_actor()
                .is_some_and(|actor| !actor.is_learned_skill(effect.data_id)),
            _ => true,
        }
    }

    // --- RATES ---

    /// Counterattack rate; only physical actions against a target that can
    /// move are countered.
    pub fn item_cnt(&self, ctx: &BattleContext, target: BattlerId) -> f64 {
        let db = &*ctx.db;
        match ctx.battler(target) {
            Some(battler) if self.is_physical(db) && battler.can_move(db) => {
                battler.xparam(db, XParam::Cnt)
            }
            _ => 0.0,
        }
    }

    /// Magic reflection rate; only magical actions are reflected.
    pub fn item_mrf(&self, ctx: &BattleContext, target: BattlerId) -> f64 {
        let db = &*ctx.db;
        match ctx.battler(target) {
            Some(battler) if self.is_magical(db) => battler.xparam(db, XParam::Mrf),
            _ => 0.0,
        }
    }

    pub fn item_hit(&self, ctx: &BattleContext) -> f64 {
        let db = &*ctx.db;
        let success_rate = self.usage(db).map(|u| u.success_rate).unwrap_or(0.0) * 0.01;
        if self.is_physical(db) {
            let hit = ctx
                .battler(self.subject)
                .map(|subject| subject.xparam(db, XParam::Hit))
                .unwrap_or(0.0);
            success_rate * hit
        } else {
            success_rate
        }
    }

    pub fn item_eva(&self, ctx: &BattleContext, target: BattlerId) -> f64 {
        let db = &*ctx.db;
        let Some(battler) = ctx.battler(target) else {
            return 0.0;
        };
        match self.hit_type(db) {
            HitType::Physical => battler.xparam(db, XParam::Eva),
            HitType::Magical => battler.xparam(db, XParam::Mev),
            HitType::CertainHit => 0.0,
        }
    }

    pub fn item_cri(&self, ctx: &BattleContext, target: BattlerId) -> f64 {
        let db = &*ctx.db;
        let can_crit = self.usage(db).is_some_and(|u| u.damage.critical);
        match (ctx.battler(self.subject), ctx.battler(target)) {
            (Some(subject), Some(battler)) if can_crit => {
                subject.xparam(db, XParam::Cri) * (1.0 - battler.xparam(db, XParam::Cev))
            }
            _ => 0.0,
        }
    }

    fn luk_effect_rate(&self, ctx: &BattleContext, target: BattlerId) -> f64 {
        let db = &*ctx.db;
        match (ctx.battler(self.subject), ctx.battler(target)) {
            (Some(subject), Some(battler)) => {
                (1.0 + (subject.luk(db) - battler.luk(db)) as f64 * 0.001).max(0.0)
            }
            _ => 1.0,
        }
    }

    // --- APPLICATION ---

    /// Runs the full per-target pipeline: applicability, hit, evasion,
    /// critical and damage, then every effect, then the user effect.
    pub fn apply(&self, ctx: &mut BattleContext, target: BattlerId) {
        let db = Arc::clone(&ctx.db);
        let Some(usage) = self.usage(&db) else {
            warn!(subject = %self.subject, "applying an action with no item");
            return;
        };
        if let Some(subject) = ctx.battler_mut(self.subject) {
            subject.clear_result();
        }
        match ctx.battler_mut(target) {
            Some(battler) => battler.clear_result(),
            None => return,
        }

        let used = self.test_apply(ctx, target);
        let missed = used && {
            let hit = self.item_hit(ctx);
            !ctx.rng.chance(hit, "hit")
        };
        let evaded = used && !missed && {
            let eva = self.item_eva(ctx, target);
            ctx.rng.chance(eva, "evasion")
        };
        let physical = self.is_physical(&db);
        let drain = self.is_drain(&db);
        if let Some(battler) = ctx.battler_mut(target) {
            let result = battler.result_mut();
            result.used = used;
            result.missed = missed;
            result.evaded = evaded;
            result.physical = physical;
            result.drain = drain;
        }
        if !(used && !missed && !evaded) {
            return;
        }

        if usage.damage.kind != DamageType::None {
            let cri = self.item_cri(ctx, target);
            let critical = ctx.rng.chance(cri, "critical");
            if let Some(battler) = ctx.battler_mut(target) {
                battler.result_mut().critical = critical;
            }
            let value = self.make_damage_value(ctx, target, critical);
            self.execute_damage(ctx, target, value);
        }
        for effect in &usage.effects {
            self.apply_item_effect(ctx, target, effect);
        }
        self.apply_item_user_effect(ctx);
    }

    /// Emits one reservation per common-event effect; runs once per action,
    /// not per target.
    pub fn apply_global(&self, ctx: &mut BattleContext) {
        let db = Arc::clone(&ctx.db);
        let Some(usage) = self.usage(&db) else {
            return;
        };
        for effect in usage.effects.iter().filter(|e| e.code == EffectCode::CommonEvent) {
            ctx.bus.push(BattleEvent::CommonEventReserved {
                event_id: effect.data_id,
            });
        }
    }

    // --- DAMAGE ---

    pub fn make_damage_value(&self, ctx: &mut BattleContext, target: BattlerId, critical: bool) -> i32 {
        let db = Arc::clone(&ctx.db);
        let Some(usage) = self.usage(&db) else {
            return 0;
        };
        let base = self.eval_damage_formula(ctx, target);
        let Some(battler) = ctx.battler(target) else {
            return 0;
        };
        let mut value = base * self.calc_element_rate(ctx, target);
        if self.is_physical(&db) {
            value *= battler.sparam(&db, SParam::Pdr);
        }
        if self.is_magical(&db) {
            value *= battler.sparam(&db, SParam::Mdr);
        }
        if base < 0.0 {
            value *= battler.sparam(&db, SParam::Rec);
        }
        let guarding = battler.is_guard(&db);
        let grd = battler.sparam(&db, SParam::Grd);
        if critical {
            value = Self::apply_critical(value);
        }
        value = Self::apply_variance(&mut ctx.rng, value, usage.damage.variance);
        if value > 0.0 && guarding {
            value /= 2.0 * grd;
        }
        value.round() as i32
    }

    /// `max(formula, 0) * sign`. A formula that fails to parse or evaluate
    /// counts as 0.
    fn eval_damage_formula(&self, ctx: &mut BattleContext, target: BattlerId) -> f64 {
        let db = &*ctx.db;
        let Some(usage) = self.usage(db) else {
            return 0.0;
        };
        let (Some(subject), Some(target_battler)) = (
            battler_in(&ctx.party, &ctx.troop, self.subject),
            battler_in(&ctx.party, &ctx.troop, target),
        ) else {
            return 0.0;
        };
        let mut scope = DamageScope {
            db,
            subject,
            target: target_battler,
            variables: &ctx.variables,
            rng: &mut ctx.rng,
        };
        match usage.damage.formula.evaluate(&mut scope) {
            Ok(value) => value.max(0.0) * usage.damage.kind.sign(),
            Err(err) => {
                warn!(
                    formula = usage.damage.formula.source(),
                    %err,
                    "damage formula failed, treating as 0"
                );
                0.0
            }
        }
    }

    fn calc_element_rate(&self, ctx: &BattleContext, target: BattlerId) -> f64 {
        let db = &*ctx.db;
        let Some(usage) = self.usage(db) else {
            return 1.0;
        };
        let Some(battler) = ctx.battler(target) else {
            return 1.0;
        };
        match usage.damage.element {
            Element::NormalAttack => {
                let elements = ctx
                    .battler(self.subject)
                    .map(|subject| subject.attack_elements(db))
                    .unwrap_or_default();
                elements
                    .iter()
                    .map(|element| battler.element_rate(db, *element))
                    .reduce(f64::max)
                    .unwrap_or(1.0)
            }
            Element::None => 1.0,
            Element::Fixed(element) => battler.element_rate(db, element),
        }
    }

    fn apply_critical(damage: f64) -> f64 {
        damage * CRITICAL_MULTIPLIER
    }

    /// Adds `random(amp + 1) + random(amp + 1) - amp` away from zero, where
    /// `amp = floor(|damage| * variance / 100)`.
    fn apply_variance(rng: &mut TurnRng, damage: f64, variance: u32) -> f64 {
        let amp = (damage.abs() * variance as f64 / 100.0).floor().max(0.0) as u32;
        let v = rng.random_int(amp + 1, "variance") as f64
            + rng.random_int(amp + 1, "variance") as f64
            - amp as f64;
        if damage >= 0.0 {
            damage + v
        } else {
            damage - v
        }
    }

    fn execute_damage(&self, ctx: &mut BattleContext, target: BattlerId, value: i32) {
        let kind = self.damage_type(&ctx.db);
        if value == 0 {
            if let Some(battler) = ctx.battler_mut(target) {
                battler.result_mut().critical = false;
            }
        }
        if kind.is_hp_effect() {
            self.execute_hp_damage(ctx, target, value);
        }
        if kind.is_mp_effect() {
            self.execute_mp_damage(ctx, target, value);
        }
    }

    fn execute_hp_damage(&self, ctx: &mut BattleContext, target: BattlerId, value: i32) {
        let drain = self.is_drain(&ctx.db);
        let Some((battler, db, rng)) = ctx.split(target) else {
            return;
        };
        let value = if drain { value.min(battler.hp()) } else { value };
        battler.result_mut().success = true;
        battler.gain_hp(db, -value);
        if value > 0 {
            battler.on_damage(db, rng, value);
        }
        if drain {
            self.gain_drained(ctx, value, Resource::Hp);
        }
    }

    fn execute_mp_damage(&self, ctx: &mut BattleContext, target: BattlerId, value: i32) {
        let db = Arc::clone(&ctx.db);
        let recover = self.damage_type(&db) == DamageType::MpRecover;
        let drain = self.is_drain(&db);
        let Some(battler) = ctx.battler_mut(target) else {
            return;
        };
        let value = if recover { value } else { value.min(battler.mp()) };
        if value != 0 {
            battler.result_mut().success = true;
        }
        battler.gain_mp(&db, -value);
        if drain {
            self.gain_drained(ctx, value, Resource::Mp);
        }
    }

    /// Drained points go to the reflector of a reflected action, otherwise to
    /// the subject.
    fn gain_drained(&self, ctx: &mut BattleContext, value: i32, resource: Resource) {
        let receiver = self.reflection_target.unwrap_or(self.subject);
        let db = Arc::clone(&ctx.db);
        let Some(battler) = ctx.battler_mut(receiver) else {
            return;
        };
        let event = match resource {
            Resource::Hp => {
                battler.gain_hp(&db, value);
                BattleEvent::HpChanged {
                    target: receiver,
                    target_name: battler.name(),
                    damage: -value,
                    drain: false,
                    hp: battler.hp(),
                }
            }
            Resource::Mp => {
                battler.gain_mp(&db, value);
                BattleEvent::MpChanged {
                    target: receiver,
                    target_name: battler.name(),
                    damage: -value,
                    drain: false,
                    mp: battler.mp(),
                }
            }
        };
        debug!(%receiver, value, "drained points credited");
        ctx.bus.push(event);
    }

    // --- EFFECTS ---

    fn apply_item_effect(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        match effect.code {
            EffectCode::RecoverHp => self.item_effect_recover(ctx, target, effect, Resource::Hp),
            EffectCode::RecoverMp => self.item_effect_recover(ctx, target, effect, Resource::Mp),
            EffectCode::GainTp => self.item_effect_gain_tp(ctx, target, effect),
            EffectCode::AddState => {
                if effect.data_id == 0 {
                    self.item_effect_add_attack_state(ctx, target, effect);
                } else {
                    self.item_effect_add_normal_state(ctx, target, effect);
                }
            }
            EffectCode::RemoveState => self.item_effect_remove_state(ctx, target, effect),
            EffectCode::AddBuff
            | EffectCode::AddDebuff
            | EffectCode::RemoveBuff
            | EffectCode::RemoveDebuff => self.item_effect_buff(ctx, target, effect),
            EffectCode::Special => self.item_effect_special(ctx, target, effect),
            EffectCode::Grow => self.item_effect_grow(ctx, target, effect),
            EffectCode::LearnSkill => self.item_effect_learn_skill(ctx, target, effect),
            // Reserved once per action by `apply_global`.
            EffectCode::CommonEvent => {}
        }
    }

    fn make_success(ctx: &mut BattleContext, target: BattlerId) {
        if let Some(battler) = ctx.battler_mut(target) {
            battler.result_mut().success = true;
        }
    }

    fn item_effect_recover(
        &self,
        ctx: &mut BattleContext,
        target: BattlerId,
        effect: &Effect,
        resource: Resource,
    ) {
        let db = Arc::clone(&ctx.db);
        let pha = if self.is_item() {
            ctx.battler(self.subject)
                .map(|subject| subject.sparam(&db, SParam::Pha))
                .unwrap_or(1.0)
        } else {
            1.0
        };
        let Some(battler) = ctx.battler_mut(target) else {
            return;
        };
        let max = match resource {
            Resource::Hp => battler.mhp(&db),
            Resource::Mp => battler.mmp(&db),
        } as f64;
        let rec = battler.sparam(&db, SParam::Rec);
        let value = ((max * effect.value1 + effect.value2) * rec * pha).floor() as i32;
        if value != 0 {
            match resource {
                Resource::Hp => battler.gain_hp(&db, value),
                Resource::Mp => battler.gain_mp(&db, value),
            }
            battler.result_mut().success = true;
        }
    }

    fn item_effect_gain_tp(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        let db = Arc::clone(&ctx.db);
        let value = effect.value1.floor() as i32;
        if value == 0 {
            return;
        }
        if let Some(battler) = ctx.battler_mut(target) {
            battler.gain_tp(&db, value);
            battler.result_mut().success = true;
        }
    }

    fn item_effect_add_attack_state(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        let db = Arc::clone(&ctx.db);
        let luk_rate = self.luk_effect_rate(ctx, target);
        let attack_states: Vec<(u32, f64)> = match ctx.battler(self.subject) {
            Some(subject) => subject
                .attack_states(&db)
                .into_iter()
                .map(|state_id| (state_id, subject.attack_states_rate(&db, state_id)))
                .collect(),
            None => return,
        };
        for (state_id, attack_rate) in attack_states {
            let state_rate = ctx
                .battler(target)
                .map(|battler| battler.state_rate(&db, state_id))
                .unwrap_or(0.0);
            let chance = effect.value1 * state_rate * attack_rate * luk_rate;
            if ctx.rng.chance(chance, "attack state") {
                if let Some((battler, db, rng)) = ctx.split(target) {
                    battler.add_state(db, rng, state_id);
                }
                Self::make_success(ctx, target);
            }
        }
    }

    fn item_effect_add_normal_state(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        let db = Arc::clone(&ctx.db);
        let mut chance = effect.value1;
        if !self.is_certain_hit(&db) {
            let state_rate = ctx
                .battler(target)
                .map(|battler| battler.state_rate(&db, effect.data_id))
                .unwrap_or(0.0);
            chance *= state_rate * self.luk_effect_rate(ctx, target);
        }
        if ctx.rng.chance(chance, "add state") {
            if let Some((battler, db, rng)) = ctx.split(target) {
                battler.add_state(db, rng, effect.data_id);
            }
            Self::make_success(ctx, target);
        }
    }

    fn item_effect_remove_state(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        if ctx.rng.chance(effect.value1, "remove state") {
            let db = Arc::clone(&ctx.db);
            if let Some(battler) = ctx.battler_mut(target) {
                battler.remove_state(&db, effect.data_id);
                battler.result_mut().success = true;
            }
        }
    }

    fn item_effect_buff(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        let db = Arc::clone(&ctx.db);
        let Some(param) = Param::from_index(effect.data_id as usize) else {
            warn!(data_id = effect.data_id, "buff effect names no parameter");
            return;
        };
        let turns = effect.value1.max(0.0) as u32;
        match effect.code {
            EffectCode::AddBuff => {
                if let Some(battler) = ctx.battler_mut(target) {
                    battler.add_buff(&db, param, turns);
                    battler.result_mut().success = true;
                }
            }
            EffectCode::AddDebuff => {
                let debuff_rate = ctx
                    .battler(target)
                    .map(|battler| battler.debuff_rate(&db, param))
                    .unwrap_or(0.0);
                let chance = debuff_rate * self.luk_effect_rate(ctx, target);
                if ctx.rng.chance(chance, "add debuff") {
                    if let Some(battler) = ctx.battler_mut(target) {
                        battler.add_debuff(&db, param, turns);
                        battler.result_mut().success = true;
                    }
                }
            }
            EffectCode::RemoveBuff | EffectCode::RemoveDebuff => {
                let want_buff = effect.code == EffectCode::RemoveBuff;
                if let Some(battler) = ctx.battler_mut(target) {
                    let affected = if want_buff {
                        battler.is_buff_affected(param)
                    } else {
                        battler.is_debuff_affected(param)
                    };
                    if affected {
                        battler.remove_buff(&db, param);
                        battler.result_mut().success = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn item_effect_special(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        if effect.data_id != SPECIAL_EFFECT_ESCAPE {
            return;
        }
        let in_battle = ctx.in_battle;
        if let Some(battler) = ctx.battler_mut(target) {
            battler.escape(in_battle);
            battler.result_mut().success = true;
        }
    }

    fn item_effect_grow(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        let db = Arc::clone(&ctx.db);
        let Some(param) = Param::from_index(effect.data_id as usize) else {
            return;
        };
        if let Some(battler) = ctx.battler_mut(target) {
            battler.add_param(&db, param, effect.value1.floor());
            battler.result_mut().success = true;
        }
    }

    fn item_effect_learn_skill(&self, ctx: &mut BattleContext, target: BattlerId, effect: &Effect) {
        if let Some(battler) = ctx.battler_mut(target) {
            if let Some(actor) = battler.as_actor_mut() {
                actor.learn_skill(effect.data_id);
            }
            battler.result_mut().success = true;
        }
    }

    fn apply_item_user_effect(&self, ctx: &mut BattleContext) {
        let db = Arc::clone(&ctx.db);
        let tp_gain = self.usage(&db).map(|u| u.tp_gain).unwrap_or(0);
        if let Some(subject) = ctx.battler_mut(self.subject) {
            let value = (tp_gain as f64 * subject.sparam(&db, SParam::Tcr)).floor() as i32;
            subject.gain_silent_tp(&db, value);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Resource {
    Hp,
    Mp,
}
