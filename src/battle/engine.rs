//! The battle-wide state machine: setup, command input, turn sequencing,
//! action delivery, forced actions, escape and the end-of-battle paths.
//!
//! The host drives everything through [`BattleManager::update`], one tick
//! at a time. Nothing blocks: a tick that has nothing to do (host busy,
//! waiting for commands) simply returns.

use crate::battle::action::{Action, ForcedTarget};
use crate::battle::ai::{make_actions, Behavior};
use crate::battle::context::{battler_in, BattleContext};
use crate::battle::phase::Phase;
use crate::battle::rewards::{BattleOutcome, Rewards};
use crate::battle::state::{AudioCue, BattleEvent, SceneRequest};
use crate::battle::turn_order::make_action_orders;
use crate::battler::{ActionResult, Battler, BattlerId, BattlerStatus, BattlerTraits};
use crate::database::{Database, UsableRef};
use crate::errors::{ActionError, BattleResult, BattleStateError, DataError};
use crate::unit::Unit;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the engine asks of the scene around it.
pub trait BattleHost {
    /// Presentation still running; the tick is skipped.
    fn is_busy(&self) -> bool {
        false
    }

    /// A battle event script is running; phase dispatch waits for it.
    fn is_event_running(&self) -> bool {
        false
    }
}

/// A host that never waits. Used headless and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl BattleHost for NullHost {}

pub struct BattleManager {
    ctx: BattleContext,
    host: Box<dyn BattleHost>,
    phase: Phase,
    can_escape: bool,
    can_lose: bool,
    preemptive: bool,
    surprise: bool,
    escape_ratio: f64,
    escaped: bool,
    actor_index: Option<usize>,
    action_forced_battler: Option<BattlerId>,
    interrupted_subject: Option<BattlerId>,
    turn_forced: bool,
    action_battlers: VecDeque<BattlerId>,
    subject: Option<BattlerId>,
    action: Option<Action>,
    targets: VecDeque<BattlerId>,
    rewards: Rewards,
    outcome: Option<BattleOutcome>,
}

impl BattleManager {
    pub fn new(ctx: BattleContext) -> Self {
        Self::with_host(ctx, Box::new(NullHost))
    }

    pub fn with_host(ctx: BattleContext, host: Box<dyn BattleHost>) -> Self {
        Self {
            ctx,
            host,
            phase: Phase::Idle,
            can_escape: false,
            can_lose: false,
            preemptive: false,
            surprise: false,
            escape_ratio: 0.0,
            escaped: false,
            actor_index: None,
            action_forced_battler: None,
            interrupted_subject: None,
            turn_forced: false,
            action_battlers: VecDeque::new(),
            subject: None,
            action: None,
            targets: VecDeque::new(),
            rewards: Rewards::default(),
            outcome: None,
        }
    }

    // --- QUERIES ---

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> &BattleContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut BattleContext {
        &mut self.ctx
    }

    pub fn events(&self) -> &[BattleEvent] {
        self.ctx.bus.events()
    }

    pub fn drain_events(&mut self) -> Vec<BattleEvent> {
        self.ctx.bus.drain()
    }

    pub fn is_busy(&self) -> bool {
        self.host.is_busy()
    }

    pub fn is_inputting(&self) -> bool {
        self.phase == Phase::Input
    }

    pub fn is_in_turn(&self) -> bool {
        self.phase == Phase::Turn
    }

    pub fn is_battle_end(&self) -> bool {
        self.phase == Phase::BattleEnd
    }

    pub fn is_preemptive(&self) -> bool {
        self.preemptive
    }

    pub fn is_surprise(&self) -> bool {
        self.surprise
    }

    pub fn is_escaped(&self) -> bool {
        self.escaped
    }

    pub fn is_forced_turn(&self) -> bool {
        self.turn_forced
    }

    pub fn escape_ratio(&self) -> f64 {
        self.escape_ratio
    }

    /// Spoils of the last victory; empty otherwise.
    pub fn rewards(&self) -> &Rewards {
        &self.rewards
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    /// Battlers still waiting for their go this turn.
    pub fn pending_subjects(&self) -> usize {
        self.action_battlers.len()
    }

    /// The battler whose action is being delivered, if any.
    pub fn subject(&self) -> Option<BattlerId> {
        self.subject
    }

    // --- SETUP ---

    /// Prepares a battle against `troop_id`. Allowed before the first
    /// battle and after the previous one has finished.
    pub fn setup(&mut self, troop_id: u32, can_escape: bool, can_lose: bool) -> BattleResult<()> {
        if !self.phase.can_transition_to(Phase::Init) {
            return Err(self.illegal(Phase::Init));
        }
        let db = Arc::clone(&self.ctx.db);
        self.ctx.troop.setup(&db, troop_id)?;

        self.can_escape = can_escape;
        self.can_lose = can_lose;
        self.preemptive = false;
        self.surprise = false;
        self.escaped = false;
        self.actor_index = None;
        self.action_forced_battler = None;
        self.interrupted_subject = None;
        self.turn_forced = false;
        self.action_battlers.clear();
        self.subject = None;
        self.action = None;
        self.targets.clear();
        self.rewards = Rewards::default();
        self.outcome = None;
        self.escape_ratio = self.make_escape_ratio(&db);

        info!(troop_id, can_escape, can_lose, "battle set up");
        self.change_phase(Phase::Init)
    }

    /// Rolls the preemptive and surprise flags for a random encounter.
    pub fn on_encounter(&mut self) -> BattleResult<()> {
        self.require_phase(Phase::Init)?;
        let db = Arc::clone(&self.ctx.db);
        let troop_agi = self.ctx.troop.agility(&db);
        let preemptive = self.ctx.party.rate_preemptive(&db, troop_agi);
        let surprise = self.ctx.party.rate_surprise(&db, troop_agi);
        self.preemptive = self.ctx.rng.chance(preemptive, "preemptive");
        self.surprise = !self.preemptive && self.ctx.rng.chance(surprise, "surprise");
        debug!(self.preemptive, self.surprise, "encounter rolled");
        Ok(())
    }

    fn make_escape_ratio(&self, db: &Database) -> f64 {
        let troop_agi = self.ctx.troop.agility(db);
        if troop_agi <= 0.0 {
            return 1.0;
        }
        (0.5 * self.ctx.party.agility(db) / troop_agi).max(0.0)
    }

    // --- PHASES ---

    fn illegal(&self, to: Phase) -> crate::errors::BattleEngineError {
        BattleStateError::IllegalTransition {
            from: self.phase,
            to,
        }
        .into()
    }

    fn change_phase(&mut self, to: Phase) -> BattleResult<()> {
        let from = self.phase;
        if !from.can_transition_to(to) {
            warn!(%from, %to, "illegal phase transition");
            return Err(self.illegal(to));
        }
        debug!(%from, %to, "phase change");
        self.phase = to;
        self.ctx.bus.push(BattleEvent::PhaseChanged { from, to });
        Ok(())
    }

    fn require_active(&self) -> BattleResult<()> {
        match self.phase {
            Phase::Idle => Err(BattleStateError::NotSetUp.into()),
            Phase::Finished => Err(BattleStateError::WrongPhase(Phase::Finished).into()),
            _ => Ok(()),
        }
    }

    fn require_phase(&self, phase: Phase) -> BattleResult<()> {
        self.require_active()?;
        if self.phase == phase {
            Ok(())
        } else {
            Err(BattleStateError::WrongPhase(self.phase).into())
        }
    }

    /// Advances the battle by one tick.
    ///
    /// Pending aborts and forced actions are serviced before the phase's
    /// own step. After the battle has finished this is a no-op.
    pub fn update(&mut self) -> BattleResult<()> {
        match self.phase {
            Phase::Idle => return Err(BattleStateError::NotSetUp.into()),
            Phase::Finished => return Ok(()),
            _ => {}
        }
        if self.host.is_busy() {
            return Ok(());
        }
        if self.phase == Phase::Init {
            return self.start_battle();
        }
        if self.update_event()? {
            return Ok(());
        }
        match self.phase {
            Phase::Start | Phase::TurnEnd => self.start_input(),
            Phase::Turn => self.update_turn(),
            Phase::Action => self.update_action(),
            Phase::BattleEnd => self.update_battle_end(),
            _ => Ok(()),
        }
    }

    /// Returns true when the tick was consumed.
    fn update_event(&mut self) -> BattleResult<bool> {
        match self.phase {
            Phase::Start | Phase::Turn | Phase::TurnEnd => {
                if self.action_forced_battler.is_some() {
                    self.process_forced_action()?;
                    Ok(true)
                } else if self.host.is_event_running() {
                    Ok(true)
                } else {
                    self.check_battle_end()
                }
            }
            _ => self.check_abort(),
        }
    }

    /// Requests an abort; honored at the next tick.
    pub fn abort(&mut self) -> BattleResult<()> {
        self.require_active()?;
        self.change_phase(Phase::Aborting)
    }

    // --- BATTLE START ---

    fn start_battle(&mut self) -> BattleResult<()> {
        self.change_phase(Phase::Start)?;
        let db = Arc::clone(&self.ctx.db);
        self.ctx.in_battle = true;
        for id in self.ctx.all_battle_members() {
            if let Some((battler, db, rng)) = self.ctx.split(id) {
                battler.on_battle_start(db, rng);
            }
        }

        let troop_id = self.ctx.troop.troop_id();
        info!(troop_id, "battle started");
        self.ctx.bus.push(BattleEvent::BattleStarted { troop_id });
        self.ctx.bus.push(BattleEvent::Audio(AudioCue::BattleBgm));
        for name in self.ctx.troop.enemy_names(&db) {
            self.ctx.bus.push(BattleEvent::EnemyEmerged { name });
        }
        if self.preemptive {
            self.ctx.bus.push(BattleEvent::Preemptive);
        } else if self.surprise {
            self.ctx.bus.push(BattleEvent::Surprise);
        }
        Ok(())
    }

    // --- INPUT ---

    fn start_input(&mut self) -> BattleResult<()> {
        self.change_phase(Phase::Input)?;
        for id in self.ctx.all_battle_members() {
            make_actions(&mut self.ctx, id);
        }
        self.actor_index = None;
        let db = Arc::clone(&self.ctx.db);
        if self.surprise || !self.ctx.party.can_input(&db) {
            self.start_turn()?;
        }
        Ok(())
    }

    /// The actor currently choosing a command.
    pub fn inputting_actor(&self) -> Option<BattlerId> {
        if self.phase != Phase::Input {
            return None;
        }
        self.actor_index.map(BattlerId::Actor)
    }

    pub fn inputting_action_mut(&mut self) -> BattleResult<&mut Action> {
        if self.phase != Phase::Input {
            return Err(ActionError::NotInputting.into());
        }
        self.actor_index
            .and_then(|index| self.ctx.party.actor_mut(index))
            .and_then(|actor| actor.inputting_action_mut())
            .ok_or_else(|| ActionError::NotInputting.into())
    }

    fn actor_can_input(&self, db: &Database) -> bool {
        self.actor_index
            .and_then(|index| self.ctx.party.actor(index))
            .is_some_and(|actor| actor.can_input(db))
    }

    /// Moves to the next command slot, or to the next actor who can input.
    /// Past the last actor the turn begins.
    pub fn select_next_command(&mut self) -> BattleResult<()> {
        self.require_phase(Phase::Input)?;
        let db = Arc::clone(&self.ctx.db);
        loop {
            let advanced = self
                .actor_index
                .and_then(|index| self.ctx.party.actor_mut(index))
                .is_some_and(|actor| actor.select_next_command());
            if !advanced {
                let next = self.actor_index.map_or(0, |index| index + 1);
                self.actor_index = Some(next);
                if next >= self.ctx.party.battle_member_count() {
                    return self.start_turn();
                }
            }
            if self.actor_can_input(&db) {
                return Ok(());
            }
        }
    }

    /// Moves back one command slot, or to the previous actor who can input.
    /// Before the first actor nobody is selected.
    pub fn select_previous_command(&mut self) -> BattleResult<()> {
        self.require_phase(Phase::Input)?;
        let db = Arc::clone(&self.ctx.db);
        loop {
            let moved = self
                .actor_index
                .and_then(|index| self.ctx.party.actor_mut(index))
                .is_some_and(|actor| actor.select_previous_command());
            if !moved {
                match self.actor_index {
                    Some(index) if index > 0 => self.actor_index = Some(index - 1),
                    _ => {
                        self.actor_index = None;
                        return Ok(());
                    }
                }
            }
            if self.actor_can_input(&db) {
                return Ok(());
            }
        }
    }

    /// Lets `behavior` fill every command the party would otherwise type in,
    /// then starts the turn.
    pub fn decide_party_actions(&mut self, behavior: &dyn Behavior) -> BattleResult<()> {
        self.require_phase(Phase::Input)?;
        let db = Arc::clone(&self.ctx.db);
        for id in self.ctx.party.member_ids() {
            let can_input = self.ctx.battler(id).is_some_and(|actor| actor.can_input(&db));
            if can_input {
                behavior.decide_actions(&mut self.ctx, id);
            }
        }
        self.start_turn()
    }

    // --- TURN ---

    fn start_turn(&mut self) -> BattleResult<()> {
        self.change_phase(Phase::Turn)?;
        self.actor_index = None;
        self.ctx.troop.increase_turn();
        self.action_battlers = make_action_orders(&mut self.ctx, self.surprise, self.preemptive);
        let turn_number = self.ctx.troop.turn_count();
        info!(turn_number, "turn started");
        self.ctx.bus.push(BattleEvent::TurnStarted { turn_number });
        Ok(())
    }

    fn update_turn(&mut self) -> BattleResult<()> {
        if self.subject.is_none() {
            self.subject = self.next_subject();
        }
        match self.subject {
            Some(subject) => self.process_turn(subject),
            None => self.end_turn(),
        }
    }

    fn is_eligible_subject(&self, id: BattlerId) -> bool {
        let in_formation = match id {
            BattlerId::Actor(index) => self.ctx.party.is_battle_member(index),
            BattlerId::Enemy(_) => true,
        };
        in_formation && self.ctx.battler(id).is_some_and(|battler| battler.is_alive(&self.ctx.db))
    }

    /// A subject cut off by a forced action goes first; then the queue,
    /// skipping the fallen.
    fn next_subject(&mut self) -> Option<BattlerId> {
        if let Some(id) = self.interrupted_subject.take() {
            if self.is_eligible_subject(id) {
                return Some(id);
            }
        }
        while let Some(id) = self.action_battlers.pop_front() {
            if self.is_eligible_subject(id) {
                return Some(id);
            }
        }
        None
    }

    fn process_turn(&mut self, subject: BattlerId) -> BattleResult<()> {
        let db = Arc::clone(&self.ctx.db);
        let action = self
            .ctx
            .battler_mut(subject)
            .and_then(|battler| battler.remove_current_action());
        match action {
            Some(mut action) => {
                action.prepare(&self.ctx);
                if action.is_valid(&self.ctx) {
                    self.start_action(action)?;
                } else {
                    debug!(%subject, "skipping invalid action");
                }
            }
            None => {
                if let Some(battler) = self.ctx.battler_mut(subject) {
                    battler.on_all_actions_end(&db);
                }
                self.emit_status_changes(subject);
                self.subject = self.next_subject();
            }
        }
        Ok(())
    }

    fn start_action(&mut self, action: Action) -> BattleResult<()> {
        let db = Arc::clone(&self.ctx.db);
        let subject = action.subject();
        let targets = action.make_targets(&mut self.ctx);
        self.change_phase(Phase::Action)?;
        self.use_item(subject, &action, &db);

        let item_name = action.item_name(&db);
        debug!(%subject, item = %item_name, targets = targets.len(), "action started");
        self.ctx.bus.push(BattleEvent::ActionStarted {
            subject,
            subject_name: self.ctx.battler_name(subject),
            item_name,
        });
        action.apply_global(&mut self.ctx);
        self.targets = targets.into();
        self.action = Some(action);
        Ok(())
    }

    /// Pays the skill cost, or uses up the item.
    fn use_item(&mut self, subject: BattlerId, action: &Action, db: &Database) {
        match action.usable(db) {
            Some(UsableRef::Skill(skill)) => {
                if let Some(battler) = self.ctx.battler_mut(subject) {
                    let mp = battler.mp() - battler.skill_mp_cost(db, skill);
                    battler.set_mp(db, mp);
                    let tp = battler.tp() - battler.skill_tp_cost(db, skill);
                    battler.set_tp(db, tp);
                }
            }
            Some(UsableRef::Item(item)) => {
                if subject.is_actor() {
                    self.ctx.party.inventory_mut().consume_item(db, item.id);
                }
            }
            None => {}
        }
    }

    fn update_action(&mut self) -> BattleResult<()> {
        match self.targets.pop_front() {
            Some(target) => {
                self.invoke_action(target);
                Ok(())
            }
            None => self.end_action(),
        }
    }

    fn end_action(&mut self) -> BattleResult<()> {
        self.action = None;
        self.change_phase(Phase::Turn)
    }

    /// Delivers the current action to one target. Exactly one of counter,
    /// reflection and normal application happens.
    fn invoke_action(&mut self, target: BattlerId) {
        let Some(action) = self.action.clone() else {
            return;
        };
        let subject = action.subject();
        let cnt = action.item_cnt(&self.ctx, target);
        if self.ctx.rng.chance(cnt, "counter") {
            self.invoke_counter_attack(subject, target);
        } else {
            let mrf = action.item_mrf(&self.ctx, target);
            if self.ctx.rng.chance(mrf, "reflection") {
                self.invoke_magic_reflection(&action, target);
            } else {
                self.invoke_normal_action(&action, target);
            }
        }
        if let Some(battler) = self.ctx.battler_mut(subject) {
            battler.set_last_target(target);
        }
    }

    fn invoke_counter_attack(&mut self, subject: BattlerId, target: BattlerId) {
        let db = Arc::clone(&self.ctx.db);
        let mut counter = Action::new(target, false);
        counter.set_attack(&db);
        self.ctx.bus.push(BattleEvent::Counterattack {
            battler: target,
            battler_name: self.ctx.battler_name(target),
        });
        counter.apply(&mut self.ctx, subject);
        self.emit_action_results(subject);
    }

    /// The action bounces back onto its own subject; drain still pays out
    /// to the battler that reflected it.
    fn invoke_magic_reflection(&mut self, action: &Action, target: BattlerId) {
        let mut reflected = action.clone();
        reflected.set_reflection_target(target);
        self.ctx.bus.push(BattleEvent::MagicReflection {
            battler: target,
            battler_name: self.ctx.battler_name(target),
        });
        self.invoke_normal_action(&reflected, action.subject());
    }

    fn invoke_normal_action(&mut self, action: &Action, target: BattlerId) {
        let real_target = self.apply_substitute(action, target);
        action.apply(&mut self.ctx, real_target);
        self.emit_action_results(real_target);
    }

    /// A dying target hit by anything but a certain-hit action may be
    /// covered by an ally with the substitute flag.
    fn apply_substitute(&mut self, action: &Action, target: BattlerId) -> BattlerId {
        let db = Arc::clone(&self.ctx.db);
        let dying = self.ctx.battler(target).is_some_and(|battler| battler.is_dying(&db));
        if !dying || action.is_certain_hit(&db) {
            return target;
        }
        match self.ctx.friends_unit(target).substitute_battler(&db) {
            Some(substitute) if substitute != target => {
                self.ctx.bus.push(BattleEvent::Substitute {
                    substitute,
                    substitute_name: self.ctx.battler_name(substitute),
                    target_name: self.ctx.battler_name(target),
                });
                substitute
            }
            _ => target,
        }
    }

    fn end_turn(&mut self) -> BattleResult<()> {
        self.change_phase(Phase::TurnEnd)?;
        self.preemptive = false;
        self.surprise = false;
        self.interrupted_subject = None;
        let db = Arc::clone(&self.ctx.db);
        for id in self.ctx.all_battle_members() {
            if let Some(battler) = self.ctx.battler_mut(id) {
                battler.on_turn_end(&db, self.turn_forced);
            }
            self.emit_status_changes(id);
        }
        let turn_number = self.ctx.troop.turn_count();
        self.ctx.bus.push(BattleEvent::TurnEnded { turn_number });
        self.turn_forced = false;
        Ok(())
    }

    // --- FORCED ACTIONS ---

    /// Makes `battler` use `skill_id` right away, ahead of the turn order.
    /// Returns false when the battler is dead and nothing was queued.
    pub fn force_action(&mut self, battler: BattlerId, skill_id: u32, target: ForcedTarget) -> BattleResult<bool> {
        self.require_active()?;
        let db = Arc::clone(&self.ctx.db);
        if db.skill(skill_id).is_none() {
            return Err(DataError::NotFound {
                kind: "skill",
                id: skill_id,
            }
            .into());
        }
        let Some(current) = self.ctx.battler(battler) else {
            return Err(BattleStateError::UnknownBattler(battler).into());
        };
        if current.is_death_state_affected(&db) {
            return Ok(false);
        }
        let last_target = current.last_target_index();

        let mut action = Action::new(battler, true);
        action.set_skill(skill_id);
        match target {
            ForcedTarget::Random => action.decide_random_target(&mut self.ctx),
            ForcedTarget::Last => {
                if let Some(index) = last_target {
                    action.set_target(index);
                }
            }
            ForcedTarget::Index(index) => action.set_target(index),
        }
        if let Some(forced) = self.ctx.battler_mut(battler) {
            forced.clear_actions();
            forced.push_action(action);
        }

        self.action_forced_battler = Some(battler);
        self.action_battlers.retain(|id| *id != battler);
        info!(%battler, skill_id, "action forced");
        Ok(true)
    }

    fn process_forced_action(&mut self) -> BattleResult<()> {
        let Some(forced) = self.action_forced_battler.take() else {
            return Ok(());
        };
        let Some(action) = self
            .ctx
            .battler_mut(forced)
            .and_then(|battler| battler.remove_current_action())
        else {
            debug!(?forced, "forced battler has no action left");
            return Ok(());
        };
        self.turn_forced = true;
        if let Some(current) = self.subject.filter(|current| *current != forced) {
            self.interrupted_subject = Some(current);
        }
        self.subject = Some(forced);
        self.start_action(action)
    }

    // --- ESCAPE ---

    /// One escape attempt from the command phase. A failure costs the party
    /// its turn and makes the next attempt easier.
    pub fn process_escape(&mut self) -> BattleResult<bool> {
        self.require_phase(Phase::Input)?;
        if !self.can_escape {
            return Err(ActionError::EscapeForbidden.into());
        }
        let db = Arc::clone(&self.ctx.db);
        self.ctx.bus.push(BattleEvent::Audio(AudioCue::Escape));
        let ratio = self.escape_ratio;
        let success = self.preemptive || self.ctx.rng.chance(ratio, "escape");
        self.ctx.bus.push(BattleEvent::EscapeAttempted { success, ratio });
        info!(success, ratio, "escape attempted");

        if success {
            self.escaped = true;
            self.process_abort(BattleOutcome::Escaped)?;
        } else {
            self.escape_ratio += db.system.escape_ratio_step;
            self.ctx.party.clear_actions();
            self.start_turn()?;
        }
        Ok(success)
    }

    // --- BATTLE END ---

    /// Returns true when the battle ended on this check.
    fn check_battle_end(&mut self) -> BattleResult<bool> {
        if self.check_abort()? {
            return Ok(true);
        }
        let db = Arc::clone(&self.ctx.db);
        if self.ctx.party.is_all_dead(&db) {
            self.process_defeat()?;
            return Ok(true);
        }
        if self.ctx.troop.is_all_dead(&db) {
            self.process_victory()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Returns true when the battle was aborted on this check.
    fn check_abort(&mut self) -> BattleResult<bool> {
        if matches!(self.phase, Phase::BattleEnd | Phase::Finished | Phase::Idle) {
            return Ok(false);
        }
        if self.ctx.party.is_empty() || self.phase == Phase::Aborting {
            self.ctx.bus.push(BattleEvent::Audio(AudioCue::Escape));
            self.escaped = true;
            self.process_abort(BattleOutcome::Aborted)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn remove_party_battle_states(&mut self, db: &Database) {
        for id in self.ctx.party.member_ids() {
            if let Some(actor) = self.ctx.battler_mut(id) {
                actor.remove_battle_states(db);
            }
        }
    }

    fn process_victory(&mut self) -> BattleResult<()> {
        let db = Arc::clone(&self.ctx.db);
        self.remove_party_battle_states(&db);
        self.ctx.bus.push(BattleEvent::Audio(AudioCue::VictoryMe));
        self.ctx.bus.push(BattleEvent::Audio(AudioCue::ReplayBgm));
        self.make_rewards(&db);
        self.ctx.bus.push(BattleEvent::Victory {
            rewards: self.rewards.clone(),
        });
        self.gain_rewards(&db);
        self.end_battle(BattleOutcome::Victory)
    }

    fn make_rewards(&mut self, db: &Database) {
        let gold_rate = if self.ctx.party.has_gold_double(db) { 2.0 } else { 1.0 };
        let drop_rate = if self.ctx.party.has_drop_item_double(db) { 2.0 } else { 1.0 };
        self.rewards = Rewards {
            gold: self.ctx.troop.gold_total(db, gold_rate),
            exp: self.ctx.troop.exp_total(db),
            items: self.ctx.troop.make_drop_items(db, &mut self.ctx.rng, drop_rate),
        };
        debug!(rewards = ?self.rewards, "rewards made");
    }

    fn gain_rewards(&mut self, db: &Database) {
        let exp = self.rewards.exp;
        for index in 0..self.ctx.party.size() {
            let is_battle_member = self.ctx.party.is_battle_member(index);
            let Some(actor) = self.ctx.party.actor_mut(index) else {
                continue;
            };
            let Some(level_up) = actor.gain_exp(db, exp, is_battle_member) else {
                continue;
            };
            let learned_skills = level_up
                .learned_skills
                .iter()
                .filter_map(|skill_id| db.skill(*skill_id))
                .map(|skill| skill.name.clone())
                .collect();
            let event = BattleEvent::LevelUp {
                actor: actor.id(),
                actor_name: actor.name(),
                level: level_up.level,
                learned_skills,
            };
            self.ctx.bus.push(event);
        }

        self.ctx.party.gain_gold(self.rewards.gold);
        for (kind, id) in &self.rewards.items {
            self.ctx.party.inventory_mut().gain(*kind, *id, 1);
        }
    }

    fn process_defeat(&mut self) -> BattleResult<()> {
        self.ctx.bus.push(BattleEvent::Defeat);
        self.ctx.bus.push(BattleEvent::Audio(AudioCue::DefeatMe));
        let bgm = if self.can_lose {
            AudioCue::ReplayBgm
        } else {
            AudioCue::StopBgm
        };
        self.ctx.bus.push(BattleEvent::Audio(bgm));
        self.end_battle(BattleOutcome::Defeat)
    }

    fn process_abort(&mut self, outcome: BattleOutcome) -> BattleResult<()> {
        let db = Arc::clone(&self.ctx.db);
        self.remove_party_battle_states(&db);
        self.ctx.bus.push(BattleEvent::Audio(AudioCue::ReplayBgm));
        self.end_battle(outcome)
    }

    fn end_battle(&mut self, outcome: BattleOutcome) -> BattleResult<()> {
        self.change_phase(Phase::BattleEnd)?;
        self.outcome = Some(outcome);
        info!(?outcome, "battle ended");
        self.ctx.bus.push(BattleEvent::BattleEnded { outcome });
        Ok(())
    }

    fn update_battle_end(&mut self) -> BattleResult<()> {
        let db = Arc::clone(&self.ctx.db);
        let scene = if !self.escaped && self.ctx.party.is_all_dead(&db) {
            if self.can_lose {
                self.ctx.party.revive_battle_members(&db);
                SceneRequest::PopBattle
            } else {
                SceneRequest::GameOver
            }
        } else {
            SceneRequest::PopBattle
        };
        self.ctx.bus.push(BattleEvent::Scene(scene));

        for index in 0..self.ctx.party.size() {
            if let Some(actor) = self.ctx.party.actor_mut(index) {
                actor.on_battle_end(&db);
            }
        }
        for id in self.ctx.troop.member_ids() {
            if let Some(enemy) = self.ctx.battler_mut(id) {
                enemy.on_battle_end(&db);
            }
        }
        self.ctx.in_battle = false;
        self.subject = None;
        self.action_battlers.clear();
        self.change_phase(Phase::Finished)
    }

    // --- EVENTS ---

    fn emit_action_results(&mut self, target: BattlerId) {
        let db = Arc::clone(&self.ctx.db);
        let Some(battler) = battler_in(&self.ctx.party, &self.ctx.troop, target) else {
            return;
        };
        let result = battler.result();
        if !result.used {
            return;
        }
        let name = battler.name();
        let mut events = Vec::new();
        if result.critical {
            events.push(BattleEvent::CriticalHit {
                target,
                target_name: name.clone(),
            });
        }
        if result.missed {
            events.push(BattleEvent::ActionMissed {
                target,
                target_name: name.clone(),
            });
        } else if result.evaded {
            events.push(BattleEvent::ActionEvaded {
                target,
                target_name: name.clone(),
            });
        } else {
            events.extend(damage_events(battler, result, result.hp_affected));
        }
        events.extend(status_events(&db, battler, result));
        if result.is_hit() && !result.success {
            events.push(BattleEvent::ActionFailed {
                target,
                target_name: name,
            });
        }
        for event in events {
            self.ctx.bus.push(event);
        }
    }

    /// Regeneration and automatic state/buff expiry, after an action list
    /// or a turn ends.
    fn emit_status_changes(&mut self, id: BattlerId) {
        let db = Arc::clone(&self.ctx.db);
        let Some(battler) = battler_in(&self.ctx.party, &self.ctx.troop, id) else {
            return;
        };
        let result = battler.result();
        let mut events = damage_events(battler, result, false);
        events.extend(status_events(&db, battler, result));
        for event in events {
            self.ctx.bus.push(event);
        }
    }
}

fn damage_events(battler: &dyn Battler, result: &ActionResult, hp_affected: bool) -> Vec<BattleEvent> {
    let target = battler.id();
    let mut events = Vec::new();
    if hp_affected || result.hp_damage != 0 {
        events.push(BattleEvent::HpChanged {
            target,
            target_name: battler.name(),
            damage: result.hp_damage,
            drain: result.drain,
            hp: battler.hp(),
        });
    }
    if result.mp_damage != 0 {
        events.push(BattleEvent::MpChanged {
            target,
            target_name: battler.name(),
            damage: result.mp_damage,
            drain: result.drain,
            mp: battler.mp(),
        });
    }
    if result.tp_damage != 0 {
        events.push(BattleEvent::TpChanged {
            target,
            target_name: battler.name(),
            damage: result.tp_damage,
            tp: battler.tp(),
        });
    }
    events
}

fn status_events(db: &Database, battler: &dyn Battler, result: &ActionResult) -> Vec<BattleEvent> {
    let target = battler.id();
    let mut events = Vec::new();
    for state_id in &result.added_states {
        let message = db
            .state(*state_id)
            .map(|state| {
                if battler.is_actor() {
                    state.message_actor.clone()
                } else {
                    state.message_enemy.clone()
                }
            })
            .unwrap_or_default();
        events.push(BattleEvent::StateAdded {
            target,
            target_name: battler.name(),
            state_id: *state_id,
            message,
        });
    }
    for state_id in &result.removed_states {
        let message = db
            .state(*state_id)
            .map(|state| state.message_removed.clone())
            .unwrap_or_default();
        events.push(BattleEvent::StateRemoved {
            target,
            target_name: battler.name(),
            state_id: *state_id,
            message,
        });
    }
    for param in &result.added_buffs {
        events.push(BattleEvent::BuffAdded {
            target,
            target_name: battler.name(),
            param: *param,
        });
    }
    for param in &result.added_debuffs {
        events.push(BattleEvent::DebuffAdded {
            target,
            target_name: battler.name(),
            param: *param,
        });
    }
    for param in &result.removed_buffs {
        events.push(BattleEvent::BuffRemoved {
            target,
            target_name: battler.name(),
            param: *param,
        });
    }
    events
}
