use crate::battle::context::BattleContext;
use crate::battle::engine::BattleManager;
use crate::battle::state::TurnRng;
use crate::battler::{Actor, Battler, BattlerStatus, BattlerTraits, Enemy};
use crate::database::Database;
use crate::errors::BattleResult;
use crate::party::Party;
use schema::{
    ActionCondition, ActorData, ArmorData, ClassData, Damage, DamageType, DropItem, Effect,
    EffectCode, Element, EnemyAction, EnemyData, HitType, ItemData, ItemKind, Learning, Param,
    ParamSet, Restriction, AutoRemovalTiming, Scope, SkillData, SpecialFlag, StateData, Trait,
    TraitCode, TroopData, TroopMember, Usage, WeaponData, XParam,
};
use std::sync::Arc;

// --- IDS ---

pub const DEATH_STATE: u32 = 1;
pub const GUARD_STATE: u32 = 2;
pub const POISON_STATE: u32 = 3;
pub const CONFUSION_STATE: u32 = 4;
pub const SLEEP_STATE: u32 = 5;
pub const COUNTER_STATE: u32 = 6;
pub const REFLECT_STATE: u32 = 7;

pub const ATTACK_SKILL: u32 = 1;
pub const GUARD_SKILL: u32 = 2;
pub const FIRE_SKILL: u32 = 3;
pub const HEAL_SKILL: u32 = 4;
pub const DRAIN_SKILL: u32 = 5;
pub const BROKEN_SKILL: u32 = 6;
pub const SWEEP_SKILL: u32 = 7;
pub const POWER_UP_SKILL: u32 = 8;
pub const CALL_SKILL: u32 = 9;
pub const BASH_SKILL: u32 = 10;
pub const CLEAVE_SKILL: u32 = 11;

pub const POTION_ITEM: u32 = 1;
pub const REVIVE_ITEM: u32 = 2;

pub const FIRE_ELEMENT: u32 = 2;

// --- DATABASE ---

fn skill(id: u32, name: &str, mp_cost: u32, usage: Usage) -> SkillData {
    SkillData {
        id,
        name: name.to_string(),
        stype_id: if mp_cost > 0 { 1 } else { 0 },
        mp_cost,
        tp_cost: 0,
        required_wtype_ids: vec![],
        message: String::new(),
        usage,
    }
}

fn damage(kind: DamageType, element: Element, formula: &str, variance: u32) -> Damage {
    Damage {
        kind,
        element,
        formula: formula.into(),
        variance,
        critical: false,
    }
}

fn state(id: u32, name: &str, priority: u32) -> StateData {
    StateData {
        id,
        name: name.to_string(),
        priority,
        remove_at_battle_end: true,
        ..Default::default()
    }
}

fn params(mhp: f64, mmp: f64, atk: f64, def: f64, mat: f64, mdf: f64, agi: f64, luk: f64) -> ParamSet {
    ParamSet {
        mhp,
        mmp,
        atk,
        def,
        mat,
        mdf,
        agi,
        luk,
    }
}

/// A small, fully deterministic database: every battler hits for sure, no
/// skill crits and only Fire has variance.
pub fn test_database() -> Database {
    let mut db = Database::default();

    db.insert_state(StateData {
        restriction: Restriction::CannotMove,
        remove_at_battle_end: false,
        message_actor: " has fallen!".to_string(),
        message_enemy: " is defeated!".to_string(),
        ..state(DEATH_STATE, "Knockout", 100)
    })
    .insert_state(StateData {
        auto_removal_timing: AutoRemovalTiming::ActionEnd,
        traits: vec![Trait::special_flag(SpecialFlag::Guard)],
        ..state(GUARD_STATE, "Guard", 0)
    })
    .insert_state(StateData {
        traits: vec![Trait::xparam(XParam::Hrg, -0.1)],
        message_actor: " is poisoned!".to_string(),
        message_enemy: " is poisoned!".to_string(),
        message_removed: " is no longer poisoned.".to_string(),
        ..state(POISON_STATE, "Poison", 50)
    })
    .insert_state(StateData {
        restriction: Restriction::AttackAnyone,
        auto_removal_timing: AutoRemovalTiming::TurnEnd,
        min_turns: 3,
        max_turns: 3,
        ..state(CONFUSION_STATE, "Confusion", 70)
    })
    .insert_state(StateData {
        restriction: Restriction::CannotMove,
        auto_removal_timing: AutoRemovalTiming::TurnEnd,
        min_turns: 3,
        max_turns: 3,
        remove_by_damage: true,
        chance_by_damage: 100,
        message_removed: " woke up.".to_string(),
        ..state(SLEEP_STATE, "Sleep", 80)
    })
    .insert_state(StateData {
        traits: vec![Trait::xparam(XParam::Cnt, 1.0)],
        ..state(COUNTER_STATE, "Counter Stance", 10)
    })
    .insert_state(StateData {
        traits: vec![Trait::xparam(XParam::Mrf, 1.0)],
        ..state(REFLECT_STATE, "Reflect", 10)
    });

    db.insert_skill(skill(
        ATTACK_SKILL,
        "Attack",
        0,
        Usage {
            scope: Scope::OneEnemy,
            hit_type: HitType::Physical,
            tp_gain: 10,
            damage: damage(
                DamageType::HpDamage,
                Element::NormalAttack,
                "a.atk * 4 - b.def * 2",
                0,
            ),
            effects: vec![Effect::new(EffectCode::AddState, 0, 1.0, 0.0)],
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        GUARD_SKILL,
        "Guard",
        0,
        Usage {
            scope: Scope::User,
            speed: 2000,
            effects: vec![Effect::new(EffectCode::AddState, GUARD_STATE, 1.0, 0.0)],
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        FIRE_SKILL,
        "Fire",
        5,
        Usage {
            scope: Scope::OneEnemy,
            hit_type: HitType::Magical,
            damage: damage(
                DamageType::HpDamage,
                Element::Fixed(FIRE_ELEMENT),
                "100",
                20,
            ),
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        HEAL_SKILL,
        "Heal",
        5,
        Usage {
            scope: Scope::OneAlly,
            damage: damage(DamageType::HpRecover, Element::None, "50", 0),
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        DRAIN_SKILL,
        "Drain",
        0,
        Usage {
            scope: Scope::OneEnemy,
            hit_type: HitType::Magical,
            damage: damage(DamageType::HpDrain, Element::None, "30", 0),
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        BROKEN_SKILL,
        "Glitch",
        0,
        Usage {
            scope: Scope::OneEnemy,
            damage: damage(DamageType::HpDamage, Element::None, "a.atk * (", 0),
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        SWEEP_SKILL,
        "Sweep",
        0,
        Usage {
            scope: Scope::AllEnemies,
            hit_type: HitType::Physical,
            damage: damage(DamageType::HpDamage, Element::None, "50", 0),
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        POWER_UP_SKILL,
        "Power Up",
        0,
        Usage {
            scope: Scope::User,
            effects: vec![Effect::new(EffectCode::AddBuff, Param::Atk.index() as u32, 5.0, 0.0)],
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        CALL_SKILL,
        "Call for Help",
        0,
        Usage {
            scope: Scope::User,
            effects: vec![Effect::new(EffectCode::CommonEvent, 3, 0.0, 0.0)],
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        BASH_SKILL,
        "Bash",
        0,
        Usage {
            scope: Scope::OneEnemy,
            hit_type: HitType::Physical,
            damage: damage(DamageType::HpDamage, Element::None, "a.atk * 2", 0),
            ..Default::default()
        },
    ))
    .insert_skill(skill(
        CLEAVE_SKILL,
        "Cleave",
        0,
        Usage {
            scope: Scope::AllEnemies,
            hit_type: HitType::Physical,
            damage: damage(DamageType::HpDamage, Element::None, "a.atk * 2", 0),
            ..Default::default()
        },
    ));

    db.insert_item(ItemData {
        id: POTION_ITEM,
        name: "Potion".to_string(),
        consumable: true,
        price: 50,
        usage: Usage {
            scope: Scope::OneAlly,
            effects: vec![Effect::new(EffectCode::RecoverHp, 0, 0.0, 100.0)],
            ..Default::default()
        },
    })
    .insert_item(ItemData {
        id: REVIVE_ITEM,
        name: "Phoenix Feather".to_string(),
        consumable: true,
        price: 200,
        usage: Usage {
            scope: Scope::OneDeadAlly,
            effects: vec![
                Effect::new(EffectCode::RemoveState, DEATH_STATE, 1.0, 0.0),
                Effect::new(EffectCode::RecoverHp, 0, 0.1, 0.0),
            ],
            ..Default::default()
        },
    });

    db.insert_weapon(WeaponData {
        id: 1,
        name: "Short Sword".to_string(),
        wtype_id: 1,
        price: 100,
        params: ParamSet {
            atk: 10.0,
            ..Default::default()
        },
        traits: vec![],
    })
    .insert_weapon(WeaponData {
        id: 2,
        name: "Long Sword".to_string(),
        wtype_id: 1,
        price: 300,
        params: ParamSet {
            atk: 25.0,
            ..Default::default()
        },
        traits: vec![],
    })
    .insert_armor(ArmorData {
        id: 1,
        name: "Buckler".to_string(),
        atype_id: 1,
        etype_id: 2,
        price: 80,
        params: ParamSet {
            def: 5.0,
            ..Default::default()
        },
        traits: vec![],
    });

    db.insert_class(ClassData {
        id: 1,
        name: "Fighter".to_string(),
        base_params: params(500.0, 50.0, 40.0, 20.0, 30.0, 20.0, 30.0, 30.0),
        growth: params(50.0, 5.0, 3.0, 2.0, 2.0, 2.0, 2.0, 1.0),
        learnings: vec![
            Learning {
                level: 1,
                skill_id: BASH_SKILL,
            },
            Learning {
                level: 3,
                skill_id: CLEAVE_SKILL,
            },
        ],
        traits: vec![
            Trait::xparam(XParam::Hit, 1.0),
            Trait::new(TraitCode::EquipWeaponType, 1, 0.0),
            Trait::new(TraitCode::EquipArmorType, 1, 0.0),
            Trait::new(TraitCode::SkillTypeAdd, 1, 0.0),
        ],
        ..Default::default()
    });

    db.insert_actor(ActorData {
        id: 1,
        name: "Harold".to_string(),
        class_id: 1,
        initial_level: 1,
        max_level: 99,
        equips: vec![1, 0, 0, 0, 0],
        traits: vec![],
    })
    .insert_actor(ActorData {
        id: 2,
        name: "Therese".to_string(),
        class_id: 1,
        initial_level: 1,
        max_level: 99,
        equips: vec![1, 0, 0, 0, 0],
        traits: vec![],
    });

    let attack_pattern = vec![EnemyAction {
        skill_id: ATTACK_SKILL,
        rating: 5,
        condition: ActionCondition::Always,
    }];
    db.insert_enemy(EnemyData {
        id: 1,
        name: "Slime".to_string(),
        params: params(200.0, 0.0, 30.0, 20.0, 10.0, 10.0, 20.0, 10.0),
        exp: 10,
        gold: 5,
        drop_items: vec![DropItem {
            kind: ItemKind::Item,
            data_id: POTION_ITEM,
            denominator: 2,
        }],
        actions: attack_pattern.clone(),
        traits: vec![Trait::xparam(XParam::Hit, 1.0)],
    })
    .insert_enemy(EnemyData {
        id: 2,
        name: "Bat".to_string(),
        params: params(120.0, 0.0, 25.0, 10.0, 10.0, 10.0, 40.0, 10.0),
        exp: 8,
        gold: 3,
        drop_items: vec![],
        actions: attack_pattern,
        traits: vec![Trait::xparam(XParam::Hit, 1.0)],
    });

    let member = |enemy_id: u32, hidden: bool| TroopMember { enemy_id, hidden };
    db.insert_troop(TroopData {
        id: 1,
        name: "Slime".to_string(),
        members: vec![member(1, false)],
    })
    .insert_troop(TroopData {
        id: 2,
        name: "Slime*2, Bat".to_string(),
        members: vec![member(1, false), member(1, false), member(2, false)],
    })
    .insert_troop(TroopData {
        id: 3,
        name: "Slime, Hidden Slime".to_string(),
        members: vec![member(1, false), member(1, true)],
    });

    db
}

// --- BUILDERS ---

/// Builds actors from [`test_database`] records with selected overrides.
///
/// # Example
/// ```ignore
/// let actor = TestActorBuilder::new(1).level(5).atk(50).hp(10).build(&db);
/// ```
#[derive(Debug, Clone)]
pub struct TestActorBuilder {
    actor_id: u32,
    level: Option<u32>,
    hp: Option<i32>,
    mp: Option<i32>,
    params: Vec<(Param, i32)>,
    states: Vec<u32>,
}

impl TestActorBuilder {
    pub fn new(actor_id: u32) -> Self {
        Self {
            actor_id,
            level: None,
            hp: None,
            mp: None,
            params: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Current HP. If not set, HP will be max.
    pub fn hp(mut self, hp: i32) -> Self {
        self.hp = Some(hp);
        self
    }

    pub fn mp(mut self, mp: i32) -> Self {
        self.mp = Some(mp);
        self
    }

    /// Forces a final parameter value through the flat bonus.
    pub fn param(mut self, param: Param, value: i32) -> Self {
        self.params.push((param, value));
        self
    }

    pub fn atk(self, value: i32) -> Self {
        self.param(Param::Atk, value)
    }

    pub fn agi(self, value: i32) -> Self {
        self.param(Param::Agi, value)
    }

    pub fn with_state(mut self, state_id: u32) -> Self {
        self.states.push(state_id);
        self
    }

    pub fn build(self, db: &Database) -> Actor {
        let mut actor = match Actor::new(db, self.actor_id, 0) {
            Ok(actor) => actor,
            Err(err) => panic!("Failed to build test actor {}: {}", self.actor_id, err),
        };
        if let Some(level) = self.level {
            actor.change_level(db, level);
        }
        for (param, value) in &self.params {
            let current = actor.param(db, *param);
            actor.add_param(db, *param, (value - current) as f64);
        }
        actor.recover_all(db);
        finish(&mut actor, db, self.hp, self.mp, &self.states);
        actor
    }
}

/// Builds enemies from [`test_database`] records with selected overrides.
#[derive(Debug, Clone)]
pub struct TestEnemyBuilder {
    enemy_id: u32,
    hp: Option<i32>,
    mp: Option<i32>,
    params: Vec<(Param, i32)>,
    states: Vec<u32>,
}

impl TestEnemyBuilder {
    pub fn new(enemy_id: u32) -> Self {
        Self {
            enemy_id,
            hp: None,
            mp: None,
            params: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn hp(mut self, hp: i32) -> Self {
        self.hp = Some(hp);
        self
    }

    pub fn mp(mut self, mp: i32) -> Self {
        self.mp = Some(mp);
        self
    }

    pub fn param(mut self, param: Param, value: i32) -> Self {
        self.params.push((param, value));
        self
    }

    pub fn def(self, value: i32) -> Self {
        self.param(Param::Def, value)
    }

    pub fn agi(self, value: i32) -> Self {
        self.param(Param::Agi, value)
    }

    pub fn with_state(mut self, state_id: u32) -> Self {
        self.states.push(state_id);
        self
    }

    pub fn build(self, db: &Database) -> Enemy {
        let mut enemy = match Enemy::new(db, self.enemy_id, 0) {
            Ok(enemy) => enemy,
            Err(err) => panic!("Failed to build test enemy {}: {}", self.enemy_id, err),
        };
        for (param, value) in &self.params {
            let current = enemy.param(db, *param);
            enemy.add_param(db, *param, (value - current) as f64);
        }
        enemy.recover_all(db);
        finish(&mut enemy, db, self.hp, self.mp, &self.states);
        enemy
    }
}

fn finish(battler: &mut dyn Battler, db: &Database, hp: Option<i32>, mp: Option<i32>, states: &[u32]) {
    if let Some(hp) = hp {
        battler.set_hp(db, hp);
    }
    if let Some(mp) = mp {
        battler.set_mp(db, mp);
    }
    let mut rng = TurnRng::seeded(0);
    for state_id in states {
        battler.add_state(db, &mut rng, *state_id);
    }
    battler.clear_result();
}

// --- CONTEXTS ---

/// A context over [`test_database`] holding the given battlers, already in
/// battle, whose rng replays `rolls`.
pub fn test_context(
    actors: Vec<TestActorBuilder>,
    enemies: Vec<TestEnemyBuilder>,
    rolls: Vec<f64>,
) -> BattleContext {
    let db = Arc::new(test_database());
    let mut party = Party::new(&db);
    for builder in actors {
        party.push_actor(builder.build(&db));
    }
    let mut ctx = BattleContext::new(Arc::clone(&db), party, TurnRng::new_for_test(rolls));
    for builder in enemies {
        ctx.troop.push_enemy(builder.build(&db));
    }
    ctx.troop.make_unique_names(&db);
    ctx.in_battle = true;
    ctx
}

/// A battle manager over [`test_database`] with actors `actor_ids` in the
/// party, not yet set up.
pub fn test_manager(actor_ids: &[u32], rng: TurnRng) -> BattleManager {
    let db = Arc::new(test_database());
    let mut party = Party::new(&db);
    for actor_id in actor_ids {
        if let Err(err) = party.add_actor(&db, *actor_id) {
            panic!("Failed to add test actor {}: {}", actor_id, err);
        }
    }
    BattleManager::new(BattleContext::new(db, party, rng))
}

/// A battle manager over a customised database with the given actors.
pub fn manager_with(db: Database, actors: Vec<TestActorBuilder>, rng: TurnRng) -> BattleManager {
    let db = Arc::new(db);
    let mut party = Party::new(&db);
    for builder in actors {
        party.push_actor(builder.build(&db));
    }
    BattleManager::new(BattleContext::new(db, party, rng))
}

/// Creates a `TurnRng` with a long list of middling values (0.5).
/// Useful for tests where the specific RNG outcome is not important, preventing panics from exhaustion.
pub fn predictable_rng() -> TurnRng {
    TurnRng::new_for_test(vec![0.5; 500]) // Provide a generous buffer of RNG values
}

/// Helper function to assert that a Result is Ok and return the value.
/// Provides clear error messages in tests when functions unexpectedly fail.
pub fn assert_ok<T>(result: BattleResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("Expected Ok but got error: {}", err),
    }
}

/// Helper function to assert that a boolean Result is Ok and true.
pub fn assert_ok_true(result: BattleResult<bool>) -> bool {
    let value = assert_ok(result);
    assert!(value, "Expected true but got false");
    value
}

/// Helper function to assert that a boolean Result is Ok and false.
pub fn assert_ok_false(result: BattleResult<bool>) -> bool {
    let value = assert_ok(result);
    assert!(!value, "Expected false but got true");
    value
}
