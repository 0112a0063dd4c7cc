#[cfg(test)]
mod tests {
    use crate::battle::state::TurnRng;
    use crate::battle::tests::common::{
        test_database, TestActorBuilder, TestEnemyBuilder, CONFUSION_STATE, DEATH_STATE,
        FIRE_SKILL, POISON_STATE, SLEEP_STATE,
    };
    use crate::battler::{Battler, BattlerStatus, BattlerTraits};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::Param;

    // --- RESOURCES ---

    #[test]
    fn test_resources_clamp_to_their_maxima_and_zero() {
        // Arrange
        let db = test_database();
        let mut actor = TestActorBuilder::new(1).hp(100).build(&db);
        let mhp = actor.mhp(&db);
        let max_tp = actor.max_tp(&db);

        // Act & Assert: overheal
        actor.gain_hp(&db, 100_000);
        assert_eq!(actor.hp(), mhp);

        // Act & Assert: overspend
        actor.set_mp(&db, -40);
        assert_eq!(actor.mp(), 0);

        // Act & Assert: TP overflow
        actor.gain_tp(&db, max_tp * 3);
        assert_eq!(actor.tp(), max_tp);
    }

    #[test]
    fn test_lowering_max_hp_pulls_current_hp_down() {
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).build(&db);
        assert_eq!(enemy.hp(), 200);

        enemy.add_param(&db, Param::Mhp, -150.0);

        assert_eq!(enemy.mhp(&db), 50);
        assert_eq!(enemy.hp(), 50);
    }

    #[test]
    fn test_skill_cost_needs_enough_mp() {
        let db = test_database();
        let Some(fire) = db.skill(FIRE_SKILL) else {
            panic!("fire missing from test database");
        };

        let short = TestActorBuilder::new(1).mp(3).build(&db);
        let exact = TestActorBuilder::new(1).mp(5).build(&db);

        assert!(!short.can_pay_skill_cost(&db, fire));
        assert!(exact.can_pay_skill_cost(&db, fire));
    }

    // --- DEATH ---

    #[test]
    fn test_death_state_wipes_other_states_and_buffs() {
        // Arrange: a battler at 1/100 HP, poisoned and buffed.
        let db = test_database();
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut enemy = TestEnemyBuilder::new(1)
            .param(Param::Mhp, 100)
            .hp(1)
            .with_state(POISON_STATE)
            .build(&db);
        enemy.add_buff(&db, Param::Atk, 3);
        enemy.add_debuff(&db, Param::Def, 3);

        // Act
        let added = enemy.add_state(&db, &mut rng, DEATH_STATE);

        // Assert
        assert!(added);
        assert_eq!(enemy.hp(), 0);
        assert_eq!(enemy.state_ids(), &[DEATH_STATE]);
        assert_eq!(enemy.buff(Param::Atk), 0);
        assert_eq!(enemy.buff(Param::Def), 0);
        assert!(enemy.is_dead(&db));
    }

    #[test]
    fn test_zero_hp_adds_death_and_revival_removes_it() {
        let db = test_database();
        let mut actor = TestActorBuilder::new(1).build(&db);

        actor.set_hp(&db, 0);
        assert!(actor.is_death_state_affected(&db));
        assert!(!actor.can_move(&db));

        actor.remove_state(&db, DEATH_STATE);
        assert_eq!(actor.hp(), 1);
        assert!(actor.is_alive(&db));
    }

    #[test]
    fn test_dead_battlers_take_no_new_states_or_buffs() {
        let db = test_database();
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut actor = TestActorBuilder::new(1).hp(0).build(&db);

        assert!(!actor.add_state(&db, &mut rng, POISON_STATE));
        actor.add_buff(&db, Param::Atk, 5);

        assert_eq!(actor.state_ids(), &[DEATH_STATE]);
        assert_eq!(actor.buff(Param::Atk), 0);
    }

    // --- BUFFS ---

    #[test]
    fn test_buff_levels_stack_to_two_and_durations_only_grow() {
        // Arrange
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).build(&db);
        enemy.add_buff(&db, Param::Atk, 3);
        assert_eq!((enemy.buff(Param::Atk), enemy.buff_turns(Param::Atk)), (1, 3));

        // Act & Assert: longer duration extends
        enemy.add_buff(&db, Param::Atk, 5);
        assert_eq!((enemy.buff(Param::Atk), enemy.buff_turns(Param::Atk)), (2, 5));

        // Act & Assert: level is capped, shorter duration is ignored
        enemy.add_buff(&db, Param::Atk, 2);
        assert_eq!((enemy.buff(Param::Atk), enemy.buff_turns(Param::Atk)), (2, 5));
    }

    #[rstest]
    #[case(1, 25)]
    #[case(2, 30)]
    fn test_buff_level_scales_the_param(#[case] level: usize, #[case] expected_atk: i32) {
        // Slime atk 20 before buffs; each level adds a quarter.
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).param(Param::Atk, 20).build(&db);

        for _ in 0..level {
            enemy.add_buff(&db, Param::Atk, 3);
        }

        assert_eq!(enemy.param(&db, Param::Atk), expected_atk);
    }

    #[test]
    fn test_debuffs_bottom_out_at_minus_two() {
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).build(&db);

        for _ in 0..4 {
            enemy.add_debuff(&db, Param::Def, 2);
        }

        assert_eq!(enemy.buff(Param::Def), -2);
        assert!(enemy.is_max_debuff_affected(Param::Def));
    }

    #[test]
    fn test_buff_expires_after_its_turns_at_action_end() {
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).build(&db);
        enemy.add_buff(&db, Param::Agi, 1);

        enemy.on_turn_end(&db, false);
        enemy.on_all_actions_end(&db);

        assert_eq!(enemy.buff(Param::Agi), 0);
        assert_eq!(enemy.result().removed_buffs, vec![Param::Agi]);
    }

    // --- STATES OVER TIME ---

    #[test]
    fn test_poison_drains_a_tenth_at_turn_end() {
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).with_state(POISON_STATE).build(&db);

        enemy.on_turn_end(&db, false);

        assert_eq!(enemy.hp(), 180);
        assert_eq!(enemy.result().hp_damage, 20);
    }

    #[test]
    fn test_slip_damage_cannot_kill_by_default() {
        let db = test_database();
        let mut enemy = TestEnemyBuilder::new(1).hp(5).with_state(POISON_STATE).build(&db);

        enemy.on_turn_end(&db, false);

        assert_eq!(enemy.hp(), 1);
        assert!(enemy.is_alive(&db));
    }

    #[test]
    fn test_confusion_wears_off_after_three_turn_ends() {
        // Arrange
        let db = test_database();
        let mut actor = TestActorBuilder::new(1).with_state(CONFUSION_STATE).build(&db);
        assert_eq!(actor.state_turns(CONFUSION_STATE), Some(3));

        // Act & Assert
        actor.on_turn_end(&db, false);
        actor.on_turn_end(&db, false);
        assert!(actor.is_confused(&db));

        actor.on_turn_end(&db, false);
        assert!(!actor.is_confused(&db));
        assert_eq!(actor.result().removed_states, vec![CONFUSION_STATE]);
    }

    #[test]
    fn test_forced_turns_do_not_tick_states() {
        let db = test_database();
        let mut actor = TestActorBuilder::new(1).with_state(CONFUSION_STATE).build(&db);

        actor.on_turn_end(&db, true);

        assert_eq!(actor.state_turns(CONFUSION_STATE), Some(3));
    }

    #[test]
    fn test_reapplying_a_state_keeps_its_remaining_turns() {
        // Arrange: confusion one turn into its three.
        let db = test_database();
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut actor = TestActorBuilder::new(1).with_state(CONFUSION_STATE).build(&db);
        actor.on_turn_end(&db, false);
        assert_eq!(actor.state_turns(CONFUSION_STATE), Some(2));

        // Act
        let added = actor.add_state(&db, &mut rng, CONFUSION_STATE);

        // Assert
        assert!(added);
        assert_eq!(actor.state_turns(CONFUSION_STATE), Some(2));
        assert!(actor.result().is_state_added(CONFUSION_STATE));
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_damage_wakes_a_sleeper() {
        let db = test_database();
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut enemy = TestEnemyBuilder::new(1).with_state(SLEEP_STATE).build(&db);
        assert!(!enemy.can_move(&db));

        enemy.on_damage(&db, &mut rng, 10);

        assert!(enemy.can_move(&db));
        assert!(enemy.result().is_state_removed(SLEEP_STATE));
    }

    #[test]
    fn test_battle_end_clears_battle_only_states() {
        let db = test_database();
        let mut actor = TestActorBuilder::new(1).with_state(POISON_STATE).build(&db);
        actor.add_buff(&db, Param::Atk, 5);

        actor.on_battle_end(&db);

        assert!(actor.state_ids().is_empty());
        assert_eq!(actor.buff(Param::Atk), 0);
        assert_eq!(actor.tp(), 0);
    }
}
