#[cfg(test)]
mod tests {
    use crate::battle::action::Action;
    use crate::battle::tests::common::{
        test_context, TestActorBuilder, TestEnemyBuilder, CONFUSION_STATE, HEAL_SKILL,
        POWER_UP_SKILL, REVIVE_ITEM, SWEEP_SKILL,
    };
    use crate::battler::BattlerId;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_all_enemies_skips_the_fallen() {
        // Arrange
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1)],
            vec![TestEnemyBuilder::new(1), TestEnemyBuilder::new(1).hp(0)],
            vec![],
        );
        let mut action = Action::new(BattlerId::Actor(0), false);
        action.set_skill(SWEEP_SKILL);

        // Act
        let targets = action.make_targets(&mut ctx);

        // Assert
        assert_eq!(targets, vec![BattlerId::Enemy(0)]);
    }

    #[test]
    fn test_repeats_expand_each_living_target_only() {
        // Arrange: a two-hit copy of Sweep.
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1)],
            vec![TestEnemyBuilder::new(1), TestEnemyBuilder::new(1).hp(0)],
            vec![],
        );
        let db = Arc::make_mut(&mut ctx.db);
        let Some(mut double_sweep) = db.skill(SWEEP_SKILL).cloned() else {
            panic!("sweep missing from test database");
        };
        double_sweep.id = 50;
        double_sweep.usage.repeats = 2;
        db.insert_skill(double_sweep);
        let mut action = Action::new(BattlerId::Actor(0), false);
        action.set_skill(50);

        // Act
        let targets = action.make_targets(&mut ctx);

        // Assert
        assert_eq!(targets, vec![BattlerId::Enemy(0), BattlerId::Enemy(0)]);
    }

    #[test]
    fn test_single_target_on_a_fallen_enemy_slides_to_a_living_one() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1)],
            vec![TestEnemyBuilder::new(1).hp(0), TestEnemyBuilder::new(2)],
            vec![],
        );
        let db = Arc::clone(&ctx.db);
        let mut action = Action::new(BattlerId::Actor(0), false);
        action.set_attack(&db);
        action.set_target(0);

        let targets = action.make_targets(&mut ctx);

        assert_eq!(targets, vec![BattlerId::Enemy(1)]);
    }

    #[test]
    fn test_revival_item_finds_the_fallen_ally() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1), TestActorBuilder::new(2).hp(0)],
            vec![TestEnemyBuilder::new(1)],
            vec![],
        );
        let mut action = Action::new(BattlerId::Actor(0), false);
        action.set_item(REVIVE_ITEM);

        let targets = action.make_targets(&mut ctx);

        assert_eq!(targets, vec![BattlerId::Actor(1)]);
    }

    #[test]
    fn test_self_targeted_skill_hits_only_the_user() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1), TestActorBuilder::new(2)],
            vec![TestEnemyBuilder::new(1)],
            vec![],
        );
        let mut action = Action::new(BattlerId::Actor(1), false);
        action.set_skill(POWER_UP_SKILL);

        let targets = action.make_targets(&mut ctx);

        assert_eq!(targets, vec![BattlerId::Actor(1)]);
    }

    #[test]
    fn test_ally_skill_with_chosen_target() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1), TestActorBuilder::new(2)],
            vec![TestEnemyBuilder::new(1)],
            vec![],
        );
        let mut action = Action::new(BattlerId::Actor(0), false);
        action.set_skill(HEAL_SKILL);
        action.set_target(1);

        let targets = action.make_targets(&mut ctx);

        assert_eq!(targets, vec![BattlerId::Actor(1)]);
    }

    #[test]
    fn test_confused_attacker_may_strike_its_own_side() {
        // Arrange: the coin flip lands on "friends"; the actor is alone.
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1).with_state(CONFUSION_STATE)],
            vec![TestEnemyBuilder::new(1)],
            vec![0.9],
        );
        let db = Arc::clone(&ctx.db);
        let mut action = Action::new(BattlerId::Actor(0), false);
        action.set_attack(&db);

        // Act
        let targets = action.make_targets(&mut ctx);

        // Assert
        assert_eq!(targets, vec![BattlerId::Actor(0)]);
    }

    #[test]
    fn test_confused_attacker_coin_flip_towards_the_enemy() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1).with_state(CONFUSION_STATE)],
            vec![TestEnemyBuilder::new(1)],
            vec![0.1],
        );
        let db = Arc::clone(&ctx.db);
        let mut action = Action::new(BattlerId::Actor(0), false);
        action.set_attack(&db);

        let targets = action.make_targets(&mut ctx);

        assert_eq!(targets, vec![BattlerId::Enemy(0)]);
    }

    #[test]
    fn test_forced_actions_ignore_confusion() {
        let mut ctx = test_context(
            vec![TestActorBuilder::new(1).with_state(CONFUSION_STATE)],
            vec![TestEnemyBuilder::new(1)],
            vec![],
        );
        let db = Arc::clone(&ctx.db);
        let mut action = Action::new(BattlerId::Actor(0), true);
        action.set_attack(&db);
        action.set_target(0);

        let targets = action.make_targets(&mut ctx);

        assert_eq!(targets, vec![BattlerId::Enemy(0)]);
        assert_eq!(ctx.rng.draws(), 0);
    }
}
