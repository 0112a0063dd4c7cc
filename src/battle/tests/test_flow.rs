#[cfg(test)]
mod tests {
    use crate::battle::ai::ScoringAI;
    use crate::battle::engine::BattleManager;
    use crate::battle::phase::Phase;
    use crate::battle::rewards::BattleOutcome;
    use crate::battle::state::{BattleEvent, TurnRng};
    use crate::battle::tests::common::{
        assert_ok, manager_with, predictable_rng, test_database, test_manager, TestActorBuilder,
    };
    use crate::battler::Battler;
    use pretty_assertions::assert_eq;

    fn run_until(manager: &mut BattleManager, phase: Phase) {
        for _ in 0..500 {
            if manager.phase() == phase {
                return;
            }
            if manager.is_inputting() {
                assert_ok(manager.decide_party_actions(&ScoringAI::new()));
            } else {
                assert_ok(manager.update());
            }
        }
        panic!("never reached {phase}, stuck in {}", manager.phase());
    }

    // --- TURN EXHAUSTION ---

    #[test]
    fn test_every_subject_acts_once_and_the_turn_ends() {
        // Arrange: Harold against two slimes and a bat; nobody falls in one round.
        let mut manager = test_manager(&[1], predictable_rng());
        assert_ok(manager.setup(2, true, false));
        run_until(&mut manager, Phase::Turn);
        let mut pending = manager.pending_subjects();
        assert_eq!(pending, 4);

        // Act
        for _ in 0..200 {
            if manager.phase() == Phase::TurnEnd {
                break;
            }
            assert_ok(manager.update());

            // Assert: the queue only ever shrinks
            assert!(manager.pending_subjects() <= pending);
            pending = manager.pending_subjects();
        }

        // Assert
        assert_eq!(manager.phase(), Phase::TurnEnd);
        assert_eq!(manager.pending_subjects(), 0);
        let started = manager
            .events()
            .iter()
            .filter(|e| matches!(e, BattleEvent::ActionStarted { .. }))
            .count();
        assert_eq!(started, 4);
        assert!(manager
            .events()
            .iter()
            .any(|e| matches!(e, BattleEvent::TurnEnded { turn_number: 1 })));
    }

    // --- DETERMINISM ---

    #[test]
    fn test_same_seed_replays_the_same_battle() {
        let run = || {
            let mut manager = manager_with(
                test_database(),
                vec![TestActorBuilder::new(1), TestActorBuilder::new(2)],
                TurnRng::seeded(42),
            );
            assert_ok(manager.setup(2, false, true));
            run_until(&mut manager, Phase::Finished);
            (manager.outcome(), manager.drain_events())
        };

        let (first_outcome, first_events) = run();
        let (second_outcome, second_events) = run();

        assert!(first_outcome.is_some());
        assert_eq!(first_outcome, second_outcome);
        assert_eq!(first_events, second_events);
    }

    // --- REWARDS ---

    #[test]
    fn test_victory_levels_up_and_reports_learned_skills() {
        // Arrange: a slime worth enough experience for several levels.
        let mut db = test_database();
        let Some(mut slime) = db.enemy(1).cloned() else {
            panic!("slime missing from test database");
        };
        slime.exp = 10_000;
        db.insert_enemy(slime);
        let mut manager = manager_with(db, vec![TestActorBuilder::new(1)], predictable_rng());
        assert_ok(manager.setup(1, true, false));

        // Act
        run_until(&mut manager, Phase::Finished);

        // Assert
        assert_eq!(manager.outcome(), Some(BattleOutcome::Victory));
        let level_up = manager.events().iter().find_map(|e| match e {
            BattleEvent::LevelUp {
                level,
                learned_skills,
                ..
            } => Some((*level, learned_skills.clone())),
            _ => None,
        });
        let Some((level, learned_skills)) = level_up else {
            panic!("no level up reported");
        };
        assert!(level >= 3);
        assert!(learned_skills.contains(&"Cleave".to_string()));
        let actor_level = manager.context().party.actor(0).map(|a| a.level());
        assert_eq!(actor_level, Some(level));
    }
}
