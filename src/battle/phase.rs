use serde::{Deserialize, Serialize};
use std::fmt;

/// Battle-wide control phase.
///
/// `Idle` is the state before any `setup`; `Finished` is the terminal state
/// after a battle has been wound down. Both accept a new `setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Init,
    Start,
    Input,
    Turn,
    Action,
    TurnEnd,
    Aborting,
    BattleEnd,
    Finished,
}

impl Phase {
    /// Phases reachable from `self` in one step.
    pub fn successors(self) -> &'static [Phase] {
        use Phase::*;
        match self {
            Idle | Finished => &[Init],
            Init => &[Start, Aborting],
            Start => &[Input, Action, Aborting, BattleEnd],
            Input => &[Turn, Aborting, BattleEnd],
            Turn => &[Action, TurnEnd, Aborting, BattleEnd],
            Action => &[Turn, Aborting, BattleEnd],
            TurnEnd => &[Input, Action, Aborting, BattleEnd],
            Aborting => &[BattleEnd],
            BattleEnd => &[Finished],
        }
    }

    pub fn can_transition_to(self, next: Phase) -> bool {
        self.successors().contains(&next)
    }

    /// A battle is set up and not yet finished.
    pub fn is_active(self) -> bool {
        !matches!(self, Phase::Idle | Phase::Finished)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Init => "init",
            Phase::Start => "start",
            Phase::Input => "input",
            Phase::Turn => "turn",
            Phase::Action => "action",
            Phase::TurnEnd => "turnEnd",
            Phase::Aborting => "aborting",
            Phase::BattleEnd => "battleEnd",
            Phase::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Phase::Init, Phase::Start)]
    #[case(Phase::Start, Phase::Input)]
    #[case(Phase::Input, Phase::Turn)]
    #[case(Phase::Turn, Phase::Action)]
    #[case(Phase::Action, Phase::Turn)]
    #[case(Phase::Turn, Phase::TurnEnd)]
    #[case(Phase::TurnEnd, Phase::Input)]
    #[case(Phase::TurnEnd, Phase::Action)]
    #[case(Phase::Init, Phase::Aborting)]
    #[case(Phase::Start, Phase::Aborting)]
    #[case(Phase::Aborting, Phase::BattleEnd)]
    #[case(Phase::BattleEnd, Phase::Finished)]
    #[case(Phase::Finished, Phase::Init)]
    fn allowed_transitions(#[case] from: Phase, #[case] to: Phase) {
        assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
    }

    #[rstest]
    #[case(Phase::Idle, Phase::Turn)]
    #[case(Phase::Input, Phase::Action)]
    #[case(Phase::Turn, Phase::Input)]
    #[case(Phase::Aborting, Phase::Input)]
    #[case(Phase::BattleEnd, Phase::Input)]
    #[case(Phase::Finished, Phase::Turn)]
    fn forbidden_transitions(#[case] from: Phase, #[case] to: Phase) {
        assert!(!from.can_transition_to(to), "{from} -> {to} should be refused");
    }

    #[test]
    fn every_active_phase_can_reach_battle_end() {
        for phase in [
            Phase::Start,
            Phase::Input,
            Phase::Turn,
            Phase::Action,
            Phase::TurnEnd,
            Phase::Aborting,
        ] {
            assert!(phase.can_transition_to(Phase::BattleEnd));
        }
    }
}
