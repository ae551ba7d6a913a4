use crate::types::{Clearance, Condition, CoordinationState, ReadinessGates, Verdict};

/// Readiness verdict for a set of gates.
///
/// Maintenance wins over everything; Ready needs every gate green.
pub const fn decide(gates: ReadinessGates) -> Verdict {
    if matches!(gates.condition, Condition::Poor) || matches!(gates.clearance, Clearance::Failed) {
        return Verdict::Maintenance;
    }
    if matches!(gates.condition, Condition::Good)
        && matches!(gates.clearance, Clearance::Cleared)
        && gates.crew_available
        && matches!(gates.coordination, CoordinationState::Coordinated)
    {
        return Verdict::Ready;
    }
    Verdict::Standby
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn gates(
        condition: Condition,
        clearance: Clearance,
        crew_available: bool,
        coordination: CoordinationState,
    ) -> ReadinessGates {
        ReadinessGates {
            condition,
            clearance,
            crew_available,
            coordination,
        }
    }

    #[test]
    fn poor_condition_overrides_everything() {
        let g = gates(Condition::Poor, Clearance::Cleared, true, CoordinationState::Coordinated);
        assert_eq!(decide(g), Verdict::Maintenance);
    }

    #[test]
    fn failed_clearance_overrides_everything() {
        let g = gates(Condition::Good, Clearance::Failed, true, CoordinationState::Coordinated);
        assert_eq!(decide(g), Verdict::Maintenance);
    }

    #[test]
    fn all_green_is_ready() {
        let g = gates(Condition::Good, Clearance::Cleared, true, CoordinationState::Coordinated);
        assert_eq!(decide(g), Verdict::Ready);
    }

    #[test]
    fn missing_crew_is_standby() {
        let g = gates(Condition::Good, Clearance::Cleared, false, CoordinationState::Coordinated);
        assert_eq!(decide(g), Verdict::Standby);
    }
}
