use crate::constraints::{ConstraintSet, EvalContext, ObjectiveWeights, Violation, ViolationKind, WorkGrid};
use crate::model::Assignment;
use crate::problem::RosterProblem;

/// Vérifie une affectation terminée contre les contraintes dures.
/// Le sous-effectif est listé mais n'est pas bloquant.
pub fn detect_violations(problem: &RosterProblem, assignment: &Assignment) -> Vec<Violation> {
    let (grid, unknown) = WorkGrid::from_assignment(problem, assignment);
    let constraints = ConstraintSet::for_problem(problem, &ObjectiveWeights::default());

    let mut out = constraints.violations(&EvalContext::new(problem, &grid));
    out.extend(unknown.into_iter().map(|(staff, date)| Violation {
        date,
        staff: Some(staff),
        kind: ViolationKind::UnknownStaff,
    }));
    out.sort_by(|a, b| (a.date, a.kind, &a.staff).cmp(&(b.date, b.kind, &b.staff)));
    out
}

pub fn blocking_count(violations: &[Violation]) -> usize {
    violations.iter().filter(|v| v.kind.is_blocking()).count()
}
