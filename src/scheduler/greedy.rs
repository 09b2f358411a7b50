use super::Solver;
use crate::constraints::{ConstraintSet, EvalContext, ObjectiveWeights, WorkGrid};
use crate::error::SolverFailure;
use crate::model::{Assignment, SolverKind, StaffMember};
use crate::problem::RosterProblem;
use std::collections::BTreeSet;
use tracing::debug;

/// Heuristique gloutonne déterministe : un passage par jour, sans retour
/// arrière. Ne peut pas échouer.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedySolver;

impl GreedySolver {
    pub fn assign(&self, problem: &RosterProblem) -> Assignment {
        let constraints = ConstraintSet::for_problem(problem, &ObjectiveWeights::default());
        let staff = problem.staff();
        let min_staff = problem.min_staff();
        let by_specialty = problem.rules().specialty_required;

        let mut grid = WorkGrid::for_problem(problem);
        let mut counts = vec![0usize; staff.len()];

        for day in 0..problem.num_days() {
            let mut candidates: Vec<usize> = {
                let ctx = EvalContext::new(problem, &grid);
                (0..staff.len())
                    .filter(|s| constraints.admits(*s, day, &ctx))
                    .collect()
            };
            candidates.sort_by(|a, b| {
                counts[*a]
                    .cmp(&counts[*b])
                    .then_with(|| staff[*a].id.cmp(&staff[*b].id))
            });

            let selected = select_day(&candidates, staff, min_staff, by_specialty);
            if selected.len() < min_staff {
                debug!(
                    date = %problem.date_at(day),
                    assigned = selected.len(),
                    required = min_staff,
                    "understaffed day"
                );
            }
            for s in selected {
                grid.set(s, day, true);
                counts[s] += 1;
            }
        }

        grid.into_assignment(problem, SolverKind::Greedy)
    }
}

impl Solver for GreedySolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Greedy
    }

    fn solve(&self, problem: &RosterProblem) -> Result<Assignment, SolverFailure> {
        Ok(self.assign(problem))
    }
}

/// `sorted` est déjà trié par charge puis identifiant.
fn select_day(
    sorted: &[usize],
    staff: &[StaffMember],
    min_staff: usize,
    by_specialty: bool,
) -> Vec<usize> {
    let mut selected = Vec::with_capacity(min_staff);

    if by_specialty {
        let mut covered: BTreeSet<&str> = BTreeSet::new();
        for &s in sorted {
            if selected.len() >= min_staff {
                break;
            }
            let tags = &staff[s].specialties;
            if tags.iter().any(|t| !covered.contains(t.as_str())) {
                covered.extend(tags.iter().map(String::as_str));
                selected.push(s);
            }
        }
    }

    for &s in sorted {
        if selected.len() >= min_staff {
            break;
        }
        if !selected.contains(&s) {
            selected.push(s);
        }
    }
    selected
}
