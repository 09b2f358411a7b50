mod conflicts;
mod greedy;
mod optimizer;
mod types;

pub use conflicts::{blocking_count, detect_violations};
pub use greedy::GreedySolver;
pub use optimizer::OptimizingSolver;
pub use types::{EngineOptions, RosterInput, RosterOutcome, SolverMode};

use crate::calendar::HolidayCatalog;
use crate::error::{RosterError, SolverFailure};
use crate::model::{Assignment, SolverKind};
use crate::problem::RosterProblem;
use crate::stats::RosterStatistics;
use tracing::{info, warn};

/// Stratégie de résolution interchangeable.
pub trait Solver: Send + Sync {
    fn kind(&self) -> SolverKind;
    fn solve(&self, problem: &RosterProblem) -> Result<Assignment, SolverFailure>;
}

/// Moteur : chaîne de solveurs essayés dans l'ordre, le glouton en dernier
/// recours.
pub struct RosterEngine {
    mode: SolverMode,
    chain: Vec<Box<dyn Solver>>,
}

impl std::fmt::Debug for RosterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterEngine")
            .field("mode", &self.mode)
            .field("chain", &self.chain.iter().map(|s| s.kind()).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for RosterEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl RosterEngine {
    pub fn new(options: EngineOptions) -> Self {
        let chain: Vec<Box<dyn Solver>> = match options.mode {
            SolverMode::Greedy => vec![Box::new(GreedySolver)],
            SolverMode::Auto | SolverMode::Optimizer => vec![
                Box::new(OptimizingSolver::new(
                    options.budget_per_block(),
                    options.weights,
                )),
                Box::new(GreedySolver),
            ],
        };
        Self {
            mode: options.mode,
            chain,
        }
    }

    /// Chaîne personnalisée ; le glouton reste le filet de sécurité.
    pub fn with_chain(chain: Vec<Box<dyn Solver>>) -> Self {
        Self {
            mode: SolverMode::Optimizer,
            chain,
        }
    }

    /// Valide les entrées, résout puis calcule les statistiques.
    /// Seules les erreurs de validation ou de configuration interrompent le run.
    pub fn run(
        &self,
        input: RosterInput,
        catalog: &HolidayCatalog,
    ) -> Result<RosterOutcome, RosterError> {
        input.rules.validate()?;
        let resolver = catalog.resolver(&input.jurisdiction)?;
        let problem = RosterProblem::new(input.staff, &input.leaves, input.rules, &resolver)?
            .with_preferences(input.preferences)?;
        info!(
            staff = problem.num_staff(),
            days = problem.num_days(),
            min_staff = problem.min_staff(),
            jurisdiction = %resolver.table().jurisdiction,
            "roster run started"
        );

        let (assignment, failures) = self.solve(&problem);
        let statistics = RosterStatistics::compute(
            &assignment,
            problem.rules(),
            problem.calendar(),
            problem.staff(),
        );
        info!(
            solver = %assignment.solver(),
            coverage = statistics.coverage_percentage,
            understaffed = statistics.days_understaffed,
            "roster run finished"
        );

        Ok(RosterOutcome {
            problem,
            assignment,
            statistics,
            failures,
        })
    }

    /// Essaie chaque solveur ; renvoie l'affectation et les échecs rencontrés.
    pub fn solve(&self, problem: &RosterProblem) -> (Assignment, Vec<SolverFailure>) {
        if self.mode == SolverMode::Auto && is_trivial(problem) {
            info!("trivial instance, using greedy solver");
            return (GreedySolver.assign(problem), Vec::new());
        }

        let mut failures = Vec::new();
        for solver in &self.chain {
            match solver.solve(problem) {
                Ok(assignment) => return (assignment, failures),
                Err(failure) => {
                    warn!(
                        solver = %solver.kind(),
                        %failure,
                        "solver failed, falling back (roster quality may degrade)"
                    );
                    failures.push(failure);
                }
            }
        }
        (GreedySolver.assign(problem), failures)
    }
}

/// Tout le personnel disponible doit travailler chaque jour : le glouton est
/// alors optimal.
fn is_trivial(problem: &RosterProblem) -> bool {
    let rules = problem.rules();
    problem.num_staff() == 0
        || (problem.num_staff() <= problem.min_staff()
            && rules.max_consecutive_days.is_none()
            && rules.min_rest_days.unwrap_or(0) == 0)
}
