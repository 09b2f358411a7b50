//! Solveur optimisant : programme linéaire en nombres entiers.
//!
//! Une variable binaire x[s,d] par couple (personne, jour) disponible ; les
//! couples indisponibles sont éliminés. Le modèle part de l'affectation
//! gloutonne et reçoit le budget de temps : à échéance, la meilleure solution
//! connue est retenue. Un délai de garde sur le canal couvre un backend qui
//! ne rendrait pas la main.

use super::{GreedySolver, Solver};
use crate::constraints::{ConstraintSet, EvalContext, ObjectiveWeights, WorkGrid};
use crate::error::SolverFailure;
use crate::model::{Assignment, SolverKind};
use crate::problem::RosterProblem;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct OptimizingSolver {
    budget_per_block: Duration,
    weights: ObjectiveWeights,
}

impl OptimizingSolver {
    /// `budget_per_block` : budget par tranche de 30 jours.
    pub fn new(budget_per_block: Duration, weights: ObjectiveWeights) -> Self {
        Self {
            budget_per_block,
            weights,
        }
    }

    pub fn time_budget(&self, days: usize) -> Duration {
        let blocks = days.div_ceil(30).max(1) as u32;
        self.budget_per_block.saturating_mul(blocks)
    }
}

/// Délai d'attente du résultat : le budget plus une marge pour construire
/// le modèle et relire la solution.
fn backstop(budget: Duration) -> Duration {
    budget
        .saturating_add(budget / 2)
        .saturating_add(Duration::from_millis(250))
}

impl Solver for OptimizingSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Optimizer
    }

    fn solve(&self, problem: &RosterProblem) -> Result<Assignment, SolverFailure> {
        let mut job = IlpJob::from_problem(problem, self.weights);
        job.warm_start = Some(warm_start(problem));
        let budget = self.time_budget(problem.num_days());
        debug!(
            staff = job.num_staff,
            days = job.num_days,
            ?budget,
            "building integer program"
        );
        let chosen = run_with_budget(job, budget)?;

        let mut grid = WorkGrid::for_problem(problem);
        for (s, d) in chosen {
            grid.set(s, d, true);
        }

        // la sortie du solveur est revérifiée contre les contraintes dures
        let constraints = ConstraintSet::for_problem(problem, &self.weights);
        let ctx = EvalContext::new(problem, &grid);
        let blocking = constraints
            .violations(&ctx)
            .iter()
            .filter(|v| v.kind.is_blocking())
            .count();
        if blocking > 0 {
            return Err(SolverFailure::Rejected(blocking));
        }
        Ok(grid.into_assignment(problem, SolverKind::Optimizer))
    }
}

/// Point de départ du modèle : l'affectation gloutonne, indexée comme `available`.
fn warm_start(problem: &RosterProblem) -> Vec<bool> {
    let assignment = GreedySolver.assign(problem);
    let days = problem.num_days();
    let mut cells = vec![false; problem.num_staff() * days];
    for (s, member) in problem.staff().iter().enumerate() {
        for (d, date) in problem.rules().dates().enumerate() {
            cells[s * days + d] = assignment.is_assigned(&member.id, date);
        }
    }
    cells
}

/// Données du modèle, autonomes pour être envoyées au thread de résolution.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "optimizer"), allow(dead_code))]
struct IlpJob {
    num_staff: usize,
    num_days: usize,
    available: Vec<bool>,
    off_day: Vec<bool>,
    weekend: Vec<bool>,
    min_staff: usize,
    max_consecutive: Option<usize>,
    min_rest: Option<usize>,
    /// Par jour : groupes de personnes disponibles partageant une spécialité.
    specialty_groups: Vec<Vec<Vec<usize>>>,
    /// Par personne : week-ends et fériés déjà travaillés.
    off_history: Vec<usize>,
    /// Par personne : coût d'une garde de week-end.
    weekend_cost: Vec<f64>,
    warm_start: Option<Vec<bool>>,
    weights: ObjectiveWeights,
}

impl IlpJob {
    fn from_problem(problem: &RosterProblem, weights: ObjectiveWeights) -> Self {
        let num_staff = problem.num_staff();
        let num_days = problem.num_days();
        let availability = problem.availability();
        let rules = problem.rules();

        let available = (0..num_staff)
            .flat_map(|s| (0..num_days).map(move |d| (s, d)))
            .map(|(s, d)| availability.available_at(s, d))
            .collect();

        let specialty_groups = if rules.specialty_required {
            (0..num_days)
                .map(|d| {
                    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
                    for s in problem.available_staff(d) {
                        for tag in &problem.staff()[s].specialties {
                            groups.entry(tag.as_str()).or_default().push(s);
                        }
                    }
                    groups.into_values().collect()
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            num_staff,
            num_days,
            available,
            off_day: problem.calendar().iter().map(|d| d.is_off_day()).collect(),
            weekend: problem.calendar().iter().map(|d| d.is_weekend).collect(),
            min_staff: problem.min_staff(),
            max_consecutive: rules.max_consecutive_days.map(|n| n as usize),
            min_rest: rules.min_rest_days.map(|k| k as usize).filter(|k| *k > 0),
            specialty_groups,
            off_history: (0..num_staff).map(|s| problem.off_day_history(s)).collect(),
            weekend_cost: (0..num_staff).map(|s| problem.weekend_penalty(s)).collect(),
            warm_start: None,
            weights,
        }
    }

    /// Journées-personne qu'il est possible d'affecter : min(disponibles, minimum)
    /// sommé sur la période.
    #[cfg_attr(not(feature = "optimizer"), allow(dead_code))]
    fn demand(&self) -> usize {
        (0..self.num_days)
            .map(|d| {
                (0..self.num_staff)
                    .filter(|s| self.available[s * self.num_days + d])
                    .count()
                    .min(self.min_staff)
            })
            .sum()
    }
}

#[cfg(feature = "optimizer")]
fn run_with_budget(job: IlpJob, budget: Duration) -> Result<Vec<(usize, usize)>, SolverFailure> {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::mpsc::{channel, RecvTimeoutError};
    use std::thread;

    let (tx, rx) = channel();
    thread::Builder::new()
        .name("garde-milp".into())
        .spawn(move || {
            let res = catch_unwind(AssertUnwindSafe(|| milp::run_job(&job, budget)))
                .unwrap_or_else(|_| Err(SolverFailure::Backend("solver panicked".into())));
            // le récepteur a pu abandonner après le délai de garde
            let _ = tx.send(res);
        })
        .map_err(|e| SolverFailure::Backend(format!("spawning solver thread: {e}")))?;

    match rx.recv_timeout(backstop(budget)) {
        Ok(res) => res,
        Err(RecvTimeoutError::Timeout) => Err(SolverFailure::Timeout(budget)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(SolverFailure::Backend("solver thread exited without result".into()))
        }
    }
}

#[cfg(not(feature = "optimizer"))]
fn run_with_budget(_job: IlpJob, _budget: Duration) -> Result<Vec<(usize, usize)>, SolverFailure> {
    Err(SolverFailure::Unavailable(
        "built without the `optimizer` feature",
    ))
}

#[cfg(feature = "optimizer")]
mod milp {
    use super::IlpJob;
    use crate::error::SolverFailure;
    use good_lp::{
        microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
        SolutionStatus, SolverModel, Variable, WithInitialSolution, WithTimeLimit,
    };
    use std::time::Duration;
    use tracing::{debug, info};

    fn sum<I: IntoIterator<Item = Variable>>(vars: I) -> Expression {
        vars.into_iter()
            .fold(Expression::from(0.0), |acc, v| acc + v)
    }

    pub(super) fn run_job(
        job: &IlpJob,
        budget: Duration,
    ) -> Result<Vec<(usize, usize)>, SolverFailure> {
        let (n, days) = (job.num_staff, job.num_days);
        let at = |s: usize, d: usize| s * days + d;
        let w = job.weights;

        // personnes disponibles au moins un jour : seules elles entrent dans l'équité
        let eligible: Vec<usize> = (0..n)
            .filter(|s| (0..days).any(|d| job.available[at(*s, d)]))
            .collect();
        let demand = job.demand();

        let mut vars = ProblemVariables::new();

        let x: Vec<Option<Variable>> = (0..n * days)
            .map(|i| job.available[i].then(|| vars.add(variable().binary())))
            .collect();
        let shortfall: Vec<Variable> = (0..days)
            .map(|_| vars.add(variable().min(0.0)))
            .collect();
        // charges entières : load_min <= ⌊demande/n⌋ ; avec la coupe agrégée
        // plus bas, load_max >= ⌈affectées/n⌉
        let floor = demand.checked_div(eligible.len()).unwrap_or(0);
        let load_max = vars.add(variable().integer().min(0));
        let load_min = vars.add(variable().integer().min(0).max(floor as f64));
        let off_max = vars.add(variable().min(0.0));
        let off_min = vars.add(variable().min(0.0));
        let unmet: Vec<(usize, Variable, &Vec<usize>)> = job
            .specialty_groups
            .iter()
            .enumerate()
            .flat_map(|(d, groups)| groups.iter().map(move |g| (d, g)))
            .map(|(d, g)| (d, vars.add(variable().min(0.0).max(1.0)), g))
            .collect();

        let works = |s: usize, d: usize| x[at(s, d)];

        let weekend_cost = (0..n)
            .flat_map(|s| (0..days).map(move |d| (s, d)))
            .filter(|(_, d)| job.weekend[*d])
            .filter_map(|(s, d)| works(s, d).map(|v| (job.weekend_cost[s], v)))
            .fold(Expression::from(0.0), |acc, (c, v)| acc + c * v);

        let objective = shortfall
            .iter()
            .fold(Expression::from(0.0), |acc, v| acc + w.shortfall * *v)
            + w.workload * load_max
            - w.workload * load_min
            + w.off_days * off_max
            - w.off_days * off_min
            + unmet
                .iter()
                .fold(Expression::from(0.0), |acc, (_, v, _)| acc + w.specialty * *v)
            + w.weekend * weekend_cost;

        let mut model = vars
            .minimise(objective)
            .using(microlp)
            .with_time_limit(budget.as_secs_f64());

        // couverture : pas de sureffectif, le manque va dans shortfall[d]
        for (d, short) in shortfall.iter().enumerate() {
            let assigned = sum((0..n).filter_map(|s| works(s, d)));
            model.add_constraint((assigned.clone() + *short).geq(job.min_staff as f64));
            model.add_constraint(assigned.leq(job.min_staff as f64));
        }

        // équité : écart max-min des charges, et des week-ends/fériés
        // (historique compris)
        for &s in &eligible {
            let load = sum((0..days).filter_map(|d| works(s, d)));
            model.add_constraint((load.clone() - load_max).leq(0.0));
            model.add_constraint((load - load_min).geq(0.0));

            let history = job.off_history[s] as f64;
            let off = sum((0..days).filter(|d| job.off_day[*d]).filter_map(|d| works(s, d)));
            model.add_constraint((off.clone() - off_max).leq(-history));
            model.add_constraint((off - off_min).geq(-history));
        }
        // la charge maximale couvre la moyenne (coupe agrégée)
        if !eligible.is_empty() {
            let total = sum(x.iter().flatten().copied());
            let k = eligible.len() as f64;
            model.add_constraint((total.clone() - k * load_max).leq(0.0));
            model.add_constraint((total - k * load_min).geq(0.0));
        }

        if let Some(limit) = job.max_consecutive {
            for s in 0..n {
                for start in 0..days.saturating_sub(limit) {
                    let window: Vec<Variable> =
                        (start..=start + limit).filter_map(|d| works(s, d)).collect();
                    if window.len() > limit {
                        model.add_constraint(sum(window).leq(limit as f64));
                    }
                }
            }
        }

        // fin de séquence en d => pas de reprise avant d + rest + 1
        if let Some(rest) = job.min_rest {
            for s in 0..n {
                for d in 0..days {
                    let Some(end) = works(s, d) else { continue };
                    for j in 2..=rest {
                        if d + j >= days {
                            break;
                        }
                        let Some(resume) = works(s, d + j) else { continue };
                        let mut expr = Expression::from(0.0) + end + resume;
                        if let Some(next) = works(s, d + 1) {
                            expr = expr - next;
                        }
                        model.add_constraint(expr.leq(1.0));
                    }
                }
            }
        }

        for (d, miss, group) in &unmet {
            let covered = sum(group.iter().filter_map(|s| works(*s, *d)));
            model.add_constraint((covered + *miss).geq(1.0));
        }

        if let Some(start) = &job.warm_start {
            let hint: Vec<(Variable, f64)> = x
                .iter()
                .zip(start)
                .filter_map(|(v, on)| v.map(|v| (v, if *on { 1.0 } else { 0.0 })))
                .collect();
            model = model.with_initial_solution(hint);
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => SolverFailure::Infeasible,
            ResolutionError::Other(reason) if reason.contains("Time limit") => {
                SolverFailure::Timeout(budget)
            }
            other => SolverFailure::Backend(other.to_string()),
        })?;
        match solution.status() {
            SolutionStatus::Optimal => debug!("integer program solved to optimality"),
            SolutionStatus::GapLimit => debug!("integer program within gap limit"),
            SolutionStatus::TimeLimit => {
                info!(?budget, "time budget reached, keeping best incumbent")
            }
        }

        let mut chosen = Vec::new();
        for s in 0..n {
            for d in 0..days {
                if let Some(v) = works(s, d) {
                    if solution.value(v) >= 0.5 {
                        chosen.push((s, d));
                    }
                }
            }
        }
        Ok(chosen)
    }
}
