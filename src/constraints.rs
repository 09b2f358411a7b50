//! Modèle de contraintes partagé par les deux solveurs.
//!
//! Les contraintes dures répondent à `is_feasible` pour un jour candidat ;
//! les contraintes souples renvoient une pénalité pondérée, sommée en un
//! objectif unique. L'effectif minimum est dur « en pratique seulement » :
//! un jour reste faisable quand tout le personnel disponible est déjà affecté,
//! le manque est alors signalé comme sous-effectif.

use crate::model::{Assignment, SolverKind, StaffId};
use crate::problem::RosterProblem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Grille personne × jour d'une affectation candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkGrid {
    staff: usize,
    days: usize,
    cells: Vec<bool>,
}

impl WorkGrid {
    pub fn new(staff: usize, days: usize) -> Self {
        Self {
            staff,
            days,
            cells: vec![false; staff * days],
        }
    }

    pub fn for_problem(problem: &RosterProblem) -> Self {
        Self::new(problem.num_staff(), problem.num_days())
    }

    /// Convertit une affectation. Les identifiants inconnus ou les dates hors
    /// période sont renvoyés à part.
    pub fn from_assignment(
        problem: &RosterProblem,
        assignment: &Assignment,
    ) -> (Self, Vec<(StaffId, chrono::NaiveDate)>) {
        let availability = problem.availability();
        let mut grid = Self::for_problem(problem);
        let mut unknown = Vec::new();
        for (date, staff) in assignment.iter() {
            for id in staff {
                match (availability.staff_index(id), availability.day_index(*date)) {
                    (Some(s), Some(d)) => grid.set(s, d, true),
                    _ => unknown.push((id.clone(), *date)),
                }
            }
        }
        (grid, unknown)
    }

    pub fn num_staff(&self) -> usize {
        self.staff
    }

    pub fn num_days(&self) -> usize {
        self.days
    }

    #[inline]
    pub fn works(&self, staff: usize, day: usize) -> bool {
        self.cells[staff * self.days + day]
    }

    #[inline]
    pub fn set(&mut self, staff: usize, day: usize, value: bool) {
        self.cells[staff * self.days + day] = value;
    }

    pub fn day_staff(&self, day: usize) -> Vec<usize> {
        (0..self.staff).filter(|s| self.works(*s, day)).collect()
    }

    pub fn count_on(&self, day: usize) -> usize {
        (0..self.staff).filter(|s| self.works(*s, day)).count()
    }

    pub fn workload(&self, staff: usize) -> usize {
        (0..self.days).filter(|d| self.works(staff, *d)).count()
    }

    /// Personnel listé dans l'ordre d'entrée.
    pub fn into_assignment(&self, problem: &RosterProblem, solver: SolverKind) -> Assignment {
        let days = (0..self.days)
            .map(|d| {
                let staff = self
                    .day_staff(d)
                    .into_iter()
                    .map(|s| problem.staff()[s].id.clone())
                    .collect();
                (problem.date_at(d), staff)
            })
            .collect();
        Assignment::new(solver, days)
    }
}

/// Contexte d'évaluation : le problème et l'affectation candidate.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub problem: &'a RosterProblem,
    pub grid: &'a WorkGrid,
}

impl<'a> EvalContext<'a> {
    pub fn new(problem: &'a RosterProblem, grid: &'a WorkGrid) -> Self {
        Self { problem, grid }
    }

    /// `day_staff` remplace la colonne `day` de la grille.
    fn works(&self, day_staff: &[usize], day: usize, staff: usize, other: usize) -> bool {
        if other == day {
            day_staff.contains(&staff)
        } else {
            self.grid.works(staff, other)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Unavailable,
    ConsecutiveLimit,
    RestViolation,
    UnknownStaff,
    Understaffed,
}

impl ViolationKind {
    /// Le sous-effectif est un résultat normal, pas un rejet.
    pub fn is_blocking(self) -> bool {
        !matches!(self, ViolationKind::Understaffed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::Unavailable => "unavailable",
            ViolationKind::ConsecutiveLimit => "consecutive",
            ViolationKind::RestViolation => "rest",
            ViolationKind::UnknownStaff => "unknown",
            ViolationKind::Understaffed => "understaffed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub date: chrono::NaiveDate,
    pub staff: Option<StaffId>,
    pub kind: ViolationKind,
}

pub trait HardConstraint: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ViolationKind;

    /// `day_staff` est l'équipe candidate du jour `day` ; les autres jours
    /// sont lus dans `ctx.grid`.
    fn is_feasible(&self, day_staff: &[usize], day: usize, ctx: &EvalContext<'_>) -> bool;

    /// Peut-on ajouter `staff` au jour `day` ?
    fn admits(&self, staff: usize, day: usize, ctx: &EvalContext<'_>) -> bool {
        self.is_feasible(&[staff], day, ctx)
    }

    fn violations(&self, ctx: &EvalContext<'_>) -> Vec<Violation> {
        let mut out = Vec::new();
        for day in 0..ctx.grid.num_days() {
            for staff in ctx.grid.day_staff(day) {
                if !self.is_feasible(&[staff], day, ctx) {
                    out.push(Violation {
                        date: ctx.problem.date_at(day),
                        staff: Some(ctx.problem.staff()[staff].id.clone()),
                        kind: self.kind(),
                    });
                }
            }
        }
        out
    }
}

pub trait SoftConstraint: Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f64;
    /// Pénalité brute (non pondérée) de l'affectation candidate.
    fn penalty(&self, ctx: &EvalContext<'_>) -> f64;
}

// ---------------------------------------------------------------------------
// Contraintes dures

#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityConstraint;

impl HardConstraint for AvailabilityConstraint {
    fn name(&self) -> &'static str {
        "availability"
    }

    fn kind(&self) -> ViolationKind {
        ViolationKind::Unavailable
    }

    fn is_feasible(&self, day_staff: &[usize], day: usize, ctx: &EvalContext<'_>) -> bool {
        let availability = ctx.problem.availability();
        day_staff.iter().all(|s| availability.available_at(*s, day))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MinimumStaffConstraint {
    pub min_staff: usize,
}

impl HardConstraint for MinimumStaffConstraint {
    fn name(&self) -> &'static str {
        "minimum_staff"
    }

    fn kind(&self) -> ViolationKind {
        ViolationKind::Understaffed
    }

    fn is_feasible(&self, day_staff: &[usize], day: usize, ctx: &EvalContext<'_>) -> bool {
        if day_staff.len() >= self.min_staff {
            return true;
        }
        ctx.problem
            .available_staff(day)
            .iter()
            .all(|s| day_staff.contains(s))
    }

    fn admits(&self, _staff: usize, _day: usize, _ctx: &EvalContext<'_>) -> bool {
        true
    }

    fn violations(&self, ctx: &EvalContext<'_>) -> Vec<Violation> {
        (0..ctx.grid.num_days())
            .filter(|d| ctx.grid.count_on(*d) < self.min_staff)
            .map(|d| Violation {
                date: ctx.problem.date_at(d),
                staff: None,
                kind: ViolationKind::Understaffed,
            })
            .collect()
    }
}

impl SoftConstraint for MinimumStaffConstraint {
    fn name(&self) -> &'static str {
        "coverage_shortfall"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn penalty(&self, ctx: &EvalContext<'_>) -> f64 {
        (0..ctx.grid.num_days())
            .map(|d| self.min_staff.saturating_sub(ctx.grid.count_on(d)) as f64)
            .sum()
    }
}

/// Au plus `max_days` jours travaillés d'affilée.
#[derive(Debug, Clone, Copy)]
pub struct MaxConsecutiveDaysConstraint {
    pub max_days: usize,
}

impl HardConstraint for MaxConsecutiveDaysConstraint {
    fn name(&self) -> &'static str {
        "max_consecutive_days"
    }

    fn kind(&self) -> ViolationKind {
        ViolationKind::ConsecutiveLimit
    }

    fn is_feasible(&self, day_staff: &[usize], day: usize, ctx: &EvalContext<'_>) -> bool {
        let days = ctx.grid.num_days();
        day_staff.iter().all(|&s| {
            let before = (0..day)
                .rev()
                .take_while(|d| ctx.works(day_staff, day, s, *d))
                .count();
            let after = (day + 1..days)
                .take_while(|d| ctx.works(day_staff, day, s, *d))
                .count();
            before + 1 + after <= self.max_days
        })
    }
}

/// Au moins `min_days` jours de repos entre deux séquences de travail.
#[derive(Debug, Clone, Copy)]
pub struct MinRestPeriodConstraint {
    pub min_days: usize,
}

impl HardConstraint for MinRestPeriodConstraint {
    fn name(&self) -> &'static str {
        "min_rest_period"
    }

    fn kind(&self) -> ViolationKind {
        ViolationKind::RestViolation
    }

    fn is_feasible(&self, day_staff: &[usize], day: usize, ctx: &EvalContext<'_>) -> bool {
        let days = ctx.grid.num_days();
        day_staff.iter().all(|&s| {
            let previous = (0..day).rev().find(|d| ctx.works(day_staff, day, s, *d));
            let next = (day + 1..days).find(|d| ctx.works(day_staff, day, s, *d));
            // jours adjacents : même séquence
            let rest_before = previous.map_or(true, |p| p + 1 == day || day - p - 1 >= self.min_days);
            let rest_after = next.map_or(true, |n| n == day + 1 || n - day - 1 >= self.min_days);
            rest_before && rest_after
        })
    }
}

// ---------------------------------------------------------------------------
// Contraintes souples

/// Variance (population) des charges de travail.
#[derive(Debug, Clone, Copy)]
pub struct FairWorkloadConstraint {
    pub weight: f64,
}

impl SoftConstraint for FairWorkloadConstraint {
    fn name(&self) -> &'static str {
        "fair_workload"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn penalty(&self, ctx: &EvalContext<'_>) -> f64 {
        let loads: Vec<usize> = (0..ctx.grid.num_staff())
            .map(|s| ctx.grid.workload(s))
            .collect();
        mean_and_variance(&loads).1
    }
}

/// Nombre de couples (jour, spécialité) disponibles mais non couverts.
#[derive(Debug, Clone, Copy)]
pub struct SpecialtyCoverageConstraint {
    pub weight: f64,
}

impl SpecialtyCoverageConstraint {
    pub fn unmet_on(&self, day: usize, ctx: &EvalContext<'_>) -> usize {
        let staff = ctx.problem.staff();
        let available: BTreeSet<&str> = ctx
            .problem
            .available_staff(day)
            .into_iter()
            .flat_map(|s| staff[s].specialties.iter().map(String::as_str))
            .collect();
        let covered: BTreeSet<&str> = ctx
            .grid
            .day_staff(day)
            .into_iter()
            .flat_map(|s| staff[s].specialties.iter().map(String::as_str))
            .collect();
        available.difference(&covered).count()
    }
}

impl SoftConstraint for SpecialtyCoverageConstraint {
    fn name(&self) -> &'static str {
        "specialty_coverage"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn penalty(&self, ctx: &EvalContext<'_>) -> f64 {
        (0..ctx.grid.num_days())
            .map(|d| self.unmet_on(d, ctx) as f64)
            .sum()
    }
}

/// Répartition des week-ends et jours fériés travaillés, historique compris :
/// la variance porte sur (historique + période courante).
#[derive(Debug, Clone, Copy)]
pub struct OffDayFairnessConstraint {
    pub weight: f64,
}

impl SoftConstraint for OffDayFairnessConstraint {
    fn name(&self) -> &'static str {
        "weekend_holiday_fairness"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn penalty(&self, ctx: &EvalContext<'_>) -> f64 {
        let calendar = ctx.problem.calendar();
        let counts: Vec<usize> = (0..ctx.grid.num_staff())
            .map(|s| {
                ctx.problem.off_day_history(s)
                    + (0..ctx.grid.num_days())
                        .filter(|d| calendar[*d].is_off_day() && ctx.grid.works(s, *d))
                        .count()
            })
            .collect();
        mean_and_variance(&counts).1
    }
}

/// Coût des gardes de week-end selon la préférence de chacun.
#[derive(Debug, Clone, Copy)]
pub struct WeekendPreferenceConstraint {
    pub weight: f64,
}

impl SoftConstraint for WeekendPreferenceConstraint {
    fn name(&self) -> &'static str {
        "weekend_preference"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn penalty(&self, ctx: &EvalContext<'_>) -> f64 {
        let calendar = ctx.problem.calendar();
        (0..ctx.grid.num_days())
            .filter(|d| calendar[*d].is_weekend)
            .flat_map(|d| ctx.grid.day_staff(d))
            .map(|s| ctx.problem.weekend_penalty(s))
            .sum()
    }
}

pub fn mean_and_variance(values: &[usize]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    let variance = values
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance)
}

// ---------------------------------------------------------------------------

/// Pondération de l'objectif. Le manque d'effectif domine, puis l'équité de
/// charge, puis la couverture des spécialités ; l'équité week-end et les
/// préférences départagent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    #[serde(default = "ObjectiveWeights::default_shortfall")]
    pub shortfall: f64,
    #[serde(default = "ObjectiveWeights::default_workload")]
    pub workload: f64,
    #[serde(default = "ObjectiveWeights::default_specialty")]
    pub specialty: f64,
    #[serde(default = "ObjectiveWeights::default_off_days")]
    pub off_days: f64,
    /// Multiplie le coût week-end (0 à 10) de chaque garde de week-end.
    #[serde(default = "ObjectiveWeights::default_weekend")]
    pub weekend: f64,
}

impl ObjectiveWeights {
    fn default_shortfall() -> f64 {
        1000.0
    }
    fn default_workload() -> f64 {
        10.0
    }
    fn default_specialty() -> f64 {
        1.0
    }
    fn default_off_days() -> f64 {
        0.25
    }
    fn default_weekend() -> f64 {
        0.02
    }
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            shortfall: Self::default_shortfall(),
            workload: Self::default_workload(),
            specialty: Self::default_specialty(),
            off_days: Self::default_off_days(),
            weekend: Self::default_weekend(),
        }
    }
}

struct WeightedShortfall {
    inner: MinimumStaffConstraint,
    weight: f64,
}

impl SoftConstraint for WeightedShortfall {
    fn name(&self) -> &'static str {
        SoftConstraint::name(&self.inner)
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn penalty(&self, ctx: &EvalContext<'_>) -> f64 {
        self.inner.penalty(ctx)
    }
}

/// Ensemble de contraintes dérivé des règles d'un run.
pub struct ConstraintSet {
    hard: Vec<Box<dyn HardConstraint>>,
    soft: Vec<Box<dyn SoftConstraint>>,
}

impl std::fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("hard", &self.hard.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("soft", &self.soft.iter().map(|c| c.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ConstraintSet {
    pub fn for_problem(problem: &RosterProblem, weights: &ObjectiveWeights) -> Self {
        let rules = problem.rules();
        let minimum = MinimumStaffConstraint {
            min_staff: rules.min_staff(),
        };

        let mut hard: Vec<Box<dyn HardConstraint>> =
            vec![Box::new(AvailabilityConstraint), Box::new(minimum)];
        if let Some(max_days) = rules.max_consecutive_days {
            hard.push(Box::new(MaxConsecutiveDaysConstraint {
                max_days: max_days as usize,
            }));
        }
        if let Some(min_days) = rules.min_rest_days.filter(|k| *k > 0) {
            hard.push(Box::new(MinRestPeriodConstraint {
                min_days: min_days as usize,
            }));
        }

        let mut soft: Vec<Box<dyn SoftConstraint>> = vec![
            Box::new(WeightedShortfall {
                inner: minimum,
                weight: weights.shortfall,
            }),
            Box::new(FairWorkloadConstraint {
                weight: weights.workload,
            }),
        ];
        if rules.specialty_required {
            soft.push(Box::new(SpecialtyCoverageConstraint {
                weight: weights.specialty,
            }));
        }
        soft.push(Box::new(OffDayFairnessConstraint {
            weight: weights.off_days,
        }));
        soft.push(Box::new(WeekendPreferenceConstraint {
            weight: weights.weekend,
        }));

        Self { hard, soft }
    }

    pub fn hard(&self) -> impl Iterator<Item = &dyn HardConstraint> {
        self.hard.iter().map(|c| c.as_ref())
    }

    pub fn soft(&self) -> impl Iterator<Item = &dyn SoftConstraint> {
        self.soft.iter().map(|c| c.as_ref())
    }

    pub fn is_feasible(&self, day_staff: &[usize], day: usize, ctx: &EvalContext<'_>) -> bool {
        self.hard.iter().all(|c| c.is_feasible(day_staff, day, ctx))
    }

    pub fn admits(&self, staff: usize, day: usize, ctx: &EvalContext<'_>) -> bool {
        self.hard.iter().all(|c| c.admits(staff, day, ctx))
    }

    /// Pénalités brutes par contrainte souple.
    pub fn penalties(&self, ctx: &EvalContext<'_>) -> BTreeMap<&'static str, f64> {
        self.soft.iter().map(|c| (c.name(), c.penalty(ctx))).collect()
    }

    pub fn objective(&self, ctx: &EvalContext<'_>) -> f64 {
        self.soft.iter().map(|c| c.weight() * c.penalty(ctx)).sum()
    }

    /// Toutes les violations, sous-effectif compris, triées par date.
    pub fn violations(&self, ctx: &EvalContext<'_>) -> Vec<Violation> {
        let mut out: Vec<Violation> = self.hard.iter().flat_map(|c| c.violations(ctx)).collect();
        out.sort_by(|a, b| (a.date, a.kind, &a.staff).cmp(&(b.date, b.kind, &b.staff)));
        out
    }
}
