#![forbid(unsafe_code)]
use chrono::NaiveDate;
use garde::constraints::EvalContext;
use garde::scheduler::{detect_violations, blocking_count};
use garde::{
    Assignment, ConstraintSet, EngineOptions, GreedySolver, HolidayCatalog, LeaveInterval,
    ObjectiveWeights, OptimizingSolver, RosterEngine, RosterError, RosterInput, RosterProblem,
    RosterRules, Solver, SolverFailure, SolverKind, SolverMode, StaffId, StaffMember,
    StaffPreferences, ValidationError, ViolationKind, WorkGrid,
};
use std::collections::BTreeMap;
use std::time::Duration;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn ids(names: &[&str]) -> Vec<StaffId> {
    names.iter().map(StaffId::new).collect()
}

fn members(names: &[&str]) -> Vec<StaffMember> {
    names.iter().map(|n| StaffMember::new(n, *n)).collect()
}

fn problem(staff: Vec<StaffMember>, leaves: &[LeaveInterval], rules: RosterRules) -> RosterProblem {
    let resolver = HolidayCatalog::builtin().resolver("SG").unwrap();
    RosterProblem::new(staff, leaves, rules, &resolver).unwrap()
}

fn input(staff: Vec<StaffMember>, leaves: Vec<LeaveInterval>, rules: RosterRules) -> RosterInput {
    RosterInput::new(staff, leaves, rules, "SG")
}

fn greedy_engine() -> RosterEngine {
    RosterEngine::new(EngineOptions {
        mode: SolverMode::Greedy,
        ..EngineOptions::default()
    })
}

// ---------------------------------------------------------------------------
// Glouton : résultats exacts

#[test]
fn greedy_balances_three_staff_over_a_week() {
    let p = problem(members(&["A", "B", "C"]), &[], RosterRules::new(d(3), d(9), 2));
    let a = GreedySolver.assign(&p);

    assert_eq!(a.solver(), SolverKind::Greedy);
    assert_eq!(a.staff_on(d(3)), ids(&["A", "B"]).as_slice());
    assert_eq!(a.staff_on(d(4)), ids(&["A", "C"]).as_slice());
    assert_eq!(a.staff_on(d(5)), ids(&["B", "C"]).as_slice());
    for date in p.rules().dates() {
        assert_eq!(a.staff_on(date).len(), 2);
    }
    let loads: Vec<usize> = ids(&["A", "B", "C"])
        .iter()
        .map(|id| a.iter().filter(|(_, s)| s.contains(id)).count())
        .collect();
    assert_eq!(loads, vec![5, 5, 4]);
}

#[test]
fn greedy_covers_with_remaining_staff_during_leave() {
    let leave = LeaveInterval::new(StaffId::new("A"), d(3), Some(d(5))).unwrap();
    let p = problem(members(&["A", "B"]), &[leave], RosterRules::new(d(3), d(7), 1));
    let a = GreedySolver.assign(&p);

    for day in 3..=5 {
        assert_eq!(a.staff_on(d(day)), ids(&["B"]).as_slice());
    }
    assert_eq!(a.staff_on(d(6)), ids(&["A"]).as_slice());
    assert_eq!(a.staff_on(d(7)), ids(&["A"]).as_slice());
}

#[test]
fn greedy_assigns_everyone_when_short() {
    let p = problem(members(&["A", "B"]), &[], RosterRules::new(d(3), d(9), 3));
    let a = GreedySolver.assign(&p);
    for date in p.rules().dates() {
        assert_eq!(a.staff_on(date), ids(&["A", "B"]).as_slice());
    }
    let violations = detect_violations(&p, &a);
    assert_eq!(violations.len(), 7);
    assert!(violations.iter().all(|v| v.kind == ViolationKind::Understaffed));
    assert_eq!(blocking_count(&violations), 0);
}

#[test]
fn greedy_spreads_specialties() {
    let staff = vec![
        StaffMember::new("A", "Alice").with_specialty("Cardio"),
        StaffMember::new("B", "Bob").with_specialty("Cardio"),
        StaffMember::new("C", "Chloe").with_specialty("Ortho"),
        StaffMember::new("D", "Dan").with_specialty("Ortho"),
    ];
    let mut rules = RosterRules::new(d(3), d(16), 2);
    rules.specialty_required = true;
    let p = problem(staff, &[], rules);
    let a = GreedySolver.assign(&p);

    assert_eq!(a.staff_on(d(3)), ids(&["A", "C"]).as_slice());
    assert_eq!(a.staff_on(d(4)), ids(&["B", "D"]).as_slice());
    for (_, day) in a.iter() {
        assert_eq!(day.len(), 2);
        assert!(day.iter().any(|s| s.as_str() == "A" || s.as_str() == "B"));
        assert!(day.iter().any(|s| s.as_str() == "C" || s.as_str() == "D"));
    }
}

#[test]
fn greedy_respects_consecutive_limit_and_rest() {
    let mut rules = RosterRules::new(d(3), d(16), 1);
    rules.max_consecutive_days = Some(2);
    rules.min_rest_days = Some(2);
    let p = problem(members(&["A", "B"]), &[], rules);
    let a = GreedySolver.assign(&p);

    assert_eq!(blocking_count(&detect_violations(&p, &a)), 0);
    for (_, day) in a.iter() {
        assert!(day.len() <= 1);
    }
}

#[test]
fn greedy_is_deterministic() {
    let leaves = vec![
        LeaveInterval::new(StaffId::new("B"), d(6), Some(d(8))).unwrap(),
        LeaveInterval::new(StaffId::new("D"), d(10), None).unwrap(),
    ];
    let mut rules = RosterRules::new(d(1), d(31), 2);
    rules.max_consecutive_days = Some(3);
    let p = problem(members(&["D", "B", "A", "C"]), &leaves, rules);

    let first = serde_json::to_string(&GreedySolver.assign(&p)).unwrap();
    for _ in 0..5 {
        assert_eq!(serde_json::to_string(&GreedySolver.assign(&p)).unwrap(), first);
    }
}

// ---------------------------------------------------------------------------
// Moteur : invariants quel que soit le solveur retenu

#[test]
fn engine_staffs_exactly_the_minimum_and_balances() {
    let out = RosterEngine::default()
        .run(
            input(members(&["A", "B", "C"]), vec![], RosterRules::new(d(3), d(9), 2)),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    for date in out.problem.rules().dates() {
        assert_eq!(out.assignment.staff_on(date).len(), 2);
    }
    assert!(out.statistics.workload_spread() <= 1);
    assert_eq!(out.statistics.days_understaffed, 0);
    assert_eq!(out.statistics.coverage_percentage, 100.0);
}

#[test]
fn engine_uses_available_staff_during_leave() {
    let leave = LeaveInterval::new(StaffId::new("A"), d(3), Some(d(5))).unwrap();
    let out = RosterEngine::default()
        .run(
            input(members(&["A", "B"]), vec![leave], RosterRules::new(d(3), d(7), 1)),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    for day in 3..=5 {
        assert_eq!(out.assignment.staff_on(d(day)), ids(&["B"]).as_slice());
    }
    for day in 6..=7 {
        assert!(!out.assignment.staff_on(d(day)).is_empty());
    }
    assert_eq!(out.statistics.days_understaffed, 0);
}

#[test]
fn engine_reports_understaffing_without_failing() {
    let out = RosterEngine::default()
        .run(
            input(members(&["A", "B"]), vec![], RosterRules::new(d(3), d(9), 3)),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    for (_, day) in out.assignment.iter() {
        assert_eq!(day.len(), 2);
    }
    assert_eq!(out.statistics.days_understaffed, 7);
    assert_eq!(out.statistics.coverage_percentage, 0.0);
    // cas trivial : glouton direct
    assert_eq!(out.assignment.solver(), SolverKind::Greedy);
    assert!(!out.degraded());
}

#[test]
fn engine_covers_both_specialties_daily() {
    let staff = vec![
        StaffMember::new("A", "Alice").with_specialty("Cardio"),
        StaffMember::new("B", "Bob").with_specialty("Cardio"),
        StaffMember::new("C", "Chloe").with_specialty("Ortho"),
        StaffMember::new("D", "Dan").with_specialty("Ortho"),
    ];
    let mut rules = RosterRules::new(d(3), d(9), 2);
    rules.specialty_required = true;
    let out = RosterEngine::default()
        .run(input(staff, vec![], rules), &HolidayCatalog::builtin())
        .unwrap();

    for (_, day) in out.assignment.iter() {
        assert_eq!(day.len(), 2);
        assert!(day.iter().any(|s| s.as_str() == "A" || s.as_str() == "B"));
        assert!(day.iter().any(|s| s.as_str() == "C" || s.as_str() == "D"));
    }
}

#[test]
fn engine_output_has_no_hard_violations() {
    let leaves = vec![
        LeaveInterval::new(StaffId::new("A"), d(10), Some(d(14))).unwrap(),
        LeaveInterval::new(StaffId::new("C"), d(1), Some(d(2))).unwrap(),
    ];
    let mut rules = RosterRules::new(d(1), d(21), 2);
    rules.max_consecutive_days = Some(3);
    rules.min_rest_days = Some(2);
    let out = RosterEngine::default()
        .run(
            input(members(&["A", "B", "C", "D"]), leaves, rules),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    let violations = detect_violations(&out.problem, &out.assignment);
    assert_eq!(blocking_count(&violations), 0);
    assert!(!out.assignment.is_assigned(&StaffId::new("A"), d(12)));
}

#[test]
fn greedy_mode_matches_greedy_solver() {
    let rules = RosterRules::new(d(3), d(16), 2);
    let out = greedy_engine()
        .run(
            input(members(&["A", "B", "C"]), vec![], rules.clone()),
            &HolidayCatalog::builtin(),
        )
        .unwrap();
    let p = problem(members(&["A", "B", "C"]), &[], rules);
    assert_eq!(out.assignment, GreedySolver.assign(&p));
    assert!(out.failures.is_empty());
}

#[test]
#[cfg_attr(not(feature = "optimizer"), ignore = "built without the optimizer")]
fn default_engine_keeps_optimizer_roster_for_a_month() {
    let names = ["A", "B", "C", "D", "E", "F", "G", "H"];
    let leaves = vec![
        LeaveInterval::new(StaffId::new("A"), d(10), Some(d(14))).unwrap(),
        LeaveInterval::new(StaffId::new("E"), d(20), Some(d(22))).unwrap(),
    ];
    let out = RosterEngine::default()
        .run(
            input(members(&names), leaves, RosterRules::new(d(1), d(30), 3)),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    assert_eq!(out.assignment.solver(), SolverKind::Optimizer);
    assert!(!out.degraded(), "{:?}", out.failures);
    assert_eq!(out.statistics.days_understaffed, 0);
    assert!(out.statistics.workload_spread() <= 2);
    assert_eq!(blocking_count(&detect_violations(&out.problem, &out.assignment)), 0);
}

#[test]
#[cfg_attr(not(feature = "optimizer"), ignore = "built without the optimizer")]
fn optimizer_honours_rest_and_consecutive_limits() {
    let leaves = vec![LeaveInterval::new(StaffId::new("B"), d(5), Some(d(8))).unwrap()];
    let mut rules = RosterRules::new(d(1), d(21), 2);
    rules.max_consecutive_days = Some(3);
    rules.min_rest_days = Some(2);
    let p = problem(members(&["A", "B", "C", "D", "E", "F"]), &leaves, rules);

    let solver = OptimizingSolver::new(Duration::from_secs(2), ObjectiveWeights::default());
    let a = solver.solve(&p).unwrap();

    assert_eq!(a.solver(), SolverKind::Optimizer);
    assert_eq!(blocking_count(&detect_violations(&p, &a)), 0);
    for date in p.rules().dates() {
        assert_eq!(a.staff_on(date).len(), 2, "{date}");
    }
}

// ---------------------------------------------------------------------------
// Préférences de week-end et historique

fn optimizer_engine(weights: ObjectiveWeights) -> RosterEngine {
    RosterEngine::new(EngineOptions {
        mode: SolverMode::Optimizer,
        weights,
        ..EngineOptions::default()
    })
}

#[test]
#[cfg_attr(not(feature = "optimizer"), ignore = "built without the optimizer")]
fn weekend_goes_to_the_volunteer() {
    // 1er et 2 mars 2025 : samedi et dimanche
    let prefs = StaffPreferences::default()
        .with_weekend_penalty("A", 10.0)
        .with_weekend_penalty("B", 0.0);
    let weights = ObjectiveWeights {
        weekend: 1.0,
        ..ObjectiveWeights::default()
    };
    let out = optimizer_engine(weights)
        .run(
            input(members(&["A", "B"]), vec![], RosterRules::new(d(1), d(4), 1))
                .with_preferences(prefs),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    assert_eq!(out.assignment.solver(), SolverKind::Optimizer);
    assert_eq!(out.assignment.staff_on(d(1)), ids(&["B"]).as_slice());
    assert_eq!(out.assignment.staff_on(d(2)), ids(&["B"]).as_slice());
    assert_eq!(out.assignment.staff_on(d(3)), ids(&["A"]).as_slice());
    assert_eq!(out.assignment.staff_on(d(4)), ids(&["A"]).as_slice());
}

#[test]
#[cfg_attr(not(feature = "optimizer"), ignore = "built without the optimizer")]
fn off_day_history_shifts_the_weekend_away() {
    let prefs = StaffPreferences::default().with_history("A", 3);
    let out = optimizer_engine(ObjectiveWeights::default())
        .run(
            input(members(&["A", "B"]), vec![], RosterRules::new(d(1), d(4), 1))
                .with_preferences(prefs),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    assert_eq!(out.assignment.staff_on(d(1)), ids(&["B"]).as_slice());
    assert_eq!(out.assignment.staff_on(d(2)), ids(&["B"]).as_slice());
    assert_eq!(out.statistics.off_day_distribution[&StaffId::new("B")], 2);
    assert_eq!(out.statistics.staff_work_distribution[&StaffId::new("A")], 2);
}

#[test]
fn soft_penalties_include_history_and_weekend_cost() {
    let prefs = StaffPreferences::default()
        .with_history("A", 3)
        .with_weekend_penalty("A", 8.0)
        .with_weekend_penalty("Z", 1.0);
    let p = problem(members(&["A", "B"]), &[], RosterRules::new(d(1), d(4), 1))
        .with_preferences(prefs)
        .unwrap();

    let mut days = BTreeMap::new();
    days.insert(d(1), ids(&["A"]));
    days.insert(d(2), ids(&["B"]));
    days.insert(d(3), ids(&["B"]));
    days.insert(d(4), ids(&["A"]));
    let assignment = Assignment::new(SolverKind::Greedy, days);
    let (grid, unknown) = WorkGrid::from_assignment(&p, &assignment);
    assert!(unknown.is_empty());

    let penalties = ConstraintSet::for_problem(&p, &ObjectiveWeights::default())
        .penalties(&EvalContext::new(&p, &grid));
    // week-ends : A 3 + 1, B 0 + 1 -> variance 2.25
    assert_eq!(penalties["weekend_holiday_fairness"], 2.25);
    // A samedi (8) + B dimanche (5 par défaut)
    assert_eq!(penalties["weekend_preference"], 13.0);
}

#[test]
fn out_of_range_weekend_penalty_is_rejected() {
    let prefs = StaffPreferences::default().with_weekend_penalty("A", 11.0);
    let err = greedy_engine()
        .run(
            input(members(&["A"]), vec![], RosterRules::new(d(3), d(4), 1))
                .with_preferences(prefs),
            &HolidayCatalog::builtin(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        RosterError::Validation(ValidationError::InvalidWeekendPenalty("A".into()))
    );
}

struct AlwaysTimesOut;

impl Solver for AlwaysTimesOut {
    fn kind(&self) -> SolverKind {
        SolverKind::Optimizer
    }

    fn solve(&self, _problem: &RosterProblem) -> Result<Assignment, SolverFailure> {
        Err(SolverFailure::Timeout(std::time::Duration::from_millis(1)))
    }
}

struct Overstaffing;

impl Solver for Overstaffing {
    fn kind(&self) -> SolverKind {
        SolverKind::Optimizer
    }

    fn solve(&self, problem: &RosterProblem) -> Result<Assignment, SolverFailure> {
        let everyone: Vec<StaffId> = problem.staff().iter().map(|m| m.id.clone()).collect();
        let days: BTreeMap<NaiveDate, Vec<StaffId>> = problem
            .rules()
            .dates()
            .map(|date| (date, everyone.clone()))
            .collect();
        Ok(Assignment::new(SolverKind::Optimizer, days))
    }
}

#[test]
fn failing_strategy_falls_back_to_greedy() {
    let engine = RosterEngine::with_chain(vec![Box::new(AlwaysTimesOut)]);
    let out = engine
        .run(
            input(members(&["A", "B", "C"]), vec![], RosterRules::new(d(3), d(9), 2)),
            &HolidayCatalog::builtin(),
        )
        .unwrap();

    assert_eq!(out.assignment.solver(), SolverKind::Greedy);
    assert!(out.degraded());
    assert!(matches!(out.failures.as_slice(), [SolverFailure::Timeout(_)]));
    assert_eq!(out.statistics.days_understaffed, 0);
}

#[test]
fn first_successful_strategy_wins() {
    let engine = RosterEngine::with_chain(vec![Box::new(AlwaysTimesOut), Box::new(Overstaffing)]);
    let p = problem(members(&["A", "B"]), &[], RosterRules::new(d(3), d(4), 1));
    let (assignment, failures) = engine.solve(&p);
    assert_eq!(assignment.solver(), SolverKind::Optimizer);
    assert_eq!(assignment.staff_on(d(3)).len(), 2);
    assert_eq!(failures.len(), 1);
}

#[test]
fn invalid_runs_are_rejected_before_solving() {
    let catalog = HolidayCatalog::builtin();
    let engine = greedy_engine();

    let err = engine
        .run(
            input(members(&["A"]), vec![], RosterRules::new(d(3), d(4), 0)),
            &catalog,
        )
        .unwrap_err();
    assert_eq!(err, RosterError::Validation(ValidationError::NonPositiveMinStaff));

    let err = engine
        .run(
            input(members(&["A"]), vec![], RosterRules::new(d(9), d(3), 1)),
            &catalog,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RosterError::Validation(ValidationError::InvalidPeriod { .. })
    ));

    let leave = LeaveInterval::new(StaffId::new("Z"), d(3), None).unwrap();
    let err = engine
        .run(
            input(members(&["A"]), vec![leave], RosterRules::new(d(3), d(4), 1)),
            &catalog,
        )
        .unwrap_err();
    assert_eq!(
        err,
        RosterError::Validation(ValidationError::UnknownStaff("Z".into()))
    );

    let mut bad = input(members(&["A"]), vec![], RosterRules::new(d(3), d(4), 1));
    bad.jurisdiction = "ZZ".into();
    assert!(matches!(
        engine.run(bad, &catalog).unwrap_err(),
        RosterError::Configuration(_)
    ));
}

#[test]
fn check_reports_unknown_and_unavailable_staff() {
    let leave = LeaveInterval::new(StaffId::new("A"), d(3), None).unwrap();
    let p = problem(members(&["A", "B"]), &[leave], RosterRules::new(d(3), d(4), 1));
    let mut days = BTreeMap::new();
    days.insert(d(3), ids(&["A"]));
    days.insert(d(4), ids(&["Z"]));
    let a = Assignment::new(SolverKind::Greedy, days);

    let kinds: Vec<ViolationKind> = detect_violations(&p, &a).iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ViolationKind::Unavailable,
            ViolationKind::UnknownStaff,
            ViolationKind::Understaffed,
        ]
    );
}
