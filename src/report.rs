use crate::error::SolverFailure;
use crate::model::{Assignment, RosterRules, SolverKind, StaffId};
use crate::scheduler::RosterOutcome;
use crate::stats::RosterStatistics;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use uuid::Uuid;

/// Journée du roster fusionnée avec ses métadonnées calendaires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEntry {
    pub staff: Vec<StaffId>,
    #[serde(default)]
    pub specialties: BTreeSet<String>,
    pub available_count: usize,
    pub is_weekend: bool,
    pub is_holiday: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday_name: Option<String>,
    #[serde(default)]
    pub observed: bool,
}

/// Sortie normalisée remise à l'export et à l'affichage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub solver: SolverKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<String>,
    pub rules: RosterRules,
    pub days: BTreeMap<NaiveDate, DayEntry>,
    pub statistics: RosterStatistics,
}

impl RosterReport {
    pub fn build(outcome: &RosterOutcome, generated_at: DateTime<Utc>) -> Self {
        let problem = &outcome.problem;
        let availability = problem.availability();
        let by_id: BTreeMap<&StaffId, &BTreeSet<String>> = problem
            .staff()
            .iter()
            .map(|m| (&m.id, &m.specialties))
            .collect();

        let days = problem
            .calendar()
            .iter()
            .map(|meta| {
                let staff = outcome.assignment.staff_on(meta.date).to_vec();
                let specialties = staff
                    .iter()
                    .filter_map(|id| by_id.get(id))
                    .flat_map(|tags| tags.iter().cloned())
                    .collect();
                let entry = DayEntry {
                    staff,
                    specialties,
                    available_count: availability.available_on(meta.date).len(),
                    is_weekend: meta.is_weekend,
                    is_holiday: meta.is_holiday,
                    holiday_name: meta.holiday_name.clone(),
                    observed: meta.observed,
                };
                (meta.date, entry)
            })
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            generated_at,
            solver: outcome.assignment.solver(),
            fallbacks: outcome.failures.iter().map(SolverFailure::to_string).collect(),
            rules: outcome.problem.rules().clone(),
            days,
            statistics: outcome.statistics.clone(),
        }
    }

    /// Reconstruit l'affectation (pour revérification).
    pub fn assignment(&self) -> Assignment {
        let days = self
            .days
            .iter()
            .map(|(date, day)| (*date, day.staff.clone()))
            .collect();
        Assignment::new(self.solver, days)
    }
}

/// Permet de customiser le rendu du rapport (texte, courriel, etc.).
pub trait ReportRenderer {
    fn render(&self, report: &RosterReport) -> String;
}

/// Résumé texte pour le terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextSummary;

impl ReportRenderer for TextSummary {
    fn render(&self, report: &RosterReport) -> String {
        let stats = &report.statistics;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Roster {} -> {} ({} days, min {} staff/day, solver: {})",
            report.rules.start,
            report.rules.end,
            stats.total_days,
            report.rules.min_staff_per_day,
            report.solver
        );
        for reason in &report.fallbacks {
            let _ = writeln!(out, "fallback: {reason}");
        }
        for (date, day) in &report.days {
            let mut flags = String::new();
            if day.is_weekend {
                flags.push_str(" [weekend]");
            }
            if let Some(name) = &day.holiday_name {
                let _ = write!(flags, " [{name}]");
            }
            let staff: Vec<&str> = day.staff.iter().map(StaffId::as_str).collect();
            let short = if day.staff.len() < report.rules.min_staff() {
                " !"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "{date} {} | {}{short}{flags}",
                date.format("%a"),
                if staff.is_empty() {
                    "-".to_owned()
                } else {
                    staff.join(", ")
                }
            );
        }
        let _ = writeln!(
            out,
            "coverage: {:.1}% ({} understaffed of {})",
            stats.coverage_percentage, stats.days_understaffed, stats.total_days
        );
        for (id, count) in &stats.staff_work_distribution {
            let _ = writeln!(out, "  {id}: {count}");
        }
        out
    }
}
