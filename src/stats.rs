//! Indicateurs de qualité d'un roster terminé.
//!
//! Fonction pure de l'affectation, des règles et du calendrier : peut être
//! recalculée à tout moment.

use crate::constraints::mean_and_variance;
use crate::model::{Assignment, DayMetadata, RosterRules, StaffId, StaffMember};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Seuil d'équité : variance des charges < 10 % de la moyenne.
pub const BALANCE_TOLERANCE: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterStatistics {
    pub total_days: usize,
    pub days_covered: usize,
    pub days_understaffed: usize,
    pub coverage_percentage: f64,
    /// Jours affectés par personne, zéros compris.
    pub staff_work_distribution: BTreeMap<StaffId, usize>,
    /// Week-ends et fériés affectés par personne.
    pub off_day_distribution: BTreeMap<StaffId, usize>,
    pub weekend_days: usize,
    pub holiday_days: usize,
    pub workload_mean: f64,
    pub workload_variance: f64,
    pub workload_balanced: bool,
}

impl RosterStatistics {
    pub fn compute(
        assignment: &Assignment,
        rules: &RosterRules,
        calendar: &[DayMetadata],
        staff: &[StaffMember],
    ) -> Self {
        let min_staff = rules.min_staff();
        let total_days = rules.total_days();
        let days_understaffed = rules
            .dates()
            .filter(|d| assignment.staff_on(*d).len() < min_staff)
            .count();
        let days_covered = total_days - days_understaffed;
        let coverage_percentage = if total_days == 0 {
            0.0
        } else {
            100.0 * days_covered as f64 / total_days as f64
        };

        let off_days: HashMap<NaiveDate, bool> =
            calendar.iter().map(|d| (d.date, d.is_off_day())).collect();

        let mut staff_work_distribution: BTreeMap<StaffId, usize> =
            staff.iter().map(|m| (m.id.clone(), 0)).collect();
        let mut off_day_distribution = staff_work_distribution.clone();
        for (date, ids) in assignment.iter() {
            let off = off_days.get(date).copied().unwrap_or(false);
            for id in ids {
                *staff_work_distribution.entry(id.clone()).or_default() += 1;
                let entry = off_day_distribution.entry(id.clone()).or_default();
                if off {
                    *entry += 1;
                }
            }
        }

        let loads: Vec<usize> = staff_work_distribution.values().copied().collect();
        let (workload_mean, workload_variance) = mean_and_variance(&loads);
        let workload_balanced = workload_variance <= f64::EPSILON
            || workload_variance < BALANCE_TOLERANCE * workload_mean;

        Self {
            total_days,
            days_covered,
            days_understaffed,
            coverage_percentage,
            staff_work_distribution,
            off_day_distribution,
            weekend_days: calendar.iter().filter(|d| d.is_weekend).count(),
            holiday_days: calendar.iter().filter(|d| d.is_holiday).count(),
            workload_mean,
            workload_variance,
            workload_balanced,
        }
    }

    /// Écart entre la charge maximale et la charge minimale.
    pub fn workload_spread(&self) -> usize {
        let max = self.staff_work_distribution.values().max().copied().unwrap_or(0);
        let min = self.staff_work_distribution.values().min().copied().unwrap_or(0);
        max - min
    }
}
