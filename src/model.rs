use crate::error::ValidationError;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifiant fort pour StaffMember
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffId(String);

impl StaffId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().trim().to_owned())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Membre du personnel soignant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub specialties: BTreeSet<String>,
}

impl StaffMember {
    pub fn new<I: AsRef<str>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: StaffId::new(id),
            name: name.into(),
            specialties: BTreeSet::new(),
        }
    }

    pub fn with_specialty<S: AsRef<str>>(mut self, tag: S) -> Self {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() {
            self.specialties.insert(tag.to_owned());
        }
        self
    }

    pub fn has_specialty(&self, tag: &str) -> bool {
        self.specialties.contains(tag)
    }
}

/// Préférences et historique du personnel, facultatifs.
///
/// `weekend_penalty` : coût d'une garde de week-end pour la personne, de 0
/// (volontaire) à 10 (à éviter). `history` : week-ends et fériés déjà
/// travaillés avant la période, pris en compte dans l'équité.
/// Les identifiants absents du personnel sont ignorés.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffPreferences {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weekend_penalty: BTreeMap<StaffId, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub history: BTreeMap<StaffId, usize>,
}

impl StaffPreferences {
    pub const DEFAULT_WEEKEND_PENALTY: f64 = 5.0;
    pub const MAX_WEEKEND_PENALTY: f64 = 10.0;

    pub fn is_empty(&self) -> bool {
        self.weekend_penalty.is_empty() && self.history.is_empty()
    }

    pub fn with_weekend_penalty<I: AsRef<str>>(mut self, staff: I, penalty: f64) -> Self {
        self.weekend_penalty.insert(StaffId::new(staff), penalty);
        self
    }

    pub fn with_history<I: AsRef<str>>(mut self, staff: I, off_days_worked: usize) -> Self {
        self.history.insert(StaffId::new(staff), off_days_worked);
        self
    }

    pub fn weekend_penalty(&self, staff: &StaffId) -> f64 {
        self.weekend_penalty
            .get(staff)
            .copied()
            .unwrap_or(Self::DEFAULT_WEEKEND_PENALTY)
    }

    pub fn history(&self, staff: &StaffId) -> usize {
        self.history.get(staff).copied().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (staff, value) in &self.weekend_penalty {
            if !value.is_finite() || !(0.0..=Self::MAX_WEEKEND_PENALTY).contains(value) {
                return Err(ValidationError::InvalidWeekendPenalty(staff.to_string()));
            }
        }
        Ok(())
    }
}

/// Période de congé, bornes incluses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveInterval {
    pub staff: StaffId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl LeaveInterval {
    /// `end` absent => congé d'une journée.
    pub fn new(
        staff: StaffId,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Self, ValidationError> {
        let interval = Self {
            staff,
            start,
            end: end.unwrap_or(start),
            kind: None,
        };
        interval.validate()?;
        Ok(interval)
    }

    pub fn with_kind<S: Into<String>>(mut self, kind: S) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start > self.end {
            return Err(ValidationError::InvalidLeaveRange {
                staff: self.staff.as_str().to_owned(),
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn intersects(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= end && start <= self.end
    }
}

/// Règles d'un run de planification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRules {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub min_staff_per_day: u32,
    #[serde(default)]
    pub specialty_required: bool,
    #[serde(default)]
    pub max_consecutive_days: Option<u32>,
    #[serde(default)]
    pub min_rest_days: Option<u32>,
}

impl RosterRules {
    pub fn new(start: NaiveDate, end: NaiveDate, min_staff_per_day: u32) -> Self {
        Self {
            start,
            end,
            min_staff_per_day,
            specialty_required: false,
            max_consecutive_days: None,
            min_rest_days: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end < self.start {
            return Err(ValidationError::InvalidPeriod {
                start: self.start,
                end: self.end,
            });
        }
        if self.min_staff_per_day == 0 {
            return Err(ValidationError::NonPositiveMinStaff);
        }
        if self.max_consecutive_days == Some(0) {
            return Err(ValidationError::ZeroConsecutiveLimit);
        }
        Ok(())
    }

    /// Nombre de jours de la période (bornes incluses).
    pub fn total_days(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.total_days())
    }

    pub fn min_staff(&self) -> usize {
        self.min_staff_per_day as usize
    }
}

/// Métadonnées calendaires d'une date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayMetadata {
    pub date: NaiveDate,
    pub is_weekend: bool,
    pub is_holiday: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday_name: Option<String>,
    /// Jour férié reporté (substitution du dimanche, par exemple).
    #[serde(default)]
    pub observed: bool,
}

impl DayMetadata {
    pub fn plain(date: NaiveDate) -> Self {
        Self {
            date,
            is_weekend: is_weekend(date),
            is_holiday: false,
            holiday_name: None,
            observed: false,
        }
    }

    /// Week-end ou férié.
    pub fn is_off_day(&self) -> bool {
        self.is_weekend || self.is_holiday
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    Optimizer,
    Greedy,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Optimizer => f.write_str("optimizer"),
            SolverKind::Greedy => f.write_str("greedy"),
        }
    }
}

/// Affectation finale : date -> personnel (ordonné). Immuable une fois produite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    solver: SolverKind,
    days: BTreeMap<NaiveDate, Vec<StaffId>>,
}

impl Assignment {
    pub fn new(solver: SolverKind, days: BTreeMap<NaiveDate, Vec<StaffId>>) -> Self {
        Self { solver, days }
    }

    pub fn solver(&self) -> SolverKind {
        self.solver
    }

    pub fn days(&self) -> &BTreeMap<NaiveDate, Vec<StaffId>> {
        &self.days
    }

    /// Personnel affecté à `date` (vide si la date est hors période).
    pub fn staff_on(&self, date: NaiveDate) -> &[StaffId] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &Vec<StaffId>)> {
        self.days.iter()
    }

    /// Nombre total de journées-personne affectées.
    pub fn total_slots(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_assigned(&self, staff: &StaffId, date: NaiveDate) -> bool {
        self.staff_on(date).contains(staff)
    }
}
