use crate::availability::AvailabilityMatrix;
use crate::calendar::CalendarResolver;
use crate::error::{RosterError, ValidationError};
use crate::model::{
    DayMetadata, LeaveInterval, RosterRules, StaffId, StaffMember, StaffPreferences,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Entrées d'un run, entièrement matérialisées et validées.
/// Partagé en lecture seule par les contraintes et les deux solveurs.
#[derive(Debug, Clone)]
pub struct RosterProblem {
    staff: Vec<StaffMember>,
    rules: RosterRules,
    calendar: Vec<DayMetadata>,
    availability: AvailabilityMatrix,
    preferences: StaffPreferences,
}

impl RosterProblem {
    pub fn new(
        staff: Vec<StaffMember>,
        leaves: &[LeaveInterval],
        rules: RosterRules,
        resolver: &CalendarResolver,
    ) -> Result<Self, RosterError> {
        rules.validate()?;
        let availability = AvailabilityMatrix::build(&staff, leaves, rules.start, rules.end)?;
        let calendar = resolver.resolve(rules.start, rules.end);
        Self::from_parts(staff, rules, calendar, availability)
    }

    /// Assemble un problème à partir d'éléments déjà dérivés.
    pub fn from_parts(
        staff: Vec<StaffMember>,
        rules: RosterRules,
        calendar: Vec<DayMetadata>,
        availability: AvailabilityMatrix,
    ) -> Result<Self, RosterError> {
        rules.validate()?;
        let expected: Vec<NaiveDate> = rules.dates().collect();
        let calendar_dates: Vec<NaiveDate> = calendar.iter().map(|d| d.date).collect();
        if calendar_dates != expected
            || availability.start() != rules.start
            || availability.num_days() != expected.len()
        {
            return Err(ValidationError::InvalidPeriod {
                start: rules.start,
                end: rules.end,
            }
            .into());
        }
        let ids: Vec<&StaffId> = staff.iter().map(|m| &m.id).collect();
        if availability.staff().iter().collect::<Vec<_>>() != ids {
            let missing = staff
                .iter()
                .find(|m| availability.staff_index(&m.id).is_none())
                .map(|m| m.id.to_string())
                .unwrap_or_default();
            return Err(ValidationError::UnknownStaff(missing).into());
        }
        Ok(Self {
            staff,
            rules,
            calendar,
            availability,
            preferences: StaffPreferences::default(),
        })
    }

    /// Attache les préférences de week-end et l'historique du personnel.
    pub fn with_preferences(
        mut self,
        preferences: StaffPreferences,
    ) -> Result<Self, ValidationError> {
        preferences.validate()?;
        self.preferences = preferences;
        Ok(self)
    }

    pub fn staff(&self) -> &[StaffMember] {
        &self.staff
    }

    pub fn rules(&self) -> &RosterRules {
        &self.rules
    }

    pub fn calendar(&self) -> &[DayMetadata] {
        &self.calendar
    }

    pub fn availability(&self) -> &AvailabilityMatrix {
        &self.availability
    }

    pub fn preferences(&self) -> &StaffPreferences {
        &self.preferences
    }

    /// Coût week-end de la personne d'indice `staff`.
    pub fn weekend_penalty(&self, staff: usize) -> f64 {
        self.preferences.weekend_penalty(&self.staff[staff].id)
    }

    /// Week-ends et fériés travaillés avant la période.
    pub fn off_day_history(&self, staff: usize) -> usize {
        self.preferences.history(&self.staff[staff].id)
    }

    pub fn num_staff(&self) -> usize {
        self.staff.len()
    }

    pub fn num_days(&self) -> usize {
        self.calendar.len()
    }

    pub fn date_at(&self, day: usize) -> NaiveDate {
        self.calendar[day].date
    }

    pub fn min_staff(&self) -> usize {
        self.rules.min_staff()
    }

    /// Spécialités distinctes, triées.
    pub fn specialties(&self) -> BTreeSet<&str> {
        self.staff
            .iter()
            .flat_map(|m| m.specialties.iter().map(String::as_str))
            .collect()
    }

    /// Personnel disponible le jour `day` (indices).
    pub fn available_staff(&self, day: usize) -> Vec<usize> {
        (0..self.staff.len())
            .filter(|s| self.availability.available_at(*s, day))
            .collect()
    }
}
