use crate::error::ValidationError;
use crate::model::{LeaveInterval, StaffId, StaffMember};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Table (personne, date) -> disponible. Source unique de vérité pour
/// « qui peut travailler ce jour-là ».
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityMatrix {
    staff: Vec<StaffId>,
    index: HashMap<StaffId, usize>,
    start: NaiveDate,
    days: usize,
    // ligne par personne, colonne par jour
    cells: Vec<bool>,
}

impl AvailabilityMatrix {
    /// Construit la matrice sur [start, end]. Les congés qui se chevauchent
    /// sont fusionnés ; ceux hors période sont ignorés.
    pub fn build(
        staff: &[StaffMember],
        leaves: &[LeaveInterval],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidPeriod { start, end });
        }
        let days = usize::try_from((end - start).num_days() + 1).unwrap_or(0);

        let mut index = HashMap::with_capacity(staff.len());
        for (i, member) in staff.iter().enumerate() {
            if member.id.as_str().is_empty() {
                return Err(ValidationError::EmptyStaffId);
            }
            if index.insert(member.id.clone(), i).is_some() {
                return Err(ValidationError::DuplicateStaff(member.id.to_string()));
            }
        }

        let mut cells = vec![true; staff.len() * days];
        for leave in leaves {
            leave.validate()?;
            let row = *index
                .get(&leave.staff)
                .ok_or_else(|| ValidationError::UnknownStaff(leave.staff.to_string()))?;
            if !leave.intersects(start, end) {
                continue;
            }
            let from = leave.start.max(start);
            let to = leave.end.min(end);
            let first = (from - start).num_days() as usize;
            let last = (to - start).num_days() as usize;
            for cell in &mut cells[row * days + first..=row * days + last] {
                *cell = false;
            }
        }

        Ok(Self {
            staff: staff.iter().map(|m| m.id.clone()).collect(),
            index,
            start,
            days,
            cells,
        })
    }

    pub fn staff(&self) -> &[StaffId] {
        &self.staff
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn num_days(&self) -> usize {
        self.days
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.days)
    }

    pub fn staff_index(&self, staff: &StaffId) -> Option<usize> {
        self.index.get(staff).copied()
    }

    pub fn day_index(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.start).num_days();
        usize::try_from(offset).ok().filter(|i| *i < self.days)
    }

    pub fn date_at(&self, day: usize) -> NaiveDate {
        self.start + chrono::Duration::days(day as i64)
    }

    /// Accès indexé, utilisé par les solveurs.
    #[inline]
    pub fn available_at(&self, staff: usize, day: usize) -> bool {
        self.cells[staff * self.days + day]
    }

    /// Faux pour une personne inconnue ou une date hors période.
    pub fn is_available(&self, staff: &StaffId, date: NaiveDate) -> bool {
        match (self.staff_index(staff), self.day_index(date)) {
            (Some(s), Some(d)) => self.available_at(s, d),
            _ => false,
        }
    }

    pub fn available_on(&self, date: NaiveDate) -> Vec<&StaffId> {
        let Some(day) = self.day_index(date) else {
            return Vec::new();
        };
        self.staff
            .iter()
            .enumerate()
            .filter(|(s, _)| self.available_at(*s, day))
            .map(|(_, id)| id)
            .collect()
    }

    pub fn available_days(&self, staff: &StaffId) -> usize {
        self.staff_index(staff)
            .map(|s| (0..self.days).filter(|d| self.available_at(s, *d)).count())
            .unwrap_or(0)
    }
}
