//! Calendrier : week-ends, jours fériés et jours de substitution.
//!
//! Les tables de jours fériés sont des données injectées (versionnées, en
//! lecture seule) ; aucun état global. Une table couvre une plage d'années :
//! hors de cette plage, une date n'est jamais fériée (avertissement journalisé).

use crate::error::ConfigurationError;
use crate::model::{is_weekend, DayMetadata};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub const OBSERVED_SUFFIX: &str = " (observed)";

/// Férié à date fixe, répété chaque année couverte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedHoliday {
    pub month: u32,
    pub day: u32,
    pub name: String,
}

/// Férié daté (fêtes lunaires ou mobiles).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedHoliday {
    pub date: NaiveDate,
    pub name: String,
}

/// Report au lundi suivant d'un férié tombant le week-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionPolicy {
    #[serde(default = "default_true")]
    pub sunday: bool,
    #[serde(default)]
    pub saturday: bool,
}

impl Default for SubstitutionPolicy {
    fn default() -> Self {
        Self {
            sunday: true,
            saturday: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayTable {
    pub jurisdiction: String,
    pub version: String,
    pub first_year: i32,
    pub last_year: i32,
    #[serde(default)]
    pub fixed: Vec<FixedHoliday>,
    #[serde(default)]
    pub dated: Vec<DatedHoliday>,
    #[serde(default)]
    pub substitution: SubstitutionPolicy,
}

impl HolidayTable {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        normalize_jurisdiction(&self.jurisdiction)?;
        if self.first_year > self.last_year {
            return Err(ConfigurationError::InvalidHolidayTable(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        for h in &self.fixed {
            // 2024 est bissextile : le 29/02 reste accepté
            if NaiveDate::from_ymd_opt(2024, h.month, h.day).is_none() {
                return Err(ConfigurationError::InvalidHolidayTable(format!(
                    "invalid fixed date {:02}-{:02} for {}",
                    h.month, h.day, h.name
                )));
            }
        }
        for h in &self.dated {
            if !self.supports_year(h.date.year()) {
                return Err(ConfigurationError::InvalidHolidayTable(format!(
                    "{} ({}) is outside {}..={}",
                    h.name, h.date, self.first_year, self.last_year
                )));
            }
        }
        Ok(())
    }

    pub fn supports_year(&self, year: i32) -> bool {
        self.first_year <= year && year <= self.last_year
    }

    /// Nom du férié légal tombant à `date`, sans tenir compte des reports.
    pub fn statutory(&self, date: NaiveDate) -> Option<String> {
        if !self.supports_year(date.year()) {
            return None;
        }
        let names: Vec<&str> = self
            .fixed
            .iter()
            .filter(|h| h.month == date.month() && h.day == date.day())
            .map(|h| h.name.as_str())
            .chain(
                self.dated
                    .iter()
                    .filter(|h| h.date == date)
                    .map(|h| h.name.as_str()),
            )
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(names.join(" / "))
        }
    }

    /// Table intégrée pour Singapour (2025-2026).
    pub fn singapore() -> Self {
        let fixed = [
            (1, 1, "New Year's Day"),
            (5, 1, "Labour Day"),
            (8, 9, "National Day"),
            (12, 25, "Christmas Day"),
        ]
        .into_iter()
        .map(|(month, day, name)| FixedHoliday {
            month,
            day,
            name: name.to_owned(),
        })
        .collect();

        let dated = [
            ((2025, 1, 29), "Chinese New Year"),
            ((2025, 1, 30), "Chinese New Year"),
            ((2025, 3, 31), "Hari Raya Puasa"),
            ((2025, 4, 18), "Good Friday"),
            ((2025, 5, 12), "Vesak Day"),
            ((2025, 6, 7), "Hari Raya Haji"),
            ((2025, 10, 20), "Deepavali"),
            ((2026, 2, 17), "Chinese New Year"),
            ((2026, 2, 18), "Chinese New Year"),
            ((2026, 3, 21), "Hari Raya Puasa"),
            ((2026, 4, 3), "Good Friday"),
            ((2026, 5, 27), "Hari Raya Haji"),
            ((2026, 5, 31), "Vesak Day"),
            ((2026, 11, 8), "Deepavali"),
        ]
        .into_iter()
        .filter_map(|((y, m, d), name)| {
            NaiveDate::from_ymd_opt(y, m, d).map(|date| DatedHoliday {
                date,
                name: name.to_owned(),
            })
        })
        .collect();

        Self {
            jurisdiction: "SG".to_owned(),
            version: "2025.1".to_owned(),
            first_year: 2025,
            last_year: 2026,
            fixed,
            dated,
            substitution: SubstitutionPolicy::default(),
        }
    }
}

/// Code juridiction : 2 ou 3 lettres ASCII, normalisé en majuscules.
pub fn normalize_jurisdiction(code: &str) -> Result<String, ConfigurationError> {
    let trimmed = code.trim();
    let well_formed = (2..=3).contains(&trimmed.len())
        && trimmed.chars().all(|c| c.is_ascii_alphabetic());
    if !well_formed {
        return Err(ConfigurationError::MalformedJurisdiction(code.to_owned()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Ensemble de tables indexées par juridiction. Partageable entre runs.
#[derive(Debug, Clone, Default)]
pub struct HolidayCatalog {
    tables: BTreeMap<String, Arc<HolidayTable>>,
}

impl HolidayCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue contenant les tables intégrées.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.tables.insert("SG".to_owned(), Arc::new(HolidayTable::singapore()));
        catalog
    }

    /// Ajoute (ou remplace) une table après validation.
    pub fn insert(&mut self, table: HolidayTable) -> Result<(), ConfigurationError> {
        table.validate()?;
        let code = normalize_jurisdiction(&table.jurisdiction)?;
        self.tables.insert(code, Arc::new(table));
        Ok(())
    }

    pub fn jurisdictions(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn resolver(&self, jurisdiction: &str) -> Result<CalendarResolver, ConfigurationError> {
        let code = normalize_jurisdiction(jurisdiction)?;
        let table = self
            .tables
            .get(&code)
            .ok_or_else(|| ConfigurationError::UnknownJurisdiction(code.clone()))?;
        Ok(CalendarResolver::new(Arc::clone(table)))
    }
}

/// Produit les `DayMetadata` d'une période à partir d'une table.
#[derive(Debug, Clone)]
pub struct CalendarResolver {
    table: Arc<HolidayTable>,
}

impl CalendarResolver {
    pub fn new(table: Arc<HolidayTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &HolidayTable {
        &self.table
    }

    /// Une entrée par date de [start, end], dans l'ordre chronologique.
    pub fn resolve(&self, start: NaiveDate, end: NaiveDate) -> Vec<DayMetadata> {
        let mut unsupported = BTreeSet::new();
        let days: Vec<DayMetadata> = start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|date| {
                if !self.table.supports_year(date.year()) {
                    unsupported.insert(date.year());
                }
                self.day(date)
            })
            .collect();

        for year in unsupported {
            warn!(
                jurisdiction = %self.table.jurisdiction,
                year,
                "holiday table does not cover this year; dates resolved as non-holidays"
            );
        }
        days
    }

    pub fn day(&self, date: NaiveDate) -> DayMetadata {
        let mut meta = DayMetadata::plain(date);

        if let Some(name) = self.table.statutory(date) {
            meta.is_holiday = true;
            meta.holiday_name = Some(name);
            return meta;
        }

        if let Some(name) = self.substituted(date) {
            debug!(%date, holiday = %name, "observed holiday");
            meta.is_holiday = true;
            meta.holiday_name = Some(format!("{name}{OBSERVED_SUFFIX}"));
            meta.observed = true;
        }
        meta
    }

    /// Férié du week-end reporté sur ce lundi, si la politique le prévoit.
    fn substituted(&self, date: NaiveDate) -> Option<String> {
        // hors table, aucun férié, même reporté depuis l'année précédente
        if date.weekday() != Weekday::Mon || !self.table.supports_year(date.year()) {
            return None;
        }
        let policy = self.table.substitution;
        let sunday = date - Duration::days(1);
        let saturday = date - Duration::days(2);
        debug_assert!(is_weekend(sunday) && is_weekend(saturday));

        if policy.sunday {
            if let Some(name) = self.table.statutory(sunday) {
                return Some(name);
            }
        }
        if policy.saturday {
            if let Some(name) = self.table.statutory(saturday) {
                return Some(name);
            }
        }
        None
    }
}
