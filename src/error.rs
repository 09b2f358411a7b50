use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Entrée mal formée : détectée avant toute résolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid leave range for {staff}: {start} is after {end}")]
    InvalidLeaveRange {
        staff: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("unknown staff identifier: {0}")]
    UnknownStaff(String),
    #[error("duplicate staff identifier: {0}")]
    DuplicateStaff(String),
    #[error("staff identifier cannot be empty")]
    EmptyStaffId,
    #[error("staff {id} declared with conflicting names ({first:?} vs {second:?})")]
    ConflictingStaffName {
        id: String,
        first: String,
        second: String,
    },
    #[error("min_staff_per_day must be a positive integer")]
    NonPositiveMinStaff,
    #[error("invalid roster period: end {end} is before start {start}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    #[error("max_consecutive_days must be > 0 when set")]
    ZeroConsecutiveLimit,
    #[error("weekend penalty for {0} must be a number between 0 and 10")]
    InvalidWeekendPenalty(String),
    #[error("invalid record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
}

/// Configuration non supportée (juridiction, table de jours fériés).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("malformed jurisdiction code: {0:?}")]
    MalformedJurisdiction(String),
    #[error("unsupported jurisdiction: {0}")]
    UnknownJurisdiction(String),
    #[error("invalid holiday table: {0}")]
    InvalidHolidayTable(String),
}

/// Seules erreurs qui interrompent un run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Échec d'une stratégie de résolution. Interne au moteur : déclenche le repli.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverFailure {
    #[error("solver timed out after {0:?}")]
    Timeout(Duration),
    #[error("model reported infeasible")]
    Infeasible,
    #[error("solver unavailable: {0}")]
    Unavailable(&'static str),
    #[error("solver output rejected: {0} hard-constraint violation(s)")]
    Rejected(usize),
    #[error("solver backend error: {0}")]
    Backend(String),
}
