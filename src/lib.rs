#![forbid(unsafe_code)]
//! Garde : moteur d'affectation des gardes hospitalières (local, sans BD).
//!
//! - Calendrier : week-ends, fériés par juridiction, reports du dimanche.
//! - Disponibilités dérivées des congés.
//! - Optimiseur ILP borné dans le temps, repli glouton garanti.
//! - Statistiques de couverture et d'équité ; exports JSON/CSV.

pub mod availability;
pub mod calendar;
pub mod config;
pub mod constraints;
pub mod error;
pub mod io;
pub mod model;
pub mod problem;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod storage;

pub use availability::AvailabilityMatrix;
pub use calendar::{CalendarResolver, HolidayCatalog, HolidayTable};
pub use config::{export_config_json, load_config_from_file, EngineConfig};
pub use constraints::{ConstraintSet, ObjectiveWeights, Violation, ViolationKind, WorkGrid};
pub use error::{ConfigurationError, RosterError, SolverFailure, ValidationError};
pub use model::{
    Assignment, DayMetadata, LeaveInterval, RosterRules, SolverKind, StaffId, StaffMember,
    StaffPreferences,
};
pub use problem::RosterProblem;
pub use report::{ReportRenderer, RosterReport, TextSummary};
pub use scheduler::{
    EngineOptions, GreedySolver, OptimizingSolver, RosterEngine, RosterInput, RosterOutcome,
    Solver, SolverMode,
};
pub use stats::RosterStatistics;
pub use storage::{JsonStorage, Storage};
