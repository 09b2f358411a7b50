use crate::constraints::ObjectiveWeights;
use crate::error::SolverFailure;
use crate::model::{Assignment, LeaveInterval, RosterRules, StaffMember, StaffPreferences};
use crate::problem::RosterProblem;
use crate::stats::RosterStatistics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Choix de la stratégie de résolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMode {
    /// Optimiseur puis repli glouton ; glouton direct pour les cas triviaux.
    #[default]
    Auto,
    Optimizer,
    Greedy,
}

impl FromStr for SolverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SolverMode::Auto),
            "optimizer" | "milp" => Ok(SolverMode::Optimizer),
            "greedy" => Ok(SolverMode::Greedy),
            other => Err(format!("unknown solver mode: {other}")),
        }
    }
}

impl fmt::Display for SolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolverMode::Auto => "auto",
            SolverMode::Optimizer => "optimizer",
            SolverMode::Greedy => "greedy",
        })
    }
}

/// Options du moteur
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    #[serde(default)]
    pub mode: SolverMode,
    /// Budget de l'optimiseur par tranche de 30 jours.
    #[serde(default = "EngineOptions::default_budget_ms")]
    pub time_budget_ms: u64,
    #[serde(default)]
    pub weights: ObjectiveWeights,
}

impl EngineOptions {
    fn default_budget_ms() -> u64 {
        2_000
    }

    pub fn budget_per_block(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mode: SolverMode::Auto,
            time_budget_ms: Self::default_budget_ms(),
            weights: ObjectiveWeights::default(),
        }
    }
}

/// Entrées normalisées d'un run.
#[derive(Debug, Clone)]
pub struct RosterInput {
    pub staff: Vec<StaffMember>,
    pub leaves: Vec<LeaveInterval>,
    pub rules: RosterRules,
    pub jurisdiction: String,
    pub preferences: StaffPreferences,
}

impl RosterInput {
    pub fn new<J: Into<String>>(
        staff: Vec<StaffMember>,
        leaves: Vec<LeaveInterval>,
        rules: RosterRules,
        jurisdiction: J,
    ) -> Self {
        Self {
            staff,
            leaves,
            rules,
            jurisdiction: jurisdiction.into(),
            preferences: StaffPreferences::default(),
        }
    }

    pub fn with_preferences(mut self, preferences: StaffPreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

/// Résultat d'un run.
#[derive(Debug, Clone)]
pub struct RosterOutcome {
    pub problem: RosterProblem,
    pub assignment: Assignment,
    pub statistics: RosterStatistics,
    /// Échecs des stratégies tentées avant celle qui a abouti.
    pub failures: Vec<SolverFailure>,
}

impl RosterOutcome {
    /// Vrai quand le repli a été nécessaire.
    pub fn degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}
