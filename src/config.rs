use crate::calendar::{normalize_jurisdiction, HolidayCatalog};
use crate::io;
use crate::model::{RosterRules, StaffPreferences};
use crate::scheduler::EngineOptions;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration complète d'un run, persistée en JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub rules: RosterRules,
    #[serde(default = "EngineConfig::default_jurisdiction")]
    pub jurisdiction: String,
    /// Table de fériés supplémentaire (remplace la table intégrée de même code).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday_table: Option<PathBuf>,
    #[serde(default)]
    pub solver: EngineOptions,
    /// Préférences de week-end et historique des gardes.
    #[serde(default, skip_serializing_if = "StaffPreferences::is_empty")]
    pub preferences: StaffPreferences,
}

impl EngineConfig {
    pub fn new(rules: RosterRules) -> Self {
        Self {
            rules,
            jurisdiction: Self::default_jurisdiction(),
            holiday_table: None,
            solver: EngineOptions::default(),
            preferences: StaffPreferences::default(),
        }
    }

    fn default_jurisdiction() -> String {
        "SG".to_owned()
    }

    pub fn validate(&self) -> Result<()> {
        self.rules.validate()?;
        normalize_jurisdiction(&self.jurisdiction)?;
        if self.solver.time_budget_ms == 0 {
            bail!("solver.time_budget_ms must be > 0");
        }
        let w = &self.solver.weights;
        for (name, value) in [
            ("shortfall", w.shortfall),
            ("workload", w.workload),
            ("specialty", w.specialty),
            ("off_days", w.off_days),
            ("weekend", w.weekend),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("solver.weights.{name} must be a finite, non-negative number");
            }
        }
        self.preferences.validate()?;
        Ok(())
    }

    /// Catalogue intégré, enrichi de la table externe si configurée.
    /// Un chemin relatif est résolu depuis `base_dir`.
    pub fn catalog(&self, base_dir: Option<&Path>) -> Result<HolidayCatalog> {
        let mut catalog = HolidayCatalog::builtin();
        if let Some(path) = &self.holiday_table {
            let path = match base_dir {
                Some(dir) if path.is_relative() => dir.join(path),
                _ => path.clone(),
            };
            let table = io::load_holiday_table(&path)?;
            catalog.insert(table)?;
        }
        Ok(catalog)
    }
}

pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: EngineConfig = serde_json::from_slice(&data)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

pub fn export_config_json<P: AsRef<Path>>(path: P, config: &EngineConfig) -> Result<()> {
    config.validate()?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}
