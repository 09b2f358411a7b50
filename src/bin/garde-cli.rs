#![forbid(unsafe_code)]
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use garde::{
    calendar::HolidayCatalog,
    config::{load_config_from_file, EngineConfig},
    io,
    report::{ReportRenderer, RosterReport, TextSummary},
    scheduler::{blocking_count, detect_violations, RosterEngine, RosterInput, SolverMode},
    storage::{JsonStorage, Storage},
    RosterProblem,
};
use std::path::Path;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de planification des gardes (sans base de données)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Générer un roster à partir des congés et de la configuration
    Generate {
        /// CSV des congés (staff_id,staff_name,specialty,leave_start,leave_end,leave_type)
        #[arg(long)]
        leave: String,
        /// Configuration JSON du run
        #[arg(long)]
        config: String,
        /// auto | optimizer | greedy
        #[arg(long)]
        mode: Option<SolverMode>,
        /// Budget de l'optimiseur par tranche de 30 jours
        #[arg(long)]
        time_budget_ms: Option<u64>,
        #[arg(long)]
        jurisdiction: Option<String>,
        #[arg(long)]
        out_json: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
    },

    /// Afficher le calendrier résolu d'une période
    Calendar {
        /// YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,
        /// YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "SG")]
        jurisdiction: String,
        /// Table de fériés JSON supplémentaire
        #[arg(long)]
        holidays: Option<String>,
    },

    /// Revérifier un rapport existant contre les contraintes dures
    Check {
        #[arg(long)]
        leave: String,
        #[arg(long)]
        config: String,
        /// Rapport JSON produit par `generate`
        #[arg(long)]
        report: String,
        /// Export CSV des violations (optionnel)
        #[arg(long)]
        violations_csv: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let code = match cli.cmd {
        Commands::Generate {
            leave,
            config,
            mode,
            time_budget_ms,
            jurisdiction,
            out_json,
            out_csv,
        } => {
            let mut cfg = load_config_from_file(&config)?;
            if let Some(mode) = mode {
                cfg.solver.mode = mode;
            }
            if let Some(ms) = time_budget_ms {
                cfg.solver.time_budget_ms = ms;
            }
            if let Some(code) = jurisdiction {
                cfg.jurisdiction = code;
            }
            cfg.validate()?;
            let catalog = cfg.catalog(Path::new(&config).parent())?;

            let records = io::import_leave_csv(&leave)?;
            let (staff, leaves) = io::staff_and_leave(&records)?;
            if staff.is_empty() {
                bail!("no staff found in {leave}");
            }
            let input =
                RosterInput::new(staff, leaves, cfg.rules.clone(), cfg.jurisdiction.clone())
                    .with_preferences(cfg.preferences.clone());
            let outcome = RosterEngine::new(cfg.solver).run(input, &catalog)?;
            let report = RosterReport::build(&outcome, Utc::now());

            if let Some(path) = out_json {
                JsonStorage::open(path)?.save(&report)?;
            }
            if let Some(path) = out_csv {
                io::export_roster_csv(path, &report)?;
            }
            print!("{}", TextSummary.render(&report));

            if report.statistics.days_understaffed > 0 {
                eprintln!(
                    "Incomplete roster: {} understaffed day(s)",
                    report.statistics.days_understaffed
                );
                // Code 2 = WARNING/INCOMPLETE
                2
            } else {
                0
            }
        }
        Commands::Calendar {
            start,
            end,
            jurisdiction,
            holidays,
        } => {
            if end < start {
                bail!("end date must not be before start date");
            }
            let mut catalog = HolidayCatalog::builtin();
            if let Some(path) = holidays {
                catalog.insert(io::load_holiday_table(path)?)?;
            }
            let resolver = catalog.resolver(&jurisdiction)?;
            for day in resolver.resolve(start, end) {
                let kind = match (day.is_weekend, day.is_holiday) {
                    (_, true) => "holiday",
                    (true, false) => "weekend",
                    _ => "workday",
                };
                println!(
                    "{} {} | {} | {}",
                    day.date,
                    day.date.format("%a"),
                    kind,
                    day.holiday_name.as_deref().unwrap_or("-")
                );
            }
            0
        }
        Commands::Check {
            leave,
            config,
            report,
            violations_csv,
        } => {
            let cfg = load_config_from_file(&config)?;
            let catalog = cfg.catalog(Path::new(&config).parent())?;
            let report = JsonStorage::open(&report)?.load()?;
            let problem = rebuild_problem(&leave, &cfg, &report, &catalog)?;

            let violations = detect_violations(&problem, &report.assignment());
            let blocking = blocking_count(&violations);
            if let Some(path) = violations_csv {
                let mut w = csv::Writer::from_path(path)?;
                w.write_record(["date", "staff_id", "kind"])?;
                for v in &violations {
                    let date = v.date.to_string();
                    w.write_record([
                        date.as_str(),
                        v.staff.as_ref().map(|s| s.as_str()).unwrap_or(""),
                        v.kind.as_str(),
                    ])?;
                }
                w.flush()?;
            }

            if blocking == 0 {
                println!(
                    "OK: no hard-constraint violations ({} understaffed day(s))",
                    violations.len()
                );
                0
            } else {
                eprintln!("Found {blocking} violation(s)");
                for v in violations.iter().filter(|v| v.kind.is_blocking()) {
                    eprintln!(
                        "  {} {} {}",
                        v.date,
                        v.staff.as_ref().map(|s| s.as_str()).unwrap_or("-"),
                        v.kind.as_str()
                    );
                }
                2
            }
        }
    };

    std::process::exit(code);
}

/// Le rapport est revérifié avec ses propres règles ; la configuration fournit
/// la juridiction.
fn rebuild_problem(
    leave: &str,
    cfg: &EngineConfig,
    report: &RosterReport,
    catalog: &HolidayCatalog,
) -> Result<RosterProblem> {
    let records = io::import_leave_csv(leave)?;
    let (staff, leaves) = io::staff_and_leave(&records)?;
    let resolver = catalog.resolver(&cfg.jurisdiction)?;
    let problem = RosterProblem::new(staff, &leaves, report.rules.clone(), &resolver)
        .with_context(|| format!("rebuilding roster problem from {leave}"))?;
    Ok(problem)
}
