#![forbid(unsafe_code)]
use chrono::{NaiveDate, TimeZone, Utc};
use garde::config::{export_config_json, load_config_from_file, EngineConfig};
use garde::io::{read_leave_records, staff_and_leave, write_roster_csv};
use garde::{
    EngineOptions, HolidayCatalog, JsonStorage, ReportRenderer, RosterEngine, RosterInput,
    RosterReport, RosterRules, SolverMode, StaffId, StaffMember, StaffPreferences, Storage,
    TextSummary, ValidationError,
};
use tempfile::tempdir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sample_report(start: NaiveDate, end: NaiveDate, min_staff: u32) -> RosterReport {
    let engine = RosterEngine::new(EngineOptions {
        mode: SolverMode::Greedy,
        ..EngineOptions::default()
    });
    let input = RosterInput::new(
        vec![StaffMember::new("A", "Alice"), StaffMember::new("B", "Bob")],
        vec![],
        RosterRules::new(start, end, min_staff),
        "SG",
    );
    let outcome = engine.run(input, &HolidayCatalog::builtin()).unwrap();
    RosterReport::build(&outcome, Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap())
}

#[test]
fn leave_csv_is_normalized() {
    let csv = "\
Staff_ID,staff_name,specialty,leave_start,leave_end,leave_type
A,Alice,Cardio;ICU,,,
B,Bob,Ortho,2025-03-05,2025-03-07,annual

B,Bob,,10/03/2025,,sick
";
    let records = read_leave_records(csv.as_bytes()).unwrap();
    assert_eq!(records.len(), 3);

    let (staff, leaves) = staff_and_leave(&records).unwrap();
    assert_eq!(staff.len(), 2);
    assert!(staff[0].has_specialty("Cardio") && staff[0].has_specialty("ICU"));
    assert!(staff[1].has_specialty("Ortho"));

    assert_eq!(leaves.len(), 2);
    assert_eq!((leaves[0].start, leaves[0].end), (d(2025, 3, 5), d(2025, 3, 7)));
    assert_eq!(leaves[0].kind.as_deref(), Some("annual"));
    assert_eq!((leaves[1].start, leaves[1].end), (d(2025, 3, 10), d(2025, 3, 10)));
    assert_eq!(leaves[1].staff, StaffId::new("B"));
}

#[test]
fn malformed_rows_are_rejected_with_line() {
    let csv = "staff_id,staff_name,leave_start\nA,Alice,2025-13-01\n";
    let err = read_leave_records(csv.as_bytes()).unwrap_err();
    match err.downcast_ref::<ValidationError>() {
        Some(ValidationError::MalformedRecord { line, .. }) => assert_eq!(*line, 2),
        other => panic!("unexpected error: {other:?}"),
    }

    let missing = "staff_name,leave_start\nAlice,2025-01-01\n";
    assert!(read_leave_records(missing.as_bytes()).is_err());
}

#[test]
fn inverted_leave_and_conflicting_names_are_rejected() {
    let csv = "staff_id,staff_name,leave_start,leave_end\nA,Alice,2025-03-07,2025-03-05\n";
    let records = read_leave_records(csv.as_bytes()).unwrap();
    assert!(matches!(
        staff_and_leave(&records),
        Err(ValidationError::InvalidLeaveRange { .. })
    ));

    let csv = "staff_id,staff_name\nA,Alice\nA,Alicia\n";
    let records = read_leave_records(csv.as_bytes()).unwrap();
    assert!(matches!(
        staff_and_leave(&records),
        Err(ValidationError::ConflictingStaffName { .. })
    ));
}

#[test]
fn roster_csv_export() {
    let report = sample_report(d(2026, 8, 8), d(2026, 8, 10), 1);
    let mut buf = Vec::new();
    write_roster_csv(&mut buf, &report).unwrap();
    insta::assert_snapshot!(String::from_utf8(buf).unwrap(), @r"
    date,weekday,is_weekend,is_holiday,holiday_name,staff
    2026-08-08,Sat,true,false,,A
    2026-08-09,Sun,true,true,National Day,B
    2026-08-10,Mon,false,true,National Day (observed),A
    ");
}

#[test]
fn report_days_carry_calendar_flags() {
    let report = sample_report(d(2026, 8, 8), d(2026, 8, 10), 2);
    let monday = &report.days[&d(2026, 8, 10)];
    assert!(monday.observed);
    assert_eq!(monday.available_count, 2);
    assert_eq!(monday.staff.len(), 2);
    assert_eq!(report.statistics.weekend_days, 2);
    assert_eq!(report.statistics.holiday_days, 2);

    let replay = report.assignment();
    assert_eq!(replay.staff_on(d(2026, 8, 9)), monday.staff.as_slice());

    let text = TextSummary.render(&report);
    assert!(text.contains("2026-08-10 Mon | A, B [National Day (observed)]"));
    assert!(text.contains("coverage: 100.0%"));
}

#[test]
fn report_storage_roundtrip() {
    let dir = tempdir().unwrap();
    let storage = JsonStorage::open(dir.path().join("roster.json")).unwrap();
    let report = sample_report(d(2025, 3, 3), d(2025, 3, 16), 1);
    storage.save(&report).unwrap();
    assert_eq!(storage.load().unwrap(), report);
}

#[test]
fn config_roundtrip_and_external_holidays() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("xx.json"),
        r#"{
            "jurisdiction": "XX",
            "version": "1",
            "first_year": 2030,
            "last_year": 2030,
            "dated": [{ "date": "2030-03-03", "name": "Founders" }]
        }"#,
    )
    .unwrap();

    let mut config = EngineConfig::new(RosterRules::new(d(2030, 3, 1), d(2030, 3, 31), 2));
    config.jurisdiction = "XX".into();
    config.holiday_table = Some("xx.json".into());
    config.solver.mode = SolverMode::Greedy;
    config.preferences = StaffPreferences::default()
        .with_weekend_penalty("A", 2.5)
        .with_history("B", 4);
    let path = dir.path().join("config.json");
    export_config_json(&path, &config).unwrap();

    let loaded = load_config_from_file(&path).unwrap();
    assert_eq!(loaded.rules, config.rules);
    assert_eq!(loaded.solver, config.solver);
    assert_eq!(loaded.preferences, config.preferences);
    assert_eq!(loaded.preferences.weekend_penalty(&StaffId::new("B")), 5.0);

    let catalog = loaded.catalog(Some(dir.path())).unwrap();
    let resolver = catalog.resolver("xx").unwrap();
    assert_eq!(
        resolver.day(d(2030, 3, 4)).holiday_name.as_deref(),
        Some("Founders (observed)")
    );
    // la table intégrée reste disponible
    assert!(catalog.resolver("SG").is_ok());
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "rules": { "start": "2025-03-01", "end": "2025-03-31", "min_staff_per_day": 0 } }"#,
    )
    .unwrap();
    assert!(load_config_from_file(&path).is_err());

    std::fs::write(
        &path,
        r#"{ "rules": { "start": "2025-03-01", "end": "2025-03-31", "min_staff_per_day": 1 },
             "jurisdiction": "S1" }"#,
    )
    .unwrap();
    assert!(load_config_from_file(&path).is_err());

    std::fs::write(
        &path,
        r#"{ "rules": { "start": "2025-03-01", "end": "2025-03-31", "min_staff_per_day": 1 },
             "preferences": { "weekend_penalty": { "A": -1.0 } } }"#,
    )
    .unwrap();
    let err = load_config_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("weekend penalty for A"));
}
