use crate::calendar::HolidayTable;
use crate::error::ValidationError;
use crate::model::{LeaveInterval, StaffId, StaffMember};
use crate::report::RosterReport;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Ligne normalisée d'un relevé de congés.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveRecord {
    pub staff_id: StaffId,
    pub staff_name: String,
    pub specialties: BTreeSet<String>,
    /// Absent : la ligne déclare seulement la personne.
    pub leave_start: Option<NaiveDate>,
    pub leave_end: Option<NaiveDate>,
    pub leave_type: Option<String>,
}

const COLUMNS: [&str; 6] = [
    "staff_id",
    "staff_name",
    "specialty",
    "leave_start",
    "leave_end",
    "leave_type",
];

/// Import CSV: header `staff_id,staff_name[,specialty][,leave_start][,leave_end][,leave_type]`
/// (ordre libre, insensible à la casse).
pub fn import_leave_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<LeaveRecord>> {
    let path = path.as_ref();
    let file = fs::File::open(path).with_context(|| format!("reading {}", path.display()))?;
    read_leave_records(file).with_context(|| format!("parsing {}", path.display()))
}

pub fn read_leave_records<R: Read>(reader: R) -> anyhow::Result<Vec<LeaveRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let position: HashMap<&str, usize> = COLUMNS
        .iter()
        .filter_map(|col| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(col))
                .map(|i| (*col, i))
        })
        .collect();
    for required in ["staff_id", "staff_name"] {
        if !position.contains_key(required) {
            anyhow::bail!("missing required column {required}");
        }
    }

    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec?;
        // ligne 1 = en-tête
        let line = rec.position().map(|p| p.line()).unwrap_or(i as u64 + 2);
        if rec.iter().all(str::is_empty) {
            continue;
        }
        out.push(parse_record(&rec, &position, line)?);
    }
    Ok(out)
}

fn parse_record(
    rec: &StringRecord,
    position: &HashMap<&str, usize>,
    line: u64,
) -> Result<LeaveRecord, ValidationError> {
    let field = |col: &str| {
        position
            .get(col)
            .and_then(|i| rec.get(*i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let malformed = |reason: String| ValidationError::MalformedRecord { line, reason };

    let staff_id = field("staff_id").ok_or_else(|| malformed("missing staff_id".into()))?;
    let staff_name = field("staff_name").ok_or_else(|| malformed("missing staff_name".into()))?;
    let specialties = field("specialty")
        .map(|raw| {
            raw.split([';', '|'])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let leave_start = field("leave_start")
        .map(|raw| parse_date(raw).map_err(|e| malformed(format!("leave_start: {e}"))))
        .transpose()?;
    let leave_end = field("leave_end")
        .map(|raw| parse_date(raw).map_err(|e| malformed(format!("leave_end: {e}"))))
        .transpose()?;
    if leave_start.is_none() && leave_end.is_some() {
        return Err(malformed("leave_end without leave_start".into()));
    }

    Ok(LeaveRecord {
        staff_id: StaffId::new(staff_id),
        staff_name: staff_name.to_owned(),
        specialties,
        leave_start,
        leave_end,
        leave_type: field("leave_type").map(str::to_owned),
    })
}

/// Accepte `YYYY-MM-DD`, `DD/MM/YYYY` ou un horodatage RFC3339.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Ok(date);
    }
    raw.parse::<DateTime<Utc>>()
        .map(|dt| dt.date_naive())
        .map_err(|_| format!("invalid date: {raw}"))
}

/// Dérive le personnel (ordre de première apparition, spécialités fusionnées)
/// et les congés à partir des lignes importées.
pub fn staff_and_leave(
    records: &[LeaveRecord],
) -> Result<(Vec<StaffMember>, Vec<LeaveInterval>), ValidationError> {
    let mut staff: Vec<StaffMember> = Vec::new();
    let mut index: HashMap<StaffId, usize> = HashMap::new();
    let mut leaves = Vec::new();

    for rec in records {
        if rec.staff_id.as_str().is_empty() {
            return Err(ValidationError::EmptyStaffId);
        }
        match index.get(&rec.staff_id) {
            Some(&i) => {
                let member = &mut staff[i];
                if member.name != rec.staff_name {
                    return Err(ValidationError::ConflictingStaffName {
                        id: rec.staff_id.to_string(),
                        first: member.name.clone(),
                        second: rec.staff_name.clone(),
                    });
                }
                member.specialties.extend(rec.specialties.iter().cloned());
            }
            None => {
                index.insert(rec.staff_id.clone(), staff.len());
                let mut member = StaffMember::new(rec.staff_id.as_str(), rec.staff_name.clone());
                member.specialties = rec.specialties.clone();
                staff.push(member);
            }
        }

        if let Some(start) = rec.leave_start {
            let mut leave = LeaveInterval::new(rec.staff_id.clone(), start, rec.leave_end)?;
            leave.kind = rec.leave_type.clone();
            leaves.push(leave);
        }
    }
    Ok((staff, leaves))
}

pub fn load_holiday_table<P: AsRef<Path>>(path: P) -> anyhow::Result<HolidayTable> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let table: HolidayTable = serde_json::from_slice(&data)
        .with_context(|| format!("parsing holiday table {}", path.display()))?;
    table.validate()?;
    Ok(table)
}

/// Export CSV: header `date,weekday,is_weekend,is_holiday,holiday_name,staff`
pub fn export_roster_csv<P: AsRef<Path>>(path: P, report: &RosterReport) -> anyhow::Result<()> {
    let file = fs::File::create(path.as_ref())
        .with_context(|| format!("creating {}", path.as_ref().display()))?;
    write_roster_csv(file, report)
}

pub fn write_roster_csv<W: std::io::Write>(writer: W, report: &RosterReport) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(writer);
    w.write_record(["date", "weekday", "is_weekend", "is_holiday", "holiday_name", "staff"])?;
    for (date, day) in &report.days {
        let staff = day
            .staff
            .iter()
            .map(StaffId::as_str)
            .collect::<Vec<_>>()
            .join(";");
        let date_s = date.to_string();
        let weekday = date.format("%a").to_string();
        w.write_record([
            date_s.as_str(),
            weekday.as_str(),
            bool_str(day.is_weekend),
            bool_str(day.is_holiday),
            day.holiday_name.as_deref().unwrap_or(""),
            staff.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}
