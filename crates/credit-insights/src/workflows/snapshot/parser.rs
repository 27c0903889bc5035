use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::SnapshotImportError;
use crate::workflows::dashboard::{
    ApplicationId, ApplicationRow, BorrowerId, BorrowerRow, ScoreEventRow,
};

pub(crate) const APPLICATIONS_FILE: &str = "applications.csv";
pub(crate) const SCORE_EVENTS_FILE: &str = "score_events.csv";
pub(crate) const BORROWERS_FILE: &str = "borrowers.csv";

pub(crate) fn parse_applications<R: Read>(
    reader: R,
) -> Result<Vec<ApplicationRow>, SnapshotImportError> {
    let mut csv_reader = reader_for(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<ApplicationCsvRow>().enumerate() {
        let line = index + 2;
        let row = record.map_err(|source| SnapshotImportError::csv(APPLICATIONS_FILE, source))?;
        let id = row.id.ok_or(SnapshotImportError::MissingId {
            file: APPLICATIONS_FILE,
            line,
        })?;

        rows.push(ApplicationRow {
            id: ApplicationId(id),
            borrower_id: row.borrower_id,
            loan_amount: row.loan_amount.as_deref().map(lenient_number),
            status: row.status,
            created_at: required_timestamp(APPLICATIONS_FILE, line, row.created_at)?,
            loan_purpose: row.loan_purpose,
            notes: row.notes,
            submitted_by: row.user_id,
        });
    }

    Ok(rows)
}

/// Rows keep file order; the store assigns ingestion sequence from it.
pub(crate) fn parse_score_events<R: Read>(
    reader: R,
) -> Result<Vec<ScoreEventRow>, SnapshotImportError> {
    let mut csv_reader = reader_for(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<ScoreEventCsvRow>().enumerate() {
        let line = index + 2;
        let row = record.map_err(|source| SnapshotImportError::csv(SCORE_EVENTS_FILE, source))?;

        rows.push(ScoreEventRow {
            application_id: row.application_id,
            credit_score: row.credit_score.as_deref().map(lenient_number),
            risk_level: row.risk_level,
            scored_at: required_timestamp(SCORE_EVENTS_FILE, line, row.scored_at)?,
            sequence: 0,
        });
    }

    Ok(rows)
}

pub(crate) fn parse_borrowers<R: Read>(reader: R) -> Result<Vec<BorrowerRow>, SnapshotImportError> {
    let mut csv_reader = reader_for(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<BorrowerCsvRow>().enumerate() {
        let line = index + 2;
        let row = record.map_err(|source| SnapshotImportError::csv(BORROWERS_FILE, source))?;
        let borrower_id = row.borrower_id.ok_or(SnapshotImportError::MissingId {
            file: BORROWERS_FILE,
            line,
        })?;

        rows.push(BorrowerRow {
            borrower_id: BorrowerId(borrower_id),
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            national_id: row.national_id,
            email: row.email,
            location: row.location,
            created_at: required_timestamp(BORROWERS_FILE, line, row.created_at)?,
            created_by: row.user_id,
        });
    }

    Ok(rows)
}

fn reader_for<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

#[derive(Debug, Deserialize)]
struct ApplicationCsvRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    borrower_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    loan_amount: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    created_at: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    loan_purpose: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    notes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreEventCsvRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    application_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    credit_score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    risk_level: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    scored_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BorrowerCsvRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    borrower_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    national_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    location: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    created_at: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    user_id: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Unparsable numbers become NaN so the record boundary quarantines the row
/// instead of failing the import. Commas are only accepted as thousands
/// separators; `1,5` is ambiguous and quarantined.
fn lenient_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let digits = if trimmed.contains(',') {
        match without_thousands_separators(trimmed) {
            Some(digits) => digits,
            None => return f64::NAN,
        }
    } else {
        trimmed.to_string()
    };
    digits.parse::<f64>().unwrap_or(f64::NAN)
}

fn without_thousands_separators(raw: &str) -> Option<String> {
    let unsigned = raw.strip_prefix(&['-', '+'][..]).unwrap_or(raw);
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if fraction.contains(',') {
        return None;
    }

    let all_digits = |group: &str| group.bytes().all(|byte| byte.is_ascii_digit());
    let mut groups = integer.split(',');
    let leading = groups.next()?;
    let grouped = (1..=3).contains(&leading.len())
        && all_digits(leading)
        && groups.all(|group| group.len() == 3 && all_digits(group));
    grouped.then(|| raw.replace(',', ""))
}

fn required_timestamp(
    file: &'static str,
    line: usize,
    value: Option<String>,
) -> Result<DateTime<Utc>, SnapshotImportError> {
    let value = value.unwrap_or_default();
    parse_timestamp(&value).ok_or(SnapshotImportError::InvalidTimestamp { file, line, value })
}

pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
