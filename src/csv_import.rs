use crate::error::{AppError, Result};
use crate::participant::{NameValidation, ParticipantInput, sanitize_name, validate_name};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// One participant row read from an uploaded CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedRow {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// `{"raw": {header: value, ...}}`
    pub meta: Value,
    pub validation: NameValidation,
}

/// Minimal row kept in the `EventEye/CSV` snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CsvSnapshotRow {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// A parsed participant CSV
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvImport {
    pub rows: Vec<ImportedRow>,
}

impl CsvImport {
    /// Total number of name issues across all rows
    pub fn issues_count(&self) -> usize {
        self.rows.iter().map(|r| r.validation.issues.len()).sum()
    }

    /// Rows ready to be saved, using the validator's suggested spelling of each name
    pub fn participants(&self) -> Vec<ParticipantInput> {
        self.rows
            .iter()
            .map(|r| ParticipantInput {
                name: Some(if r.validation.suggestion.is_empty() {
                    r.name.clone()
                } else {
                    r.validation.suggestion.clone()
                }),
                email: Some(r.email.clone()),
                phone: Some(r.phone.clone()),
                meta: Some(r.meta.clone()),
                ..ParticipantInput::default()
            })
            .collect()
    }

    pub fn snapshot_rows(&self) -> Vec<CsvSnapshotRow> {
        self.participants()
            .into_iter()
            .map(|p| CsvSnapshotRow {
                name: p.name.unwrap_or_default(),
                email: p.email.unwrap_or_default(),
                phone: p.phone.unwrap_or_default(),
            })
            .collect()
    }
}

/// Parse a participant CSV with a header row
///
/// Columns are looked up as `name`/`Name`, `email`/`Email` and `phone`/`Phone`;
/// any other columns are kept in `meta.raw`. Blank lines are skipped.
///
/// # Arguments
/// * `text` - Full CSV content
///
/// # Returns
/// * `Result<CsvImport>` - Parsed rows or an error when there is no header
///
/// # Examples
/// ```
/// use eventeye::csv_import::parse_participants_csv;
///
/// let import = parse_participants_csv("Name,Email\nasha rao,asha@example.com\n").unwrap();
/// assert_eq!(import.rows[0].name, "Asha Rao");
/// ```
pub fn parse_participants_csv(text: &str) -> Result<CsvImport> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = parse_records(text).into_iter();

    let headers: Vec<String> = match records.next() {
        Some(h) => h.into_iter().map(|s| s.trim().to_string()).collect(),
        None => return Err(AppError::InvalidInput("CSV file is empty".to_string())),
    };

    let mut rows = Vec::new();
    for record in records {
        let mut raw = Map::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(i) {
                raw.insert(header.clone(), Value::String(value.clone()));
            }
        }

        let name = sanitize_name(&lookup(&raw, "name", "Name"));
        let email = lookup(&raw, "email", "Email").trim().to_string();
        let phone = lookup(&raw, "phone", "Phone").trim().to_string();
        let validation = validate_name(&name);

        let mut meta = Map::new();
        meta.insert("raw".to_string(), Value::Object(raw));

        rows.push(ImportedRow {
            name,
            email,
            phone,
            meta: Value::Object(meta),
            validation,
        });
    }

    Ok(CsvImport { rows })
}

/// Read and parse a participant CSV from disk
pub fn load_participants_csv(path: impl AsRef<Path>) -> Result<CsvImport> {
    let text = std::fs::read_to_string(path)?;
    parse_participants_csv(&text)
}

// First non-empty value among the two header spellings
fn lookup(raw: &Map<String, Value>, lower: &str, capitalized: &str) -> String {
    [lower, capitalized]
        .iter()
        .filter_map(|key| raw.get(*key).and_then(Value::as_str))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

// Split CSV text into records; quoted fields may contain commas, quotes and newlines
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    // Escaped quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current_field.is_empty() => in_quotes = true,
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut current_field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => current_field.push(c),
        }
    }

    if !current_field.is_empty() || !record.is_empty() {
        record.push(current_field);
        push_record(&mut records, record);
    }

    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.iter().all(|f| f.trim().is_empty());
    if !blank {
        records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_commas_and_newlines() {
        let records = parse_records("a,\"b,c\",\"d\"\"e\"\n\"multi\nline\",x,y\n");
        assert_eq!(records[0], vec!["a", "b,c", "d\"e"]);
        assert_eq!(records[1], vec!["multi\nline", "x", "y"]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let records = parse_records("h1,h2\r\n\r\n1,2\r\n,\r\n");
        assert_eq!(records.len(), 2);
    }
}
