//! # Parameter File
//!
//! Reads and writes the CSV file describing desired parameters.
//!
//! ## Format
//!
//! ```text
//! name,value,type,description,kmsKeyId,tags
//! /app/db/host,db.internal,String,Database host,,env=dev;team=core
//! /app/db/password,s3cret,SecureString,,alias/app,env=dev
//! ```
//!
//! - `type` accepts `String`, `SecureString`, `StringList` (or `PlainText`,
//!   `Encrypted`, `List`); empty means `String`
//! - `tags` is `key=value` pairs separated by `;`, split on the first `=`
//! - only `name` and `value` are required columns

use crate::constants::MAX_CSV_ROWS;
use crate::parameter::{Parameter, Tag};
use crate::validation::validate_parameter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Body written by `generate-template`
pub const TEMPLATE: &str = "\
name,value,type,description,kmsKeyId,tags
/myapp/dev/db/host,db.dev.internal,String,Database host,,env=dev;team=platform
/myapp/dev/db/password,change-me,SecureString,Database password,alias/aws/ssm,env=dev
/myapp/dev/allowed-origins,\"https://a.example.com,https://b.example.com\",StringList,CORS origins,,env=dev
";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CsvRecord {
    name: String,
    value: String,
    #[serde(rename = "type", default)]
    parameter_type: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "kmsKeyId", default)]
    key_id: String,
    #[serde(default)]
    tags: String,
}

impl From<&Parameter> for CsvRecord {
    fn from(parameter: &Parameter) -> Self {
        Self {
            name: parameter.name.clone(),
            value: parameter.value.clone(),
            parameter_type: parameter.parameter_type.to_string(),
            description: parameter.description.clone(),
            key_id: parameter.key_id.clone().unwrap_or_default(),
            tags: format_tags(&parameter.tags),
        }
    }
}

/// A problem with one data row
///
/// `line` is the 1-based line in the file (the header is line 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: u64,
    pub name: Option<String>,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "line {} ({}): {}", self.line, name, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

/// Parsed file contents
///
/// `parameters` holds only the rows that passed validation.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub parameters: Vec<Parameter>,
    pub errors: Vec<RowError>,
}

impl ParsedFile {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse `key=value;key2=value2`
///
/// # Errors
///
/// Fails on a pair without `=` or with an empty key.
pub fn parse_tags(raw: &str) -> Result<Vec<Tag>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("tag '{pair}' must be key=value"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("tag '{pair}' has an empty key"));
            }
            Ok(Tag::new(key, value.trim()))
        })
        .collect()
}

#[must_use]
pub fn format_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| format!("{}={}", tag.key, tag.value))
        .collect::<Vec<_>>()
        .join(";")
}

fn record_to_parameter(record: CsvRecord) -> Result<Parameter, String> {
    let parameter_type = record.parameter_type.parse()?;
    let tags = parse_tags(&record.tags)?;
    let key_id = Some(record.key_id.trim().to_string()).filter(|k| !k.is_empty());

    Ok(Parameter {
        name: record.name.trim().to_string(),
        value: record.value,
        parameter_type,
        description: record.description.trim().to_string(),
        key_id,
        tags,
    })
}

/// Read and validate parameters from CSV
///
/// Row-level problems (bad type, invalid tag, failed validation, duplicate
/// name) are collected per row. Duplicate names are rejected: the first
/// occurrence is kept and every later row is reported.
///
/// # Errors
///
/// Fails when the header is unreadable, a required column is missing, or the
/// file holds more than the maximum number of rows.
pub fn read_parameters<R: Read>(reader: R) -> Result<ParsedFile> {
    let mut reader = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    for required in ["name", "value"] {
        if !headers.iter().any(|h| h == required) {
            anyhow::bail!("CSV header is missing required column '{required}'");
        }
    }

    let mut parsed = ParsedFile::default();
    let mut seen: HashMap<String, u64> = HashMap::new();
    let mut rows = 0usize;

    for (index, record) in reader.records().enumerate() {
        rows += 1;
        if rows > MAX_CSV_ROWS {
            anyhow::bail!("CSV file has more than {MAX_CSV_ROWS} rows");
        }

        let fallback_line = index as u64 + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(fallback_line, ::csv::Position::line);
                parsed.errors.push(RowError {
                    line,
                    name: None,
                    message: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map_or(fallback_line, ::csv::Position::line);

        let row: CsvRecord = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                parsed.errors.push(RowError {
                    line,
                    name: None,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let name = row.name.trim().to_string();
        let parameter = match record_to_parameter(row) {
            Ok(parameter) => parameter,
            Err(message) => {
                parsed.errors.push(RowError {
                    line,
                    name: Some(name),
                    message,
                });
                continue;
            }
        };

        if let Some(first_line) = seen.get(&parameter.name) {
            parsed.errors.push(RowError {
                line,
                name: Some(name),
                message: format!("duplicate name, already defined on line {first_line}"),
            });
            continue;
        }
        seen.insert(parameter.name.clone(), line);

        let problems = validate_parameter(&parameter);
        if problems.is_empty() {
            parsed.parameters.push(parameter);
        } else {
            parsed.errors.extend(problems.into_iter().map(|message| RowError {
                line,
                name: Some(name.clone()),
                message,
            }));
        }
    }

    if rows == 0 {
        anyhow::bail!("CSV file contains no parameters");
    }

    debug!(
        valid = parsed.parameters.len(),
        errors = parsed.errors.len(),
        "Parsed parameter file"
    );
    Ok(parsed)
}

/// Read and validate a CSV file from disk
///
/// # Errors
///
/// Fails when the file cannot be opened, plus everything [`read_parameters`]
/// rejects.
pub fn read_parameters_from_path(path: &Path) -> Result<ParsedFile> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    read_parameters(file).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write parameters as CSV, in the same layout [`read_parameters`] accepts
///
/// # Errors
///
/// Fails when the writer fails.
pub fn write_parameters<W: Write>(writer: W, parameters: &[Parameter]) -> Result<()> {
    let mut writer = ::csv::Writer::from_writer(writer);
    for parameter in parameters {
        writer
            .serialize(CsvRecord::from(parameter))
            .with_context(|| format!("Failed to write row for {}", parameter.name))?;
    }
    writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterType;

    #[test]
    fn test_reads_all_columns() {
        let csv = "\
name,value,type,description,kmsKeyId,tags
/app/db/host,db.internal,String,Database host,,env=dev;team=core
/app/db/password,s3cret,SecureString,,alias/app,env=dev
";
        let parsed = read_parameters(csv.as_bytes()).unwrap();
        assert!(parsed.is_valid(), "{:?}", parsed.errors);
        assert_eq!(parsed.parameters.len(), 2);

        let host = &parsed.parameters[0];
        assert_eq!(host.description, "Database host");
        assert_eq!(host.key_id, None);
        assert_eq!(host.tags, vec![Tag::new("env", "dev"), Tag::new("team", "core")]);

        let password = &parsed.parameters[1];
        assert_eq!(password.parameter_type, ParameterType::Encrypted);
        assert_eq!(password.key_id.as_deref(), Some("alias/app"));
    }

    #[test]
    fn test_minimal_columns() {
        let parsed = read_parameters("name,value\n/app/x,v1\n".as_bytes()).unwrap();
        assert_eq!(parsed.parameters, vec![Parameter::new("/app/x", "v1")]);
    }

    #[test]
    fn test_missing_required_column() {
        let error = read_parameters("name,type\n/app/x,String\n".as_bytes()).unwrap_err();
        assert!(error.to_string().contains("value"));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        assert!(read_parameters("name,value\n".as_bytes()).is_err());
    }

    #[test]
    fn test_row_errors_carry_line_numbers() {
        let csv = "\
name,value,type
/app/ok,v1,String
app/no-slash,v2,String
/app/empty,,String
/app/bad-type,v3,Number
";
        let parsed = read_parameters(csv.as_bytes()).unwrap();
        assert_eq!(parsed.parameters.len(), 1);
        let lines: Vec<u64> = parsed.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(parsed.errors[2].message.contains("unknown parameter type"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let csv = "name,value\n/app/x,v1\n/app/y,v2\n/app/x,v3\n";
        let parsed = read_parameters(csv.as_bytes()).unwrap();
        assert_eq!(parsed.parameters.len(), 2);
        assert_eq!(parsed.parameters[0].value, "v1");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, 4);
        assert!(parsed.errors[0].message.contains("line 2"));
    }

    #[test]
    fn test_row_cap() {
        let mut csv = String::from("name,value\n");
        for i in 0..=MAX_CSV_ROWS {
            csv.push_str(&format!("/app/p{i},v\n"));
        }
        let error = read_parameters(csv.as_bytes()).unwrap_err();
        assert!(error.to_string().contains("500"));
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(""), Ok(vec![]));
        assert_eq!(
            parse_tags("a=1; b = x=y ;"),
            Ok(vec![Tag::new("a", "1"), Tag::new("b", "x=y")])
        );
        assert!(parse_tags("novalue").is_err());
        assert!(parse_tags("=v").is_err());
    }

    #[test]
    fn test_export_output_reads_back() {
        let parameters = vec![
            Parameter::new("/app/list", "a,b")
                .with_type(ParameterType::List)
                .with_description("with, comma")
                .with_tag("env", "dev"),
            Parameter::new("/app/secret", "s")
                .with_type(ParameterType::Encrypted)
                .with_key_id("alias/app"),
        ];

        let mut out = Vec::new();
        write_parameters(&mut out, &parameters).unwrap();
        let parsed = read_parameters(out.as_slice()).unwrap();

        assert!(parsed.is_valid(), "{:?}", parsed.errors);
        assert_eq!(parsed.parameters, parameters);
    }

    #[test]
    fn test_template_is_valid() {
        let parsed = read_parameters(TEMPLATE.as_bytes()).unwrap();
        assert!(parsed.is_valid(), "{:?}", parsed.errors);
        assert_eq!(parsed.parameters.len(), 3);
    }
}
