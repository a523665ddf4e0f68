// Copyright 2023 Remi Bernotavicius

use serde::Deserialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    Csv {
        line: Option<u64>,
        message: String,
    },
    WrongFieldCount {
        line: u64,
        actual: usize,
    },
    EmptyField {
        line: u64,
        field: &'static str,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv {
                line: Some(line),
                message,
            } => write!(f, "decode error: line {line}: {message}"),
            Self::Csv {
                line: None,
                message,
            } => write!(f, "decode error: {message}"),
            Self::WrongFieldCount { line, actual } => write!(
                f,
                "decode error: line {line}: expected 2 fields (name, measurement_unit) \
                but found {actual}"
            ),
            Self::EmptyField { line, field } => {
                write!(f, "decode error: line {line}: {field} is empty")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<csv::Error> for DecodeError {
    fn from(e: csv::Error) -> Self {
        Self::Csv {
            line: e.position().map(|p| p.line()),
            message: e.to_string(),
        }
    }
}

type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Deserialize)]
struct Record {
    name: String,
    measurement_unit: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Row {
    pub line: u64,
    pub name: String,
    pub measurement_unit: String,
}

fn decode_record(record: &csv::StringRecord) -> Result<Row> {
    let line = record.position().map_or(0, |p| p.line());
    if record.len() != 2 {
        return Err(DecodeError::WrongFieldCount {
            line,
            actual: record.len(),
        });
    }

    let Record {
        name,
        measurement_unit,
    } = record.deserialize(None)?;
    if name.is_empty() {
        return Err(DecodeError::EmptyField { line, field: "name" });
    }
    if measurement_unit.is_empty() {
        return Err(DecodeError::EmptyField {
            line,
            field: "measurement_unit",
        });
    }
    Ok(Row {
        line,
        name,
        measurement_unit,
    })
}

/// Decodes `name,measurement_unit` rows. Files may or may not start with a header row naming
/// those two columns; it is skipped when present.
pub fn decode_ingredients(input: &[u8]) -> Result<Vec<Row>> {
    let input = input.strip_prefix(b"\xef\xbb\xbf").unwrap_or(input);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut rows = vec![];
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if index == 0 && record.iter().eq(["name", "measurement_unit"]) {
            continue;
        }
        rows.push(decode_record(&record)?);
    }
    Ok(rows)
}

pub fn decode_ingredients_from_path(path: impl AsRef<Path>) -> crate::Result<Vec<Row>> {
    let contents = std::fs::read(path)?;
    Ok(decode_ingredients(&contents)?)
}

#[cfg(test)]
fn row(line: u64, name: &str, measurement_unit: &str) -> Row {
    Row {
        line,
        name: name.into(),
        measurement_unit: measurement_unit.into(),
    }
}

#[test]
fn decode_plain_and_quoted() {
    let text = "name,measurement_unit\n\
                flour,g\n\
                \n\
                \"salt, coarse\",g\r\n\
                \"the \"\"good\"\" butter\", tbsp\n";
    assert_eq!(
        decode_ingredients(text.as_bytes()).unwrap(),
        vec![
            row(2, "flour", "g"),
            row(4, "salt, coarse", "g"),
            row(5, "the \"good\" butter", "tbsp"),
        ]
    );
}

#[test]
fn quoted_fields_may_span_lines() {
    let rows = decode_ingredients(b"\"sea\nsalt\",g\npepper,g\n").unwrap();
    assert_eq!(rows, vec![row(1, "sea\nsalt", "g"), row(3, "pepper", "g")]);
}

#[test]
fn byte_order_mark_does_not_hide_the_header() {
    let rows = decode_ingredients("\u{feff}name,measurement_unit\nflour,g\n".as_bytes()).unwrap();
    assert_eq!(rows, vec![row(2, "flour", "g")]);
}

#[test]
fn header_only_counts_first() {
    let rows = decode_ingredients(b"eggs,pcs\nname,measurement_unit\n").unwrap();
    assert_eq!(
        rows,
        vec![row(1, "eggs", "pcs"), row(2, "name", "measurement_unit")]
    );
}

#[test]
fn decode_errors_name_the_line() {
    assert_eq!(
        decode_ingredients(b"flour,g\nsugar\n"),
        Err(DecodeError::WrongFieldCount { line: 2, actual: 1 })
    );
    assert_eq!(
        decode_ingredients(b"flour,g,extra\n"),
        Err(DecodeError::WrongFieldCount { line: 1, actual: 3 })
    );
    assert_eq!(
        decode_ingredients(b" ,g\n"),
        Err(DecodeError::EmptyField {
            line: 1,
            field: "name"
        })
    );
    assert!(matches!(
        decode_ingredients(b"flour,g\nsalt,\xff\n"),
        Err(DecodeError::Csv { .. })
    ));

    let message = decode_ingredients(b"a,b\nc\n")
        .unwrap_err()
        .to_string();
    assert!(message.contains("line 2"), "{message}");
}
