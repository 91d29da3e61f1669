//! Source adapters: map each export's native columns onto the canonical
//! field vocabulary and coerce cell values.
//!
//! A missing identifier column is fatal. A missing optional column is not.
//! A cell that fails to coerce is dropped with a [`DataWarning`], unless the
//! whole column fails, which means the column mapping itself is wrong.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::config::SourceConfig;
use crate::error::{DataWarning, TriageError};
use crate::source::{Field, SourceKind, ValueKind};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A coerced cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

/// One source row after renaming and coercion. Absent fields are not stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based line in the export, for warnings.
    pub line: usize,
    pub url: String,
    pub values: BTreeMap<Field, RawValue>,
}

impl RawRow {
    pub fn new(line: usize, url: impl Into<String>) -> Self {
        Self {
            line,
            url: url.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, field: Field, value: impl Into<String>) -> Self {
        self.values.insert(field, RawValue::Text(value.into()));
        self
    }

    pub fn with_number(mut self, field: Field, value: f64) -> Self {
        self.values.insert(field, RawValue::Number(value));
        self
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match self.values.get(&field) {
            Some(RawValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, field: Field) -> Option<f64> {
        match self.values.get(&field) {
            Some(RawValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn count(&self, field: Field) -> Option<u64> {
        self.number(field)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
            .map(|n| n as u64)
    }
}

/// All rows of one source, plus the warnings raised while reading them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub source: SourceKind,
    /// File name (or other label) the rows came from.
    pub label: String,
    /// Native header used as the page identifier; `None` only for an empty table.
    pub identifier_column: Option<String>,
    /// Resolved field → native header.
    pub columns: BTreeMap<Field, String>,
    pub rows: Vec<RawRow>,
    pub warnings: Vec<DataWarning>,
}

impl RawTable {
    /// A table built in code, identified by the canonical `url` field.
    pub fn new(source: SourceKind, label: impl Into<String>) -> Self {
        Self {
            source,
            label: label.into(),
            identifier_column: Some(Field::Url.name().to_string()),
            columns: BTreeMap::new(),
            rows: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A source that contributed nothing this run.
    pub fn empty(source: SourceKind) -> Self {
        Self {
            source,
            label: String::new(),
            identifier_column: None,
            columns: BTreeMap::new(),
            rows: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: RawRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read one export's CSV text into a [`RawTable`].
pub fn load_csv_rows(
    source: SourceKind,
    csv_data: &str,
    config: &SourceConfig,
) -> Result<RawTable, TriageError> {
    let (body, preamble_lines) = strip_preamble(csv_data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| TriageError::Csv {
            input: source,
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut warnings = Vec::new();
    let resolved = resolve_columns(source, &headers, config, &mut warnings)?;

    let url_idx = resolved[&Field::Url];
    let mut rows = Vec::new();
    // field → (non-empty cells, coerced cells)
    let mut coverage: BTreeMap<Field, (usize, usize)> = BTreeMap::new();

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| TriageError::Csv {
            input: source,
            message: e.to_string(),
        })?;
        let line = preamble_lines
            + record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(i + 2);

        let mut row = RawRow::new(line, record.get(url_idx).unwrap_or("").trim());

        for (&field, &idx) in &resolved {
            if field == Field::Url {
                continue;
            }
            let cell = record.get(idx).unwrap_or("").trim();
            if cell.is_empty() {
                continue;
            }
            let kind = field.kind();
            if !kind.is_numeric() {
                row.values.insert(field, RawValue::Text(cell.to_string()));
                continue;
            }

            let stats = coverage.entry(field).or_insert((0, 0));
            stats.0 += 1;
            match coerce(kind, cell) {
                Some(n) => {
                    stats.1 += 1;
                    row.values.insert(field, RawValue::Number(n));
                }
                None => {
                    let w = DataWarning::UnparseableValue {
                        source,
                        line,
                        column: headers[idx].clone(),
                        value: cell.to_string(),
                    };
                    warn!("{w}");
                    warnings.push(w);
                }
            }
        }

        rows.push(row);
    }

    for (field, (non_empty, coerced)) in &coverage {
        if *non_empty > 0 && *coerced == 0 {
            return Err(TriageError::UncoercibleColumn {
                input: source,
                column: headers[resolved[field]].clone(),
            });
        }
    }

    debug!(
        "{source}: {} rows, {} of {} fields mapped",
        rows.len(),
        resolved.len(),
        source.fields().len()
    );

    Ok(RawTable {
        source,
        label: config.file.clone(),
        identifier_column: Some(headers[url_idx].clone()),
        columns: resolved
            .iter()
            .map(|(field, idx)| (*field, headers[*idx].clone()))
            .collect(),
        rows,
        warnings,
    })
}

/// Split off the `#` lines some exports put above the header. Returns the
/// remaining text and the number of lines skipped. Data rows are never
/// treated as comments, whatever their first cell holds.
fn strip_preamble(csv_data: &str) -> (&str, usize) {
    let mut rest = csv_data.strip_prefix('\u{feff}').unwrap_or(csv_data);
    let mut skipped = 0;
    while rest.trim_start_matches([' ', '\t']).starts_with('#') {
        rest = match rest.find('\n') {
            Some(end) => &rest[end + 1..],
            None => "",
        };
        skipped += 1;
    }
    (rest, skipped)
}

/// Map each source field to a header index. Exact match first, then
/// case-insensitive, walking the candidates in order.
fn resolve_columns(
    source: SourceKind,
    headers: &[String],
    config: &SourceConfig,
    warnings: &mut Vec<DataWarning>,
) -> Result<BTreeMap<Field, usize>, TriageError> {
    let mut resolved = BTreeMap::new();

    for &field in source.fields() {
        let overridden = config.columns.get(field.name());
        let candidates: Vec<&str> = match overridden {
            Some(column) => vec![column.as_str()],
            None => source.default_aliases(field).to_vec(),
        };

        match find_header(headers, &candidates) {
            Some(idx) => {
                resolved.insert(field, idx);
            }
            None if field == Field::Url => {
                return Err(TriageError::MissingIdentifierColumn {
                    input: source,
                    tried: candidates
                        .iter()
                        .map(|c| format!("'{c}'"))
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            None => match overridden {
                Some(column) => {
                    let w = DataWarning::ColumnNotFound {
                        source,
                        field,
                        column: column.clone(),
                    };
                    warn!("{w}");
                    warnings.push(w);
                }
                None => debug!("{source}: no column for '{field}'"),
            },
        }
    }

    Ok(resolved)
}

fn find_header(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
        .or_else(|| {
            candidates.iter().find_map(|c| {
                let c = c.trim();
                headers.iter().position(|h| h.eq_ignore_ascii_case(c))
            })
        })
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Coerce a non-empty cell according to its field kind.
pub fn coerce(kind: ValueKind, cell: &str) -> Option<f64> {
    match kind {
        ValueKind::Number => parse_number(cell),
        ValueKind::Count => parse_number(cell).filter(|n| *n >= 0.0 && n.fract() == 0.0),
        ValueKind::Quantity => parse_number(cell).filter(|n| *n >= 0.0),
        ValueKind::Ratio => parse_ratio(cell),
        ValueKind::Duration => parse_duration(cell),
        ValueKind::Identifier | ValueKind::Text => None,
    }
}

/// Plain number with optional thousands separators. Rejects NaN and infinities.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `0.045` or `4.5%`, both → 0.045.
pub fn parse_ratio(s: &str) -> Option<f64> {
    let s = s.trim();
    match s.strip_suffix('%') {
        Some(pct) => parse_number(pct).map(|n| n / 100.0),
        None => parse_number(s),
    }
}

/// Seconds as `83.5`, `1:23.5` or `0:01:23`.
pub fn parse_duration(s: &str) -> Option<f64> {
    let s = s.trim();
    if !s.contains(':') {
        return parse_number(s).filter(|n| *n >= 0.0);
    }
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut total = 0.0;
    for part in &parts {
        let v = parse_number(part).filter(|n| *n >= 0.0)?;
        total = total * 60.0 + v;
    }
    Some(total)
}
