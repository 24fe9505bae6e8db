//! Tabular import mapper
//!
//! Parses an uploaded delimited file into headers plus rows, and binds
//! logical resource fields to column positions. The binding is resolved once
//! per import and applied to every row; short or ragged rows are tolerated,
//! with missing cells reading as empty strings.

use crate::error::WorkflowError;
use std::collections::HashMap;

/// Logical fields an import column can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportField {
    Name,
    Address,
    City,
    State,
    Zip,
    ExternalId,
}

impl ImportField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportField::Name => "name",
            ImportField::Address => "address",
            ImportField::City => "city",
            ImportField::State => "state",
            ImportField::Zip => "zip",
            ImportField::ExternalId => "external-id",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(ImportField::Name),
            "address" => Some(ImportField::Address),
            "city" => Some(ImportField::City),
            "state" => Some(ImportField::State),
            "zip" => Some(ImportField::Zip),
            "external-id" | "external_id" => Some(ImportField::ExternalId),
            _ => None,
        }
    }

    /// All bindable fields, in display order.
    pub fn all() -> &'static [ImportField] {
        &[
            ImportField::Name,
            ImportField::Address,
            ImportField::City,
            ImportField::State,
            ImportField::Zip,
            ImportField::ExternalId,
        ]
    }
}

/// One parsed data row: the file line it came from and its raw cells.
#[derive(Debug, Clone)]
pub struct ImportRow {
    /// 1-based file line (the header is line 1, the first data row line 2).
    pub line: usize,
    pub cells: Vec<String>,
}

/// A parsed import file: ordered headers plus every data row.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub headers: Vec<String>,
    pub rows: Vec<ImportRow>,
}

impl ImportBatch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Parse delimited bytes into headers and rows.
///
/// The first row is always treated as headers. Column-count mismatches are
/// never an error: short rows simply have fewer cells, and reads past the
/// end resolve to "".
pub fn parse(data: &[u8]) -> Result<ImportBatch, WorkflowError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| WorkflowError::ImportParse(format!("could not read header row: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(WorkflowError::ImportParse(
            "file has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        rows.push(ImportRow {
            line: idx + 2,
            cells: record.iter().map(|c| c.to_string()).collect(),
        });
    }

    tracing::debug!("Parsed import file: {} columns, {} rows", headers.len(), rows.len());
    Ok(ImportBatch { headers, rows })
}

/// Binding from logical fields to column indexes, resolved once per import
/// session.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    indexes: HashMap<ImportField, usize>,
}

impl ColumnMapping {
    pub fn index_of(&self, field: ImportField) -> Option<usize> {
        self.indexes.get(&field).copied()
    }

    pub fn is_bound(&self, field: ImportField) -> bool {
        self.indexes.contains_key(&field)
    }

    /// Read a field's cell from a row. Unbound fields and cells past the end
    /// of a short row both read as "".
    pub fn value<'a>(&self, row: &'a ImportRow, field: ImportField) -> &'a str {
        self.indexes
            .get(&field)
            .and_then(|&idx| row.cells.get(idx))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

/// Bind logical fields to header names.
///
/// Fails with [`WorkflowError::UnboundFields`] listing every assignment whose
/// header is absent from the parsed header row; header matching is exact.
pub fn bind(
    headers: &[String],
    assignments: &[(ImportField, String)],
) -> Result<ColumnMapping, WorkflowError> {
    let mut indexes = HashMap::new();
    let mut missing = Vec::new();

    for (field, header) in assignments {
        match headers.iter().position(|h| h == header) {
            Some(idx) => {
                indexes.insert(*field, idx);
            }
            None => missing.push(format!("{} (header '{}')", field.as_str(), header)),
        }
    }

    if !missing.is_empty() {
        return Err(WorkflowError::UnboundFields(missing));
    }

    Ok(ColumnMapping { indexes })
}
