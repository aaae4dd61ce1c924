//! Row codec: typed row shapes ⇄ flat rows (JSON objects or CSV lines).
//!
//! A row type declares its columns once in a [`RowSchema`]: a table of
//! [`FieldSpec`]s naming the remote column (dotted for relationship fields,
//! e.g. `Owner.Name`) and the kind of value it holds. Decoding converts each
//! declared column to its kind before handing the [`Record`] to
//! [`Row::from_record`]; undeclared columns are ignored.
//!
//! ```rust
//! use std::sync::OnceLock;
//! use forcelink_client::{FieldKind, FieldSpec, Record, Result, Row, RowSchema};
//!
//! struct Contact {
//!     id: String,
//!     owner: Option<String>,
//!     age: Option<i64>,
//! }
//!
//! impl Row for Contact {
//!     fn schema() -> &'static RowSchema {
//!         static SCHEMA: OnceLock<RowSchema> = OnceLock::new();
//!         SCHEMA.get_or_init(|| {
//!             RowSchema::new(vec![
//!                 FieldSpec::new("Id", FieldKind::Text),
//!                 FieldSpec::new("Owner.Name", FieldKind::Text),
//!                 FieldSpec::new("Age__c", FieldKind::Integer),
//!             ])
//!         })
//!     }
//!
//!     fn from_record(record: Record) -> Result<Self> {
//!         Ok(Self {
//!             id: forcelink_client::codec::required_str(&record, "Id")?.to_string(),
//!             owner: record.get_str("Owner.Name").map(str::to_string),
//!             age: record.get_i64("Age__c"),
//!         })
//!     }
//!
//!     fn to_record(&self) -> Record {
//!         Record::new()
//!             .with("Id", self.id.as_str())
//!             .with("Owner.Name", self.owner.clone())
//!             .with("Age__c", self.age)
//!     }
//! }
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::ops::Range;
use std::sync::OnceLock;

use crate::error::{Error, ErrorKind, Result};
use crate::record::{FieldValue, Record};

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    /// Keep whatever the source produced.
    Any,
}

/// One column of a row shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Remote column name; dotted for relationship paths.
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(column: &'static str, kind: FieldKind) -> Self {
        Self { column, kind }
    }
}

/// Column table for a row type. Built once per type.
///
/// An empty schema is dynamic: every column is kept as-is.
#[derive(Debug, Clone, Default)]
pub struct RowSchema {
    fields: Vec<FieldSpec>,
}

impl RowSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn dynamic() -> Self {
        Self::default()
    }

    pub fn is_dynamic(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.column).collect()
    }

    pub fn kind_of(&self, column: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.column == column).map(|f| f.kind)
    }
}

/// A caller-defined row shape.
pub trait Row: Sized {
    /// The column table for this shape.
    fn schema() -> &'static RowSchema;

    /// Build the row from a record whose declared columns are already converted.
    fn from_record(record: Record) -> Result<Self>;

    /// Flatten the row for encoding.
    fn to_record(&self) -> Record;
}

impl Row for Record {
    fn schema() -> &'static RowSchema {
        static DYNAMIC: OnceLock<RowSchema> = OnceLock::new();
        DYNAMIC.get_or_init(RowSchema::dynamic)
    }

    fn from_record(record: Record) -> Result<Self> {
        Ok(record)
    }

    fn to_record(&self) -> Record {
        self.clone()
    }
}

/// Fetch a text column that must be present.
pub fn required_str<'a>(record: &'a Record, column: &str) -> Result<&'a str> {
    record
        .get_str(column)
        .ok_or_else(|| Error::validation(format!("missing required column '{column}'")))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn convert(kind: FieldKind, value: &FieldValue) -> std::result::Result<FieldValue, &'static str> {
    if let FieldValue::String(s) = value {
        if s.is_empty() && !matches!(kind, FieldKind::Text | FieldKind::Any) {
            return Ok(FieldValue::Null);
        }
    }

    match (kind, value) {
        (_, FieldValue::Null) | (FieldKind::Any, _) => Ok(value.clone()),

        (FieldKind::Text, FieldValue::String(_)) => Ok(value.clone()),
        (FieldKind::Text, other) => Ok(FieldValue::String(other.to_text())),

        (FieldKind::Integer, FieldValue::Integer(_)) => Ok(value.clone()),
        (FieldKind::Integer, FieldValue::Float(f)) if f.fract() == 0.0 => {
            Ok(FieldValue::Integer(*f as i64))
        }
        (FieldKind::Integer, FieldValue::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| "expected an integer"),

        (FieldKind::Float, FieldValue::Float(_)) => Ok(value.clone()),
        (FieldKind::Float, FieldValue::Integer(n)) => Ok(FieldValue::Float(*n as f64)),
        (FieldKind::Float, FieldValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|_| "expected a number"),

        (FieldKind::Boolean, FieldValue::Boolean(_)) => Ok(value.clone()),
        (FieldKind::Boolean, FieldValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(FieldValue::Boolean(true)),
            "false" => Ok(FieldValue::Boolean(false)),
            _ => Err("expected true or false"),
        },

        (FieldKind::Date, FieldValue::Date(_)) => Ok(value.clone()),
        (FieldKind::Date, FieldValue::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(FieldValue::Date)
            .map_err(|_| "expected a date (YYYY-MM-DD)"),

        (FieldKind::DateTime, FieldValue::DateTime(_)) => Ok(value.clone()),
        (FieldKind::DateTime, FieldValue::String(s)) => parse_datetime(s.trim())
            .map(FieldValue::DateTime)
            .ok_or("expected an ISO-8601 datetime"),

        (FieldKind::Integer, _) => Err("expected an integer"),
        (FieldKind::Float, _) => Err("expected a number"),
        (FieldKind::Boolean, _) => Err("expected true or false"),
        (FieldKind::Date, _) => Err("expected a date (YYYY-MM-DD)"),
        (FieldKind::DateTime, _) => Err("expected an ISO-8601 datetime"),
    }
}

/// Apply a schema to a raw, flattened row.
pub fn apply_schema(raw: Record, schema: &RowSchema, row: usize) -> Result<Record> {
    if schema.is_dynamic() {
        return Ok(raw);
    }

    let mut typed = Record::new();
    for spec in schema.fields() {
        let Some(value) = raw.get(spec.column) else {
            continue;
        };
        let converted = convert(spec.kind, value).map_err(|reason| {
            Error::new(ErrorKind::Decode {
                field: spec.column.to_string(),
                row,
                value: value.to_text(),
                reason: reason.to_string(),
            })
        })?;
        typed.insert(spec.column, converted);
    }
    Ok(typed)
}

/// Decode one flattened row into `T`.
pub fn decode_row<T: Row>(raw: Record, row: usize) -> Result<T> {
    T::from_record(apply_schema(raw, T::schema(), row)?)
}

/// Decode JSON objects (REST query `records`). `first_row` is the index of
/// `rows[0]` within the whole result set.
pub fn decode_json_rows<T: Row>(rows: &[Value], first_row: usize) -> Result<Vec<T>> {
    rows.iter()
        .enumerate()
        .map(|(i, value)| {
            let row = first_row + i;
            let object = value.as_object().ok_or_else(|| {
                Error::new(ErrorKind::Json(format!("row {row} is not a JSON object")))
            })?;
            decode_row(Record::from_json_object(object), row)
        })
        .collect()
}

/// Decode CSV with a header line. Empty cells are null.
pub fn decode_csv<T: Row>(data: &[u8], first_row: usize) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = first_row + i;
        let cells =
            result.map_err(|err| Error::with_source(ErrorKind::Csv(format!("row {row}: {err}")), err))?;
        let raw: Record = headers
            .iter()
            .zip(cells.iter())
            .map(|(column, cell)| {
                let value = if cell.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::String(cell.to_string())
                };
                (column, value)
            })
            .collect();
        rows.push(decode_row(raw, row)?);
    }
    Ok(rows)
}

/// CSV-encoded rows with per-row byte offsets, so callers can cut
/// size-bounded chunks without re-encoding.
#[derive(Debug, Clone)]
pub struct CsvRows {
    data: Vec<u8>,
    header_end: usize,
    row_ends: Vec<usize>,
}

impl CsvRows {
    pub fn len(&self) -> usize {
        self.row_ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ends.is_empty()
    }

    pub fn header(&self) -> &[u8] {
        &self.data[..self.header_end]
    }

    fn row_start(&self, index: usize) -> usize {
        if index == 0 {
            self.header_end
        } else {
            self.row_ends[index - 1]
        }
    }

    /// Encoded size of one row, including its line terminator.
    pub fn row_size(&self, index: usize) -> usize {
        self.row_ends[index] - self.row_start(index)
    }

    /// Header plus rows `range`, ready to upload.
    pub fn chunk(&self, range: Range<usize>) -> Vec<u8> {
        if range.is_empty() {
            return self.header().to_vec();
        }
        let start = self.row_start(range.start);
        let end = self.row_ends[range.end - 1];
        let mut out = Vec::with_capacity(self.header_end + end - start);
        out.extend_from_slice(self.header());
        out.extend_from_slice(&self.data[start..end]);
        out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Index pre-built CSV, header line first, without re-encoding it.
    ///
    /// Quoted cells may span lines; row boundaries follow the CSV grammar.
    pub fn parse(data: Vec<u8>) -> Result<CsvRows> {
        let (header_end, row_ends) = {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_reader(data.as_slice());
            reader.byte_headers()?;
            let header_end = reader.position().byte() as usize;

            let mut row_ends = Vec::new();
            let mut record = csv::ByteRecord::new();
            while reader.read_byte_record(&mut record)? {
                row_ends.push(reader.position().byte() as usize);
            }
            (header_end, row_ends)
        };

        Ok(CsvRows {
            data,
            header_end,
            row_ends,
        })
    }

    /// Column names from the header line.
    pub fn columns(&self) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(self.header());
        match reader.records().next() {
            Some(header) => Ok(header?.iter().map(str::to_string).collect()),
            None => Ok(Vec::new()),
        }
    }
}

fn encode_columns<T: Row>(rows: &[Record]) -> Vec<String> {
    let schema = T::schema();
    if !schema.is_dynamic() {
        return schema.columns().into_iter().map(str::to_string).collect();
    }

    let mut columns: Vec<String> = Vec::new();
    for record in rows {
        for name in record.names() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

/// CSV-encode rows. The header is the schema's columns, or for dynamic rows
/// the union of field names in first-seen order.
pub fn encode_csv_rows<T: Row>(rows: &[T]) -> Result<CsvRows> {
    let records: Vec<Record> = rows.iter().map(Row::to_record).collect();
    let columns = encode_columns::<T>(&records);

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let io_err = |e: std::io::Error| Error::with_source(ErrorKind::Csv(e.to_string()), e);

    writer.write_record(&columns)?;
    writer.flush().map_err(io_err)?;
    let header_end = writer.get_ref().len();

    let mut row_ends = Vec::with_capacity(records.len());
    for record in &records {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| record.get(c).map(FieldValue::to_text).unwrap_or_default())
            .collect();
        writer.write_record(&cells)?;
        writer.flush().map_err(io_err)?;
        row_ends.push(writer.get_ref().len());
    }

    let data = writer
        .into_inner()
        .map_err(|e| Error::new(ErrorKind::Csv(e.to_string())))?;

    Ok(CsvRows {
        data,
        header_end,
        row_ends,
    })
}

/// CSV-encode rows into one buffer.
pub fn encode_csv<T: Row>(rows: &[T]) -> Result<Vec<u8>> {
    Ok(encode_csv_rows(rows)?.into_bytes())
}
