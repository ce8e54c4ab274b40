use std::error::Error;

use bytes::BytesMut;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

/// A single value of an output table.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    fn describe(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
            Cell::Date(_) => "date",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Int(value.into())
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

fn is_text(ty: &Type) -> bool {
    [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN].contains(ty)
}

fn unsupported(cell: &Cell, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot write a {} cell into a {ty} column", cell.describe()).into()
}

// Parameter types come from the prepared statement, so each cell is encoded for
// the type the server asked for. Unsupported pairs fail instead of sending bytes
// the server would misread.
impl ToSql for Cell {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Cell::Null => Ok(IsNull::Yes),
            Cell::Bool(value) if *ty == Type::BOOL => value.to_sql(ty, out),
            Cell::Int(value) => {
                if *ty == Type::INT2 {
                    i16::try_from(*value)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*value)?.to_sql(ty, out)
                } else if *ty == Type::INT8 {
                    value.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    (*value as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*value as f64).to_sql(ty, out)
                } else if is_text(ty) {
                    value.to_string().to_sql(ty, out)
                } else {
                    Err(unsupported(self, ty))
                }
            }
            Cell::Float(value) => {
                if *ty == Type::FLOAT4 {
                    (*value as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    value.to_sql(ty, out)
                } else if is_text(ty) {
                    value.to_string().to_sql(ty, out)
                } else {
                    Err(unsupported(self, ty))
                }
            }
            Cell::Text(value) => {
                if is_text(ty) {
                    value.to_sql(ty, out)
                } else if *ty == Type::INT2 {
                    value.trim().parse::<i16>()?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    value.trim().parse::<i32>()?.to_sql(ty, out)
                } else if *ty == Type::INT8 {
                    value.trim().parse::<i64>()?.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    value.trim().parse::<f32>()?.to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    value.trim().parse::<f64>()?.to_sql(ty, out)
                } else {
                    Err(unsupported(self, ty))
                }
            }
            Cell::Date(value) => {
                let midnight = value.and_time(NaiveTime::MIN);
                if *ty == Type::DATE {
                    value.to_sql(ty, out)
                } else if *ty == Type::TIMESTAMP {
                    midnight.to_sql(ty, out)
                } else if *ty == Type::TIMESTAMPTZ {
                    Utc.from_utc_datetime(&midnight).to_sql(ty, out)
                } else if is_text(ty) {
                    value.to_string().to_sql(ty, out)
                } else {
                    Err(unsupported(self, ty))
                }
            }
            Cell::Bool(_) => Err(unsupported(self, ty)),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Bool,
    Int,
    Float,
    Text,
    Date,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: Kind,
}

/// A fully materialized metric output, written with truncate-then-append.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<N: Into<String>>(name: impl Into<String>, columns: impl IntoIterator<Item = (N, Kind)>) -> Self {
        Table {
            name: name.into(),
            columns: columns
                .into_iter()
                .map(|(name, kind)| Column {
                    name: name.into(),
                    kind,
                })
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width of {}", self.name);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Vec<&Cell> {
        match self.column_index(name) {
            Some(index) => self.rows.iter().map(|row| &row[index]).collect(),
            None => Vec::new(),
        }
    }

    /// Rows projected onto the given columns, handy for key comparisons.
    pub fn project(&self, names: &[&str]) -> Vec<Vec<Cell>> {
        let indices: Vec<usize> = names.iter().filter_map(|name| self.column_index(name)).collect();
        self.rows
            .iter()
            .map(|row| indices.iter().map(|index| row[*index].clone()).collect())
            .collect()
    }
}
