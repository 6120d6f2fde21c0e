//! Core domain types: schema context, result sets, and the final answer.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// SchemaDescription
// ---------------------------------------------------------------------------

/// Label reported for columns declared without a type.
pub const UNTYPED_COLUMN: &str = "ANY";

/// One column of a user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type as reported by the store (never empty).
    #[serde(rename = "type")]
    pub data_type: String,
}

/// One user table and its columns, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// Every user table in the store, in the store's enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableSchema>,
}

impl SchemaDescription {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Look up a table by exact name.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Compact text form embedded in synthesis prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(out, "Table '{}':", table.name);
            for col in &table.columns {
                let _ = writeln!(out, "  - {} ({})", col.name, col.data_type);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// CandidateQuery
// ---------------------------------------------------------------------------

/// Sanitized, still unvalidated, query text produced by synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery(String);

impl CandidateQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ResultSet
// ---------------------------------------------------------------------------

/// A single scalar cell after normalization.
///
/// There is exactly one null representation: SQL NULL and NaN both become
/// [`CellValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    /// Build a real-valued cell, collapsing NaN into `Null`.
    pub fn real(value: f64) -> Self {
        if value.is_nan() {
            Self::Null
        } else {
            Self::Real(value)
        }
    }

    /// Binary payloads are carried as base64 text.
    pub fn blob(bytes: &[u8]) -> Self {
        Self::Text(STANDARD.encode(bytes))
    }

    /// Numeric view of the cell, if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Real(r) if r.is_finite() => serializer.serialize_f64(*r),
            Self::Real(_) => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Materialized query output: ordered columns and rows of normalized cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The cell at row 0, column 0.
    pub fn first_scalar(&self) -> Option<&CellValue> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Fixed-width table: a header line plus one right-aligned line per row.
    pub fn to_text_table(&self) -> String {
        if self.columns.is_empty() {
            return String::from("Empty result (no columns)");
        }

        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                rendered
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(name, w)| format!("{name:>w$}"))
            .collect();
        out.push_str(&header.join(" "));

        if rendered.is_empty() {
            out.push_str("\n(no rows)");
        }
        for row in &rendered {
            out.push('\n');
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{cell:>w$}"))
                .collect();
            out.push_str(&line.join(" "));
        }
        out
    }
}

/// Serializes as `[{column: value, ...}, ...]` with keys in column order.
impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct RowRef<'a> {
            columns: &'a [String],
            cells: &'a [CellValue],
        }

        impl Serialize for RowRef<'_> {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.columns.len()))?;
                for (name, cell) in self.columns.iter().zip(self.cells) {
                    map.serialize_entry(name, cell)?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRef {
                columns: &self.columns,
                cells: row,
            })?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// The structured reply for one question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub generated_query: String,
    pub database_result: ResultSet,
    pub answer: String,
    /// Base64-encoded PNG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_image: Option<String>,
    /// Path of the persisted chart copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_schema() -> SchemaDescription {
        SchemaDescription {
            tables: vec![TableSchema {
                name: "total_sales".into(),
                columns: vec![
                    ColumnSchema {
                        name: "date".into(),
                        data_type: "TEXT".into(),
                    },
                    ColumnSchema {
                        name: "amount".into(),
                        data_type: "INTEGER".into(),
                    },
                ],
            }],
        }
    }

    #[test]
    fn prompt_text_lists_tables_and_columns() {
        let text = sales_schema().to_prompt_text();
        assert_eq!(
            text,
            "Table 'total_sales':\n  - date (TEXT)\n  - amount (INTEGER)\n"
        );
        assert_eq!(SchemaDescription::default().to_prompt_text(), "");
    }

    #[test]
    fn nan_collapses_to_null() {
        assert_eq!(CellValue::real(f64::NAN), CellValue::Null);
        assert_eq!(CellValue::real(1.5), CellValue::Real(1.5));
    }

    #[test]
    fn result_set_serializes_as_ordered_records() {
        let mut rs = ResultSet::new(vec!["zeta".into(), "alpha".into()]);
        rs.rows.push(vec![CellValue::Integer(1), CellValue::Null]);
        rs.rows.push(vec![CellValue::real(f64::NAN), CellValue::Text("x".into())]);

        let json = serde_json::to_string(&rs).unwrap();
        assert_eq!(
            json,
            r#"[{"zeta":1,"alpha":null},{"zeta":null,"alpha":"x"}]"#
        );
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn text_table_right_aligns() {
        let mut rs = ResultSet::new(vec!["channel".into(), "roas".into()]);
        rs.rows.push(vec![CellValue::Text("search".into()), CellValue::Real(3.25)]);
        rs.rows.push(vec![CellValue::Text("tv".into()), CellValue::Null]);

        let table = rs.to_text_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "channel roas");
        assert_eq!(lines[1], " search 3.25");
        assert_eq!(lines[2], "     tv None");
    }

    #[test]
    fn first_scalar_and_numeric_view() {
        let mut rs = ResultSet::new(vec!["amount".into()]);
        assert!(rs.first_scalar().is_none());
        rs.rows.push(vec![CellValue::Integer(1000)]);
        assert_eq!(rs.first_scalar().and_then(CellValue::as_f64), Some(1000.0));
        assert_eq!(CellValue::Text("1000".into()).as_f64(), None);
    }

    #[test]
    fn answer_omits_absent_chart_fields() {
        let answer = Answer {
            question: "q".into(),
            generated_query: "SELECT 1".into(),
            database_result: ResultSet::default(),
            answer: "a".into(),
            chart_image: None,
            chart_reference: None,
        };
        let value = serde_json::to_value(&answer).unwrap();
        assert!(value.get("chart_image").is_none());
        assert_eq!(value["database_result"], serde_json::json!([]));
    }
}
