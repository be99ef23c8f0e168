use std::fmt;

use crate::error::QueryError;

// ---------------------------------------------------------------------------
// CellValue – a single cell of the follow-up table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
/// Used as a key in ordered and hashed sets, so `CellValue` must be `Ord + Hash`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text.
    Date(String),
    Null,
}

// -- Manual Eq/Ord/Hash so floats can take part in sets --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn rank(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
                Date(_) => 5,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) | CellValue::Date(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) | CellValue::Date(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Exact, case-sensitive comparison against a selected filter value.
    ///
    /// Non-text cells are compared through their rendered form.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            CellValue::Text(s) | CellValue::Date(s) => s == value,
            other => other.to_string() == value,
        }
    }
}

// ---------------------------------------------------------------------------
// Record – one row of the table
// ---------------------------------------------------------------------------

/// One follow-up record. Values are aligned with [`Dataset::columns`].
///
/// Two records are the same record when every field matches; that is the
/// only notion of identity the source data offers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub values: Vec<CellValue>,
}

impl Record {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }

    /// Value at column `idx`, `Null` when the row is shorter than the schema.
    pub fn get(&self, idx: usize) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.values.get(idx).unwrap_or(&NULL)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full table: ordered column names and the records sharing them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    /// Column names in source order.
    pub columns: Vec<String>,
    /// All records (rows).
    pub records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, padding short rows with `Null` so every record
    /// matches the schema width.
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        let width = columns.len();
        let records = records
            .into_iter()
            .map(|mut rec| {
                rec.values.resize(width, CellValue::Null);
                rec
            })
            .collect();
        Dataset { columns, records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like [`column_index`](Self::column_index) but unknown names are an error.
    pub fn require_column(&self, name: &str) -> Result<usize, QueryError> {
        self.column_index(name)
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn cell_values_order_by_kind_then_value() {
        let set: BTreeSet<CellValue> = [
            CellValue::text("b"),
            CellValue::Integer(3),
            CellValue::Null,
            CellValue::text("a"),
            CellValue::Float(1.5),
        ]
        .into_iter()
        .collect();
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(
            ordered,
            vec![
                CellValue::Null,
                CellValue::Integer(3),
                CellValue::Float(1.5),
                CellValue::text("a"),
                CellValue::text("b"),
            ]
        );
    }

    #[test]
    fn identical_records_collapse_in_a_hash_set() {
        let a = Record::new(vec![CellValue::text("Activo"), CellValue::Float(2.0)]);
        let b = a.clone();
        let c = Record::new(vec![CellValue::text("Activo"), CellValue::Float(2.5)]);
        let set: HashSet<&Record> = [&a, &b, &c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let ds = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![Record::new(vec![CellValue::text("x")])],
        );
        assert_eq!(ds.records[0].get(1), &CellValue::Null);
        assert_eq!(ds.records[0].get(7), &CellValue::Null);
    }

    #[test]
    fn unknown_column_is_an_error() {
        let ds = Dataset::new(vec!["Estado".into()], Vec::new());
        assert_eq!(ds.require_column("Estado"), Ok(0));
        assert_eq!(
            ds.require_column("estado"),
            Err(QueryError::UnknownField("estado".into()))
        );
    }

    #[test]
    fn non_text_cells_match_by_rendered_form() {
        assert!(CellValue::Integer(42).matches("42"));
        assert!(CellValue::text("Activo").matches("Activo"));
        assert!(!CellValue::text("Activo").matches("activo"));
    }
}
