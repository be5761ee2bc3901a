// ============================================================
// Layer 4 — Frame
// ============================================================
// A minimal column-oriented table: named columns that are either
// numeric (f64) or categorical (String). It is what the dataset
// loader produces at training time and what customer records are
// assembled into at serving time.

use anyhow::{anyhow, bail, Result};

use crate::domain::customer::CustomerRecord;
use crate::domain::schema::{ColumnKind, FeatureColumn, FeatureSchema};

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v)     => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Numeric(_)     => ColumnKind::Numeric,
            Column::Categorical(_) => ColumnKind::Categorical,
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v)     => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
            Column::Categorical(v) => Column::Categorical(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names:   Vec<String>,
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Fails on a duplicate name or a length that
    /// differs from the columns already present.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            bail!("duplicate column '{name}'");
        }
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            bail!(
                "column '{}' has {} rows, frame has {}",
                name,
                column.len(),
                self.n_rows()
            );
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Categorical(_)) => Err(anyhow!("column '{name}' is categorical, expected numeric")),
            None => Err(anyhow!("column '{name}' not found")),
        }
    }

    pub fn categorical(&self, name: &str) -> Result<&[String]> {
        match self.column(name) {
            Some(Column::Categorical(v)) => Ok(v),
            Some(Column::Numeric(_)) => Err(anyhow!("column '{name}' is numeric, expected categorical")),
            None => Err(anyhow!("column '{name}' not found")),
        }
    }

    /// Names of integer/float columns, in frame order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.names_of(ColumnKind::Numeric)
    }

    /// Names of string columns, in frame order.
    pub fn categorical_columns(&self) -> Vec<String> {
        self.names_of(ColumnKind::Categorical)
    }

    fn names_of(&self, kind: ColumnKind) -> Vec<String> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| c.kind() == kind)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// New frame holding only the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Frame {
        Frame {
            names:   self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(
            self.names()
                .iter()
                .zip(&self.columns)
                .map(|(name, c)| FeatureColumn { name: name.clone(), kind: c.kind() })
                .collect(),
        )
    }

    /// Every schema column must be present here with the same kind.
    /// Extra columns in the frame are allowed and ignored downstream.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        for expected in schema.columns() {
            match self.column(&expected.name) {
                None => bail!("missing feature column '{}'", expected.name),
                Some(c) if c.kind() != expected.kind => bail!(
                    "feature column '{}' is {}, model was trained on {}",
                    expected.name,
                    c.kind(),
                    expected.kind
                ),
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Assemble validated customer records into a frame whose column
    /// names match the training CSV header.
    pub fn from_customers(records: &[CustomerRecord]) -> Frame {
        let num = |f: fn(&CustomerRecord) -> f64| Column::Numeric(records.iter().map(f).collect());
        let cat = |f: fn(&CustomerRecord) -> &str| {
            Column::Categorical(records.iter().map(|r| f(r).to_string()).collect())
        };

        let columns = vec![
            ("CreditScore",     num(|r| r.credit_score as f64)),
            ("Geography",       cat(|r| r.geography.as_str())),
            ("Gender",          cat(|r| r.gender.as_str())),
            ("Age",             num(|r| r.age as f64)),
            ("Tenure",          num(|r| r.tenure as f64)),
            ("Balance",         num(|r| r.balance)),
            ("NumOfProducts",   num(|r| r.num_of_products as f64)),
            ("HasCrCard",       num(|r| r.has_cr_card as f64)),
            ("IsActiveMember",  num(|r| r.is_active_member as f64)),
            ("EstimatedSalary", num(|r| r.estimated_salary)),
        ];

        let (names, columns) = columns
            .into_iter()
            .map(|(n, c)| (n.to_string(), c))
            .unzip();
        Frame { names, columns }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_customer;

    fn small_frame() -> Frame {
        let mut f = Frame::new();
        f.push_column("Age", Column::Numeric(vec![30.0, 40.0, 50.0])).unwrap();
        f.push_column("Gender", Column::Categorical(vec!["Male".into(), "Female".into(), "Male".into()])).unwrap();
        f
    }

    #[test]
    fn test_push_column_length_mismatch() {
        let mut f = small_frame();
        let err = f.push_column("Tenure", Column::Numeric(vec![1.0])).unwrap_err();
        assert!(err.to_string().contains("Tenure"));
    }

    #[test]
    fn test_push_column_duplicate() {
        let mut f = small_frame();
        assert!(f.push_column("Age", Column::Numeric(vec![1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn test_take_rows_reorders() {
        let f = small_frame().take_rows(&[2, 0]);
        assert_eq!(f.n_rows(), 2);
        assert_eq!(f.numeric("Age").unwrap(), &[50.0, 30.0]);
        assert_eq!(f.categorical("Gender").unwrap(), &["Male".to_string(), "Male".to_string()]);
    }

    #[test]
    fn test_kind_introspection() {
        let f = small_frame();
        assert_eq!(f.numeric_columns(), vec!["Age"]);
        assert_eq!(f.categorical_columns(), vec!["Gender"]);
        assert!(f.numeric("Gender").is_err());
    }

    #[test]
    fn test_from_customers_matches_training_names() {
        let f = Frame::from_customers(&[sample_customer(), sample_customer()]);
        assert_eq!(f.n_rows(), 2);
        assert_eq!(f.n_cols(), 10);
        assert_eq!(f.categorical_columns(), vec!["Geography", "Gender"]);
        assert_eq!(f.numeric("Balance").unwrap(), &[60000.0, 60000.0]);
    }

    #[test]
    fn test_check_schema_detects_kind_skew() {
        let trained = small_frame().schema();
        let mut skewed = Frame::new();
        skewed.push_column("Age", Column::Categorical(vec!["30".into()])).unwrap();
        skewed.push_column("Gender", Column::Categorical(vec!["Male".into()])).unwrap();
        let err = skewed.check_schema(&trained).unwrap_err();
        assert!(err.to_string().contains("Age"));
    }

    #[test]
    fn test_check_schema_missing_column() {
        let trained = small_frame().schema();
        let mut partial = Frame::new();
        partial.push_column("Age", Column::Numeric(vec![30.0])).unwrap();
        assert!(partial.check_schema(&trained).is_err());
    }
}
