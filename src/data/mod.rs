// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the raw CSV file and the numeric matrix the
// classifiers consume.
//
//   Churn_Modelling.csv
//       │
//       ▼
//   CsvDatasetLoader   → Frame of typed columns + 0/1 target
//       │
//       ▼
//   stratified_split   → seeded 80/20 train/test row indices
//       │
//       ▼
//   ColumnTransformer  → StandardScaler on numeric columns,
//                        OneHotEncoder on categorical ones
//       │
//       ▼
//   Array2<f64>        → fed to the ml layer
//
// At serving time the same Frame type is built from validated
// customer records, so training and inference share one
// transformation path.

/// Column-oriented table of numeric and categorical columns
pub mod frame;

/// Reads the churn CSV into a Frame and a target vector
pub mod loader;

/// Seeded stratified train/test split
pub mod splitter;

/// Z-score scaling of numeric columns
pub mod scaler;

/// One-hot encoding of categorical columns
pub mod one_hot;

/// Composes the scaler and encoder over a Frame
pub mod preprocessor;
