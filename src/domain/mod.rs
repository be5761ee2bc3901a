// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that name the concepts of the
// system: the customer being scored, the feature schema a model
// was trained against, the prediction handed back, and the
// experiment tracker a training run reports to.
//
// Rules for this layer:
//   - NO burn, ndarray, axum or reqwest types here
//   - NO file I/O or network calls
//   - Only structs, enums, validation and traits

// A customer record as submitted to /predict
pub mod customer;

// Ordered, typed feature columns captured at training time
pub mod schema;

// Parallel prediction/probability arrays
pub mod prediction;

// Abstractions implemented by the infra layer
pub mod traits;
