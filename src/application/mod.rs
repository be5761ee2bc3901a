// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only. Each use case tells the other
// layers what to do and in which order:
//
//   train_use_case.rs   — load, split, fit, evaluate, track and
//                         export one model
//   predict_use_case.rs — validate a batch of customers and score
//                         it with the cached model
//
// No ML math, HTTP or printing here.

pub mod train_use_case;

pub mod predict_use_case;
