// Shared fixtures for the unit tests. Everything here is seeded,
// so a given (n, seed) always yields the same data.

use chrono::{TimeZone, Utc};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::data::{frame::Frame, loader::Dataset, preprocessor::build_preprocessor};
use crate::domain::customer::CustomerRecord;
use crate::infra::model_store::{ArtifactMetadata, ModelArtifact, FORMAT_VERSION};
use crate::ml::{
    model::{get_model, HyperParams},
    pipeline::Pipeline,
};

/// The example customer from the API docs.
pub fn sample_customer() -> CustomerRecord {
    CustomerRecord {
        credit_score:     600,
        geography:        "France".to_string(),
        gender:           "Female".to_string(),
        age:              45,
        tenure:           3,
        balance:          60000.0,
        num_of_products:  2,
        has_cr_card:      1,
        is_active_member: 0,
        estimated_salary: 50000.0,
    }
}

/// `n` rows of 4 features in [-2, 2]; the label is mostly
/// determined by `1.5·x0 − x1` with a little noise.
pub fn synthetic_matrix(n: usize, seed: u64) -> (Array2<f64>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n, 4), |_| rng.gen_range(-2.0..2.0));
    let mut y: Vec<u8> = x
        .rows()
        .into_iter()
        .map(|r| {
            let score = 1.5 * r[0] - r[1] + rng.gen_range(-0.3..0.3);
            u8::from(score > 0.0)
        })
        .collect();
    force_both_classes(&mut y);
    (x, y)
}

/// Churn-like customers with a learnable label.
pub fn synthetic_customers(n: usize, seed: u64) -> (Vec<CustomerRecord>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let geographies = ["France", "Spain", "Germany"];
    let genders = ["Male", "Female"];

    let mut records = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let record = CustomerRecord {
            credit_score:     rng.gen_range(350..=850),
            geography:        geographies[rng.gen_range(0..3)].to_string(),
            gender:           genders[rng.gen_range(0..2)].to_string(),
            age:              rng.gen_range(18..=80),
            tenure:           rng.gen_range(0..=10),
            balance:          if rng.gen_bool(0.3) { 0.0 } else { rng.gen_range(1000.0..200000.0_f64).round() },
            num_of_products:  rng.gen_range(1..=4),
            has_cr_card:      rng.gen_range(0..=1),
            is_active_member: rng.gen_range(0..=1),
            estimated_salary: rng.gen_range(10000.0..200000.0_f64).round(),
        };
        let score = (record.age as f64 - 42.0) / 10.0
            + 0.8 * (1 - record.is_active_member) as f64
            + if record.geography == "Germany" { 0.7 } else { 0.0 }
            + if record.num_of_products >= 3 { 1.5 } else { 0.0 }
            - 0.9
            + rng.gen_range(-0.4..0.4);
        labels.push(u8::from(score > 0.0));
        records.push(record);
    }
    force_both_classes(&mut labels);
    (records, labels)
}

pub fn synthetic_dataset(n: usize, seed: u64) -> Dataset {
    let (records, target) = synthetic_customers(n, seed);
    Dataset {
        features: Frame::from_customers(&records),
        target,
    }
}

/// The same customers rendered as a churn CSV, id columns included.
pub fn synthetic_csv(n: usize, seed: u64) -> String {
    let (records, labels) = synthetic_customers(n, seed);
    let mut out = String::from(
        "RowNumber,CustomerId,Surname,CreditScore,Geography,Gender,Age,Tenure,Balance,\
         NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary,Exited\n",
    );
    for (i, (r, y)) in records.iter().zip(&labels).enumerate() {
        let _ = writeln!(
            out,
            "{},{},Surname{},{},{},{},{},{},{},{},{},{},{},{}",
            i + 1,
            15_600_000 + i,
            i,
            r.credit_score,
            r.geography,
            r.gender,
            r.age,
            r.tenure,
            r.balance,
            r.num_of_products,
            r.has_cr_card,
            r.is_active_member,
            r.estimated_salary,
            y
        );
    }
    out
}

/// A small random forest fitted on the full 10-column schema.
pub fn fitted_artifact() -> ModelArtifact {
    let ds = synthetic_dataset(200, 7);
    let pre = build_preprocessor(&ds.features.numeric_columns(), &ds.features.categorical_columns())
        .unwrap();
    let overrides = HyperParams::from([
        ("n_estimators".to_string(), json!(10)),
        ("random_state".to_string(), json!(0)),
    ]);
    let fitted = Pipeline::new(pre, get_model("rf", &overrides).unwrap())
        .fit(&ds.features, &ds.target)
        .unwrap();
    ModelArtifact::new(ds.features.schema(), fitted)
}

pub fn sample_metadata() -> ArtifactMetadata {
    ArtifactMetadata {
        model_type:     "rf".to_string(),
        format_version: FORMAT_VERSION,
        trained_at:     Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        dataset:        "bank-churn.csv".to_string(),
        features:       vec!["CreditScore".to_string()],
        params:         BTreeMap::from([("n_estimators".to_string(), "10".to_string())]),
        metrics:        BTreeMap::from([("roc_auc".to_string(), 0.85)]),
    }
}

fn force_both_classes(y: &mut [u8]) {
    if y.len() >= 2 && y.iter().all(|&v| v == y[0]) {
        y[0] = 1 - y[0];
    }
}
