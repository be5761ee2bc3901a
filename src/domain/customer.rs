// ============================================================
// Layer 3 — Customer Record
// ============================================================
// One bank customer as submitted for scoring. Field names on the
// wire are the PascalCase column names of the training CSV, so a
// record maps onto the training schema by name.
//
// Field constraints:
//   CreditScore      300..=900
//   Age              18..=120
//   Tenure           >= 0
//   NumOfProducts    1..=4
//   HasCrCard        0..=1
//   IsActiveMember   0..=1
//   Balance, EstimatedSalary   finite
//
// Gender is normalised to "Capitalised" form because the encoder
// was fit on labels like "Male" / "Female".

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index}: field '{field}' {message}")]
pub struct ValidationError {
    pub index:   usize,
    pub field:   &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerRecord {
    pub credit_score:     i64,
    pub geography:        String,
    pub gender:           String,
    pub age:              i64,
    pub tenure:           i64,
    pub balance:          f64,
    pub num_of_products:  i64,
    pub has_cr_card:      i64,
    pub is_active_member: i64,
    pub estimated_salary: f64,
}

/// Request body of `POST /predict` and of `churn predict --input`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBatch {
    pub data: Vec<CustomerRecord>,
}

impl CustomerRecord {
    /// Check every declared constraint and return the record with
    /// its gender label normalised. `index` is the record's position
    /// in the batch and only used for error reporting.
    pub fn into_validated(mut self, index: usize) -> Result<Self, ValidationError> {
        let fail = |field: &'static str, message: String| ValidationError { index, field, message };

        check_range(self.credit_score, 300, 900).map_err(|m| fail("CreditScore", m))?;
        check_range(self.age, 18, 120).map_err(|m| fail("Age", m))?;
        if self.tenure < 0 {
            return Err(fail("Tenure", format!("must be >= 0, got {}", self.tenure)));
        }
        check_range(self.num_of_products, 1, 4).map_err(|m| fail("NumOfProducts", m))?;
        check_range(self.has_cr_card, 0, 1).map_err(|m| fail("HasCrCard", m))?;
        check_range(self.is_active_member, 0, 1).map_err(|m| fail("IsActiveMember", m))?;
        if !self.balance.is_finite() {
            return Err(fail("Balance", "must be a finite number".to_string()));
        }
        if !self.estimated_salary.is_finite() {
            return Err(fail("EstimatedSalary", "must be a finite number".to_string()));
        }

        self.gender = capitalize(&self.gender);
        Ok(self)
    }
}

/// Validate a whole batch; the first failing record aborts the batch.
pub fn validate_batch(records: Vec<CustomerRecord>) -> Result<Vec<CustomerRecord>, ValidationError> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.into_validated(i))
        .collect()
}

fn check_range(value: i64, lo: i64, hi: i64) -> Result<(), String> {
    if (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(format!("must be between {lo} and {hi}, got {value}"))
    }
}

/// First character upper-cased, the rest lower-cased ("fEMALE" → "Female").
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_customer;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("female"), "Female");
        assert_eq!(capitalize("FEMALE"), "Female");
        assert_eq!(capitalize("mALE"), "Male");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_gender_normalised_on_validation() {
        let mut record = sample_customer();
        record.gender = "fEmAlE".to_string();
        let valid = record.into_validated(0).unwrap();
        assert_eq!(valid.gender, "Female");
    }

    #[test]
    fn test_credit_score_out_of_range() {
        let mut record = sample_customer();
        record.credit_score = 250;
        let err = record.into_validated(3).unwrap_err();
        assert_eq!(err.field, "CreditScore");
        assert_eq!(err.index, 3);
    }

    #[test]
    fn test_flags_must_be_binary() {
        let mut record = sample_customer();
        record.has_cr_card = 2;
        assert_eq!(record.into_validated(0).unwrap_err().field, "HasCrCard");
    }

    #[test]
    fn test_negative_tenure_rejected() {
        let mut record = sample_customer();
        record.tenure = -1;
        assert_eq!(record.into_validated(0).unwrap_err().field, "Tenure");
    }

    #[test]
    fn test_batch_reports_failing_index() {
        let mut bad = sample_customer();
        bad.age = 12;
        let err = validate_batch(vec![sample_customer(), bad]).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.field, "Age");
    }

    #[test]
    fn test_pascal_case_wire_names() {
        let json = serde_json::to_value(sample_customer()).unwrap();
        assert_eq!(json["CreditScore"], 600);
        assert_eq!(json["NumOfProducts"], 2);
        assert_eq!(json["HasCrCard"], 1);
        assert_eq!(json["IsActiveMember"], 0);
    }

    #[test]
    fn test_missing_field_fails_to_deserialize() {
        let mut json = serde_json::to_value(sample_customer()).unwrap();
        json.as_object_mut().unwrap().remove("CreditScore");
        assert!(serde_json::from_value::<CustomerRecord>(json).is_err());
    }
}
