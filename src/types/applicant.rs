//! Applicant data structures for credit risk scoring

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire names of the applicant attributes, in the order they were trained.
pub const APPLICANT_FIELDS: [&str; 15] = [
    "NAME_CONTRACT_TYPE",
    "CODE_GENDER",
    "FLAG_OWN_CAR",
    "AMT_INCOME_TOTAL",
    "AMT_CREDIT",
    "NAME_INCOME_TYPE",
    "NAME_EDUCATION_TYPE",
    "OCCUPATION_TYPE",
    "CNT_CHILDREN",
    "DAYS_BIRTH",
    "DAYS_EMPLOYED",
    "EXT_SOURCE_1",
    "EXT_SOURCE_2",
    "EXT_SOURCE_3",
    "REGION_RATING_CLIENT",
];

/// A single scalar field value as supplied by the caller.
///
/// Integers and floats stay distinct so that categorical coercion renders
/// `2` as `"2"` and `2.0` as `"2.0"`, the way the training data was stringified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Explicit null, equivalent to an absent field
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Integer(value as i64)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

/// Loosely-typed applicant record: feature name to optional scalar.
///
/// Keys are unique; lookup never depends on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: HashMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<RawValue> {
        self.fields.remove(name)
    }

    /// Value for `name`, treating an explicit null as absent.
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Strict request schema crossing the service boundary.
///
/// Every attribute is optional. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ApplicantRequest {
    /// Contract type ("Cash loans", "Revolving loans")
    pub name_contract_type: Option<String>,
    /// Gender code ("F", "M", "XNA")
    pub code_gender: Option<String>,
    /// Owns a car ("Y" / "N")
    pub flag_own_car: Option<String>,
    /// Total annual income
    pub amt_income_total: Option<f64>,
    /// Credit amount of the loan
    pub amt_credit: Option<f64>,
    pub name_income_type: Option<String>,
    pub name_education_type: Option<String>,
    pub occupation_type: Option<String>,
    /// Number of children
    pub cnt_children: Option<i64>,
    /// Age in days relative to application (negative)
    pub days_birth: Option<i64>,
    /// Employment duration in days relative to application (negative)
    pub days_employed: Option<i64>,
    /// Normalized external credit-bureau scores
    pub ext_source_1: Option<f64>,
    pub ext_source_2: Option<f64>,
    pub ext_source_3: Option<f64>,
    /// Region rating (1, 2 or 3)
    pub region_rating_client: Option<i64>,
}

impl ApplicantRequest {
    /// Convert into a raw record, dropping absent fields.
    pub fn into_record(self) -> RawRecord {
        let values: [Option<RawValue>; 15] = [
            self.name_contract_type.map(RawValue::Text),
            self.code_gender.map(RawValue::Text),
            self.flag_own_car.map(RawValue::Text),
            self.amt_income_total.map(RawValue::Float),
            self.amt_credit.map(RawValue::Float),
            self.name_income_type.map(RawValue::Text),
            self.name_education_type.map(RawValue::Text),
            self.occupation_type.map(RawValue::Text),
            self.cnt_children.map(RawValue::Integer),
            self.days_birth.map(RawValue::Integer),
            self.days_employed.map(RawValue::Integer),
            self.ext_source_1.map(RawValue::Float),
            self.ext_source_2.map(RawValue::Float),
            self.ext_source_3.map(RawValue::Float),
            self.region_rating_client.map(RawValue::Integer),
        ];

        APPLICANT_FIELDS
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect()
    }
}

impl From<ApplicantRequest> for RawRecord {
    fn from(request: ApplicantRequest) -> Self {
        request.into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "NAME_CONTRACT_TYPE": "Cash loans",
            "AMT_CREDIT": 406597.5,
            "CNT_CHILDREN": 0,
            "EXT_SOURCE_2": null,
            "UNRELATED": "ignored"
        }"#;

        let request: ApplicantRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name_contract_type.as_deref(), Some("Cash loans"));
        assert_eq!(request.amt_credit, Some(406597.5));
        assert_eq!(request.cnt_children, Some(0));
        assert_eq!(request.ext_source_2, None);
    }

    #[test]
    fn test_into_record_excludes_absent_fields() {
        let request = ApplicantRequest {
            code_gender: Some("M".to_string()),
            days_birth: Some(-12005),
            ext_source_1: Some(0.1),
            ..Default::default()
        };

        let record = request.into_record();
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("CODE_GENDER"), Some(&RawValue::from("M")));
        assert_eq!(record.get("DAYS_BIRTH"), Some(&RawValue::Integer(-12005)));
        assert_eq!(record.get("EXT_SOURCE_1"), Some(&RawValue::Float(0.1)));
        assert!(record.get("AMT_CREDIT").is_none());
    }

    #[test]
    fn test_raw_value_untagged_parsing() {
        let record: RawRecord =
            serde_json::from_str(r#"{"a": 2, "b": 2.5, "c": "x", "d": null}"#).unwrap();

        assert_eq!(record.get("a"), Some(&RawValue::Integer(2)));
        assert_eq!(record.get("b"), Some(&RawValue::Float(2.5)));
        assert_eq!(record.get("c"), Some(&RawValue::from("x")));
        assert_eq!(record.get("d"), None);
        assert_eq!(record.len(), 4);
    }
}
