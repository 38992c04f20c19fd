//! Feature alignment between request payloads and model schemas.
//!
//! This module turns a loosely-typed attribute mapping into the exact numeric
//! row a trained model expects: categorical fields are one-hot expanded into
//! `{field}_{value}` columns, then the result is reindexed against the model's
//! declared column list. Columns the request did not produce are filled with 0
//! and columns the model never saw are dropped.
//!
//! Note that a categorical value never seen during training produces a column
//! the schema does not contain, so it is dropped and the row carries zeros for
//! every category of that field. This loses information silently; callers who
//! care must restrict their inputs to the training vocabulary.

use crate::domain::DomainSpec;
use crate::error::{Result, ScoringError};
use crate::types::RawAttributes;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

/// Ordered column list a model artifact was trained on. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    columns: Arc<[String]>,
    positions: HashMap<String, usize>,
}

impl ModelSchema {
    /// Build a schema, rejecting empty or duplicated column lists
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ScoringError::SchemaMismatch(
                "model schema declares no columns".to_string(),
            ));
        }

        let mut positions = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), i).is_some() {
                return Err(ScoringError::SchemaMismatch(format!(
                    "duplicate column in model schema: {}",
                    column
                )));
            }
        }

        Ok(Self {
            columns: columns.into(),
            positions,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
}

/// A single numeric row with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedVector {
    columns: Arc<[String]>,
    values: Vec<f32>,
    degraded: bool,
}

impl AlignedVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f32> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    /// True when built without a model schema (best-effort pass-through)
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Where a produced column came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ColumnOrigin {
    Declared,
    Extra,
    Indicator,
}

/// Converts raw attributes into model-aligned feature rows
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    numeric_fields: Vec<String>,
    categorical_fields: BTreeSet<String>,
}

impl FeatureEncoder {
    pub fn new(numeric_fields: Vec<String>, categorical_fields: Vec<String>) -> Self {
        Self {
            numeric_fields,
            categorical_fields: categorical_fields.into_iter().collect(),
        }
    }

    pub fn from_spec(spec: &DomainSpec) -> Self {
        Self::new(spec.numeric_fields.clone(), spec.categorical_fields.clone())
    }

    /// Encode `raw` into a row matching `schema`.
    ///
    /// With a schema the output columns are exactly the schema's, in order.
    /// Without one, every produced column is passed through in a fixed order
    /// (declared numeric fields, other numeric attributes, indicator columns);
    /// that mode is best-effort only.
    ///
    /// Fails with a type conversion error when a declared-numeric field holds
    /// a value that is not a number.
    pub fn encode(
        &self,
        raw: &RawAttributes,
        schema: Option<&ModelSchema>,
    ) -> Result<AlignedVector> {
        let produced = self.expand(raw)?;

        match schema {
            Some(schema) => Ok(self.reindex(produced, schema)),
            None => Ok(Self::pass_through(produced)),
        }
    }

    /// Inconsistencies between this encoder's fields and a schema
    pub fn schema_gaps(&self, schema: &ModelSchema) -> Vec<String> {
        let mut gaps = Vec::new();
        for field in &self.numeric_fields {
            if schema.position(field).is_none() {
                gaps.push(format!("numeric field '{}' is not a model column", field));
            }
        }
        for field in &self.categorical_fields {
            let prefix = format!("{}_", field);
            if !schema.columns().iter().any(|c| c.starts_with(&prefix)) {
                gaps.push(format!(
                    "categorical field '{}' has no '{}*' model columns",
                    field, prefix
                ));
            }
        }
        gaps
    }

    /// One-hot expansion plus numeric coercion
    fn expand(&self, raw: &RawAttributes) -> Result<Vec<(String, f32, ColumnOrigin)>> {
        let mut produced = Vec::with_capacity(raw.len());

        for field in &self.numeric_fields {
            let Some(value) = raw.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let number = value
                .as_number()
                .ok_or_else(|| ScoringError::type_conversion(field, value))?;
            produced.push((field.clone(), number as f32, ColumnOrigin::Declared));
        }

        for (key, value) in raw {
            if value.is_null() || self.numeric_fields.contains(key) {
                continue;
            }

            if self.categorical_fields.contains(key) {
                let label = value
                    .category_label()
                    .ok_or_else(|| ScoringError::type_conversion(key, value))?;
                produced.push((format!("{}_{}", key, label), 1.0, ColumnOrigin::Indicator));
            } else if self.is_indicator_name(key) {
                debug!(field = %key, "Dropping attribute named like an indicator column");
            } else if let Some(number) = value.as_number() {
                produced.push((key.clone(), number as f32, ColumnOrigin::Extra));
            } else {
                trace!(field = %key, "Ignoring non-numeric undeclared attribute");
            }
        }

        Ok(produced)
    }

    /// Indicator columns are only ever produced from their categorical field
    fn is_indicator_name(&self, key: &str) -> bool {
        self.categorical_fields.iter().any(|field| {
            key.strip_prefix(field.as_str())
                .is_some_and(|rest| rest.starts_with('_'))
        })
    }

    fn reindex(
        &self,
        produced: Vec<(String, f32, ColumnOrigin)>,
        schema: &ModelSchema,
    ) -> AlignedVector {
        let mut values = vec![0.0_f32; schema.len()];

        for (column, value, origin) in produced {
            match schema.position(&column) {
                Some(i) => values[i] = value,
                None if origin == ColumnOrigin::Indicator => {
                    debug!(column = %column, "Categorical value not in model vocabulary, dropped");
                }
                None => {
                    trace!(column = %column, "Column not in model schema, dropped");
                }
            }
        }

        AlignedVector {
            columns: schema.columns.clone(),
            values,
            degraded: false,
        }
    }

    fn pass_through(mut produced: Vec<(String, f32, ColumnOrigin)>) -> AlignedVector {
        // Declared fields keep their declaration order; the rest are key-ordered.
        produced.sort_by(|a, b| match (a.2, b.2) {
            (ColumnOrigin::Declared, ColumnOrigin::Declared) => std::cmp::Ordering::Equal,
            (x, y) if x == y => a.0.cmp(&b.0),
            (x, y) => x.cmp(&y),
        });

        let (columns, values): (Vec<String>, Vec<f32>) =
            produced.into_iter().map(|(c, v, _)| (c, v)).unzip();

        AlignedVector {
            columns: columns.into(),
            values,
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainSpec, FraudSchemaVariant};
    use crate::error::ValidationError;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> RawAttributes {
        serde_json::from_value(value).unwrap()
    }

    fn fraud_schema() -> ModelSchema {
        ModelSchema::new(
            [
                "transaction_amount",
                "account_age",
                "transaction_type_payment",
                "transaction_type_transfer",
                "transaction_type_withdrawal",
                "location_CA",
                "location_NY",
                "location_TX",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
        .unwrap()
    }

    fn fraud_encoder() -> FeatureEncoder {
        FeatureEncoder::from_spec(&DomainSpec::fraud_detection(FraudSchemaVariant::Transactional))
    }

    #[test]
    fn test_schema_rejects_empty_and_duplicates() {
        assert!(matches!(
            ModelSchema::new(vec![]),
            Err(ScoringError::SchemaMismatch(_))
        ));
        assert!(matches!(
            ModelSchema::new(vec!["a".into(), "b".into(), "a".into()]),
            Err(ScoringError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_one_hot_and_reindex() {
        let schema = fraud_schema();
        let vector = fraud_encoder()
            .encode(
                &attrs(json!({
                    "transaction_amount": 250.0,
                    "account_age": "12",
                    "transaction_type": "transfer",
                    "location": "NY"
                })),
                Some(&schema),
            )
            .unwrap();

        assert_eq!(vector.columns(), schema.columns());
        assert_eq!(
            vector.values(),
            &[250.0, 12.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]
        );
        assert!(!vector.is_degraded());
    }

    #[test]
    fn test_extra_keys_never_leak() {
        let schema = fraud_schema();
        let payloads = [
            json!({
                "transaction_amount": 1,
                "account_age": 2,
                "transaction_type": "payment",
                "location": "TX",
                "ip": "10.0.0.1",
                "score": 99
            }),
            json!({"unrelated": 5}),
            json!({}),
            json!({"transaction_amount": 1, "location_NY": 7}),
        ];

        for payload in payloads {
            let vector = fraud_encoder().encode(&attrs(payload), Some(&schema)).unwrap();
            assert_eq!(vector.columns(), schema.columns());
            assert_eq!(vector.len(), schema.len());
        }
    }

    #[test]
    fn test_indicator_named_keys_cannot_override_categories() {
        let schema = fraud_schema();
        let vector = fraud_encoder()
            .encode(
                &attrs(json!({
                    "transaction_amount": 25,
                    "account_age": 4,
                    "transaction_type": "payment",
                    "location": "NY",
                    "location_NY": 0,
                    "transaction_type_transfer": 1
                })),
                Some(&schema),
            )
            .unwrap();

        assert_eq!(vector.get("location_NY"), Some(1.0));
        assert_eq!(vector.get("transaction_type_payment"), Some(1.0));
        assert_eq!(vector.get("transaction_type_transfer"), Some(0.0));

        let hot = |prefix: &str| {
            vector
                .columns()
                .iter()
                .zip(vector.values())
                .filter(|(c, v)| c.starts_with(prefix) && **v == 1.0)
                .count()
        };
        assert_eq!(hot("transaction_type_"), 1);
        assert_eq!(hot("location_"), 1);
    }

    #[test]
    fn test_indicator_named_keys_dropped_without_schema() {
        let vector = fraud_encoder()
            .encode(
                &attrs(json!({"transaction_amount": 25, "location_NY": 1, "risk": 3})),
                None,
            )
            .unwrap();
        assert_eq!(vector.columns(), &["transaction_amount", "risk"]);
    }

    #[test]
    fn test_missing_columns_filled_with_zero() {
        let schema = fraud_schema();
        let vector = fraud_encoder()
            .encode(&attrs(json!({"transaction_amount": 10})), Some(&schema))
            .unwrap();
        assert_eq!(vector.get("transaction_amount"), Some(10.0));
        assert!(vector.values()[1..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_unseen_category_dropped() {
        let schema = fraud_schema();
        let vector = fraud_encoder()
            .encode(
                &attrs(json!({
                    "transaction_amount": 10,
                    "account_age": 1,
                    "transaction_type": "refund",
                    "location": "FL"
                })),
                Some(&schema),
            )
            .unwrap();
        assert_eq!(vector.values()[2..].iter().sum::<f32>(), 0.0);
    }

    #[test]
    fn test_non_numeric_declared_field_fails() {
        let err = fraud_encoder()
            .encode(
                &attrs(json!({"transaction_amount": "ten", "account_age": 1})),
                Some(&fraud_schema()),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ScoringError::Validation(ValidationError::TypeConversion {
                field: "transaction_amount".into(),
                value: "\"ten\"".into()
            })
        );
    }

    #[test]
    fn test_pass_through_without_schema() {
        let vector = fraud_encoder()
            .encode(
                &attrs(json!({
                    "account_age": 3,
                    "transaction_amount": 9,
                    "location": "CA",
                    "extra": "4",
                    "comment": "hello"
                })),
                None,
            )
            .unwrap();

        assert!(vector.is_degraded());
        assert_eq!(
            vector.columns(),
            &["transaction_amount", "account_age", "extra", "location_CA"]
        );
        assert_eq!(vector.values(), &[9.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_numeric_category_labels() {
        let encoder = FeatureEncoder::new(vec![], vec!["SeniorCitizen".into()]);
        let schema =
            ModelSchema::new(vec!["SeniorCitizen_0".into(), "SeniorCitizen_1".into()]).unwrap();
        let vector = encoder
            .encode(&attrs(json!({"SeniorCitizen": 1})), Some(&schema))
            .unwrap();
        assert_eq!(vector.values(), &[0.0, 1.0]);
    }

    #[test]
    fn test_schema_gaps() {
        let schema =
            ModelSchema::new(vec!["transaction_amount".into(), "location_NY".into()]).unwrap();
        let gaps = fraud_encoder().schema_gaps(&schema);
        assert_eq!(gaps.len(), 2);
        assert!(gaps.iter().any(|g| g.contains("account_age")));
        assert!(gaps.iter().any(|g| g.contains("transaction_type")));
        assert!(fraud_encoder().schema_gaps(&fraud_schema()).is_empty());
    }
}
