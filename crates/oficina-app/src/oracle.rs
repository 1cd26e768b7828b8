// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{CostItem, MaterialPrice, RepairEstimate};

/// Produces a structured estimate from a photo of the damage.
pub trait DamageOracle {
    fn estimate_damage(
        &self,
        image_base64: &str,
        materials: &[MaterialPrice],
        labor_rate: f64,
    ) -> Result<RepairEstimate>;
}

/// Produces an image of the vehicle as it would look after the repair.
pub trait VisualizationOracle {
    fn visualize_repair(&self, image_base64: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("estimate response is not a JSON object")]
    NotAnObject,
    #[error("estimate response is missing `{0}`")]
    Missing(String),
    #[error("estimate field `{field}` must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("estimate field `{0}` cannot be negative")]
    Negative(String),
    #[error("estimate item `{0}` has a blank name")]
    BlankName(String),
}

/// Checks an oracle response against the estimate schema and builds a
/// `RepairEstimate` from it.
///
/// `totalEstimate` is optional. The returned estimate always carries the
/// recomputed total; a disagreeing oracle total is logged and dropped.
pub fn validate_oracle_estimate(value: &Value) -> Result<RepairEstimate, SchemaError> {
    let object = value.as_object().ok_or(SchemaError::NotAnObject)?;

    let summary = match object.get("summary") {
        Some(Value::String(summary)) => summary.clone(),
        Some(_) => {
            return Err(SchemaError::WrongType {
                field: "summary".to_owned(),
                expected: "a string",
            });
        }
        None => return Err(SchemaError::Missing("summary".to_owned())),
    };
    let parts = cost_items(object, "parts")?;
    let materials = cost_items(object, "materials")?;
    let labor_hours = amount(object, "laborHours", "laborHours")?;
    let labor_cost = amount(object, "laborCost", "laborCost")?;

    let estimate = RepairEstimate::new(summary, parts, materials, labor_hours, labor_cost);

    if let Some(reported) = object.get("totalEstimate").and_then(Value::as_f64)
        && (reported - estimate.total_estimate()).abs() >= 0.005
    {
        tracing::warn!(
            reported,
            computed = estimate.total_estimate(),
            "oracle total disagrees with line items; using computed total"
        );
    }
    Ok(estimate)
}

fn cost_items(object: &Map<String, Value>, field: &str) -> Result<Vec<CostItem>, SchemaError> {
    let items = object
        .get(field)
        .ok_or_else(|| SchemaError::Missing(field.to_owned()))?
        .as_array()
        .ok_or_else(|| SchemaError::WrongType {
            field: field.to_owned(),
            expected: "an array",
        })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let path = format!("{field}[{index}]");
            let entry = item.as_object().ok_or_else(|| SchemaError::WrongType {
                field: path.clone(),
                expected: "an object",
            })?;
            let name = match entry.get("name") {
                Some(Value::String(name)) => name,
                Some(_) => {
                    return Err(SchemaError::WrongType {
                        field: format!("{path}.name"),
                        expected: "a string",
                    });
                }
                None => return Err(SchemaError::Missing(format!("{path}.name"))),
            };
            if name.trim().is_empty() {
                return Err(SchemaError::BlankName(path));
            }
            let price = amount(entry, "estimatedPrice", &format!("{path}.estimatedPrice"))?;
            Ok(CostItem::new(name.trim(), price))
        })
        .collect()
}

fn amount(object: &Map<String, Value>, key: &str, path: &str) -> Result<f64, SchemaError> {
    let value = object
        .get(key)
        .ok_or_else(|| SchemaError::Missing(path.to_owned()))?
        .as_f64()
        .ok_or_else(|| SchemaError::WrongType {
            field: path.to_owned(),
            expected: "a number",
        })?;
    if value < 0.0 {
        return Err(SchemaError::Negative(path.to_owned()));
    }
    Ok(value)
}
