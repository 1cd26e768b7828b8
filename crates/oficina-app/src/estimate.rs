// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Repair estimates and the line-item editor.
//!
//! Every mutation goes through `RepairEstimate` so the grand total stays equal
//! to `sum(parts) + sum(materials) + labor_cost` after each call. A call that
//! fails leaves the estimate exactly as it was.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NEW_ITEM_NAME: &str = "Novo Item";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostItem {
    pub name: String,
    pub estimated_price: f64,
}

impl CostItem {
    pub fn new(name: impl Into<String>, estimated_price: f64) -> Self {
        Self {
            name: name.into(),
            estimated_price: sanitize_amount(estimated_price),
        }
    }

    pub fn placeholder() -> Self {
        Self::new(NEW_ITEM_NAME, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineSection {
    Parts,
    Materials,
}

impl LineSection {
    pub const ALL: [Self; 2] = [Self::Parts, Self::Materials];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parts => "parts",
            Self::Materials => "materials",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "parts" | "part" | "pecas" | "peças" => Some(Self::Parts),
            "materials" | "material" | "materiais" => Some(Self::Materials),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Parts => "Peça",
            Self::Materials => "Material",
        }
    }
}

impl fmt::Display for LineSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineField {
    Name,
    EstimatedPrice,
}

impl LineField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "name" => Some(Self::Name),
            "price" | "estimated_price" | "estimatedPrice" => Some(Self::EstimatedPrice),
            _ => None,
        }
    }
}

/// One admin edit, as entered in a form or on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimateEdit {
    Add(LineSection),
    Remove(LineSection, usize),
    Update {
        section: LineSection,
        index: usize,
        field: LineField,
        value: String,
    },
    LaborHours(String),
    LaborCost(String),
    Summary(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error(
        "no {section} item at index {index} ({len} items) -- choose an index below {len} and retry"
    )]
    OutOfRange {
        section: LineSection,
        index: usize,
        len: usize,
    },
    #[error("item name cannot be blank -- type a name and retry")]
    EmptyName,
}

/// Turns free-form price input into a stored amount.
///
/// Input the shop can't read as a number becomes `0`, as do negative and
/// non-finite values. A comma marks the decimal separator, in which case dots
/// are treated as thousands separators (`"1.234,50"` is `1234.5`). A dot
/// after the comma (`"1,234.56"`) mixes the two conventions and reads as `0`.
/// A leading `R$` is ignored.
pub fn coerce_price(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let normalized = match (trimmed.find(','), trimmed.rfind('.')) {
        (Some(comma), Some(dot)) if dot > comma => return 0.0,
        (Some(_), _) => trimmed.replace('.', "").replace(',', "."),
        (None, _) => trimmed.to_owned(),
    };
    normalized.parse::<f64>().map_or(0.0, sanitize_amount)
}

pub fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "EstimateFields")]
pub struct RepairEstimate {
    summary: String,
    parts: Vec<CostItem>,
    materials: Vec<CostItem>,
    labor_hours: f64,
    labor_cost: f64,
    total_estimate: f64,
}

// Stored and incoming totals are never trusted; deserializing recomputes.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    parts: Vec<CostItem>,
    #[serde(default)]
    materials: Vec<CostItem>,
    #[serde(default)]
    labor_hours: f64,
    #[serde(default)]
    labor_cost: f64,
}

impl From<EstimateFields> for RepairEstimate {
    fn from(fields: EstimateFields) -> Self {
        Self::new(
            fields.summary,
            fields.parts,
            fields.materials,
            fields.labor_hours,
            fields.labor_cost,
        )
    }
}

impl Default for RepairEstimate {
    fn default() -> Self {
        Self::new(String::new(), Vec::new(), Vec::new(), 0.0, 0.0)
    }
}

impl RepairEstimate {
    pub fn new(
        summary: impl Into<String>,
        parts: Vec<CostItem>,
        materials: Vec<CostItem>,
        labor_hours: f64,
        labor_cost: f64,
    ) -> Self {
        let clean = |items: Vec<CostItem>| {
            items
                .into_iter()
                .map(|item| CostItem::new(item.name, item.estimated_price))
                .collect()
        };
        let mut estimate = Self {
            summary: summary.into(),
            parts: clean(parts),
            materials: clean(materials),
            labor_hours: sanitize_amount(labor_hours),
            labor_cost: sanitize_amount(labor_cost),
            total_estimate: 0.0,
        };
        estimate.recompute_total();
        estimate
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn parts(&self) -> &[CostItem] {
        &self.parts
    }

    pub fn materials(&self) -> &[CostItem] {
        &self.materials
    }

    pub fn items(&self, section: LineSection) -> &[CostItem] {
        match section {
            LineSection::Parts => &self.parts,
            LineSection::Materials => &self.materials,
        }
    }

    pub fn labor_hours(&self) -> f64 {
        self.labor_hours
    }

    pub fn labor_cost(&self) -> f64 {
        self.labor_cost
    }

    pub fn total_estimate(&self) -> f64 {
        self.total_estimate
    }

    pub fn parts_total(&self) -> f64 {
        section_sum(&self.parts)
    }

    pub fn materials_total(&self) -> f64 {
        section_sum(&self.materials)
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
    }

    /// Recomputes the grand total and returns it. Idempotent.
    pub fn recompute_total(&mut self) -> f64 {
        self.total_estimate = self.parts_total() + self.materials_total() + self.labor_cost;
        self.total_estimate
    }

    pub fn update_line_item(
        &mut self,
        section: LineSection,
        index: usize,
        field: LineField,
        value: &str,
    ) -> Result<(), EditError> {
        let items = self.items_mut(section);
        let len = items.len();
        let item = items.get_mut(index).ok_or(EditError::OutOfRange {
            section,
            index,
            len,
        })?;
        match field {
            LineField::Name => {
                if value.trim().is_empty() {
                    return Err(EditError::EmptyName);
                }
                item.name = value.to_owned();
            }
            LineField::EstimatedPrice => item.estimated_price = coerce_price(value),
        }
        self.recompute_total();
        Ok(())
    }

    /// Appends a `Novo Item` priced at zero and returns its index.
    pub fn add_line_item(&mut self, section: LineSection) -> usize {
        let items = self.items_mut(section);
        items.push(CostItem::placeholder());
        let index = items.len() - 1;
        self.recompute_total();
        index
    }

    pub fn remove_line_item(
        &mut self,
        section: LineSection,
        index: usize,
    ) -> Result<CostItem, EditError> {
        let items = self.items_mut(section);
        let len = items.len();
        if index >= len {
            return Err(EditError::OutOfRange {
                section,
                index,
                len,
            });
        }
        let removed = items.remove(index);
        self.recompute_total();
        Ok(removed)
    }

    /// Stores labor hours. The labor cost is left alone.
    pub fn set_labor_hours(&mut self, raw: &str) {
        self.set_labor_hours_value(coerce_price(raw));
    }

    pub fn set_labor_hours_value(&mut self, hours: f64) {
        self.labor_hours = sanitize_amount(hours);
        self.recompute_total();
    }

    pub fn set_labor_cost(&mut self, raw: &str) {
        self.set_labor_cost_value(coerce_price(raw));
    }

    pub fn set_labor_cost_value(&mut self, cost: f64) {
        self.labor_cost = sanitize_amount(cost);
        self.recompute_total();
    }

    pub fn apply(&mut self, edit: &EstimateEdit) -> Result<(), EditError> {
        match edit {
            EstimateEdit::Add(section) => {
                self.add_line_item(*section);
            }
            EstimateEdit::Remove(section, index) => {
                self.remove_line_item(*section, *index)?;
            }
            EstimateEdit::Update {
                section,
                index,
                field,
                value,
            } => self.update_line_item(*section, *index, *field, value)?,
            EstimateEdit::LaborHours(raw) => self.set_labor_hours(raw),
            EstimateEdit::LaborCost(raw) => self.set_labor_cost(raw),
            EstimateEdit::Summary(summary) => self.set_summary(summary.clone()),
        }
        Ok(())
    }

    fn items_mut(&mut self, section: LineSection) -> &mut Vec<CostItem> {
        match section {
            LineSection::Parts => &mut self.parts,
            LineSection::Materials => &mut self.materials,
        }
    }
}

fn section_sum(items: &[CostItem]) -> f64 {
    items.iter().map(|item| item.estimated_price).sum()
}

#[cfg(test)]
mod tests {
    use super::{
        CostItem, EditError, EstimateEdit, LineField, LineSection, NEW_ITEM_NAME, RepairEstimate,
        coerce_price,
    };

    fn bumper_job() -> RepairEstimate {
        RepairEstimate::new(
            "Parachoque dianteiro amassado",
            vec![CostItem::new("Parachoque", 450.0)],
            vec![CostItem::new("Tinta", 120.0), CostItem::new("Verniz", 85.0)],
            4.0,
            400.0,
        )
    }

    fn assert_total_invariant(estimate: &RepairEstimate) {
        let expected = estimate.parts_total() + estimate.materials_total() + estimate.labor_cost();
        assert!(
            (estimate.total_estimate() - expected).abs() < 1e-9,
            "total {} != {}",
            estimate.total_estimate(),
            expected
        );
    }

    #[test]
    fn new_estimate_computes_total() {
        let estimate = bumper_job();
        assert_eq!(estimate.total_estimate(), 1055.0);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut estimate = bumper_job();
        let first = estimate.recompute_total();
        let second = estimate.recompute_total();
        assert_eq!(first, second);
        assert_eq!(estimate.total_estimate(), 1055.0);
    }

    #[test]
    fn every_mutation_keeps_total_in_sync() {
        let mut estimate = bumper_job();

        estimate
            .update_line_item(LineSection::Parts, 0, LineField::EstimatedPrice, "500")
            .expect("update price");
        assert_total_invariant(&estimate);
        assert_eq!(estimate.total_estimate(), 1105.0);

        let index = estimate.add_line_item(LineSection::Materials);
        assert_eq!(index, 2);
        assert_eq!(estimate.materials()[2].name, NEW_ITEM_NAME);
        assert_total_invariant(&estimate);

        estimate
            .update_line_item(LineSection::Materials, 2, LineField::EstimatedPrice, "30,50")
            .expect("update new item");
        assert_total_invariant(&estimate);
        assert_eq!(estimate.total_estimate(), 1135.5);

        estimate
            .remove_line_item(LineSection::Materials, 0)
            .expect("remove tinta");
        assert_total_invariant(&estimate);

        estimate.set_labor_cost("350");
        assert_total_invariant(&estimate);
        assert_eq!(estimate.total_estimate(), 500.0 + 85.0 + 30.5 + 350.0);
    }

    /// Small xorshift generator so the edit sequences below are reproducible.
    struct EditRng(u64);

    impl EditRng {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: usize) -> usize {
            (self.next() % n as u64) as usize
        }

        fn section(&mut self) -> LineSection {
            LineSection::ALL[self.below(LineSection::ALL.len())]
        }

        fn price(&mut self) -> String {
            const RAW: [&str; 8] = ["0", "12.5", "99,90", "1.234,56", "abc", "-3", "", "R$ 40"];
            RAW[self.below(RAW.len())].to_owned()
        }

        // Indices reach a couple of slots past the end so some edits miss.
        fn edit(&mut self, estimate: &RepairEstimate) -> EstimateEdit {
            let section = self.section();
            let index = self.below(estimate.items(section).len() + 3);
            match self.below(6) {
                0 => EstimateEdit::Add(section),
                1 => EstimateEdit::Remove(section, index),
                2 => EstimateEdit::Update {
                    section,
                    index,
                    field: LineField::EstimatedPrice,
                    value: self.price(),
                },
                3 => EstimateEdit::Update {
                    section,
                    index,
                    field: LineField::Name,
                    value: if self.below(4) == 0 {
                        " ".to_owned()
                    } else {
                        format!("Item {index}")
                    },
                },
                4 => EstimateEdit::LaborHours(self.price()),
                _ => EstimateEdit::LaborCost(self.price()),
            }
        }
    }

    #[test]
    fn random_edit_sequences_keep_total_in_sync() {
        for seed in [1_u64, 7, 42, 2026] {
            let mut rng = EditRng(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1);
            let mut estimate = bumper_job();
            let mut rejected = 0;
            for step in 0..300 {
                let edit = rng.edit(&estimate);
                let before = estimate.clone();
                match estimate.apply(&edit) {
                    Ok(()) => {}
                    Err(error) => {
                        rejected += 1;
                        assert_eq!(
                            estimate, before,
                            "seed {seed} step {step}: {edit:?} failed with {error} but changed the estimate"
                        );
                    }
                }
                assert_total_invariant(&estimate);
                assert!(estimate.total_estimate().is_finite());
            }
            assert!(rejected > 0, "seed {seed} never exercised a rejected edit");
        }
    }

    #[test]
    fn removal_preserves_order_of_remaining_items() {
        let mut estimate = RepairEstimate::new(
            "",
            Vec::new(),
            vec![
                CostItem::new("A", 1.0),
                CostItem::new("B", 2.0),
                CostItem::new("C", 3.0),
            ],
            0.0,
            0.0,
        );

        let removed = estimate
            .remove_line_item(LineSection::Materials, 1)
            .expect("remove middle");
        assert_eq!(removed.name, "B");
        let names: Vec<_> = estimate
            .materials()
            .iter()
            .map(|item| item.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(estimate.total_estimate(), 4.0);
    }

    #[test]
    fn non_numeric_price_becomes_zero() {
        let mut estimate = bumper_job();
        estimate
            .update_line_item(LineSection::Parts, 0, LineField::EstimatedPrice, "abc")
            .expect("garbage input is coerced, not rejected");
        assert_eq!(estimate.parts()[0].estimated_price, 0.0);
        assert!(!estimate.total_estimate().is_nan());
        assert_eq!(estimate.total_estimate(), 605.0);
    }

    #[test]
    fn out_of_range_leaves_estimate_unchanged() {
        let mut estimate = bumper_job();
        let before = estimate.clone();

        let update = estimate.update_line_item(LineSection::Parts, 5, LineField::Name, "X");
        assert_eq!(
            update,
            Err(EditError::OutOfRange {
                section: LineSection::Parts,
                index: 5,
                len: 1,
            })
        );
        let remove = estimate.remove_line_item(LineSection::Materials, 2);
        assert!(matches!(remove, Err(EditError::OutOfRange { len: 2, .. })));
        assert_eq!(estimate, before);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut estimate = bumper_job();
        let before = estimate.clone();
        let result = estimate.update_line_item(LineSection::Parts, 0, LineField::Name, "   ");
        assert_eq!(result, Err(EditError::EmptyName));
        assert_eq!(estimate, before);
    }

    #[test]
    fn labor_hours_do_not_change_labor_cost() {
        let mut estimate = bumper_job();
        estimate.set_labor_hours("10");
        assert_eq!(estimate.labor_hours(), 10.0);
        assert_eq!(estimate.labor_cost(), 400.0);
        assert_eq!(estimate.total_estimate(), 1055.0);
    }

    #[test]
    fn coerce_price_handles_brazilian_input() {
        assert_eq!(coerce_price("1.234,56"), 1234.56);
        assert_eq!(coerce_price("R$ 99,90"), 99.9);
        assert_eq!(coerce_price("12.5"), 12.5);
        assert_eq!(coerce_price("1,234.56"), 0.0);
        assert_eq!(coerce_price("1.234.567,89"), 1_234_567.89);
        assert_eq!(coerce_price(""), 0.0);
        assert_eq!(coerce_price("-40"), 0.0);
        assert_eq!(coerce_price("NaN"), 0.0);
        assert_eq!(coerce_price("inf"), 0.0);
    }

    #[test]
    fn deserializing_ignores_stored_total() {
        let json = r#"{
            "summary": "Risco na porta",
            "parts": [],
            "materials": [{"name": "Massa de Polir", "estimatedPrice": 55}],
            "laborHours": 2,
            "laborCost": 200,
            "totalEstimate": 9999
        }"#;
        let estimate: RepairEstimate = serde_json::from_str(json).expect("valid estimate json");
        assert_eq!(estimate.total_estimate(), 255.0);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let value = serde_json::to_value(bumper_job()).expect("serialize");
        assert_eq!(value["totalEstimate"], 1055.0);
        assert_eq!(value["parts"][0]["estimatedPrice"], 450.0);
        assert_eq!(value["laborHours"], 4.0);
    }
}
