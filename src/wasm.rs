use wasm_bindgen::prelude::*;

use crate::{
  FieldRequest, compute_field as compute, fixed_variable_descriptors,
  free_variables as variables,
};

fn optional(name: &str) -> Option<&str> {
  Some(name).filter(|n| !n.is_empty())
}

/// Sorted free variables of `expression` as a JSON array.
#[wasm_bindgen]
pub fn free_variables(expression: &str) -> String {
  serde_json::Value::from(variables(expression)).to_string()
}

/// Slot descriptors as a JSON array. Pass an empty string for an
/// unselected axis.
#[wasm_bindgen]
pub fn fixed_slots(expression: &str, x_axis: &str, y_axis: &str) -> String {
  let slots: Vec<serde_json::Value> =
    fixed_variable_descriptors(expression, optional(x_axis), optional(y_axis))
      .iter()
      .map(|slot| slot.to_json())
      .collect();
  serde_json::Value::from(slots).to_string()
}

/// The field as JSON, or `{}` when there is nothing to render.
///
/// `slot_labels` should hold the names shown next to the slots (from
/// `fixed_slots`) when `fixed_values` were read. Values left over from an
/// older expression are then refused instead of being applied to whichever
/// variables now occupy their slots. An empty list skips the check.
#[wasm_bindgen]
pub fn compute_field(
  expression: &str,
  x_axis: &str,
  y_axis: &str,
  range_min: f64,
  range_max: f64,
  fixed_values: Vec<f64>,
  slot_labels: Vec<String>,
) -> String {
  let request = FieldRequest {
    expression: expression.to_string(),
    x_axis: optional(x_axis).map(str::to_string),
    y_axis: optional(y_axis).map(str::to_string),
    range_min,
    range_max,
    fixed_values,
    slot_labels: if slot_labels.is_empty() {
      None
    } else {
      Some(slot_labels)
    },
  };
  match compute(&request) {
    Some(field) => field.to_json().to_string(),
    None => "{}".to_string(),
  }
}
