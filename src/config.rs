/// Samples per axis of the evaluation grid.
pub const DENSITY: usize = 100;

/// Number of positional fixed-value slots offered to the caller.
pub const MAX_VARIABLES: usize = 10;

/// Expression shown before the user types anything.
pub const DEFAULT_EXPRESSION: &str = "x0-x1*x2+sin(2*pi*x3)";

pub const DEFAULT_RANGE_MIN: f64 = -2.0;
pub const DEFAULT_RANGE_MAX: f64 = 2.0;

/// Starting value of every fixed-value slot.
pub const DEFAULT_FIXED_VALUE: f64 = 0.5;

/// Deepest expression tree accepted. Building, printing, compiling and
/// dropping a tree each recurse once per level.
pub const MAX_DEPTH: usize = 512;

/// Deepest parenthesis nesting accepted, checked before the grammar runs.
pub const MAX_PARENS: usize = 64;

/// Engine parameters shared by the binder and the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
  pub density: usize,
  pub max_slots: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      density: DENSITY,
      max_slots: MAX_VARIABLES,
    }
  }
}

impl EngineConfig {
  /// Slider a hosting UI should offer for each fixed-value slot.
  pub fn slider(&self) -> SliderSpec {
    SliderSpec {
      min: 0.0,
      max: 1.0,
      step: 1.0 / self.density.max(1) as f64,
      value: DEFAULT_FIXED_VALUE,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderSpec {
  pub min: f64,
  pub max: f64,
  pub step: f64,
  pub value: f64,
}

impl SliderSpec {
  /// Labelled tick positions, one every tenth of the slider span.
  pub fn marks(&self) -> Vec<f64> {
    (0..=10)
      .map(|i| self.min + (self.max - self.min) * i as f64 / 10.0)
      .collect()
  }

  pub fn to_json(&self) -> serde_json::Value {
    serde_json::json!({
      "min": self.min,
      "max": self.max,
      "step": self.step,
      "value": self.value,
      "marks": self
        .marks()
        .iter()
        .map(|m| serde_json::json!({ "value": m, "label": format!("{m:.1}") }))
        .collect::<Vec<_>>(),
    })
  }
}
