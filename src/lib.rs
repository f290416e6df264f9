use pest::Parser;
use pest_derive::Parser;
use std::sync::Once;
use thiserror::Error;

pub mod binder;
pub mod config;
pub mod evaluator;
pub mod syntax;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use binder::{
  Axis, Binding, FixedValues, SamplingGrid, SlotDescriptor, bind, linspace,
};
pub use config::{DENSITY, EngineConfig, MAX_VARIABLES};
pub use evaluator::{CompiledExpr, DisplayRange, NumericField, evaluate};
pub use syntax::{Expr, Expression};

#[derive(Parser)]
#[grammar = "expression.pest"]
pub struct ExpressionParser;

#[derive(Error, Debug)]
pub enum FieldError {
  #[error("Parse error: {0}")]
  Parse(#[from] Box<pest::error::Error<Rule>>),
  #[error("Unknown function: {0}")]
  UnknownFunction(String),
  #[error("{function} takes {expected}, got {got}")]
  Arity {
    function: &'static str,
    expected: &'static str,
    got: usize,
  },
  #[error("Invalid expression: {0}")]
  InvalidExpression(String),
  #[error("Binding mismatch: {0}")]
  BindingMismatch(String),
}

impl FieldError {
  /// Whether the expression text itself is at fault, as opposed to the
  /// variable binding supplied with it.
  pub fn is_parse_error(&self) -> bool {
    !matches!(self, FieldError::BindingMismatch(_))
  }
}

impl ExpressionParser {
  pub fn parse_program(
    input: &str,
  ) -> Result<pest::iterators::Pairs<'_, Rule>, Box<pest::error::Error<Rule>>>
  {
    Self::parse(Rule::Program, input).map_err(Box::new)
  }
}

/// Parse expression text into a tree and its sorted free variables.
pub fn parse(text: &str) -> Result<Expression, FieldError> {
  Expression::parse(text)
}

static TRACING_INIT: Once = Once::new();

/// Install a `RUST_LOG` filtered subscriber. Does nothing unless `RUST_LOG`
/// is set; safe to call more than once.
pub fn init_tracing() {
  TRACING_INIT.call_once(|| {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
      tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(EnvFilter::from_default_env())
        .init();
    }
  });
}

/// Everything a caller supplies to compute one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRequest {
  pub expression: String,
  pub x_axis: Option<String>,
  pub y_axis: Option<String>,
  pub range_min: f64,
  pub range_max: f64,
  /// Positional: slot `k` holds the `k`-th non-axis variable.
  pub fixed_values: Vec<f64>,
  /// Labels shown next to the slots when `fixed_values` were captured.
  pub slot_labels: Option<Vec<String>>,
}

impl Default for FieldRequest {
  fn default() -> Self {
    FieldRequest {
      expression: config::DEFAULT_EXPRESSION.to_string(),
      x_axis: None,
      y_axis: None,
      range_min: config::DEFAULT_RANGE_MIN,
      range_max: config::DEFAULT_RANGE_MAX,
      fixed_values: vec![config::DEFAULT_FIXED_VALUE; MAX_VARIABLES],
      slot_labels: None,
    }
  }
}

impl FieldRequest {
  pub fn new(expression: &str, x_axis: &str, y_axis: &str) -> Self {
    FieldRequest {
      expression: expression.to_string(),
      x_axis: Some(x_axis.to_string()),
      y_axis: Some(y_axis.to_string()),
      ..FieldRequest::default()
    }
  }

  pub fn with_fixed_values(mut self, values: &[f64]) -> Self {
    self.fixed_values = values.to_vec();
    self
  }

  pub fn with_range(mut self, min: f64, max: f64) -> Self {
    self.range_min = min;
    self.range_max = max;
    self
  }

  pub fn display_range(&self) -> DisplayRange {
    DisplayRange {
      min: self.range_min,
      max: self.range_max,
    }
  }
}

/// An unselected axis may arrive as `None` or as an empty string.
fn axis_choice(axis: Option<&str>) -> Option<&str> {
  axis.filter(|name| !name.trim().is_empty())
}

/// Sorted free variables of `text`, or nothing when it does not parse.
pub fn free_variables(text: &str) -> Vec<String> {
  match Expression::parse(text) {
    Ok(expression) => expression.variables().to_vec(),
    Err(err) => {
      tracing::debug!(error = %err, "no variables for unparsable expression");
      Vec::new()
    }
  }
}

pub fn fixed_variable_descriptors(
  text: &str,
  x_axis: Option<&str>,
  y_axis: Option<&str>,
) -> Vec<SlotDescriptor> {
  let config = EngineConfig::default();
  fixed_variable_descriptors_with(text, x_axis, y_axis, &config)
}

/// One descriptor per slot; slot `k` names the `k`-th free variable that is
/// not an axis.
pub fn fixed_variable_descriptors_with(
  text: &str,
  x_axis: Option<&str>,
  y_axis: Option<&str>,
  config: &EngineConfig,
) -> Vec<SlotDescriptor> {
  binder::slot_descriptors(
    &free_variables(text),
    axis_choice(x_axis),
    axis_choice(y_axis),
    config.max_slots,
  )
}

/// Compute the field for `request`, keeping the failure cause.
///
/// `Ok(None)` means an axis is unset and there is nothing to render.
pub fn try_compute_field(
  request: &FieldRequest,
  config: &EngineConfig,
) -> Result<Option<NumericField>, FieldError> {
  let (x_axis, y_axis) = match (
    axis_choice(request.x_axis.as_deref()),
    axis_choice(request.y_axis.as_deref()),
  ) {
    (Some(x), Some(y)) => (x, y),
    _ => return Ok(None),
  };

  let expression = Expression::parse(&request.expression)?;
  let variables = expression.variables();
  binder::validate_axes(variables, x_axis, y_axis)?;

  let fixed = binder::fixed_values_from_slots(
    variables,
    x_axis,
    y_axis,
    &request.fixed_values,
    request.slot_labels.as_deref(),
    config.max_slots,
  )?;

  match bind(variables, Some(x_axis), Some(y_axis), &fixed, config.density)? {
    Some(grid) => {
      evaluate(&expression, &grid, request.display_range()).map(Some)
    }
    None => Ok(None),
  }
}

/// Compute the field for `request`, failing closed: any error is logged and
/// reported as "nothing to render".
pub fn compute_field(request: &FieldRequest) -> Option<NumericField> {
  match try_compute_field(request, &EngineConfig::default()) {
    Ok(field) => field,
    Err(err) => {
      tracing::warn!(
        error = %err,
        parse_error = err.is_parse_error(),
        "no field computed"
      );
      None
    }
  }
}
