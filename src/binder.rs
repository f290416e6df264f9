use std::collections::BTreeMap;

use crate::FieldError;

/// Scalar values for the non-axis variables, keyed by variable name.
pub type FixedValues = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
  X,
  Y,
}

/// How a single free variable takes part in an evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding {
  Axis(Axis),
  Fixed(f64),
}

/// Evenly spaced samples over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
  match count {
    0 => Vec::new(),
    1 => vec![start],
    _ => {
      let step = (stop - start) / (count - 1) as f64;
      let mut samples: Vec<f64> =
        (0..count).map(|i| start + i as f64 * step).collect();
      samples[count - 1] = stop;
      samples
    }
  }
}

fn mismatch(message: String) -> FieldError {
  tracing::debug!(%message, "binding mismatch");
  FieldError::BindingMismatch(message)
}

fn check_order(free_variables: &[String]) -> Result<(), FieldError> {
  match free_variables.windows(2).find(|pair| pair[0] >= pair[1]) {
    Some(pair) => Err(mismatch(format!(
      "variables must be distinct and sorted, found {} before {}",
      pair[0], pair[1]
    ))),
    None => Ok(()),
  }
}

/// Both axes must be distinct free variables.
pub fn validate_axes(
  free_variables: &[String],
  x_axis: &str,
  y_axis: &str,
) -> Result<(), FieldError> {
  if x_axis == y_axis {
    return Err(mismatch(format!(
      "x and y axis must be different variables, both are {x_axis}"
    )));
  }
  for axis in [x_axis, y_axis] {
    if !free_variables.iter().any(|v| v == axis) {
      return Err(mismatch(format!(
        "axis variable {axis} does not occur in the expression"
      )));
    }
  }
  Ok(())
}

/// Free variables that are neither axis, in free-variable order.
pub fn non_axis_variables<'a>(
  free_variables: &'a [String],
  x_axis: &str,
  y_axis: &str,
) -> Vec<&'a str> {
  free_variables
    .iter()
    .map(String::as_str)
    .filter(|name| *name != x_axis && *name != y_axis)
    .collect()
}

/// Turn positional slot values into a name keyed mapping.
///
/// Slot `k` belongs to the `k`-th non-axis variable. When the caller passes
/// the labels it displayed next to its slots they must match the current
/// non-axis variables exactly, otherwise the values were captured for a
/// different expression.
pub fn fixed_values_from_slots(
  free_variables: &[String],
  x_axis: &str,
  y_axis: &str,
  values: &[f64],
  slot_labels: Option<&[String]>,
  max_slots: usize,
) -> Result<FixedValues, FieldError> {
  let names = non_axis_variables(free_variables, x_axis, y_axis);
  if names.len() > max_slots {
    return Err(mismatch(format!(
      "{} variables need a fixed value but only {max_slots} slots exist",
      names.len()
    )));
  }
  if values.len() < names.len() {
    return Err(mismatch(format!(
      "expected {} fixed values, got {}",
      names.len(),
      values.len()
    )));
  }
  if let Some(labels) = slot_labels {
    let labels: Vec<&str> = labels
      .iter()
      .map(String::as_str)
      .filter(|label| !label.is_empty())
      .collect();
    if labels != names {
      return Err(mismatch(format!(
        "slots are labelled {labels:?} but the expression needs {names:?}"
      )));
    }
  }
  Ok(
    names
      .into_iter()
      .zip(values.iter().copied())
      .map(|(name, value)| (name.to_string(), value))
      .collect(),
  )
}

/// One column of the broadcast mesh.
///
/// A fixed variable stays a single scalar; an axis variable is expanded to
/// the full `density * density` grid in row-major `(x, y)` order.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
  Scalar(f64),
  Grid(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateArray {
  pub variable: String,
  pub binding: Binding,
  pub values: Vec<f64>,
}

/// Coordinate arrays for every free variable, in free-variable order.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
  density: usize,
  coordinates: Vec<CoordinateArray>,
  axis_x: Vec<f64>,
  axis_y: Vec<f64>,
}

impl SamplingGrid {
  pub fn density(&self) -> usize {
    self.density
  }

  pub fn coordinates(&self) -> &[CoordinateArray] {
    &self.coordinates
  }

  pub fn variables(&self) -> impl Iterator<Item = &str> {
    self.coordinates.iter().map(|c| c.variable.as_str())
  }

  pub fn axis_x(&self) -> &[f64] {
    &self.axis_x
  }

  pub fn axis_y(&self) -> &[f64] {
    &self.axis_y
  }

  /// Outer-product combination of the coordinate arrays.
  pub fn mesh(&self) -> Vec<Column> {
    let d = self.density;
    self
      .coordinates
      .iter()
      .map(|coordinate| match coordinate.binding {
        Binding::Fixed(value) => Column::Scalar(value),
        Binding::Axis(Axis::X) => Column::Grid(
          self
            .axis_x
            .iter()
            .flat_map(|&x| std::iter::repeat(x).take(d))
            .collect(),
        ),
        Binding::Axis(Axis::Y) => Column::Grid(
          (0..d).flat_map(|_| self.axis_y.iter().copied()).collect(),
        ),
      })
      .collect()
  }
}

/// Build the sampling grid for one evaluation.
///
/// Returns `Ok(None)` while either axis is still unchosen. Values are
/// correlated with variables through the sorted order of `free_variables`,
/// so an unsorted list, an unknown axis or a fixed value for a variable the
/// expression no longer has all fail instead of evaluating misaligned data.
pub fn bind(
  free_variables: &[String],
  x_axis: Option<&str>,
  y_axis: Option<&str>,
  fixed_values: &FixedValues,
  density: usize,
) -> Result<Option<SamplingGrid>, FieldError> {
  let (x_axis, y_axis) = match (x_axis, y_axis) {
    (Some(x), Some(y)) => (x, y),
    _ => {
      tracing::debug!("axes not chosen, skipping grid construction");
      return Ok(None);
    }
  };

  check_order(free_variables)?;
  validate_axes(free_variables, x_axis, y_axis)?;

  if let Some(stale) = fixed_values.keys().find(|name| {
    *name == x_axis
      || *name == y_axis
      || free_variables.binary_search(*name).is_err()
  }) {
    return Err(mismatch(format!(
      "fixed value given for {stale}, which is not a non-axis variable"
    )));
  }

  let samples = linspace(0.0, 1.0, density);
  let coordinates = free_variables
    .iter()
    .map(|name| {
      let binding = if name == x_axis {
        Binding::Axis(Axis::X)
      } else if name == y_axis {
        Binding::Axis(Axis::Y)
      } else {
        let value = fixed_values.get(name).ok_or_else(|| {
          mismatch(format!("no fixed value given for {name}"))
        })?;
        Binding::Fixed(*value)
      };
      let values = match binding {
        Binding::Axis(_) => samples.clone(),
        Binding::Fixed(value) => vec![value],
      };
      Ok(CoordinateArray {
        variable: name.clone(),
        binding,
        values,
      })
    })
    .collect::<Result<Vec<_>, FieldError>>()?;

  tracing::debug!(
    x_axis,
    y_axis,
    fixed = ?fixed_values,
    density,
    "bound sampling grid"
  );

  Ok(Some(SamplingGrid {
    density,
    coordinates,
    axis_x: samples.clone(),
    axis_y: samples,
  }))
}

/// Label and visibility of one positional fixed-value slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDescriptor {
  pub index: usize,
  pub name: String,
  pub visible: bool,
}

impl SlotDescriptor {
  pub fn to_json(&self) -> serde_json::Value {
    serde_json::json!({
      "index": self.index,
      "name": self.name,
      "visible": self.visible,
    })
  }
}

/// Exactly `max_slots` descriptors. Slot `k` shows the `k`-th non-axis
/// variable; the rest are blank and hidden, as are all slots while an axis
/// is unset.
pub fn slot_descriptors(
  free_variables: &[String],
  x_axis: Option<&str>,
  y_axis: Option<&str>,
  max_slots: usize,
) -> Vec<SlotDescriptor> {
  let names = match (x_axis, y_axis) {
    (Some(x), Some(y)) => non_axis_variables(free_variables, x, y),
    _ => Vec::new(),
  };
  (0..max_slots)
    .map(|index| match names.get(index) {
      Some(name) => SlotDescriptor {
        index,
        name: name.to_string(),
        visible: true,
      },
      None => SlotDescriptor {
        index,
        name: String::new(),
        visible: false,
      },
    })
    .collect()
}
