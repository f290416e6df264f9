use super::*;
use heatfield::binder::{Column, fixed_values_from_slots};
use heatfield::{Axis, Binding, CompiledExpr, FixedValues, bind, parse};

fn names(list: &[&str]) -> Vec<String> {
  list.iter().map(|s| s.to_string()).collect()
}

fn fixed(pairs: &[(&str, f64)]) -> FixedValues {
  pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn missing_axis_builds_no_grid() {
  let vars = names(&["x0", "x1"]);
  assert!(bind(&vars, None, Some("x1"), &FixedValues::new(), 10)
    .unwrap()
    .is_none());
  assert!(bind(&vars, Some("x0"), None, &FixedValues::new(), 10)
    .unwrap()
    .is_none());
}

#[test]
fn coordinate_arrays_in_variable_order() {
  let vars = names(&["a", "b", "c", "d"]);
  let grid = bind(
    &vars,
    Some("d"),
    Some("b"),
    &fixed(&[("a", 0.25), ("c", -3.0)]),
    5,
  )
  .unwrap()
  .unwrap();

  let coordinates = grid.coordinates();
  assert_eq!(
    grid.variables().collect::<Vec<_>>(),
    vec!["a", "b", "c", "d"]
  );
  assert_eq!(coordinates[0].binding, Binding::Fixed(0.25));
  assert_eq!(coordinates[0].values, vec![0.25]);
  assert_eq!(coordinates[1].binding, Binding::Axis(Axis::Y));
  assert_eq!(coordinates[1].values.len(), 5);
  assert_eq!(coordinates[2].values, vec![-3.0]);
  assert_eq!(coordinates[3].binding, Binding::Axis(Axis::X));
  assert_eq!(grid.axis_x(), &[0.0, 0.25, 0.5, 0.75, 1.0]);

  let mesh = grid.mesh();
  assert_eq!(mesh.len(), 4);
  assert_eq!(mesh[0], Column::Scalar(0.25));
  assert!(matches!(&mesh[1], Column::Grid(v) if v.len() == 25));
}

#[test]
fn axes_must_be_distinct_free_variables() {
  let vars = names(&["x0", "x1"]);
  let same = bind(&vars, Some("x0"), Some("x0"), &fixed(&[("x1", 1.0)]), 4);
  assert!(matches!(same, Err(FieldError::BindingMismatch(_))));

  let unknown = bind(&vars, Some("x0"), Some("x9"), &FixedValues::new(), 4);
  assert!(matches!(unknown, Err(FieldError::BindingMismatch(_))));
}

#[test]
fn every_non_axis_variable_needs_a_value() {
  let vars = names(&["x0", "x1", "x2"]);
  let err = bind(&vars, Some("x0"), Some("x1"), &FixedValues::new(), 4)
    .unwrap_err();
  assert!(matches!(err, FieldError::BindingMismatch(_)));
  assert!(!err.is_parse_error());
}

#[test]
fn stale_fixed_values_are_rejected() {
  let vars = names(&["x0", "x1"]);
  let removed = bind(&vars, Some("x0"), Some("x1"), &fixed(&[("x2", 0.5)]), 4);
  assert!(matches!(removed, Err(FieldError::BindingMismatch(_))));

  let axis = bind(&vars, Some("x0"), Some("x1"), &fixed(&[("x1", 0.5)]), 4);
  assert!(matches!(axis, Err(FieldError::BindingMismatch(_))));
}

#[test]
fn slot_values_map_to_non_axis_variables() {
  let vars = names(&["x0", "x1", "x2", "x3"]);
  let values =
    fixed_values_from_slots(&vars, "x1", "x2", &[0.1, 0.9, 0.5], None, 10)
      .unwrap();
  assert_eq!(values, fixed(&[("x0", 0.1), ("x3", 0.9)]));
}

#[test]
fn too_few_slot_values() {
  let vars = names(&["x0", "x1", "x2", "x3"]);
  let err =
    fixed_values_from_slots(&vars, "x0", "x1", &[0.5], None, 10).unwrap_err();
  assert!(matches!(err, FieldError::BindingMismatch(_)));
}

#[test]
fn more_variables_than_slots() {
  let vars: Vec<String> = (0..13).map(|i| format!("v{i:02}")).collect();
  let err =
    fixed_values_from_slots(&vars, "v00", "v01", &[0.5; 11], None, 10)
      .unwrap_err();
  assert!(matches!(err, FieldError::BindingMismatch(_)));
}

#[test]
fn slot_labels_must_match_current_variables() {
  let vars = names(&["x0", "x1", "x2"]);
  let stale = names(&["x2", "x3"]);
  let err = fixed_values_from_slots(
    &vars,
    "x0",
    "x1",
    &[0.5, 0.5],
    Some(stale.as_slice()),
    10,
  )
  .unwrap_err();
  assert!(matches!(err, FieldError::BindingMismatch(_)));

  let current = names(&["x2", "", ""]);
  let values = fixed_values_from_slots(
    &vars,
    "x0",
    "x1",
    &[0.5],
    Some(current.as_slice()),
    10,
  )
  .unwrap();
  assert_eq!(values, fixed(&[("x2", 0.5)]));
}

#[test]
fn stale_request_fails_closed() {
  let mut request = FieldRequest::new("x0 + x1 + x2", "x0", "x1");
  request.slot_labels = Some(names(&["x2", "x3"]));
  assert!(matches!(
    try_field(&request),
    Err(FieldError::BindingMismatch(_))
  ));
  assert!(compute_field(&request).is_none());

  request.slot_labels = Some(names(&["x2"]));
  assert!(compute_field(&request).is_some());
}

#[test]
fn request_errors_stay_distinguishable() {
  let parse =
    try_field(&FieldRequest::new("x0 +* x1", "x0", "x1")).unwrap_err();
  assert!(parse.is_parse_error());

  let axis = try_field(&FieldRequest::new("x0 + x1", "x0", "x5")).unwrap_err();
  assert!(matches!(axis, FieldError::BindingMismatch(_)));

  let short = try_field(
    &FieldRequest::new("x0 + x1 + x2 + x3", "x0", "x1")
      .with_fixed_values(&[1.0]),
  )
  .unwrap_err();
  assert!(matches!(short, FieldError::BindingMismatch(_)));
}

#[test]
fn unlabelled_slot_values_are_read_positionally() {
  // Values captured while the expression was `x0 + x1 + x2 + x3` fill the
  // slots of `x0 + x1 + x3` in order, so x3 receives x2's value. Only the
  // labels can tell the two apart.
  let request = FieldRequest::new("x0 + x1 + x3", "x0", "x1")
    .with_fixed_values(&[0.1, 0.9]);
  let field = compute_field(&request).unwrap();
  assert_eq!(field.get(0, 0), Some(0.1));

  let mut labelled = request;
  labelled.slot_labels = Some(names(&["x2", "x3"]));
  assert!(matches!(
    try_field(&labelled),
    Err(FieldError::BindingMismatch(_))
  ));
}

#[test]
fn grid_inputs_must_share_a_length() {
  let compiled = CompiledExpr::compile(&parse("a + b").unwrap()).unwrap();
  let uneven = compiled.apply(&[
    Column::Grid(vec![1.0, 2.0, 3.0]),
    Column::Grid(vec![1.0, 2.0]),
  ]);
  assert!(matches!(uneven, Err(FieldError::BindingMismatch(_))));

  let even = compiled
    .apply(&[Column::Grid(vec![1.0, 2.0]), Column::Scalar(0.5)])
    .unwrap();
  assert_eq!(even, Column::Grid(vec![1.5, 2.5]));
}
