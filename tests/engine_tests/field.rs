use super::*;

fn lin(i: usize) -> f64 {
  heatfield::linspace(0.0, 1.0, DENSITY)[i]
}

#[test]
fn sum_of_axes() {
  let field = compute_field(&FieldRequest::new("x0+x1", "x0", "x1")).unwrap();
  assert_eq!(field.density(), 100);
  assert_eq!(field.get(0, 0), Some(0.0));
  assert_eq!(field.get(99, 99), Some(2.0));
  for i in 0..DENSITY {
    for j in 0..DENSITY {
      let v = field.get(i, j).unwrap();
      assert!((v - (lin(i) + lin(j))).abs() < 1e-12);
    }
  }
}

#[test]
fn shape_and_axes() {
  let field = compute_field(
    &FieldRequest::new("x0-x1*x2+sin(2*pi*x3)", "x2", "x3")
      .with_fixed_values(&[0.1, 0.9]),
  )
  .unwrap();
  assert_eq!(field.values().len(), DENSITY * DENSITY);
  assert_eq!(field.rows().count(), DENSITY);
  assert!(field.rows().all(|row| row.len() == DENSITY));
  for axis in [field.axis_x(), field.axis_y()] {
    assert_eq!(axis.len(), DENSITY);
    assert_eq!(axis[0], 0.0);
    assert_eq!(axis[DENSITY - 1], 1.0);
    assert!(axis.windows(2).all(|w| w[0] < w[1]));
  }
  assert_eq!(field.get(DENSITY, 0), None);
}

#[test]
fn first_index_follows_the_x_axis() {
  // x1 is sorted after x0 but is chosen as the x axis
  let field = compute_field(&FieldRequest::new("x0 - x1", "x1", "x0")).unwrap();
  assert_eq!(field.get(99, 0), Some(-1.0));
  assert_eq!(field.get(0, 99), Some(1.0));
  let rows = field.to_rows();
  assert_eq!(rows[99][0], -1.0);
}

#[test]
fn fixed_values_follow_sorted_order() {
  // x2 = 0.5, x3 = 0.25, so sin(2*pi*x3) = 1
  let field = compute_field(
    &FieldRequest::new("x0-x1*x2+sin(2*pi*x3)", "x0", "x1")
      .with_fixed_values(&[0.5, 0.25]),
  )
  .unwrap();
  assert!((field.get(0, 0).unwrap() - 1.0).abs() < 1e-12);
  assert!((field.get(99, 99).unwrap() - 1.5).abs() < 1e-12);
  assert!((field.get(99, 0).unwrap() - 2.0).abs() < 1e-12);
}

#[test]
fn default_slot_values_are_ignored_beyond_the_variables() {
  let request = FieldRequest {
    x_axis: Some("x0".to_string()),
    y_axis: Some("x1".to_string()),
    ..FieldRequest::default()
  };
  assert_eq!(request.fixed_values.len(), 10);
  let field = compute_field(&request).unwrap();
  // x2 = x3 = 0.5 and sin(pi) vanishes
  assert!((field.get(0, 0).unwrap()).abs() < 1e-12);
}

#[test]
fn unset_axis_gives_nothing() {
  let mut request = FieldRequest::new("x0+x1", "x0", "x1");
  request.y_axis = None;
  assert!(compute_field(&request).is_none());
  assert!(matches!(try_field(&request), Ok(None)));

  request.y_axis = Some(String::new());
  assert!(matches!(try_field(&request), Ok(None)));

  // even when the text itself is broken
  request.expression = "((".to_string();
  request.x_axis = None;
  assert!(matches!(try_field(&request), Ok(None)));
}

#[test]
fn repeated_calls_are_bit_identical() {
  let request = FieldRequest::new("x0**x1 / (x2 + 0.1) + sin(x3)", "x1", "x3")
    .with_fixed_values(&[0.3, 0.7]);
  let first = compute_field(&request).unwrap();
  let second = compute_field(&request).unwrap();
  let bits = |f: &heatfield::NumericField| -> Vec<u64> {
    f.values().iter().map(|v| v.to_bits()).collect()
  };
  assert_eq!(bits(&first), bits(&second));
}

#[test]
fn changing_a_fixed_value_keeps_shape_and_axes() {
  let base = FieldRequest::new("x0 * x2 + x1", "x0", "x1");
  let low = compute_field(&base.clone().with_fixed_values(&[0.2])).unwrap();
  let high = compute_field(&base.with_fixed_values(&[0.8])).unwrap();
  assert_eq!(low.values().len(), high.values().len());
  assert_eq!(low.axis_x(), high.axis_x());
  assert_eq!(low.axis_y(), high.axis_y());
  assert_ne!(low.values(), high.values());
}

#[test]
fn display_range_is_passed_through() {
  let request =
    FieldRequest::new("x0+x1", "x0", "x1").with_range(-1000.0, 0.001);
  let field = compute_field(&request).unwrap();
  let range = field.display_range();
  assert_eq!((range.min, range.max), (-1000.0, 0.001));
  // values above the declared max are kept as they are
  assert_eq!(field.get(99, 99), Some(2.0));

  let inverted = compute_field(&request.with_range(5.0, -5.0)).unwrap();
  assert_eq!(inverted.display_range().min, 5.0);
}

#[test]
fn non_finite_points_are_kept() {
  let request = FieldRequest::new("log(x0 - 0.5) + x1", "x0", "x1");
  let field = compute_field(&request).unwrap();
  assert_eq!(field.non_finite_count(), 50 * DENSITY);
  assert!(field.get(0, 0).unwrap().is_nan());
  assert!(field.get(99, 0).unwrap().is_finite());

  let field =
    compute_field(&FieldRequest::new("1 / x0 + x1", "x0", "x1")).unwrap();
  assert_eq!(field.non_finite_count(), DENSITY);
  assert_eq!(field.get(0, 5), Some(f64::INFINITY));
}

#[test]
fn json_output() {
  let field = try_compute_field(
    &FieldRequest::new("sqrt(x0 - x1)", "x0", "x1"),
    &EngineConfig {
      density: 3,
      ..EngineConfig::default()
    },
  )
  .unwrap()
  .unwrap();
  let json = field.to_json();
  assert_eq!(json["x"], serde_json::json!([0.0, 0.5, 1.0]));
  assert_eq!(json["z"][0][0], serde_json::json!(0.0));
  assert!(json["z"][0][1].is_null());
  assert_eq!(json["zmin"], serde_json::json!(-2.0));
  assert_eq!(json["zmax"], serde_json::json!(2.0));
}

#[test]
fn custom_density() {
  let config = EngineConfig {
    density: 7,
    ..EngineConfig::default()
  };
  let request = FieldRequest::new("x0*x1", "x0", "x1");
  let field = try_compute_field(&request, &config).unwrap().unwrap();
  assert_eq!(field.values().len(), 49);
  assert_eq!(field.get(6, 6), Some(1.0));
}
