use crate::binder::{Column, SamplingGrid};
use crate::syntax::{BinaryOperator, Expr, Expression, Function, UnaryOperator};
use crate::FieldError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Instruction {
  Push(f64),
  Load(usize),
  Unary(UnaryOperator),
  Binary(BinaryOperator),
  Call(Function, usize),
}

/// An expression lowered to a postfix program.
///
/// Variables are loaded by their position in the expression's sorted
/// variable list, so the program is applied to inputs in that same order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
  program: Vec<Instruction>,
  arity: usize,
}

impl CompiledExpr {
  pub fn compile(expression: &Expression) -> Result<Self, FieldError> {
    let mut program = Vec::new();
    lower(expression, expression.tree(), &mut program)?;
    Ok(CompiledExpr {
      program,
      arity: expression.variables().len(),
    })
  }

  /// Number of inputs the program expects.
  pub fn arity(&self) -> usize {
    self.arity
  }

  /// Evaluate at a single point.
  pub fn call(&self, point: &[f64]) -> Result<f64, FieldError> {
    let inputs: Vec<Column> =
      point.iter().map(|&v| Column::Scalar(v)).collect();
    match self.apply(&inputs)? {
      Column::Scalar(value) => Ok(value),
      Column::Grid(values) => Ok(values.first().copied().unwrap_or(f64::NAN)),
    }
  }

  /// Evaluate over broadcast columns, one per variable.
  pub fn apply(&self, inputs: &[Column]) -> Result<Column, FieldError> {
    if inputs.len() != self.arity {
      return Err(FieldError::BindingMismatch(format!(
        "expression takes {} variables, {} were bound",
        self.arity,
        inputs.len()
      )));
    }
    let mut lengths = inputs.iter().filter_map(|input| match input {
      Column::Grid(values) => Some(values.len()),
      Column::Scalar(_) => None,
    });
    if let Some(first) = lengths.next() {
      if let Some(other) = lengths.find(|&len| len != first) {
        return Err(FieldError::BindingMismatch(format!(
          "grid inputs differ in length: {first} and {other}"
        )));
      }
    }

    let mut stack: Vec<Column> = Vec::with_capacity(self.program.len());
    for instruction in &self.program {
      let column = match *instruction {
        Instruction::Push(value) => Column::Scalar(value),
        Instruction::Load(slot) => inputs[slot].clone(),
        Instruction::Unary(op) => map(pop(&mut stack), |a| unary(op, a)),
        Instruction::Binary(op) => {
          let right = pop(&mut stack);
          let left = pop(&mut stack);
          zip(left, right, |a, b| binary(op, a, b))
        }
        Instruction::Call(function, argc) => {
          let args = stack.split_off(stack.len().saturating_sub(argc));
          call_columns(function, args)
        }
      };
      stack.push(column);
    }
    Ok(pop(&mut stack))
  }
}

fn lower(
  expression: &Expression,
  expr: &Expr,
  program: &mut Vec<Instruction>,
) -> Result<(), FieldError> {
  match expr {
    Expr::Number(n) => program.push(Instruction::Push(*n)),
    Expr::Constant(c) => program.push(Instruction::Push(c.value())),
    Expr::Variable(name) => {
      let slot = expression.variable_index(name).ok_or_else(|| {
        FieldError::InvalidExpression(format!("unbound variable {name}"))
      })?;
      program.push(Instruction::Load(slot));
    }
    Expr::UnaryOp { op, operand } => {
      lower(expression, operand, program)?;
      program.push(Instruction::Unary(*op));
    }
    Expr::BinaryOp { op, left, right } => {
      lower(expression, left, program)?;
      lower(expression, right, program)?;
      program.push(Instruction::Binary(*op));
    }
    Expr::FunctionCall { function, args } => {
      for arg in args {
        lower(expression, arg, program)?;
      }
      program.push(Instruction::Call(*function, args.len()));
    }
  }
  Ok(())
}

fn pop(stack: &mut Vec<Column>) -> Column {
  stack.pop().unwrap_or(Column::Scalar(f64::NAN))
}

fn map(column: Column, f: impl Fn(f64) -> f64) -> Column {
  match column {
    Column::Scalar(a) => Column::Scalar(f(a)),
    Column::Grid(mut values) => {
      for v in values.iter_mut() {
        *v = f(*v);
      }
      Column::Grid(values)
    }
  }
}

fn zip(left: Column, right: Column, f: impl Fn(f64, f64) -> f64) -> Column {
  match (left, right) {
    (Column::Scalar(a), Column::Scalar(b)) => Column::Scalar(f(a, b)),
    (Column::Scalar(a), right @ Column::Grid(_)) => map(right, |b| f(a, b)),
    (left @ Column::Grid(_), Column::Scalar(b)) => map(left, |a| f(a, b)),
    (Column::Grid(mut left), Column::Grid(right)) => {
      for (a, b) in left.iter_mut().zip(right) {
        *a = f(*a, b);
      }
      Column::Grid(left)
    }
  }
}

fn call_columns(function: Function, args: Vec<Column>) -> Column {
  let len = args.iter().find_map(|arg| match arg {
    Column::Grid(values) => Some(values.len()),
    Column::Scalar(_) => None,
  });
  let arg_at = |k: usize| -> Vec<f64> {
    args
      .iter()
      .map(|arg| match arg {
        Column::Scalar(v) => *v,
        Column::Grid(values) => values.get(k).copied().unwrap_or(f64::NAN),
      })
      .collect()
  };
  match len {
    None => Column::Scalar(apply_function(function, &arg_at(0))),
    Some(len) => Column::Grid(
      (0..len)
        .map(|k| apply_function(function, &arg_at(k)))
        .collect(),
    ),
  }
}

fn unary(op: UnaryOperator, a: f64) -> f64 {
  match op {
    UnaryOperator::Minus => -a,
    UnaryOperator::Plus => a,
  }
}

fn binary(op: BinaryOperator, a: f64, b: f64) -> f64 {
  match op {
    BinaryOperator::Plus => a + b,
    BinaryOperator::Minus => a - b,
    BinaryOperator::Times => a * b,
    BinaryOperator::Divide => a / b,
    BinaryOperator::Modulo => {
      // Result takes the sign of the divisor
      let r = a % b;
      if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
      } else {
        r
      }
    }
    BinaryOperator::Power => a.powf(b),
  }
}

fn sign(x: f64) -> f64 {
  if x > 0.0 {
    1.0
  } else if x < 0.0 {
    -1.0
  } else {
    // 0.0 or NaN
    x
  }
}

fn extremum(args: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
  let mut iter = args.iter().copied();
  let first = iter.next().unwrap_or(f64::NAN);
  iter.fold(first, |acc, v| {
    if acc.is_nan() || v.is_nan() {
      f64::NAN
    } else {
      pick(acc, v)
    }
  })
}

fn apply_function(function: Function, args: &[f64]) -> f64 {
  let x = args.first().copied().unwrap_or(f64::NAN);
  match function {
    Function::Sin => x.sin(),
    Function::Cos => x.cos(),
    Function::Tan => x.tan(),
    Function::Cot => 1.0 / x.tan(),
    Function::Sec => 1.0 / x.cos(),
    Function::Csc => 1.0 / x.sin(),
    Function::Asin => x.asin(),
    Function::Acos => x.acos(),
    Function::Atan => x.atan(),
    Function::Atan2 => x.atan2(args.get(1).copied().unwrap_or(f64::NAN)),
    Function::Sinh => x.sinh(),
    Function::Cosh => x.cosh(),
    Function::Tanh => x.tanh(),
    Function::Asinh => x.asinh(),
    Function::Acosh => x.acosh(),
    Function::Atanh => x.atanh(),
    Function::Exp => x.exp(),
    Function::Log => match args.get(1) {
      Some(base) => x.ln() / base.ln(),
      None => x.ln(),
    },
    Function::Sqrt => x.sqrt(),
    Function::Abs => x.abs(),
    Function::Sign => sign(x),
    Function::Floor => x.floor(),
    Function::Ceiling => x.ceil(),
    Function::Min => extremum(args, f64::min),
    Function::Max => extremum(args, f64::max),
  }
}

/// Color-scale bounds chosen by the user. Only a display hint: the field
/// is never clipped or checked against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
  pub min: f64,
  pub max: f64,
}

impl Default for DisplayRange {
  fn default() -> Self {
    DisplayRange {
      min: crate::config::DEFAULT_RANGE_MIN,
      max: crate::config::DEFAULT_RANGE_MAX,
    }
  }
}

/// Expression values over the `density * density` axis grid.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericField {
  density: usize,
  axis_x: Vec<f64>,
  axis_y: Vec<f64>,
  values: Vec<f64>,
  display_range: DisplayRange,
}

impl NumericField {
  pub fn density(&self) -> usize {
    self.density
  }

  pub fn axis_x(&self) -> &[f64] {
    &self.axis_x
  }

  pub fn axis_y(&self) -> &[f64] {
    &self.axis_y
  }

  pub fn display_range(&self) -> DisplayRange {
    self.display_range
  }

  /// Row-major values, `x` index outermost.
  pub fn values(&self) -> &[f64] {
    &self.values
  }

  /// Value at `x = axis_x[i]`, `y = axis_y[j]`.
  pub fn get(&self, i: usize, j: usize) -> Option<f64> {
    if i >= self.density || j >= self.density {
      return None;
    }
    self.values.get(i * self.density + j).copied()
  }

  pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
    self.values.chunks(self.density.max(1))
  }

  pub fn to_rows(&self) -> Vec<Vec<f64>> {
    self.rows().map(<[f64]>::to_vec).collect()
  }

  /// Number of grid points where the expression is NaN or infinite.
  pub fn non_finite_count(&self) -> usize {
    self.values.iter().filter(|v| !v.is_finite()).count()
  }

  /// Non-finite values serialize as `null`.
  pub fn to_json(&self) -> serde_json::Value {
    serde_json::json!({
      "x": self.axis_x,
      "y": self.axis_y,
      "z": self.to_rows(),
      "zmin": self.display_range.min,
      "zmax": self.display_range.max,
    })
  }
}

/// Apply `expression` to the mesh of `grid`.
pub fn evaluate(
  expression: &Expression,
  grid: &SamplingGrid,
  display_range: DisplayRange,
) -> Result<NumericField, FieldError> {
  if !grid
    .variables()
    .eq(expression.variables().iter().map(String::as_str))
  {
    return Err(FieldError::BindingMismatch(format!(
      "grid binds {:?} but the expression uses {:?}",
      grid.variables().collect::<Vec<_>>(),
      expression.variables()
    )));
  }

  let compiled = CompiledExpr::compile(expression)?;
  let density = grid.density();
  let values = match compiled.apply(&grid.mesh())? {
    Column::Grid(values) => values,
    Column::Scalar(value) => vec![value; density * density],
  };

  let field = NumericField {
    density,
    axis_x: grid.axis_x().to_vec(),
    axis_y: grid.axis_y().to_vec(),
    values,
    display_range,
  };

  let non_finite = field.non_finite_count();
  if non_finite > 0 {
    tracing::warn!(
      expression = %expression,
      non_finite,
      "expression is not finite at some grid points"
    );
  }
  tracing::debug!(density, "evaluated field");

  Ok(field)
}
