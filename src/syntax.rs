use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};

use crate::config::{MAX_DEPTH, MAX_PARENS};
use crate::{ExpressionParser, FieldError, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
  Plus,
  Minus,
  Times,
  Divide,
  Modulo,
  Power,
}

impl BinaryOperator {
  fn symbol(self) -> &'static str {
    match self {
      BinaryOperator::Plus => "+",
      BinaryOperator::Minus => "-",
      BinaryOperator::Times => "*",
      BinaryOperator::Divide => "/",
      BinaryOperator::Modulo => "%",
      BinaryOperator::Power => "**",
    }
  }

  fn precedence(self) -> u8 {
    match self {
      BinaryOperator::Plus | BinaryOperator::Minus => 1,
      BinaryOperator::Times
      | BinaryOperator::Divide
      | BinaryOperator::Modulo => 2,
      BinaryOperator::Power => 4,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
  Minus,
  Plus,
}

const UNARY_PRECEDENCE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
  Pi,
  E,
}

impl Constant {
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "pi" => Some(Constant::Pi),
      "E" => Some(Constant::E),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Constant::Pi => "pi",
      Constant::E => "E",
    }
  }

  pub fn value(self) -> f64 {
    match self {
      Constant::Pi => std::f64::consts::PI,
      Constant::E => std::f64::consts::E,
    }
  }
}

/// Built-in numeric functions callable from an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
  Sin,
  Cos,
  Tan,
  Cot,
  Sec,
  Csc,
  Asin,
  Acos,
  Atan,
  Atan2,
  Sinh,
  Cosh,
  Tanh,
  Asinh,
  Acosh,
  Atanh,
  Exp,
  Log,
  Sqrt,
  Abs,
  Sign,
  Floor,
  Ceiling,
  Min,
  Max,
}

impl Function {
  pub fn from_name(name: &str) -> Option<Self> {
    let function = match name {
      "sin" => Function::Sin,
      "cos" => Function::Cos,
      "tan" => Function::Tan,
      "cot" => Function::Cot,
      "sec" => Function::Sec,
      "csc" => Function::Csc,
      "asin" | "arcsin" => Function::Asin,
      "acos" | "arccos" => Function::Acos,
      "atan" | "arctan" => Function::Atan,
      "atan2" => Function::Atan2,
      "sinh" => Function::Sinh,
      "cosh" => Function::Cosh,
      "tanh" => Function::Tanh,
      "asinh" => Function::Asinh,
      "acosh" => Function::Acosh,
      "atanh" => Function::Atanh,
      "exp" => Function::Exp,
      "log" | "ln" => Function::Log,
      "sqrt" => Function::Sqrt,
      "abs" | "Abs" => Function::Abs,
      "sign" => Function::Sign,
      "floor" => Function::Floor,
      "ceiling" | "ceil" => Function::Ceiling,
      "min" | "Min" => Function::Min,
      "max" | "Max" => Function::Max,
      _ => return None,
    };
    Some(function)
  }

  /// Canonical spelling, used when printing an expression back.
  pub fn name(self) -> &'static str {
    match self {
      Function::Sin => "sin",
      Function::Cos => "cos",
      Function::Tan => "tan",
      Function::Cot => "cot",
      Function::Sec => "sec",
      Function::Csc => "csc",
      Function::Asin => "asin",
      Function::Acos => "acos",
      Function::Atan => "atan",
      Function::Atan2 => "atan2",
      Function::Sinh => "sinh",
      Function::Cosh => "cosh",
      Function::Tanh => "tanh",
      Function::Asinh => "asinh",
      Function::Acosh => "acosh",
      Function::Atanh => "atanh",
      Function::Exp => "exp",
      Function::Log => "log",
      Function::Sqrt => "sqrt",
      Function::Abs => "abs",
      Function::Sign => "sign",
      Function::Floor => "floor",
      Function::Ceiling => "ceiling",
      Function::Min => "min",
      Function::Max => "max",
    }
  }

  pub fn accepts(self, arg_count: usize) -> bool {
    match self {
      Function::Log => arg_count == 1 || arg_count == 2,
      Function::Atan2 => arg_count == 2,
      Function::Min | Function::Max => arg_count >= 1,
      _ => arg_count == 1,
    }
  }

  fn arity_description(self) -> &'static str {
    match self {
      Function::Log => "1 or 2 arguments",
      Function::Atan2 => "2 arguments",
      Function::Min | Function::Max => "at least 1 argument",
      _ => "1 argument",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Number(f64),
  Constant(Constant),
  Variable(String),
  UnaryOp {
    op: UnaryOperator,
    operand: Box<Expr>,
  },
  BinaryOp {
    op: BinaryOperator,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  FunctionCall {
    function: Function,
    args: Vec<Expr>,
  },
}

impl Expr {
  /// Collect the names of all free variables into `out`.
  pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
    match self {
      Expr::Number(_) | Expr::Constant(_) => {}
      Expr::Variable(name) => {
        out.insert(name.clone());
      }
      Expr::UnaryOp { operand, .. } => operand.collect_variables(out),
      Expr::BinaryOp { left, right, .. } => {
        left.collect_variables(out);
        right.collect_variables(out);
      }
      Expr::FunctionCall { args, .. } => {
        for arg in args {
          arg.collect_variables(out);
        }
      }
    }
  }

  fn precedence(&self) -> u8 {
    match self {
      Expr::UnaryOp { .. } => UNARY_PRECEDENCE,
      Expr::BinaryOp { op, .. } => op.precedence(),
      Expr::Number(n) if *n < 0.0 => UNARY_PRECEDENCE,
      _ => u8::MAX,
    }
  }
}

fn write_operand(
  f: &mut fmt::Formatter<'_>,
  expr: &Expr,
  parenthesize: bool,
) -> fmt::Result {
  if parenthesize {
    write!(f, "({expr})")
  } else {
    write!(f, "{expr}")
  }
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expr::Number(n) => write!(f, "{n}"),
      Expr::Constant(c) => f.write_str(c.name()),
      Expr::Variable(name) => f.write_str(name),
      Expr::UnaryOp { op, operand } => {
        f.write_str(match op {
          UnaryOperator::Minus => "-",
          UnaryOperator::Plus => "+",
        })?;
        write_operand(f, operand, operand.precedence() < UNARY_PRECEDENCE)
      }
      Expr::BinaryOp { op, left, right } => {
        let prec = op.precedence();
        // `**` is right-associative, every other operator left-associative
        let (left_parens, right_parens) = if *op == BinaryOperator::Power {
          (left.precedence() <= prec, right.precedence() < prec)
        } else {
          (left.precedence() < prec, right.precedence() <= prec)
        };
        write_operand(f, left, left_parens)?;
        write!(f, " {} ", op.symbol())?;
        write_operand(f, right, right_parens)
      }
      Expr::FunctionCall { function, args } => {
        write!(f, "{}(", function.name())?;
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{arg}")?;
        }
        f.write_str(")")
      }
    }
  }
}

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
  PrattParser::new()
    .op(
      Op::infix(Rule::Add, Assoc::Left)
        | Op::infix(Rule::Subtract, Assoc::Left),
    )
    .op(
      Op::infix(Rule::Multiply, Assoc::Left)
        | Op::infix(Rule::Divide, Assoc::Left)
        | Op::infix(Rule::Modulo, Assoc::Left),
    )
    .op(Op::prefix(Rule::Negate) | Op::prefix(Rule::UnaryPlus))
    .op(Op::infix(Rule::Power, Assoc::Right))
});

fn too_deep() -> FieldError {
  FieldError::InvalidExpression("expression nests too deeply".to_string())
}

/// Deepest run of unclosed parentheses in `text`.
fn paren_depth(text: &str) -> usize {
  let mut depth = 0usize;
  let mut deepest = 0;
  for c in text.chars() {
    match c {
      '(' => {
        depth += 1;
        deepest = deepest.max(depth);
      }
      ')' => depth = depth.saturating_sub(1),
      _ => {}
    }
  }
  deepest
}

fn is_operand(rule: Rule) -> bool {
  matches!(rule, Rule::Call | Rule::Number | Rule::Identifier | Rule::Expr)
}

/// `depth` is the number of tree levels already taken by the enclosing
/// expressions. Every operator of a flat `Expr` can add one more level.
fn build_expr(
  pairs: Pairs<'_, Rule>,
  depth: usize,
) -> Result<Expr, FieldError> {
  let operators = pairs
    .clone()
    .filter(|pair| !is_operand(pair.as_rule()))
    .count();
  let depth = depth + operators;
  if depth > MAX_DEPTH {
    return Err(too_deep());
  }

  PRATT_PARSER
    .map_primary(move |pair| build_primary(pair, depth))
    .map_prefix(|op, operand| {
      let op = match op.as_rule() {
        Rule::Negate => UnaryOperator::Minus,
        _ => UnaryOperator::Plus,
      };
      Ok(Expr::UnaryOp {
        op,
        operand: Box::new(operand?),
      })
    })
    .map_infix(|left, op, right| {
      let op = match op.as_rule() {
        Rule::Add => BinaryOperator::Plus,
        Rule::Subtract => BinaryOperator::Minus,
        Rule::Multiply => BinaryOperator::Times,
        Rule::Divide => BinaryOperator::Divide,
        Rule::Modulo => BinaryOperator::Modulo,
        _ => BinaryOperator::Power,
      };
      Ok(Expr::BinaryOp {
        op,
        left: Box::new(left?),
        right: Box::new(right?),
      })
    })
    .parse(pairs)
}

fn build_primary(
  pair: Pair<'_, Rule>,
  depth: usize,
) -> Result<Expr, FieldError> {
  match pair.as_rule() {
    Rule::Expr => build_expr(pair.into_inner(), depth),
    Rule::Number => pair.as_str().parse::<f64>().map(Expr::Number).map_err(
      |_| {
        FieldError::InvalidExpression(format!(
          "malformed number literal {}",
          pair.as_str()
        ))
      },
    ),
    Rule::Identifier => {
      let name = pair.as_str();
      if let Some(constant) = Constant::from_name(name) {
        Ok(Expr::Constant(constant))
      } else if Function::from_name(name).is_some() {
        Err(FieldError::InvalidExpression(format!(
          "{name} is a function and must be called with arguments"
        )))
      } else {
        Ok(Expr::Variable(name.to_string()))
      }
    }
    Rule::Call => {
      let mut inner = pair.into_inner();
      let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
      let args = inner
        .map(|arg| build_expr(arg.into_inner(), depth + 1))
        .collect::<Result<Vec<_>, _>>()?;
      let function = match Function::from_name(name) {
        Some(function) => function,
        None if Constant::from_name(name).is_some() => {
          return Err(FieldError::InvalidExpression(format!(
            "{name} is a constant and cannot be called"
          )));
        }
        None => return Err(FieldError::UnknownFunction(name.to_string())),
      };
      if !function.accepts(args.len()) {
        return Err(FieldError::Arity {
          function: function.name(),
          expected: function.arity_description(),
          got: args.len(),
        });
      }
      Ok(Expr::FunctionCall { function, args })
    }
    rule => Err(FieldError::InvalidExpression(format!(
      "unexpected {rule:?} in expression"
    ))),
  }
}

/// A parsed expression together with its free variables.
///
/// The variables are distinct and sorted lexicographically by name. Every
/// positional correlation in the engine (slot values, coordinate arrays,
/// compiled variable loads) relies on this order.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
  source: String,
  tree: Expr,
  variables: Vec<String>,
}

impl Expression {
  /// Fails with `InvalidExpression` rather than recursing without bound
  /// when the text nests deeper than `MAX_PARENS` parentheses or would
  /// build a tree deeper than `MAX_DEPTH`.
  pub fn parse(text: &str) -> Result<Self, FieldError> {
    if paren_depth(text) > MAX_PARENS {
      return Err(too_deep());
    }
    let mut pairs = ExpressionParser::parse_program(text)?;
    let expr_pair = pairs
      .next()
      .and_then(|program| program.into_inner().next())
      .ok_or_else(|| {
        FieldError::InvalidExpression("empty expression".to_string())
      })?;
    let tree = build_expr(expr_pair.into_inner(), 0)?;

    let mut names = BTreeSet::new();
    tree.collect_variables(&mut names);
    let variables: Vec<String> = names.into_iter().collect();

    tracing::debug!(
      expression = %tree,
      variables = ?variables,
      "parsed expression"
    );

    Ok(Expression {
      source: text.to_string(),
      tree,
      variables,
    })
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  pub fn tree(&self) -> &Expr {
    &self.tree
  }

  pub fn variables(&self) -> &[String] {
    &self.variables
  }

  /// Position of `name` in the sorted variable list.
  pub fn variable_index(&self, name: &str) -> Option<usize> {
    self
      .variables
      .binary_search_by(|v| v.as_str().cmp(name))
      .ok()
  }
}

impl FromStr for Expression {
  type Err = FieldError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Expression::parse(s)
  }
}

impl fmt::Display for Expression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.tree.fmt(f)
  }
}
