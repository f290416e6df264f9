use anyhow::Context;
use clap::{Parser, Subcommand};
use heatfield::config::{
  DEFAULT_EXPRESSION, DEFAULT_RANGE_MAX, DEFAULT_RANGE_MIN, DENSITY,
  MAX_VARIABLES,
};
use heatfield::{
  EngineConfig, FieldRequest, fixed_variable_descriptors_with, free_variables,
  init_tracing, try_compute_field,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List the free variables of an expression
  Vars {
    /// Expression such as "x0-x1*x2+sin(2*pi*x3)"
    #[arg(default_value = DEFAULT_EXPRESSION)]
    expression: String,
  },
  /// Show which variable each fixed-value slot holds
  Slots {
    #[arg(default_value = DEFAULT_EXPRESSION)]
    expression: String,
    /// Variable on the x axis
    #[arg(long)]
    x: Option<String>,
    /// Variable on the y axis
    #[arg(long)]
    y: Option<String>,
    #[arg(long, default_value_t = MAX_VARIABLES)]
    max_slots: usize,
  },
  /// Evaluate an expression over the axis grid
  Field {
    #[arg(default_value = DEFAULT_EXPRESSION)]
    expression: String,
    #[arg(long)]
    x: Option<String>,
    #[arg(long)]
    y: Option<String>,
    /// Lower bound of the color scale
    #[arg(
      long,
      default_value_t = DEFAULT_RANGE_MIN,
      allow_negative_numbers = true
    )]
    min: f64,
    /// Upper bound of the color scale
    #[arg(
      long,
      default_value_t = DEFAULT_RANGE_MAX,
      allow_negative_numbers = true
    )]
    max: f64,
    /// Value of the next non-axis variable, in sorted order (repeatable).
    /// Every slot defaults to the slider's starting value.
    #[arg(long = "fixed", allow_negative_numbers = true)]
    fixed: Vec<f64>,
    /// Name the fixed values were chosen for (repeatable)
    #[arg(long = "label")]
    labels: Vec<String>,
    /// Samples per axis
    #[arg(long, default_value_t = DENSITY)]
    density: usize,
    /// Fail with the error instead of printing an empty field
    #[arg(long)]
    strict: bool,
  },
}

fn main() -> anyhow::Result<()> {
  init_tracing();
  let cli = Cli::parse();

  match cli.command {
    Commands::Vars { expression } => {
      println!("{}", serde_json::to_string(&free_variables(&expression))?);
    }
    Commands::Slots {
      expression,
      x,
      y,
      max_slots,
    } => {
      let config = EngineConfig {
        max_slots,
        ..EngineConfig::default()
      };
      let slots: Vec<serde_json::Value> = fixed_variable_descriptors_with(
        &expression,
        x.as_deref(),
        y.as_deref(),
        &config,
      )
      .iter()
      .map(|slot| slot.to_json())
      .collect();
      let output = serde_json::json!({
        "slots": slots,
        "slider": config.slider().to_json(),
      });
      println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Commands::Field {
      expression,
      x,
      y,
      min,
      max,
      fixed,
      labels,
      density,
      strict,
    } => {
      anyhow::ensure!(density >= 2, "density must be at least 2");
      let config = EngineConfig {
        density,
        ..EngineConfig::default()
      };
      let request = FieldRequest {
        expression,
        x_axis: x,
        y_axis: y,
        range_min: min,
        range_max: max,
        fixed_values: if fixed.is_empty() {
          vec![config.slider().value; config.max_slots]
        } else {
          fixed
        },
        slot_labels: if labels.is_empty() { None } else { Some(labels) },
      };
      let field = if strict {
        try_compute_field(&request, &config)
          .context("could not compute field")?
      } else {
        try_compute_field(&request, &config).unwrap_or_else(|e| {
          eprintln!("Error: {e}");
          None
        })
      };
      let output = match field {
        Some(field) => field.to_json(),
        None => serde_json::json!({}),
      };
      println!("{}", serde_json::to_string(&output)?);
    }
  }

  Ok(())
}
