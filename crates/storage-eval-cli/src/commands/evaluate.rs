use clap::Args;
use serde_json::{json, Map, Value};

use storage_eval_core::storage::{evaluate, evaluate_project, StorageProject, YearField};

use super::project::{load_project, ProjectArgs};

/// Arguments for a full evaluation
#[derive(Args)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let project = load_project(&args.project)?;
    let result = evaluate_project(&project)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for headline metrics only
#[derive(Args)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn run_metrics(args: MetricsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = load_project(&args.project)?;
    let mut project = StorageProject::new(&input)?;
    project.calculate()?;
    let metrics = project.metrics()?;
    Ok(json!({ "result": metrics }))
}

/// Arguments for the year-by-year table
#[derive(Args)]
pub struct TableArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Columns to include (comma-separated, e.g. "pre_tax_profit,income_tax")
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,
}

pub fn run_table(args: TableArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let fields: Vec<YearField> = match args.fields {
        Some(names) => names
            .iter()
            .map(|n| n.parse::<YearField>())
            .collect::<Result<_, _>>()?,
        None => YearField::ALL.to_vec(),
    };

    let input = load_project(&args.project)?;
    let table = evaluate(&input)?;

    let rows: Vec<Value> = table
        .records
        .iter()
        .map(|record| {
            let mut row = Map::new();
            row.insert("year".into(), json!(record.year));
            for field in &fields {
                row.insert(field.name().into(), json!(record.get(*field)));
            }
            Value::Object(row)
        })
        .collect();

    Ok(Value::Array(rows))
}
