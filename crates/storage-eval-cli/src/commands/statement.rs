use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use storage_eval_core::storage::statements::{build_statement, StatementKind};
use storage_eval_core::storage::StorageProject;

use super::project::{load_project, ProjectArgs};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatementArg {
    RevenueTax,
    TotalCost,
    Profit,
    Summary,
}

impl From<StatementArg> for StatementKind {
    fn from(arg: StatementArg) -> Self {
        match arg {
            StatementArg::RevenueTax => StatementKind::RevenueTax,
            StatementArg::TotalCost => StatementKind::TotalCost,
            StatementArg::Profit => StatementKind::Profit,
            StatementArg::Summary => StatementKind::Summary,
        }
    }
}

/// Arguments for a financial statement
#[derive(Args)]
pub struct StatementArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Statement to produce
    #[arg(long, value_enum, default_value = "summary")]
    pub kind: StatementArg,
}

pub fn run_statement(args: StatementArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = load_project(&args.project)?;
    let mut project = StorageProject::new(&input)?;
    project.calculate()?;
    let table = project.table().ok_or("cash-flow table missing after calculate")?;
    let statement = build_statement(args.kind.into(), project.params(), table)?;
    Ok(json!({ "result": statement }))
}
