use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use storage_eval_core::storage::sensitivity::sensitivity_sweep;

use super::project::{load_project, ProjectArgs};

/// Arguments for a single-factor sensitivity sweep
#[derive(Args)]
pub struct SensitivityArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Input key to vary (e.g. discharge_price, static_invest)
    #[arg(long)]
    pub factor: String,

    /// Maximum relative variation either side of the base value
    #[arg(long, default_value = "0.1")]
    pub range: Decimal,

    /// Number of evenly spaced steps
    #[arg(long, default_value_t = 5)]
    pub steps: usize,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = load_project(&args.project)?;
    let points = sensitivity_sweep(&input, &args.factor, args.range, args.steps)?;
    let failed = points.iter().filter(|p| p.pre_tax_irr.is_none()).count();
    if failed > 0 {
        tracing::warn!(failed, "some sensitivity steps could not be evaluated");
    }
    Ok(json!({
        "factor": args.factor,
        "variation_range": args.range,
        "steps": args.steps,
        "results": points,
    }))
}
