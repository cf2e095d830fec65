use clap::Args;
use rust_decimal::Decimal;

use storage_eval_core::storage::ProjectInput;

use crate::input;

/// Where a project definition comes from. A JSON file or piped stdin wins;
/// otherwise the individual flags are used.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Path to a JSON project definition
    #[arg(long)]
    pub input: Option<String>,

    /// Installed power (MW)
    #[arg(long)]
    pub power_mw: Option<Decimal>,

    /// Rated energy capacity (MWh)
    #[arg(long)]
    pub capacity_mwh: Option<Decimal>,

    /// Static investment (10k CNY)
    #[arg(long)]
    pub static_invest: Option<Decimal>,

    /// Round-trip efficiency (0-1)
    #[arg(long)]
    pub efficiency: Option<Decimal>,

    /// Revenue mode: arbitrage, capacity, ancillary or hybrid
    #[arg(long)]
    pub mode: Option<String>,

    /// Full cycles per year
    #[arg(long)]
    pub cycles: Option<Decimal>,

    /// Charging price (CNY/kWh)
    #[arg(long)]
    pub charge_price: Option<Decimal>,

    /// Discharging price (CNY/kWh)
    #[arg(long)]
    pub discharge_price: Option<Decimal>,

    /// Battery life in years
    #[arg(long)]
    pub battery_life: Option<Decimal>,
}

pub fn load_project(args: &ProjectArgs) -> Result<ProjectInput, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_json(path);
    }
    if let Some(project) = input::stdin::read_stdin::<ProjectInput>()? {
        return Ok(project);
    }

    if args.power_mw.is_none() && args.capacity_mwh.is_none() && args.static_invest.is_none() {
        return Err(
            "--input <file.json>, piped stdin or --power-mw/--capacity-mwh/--static-invest required"
                .into(),
        );
    }

    Ok(ProjectInput {
        power_mw: args.power_mw,
        capacity_mwh: args.capacity_mwh,
        static_invest: args.static_invest,
        efficiency: args.efficiency,
        revenue_mode: args.mode.clone(),
        cycles_per_year: args.cycles,
        charge_price: args.charge_price,
        discharge_price: args.discharge_price,
        battery_life: args.battery_life,
        ..Default::default()
    })
}
