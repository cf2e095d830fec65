use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;

use storage_eval_core::storage::sensitivity::sensitivity_sweep;
use storage_eval_core::storage::statements::{build_statement, StatementKind};
use storage_eval_core::storage::{evaluate, ProjectInput, StorageProject};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_project(input_json: &str) -> NapiResult<ProjectInput> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Full evaluation envelope: table, metrics, assumptions and warnings.
#[napi]
pub fn evaluate_project(input_json: String) -> NapiResult<String> {
    let input = parse_project(&input_json)?;
    let output = storage_eval_core::evaluate_project(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn cash_flow_table(input_json: String) -> NapiResult<String> {
    let input = parse_project(&input_json)?;
    let table = evaluate(&input).map_err(to_napi_error)?;
    serde_json::to_string(&table).map_err(to_napi_error)
}

/// `kind` is one of revenue-tax, total-cost, profit, summary.
#[napi]
pub fn financial_statement(input_json: String, kind: String) -> NapiResult<String> {
    let kind: StatementKind = kind.parse().map_err(to_napi_error)?;
    let input = parse_project(&input_json)?;
    let mut project = StorageProject::new(&input).map_err(to_napi_error)?;
    project.calculate().map_err(to_napi_error)?;
    let table = project
        .table()
        .ok_or_else(|| to_napi_error("cash-flow table missing after calculate"))?;
    let statement = build_statement(kind, project.params(), table).map_err(to_napi_error)?;
    serde_json::to_string(&statement).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

/// `variation_range` is a decimal string (e.g. "0.1") to keep full precision
/// across the JS boundary.
#[napi]
pub fn sensitivity(
    input_json: String,
    factor: String,
    variation_range: String,
    steps: u32,
) -> NapiResult<String> {
    let input = parse_project(&input_json)?;
    let range: Decimal = variation_range.trim().parse().map_err(to_napi_error)?;
    let points =
        sensitivity_sweep(&input, &factor, range, steps as usize).map_err(to_napi_error)?;
    serde_json::to_string(&points).map_err(to_napi_error)
}
