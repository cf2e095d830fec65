use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cash_flow::{build_cash_flow_table, CashFlowTable};
use super::metrics::{extract_metrics, payback_period, Metrics, REPORTED_DP};
use super::params::{ParameterSet, ProjectInput, ReplacementTreatment};
use crate::error::StorageEvalError;
use crate::types::{with_metadata, ComputationOutput, Years};
use crate::StorageEvalResult;

/// A project under evaluation: validated parameters plus the most recently
/// built table.
#[derive(Debug, Clone)]
pub struct StorageProject {
    params: ParameterSet,
    table: Option<CashFlowTable>,
}

impl StorageProject {
    pub fn new(input: &ProjectInput) -> StorageEvalResult<Self> {
        Ok(Self {
            params: ParameterSet::from_input(input)?,
            table: None,
        })
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Build the table, replacing any previous one.
    pub fn calculate(&mut self) -> StorageEvalResult<&CashFlowTable> {
        let table = build_cash_flow_table(&self.params)?;
        Ok(self.table.insert(table))
    }

    pub fn table(&self) -> Option<&CashFlowTable> {
        self.table.as_ref()
    }

    pub fn metrics(&self) -> StorageEvalResult<Metrics> {
        let table = self.table.as_ref().ok_or(StorageEvalError::TableNotBuilt)?;
        extract_metrics(table)
    }

    /// After-tax payback in years, rounded like the other metrics. Defined
    /// even when the IRRs are not; 99.9 if never recovered.
    pub fn payback_period(&self) -> StorageEvalResult<Years> {
        let table = self.table.as_ref().ok_or(StorageEvalError::TableNotBuilt)?;
        let years = payback_period(&table.after_tax_cash_flows())
            .map_err(|e| StorageEvalError::calculation("payback period", e))?;
        Ok(years.round_dp(REPORTED_DP))
    }
}

/// Validate `input` and build its cash-flow table.
pub fn evaluate(input: &ProjectInput) -> StorageEvalResult<CashFlowTable> {
    let params = ParameterSet::from_input(input)?;
    build_cash_flow_table(&params)
}

/// Table and metrics for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEvaluation {
    pub revenue_mode: String,
    pub battery_life: u32,
    pub metrics: Metrics,
    pub table: CashFlowTable,
}

/// Full evaluation wrapped in the standard output envelope.
pub fn evaluate_project(
    input: &ProjectInput,
) -> StorageEvalResult<ComputationOutput<ProjectEvaluation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut project = StorageProject::new(input)?;
    project.calculate()?;
    let metrics = project.metrics()?;

    if !metrics.payback_recovered() {
        warnings.push("Cumulative after-tax cash flow is never recovered".into());
    }
    if metrics.post_tax_irr_pct < Decimal::ZERO {
        warnings.push(format!(
            "Negative post-tax IRR ({}%): project destroys value",
            metrics.post_tax_irr_pct
        ));
    }
    if project.params().replacement_treatment() == ReplacementTreatment::Capitalize {
        warnings.push(
            "Battery replacement capitalized: excluded from profit without amortization".into(),
        );
    }

    let revenue_mode = project.params().revenue_mode().name().to_string();
    let battery_life = project.params().battery_life();
    let evaluation = ProjectEvaluation {
        revenue_mode,
        battery_life,
        metrics,
        table: project.table.take().ok_or(StorageEvalError::TableNotBuilt)?,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Electrochemical storage full-life financial evaluation (DL/T 2919-2025)",
        &serde_json::json!({
            "input": input,
            "operating_years": super::policy::OPERATING_YEARS,
            "income_tax_holiday": "3 years exempt, 3 years at half rate",
            "vat_credit": "initial input VAT carried forward against output VAT",
        }),
        warnings,
        elapsed,
        evaluation,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> ProjectInput {
        ProjectInput {
            power_mw: Some(dec!(100)),
            capacity_mwh: Some(dec!(200)),
            static_invest: Some(dec!(30000)),
            ..Default::default()
        }
    }

    #[test]
    fn test_metrics_before_calculate_fails() {
        let project = StorageProject::new(&input()).unwrap();
        assert!(project.table().is_none());
        assert!(matches!(
            project.metrics(),
            Err(StorageEvalError::TableNotBuilt)
        ));
    }

    #[test]
    fn test_calculate_replaces_table() {
        let mut project = StorageProject::new(&input()).unwrap();
        let first = project.calculate().unwrap().clone();
        let second = project.calculate().unwrap().clone();
        assert_eq!(first, second);
        assert!(project.metrics().is_ok());
    }

    #[test]
    fn test_payback_without_irr() {
        let mut project = StorageProject::new(&ProjectInput {
            charge_price: Some(dec!(0.9)),
            discharge_price: Some(dec!(0.3)),
            ..input()
        })
        .unwrap();
        assert!(matches!(
            project.payback_period(),
            Err(StorageEvalError::TableNotBuilt)
        ));
        project.calculate().unwrap();
        assert!(project.metrics().is_err());
        assert_eq!(project.payback_period().unwrap(), dec!(99.9));
    }

    #[test]
    fn test_evaluate_project_envelope() {
        let out = evaluate_project(&input()).unwrap();
        assert_eq!(out.result.table.records.len(), 21);
        assert_eq!(out.result.revenue_mode, "arbitrage");
        assert_eq!(out.result.battery_life, 10);
        assert!(out.methodology.contains("DL/T 2919"));
        assert_eq!(out.assumptions["operating_years"], 20);
    }

    #[test]
    fn test_invalid_input_propagates() {
        let err = evaluate(&ProjectInput::default()).unwrap_err();
        assert_eq!(err.issues().len(), 3);
    }
}
