//! Financial statements derived from a finished cash-flow table: revenue and
//! tax, total cost, profit and profit distribution, and the summary of
//! headline indicators. Each row covers one operating year.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::cash_flow::{CashFlowTable, YearRecord};
use super::metrics::extract_metrics;
use super::params::ParameterSet;
use super::policy;
use crate::checked;
use crate::error::StorageEvalError;
use crate::types::{MegaWattHours, MegaWatts, Money, Percent, Years};
use crate::StorageEvalResult;

// ---------------------------------------------------------------------------
// Statement rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueTaxRow {
    pub year: String,
    pub charged_energy_mwh: MegaWattHours,
    pub discharged_energy_mwh: MegaWattHours,
    pub revenue_including_tax: Money,
    pub revenue_excluding_tax: Money,
    pub output_vat: Money,
    pub vat_paid: Money,
    pub surtax: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalCostRow {
    pub year: String,
    pub om_cost: Money,
    pub battery_replacement: Money,
    pub depreciation: Money,
    pub amortization: Money,
    pub financial_expense: Money,
    pub total_cost: Money,
    pub operating_cost: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitRow {
    pub year: String,
    pub revenue_excluding_tax: Money,
    pub charge_cost: Money,
    pub surtax: Money,
    pub total_cost: Money,
    pub pre_tax_profit: Money,
    pub income_tax: Money,
    pub net_profit: Money,
    pub cumulative_net_profit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub total_investment: Money,
    pub construction_interest: Money,
    pub pre_tax_irr_pct: Percent,
    pub post_tax_irr_pct: Percent,
    pub payback_years: Years,
    /// Operating profit over the whole life as a share of total investment
    pub roi_pct: Percent,
    pub average_annual_profit: Money,
    pub cumulative_profit: Money,
    pub power_mw: MegaWatts,
    pub capacity_mwh: MegaWattHours,
    /// Static investment per rated watt-hour, CNY/Wh
    pub unit_cost_cny_per_wh: Decimal,
    pub efficiency_pct: Percent,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatementKind {
    RevenueTax,
    TotalCost,
    Profit,
    Summary,
}

impl FromStr for StatementKind {
    type Err = StorageEvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "revenue-tax" => Ok(StatementKind::RevenueTax),
            "total-cost" => Ok(StatementKind::TotalCost),
            "profit" => Ok(StatementKind::Profit),
            "summary" => Ok(StatementKind::Summary),
            other => Err(StorageEvalError::InvalidInput {
                field: "kind".into(),
                reason: format!(
                    "unknown statement '{other}' (expected revenue-tax, total-cost, profit or summary)"
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Statement {
    RevenueTax(Vec<RevenueTaxRow>),
    TotalCost(Vec<TotalCostRow>),
    Profit(Vec<ProfitRow>),
    Summary(FinancialSummary),
}

pub fn build_statement(
    kind: StatementKind,
    params: &ParameterSet,
    table: &CashFlowTable,
) -> StorageEvalResult<Statement> {
    Ok(match kind {
        StatementKind::RevenueTax => Statement::RevenueTax(revenue_tax_statement(params, table)),
        StatementKind::TotalCost => Statement::TotalCost(total_cost_statement(table)?),
        StatementKind::Profit => Statement::Profit(profit_statement(table)?),
        StatementKind::Summary => Statement::Summary(financial_summary(params, table)?),
    })
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn year_label(record: &YearRecord) -> String {
    format!("Year {}", record.operating_year.unwrap_or_default())
}

fn total_cost(record: &YearRecord) -> StorageEvalResult<Money> {
    checked::sum(
        [record.om_cost, record.battery_replacement, record.depreciation],
        "total cost",
    )
}

pub fn revenue_tax_statement(params: &ParameterSet, table: &CashFlowTable) -> Vec<RevenueTaxRow> {
    let charged = params.capacity_mwh();
    let discharged = params.capacity_mwh() * params.efficiency();
    table
        .operating_records()
        .map(|r| RevenueTaxRow {
            year: year_label(r),
            charged_energy_mwh: charged,
            discharged_energy_mwh: discharged,
            revenue_including_tax: r.revenue_including_tax,
            revenue_excluding_tax: r.revenue_excluding_tax,
            output_vat: r.output_vat,
            vat_paid: r.vat_payable,
            surtax: r.surtax,
        })
        .collect()
}

pub fn total_cost_statement(table: &CashFlowTable) -> StorageEvalResult<Vec<TotalCostRow>> {
    table
        .operating_records()
        .map(|r| {
            Ok(TotalCostRow {
                year: year_label(r),
                om_cost: r.om_cost,
                battery_replacement: r.battery_replacement,
                depreciation: r.depreciation,
                amortization: Decimal::ZERO,
                financial_expense: Decimal::ZERO,
                total_cost: total_cost(r)?,
                operating_cost: checked::add(r.om_cost, r.battery_replacement, "operating cost")?,
            })
        })
        .collect()
}

/// Profit rows use the table's pre-tax profit, so a capitalized replacement
/// stays out of profit here too.
pub fn profit_statement(table: &CashFlowTable) -> StorageEvalResult<Vec<ProfitRow>> {
    let mut cumulative = Decimal::ZERO;
    table
        .operating_records()
        .map(|r| {
            let net_profit = checked::sub(r.pre_tax_profit, r.income_tax, "net profit")?;
            cumulative = checked::add(cumulative, net_profit, "cumulative net profit")?;
            Ok(ProfitRow {
                year: year_label(r),
                revenue_excluding_tax: r.revenue_excluding_tax,
                charge_cost: r.charge_cost,
                surtax: r.surtax,
                total_cost: total_cost(r)?,
                pre_tax_profit: r.pre_tax_profit,
                income_tax: r.income_tax,
                net_profit,
                cumulative_net_profit: cumulative,
            })
        })
        .collect()
}

pub fn financial_summary(
    params: &ParameterSet,
    table: &CashFlowTable,
) -> StorageEvalResult<FinancialSummary> {
    let metrics = extract_metrics(table)?;

    let yearly_profit = table
        .operating_records()
        .map(|r| {
            let costs = checked::sum([r.charge_cost, r.om_cost, r.surtax], "operating costs")?;
            checked::sub(r.revenue_excluding_tax, costs, "operating profit")
        })
        .collect::<StorageEvalResult<Vec<Money>>>()?;
    let operating_profit = checked::sum(yearly_profit, "lifetime operating profit")?;

    let roi_pct = checked::div(operating_profit, table.total_investment, "return on investment")
        .and_then(|ratio| checked::mul(ratio, dec!(100), "return on investment"))?;

    // 10k CNY per unit over MWh → CNY per Wh
    let unit_cost = checked::div(
        checked::mul(params.static_invest(), policy::CNY_PER_UNIT, "unit cost")?,
        checked::product(
            [params.capacity_mwh(), policy::KWH_PER_MWH, dec!(1000)],
            "unit cost",
        )?,
        "unit cost",
    )?;

    Ok(FinancialSummary {
        total_investment: metrics.total_investment,
        construction_interest: metrics.construction_interest,
        pre_tax_irr_pct: metrics.pre_tax_irr_pct,
        post_tax_irr_pct: metrics.post_tax_irr_pct,
        payback_years: metrics.payback_years,
        roi_pct: roi_pct.round_dp(2),
        average_annual_profit: (operating_profit / Decimal::from(policy::OPERATING_YEARS))
            .round_dp(2),
        cumulative_profit: operating_profit.round_dp(2),
        power_mw: params.power_mw(),
        capacity_mwh: params.capacity_mwh(),
        unit_cost_cny_per_wh: unit_cost.round_dp(2),
        efficiency_pct: (params.efficiency() * dec!(100)).round_dp(1),
    })
}
