use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::depreciation::DepreciationSchedule;
use super::params::ParameterSet;
use super::policy;
use super::revenue::{annual_revenue, RevenueBreakdown};
use super::tax::{self, TaxEngine, YearAssessment};
use crate::checked;
use crate::error::StorageEvalError;
use crate::types::{Money, Rate};
use crate::StorageEvalResult;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearPhase {
    Construction,
    Operating,
}

/// One row of the cash-flow table. `year` is 1-based over the whole project
/// life; construction occupies the first row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    pub year: u32,
    pub phase: YearPhase,
    /// 1-based operating year, absent during construction
    pub operating_year: Option<u32>,
    pub charge_cost: Money,
    pub discharge_revenue: Money,
    pub lease_revenue: Money,
    pub ancillary_revenue: Money,
    pub revenue_including_tax: Money,
    pub revenue_excluding_tax: Money,
    pub vat_rate: Rate,
    pub output_vat: Money,
    pub om_cost: Money,
    pub vat_payable: Money,
    /// Deductible input VAT left after this year's offset
    pub vat_credit_balance: Money,
    pub surtax: Money,
    pub battery_replacement: Money,
    pub battery_depreciation: Money,
    pub non_battery_depreciation: Money,
    pub depreciation: Money,
    pub pre_tax_profit: Money,
    pub income_tax_rate: Rate,
    pub income_tax: Money,
    pub net_cash_flow_before_tax: Money,
    pub net_cash_flow_after_tax: Money,
}

impl YearRecord {
    fn construction(year: u32, net_cash_flow: Money, vat_credit_balance: Money) -> Self {
        Self {
            year,
            phase: YearPhase::Construction,
            operating_year: None,
            charge_cost: Decimal::ZERO,
            discharge_revenue: Decimal::ZERO,
            lease_revenue: Decimal::ZERO,
            ancillary_revenue: Decimal::ZERO,
            revenue_including_tax: Decimal::ZERO,
            revenue_excluding_tax: Decimal::ZERO,
            vat_rate: Decimal::ZERO,
            output_vat: Decimal::ZERO,
            om_cost: Decimal::ZERO,
            vat_payable: Decimal::ZERO,
            vat_credit_balance,
            surtax: Decimal::ZERO,
            battery_replacement: Decimal::ZERO,
            battery_depreciation: Decimal::ZERO,
            non_battery_depreciation: Decimal::ZERO,
            depreciation: Decimal::ZERO,
            pre_tax_profit: Decimal::ZERO,
            income_tax_rate: Decimal::ZERO,
            income_tax: Decimal::ZERO,
            net_cash_flow_before_tax: net_cash_flow,
            net_cash_flow_after_tax: net_cash_flow,
        }
    }

    pub fn is_operating(&self) -> bool {
        self.phase == YearPhase::Operating
    }

    pub fn get(&self, field: YearField) -> Decimal {
        match field {
            YearField::ChargeCost => self.charge_cost,
            YearField::DischargeRevenue => self.discharge_revenue,
            YearField::LeaseRevenue => self.lease_revenue,
            YearField::AncillaryRevenue => self.ancillary_revenue,
            YearField::RevenueIncludingTax => self.revenue_including_tax,
            YearField::RevenueExcludingTax => self.revenue_excluding_tax,
            YearField::VatRate => self.vat_rate,
            YearField::OutputVat => self.output_vat,
            YearField::OmCost => self.om_cost,
            YearField::VatPayable => self.vat_payable,
            YearField::VatCreditBalance => self.vat_credit_balance,
            YearField::Surtax => self.surtax,
            YearField::BatteryReplacement => self.battery_replacement,
            YearField::BatteryDepreciation => self.battery_depreciation,
            YearField::NonBatteryDepreciation => self.non_battery_depreciation,
            YearField::Depreciation => self.depreciation,
            YearField::PreTaxProfit => self.pre_tax_profit,
            YearField::IncomeTaxRate => self.income_tax_rate,
            YearField::IncomeTax => self.income_tax,
            YearField::NetCashFlowBeforeTax => self.net_cash_flow_before_tax,
            YearField::NetCashFlowAfterTax => self.net_cash_flow_after_tax,
        }
    }
}

/// Numeric column of the table, addressable by its snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearField {
    ChargeCost,
    DischargeRevenue,
    LeaseRevenue,
    AncillaryRevenue,
    RevenueIncludingTax,
    RevenueExcludingTax,
    VatRate,
    OutputVat,
    OmCost,
    VatPayable,
    VatCreditBalance,
    Surtax,
    BatteryReplacement,
    BatteryDepreciation,
    NonBatteryDepreciation,
    Depreciation,
    PreTaxProfit,
    IncomeTaxRate,
    IncomeTax,
    NetCashFlowBeforeTax,
    NetCashFlowAfterTax,
}

impl YearField {
    pub const ALL: [YearField; 21] = [
        YearField::ChargeCost,
        YearField::DischargeRevenue,
        YearField::LeaseRevenue,
        YearField::AncillaryRevenue,
        YearField::RevenueIncludingTax,
        YearField::RevenueExcludingTax,
        YearField::VatRate,
        YearField::OutputVat,
        YearField::OmCost,
        YearField::VatPayable,
        YearField::VatCreditBalance,
        YearField::Surtax,
        YearField::BatteryReplacement,
        YearField::BatteryDepreciation,
        YearField::NonBatteryDepreciation,
        YearField::Depreciation,
        YearField::PreTaxProfit,
        YearField::IncomeTaxRate,
        YearField::IncomeTax,
        YearField::NetCashFlowBeforeTax,
        YearField::NetCashFlowAfterTax,
    ];

    pub fn name(self) -> &'static str {
        match self {
            YearField::ChargeCost => "charge_cost",
            YearField::DischargeRevenue => "discharge_revenue",
            YearField::LeaseRevenue => "lease_revenue",
            YearField::AncillaryRevenue => "ancillary_revenue",
            YearField::RevenueIncludingTax => "revenue_including_tax",
            YearField::RevenueExcludingTax => "revenue_excluding_tax",
            YearField::VatRate => "vat_rate",
            YearField::OutputVat => "output_vat",
            YearField::OmCost => "om_cost",
            YearField::VatPayable => "vat_payable",
            YearField::VatCreditBalance => "vat_credit_balance",
            YearField::Surtax => "surtax",
            YearField::BatteryReplacement => "battery_replacement",
            YearField::BatteryDepreciation => "battery_depreciation",
            YearField::NonBatteryDepreciation => "non_battery_depreciation",
            YearField::Depreciation => "depreciation",
            YearField::PreTaxProfit => "pre_tax_profit",
            YearField::IncomeTaxRate => "income_tax_rate",
            YearField::IncomeTax => "income_tax",
            YearField::NetCashFlowBeforeTax => "net_cash_flow_before_tax",
            YearField::NetCashFlowAfterTax => "net_cash_flow_after_tax",
        }
    }
}

impl fmt::Display for YearField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for YearField {
    type Err = StorageEvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        YearField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == wanted)
            .ok_or_else(|| StorageEvalError::InvalidInput {
                field: "field".into(),
                reason: format!("unknown cash-flow column '{wanted}'"),
            })
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// The finished year-by-year table plus the investment figures fixed at the
/// start of the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowTable {
    pub construction_interest: Money,
    pub working_capital: Money,
    pub total_investment: Money,
    pub initial_deductible_vat: Money,
    pub fixed_asset_value: Money,
    pub residual_value: Money,
    pub records: Vec<YearRecord>,
}

impl CashFlowTable {
    /// Row for a 1-based project year.
    pub fn row(&self, year: u32) -> Option<&YearRecord> {
        let index = year.checked_sub(1)? as usize;
        self.records.get(index)
    }

    pub fn column(&self, field: YearField) -> Vec<Decimal> {
        self.records.iter().map(|r| r.get(field)).collect()
    }

    pub fn operating_records(&self) -> impl Iterator<Item = &YearRecord> {
        self.records.iter().filter(|r| r.is_operating())
    }

    pub fn pre_tax_cash_flows(&self) -> Vec<Money> {
        self.column(YearField::NetCashFlowBeforeTax)
    }

    pub fn after_tax_cash_flows(&self) -> Vec<Money> {
        self.column(YearField::NetCashFlowAfterTax)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the full-life cash-flow table. Either every row is produced or the
/// build fails as a whole with a `Calculation` error naming the stage.
pub fn build_cash_flow_table(params: &ParameterSet) -> StorageEvalResult<CashFlowTable> {
    let static_invest = params.static_invest();

    // ── Investment figures ───────────────────────────────────────────
    let construction_interest = tax::construction_interest(params)
        .map_err(|e| StorageEvalError::calculation("construction interest", e))?;
    let working_capital = static_invest * policy::WORKING_CAPITAL_RATIO;
    let total_investment = checked::sum(
        [static_invest, construction_interest, working_capital],
        "total investment",
    )
    .map_err(|e| StorageEvalError::calculation("investment figures", e))?;
    let initial_deductible_vat = tax::initial_deductible_vat(params);
    let fixed_asset_value = checked::add(static_invest, construction_interest, "fixed assets")
        .and_then(|gross| checked::sub(gross, initial_deductible_vat, "fixed assets"))
        .map_err(|e| StorageEvalError::calculation("investment figures", e))?;
    let residual_value = static_invest * policy::RESIDUAL_RATIO;

    let schedule = DepreciationSchedule::new(
        fixed_asset_value,
        params.battery_asset_ratio(),
        params.battery_life(),
    )
    .map_err(|e| StorageEvalError::calculation("depreciation schedule", e))?;

    let mut engine = TaxEngine::new(params, schedule, initial_deductible_vat)
        .map_err(|e| StorageEvalError::calculation("operating cost", e))?;
    let mut records: Vec<YearRecord> = Vec::with_capacity(policy::TOTAL_YEARS as usize);

    // ── Year loop ────────────────────────────────────────────────────
    for year in 1..=policy::TOTAL_YEARS {
        if year <= policy::CONSTRUCTION_YEARS {
            let outlay = -checked::add(static_invest, working_capital, "construction outlay")
                .map_err(|e| StorageEvalError::calculation(format!("cash flow for year {year}"), e))?;
            records.push(YearRecord::construction(
                year,
                outlay,
                engine.credit_balance(),
            ));
            continue;
        }

        let operating_year = year - policy::CONSTRUCTION_YEARS;
        let revenue = annual_revenue(params, operating_year)
            .map_err(|e| StorageEvalError::calculation(format!("revenue for year {year}"), e))?;
        let assessed = engine
            .assess(operating_year, &revenue)
            .map_err(|e| StorageEvalError::calculation(format!("tax for year {year}"), e))?;

        let (net_cash_flow_before_tax, net_cash_flow_after_tax) =
            net_cash_flows(&revenue, &assessed, operating_year, residual_value, working_capital)
                .map_err(|e| StorageEvalError::calculation(format!("cash flow for year {year}"), e))?;

        records.push(YearRecord {
            year,
            phase: YearPhase::Operating,
            operating_year: Some(operating_year),
            charge_cost: revenue.charge_cost,
            discharge_revenue: revenue.discharge_revenue,
            lease_revenue: revenue.lease_revenue,
            ancillary_revenue: revenue.ancillary_revenue,
            revenue_including_tax: assessed.revenue_including_tax,
            revenue_excluding_tax: assessed.revenue_excluding_tax,
            vat_rate: assessed.vat_rate,
            output_vat: assessed.output_vat,
            om_cost: assessed.om_cost,
            vat_payable: assessed.vat_payable,
            vat_credit_balance: assessed.vat_credit_balance,
            surtax: assessed.surtax,
            battery_replacement: assessed.battery_replacement,
            battery_depreciation: assessed.battery_depreciation,
            non_battery_depreciation: assessed.non_battery_depreciation,
            depreciation: assessed.depreciation,
            pre_tax_profit: assessed.pre_tax_profit,
            income_tax_rate: assessed.income_tax_rate,
            income_tax: assessed.income_tax,
            net_cash_flow_before_tax,
            net_cash_flow_after_tax,
        });
    }

    info!(
        mode = params.revenue_mode().name(),
        years = records.len(),
        total_investment = %total_investment,
        "cash-flow table built"
    );

    Ok(CashFlowTable {
        construction_interest,
        working_capital,
        total_investment,
        initial_deductible_vat,
        fixed_asset_value,
        residual_value,
        records,
    })
}

/// (before-tax, after-tax) net cash flow for one operating year. The final
/// year also recovers the residual value and working capital.
fn net_cash_flows(
    revenue: &RevenueBreakdown,
    assessed: &YearAssessment,
    operating_year: u32,
    residual_value: Money,
    working_capital: Money,
) -> StorageEvalResult<(Money, Money)> {
    let mut inflow = revenue.cash_inflow()?;
    if operating_year == policy::OPERATING_YEARS {
        inflow = checked::sum([inflow, residual_value, working_capital], "terminal inflow")?;
    }
    let outflow = checked::sum(
        [
            revenue.charge_cost,
            assessed.om_cost,
            assessed.surtax,
            assessed.battery_replacement,
        ],
        "operating outflow",
    )?;
    let before_tax = checked::sub(inflow, outflow, "net cash flow")?;
    let after_tax = checked::sub(before_tax, assessed.income_tax, "after-tax cash flow")?;
    Ok((before_tax, after_tax))
}
