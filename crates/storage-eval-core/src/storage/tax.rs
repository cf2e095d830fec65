use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::depreciation::{DepreciationCharge, DepreciationSchedule};
use super::params::{ParameterSet, ReplacementTreatment};
use super::policy;
use super::revenue::RevenueBreakdown;
use crate::checked;
use crate::error::StorageEvalError;
use crate::types::{Money, Rate};
use crate::StorageEvalResult;

// ---------------------------------------------------------------------------
// VAT credit pool
// ---------------------------------------------------------------------------

/// Deductible input VAT carried forward against output VAT. The balance only
/// ever decreases and never goes below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatCreditPool {
    balance: Money,
}

impl VatCreditPool {
    pub fn new(initial: Money) -> Self {
        Self {
            balance: initial.max(Decimal::ZERO),
        }
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Offset `output_vat` against the pool and return the VAT still payable.
    pub fn settle(&mut self, output_vat: Money) -> Money {
        let offset = self.balance.min(output_vat.max(Decimal::ZERO));
        self.balance -= offset;
        (output_vat - offset).max(Decimal::ZERO)
    }
}

/// Input VAT embedded in the static investment, unless the caller supplied it.
pub fn initial_deductible_vat(params: &ParameterSet) -> Money {
    params.deductible_tax_override().unwrap_or_else(|| {
        params.static_invest() / (Decimal::ONE + policy::VAT_ELECTRICITY) * policy::VAT_ELECTRICITY
    })
}

/// (revenue excluding VAT, output VAT) for VAT-inclusive revenue.
pub fn split_vat(revenue_including_tax: Money, vat_rate: Rate) -> (Money, Money) {
    let excluding = revenue_including_tax / (Decimal::ONE + vat_rate);
    (excluding, revenue_including_tax - excluding)
}

// ---------------------------------------------------------------------------
// Stand-alone rules
// ---------------------------------------------------------------------------

/// Interest during construction, with the loan drawn evenly through the year.
pub fn construction_interest(params: &ParameterSet) -> StorageEvalResult<Money> {
    checked::product(
        [
            params.loan_principal(),
            policy::CONSTRUCTION_DRAW_FACTOR,
            params.loan_rate(),
        ],
        "construction interest",
    )
}

/// Annual O&M: the larger of the power-based and energy-based fee.
pub fn om_cost(params: &ParameterSet) -> StorageEvalResult<Money> {
    let by_power = checked::product(
        [params.power_mw(), policy::KW_PER_MW, policy::OM_FEE_PER_KW],
        "power-based O&M",
    )? / policy::CNY_PER_UNIT;

    let cycles = params
        .revenue_mode()
        .cycles_per_year()
        .unwrap_or(policy::DEFAULT_CYCLES_PER_YEAR);
    let by_energy = checked::product(
        [
            params.capacity_mwh(),
            Decimal::from(cycles),
            policy::KWH_PER_MWH,
            policy::OM_FEE_PER_KWH,
        ],
        "energy-based O&M",
    )? / policy::CNY_PER_UNIT;

    Ok(by_power.max(by_energy))
}

/// Batteries are swapped at the end of each life, except when the life ends
/// with the operating period: the plant is retired then, not re-equipped.
pub fn replacement_due(operating_year: u32, battery_life: u32) -> bool {
    battery_life > 0
        && operating_year % battery_life == 0
        && operating_year < policy::OPERATING_YEARS
}

/// (rate, tax) for a year's pre-tax profit. Losses give zero tax.
pub fn income_tax(pre_tax_profit: Money, operating_year: u32) -> (Rate, Money) {
    let rate = policy::income_tax_rate(operating_year);
    (rate, (pre_tax_profit * rate).max(Decimal::ZERO))
}

// ---------------------------------------------------------------------------
// Per-year engine
// ---------------------------------------------------------------------------

/// Everything the tax and depreciation rules produce for one operating year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearAssessment {
    pub vat_rate: Rate,
    pub revenue_including_tax: Money,
    pub revenue_excluding_tax: Money,
    pub output_vat: Money,
    pub vat_payable: Money,
    pub vat_credit_balance: Money,
    pub surtax: Money,
    pub om_cost: Money,
    pub battery_replacement: Money,
    pub battery_depreciation: Money,
    pub non_battery_depreciation: Money,
    pub depreciation: Money,
    pub pre_tax_profit: Money,
    pub income_tax_rate: Rate,
    pub income_tax: Money,
}

/// Sequential tax computation for a single table build. Owns the VAT credit
/// pool for that build only; years must be assessed in order.
#[derive(Debug)]
pub struct TaxEngine<'a> {
    params: &'a ParameterSet,
    schedule: DepreciationSchedule,
    pool: VatCreditPool,
    om_cost: Money,
    next_year: u32,
}

impl<'a> TaxEngine<'a> {
    pub fn new(
        params: &'a ParameterSet,
        schedule: DepreciationSchedule,
        initial_credit: Money,
    ) -> StorageEvalResult<Self> {
        Ok(Self {
            params,
            schedule,
            pool: VatCreditPool::new(initial_credit),
            om_cost: om_cost(params)?,
            next_year: 1,
        })
    }

    pub fn credit_balance(&self) -> Money {
        self.pool.balance()
    }

    pub fn assess(
        &mut self,
        operating_year: u32,
        revenue: &RevenueBreakdown,
    ) -> StorageEvalResult<YearAssessment> {
        if operating_year != self.next_year {
            return Err(StorageEvalError::InvalidInput {
                field: "operating_year".into(),
                reason: format!(
                    "years must be assessed in order: expected {}, got {operating_year}",
                    self.next_year
                ),
            });
        }
        self.next_year += 1;

        let vat_rate = revenue.vat_class.rate();
        let revenue_including_tax = revenue.revenue_including_tax()?;
        let (revenue_excluding_tax, output_vat) = split_vat(revenue_including_tax, vat_rate);

        let vat_payable = self.pool.settle(output_vat);
        let surtax = vat_payable * policy::SURTAX_RATE;

        let battery_replacement = if replacement_due(operating_year, self.params.battery_life()) {
            self.params.replacement_cost()
        } else {
            Decimal::ZERO
        };

        let DepreciationCharge {
            battery: battery_depreciation,
            non_battery: non_battery_depreciation,
        } = self.schedule.charge_for(operating_year);
        let depreciation =
            checked::add(battery_depreciation, non_battery_depreciation, "depreciation")?;

        let expensed_replacement = match self.params.replacement_treatment() {
            ReplacementTreatment::Expense => battery_replacement,
            ReplacementTreatment::Capitalize => Decimal::ZERO,
        };
        let deductions = checked::sum(
            [
                revenue.charge_cost,
                self.om_cost,
                surtax,
                depreciation,
                expensed_replacement,
            ],
            "deductible costs",
        )?;
        let pre_tax_profit = checked::sub(revenue_excluding_tax, deductions, "pre-tax profit")?;

        let (income_tax_rate, income_tax) = income_tax(pre_tax_profit, operating_year);

        Ok(YearAssessment {
            vat_rate,
            revenue_including_tax,
            revenue_excluding_tax,
            output_vat,
            vat_payable,
            vat_credit_balance: self.pool.balance(),
            surtax,
            om_cost: self.om_cost,
            battery_replacement,
            battery_depreciation,
            non_battery_depreciation,
            depreciation,
            pre_tax_profit,
            income_tax_rate,
            income_tax,
        })
    }
}
