use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::cash_flow::CashFlowTable;
use super::policy;
use crate::checked;
use crate::error::StorageEvalError;
use crate::time_value;
use crate::types::{Money, Percent, Years};
use crate::StorageEvalResult;

/// Decimal places kept in reported metrics.
pub(crate) const REPORTED_DP: u32 = 2;

/// Starting point for both IRR solves.
const IRR_GUESS: Decimal = dec!(0.1);

/// Headline investment metrics for one cash-flow table.
///
/// Produced all at once: if either IRR is undefined the whole extraction
/// fails, even though payback is still defined. Use
/// `StorageProject::payback_period` to read payback on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_investment: Money,
    pub construction_interest: Money,
    pub pre_tax_irr_pct: Percent,
    pub post_tax_irr_pct: Percent,
    /// Years until cumulative after-tax cash turns non-negative; 99.9 if never
    pub payback_years: Years,
}

impl Metrics {
    pub fn payback_recovered(&self) -> bool {
        self.payback_years != policy::PAYBACK_NOT_RECOVERED
    }
}

/// Derive IRRs and payback from a finished table. Recomputed on every call.
pub fn extract_metrics(table: &CashFlowTable) -> StorageEvalResult<Metrics> {
    if table.is_empty() {
        return Err(StorageEvalError::TableNotBuilt);
    }

    let pre_tax = table.pre_tax_cash_flows();
    let after_tax = table.after_tax_cash_flows();

    let pre_tax_irr = time_value::irr(&pre_tax, IRR_GUESS)
        .and_then(as_percent)
        .map_err(|e| StorageEvalError::calculation("pre-tax IRR", e))?;
    let post_tax_irr = time_value::irr(&after_tax, IRR_GUESS)
        .and_then(as_percent)
        .map_err(|e| StorageEvalError::calculation("post-tax IRR", e))?;
    let payback = payback_period(&after_tax)
        .map_err(|e| StorageEvalError::calculation("payback period", e))?;

    Ok(Metrics {
        total_investment: table.total_investment.round_dp(REPORTED_DP),
        construction_interest: table.construction_interest.round_dp(REPORTED_DP),
        pre_tax_irr_pct: pre_tax_irr.round_dp(REPORTED_DP),
        post_tax_irr_pct: post_tax_irr.round_dp(REPORTED_DP),
        payback_years: payback.round_dp(REPORTED_DP),
    })
}

fn as_percent(rate: Decimal) -> StorageEvalResult<Percent> {
    checked::mul(rate, dec!(100), "IRR percentage")
}

/// Static payback on the after-tax series, interpolated within the year the
/// cumulative balance turns non-negative.
pub fn payback_period(cash_flows: &[Money]) -> StorageEvalResult<Years> {
    let mut cumulative = Decimal::ZERO;
    for (p, cf) in cash_flows.iter().enumerate() {
        let previous = cumulative;
        cumulative = checked::add(cumulative, *cf, "cumulative after-tax cash flow")?;
        if cumulative < Decimal::ZERO {
            continue;
        }
        if p == 0 {
            return Ok(Decimal::ONE);
        }
        if cf.is_zero() {
            return Err(StorageEvalError::DivisionByZero {
                context: format!("payback interpolation in year {}", p + 1),
            });
        }
        return Ok(Decimal::from(p as u64 - 1) + previous.abs() / *cf);
    }

    warn!(
        final_balance = %cumulative,
        "cumulative after-tax cash flow never recovers; reporting payback as {}",
        policy::PAYBACK_NOT_RECOVERED
    );
    Ok(policy::PAYBACK_NOT_RECOVERED)
}
