//! Single-factor sensitivity sweep over the pre-tax IRR.
//!
//! Each step scales one numeric input by `1 + variation` and runs a full
//! independent evaluation. A step that fails to evaluate is recorded with
//! no IRR instead of aborting the sweep.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::metrics::extract_metrics;
use super::params::ProjectInput;
use super::project::evaluate;
use crate::checked;
use crate::error::StorageEvalError;
use crate::types::{Percent, Rate};
use crate::StorageEvalResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    /// Relative change applied to the factor (-0.1 = -10%)
    pub variation: Rate,
    /// Factor value used for this step
    pub value: Decimal,
    /// Pre-tax IRR in percent, or `None` if the step could not be evaluated
    pub pre_tax_irr: Option<Percent>,
}

/// Input keys a sweep can vary.
pub const NUMERIC_FACTORS: [&str; 16] = [
    "power_mw",
    "capacity_mwh",
    "efficiency",
    "static_invest",
    "loan_rate",
    "capital_ratio",
    "deductible_tax",
    "battery_asset_ratio",
    "cycles_per_year",
    "charge_price",
    "discharge_price",
    "lease_capacity",
    "lease_price",
    "ancillary_revenue",
    "battery_life",
    "replacement_cost",
];

fn factor_slot<'a>(input: &'a mut ProjectInput, factor: &str) -> Option<&'a mut Option<Decimal>> {
    let slot = match factor {
        "power_mw" => &mut input.power_mw,
        "capacity_mwh" => &mut input.capacity_mwh,
        "efficiency" => &mut input.efficiency,
        "static_invest" => &mut input.static_invest,
        "loan_rate" => &mut input.loan_rate,
        "capital_ratio" => &mut input.capital_ratio,
        "deductible_tax" => &mut input.deductible_tax,
        "battery_asset_ratio" => &mut input.battery_asset_ratio,
        "cycles_per_year" => &mut input.cycles_per_year,
        "charge_price" => &mut input.charge_price,
        "discharge_price" => &mut input.discharge_price,
        "lease_capacity" => &mut input.lease_capacity,
        "lease_price" => &mut input.lease_price,
        "ancillary_revenue" => &mut input.ancillary_revenue,
        "battery_life" => &mut input.battery_life,
        "replacement_cost" => &mut input.replacement_cost,
        _ => return None,
    };
    Some(slot)
}

/// `steps` evenly spaced values from `-range` to `+range` inclusive. A
/// single step yields `-range` alone.
pub fn linspace(range: Rate, steps: usize) -> StorageEvalResult<Vec<Rate>> {
    match steps {
        0 => Ok(Vec::new()),
        1 => Ok(vec![-range]),
        n => {
            let span = checked::add(range, range, "variation span")?;
            let increment = span / Decimal::from(n as u64 - 1);
            (0..n)
                .map(|i| {
                    let offset = checked::mul(increment, Decimal::from(i as u64), "variation step")?;
                    checked::add(-range, offset, "variation step")
                })
                .collect()
        }
    }
}

pub fn sensitivity_sweep(
    base: &ProjectInput,
    factor: &str,
    variation_range: Rate,
    steps: usize,
) -> StorageEvalResult<Vec<SensitivityPoint>> {
    if steps == 0 {
        return Err(StorageEvalError::InvalidInput {
            field: "steps".into(),
            reason: "at least one step is required".into(),
        });
    }

    let mut lookup = base.clone();
    let base_value = match factor_slot(&mut lookup, factor) {
        None => {
            return Err(StorageEvalError::InvalidInput {
                field: "factor".into(),
                reason: format!(
                    "'{factor}' is not a numeric input (expected one of {})",
                    NUMERIC_FACTORS.join(", ")
                ),
            })
        }
        Some(slot) => (*slot).ok_or_else(|| StorageEvalError::InvalidInput {
            field: "factor".into(),
            reason: format!("'{factor}' has no value in the base input"),
        })?,
    };

    let steps_to_run: Vec<(Rate, Decimal)> = linspace(variation_range, steps)
        .and_then(|variations| {
            variations
                .into_iter()
                .map(|variation| {
                    let scale = checked::add(Decimal::ONE, variation, "factor scale")?;
                    let value = checked::mul(base_value, scale, "varied factor")?;
                    Ok((variation, value))
                })
                .collect::<StorageEvalResult<Vec<_>>>()
        })
        .map_err(|e| StorageEvalError::InvalidInput {
            field: "variation_range".into(),
            reason: format!("'{factor}' cannot be varied by ±{variation_range}: {e}"),
        })?;

    let run_step = |&(variation, value): &(Rate, Decimal)| -> SensitivityPoint {
        let mut input = base.clone();
        if let Some(slot) = factor_slot(&mut input, factor) {
            *slot = Some(value);
        }

        let pre_tax_irr = match evaluate(&input).and_then(|table| extract_metrics(&table)) {
            Ok(metrics) => Some(metrics.pre_tax_irr_pct),
            Err(e) => {
                error!(factor, %variation, error = %e, "sensitivity step failed");
                None
            }
        };

        SensitivityPoint {
            variation,
            value,
            pre_tax_irr,
        }
    };

    #[cfg(feature = "parallel")]
    let points: Vec<SensitivityPoint> = steps_to_run.par_iter().map(run_step).collect();

    #[cfg(not(feature = "parallel"))]
    let points: Vec<SensitivityPoint> = steps_to_run.iter().map(run_step).collect();

    info!(factor, steps, "sensitivity sweep complete");
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> ProjectInput {
        ProjectInput {
            power_mw: Some(dec!(100)),
            capacity_mwh: Some(dec!(200)),
            static_invest: Some(dec!(30000)),
            discharge_price: Some(dec!(0.9)),
            ..Default::default()
        }
    }

    #[test]
    fn test_linspace() {
        assert_eq!(
            linspace(dec!(0.1), 5).unwrap(),
            vec![dec!(-0.1), dec!(-0.05), dec!(0), dec!(0.05), dec!(0.1)]
        );
        assert_eq!(linspace(dec!(0.2), 1).unwrap(), vec![dec!(-0.2)]);
        assert_eq!(linspace(dec!(0.2), 2).unwrap(), vec![dec!(-0.2), dec!(0.2)]);
        assert!(linspace(Decimal::MAX, 3).is_err());
    }

    #[test]
    fn test_sweep_is_ordered_and_monotone_in_price() {
        let points = sensitivity_sweep(&base(), "discharge_price", dec!(0.1), 3).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].variation, dec!(-0.1));
        assert_eq!(points[0].value, dec!(0.81));
        assert_eq!(points[2].value, dec!(0.99));
        let irrs: Vec<Decimal> = points.iter().map(|p| p.pre_tax_irr.unwrap()).collect();
        assert!(irrs[0] < irrs[1] && irrs[1] < irrs[2]);
    }

    #[test]
    fn test_failed_step_recorded_as_none() {
        // efficiency 1.0 × 1.5 leaves (0, 1] and fails validation
        let input = ProjectInput {
            efficiency: Some(dec!(1.0)),
            ..base()
        };
        let points = sensitivity_sweep(&input, "efficiency", dec!(0.5), 3).unwrap();
        assert!(points[0].pre_tax_irr.is_some());
        assert!(points[1].pre_tax_irr.is_some());
        assert!(points[2].pre_tax_irr.is_none());
    }

    #[test]
    fn test_overflowing_step_recorded_as_none() {
        let input = ProjectInput {
            revenue_mode: Some("capacity".into()),
            lease_capacity: Some(dec!(50)),
            lease_price: Some(dec!(200000)),
            ..base()
        };
        // Steps at -1e23, 0 and +1e23: a negative price, the base case, and a
        // price whose lease income exceeds the Decimal range
        let range = Decimal::from(10u64.pow(15)) * Decimal::from(10u64.pow(8));
        let points = sensitivity_sweep(&input, "lease_price", range, 3).unwrap();
        assert!(points[0].pre_tax_irr.is_none());
        assert!(points[1].pre_tax_irr.is_some());
        assert!(points[2].pre_tax_irr.is_none());

        let overflowing = ProjectInput {
            lease_price: Some(points[2].value),
            ..input
        };
        match evaluate(&overflowing) {
            Err(StorageEvalError::Calculation { source, .. }) => {
                assert!(matches!(*source, StorageEvalError::Overflow { .. }));
            }
            other => panic!("expected an overflow during the build, got {other:?}"),
        }
    }

    #[test]
    fn test_unscalable_factor_rejected_up_front() {
        let err = sensitivity_sweep(&base(), "static_invest", Decimal::MAX, 3).unwrap_err();
        assert!(matches!(err, StorageEvalError::InvalidInput { .. }));
    }

    #[test]
    fn test_capacity_lease_steps_all_evaluated() {
        let input = ProjectInput {
            revenue_mode: Some("capacity".into()),
            lease_capacity: Some(dec!(50)),
            lease_price: Some(dec!(200000)),
            ..base()
        };
        let points = sensitivity_sweep(&input, "lease_price", dec!(0.1), 3).unwrap();
        assert!(points.iter().all(|p| p.pre_tax_irr.is_some()));
    }

    #[test]
    fn test_unknown_or_absent_factor_rejected() {
        assert!(sensitivity_sweep(&base(), "revenue_mode", dec!(0.1), 3).is_err());
        assert!(sensitivity_sweep(&base(), "nonsense", dec!(0.1), 3).is_err());
        assert!(sensitivity_sweep(&base(), "lease_price", dec!(0.1), 3).is_err());
        assert!(sensitivity_sweep(&base(), "power_mw", dec!(0.1), 0).is_err());
    }
}
