use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::params::{ParameterSet, RevenueMode};
use super::policy;
use crate::checked;
use crate::error::StorageEvalError;
use crate::types::{Money, Rate};
use crate::StorageEvalResult;

/// VAT treatment of a year's revenue. A project is under exactly one class
/// in any year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatClass {
    /// Electricity sales and ancillary services (13%)
    ElectricityAndServices,
    /// Capacity lease income (6%)
    CapacityLease,
}

impl VatClass {
    pub fn rate(self) -> Rate {
        match self {
            VatClass::ElectricityAndServices => policy::VAT_ELECTRICITY,
            VatClass::CapacityLease => policy::VAT_CAPACITY_LEASE,
        }
    }
}

/// Gross revenue components for one operating year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub charge_cost: Money,
    pub discharge_revenue: Money,
    pub lease_revenue: Money,
    pub ancillary_revenue: Money,
    pub vat_class: VatClass,
}

impl RevenueBreakdown {
    /// VAT-inclusive revenue subject to this year's VAT class.
    pub fn revenue_including_tax(&self) -> StorageEvalResult<Money> {
        match self.vat_class {
            VatClass::CapacityLease => Ok(self.lease_revenue),
            VatClass::ElectricityAndServices => checked::add(
                self.discharge_revenue,
                self.ancillary_revenue,
                "VAT-inclusive revenue",
            ),
        }
    }

    /// All cash received from operations, before residual value.
    pub fn cash_inflow(&self) -> StorageEvalResult<Money> {
        checked::sum(
            [self.discharge_revenue, self.lease_revenue, self.ancillary_revenue],
            "operating cash inflow",
        )
    }
}

/// Revenue for a 1-based operating year. Pure: the same parameters and year
/// always give the same breakdown.
pub fn annual_revenue(params: &ParameterSet, operating_year: u32) -> StorageEvalResult<RevenueBreakdown> {
    if operating_year == 0 || operating_year > policy::OPERATING_YEARS {
        return Err(StorageEvalError::InvalidInput {
            field: "operating_year".into(),
            reason: format!(
                "must be within 1..={}, got {operating_year}",
                policy::OPERATING_YEARS
            ),
        });
    }

    let mut breakdown = RevenueBreakdown {
        charge_cost: Decimal::ZERO,
        discharge_revenue: Decimal::ZERO,
        lease_revenue: Decimal::ZERO,
        ancillary_revenue: Decimal::ZERO,
        vat_class: VatClass::ElectricityAndServices,
    };

    match params.revenue_mode() {
        RevenueMode::Arbitrage {
            cycles_per_year,
            charge_price,
            discharge_price,
        } => {
            let (charge, discharge) =
                arbitrage_flows(params, *cycles_per_year, *charge_price, *discharge_price)?;
            breakdown.charge_cost = charge;
            breakdown.discharge_revenue = discharge;
        }
        RevenueMode::Hybrid {
            cycles_per_year,
            charge_price,
            discharge_price,
            ancillary_revenue,
        } => {
            let (charge, discharge) =
                arbitrage_flows(params, *cycles_per_year, *charge_price, *discharge_price)?;
            breakdown.charge_cost = charge;
            breakdown.discharge_revenue = discharge;
            breakdown.ancillary_revenue = *ancillary_revenue;
        }
        RevenueMode::CapacityLease {
            lease_capacity,
            lease_price,
        } => {
            breakdown.lease_revenue = checked::mul(*lease_capacity, *lease_price, "lease revenue")?;
            breakdown.vat_class = VatClass::CapacityLease;
        }
        RevenueMode::Ancillary { annual_revenue, .. } => {
            breakdown.ancillary_revenue = *annual_revenue;
        }
    }

    Ok(breakdown)
}

/// (charge cost, discharge revenue). Energy charged is the full rated
/// capacity per cycle; energy sold is reduced by round-trip efficiency.
fn arbitrage_flows(
    params: &ParameterSet,
    cycles_per_year: u32,
    charge_price: Money,
    discharge_price: Money,
) -> StorageEvalResult<(Money, Money)> {
    let cycles = Decimal::from(cycles_per_year);
    let capacity = params.capacity_mwh();
    let discharge = checked::product(
        [cycles, params.efficiency(), capacity, discharge_price],
        "discharge revenue",
    )?;
    let charge = checked::product([cycles, capacity, charge_price], "charge cost")?;
    Ok((charge, discharge))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::params::ProjectInput;
    use rust_decimal_macros::dec;

    fn params(input: ProjectInput) -> ParameterSet {
        ParameterSet::from_input(&ProjectInput {
            power_mw: Some(dec!(100)),
            capacity_mwh: Some(dec!(200)),
            static_invest: Some(dec!(30000)),
            ..input
        })
        .unwrap()
    }

    #[test]
    fn test_arbitrage_revenue() {
        let p = params(ProjectInput {
            efficiency: Some(dec!(0.85)),
            cycles_per_year: Some(dec!(330)),
            charge_price: Some(dec!(0.3)),
            discharge_price: Some(dec!(0.9)),
            ..Default::default()
        });
        let r = annual_revenue(&p, 1).unwrap();
        // 330 × 0.85 × 200 × 0.9
        assert_eq!(r.discharge_revenue, dec!(50490));
        // 330 × 200 × 0.3
        assert_eq!(r.charge_cost, dec!(19800));
        assert_eq!(r.lease_revenue, Decimal::ZERO);
        assert_eq!(r.ancillary_revenue, Decimal::ZERO);
        assert_eq!(r.vat_class, VatClass::ElectricityAndServices);
        assert_eq!(r.revenue_including_tax().unwrap(), dec!(50490));
    }

    #[test]
    fn test_hybrid_adds_ancillary_to_taxable_revenue() {
        let p = params(ProjectInput {
            revenue_mode: Some("hybrid".into()),
            ancillary_revenue: Some(dec!(1000)),
            ..Default::default()
        });
        let r = annual_revenue(&p, 5).unwrap();
        assert_eq!(r.ancillary_revenue, dec!(1000));
        assert_eq!(r.revenue_including_tax().unwrap(), r.discharge_revenue + dec!(1000));
        assert_eq!(r.cash_inflow().unwrap(), r.discharge_revenue + dec!(1000));
    }

    #[test]
    fn test_capacity_lease_constant_at_lease_rate() {
        let p = params(ProjectInput {
            revenue_mode: Some("capacity".into()),
            lease_capacity: Some(dec!(50)),
            lease_price: Some(dec!(200000)),
            ..Default::default()
        });
        for year in 1..=policy::OPERATING_YEARS {
            let r = annual_revenue(&p, year).unwrap();
            assert_eq!(r.lease_revenue, dec!(10000000));
            assert_eq!(r.vat_class.rate(), dec!(0.06));
            assert_eq!(r.charge_cost, Decimal::ZERO);
            assert_eq!(r.revenue_including_tax().unwrap(), dec!(10000000));
        }
    }

    #[test]
    fn test_ancillary_revenue_constant() {
        let p = params(ProjectInput {
            revenue_mode: Some("ancillary".into()),
            ancillary_type: Some("peaking".into()),
            ancillary_revenue: Some(dec!(4200)),
            ..Default::default()
        });
        let first = annual_revenue(&p, 1).unwrap();
        let last = annual_revenue(&p, 20).unwrap();
        assert_eq!(first, last);
        assert_eq!(first.ancillary_revenue, dec!(4200));
        assert_eq!(first.discharge_revenue, Decimal::ZERO);
    }

    #[test]
    fn test_oversized_lease_reports_overflow() {
        let p = params(ProjectInput {
            revenue_mode: Some("capacity".into()),
            lease_capacity: Some(Decimal::from(10u64.pow(15))),
            lease_price: Some(Decimal::from(10u64.pow(15))),
            ..Default::default()
        });
        assert!(matches!(
            annual_revenue(&p, 1),
            Err(StorageEvalError::Overflow { .. })
        ));
    }

    #[test]
    fn test_year_outside_operating_period_rejected() {
        let p = params(ProjectInput::default());
        assert!(annual_revenue(&p, 0).is_err());
        assert!(annual_revenue(&p, 21).is_err());
    }
}
