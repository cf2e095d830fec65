use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::policy;
use crate::error::StorageEvalError;
use crate::types::{Money, Rate};
use crate::StorageEvalResult;

/// Straight-line depreciation of one asset class down to a residual ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StraightLine {
    pub asset_value: Money,
    pub residual_ratio: Rate,
    pub years: u32,
    pub annual_charge: Money,
}

impl StraightLine {
    pub fn new(asset_value: Money, residual_ratio: Rate, years: u32) -> StorageEvalResult<Self> {
        if years == 0 {
            return Err(StorageEvalError::DivisionByZero {
                context: "straight-line depreciation over zero years".into(),
            });
        }
        let annual_charge =
            asset_value * (Decimal::ONE - residual_ratio) / Decimal::from(years);
        Ok(Self {
            asset_value,
            residual_ratio,
            years,
            annual_charge,
        })
    }

    /// Charge for a 1-based operating year; zero outside the active window.
    pub fn charge_for(&self, operating_year: u32) -> Money {
        if (1..=self.years).contains(&operating_year) {
            self.annual_charge
        } else {
            Decimal::ZERO
        }
    }

    /// Total depreciable amount over the schedule's life.
    pub fn depreciable_amount(&self) -> Money {
        self.asset_value * (Decimal::ONE - self.residual_ratio)
    }
}

/// Battery and non-battery schedules derived once from the fixed-asset base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepreciationSchedule {
    pub battery: StraightLine,
    pub non_battery: StraightLine,
}

/// One year's depreciation, split by asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepreciationCharge {
    pub battery: Money,
    pub non_battery: Money,
}

impl DepreciationCharge {
    pub fn total(&self) -> Money {
        self.battery + self.non_battery
    }
}

impl DepreciationSchedule {
    /// Split `fixed_asset_value` by `battery_asset_ratio`; the battery part is
    /// written off over the battery life, the rest over the fixed non-battery
    /// horizon, both to the common residual ratio.
    pub fn new(
        fixed_asset_value: Money,
        battery_asset_ratio: Rate,
        battery_life: u32,
    ) -> StorageEvalResult<Self> {
        let battery_value = fixed_asset_value * battery_asset_ratio;
        let non_battery_value = fixed_asset_value * (Decimal::ONE - battery_asset_ratio);
        Ok(Self {
            battery: StraightLine::new(battery_value, policy::RESIDUAL_RATIO, battery_life)?,
            non_battery: StraightLine::new(
                non_battery_value,
                policy::RESIDUAL_RATIO,
                policy::NON_BATTERY_DEPRECIATION_YEARS,
            )?,
        })
    }

    pub fn charge_for(&self, operating_year: u32) -> DepreciationCharge {
        DepreciationCharge {
            battery: self.battery.charge_for(operating_year),
            non_battery: self.non_battery.charge_for(operating_year),
        }
    }
}
