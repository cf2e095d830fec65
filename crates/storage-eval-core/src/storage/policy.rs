//! Fixed regulatory policy tables for electrochemical storage project
//! evaluation (DL/T 2919-2025 and the accompanying boundary-condition
//! table). These are policy, not configuration: a regulatory revision is
//! an edit here.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{Money, Rate};

// ---------------------------------------------------------------------------
// Project horizon
// ---------------------------------------------------------------------------

/// Construction period in years (always the first row of the table).
pub const CONSTRUCTION_YEARS: u32 = 1;

/// Operating period in years. Fixed, not parameterized per project.
pub const OPERATING_YEARS: u32 = 20;

/// Total rows in a cash-flow table.
pub const TOTAL_YEARS: u32 = CONSTRUCTION_YEARS + OPERATING_YEARS;

// ---------------------------------------------------------------------------
// Indirect taxes
// ---------------------------------------------------------------------------

/// VAT on electricity sales and ancillary services.
pub const VAT_ELECTRICITY: Rate = dec!(0.13);

/// VAT on capacity lease income.
pub const VAT_CAPACITY_LEASE: Rate = dec!(0.06);

/// Local surtaxes levied on VAT actually paid (7% city maintenance + 3% education).
pub const SURTAX_RATE: Rate = dec!(0.10);

// ---------------------------------------------------------------------------
// Income tax
// ---------------------------------------------------------------------------

/// Statutory corporate income-tax rate.
pub const INCOME_TAX_RATE: Rate = dec!(0.25);

/// One tier of the tax-holiday schedule: applies through `last_operating_year`
/// inclusive, as a fraction of the statutory rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxHolidayTier {
    pub last_operating_year: u32,
    pub statutory_fraction: Rate,
}

/// "Three exempt, three halved": 0% in years 1-3, half rate in 4-6, full
/// rate from year 7.
pub const TAX_HOLIDAY: [TaxHolidayTier; 2] = [
    TaxHolidayTier {
        last_operating_year: 3,
        statutory_fraction: Decimal::ZERO,
    },
    TaxHolidayTier {
        last_operating_year: 6,
        statutory_fraction: dec!(0.5),
    },
];

/// Income-tax rate applicable in a 1-based operating year.
pub fn income_tax_rate(operating_year: u32) -> Rate {
    TAX_HOLIDAY
        .iter()
        .find(|tier| operating_year <= tier.last_operating_year)
        .map(|tier| INCOME_TAX_RATE * tier.statutory_fraction)
        .unwrap_or(INCOME_TAX_RATE)
}

// ---------------------------------------------------------------------------
// Depreciation
// ---------------------------------------------------------------------------

/// Salvage fraction excluded from the depreciable base.
pub const RESIDUAL_RATIO: Rate = dec!(0.05);

/// Depreciation horizon for non-battery fixed assets (DL/T 2919-2025 E.1.4).
pub const NON_BATTERY_DEPRECIATION_YEARS: u32 = 15;

/// Default battery share of fixed-asset value.
pub const DEFAULT_BATTERY_ASSET_RATIO: Rate = dec!(0.60);

// ---------------------------------------------------------------------------
// Battery replacement (DL/T 2919-2025 E.1.8)
// ---------------------------------------------------------------------------

/// Battery life for peak-shaving duty.
pub const BATTERY_LIFE_PEAKING: u32 = 10;

/// Battery life for frequency-regulation duty.
pub const BATTERY_LIFE_FREQUENCY: u32 = 4;

/// Default replacement cost as a fraction of static investment.
pub const DEFAULT_REPLACEMENT_COST_RATIO: Rate = dec!(0.70);

// ---------------------------------------------------------------------------
// Operations & maintenance
// ---------------------------------------------------------------------------

/// Power-based O&M fee, CNY per kW per year.
pub const OM_FEE_PER_KW: Decimal = dec!(30);

/// Energy-based O&M fee, CNY per discharged kWh.
pub const OM_FEE_PER_KWH: Decimal = dec!(0.05);

/// Annual cycle count assumed when the revenue mode defines none.
pub const DEFAULT_CYCLES_PER_YEAR: u32 = 330;

// ---------------------------------------------------------------------------
// Investment
// ---------------------------------------------------------------------------

/// Working capital as a fraction of static investment.
pub const WORKING_CAPITAL_RATIO: Rate = dec!(0.01);

/// Construction-period loan drawn evenly, so interest accrues on half the principal.
pub const CONSTRUCTION_DRAW_FACTOR: Rate = dec!(0.5);

// ---------------------------------------------------------------------------
// Defaults and units
// ---------------------------------------------------------------------------

pub const DEFAULT_EFFICIENCY: Rate = dec!(0.85);
pub const DEFAULT_LOAN_RATE: Rate = dec!(0.049);
pub const DEFAULT_CAPITAL_RATIO: Rate = dec!(0.2);
pub const DEFAULT_CHARGE_PRICE: Money = dec!(0.3);
pub const DEFAULT_DISCHARGE_PRICE: Money = dec!(0.9);

pub const KW_PER_MW: Decimal = dec!(1000);
pub const KWH_PER_MWH: Decimal = dec!(1000);

/// CNY per monetary unit (10k CNY).
pub const CNY_PER_UNIT: Decimal = dec!(10000);

/// Reported when cumulative after-tax cash never turns non-negative.
pub const PAYBACK_NOT_RECOVERED: Decimal = dec!(99.9);
