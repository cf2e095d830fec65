use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::policy;
use crate::error::{FieldIssue, StorageEvalError};
use crate::types::{MegaWattHours, MegaWatts, Money, Rate};
use crate::StorageEvalResult;

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// Raw project parameters as supplied by a caller. Every key is optional
/// here; `ParameterSet::from_input` decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInput {
    /// Installed power (MW)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_mw: Option<MegaWatts>,
    /// Rated energy capacity (MWh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_mwh: Option<MegaWattHours>,
    /// Round-trip efficiency, (0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<Rate>,
    /// Static investment (10k CNY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_invest: Option<Money>,
    /// Long-term loan rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_rate: Option<Rate>,
    /// Equity share of static investment, (0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital_ratio: Option<Rate>,
    /// Deductible input VAT (10k CNY); derived from static investment when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deductible_tax: Option<Money>,
    /// Battery share of fixed-asset value, (0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_asset_ratio: Option<Rate>,
    /// One of arbitrage, capacity, ancillary, hybrid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_mode: Option<String>,
    /// Full charge/discharge cycles per year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles_per_year: Option<Decimal>,
    /// Charging price (CNY/kWh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_price: Option<Money>,
    /// Discharging price (CNY/kWh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_price: Option<Money>,
    /// Leased capacity (MW)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_capacity: Option<Decimal>,
    /// Lease price (CNY/MW/year)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_price: Option<Money>,
    /// peaking or frequency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancillary_type: Option<String>,
    /// Annual ancillary-service income (10k CNY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancillary_revenue: Option<Money>,
    /// Battery life in years; defaults by duty type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_life: Option<Decimal>,
    /// Cost of one battery replacement (10k CNY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_cost: Option<Money>,
    /// expense or capitalize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_mode: Option<String>,
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Ancillary-service duty, which also fixes the default battery life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AncillaryService {
    Peaking,
    Frequency,
}

impl AncillaryService {
    pub fn default_battery_life(self) -> u32 {
        match self {
            AncillaryService::Peaking => policy::BATTERY_LIFE_PEAKING,
            AncillaryService::Frequency => policy::BATTERY_LIFE_FREQUENCY,
        }
    }
}

impl FromStr for AncillaryService {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "peaking" => Ok(AncillaryService::Peaking),
            "frequency" => Ok(AncillaryService::Frequency),
            other => Err(format!(
                "unknown ancillary type '{other}' (expected peaking or frequency)"
            )),
        }
    }
}

/// Accounting treatment of battery replacement spend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementTreatment {
    /// Deducted from profit in the year incurred
    #[default]
    Expense,
    /// Excluded from profit; no amortization is modelled
    Capitalize,
}

impl FromStr for ReplacementTreatment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(ReplacementTreatment::Expense),
            "capitalize" | "capitalise" => Ok(ReplacementTreatment::Capitalize),
            other => Err(format!(
                "unknown replacement mode '{other}' (expected expense or capitalize)"
            )),
        }
    }
}

/// Mode names accepted in `revenue_mode`, before mode fields are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevenueModeKind {
    Arbitrage,
    CapacityLease,
    Ancillary,
    Hybrid,
}

impl FromStr for RevenueModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arbitrage" => Ok(RevenueModeKind::Arbitrage),
            "capacity" | "capacity-lease" | "capacity_lease" => Ok(RevenueModeKind::CapacityLease),
            "ancillary" => Ok(RevenueModeKind::Ancillary),
            "hybrid" => Ok(RevenueModeKind::Hybrid),
            other => Err(format!(
                "unknown revenue mode '{other}' (expected arbitrage, capacity, ancillary or hybrid)"
            )),
        }
    }
}

/// How the project earns revenue, with exactly the fields each mode needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RevenueMode {
    /// Peak/valley price arbitrage
    Arbitrage {
        cycles_per_year: u32,
        charge_price: Money,
        discharge_price: Money,
    },
    /// Capacity leased to a third party
    CapacityLease {
        lease_capacity: Decimal,
        lease_price: Money,
    },
    /// Ancillary services at a fixed annual income
    Ancillary {
        service: AncillaryService,
        annual_revenue: Money,
    },
    /// Arbitrage plus a fixed ancillary income
    Hybrid {
        cycles_per_year: u32,
        charge_price: Money,
        discharge_price: Money,
        ancillary_revenue: Money,
    },
}

impl RevenueMode {
    pub fn name(&self) -> &'static str {
        match self {
            RevenueMode::Arbitrage { .. } => "arbitrage",
            RevenueMode::CapacityLease { .. } => "capacity",
            RevenueMode::Ancillary { .. } => "ancillary",
            RevenueMode::Hybrid { .. } => "hybrid",
        }
    }

    /// Cycle count, for modes that cycle the battery.
    pub fn cycles_per_year(&self) -> Option<u32> {
        match self {
            RevenueMode::Arbitrage {
                cycles_per_year, ..
            }
            | RevenueMode::Hybrid {
                cycles_per_year, ..
            } => Some(*cycles_per_year),
            RevenueMode::CapacityLease { .. } | RevenueMode::Ancillary { .. } => None,
        }
    }
}

impl fmt::Display for RevenueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Validated parameters
// ---------------------------------------------------------------------------

/// Validated, normalized project parameters. Only obtainable through
/// `ParameterSet::from_input`, so every invariant holds for its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSet {
    power_mw: MegaWatts,
    capacity_mwh: MegaWattHours,
    efficiency: Rate,
    static_invest: Money,
    loan_rate: Rate,
    capital_ratio: Rate,
    loan_principal: Money,
    deductible_tax: Option<Money>,
    battery_asset_ratio: Rate,
    revenue_mode: RevenueMode,
    battery_life: u32,
    replacement_cost: Money,
    replacement_treatment: ReplacementTreatment,
}

impl ParameterSet {
    /// Validate and normalize raw input. Every problem found is reported in
    /// a single `ValidationFailed` error; nothing is partially applied.
    pub fn from_input(input: &ProjectInput) -> StorageEvalResult<Self> {
        let mut v = Validator::default();

        let power_mw = v.required("power_mw", input.power_mw);
        let capacity_mwh = v.required("capacity_mwh", input.capacity_mwh);
        let static_invest = v.required("static_invest", input.static_invest);
        v.positive("power_mw", input.power_mw);
        v.positive("capacity_mwh", input.capacity_mwh);
        v.positive("static_invest", input.static_invest);

        let efficiency = input.efficiency.unwrap_or(policy::DEFAULT_EFFICIENCY);
        v.unit_interval("efficiency", efficiency);

        let loan_rate = input.loan_rate.unwrap_or(policy::DEFAULT_LOAN_RATE);
        v.non_negative("loan_rate", Some(loan_rate));

        let capital_ratio = input.capital_ratio.unwrap_or(policy::DEFAULT_CAPITAL_RATIO);
        v.unit_interval("capital_ratio", capital_ratio);

        let battery_asset_ratio = input
            .battery_asset_ratio
            .unwrap_or(policy::DEFAULT_BATTERY_ASSET_RATIO);
        v.unit_interval("battery_asset_ratio", battery_asset_ratio);

        v.non_negative("deductible_tax", input.deductible_tax);

        let revenue_mode = resolve_revenue_mode(&mut v, input);

        let battery_life = match input.battery_life {
            Some(life) => {
                if life < Decimal::ONE {
                    v.issue("battery_life", format!("must be at least 1 year, got {life}"));
                }
                v.whole_count("battery_life", life)
            }
            None => match &revenue_mode {
                Some(RevenueMode::Ancillary { service, .. }) => service.default_battery_life(),
                _ => policy::BATTERY_LIFE_PEAKING,
            },
        };

        let replacement_cost = input
            .replacement_cost
            .unwrap_or(static_invest * policy::DEFAULT_REPLACEMENT_COST_RATIO);
        v.non_negative("replacement_cost", Some(replacement_cost));

        let replacement_treatment = match input.replacement_mode.as_deref() {
            None => ReplacementTreatment::default(),
            Some(s) => v.parse("replacement_mode", s).unwrap_or_default(),
        };

        v.finish()?;
        let revenue_mode = revenue_mode.ok_or_else(|| StorageEvalError::InvalidInput {
            field: "revenue_mode".into(),
            reason: "revenue mode could not be resolved".into(),
        })?;

        let params = ParameterSet {
            power_mw,
            capacity_mwh,
            efficiency,
            static_invest,
            loan_rate,
            capital_ratio,
            loan_principal: static_invest * (Decimal::ONE - capital_ratio),
            deductible_tax: input.deductible_tax,
            battery_asset_ratio,
            revenue_mode,
            battery_life,
            replacement_cost,
            replacement_treatment,
        };

        tracing::info!(
            mode = params.revenue_mode.name(),
            power_mw = %params.power_mw,
            capacity_mwh = %params.capacity_mwh,
            static_invest = %params.static_invest,
            battery_life = params.battery_life,
            "project parameters validated"
        );

        Ok(params)
    }

    pub fn power_mw(&self) -> MegaWatts {
        self.power_mw
    }

    pub fn capacity_mwh(&self) -> MegaWattHours {
        self.capacity_mwh
    }

    pub fn efficiency(&self) -> Rate {
        self.efficiency
    }

    pub fn static_invest(&self) -> Money {
        self.static_invest
    }

    pub fn loan_rate(&self) -> Rate {
        self.loan_rate
    }

    pub fn capital_ratio(&self) -> Rate {
        self.capital_ratio
    }

    /// Debt-funded part of static investment.
    pub fn loan_principal(&self) -> Money {
        self.loan_principal
    }

    /// Explicit deductible input VAT, if the caller supplied one.
    pub fn deductible_tax_override(&self) -> Option<Money> {
        self.deductible_tax
    }

    pub fn battery_asset_ratio(&self) -> Rate {
        self.battery_asset_ratio
    }

    pub fn revenue_mode(&self) -> &RevenueMode {
        &self.revenue_mode
    }

    pub fn battery_life(&self) -> u32 {
        self.battery_life
    }

    pub fn replacement_cost(&self) -> Money {
        self.replacement_cost
    }

    pub fn replacement_treatment(&self) -> ReplacementTreatment {
        self.replacement_treatment
    }
}

fn resolve_revenue_mode(v: &mut Validator, input: &ProjectInput) -> Option<RevenueMode> {
    let kind = match input.revenue_mode.as_deref() {
        None => RevenueModeKind::Arbitrage,
        Some(s) => v.parse::<RevenueModeKind>("revenue_mode", s)?,
    };

    match kind {
        RevenueModeKind::Arbitrage => {
            let (cycles_per_year, charge_price, discharge_price) = arbitrage_fields(v, input);
            Some(RevenueMode::Arbitrage {
                cycles_per_year,
                charge_price,
                discharge_price,
            })
        }
        RevenueModeKind::Hybrid => {
            let (cycles_per_year, charge_price, discharge_price) = arbitrage_fields(v, input);
            let ancillary_revenue = input.ancillary_revenue.unwrap_or(Decimal::ZERO);
            v.non_negative("ancillary_revenue", Some(ancillary_revenue));
            Some(RevenueMode::Hybrid {
                cycles_per_year,
                charge_price,
                discharge_price,
                ancillary_revenue,
            })
        }
        RevenueModeKind::CapacityLease => {
            let lease_capacity = v.required("lease_capacity", input.lease_capacity);
            let lease_price = v.required("lease_price", input.lease_price);
            v.non_negative("lease_capacity", input.lease_capacity);
            v.non_negative("lease_price", input.lease_price);
            Some(RevenueMode::CapacityLease {
                lease_capacity,
                lease_price,
            })
        }
        RevenueModeKind::Ancillary => {
            let service = match input.ancillary_type.as_deref() {
                None => {
                    v.missing("ancillary_type");
                    None
                }
                Some(s) => v.parse::<AncillaryService>("ancillary_type", s),
            };
            let annual_revenue = v.required("ancillary_revenue", input.ancillary_revenue);
            v.non_negative("ancillary_revenue", input.ancillary_revenue);
            service.map(|service| RevenueMode::Ancillary {
                service,
                annual_revenue,
            })
        }
    }
}

fn arbitrage_fields(v: &mut Validator, input: &ProjectInput) -> (u32, Money, Money) {
    let cycles = input
        .cycles_per_year
        .unwrap_or_else(|| Decimal::from(policy::DEFAULT_CYCLES_PER_YEAR));
    v.non_negative("cycles_per_year", Some(cycles));
    let cycles_per_year = v.whole_count("cycles_per_year", cycles);

    let charge_price = input.charge_price.unwrap_or(policy::DEFAULT_CHARGE_PRICE);
    let discharge_price = input
        .discharge_price
        .unwrap_or(policy::DEFAULT_DISCHARGE_PRICE);
    v.non_negative("charge_price", Some(charge_price));
    v.non_negative("discharge_price", Some(discharge_price));

    (cycles_per_year, charge_price, discharge_price)
}

// ---------------------------------------------------------------------------
// Issue collection
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Validator {
    issues: Vec<FieldIssue>,
}

impl Validator {
    fn issue(&mut self, field: &str, reason: impl Into<String>) {
        self.issues.push(FieldIssue::new(field, reason));
    }

    fn missing(&mut self, field: &str) {
        self.issue(field, "missing required parameter");
    }

    /// Present value, or zero with a recorded issue.
    fn required(&mut self, field: &str, value: Option<Decimal>) -> Decimal {
        match value {
            Some(v) => v,
            None => {
                self.missing(field);
                Decimal::ZERO
            }
        }
    }

    fn positive(&mut self, field: &str, value: Option<Decimal>) {
        if let Some(v) = value {
            if v <= Decimal::ZERO {
                self.issue(field, format!("must be greater than 0, got {v}"));
            }
        }
    }

    fn non_negative(&mut self, field: &str, value: Option<Decimal>) {
        if let Some(v) = value {
            if v < Decimal::ZERO {
                self.issue(field, format!("must not be negative, got {v}"));
            }
        }
    }

    fn unit_interval(&mut self, field: &str, value: Decimal) {
        if value <= Decimal::ZERO || value > Decimal::ONE {
            self.issue(field, format!("must be in (0, 1], got {value}"));
        }
    }

    /// Truncate toward zero to a whole count.
    fn whole_count(&mut self, field: &str, value: Decimal) -> u32 {
        if value < Decimal::ZERO {
            return 0;
        }
        match value.trunc().to_u32() {
            Some(n) => n,
            None => {
                self.issue(field, format!("is out of range, got {value}"));
                0
            }
        }
    }

    fn parse<T: FromStr<Err = String>>(&mut self, field: &str, raw: &str) -> Option<T> {
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(reason) => {
                self.issue(field, reason);
                None
            }
        }
    }

    fn finish(self) -> StorageEvalResult<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(StorageEvalError::ValidationFailed {
                issues: self.issues,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_input() -> ProjectInput {
        ProjectInput {
            power_mw: Some(dec!(100)),
            capacity_mwh: Some(dec!(200)),
            static_invest: Some(dec!(30000)),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let p = ParameterSet::from_input(&base_input()).unwrap();
        assert_eq!(p.efficiency(), dec!(0.85));
        assert_eq!(p.loan_rate(), dec!(0.049));
        assert_eq!(p.capital_ratio(), dec!(0.2));
        assert_eq!(p.battery_asset_ratio(), dec!(0.60));
        assert_eq!(p.battery_life(), 10);
        assert_eq!(p.replacement_cost(), dec!(21000));
        assert_eq!(p.replacement_treatment(), ReplacementTreatment::Expense);
        assert_eq!(
            p.revenue_mode(),
            &RevenueMode::Arbitrage {
                cycles_per_year: 330,
                charge_price: dec!(0.3),
                discharge_price: dec!(0.9),
            }
        );
    }

    #[test]
    fn test_loan_principal_derived_once() {
        let p = ParameterSet::from_input(&base_input()).unwrap();
        assert_eq!(p.loan_principal(), dec!(24000));
    }

    #[test]
    fn test_all_missing_required_keys_reported_together() {
        let err = ParameterSet::from_input(&ProjectInput::default()).unwrap_err();
        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["power_mw", "capacity_mwh", "static_invest"]);
    }

    #[test]
    fn test_out_of_range_values_reported() {
        let input = ProjectInput {
            power_mw: Some(dec!(-5)),
            efficiency: Some(dec!(1.2)),
            capital_ratio: Some(dec!(0)),
            battery_asset_ratio: Some(dec!(1.5)),
            battery_life: Some(dec!(0)),
            ..base_input()
        };
        let err = ParameterSet::from_input(&input).unwrap_err();
        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        for expected in [
            "power_mw",
            "efficiency",
            "capital_ratio",
            "battery_asset_ratio",
            "battery_life",
        ] {
            assert!(fields.contains(&expected), "missing issue for {expected}");
        }
    }

    #[test]
    fn test_capacity_mode_requires_lease_fields() {
        let input = ProjectInput {
            revenue_mode: Some("capacity".into()),
            ..base_input()
        };
        let err = ParameterSet::from_input(&input).unwrap_err();
        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["lease_capacity", "lease_price"]);
    }

    #[test]
    fn test_ancillary_mode_requires_type_and_revenue() {
        let input = ProjectInput {
            revenue_mode: Some("ancillary".into()),
            ..base_input()
        };
        let err = ParameterSet::from_input(&input).unwrap_err();
        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["ancillary_type", "ancillary_revenue"]);
    }

    #[test]
    fn test_frequency_duty_defaults_battery_life() {
        let input = ProjectInput {
            revenue_mode: Some("ancillary".into()),
            ancillary_type: Some("frequency".into()),
            ancillary_revenue: Some(dec!(5000)),
            ..base_input()
        };
        let p = ParameterSet::from_input(&input).unwrap();
        assert_eq!(p.battery_life(), 4);

        let peaking = ProjectInput {
            ancillary_type: Some("peaking".into()),
            ..input.clone()
        };
        assert_eq!(ParameterSet::from_input(&peaking).unwrap().battery_life(), 10);

        let overridden = ProjectInput {
            battery_life: Some(dec!(6)),
            ..input
        };
        assert_eq!(ParameterSet::from_input(&overridden).unwrap().battery_life(), 6);
    }

    #[test]
    fn test_unknown_mode_names_rejected() {
        let input = ProjectInput {
            revenue_mode: Some("merchant".into()),
            replacement_mode: Some("amortize".into()),
            ..base_input()
        };
        let err = ParameterSet::from_input(&input).unwrap_err();
        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["revenue_mode", "replacement_mode"]);
    }

    #[test]
    fn test_capacity_lease_alias_and_fractional_cycles() {
        let lease = ProjectInput {
            revenue_mode: Some("capacity-lease".into()),
            lease_capacity: Some(dec!(50)),
            lease_price: Some(dec!(200000)),
            ..base_input()
        };
        assert_eq!(
            ParameterSet::from_input(&lease).unwrap().revenue_mode().name(),
            "capacity"
        );

        let fractional = ProjectInput {
            cycles_per_year: Some(dec!(379.5)),
            ..base_input()
        };
        let p = ParameterSet::from_input(&fractional).unwrap();
        assert_eq!(p.revenue_mode().cycles_per_year(), Some(379));
    }

    #[test]
    fn test_input_deserializes_from_json_numbers_and_strings() {
        let json = r#"{"power_mw": 100, "capacity_mwh": "200", "static_invest": 30000.0,
                       "revenue_mode": "hybrid", "ancillary_revenue": 1200, "unknown": true}"#;
        let input: ProjectInput = serde_json::from_str(json).unwrap();
        let p = ParameterSet::from_input(&input).unwrap();
        assert!(matches!(
            p.revenue_mode(),
            RevenueMode::Hybrid { ancillary_revenue, .. } if *ancillary_revenue == dec!(1200)
        ));
    }
}
