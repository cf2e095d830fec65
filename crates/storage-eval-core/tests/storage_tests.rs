use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storage_eval_core::storage::sensitivity::sensitivity_sweep;
use storage_eval_core::storage::{
    evaluate, extract_metrics, ProjectInput, StorageProject, YearField, YearPhase,
};
use storage_eval_core::StorageEvalError;

/// 100 MW / 200 MWh arbitrage plant with a 10-year battery.
fn reference_project() -> ProjectInput {
    ProjectInput {
        power_mw: Some(dec!(100)),
        capacity_mwh: Some(dec!(200)),
        efficiency: Some(dec!(0.85)),
        static_invest: Some(dec!(30000)),
        revenue_mode: Some("arbitrage".into()),
        cycles_per_year: Some(dec!(330)),
        charge_price: Some(dec!(0.3)),
        discharge_price: Some(dec!(0.9)),
        battery_life: Some(dec!(10)),
        replacement_cost: Some(dec!(21000)),
        replacement_mode: Some("expense".into()),
        ..Default::default()
    }
}

fn lease_project() -> ProjectInput {
    ProjectInput {
        revenue_mode: Some("capacity".into()),
        lease_capacity: Some(dec!(50)),
        lease_price: Some(dec!(200000)),
        ..reference_project()
    }
}

/// Valid inputs whose lease income does not fit in a Decimal.
fn oversized_lease_project() -> ProjectInput {
    let huge = Decimal::from(10u64.pow(15));
    ProjectInput {
        lease_capacity: Some(huge),
        lease_price: Some(huge),
        ..lease_project()
    }
}

// ===========================================================================
// Table structure
// ===========================================================================

#[test]
fn test_twenty_one_rows_with_construction_first() {
    let table = evaluate(&reference_project()).unwrap();
    assert_eq!(table.records.len(), 21);
    for (i, record) in table.records.iter().enumerate() {
        assert_eq!(record.year as usize, i + 1);
    }
    assert_eq!(table.records[0].phase, YearPhase::Construction);
    assert!(table.records[1..]
        .iter()
        .all(|r| r.phase == YearPhase::Operating));
}

#[test]
fn test_construction_year_is_pure_outlay() {
    let table = evaluate(&reference_project()).unwrap();
    let y1 = table.row(1).unwrap();
    assert_eq!(y1.net_cash_flow_before_tax, dec!(-30300));
    assert_eq!(y1.net_cash_flow_after_tax, dec!(-30300));
    for field in YearField::ALL {
        if matches!(
            field,
            YearField::NetCashFlowBeforeTax
                | YearField::NetCashFlowAfterTax
                | YearField::VatCreditBalance
        ) {
            continue;
        }
        assert_eq!(y1.get(field), Decimal::ZERO, "{field} should be zero in year 1");
    }
}

// ===========================================================================
// Tax invariants
// ===========================================================================

#[test]
fn test_vat_split_consistent() {
    for input in [reference_project(), lease_project()] {
        let table = evaluate(&input).unwrap();
        for r in table.operating_records() {
            let rebuilt = r.revenue_excluding_tax * (Decimal::ONE + r.vat_rate);
            assert!(
                (rebuilt - r.revenue_including_tax).abs() < dec!(0.000001),
                "year {}: {} vs {}",
                r.year,
                rebuilt,
                r.revenue_including_tax
            );
            assert_eq!(
                r.output_vat,
                r.revenue_including_tax - r.revenue_excluding_tax
            );
        }
    }
}

#[test]
fn test_vat_credit_pool_monotone() {
    // Large override keeps the pool alive for several years
    let input = ProjectInput {
        deductible_tax: Some(dec!(20000)),
        ..reference_project()
    };
    let table = evaluate(&input).unwrap();
    let balances = table.column(YearField::VatCreditBalance);
    assert_eq!(balances[0], dec!(20000));
    for pair in balances.windows(2) {
        assert!(pair[1] <= pair[0]);
        assert!(pair[1] >= Decimal::ZERO);
    }
    // Fully absorbed before the end of the life
    assert_eq!(*balances.last().unwrap(), Decimal::ZERO);
    // VAT is only paid once the credit runs out
    let first_paying = table
        .operating_records()
        .find(|r| r.vat_payable > Decimal::ZERO)
        .unwrap();
    let previous = table.row(first_paying.year - 1).unwrap();
    assert!(previous.vat_credit_balance < first_paying.output_vat);
}

#[test]
fn test_income_tax_holiday_and_floor() {
    let table = evaluate(&reference_project()).unwrap();
    for r in table.operating_records() {
        let op = r.operating_year.unwrap();
        assert!(r.income_tax >= Decimal::ZERO);
        let expected_rate = match op {
            1..=3 => dec!(0),
            4..=6 => dec!(0.125),
            _ => dec!(0.25),
        };
        assert_eq!(r.income_tax_rate, expected_rate);
        if op <= 3 {
            assert_eq!(r.income_tax, Decimal::ZERO);
        }
    }
}

// ===========================================================================
// Depreciation and replacement
// ===========================================================================

#[test]
fn test_depreciation_windows() {
    let table = evaluate(&reference_project()).unwrap();
    for r in table.operating_records() {
        let op = r.operating_year.unwrap();
        if op > 10 {
            assert_eq!(r.battery_depreciation, Decimal::ZERO);
        } else {
            assert!(r.battery_depreciation > Decimal::ZERO);
        }
        if op > 15 {
            assert_eq!(r.depreciation, Decimal::ZERO);
        }
        assert_eq!(
            r.depreciation,
            r.battery_depreciation + r.non_battery_depreciation
        );
    }

    let battery_total: Decimal = table.column(YearField::BatteryDepreciation).iter().sum();
    let expected = table.fixed_asset_value * dec!(0.6) * dec!(0.95);
    assert!((battery_total - expected).abs() < dec!(0.0001));
}

#[test]
fn test_replacement_years() {
    let table = evaluate(&reference_project()).unwrap();
    let replaced: Vec<u32> = table
        .operating_records()
        .filter(|r| r.battery_replacement > Decimal::ZERO)
        .filter_map(|r| r.operating_year)
        .collect();
    assert_eq!(replaced, vec![10]);

    let frequency = ProjectInput {
        revenue_mode: Some("ancillary".into()),
        ancillary_type: Some("frequency".into()),
        ancillary_revenue: Some(dec!(9000)),
        battery_life: None,
        ..reference_project()
    };
    let table = evaluate(&frequency).unwrap();
    let replaced: Vec<u32> = table
        .operating_records()
        .filter(|r| r.battery_replacement > Decimal::ZERO)
        .filter_map(|r| r.operating_year)
        .collect();
    assert_eq!(replaced, vec![4, 8, 12, 16]);
}

// ===========================================================================
// Revenue modes
// ===========================================================================

#[test]
fn test_capacity_lease_revenue() {
    let table = evaluate(&lease_project()).unwrap();
    for r in table.operating_records() {
        assert_eq!(r.lease_revenue, dec!(10000000));
        assert_eq!(r.revenue_including_tax, dec!(10000000));
        assert_eq!(r.vat_rate, dec!(0.06));
        assert_eq!(r.charge_cost, Decimal::ZERO);
    }
}

#[test]
fn test_hybrid_adds_fixed_ancillary_income() {
    let arbitrage = evaluate(&reference_project()).unwrap();
    let hybrid = evaluate(&ProjectInput {
        revenue_mode: Some("hybrid".into()),
        ancillary_revenue: Some(dec!(800)),
        ..reference_project()
    })
    .unwrap();
    let a = arbitrage.row(5).unwrap();
    let h = hybrid.row(5).unwrap();
    assert_eq!(h.revenue_including_tax - a.revenue_including_tax, dec!(800));
    assert_eq!(h.charge_cost, a.charge_cost);
}

// ===========================================================================
// Metrics and lifecycle
// ===========================================================================

#[test]
fn test_reference_metrics() {
    let table = evaluate(&reference_project()).unwrap();
    let metrics = extract_metrics(&table).unwrap();
    assert_eq!(metrics.total_investment, dec!(30888));
    assert_eq!(metrics.construction_interest, dec!(588));
    assert!(metrics.pre_tax_irr_pct > dec!(50));
    assert!(metrics.post_tax_irr_pct < metrics.pre_tax_irr_pct);
    assert!(metrics.payback_years > Decimal::ONE && metrics.payback_years < dec!(3));
}

#[test]
fn test_loss_making_project_never_pays_back() {
    let input = ProjectInput {
        charge_price: Some(dec!(0.9)),
        discharge_price: Some(dec!(0.3)),
        ..reference_project()
    };
    let table = evaluate(&input).unwrap();
    let cumulative: Decimal = table.after_tax_cash_flows().iter().sum();
    assert!(cumulative < Decimal::ZERO);
    // No sign change in the series: the IRR is undefined
    let err = extract_metrics(&table).unwrap_err();
    assert!(matches!(err, StorageEvalError::Calculation { .. }));
}

#[test]
fn test_capacity_lease_metrics_above_ten_thousand_percent() {
    let table = evaluate(&lease_project()).unwrap();
    let metrics = extract_metrics(&table).unwrap();
    // ~9.9M a year back on a 30.3k outlay
    assert!(metrics.pre_tax_irr_pct > dec!(10000));
    assert!(metrics.pre_tax_irr_pct < dec!(100000));
    assert!(metrics.post_tax_irr_pct <= metrics.pre_tax_irr_pct);
    assert!(metrics.payback_years < Decimal::ONE);
}

#[test]
fn test_payback_reported_when_irr_undefined() {
    let mut project = StorageProject::new(&ProjectInput {
        charge_price: Some(dec!(0.9)),
        discharge_price: Some(dec!(0.3)),
        ..reference_project()
    })
    .unwrap();
    project.calculate().unwrap();
    assert!(project.metrics().is_err());
    assert_eq!(project.payback_period().unwrap(), dec!(99.9));
}

#[test]
fn test_project_lifecycle() {
    let mut project = StorageProject::new(&reference_project()).unwrap();
    assert!(matches!(
        project.metrics(),
        Err(StorageEvalError::TableNotBuilt)
    ));
    project.calculate().unwrap();
    let first = project.metrics().unwrap();
    project.calculate().unwrap();
    assert_eq!(project.metrics().unwrap(), first);
}

#[test]
fn test_identical_inputs_identical_tables() {
    assert_eq!(
        evaluate(&reference_project()).unwrap(),
        evaluate(&reference_project()).unwrap()
    );
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn test_all_missing_keys_reported_together() {
    let err = evaluate(&ProjectInput {
        revenue_mode: Some("capacity".into()),
        ..Default::default()
    })
    .unwrap_err();
    let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
    for expected in [
        "power_mw",
        "capacity_mwh",
        "static_invest",
        "lease_capacity",
        "lease_price",
    ] {
        assert!(fields.contains(&expected), "missing {expected} in {fields:?}");
    }
}

#[test]
fn test_json_input_accepts_numbers_and_strings() {
    let input: ProjectInput = serde_json::from_str(
        r#"{
            "power_mw": 100,
            "capacity_mwh": "200",
            "static_invest": 30000,
            "efficiency": 0.85,
            "revenue_mode": "arbitrage",
            "unknown_key": true
        }"#,
    )
    .unwrap();
    assert_eq!(input.power_mw, Some(dec!(100)));
    assert_eq!(input.capacity_mwh, Some(dec!(200)));
    assert_eq!(evaluate(&input).unwrap().records.len(), 21);
}

// ===========================================================================
// Failure policy
// ===========================================================================

#[test]
fn test_arithmetic_overflow_fails_build_as_calculation() {
    let err = evaluate(&oversized_lease_project()).unwrap_err();
    match err {
        StorageEvalError::Calculation { stage, source } => {
            assert_eq!(stage, "revenue for year 2");
            assert!(matches!(*source, StorageEvalError::Overflow { .. }));
        }
        other => panic!("expected a calculation failure, got {other:?}"),
    }
}

#[test]
fn test_failed_build_leaves_no_table() {
    let mut project = StorageProject::new(&oversized_lease_project()).unwrap();
    assert!(matches!(
        project.calculate(),
        Err(StorageEvalError::Calculation { .. })
    ));
    assert!(project.table().is_none());
    assert!(matches!(
        project.metrics(),
        Err(StorageEvalError::TableNotBuilt)
    ));
}

#[test]
fn test_sweep_records_overflowing_step_as_none() {
    // Base lease price 200 000 × (1 + 1e23) fits in a Decimal; 50 MW of it
    // does not
    let range = Decimal::from(10u64.pow(15)) * Decimal::from(10u64.pow(8));
    let points = sensitivity_sweep(&lease_project(), "lease_price", range, 3).unwrap();
    assert_eq!(points.len(), 3);
    assert!(points[1].pre_tax_irr.is_some());
    assert!(points[2].pre_tax_irr.is_none());

    let err = evaluate(&ProjectInput {
        lease_price: Some(points[2].value),
        ..lease_project()
    })
    .unwrap_err();
    assert!(matches!(err, StorageEvalError::Calculation { .. }));
}
