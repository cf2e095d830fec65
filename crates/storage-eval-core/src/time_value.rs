use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::StorageEvalError;
use crate::types::{Money, Rate};
use crate::StorageEvalResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const RATE_TOLERANCE: Decimal = dec!(0.000000000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;

/// Lowest discount rate the IRR search will consider.
const IRR_RATE_FLOOR: Rate = dec!(-0.9);
/// Upper end of the initial IRR bracket and of Newton's steps.
const IRR_RATE_CEILING: Rate = dec!(100);
/// The upper bracket is widened by this factor while NPV stays positive.
const IRR_WIDENING_FACTOR: Decimal = dec!(10);
/// Rates beyond this are treated as having no root.
const IRR_RATE_LIMIT: Rate = dec!(1000000000);

/// Net Present Value of a series of cash flows, first flow undiscounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> StorageEvalResult<Money> {
    if rate <= dec!(-1) {
        return Err(StorageEvalError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_and_slope(rate, cash_flows)
        .map(|(value, _)| value)
        .ok_or_else(|| StorageEvalError::DivisionByZero {
            context: format!("NPV discount factors at rate {rate}"),
        })
}

/// Internal Rate of Return using Newton-Raphson, falling back to bisection
/// when Newton leaves the representable range or stalls.
pub fn irr(cash_flows: &[Money], guess: Rate) -> StorageEvalResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(StorageEvalError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }
    let has_inflow = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_outflow = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !has_inflow || !has_outflow {
        return Err(StorageEvalError::InsufficientData(
            "IRR requires at least one positive and one negative cash flow".into(),
        ));
    }

    let mut rate = guess.clamp(IRR_RATE_FLOOR, IRR_RATE_CEILING);

    for _ in 0..MAX_IRR_ITERATIONS {
        let Some((npv_val, dnpv)) = npv_and_slope(rate, cash_flows) else {
            break;
        };

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            break;
        }

        let Some(step) = npv_val.checked_div(dnpv) else {
            break;
        };
        rate = (rate - step).clamp(IRR_RATE_FLOOR, IRR_RATE_CEILING);
    }

    bisect_irr(cash_flows, guess)
}

/// Bracketed search starting from [floor, ceiling]. Endpoints whose NPV
/// cannot be represented are pulled towards the guess until they can. When
/// NPV is still positive at the ceiling the root lies above it, so the
/// bracket moves up geometrically until NPV turns or the rate limit is hit.
fn bisect_irr(cash_flows: &[Money], guess: Rate) -> StorageEvalResult<Rate> {
    let anchor = guess.clamp(IRR_RATE_FLOOR, IRR_RATE_CEILING);
    let (mut lo, mut npv_lo) = evaluable_endpoint(cash_flows, IRR_RATE_FLOOR, anchor)?;
    let (mut hi, mut npv_hi) = evaluable_endpoint(cash_flows, IRR_RATE_CEILING, anchor)?;

    while npv_lo > Decimal::ZERO && npv_hi > Decimal::ZERO && hi < IRR_RATE_LIMIT {
        let wider = hi * IRR_WIDENING_FACTOR;
        let Some((value, _)) = npv_and_slope(wider, cash_flows) else {
            break;
        };
        lo = hi;
        npv_lo = npv_hi;
        hi = wider;
        npv_hi = value;
    }

    if npv_lo.is_zero() {
        return Ok(lo);
    }
    if npv_hi.is_zero() {
        return Ok(hi);
    }
    if npv_lo.is_sign_negative() == npv_hi.is_sign_negative() {
        return Err(StorageEvalError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: 0,
            last_delta: npv_lo.abs().min(npv_hi.abs()),
        });
    }

    let mut last_delta = npv_lo;
    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let npv_mid = npv_and_slope(mid, cash_flows)
            .map(|(v, _)| v)
            .ok_or_else(|| StorageEvalError::DivisionByZero {
                context: format!("IRR bisection at rate {mid}"),
            })?;
        last_delta = npv_mid;

        if npv_mid.abs() < CONVERGENCE_THRESHOLD || (hi - lo) < RATE_TOLERANCE {
            return Ok(mid);
        }

        if npv_mid.is_sign_negative() == npv_lo.is_sign_negative() {
            lo = mid;
            npv_lo = npv_mid;
        } else {
            hi = mid;
        }
    }

    Err(StorageEvalError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS + MAX_BISECTION_ITERATIONS,
        last_delta,
    })
}

fn evaluable_endpoint(
    cash_flows: &[Money],
    start: Rate,
    anchor: Rate,
) -> StorageEvalResult<(Rate, Money)> {
    let mut rate = start;
    for _ in 0..40 {
        if let Some((value, _)) = npv_and_slope(rate, cash_flows) {
            return Ok((rate, value));
        }
        rate = (rate + anchor) / dec!(2);
    }
    Err(StorageEvalError::DivisionByZero {
        context: format!("IRR bracket endpoint near {start}"),
    })
}

/// NPV and its derivative with respect to the rate, using iterative discount
/// factors. Once a discount factor exceeds the Decimal range the remaining
/// terms are below its precision and are dropped. `None` when a term itself
/// overflows or a factor vanishes.
fn npv_and_slope(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            match discount.checked_mul(one_plus_r) {
                Some(d) => discount = d,
                None => break,
            }
        }
        if discount.is_zero() {
            return None;
        }
        value = value.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let Some(denom) = discount.checked_mul(one_plus_r) else {
                break;
            };
            let t_dec = Decimal::from(t as u64);
            slope = slope.checked_sub(t_dec.checked_mul(*cf)?.checked_div(denom)?)?;
        }
    }

    Some((value, slope))
}
