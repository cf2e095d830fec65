//! Decimal arithmetic that reports overflow as an error instead of panicking.
//!
//! Every amount in a table is derived from caller-supplied magnitudes, so
//! products and running sums along the build path go through these helpers.

use rust_decimal::Decimal;

use crate::error::StorageEvalError;
use crate::StorageEvalResult;

fn overflow(context: &str) -> StorageEvalError {
    StorageEvalError::Overflow {
        context: context.to_string(),
    }
}

pub fn add(a: Decimal, b: Decimal, context: &str) -> StorageEvalResult<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(context))
}

pub fn sub(a: Decimal, b: Decimal, context: &str) -> StorageEvalResult<Decimal> {
    a.checked_sub(b).ok_or_else(|| overflow(context))
}

pub fn mul(a: Decimal, b: Decimal, context: &str) -> StorageEvalResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(context))
}

/// Quotient, or `DivisionByZero` for a zero divisor.
pub fn div(a: Decimal, b: Decimal, context: &str) -> StorageEvalResult<Decimal> {
    if b.is_zero() {
        return Err(StorageEvalError::DivisionByZero {
            context: context.to_string(),
        });
    }
    a.checked_div(b).ok_or_else(|| overflow(context))
}

pub fn sum<I>(values: I, context: &str) -> StorageEvalResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| add(acc, v, context))
}

pub fn product<I>(values: I, context: &str) -> StorageEvalResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ONE, |acc, v| mul(acc, v, context))
}
