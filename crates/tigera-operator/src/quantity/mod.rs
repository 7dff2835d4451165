//! Exact parsing of Kubernetes [quantities][k8s-quantity].
//!
//! Unlike a floating point representation, the parsed value is an exact [`Decimal`], so that
//! derived sizes (e.g. the JVM heap, see [`MemoryQuantity::jvm_heap_size`]) are rounded the
//! same way on every platform.
//!
//! [k8s-quantity]: https://github.com/kubernetes/apimachinery/blob/master/pkg/api/resource/quantity.go

use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use rust_decimal::Decimal;
use snafu::{OptionExt, ResultExt as _, Snafu, ensure};

mod memory;
mod suffix;

pub use memory::*;
pub use suffix::*;

/// Decimal exponents beyond this magnitude can not be represented by [`Decimal`].
const MAX_DECIMAL_EXPONENT: i32 = 28;

#[derive(Debug, Snafu)]
pub enum ParseQuantityError {
    #[snafu(display("input is either empty or contains non-ascii characters"))]
    InvalidFormat,

    #[snafu(display("failed to parse {input:?} as decimal number"))]
    InvalidNumber {
        source: rust_decimal::Error,
        input: String,
    },

    #[snafu(display("failed to parse suffix"))]
    InvalidSuffix { source: ParseSuffixError },

    #[snafu(display("quantity {input:?} is out of the supported range"))]
    OutOfRange { input: String },
}

/// A Kubernetes quantity with the suffix already applied, e.g. `1Ki` is stored as `1024`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity {
    value: Decimal,
}

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ensure!(!input.is_empty() && input.is_ascii(), InvalidFormatSnafu);

        let suffix_index = input
            .find(|c: char| !matches!(c, '+' | '-' | '.' | '0'..='9'))
            .unwrap_or(input.len());
        let (number, suffix) = input.split_at(suffix_index);

        let value = parse_number(number)?;
        let suffix = Suffix::from_str(suffix).context(InvalidSuffixSnafu)?;

        let value = apply_suffix(value, suffix).context(OutOfRangeSnafu { input })?;
        Ok(Self { value })
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = ParseQuantityError;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

impl TryFrom<K8sQuantity> for Quantity {
    type Error = ParseQuantityError;

    fn try_from(value: K8sQuantity) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self { value }
    }
}

impl Quantity {
    /// The exact value in base units (bytes for memory, cores for CPU).
    pub fn value(&self) -> Decimal {
        self.value
    }
}

/// Parses the `<signedNumber>` part of a quantity.
///
/// Kubernetes accepts a leading `+`, a leading `.` (`.5`) and a trailing `.` (`5.`), which the
/// [`Decimal`] parser does not, so these are normalized first.
fn parse_number(number: &str) -> Result<Decimal, ParseQuantityError> {
    let unsigned = number.strip_prefix('+').unwrap_or(number);
    let (negative, digits) = match unsigned.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, unsigned),
    };

    let digits = digits.strip_suffix('.').unwrap_or(digits);
    let normalized = if digits.starts_with('.') {
        format!("0{digits}")
    } else {
        digits.to_owned()
    };

    let value = Decimal::from_str(&normalized).context(InvalidNumberSnafu { input: number })?;
    Ok(if negative { -value } else { value })
}

fn apply_suffix(value: Decimal, suffix: Suffix) -> Option<Decimal> {
    match suffix {
        Suffix::BinaryMultiple(multiple) => value.checked_mul(multiple.factor()),
        Suffix::DecimalMultiple(multiple) => value.checked_mul(multiple.factor()),
        Suffix::DecimalExponent(exponent) => {
            let exponent = exponent.exponent();
            if exponent.abs() > MAX_DECIMAL_EXPONENT {
                return None;
            }

            (0..exponent.unsigned_abs()).try_fold(value, |value, _| {
                if exponent.is_negative() {
                    value.checked_div(Decimal::TEN)
                } else {
                    value.checked_mul(Decimal::TEN)
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("0", Decimal::ZERO)]
    #[case("1000", Decimal::from(1000))]
    #[case("2Gi", Decimal::from(2_147_483_648u64))]
    #[case("1.5Gi", Decimal::from(1_610_612_736u64))]
    #[case("2G", Decimal::from(2_000_000_000u64))]
    #[case("100m", Decimal::new(1, 1))]
    #[case("1e3", Decimal::from(1000))]
    #[case("15E-1", Decimal::new(15, 1))]
    #[case(".5Ki", Decimal::from(512))]
    #[case("+1Mi", Decimal::from(1_048_576))]
    #[case("-1k", Decimal::from(-1000))]
    fn quantity_from_str_pass(#[case] input: &str, #[case] expected: Decimal) {
        let parsed = Quantity::from_str(input).unwrap();
        assert_eq!(parsed.value(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("Gi")]
    #[case("1..2Gi")]
    #[case("2gi")]
    #[case("1e99")]
    #[case("1ü")]
    fn quantity_from_str_fail(#[case] input: &str) {
        assert!(Quantity::from_str(input).is_err());
    }

    #[test]
    fn quantity_from_k8s_quantity() {
        let parsed = Quantity::try_from(&K8sQuantity("3Gi".to_owned())).unwrap();
        assert_eq!(parsed.value(), Decimal::from(3 * 1024 * 1024 * 1024u64));
    }
}
