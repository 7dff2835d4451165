use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use snafu::Snafu;
use strum::IntoEnumIterator;

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("failed to parse {input:?} as quantity suffix"))]
pub struct ParseSuffixError {
    input: String,
}

/// The suffix of a Kubernetes quantity, as defined by the [serialization format][k8s-serialization-format].
///
/// [k8s-serialization-format]: https://github.com/kubernetes/apimachinery/blob/8c60292e48e46c4faa1e92acb232ce6adb37512c/pkg/api/resource/quantity.go#L37-L59
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suffix {
    BinaryMultiple(BinaryMultiple),
    DecimalMultiple(DecimalMultiple),
    DecimalExponent(DecimalExponent),
}

impl FromStr for Suffix {
    type Err = ParseSuffixError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Ok(binary_si) = BinaryMultiple::from_str(input) {
            return Ok(Self::BinaryMultiple(binary_si));
        }

        if let Ok(decimal_si) = DecimalMultiple::from_str(input) {
            return Ok(Self::DecimalMultiple(decimal_si));
        }

        if let Some(exponent) = input.strip_prefix(['e', 'E']) {
            if let Ok(exponent) = exponent.parse::<i32>() {
                return Ok(Self::DecimalExponent(DecimalExponent(exponent)));
            }
        }

        ParseSuffixSnafu { input }.fail()
    }
}

impl Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BinaryMultiple(binary) => write!(f, "{binary}"),
            Self::DecimalMultiple(decimal) => write!(f, "{decimal}"),
            Self::DecimalExponent(exponent) => write!(f, "e{exponent}"),
        }
    }
}

/// Supported byte-multiples based on powers of 2.
///
/// These units are defined in IEC 80000-13 and are supported by other standards bodies like NIST.
/// The following list contains examples using the official units which Kubernetes adopted with
/// slight changes (mentioned in parentheses).
///
/// ```plain
/// - 1024^1, KiB (Ki), Kibibyte
/// - 1024^2, MiB (Mi), Mebibyte
/// - 1024^3, GiB (Gi), Gibibyte
/// - 1024^4, TiB (Ti), Tebibyte
/// - 1024^5, PiB (Pi), Pebibyte
/// - 1024^6, EiB (Ei), Exbibyte
/// ```
///
/// The variants are declared in ascending order, [`BinaryMultiple::iter`] relies on that.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, strum::Display, strum::EnumString, strum::EnumIter,
)]
pub enum BinaryMultiple {
    #[strum(serialize = "Ki")]
    Kibi,

    #[strum(serialize = "Mi")]
    Mebi,

    #[strum(serialize = "Gi")]
    Gibi,

    #[strum(serialize = "Ti")]
    Tebi,

    #[strum(serialize = "Pi")]
    Pebi,

    #[strum(serialize = "Ei")]
    Exbi,
}

impl BinaryMultiple {
    /// Returns the factor based on powers of 2.
    pub fn factor(&self) -> Decimal {
        Decimal::from(1u64 << self.exponent())
    }

    /// Returns the factor as an integer, which is exact for every binary multiple.
    pub fn integer_factor(&self) -> u64 {
        1u64 << self.exponent()
    }

    fn exponent(self) -> u32 {
        match self {
            Self::Kibi => 10,
            Self::Mebi => 20,
            Self::Gibi => 30,
            Self::Tebi => 40,
            Self::Pebi => 50,
            Self::Exbi => 60,
        }
    }

    /// All binary multiples from the smallest (`Ki`) to the largest (`Ei`).
    pub fn ascending() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

/// Supported byte-multiples based on powers of 10.
///
/// ```plain
/// - 1000^-3,    (n): nanobyte  (Kubernetes only)
/// - 1000^-2,    (u): microbyte (Kubernetes only)
/// - 1000^-1,    (m): millibyte (Kubernetes only)
/// - 1000^ 0,  B ( ): byte      (no suffix)
/// - 1000^ 1, kB (k): kilobyte
/// - 1000^ 2, MB (M): Megabyte
/// - 1000^ 3, GB (G): Gigabyte
/// - 1000^ 4, TB (T): Terabyte
/// - 1000^ 5, PB (P): Petabyte
/// - 1000^ 6, EB (E): Exabyte
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, strum::Display, strum::EnumString)]
pub enum DecimalMultiple {
    #[strum(serialize = "n")]
    Nano,

    #[strum(serialize = "u")]
    Micro,

    #[strum(serialize = "m")]
    Milli,

    #[strum(serialize = "")]
    Empty,

    // (Note that 1024 = 1Ki but 1000 = 1k; I didn't choose the capitalization.)
    #[strum(serialize = "k")]
    Kilo,

    #[strum(serialize = "M")]
    Mega,

    #[strum(serialize = "G")]
    Giga,

    #[strum(serialize = "T")]
    Tera,

    #[strum(serialize = "P")]
    Peta,

    #[strum(serialize = "E")]
    Exa,
}

impl DecimalMultiple {
    pub fn factor(&self) -> Decimal {
        match self {
            Self::Nano => Decimal::new(1, 9),
            Self::Micro => Decimal::new(1, 6),
            Self::Milli => Decimal::new(1, 3),
            Self::Empty => Decimal::ONE,
            Self::Kilo => Decimal::from(1_000u64),
            Self::Mega => Decimal::from(1_000_000u64),
            Self::Giga => Decimal::from(1_000_000_000u64),
            Self::Tera => Decimal::from(1_000_000_000_000u64),
            Self::Peta => Decimal::from(1_000_000_000_000_000u64),
            Self::Exa => Decimal::from(1_000_000_000_000_000_000u64),
        }
    }
}

/// Scientific (also known as E) notation of numbers, e.g. the `e3` in `1e3`.
///
/// Kubernetes only accepts integer exponents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecimalExponent(i32);

impl DecimalExponent {
    pub fn exponent(&self) -> i32 {
        self.0
    }
}

impl Display for DecimalExponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Ki", Suffix::BinaryMultiple(BinaryMultiple::Kibi))]
    #[case("Gi", Suffix::BinaryMultiple(BinaryMultiple::Gibi))]
    #[case("Ei", Suffix::BinaryMultiple(BinaryMultiple::Exbi))]
    #[case("m", Suffix::DecimalMultiple(DecimalMultiple::Milli))]
    #[case("", Suffix::DecimalMultiple(DecimalMultiple::Empty))]
    #[case("E", Suffix::DecimalMultiple(DecimalMultiple::Exa))]
    #[case("e3", Suffix::DecimalExponent(DecimalExponent(3)))]
    #[case("E-2", Suffix::DecimalExponent(DecimalExponent(-2)))]
    fn suffix_from_str_pass(#[case] input: &str, #[case] expected: Suffix) {
        let parsed = Suffix::from_str(input).unwrap();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("KI")]
    #[case("gi")]
    #[case("e1.5")]
    #[case("foo")]
    fn suffix_from_str_fail(#[case] input: &str) {
        assert!(Suffix::from_str(input).is_err());
    }

    #[test]
    fn binary_multiples_ascend() {
        let factors: Vec<u64> = BinaryMultiple::ascending()
            .map(|multiple| multiple.integer_factor())
            .collect();

        assert_eq!(factors.first(), Some(&1024));
        assert!(factors.windows(2).all(|pair| pair[1] == pair[0] * 1024));
    }
}
