use std::{fmt::Display, ops::Deref, str::FromStr};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use snafu::{ResultExt as _, Snafu, ensure};

use crate::quantity::{BinaryMultiple, ParseQuantityError, Quantity};

/// The JVM heap is never sized below 2Mi, even if a (most likely mistyped) tiny memory request
/// like `1Mi` was given.
pub const MIN_JVM_HEAP_BYTES: u64 = 2_097_152;

/// Heaps above 26Gi lose zero-based compressed oops, see <https://www.elastic.co/blog/a-heap-of-trouble>.
pub const MAX_JVM_HEAP_BYTES: u64 = 27_917_287_424;

/// `-Xms` and `-Xmx` require multiples of 1024.
const JVM_HEAP_ALIGNMENT: u64 = 1024;

/// Only a third of the memory goes to the heap, the rest is left for off-heap usage such as
/// machine learning.
const JVM_HEAP_DIVISOR: u64 = 3;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse memory quantity"))]
    ParseQuantity { source: ParseQuantityError },

    #[snafu(display("memory quantity {quantity:?} must not be negative"))]
    NegativeMemory { quantity: String },
}

/// A non-negative amount of memory in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryQuantity(Quantity);

impl Deref for MemoryQuantity {
    type Target = Quantity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for MemoryQuantity {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let quantity = Quantity::from_str(input).context(ParseQuantitySnafu)?;
        ensure!(
            !quantity.value().is_sign_negative() || quantity.value().is_zero(),
            NegativeMemorySnafu { quantity: input }
        );

        Ok(Self(quantity))
    }
}

impl TryFrom<&K8sQuantity> for MemoryQuantity {
    type Error = Error;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

impl Display for MemoryQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.value())
    }
}

impl MemoryQuantity {
    pub fn from_bytes(bytes: u64) -> Self {
        Self(Quantity::from(Decimal::from(bytes)))
    }

    pub fn from_mebi(mebibytes: u64) -> Self {
        Self::from_bytes(mebibytes * BinaryMultiple::Mebi.integer_factor())
    }

    pub fn from_gibi(gibibytes: u64) -> Self {
        Self::from_bytes(gibibytes * BinaryMultiple::Gibi.integer_factor())
    }

    /// Returns the recommended JVM heap size (usable for both `-Xms` and `-Xmx`) for a container
    /// with this amount of memory.
    ///
    /// The heap is a third of the memory, rounded down to a multiple of 1024 and clamped to
    /// [`MIN_JVM_HEAP_BYTES`]..=[`MAX_JVM_HEAP_BYTES`]. The result uses the largest binary unit
    /// that represents the size exactly, without the trailing `i` the JVM does not accept, e.g.
    /// `2Gi` of memory results in `699050K`.
    pub fn jvm_heap_size(&self) -> String {
        let alignment = Decimal::from(JVM_HEAP_ALIGNMENT);
        let third = (self.value() / Decimal::from(JVM_HEAP_DIVISOR)).floor();
        let aligned = (third / alignment).floor() * alignment;

        let min = Decimal::from(MIN_JVM_HEAP_BYTES);
        let max = Decimal::from(MAX_JVM_HEAP_BYTES);
        let heap = if aligned < min {
            MIN_JVM_HEAP_BYTES
        } else if aligned > max {
            MAX_JVM_HEAP_BYTES
        } else {
            // Within the clamp bounds, so this always fits
            aligned.to_u64().unwrap_or(MIN_JVM_HEAP_BYTES)
        };

        let formatted = format_binary_si(heap);
        match formatted.strip_suffix('i') {
            Some(jvm_format) => jvm_format.to_owned(),
            None => formatted,
        }
    }
}

/// Formats a byte count with the largest binary suffix that represents it exactly.
///
/// A count of `999999488` is formatted as `976562Ki` rather than as a (rounded) `Mi` value.
pub fn format_binary_si(bytes: u64) -> String {
    let mut value = bytes;
    let mut suffix = None;

    for multiple in BinaryMultiple::ascending() {
        if value == 0 || value % JVM_HEAP_ALIGNMENT != 0 {
            break;
        }

        value /= JVM_HEAP_ALIGNMENT;
        suffix = Some(multiple);
    }

    match suffix {
        Some(suffix) => format!("{value}{suffix}"),
        None => value.to_string(),
    }
}
