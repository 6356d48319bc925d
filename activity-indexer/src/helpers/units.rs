use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};

/// Decimals of the chain's native unit (wei -> ether).
pub const NATIVE_DECIMALS: i64 = 18;

/// Converts an integer amount expressed in the smallest unit into a decimal
/// with `decimals` fractional digits.
pub fn format_units(value: U256, decimals: i64) -> BigDecimal {
    let digits = BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>());
    BigDecimal::new(digits, decimals)
}

pub fn format_ether(value: U256) -> BigDecimal {
    format_units(value, NATIVE_DECIMALS)
}

pub fn u256_to_decimal(value: U256) -> BigDecimal {
    format_units(value, 0)
}
