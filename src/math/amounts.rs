// Human token amounts -> base-unit integers.
//
// The f64 input is first turned into an exact decimal through its shortest round-tripping
// text form, then scaled by 10^decimals with big-integer arithmetic, so 1.5 with 6
// decimals is exactly 1_500_000 rather than whatever 1.5 * 1e6 happens to truncate to.
//
// Zero, negative, NaN and infinite amounts encode to "0x0": that is how a caller says
// "no deposit on this side", not an error.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{FromPrimitive, One, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

/// Amount in a token's smallest unit. Serialized as a `0x`-prefixed lowercase hex string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct BaseUnitAmount(BigUint);

impl BaseUnitAmount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl From<BigUint> for BaseUnitAmount {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<u64> for BaseUnitAmount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl fmt::Display for BaseUnitAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl Serialize for BaseUnitAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

fn pow10(exp: u32) -> BigUint {
    num_traits::pow(BigUint::from(10u8), exp as usize)
}

/// `round(value * 10^decimals)` with ties away from zero. `value` must be positive.
fn scale_decimal(value: Decimal, decimals: u32) -> BaseUnitAmount {
    let mantissa = value.mantissa();
    if mantissa <= 0 {
        return BaseUnitAmount::zero();
    }
    let mantissa = BigUint::from(mantissa as u128);
    let scale = value.scale();

    if decimals >= scale {
        return BaseUnitAmount(mantissa * pow10(decimals - scale));
    }

    let divisor = pow10(scale - decimals);
    let (mut quotient, remainder) = mantissa.div_rem(&divisor);
    if remainder * 2u8 >= divisor {
        quotient += BigUint::one();
    }
    BaseUnitAmount(quotient)
}

/// Encodes a human amount of a token with `decimals` places.
pub fn encode(amount: f64, decimals: u32) -> BaseUnitAmount {
    if !amount.is_finite() || amount <= 0.0 {
        return BaseUnitAmount::zero();
    }

    match Decimal::from_str(&amount.to_string()) {
        Ok(exact) => scale_decimal(exact, decimals),
        Err(_) => {
            // Beyond Decimal's 96-bit mantissa; precision is already lost in the f64.
            let scaled = (amount * 10f64.powi(decimals as i32)).round();
            BigUint::from_f64(scaled)
                .map(BaseUnitAmount)
                .unwrap_or_default()
        }
    }
}

/// Encodes a typed-in amount. Text that is not a number encodes to zero, like a
/// non-positive number does.
pub fn encode_str(input: &str, decimals: u32) -> BaseUnitAmount {
    let trimmed = input.trim();
    if let Ok(exact) = Decimal::from_str(trimmed) {
        if exact.is_sign_negative() || exact.is_zero() {
            return BaseUnitAmount::zero();
        }
        return scale_decimal(exact, decimals);
    }
    match trimmed.parse::<f64>() {
        Ok(amount) => encode(amount, decimals),
        Err(_) => {
            log::debug!("Amount {:?} is not numeric; encoding as zero", input);
            BaseUnitAmount::zero()
        }
    }
}

/// A deposit as the user gave it: a JSON number or typed text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HumanAmount {
    Number(f64),
    Text(String),
}

impl HumanAmount {
    pub fn encode(&self, decimals: u32) -> BaseUnitAmount {
        match self {
            HumanAmount::Number(amount) => encode(*amount, decimals),
            HumanAmount::Text(text) => encode_str(text, decimals),
        }
    }
}

impl Default for HumanAmount {
    fn default() -> Self {
        HumanAmount::Number(0.0)
    }
}

impl From<f64> for HumanAmount {
    fn from(amount: f64) -> Self {
        HumanAmount::Number(amount)
    }
}

impl From<&str> for HumanAmount {
    fn from(text: &str) -> Self {
        HumanAmount::Text(text.to_string())
    }
}

impl From<String> for HumanAmount {
    fn from(text: String) -> Self {
        HumanAmount::Text(text)
    }
}

impl fmt::Display for HumanAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HumanAmount::Number(amount) => write!(f, "{}", amount),
            HumanAmount::Text(text) => f.write_str(text.trim()),
        }
    }
}
