// Tick range resolution for position inputs.
//
// A reference tick plus "x% below / y% above" (either side may be unbounded) becomes a
// spacing-aligned [lower, upper) pair inside the usable tick bounds. The lower edge is
// floored and the upper edge is ceiled so alignment only ever widens what was asked for.

use std::fmt;

use num_integer::Integer;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{RangeError, Side};
use crate::math::tick_math::{tick_offset_above, tick_offset_below, MAX_TICK, MIN_TICK};

/// Minimum distance between usable position ticks for a fee tier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TickSpacing(i32);

impl TickSpacing {
    pub fn new(spacing: i32) -> Result<Self, RangeError> {
        if spacing <= 0 {
            return Err(RangeError::InvalidSpacing(spacing));
        }
        Ok(Self(spacing))
    }

    /// Spacing for a pool fee (hundredths of a bip). Unknown tiers fall back to 60.
    pub fn from_fee(fee: u32) -> Self {
        match fee {
            500 => Self(10),
            3000 => Self(60),
            10000 => Self(200),
            _ => Self(60),
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TickSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How far a position edge sits from the reference price.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PriceOffsetSpec {
    /// Run to the protocol tick limit on this side.
    Unbounded,
    /// Percentage away from the reference price.
    Percentage(f64),
}

impl PriceOffsetSpec {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, PriceOffsetSpec::Unbounded)
    }

    /// Parses prompt/form input. `infinite`, `unbounded` and `inf` mean no bound.
    pub fn parse(side: Side, input: &str) -> Result<Self, RangeError> {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "infinite" | "unbounded" | "inf" => Ok(PriceOffsetSpec::Unbounded),
            _ => trimmed
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|pct| pct.is_finite())
                .map(PriceOffsetSpec::Percentage)
                .ok_or_else(|| RangeError::UnparsableOffset {
                    side,
                    input: input.to_string(),
                }),
        }
    }
}

impl fmt::Display for PriceOffsetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceOffsetSpec::Unbounded => f.write_str("infinite"),
            PriceOffsetSpec::Percentage(pct) => write!(f, "{}%", pct),
        }
    }
}

impl Serialize for PriceOffsetSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PriceOffsetSpec::Unbounded => serializer.serialize_str("infinite"),
            PriceOffsetSpec::Percentage(pct) => serializer.serialize_f64(*pct),
        }
    }
}

impl<'de> Deserialize<'de> for PriceOffsetSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(pct) => Ok(PriceOffsetSpec::Percentage(pct)),
            Raw::Text(text) => PriceOffsetSpec::parse(Side::Below, &text).map_err(|_| {
                serde::de::Error::custom(format!(
                    "expected a percentage or \"infinite\", got {:?}",
                    text
                ))
            }),
        }
    }
}

/// Aligned position bounds, `lower < upper`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    pub fn width(&self) -> i64 {
        self.upper as i64 - self.lower as i64
    }

    pub fn contains(&self, tick: i32) -> bool {
        self.lower <= tick && tick <= self.upper
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.lower, self.upper)
    }
}

/// Legal tick interval for the target chain's pools.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickBounds {
    pub min_tick: i32,
    pub max_tick: i32,
}

impl Default for TickBounds {
    fn default() -> Self {
        Self { min_tick: MIN_TICK, max_tick: MAX_TICK }
    }
}

impl TickBounds {
    /// Lowest tick usable as a position edge with `spacing`.
    pub fn min_usable(&self, spacing: TickSpacing) -> i64 {
        ceil_to_spacing(self.min_tick as i64, spacing.get() as i64)
    }

    /// Highest tick usable as a position edge with `spacing`.
    pub fn max_usable(&self, spacing: TickSpacing) -> i64 {
        floor_to_spacing(self.max_tick as i64, spacing.get() as i64)
    }
}

#[inline]
fn floor_to_spacing(tick: i64, spacing: i64) -> i64 {
    Integer::div_floor(&tick, &spacing) * spacing
}

#[inline]
fn ceil_to_spacing(tick: i64, spacing: i64) -> i64 {
    -floor_to_spacing(-tick, spacing)
}

/// Turns percentage specs into aligned tick ranges. Holds only the injected bounds, so one
/// resolver can serve the current-tick and entry-tick passes independently.
#[derive(Copy, Clone, Debug, Default)]
pub struct TickRangeResolver {
    bounds: TickBounds,
}

impl TickRangeResolver {
    pub fn new(bounds: TickBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> TickBounds {
        self.bounds
    }

    /// Unaligned edges, before spacing is applied.
    pub fn raw_bounds(
        &self,
        reference_tick: i32,
        below: PriceOffsetSpec,
        above: PriceOffsetSpec,
    ) -> Result<(i64, i64), RangeError> {
        let reference = reference_tick as i64;

        let raw_lower = match below {
            PriceOffsetSpec::Unbounded => self.bounds.min_tick as i64,
            PriceOffsetSpec::Percentage(pct) => reference + tick_offset_below(pct)?,
        };
        let raw_upper = match above {
            PriceOffsetSpec::Unbounded => self.bounds.max_tick as i64,
            PriceOffsetSpec::Percentage(pct) => reference + tick_offset_above(pct)?,
        };

        Ok((raw_lower, raw_upper))
    }

    /// Resolves an aligned range around `reference_tick`.
    ///
    /// Edges past the protocol limits are pulled back to the outermost usable tick for the
    /// spacing, which keeps them both in bounds and aligned.
    pub fn resolve(
        &self,
        reference_tick: i32,
        spacing: TickSpacing,
        below: PriceOffsetSpec,
        above: PriceOffsetSpec,
    ) -> Result<TickRange, RangeError> {
        let (raw_lower, raw_upper) = self.raw_bounds(reference_tick, below, above)?;
        let step = spacing.get() as i64;

        let lower = floor_to_spacing(raw_lower, step).max(self.bounds.min_usable(spacing));
        let upper = ceil_to_spacing(raw_upper, step).min(self.bounds.max_usable(spacing));

        if lower >= upper {
            return Err(RangeError::InvalidTickRange {
                lower: saturate(lower),
                upper: saturate(upper),
                spacing: spacing.get(),
                below: below.to_string(),
                above: above.to_string(),
            });
        }

        Ok(TickRange { lower: lower as i32, upper: upper as i32 })
    }
}

#[inline]
fn saturate(tick: i64) -> i32 {
    tick.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
