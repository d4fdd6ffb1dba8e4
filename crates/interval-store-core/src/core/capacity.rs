// crates/interval-store-core/src/core/capacity.rs
// ============================================================================
// Module: Consumed Capacity
// Description: Store-reported resource usage units.
// Purpose: Aggregate capacity telemetry across calls, pages, and retries.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Consumed capacity is reported by the store per call and summed here for
//! observability only; no correctness decision depends on it.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::ops::AddAssign;

use serde::Deserialize;
use serde::Serialize;

/// Store capacity units consumed by one or more calls.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacityUnits(f64);

impl CapacityUnits {
    /// Zero consumed units.
    pub const ZERO: Self = Self(0.0);

    /// Creates a capacity value.
    #[must_use]
    pub const fn new(units: f64) -> Self {
        Self(units)
    }

    /// Returns the raw unit count.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Add for CapacityUnits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for CapacityUnits {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for CapacityUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for CapacityUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
