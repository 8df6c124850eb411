//! The coefficient rings a complex can be reduced over.
//!
//! The reducer never inspects the structure of a ring beyond the operations
//! here. Two instantiations are provided: plain integers, and the group ring
//! Z\[t\]/(t² − 1) used by the unified theories.

use std::fmt::Debug;
use std::ops::{Add, Mul, Neg};

/// Value contract for matrix entries.
///
/// `magnitude` is the non-negative size used both for the overflow guard and
/// for pivot detection: a value of magnitude 1 is a unit of the ring, and for
/// the supported rings every unit is its own inverse up to sign, so a pivot
/// can be cleared by negate-and-multiply alone.
pub trait Coefficient:
    Debug + Copy + Eq + Add<Output = Self> + Mul<Output = Self> + Neg<Output = Self>
{
    /// Largest magnitude an entry may reach before reduction aborts.
    ///
    /// Bounded so that a product of two in-range values, or a sum of two such
    /// products, cannot wrap an `i64`; the overflow guard in the sparse layer
    /// is therefore an honest check and never undefined behavior.
    const MAX_MAGNITUDE: i64 = i32::MAX as i64;

    fn zero() -> Self;

    fn one() -> Self;

    fn is_zero(self) -> bool {
        self == Self::zero()
    }

    fn magnitude(self) -> i64;

    /// Whether the value can serve as an elimination pivot.
    fn is_unit(self) -> bool {
        self.magnitude() == 1
    }
}

impl Coefficient for i64 {
    fn zero() -> Self {
        0
    }

    fn one() -> Self {
        1
    }

    fn magnitude(self) -> i64 {
        self.abs()
    }
}

/// An element `a + b·t` of Z\[t\]/(t² − 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRing {
    pub a: i64,
    pub b: i64,
}

impl GroupRing {
    pub const fn new(a: i64, b: i64) -> Self {
        GroupRing { a, b }
    }

    /// The generator `t`.
    pub const fn t() -> Self {
        GroupRing { a: 0, b: 1 }
    }
}

impl Add for GroupRing {
    type Output = GroupRing;

    fn add(self, rhs: GroupRing) -> GroupRing {
        GroupRing::new(self.a + rhs.a, self.b + rhs.b)
    }
}

impl Mul for GroupRing {
    type Output = GroupRing;

    // (a + bt)(c + dt) = ac + bd + (ad + bc)t, since t² = 1
    fn mul(self, rhs: GroupRing) -> GroupRing {
        GroupRing::new(
            self.a * rhs.a + self.b * rhs.b,
            self.a * rhs.b + self.b * rhs.a,
        )
    }
}

impl Neg for GroupRing {
    type Output = GroupRing;

    fn neg(self) -> GroupRing {
        GroupRing::new(-self.a, -self.b)
    }
}

impl Coefficient for GroupRing {
    fn zero() -> Self {
        GroupRing::new(0, 0)
    }

    fn one() -> Self {
        GroupRing::new(1, 0)
    }

    fn magnitude(self) -> i64 {
        self.a.abs().max(self.b.abs())
    }
}
