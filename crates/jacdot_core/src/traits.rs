use num_traits::{Float, One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A trait for types the bytecode VM can evaluate expressions over.
/// Implemented for `f64` and for the forward-mode `Dual` number.
pub trait Scalar:
    Copy
    + Debug
    + PartialOrd
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Lifts a literal into the scalar type.
    fn constant(value: f64) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn powf(self, n: Self) -> Self;
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self {
        value
    }
    fn sin(self) -> Self {
        Float::sin(self)
    }
    fn cos(self) -> Self {
        Float::cos(self)
    }
    fn exp(self) -> Self {
        Float::exp(self)
    }
    fn ln(self) -> Self {
        Float::ln(self)
    }
    fn sqrt(self) -> Self {
        Float::sqrt(self)
    }
    fn powi(self, n: i32) -> Self {
        Float::powi(self, n)
    }
    fn powf(self, n: Self) -> Self {
        Float::powf(self, n)
    }
}

/// A scalar quantity sampled along time, e.g. the rotation angle θ(t).
pub trait ScalarPath<T: Scalar> {
    fn at(&self, t: T) -> T;
}

/// A 3-vector sampled along time, e.g. the exponential coordinates φ(t).
pub trait VectorPath<T: Scalar> {
    fn at(&self, t: T) -> [T; 3];
}
