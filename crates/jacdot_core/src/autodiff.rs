use crate::traits::Scalar;
use num_traits::{One, Zero};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Simple Dual Number for Forward Mode AD
/// val: real part
/// eps: infinitesimal part
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    /// Seeds the independent variable: d(val)/d(val) = 1.
    pub fn variable(val: f64) -> Self {
        Self::new(val, 1.0)
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.val * rhs.val;
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / denom,
        )
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl Scalar for Dual {
    fn constant(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    fn sin(self) -> Self {
        Self::new(self.val.sin(), self.eps * self.val.cos())
    }

    fn cos(self) -> Self {
        Self::new(self.val.cos(), -self.eps * self.val.sin())
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        Self::new(e, e * self.eps)
    }

    fn ln(self) -> Self {
        Self::new(self.val.ln(), self.eps / self.val)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        Self::new(s, self.eps / (2.0 * s))
    }

    fn powi(self, n: i32) -> Self {
        let val_pow = self.val.powi(n);
        Self::new(val_pow, (n as f64) * self.val.powi(n - 1) * self.eps)
    }

    fn powf(self, n: Self) -> Self {
        // x^y = exp(y * ln(x)); the ln term only matters when the exponent carries a tangent.
        let val_pow = self.val.powf(n.val);
        let mut eps_new = n.val * self.val.powf(n.val - 1.0) * self.eps;
        if n.eps != 0.0 {
            eps_new += val_pow * self.val.ln() * n.eps;
        }
        Self::new(val_pow, eps_new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_rule_through_operators() {
        let x = Dual::variable(3.0);
        let y = x * x + Dual::constant(2.0) * x;
        assert_eq!(y.val, 15.0);
        assert_eq!(y.eps, 8.0);
    }

    #[test]
    fn quotient_and_trig_derivatives() {
        let x = Dual::variable(0.7);
        let y = x.sin() / x;
        let expected = (0.7_f64 * 0.7_f64.cos() - 0.7_f64.sin()) / (0.7 * 0.7);
        assert!((y.eps - expected).abs() < 1e-14);
    }

    #[test]
    fn powers_match_closed_forms() {
        let x = Dual::variable(2.0);
        assert!((x.powi(-2).eps + 2.0 / 8.0).abs() < 1e-15);
        assert!((x.sqrt().eps - 0.5 / 2.0_f64.sqrt()).abs() < 1e-15);
        assert!((x.powf(Dual::constant(0.5)).eps - x.sqrt().eps).abs() < 1e-15);
    }

    #[test]
    fn powf_is_defined_at_zero_base_for_constant_exponent() {
        let y = Dual::new(0.0, 0.0).powf(Dual::constant(2.0));
        assert_eq!(y.val, 0.0);
        assert!(y.eps.is_finite());
    }
}
