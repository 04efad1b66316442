//! Numeric spot-checks of the rendered derivation.
//!
//! Each check parses the Plain rendering back, evaluates it at a sample point
//! of a trajectory and compares it against a central finite difference and a
//! forward-mode (dual number) derivative of the undifferentiated quantity.

use crate::autodiff::Dual;
use crate::derivation::Derivation;
use crate::equation_engine::{parse, Compiler, VM};
use crate::expr::Expr;
use crate::render::{Language, Printer};
use crate::traits::{Scalar, ScalarPath, VectorPath};
use anyhow::{bail, Context, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckSettings {
    /// Half-width of the central difference.
    pub step: f64,
    pub tolerance: f64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            step: 1e-5,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub time: f64,
    /// Rendered closed form evaluated at the sample point.
    pub symbolic: f64,
    pub finite_difference: f64,
    pub forward_mode: f64,
    pub max_error: f64,
    pub passed: bool,
}

impl CheckReport {
    fn new(name: &str, time: f64, symbolic: f64, references: [f64; 2], tolerance: f64) -> Self {
        let max_error = references
            .iter()
            .map(|r| (symbolic - r).abs())
            .fold(0.0, f64::max);
        Self {
            name: name.to_string(),
            time,
            symbolic,
            finite_difference: references[0],
            forward_mode: references[1],
            max_error,
            passed: max_error.is_finite() && max_error <= tolerance,
        }
    }
}

/// theta(t) = start + rate * t + curvature * t^2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnglePath {
    pub start: f64,
    pub rate: f64,
    pub curvature: f64,
}

impl<T: Scalar> ScalarPath<T> for AnglePath {
    fn at(&self, t: T) -> T {
        T::constant(self.start) + T::constant(self.rate) * t + T::constant(self.curvature) * t * t
    }
}

/// phi(t) = (sin t, cos t, t).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Helix;

impl<T: Scalar> VectorPath<T> for Helix {
    fn at(&self, t: T) -> [T; 3] {
        [t.sin(), t.cos(), t]
    }
}

/// A compiled, time-free expression over a fixed symbol order.
struct Compiled {
    bytecode: crate::equation_engine::Bytecode,
}

impl Compiled {
    fn new(expr: &Expr, names: &[&str]) -> Result<Self> {
        let bytecode = Compiler::new(names)
            .compile(expr)
            .with_context(|| format!("compiling {names:?}"))?;
        Ok(Self { bytecode })
    }

    fn eval<T: Scalar>(&self, vars: &[T]) -> Result<T> {
        let mut stack = Vec::with_capacity(32);
        Ok(VM::execute(&self.bytecode, vars, &mut stack)?)
    }
}

fn reparse(expr: &Expr) -> Result<Expr> {
    let text = Printer::new(Language::Plain).print(expr)?;
    parse(&text).with_context(|| format!("re-parsing rendered expression `{text}`"))
}

/// Compares rendered Theta_dot(theta, theta_dot) with d/dt Theta(theta(t)).
pub fn check_coefficient_rate<P>(
    derivation: &Derivation,
    path: &P,
    t0: f64,
    settings: &CheckSettings,
) -> Result<CheckReport>
where
    P: ScalarPath<f64> + ScalarPath<Dual>,
{
    let theta = derivation.symbols.theta.name();
    let theta_dot = derivation.symbols.theta_dot.name();

    let theta0 = ScalarPath::<f64>::at(path, t0);
    if theta0.abs() < 1e-3 {
        bail!("Coefficient rate is singular at zero angle (theta = {theta0}).");
    }
    let theta_dual = ScalarPath::<Dual>::at(path, Dual::variable(t0));

    let rate = Compiled::new(&reparse(&derivation.coefficient_rate)?, &[theta, theta_dot])?;
    let symbolic = rate.eval(&[theta0, theta_dual.eps])?;

    let coefficient = Compiled::new(&derivation.coefficient, &[theta])?;
    let h = settings.step;
    let ahead = coefficient.eval(&[ScalarPath::<f64>::at(path, t0 + h)])?;
    let behind = coefficient.eval(&[ScalarPath::<f64>::at(path, t0 - h)])?;
    let finite_difference = (ahead - behind) / (2.0 * h);
    let forward_mode = coefficient.eval(&[theta_dual])?.eps;

    let report = CheckReport::new(
        "coefficient_rate",
        t0,
        symbolic,
        [finite_difference, forward_mode],
        settings.tolerance,
    );
    log_report(&report);
    Ok(report)
}

/// Compares rendered theta_dot(phi, phi_dot) with d/dt |phi(t)|.
pub fn check_angle_rate<P>(
    derivation: &Derivation,
    path: &P,
    t0: f64,
    settings: &CheckSettings,
) -> Result<CheckReport>
where
    P: VectorPath<f64> + VectorPath<Dual>,
{
    let symbols = &derivation.symbols;
    let names: Vec<&str> = symbols
        .phi
        .iter()
        .chain(symbols.phi_dot.iter())
        .map(|s| s.name())
        .collect();

    let sample = VectorPath::<Dual>::at(path, Dual::variable(t0));
    let phi = Vector3::new(sample[0].val, sample[1].val, sample[2].val);
    let phi_dot = Vector3::new(sample[0].eps, sample[1].eps, sample[2].eps);
    if phi.norm() < 1e-12 {
        bail!("Angle rate is undefined at phi = 0.");
    }

    let rate = Compiled::new(&reparse(&derivation.angle_rate)?, &names)?;
    let vars: Vec<f64> = phi.iter().chain(phi_dot.iter()).copied().collect();
    let symbolic = rate.eval(&vars)?;

    let h = settings.step;
    let norm_at = |t: f64| Vector3::from(VectorPath::<f64>::at(path, t)).norm();
    let finite_difference = (norm_at(t0 + h) - norm_at(t0 - h)) / (2.0 * h);
    let closed_form = phi.dot(&phi_dot) / phi.norm();

    let report = CheckReport::new(
        "angle_rate",
        t0,
        symbolic,
        [finite_difference, closed_form],
        settings.tolerance,
    );
    log_report(&report);
    Ok(report)
}

/// Runs every check on the built-in sample trajectories.
pub fn verify_all(derivation: &Derivation, settings: &CheckSettings) -> Result<Vec<CheckReport>> {
    let mut reports = Vec::new();
    let angles = [
        AnglePath {
            start: 0.3,
            rate: 1.7,
            curvature: -0.4,
        },
        AnglePath {
            start: 2.5,
            rate: -0.8,
            curvature: 0.25,
        },
    ];
    for path in &angles {
        reports.push(check_coefficient_rate(derivation, path, 0.0, settings)?);
    }
    for t0 in [0.5, 1.3] {
        reports.push(check_angle_rate(derivation, &Helix, t0, settings)?);
    }
    Ok(reports)
}

fn log_report(report: &CheckReport) {
    if report.passed {
        info!(
            check = %report.name,
            t = report.time,
            error = report.max_error,
            "check passed"
        );
    } else {
        warn!(
            check = %report.name,
            t = report.time,
            symbolic = report.symbolic,
            finite_difference = report.finite_difference,
            forward_mode = report.forward_mode,
            "check failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::derive;

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn built_in_checks_pass() {
        let d = derive();
        let reports = verify_all(&d, &CheckSettings::default()).expect("checks should run");
        assert_eq!(reports.len(), 4);
        for report in reports {
            assert!(report.passed, "{report:?}");
        }
    }

    #[test]
    fn zero_angle_is_refused() {
        let d = derive();
        let path = AnglePath {
            start: 0.0,
            rate: 1.0,
            curvature: 0.0,
        };
        assert_err_contains(
            check_coefficient_rate(&d, &path, 0.0, &CheckSettings::default()),
            "singular",
        );
    }

    #[test]
    fn a_wrong_closed_form_is_caught() {
        let mut d = derive();
        d.coefficient_rate = Expr::number(2.0) * d.coefficient_rate.clone();
        let path = AnglePath {
            start: 1.0,
            rate: 0.5,
            curvature: 0.0,
        };
        let report = check_coefficient_rate(&d, &path, 0.0, &CheckSettings::default())
            .expect("check should run");
        assert!(!report.passed);
    }

    #[test]
    fn sample_paths_have_expected_rates() {
        let theta: Dual = AnglePath {
            start: 1.0,
            rate: 2.0,
            curvature: 3.0,
        }
        .at(Dual::variable(1.0));
        assert_eq!(theta.val, 6.0);
        assert_eq!(theta.eps, 8.0);
        let phi: [Dual; 3] = Helix.at(Dual::variable(0.0));
        assert_eq!(phi[0].eps, 1.0);
        assert_eq!(phi[1].val, 1.0);
        assert_eq!(phi[2].eps, 1.0);
    }
}
