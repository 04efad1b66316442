//! Derivation of the rate of the exponential-coordinate Jacobian coefficient.
//!
//! The angular-velocity to exponential-coordinate-rate Jacobian is
//! `A(phi) = I - [phi]x / 2 + Theta(theta) [phi]x^2` with `theta = |phi|` and
//!
//! ```text
//! Theta(theta) = (1 / theta^2) * (1 - (theta / 2) * sin(theta) / (1 - cos(theta)))
//! ```
//!
//! Its time derivative needs `dTheta/dt` as a function of `theta` and
//! `theta_dot`, and `theta_dot` as a function of `phi` and `phi_dot`. Both are
//! derived here by differentiating functions of time and then substituting the
//! time dependence away, derivative terms first.

use crate::cse;
use crate::error::Result;
use crate::expr::{Expr, Symbol, TimeFunction};
use crate::render::Printer;
use crate::subs::Substitution;
use serde::Serialize;
use tracing::{debug, info};

/// Names of everything the derivation declares.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationSymbols {
    pub time: Symbol,
    pub theta: Symbol,
    pub theta_dot: Symbol,
    pub phi: [Symbol; 3],
    pub phi_dot: [Symbol; 3],
}

impl Default for DerivationSymbols {
    fn default() -> Self {
        Self {
            time: Symbol::real("t"),
            theta: Symbol::real("theta"),
            theta_dot: Symbol::real("theta_dot"),
            phi: [0, 1, 2].map(|i| Symbol::real(format!("phi{i}"))),
            phi_dot: [0, 1, 2].map(|i| Symbol::real(format!("phi{i}_dot"))),
        }
    }
}

/// Every intermediate of one derivation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub symbols: DerivationSymbols,
    /// Theta(theta) in the plain angle symbol.
    pub coefficient: Expr,
    /// dTheta/dt with theta(t) and its derivative still present.
    pub coefficient_rate_in_time: Expr,
    /// Theta_dot(theta, theta_dot).
    pub coefficient_rate: Expr,
    /// |phi(t)|.
    pub angle_in_time: Expr,
    /// d|phi(t)|/dt before substitution.
    pub angle_rate_in_time: Expr,
    /// theta_dot = (phi . phi_dot) / |phi|.
    pub angle_rate: Expr,
    /// theta_dot = (phi . phi_dot) / theta.
    pub angle_rate_compact: Expr,
}

/// Theta as a function of the given angle expression.
pub fn coefficient(theta: &Expr) -> Expr {
    let half_angle = Expr::number(0.5) * theta.clone();
    let ratio = half_angle * theta.clone().sin() / (Expr::one() - theta.clone().cos());
    theta.clone().powi(-2) * (Expr::one() - ratio)
}

/// Rules that eliminate time from expressions in `functions`: every
/// `d f(t)/dt -> rate` rule precedes every `f(t) -> value` rule, otherwise the
/// derivative pattern no longer matches once `f(t)` has been replaced.
pub fn time_elimination(functions: &[(TimeFunction, Symbol, Symbol)]) -> Substitution {
    let mut subs = Substitution::new();
    for (function, _, rate) in functions {
        subs.push(
            Expr::derivative(Expr::function(function), function.time(), 1),
            Expr::symbol(rate),
        );
    }
    for (function, value, _) in functions {
        subs.push(Expr::function(function), Expr::symbol(value));
    }
    subs
}

pub fn derive() -> Derivation {
    derive_with(DerivationSymbols::default())
}

pub fn derive_with(symbols: DerivationSymbols) -> Derivation {
    let t = &symbols.time;

    let theta_fn = TimeFunction::real(symbols.theta.name(), t);
    let coefficient_in_time = coefficient(&Expr::function(&theta_fn));
    debug!(size = coefficient_in_time.size(), "built Theta(theta(t))");

    let coefficient_rate_in_time = coefficient_in_time.diff(t);
    debug!(
        size = coefficient_rate_in_time.size(),
        "differentiated Theta with respect to time"
    );

    let coefficient_rate = time_elimination(&[(
        theta_fn.clone(),
        symbols.theta.clone(),
        symbols.theta_dot.clone(),
    )])
    .apply(&coefficient_rate_in_time);
    debug!(size = coefficient_rate.size(), "eliminated time from Theta rate");

    let phi_fns: Vec<TimeFunction> = symbols
        .phi
        .iter()
        .map(|phi| TimeFunction::real(phi.name(), t))
        .collect();
    let components: Vec<Expr> = phi_fns.iter().map(Expr::function).collect();
    let angle_in_time = Expr::norm(&components);
    let angle_rate_in_time = angle_in_time.diff(t);
    debug!(
        size = angle_rate_in_time.size(),
        "differentiated |phi(t)| with respect to time"
    );

    let phi_rules: Vec<(TimeFunction, Symbol, Symbol)> = phi_fns
        .into_iter()
        .zip(symbols.phi.iter().cloned())
        .zip(symbols.phi_dot.iter().cloned())
        .map(|((function, value), rate)| (function, value, rate))
        .collect();
    let angle_rate = time_elimination(&phi_rules).apply(&angle_rate_in_time);

    let plain_phi: Vec<Expr> = symbols.phi.iter().map(Expr::symbol).collect();
    let norm = Expr::norm(&plain_phi);
    let angle_rate_compact = angle_rate.replace(
        &norm.clone().recip(),
        &Expr::symbol(&symbols.theta).recip(),
    );

    let coefficient = coefficient(&Expr::symbol(&symbols.theta));
    info!(
        coefficient_rate_size = coefficient_rate.size(),
        angle_rate_size = angle_rate.size(),
        "derivation complete"
    );

    Derivation {
        symbols,
        coefficient,
        coefficient_rate_in_time,
        coefficient_rate,
        angle_in_time,
        angle_rate_in_time,
        angle_rate,
        angle_rate_compact,
    }
}

/// One rendered expression, optionally split into temporaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedExpr {
    pub name: String,
    pub bindings: Vec<String>,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDerivation {
    pub coefficient_rate: RenderedExpr,
    pub angle_rate: RenderedExpr,
    pub angle_rate_compact: RenderedExpr,
}

impl Derivation {
    pub fn render(&self, printer: &Printer, eliminate_common: bool) -> Result<RenderedDerivation> {
        let theta_dot = self.symbols.theta_dot.name();
        Ok(RenderedDerivation {
            coefficient_rate: render_one(
                printer,
                "theta_coeff_dot",
                &self.coefficient_rate,
                eliminate_common,
            )?,
            angle_rate: render_one(printer, theta_dot, &self.angle_rate, eliminate_common)?,
            angle_rate_compact: render_one(
                printer,
                theta_dot,
                &self.angle_rate_compact,
                eliminate_common,
            )?,
        })
    }
}

fn render_one(
    printer: &Printer,
    name: &str,
    expr: &Expr,
    eliminate_common: bool,
) -> Result<RenderedExpr> {
    if !eliminate_common {
        return Ok(RenderedExpr {
            name: name.to_string(),
            bindings: Vec::new(),
            expression: printer.print(expr)?,
        });
    }
    let reduced = cse::eliminate(expr, "x");
    debug!(
        expression = name,
        temporaries = reduced.bindings.len(),
        "eliminated common subexpressions"
    );
    let bindings = reduced
        .bindings
        .iter()
        .map(|(symbol, value)| Ok(printer.binding(symbol.name(), &printer.print(value)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(RenderedExpr {
        name: name.to_string(),
        bindings,
        expression: printer.print(&reduced.reduced)?,
    })
}
