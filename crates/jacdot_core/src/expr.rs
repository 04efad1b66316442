//! Symbolic expression trees kept in canonical form.
//!
//! Every constructor evaluates what it can (numeric folding, flattening of
//! nested sums and products, like-term collection) and sorts operands by
//! [`Expr::canonical_cmp`], so two expressions built from the same algebra
//! compare equal structurally.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Assumption tags carried by a symbol.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Assumptions {
    pub real: bool,
    pub positive: bool,
}

impl Assumptions {
    pub const REAL: Assumptions = Assumptions {
        real: true,
        positive: false,
    };
    pub const POSITIVE: Assumptions = Assumptions {
        real: true,
        positive: true,
    };
}

/// An atomic named scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    name: String,
    assumptions: Assumptions,
}

impl Symbol {
    pub fn new(name: impl Into<String>, assumptions: Assumptions) -> Self {
        Self {
            name: name.into(),
            assumptions,
        }
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, Assumptions::REAL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A symbol known to be strictly positive, e.g. a norm.
    pub fn positive(name: impl Into<String>) -> Self {
        Self::new(name, Assumptions::POSITIVE)
    }

    pub fn assumptions(&self) -> Assumptions {
        self.assumptions
    }
}

/// An undefined function applied to a time symbol, e.g. `theta(t)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeFunction {
    name: String,
    time: Symbol,
    assumptions: Assumptions,
}

impl TimeFunction {
    pub fn new(name: impl Into<String>, time: &Symbol, assumptions: Assumptions) -> Self {
        Self {
            name: name.into(),
            time: time.clone(),
            assumptions,
        }
    }

    pub fn real(name: impl Into<String>, time: &Symbol) -> Self {
        Self::new(name, time, Assumptions::REAL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> &Symbol {
        &self.time
    }

    pub fn assumptions(&self) -> Assumptions {
        self.assumptions
    }
}

/// Elementary functions of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    Sin,
    Cos,
    Exp,
    Ln,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Exp => "exp",
            Func::Ln => "log",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Symbol(Symbol),
    Function(TimeFunction),
    /// Unevaluated derivative of `expr` with respect to `var`.
    Derivative {
        expr: Box<Expr>,
        var: Symbol,
        order: u32,
    },
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

fn is_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

impl Expr {
    pub fn number(value: f64) -> Expr {
        // Collapse -0.0 so folded zeros compare equal.
        Expr::Number(if value == 0.0 { 0.0 } else { value })
    }

    pub fn zero() -> Expr {
        Expr::Number(0.0)
    }

    pub fn one() -> Expr {
        Expr::Number(1.0)
    }

    pub fn symbol(symbol: &Symbol) -> Expr {
        Expr::Symbol(symbol.clone())
    }

    pub fn function(function: &TimeFunction) -> Expr {
        Expr::Function(function.clone())
    }

    /// Unevaluated derivative node; use [`Expr::diff`] to differentiate.
    pub fn derivative(expr: Expr, var: &Symbol, order: u32) -> Expr {
        Expr::Derivative {
            expr: Box::new(expr),
            var: var.clone(),
            order,
        }
    }

    pub fn add(terms: impl IntoIterator<Item = Expr>) -> Expr {
        let mut constant = 0.0;
        let mut collected: Vec<(Expr, f64)> = Vec::new();
        let mut pending: Vec<Expr> = terms.into_iter().collect();
        pending.reverse();

        while let Some(term) = pending.pop() {
            match term {
                Expr::Add(inner) => pending.extend(inner.into_iter().rev()),
                Expr::Number(n) => constant += n,
                other => {
                    let (coefficient, rest) = other.split_coefficient();
                    match collected.iter_mut().find(|(existing, _)| *existing == rest) {
                        Some(entry) => entry.1 += coefficient,
                        None => collected.push((rest, coefficient)),
                    }
                }
            }
        }

        let mut out: Vec<Expr> = collected
            .into_iter()
            .filter(|(_, coefficient)| *coefficient != 0.0)
            .map(|(rest, coefficient)| Expr::scaled(coefficient, rest))
            .collect();
        if constant != 0.0 {
            out.push(Expr::number(constant));
        }
        out.sort_by(Expr::canonical_cmp);

        match out.len() {
            0 => Expr::zero(),
            1 => out.remove(0),
            _ => Expr::Add(out),
        }
    }

    pub fn mul(factors: impl IntoIterator<Item = Expr>) -> Expr {
        let mut coefficient = 1.0;
        let mut powers: Vec<(Expr, Expr)> = Vec::new();
        let mut pending: Vec<Expr> = factors.into_iter().collect();
        pending.reverse();

        while let Some(factor) = pending.pop() {
            let (base, exponent) = match factor {
                Expr::Mul(inner) => {
                    pending.extend(inner.into_iter().rev());
                    continue;
                }
                Expr::Number(n) => {
                    coefficient *= n;
                    continue;
                }
                Expr::Pow(base, exponent) => (*base, *exponent),
                other => (other, Expr::one()),
            };
            match powers.iter_mut().find(|(existing, _)| *existing == base) {
                Some(entry) => {
                    let merged = Expr::add([entry.1.clone(), exponent]);
                    entry.1 = merged;
                }
                None => powers.push((base, exponent)),
            }
        }

        if coefficient == 0.0 {
            return Expr::zero();
        }

        let mut out = Vec::with_capacity(powers.len());
        let mut regroup = false;
        for (base, exponent) in powers {
            match Expr::pow(base, exponent) {
                Expr::Number(n) => coefficient *= n,
                Expr::Mul(inner) => {
                    regroup = true;
                    out.extend(inner);
                }
                other => out.push(other),
            }
        }
        if regroup {
            out.push(Expr::number(coefficient));
            return Expr::mul(out);
        }
        if coefficient == 0.0 {
            return Expr::zero();
        }
        if coefficient != 1.0 && out.len() == 1 {
            if let Expr::Add(terms) = &out[0] {
                return Expr::add(
                    terms
                        .iter()
                        .map(|term| Expr::mul([Expr::number(coefficient), term.clone()]))
                        .collect::<Vec<_>>(),
                );
            }
        }
        out.sort_by(Expr::canonical_cmp);

        match (out.len(), coefficient == 1.0) {
            (0, _) => Expr::number(coefficient),
            (1, true) => out.remove(0),
            (_, true) => Expr::Mul(out),
            (_, false) => {
                out.insert(0, Expr::number(coefficient));
                Expr::Mul(out)
            }
        }
    }

    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        if let Expr::Number(e) = exponent {
            if e == 0.0 {
                return Expr::one();
            }
            if e == 1.0 {
                return base;
            }
            if is_integer(e) {
                match base {
                    Expr::Number(b) if b != 0.0 || e > 0.0 => return Expr::number(b.powf(e)),
                    Expr::Pow(inner_base, inner_exponent) => {
                        return Expr::pow(
                            *inner_base,
                            Expr::mul([*inner_exponent, Expr::number(e)]),
                        );
                    }
                    Expr::Mul(factors) => {
                        return Expr::mul(
                            factors
                                .into_iter()
                                .map(|factor| Expr::pow(factor, Expr::number(e))),
                        );
                    }
                    other => return Expr::Pow(Box::new(other), Box::new(Expr::number(e))),
                }
            }
        }
        if base == Expr::one() {
            return Expr::one();
        }
        // (b^p)^q = b^(p*q) holds for any real exponents once b > 0.
        if let Expr::Pow(inner_base, inner_exponent) = &base {
            if inner_base.is_positive() {
                let exponent = Expr::mul([(**inner_exponent).clone(), exponent]);
                return Expr::pow((**inner_base).clone(), exponent);
            }
        }
        Expr::Pow(Box::new(base), Box::new(exponent))
    }

    pub fn sqrt(arg: Expr) -> Expr {
        Expr::pow(arg, Expr::number(0.5))
    }

    pub fn call(func: Func, arg: Expr) -> Expr {
        match (func, &arg) {
            (Func::Sin, Expr::Number(n)) if *n == 0.0 => Expr::zero(),
            (Func::Cos, Expr::Number(n)) if *n == 0.0 => Expr::one(),
            (Func::Exp, Expr::Number(n)) if *n == 0.0 => Expr::one(),
            (Func::Ln, Expr::Number(n)) if *n == 1.0 => Expr::zero(),
            _ => Expr::Call(func, Box::new(arg)),
        }
    }

    pub fn sin(self) -> Expr {
        Expr::call(Func::Sin, self)
    }

    pub fn cos(self) -> Expr {
        Expr::call(Func::Cos, self)
    }

    pub fn exp(self) -> Expr {
        Expr::call(Func::Exp, self)
    }

    pub fn ln(self) -> Expr {
        Expr::call(Func::Ln, self)
    }

    pub fn powi(self, n: i32) -> Expr {
        Expr::pow(self, Expr::number(n as f64))
    }

    pub fn recip(self) -> Expr {
        self.powi(-1)
    }

    /// Euclidean norm `sqrt(sum(c^2))` of the given components.
    pub fn norm(components: &[Expr]) -> Expr {
        Expr::sqrt(Expr::add(components.iter().map(|c| c.clone().powi(2))))
    }

    /// Dot product `sum(a_i * b_i)`.
    pub fn dot(lhs: &[Expr], rhs: &[Expr]) -> Expr {
        Expr::add(
            lhs.iter()
                .zip(rhs)
                .map(|(a, b)| Expr::mul([a.clone(), b.clone()])),
        )
    }

    /// Builds `coefficient * rest` without re-canonicalising `rest`.
    fn scaled(coefficient: f64, rest: Expr) -> Expr {
        if coefficient == 1.0 {
            return rest;
        }
        match rest {
            Expr::Mul(mut factors) => {
                factors.insert(0, Expr::number(coefficient));
                Expr::Mul(factors)
            }
            other => Expr::Mul(vec![Expr::number(coefficient), other]),
        }
    }

    /// Splits `c * rest` into its numeric coefficient and the remaining term.
    pub fn split_coefficient(&self) -> (f64, Expr) {
        match self {
            Expr::Number(n) => (*n, Expr::one()),
            Expr::Mul(factors) => match factors.first() {
                Some(Expr::Number(c)) => {
                    let rest = if factors.len() == 2 {
                        factors[1].clone()
                    } else {
                        Expr::Mul(factors[1..].to_vec())
                    };
                    (*c, rest)
                }
                _ => (1.0, self.clone()),
            },
            other => (1.0, other.clone()),
        }
    }

    /// True when the term prints with a leading minus sign.
    pub fn is_negative(&self) -> bool {
        self.split_coefficient().0 < 0.0
    }

    /// Strictly positive by construction or by symbol assumptions.
    pub fn is_positive(&self) -> bool {
        match self {
            Expr::Number(n) => *n > 0.0,
            Expr::Symbol(symbol) => symbol.assumptions().positive,
            Expr::Function(function) => function.assumptions().positive,
            Expr::Add(items) | Expr::Mul(items) => items.iter().all(Expr::is_positive),
            Expr::Pow(base, _) => base.is_positive(),
            Expr::Call(Func::Exp, _) => true,
            Expr::Derivative { .. } | Expr::Call(..) => false,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Number(n) if *n == 0.0)
    }

    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            Expr::Number(_) | Expr::Symbol(_) | Expr::Function(_) | Expr::Derivative { .. }
        )
    }

    /// Does the expression vary with `var`?
    pub fn depends_on(&self, var: &Symbol) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Symbol(symbol) => symbol == var,
            Expr::Function(function) => function.time() == var,
            Expr::Derivative { expr, .. } => expr.depends_on(var),
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.depends_on(var)),
            Expr::Pow(base, exponent) => base.depends_on(var) || exponent.depends_on(var),
            Expr::Call(_, arg) => arg.depends_on(var),
        }
    }

    /// True if any unevaluated derivative node remains.
    pub fn has_derivative(&self) -> bool {
        self.any(&|e| matches!(e, Expr::Derivative { .. }))
    }

    /// True when no function of time and no derivative remains.
    pub fn is_time_free(&self) -> bool {
        !self.any(&|e| matches!(e, Expr::Function(_) | Expr::Derivative { .. }))
    }

    fn any(&self, predicate: &dyn Fn(&Expr) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        match self {
            Expr::Derivative { expr, .. } => expr.any(predicate),
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.any(predicate)),
            Expr::Pow(base, exponent) => base.any(predicate) || exponent.any(predicate),
            Expr::Call(_, arg) => arg.any(predicate),
            _ => false,
        }
    }

    /// Plain symbols appearing in the expression, in canonical order.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(symbol) => {
                out.insert(symbol.clone());
            }
            Expr::Function(function) => {
                out.insert(function.time().clone());
            }
            Expr::Derivative { expr, var, .. } => {
                expr.collect_symbols(out);
                out.insert(var.clone());
            }
            Expr::Add(items) | Expr::Mul(items) => {
                items.iter().for_each(|e| e.collect_symbols(out));
            }
            Expr::Pow(base, exponent) => {
                base.collect_symbols(out);
                exponent.collect_symbols(out);
            }
            Expr::Call(_, arg) => arg.collect_symbols(out),
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + match self {
            Expr::Derivative { expr, .. } => expr.size(),
            Expr::Add(items) | Expr::Mul(items) => items.iter().map(Expr::size).sum(),
            Expr::Pow(base, exponent) => base.size() + exponent.size(),
            Expr::Call(_, arg) => arg.size(),
            _ => 0,
        }
    }

    /// Rebuilds the node from transformed children, re-canonicalising on the way up.
    /// Derivative nodes are rebuilt as-is and never evaluated.
    pub fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        match self {
            Expr::Number(_) | Expr::Symbol(_) | Expr::Function(_) => self.clone(),
            Expr::Derivative { expr, var, order } => Expr::derivative(f(expr), var, *order),
            Expr::Add(items) => Expr::add(items.iter().map(&mut f).collect::<Vec<_>>()),
            Expr::Mul(items) => Expr::mul(items.iter().map(&mut f).collect::<Vec<_>>()),
            Expr::Pow(base, exponent) => {
                let base = f(base);
                Expr::pow(base, f(exponent))
            }
            Expr::Call(func, arg) => Expr::call(*func, f(arg)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Expr::Number(_) => 0,
            Expr::Symbol(_) => 1,
            Expr::Function(_) => 2,
            Expr::Derivative { .. } => 3,
            Expr::Call(..) => 4,
            Expr::Pow(..) => 5,
            Expr::Mul(_) => 6,
            Expr::Add(_) => 7,
        }
    }

    /// Total order used to sort operands of sums and products.
    pub fn canonical_cmp(&self, other: &Expr) -> Ordering {
        match (self, other) {
            (Expr::Number(a), Expr::Number(b)) => a.total_cmp(b),
            (Expr::Symbol(a), Expr::Symbol(b)) => a.cmp(b),
            (Expr::Function(a), Expr::Function(b)) => a.cmp(b),
            (
                Expr::Derivative {
                    expr: a,
                    var: va,
                    order: oa,
                },
                Expr::Derivative {
                    expr: b,
                    var: vb,
                    order: ob,
                },
            ) => a
                .canonical_cmp(b)
                .then_with(|| va.cmp(vb))
                .then_with(|| oa.cmp(ob)),
            (Expr::Call(fa, a), Expr::Call(fb, b)) => fa.cmp(fb).then_with(|| a.canonical_cmp(b)),
            (Expr::Pow(ba, ea), Expr::Pow(bb, eb)) => {
                ba.canonical_cmp(bb).then_with(|| ea.canonical_cmp(eb))
            }
            (Expr::Add(a), Expr::Add(b)) | (Expr::Mul(a), Expr::Mul(b)) => cmp_slices(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn cmp_slices(a: &[Expr], b: &[Expr]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ordering = x.canonical_cmp(y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::number(value)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Expr::symbol(symbol)
    }
}

impl From<&TimeFunction> for Expr {
    fn from(function: &TimeFunction) -> Self {
        Expr::function(function)
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::add([self, rhs])
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::add([self, -rhs])
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::mul([self, rhs])
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::mul([self, rhs.recip()])
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::mul([Expr::number(-1.0), self])
    }
}
