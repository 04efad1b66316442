//! Expression-to-text rendering for pasting into downstream code.

use crate::error::{Result, SymbolicError};
use crate::expr::{Expr, Func};
use serde::{Deserialize, Serialize};

/// Target notation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Computer-algebra notation (`x**2`, `sin(x)`); re-parsable by
    /// [`crate::equation_engine::parse`].
    #[default]
    Plain,
    Python,
    C,
    Rust,
}

const PREC_SUM: u8 = 1;
const PREC_PRODUCT: u8 = 2;
const PREC_POWER: u8 = 3;
const PREC_ATOM: u8 = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    pub language: Language,
}

impl Printer {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn print(&self, expr: &Expr) -> Result<String> {
        Ok(self.render(expr)?.0)
    }

    /// A single assignment line binding `name` to `value`.
    pub fn binding(&self, name: &str, value: &str) -> String {
        match self.language {
            Language::Plain | Language::Python => format!("{name} = {value}"),
            Language::C => format!("const double {name} = {value};"),
            Language::Rust => format!("let {name} = {value};"),
        }
    }

    fn render(&self, expr: &Expr) -> Result<(String, u8)> {
        match expr {
            Expr::Number(n) => Ok(self.number(*n)),
            Expr::Symbol(symbol) => Ok((symbol.name().to_string(), PREC_ATOM)),
            Expr::Function(function) => match self.language {
                Language::Plain => Ok((
                    format!("{}({})", function.name(), function.time().name()),
                    PREC_ATOM,
                )),
                _ => Err(SymbolicError::TimeDependent(format!(
                    "{}({})",
                    function.name(),
                    function.time().name()
                ))),
            },
            Expr::Derivative { expr, var, order } => {
                let inner = Printer::new(Language::Plain).print(expr)?;
                let text = if *order == 1 {
                    format!("Derivative({inner}, {})", var.name())
                } else {
                    format!("Derivative({inner}, ({}, {order}))", var.name())
                };
                match self.language {
                    Language::Plain => Ok((text, PREC_ATOM)),
                    _ => Err(SymbolicError::TimeDependent(text)),
                }
            }
            Expr::Add(terms) => self.sum(terms),
            Expr::Mul(_) => self.product(expr),
            Expr::Pow(base, exponent) => self.power(base, exponent),
            Expr::Call(func, arg) => self.call(*func, arg),
        }
    }

    fn number(&self, n: f64) -> (String, u8) {
        let text = match self.language {
            Language::Plain | Language::Python => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", n as i64)
                } else {
                    format!("{n}")
                }
            }
            Language::C | Language::Rust => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}.0", n as i64)
                } else {
                    format!("{n}")
                }
            }
        };
        let prec = if n < 0.0 { PREC_SUM } else { PREC_ATOM };
        (text, prec)
    }

    fn wrap(&self, expr: &Expr, min_prec: u8) -> Result<String> {
        let (text, prec) = self.render(expr)?;
        Ok(if prec < min_prec {
            format!("({text})")
        } else {
            text
        })
    }

    fn sum(&self, terms: &[Expr]) -> Result<(String, u8)> {
        let mut out = String::new();
        for (i, term) in terms.iter().enumerate() {
            let negative = term.is_negative();
            let body = if negative { -term.clone() } else { term.clone() };
            let text = self.wrap(&body, PREC_PRODUCT)?;
            match (i, negative) {
                (0, false) => out.push_str(&text),
                (0, true) => {
                    out.push('-');
                    out.push_str(&text);
                }
                (_, false) => {
                    out.push_str(" + ");
                    out.push_str(&text);
                }
                (_, true) => {
                    out.push_str(" - ");
                    out.push_str(&text);
                }
            }
        }
        Ok((out, PREC_SUM))
    }

    fn product(&self, expr: &Expr) -> Result<(String, u8)> {
        let (coefficient, rest) = expr.split_coefficient();
        let factors: Vec<Expr> = match rest {
            Expr::Mul(factors) => factors,
            other => vec![other],
        };

        let mut numerator = Vec::new();
        let mut denominator = Vec::new();
        let magnitude = coefficient.abs();
        if magnitude != 1.0 {
            let inverse = 1.0 / magnitude;
            if inverse.fract() == 0.0 && inverse > 1.0 {
                denominator.push(Expr::number(inverse));
            } else {
                numerator.push(Expr::number(magnitude));
            }
        }
        for factor in factors {
            match &factor {
                Expr::Pow(base, exponent) => match **exponent {
                    Expr::Number(e) if e < 0.0 => {
                        denominator.push(Expr::pow((**base).clone(), Expr::number(-e)))
                    }
                    _ => numerator.push(factor),
                },
                _ => numerator.push(factor),
            }
        }

        let mut text = String::new();
        if coefficient < 0.0 {
            text.push('-');
        }
        if numerator.is_empty() {
            text.push_str(&self.number(1.0).0);
        } else {
            let parts = numerator
                .iter()
                .map(|f| self.wrap(f, PREC_PRODUCT))
                .collect::<Result<Vec<_>>>()?;
            text.push_str(&parts.join("*"));
        }
        if !denominator.is_empty() {
            text.push('/');
            if denominator.len() == 1 {
                text.push_str(&self.wrap(&denominator[0], PREC_POWER)?);
            } else {
                let parts = denominator
                    .iter()
                    .map(|f| self.wrap(f, PREC_PRODUCT))
                    .collect::<Result<Vec<_>>>()?;
                text.push('(');
                text.push_str(&parts.join("*"));
                text.push(')');
            }
        }
        let prec = if coefficient < 0.0 {
            PREC_SUM
        } else {
            PREC_PRODUCT
        };
        Ok((text, prec))
    }

    fn power(&self, base: &Expr, exponent: &Expr) -> Result<(String, u8)> {
        if let Expr::Number(e) = exponent {
            if *e < 0.0 {
                let positive = Expr::pow(base.clone(), Expr::number(-e));
                let text = format!("{}/{}", self.number(1.0).0, self.wrap(&positive, PREC_POWER)?);
                return Ok((text, PREC_PRODUCT));
            }
            if *e == 0.5 {
                return self.unary("sqrt", base);
            }
        }
        match self.language {
            Language::Plain | Language::Python => {
                let b = self.wrap(base, PREC_ATOM)?;
                let e = self.wrap(exponent, PREC_ATOM)?;
                Ok((format!("{b}**{e}"), PREC_POWER))
            }
            Language::C => {
                let b = self.render(base)?.0;
                let e = self.render(exponent)?.0;
                Ok((format!("pow({b}, {e})"), PREC_ATOM))
            }
            Language::Rust => {
                let b = self.receiver(base)?;
                match exponent {
                    Expr::Number(e) if e.fract() == 0.0 && e.abs() <= i32::MAX as f64 => {
                        Ok((format!("{b}.powi({})", *e as i32), PREC_ATOM))
                    }
                    _ => {
                        let e = self.render(exponent)?.0;
                        Ok((format!("{b}.powf({e})"), PREC_ATOM))
                    }
                }
            }
        }
    }

    fn call(&self, func: Func, arg: &Expr) -> Result<(String, u8)> {
        let name = match (self.language, func) {
            (Language::Rust, Func::Ln) => "ln",
            (_, func) => func.name(),
        };
        self.unary(name, arg)
    }

    fn unary(&self, name: &str, arg: &Expr) -> Result<(String, u8)> {
        let text = match self.language {
            Language::Plain | Language::C => format!("{name}({})", self.render(arg)?.0),
            Language::Python => format!("math.{name}({})", self.render(arg)?.0),
            Language::Rust => format!("{}.{name}()", self.receiver(arg)?),
        };
        Ok((text, PREC_ATOM))
    }

    /// Method-call receiver for Rust output; literals get an explicit type.
    fn receiver(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Number(n) if *n >= 0.0 => Ok(format!("{}_f64", self.number(*n).0)),
            Expr::Number(n) => Ok(format!("({}_f64)", self.number(*n).0)),
            _ => self.wrap(expr, PREC_ATOM),
        }
    }
}
