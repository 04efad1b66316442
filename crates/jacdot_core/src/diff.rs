use crate::expr::{Expr, Func, Symbol};

impl Expr {
    /// Formal derivative with respect to `var`.
    ///
    /// Functions of `var` differentiate to unevaluated [`Expr::Derivative`]
    /// nodes, so the chain rule fires through `sin(theta(t))` and friends.
    pub fn diff(&self, var: &Symbol) -> Expr {
        if !self.depends_on(var) {
            return Expr::zero();
        }
        match self {
            Expr::Number(_) => Expr::zero(),
            Expr::Symbol(symbol) => {
                if symbol == var {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            Expr::Function(_) => Expr::derivative(self.clone(), var, 1),
            Expr::Derivative {
                expr,
                var: with_respect_to,
                order,
            } => {
                if with_respect_to == var {
                    Expr::derivative((**expr).clone(), var, order + 1)
                } else {
                    Expr::derivative(self.clone(), var, 1)
                }
            }
            Expr::Add(terms) => Expr::add(terms.iter().map(|t| t.diff(var)).collect::<Vec<_>>()),
            Expr::Mul(factors) => {
                // Product rule: sum over i of f_i' * prod_{j != i} f_j.
                let mut terms = Vec::with_capacity(factors.len());
                for (i, factor) in factors.iter().enumerate() {
                    let d = factor.diff(var);
                    if d.is_zero() {
                        continue;
                    }
                    let mut product = Vec::with_capacity(factors.len());
                    product.push(d);
                    product.extend(
                        factors
                            .iter()
                            .enumerate()
                            .filter(|(j, _)| *j != i)
                            .map(|(_, f)| f.clone()),
                    );
                    terms.push(Expr::mul(product));
                }
                Expr::add(terms)
            }
            Expr::Pow(base, exponent) => {
                let db = base.diff(var);
                if !exponent.depends_on(var) {
                    // d(b^e) = (e * b') * b^(e - 1); the inner product lets a
                    // numeric exponent distribute over a sum-valued b'.
                    let scaled = Expr::mul([(**exponent).clone(), db]);
                    let lowered = Expr::pow(
                        (**base).clone(),
                        Expr::add([(**exponent).clone(), Expr::number(-1.0)]),
                    );
                    return Expr::mul([scaled, lowered]);
                }
                // d(b^e) = b^e * (e' * ln(b) + e * b' / b)
                let de = exponent.diff(var);
                let log_term = Expr::mul([de, (**base).clone().ln()]);
                let base_term = Expr::mul([(**exponent).clone(), db, (**base).clone().recip()]);
                Expr::mul([self.clone(), Expr::add([log_term, base_term])])
            }
            Expr::Call(func, arg) => {
                let da = arg.diff(var);
                let outer = match func {
                    Func::Sin => (**arg).clone().cos(),
                    Func::Cos => -(**arg).clone().sin(),
                    Func::Exp => self.clone(),
                    Func::Ln => (**arg).clone().recip(),
                };
                Expr::mul([outer, da])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{Expr, Symbol, TimeFunction};

    fn t() -> Symbol {
        Symbol::real("t")
    }

    fn x() -> Expr {
        Expr::symbol(&Symbol::real("x"))
    }

    #[test]
    fn constants_and_foreign_symbols_vanish() {
        assert_eq!(Expr::number(4.0).diff(&t()), Expr::zero());
        assert_eq!(x().diff(&t()), Expr::zero());
        assert_eq!(Expr::symbol(&t()).diff(&t()), Expr::one());
    }

    #[test]
    fn polynomial_rules() {
        let xs = Symbol::real("x");
        let e = x().powi(3) + Expr::number(2.0) * x();
        assert_eq!(
            e.diff(&xs),
            Expr::number(3.0) * x().powi(2) + Expr::number(2.0)
        );
        assert_eq!(x().recip().diff(&xs), -x().powi(-2));
    }

    #[test]
    fn chain_rule_through_time_functions() {
        let theta = TimeFunction::real("theta", &t());
        let th = Expr::function(&theta);
        let dth = Expr::derivative(th.clone(), &t(), 1);
        assert_eq!(th.clone().sin().diff(&t()), th.clone().cos() * dth.clone());
        assert_eq!(
            th.clone().cos().diff(&t()),
            -(th.clone().sin() * dth.clone())
        );
        assert_eq!(
            dth.diff(&t()),
            Expr::derivative(th, &t(), 2)
        );
    }

    #[test]
    fn square_root_of_sum_distributes_the_half() {
        let a = Expr::function(&TimeFunction::real("a", &t()));
        let b = Expr::function(&TimeFunction::real("b", &t()));
        let da = Expr::derivative(a.clone(), &t(), 1);
        let db = Expr::derivative(b.clone(), &t(), 1);
        let n = Expr::norm(&[a.clone(), b.clone()]);
        let expected = (a.clone() * da + b.clone() * db)
            * Expr::pow(a.powi(2) + b.powi(2), Expr::number(-0.5));
        assert_eq!(n.diff(&t()), expected);
    }

    #[test]
    fn symbolic_exponent_uses_logarithm() {
        let xs = Symbol::real("x");
        let e = Expr::pow(x(), x());
        let expected = Expr::pow(x(), x()) * (x().ln() + Expr::one());
        assert_eq!(e.diff(&xs), expected);
    }

    #[test]
    fn exponential_and_log() {
        let xs = Symbol::real("x");
        let two_x = Expr::number(2.0) * x();
        assert_eq!(
            two_x.clone().exp().diff(&xs),
            Expr::number(2.0) * two_x.exp()
        );
        assert_eq!(x().ln().diff(&xs), x().recip());
    }
}
