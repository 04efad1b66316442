use crate::expr::Expr;

impl Expr {
    /// Replaces every subtree structurally equal to `pattern`.
    ///
    /// Matching is top-down: once a node matches, its replacement is not
    /// searched again.
    pub fn replace(&self, pattern: &Expr, replacement: &Expr) -> Expr {
        if self == pattern {
            return replacement.clone();
        }
        self.map_children(|child| child.replace(pattern, replacement))
    }
}

/// An ordered set of `pattern -> replacement` rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    rules: Vec<(Expr, Expr)>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, pattern: impl Into<Expr>, replacement: impl Into<Expr>) -> Self {
        self.push(pattern.into(), replacement.into());
        self
    }

    pub fn push(&mut self, pattern: Expr, replacement: Expr) {
        self.rules.push((pattern, replacement));
    }

    pub fn rules(&self) -> &[(Expr, Expr)] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the rules one after another, each over the whole expression.
    /// Rule order matters: a later pattern sees the output of earlier rules.
    pub fn apply(&self, expr: &Expr) -> Expr {
        self.rules
            .iter()
            .fold(expr.clone(), |acc, (pattern, replacement)| {
                acc.replace(pattern, replacement)
            })
    }

    /// Applies all rules in a single top-down pass. At each node the first
    /// matching rule wins and the replacement is left untouched.
    pub fn apply_simultaneous(&self, expr: &Expr) -> Expr {
        if let Some((_, replacement)) = self.rules.iter().find(|(pattern, _)| pattern == expr) {
            return replacement.clone();
        }
        expr.map_children(|child| self.apply_simultaneous(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Symbol, TimeFunction};

    struct Fixture {
        th: Expr,
        dth: Expr,
        theta: Expr,
        theta_dot: Expr,
    }

    fn fixture() -> Fixture {
        let t = Symbol::real("t");
        let th = Expr::function(&TimeFunction::real("theta", &t));
        Fixture {
            dth: Expr::derivative(th.clone(), &t, 1),
            th,
            theta: Expr::symbol(&Symbol::real("theta")),
            theta_dot: Expr::symbol(&Symbol::real("theta_dot")),
        }
    }

    #[test]
    fn derivative_first_order_removes_time() {
        let f = fixture();
        let e = f.th.clone().sin() * f.dth.clone();
        let subs = Substitution::new()
            .rule(f.dth.clone(), f.theta_dot.clone())
            .rule(f.th.clone(), f.theta.clone());
        let out = subs.apply(&e);
        assert!(out.is_time_free());
        assert_eq!(out, f.theta_dot.clone() * f.theta.clone().sin());
    }

    #[test]
    fn base_first_order_strands_the_derivative() {
        let f = fixture();
        let e = f.th.clone().sin() * f.dth.clone();
        let subs = Substitution::new()
            .rule(f.th.clone(), f.theta.clone())
            .rule(f.dth.clone(), f.theta_dot.clone());
        let out = subs.apply(&e);
        assert!(out.has_derivative());
        assert!(!out.is_time_free());
    }

    #[test]
    fn simultaneous_pass_is_insensitive_to_rule_order() {
        let f = fixture();
        let e = f.th.clone().cos() + f.dth.clone() * f.th.clone();
        let forward = Substitution::new()
            .rule(f.dth.clone(), f.theta_dot.clone())
            .rule(f.th.clone(), f.theta.clone());
        let backward = Substitution::new()
            .rule(f.th.clone(), f.theta.clone())
            .rule(f.dth.clone(), f.theta_dot.clone());
        let a = forward.apply_simultaneous(&e);
        let b = backward.apply_simultaneous(&e);
        assert_eq!(a, b);
        assert!(a.is_time_free());
    }

    #[test]
    fn replacement_recanonicalises() {
        let x = Expr::symbol(&Symbol::real("x"));
        let y = Expr::symbol(&Symbol::real("y"));
        let e = x.clone() + y.clone();
        assert_eq!(e.replace(&y, &x), Expr::number(2.0) * x);
        assert!(Substitution::new().is_empty());
    }
}
