use crate::expr::{Expr, Symbol};

/// Result of common-subexpression elimination: temporaries in evaluation
/// order followed by the reduced expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonSubexpressions {
    pub bindings: Vec<(Symbol, Expr)>,
    pub reduced: Expr,
}

impl CommonSubexpressions {
    /// Substitutes the temporaries back, last binding first.
    pub fn expand(&self) -> Expr {
        self.bindings
            .iter()
            .rev()
            .fold(self.reduced.clone(), |acc, (symbol, value)| {
                acc.replace(&Expr::symbol(symbol), value)
            })
    }
}

/// Binds repeated compound subtrees to `prefix0`, `prefix1`, ...
///
/// The smallest repeated subtree is extracted first, so later bindings may
/// refer to earlier temporaries but never the other way round. If `expr`
/// already uses a name of that shape, underscores are appended to `prefix`
/// until the temporaries are fresh.
pub fn eliminate(expr: &Expr, prefix: &str) -> CommonSubexpressions {
    let prefix = unused_prefix(expr, prefix);
    let mut reduced = expr.clone();
    let mut bindings = Vec::new();
    while let Some(repeated) = first_repeated(&reduced) {
        let symbol = Symbol::real(format!("{prefix}{}", bindings.len()));
        reduced = reduced.replace(&repeated, &Expr::symbol(&symbol));
        bindings.push((symbol, repeated));
    }
    CommonSubexpressions { bindings, reduced }
}

fn unused_prefix(expr: &Expr, base: &str) -> String {
    let taken = expr.free_symbols();
    let clashes = |prefix: &str| {
        taken.iter().any(|symbol| {
            symbol.name().strip_prefix(prefix).is_some_and(|rest| {
                !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
            })
        })
    };
    let mut prefix = base.to_string();
    while clashes(&prefix) {
        prefix.push('_');
    }
    prefix
}

fn first_repeated(expr: &Expr) -> Option<Expr> {
    let mut seen: Vec<(&Expr, usize)> = Vec::new();
    count(expr, &mut seen);
    seen.into_iter()
        .find(|(_, n)| *n >= 2)
        .map(|(e, _)| e.clone())
}

/// Post-order occurrence count of worthwhile subtrees.
fn count<'a>(expr: &'a Expr, seen: &mut Vec<(&'a Expr, usize)>) {
    match expr {
        Expr::Add(items) | Expr::Mul(items) => items.iter().for_each(|e| count(e, seen)),
        Expr::Pow(base, exponent) => {
            count(base, seen);
            count(exponent, seen);
        }
        Expr::Call(_, arg) => count(arg, seen),
        _ => return,
    }
    if is_trivial(expr) {
        return;
    }
    match seen.iter_mut().find(|(e, _)| *e == expr) {
        Some(entry) => entry.1 += 1,
        None => seen.push((expr, 1)),
    }
}

/// Negated atoms and plain reciprocals are cheaper inline than as temporaries.
fn is_trivial(expr: &Expr) -> bool {
    match expr {
        Expr::Mul(items) => items.len() == 2 && matches!(items[0], Expr::Number(_)) && items[1].is_atom(),
        Expr::Pow(base, exponent) => base.is_atom() && **exponent == Expr::number(-1.0),
        _ => false,
    }
}
