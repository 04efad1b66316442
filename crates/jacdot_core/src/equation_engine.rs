use crate::error::{Result, SymbolicError};
use crate::expr::{Expr, Func, Symbol, TimeFunction};
use crate::render::Printer;
use crate::traits::Scalar;
use std::collections::HashMap;

/// OpCodes for the Stack-based Virtual Machine.
/// The VM operates on a stack of `Scalar` values (f64 or Dual).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a symbol (by slot index) onto the stack.
    LoadVar(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes a^n for a fixed integer n.
    Powi(i32),
    Sqrt,
    Sin,
    Cos,
    Exp,
    Ln,
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stack-based Virtual Machine for evaluating compiled expressions.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `vars`: Symbol values in slot order (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, vars: &[T], stack: &mut Vec<T>) -> Result<T> {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(T::constant(val)),
                OpCode::LoadVar(idx) => {
                    let value = vars.get(idx).copied().ok_or(SymbolicError::ArityMismatch {
                        expected: idx + 1,
                        got: vars.len(),
                    })?;
                    stack.push(value);
                }
                OpCode::Add => {
                    let (a, b) = pop_pair(stack)?;
                    stack.push(a + b);
                }
                OpCode::Mul => {
                    let (a, b) = pop_pair(stack)?;
                    stack.push(a * b);
                }
                OpCode::Pow => {
                    let (a, b) = pop_pair(stack)?;
                    stack.push(a.powf(b));
                }
                OpCode::Powi(n) => {
                    let a = pop(stack)?;
                    stack.push(a.powi(n));
                }
                OpCode::Sqrt => {
                    let a = pop(stack)?;
                    stack.push(a.sqrt());
                }
                OpCode::Sin => {
                    let a = pop(stack)?;
                    stack.push(a.sin());
                }
                OpCode::Cos => {
                    let a = pop(stack)?;
                    stack.push(a.cos());
                }
                OpCode::Exp => {
                    let a = pop(stack)?;
                    stack.push(a.exp());
                }
                OpCode::Ln => {
                    let a = pop(stack)?;
                    stack.push(a.ln());
                }
            }
        }

        pop(stack)
    }
}

fn pop<T>(stack: &mut Vec<T>) -> Result<T> {
    stack.pop().ok_or(SymbolicError::StackUnderflow)
}

fn pop_pair<T>(stack: &mut Vec<T>) -> Result<(T, T)> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    Ok((a, b))
}

/// Compiles a time-free `Expr` into `Bytecode`.
/// Resolves symbol names to slot indices.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[&str]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self { var_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Symbol(symbol) => {
                let idx = self
                    .var_map
                    .get(symbol.name())
                    .ok_or_else(|| SymbolicError::UnknownSymbol(symbol.name().to_string()))?;
                ops.push(OpCode::LoadVar(*idx));
            }
            Expr::Function(_) | Expr::Derivative { .. } => {
                return Err(SymbolicError::TimeDependent(Printer::default().print(expr)?));
            }
            Expr::Add(items) | Expr::Mul(items) => {
                let op = if matches!(expr, Expr::Add(_)) {
                    OpCode::Add
                } else {
                    OpCode::Mul
                };
                for (i, item) in items.iter().enumerate() {
                    self.compile_recursive(item, ops)?;
                    if i > 0 {
                        ops.push(op);
                    }
                }
            }
            Expr::Pow(base, exponent) => {
                self.compile_recursive(base, ops)?;
                match **exponent {
                    Expr::Number(e) if e == 0.5 => ops.push(OpCode::Sqrt),
                    Expr::Number(e) if e.fract() == 0.0 && e.abs() <= i32::MAX as f64 => {
                        ops.push(OpCode::Powi(e as i32))
                    }
                    _ => {
                        self.compile_recursive(exponent, ops)?;
                        ops.push(OpCode::Pow);
                    }
                }
            }
            Expr::Call(func, arg) => {
                self.compile_recursive(arg, ops)?;
                ops.push(match func {
                    Func::Sin => OpCode::Sin,
                    Func::Cos => OpCode::Cos,
                    Func::Exp => OpCode::Exp,
                    Func::Ln => OpCode::Ln,
                });
            }
        }
        Ok(())
    }
}

/// Compiles and evaluates `expr` once with named values.
pub fn evaluate<T: Scalar>(expr: &Expr, values: &[(&str, T)]) -> Result<T> {
    let names: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
    let vars: Vec<T> = values.iter().map(|(_, value)| *value).collect();
    let bytecode = Compiler::new(&names).compile(expr)?;
    let mut stack = Vec::with_capacity(16);
    VM::execute(&bytecode, &vars, &mut stack)
}

// --- Parser ---

/// Parses plain computer-algebra notation into a canonical `Expr`.
///
/// Identifiers become real symbols; `name(t)` with an identifier argument
/// becomes a function of time.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sum()?;
    if parser.pos != parser.tokens.len() {
        return Err(SymbolicError::parse("Unexpected trailing input", parser.pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Comma,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = num_str.parse().map_err(|_| {
                SymbolicError::parse(format!("Malformed number '{num_str}'"), tokens.len())
            })?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            chars.next();
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        Token::Caret
                    } else {
                        Token::Star
                    }
                }
                '/' => Token::Slash,
                '^' => Token::Caret,
                ',' => Token::Comma,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => {
                    return Err(SymbolicError::parse(
                        format!("Unexpected character '{other}'"),
                        tokens.len(),
                    ))
                }
            };
            tokens.push(token);
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.consume() {
            Some(token) if token == expected => Ok(()),
            _ => Err(SymbolicError::parse(
                format!("Expected {expected:?}"),
                self.pos.saturating_sub(1),
            )),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut left = self.parse_product()?;

        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.consume();
                    let right = self.parse_product()?;
                    left = left + right;
                }
                Some(Token::Minus) => {
                    self.consume();
                    let right = self.parse_product()?;
                    left = left - right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    left = left * right;
                }
                Some(Token::Slash) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    left = left / right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            return Ok(-self.parse_unary()?);
        }
        self.parse_power()
    }

    /// Right-associative; the exponent may carry its own unary minus.
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let position = self.pos;
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    self.parse_call(&name, position)
                } else {
                    Ok(Expr::symbol(&Symbol::real(name)))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_sum()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            _ => Err(SymbolicError::parse("Unexpected token", position)),
        }
    }

    fn parse_call(&mut self, name: &str, position: usize) -> Result<Expr> {
        if name == "Derivative" {
            return self.parse_derivative(position);
        }
        let arg = self.parse_sum()?;
        self.expect(Token::RParen)?;
        let func = match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "exp" => Func::Exp,
            "log" | "ln" => Func::Ln,
            "sqrt" => return Ok(Expr::sqrt(arg)),
            _ => {
                return match arg {
                    Expr::Symbol(time) => Ok(Expr::function(&TimeFunction::real(name, &time))),
                    _ => Err(SymbolicError::parse(
                        format!("Unknown function '{name}'"),
                        position,
                    )),
                };
            }
        };
        Ok(Expr::call(func, arg))
    }

    /// `Derivative(expr, t)` or `Derivative(expr, (t, n))`.
    fn parse_derivative(&mut self, position: usize) -> Result<Expr> {
        let expr = self.parse_sum()?;
        self.expect(Token::Comma)?;
        let (var, order) = match self.consume() {
            Some(Token::Identifier(var)) => (var, 1),
            Some(Token::LParen) => {
                let var = match self.consume() {
                    Some(Token::Identifier(var)) => var,
                    _ => return Err(SymbolicError::parse("Expected variable", self.pos)),
                };
                self.expect(Token::Comma)?;
                let order = match self.consume() {
                    Some(Token::Number(n)) if n >= 1.0 && n.fract() == 0.0 => n as u32,
                    _ => return Err(SymbolicError::parse("Expected derivative order", self.pos)),
                };
                self.expect(Token::RParen)?;
                (var, order)
            }
            _ => return Err(SymbolicError::parse("Malformed Derivative", position)),
        };
        self.expect(Token::RParen)?;
        Ok(Expr::derivative(expr, &Symbol::real(var), order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Dual;
    use crate::render::{Language, Printer};

    fn sym(name: &str) -> Expr {
        Expr::symbol(&Symbol::real(name))
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn parses_precedence_and_unary_minus() {
        assert_eq!(parse("-x**2").unwrap(), -sym("x").powi(2));
        assert_eq!(parse("2^3^2").unwrap(), Expr::number(512.0));
        assert_eq!(parse("x**-1").unwrap(), sym("x").recip());
        assert_eq!(
            parse("a + b*c").unwrap(),
            sym("a") + sym("b") * sym("c")
        );
        assert_eq!(parse("(a + b)/2").unwrap(), Expr::number(0.5) * (sym("a") + sym("b")));
    }

    #[test]
    fn parses_functions_and_time_dependence() {
        assert_eq!(parse("sqrt(x)").unwrap(), Expr::sqrt(sym("x")));
        assert_eq!(parse("log(x)").unwrap(), sym("x").ln());
        let t = Symbol::real("t");
        let th = Expr::function(&TimeFunction::real("theta", &t));
        assert_eq!(parse("theta(t)").unwrap(), th);
        assert_eq!(
            parse("Derivative(theta(t), t)").unwrap(),
            Expr::derivative(th.clone(), &t, 1)
        );
        assert_eq!(
            parse("Derivative(theta(t), (t, 2))").unwrap(),
            Expr::derivative(th, &t, 2)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert_err_contains(parse("x $ y"), "Unexpected character");
        assert_err_contains(parse("(x + y"), "Expected RParen");
        assert_err_contains(parse("x y"), "trailing");
        assert_err_contains(parse("foo(x + 1)"), "Unknown function");
        assert_err_contains(parse("1.2.3"), "Malformed number");
    }

    #[test]
    fn printed_plain_text_parses_back() {
        let e = Expr::one() - Expr::number(0.5) * sym("x") * sym("x").sin()
            / (Expr::one() - sym("x").cos());
        let text = Printer::new(Language::Plain).print(&e).unwrap();
        let back = parse(&text).unwrap();
        for x in [0.3, 1.1, 2.0] {
            let lhs = evaluate(&e, &[("x", x)]).unwrap();
            let rhs = evaluate(&back, &[("x", x)]).unwrap();
            assert!((lhs - rhs).abs() < 1e-14);
        }

        let p = [sym("p0"), sym("p1")];
        let q = [sym("q0"), sym("q1")];
        let e = Expr::dot(&p, &q) / Expr::norm(&p);
        let text = Printer::new(Language::Plain).print(&e).unwrap();
        assert_eq!(text, "(p0*q0 + p1*q1)/sqrt(p0**2 + p1**2)");
        assert_eq!(parse(&text).unwrap(), e);
    }

    #[test]
    fn compiles_and_evaluates_over_f64() {
        let e = parse("x**2*sin(y) + sqrt(z)/x").unwrap();
        let value = evaluate(&e, &[("x", 2.0), ("y", 0.3), ("z", 9.0)]).unwrap();
        let expected = 4.0 * 0.3_f64.sin() + 1.5;
        assert!((value - expected).abs() < 1e-14);
    }

    #[test]
    fn evaluates_forward_derivatives_over_dual() {
        let e = parse("x**3 + exp(x)").unwrap();
        let value = evaluate(&e, &[("x", Dual::variable(0.5))]).unwrap();
        let expected = 3.0 * 0.25 + 0.5_f64.exp();
        assert!((value.eps - expected).abs() < 1e-14);
    }

    #[test]
    fn compiler_reports_unknown_and_time_dependent_nodes() {
        assert_err_contains(Compiler::new(&["x"]).compile(&sym("y")), "Unknown symbol: y");
        let th = parse("theta(t)").unwrap();
        assert_err_contains(Compiler::new(&["t"]).compile(&th), "depends on time");
    }

    #[test]
    fn vm_reports_stack_underflow_and_missing_values() {
        let mut stack: Vec<f64> = Vec::new();
        let broken = Bytecode { ops: vec![OpCode::Add] };
        assert_eq!(
            VM::execute(&broken, &[], &mut stack),
            Err(SymbolicError::StackUnderflow)
        );
        let load = Bytecode { ops: vec![OpCode::LoadVar(1)] };
        assert_err_contains(VM::execute(&load, &[1.0], &mut stack), "Expected 2 values");
    }
}
