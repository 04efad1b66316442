pub mod autodiff;
pub mod cse;
pub mod derivation;
pub mod diff;
pub mod equation_engine;
pub mod error;
pub mod expr;
pub mod render;
pub mod subs;
/// The `jacdot_core` crate derives closed forms for the time derivative of the
/// exponential-coordinate Jacobian coefficient and of the rotation angle.
///
/// Key components:
/// - **Expr**: canonical symbolic expressions with time-dependent functions and unevaluated derivatives.
/// - **Diff / Subs**: differentiation and ordered substitution that removes time dependence.
/// - **Render / CSE**: printing to plain, Python, C or Rust notation, optionally with temporaries.
/// - **Equation Engine**: parser plus bytecode VM for evaluating rendered expressions, generic over `Scalar`.
/// - **Verify**: finite-difference and dual-number checks of the derived expressions.
pub mod traits;
pub mod verify;

pub use derivation::{derive, derive_with, Derivation, DerivationSymbols, RenderedDerivation};
pub use error::{Result, SymbolicError};
pub use expr::{Expr, Symbol, TimeFunction};
pub use render::{Language, Printer};
