//! Compile-time constant expression evaluation.
//!
//! The evaluator folds an expression subtree to a literal value when every
//! operand is statically known. It backs two analyzer features:
//!
//! - `DIM` bound validation (bounds must fold to non-negative integers)
//! - Opportunistic constant propagation across straight-line code and
//!   `IF` branches
//!
//! # Contract
//!
//! [`ConstantEvaluator::evaluate`] never fails and never diagnoses: any
//! arithmetic problem (division by zero, domain error, overflow) is caught
//! internally and folds to `None`. Whether "could not fold" is fatal is
//! the caller's decision.
//!
//! # BASIC-80 semantics
//!
//! Folding must reproduce the dialect exactly:
//!
//! - Relational operators yield `-1` for true, `0` for false.
//! - `\` and `MOD` truncate both operands to integers first.
//! - `AND`/`OR`/`XOR`/`EQV`/`IMP` operate on integer-coerced bit patterns;
//!   `EQV` is `~(l ^ r)` and `IMP` is `~l | r`.

use std::collections::BTreeMap;

use log::trace;

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// A folded constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer constant (numeric literals without a fractional part fold
    /// here, keeping `\`, `MOD`, and the bitwise operators exact).
    Integer(i64),
    /// Floating-point constant.
    Float(f64),
    /// String constant.
    Str(String),
}

impl Value {
    /// Numeric view of the value; `None` for strings.
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    /// Integer-coerced view (truncation toward zero); `None` for strings
    /// and for floats outside the i64 range.
    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(f) => {
                let t = f.trunc();
                if t >= i64::MIN as f64 && t <= i64::MAX as f64 {
                    Some(t as i64)
                } else {
                    None
                }
            }
            Value::Str(_) => None,
        }
    }

    /// Wraps an `f64`, collapsing whole values to `Integer`.
    fn from_f64(f: f64) -> Option<Value> {
        if !f.is_finite() {
            return None;
        }
        if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
            Some(Value::Integer(f as i64))
        } else {
            Some(Value::Float(f))
        }
    }

    /// BASIC truthiness: any nonzero numeric is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

/// Built-in functions that may fold when their arguments do.
///
/// Only deterministic pure functions qualify. Anything whose result
/// depends on external or mutable state must never fold, no matter how
/// constant its arguments look.
const FOLDABLE_FUNCTIONS: &[&str] = &[
    "ABS", "SGN", "INT", "FIX", "SIN", "COS", "TAN", "ATN", "EXP", "LOG", "SQR", "CINT", "CSNG",
    "CDBL", "PI",
];

/// Functions that are explicitly non-foldable regardless of arguments.
const NON_FOLDABLE_FUNCTIONS: &[&str] = &[
    "RND", "TIMER", "EOF", "LOC", "LOF", "INPUT$", "INKEY$", "PEEK", "INP", "FRE", "POS",
    "CSRLIN", "VARPTR",
];

/// Evaluates constant expressions and tracks which scalar variables
/// currently hold known constant values.
///
/// The `runtime_constants` map is *live* state: it reflects what is known
/// at the analyzer's current position in the statement walk, not a
/// program-wide fact. The analyzer is responsible for calling
/// [`set_constant`](Self::set_constant) /
/// [`clear_constant`](Self::clear_constant) at the right points.
#[derive(Debug, Default)]
pub struct ConstantEvaluator {
    /// Variables with a currently known constant value, keyed by
    /// uppercased sigil-inclusive name.
    runtime_constants: BTreeMap<String, Value>,
}

impl ConstantEvaluator {
    /// Creates an evaluator with no known constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a variable as holding a known constant value.
    pub fn set_constant(&mut self, name: &str, value: Value) {
        trace!("constant set: {} = {:?}", name.to_uppercase(), value);
        self.runtime_constants.insert(name.to_uppercase(), value);
    }

    /// Marks a variable as no longer holding a known constant value.
    pub fn clear_constant(&mut self, name: &str) {
        if self.runtime_constants.remove(&name.to_uppercase()).is_some() {
            trace!("constant cleared: {}", name.to_uppercase());
        }
    }

    /// Whether the variable currently has a known constant value.
    pub fn has_constant(&self, name: &str) -> bool {
        self.runtime_constants.contains_key(&name.to_uppercase())
    }

    /// Snapshot of the live constant map, for `IF`-branch save/restore.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.runtime_constants.clone()
    }

    /// Replaces the live constant map wholesale.
    pub fn restore(&mut self, snapshot: BTreeMap<String, Value>) {
        self.runtime_constants = snapshot;
    }

    /// Attempts to evaluate an expression as a compile-time constant.
    ///
    /// Returns `None` when the expression cannot be folded: it references
    /// an unknown variable, an array element, a non-deterministic
    /// function, or its arithmetic fails.
    pub fn evaluate(&self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Number(n) => Value::from_f64(*n),
            Expr::String(s) => Some(Value::Str(s.clone())),

            // Only simple scalars can be runtime constants; array elements
            // never fold.
            Expr::Variable(var) => {
                if var.subscripts.is_some() {
                    return None;
                }
                self.runtime_constants.get(&var.name.to_uppercase()).cloned()
            }

            Expr::BinaryOp { op, left, right } => {
                let l = self.evaluate(left)?;
                let r = self.evaluate(right)?;
                self.fold_binary(*op, l, r)
            }

            Expr::UnaryOp { op, operand } => {
                let v = self.evaluate(operand)?;
                self.fold_unary(*op, v)
            }

            Expr::FunctionCall { name, args } => self.fold_function(name, args),
        }
    }

    /// Evaluates and coerces to an integer (truncation), or `None`.
    pub fn evaluate_to_int(&self, expr: &Expr) -> Option<i64> {
        self.evaluate(expr)?.as_i64()
    }

    fn fold_binary(&self, op: BinaryOp, left: Value, right: Value) -> Option<Value> {
        // String operands: concatenation and comparison only.
        if let (Value::Str(l), Value::Str(r)) = (&left, &right) {
            return match op {
                BinaryOp::Add => Some(Value::Str(format!("{}{}", l, r))),
                BinaryOp::Eq => Some(basic_bool(l == r)),
                BinaryOp::Ne => Some(basic_bool(l != r)),
                BinaryOp::Lt => Some(basic_bool(l < r)),
                BinaryOp::Le => Some(basic_bool(l <= r)),
                BinaryOp::Gt => Some(basic_bool(l > r)),
                BinaryOp::Ge => Some(basic_bool(l >= r)),
                _ => None,
            };
        }

        match op {
            // Integer-coercing operators.
            BinaryOp::IntDiv => {
                let (l, r) = (left.as_i64()?, right.as_i64()?);
                if r == 0 {
                    return None;
                }
                l.checked_div(r).map(Value::Integer)
            }
            BinaryOp::Mod => {
                let (l, r) = (left.as_i64()?, right.as_i64()?);
                if r == 0 {
                    return None;
                }
                l.checked_rem(r).map(Value::Integer)
            }
            BinaryOp::And => Some(Value::Integer(left.as_i64()? & right.as_i64()?)),
            BinaryOp::Or => Some(Value::Integer(left.as_i64()? | right.as_i64()?)),
            BinaryOp::Xor => Some(Value::Integer(left.as_i64()? ^ right.as_i64()?)),
            BinaryOp::Eqv => Some(Value::Integer(!(left.as_i64()? ^ right.as_i64()?))),
            BinaryOp::Imp => Some(Value::Integer(!left.as_i64()? | right.as_i64()?)),

            // Relational operators: -1 true, 0 false.
            BinaryOp::Eq => Some(basic_bool(left.as_f64()? == right.as_f64()?)),
            BinaryOp::Ne => Some(basic_bool(left.as_f64()? != right.as_f64()?)),
            BinaryOp::Lt => Some(basic_bool(left.as_f64()? < right.as_f64()?)),
            BinaryOp::Le => Some(basic_bool(left.as_f64()? <= right.as_f64()?)),
            BinaryOp::Gt => Some(basic_bool(left.as_f64()? > right.as_f64()?)),
            BinaryOp::Ge => Some(basic_bool(left.as_f64()? >= right.as_f64()?)),

            // Arithmetic: exact integer paths where possible, otherwise
            // float with overflow folding to None.
            BinaryOp::Add => match (&left, &right) {
                (Value::Integer(l), Value::Integer(r)) => l.checked_add(*r).map(Value::Integer),
                _ => Value::from_f64(left.as_f64()? + right.as_f64()?),
            },
            BinaryOp::Sub => match (&left, &right) {
                (Value::Integer(l), Value::Integer(r)) => l.checked_sub(*r).map(Value::Integer),
                _ => Value::from_f64(left.as_f64()? - right.as_f64()?),
            },
            BinaryOp::Mul => match (&left, &right) {
                (Value::Integer(l), Value::Integer(r)) => l.checked_mul(*r).map(Value::Integer),
                _ => Value::from_f64(left.as_f64()? * right.as_f64()?),
            },
            BinaryOp::Div => {
                let r = right.as_f64()?;
                if r == 0.0 {
                    return None;
                }
                Value::from_f64(left.as_f64()? / r)
            }
            BinaryOp::Pow => {
                if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
                    if let Ok(exp) = u32::try_from(*r) {
                        return l.checked_pow(exp).map(Value::Integer);
                    }
                }
                Value::from_f64(left.as_f64()?.powf(right.as_f64()?))
            }
        }
    }

    fn fold_unary(&self, op: UnaryOp, value: Value) -> Option<Value> {
        match op {
            UnaryOp::Neg => match value {
                Value::Integer(n) => n.checked_neg().map(Value::Integer),
                Value::Float(f) => Some(Value::Float(-f)),
                Value::Str(_) => None,
            },
            UnaryOp::Plus => match value {
                Value::Str(_) => None,
                v => Some(v),
            },
            UnaryOp::Not => Some(Value::Integer(!value.as_i64()?)),
        }
    }

    fn fold_function(&self, name: &str, args: &[Expr]) -> Option<Value> {
        let name = name.to_uppercase();

        if NON_FOLDABLE_FUNCTIONS.contains(&name.as_str()) {
            return None;
        }
        if !FOLDABLE_FUNCTIONS.contains(&name.as_str()) {
            // User-defined FN* calls and everything else stay runtime-only.
            return None;
        }

        if name == "PI" {
            return args.is_empty().then(|| Value::Float(std::f64::consts::PI));
        }

        if args.len() != 1 {
            return None;
        }
        let arg = self.evaluate(&args[0])?.as_f64()?;

        match name.as_str() {
            "ABS" => Value::from_f64(arg.abs()),
            "SGN" => Some(Value::Integer(if arg > 0.0 {
                1
            } else if arg < 0.0 {
                -1
            } else {
                0
            })),
            "INT" => Value::from_f64(arg.floor()),
            "FIX" => Value::from_f64(arg.trunc()),
            "CINT" => Value::from_f64(arg.round()),
            "CSNG" => Some(Value::Float(arg as f32 as f64)),
            "CDBL" => Some(Value::Float(arg)),
            "SIN" => Value::from_f64(arg.sin()),
            "COS" => Value::from_f64(arg.cos()),
            "TAN" => Value::from_f64(arg.tan()),
            "ATN" => Value::from_f64(arg.atan()),
            "EXP" => Value::from_f64(arg.exp()),
            "LOG" => {
                if arg <= 0.0 {
                    return None;
                }
                Value::from_f64(arg.ln())
            }
            "SQR" => {
                if arg < 0.0 {
                    return None;
                }
                Value::from_f64(arg.sqrt())
            }
            _ => None,
        }
    }
}

/// BASIC comparison result: -1 for true, 0 for false.
fn basic_bool(b: bool) -> Value {
    Value::Integer(if b { -1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::VarRef;

    fn num(n: f64) -> Expr {
        Expr::Number(n)
    }

    fn bin(op: BinaryOp, l: Expr, r: Expr) -> Expr {
        Expr::binary(op, l, r)
    }

    #[test]
    fn test_literal_folding() {
        let ev = ConstantEvaluator::new();
        assert_eq!(ev.evaluate(&num(42.0)), Some(Value::Integer(42)));
        assert_eq!(ev.evaluate(&num(1.5)), Some(Value::Float(1.5)));
        assert_eq!(
            ev.evaluate(&Expr::String("HI".into())),
            Some(Value::Str("HI".into()))
        );
    }

    #[test]
    fn test_arithmetic() {
        let ev = ConstantEvaluator::new();
        let e = bin(BinaryOp::Add, num(2.0), bin(BinaryOp::Mul, num(3.0), num(4.0)));
        assert_eq!(ev.evaluate(&e), Some(Value::Integer(14)));
    }

    #[test]
    fn test_relational_yields_minus_one() {
        let ev = ConstantEvaluator::new();
        assert_eq!(
            ev.evaluate(&bin(BinaryOp::Lt, num(1.0), num(2.0))),
            Some(Value::Integer(-1))
        );
        assert_eq!(
            ev.evaluate(&bin(BinaryOp::Gt, num(1.0), num(2.0))),
            Some(Value::Integer(0))
        );
    }

    #[test]
    fn test_int_div_and_mod_truncate() {
        let ev = ConstantEvaluator::new();
        assert_eq!(
            ev.evaluate(&bin(BinaryOp::IntDiv, num(7.9), num(2.1))),
            Some(Value::Integer(3))
        );
        assert_eq!(
            ev.evaluate(&bin(BinaryOp::Mod, num(7.0), num(3.0))),
            Some(Value::Integer(1))
        );
    }

    #[test]
    fn test_eqv_imp_are_bitwise() {
        let ev = ConstantEvaluator::new();
        // EQV: ~(l ^ r)
        assert_eq!(
            ev.evaluate(&bin(BinaryOp::Eqv, num(5.0), num(3.0))),
            Some(Value::Integer(!(5i64 ^ 3i64)))
        );
        // IMP: ~l | r
        assert_eq!(
            ev.evaluate(&bin(BinaryOp::Imp, num(5.0), num(3.0))),
            Some(Value::Integer(!5i64 | 3i64))
        );
    }

    #[test]
    fn test_division_by_zero_folds_to_none() {
        let ev = ConstantEvaluator::new();
        assert_eq!(ev.evaluate(&bin(BinaryOp::Div, num(1.0), num(0.0))), None);
        assert_eq!(ev.evaluate(&bin(BinaryOp::IntDiv, num(1.0), num(0.0))), None);
        assert_eq!(ev.evaluate(&bin(BinaryOp::Mod, num(1.0), num(0.0))), None);
    }

    #[test]
    fn test_variable_folds_only_when_tracked() {
        let mut ev = ConstantEvaluator::new();
        let x = Expr::var("N%");
        assert_eq!(ev.evaluate(&x), None);

        ev.set_constant("N%", Value::Integer(10));
        assert_eq!(ev.evaluate(&x), Some(Value::Integer(10)));

        ev.clear_constant("n%");
        assert_eq!(ev.evaluate(&x), None);
    }

    #[test]
    fn test_array_element_never_folds() {
        let mut ev = ConstantEvaluator::new();
        ev.set_constant("A", Value::Integer(1));
        let elem = Expr::Variable(VarRef::subscripted("A", vec![num(0.0)]));
        assert_eq!(ev.evaluate(&elem), None);
    }

    #[test]
    fn test_deterministic_functions_fold() {
        let ev = ConstantEvaluator::new();
        let e = Expr::FunctionCall {
            name: "SQR".into(),
            args: vec![num(9.0)],
        };
        assert_eq!(ev.evaluate(&e), Some(Value::Integer(3)));

        let e = Expr::FunctionCall {
            name: "ABS".into(),
            args: vec![num(-4.0)],
        };
        assert_eq!(ev.evaluate(&e), Some(Value::Integer(4)));
    }

    #[test]
    fn test_stateful_functions_never_fold() {
        let ev = ConstantEvaluator::new();
        for name in ["RND", "TIMER", "PEEK", "INKEY$"] {
            let e = Expr::FunctionCall {
                name: name.to_string(),
                args: vec![num(1.0)],
            };
            assert_eq!(ev.evaluate(&e), None, "{} must not fold", name);
        }

        // Nested at depth: 1 + RND(1) * 2 must not fold either.
        let nested = bin(
            BinaryOp::Add,
            num(1.0),
            bin(
                BinaryOp::Mul,
                Expr::FunctionCall {
                    name: "RND".into(),
                    args: vec![num(1.0)],
                },
                num(2.0),
            ),
        );
        assert_eq!(ev.evaluate(&nested), None);
    }

    #[test]
    fn test_log_domain_error_folds_to_none() {
        let ev = ConstantEvaluator::new();
        let e = Expr::FunctionCall {
            name: "LOG".into(),
            args: vec![num(0.0)],
        };
        assert_eq!(ev.evaluate(&e), None);
        let e = Expr::FunctionCall {
            name: "SQR".into(),
            args: vec![num(-1.0)],
        };
        assert_eq!(ev.evaluate(&e), None);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut ev = ConstantEvaluator::new();
        ev.set_constant("A", Value::Integer(1));
        let snap = ev.snapshot();
        ev.set_constant("B", Value::Integer(2));
        ev.clear_constant("A");
        ev.restore(snap);
        assert!(ev.has_constant("A"));
        assert!(!ev.has_constant("B"));
    }

    mod properties {
        use super::*;
        use quickcheck_macros::quickcheck;

        /// Comparisons fold to exactly -1 or 0, never any other value.
        #[quickcheck]
        fn comparisons_yield_basic_booleans(l: i32, r: i32) -> bool {
            let ev = ConstantEvaluator::new();
            [
                BinaryOp::Eq,
                BinaryOp::Ne,
                BinaryOp::Lt,
                BinaryOp::Le,
                BinaryOp::Gt,
                BinaryOp::Ge,
            ]
            .iter()
            .all(|&op| {
                matches!(
                    ev.evaluate(&bin(op, num(l as f64), num(r as f64))),
                    Some(Value::Integer(-1)) | Some(Value::Integer(0))
                )
            })
        }

        /// Integer division and MOD agree with truncating semantics.
        #[quickcheck]
        fn int_div_matches_truncation(l: i32, r: i32) -> bool {
            let ev = ConstantEvaluator::new();
            let folded = ev.evaluate(&bin(BinaryOp::IntDiv, num(l as f64), num(r as f64)));
            if r == 0 {
                folded.is_none()
            } else {
                folded == Some(Value::Integer(l as i64 / r as i64))
            }
        }

        /// An expression containing RND never folds, however deep.
        #[quickcheck]
        fn rnd_poisons_folding(wrap: u8) -> bool {
            let ev = ConstantEvaluator::new();
            let mut e = Expr::FunctionCall {
                name: "RND".into(),
                args: vec![],
            };
            for _ in 0..(wrap % 8) {
                e = bin(BinaryOp::Add, num(1.0), e);
            }
            ev.evaluate(&e).is_none()
        }
    }
}
