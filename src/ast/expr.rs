//! Expression AST nodes.
//!
//! Expressions are constructs that evaluate to a value. In BASIC-80 these
//! include literals, variables (optionally subscripted), arithmetic and
//! relational operations, and function calls.
//!
//! # BASIC-80 semantics worth remembering
//!
//! - Relational operators evaluate to `-1` (true) or `0` (false), not
//!   `1`/`0`.
//! - `\` is integer division and `MOD` is integer remainder; both coerce
//!   their operands to integers before computing.
//! - `AND`, `OR`, `XOR`, `EQV`, `IMP` are bitwise over integer-coerced
//!   operands.

/// The different kinds of expressions in BASIC-80.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal: `42`, `3.14`, `1E5`
    Number(f64),

    /// String literal: `"HELLO"`
    String(String),

    /// Variable or array-element reference: `X`, `NAME$`, `A(I,J)`
    Variable(VarRef),

    /// Binary operation: `left op right`
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation: `-X`, `NOT FLAG%`
    UnaryOp { op: UnaryOp, operand: Box<Expr> },

    /// Built-in or user-defined function call: `SQR(2)`, `FNDOUBLE(I)`
    ///
    /// Array indexing is *not* routed through here; subscripts live on
    /// [`VarRef`].
    FunctionCall { name: String, args: Vec<Expr> },
}

/// A variable reference, possibly subscripted.
///
/// The name keeps its type sigil (`%`, `!`, `#`, `$`); the sigil is part
/// of the symbol's identity throughout the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    /// Variable name including any trailing sigil.
    pub name: String,
    /// Subscript expressions when this is an array element access.
    pub subscripts: Option<Vec<Expr>>,
}

impl VarRef {
    /// Creates a scalar (unsubscripted) variable reference.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscripts: None,
        }
    }

    /// Creates an array-element reference.
    pub fn subscripted(name: impl Into<String>, subscripts: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            subscripts: Some(subscripts),
        }
    }

    /// Returns true when this reference carries subscripts.
    pub fn is_subscripted(&self) -> bool {
        self.subscripts.is_some()
    }
}

/// Binary operators, organized roughly by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `^` - Exponentiation
    Pow,
    /// `*` - Multiplication
    Mul,
    /// `/` - Floating-point division
    Div,
    /// `\` - Integer division
    IntDiv,
    /// `MOD` - Integer remainder
    Mod,
    /// `+` - Addition (also string concatenation)
    Add,
    /// `-` - Subtraction
    Sub,

    /// `=` - Equality
    Eq,
    /// `<>` - Inequality
    Ne,
    /// `<` - Less than
    Lt,
    /// `<=` - Less than or equal
    Le,
    /// `>` - Greater than
    Gt,
    /// `>=` - Greater than or equal
    Ge,

    /// `AND` - Bitwise AND
    And,
    /// `OR` - Bitwise OR
    Or,
    /// `XOR` - Bitwise exclusive OR
    Xor,
    /// `EQV` - Bitwise equivalence
    Eqv,
    /// `IMP` - Bitwise implication
    Imp,
}

impl BinaryOp {
    /// Returns the BASIC source spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Pow => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "\\",
            BinaryOp::Mod => "MOD",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::Eqv => "EQV",
            BinaryOp::Imp => "IMP",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-` - Numeric negation
    Neg,
    /// `+` - Identity
    Plus,
    /// `NOT` - Bitwise complement
    Not,
}

impl UnaryOp {
    /// Returns the BASIC source spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "NOT",
        }
    }
}

impl Expr {
    /// Convenience constructor for a binary operation.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Convenience constructor for a unary operation.
    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Convenience constructor for a scalar variable reference.
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Variable(VarRef::scalar(name))
    }
}
