//! # mb80
//!
//! A compiler core that translates Microsoft BASIC-80 programs into C
//! suitable for z88dk, targeting CP/M on Z80-class hardware.
//!
//! ## Architecture
//!
//! The compiler follows a traditional pipeline:
//!
//! ```text
//! AST → Semantic Analysis → (SymbolTable, flags) → CodeGen → C source
//! ```
//!
//! Lexing and parsing are external: callers hand this crate a fully formed
//! [`ast::Program`]. Each phase is implemented as a separate module:
//!
//! - [`ast`] - AST type definitions (the input contract)
//! - [`semantic`] - Symbol tables, constant evaluation, static validation
//! - [`codegen`] - Code generation backends (C backend implemented)
//!
//! ## Example
//!
//! ```
//! use mb80::prelude::*;
//!
//! let program = Program::new(vec![Line::new(
//!     10,
//!     vec![Statement::Print {
//!         expressions: vec![Expr::Number(42.0)],
//!         separators: vec![None],
//!     }],
//! )]);
//!
//! let mut analyzer = SemanticAnalyzer::new();
//! assert!(analyzer.analyze(&program));
//!
//! let mut backend = CBackend::new(analyzer.into_symbols());
//! let c_source = backend.generate(&program);
//! assert!(c_source.contains("int main("));
//! ```

pub mod ast;
pub mod codegen;
pub mod semantic;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::ast::{
        ArrayDecl, BinaryOp, Expr, Line, Program, Statement, UnaryOp, VarRef,
    };
    pub use crate::codegen::{CBackend, CodeGenBackend};
    pub use crate::semantic::{
        CompilerFlags, SemanticAnalyzer, SemanticError, SymbolTable, VarType,
    };
}
