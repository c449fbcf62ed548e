//! Abstract Syntax Tree (AST) definitions for mb80.
//!
//! The AST represents a line-numbered BASIC-80 program after parsing.
//! Parsing happens outside this crate; the analyzer and the code
//! generators consume this tree as-is.
//!
//! # Structure
//!
//! ```text
//! Program
//! └── Vec<Line>
//!     ├── line_number
//!     └── Vec<Statement>
//!         ├── Print { expressions, separators }
//!         ├── Let { target, value: Expr }
//!         ├── If { condition: Expr, then_statements, ... }
//!         └── ...
//! ```
//!
//! # Design Decisions
//!
//! - **Owned nodes**: AST nodes own their children (no lifetimes). This
//!   simplifies later compiler phases since the AST can outlive the source
//!   text.
//! - **Line numbers as locations**: the dialect is line-numbered, so the
//!   line number on each [`Line`] doubles as the diagnostic location; no
//!   byte spans are carried.
//! - **Separated expression/statement types**: Reflects BASIC's distinction
//!   between expressions (produce values) and statements (perform actions).

mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;

/// A complete BASIC program.
///
/// A program is a sequence of numbered lines; control flow between lines
/// is expressed entirely through line-number references (`GOTO`, `GOSUB`,
/// `IF ... THEN <line>`).
#[derive(Debug, Clone)]
pub struct Program {
    /// The lines that make up the program, in source order.
    pub lines: Vec<Line>,
}

impl Program {
    /// Creates a new program with the given lines.
    pub fn new(lines: Vec<Line>) -> Self {
        Self { lines }
    }
}

/// A single numbered line holding one or more colon-separated statements.
#[derive(Debug, Clone)]
pub struct Line {
    /// The BASIC line number.
    pub line_number: u32,
    /// The statements on this line, in execution order.
    pub statements: Vec<Statement>,
}

impl Line {
    /// Creates a new line with the given number and statements.
    pub fn new(line_number: u32, statements: Vec<Statement>) -> Self {
        Self {
            line_number,
            statements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_new() {
        let program = Program::new(vec![Line::new(10, vec![Statement::End])]);
        assert_eq!(program.lines.len(), 1);
        assert_eq!(program.lines[0].line_number, 10);
    }

    #[test]
    fn test_line_holds_multiple_statements() {
        let line = Line::new(
            20,
            vec![Statement::Remark("setup".to_string()), Statement::End],
        );
        assert_eq!(line.statements.len(), 2);
    }
}
