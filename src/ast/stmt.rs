//! Statement AST nodes.
//!
//! One enum variant per statement kind. Keeping the set closed means every
//! `match` in the analyzer and the backends is exhaustive: adding a new
//! statement kind will not compile until each phase handles it.

use super::{Expr, VarRef};

/// A single array declaration inside a `DIM` statement.
///
/// `DIM A(10), B$(N%, 5)` carries two of these.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDecl {
    /// Array name including any sigil.
    pub name: String,
    /// One bound expression per dimension. Bounds are inclusive upper
    /// bounds; with OPTION BASE 0 a bound of `10` means 11 elements.
    pub dimensions: Vec<Expr>,
}

/// The target of a `RESUME` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeTarget {
    /// `RESUME` - retry the statement that raised the error.
    Retry,
    /// `RESUME NEXT` - continue at the statement after the error site.
    Next,
    /// `RESUME <line>` - continue at a specific line.
    Line(u32),
}

/// A literal value inside a `DATA` statement.
///
/// `DATA` items are restricted to literals (with optional sign on
/// numbers); general expressions are not part of the dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// A numeric literal, sign already applied.
    Number(f64),
    /// A string literal.
    String(String),
}

/// The different kinds of statements in BASIC-80.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `PRINT expr1; expr2, expr3`
    ///
    /// `separators[i]` is the separator *after* `expressions[i]`:
    /// `Some(';')` for tight join, `Some(',')` for zone join, `None` for
    /// end-of-list (newline).
    Print {
        expressions: Vec<Expr>,
        separators: Vec<Option<char>>,
    },

    /// `LET v = expr` (or the implicit form without `LET`)
    Let { target: VarRef, value: Expr },

    /// `INPUT ["prompt";] v1, v2`
    Input {
        prompt: Option<String>,
        variables: Vec<VarRef>,
        /// `INPUT;` suppresses the `"? "` prompt.
        suppress_question: bool,
    },

    /// `LINE INPUT ["prompt";] v$` - reads a whole line into one string.
    LineInput {
        prompt: Option<String>,
        variable: VarRef,
    },

    /// `IF cond THEN ... [ELSE ...]`
    ///
    /// Either branch is a statement list *or* a direct line-number target
    /// (`IF X THEN 100`); the line forms are kept separate because they
    /// lower to plain `goto`s.
    If {
        condition: Expr,
        then_statements: Vec<Statement>,
        then_line: Option<u32>,
        else_statements: Option<Vec<Statement>>,
        else_line: Option<u32>,
    },

    /// `FOR v = start TO end [STEP step]`
    For {
        variable: VarRef,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
    },

    /// `NEXT [v1, v2]`
    Next { variables: Vec<VarRef> },

    /// `WHILE cond`
    While { condition: Expr },

    /// `WEND`
    Wend,

    /// `GOTO line`
    Goto(u32),

    /// `GOSUB line`
    Gosub(u32),

    /// `RETURN`
    Return,

    /// `ON expr GOTO l1, l2, ...`
    OnGoto { selector: Expr, targets: Vec<u32> },

    /// `ON expr GOSUB l1, l2, ...`
    OnGosub { selector: Expr, targets: Vec<u32> },

    /// `DIM a(d1, d2), b(d)`
    Dim { arrays: Vec<ArrayDecl> },

    /// `DATA v1, v2, ...`
    Data(Vec<DataValue>),

    /// `READ v1, v2`
    Read { variables: Vec<VarRef> },

    /// `RESTORE [line]`
    Restore(Option<u32>),

    /// `DEF FNname(p1, p2) = expr`
    DefFn {
        /// Function name including the `FN` prefix and any sigil.
        name: String,
        parameters: Vec<VarRef>,
        body: Expr,
    },

    /// `ON ERROR GOTO line`
    OnErrorGoto(u32),

    /// `RESUME` / `RESUME NEXT` / `RESUME line`
    Resume(ResumeTarget),

    /// `TRON` - enable trace
    Tron,

    /// `TROFF` - disable trace
    Troff,

    /// `POKE addr, value`
    Poke { address: Expr, value: Expr },

    /// `OUT port, value`
    Out { port: Expr, value: Expr },

    /// `END`
    End,

    /// `REM comment` (or `'` form)
    Remark(String),

    // Interactive-mode commands. These parse, but a compiled standalone
    // program has no meaning for them; the analyzer rejects each one.
    /// `LIST`
    List,
    /// `LOAD "file"`
    Load,
    /// `SAVE "file"`
    Save,
    /// `MERGE "file"`
    Merge,
    /// `NEW`
    New,
    /// `CONT`
    Cont,
    /// `DELETE range`
    Delete,
    /// `RENUM`
    Renum,
    /// `COMMON v1, v2`
    Common,
    /// `ERASE a`
    Erase,
}

impl Statement {
    /// For the interactive-only commands, the keyword to name in
    /// diagnostics. `None` for every compilable statement.
    pub fn interactive_keyword(&self) -> Option<&'static str> {
        match self {
            Statement::List => Some("LIST"),
            Statement::Load => Some("LOAD"),
            Statement::Save => Some("SAVE"),
            Statement::Merge => Some("MERGE"),
            Statement::New => Some("NEW"),
            Statement::Cont => Some("CONT"),
            Statement::Delete => Some("DELETE"),
            Statement::Renum => Some("RENUM"),
            Statement::Common => Some("COMMON"),
            Statement::Erase => Some("ERASE"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_keyword() {
        assert_eq!(Statement::List.interactive_keyword(), Some("LIST"));
        assert_eq!(Statement::Renum.interactive_keyword(), Some("RENUM"));
        assert_eq!(Statement::End.interactive_keyword(), None);
        assert_eq!(Statement::Return.interactive_keyword(), None);
    }

    #[test]
    fn test_if_line_form() {
        let stmt = Statement::If {
            condition: Expr::var("X"),
            then_statements: vec![],
            then_line: Some(100),
            else_statements: None,
            else_line: None,
        };
        if let Statement::If { then_line, .. } = stmt {
            assert_eq!(then_line, Some(100));
        } else {
            unreachable!();
        }
    }
}
