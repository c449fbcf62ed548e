//! Semantic analysis error types.
//!
//! Each variant is one of the hard failures the analyzer can raise:
//! duplicate `DEF FN`, broken loop nesting, interactive-only statements,
//! dangling line references, and `DIM` bounds that cannot be proven
//! constant. Every variant carries the line the problem was detected on.
//!
//! The `DIM` subscript rejections are deliberately split into three
//! variants so the diagnostic tells the user *why* the bound was refused:
//! a variable with no tracked value, an array element used as a bound, or
//! an expression that simply is not constant.

use thiserror::Error;

/// A semantic analysis error with line and description.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticError {
    // === DEF FN ===
    /// A `DEF FN` name registered twice.
    #[error("Line {line}: Function {name} already defined")]
    DuplicateFunction { name: String, line: u32 },

    /// A call to an `FN`-prefixed function that was never defined.
    #[error("Line {line}: Undefined function {name}")]
    UndefinedFunction { name: String, line: u32 },

    // === Loop nesting ===
    /// `NEXT` with no loop open.
    #[error("Line {line}: NEXT without FOR")]
    NextWithoutFor { line: u32 },

    /// `NEXT` while the innermost loop is a `WHILE`.
    #[error("Line {line}: NEXT found but current loop is WHILE (started at line {start_line})")]
    NextInsideWhile { start_line: u32, line: u32 },

    /// `NEXT v` naming a variable other than the innermost `FOR`'s.
    #[error(
        "Line {line}: NEXT {found} does not match FOR {expected} (started at line {start_line})"
    )]
    NextVariableMismatch {
        found: String,
        expected: String,
        start_line: u32,
        line: u32,
    },

    /// `WEND` with no loop open.
    #[error("Line {line}: WEND without WHILE")]
    WendWithoutWhile { line: u32 },

    /// `WEND` while the innermost loop is a `FOR`.
    #[error("Line {line}: WEND found but current loop is FOR (started at line {start_line})")]
    WendInsideFor { start_line: u32, line: u32 },

    // === Compiler-incompatible statements ===
    /// A statement that only makes sense at an interactive prompt.
    #[error("Line {line}: {keyword} not supported in compiler")]
    UnsupportedStatement { keyword: &'static str, line: u32 },

    // === DIM ===
    /// `DIM` of an array that already has dimensions.
    #[error("Line {line}: Array {name} already dimensioned")]
    ArrayRedimensioned { name: String, line: u32 },

    /// A `DIM` bound referencing a variable with no tracked constant value.
    #[error(
        "Line {line}: Array subscript in {array} uses variable {variable} which has no known constant value at this point"
    )]
    SubscriptUnknownVariable {
        array: String,
        variable: String,
        line: u32,
    },

    /// A `DIM` bound using an array element as an operand.
    #[error("Line {line}: Array subscript in {array} uses an array element, which cannot be a compile-time constant")]
    SubscriptArrayOperand { array: String, line: u32 },

    /// A `DIM` bound that is a genuinely non-constant expression.
    #[error(
        "Line {line}: Array subscript in {array} must be a constant expression or variable with known constant value"
    )]
    SubscriptNotConstant { array: String, line: u32 },

    /// A `DIM` bound that folded to a negative number.
    #[error("Line {line}: Array subscript cannot be negative in {array} (evaluated to {value})")]
    NegativeSubscript {
        array: String,
        value: i64,
        line: u32,
    },

    // === Line references ===
    /// `GOTO`/`GOSUB`/`IF ... THEN <line>` naming a missing line.
    #[error("Line {line}: Undefined line {target}")]
    UndefinedLine { target: u32, line: u32 },

    /// A missing line inside an `ON ... GOTO`/`ON ... GOSUB` list.
    #[error("Line {line}: Undefined line {target} in ON...{keyword}")]
    UndefinedLineInOn {
        target: u32,
        keyword: &'static str,
        line: u32,
    },
}

impl SemanticError {
    /// The line the error was reported against.
    ///
    /// For reference errors this is the *referencing* statement's line,
    /// never the missing target.
    pub fn line(&self) -> u32 {
        match self {
            SemanticError::DuplicateFunction { line, .. } => *line,
            SemanticError::UndefinedFunction { line, .. } => *line,
            SemanticError::NextWithoutFor { line } => *line,
            SemanticError::NextInsideWhile { line, .. } => *line,
            SemanticError::NextVariableMismatch { line, .. } => *line,
            SemanticError::WendWithoutWhile { line } => *line,
            SemanticError::WendInsideFor { line, .. } => *line,
            SemanticError::UnsupportedStatement { line, .. } => *line,
            SemanticError::ArrayRedimensioned { line, .. } => *line,
            SemanticError::SubscriptUnknownVariable { line, .. } => *line,
            SemanticError::SubscriptArrayOperand { line, .. } => *line,
            SemanticError::SubscriptNotConstant { line, .. } => *line,
            SemanticError::NegativeSubscript { line, .. } => *line,
            SemanticError::UndefinedLine { line, .. } => *line,
            SemanticError::UndefinedLineInOn { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_cites_referencing_line() {
        let err = SemanticError::UndefinedLine {
            target: 9999,
            line: 10,
        };
        assert_eq!(err.line(), 10);
        assert!(err.to_string().contains("Line 10"));
        assert!(err.to_string().contains("9999"));
    }

    #[test]
    fn test_next_mismatch_cites_loop_start() {
        let err = SemanticError::NextVariableMismatch {
            found: "J".into(),
            expected: "I".into(),
            start_line: 10,
            line: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("NEXT J"));
        assert!(msg.contains("FOR I"));
        assert!(msg.contains("line 10"));
    }

    #[test]
    fn test_dim_diagnostics_are_distinct() {
        let unknown = SemanticError::SubscriptUnknownVariable {
            array: "A".into(),
            variable: "N".into(),
            line: 10,
        };
        let array_op = SemanticError::SubscriptArrayOperand {
            array: "A".into(),
            line: 10,
        };
        let non_const = SemanticError::SubscriptNotConstant {
            array: "A".into(),
            line: 10,
        };
        assert!(unknown.to_string().contains("no known constant value"));
        assert!(array_op.to_string().contains("array element"));
        assert!(non_const.to_string().contains("must be a constant expression"));
    }
}
