//! Semantic analysis for mb80.
//!
//! This module performs the static analysis phase of compilation, which
//! occurs after parsing and before code generation. Unlike the
//! interpreter, which checks everything at runtime, all validation here
//! happens at compile time:
//!
//! - **Symbol table construction**: variables, `DEF FN` functions, line
//!   numbers
//! - **Constant expression evaluation**: `DIM` bounds and opportunistic
//!   constant propagation (including across `IF` branches)
//! - **Static loop-nesting validation**: `FOR`/`NEXT`, `WHILE`/`WEND`
//! - **Line-reference validation**: `GOTO`, `GOSUB`, `ON...GOTO/GOSUB`,
//!   `IF ... THEN <line>`
//! - **Compiler-feature detection**: statements that need build switches,
//!   statements that cannot be compiled at all
//!
//! # Architecture
//!
//! [`SemanticAnalyzer::analyze`] runs **three ordered passes**, each over
//! every line in source order:
//!
//! 1. **Collection** - line numbers and `DEF FN` registration
//! 2. **Statement analysis** - symbol registration, loop nesting,
//!    constant tracking, flag detection
//! 3. **Reference validation** - every line-number target must exist
//!
//! The first error raised aborts the remaining analysis; exactly one
//! error is surfaced per run.

pub mod const_eval;
pub mod error;
pub mod symbols;

pub use const_eval::{ConstantEvaluator, Value};
pub use error::SemanticError;
pub use symbols::{
    FunctionInfo, LoopInfo, LoopKind, SymbolTable, VarType, VariableInfo,
};

use std::fmt::Write as _;

use log::debug;

use crate::ast::{Expr, Program, ResumeTarget, Statement, VarRef};

/// Features that require external build switches when passing the
/// generated code to the legacy toolchain.
///
/// Codegen never consults these; they are reported so the surrounding
/// driver can adjust its invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerFlags {
    /// `ON ERROR GOTO` present (`/E`).
    pub needs_error_handling: bool,
    /// Bare `RESUME` / `RESUME NEXT` present (`/X`, implies `/E`).
    pub needs_resume: bool,
    /// Debug instrumentation requested (`/D`).
    pub needs_debug: bool,
    /// `TRON` or `TROFF` present (`/D`).
    pub has_tron_troff: bool,
}

impl CompilerFlags {
    /// The switch mnemonics the detected features require.
    pub fn required_switches(&self) -> Vec<&'static str> {
        let mut switches = Vec::new();
        if self.needs_resume {
            switches.push("/X");
        } else if self.needs_error_handling {
            switches.push("/E");
        }
        if self.needs_debug || self.has_tron_troff {
            switches.push("/D");
        }
        switches
    }
}

/// Static analyzer for the BASIC-80 compiler.
///
/// One instance analyzes one program; the populated [`SymbolTable`] is then
/// handed to a code generation backend.
#[derive(Debug, Default)]
pub struct SemanticAnalyzer {
    /// Symbol tables populated during analysis.
    pub symbols: SymbolTable,
    /// Required-build-switch summary.
    pub flags: CompilerFlags,
    /// Constant evaluator with the live constant-tracking map.
    evaluator: ConstantEvaluator,
    /// Errors raised (at most one per run; see module docs).
    errors: Vec<SemanticError>,
    /// Non-fatal diagnostics.
    warnings: Vec<String>,

    /// Open loops, innermost last.
    loop_stack: Vec<LoopInfo>,
    /// Line currently being analyzed, cited in diagnostics.
    current_line: u32,
}

impl SemanticAnalyzer {
    /// Creates a new analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzes a program AST.
    ///
    /// Returns `true` when analysis succeeded. Diagnostics are available
    /// through [`errors`](Self::errors) and [`warnings`](Self::warnings)
    /// afterwards.
    pub fn analyze(&mut self, program: &Program) -> bool {
        self.errors.clear();
        self.warnings.clear();

        if let Err(e) = self.run_passes(program) {
            self.errors.push(e);
        }

        self.check_compilation_switches();
        self.errors.is_empty()
    }

    /// Errors raised by the last [`analyze`](Self::analyze) call.
    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    /// Warnings produced by the last [`analyze`](Self::analyze) call.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Consumes the analyzer, yielding the populated symbol table.
    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }

    fn run_passes(&mut self, program: &Program) -> Result<(), SemanticError> {
        debug!("pass 1: collecting line numbers and DEF FN definitions");
        self.collect_symbols(program)?;

        debug!("pass 2: analyzing statements");
        self.analyze_statements(program)?;

        debug!("pass 3: validating line references");
        self.validate_line_references(program)
    }

    // ========================================================================
    // Pass 1: collection
    // ========================================================================

    fn collect_symbols(&mut self, program: &Program) -> Result<(), SemanticError> {
        for line in &program.lines {
            self.symbols.line_numbers.insert(line.line_number);

            for stmt in &line.statements {
                if let Statement::DefFn {
                    name,
                    parameters,
                    body,
                } = stmt
                {
                    self.register_function(name, parameters, body, line.line_number)?;
                }
            }
        }
        Ok(())
    }

    fn register_function(
        &mut self,
        name: &str,
        parameters: &[VarRef],
        body: &Expr,
        line: u32,
    ) -> Result<(), SemanticError> {
        let func_name = name.to_uppercase();

        if self.symbols.functions.contains_key(&func_name) {
            return Err(SemanticError::DuplicateFunction {
                name: func_name,
                line,
            });
        }

        let info = FunctionInfo {
            name: func_name.clone(),
            return_type: VarType::from_name(name),
            parameters: parameters.iter().map(|p| p.name.to_uppercase()).collect(),
            definition_line: line,
            body: body.clone(),
        };
        self.symbols.functions.insert(func_name, info);
        Ok(())
    }

    // ========================================================================
    // Pass 2: statement analysis
    // ========================================================================

    fn analyze_statements(&mut self, program: &Program) -> Result<(), SemanticError> {
        for line in &program.lines {
            self.current_line = line.line_number;
            for stmt in &line.statements {
                self.analyze_statement(stmt)?;
            }
        }
        Ok(())
    }

    fn analyze_statement(&mut self, stmt: &Statement) -> Result<(), SemanticError> {
        if let Some(keyword) = stmt.interactive_keyword() {
            return Err(SemanticError::UnsupportedStatement {
                keyword,
                line: self.current_line,
            });
        }

        match stmt {
            Statement::Dim { arrays } => self.analyze_dim(arrays)?,

            Statement::Let { target, value } => self.analyze_assignment(target, value)?,

            Statement::For {
                variable,
                start,
                end,
                step,
            } => self.analyze_for(variable, start, end, step.as_ref())?,

            Statement::Next { variables } => self.analyze_next(variables)?,

            Statement::While { condition } => {
                self.loop_stack.push(LoopInfo {
                    kind: LoopKind::While,
                    variable: None,
                    start_line: self.current_line,
                });
                self.analyze_expression(condition)?;
            }

            Statement::Wend => self.analyze_wend()?,

            Statement::If {
                condition,
                then_statements,
                then_line: _,
                else_statements,
                else_line: _,
            } => self.analyze_if(condition, then_statements, else_statements.as_deref())?,

            Statement::OnErrorGoto(_) => self.flags.needs_error_handling = true,

            Statement::Resume(target) => match target {
                ResumeTarget::Retry | ResumeTarget::Next => self.flags.needs_resume = true,
                ResumeTarget::Line(_) => self.flags.needs_error_handling = true,
            },

            Statement::Tron | Statement::Troff => self.flags.has_tron_troff = true,

            // A variable written from outside the program loses any
            // tracked constant value.
            Statement::Input { variables, .. } => {
                for var in variables {
                    self.register_variable(var)?;
                    self.evaluator.clear_constant(&var.name);
                }
            }

            Statement::Read { variables } => {
                for var in variables {
                    self.register_variable(var)?;
                    self.evaluator.clear_constant(&var.name);
                }
            }

            Statement::LineInput { variable, .. } => {
                self.register_variable(variable)?;
                self.evaluator.clear_constant(&variable.name);
            }

            Statement::Print { expressions, .. } => {
                for expr in expressions {
                    self.analyze_expression(expr)?;
                }
            }

            Statement::OnGoto { selector, .. } | Statement::OnGosub { selector, .. } => {
                self.analyze_expression(selector)?;
            }

            Statement::Poke { address, value } => {
                self.analyze_expression(address)?;
                self.analyze_expression(value)?;
            }

            Statement::Out { port, value } => {
                self.analyze_expression(port)?;
                self.analyze_expression(value)?;
            }

            Statement::DefFn {
                parameters, body, ..
            } => {
                for param in parameters {
                    let key = param.name.to_uppercase();
                    self.symbols.variables.entry(key).or_insert_with(|| {
                        let mut info = VariableInfo::new(
                            param.name.to_uppercase(),
                            VarType::from_name(&param.name),
                            false,
                            Some(self.current_line),
                        );
                        info.is_parameter = true;
                        info
                    });
                }
                self.analyze_expression(body)?;
            }

            Statement::Goto(_)
            | Statement::Gosub(_)
            | Statement::Return
            | Statement::Restore(_)
            | Statement::Data(_)
            | Statement::End
            | Statement::Remark(_) => {}

            // Interactive-only statements were rejected above.
            Statement::List
            | Statement::Load
            | Statement::Save
            | Statement::Merge
            | Statement::New
            | Statement::Cont
            | Statement::Delete
            | Statement::Renum
            | Statement::Common
            | Statement::Erase => unreachable!("rejected before dispatch"),
        }

        Ok(())
    }

    /// Analyzes an `IF`, propagating constants per branch.
    ///
    /// A constant condition selects a single branch to analyze; the
    /// untaken branch is skipped entirely, including its constant
    /// effects. A non-constant condition analyzes both branches from the
    /// same starting constant map and keeps only the facts both branches
    /// agree on.
    fn analyze_if(
        &mut self,
        condition: &Expr,
        then_statements: &[Statement],
        else_statements: Option<&[Statement]>,
    ) -> Result<(), SemanticError> {
        self.analyze_expression(condition)?;

        if let Some(value) = self.evaluator.evaluate(condition) {
            if value.is_truthy() {
                for stmt in then_statements {
                    self.analyze_statement(stmt)?;
                }
            } else if let Some(else_stmts) = else_statements {
                for stmt in else_stmts {
                    self.analyze_statement(stmt)?;
                }
            }
            return Ok(());
        }

        // Condition unknown: both branches start from the same snapshot.
        let before = self.evaluator.snapshot();

        for stmt in then_statements {
            self.analyze_statement(stmt)?;
        }
        let after_then = self.evaluator.snapshot();

        self.evaluator.restore(before.clone());
        if let Some(else_stmts) = else_statements {
            for stmt in else_stmts {
                self.analyze_statement(stmt)?;
            }
        }
        let after_else = self.evaluator.snapshot();

        // Keep a variable constant only when both paths end with the same
        // value (an absent ELSE contributes the pre-branch map).
        let merged = after_then
            .into_iter()
            .filter(|(name, value)| after_else.get(name) == Some(value))
            .collect();
        self.evaluator.restore(merged);
        Ok(())
    }

    fn analyze_dim(&mut self, arrays: &[crate::ast::ArrayDecl]) -> Result<(), SemanticError> {
        for decl in arrays {
            let var_name = decl.name.to_uppercase();

            if let Some(info) = self.symbols.variables.get(&var_name) {
                if info.is_array && info.dimensions.is_some() {
                    return Err(SemanticError::ArrayRedimensioned {
                        name: var_name,
                        line: self.current_line,
                    });
                }
            }

            let mut dimensions = Vec::with_capacity(decl.dimensions.len());
            for subscript in &decl.dimensions {
                let value = match self.evaluator.evaluate_to_int(subscript) {
                    Some(v) => v,
                    None => return Err(self.dim_subscript_error(&var_name, subscript)),
                };
                if value < 0 {
                    return Err(SemanticError::NegativeSubscript {
                        array: var_name,
                        value,
                        line: self.current_line,
                    });
                }
                dimensions.push(value);
            }

            let entry = self
                .symbols
                .variables
                .entry(var_name.clone())
                .or_insert_with(|| {
                    VariableInfo::new(
                        var_name.clone(),
                        VarType::from_name(&decl.name),
                        true,
                        Some(self.current_line),
                    )
                });
            entry.is_array = true;
            entry.dimensions = Some(dimensions);
        }
        Ok(())
    }

    /// Picks the most specific diagnostic for a `DIM` bound that failed
    /// to fold.
    fn dim_subscript_error(&self, array: &str, subscript: &Expr) -> SemanticError {
        if let Expr::Variable(var) = subscript {
            if var.subscripts.is_some() {
                return SemanticError::SubscriptArrayOperand {
                    array: array.to_string(),
                    line: self.current_line,
                };
            }
            if !self.evaluator.has_constant(&var.name) {
                return SemanticError::SubscriptUnknownVariable {
                    array: array.to_string(),
                    variable: var.name.to_uppercase(),
                    line: self.current_line,
                };
            }
        }
        SemanticError::SubscriptNotConstant {
            array: array.to_string(),
            line: self.current_line,
        }
    }

    fn analyze_assignment(&mut self, target: &VarRef, value: &Expr) -> Result<(), SemanticError> {
        self.register_variable(target)?;

        if target.is_subscripted() {
            let var_name = target.name.to_uppercase();
            let needs_warning = self
                .symbols
                .variables
                .get(&var_name)
                .map(|info| !info.is_array || info.dimensions.is_none())
                .unwrap_or(true);
            if needs_warning {
                self.warnings.push(format!(
                    "Line {}: Array {} used without explicit DIM (will default to 10)",
                    self.current_line, var_name
                ));
            }
        }

        self.analyze_expression(value)?;

        // Constant tracking applies to scalar targets only.
        if !target.is_subscripted() {
            match self.evaluator.evaluate(value) {
                Some(folded) => self.evaluator.set_constant(&target.name, folded),
                None => self.evaluator.clear_constant(&target.name),
            }
        }
        Ok(())
    }

    fn analyze_for(
        &mut self,
        variable: &VarRef,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
    ) -> Result<(), SemanticError> {
        self.register_variable(variable)?;

        self.loop_stack.push(LoopInfo {
            kind: LoopKind::For,
            variable: Some(variable.name.to_uppercase()),
            start_line: self.current_line,
        });

        self.analyze_expression(start)?;
        self.analyze_expression(end)?;
        if let Some(step) = step {
            self.analyze_expression(step)?;
        }

        // The loop header writes the variable every iteration.
        self.evaluator.clear_constant(&variable.name);
        Ok(())
    }

    fn analyze_next(&mut self, variables: &[VarRef]) -> Result<(), SemanticError> {
        if variables.is_empty() {
            // Bare NEXT closes the innermost FOR.
            return self.pop_for_loop(None);
        }
        // NEXT I, J closes one loop per listed variable, innermost first.
        for var in variables {
            let name = var.name.to_uppercase();
            self.pop_for_loop(Some(name.as_str()))?;
        }
        Ok(())
    }

    fn pop_for_loop(&mut self, variable: Option<&str>) -> Result<(), SemanticError> {
        let top = match self.loop_stack.last() {
            Some(info) => info,
            None => {
                return Err(SemanticError::NextWithoutFor {
                    line: self.current_line,
                })
            }
        };

        if top.kind != LoopKind::For {
            return Err(SemanticError::NextInsideWhile {
                start_line: top.start_line,
                line: self.current_line,
            });
        }

        if let Some(next_var) = variable {
            let for_var = top.variable.as_deref().unwrap_or("");
            if next_var != for_var {
                return Err(SemanticError::NextVariableMismatch {
                    found: next_var.to_string(),
                    expected: for_var.to_string(),
                    start_line: top.start_line,
                    line: self.current_line,
                });
            }
        }

        self.loop_stack.pop();
        Ok(())
    }

    fn analyze_wend(&mut self) -> Result<(), SemanticError> {
        let top = match self.loop_stack.last() {
            Some(info) => info,
            None => {
                return Err(SemanticError::WendWithoutWhile {
                    line: self.current_line,
                })
            }
        };

        if top.kind != LoopKind::While {
            return Err(SemanticError::WendInsideFor {
                start_line: top.start_line,
                line: self.current_line,
            });
        }

        self.loop_stack.pop();
        Ok(())
    }

    fn analyze_expression(&mut self, expr: &Expr) -> Result<(), SemanticError> {
        match expr {
            Expr::Number(_) | Expr::String(_) => Ok(()),

            Expr::Variable(var) => self.register_variable(var),

            Expr::BinaryOp { left, right, .. } => {
                self.analyze_expression(left)?;
                self.analyze_expression(right)
            }

            Expr::UnaryOp { operand, .. } => self.analyze_expression(operand),

            Expr::FunctionCall { name, args } => {
                let func_name = name.to_uppercase();
                if func_name.starts_with("FN")
                    && !self.symbols.functions.contains_key(&func_name)
                {
                    return Err(SemanticError::UndefinedFunction {
                        name: func_name,
                        line: self.current_line,
                    });
                }
                for arg in args {
                    self.analyze_expression(arg)?;
                }
                Ok(())
            }
        }
    }

    /// Registers a variable on first sight and walks its subscripts.
    fn register_variable(&mut self, var: &VarRef) -> Result<(), SemanticError> {
        let key = var.name.to_uppercase();
        if !self.symbols.variables.contains_key(&key) {
            self.symbols.variables.insert(
                key.clone(),
                VariableInfo::new(
                    key,
                    VarType::from_name(&var.name),
                    var.is_subscripted(),
                    Some(self.current_line),
                ),
            );
        }

        if let Some(subscripts) = &var.subscripts {
            for subscript in subscripts {
                self.analyze_expression(subscript)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Pass 3: reference validation
    // ========================================================================

    fn validate_line_references(&mut self, program: &Program) -> Result<(), SemanticError> {
        for line in &program.lines {
            self.current_line = line.line_number;
            for stmt in &line.statements {
                self.check_line_references(stmt)?;
            }
        }
        Ok(())
    }

    fn check_line_references(&mut self, stmt: &Statement) -> Result<(), SemanticError> {
        match stmt {
            Statement::Goto(target) | Statement::Gosub(target) => self.check_target(*target),

            Statement::OnGoto { targets, .. } => {
                for &target in targets {
                    self.check_on_target(target, "GOTO")?;
                }
                Ok(())
            }

            Statement::OnGosub { targets, .. } => {
                for &target in targets {
                    self.check_on_target(target, "GOSUB")?;
                }
                Ok(())
            }

            Statement::If {
                then_statements,
                then_line,
                else_statements,
                else_line,
                ..
            } => {
                if let Some(target) = then_line {
                    self.check_target(*target)?;
                }
                if let Some(target) = else_line {
                    self.check_target(*target)?;
                }
                for inner in then_statements {
                    self.check_line_references(inner)?;
                }
                if let Some(else_stmts) = else_statements {
                    for inner in else_stmts {
                        self.check_line_references(inner)?;
                    }
                }
                Ok(())
            }

            _ => Ok(()),
        }
    }

    fn check_target(&self, target: u32) -> Result<(), SemanticError> {
        if self.symbols.line_numbers.contains(&target) {
            Ok(())
        } else {
            Err(SemanticError::UndefinedLine {
                target,
                line: self.current_line,
            })
        }
    }

    fn check_on_target(&self, target: u32, keyword: &'static str) -> Result<(), SemanticError> {
        if self.symbols.line_numbers.contains(&target) {
            Ok(())
        } else {
            Err(SemanticError::UndefinedLineInOn {
                target,
                keyword,
                line: self.current_line,
            })
        }
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    fn check_compilation_switches(&mut self) {
        let switches = self.flags.required_switches();
        if !switches.is_empty() {
            self.warnings
                .push(format!("Required compilation switches: {}", switches.join(" ")));
        }
    }

    /// Renders the human-readable analysis report.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(70);

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "SEMANTIC ANALYSIS REPORT");
        let _ = writeln!(out, "{}", rule);

        let _ = writeln!(out, "\nSymbol Table Summary:");
        let _ = writeln!(out, "  Variables: {}", self.symbols.variables.len());
        let _ = writeln!(out, "  Functions: {}", self.symbols.functions.len());
        let _ = writeln!(out, "  Line Numbers: {}", self.symbols.line_numbers.len());

        if !self.symbols.variables.is_empty() {
            let _ = writeln!(out, "\nVariables:");
            for (name, info) in &self.symbols.variables {
                let line = info.first_use_line.unwrap_or(0);
                if info.is_array {
                    let dims = match &info.dimensions {
                        Some(dims) => format!(
                            "({})",
                            dims.iter()
                                .map(|d| d.to_string())
                                .collect::<Vec<_>>()
                                .join(",")
                        ),
                        None => "(10)".to_string(),
                    };
                    let _ = writeln!(
                        out,
                        "  {}{} : {} (line {})",
                        name,
                        dims,
                        info.var_type.as_str(),
                        line
                    );
                } else {
                    let _ = writeln!(
                        out,
                        "  {} : {} (line {})",
                        name,
                        info.var_type.as_str(),
                        line
                    );
                }
            }
        }

        if !self.symbols.functions.is_empty() {
            let _ = writeln!(out, "\nFunctions:");
            for (name, info) in &self.symbols.functions {
                let _ = writeln!(
                    out,
                    "  {}({}) : {} (line {})",
                    name,
                    info.parameters.join(", "),
                    info.return_type.as_str(),
                    info.definition_line
                );
            }
        }

        let switches = self.flags.required_switches();
        if !switches.is_empty() {
            let _ = writeln!(out, "\nRequired Compilation Switches:");
            for switch in switches {
                let _ = writeln!(out, "  {}", switch);
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "  {}", warning);
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors:");
            for error in &self.errors {
                let _ = writeln!(out, "  {}", error);
            }
        }

        let _ = writeln!(out, "{}", rule);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ArrayDecl, BinaryOp, Line};

    fn let_stmt(name: &str, value: Expr) -> Statement {
        Statement::Let {
            target: VarRef::scalar(name),
            value,
        }
    }

    fn analyze(lines: Vec<Line>) -> SemanticAnalyzer {
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze(&Program::new(lines));
        analyzer
    }

    #[test]
    fn test_dim_with_constant_variable_bound() {
        // 10 N = 10 : DIM A(N)
        let analyzer = analyze(vec![Line::new(
            10,
            vec![
                let_stmt("N", Expr::Number(10.0)),
                Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A".into(),
                        dimensions: vec![Expr::var("N")],
                    }],
                },
            ],
        )]);
        assert!(analyzer.errors().is_empty());
        let info = analyzer.symbols.variable("A").unwrap();
        assert_eq!(info.dimensions, Some(vec![10]));
    }

    #[test]
    fn test_dim_after_input_fails_with_unknown_value() {
        // 10 INPUT N : DIM A(N)
        let analyzer = analyze(vec![Line::new(
            10,
            vec![
                Statement::Input {
                    prompt: None,
                    variables: vec![VarRef::scalar("N")],
                    suppress_question: false,
                },
                Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A".into(),
                        dimensions: vec![Expr::var("N")],
                    }],
                },
            ],
        )]);
        assert_eq!(analyzer.errors().len(), 1);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::SubscriptUnknownVariable { .. }
        ));
    }

    #[test]
    fn test_dim_with_array_element_bound_is_distinct_error() {
        let analyzer = analyze(vec![Line::new(
            10,
            vec![Statement::Dim {
                arrays: vec![ArrayDecl {
                    name: "A".into(),
                    dimensions: vec![Expr::Variable(VarRef::subscripted(
                        "B",
                        vec![Expr::Number(1.0)],
                    ))],
                }],
            }],
        )]);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::SubscriptArrayOperand { .. }
        ));
    }

    #[test]
    fn test_next_variable_mismatch_cites_for_line() {
        // 10 FOR I=1 TO 5 : 20 NEXT J
        let analyzer = analyze(vec![
            Line::new(
                10,
                vec![Statement::For {
                    variable: VarRef::scalar("I"),
                    start: Expr::Number(1.0),
                    end: Expr::Number(5.0),
                    step: None,
                }],
            ),
            Line::new(
                20,
                vec![Statement::Next {
                    variables: vec![VarRef::scalar("J")],
                }],
            ),
        ]);
        match &analyzer.errors()[0] {
            SemanticError::NextVariableMismatch {
                start_line, line, ..
            } => {
                assert_eq!(*start_line, 10);
                assert_eq!(*line, 20);
            }
            other => unreachable!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_wend_inside_for_is_error() {
        let analyzer = analyze(vec![
            Line::new(
                10,
                vec![Statement::For {
                    variable: VarRef::scalar("I"),
                    start: Expr::Number(1.0),
                    end: Expr::Number(5.0),
                    step: None,
                }],
            ),
            Line::new(20, vec![Statement::Wend]),
        ]);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::WendInsideFor { start_line: 10, .. }
        ));
    }

    #[test]
    fn test_gosub_to_missing_line_cites_call_site() {
        let analyzer = analyze(vec![Line::new(10, vec![Statement::Gosub(9999)])]);
        match &analyzer.errors()[0] {
            SemanticError::UndefinedLine { target, line } => {
                assert_eq!(*target, 9999);
                assert_eq!(*line, 10);
            }
            other => unreachable!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_if_branches_disagree_kills_constant() {
        // 10 IF X THEN Y=1 ELSE Y=2 : DIM A(Y) -- Y unknown afterwards
        let analyzer = analyze(vec![Line::new(
            10,
            vec![
                Statement::If {
                    condition: Expr::var("X"),
                    then_statements: vec![let_stmt("Y", Expr::Number(1.0))],
                    then_line: None,
                    else_statements: Some(vec![let_stmt("Y", Expr::Number(2.0))]),
                    else_line: None,
                },
                Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A".into(),
                        dimensions: vec![Expr::var("Y")],
                    }],
                },
            ],
        )]);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::SubscriptUnknownVariable { .. }
        ));
    }

    #[test]
    fn test_if_branches_agree_keeps_constant() {
        // 10 IF X THEN Y=1 ELSE Y=1 : DIM A(Y) -- Y is known 1
        let analyzer = analyze(vec![Line::new(
            10,
            vec![
                Statement::If {
                    condition: Expr::var("X"),
                    then_statements: vec![let_stmt("Y", Expr::Number(1.0))],
                    then_line: None,
                    else_statements: Some(vec![let_stmt("Y", Expr::Number(1.0))]),
                    else_line: None,
                },
                Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A".into(),
                        dimensions: vec![Expr::var("Y")],
                    }],
                },
            ],
        )]);
        assert!(analyzer.errors().is_empty());
        assert_eq!(
            analyzer.symbols.variable("A").unwrap().dimensions,
            Some(vec![1])
        );
    }

    #[test]
    fn test_constant_condition_skips_untaken_branch() {
        // 10 Z=0 : IF Z THEN Y=1 ELSE Y=3 : DIM A(Y)
        // Z folds to 0, so only the ELSE branch runs; Y is known 3.
        let analyzer = analyze(vec![Line::new(
            10,
            vec![
                let_stmt("Z", Expr::Number(0.0)),
                Statement::If {
                    condition: Expr::var("Z"),
                    then_statements: vec![let_stmt("Y", Expr::Number(1.0))],
                    then_line: None,
                    else_statements: Some(vec![let_stmt("Y", Expr::Number(3.0))]),
                    else_line: None,
                },
                Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A".into(),
                        dimensions: vec![Expr::var("Y")],
                    }],
                },
            ],
        )]);
        assert!(analyzer.errors().is_empty());
        assert_eq!(
            analyzer.symbols.variable("A").unwrap().dimensions,
            Some(vec![3])
        );
    }

    #[test]
    fn test_interactive_statement_rejected() {
        let analyzer = analyze(vec![Line::new(10, vec![Statement::List])]);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::UnsupportedStatement {
                keyword: "LIST",
                ..
            }
        ));
    }

    #[test]
    fn test_first_error_halts_analysis() {
        // Two independent problems; only the first is surfaced.
        let analyzer = analyze(vec![
            Line::new(10, vec![Statement::New]),
            Line::new(20, vec![Statement::Goto(9999)]),
        ]);
        assert_eq!(analyzer.errors().len(), 1);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::UnsupportedStatement { keyword: "NEW", .. }
        ));
    }

    #[test]
    fn test_resume_switch_detection() {
        let analyzer = analyze(vec![
            Line::new(10, vec![Statement::OnErrorGoto(100)]),
            Line::new(100, vec![Statement::Resume(ResumeTarget::Next)]),
        ]);
        assert!(analyzer.flags.needs_resume);
        assert_eq!(analyzer.flags.required_switches(), vec!["/X"]);
        assert!(analyzer
            .warnings()
            .iter()
            .any(|w| w.contains("Required compilation switches: /X")));
    }

    #[test]
    fn test_undimmed_array_warns() {
        let analyzer = analyze(vec![Line::new(
            10,
            vec![Statement::Let {
                target: VarRef::subscripted("A", vec![Expr::Number(1.0)]),
                value: Expr::Number(2.0),
            }],
        )]);
        assert!(analyzer.errors().is_empty());
        assert!(analyzer
            .warnings()
            .iter()
            .any(|w| w.contains("Array A used without explicit DIM")));
    }

    #[test]
    fn test_duplicate_def_fn_cites_second_definition() {
        let def = Statement::DefFn {
            name: "FNDBL".into(),
            parameters: vec![VarRef::scalar("X")],
            body: Expr::binary(BinaryOp::Mul, Expr::var("X"), Expr::Number(2.0)),
        };
        let analyzer = analyze(vec![
            Line::new(10, vec![def.clone()]),
            Line::new(20, vec![def]),
        ]);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::DuplicateFunction { line: 20, .. }
        ));
    }

    #[test]
    fn test_undefined_fn_call() {
        let analyzer = analyze(vec![Line::new(
            10,
            vec![let_stmt(
                "Y",
                Expr::FunctionCall {
                    name: "FNMISSING".into(),
                    args: vec![Expr::Number(1.0)],
                },
            )],
        )]);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::UndefinedFunction { line: 10, .. }
        ));
    }

    #[test]
    fn test_for_header_clears_constant() {
        // 10 I=1 : FOR I=1 TO 5 : DIM A(I) -- I is loop-written, not constant
        let analyzer = analyze(vec![Line::new(
            10,
            vec![
                let_stmt("I", Expr::Number(1.0)),
                Statement::For {
                    variable: VarRef::scalar("I"),
                    start: Expr::Number(1.0),
                    end: Expr::Number(5.0),
                    step: None,
                },
                Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A".into(),
                        dimensions: vec![Expr::var("I")],
                    }],
                },
            ],
        )]);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::SubscriptUnknownVariable { .. }
        ));
    }

    #[test]
    fn test_report_contains_symbols() {
        let analyzer = analyze(vec![Line::new(
            10,
            vec![let_stmt("COUNT%", Expr::Number(1.0))],
        )]);
        let report = analyzer.report();
        assert!(report.contains("SEMANTIC ANALYSIS REPORT"));
        assert!(report.contains("COUNT% : INTEGER (line 10)"));
    }
}
