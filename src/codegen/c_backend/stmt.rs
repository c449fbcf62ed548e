//! Statement lowering for the C backend.
//!
//! Lowers each BASIC statement to structured C. The interesting work is
//! control flow: line-numbered jumps become `goto`s against per-line
//! labels, `GOSUB`/`RETURN` is simulated with a return-id stack plus a
//! dispatch switch (line numbers cannot serve as return addresses in C),
//! and `ON expr GOTO/GOSUB` becomes a 1-based `switch` that falls through
//! on out-of-range selectors, matching the legacy semantics.

use std::fmt::Write;

use crate::ast::{Expr, Line, ResumeTarget, Statement, VarRef};
use crate::semantic::VarType;

use super::expr::{c_identifier, escape_string};
use super::CBackend;

impl CBackend {
    /// Emits one BASIC line: its jump label, then its statements.
    pub(super) fn emit_line(&mut self, line: &Line, out: &mut String) {
        if self.line_labels.contains(&line.line_number) {
            writeln!(out, "line_{}:", line.line_number).unwrap();
        }
        for stmt in &line.statements {
            self.emit_statement(stmt, out);
        }
    }

    pub(super) fn emit_statement(&mut self, stmt: &Statement, out: &mut String) {
        match stmt {
            Statement::Print {
                expressions,
                separators,
            } => self.emit_print(expressions, separators, out),

            Statement::Let { target, value } => self.emit_let(target, value, out),

            Statement::Input {
                prompt,
                variables,
                suppress_question,
            } => self.emit_input(prompt.as_deref(), variables, *suppress_question, out),

            Statement::LineInput { prompt, variable } => {
                self.emit_line_input(prompt.as_deref(), variable, out)
            }

            Statement::If {
                condition,
                then_statements,
                then_line,
                else_statements,
                else_line,
            } => self.emit_if(
                condition,
                then_statements,
                *then_line,
                else_statements.as_deref(),
                *else_line,
                out,
            ),

            Statement::For {
                variable,
                start,
                end,
                step,
            } => self.emit_for(variable, start, end, step.as_ref(), out),

            Statement::Next { variables } => {
                // One closing brace per listed variable; bare NEXT closes
                // the innermost loop.
                let count = variables.len().max(1);
                for _ in 0..count {
                    self.indent = self.indent.saturating_sub(1);
                    writeln!(out, "{}}}", self.indent_str()).unwrap();
                }
            }

            Statement::While { condition } => {
                let cond = self.emit_expr(condition);
                writeln!(out, "{}while ({}) {{", self.indent_str(), cond).unwrap();
                self.indent += 1;
            }

            Statement::Wend => {
                self.indent = self.indent.saturating_sub(1);
                writeln!(out, "{}}}", self.indent_str()).unwrap();
            }

            Statement::Goto(target) => {
                writeln!(out, "{}goto line_{};", self.indent_str(), target).unwrap();
            }

            Statement::Gosub(target) => self.emit_gosub(*target, out),

            Statement::Return => self.emit_return(out),

            Statement::OnGoto { selector, targets } => self.emit_on_goto(selector, targets, out),

            Statement::OnGosub { selector, targets } => {
                self.emit_on_gosub(selector, targets, out)
            }

            // Declarations were emitted up front from the symbol table;
            // the statement site itself generates nothing.
            Statement::Dim { .. } => {}

            // DATA is flattened into the static pool before emission.
            Statement::Data(_) => {}

            Statement::Read { variables } => self.emit_read(variables, out),

            Statement::Restore(target) => self.emit_restore(*target, out),

            // The function body is emitted before main().
            Statement::DefFn { .. } => {}

            Statement::Poke { address, value } => {
                let addr = self.emit_expr(address);
                let val = self.emit_expr(value);
                writeln!(
                    out,
                    "{}/* POKE {}, {} - memory writes not supported in compiled code */",
                    self.indent_str(),
                    addr,
                    val
                )
                .unwrap();
                self.warnings
                    .push("POKE statement not fully supported in compiled code".to_string());
            }

            Statement::Out { port, value } => {
                let port = self.emit_expr(port);
                let val = self.emit_expr(value);
                writeln!(
                    out,
                    "{}/* OUT {}, {} - I/O port writes not supported in compiled code */",
                    self.indent_str(),
                    port,
                    val
                )
                .unwrap();
                self.warnings
                    .push("OUT statement not fully supported in compiled code".to_string());
            }

            Statement::End => {
                writeln!(out, "{}return 0;", self.indent_str()).unwrap();
            }

            Statement::Remark(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    writeln!(out, "{}/* {} */", self.indent_str(), text).unwrap();
                }
            }

            Statement::OnErrorGoto(_) => self.emit_unsupported("ON ERROR GOTO", out),
            Statement::Resume(target) => {
                let keyword = match target {
                    ResumeTarget::Retry => "RESUME",
                    ResumeTarget::Next => "RESUME NEXT",
                    ResumeTarget::Line(_) => "RESUME <line>",
                };
                self.emit_unsupported(keyword, out);
            }
            Statement::Tron => self.emit_unsupported("TRON", out),
            Statement::Troff => self.emit_unsupported("TROFF", out),

            Statement::List
            | Statement::Load
            | Statement::Save
            | Statement::Merge
            | Statement::New
            | Statement::Cont
            | Statement::Delete
            | Statement::Renum
            | Statement::Common
            | Statement::Erase => {
                let keyword = stmt.interactive_keyword().unwrap_or("statement");
                self.emit_unsupported(keyword, out);
            }
        }
    }

    /// Degradation path: emitted comment plus a warning, never a failure.
    fn emit_unsupported(&mut self, keyword: &str, out: &mut String) {
        writeln!(out, "{}/* Unsupported: {} */", self.indent_str(), keyword).unwrap();
        self.warnings
            .push(format!("Unsupported statement: {}", keyword));
    }

    // ========================================================================
    // PRINT / INPUT
    // ========================================================================

    fn emit_print(
        &mut self,
        expressions: &[Expr],
        separators: &[Option<char>],
        out: &mut String,
    ) {
        if expressions.is_empty() {
            writeln!(out, "{}printf(\"\\n\");", self.indent_str()).unwrap();
            return;
        }

        for (i, expr) in expressions.iter().enumerate() {
            let separator = separators.get(i).copied().flatten();
            let expr_type = self.expr_type(expr);

            if expr_type == VarType::String {
                // Materialize the handle into a C string for printf, then
                // release the heap copy.
                let handle = self.emit_string_expr(expr);
                let indent = self.indent_str();
                writeln!(out, "{}{{", indent).unwrap();
                writeln!(
                    out,
                    "{}    char *temp_str = mb_to_c_string({});",
                    indent, handle
                )
                .unwrap();
                writeln!(out, "{}    if (temp_str) {{", indent).unwrap();
                let fmt = match separator {
                    Some(';') => "%s",
                    Some(',') => "%s ",
                    _ => "%s\\n",
                };
                writeln!(out, "{}        printf(\"{}\", temp_str);", indent, fmt).unwrap();
                writeln!(out, "{}        free(temp_str);", indent).unwrap();
                writeln!(out, "{}    }}", indent).unwrap();
                writeln!(out, "{}}}", indent).unwrap();
            } else {
                let code = self.emit_expr(expr);
                let fmt = self.format_specifier(expr_type);
                let fmt = match separator {
                    Some(';') => fmt.to_string(),
                    Some(',') => format!("{} ", fmt),
                    _ => format!("{}\\n", fmt),
                };
                writeln!(
                    out,
                    "{}printf(\"{}\", {});",
                    self.indent_str(),
                    fmt,
                    code
                )
                .unwrap();
            }
        }
    }

    fn emit_input(
        &mut self,
        prompt: Option<&str>,
        variables: &[VarRef],
        suppress_question: bool,
        out: &mut String,
    ) {
        if let Some(prompt) = prompt {
            let mut text = prompt.to_string();
            if !suppress_question {
                text.push_str("? ");
            }
            writeln!(
                out,
                "{}printf(\"{}\");",
                self.indent_str(),
                escape_string(&text)
            )
            .unwrap();
        } else if !suppress_question {
            writeln!(out, "{}printf(\"? \");", self.indent_str()).unwrap();
        }

        for (i, var) in variables.iter().enumerate() {
            let var_type = VarType::from_name(&var.name);

            if var_type == VarType::String {
                let handle = self.string_handle_expr(var);
                self.emit_buffered_read(&handle, out);
            } else {
                let c_name = if var.is_subscripted() {
                    self.emit_array_access(var)
                } else {
                    c_identifier(&var.name)
                };
                let fmt = if var_type == VarType::Integer { "%d" } else { "%f" };
                writeln!(
                    out,
                    "{}scanf(\"{}\", &{});",
                    self.indent_str(),
                    fmt,
                    c_name
                )
                .unwrap();
            }

            if i + 1 < variables.len() {
                writeln!(
                    out,
                    "{}printf(\"?? \");  /* Next variable prompt */",
                    self.indent_str()
                )
                .unwrap();
            }
        }
    }

    fn emit_line_input(&mut self, prompt: Option<&str>, variable: &VarRef, out: &mut String) {
        // LINE INPUT shows the prompt verbatim - no "? " is appended.
        if let Some(prompt) = prompt {
            writeln!(
                out,
                "{}printf(\"{}\");",
                self.indent_str(),
                escape_string(prompt)
            )
            .unwrap();
        }
        let handle = self.string_handle_expr(variable);
        self.emit_buffered_read(&handle, out);
    }

    /// fgets into the shared input buffer, strip the newline, store into
    /// a string handle.
    fn emit_buffered_read(&mut self, handle: &str, out: &mut String) {
        let indent = self.indent_str();
        writeln!(out, "{}if (fgets(input_buffer, 256, stdin)) {{", indent).unwrap();
        writeln!(out, "{}    size_t len = strlen(input_buffer);", indent).unwrap();
        writeln!(
            out,
            "{}    if (len > 0 && input_buffer[len-1] == '\\n') {{",
            indent
        )
        .unwrap();
        writeln!(out, "{}        input_buffer[len-1] = '\\0';", indent).unwrap();
        writeln!(out, "{}    }}", indent).unwrap();
        writeln!(
            out,
            "{}    mb_string_alloc_init({}, input_buffer);",
            indent, handle
        )
        .unwrap();
        writeln!(out, "{}}}", indent).unwrap();
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn emit_let(&mut self, target: &VarRef, value: &Expr, out: &mut String) {
        let target_type = self
            .symbols
            .variable(&target.name)
            .map(|info| info.var_type)
            .unwrap_or_else(|| VarType::from_name(&target.name));

        if target_type == VarType::String {
            let dest = self.string_handle_expr(target);
            self.emit_string_assignment(&dest, value, out);
            return;
        }

        let lvalue = if target.is_subscripted() {
            self.emit_array_access(target)
        } else {
            c_identifier(&target.name)
        };
        let rvalue = self.emit_expr(value);
        writeln!(out, "{}{} = {};", self.indent_str(), lvalue, rvalue).unwrap();
    }

    fn emit_string_assignment(&mut self, dest: &str, value: &Expr, out: &mut String) {
        match value {
            Expr::String(s) => {
                writeln!(
                    out,
                    "{}mb_string_alloc_const({}, \"{}\");",
                    self.indent_str(),
                    dest,
                    escape_string(s)
                )
                .unwrap();
            }

            Expr::Variable(var) => {
                let src = self.string_handle_expr(var);
                writeln!(
                    out,
                    "{}mb_string_copy({}, {});",
                    self.indent_str(),
                    dest,
                    src
                )
                .unwrap();
            }

            Expr::BinaryOp {
                op: crate::ast::BinaryOp::Add,
                ..
            } => self.emit_concat_assignment(dest, value, out),

            Expr::FunctionCall { name, args } => {
                let code = self.emit_string_function_into(dest, name, args);
                writeln!(out, "{}{};", self.indent_str(), code).unwrap();
            }

            _ => {
                self.warnings
                    .push("Unsupported string expression in assignment".to_string());
                writeln!(
                    out,
                    "{}/* Unsupported string expression */",
                    self.indent_str()
                )
                .unwrap();
            }
        }
    }

    /// Lowers `d$ = a$ + b$ + c$ + ...` to a left-fold chain of pairwise
    /// concatenations.
    ///
    /// N operands produce exactly N-1 concat calls through N-2
    /// temporaries; the final call writes straight into the destination
    /// handle, with no trailing copy.
    fn emit_concat_assignment(&mut self, dest: &str, expr: &Expr, out: &mut String) {
        self.strings.reset_temps();

        let mut parts = Vec::new();
        collect_concat_parts(expr, &mut parts);
        let parts: Vec<Expr> = parts.into_iter().cloned().collect();

        if parts.len() == 2 {
            let left = self.concat_part_handle(&parts[0]);
            let right = self.concat_part_handle(&parts[1]);
            writeln!(
                out,
                "{}mb_string_concat({}, {}, {});",
                self.indent_str(),
                dest,
                left,
                right
            )
            .unwrap();
            return;
        }

        let mut acc = self.strings.take_temp().to_string();
        let left = self.concat_part_handle(&parts[0]);
        let right = self.concat_part_handle(&parts[1]);
        writeln!(
            out,
            "{}mb_string_concat({}, {}, {});",
            self.indent_str(),
            acc,
            left,
            right
        )
        .unwrap();

        for part in &parts[2..parts.len() - 1] {
            let next = self.strings.take_temp().to_string();
            let part_handle = self.concat_part_handle(part);
            writeln!(
                out,
                "{}mb_string_concat({}, {}, {});",
                self.indent_str(),
                next,
                acc,
                part_handle
            )
            .unwrap();
            acc = next;
        }

        let last = self.concat_part_handle(&parts[parts.len() - 1]);
        writeln!(
            out,
            "{}mb_string_concat({}, {}, {});",
            self.indent_str(),
            dest,
            acc,
            last
        )
        .unwrap();
    }

    fn concat_part_handle(&mut self, part: &Expr) -> String {
        match part {
            Expr::String(s) => {
                let temp = self.strings.take_temp();
                format!(
                    "(mb_string_alloc_const({}, \"{}\"), {})",
                    temp,
                    escape_string(s),
                    temp
                )
            }
            Expr::Variable(var) => self.string_handle_expr(var),
            _ => self.emit_string_expr(part),
        }
    }

    /// Statement-form string function call writing directly into a known
    /// destination handle (no temp for the result).
    fn emit_string_function_into(&mut self, dest: &str, name: &str, args: &[Expr]) -> String {
        let func = name.to_uppercase();
        match func.as_str() {
            "LEFT$" if args.len() == 2 => {
                let s = self.emit_string_expr(&args[0]);
                let n = self.emit_expr(&args[1]);
                format!("mb_string_left({}, {}, {})", dest, s, n)
            }
            "RIGHT$" if args.len() == 2 => {
                let s = self.emit_string_expr(&args[0]);
                let n = self.emit_expr(&args[1]);
                format!("mb_string_right({}, {}, {})", dest, s, n)
            }
            "MID$" if args.len() == 2 || args.len() == 3 => {
                let s = self.emit_string_expr(&args[0]);
                let start = self.emit_expr(&args[1]);
                let len = if args.len() == 3 {
                    self.emit_expr(&args[2])
                } else {
                    "255".to_string()
                };
                format!("mb_string_mid({}, {}, {}, {})", dest, s, start, len)
            }
            "CHR$" if args.len() == 1 => {
                let code = self.emit_expr(&args[0]);
                format!(
                    "{{ char _chr[2] = {{(char)({}), '\\0'}}; mb_string_alloc_init({}, _chr); }}",
                    code, dest
                )
            }
            "STR$" if args.len() == 1 => {
                let n = self.emit_expr(&args[0]);
                format!(
                    "{{ char _str[32]; sprintf(_str, \"%g\", (double)({})); mb_string_alloc_init({}, _str); }}",
                    n, dest
                )
            }
            "SPACE$" if args.len() == 1 => {
                let n = self.emit_expr(&args[0]);
                format!(
                    "{{ int _n = {}; char *_sp = malloc(_n + 1); if (_sp) {{ memset(_sp, ' ', _n); _sp[_n] = '\\0'; mb_string_alloc_init({}, _sp); free(_sp); }} }}",
                    n, dest
                )
            }
            "STRING$" if args.len() == 2 => {
                let n = self.emit_expr(&args[0]);
                if self.expr_type(&args[1]) == VarType::String {
                    let s = self.emit_string_expr(&args[1]);
                    format!(
                        "{{ int _n = {n}; unsigned char *_d = mb_get_data({s}); char _ch = (_d && mb_get_length({s}) > 0) ? _d[0] : ' '; char *_f = malloc(_n + 1); if (_f) {{ memset(_f, _ch, _n); _f[_n] = '\\0'; mb_string_alloc_init({d}, _f); free(_f); }} }}",
                        n = n,
                        s = s,
                        d = dest
                    )
                } else {
                    let ch = self.emit_expr(&args[1]);
                    format!(
                        "{{ int _n = {n}; char _ch = (char)({c}); char *_f = malloc(_n + 1); if (_f) {{ memset(_f, _ch, _n); _f[_n] = '\\0'; mb_string_alloc_init({d}, _f); free(_f); }} }}",
                        n = n,
                        c = ch,
                        d = dest
                    )
                }
            }
            "HEX$" if args.len() == 1 => {
                let n = self.emit_expr(&args[0]);
                format!(
                    "{{ char _hex[17]; sprintf(_hex, \"%X\", (int)({})); mb_string_alloc_init({}, _hex); }}",
                    n, dest
                )
            }
            "OCT$" if args.len() == 1 => {
                let n = self.emit_expr(&args[0]);
                format!(
                    "{{ char _oct[23]; sprintf(_oct, \"%o\", (int)({})); mb_string_alloc_init({}, _oct); }}",
                    n, dest
                )
            }
            "INKEY$" => {
                self.warnings
                    .push("INKEY$ requires runtime support - returning empty string".to_string());
                format!("mb_string_alloc_init({}, \"\")", dest)
            }
            _ => {
                self.warnings
                    .push(format!("Unsupported string function: {}", func));
                "/* unsupported string function */".to_string()
            }
        }
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn emit_if(
        &mut self,
        condition: &Expr,
        then_statements: &[Statement],
        then_line: Option<u32>,
        else_statements: Option<&[Statement]>,
        else_line: Option<u32>,
        out: &mut String,
    ) {
        let cond = self.emit_expr(condition);
        let indent = self.indent_str();

        // IF ... THEN <line> lowers to a direct goto.
        if let Some(target) = then_line {
            writeln!(out, "{}if ({}) {{", indent, cond).unwrap();
            writeln!(out, "{}    goto line_{};", indent, target).unwrap();
            writeln!(out, "{}}}", indent).unwrap();
            if let Some(else_target) = else_line {
                writeln!(out, "{}else {{", indent).unwrap();
                writeln!(out, "{}    goto line_{};", indent, else_target).unwrap();
                writeln!(out, "{}}}", indent).unwrap();
            }
            return;
        }

        writeln!(out, "{}if ({}) {{", indent, cond).unwrap();
        self.indent += 1;
        for stmt in then_statements {
            self.emit_statement(stmt, out);
        }
        self.indent -= 1;

        if let Some(else_stmts) = else_statements {
            writeln!(out, "{}}} else {{", indent).unwrap();
            self.indent += 1;
            for stmt in else_stmts {
                self.emit_statement(stmt, out);
            }
            self.indent -= 1;
            writeln!(out, "{}}}", indent).unwrap();
        } else if let Some(else_target) = else_line {
            writeln!(out, "{}}} else {{", indent).unwrap();
            writeln!(out, "{}    goto line_{};", indent, else_target).unwrap();
            writeln!(out, "{}}}", indent).unwrap();
        } else {
            writeln!(out, "{}}}", indent).unwrap();
        }
    }

    fn emit_for(
        &mut self,
        variable: &VarRef,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        out: &mut String,
    ) {
        let var = c_identifier(&variable.name);
        let start = self.emit_expr(start);
        let end = self.emit_expr(end);
        let step = match step {
            Some(expr) => self.emit_expr(expr),
            None => "1".to_string(),
        };

        // The comparison is always <=. A negative STEP therefore compiles
        // to a loop that never counts down and runs indefinitely; known
        // defect, kept as-is for parity with existing output.
        writeln!(
            out,
            "{}for ({var} = {start}; {var} <= {end}; {var} += {step}) {{",
            self.indent_str(),
            var = var,
            start = start,
            end = end,
            step = step
        )
        .unwrap();
        self.indent += 1;
    }

    fn emit_gosub(&mut self, target: u32, out: &mut String) {
        let return_id = self.gosub_return_counter;
        self.gosub_return_counter += 1;

        let indent = self.indent_str();
        writeln!(
            out,
            "{}gosub_stack[gosub_sp++] = {};  /* Push return ID */",
            indent, return_id
        )
        .unwrap();
        writeln!(out, "{}goto line_{};  /* Jump to subroutine */", indent, target).unwrap();
        writeln!(out, "gosub_return_{}:  /* Return point */", return_id).unwrap();
    }

    fn emit_return(&mut self, out: &mut String) {
        let indent = self.indent_str();
        writeln!(out, "{}if (gosub_sp > 0) {{", indent).unwrap();
        writeln!(out, "{}    switch (gosub_stack[--gosub_sp]) {{", indent).unwrap();
        for return_id in 0..self.total_gosubs {
            writeln!(
                out,
                "{}        case {}: goto gosub_return_{};",
                indent, return_id, return_id
            )
            .unwrap();
        }
        writeln!(
            out,
            "{}        default: break;  /* Error: invalid return address */",
            indent
        )
        .unwrap();
        writeln!(out, "{}    }}", indent).unwrap();
        writeln!(out, "{}}}", indent).unwrap();
    }

    fn emit_on_goto(&mut self, selector: &Expr, targets: &[u32], out: &mut String) {
        let index = self.emit_expr(selector);
        let indent = self.indent_str();

        writeln!(out, "{}switch ((int)({})) {{", indent, index).unwrap();
        for (i, target) in targets.iter().enumerate() {
            writeln!(out, "{}    case {}: goto line_{};", indent, i + 1, target).unwrap();
        }
        writeln!(
            out,
            "{}    default: break;  /* Out of range - fall through */",
            indent
        )
        .unwrap();
        writeln!(out, "{}}}", indent).unwrap();
    }

    fn emit_on_gosub(&mut self, selector: &Expr, targets: &[u32], out: &mut String) {
        let index = self.emit_expr(selector);
        let indent = self.indent_str();

        writeln!(out, "{}switch ((int)({})) {{", indent, index).unwrap();
        for (i, target) in targets.iter().enumerate() {
            // Each list entry is its own call site with its own return id.
            let return_id = self.gosub_return_counter;
            self.gosub_return_counter += 1;

            writeln!(out, "{}    case {}:", indent, i + 1).unwrap();
            writeln!(
                out,
                "{}        gosub_stack[gosub_sp++] = {};",
                indent, return_id
            )
            .unwrap();
            writeln!(out, "{}        goto line_{};", indent, target).unwrap();
            writeln!(out, "gosub_return_{}:", return_id).unwrap();
            writeln!(out, "{}        break;", indent).unwrap();
        }
        writeln!(
            out,
            "{}    default: break;  /* Out of range - fall through */",
            indent
        )
        .unwrap();
        writeln!(out, "{}}}", indent).unwrap();
    }

    // ========================================================================
    // DATA / READ / RESTORE
    // ========================================================================

    fn emit_read(&mut self, variables: &[VarRef], out: &mut String) {
        for var in variables {
            let indent = self.indent_str();

            writeln!(
                out,
                "{}if (data_pointer >= {}) {{",
                indent,
                self.data.len()
            )
            .unwrap();
            writeln!(out, "{}    fprintf(stderr, \"?Out of DATA\\n\");", indent).unwrap();
            writeln!(out, "{}    return 1;", indent).unwrap();
            writeln!(out, "{}}}", indent).unwrap();

            let var_type = VarType::from_name(&var.name);
            match var_type {
                VarType::String => {
                    let handle = self.string_handle_expr(var);
                    writeln!(out, "{}if (data_types[data_pointer] == 'S') {{", indent).unwrap();
                    writeln!(
                        out,
                        "{}    mb_string_alloc_const({}, data_strings[data_pointer]);",
                        indent, handle
                    )
                    .unwrap();
                    writeln!(out, "{}}} else {{", indent).unwrap();
                    writeln!(out, "{}    char _num_str[32];", indent).unwrap();
                    writeln!(
                        out,
                        "{}    sprintf(_num_str, \"%g\", data_numeric[data_pointer]);",
                        indent
                    )
                    .unwrap();
                    writeln!(
                        out,
                        "{}    mb_string_alloc_init({}, _num_str);",
                        indent, handle
                    )
                    .unwrap();
                    writeln!(out, "{}}}", indent).unwrap();
                }
                VarType::Integer => {
                    let lvalue = self.read_lvalue(var);
                    writeln!(out, "{}if (data_types[data_pointer] != 'S') {{", indent).unwrap();
                    writeln!(
                        out,
                        "{}    {} = (int)data_numeric[data_pointer];",
                        indent, lvalue
                    )
                    .unwrap();
                    writeln!(out, "{}}} else {{", indent).unwrap();
                    writeln!(
                        out,
                        "{}    {} = data_strings[data_pointer] ? atoi(data_strings[data_pointer]) : 0;",
                        indent, lvalue
                    )
                    .unwrap();
                    writeln!(out, "{}}}", indent).unwrap();
                }
                VarType::Single | VarType::Double => {
                    let lvalue = self.read_lvalue(var);
                    writeln!(out, "{}if (data_types[data_pointer] != 'S') {{", indent).unwrap();
                    writeln!(
                        out,
                        "{}    {} = data_numeric[data_pointer];",
                        indent, lvalue
                    )
                    .unwrap();
                    writeln!(out, "{}}} else {{", indent).unwrap();
                    writeln!(
                        out,
                        "{}    {} = data_strings[data_pointer] ? atof(data_strings[data_pointer]) : 0.0;",
                        indent, lvalue
                    )
                    .unwrap();
                    writeln!(out, "{}}}", indent).unwrap();
                }
            }

            writeln!(out, "{}data_pointer++;", indent).unwrap();
        }
    }

    fn read_lvalue(&mut self, var: &VarRef) -> String {
        if var.is_subscripted() {
            self.emit_array_access(var)
        } else {
            c_identifier(&var.name)
        }
    }

    fn emit_restore(&mut self, target: Option<u32>, out: &mut String) {
        let indent = self.indent_str();
        match target {
            None => {
                writeln!(out, "{}data_pointer = 0;", indent).unwrap();
            }
            Some(line) => {
                // The cursor has no per-line index; a targeted RESTORE
                // still rewinds to the very beginning.
                writeln!(
                    out,
                    "{}/* RESTORE to specific line not supported - resetting to beginning */",
                    indent
                )
                .unwrap();
                writeln!(out, "{}data_pointer = 0;", indent).unwrap();
                self.warnings.push(format!(
                    "RESTORE to line {} not supported - resetting to beginning",
                    line
                ));
            }
        }
    }
}

/// Flattens a `+` tree into its operand list, left to right.
fn collect_concat_parts<'a>(expr: &'a Expr, parts: &mut Vec<&'a Expr>) {
    match expr {
        Expr::BinaryOp {
            op: crate::ast::BinaryOp::Add,
            left,
            right,
        } => {
            collect_concat_parts(left, parts);
            collect_concat_parts(right, parts);
        }
        _ => parts.push(expr),
    }
}
