//! C code generation backend targeting z88dk (CP/M, Z80).
//!
//! Consumes the analyzed AST plus the symbol table and emits a single C
//! translation unit. The generated code leans on two external pieces:
//! libc (stdio/stdlib/string/math) and the `mb_string` handle runtime for
//! string values (strings are small integer handles into a descriptor
//! pool; this backend only allocates and references handle numbers).
//!
//! # Module Structure
//!
//! - [`analysis`] - preparation passes (GOSUB counting, string handles,
//!   line labels, DATA flattening, DEF FN collection)
//! - [`stmt`] - statement lowering
//! - [`expr`] - expression and built-in function lowering
//!
//! # Generated Code Structure
//!
//! ```c
//! /* Generated by mb80 compiler */
//! #define MB_NUM_STRINGS 4
//! #include "mb_string.h"
//! #define STR_A 0
//! #include <stdio.h>
//! ...
//! double fn_dbl(double x) { ... }   /* DEF FN */
//!
//! int main() {
//!     /* declarations, GOSUB stack, DATA pool */
//! line_10:
//!     ...
//!     return 0;
//! }
//! ```

mod analysis;
mod expr;
mod stmt;

use std::collections::BTreeSet;
use std::fmt::Write;

use log::debug;

use crate::ast::Program;
use crate::codegen::CodeGenBackend;
use crate::semantic::{SymbolTable, VarType};

use self::analysis::{
    collect_def_fns, collect_line_labels, count_gosubs, DataEntry, DataPool, DefFnDef,
    StringHandles,
};
use self::expr::{c_identifier, escape_string, string_define_name};

/// C backend for the z88dk toolchain.
///
/// One instance generates for one symbol table; [`generate`] may be
/// called repeatedly with the same AST and produces byte-identical
/// output each time.
///
/// [`generate`]: CodeGenBackend::generate
pub struct CBackend {
    symbols: SymbolTable,
    errors: Vec<String>,
    warnings: Vec<String>,

    indent: usize,
    line_labels: BTreeSet<u32>,
    gosub_return_counter: u32,
    total_gosubs: u32,
    strings: StringHandles,
    data: DataPool,
    def_fns: Vec<DefFnDef>,
}

impl CBackend {
    /// Creates a backend around an analyzed symbol table.
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            errors: Vec::new(),
            warnings: Vec::new(),
            indent: 0,
            line_labels: BTreeSet::new(),
            gosub_return_counter: 0,
            total_gosubs: 0,
            strings: StringHandles::default(),
            data: DataPool::default(),
            def_fns: Vec::new(),
        }
    }

    pub(super) fn indent_str(&self) -> String {
        "    ".repeat(self.indent)
    }

    /// Runs every preparation pass, resetting all per-run state so a
    /// repeated `generate` call starts from scratch.
    fn prepare(&mut self, program: &Program) {
        self.errors.clear();
        self.warnings.clear();
        self.indent = 0;
        self.gosub_return_counter = 0;

        self.total_gosubs = count_gosubs(program);
        self.strings = StringHandles::allocate(&self.symbols, program);
        self.line_labels = collect_line_labels(program);
        self.data = DataPool::collect(program);
        self.def_fns = collect_def_fns(program);

        debug!(
            "codegen prep: {} gosubs, {} string descriptors, {} data values, {} DEF FNs",
            self.total_gosubs,
            self.strings.total(),
            self.data.len(),
            self.def_fns.len()
        );
    }

    fn emit_header(&self, out: &mut String) {
        writeln!(out, "/* Generated by mb80 compiler */").unwrap();
        writeln!(out, "/* Target: CP/M via z88dk */").unwrap();
        writeln!(out).unwrap();

        if self.strings.any() {
            writeln!(out, "#define MB_NUM_STRINGS {}", self.strings.total()).unwrap();
            writeln!(out, "#define MB_POOL_SIZE 8192  /* 8KB string pool */").unwrap();
            writeln!(out, "#include \"mb_string.h\"").unwrap();
            writeln!(out).unwrap();
            for (name, id) in self.strings.iter() {
                writeln!(out, "#define STR_{} {}", string_define_name(name), id).unwrap();
            }
            writeln!(out).unwrap();
        }

        writeln!(out, "#include <stdio.h>").unwrap();
        writeln!(out, "#include <stdlib.h>").unwrap();
        writeln!(out, "#include <string.h>").unwrap();
        writeln!(out, "#include <math.h>").unwrap();
        writeln!(out).unwrap();
    }

    /// Emits `DEF FN` definitions as standalone C functions before main.
    fn emit_def_fn_functions(&mut self, out: &mut String) {
        if self.def_fns.is_empty() {
            return;
        }

        writeln!(out, "/* User-defined functions (DEF FN) */").unwrap();

        let defs = self.def_fns.clone();
        for def in &defs {
            let return_type = match VarType::from_name(&def.name) {
                VarType::Integer => "int",
                VarType::String => {
                    self.warnings.push(format!(
                        "String DEF FN functions not yet supported: {}",
                        def.name
                    ));
                    continue;
                }
                _ => "double",
            };

            let stripped = def
                .name
                .trim_end_matches(['%', '!', '#', '$'])
                .to_lowercase();
            let func_name = match stripped.strip_prefix("fn") {
                Some(rest) => format!("fn_{}", rest),
                None => format!("fn_{}", stripped),
            };

            let mut params = Vec::with_capacity(def.parameters.len());
            for param in &def.parameters {
                let param_type = match VarType::from_name(&param.name) {
                    VarType::Integer => "int",
                    VarType::String => {
                        self.warnings
                            .push("String parameters in DEF FN not yet supported".to_string());
                        "char*"
                    }
                    _ => "double",
                };
                params.push(format!("{} {}", param_type, c_identifier(&param.name)));
            }

            if params.is_empty() {
                writeln!(out, "{} {}(void) {{", return_type, func_name).unwrap();
            } else {
                writeln!(out, "{} {}({}) {{", return_type, func_name, params.join(", ")).unwrap();
            }

            self.indent = 1;
            let body = self.emit_expr(&def.body);
            writeln!(out, "    return {};", body).unwrap();
            self.indent = 0;
            writeln!(out, "}}").unwrap();
        }
        writeln!(out).unwrap();
    }

    /// Emits variable declarations from the symbol table, arrays first.
    fn emit_declarations(&mut self, out: &mut String) {
        let indent = self.indent_str();

        let mut arrays = Vec::new();
        let mut integers = Vec::new();
        let mut singles = Vec::new();
        let mut doubles = Vec::new();

        for (name, info) in &self.symbols.variables {
            // DEF FN parameters live in their function's signature.
            if info.is_parameter {
                continue;
            }
            // Strings live in the handle runtime, not C variables.
            if info.var_type == VarType::String {
                continue;
            }

            let c_name = c_identifier(name);
            if info.is_array {
                let size = info.element_count();
                let c_type = match info.var_type {
                    VarType::Integer => "int",
                    VarType::Double => "double",
                    _ => "float",
                };
                arrays.push(format!("{} {}[{}];", c_type, c_name, size));
            } else {
                match info.var_type {
                    VarType::Integer => integers.push(c_name),
                    VarType::Double => doubles.push(c_name),
                    _ => singles.push(c_name),
                }
            }
        }

        if !arrays.is_empty() {
            writeln!(out, "{}/* Arrays */", indent).unwrap();
            for decl in &arrays {
                writeln!(out, "{}{}", indent, decl).unwrap();
            }
        }
        if !integers.is_empty() {
            writeln!(out, "{}int {};", indent, integers.join(", ")).unwrap();
        }
        if !singles.is_empty() {
            writeln!(out, "{}float {};", indent, singles.join(", ")).unwrap();
        }
        if !doubles.is_empty() {
            writeln!(out, "{}double {};", indent, doubles.join(", ")).unwrap();
        }

        if self.strings.any() {
            writeln!(
                out,
                "{}char input_buffer[256];  /* For INPUT statements */",
                indent
            )
            .unwrap();
        }

        if !arrays.is_empty()
            || !integers.is_empty()
            || !singles.is_empty()
            || !doubles.is_empty()
            || self.strings.any()
        {
            writeln!(out).unwrap();
        }
    }

    /// Emits the static DATA pool and its read cursor.
    fn emit_data_arrays(&self, out: &mut String) {
        if self.data.is_empty() {
            return;
        }
        let indent = self.indent_str();

        writeln!(out, "{}/* DATA values */", indent).unwrap();
        writeln!(
            out,
            "{}static const float data_numeric[{}] = {{",
            indent,
            self.data.len()
        )
        .unwrap();
        for entry in &self.data.entries {
            match entry {
                DataEntry::Int(n) => {
                    writeln!(out, "{}    {}.0f,  /* int: {} */", indent, n, n).unwrap()
                }
                DataEntry::Float(f) => {
                    writeln!(out, "{}    {:.6}f,  /* float: {} */", indent, f, f).unwrap()
                }
                DataEntry::Str(_) => {
                    writeln!(out, "{}    0.0f,  /* string placeholder */", indent).unwrap()
                }
            }
        }
        writeln!(out, "{}}};", indent).unwrap();

        if self.data.any_strings() {
            writeln!(
                out,
                "{}static const char *data_strings[{}] = {{",
                indent,
                self.data.len()
            )
            .unwrap();
            for entry in &self.data.entries {
                match entry {
                    DataEntry::Str(s) => {
                        writeln!(out, "{}    \"{}\",", indent, escape_string(s)).unwrap()
                    }
                    _ => writeln!(out, "{}    NULL,  /* numeric */", indent).unwrap(),
                }
            }
            writeln!(out, "{}}};", indent).unwrap();
        }

        writeln!(
            out,
            "{}static const char data_types[{}] = {{",
            indent,
            self.data.len()
        )
        .unwrap();
        for entry in &self.data.entries {
            writeln!(out, "{}    '{}',", indent, entry.tag()).unwrap();
        }
        writeln!(out, "{}}};", indent).unwrap();
        writeln!(out, "{}int data_pointer = 0;", indent).unwrap();
        writeln!(out).unwrap();
    }
}

impl CodeGenBackend for CBackend {
    fn generate(&mut self, program: &Program) -> String {
        self.prepare(program);

        let mut out = String::new();
        self.emit_header(&mut out);
        self.emit_def_fn_functions(&mut out);

        writeln!(out, "int main() {{").unwrap();
        self.indent = 1;

        if self.strings.any() {
            let indent = self.indent_str();
            writeln!(out, "{}/* Initialize string system */", indent).unwrap();
            writeln!(out, "{}if (mb_init(MB_POOL_SIZE) != MB_SUCCESS) {{", indent).unwrap();
            writeln!(out, "{}    fprintf(stderr, \"?Out of memory\\n\");", indent).unwrap();
            writeln!(out, "{}    return 1;", indent).unwrap();
            writeln!(out, "{}}}", indent).unwrap();
            writeln!(out).unwrap();
        }

        self.emit_declarations(&mut out);

        {
            let indent = self.indent_str();
            writeln!(out, "{}/* GOSUB return stack */", indent).unwrap();
            writeln!(
                out,
                "{}int gosub_stack[100];  /* Return IDs (0, 1, 2...) - not line numbers */",
                indent
            )
            .unwrap();
            writeln!(out, "{}int gosub_sp = 0;      /* Stack pointer */", indent).unwrap();
            writeln!(out).unwrap();
        }

        self.emit_data_arrays(&mut out);

        for line in &program.lines {
            self.emit_line(line, &mut out);
        }

        writeln!(out).unwrap();
        if self.strings.any() {
            writeln!(out, "    mb_cleanup();").unwrap();
        }
        writeln!(out, "    return 0;").unwrap();
        writeln!(out, "}}").unwrap();

        out
    }

    fn get_file_extension(&self) -> &'static str {
        "c"
    }

    /// The z88dk invocation for CP/M: `+cpm` targets CP/M (Z80),
    /// `-create-app` emits a .COM executable, `-lm` links the math
    /// library for floating point. Resolved through `/usr/bin/env` so any
    /// installation method that puts `z88dk.zcc` on PATH works.
    fn get_compiler_command(&self, source_file: &str, output_file: &str) -> Vec<String> {
        vec![
            "/usr/bin/env".to_string(),
            "z88dk.zcc".to_string(),
            "+cpm".to_string(),
            source_file.to_string(),
            "-create-app".to_string(),
            "-lm".to_string(),
            "-o".to_string(),
            output_file.to_string(),
        ]
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ArrayDecl, BinaryOp, DataValue, Expr, Line, Statement, UnaryOp, VarRef};
    use crate::semantic::SemanticAnalyzer;

    fn backend_for(program: &Program) -> CBackend {
        let mut analyzer = SemanticAnalyzer::new();
        assert!(
            analyzer.analyze(program),
            "analysis failed: {:?}",
            analyzer.errors()
        );
        CBackend::new(analyzer.into_symbols())
    }

    fn let_stmt(name: &str, value: Expr) -> Statement {
        Statement::Let {
            target: VarRef::scalar(name),
            value,
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let program = Program::new(vec![
            Line::new(
                10,
                vec![
                    let_stmt("A$", Expr::String("X".into())),
                    Statement::Gosub(100),
                ],
            ),
            Line::new(
                20,
                vec![Statement::Print {
                    expressions: vec![Expr::var("A$")],
                    separators: vec![None],
                }],
            ),
            Line::new(30, vec![Statement::End]),
            Line::new(100, vec![Statement::Return]),
        ]);
        let mut backend = backend_for(&program);
        let first = backend.generate(&program);
        let second = backend.generate(&program);
        assert_eq!(first, second);
    }

    #[test]
    fn test_four_part_concat_is_three_calls_two_temps() {
        // A$ = B$ + C$ + D$ + E$
        let concat = Expr::binary(
            BinaryOp::Add,
            Expr::binary(
                BinaryOp::Add,
                Expr::binary(BinaryOp::Add, Expr::var("B$"), Expr::var("C$")),
                Expr::var("D$"),
            ),
            Expr::var("E$"),
        );
        let program = Program::new(vec![Line::new(
            10,
            vec![Statement::Let {
                target: VarRef::scalar("A$"),
                value: concat,
            }],
        )]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        let concat_calls: Vec<&str> = code
            .lines()
            .filter(|l| l.trim_start().starts_with("mb_string_concat("))
            .collect();
        assert_eq!(concat_calls.len(), 3, "expected 3 chained concats:\n{}", code);

        // Temps 5 and 6 chain; the final call writes the destination.
        assert!(concat_calls[0].contains("mb_string_concat(5, STR_B, STR_C);"));
        assert!(concat_calls[1].contains("mb_string_concat(6, 5, STR_D);"));
        assert!(concat_calls[2].contains("mb_string_concat(STR_A, 6, STR_E);"));
    }

    #[test]
    fn test_on_goto_falls_through_by_default() {
        let program = Program::new(vec![
            Line::new(
                10,
                vec![Statement::OnGoto {
                    selector: Expr::var("X"),
                    targets: vec![100, 200, 300],
                }],
            ),
            Line::new(100, vec![Statement::End]),
            Line::new(200, vec![Statement::End]),
            Line::new(300, vec![Statement::End]),
        ]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        assert!(code.contains("switch ((int)(x)) {"));
        assert!(code.contains("case 1: goto line_100;"));
        assert!(code.contains("case 3: goto line_300;"));
        assert!(code.contains("default: break;  /* Out of range - fall through */"));
    }

    #[test]
    fn test_three_d_array_flattening_strides() {
        // DIM D(2,2,2) : X = D(1,1,1) -- offset 1*9 + 1*3 + 1 = 13
        let program = Program::new(vec![
            Line::new(
                10,
                vec![Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "D".into(),
                        dimensions: vec![
                            Expr::Number(2.0),
                            Expr::Number(2.0),
                            Expr::Number(2.0),
                        ],
                    }],
                }],
            ),
            Line::new(
                20,
                vec![let_stmt(
                    "X",
                    Expr::Variable(VarRef::subscripted(
                        "D",
                        vec![Expr::Number(1.0), Expr::Number(1.0), Expr::Number(1.0)],
                    )),
                )],
            ),
        ]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        assert!(
            code.contains("x = d[(1 * 9) + (1 * 3) + 1];"),
            "flattened access missing:\n{}",
            code
        );
        // 27 elements
        assert!(code.contains("float d[27];"));
    }

    #[test]
    fn test_gosub_return_dispatch_covers_every_call_site() {
        let program = Program::new(vec![
            Line::new(10, vec![Statement::Gosub(100)]),
            Line::new(
                20,
                vec![Statement::OnGosub {
                    selector: Expr::var("X"),
                    targets: vec![100, 100],
                }],
            ),
            Line::new(100, vec![Statement::Return]),
        ]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        assert!(code.contains("gosub_stack[gosub_sp++] = 0;  /* Push return ID */"));
        assert!(code.contains("gosub_return_0:"));
        assert!(code.contains("gosub_return_1:"));
        assert!(code.contains("gosub_return_2:"));
        // RETURN dispatch has one case per call site.
        assert!(code.contains("case 0: goto gosub_return_0;"));
        assert!(code.contains("case 1: goto gosub_return_1;"));
        assert!(code.contains("case 2: goto gosub_return_2;"));
        assert!(code.contains("default: break;  /* Error: invalid return address */"));
    }

    #[test]
    fn test_restore_with_line_rewinds_and_warns() {
        let program = Program::new(vec![
            Line::new(
                10,
                vec![Statement::Data(vec![DataValue::Number(1.0)])],
            ),
            Line::new(20, vec![Statement::Restore(Some(10))]),
        ]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        assert!(code.contains("data_pointer = 0;"));
        assert!(backend
            .warnings()
            .iter()
            .any(|w| w.contains("RESTORE to line 10 not supported")));
    }

    #[test]
    fn test_for_loop_always_compares_ascending() {
        let program = Program::new(vec![
            Line::new(
                10,
                vec![Statement::For {
                    variable: VarRef::scalar("I"),
                    start: Expr::Number(10.0),
                    end: Expr::Number(1.0),
                    step: Some(Expr::unary(UnaryOp::Neg, Expr::Number(1.0))),
                }],
            ),
            Line::new(
                20,
                vec![Statement::Next {
                    variables: vec![VarRef::scalar("I")],
                }],
            ),
        ]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        // Known defect preserved: descending loops still emit <=.
        assert!(code.contains("for (i = 10; i <= 1; i += (-1)) {"));
    }

    #[test]
    fn test_dim_statement_site_is_noop() {
        let program = Program::new(vec![Line::new(
            10,
            vec![Statement::Dim {
                arrays: vec![ArrayDecl {
                    name: "A".into(),
                    dimensions: vec![Expr::Number(5.0)],
                }],
            }],
        )]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        // Declaration up front, nothing at the statement site.
        assert!(code.contains("float a[6];"));
        let after_label = code.split("line_10:").nth(1).unwrap();
        assert!(!after_label.contains("a[6]"));
    }

    #[test]
    fn test_data_pool_and_read_dispatch() {
        let program = Program::new(vec![
            Line::new(
                10,
                vec![Statement::Data(vec![
                    DataValue::Number(7.0),
                    DataValue::String("HI".into()),
                ])],
            ),
            Line::new(
                20,
                vec![Statement::Read {
                    variables: vec![VarRef::scalar("N%"), VarRef::scalar("A$")],
                }],
            ),
        ]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        assert!(code.contains("7.0f,  /* int: 7 */"));
        assert!(code.contains("\"HI\","));
        assert!(code.contains("'I',"));
        assert!(code.contains("'S',"));
        assert!(code.contains("if (data_pointer >= 2) {"));
        assert!(code.contains("?Out of DATA"));
        assert!(code.contains("n = (int)data_numeric[data_pointer];"));
        assert!(code.contains("mb_string_alloc_const(STR_A, data_strings[data_pointer]);"));
    }

    #[test]
    fn test_string_array_elements_get_handle_blocks() {
        let program = Program::new(vec![
            Line::new(
                10,
                vec![Statement::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A$".into(),
                        dimensions: vec![Expr::Number(4.0)],
                    }],
                }],
            ),
            Line::new(
                20,
                vec![Statement::Let {
                    target: VarRef::subscripted("A$", vec![Expr::Number(2.0)]),
                    value: Expr::String("X".into()),
                }],
            ),
        ]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        assert!(code.contains("#define STR_A 0"));
        assert!(code.contains("mb_string_alloc_const((STR_A + 2), \"X\");"));
    }

    #[test]
    fn test_def_fn_emitted_before_main() {
        let program = Program::new(vec![Line::new(
            10,
            vec![Statement::DefFn {
                name: "FNDBL".into(),
                parameters: vec![VarRef::scalar("X")],
                body: Expr::binary(BinaryOp::Mul, Expr::var("X"), Expr::Number(2.0)),
            }],
        )]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        let fn_pos = code.find("double fn_dbl(double x) {").unwrap();
        let main_pos = code.find("int main() {").unwrap();
        assert!(fn_pos < main_pos);
        assert!(code.contains("return (x * 2);"));
    }

    #[test]
    fn test_unsupported_constructs_degrade_to_comments() {
        let program = Program::new(vec![Line::new(
            10,
            vec![
                Statement::Poke {
                    address: Expr::Number(1000.0),
                    value: Expr::Number(255.0),
                },
                Statement::Tron,
            ],
        )]);
        let mut backend = backend_for(&program);
        let code = backend.generate(&program);

        assert!(code.contains("/* POKE 1000, 255 - memory writes not supported in compiled code */"));
        assert!(code.contains("/* Unsupported: TRON */"));
        assert!(!backend.warnings().is_empty());
        assert!(backend.errors().is_empty());
    }
}
