//! Preparation passes for the C backend.
//!
//! Everything here runs once, before any statement is lowered:
//!
//! - **GOSUB counting** - sizes the `RETURN` dispatch switch
//! - **String handle allocation** - permanent ids per string variable,
//!   plus the shared temporary pool
//! - **Line-label collection** - every line becomes a `goto` target
//! - **DATA flattening** - one program-wide literal pool behind a single
//!   read cursor
//! - **DEF FN collection** - function bodies emitted before `main`

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{DataValue, Expr, Program, Statement, VarRef};
use crate::semantic::{SymbolTable, VarType};

use super::expr::static_expr_type;

/// Headroom added to the measured temporary-handle requirement.
const TEMP_POOL_HEADROOM: usize = 3;

/// Permanent and temporary string-handle allocation.
///
/// String values live in an external descriptor-pool runtime; this side
/// only assigns the small integer handles. Scalars get one permanent
/// handle, arrays a contiguous block (one handle per flattened element).
/// Temporaries share a single pool appended after all permanent handles
/// and are reused round-robin modulo the pool size - an approximation of
/// liveness, deliberately isolated here so an exact analysis could
/// replace it without touching the lowering code.
#[derive(Debug, Default)]
pub(super) struct StringHandles {
    /// Permanent handle (or array base handle) per uppercased variable name.
    ids: BTreeMap<String, usize>,
    /// Total descriptor count: permanent handles plus the temp pool.
    total: usize,
    /// First temp-pool handle.
    temp_base: usize,
    /// Temp pool size; zero when the program never touches strings.
    temp_pool: usize,
    /// Rotating allocation cursor.
    next_temp: usize,
}

impl StringHandles {
    /// Allocates handles for every string variable and sizes the temp pool.
    pub fn allocate(symbols: &SymbolTable, program: &Program) -> Self {
        let mut ids = BTreeMap::new();
        let mut current = 0usize;

        for (name, info) in &symbols.variables {
            if info.var_type != VarType::String {
                continue;
            }
            ids.insert(name.clone(), current);
            if info.is_array {
                current += info.element_count() as usize;
            } else {
                current += 1;
            }
        }

        let temp_pool = estimate_temps(symbols, program);
        let temp_base = current;

        Self {
            ids,
            total: current + temp_pool,
            temp_base,
            temp_pool,
            next_temp: 0,
        }
    }

    /// Total descriptor count for the `MB_NUM_STRINGS` define.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether the program uses strings at all.
    pub fn any(&self) -> bool {
        self.total > 0
    }

    /// Permanent handle for a string variable, by source-spelled name.
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.ids.get(&name.to_uppercase()).copied()
    }

    /// Iterates permanent handles in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, usize)> + '_ {
        let mut entries: Vec<_> = self.ids.iter().map(|(n, id)| (n, *id)).collect();
        entries.sort_by_key(|(_, id)| *id);
        entries.into_iter()
    }

    /// Draws the next temporary handle, wrapping modulo the pool size.
    pub fn take_temp(&mut self) -> usize {
        let id = self.temp_base + (self.next_temp % self.temp_pool.max(1));
        self.next_temp += 1;
        id
    }

    /// Restarts temp allocation for the next statement.
    pub fn reset_temps(&mut self) {
        self.next_temp = 0;
    }
}

/// Measures the deepest temporary-handle requirement of any statement.
///
/// Heuristic, not liveness: a statement's requirement is the count of
/// string-producing subexpressions in a `PRINT`, or the concatenation
/// chain depth of a string `LET`. The program-wide maximum plus a fixed
/// headroom sizes the shared pool; a program with no string use at all
/// gets no pool.
fn estimate_temps(symbols: &SymbolTable, program: &Program) -> usize {
    let mut max_temps = 0usize;
    let mut has_any_strings = false;

    for line in &program.lines {
        for stmt in &line.statements {
            let needed = statement_temps(symbols, stmt);
            if needed > 0 {
                has_any_strings = true;
            }
            max_temps = max_temps.max(needed);
        }
    }

    if has_any_strings {
        max_temps + TEMP_POOL_HEADROOM
    } else {
        0
    }
}

fn statement_temps(symbols: &SymbolTable, stmt: &Statement) -> usize {
    match stmt {
        Statement::Print { expressions, .. } => expressions
            .iter()
            .filter(|e| static_expr_type(symbols, e) == VarType::String)
            .count(),

        Statement::Let { value, .. } => {
            if static_expr_type(symbols, value) == VarType::String {
                concat_depth(value)
            } else {
                0
            }
        }

        Statement::If {
            then_statements,
            else_statements,
            ..
        } => {
            let then_max = then_statements
                .iter()
                .map(|s| statement_temps(symbols, s))
                .max()
                .unwrap_or(0);
            let else_max = else_statements
                .as_ref()
                .map(|stmts| {
                    stmts
                        .iter()
                        .map(|s| statement_temps(symbols, s))
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0);
            then_max.max(else_max)
        }

        _ => 0,
    }
}

/// Depth of a `+` concatenation chain.
fn concat_depth(expr: &Expr) -> usize {
    match expr {
        Expr::BinaryOp {
            op: crate::ast::BinaryOp::Add,
            left,
            right,
        } => concat_depth(left) + concat_depth(right) + 1,
        _ => 0,
    }
}

/// One flattened `DATA` literal.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum DataEntry {
    Int(i64),
    Float(f64),
    Str(String),
}

impl DataEntry {
    /// The one-character type tag emitted into the generated types array.
    pub fn tag(&self) -> char {
        match self {
            DataEntry::Int(_) => 'I',
            DataEntry::Float(_) => 'F',
            DataEntry::Str(_) => 'S',
        }
    }
}

/// The flattened program-wide `DATA` pool.
///
/// All `READ` statements share one monotonically increasing cursor over
/// this pool; `RESTORE` rewinds it to zero.
#[derive(Debug, Default)]
pub(super) struct DataPool {
    pub entries: Vec<DataEntry>,
}

impl DataPool {
    /// Flattens every `DATA` statement in source order.
    pub fn collect(program: &Program) -> Self {
        let mut entries = Vec::new();
        for line in &program.lines {
            for stmt in &line.statements {
                if let Statement::Data(values) = stmt {
                    for value in values {
                        entries.push(match value {
                            DataValue::Number(n) => {
                                if n.fract() == 0.0 {
                                    DataEntry::Int(*n as i64)
                                } else {
                                    DataEntry::Float(*n)
                                }
                            }
                            DataValue::String(s) => DataEntry::Str(s.clone()),
                        });
                    }
                }
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn any_strings(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, DataEntry::Str(_)))
    }
}

/// Counts every GOSUB call site in the program.
///
/// `ON ... GOSUB` entries are call sites too: each list entry pushes its
/// own return id, so each needs a `case` in the `RETURN` dispatch.
pub(super) fn count_gosubs(program: &Program) -> u32 {
    fn count_stmt(stmt: &Statement) -> u32 {
        match stmt {
            Statement::Gosub(_) => 1,
            Statement::OnGosub { targets, .. } => targets.len() as u32,
            Statement::If {
                then_statements,
                else_statements,
                ..
            } => {
                then_statements.iter().map(count_stmt).sum::<u32>()
                    + else_statements
                        .as_ref()
                        .map(|stmts| stmts.iter().map(count_stmt).sum())
                        .unwrap_or(0)
            }
            _ => 0,
        }
    }

    program
        .lines
        .iter()
        .flat_map(|line| line.statements.iter())
        .map(count_stmt)
        .sum()
}

/// Collects every line number as a jump-target label.
///
/// Conservative: every line gets a label, not just the referenced ones.
pub(super) fn collect_line_labels(program: &Program) -> BTreeSet<u32> {
    program.lines.iter().map(|line| line.line_number).collect()
}

/// A `DEF FN` captured for emission before `main`.
#[derive(Debug, Clone)]
pub(super) struct DefFnDef {
    pub name: String,
    pub parameters: Vec<VarRef>,
    pub body: Expr,
}

/// Collects all `DEF FN` definitions in source order.
pub(super) fn collect_def_fns(program: &Program) -> Vec<DefFnDef> {
    let mut defs = Vec::new();
    for line in &program.lines {
        for stmt in &line.statements {
            if let Statement::DefFn {
                name,
                parameters,
                body,
            } = stmt
            {
                defs.push(DefFnDef {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: body.clone(),
                });
            }
        }
    }
    defs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Line};
    use crate::semantic::{SemanticAnalyzer, SymbolTable};

    fn analyzed(program: &Program) -> SymbolTable {
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze(program);
        analyzer.into_symbols()
    }

    #[test]
    fn test_gosub_counting_includes_on_gosub() {
        let program = Program::new(vec![
            Line::new(10, vec![Statement::Gosub(100)]),
            Line::new(
                20,
                vec![Statement::OnGosub {
                    selector: Expr::var("X"),
                    targets: vec![100, 200, 300],
                }],
            ),
            Line::new(
                30,
                vec![Statement::If {
                    condition: Expr::var("X"),
                    then_statements: vec![Statement::Gosub(100)],
                    then_line: None,
                    else_statements: None,
                    else_line: None,
                }],
            ),
            Line::new(100, vec![Statement::Return]),
            Line::new(200, vec![Statement::Return]),
            Line::new(300, vec![Statement::Return]),
        ]);
        assert_eq!(count_gosubs(&program), 5);
    }

    #[test]
    fn test_data_pool_flattening() {
        let program = Program::new(vec![
            Line::new(
                10,
                vec![Statement::Data(vec![
                    DataValue::Number(1.0),
                    DataValue::Number(-2.5),
                    DataValue::String("HI".into()),
                ])],
            ),
            Line::new(20, vec![Statement::Data(vec![DataValue::Number(-3.0)])]),
        ]);
        let pool = DataPool::collect(&program);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.entries[0], DataEntry::Int(1));
        assert_eq!(pool.entries[1], DataEntry::Float(-2.5));
        assert_eq!(pool.entries[2], DataEntry::Str("HI".into()));
        assert_eq!(pool.entries[3], DataEntry::Int(-3));
        assert_eq!(pool.entries[0].tag(), 'I');
        assert_eq!(pool.entries[1].tag(), 'F');
        assert_eq!(pool.entries[2].tag(), 'S');
        assert!(pool.any_strings());
    }

    #[test]
    fn test_string_handles_reserve_array_blocks() {
        // A$ scalar, B$(4) -> 5 elements
        let program = Program::new(vec![Line::new(
            10,
            vec![
                Statement::Dim {
                    arrays: vec![crate::ast::ArrayDecl {
                        name: "B$".into(),
                        dimensions: vec![Expr::Number(4.0)],
                    }],
                },
                Statement::Let {
                    target: VarRef::scalar("A$"),
                    value: Expr::String("X".into()),
                },
            ],
        )]);
        let symbols = analyzed(&program);
        let handles = StringHandles::allocate(&symbols, &program);

        // BTreeMap order: A$ first, then B$'s 5-slot block.
        assert_eq!(handles.id_of("A$"), Some(0));
        assert_eq!(handles.id_of("B$"), Some(1));
        // 6 permanent handles; a literal-only assignment needs no temps,
        // so no pool is reserved.
        assert_eq!(handles.total(), 6);
    }

    #[test]
    fn test_no_strings_means_no_temp_pool() {
        let program = Program::new(vec![Line::new(
            10,
            vec![Statement::Let {
                target: VarRef::scalar("X"),
                value: Expr::Number(1.0),
            }],
        )]);
        let symbols = analyzed(&program);
        let handles = StringHandles::allocate(&symbols, &program);
        assert_eq!(handles.total(), 0);
        assert!(!handles.any());
    }

    #[test]
    fn test_temp_pool_sized_by_deepest_concat() {
        // A$ = B$ + C$ + D$ + E$ : three Add nodes -> 3 + headroom
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
        let symbols = analyzed(&program);
        let handles = StringHandles::allocate(&symbols, &program);
        // 5 permanent handles + (3 + headroom) temps
        assert_eq!(handles.total(), 5 + 3 + TEMP_POOL_HEADROOM);
    }

    #[test]
    fn test_temp_reuse_wraps_modulo_pool() {
        let mut handles = StringHandles {
            ids: BTreeMap::new(),
            total: 3,
            temp_base: 0,
            temp_pool: 3,
            next_temp: 0,
        };
        let drawn: Vec<usize> = (0..5).map(|_| handles.take_temp()).collect();
        assert_eq!(drawn, vec![0, 1, 2, 0, 1]);
        handles.reset_temps();
        assert_eq!(handles.take_temp(), 0);
    }
}
