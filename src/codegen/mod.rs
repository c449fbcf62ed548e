//! Code generation module for mb80.
//!
//! This module transforms the analyzed AST into target-language source
//! text. The architecture uses a trait-based backend system so multiple
//! targets can share the front half of the compiler.
//!
//! # Architecture
//!
//! ```text
//! Program + SymbolTable → CodeGenBackend → target source text
//!                               ↑
//!                        CBackend (z88dk / CP/M)
//! ```
//!
//! # Error policy
//!
//! Backends never fail. An unsupported or malformed construct degrades to
//! an emitted comment describing the gap plus an entry in
//! [`warnings`](CodeGenBackend::warnings); `generate` always returns a
//! complete source string. Semantic coherence is the analyzer's hard
//! gate; generation is best-effort by design, so a partially supported
//! program still produces something runnable for the supported subset.

mod c_backend;

pub use c_backend::CBackend;

use crate::ast::Program;

/// Trait for code generation backends.
///
/// A backend is constructed around the symbol table produced by semantic
/// analysis and then consumes the same AST the analyzer saw.
///
/// # Determinism
///
/// `generate` must be reproducible: the same AST and symbol table must
/// yield byte-identical output on every call. Backends therefore may not
/// iterate any collection with unspecified order while emitting.
pub trait CodeGenBackend {
    /// Generates source code for the entire program.
    ///
    /// Never fails; see the module docs for the degradation policy.
    fn generate(&mut self, program: &Program) -> String;

    /// File extension for generated code (without the dot).
    fn get_file_extension(&self) -> &'static str;

    /// The external toolchain command that turns generated source into an
    /// executable. Purely informational pass-through for the driver; this
    /// crate never runs it.
    fn get_compiler_command(&self, source_file: &str, output_file: &str) -> Vec<String>;

    /// Errors recorded during the last `generate` call.
    fn errors(&self) -> &[String];

    /// Warnings recorded during the last `generate` call.
    fn warnings(&self) -> &[String];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::SymbolTable;

    #[test]
    fn test_c_backend_handoff_metadata() {
        let backend = CBackend::new(SymbolTable::new());
        assert_eq!(backend.get_file_extension(), "c");

        let cmd = backend.get_compiler_command("prog.c", "prog.com");
        assert_eq!(cmd[0], "/usr/bin/env");
        assert!(cmd.contains(&"z88dk.zcc".to_string()));
        assert!(cmd.contains(&"prog.c".to_string()));
        assert!(cmd.contains(&"prog.com".to_string()));
    }

    #[test]
    fn test_empty_program_still_generates() {
        let mut backend = CBackend::new(SymbolTable::new());
        let code = backend.generate(&Program::new(vec![]));
        assert!(code.contains("int main("));
        assert!(code.contains("return 0;"));
        assert!(backend.errors().is_empty());
    }
}
