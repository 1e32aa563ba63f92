//! Jmm Compiler
//!
//! Semantic analysis and lowering for Jmm, a small class-based language.
//! The parser and the bytecode emitter live elsewhere: this crate takes a
//! parsed [`Program`] and produces diagnostics and three-address IR.
//!
//! ```text
//! Program -> SymbolTable -> SemanticAnalyzer -> (diagnostics)
//!                        -> [ConstantPropagation -> ConstantFolding] -> IRGenerator -> IRModule
//! ```

pub mod feedback;
pub mod frontend;
pub mod middle;
pub mod types;
pub mod utils;

use log::{debug, info};
use serde::{Deserialize, Serialize};

pub use feedback::{Diagnostic, DiagnosticReport, SemanticError, Severity};
pub use frontend::ast::Program;
pub use frontend::symbol_table::SymbolTable;
pub use middle::ir::IRModule;
pub use middle::ir_gen::{IRGenerator, LoweringContext};
pub use middle::ir_printer::print_ir;
pub use utils::{Error, Result};

/// Pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Propagate known local values, then fold constant sub-expressions,
    /// before lowering
    pub fold_constants: bool,
    /// Treat warnings as blocking diagnostics
    pub warnings_as_errors: bool,
}

impl CompilerOptions {
    /// Whether `diagnostic` prevents lowering under these options
    pub fn is_blocking(&self, diagnostic: &Diagnostic) -> bool {
        diagnostic.is_error() || self.warnings_as_errors
    }

    pub fn blocking_count(&self, diagnostics: &[Diagnostic]) -> usize {
        diagnostics.iter().filter(|d| self.is_blocking(d)).count()
    }

    pub fn blocks_lowering(&self, diagnostics: &[Diagnostic]) -> bool {
        diagnostics.iter().any(|d| self.is_blocking(d))
    }
}

/// Result of the checking stage
#[derive(Debug, Clone)]
pub struct Checked {
    pub table: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of a full compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    pub module: IRModule,
    /// Non-blocking diagnostics (warnings)
    pub diagnostics: Vec<Diagnostic>,
}

/// Read a syntax tree in its JSON form
pub fn parse_ast(json: &str) -> Result<Program> {
    Ok(serde_json::from_str(json)?)
}

/// Build the symbol table and run every semantic rule
pub fn check(program: &Program) -> Checked {
    let (table, diagnostics) = frontend::semantic::analyze(program);
    info!(
        "checked {}: {} diagnostic(s)",
        program.class.name,
        diagnostics.len()
    );
    Checked { table, diagnostics }
}

/// Lower a checked program with a fresh lowering context
pub fn lower(program: &Program, table: &SymbolTable, options: &CompilerOptions) -> Result<IRModule> {
    let mut generator = IRGenerator::new(table);
    if options.fold_constants {
        let propagated = middle::optimize::propagate_constants(program);
        let folded = middle::optimize::fold_constants(&propagated);
        return generator.generate(&folded);
    }
    generator.generate(program)
}

/// Check, then lower unless diagnostics block it
pub fn compile(program: &Program, options: &CompilerOptions) -> Result<Compilation> {
    let Checked { table, diagnostics } = check(program);
    let count = options.blocking_count(&diagnostics);
    if count > 0 {
        debug!("lowering of {} blocked by {} diagnostic(s)", program.class.name, count);
        return Err(Error::SemanticErrors { count });
    }

    let module = lower(program, &table, options)?;
    Ok(Compilation { module, diagnostics })
}
