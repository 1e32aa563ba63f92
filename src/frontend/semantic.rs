//! Semantic Analysis for Jmm
//!
//! Performs:
//! - Declaration uniqueness (imports, fields, methods, parameters, locals)
//! - Main-method shape
//! - Statement checks (conditions, assignments, indexed stores, returns)
//! - Expression typing, delegated to [`TypeResolver`]
//!
//! Each rule appends to one diagnostic list; no rule stops another from
//! running. The caller decides whether the result blocks lowering.

use std::collections::HashSet;

use crate::feedback::{Diagnostic, SemanticError};
use crate::frontend::ast::{ClassDecl, Expr, MethodDecl, Program, Stmt};
use crate::frontend::resolver::TypeResolver;
use crate::frontend::symbol_table::{MethodSignature, SymbolTable};
use crate::types::{is_assignable, Type};
use crate::utils::Span;
use log::debug;

/// Semantic analyzer for one compilation unit
pub struct SemanticAnalyzer<'a> {
    table: &'a SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self { table, diagnostics: Vec::new() }
    }

    /// Run every rule over `program` and return the collected diagnostics
    pub fn analyze(mut self, program: &Program) -> Vec<Diagnostic> {
        self.check_imports(program);
        self.check_fields(&program.class);
        self.check_methods(&program.class);
        self.diagnostics.sort_by_key(|d| (d.line, d.column));

        debug!(
            "semantic analysis of {}: {} diagnostic(s)",
            program.class.name,
            self.diagnostics.len()
        );
        self.diagnostics
    }

    // ==================== Declarations ====================

    fn check_imports(&mut self, program: &Program) {
        let mut seen = HashSet::new();
        for import in &program.imports {
            if !seen.insert(import.name()) {
                self.error(
                    import.span,
                    SemanticError::DuplicateImport { name: import.name().to_string() },
                );
            }
        }
        if seen.contains(program.class.name.as_str()) {
            self.error(
                program.class.span,
                SemanticError::ClassNameClashesWithImport { name: program.class.name.clone() },
            );
        }
    }

    fn check_fields(&mut self, class: &ClassDecl) {
        let mut seen = HashSet::new();
        for field in &class.fields {
            if !seen.insert(field.name.as_str()) {
                self.error(field.span, SemanticError::DuplicateField { name: field.name.clone() });
            }
        }
    }

    fn check_methods(&mut self, class: &ClassDecl) {
        let table = self.table;
        let mut seen = HashSet::new();
        for (method, sig) in class.methods.iter().zip(table.signatures()) {
            if !seen.insert(method.name.as_str()) {
                self.error(method.span, SemanticError::DuplicateMethod { name: method.name.clone() });
            }
            self.check_method_shape(method, sig);
            self.check_declarations(method);
            self.check_body(method, sig);
        }
    }

    fn check_method_shape(&mut self, method: &MethodDecl, sig: &MethodSignature) {
        if method.name != "main" {
            if method.is_static {
                self.error(method.span, SemanticError::StaticNonMain { name: method.name.clone() });
            }
            return;
        }

        if !method.is_static {
            self.error(method.span, SemanticError::MainNotStatic);
        }
        let string_array = Type::string().array_of();
        let args_ok = !sig.has_varargs
            && sig.params.len() == 1
            && sig.params[0].name == "args"
            && sig.params[0].ty == string_array;
        if !args_ok {
            self.error(method.span, SemanticError::MainParameters);
        }
    }

    fn check_declarations(&mut self, method: &MethodDecl) {
        let mut params = HashSet::new();
        for param in method.params.iter().chain(method.varargs.as_ref()) {
            if !params.insert(param.name.as_str()) {
                self.error(param.span, SemanticError::DuplicateParam { name: param.name.clone() });
            }
        }

        let mut locals = HashSet::new();
        for local in &method.locals {
            if !locals.insert(local.name.as_str()) {
                self.error(local.span, SemanticError::DuplicateLocal { name: local.name.clone() });
            }
        }
    }

    // ==================== Statements ====================

    fn check_body(&mut self, method: &MethodDecl, sig: &MethodSignature) {
        let mut resolver = TypeResolver::new(self.table, sig);
        self.check_block(&mut resolver, &method.body);
        self.diagnostics.extend(resolver.take_reports());
    }

    fn check_block(&mut self, resolver: &mut TypeResolver<'_>, stmts: &[Stmt]) {
        let first_return = stmts.iter().position(|s| matches!(s, Stmt::Return { .. }));
        if let Some(dead) = first_return.and_then(|pos| stmts.get(pos + 1)) {
            self.diagnostics
                .push(Diagnostic::warning(dead.span(), SemanticError::UnreachableCode));
        }
        for stmt in stmts {
            self.check_stmt(resolver, stmt);
        }
    }

    fn check_stmt(&mut self, resolver: &mut TypeResolver<'_>, stmt: &Stmt) {
        match stmt {
            Stmt::Block { stmts, .. } => self.check_block(resolver, stmts),
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.check_condition(resolver, cond, "if");
                self.check_stmt(resolver, then_branch);
                self.check_stmt(resolver, else_branch);
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(resolver, cond, "while");
                self.check_stmt(resolver, body);
            }
            Stmt::Expr { expr, .. } => {
                resolver.resolve(expr);
            }
            Stmt::Assign { target, value, span } => {
                let found = resolver.resolve(value);
                let expected = resolver.resolve_target(target, *span);
                if !is_assignable(self.table, &expected, &found) {
                    self.error(
                        value.span,
                        SemanticError::IncompatibleAssignment {
                            target: target.clone(),
                            expected,
                            found,
                        },
                    );
                }
            }
            Stmt::ArrayAssign { target, index, value, span } => {
                let array = resolver.resolve_target(target, *span);
                let index_ty = resolver.resolve(index);
                let found = resolver.resolve(value);

                if !index_ty.accepts(&Type::int()) {
                    self.error(index.span, SemanticError::IndexNotInt { found: index_ty });
                }
                if array.is_any() {
                    return;
                }
                if !array.is_array {
                    self.error(*span, SemanticError::NotAnArray { name: target.clone() });
                    return;
                }
                let expected = array.element();
                if !is_assignable(self.table, &expected, &found) {
                    self.error(
                        value.span,
                        SemanticError::IncompatibleAssignment {
                            target: format!("{}[]", target),
                            expected,
                            found,
                        },
                    );
                }
            }
            Stmt::Return { value, span } => self.check_return(resolver, value.as_ref(), *span),
        }
    }

    fn check_condition(
        &mut self,
        resolver: &mut TypeResolver<'_>,
        cond: &Expr,
        construct: &str,
    ) {
        let ty = resolver.resolve(cond);
        if ty.is_any() || ty.is_boolean() {
            return;
        }
        let error = if ty.is_array {
            SemanticError::ArrayAsCondition { construct: construct.to_string() }
        } else {
            SemanticError::ConditionNotBoolean { construct: construct.to_string(), found: ty }
        };
        self.error(cond.span, error);
    }

    fn check_return(
        &mut self,
        resolver: &mut TypeResolver<'_>,
        value: Option<&Expr>,
        span: Span,
    ) {
        let sig = resolver.method();
        let expected = sig.return_type.clone();
        match value {
            Some(value) => {
                let found = resolver.resolve(value);
                if expected.is_void() {
                    self.error(span, SemanticError::VoidReturnsValue { method: sig.name.clone() });
                } else if !is_assignable(self.table, &expected, &found) {
                    self.error(value.span, SemanticError::ReturnType { expected, found });
                }
            }
            None if !expected.is_void() => {
                self.error(span, SemanticError::MissingReturnValue { expected });
            }
            None => {}
        }
    }

    fn error(&mut self, span: Span, error: SemanticError) {
        self.diagnostics.push(Diagnostic::error(span, error));
    }
}

/// Build the symbol table and analyze `program` in one step
pub fn analyze(program: &Program) -> (SymbolTable, Vec<Diagnostic>) {
    let table = SymbolTable::build(program);
    let diagnostics = SemanticAnalyzer::new(&table).analyze(program);
    (table, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Severity;
    use crate::frontend::ast::{BinOp, TypeExpr};
    use pretty_assertions::assert_eq;

    fn errors_of(program: &Program) -> Vec<SemanticError> {
        analyze(program).1.into_iter().map(|d| d.error).collect()
    }

    fn single_method(method: MethodDecl) -> Program {
        Program::new(ClassDecl::new("Foo").field(TypeExpr::Int, "count").method(method))
    }

    #[test]
    fn test_valid_program_has_no_diagnostics() {
        let program = Program::new(
            ClassDecl::new("Foo")
                .method(
                    MethodDecl::new("bar", TypeExpr::Int)
                        .param(TypeExpr::Int, "a")
                        .param(TypeExpr::Int, "b")
                        .stmt(Stmt::ret(Expr::binary(BinOp::Add, Expr::var("a"), Expr::var("b")))),
                )
                .method(MethodDecl::main()),
        );
        assert_eq!(analyze(&program).1, vec![]);
    }

    #[test]
    fn test_duplicate_local_reported_at_second_declaration() {
        let program = single_method(
            MethodDecl::new("m", TypeExpr::Void)
                .local_at(TypeExpr::Int, "y", 2, 5)
                .local_at(TypeExpr::Boolean, "y", 3, 5),
        );
        let (_, diags) = analyze(&program);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].error, SemanticError::DuplicateLocal { name: "y".to_string() });
        assert_eq!(diags[0].span(), Span::new(3, 5));
    }

    #[test]
    fn test_uniqueness_is_per_method_for_locals() {
        let program = Program::new(
            ClassDecl::new("Foo")
                .method(MethodDecl::new("a", TypeExpr::Void).local(TypeExpr::Int, "x"))
                .method(MethodDecl::new("b", TypeExpr::Void).local(TypeExpr::Int, "x")),
        );
        assert_eq!(errors_of(&program), vec![]);
    }

    #[test]
    fn test_class_wide_duplicates() {
        let program = Program::new(
            ClassDecl::new("io")
                .field(TypeExpr::Int, "f")
                .field(TypeExpr::Int, "f")
                .method(MethodDecl::new("m", TypeExpr::Void).param(TypeExpr::Int, "p").varargs(TypeExpr::Int, "p"))
                .method(MethodDecl::new("m", TypeExpr::Void)),
        )
        .import("io")
        .import("a.io");

        let errors = errors_of(&program);
        assert!(errors.contains(&SemanticError::DuplicateImport { name: "io".to_string() }));
        assert!(errors.contains(&SemanticError::ClassNameClashesWithImport { name: "io".to_string() }));
        assert!(errors.contains(&SemanticError::DuplicateField { name: "f".to_string() }));
        assert!(errors.contains(&SemanticError::DuplicateParam { name: "p".to_string() }));
        assert!(errors.contains(&SemanticError::DuplicateMethod { name: "m".to_string() }));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_main_shape() {
        let mut main = MethodDecl::main();
        main.is_static = false;
        let program = Program::new(
            ClassDecl::new("Foo")
                .method(main)
                .method(MethodDecl::new("helper", TypeExpr::Void).make_static()),
        );
        assert_eq!(
            errors_of(&program),
            vec![
                SemanticError::MainNotStatic,
                SemanticError::StaticNonMain { name: "helper".to_string() },
            ]
        );

        let program = single_method(
            MethodDecl::new("main", TypeExpr::Void).make_static().param(TypeExpr::Int, "args"),
        );
        assert_eq!(errors_of(&program), vec![SemanticError::MainParameters]);
    }

    #[test]
    fn test_array_condition() {
        let program = single_method(
            MethodDecl::new("m", TypeExpr::Void)
                .local(TypeExpr::int_array(), "arr")
                .stmt(Stmt::while_loop(Expr::var("arr"), Stmt::block(vec![]))),
        );
        assert_eq!(
            errors_of(&program),
            vec![SemanticError::ArrayAsCondition { construct: "while".to_string() }]
        );
    }

    #[test]
    fn test_int_condition() {
        let program = single_method(
            MethodDecl::new("m", TypeExpr::Void).stmt(Stmt::if_else(
                Expr::int(1),
                Stmt::block(vec![]),
                Stmt::block(vec![]),
            )),
        );
        assert_eq!(
            errors_of(&program),
            vec![SemanticError::ConditionNotBoolean {
                construct: "if".to_string(),
                found: Type::int(),
            }]
        );
    }

    #[test]
    fn test_unresolved_condition_reports_once() {
        let program = single_method(
            MethodDecl::new("m", TypeExpr::Void)
                .stmt(Stmt::while_loop(Expr::var("ghost"), Stmt::block(vec![]))),
        );
        assert_eq!(
            errors_of(&program),
            vec![SemanticError::UndeclaredVariable { name: "ghost".to_string() }]
        );
    }

    #[test]
    fn test_assignment_compatibility() {
        let program = Program::new(
            ClassDecl::new("Foo")
                .extends("Base")
                .method(
                    MethodDecl::new("m", TypeExpr::Void)
                        .local(TypeExpr::Int, "n")
                        .local(TypeExpr::named("A"), "a")
                        .local(TypeExpr::named("Base"), "base")
                        .stmt(Stmt::assign("n", Expr::boolean(true)))
                        .stmt(Stmt::assign("a", Expr::new_object("B")))
                        .stmt(Stmt::assign("base", Expr::new_object("Foo")))
                        .stmt(Stmt::assign("n", Expr::var("missing"))),
                ),
        )
        .import("A")
        .import("B")
        .import("Base");

        assert_eq!(
            errors_of(&program),
            vec![
                SemanticError::IncompatibleAssignment {
                    target: "n".to_string(),
                    expected: Type::int(),
                    found: Type::boolean(),
                },
                SemanticError::UndeclaredVariable { name: "missing".to_string() },
            ]
        );
    }

    #[test]
    fn test_array_assign() {
        let program = single_method(
            MethodDecl::new("m", TypeExpr::Void)
                .local(TypeExpr::Int, "n")
                .local(TypeExpr::int_array(), "arr")
                .stmt(Stmt::array_assign("n", Expr::int(0), Expr::int(1)))
                .stmt(Stmt::array_assign("arr", Expr::boolean(true), Expr::boolean(false))),
        );
        assert_eq!(
            errors_of(&program),
            vec![
                SemanticError::NotAnArray { name: "n".to_string() },
                SemanticError::IndexNotInt { found: Type::boolean() },
                SemanticError::IncompatibleAssignment {
                    target: "arr[]".to_string(),
                    expected: Type::int(),
                    found: Type::boolean(),
                },
            ]
        );
    }

    #[test]
    fn test_return_rules() {
        let program = Program::new(
            ClassDecl::new("Foo")
                .method(MethodDecl::new("a", TypeExpr::Int).stmt(Stmt::ret(Expr::boolean(true))))
                .method(MethodDecl::new("b", TypeExpr::Int).stmt(Stmt::ret_void()))
                .method(MethodDecl::new("c", TypeExpr::Void).stmt(Stmt::ret(Expr::int(1)))),
        );
        assert_eq!(
            errors_of(&program),
            vec![
                SemanticError::ReturnType { expected: Type::int(), found: Type::boolean() },
                SemanticError::MissingReturnValue { expected: Type::int() },
                SemanticError::VoidReturnsValue { method: "c".to_string() },
            ]
        );
    }

    #[test]
    fn test_static_context_assignment() {
        let program = single_method(MethodDecl::main().stmt(Stmt::assign("count", Expr::int(1))));
        assert_eq!(
            errors_of(&program),
            vec![SemanticError::InstanceMemberInStaticContext { name: "count".to_string() }]
        );
    }

    #[test]
    fn test_unreachable_code_is_a_warning() {
        let program = single_method(
            MethodDecl::new("m", TypeExpr::Int)
                .stmt(Stmt::ret(Expr::int(1)))
                .stmt(Stmt::expr(Expr::int(2)).at(7, 3)),
        );
        let (_, diags) = analyze(&program);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].span(), Span::new(7, 3));
    }

    #[test]
    fn test_every_rule_contributes() {
        let program = single_method(
            MethodDecl::new("m", TypeExpr::Void)
                .local(TypeExpr::Int, "x")
                .local(TypeExpr::Int, "x")
                .stmt(Stmt::assign("x", Expr::boolean(true)))
                .stmt(Stmt::expr(Expr::binary(BinOp::Mul, Expr::boolean(true), Expr::int(2)))),
        );
        assert_eq!(errors_of(&program).len(), 3);
    }
}
