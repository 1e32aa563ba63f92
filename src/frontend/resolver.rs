//! Static type resolution of expressions
//!
//! `resolve` is total over every expression form. A sub-expression that
//! cannot be resolved yields [`Type::any`] together with exactly one report;
//! every rule accepts `Any`, so ancestors of a broken sub-expression stay quiet.

use crate::feedback::{Diagnostic, SemanticError};
use crate::frontend::ast::{BinOp, Expr, ExprKind};
use crate::frontend::symbol_table::{resolve_type, MethodSignature, Symbol, SymbolTable, VarScope};
use crate::types::{is_assignable, Type};
use crate::utils::Span;

/// What a bare identifier refers to inside a method body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Name<'a> {
    Variable(VarScope, &'a Symbol),
    /// An imported class, used as an opaque type
    Import,
    Unresolved,
}

/// How a call site's receiver was classified
#[derive(Debug, Clone, PartialEq)]
enum CallTarget {
    /// Implicit `this`, `this`, or a value of the current class
    OwnClass,
    /// Imported, superclass or other class-typed receiver
    External,
    /// The receiver already failed to resolve
    Unknown,
    /// A primitive or array receiver
    Invalid(Type),
}

/// Operand type and result type of a binary operator
pub fn operator_signature(op: BinOp) -> (Type, Type) {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => (Type::int(), Type::int()),
        BinOp::Lt | BinOp::Gt => (Type::int(), Type::boolean()),
        BinOp::And | BinOp::Or => (Type::boolean(), Type::boolean()),
    }
}

/// Resolves expression types within one method
pub struct TypeResolver<'a> {
    table: &'a SymbolTable,
    method: &'a MethodSignature,
    reports: Vec<Diagnostic>,
    record: bool,
}

impl<'a> TypeResolver<'a> {
    /// A resolver that records diagnostics
    pub fn new(table: &'a SymbolTable, method: &'a MethodSignature) -> Self {
        Self { table, method, reports: Vec::new(), record: true }
    }

    /// A resolver for already validated trees; reports are dropped
    pub fn silent(table: &'a SymbolTable, method: &'a MethodSignature) -> Self {
        Self { table, method, reports: Vec::new(), record: false }
    }

    pub fn method(&self) -> &'a MethodSignature {
        self.method
    }

    /// Drain the diagnostics recorded so far
    pub fn take_reports(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.reports)
    }

    /// Look up a bare identifier: local, then parameter, then field, then import
    pub fn lookup_name(&self, name: &str) -> Name<'a> {
        if let Some((scope, sym)) = self.table.lookup_variable(self.method, name) {
            return Name::Variable(scope, sym);
        }
        if self.table.is_imported(name) {
            return Name::Import;
        }
        Name::Unresolved
    }

    /// Static type of `expr`
    pub fn resolve(&mut self, expr: &Expr) -> Type {
        let span = expr.span;
        match &expr.kind {
            ExprKind::IntLiteral(_) => Type::int(),
            ExprKind::BoolLiteral(_) => Type::boolean(),
            ExprKind::This => self.resolve_this(span),
            ExprKind::Var(name) => self.resolve_var(name, span),
            ExprKind::Not(operand) => {
                let ty = self.resolve(operand);
                if !ty.accepts(&Type::boolean()) {
                    self.report(span, SemanticError::InvalidNegation { found: ty });
                }
                Type::boolean()
            }
            ExprKind::Binary { op, lhs, rhs } => self.resolve_binary(*op, lhs, rhs, span),
            ExprKind::ArrayAccess { array, index } => {
                let base = self.resolve(array);
                let index_ty = self.resolve(index);
                if !index_ty.accepts(&Type::int()) {
                    self.report(index.span, SemanticError::IndexNotInt { found: index_ty });
                }
                if base.is_any() {
                    return Type::any();
                }
                if !base.is_array {
                    self.report(span, SemanticError::IndexedNonArray { found: base });
                    return Type::any();
                }
                base.element()
            }
            ExprKind::ArrayLiteral(elements) => self.resolve_array_literal(elements),
            ExprKind::NewArray { elem, size } => {
                let size_ty = self.resolve(size);
                if !size_ty.accepts(&Type::int()) {
                    self.report(size.span, SemanticError::ArraySizeNotInt { found: size_ty });
                }
                resolve_type(elem).array_of()
            }
            ExprKind::NewObject(class) => Type::class(class.as_str()),
            ExprKind::Length(operand) => {
                let ty = self.resolve(operand);
                if !ty.is_any() && !ty.is_array {
                    self.report(span, SemanticError::LengthOfNonArray { found: ty });
                }
                Type::int()
            }
            ExprKind::Call { receiver, method, args } => {
                self.resolve_call(receiver.as_deref(), method, args, span)
            }
        }
    }

    /// Type of the variable written by an assignment to `name`.
    ///
    /// Imports are not storage, so they count as undeclared here.
    pub fn resolve_target(&mut self, name: &str, span: Span) -> Type {
        match self.lookup_name(name) {
            Name::Import => {
                self.report(span, SemanticError::UndeclaredVariable { name: name.to_string() });
                Type::any()
            }
            _ => self.resolve_var(name, span),
        }
    }

    fn resolve_this(&mut self, span: Span) -> Type {
        if self.method.is_static {
            self.report(
                span,
                SemanticError::InstanceMemberInStaticContext { name: "this".to_string() },
            );
            return Type::any();
        }
        Type::class(self.table.class_name())
    }

    fn resolve_var(&mut self, name: &str, span: Span) -> Type {
        match self.lookup_name(name) {
            Name::Variable(VarScope::Field, _) if self.method.is_static => {
                self.report(
                    span,
                    SemanticError::InstanceMemberInStaticContext { name: name.to_string() },
                );
                Type::any()
            }
            Name::Variable(_, sym) => sym.ty.clone(),
            Name::Import => Type::class(name),
            Name::Unresolved => {
                self.report(span, SemanticError::UndeclaredVariable { name: name.to_string() });
                Type::any()
            }
        }
    }

    fn resolve_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, span: Span) -> Type {
        let lhs_ty = self.resolve(lhs);
        let rhs_ty = self.resolve(rhs);
        let (operand, result) = operator_signature(op);

        if lhs_ty.accepts(&operand) && rhs_ty.accepts(&operand) {
            return result;
        }
        self.report(
            span,
            SemanticError::InvalidOperands {
                op: op.symbol().to_string(),
                lhs_kind: lhs.kind.kind_name().to_string(),
                lhs: lhs_ty,
                rhs_kind: rhs.kind.kind_name().to_string(),
                rhs: rhs_ty,
            },
        );
        Type::any()
    }

    fn resolve_array_literal(&mut self, elements: &[Expr]) -> Type {
        let mut elem = Type::any();
        let mut consistent = true;
        for element in elements {
            let ty = self.resolve(element);
            if elem.is_any() {
                elem = ty;
            } else if !ty.accepts(&elem) {
                self.report(
                    element.span,
                    SemanticError::MixedArrayElements { expected: elem.clone(), found: ty },
                );
                consistent = false;
            }
        }
        if elements.is_empty() {
            return Type::int_array();
        }
        if !consistent || elem.is_any() {
            return Type::any();
        }
        elem.array_of()
    }

    fn resolve_call(
        &mut self,
        receiver: Option<&Expr>,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Type {
        match self.call_target(receiver) {
            CallTarget::OwnClass => self.resolve_own_method(receiver.is_none(), method, args, span),
            CallTarget::External | CallTarget::Unknown => {
                self.resolve_all(args);
                Type::any()
            }
            CallTarget::Invalid(found) => {
                self.report(
                    span,
                    SemanticError::CallOnNonObject { method: method.to_string(), found },
                );
                self.resolve_all(args);
                Type::any()
            }
        }
    }

    fn call_target(&mut self, receiver: Option<&Expr>) -> CallTarget {
        let Some(receiver) = receiver else {
            return CallTarget::OwnClass;
        };
        let ty = self.resolve(receiver);
        if ty.is_any() {
            CallTarget::Unknown
        } else if !ty.is_class() {
            CallTarget::Invalid(ty)
        } else if ty.name == self.table.class_name() {
            CallTarget::OwnClass
        } else {
            CallTarget::External
        }
    }

    fn resolve_own_method(
        &mut self,
        implicit_this: bool,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> Type {
        let table = self.table;
        let Some(sig) = table.method(name) else {
            self.resolve_all(args);
            // Any import may provide the callee, so an unknown name is accepted.
            if !table.has_imports() {
                self.report(span, SemanticError::UndeclaredMethod { name: name.to_string() });
            }
            return Type::any();
        };

        if implicit_this && self.method.is_static && !sig.is_static {
            self.report(
                span,
                SemanticError::InstanceMemberInStaticContext { name: name.to_string() },
            );
        }
        self.check_arguments(sig, args, span);
        sig.return_type.clone()
    }

    fn check_arguments(&mut self, sig: &MethodSignature, args: &[Expr], span: Span) {
        let found: Vec<Type> = args.iter().map(|a| self.resolve(a)).collect();
        let fixed = sig.fixed_arity();

        let arity_ok = if sig.has_varargs {
            found.len() >= fixed
        } else {
            found.len() == fixed
        };
        if !arity_ok {
            self.report(
                span,
                SemanticError::ArgumentCount {
                    method: sig.name.clone(),
                    expected: fixed,
                    found: found.len(),
                },
            );
            return;
        }

        for (position, (ty, param)) in found.iter().zip(&sig.params[..fixed]).enumerate() {
            if !is_assignable(self.table, &param.ty, ty) {
                self.argument_type(sig, position, &param.ty, ty, args[position].span);
            }
        }

        let Some(elem) = sig.varargs_element() else {
            return;
        };
        let trailing = &found[fixed..];
        if trailing.len() == 1 {
            // One argument fills the slot itself and must already be the array.
            let slot = &sig.params[fixed].ty;
            if !trailing[0].accepts(slot) {
                self.argument_type(sig, fixed, slot, &trailing[0], args[fixed].span);
            }
        } else {
            for (offset, ty) in trailing.iter().enumerate() {
                if !ty.accepts(&elem) {
                    let position = fixed + offset;
                    self.argument_type(sig, position, &elem, ty, args[position].span);
                }
            }
        }
    }

    fn argument_type(
        &mut self,
        sig: &MethodSignature,
        position: usize,
        expected: &Type,
        found: &Type,
        span: Span,
    ) {
        self.report(
            span,
            SemanticError::ArgumentType {
                method: sig.name.clone(),
                position: position + 1,
                expected: expected.clone(),
                found: found.clone(),
            },
        );
    }

    fn resolve_all(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.resolve(expr);
        }
    }

    fn report(&mut self, span: Span, error: SemanticError) {
        if self.record {
            self.reports.push(Diagnostic::error(span, error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{ClassDecl, MethodDecl, Program, TypeExpr};
    use pretty_assertions::assert_eq;

    fn program(method: MethodDecl) -> Program {
        Program::new(
            ClassDecl::new("Foo")
                .field(TypeExpr::Boolean, "x")
                .field(TypeExpr::Int, "count")
                .method(method)
                .method(
                    MethodDecl::new("sum", TypeExpr::Int)
                        .param(TypeExpr::Int, "first")
                        .varargs(TypeExpr::Int, "rest"),
                )
                .method(
                    MethodDecl::new("pair", TypeExpr::Boolean)
                        .param(TypeExpr::Int, "a")
                        .param(TypeExpr::Boolean, "b"),
                ),
        )
    }

    fn resolve_in(program: &Program, method: &str, expr: &Expr) -> (Type, Vec<SemanticError>) {
        let table = SymbolTable::build(program);
        let sig = table.method(method).unwrap();
        let mut resolver = TypeResolver::new(&table, sig);
        let ty = resolver.resolve(expr);
        let errors = resolver.take_reports().into_iter().map(|d| d.error).collect();
        (ty, errors)
    }

    fn resolve(expr: &Expr) -> (Type, Vec<SemanticError>) {
        let p = program(
            MethodDecl::new("m", TypeExpr::Void)
                .param(TypeExpr::int_array(), "arr")
                .local(TypeExpr::Int, "x"),
        );
        resolve_in(&p, "m", expr)
    }

    #[test]
    fn test_local_shadows_field() {
        let (ty, errors) = resolve(&Expr::var("x"));
        assert_eq!(ty, Type::int());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_parameter_shadows_field() {
        let p = program(
            MethodDecl::new("m", TypeExpr::Void).param(TypeExpr::int_array(), "count"),
        );
        let (ty, _) = resolve_in(&p, "m", &Expr::var("count"));
        assert_eq!(ty, Type::int_array());
    }

    #[test]
    fn test_operator_table() {
        let int = || Expr::int(1);
        let boolean = || Expr::boolean(true);
        let cases = [
            (BinOp::Add, int(), int(), Type::int()),
            (BinOp::Sub, int(), int(), Type::int()),
            (BinOp::Mul, int(), int(), Type::int()),
            (BinOp::Div, int(), int(), Type::int()),
            (BinOp::Rem, int(), int(), Type::int()),
            (BinOp::Lt, int(), int(), Type::boolean()),
            (BinOp::Gt, int(), int(), Type::boolean()),
            (BinOp::And, boolean(), boolean(), Type::boolean()),
            (BinOp::Or, boolean(), boolean(), Type::boolean()),
        ];
        for (op, lhs, rhs, expected) in cases {
            let (ty, errors) = resolve(&Expr::binary(op, lhs, rhs));
            assert_eq!(ty, expected, "{}", op);
            assert!(errors.is_empty());
        }
    }

    #[test]
    fn test_operator_mismatch_reports_once() {
        for op in [BinOp::Add, BinOp::Lt, BinOp::And] {
            let (ty, errors) = resolve(&Expr::binary(op, Expr::int(1), Expr::boolean(true)));
            assert!(ty.is_any());
            assert_eq!(errors.len(), 1);
        }
        let (_, errors) = resolve(&Expr::binary(BinOp::Add, Expr::int(1), Expr::boolean(true)));
        assert_eq!(
            errors[0].to_string(),
            "operator + not valid for IntegerLiteral (int) and BooleanLiteral (boolean)"
        );
    }

    #[test]
    fn test_unresolved_operand_reports_only_itself() {
        let expr = Expr::binary(
            BinOp::Lt,
            Expr::binary(BinOp::Add, Expr::var("missing"), Expr::int(1)),
            Expr::int(2),
        );
        let (ty, errors) = resolve(&expr);
        assert_eq!(ty, Type::boolean());
        assert_eq!(errors, vec![SemanticError::UndeclaredVariable { name: "missing".to_string() }]);
    }

    #[test]
    fn test_array_access_and_length() {
        let (ty, errors) = resolve(&Expr::index(Expr::var("arr"), Expr::int(0)));
        assert_eq!(ty, Type::int());
        assert!(errors.is_empty());

        let (ty, errors) = resolve(&Expr::index(Expr::var("x"), Expr::boolean(true)));
        assert!(ty.is_any());
        assert_eq!(errors.len(), 2);

        let (ty, errors) = resolve(&Expr::length(Expr::var("x")));
        assert_eq!(ty, Type::int());
        assert_eq!(errors, vec![SemanticError::LengthOfNonArray { found: Type::int() }]);
    }

    #[test]
    fn test_array_literal() {
        let (ty, errors) = resolve(&Expr::array(vec![Expr::int(1), Expr::int(2)]));
        assert_eq!(ty, Type::int_array());
        assert!(errors.is_empty());

        let (ty, errors) = resolve(&Expr::array(vec![Expr::int(1), Expr::boolean(false)]));
        assert!(ty.is_any());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_new_object_and_imports() {
        let (ty, _) = resolve(&Expr::new_object("Bar"));
        assert_eq!(ty, Type::class("Bar"));

        let p = program(MethodDecl::new("m", TypeExpr::Void)).import("io");
        let (ty, errors) = resolve_in(&p, "m", &Expr::var("io"));
        assert_eq!(ty, Type::class("io"));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_own_method_call() {
        let call = Expr::call("pair", vec![Expr::int(1), Expr::boolean(true)]);
        let (ty, errors) = resolve(&call);
        assert_eq!(ty, Type::boolean());
        assert!(errors.is_empty());

        let call = Expr::call("pair", vec![Expr::int(1)]);
        let (_, errors) = resolve(&call);
        assert_eq!(
            errors,
            vec![SemanticError::ArgumentCount { method: "pair".to_string(), expected: 2, found: 1 }]
        );
    }

    #[test]
    fn test_undeclared_method_suppressed_by_import() {
        let call = Expr::method_call(Expr::this(), "missing", vec![]);
        let (ty, errors) = resolve(&call);
        assert!(ty.is_any());
        assert_eq!(errors, vec![SemanticError::UndeclaredMethod { name: "missing".to_string() }]);

        let p = program(MethodDecl::new("m", TypeExpr::Void)).import("io");
        let (_, errors) = resolve_in(&p, "m", &call);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_varargs_arguments() {
        let loose = Expr::call("sum", vec![Expr::int(1), Expr::int(2), Expr::int(3)]);
        let (ty, errors) = resolve(&loose);
        assert_eq!(ty, Type::int());
        assert!(errors.is_empty());

        let prebuilt = Expr::call("sum", vec![Expr::int(1), Expr::var("arr")]);
        assert!(resolve(&prebuilt).1.is_empty());

        let none = Expr::call("sum", vec![Expr::int(1)]);
        assert!(resolve(&none).1.is_empty());

        let literal_in_slot = Expr::call("sum", vec![Expr::int(1), Expr::int(2)]);
        assert_eq!(
            resolve(&literal_in_slot).1,
            vec![SemanticError::ArgumentType {
                method: "sum".to_string(),
                position: 2,
                expected: Type::int_array(),
                found: Type::int(),
            }]
        );

        let wrong_loose = Expr::call("sum", vec![Expr::int(1), Expr::int(2), Expr::boolean(true)]);
        assert_eq!(resolve(&wrong_loose).1.len(), 1);

        let too_few = Expr::call("sum", vec![]);
        assert_eq!(resolve(&too_few).1.len(), 1);
    }

    #[test]
    fn test_call_on_primitive() {
        let call = Expr::method_call(Expr::var("x"), "foo", vec![]);
        let (ty, errors) = resolve(&call);
        assert!(ty.is_any());
        assert_eq!(
            errors,
            vec![SemanticError::CallOnNonObject { method: "foo".to_string(), found: Type::int() }]
        );
    }

    #[test]
    fn test_static_context() {
        let p = program(MethodDecl::main());
        let (ty, errors) = resolve_in(&p, "main", &Expr::var("count"));
        assert!(ty.is_any());
        assert_eq!(
            errors,
            vec![SemanticError::InstanceMemberInStaticContext { name: "count".to_string() }]
        );

        let (_, errors) = resolve_in(&p, "main", &Expr::this());
        assert_eq!(errors.len(), 1);

        let (_, errors) = resolve_in(&p, "main", &Expr::call("pair", vec![Expr::int(1), Expr::boolean(true)]));
        assert_eq!(errors.len(), 1);

        let instance = Expr::method_call(
            Expr::new_object("Foo"),
            "pair",
            vec![Expr::int(1), Expr::boolean(true)],
        );
        let (ty, errors) = resolve_in(&p, "main", &instance);
        assert_eq!(ty, Type::boolean());
        assert!(errors.is_empty());
    }
}
