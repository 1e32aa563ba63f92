//! Abstract Syntax Tree definitions for Jmm
//!
//! The tree is produced by an external parser and handed over either directly
//! or as JSON in the serde shape of these types. Every syntactic category is a
//! closed enum, so each pass matches exhaustively over the forms it handles.
//!
//! The builder helpers (`Expr::int`, `MethodDecl::new(..).param(..)`, ...)
//! exist for front ends that build trees in Rust and for tests.

use crate::utils::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete compilation unit: imports followed by exactly one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub imports: Vec<ImportDecl>,
    pub class: ClassDecl,
}

/// `import a.b.C;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Qualified path segments, outermost first
    pub path: Vec<String>,
    #[serde(default)]
    pub span: Span,
}

impl ImportDecl {
    /// The significant identifier of the import (its last segment)
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// The dotted path as written in source
    pub fn qualified(&self) -> String {
        self.path.join(".")
    }
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub fields: Vec<VarDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub span: Span,
}

/// Field or local variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub ty: TypeExpr,
    pub name: String,
    #[serde(default)]
    pub span: Span,
}

/// Method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub ty: TypeExpr,
    pub name: String,
    #[serde(default)]
    pub span: Span,
}

/// Method definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_static: bool,
    pub return_type: TypeExpr,
    #[serde(default)]
    pub params: Vec<Param>,
    /// Trailing `T... name` parameter; `ty` is the element type
    #[serde(default)]
    pub varargs: Option<Param>,
    #[serde(default)]
    pub locals: Vec<VarDecl>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

/// Syntactic type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeExpr {
    Int,
    Boolean,
    Void,
    String,
    Array(Box<TypeExpr>),
    /// Bare identifier naming a class
    Named(String),
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `{ ... }`
    Block {
        stmts: Vec<Stmt>,
        #[serde(default)]
        span: Span,
    },

    /// `if (cond) then_branch else else_branch`
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Box<Stmt>,
        #[serde(default)]
        span: Span,
    },

    /// `while (cond) body`
    While {
        cond: Expr,
        body: Box<Stmt>,
        #[serde(default)]
        span: Span,
    },

    /// `expr;`
    Expr {
        expr: Expr,
        #[serde(default)]
        span: Span,
    },

    /// `target = value;`
    Assign {
        target: String,
        value: Expr,
        #[serde(default)]
        span: Span,
    },

    /// `target[index] = value;`
    ArrayAssign {
        target: String,
        index: Expr,
        value: Expr,
        #[serde(default)]
        span: Span,
    },

    /// `return value;`
    Return {
        value: Option<Expr>,
        #[serde(default)]
        span: Span,
    },
}

/// Expression node: a form plus its source position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

/// Expression forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    IntLiteral(i32),
    BoolLiteral(bool),
    This,
    /// Bare identifier: variable, field or import name
    Var(String),
    /// `!operand`
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `array[index]`
    ArrayAccess { array: Box<Expr>, index: Box<Expr> },
    /// `[e1, e2, ...]`
    ArrayLiteral(Vec<Expr>),
    /// `new T[size]`
    NewArray { elem: TypeExpr, size: Box<Expr> },
    /// `new C()`
    NewObject(String),
    /// `operand.length`
    Length(Box<Expr>),
    /// `receiver.method(args)`; no receiver means an implicit `this`
    Call {
        receiver: Option<Box<Expr>>,
        method: String,
        args: Vec<Expr>,
    },
}

impl ExprKind {
    /// Name of the form, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExprKind::IntLiteral(_) => "IntegerLiteral",
            ExprKind::BoolLiteral(_) => "BooleanLiteral",
            ExprKind::This => "This",
            ExprKind::Var(_) => "VarRef",
            ExprKind::Not(_) => "Negation",
            ExprKind::Binary { .. } => "BinaryOp",
            ExprKind::ArrayAccess { .. } => "ArrayAccess",
            ExprKind::ArrayLiteral(_) => "ArrayLiteral",
            ExprKind::NewArray { .. } => "NewArray",
            ExprKind::NewObject(_) => "NewObject",
            ExprKind::Length(_) => "Length",
            ExprKind::Call { .. } => "MethodCall",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Gt)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ==================== Builders ====================

impl Program {
    pub fn new(class: ClassDecl) -> Self {
        Self { imports: Vec::new(), class }
    }

    pub fn import(mut self, path: &str) -> Self {
        self.imports.push(ImportDecl {
            path: path.split('.').map(str::to_string).collect(),
            span: Span::dummy(),
        });
        self
    }

    pub fn import_at(mut self, path: &str, line: u32, column: u32) -> Self {
        self.imports.push(ImportDecl {
            path: path.split('.').map(str::to_string).collect(),
            span: Span::new(line, column),
        });
        self
    }
}

impl ClassDecl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            superclass: None,
            fields: Vec::new(),
            methods: Vec::new(),
            span: Span::dummy(),
        }
    }

    pub fn extends(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    pub fn field(mut self, ty: TypeExpr, name: &str) -> Self {
        self.fields.push(VarDecl::new(ty, name));
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

impl VarDecl {
    pub fn new(ty: TypeExpr, name: &str) -> Self {
        Self { ty, name: name.to_string(), span: Span::dummy() }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

impl MethodDecl {
    pub fn new(name: &str, return_type: TypeExpr) -> Self {
        Self {
            name: name.to_string(),
            is_public: true,
            is_static: false,
            return_type,
            params: Vec::new(),
            varargs: None,
            locals: Vec::new(),
            body: Vec::new(),
            span: Span::dummy(),
        }
    }

    /// `public static void main(String[] args)` with an empty body
    pub fn main() -> Self {
        let mut main = Self::new("main", TypeExpr::Void)
            .param(TypeExpr::Array(Box::new(TypeExpr::String)), "args");
        main.is_static = true;
        main
    }

    pub fn make_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn param(mut self, ty: TypeExpr, name: &str) -> Self {
        self.params.push(Param { ty, name: name.to_string(), span: Span::dummy() });
        self
    }

    pub fn param_at(mut self, ty: TypeExpr, name: &str, line: u32, column: u32) -> Self {
        self.params.push(Param { ty, name: name.to_string(), span: Span::new(line, column) });
        self
    }

    /// Trailing `elem... name` parameter
    pub fn varargs(mut self, elem: TypeExpr, name: &str) -> Self {
        self.varargs = Some(Param { ty: elem, name: name.to_string(), span: Span::dummy() });
        self
    }

    pub fn local(mut self, ty: TypeExpr, name: &str) -> Self {
        self.locals.push(VarDecl::new(ty, name));
        self
    }

    pub fn local_at(mut self, ty: TypeExpr, name: &str, line: u32, column: u32) -> Self {
        self.locals.push(VarDecl::new(ty, name).at(line, column));
        self
    }

    pub fn stmt(mut self, stmt: Stmt) -> Self {
        self.body.push(stmt);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

impl TypeExpr {
    pub fn int_array() -> Self {
        TypeExpr::Array(Box::new(TypeExpr::Int))
    }

    pub fn named(name: &str) -> Self {
        TypeExpr::Named(name.to_string())
    }
}

impl Stmt {
    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Block { stmts, span: Span::dummy() }
    }

    pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Stmt) -> Self {
        Stmt::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            span: Span::dummy(),
        }
    }

    pub fn while_loop(cond: Expr, body: Stmt) -> Self {
        Stmt::While { cond, body: Box::new(body), span: Span::dummy() }
    }

    pub fn expr(expr: Expr) -> Self {
        let span = expr.span;
        Stmt::Expr { expr, span }
    }

    pub fn assign(target: &str, value: Expr) -> Self {
        Stmt::Assign { target: target.to_string(), value, span: Span::dummy() }
    }

    pub fn array_assign(target: &str, index: Expr, value: Expr) -> Self {
        Stmt::ArrayAssign {
            target: target.to_string(),
            index,
            value,
            span: Span::dummy(),
        }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return { value: Some(value), span: Span::dummy() }
    }

    pub fn ret_void() -> Self {
        Stmt::Return { value: None, span: Span::dummy() }
    }

    pub fn span(&self) -> Span {
        match self {
            Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::ArrayAssign { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }

    /// Set the source position of the statement
    pub fn at(mut self, line: u32, column: u32) -> Self {
        let new_span = Span::new(line, column);
        match &mut self {
            Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::ArrayAssign { span, .. }
            | Stmt::Return { span, .. } => *span = new_span,
        }
        self
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, span: Span::dummy() }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn int(value: i32) -> Self {
        Self::new(ExprKind::IntLiteral(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::BoolLiteral(value))
    }

    pub fn this() -> Self {
        Self::new(ExprKind::This)
    }

    pub fn var(name: &str) -> Self {
        Self::new(ExprKind::Var(name.to_string()))
    }

    pub fn not(operand: Expr) -> Self {
        Self::new(ExprKind::Not(Box::new(operand)))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn index(array: Expr, index: Expr) -> Self {
        Self::new(ExprKind::ArrayAccess { array: Box::new(array), index: Box::new(index) })
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Self::new(ExprKind::ArrayLiteral(elements))
    }

    pub fn new_int_array(size: Expr) -> Self {
        Self::new(ExprKind::NewArray { elem: TypeExpr::Int, size: Box::new(size) })
    }

    pub fn new_object(class: &str) -> Self {
        Self::new(ExprKind::NewObject(class.to_string()))
    }

    pub fn length(operand: Expr) -> Self {
        Self::new(ExprKind::Length(Box::new(operand)))
    }

    /// Call with an implicit `this` receiver
    pub fn call(method: &str, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call { receiver: None, method: method.to_string(), args })
    }

    pub fn method_call(receiver: Expr, method: &str, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            receiver: Some(Box::new(receiver)),
            method: method.to_string(),
            args,
        })
    }

    /// Literal value, if this node is a literal
    pub fn as_literal(&self) -> Option<Literal> {
        match self.kind {
            ExprKind::IntLiteral(n) => Some(Literal::Int(n)),
            ExprKind::BoolLiteral(b) => Some(Literal::Bool(b)),
            _ => None,
        }
    }
}

/// Value of a literal node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Int(i32),
    Bool(bool),
}

impl From<Literal> for ExprKind {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Int(n) => ExprKind::IntLiteral(n),
            Literal::Bool(b) => ExprKind::BoolLiteral(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_name_is_last_segment() {
        let program = Program::new(ClassDecl::new("Foo")).import("java.io.Printer");
        assert_eq!(program.imports[0].name(), "Printer");
        assert_eq!(program.imports[0].qualified(), "java.io.Printer");
    }

    #[test]
    fn test_stmt_at_sets_span() {
        let stmt = Stmt::ret_void().at(4, 9);
        assert_eq!(stmt.span(), Span::new(4, 9));
    }

    #[test]
    fn test_deserialize_minimal_tree() {
        let json = r#"{
            "class": {
                "name": "Foo",
                "methods": [{
                    "name": "get",
                    "return_type": "Int",
                    "body": [{ "Return": {
                        "value": { "kind": { "IntLiteral": 7 }, "span": { "line": 2, "column": 16 } },
                        "span": { "line": 2, "column": 9 }
                    } }]
                }]
            }
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert!(program.imports.is_empty());
        assert_eq!(program.class.methods[0].name, "get");
        assert_eq!(program.class.methods[0].body[0].span(), Span::new(2, 9));
    }

    #[test]
    fn test_statement_positions_are_optional() {
        let json = r#"{
            "class": {
                "name": "Foo",
                "methods": [{
                    "name": "get",
                    "is_public": true,
                    "return_type": "Int",
                    "locals": [{ "ty": "Int", "name": "x" }],
                    "body": [
                        { "Assign": { "target": "x", "value": { "kind": { "IntLiteral": 7 } } } },
                        { "While": {
                            "cond": { "kind": { "BoolLiteral": false } },
                            "body": { "Block": { "stmts": [] } }
                        } },
                        { "Return": { "value": { "kind": { "Var": "x" } } } }
                    ]
                }]
            }
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        let expected = MethodDecl::new("get", TypeExpr::Int)
            .local(TypeExpr::Int, "x")
            .stmt(Stmt::assign("x", Expr::int(7)))
            .stmt(Stmt::while_loop(Expr::boolean(false), Stmt::block(vec![])))
            .stmt(Stmt::ret(Expr::var("x")));
        assert_eq!(program.class.methods[0], expected);
    }

    #[test]
    fn test_positioned_builders() {
        let program = Program::new(ClassDecl::new("Foo")).import_at("a.b.Io", 1, 1);
        assert_eq!(program.imports[0].span, Span::new(1, 1));
        assert_eq!(program.imports[0].path, vec!["a", "b", "Io"]);

        let method = MethodDecl::new("m", TypeExpr::Void).param_at(TypeExpr::Int, "n", 3, 12);
        assert_eq!(method.params[0].span, Span::new(3, 12));
        assert_eq!(method.params[0].ty, TypeExpr::Int);
    }
}
