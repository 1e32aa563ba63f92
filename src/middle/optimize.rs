//! AST Optimizer for Jmm
//!
//! Both passes run on the checked tree, before lowering, and are pure
//! rewrites: the input tree is never modified and every replaced node keeps
//! the original span.
//!
//! - Constant propagation substitutes locals whose value is a known literal.
//! - Constant folding evaluates literal-only sub-expressions.

use std::collections::{HashMap, HashSet};

use crate::frontend::ast::{BinOp, Expr, ExprKind, Literal, MethodDecl, Program, Stmt};
use log::debug;

/// Literal value of each local known at the current point
type Known = HashMap<String, Literal>;

// ==================== Constant Propagation ====================

/// Replaces reads of locals holding a known literal with that literal
#[derive(Debug, Default)]
pub struct ConstantPropagation {
    folder: ConstantFolding,
    propagated: usize,
}

impl ConstantPropagation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variable reads replaced so far
    pub fn propagated(&self) -> usize {
        self.propagated
    }

    pub fn propagate_program(&mut self, program: &Program) -> Program {
        let mut class = program.class.clone();
        class.methods = program.class.methods.iter().map(|m| self.propagate_method(m)).collect();
        debug!("constant propagation replaced {} read(s) in {}", self.propagated, class.name);
        Program { imports: program.imports.clone(), class }
    }

    fn propagate_method(&mut self, method: &MethodDecl) -> MethodDecl {
        // Only locals: fields change behind calls, parameters are never known
        let locals: HashSet<&str> = method.locals.iter().map(|l| l.name.as_str()).collect();
        let mut known = Known::new();
        let body = method
            .body
            .iter()
            .map(|s| self.propagate_stmt(s, &locals, &mut known))
            .collect();
        MethodDecl { body, ..method.clone() }
    }

    fn propagate_stmt(&mut self, stmt: &Stmt, locals: &HashSet<&str>, known: &mut Known) -> Stmt {
        match stmt {
            Stmt::Block { stmts, span } => Stmt::Block {
                stmts: stmts.iter().map(|s| self.propagate_stmt(s, locals, known)).collect(),
                span: *span,
            },
            Stmt::If { cond, then_branch, else_branch, span } => {
                let cond = self.substitute(cond, known);
                let mut then_known = known.clone();
                let then_branch = self.propagate_stmt(then_branch, locals, &mut then_known);
                let mut else_known = known.clone();
                let else_branch = self.propagate_stmt(else_branch, locals, &mut else_known);

                // Keep what both paths agree on
                then_known.retain(|name, value| else_known.get(name) == Some(&*value));
                *known = then_known;
                Stmt::If {
                    cond,
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                    span: *span,
                }
            }
            Stmt::While { cond, body, span } => {
                // Anything the body writes is unknown at the head of every iteration
                let mut written = HashSet::new();
                assigned_in(body, &mut written);
                known.retain(|name, _| !written.contains(name.as_str()));

                let cond = self.substitute(cond, known);
                let body = self.propagate_stmt(body, locals, &mut known.clone());
                Stmt::While { cond, body: Box::new(body), span: *span }
            }
            Stmt::Expr { expr, span } => Stmt::Expr { expr: self.substitute(expr, known), span: *span },
            Stmt::Assign { target, value, span } => {
                let value = self.substitute(value, known);
                if !locals.contains(target.as_str()) {
                    return Stmt::Assign { target: target.clone(), value, span: *span };
                }
                let folded = self.folder.fold_expr(&value);
                match folded.value {
                    Some(literal) => known.insert(target.clone(), literal),
                    None => known.remove(target),
                };
                Stmt::Assign { target: target.clone(), value: folded.expr, span: *span }
            }
            Stmt::ArrayAssign { target, index, value, span } => Stmt::ArrayAssign {
                target: target.clone(),
                index: self.substitute(index, known),
                value: self.substitute(value, known),
                span: *span,
            },
            Stmt::Return { value, span } => Stmt::Return {
                value: value.as_ref().map(|v| self.substitute(v, known)),
                span: *span,
            },
        }
    }

    fn substitute(&mut self, expr: &Expr, known: &Known) -> Expr {
        let kind = match &expr.kind {
            ExprKind::Var(name) => match known.get(name) {
                Some(literal) => {
                    self.propagated += 1;
                    (*literal).into()
                }
                None => expr.kind.clone(),
            },
            ExprKind::Not(operand) => ExprKind::Not(Box::new(self.substitute(operand, known))),
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: Box::new(self.substitute(lhs, known)),
                rhs: Box::new(self.substitute(rhs, known)),
            },
            ExprKind::ArrayAccess { array, index } => ExprKind::ArrayAccess {
                array: Box::new(self.substitute(array, known)),
                index: Box::new(self.substitute(index, known)),
            },
            ExprKind::ArrayLiteral(elements) => {
                ExprKind::ArrayLiteral(elements.iter().map(|e| self.substitute(e, known)).collect())
            }
            ExprKind::NewArray { elem, size } => ExprKind::NewArray {
                elem: elem.clone(),
                size: Box::new(self.substitute(size, known)),
            },
            ExprKind::Length(operand) => ExprKind::Length(Box::new(self.substitute(operand, known))),
            ExprKind::Call { receiver, method, args } => ExprKind::Call {
                receiver: receiver.as_ref().map(|r| Box::new(self.substitute(r, known))),
                method: method.clone(),
                args: args.iter().map(|a| self.substitute(a, known)).collect(),
            },
            ExprKind::IntLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::This
            | ExprKind::NewObject(_) => expr.kind.clone(),
        };
        Expr { kind, span: expr.span }
    }
}

/// Collect every variable assigned anywhere inside `stmt`
fn assigned_in<'s>(stmt: &'s Stmt, written: &mut HashSet<&'s str>) {
    match stmt {
        Stmt::Block { stmts, .. } => stmts.iter().for_each(|s| assigned_in(s, written)),
        Stmt::If { then_branch, else_branch, .. } => {
            assigned_in(then_branch, written);
            assigned_in(else_branch, written);
        }
        Stmt::While { body, .. } => assigned_in(body, written),
        Stmt::Assign { target, .. } => {
            written.insert(target.as_str());
        }
        Stmt::Expr { .. } | Stmt::ArrayAssign { .. } | Stmt::Return { .. } => {}
    }
}

// ==================== Constant Folding ====================

/// Folds constant expressions at compile time
#[derive(Debug, Default)]
pub struct ConstantFolding {
    folded: usize,
}

/// Rewritten expression plus its value when it reduced to a literal
struct Folded {
    expr: Expr,
    value: Option<Literal>,
}

impl ConstantFolding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes replaced so far
    pub fn folded(&self) -> usize {
        self.folded
    }

    pub fn fold_program(&mut self, program: &Program) -> Program {
        let mut class = program.class.clone();
        class.methods = program.class.methods.iter().map(|m| self.fold_method(m)).collect();
        debug!("constant folding replaced {} node(s) in {}", self.folded, class.name);
        Program { imports: program.imports.clone(), class }
    }

    fn fold_method(&mut self, method: &MethodDecl) -> MethodDecl {
        MethodDecl {
            body: method.body.iter().map(|s| self.fold_stmt(s)).collect(),
            ..method.clone()
        }
    }

    fn fold_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Block { stmts, span } => Stmt::Block {
                stmts: stmts.iter().map(|s| self.fold_stmt(s)).collect(),
                span: *span,
            },
            Stmt::If { cond, then_branch, else_branch, span } => {
                let cond = self.fold_expr(cond);
                match cond.value {
                    Some(Literal::Bool(true)) => {
                        self.folded += 1;
                        self.fold_stmt(then_branch)
                    }
                    Some(Literal::Bool(false)) => {
                        self.folded += 1;
                        self.fold_stmt(else_branch)
                    }
                    _ => Stmt::If {
                        cond: cond.expr,
                        then_branch: Box::new(self.fold_stmt(then_branch)),
                        else_branch: Box::new(self.fold_stmt(else_branch)),
                        span: *span,
                    },
                }
            }
            Stmt::While { cond, body, span } => {
                let cond = self.fold_expr(cond);
                if cond.value == Some(Literal::Bool(false)) {
                    self.folded += 1;
                    return Stmt::Block { stmts: Vec::new(), span: *span };
                }
                Stmt::While { cond: cond.expr, body: Box::new(self.fold_stmt(body)), span: *span }
            }
            Stmt::Expr { expr, span } => Stmt::Expr { expr: self.fold_expr(expr).expr, span: *span },
            Stmt::Assign { target, value, span } => Stmt::Assign {
                target: target.clone(),
                value: self.fold_expr(value).expr,
                span: *span,
            },
            Stmt::ArrayAssign { target, index, value, span } => Stmt::ArrayAssign {
                target: target.clone(),
                index: self.fold_expr(index).expr,
                value: self.fold_expr(value).expr,
                span: *span,
            },
            Stmt::Return { value, span } => Stmt::Return {
                value: value.as_ref().map(|v| self.fold_expr(v).expr),
                span: *span,
            },
        }
    }

    fn fold_expr(&mut self, expr: &Expr) -> Folded {
        let span = expr.span;
        let kind = match &expr.kind {
            ExprKind::IntLiteral(_) | ExprKind::BoolLiteral(_) => {
                return Folded { expr: expr.clone(), value: expr.as_literal() };
            }
            ExprKind::Not(operand) => {
                let operand = self.fold_expr(operand);
                if let Some(Literal::Bool(b)) = operand.value {
                    return self.literal(Literal::Bool(!b), expr);
                }
                ExprKind::Not(Box::new(operand.expr))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.fold_expr(lhs);
                // A literal left operand already decides these
                match (op, lhs.value) {
                    (BinOp::And, Some(decided @ Literal::Bool(false)))
                    | (BinOp::Or, Some(decided @ Literal::Bool(true))) => {
                        return self.literal(decided, expr);
                    }
                    _ => {}
                }
                let rhs = self.fold_expr(rhs);
                if let (Some(l), Some(r)) = (lhs.value, rhs.value) {
                    if let Some(value) = Self::fold_binop(*op, l, r) {
                        return self.literal(value, expr);
                    }
                }
                ExprKind::Binary { op: *op, lhs: Box::new(lhs.expr), rhs: Box::new(rhs.expr) }
            }
            ExprKind::ArrayAccess { array, index } => ExprKind::ArrayAccess {
                array: Box::new(self.fold_expr(array).expr),
                index: Box::new(self.fold_expr(index).expr),
            },
            ExprKind::ArrayLiteral(elements) => {
                ExprKind::ArrayLiteral(elements.iter().map(|e| self.fold_expr(e).expr).collect())
            }
            ExprKind::NewArray { elem, size } => ExprKind::NewArray {
                elem: elem.clone(),
                size: Box::new(self.fold_expr(size).expr),
            },
            ExprKind::Length(operand) => ExprKind::Length(Box::new(self.fold_expr(operand).expr)),
            ExprKind::Call { receiver, method, args } => ExprKind::Call {
                receiver: receiver.as_ref().map(|r| Box::new(self.fold_expr(r).expr)),
                method: method.clone(),
                args: args.iter().map(|a| self.fold_expr(a).expr).collect(),
            },
            ExprKind::This | ExprKind::Var(_) | ExprKind::NewObject(_) => expr.kind.clone(),
        };
        Folded { expr: Expr { kind, span }, value: None }
    }

    fn literal(&mut self, value: Literal, original: &Expr) -> Folded {
        self.folded += 1;
        Folded { expr: Expr { kind: value.into(), span: original.span }, value: Some(value) }
    }

    /// Division by zero and overflow are left for run time
    fn fold_binop(op: BinOp, left: Literal, right: Literal) -> Option<Literal> {
        match (left, right) {
            (Literal::Int(l), Literal::Int(r)) => {
                let result = match op {
                    BinOp::Add => l.checked_add(r)?,
                    BinOp::Sub => l.checked_sub(r)?,
                    BinOp::Mul => l.checked_mul(r)?,
                    BinOp::Div => l.checked_div(r)?,
                    BinOp::Rem => l.checked_rem(r)?,
                    BinOp::Lt => return Some(Literal::Bool(l < r)),
                    BinOp::Gt => return Some(Literal::Bool(l > r)),
                    BinOp::And | BinOp::Or => return None,
                };
                Some(Literal::Int(result))
            }
            (Literal::Bool(l), Literal::Bool(r)) => {
                let result = match op {
                    BinOp::And => l && r,
                    BinOp::Or => l || r,
                    _ => return None,
                };
                Some(Literal::Bool(result))
            }
            _ => None,
        }
    }
}

/// Fold every constant sub-expression of `program` into a new tree
pub fn fold_constants(program: &Program) -> Program {
    ConstantFolding::new().fold_program(program)
}

/// Substitute known local values into a new tree
pub fn propagate_constants(program: &Program) -> Program {
    ConstantPropagation::new().propagate_program(program)
}
