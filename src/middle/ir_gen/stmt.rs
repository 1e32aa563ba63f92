//! Statement and control-flow lowering

use super::{label, MethodLowering};
use crate::frontend::ast::{Expr, ExprKind, Stmt};
use crate::frontend::resolver::Name;
use crate::frontend::symbol_table::VarScope;
use crate::middle::ir::{Cond, Instruction, Operand, Place, Rvalue};
use crate::types::Type;
use crate::utils::{Error, Result, Span};

impl<'a, 'c> MethodLowering<'a, 'c> {
    /// Lower a statement
    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Result<Vec<Instruction>> {
        match stmt {
            Stmt::Block { stmts, .. } => {
                let mut code = Vec::new();
                for stmt in stmts {
                    code.extend(self.lower_stmt(stmt)?);
                }
                Ok(code)
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.lower_if(cond, then_branch, else_branch)
            }
            Stmt::While { cond, body, .. } => self.lower_while(cond, body),
            Stmt::Expr { expr, span } => self.lower_expr_stmt(expr, *span),
            Stmt::Assign { target, value, span } => self.lower_assign(target, value, *span),
            Stmt::ArrayAssign { target, index, value, span } => {
                self.lower_array_assign(target, index, value, *span)
            }
            Stmt::Return { value, .. } => {
                let ret = self.method.return_type.clone();
                match value {
                    Some(value) => {
                        let value = self.lower_expr_expecting(value, Some(&ret))?;
                        let mut code = value.code;
                        code.push(Instruction::Return { value: Some(value.operand), ty: ret });
                        Ok(code)
                    }
                    None => Ok(vec![Instruction::Return { value: None, ty: Type::void() }]),
                }
            }
        }
    }

    /// Branch condition for `if`/`while`. Relational conditions branch on the
    /// comparison directly instead of materializing a boolean first.
    fn lower_condition(&mut self, cond: &Expr) -> Result<(Cond, Vec<Instruction>)> {
        if let ExprKind::Binary { op, lhs, rhs } = &cond.kind {
            if op.is_relational() {
                return self.lower_compare_operands(*op, lhs, rhs);
            }
        }
        let value = self.lower_expr_expecting(cond, Some(&Type::boolean()))?;
        Ok((Cond::Truthy(value.operand), value.code))
    }

    /// The else branch falls through first; the then branch sits behind
    /// `ifbody_N`.
    fn lower_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: &Stmt) -> Result<Vec<Instruction>> {
        let n = self.ctx.if_label();
        let (body, end) = (label("ifbody", n), label("endif", n));

        let (cond, mut code) = self.lower_condition(cond)?;
        code.push(Instruction::CondGoto { cond, target: body.clone() });
        code.extend(self.lower_stmt(else_branch)?);
        code.push(Instruction::Goto(end.clone()));
        code.push(Instruction::Label(body));
        code.extend(self.lower_stmt(then_branch)?);
        code.push(Instruction::Label(end));
        Ok(code)
    }

    fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> Result<Vec<Instruction>> {
        let n = self.ctx.while_label();
        let (head, body_label, end) =
            (label("loop", n), label("whilebody", n), label("endwhile", n));

        let mut code = vec![Instruction::Label(head.clone())];
        let (cond, cond_code) = self.lower_condition(cond)?;
        code.extend(cond_code);
        code.push(Instruction::CondGoto { cond, target: body_label.clone() });
        code.push(Instruction::Goto(end.clone()));
        code.push(Instruction::Label(body_label));
        code.extend(self.lower_stmt(body)?);
        code.push(Instruction::Goto(head));
        code.push(Instruction::Label(end));
        Ok(code)
    }

    /// Calls in statement position discard their result; other expressions
    /// keep only their side effects.
    fn lower_expr_stmt(&mut self, expr: &Expr, span: Span) -> Result<Vec<Instruction>> {
        if let ExprKind::Call { receiver, method, args } = &expr.kind {
            let (call, mut code) =
                self.lower_call(receiver.as_deref(), method, args, Type::void(), span)?;
            code.push(Instruction::Call(call));
            return Ok(code);
        }
        Ok(self.lower_expr(expr)?.code)
    }

    fn lower_assign(&mut self, target: &str, value: &Expr, span: Span) -> Result<Vec<Instruction>> {
        let (scope, ty) = match self.types.lookup_name(target) {
            Name::Variable(scope, sym) => (scope, sym.ty.clone()),
            Name::Import | Name::Unresolved => {
                return Err(Error::invalid_tree(format!("cannot assign to `{}`", target), span));
            }
        };

        let value = self.lower_expr_expecting(value, Some(&ty))?;
        let mut code = value.code;
        if scope == VarScope::Field {
            code.push(Instruction::PutField {
                field: target.to_string(),
                ty,
                value: value.operand,
            });
        } else {
            code.push(Instruction::Assign {
                dest: Place::Var { name: target.to_string(), ty: ty.clone() },
                ty,
                value: Rvalue::Use(value.operand),
            });
        }
        Ok(code)
    }

    fn lower_array_assign(
        &mut self,
        target: &str,
        index: &Expr,
        value: &Expr,
        span: Span,
    ) -> Result<Vec<Instruction>> {
        let array = self.lower_expr(&Expr { kind: ExprKind::Var(target.to_string()), span })?;
        let elem = array.operand.ty().element();
        if !array.operand.ty().is_array {
            return Err(Error::invalid_tree(format!("`{}` is not an array", target), span));
        }

        let index = self.lower_expr_expecting(index, Some(&Type::int()))?;
        let value = self.lower_expr_expecting(value, Some(&elem))?;
        let mut code = array.code;
        code.extend(index.code);
        code.extend(value.code);
        code.push(Instruction::Assign {
            dest: Place::Element { array: array.operand, index: index.operand, ty: elem.clone() },
            ty: elem,
            value: Rvalue::Use(value.operand),
        });
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::ast::{BinOp, ClassDecl, Expr, MethodDecl, Program, Stmt, TypeExpr};
    use crate::frontend::symbol_table::SymbolTable;
    use crate::middle::ir::{Call, CallKind, Cond, Instruction, Label, Operand, Place, Rvalue};
    use crate::middle::ir_gen::IRGenerator;
    use crate::types::Type;
    use pretty_assertions::assert_eq;

    fn lower(method: MethodDecl) -> Vec<Instruction> {
        lower_in(ClassDecl::new("Foo").field(TypeExpr::Int, "count").method(method))
    }

    fn lower_in(class: ClassDecl) -> Vec<Instruction> {
        let program = Program::new(class);
        let table = SymbolTable::build(&program);
        let module = IRGenerator::new(&table).generate(&program).unwrap();
        module.methods[0].body.clone()
    }

    fn int_var(name: &str) -> Operand {
        Operand::var(name, Type::int())
    }

    fn label(name: &str) -> Label {
        Label(name.to_string())
    }

    #[test]
    fn test_if_else_emits_else_branch_first() {
        let body = lower(
            MethodDecl::new("m", TypeExpr::Void)
                .local(TypeExpr::Boolean, "x")
                .local(TypeExpr::Int, "y")
                .stmt(Stmt::if_else(
                    Expr::var("x"),
                    Stmt::assign("y", Expr::int(1)),
                    Stmt::assign("y", Expr::int(2)),
                )),
        );
        let assign = |n| Instruction::Assign {
            dest: Place::Var { name: "y".to_string(), ty: Type::int() },
            ty: Type::int(),
            value: Rvalue::Use(Operand::int(n)),
        };
        assert_eq!(
            body,
            vec![
                Instruction::CondGoto {
                    cond: Cond::Truthy(Operand::var("x", Type::boolean())),
                    target: label("ifbody_0"),
                },
                assign(2),
                Instruction::Goto(label("endif_0")),
                Instruction::Label(label("ifbody_0")),
                assign(1),
                Instruction::Label(label("endif_0")),
                Instruction::Return { value: None, ty: Type::void() },
            ]
        );
    }

    #[test]
    fn test_while_loop_shape() {
        let body = lower(
            MethodDecl::new("m", TypeExpr::Void)
                .local(TypeExpr::Int, "i")
                .stmt(Stmt::while_loop(
                    Expr::binary(BinOp::Lt, Expr::var("i"), Expr::int(10)),
                    Stmt::assign("i", Expr::binary(BinOp::Add, Expr::var("i"), Expr::int(1))),
                )),
        );
        assert_eq!(
            body,
            vec![
                Instruction::Label(label("loop_0")),
                Instruction::CondGoto {
                    cond: Cond::Compare { op: BinOp::Lt, left: int_var("i"), right: Operand::int(10) },
                    target: label("whilebody_0"),
                },
                Instruction::Goto(label("endwhile_0")),
                Instruction::Label(label("whilebody_0")),
                Instruction::Assign {
                    dest: Place::Temp { id: 0, ty: Type::int() },
                    ty: Type::int(),
                    value: Rvalue::Binary { op: BinOp::Add, left: int_var("i"), right: Operand::int(1) },
                },
                Instruction::Assign {
                    dest: Place::Var { name: "i".to_string(), ty: Type::int() },
                    ty: Type::int(),
                    value: Rvalue::Use(Operand::Temp { id: 0, ty: Type::int() }),
                },
                Instruction::Goto(label("loop_0")),
                Instruction::Label(label("endwhile_0")),
                Instruction::Return { value: None, ty: Type::void() },
            ]
        );
    }

    #[test]
    fn test_field_assignment_uses_putfield() {
        let body = lower(MethodDecl::new("m", TypeExpr::Void).stmt(Stmt::assign("count", Expr::int(3))));
        assert_eq!(
            body[0],
            Instruction::PutField { field: "count".to_string(), ty: Type::int(), value: Operand::int(3) }
        );
    }

    #[test]
    fn test_array_assign() {
        let body = lower(
            MethodDecl::new("m", TypeExpr::Void)
                .param(TypeExpr::int_array(), "a")
                .stmt(Stmt::array_assign("a", Expr::int(0), Expr::int(5))),
        );
        assert_eq!(
            body[0],
            Instruction::Assign {
                dest: Place::Element {
                    array: Operand::var("a", Type::int_array()),
                    index: Operand::int(0),
                    ty: Type::int(),
                },
                ty: Type::int(),
                value: Rvalue::Use(Operand::int(5)),
            }
        );
    }

    #[test]
    fn test_import_call_statement_is_static_void() {
        let program_class = ClassDecl::new("Foo").method(
            MethodDecl::new("m", TypeExpr::Void)
                .stmt(Stmt::expr(Expr::method_call(Expr::var("io"), "println", vec![Expr::int(1)]))),
        );
        let program = Program::new(program_class).import("io");
        let table = SymbolTable::build(&program);
        let module = IRGenerator::new(&table).generate(&program).unwrap();
        assert_eq!(
            module.methods[0].body[0],
            Instruction::Call(Call {
                kind: CallKind::Static,
                receiver: Operand::var("io", Type::class("io")),
                method: Some("println".to_string()),
                args: vec![Operand::int(1)],
                ret: Type::void(),
            })
        );
    }

    #[test]
    fn test_external_call_takes_type_of_assignment_target() {
        let program_class = ClassDecl::new("Foo").method(
            MethodDecl::new("m", TypeExpr::Void)
                .local(TypeExpr::Boolean, "b")
                .stmt(Stmt::assign("b", Expr::method_call(Expr::var("io"), "read", vec![]))),
        );
        let program = Program::new(program_class).import("io");
        let table = SymbolTable::build(&program);
        let module = IRGenerator::new(&table).generate(&program).unwrap();
        match &module.methods[0].body[0] {
            Instruction::Assign { ty, value: Rvalue::Call(call), .. } => {
                assert_eq!(ty, &Type::boolean());
                assert_eq!(call.kind, CallKind::Static);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_return_carries_declared_type() {
        let body = lower(
            MethodDecl::new("get", TypeExpr::Boolean)
                .stmt(Stmt::ret(Expr::binary(BinOp::And, Expr::boolean(true), Expr::boolean(false)))),
        );
        match body.last() {
            Some(Instruction::Return { value: Some(Operand::Temp { .. }), ty }) => {
                assert_eq!(ty, &Type::boolean())
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(body.iter().filter(|i| i.is_return()).count(), 1);
    }

    #[test]
    fn test_undeclared_target_is_a_lowering_fault() {
        let program = Program::new(
            ClassDecl::new("Foo")
                .method(MethodDecl::new("m", TypeExpr::Void).stmt(Stmt::assign("ghost", Expr::int(1)))),
        );
        let table = SymbolTable::build(&program);
        let err = IRGenerator::new(&table).generate(&program).unwrap_err();
        assert!(matches!(err, crate::utils::Error::InvalidTree { .. }));
    }
}
