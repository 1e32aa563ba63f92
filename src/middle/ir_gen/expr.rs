//! Expression lowering
//!
//! Every expression becomes an operand plus the instructions that must run
//! before the operand is valid.

use super::{label, MethodLowering};
use crate::frontend::ast::{BinOp, Expr, ExprKind, TypeExpr};
use crate::frontend::resolver::Name;
use crate::frontend::symbol_table::{resolve_type, MethodSignature, VarScope};
use crate::middle::ir::{Call, CallKind, Cond, Instruction, Operand, Place, Rvalue, UnaryOp};
use crate::types::Type;
use crate::utils::{Error, Result, Span};

/// Class given to receivers that come back from external calls
const OPAQUE_CLASS: &str = "Object";

/// Lowered expression
#[derive(Debug, Clone, PartialEq)]
pub struct ExprResult {
    pub operand: Operand,
    pub code: Vec<Instruction>,
}

impl ExprResult {
    pub fn new(operand: Operand, code: Vec<Instruction>) -> Self {
        Self { operand, code }
    }

    fn operand(operand: Operand) -> Self {
        Self::new(operand, Vec::new())
    }
}

/// Who receives a call and how it is dispatched
struct Dispatch<'s> {
    kind: CallKind,
    receiver: Operand,
    /// Signature, when the callee is a method of the current class
    callee: Option<&'s MethodSignature>,
}

impl<'a, 'c> MethodLowering<'a, 'c> {
    /// Lower an expression
    pub fn lower_expr(&mut self, expr: &Expr) -> Result<ExprResult> {
        self.lower_expr_expecting(expr, None)
    }

    /// Lower an expression whose value flows into a slot of type `expected`.
    ///
    /// The expected type only matters for calls to external methods, whose
    /// return type is otherwise unknown.
    pub fn lower_expr_expecting(
        &mut self,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Result<ExprResult> {
        match &expr.kind {
            ExprKind::IntLiteral(n) => Ok(ExprResult::operand(Operand::int(*n))),
            ExprKind::BoolLiteral(b) => Ok(ExprResult::operand(Operand::boolean(*b))),
            ExprKind::This => Ok(ExprResult::operand(self.this())),
            ExprKind::Var(name) => self.lower_var(name, expr.span),
            ExprKind::Not(operand) => {
                let inner = self.lower_expr_expecting(operand, Some(&Type::boolean()))?;
                let mut code = inner.code;
                let (dest, result) = self.temp(&Type::boolean());
                code.push(Instruction::Assign {
                    dest,
                    ty: Type::boolean(),
                    value: Rvalue::Unary { op: UnaryOp::Not, operand: inner.operand },
                });
                Ok(ExprResult::new(result, code))
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            ExprKind::ArrayAccess { array, index } => {
                let array = self.lower_expr_expecting(array, Some(&Type::int_array()))?;
                let index = self.lower_expr_expecting(index, Some(&Type::int()))?;
                let elem = array.operand.ty().element();

                let mut code = array.code;
                code.extend(index.code);
                let (dest, result) = self.temp(&elem);
                code.push(Instruction::Assign {
                    dest,
                    ty: elem,
                    value: Rvalue::Element { array: array.operand, index: index.operand },
                });
                Ok(ExprResult::new(result, code))
            }
            ExprKind::ArrayLiteral(elements) => {
                let ty = self.types.resolve(expr);
                let elem = if ty.is_array { ty.element() } else { Type::int() };
                self.pack_array(&elem, elements)
            }
            ExprKind::NewArray { elem, size } => self.lower_new_array(elem, size),
            ExprKind::NewObject(class) => {
                let (code, result) = self.construct(class);
                Ok(ExprResult::new(result, code))
            }
            ExprKind::Length(operand) => {
                let array = self.lower_expr_expecting(operand, Some(&Type::int_array()))?;
                let mut code = array.code;
                let (dest, result) = self.temp(&Type::int());
                code.push(Instruction::Assign {
                    dest,
                    ty: Type::int(),
                    value: Rvalue::Call(Call {
                        kind: CallKind::ArrayLength,
                        receiver: array.operand,
                        method: None,
                        args: Vec::new(),
                        ret: Type::int(),
                    }),
                });
                Ok(ExprResult::new(result, code))
            }
            ExprKind::Call { receiver, method, args } => {
                let ret_hint = expected.cloned().unwrap_or_else(Type::int);
                let (call, mut code) =
                    self.lower_call(receiver.as_deref(), method, args, ret_hint, expr.span)?;
                let ret = call.ret.clone();
                let (dest, result) = self.temp(&ret);
                code.push(Instruction::Assign { dest, ty: ret, value: Rvalue::Call(call) });
                Ok(ExprResult::new(result, code))
            }
        }
    }

    fn lower_var(&mut self, name: &str, span: Span) -> Result<ExprResult> {
        match self.types.lookup_name(name) {
            Name::Variable(VarScope::Field, sym) => {
                let (dest, result) = self.temp(&sym.ty);
                let code = vec![Instruction::Assign {
                    dest,
                    ty: sym.ty.clone(),
                    value: Rvalue::GetField { field: name.to_string(), ty: sym.ty.clone() },
                }];
                Ok(ExprResult::new(result, code))
            }
            Name::Variable(_, sym) => Ok(ExprResult::operand(Operand::var(name, sym.ty.clone()))),
            Name::Import => Ok(ExprResult::operand(Operand::var(name, Type::class(name)))),
            Name::Unresolved => {
                Err(Error::invalid_tree(format!("undeclared variable `{}`", name), span))
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<ExprResult> {
        match op {
            BinOp::And => self.lower_and(lhs, rhs),
            BinOp::Or => self.lower_or(lhs, rhs),
            _ if op.is_relational() => self.lower_comparison(op, lhs, rhs),
            _ => {
                let left = self.lower_expr_expecting(lhs, Some(&Type::int()))?;
                let right = self.lower_expr_expecting(rhs, Some(&Type::int()))?;
                let mut code = left.code;
                code.extend(right.code);
                let (dest, result) = self.temp(&Type::int());
                code.push(Instruction::Assign {
                    dest,
                    ty: Type::int(),
                    value: Rvalue::Binary { op, left: left.operand, right: right.operand },
                });
                Ok(ExprResult::new(result, code))
            }
        }
    }

    /// Operands of a relational operator, lowered left to right
    pub(super) fn lower_compare_operands(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<(Cond, Vec<Instruction>)> {
        let left = self.lower_expr_expecting(lhs, Some(&Type::int()))?;
        let right = self.lower_expr_expecting(rhs, Some(&Type::int()))?;
        let mut code = left.code;
        code.extend(right.code);
        Ok((Cond::Compare { op, left: left.operand, right: right.operand }, code))
    }

    /// `l < r` as a value: branch to a block that stores true, fall through
    /// to one that stores false.
    fn lower_comparison(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<ExprResult> {
        let (cond, mut code) = self.lower_compare_operands(op, lhs, rhs)?;
        let n = self.ctx.cond_label();
        let (when_true, end) = (label("cmptrue", n), label("cmpend", n));
        let (dest, result) = self.temp(&Type::boolean());

        code.push(Instruction::CondGoto { cond, target: when_true.clone() });
        code.push(assign_bool(&dest, Operand::boolean(false)));
        code.push(Instruction::Goto(end.clone()));
        code.push(Instruction::Label(when_true));
        code.push(assign_bool(&dest, Operand::boolean(true)));
        code.push(Instruction::Label(end));
        Ok(ExprResult::new(result, code))
    }

    /// `l && r`: the right operand runs only when `l` is true
    fn lower_and(&mut self, lhs: &Expr, rhs: &Expr) -> Result<ExprResult> {
        let left = self.lower_expr_expecting(lhs, Some(&Type::boolean()))?;
        let n = self.ctx.cond_label();
        let (eval_rhs, end) = (label("andrhs", n), label("andend", n));
        let (dest, result) = self.temp(&Type::boolean());

        let mut code = left.code;
        code.push(Instruction::CondGoto {
            cond: Cond::Truthy(left.operand),
            target: eval_rhs.clone(),
        });
        code.push(assign_bool(&dest, Operand::boolean(false)));
        code.push(Instruction::Goto(end.clone()));
        code.push(Instruction::Label(eval_rhs));
        let right = self.lower_expr_expecting(rhs, Some(&Type::boolean()))?;
        code.extend(right.code);
        code.push(assign_bool(&dest, right.operand));
        code.push(Instruction::Label(end));
        Ok(ExprResult::new(result, code))
    }

    /// `l || r`: the right operand runs only when `l` is false
    fn lower_or(&mut self, lhs: &Expr, rhs: &Expr) -> Result<ExprResult> {
        let left = self.lower_expr_expecting(lhs, Some(&Type::boolean()))?;
        let n = self.ctx.cond_label();
        let (when_true, end) = (label("ortrue", n), label("orend", n));
        let (dest, result) = self.temp(&Type::boolean());

        let mut code = left.code;
        code.push(Instruction::CondGoto {
            cond: Cond::Truthy(left.operand),
            target: when_true.clone(),
        });
        let right = self.lower_expr_expecting(rhs, Some(&Type::boolean()))?;
        code.extend(right.code);
        code.push(assign_bool(&dest, right.operand));
        code.push(Instruction::Goto(end.clone()));
        code.push(Instruction::Label(when_true));
        code.push(assign_bool(&dest, Operand::boolean(true)));
        code.push(Instruction::Label(end));
        Ok(ExprResult::new(result, code))
    }

    fn lower_new_array(&mut self, elem: &TypeExpr, size: &Expr) -> Result<ExprResult> {
        let size = self.lower_expr_expecting(size, Some(&Type::int()))?;
        let elem = resolve_type(elem);
        let ty = elem.array_of();
        let mut code = size.code;
        let (dest, result) = self.temp(&ty);
        code.push(Instruction::Assign {
            dest,
            ty,
            value: Rvalue::NewArray { elem, size: size.operand },
        });
        Ok(ExprResult::new(result, code))
    }

    /// Allocate an array of `elements.len()` and store each element in order
    fn pack_array(&mut self, elem: &Type, elements: &[Expr]) -> Result<ExprResult> {
        let size = i32::try_from(elements.len())
            .map_err(|_| Error::invalid_tree("array literal too long", Span::dummy()))?;
        let ty = elem.array_of();
        let (dest, array) = self.temp(&ty);
        let mut code = vec![Instruction::Assign {
            dest,
            ty,
            value: Rvalue::NewArray { elem: elem.clone(), size: Operand::int(size) },
        }];

        for (index, element) in (0..size).zip(elements) {
            let value = self.lower_expr_expecting(element, Some(elem))?;
            code.extend(value.code);
            code.push(Instruction::Assign {
                dest: Place::Element {
                    array: array.clone(),
                    index: Operand::int(index),
                    ty: elem.clone(),
                },
                ty: elem.clone(),
                value: Rvalue::Use(value.operand),
            });
        }
        Ok(ExprResult::new(array, code))
    }

    /// `new C()`: allocate, then run the constructor on the new object
    fn construct(&mut self, class: &str) -> (Vec<Instruction>, Operand) {
        let ty = Type::class(class);
        let (dest, object) = self.temp(&ty);
        let code = vec![
            Instruction::Assign {
                dest,
                ty: ty.clone(),
                value: Rvalue::Call(Call {
                    kind: CallKind::New,
                    receiver: Operand::var(class, ty.clone()),
                    method: None,
                    args: Vec::new(),
                    ret: ty,
                }),
            },
            Instruction::Call(Call {
                kind: CallKind::Special,
                receiver: object.clone(),
                method: Some("<init>".to_string()),
                args: Vec::new(),
                ret: Type::void(),
            }),
        ];
        (code, object)
    }

    /// Lower receiver and arguments of a call and build the call itself.
    ///
    /// `ret_hint` is the return type assumed for methods outside the class.
    pub(super) fn lower_call(
        &mut self,
        receiver: Option<&Expr>,
        method: &str,
        args: &[Expr],
        ret_hint: Type,
        span: Span,
    ) -> Result<(Call, Vec<Instruction>)> {
        let mut code = Vec::new();
        let dispatch = self.dispatch(receiver, method, &mut code, span)?;

        let ret = match dispatch.callee {
            Some(sig) => sig.return_type.clone(),
            None => ret_hint,
        };
        let args = match dispatch.callee {
            Some(sig) => self.lower_arguments(sig, args, &mut code)?,
            None => {
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    let hint = self.types.resolve(arg);
                    let arg = self.lower_expr_expecting(arg, Some(&hint).filter(|t| !t.is_any()))?;
                    code.extend(arg.code);
                    lowered.push(arg.operand);
                }
                lowered
            }
        };

        let call = Call {
            kind: dispatch.kind,
            receiver: dispatch.receiver,
            method: Some(method.to_string()),
            args,
            ret,
        };
        Ok((call, code))
    }

    fn dispatch(
        &mut self,
        receiver: Option<&Expr>,
        method: &str,
        code: &mut Vec<Instruction>,
        span: Span,
    ) -> Result<Dispatch<'a>> {
        let table = self.table;
        let own = || Operand::var(table.class_name(), Type::class(table.class_name()));

        let receiver = match receiver {
            None => None,
            Some(Expr { kind: ExprKind::This, .. }) => None,
            Some(expr) => Some(expr),
        };

        // Implicit or explicit `this`
        let Some(receiver) = receiver else {
            return Ok(match table.method(method) {
                Some(sig) if sig.is_static => {
                    Dispatch { kind: CallKind::Static, receiver: own(), callee: Some(sig) }
                }
                Some(sig) => {
                    Dispatch { kind: CallKind::Virtual, receiver: self.this(), callee: Some(sig) }
                }
                None if table.superclass().is_some() => {
                    Dispatch { kind: CallKind::Virtual, receiver: self.this(), callee: None }
                }
                None => Dispatch { kind: CallKind::Static, receiver: own(), callee: None },
            });
        };

        if let ExprKind::Var(name) = &receiver.kind {
            if self.types.lookup_name(name) == Name::Import {
                return Ok(Dispatch {
                    kind: CallKind::Static,
                    receiver: Operand::var(name, Type::class(name.as_str())),
                    callee: None,
                });
            }
        }

        let hint = self.receiver_hint(receiver);
        let object = self.lower_expr_expecting(receiver, Some(&hint))?;
        code.extend(object.code);
        let ty = object.operand.ty().clone();
        if !ty.is_class() {
            return Err(Error::UnclassifiableCall { method: method.to_string(), span });
        }
        let callee = if ty.name == table.class_name() { table.method(method) } else { None };
        Ok(Dispatch { kind: CallKind::Virtual, receiver: object.operand, callee })
    }

    /// Type assumed for a receiver whose own type is unknown, such as the
    /// result of an external call
    fn receiver_hint(&mut self, receiver: &Expr) -> Type {
        let ty = self.types.resolve(receiver);
        if ty.is_class() {
            ty
        } else {
            Type::class(OPAQUE_CLASS)
        }
    }

    /// Arguments for a method of the current class, packing varargs when the
    /// call site does not pass the array itself
    fn lower_arguments(
        &mut self,
        sig: &MethodSignature,
        args: &[Expr],
        code: &mut Vec<Instruction>,
    ) -> Result<Vec<Operand>> {
        let packs = sig.has_varargs && args.len() != sig.params.len();
        let fixed = if packs { sig.fixed_arity().min(args.len()) } else { args.len() };

        let mut lowered = Vec::with_capacity(sig.params.len());
        for (i, arg) in args[..fixed].iter().enumerate() {
            let arg = self.lower_expr_expecting(arg, sig.params.get(i).map(|p| &p.ty))?;
            code.extend(arg.code);
            lowered.push(arg.operand);
        }

        if let Some(elem) = sig.varargs_element().filter(|_| packs) {
            let packed = self.pack_array(&elem, &args[fixed..])?;
            code.extend(packed.code);
            lowered.push(packed.operand);
        }
        Ok(lowered)
    }
}

fn assign_bool(dest: &Place, value: Operand) -> Instruction {
    Instruction::Assign { dest: dest.clone(), ty: Type::boolean(), value: Rvalue::Use(value) }
}
