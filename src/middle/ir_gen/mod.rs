//! IR Generator - AST to Jmm IR
//!
//! Converts a checked AST into three-address code. Lowering assumes the tree
//! was accepted by the semantic analyzer; anything it cannot translate is an
//! [`Error`](crate::utils::Error), never a diagnostic.
//!
//! Temporary ids and label numbers come from one [`LoweringContext`] per
//! compilation unit, so they never repeat across the methods of a class.

mod expr;
mod stmt;

pub use expr::ExprResult;

use crate::frontend::ast::{MethodDecl, Program};
use crate::frontend::resolver::TypeResolver;
use crate::frontend::symbol_table::{MethodSignature, SymbolTable};
use crate::middle::ir::{IRMethod, IRModule, Instruction, Label, Operand, Place};
use crate::types::Type;
use crate::utils::Result;
use log::{debug, trace};

/// Counters shared by every method of one compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoweringContext {
    next_temp: usize,
    next_if: usize,
    next_while: usize,
    next_cond: usize,
}

impl LoweringContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh temporary id
    pub fn temp_id(&mut self) -> usize {
        let id = self.next_temp;
        self.next_temp += 1;
        trace!("allocated temporary {}", id);
        id
    }

    /// Number for an `ifbody_N`/`endif_N` pair
    pub fn if_label(&mut self) -> usize {
        Self::bump(&mut self.next_if, "if")
    }

    /// Number for a `loop_N`/`whilebody_N`/`endwhile_N` triple
    pub fn while_label(&mut self) -> usize {
        Self::bump(&mut self.next_while, "while")
    }

    /// Number for labels that materialize comparisons and logical operators
    pub fn cond_label(&mut self) -> usize {
        Self::bump(&mut self.next_cond, "cond")
    }

    pub fn temps_allocated(&self) -> usize {
        self.next_temp
    }

    fn bump(counter: &mut usize, family: &str) -> usize {
        let n = *counter;
        *counter += 1;
        trace!("allocated {} label {}", family, n);
        n
    }
}

/// IR Generator for one compilation unit
pub struct IRGenerator<'a> {
    table: &'a SymbolTable,
    ctx: LoweringContext,
}

impl<'a> IRGenerator<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self::with_context(table, LoweringContext::new())
    }

    pub fn with_context(table: &'a SymbolTable, ctx: LoweringContext) -> Self {
        Self { table, ctx }
    }

    pub fn context(&self) -> &LoweringContext {
        &self.ctx
    }

    /// Generate IR for a program
    pub fn generate(&mut self, program: &Program) -> Result<IRModule> {
        let table = self.table;
        let mut methods = Vec::with_capacity(program.class.methods.len());
        for (decl, sig) in program.class.methods.iter().zip(table.signatures()) {
            methods.push(self.generate_method(decl, sig)?);
        }

        debug!(
            "lowered {} method(s) of {} using {} temporaries",
            methods.len(),
            table.class_name(),
            self.ctx.temps_allocated()
        );
        Ok(IRModule {
            class_name: table.class_name().to_string(),
            superclass: table.superclass().map(str::to_string),
            imports: table.imports().to_vec(),
            fields: table.fields().to_vec(),
            methods,
        })
    }

    /// Generate IR for a method
    fn generate_method(&mut self, decl: &MethodDecl, sig: &MethodSignature) -> Result<IRMethod> {
        let mut lowering = MethodLowering::new(self.table, sig, &mut self.ctx);
        let mut body = Vec::new();
        for stmt in &decl.body {
            body.extend(lowering.lower_stmt(stmt)?);
        }

        // Implicit return unless control cannot reach the end
        if !body.last().map_or(false, Instruction::is_return) {
            body.push(Instruction::Return { value: None, ty: Type::void() });
        }

        debug!("lowered {}: {} instruction(s)", sig.name, body.len());
        Ok(IRMethod {
            name: sig.name.clone(),
            is_public: sig.is_public,
            is_static: sig.is_static,
            has_varargs: sig.has_varargs,
            params: sig.params.clone(),
            locals: sig.locals.clone(),
            ret_type: sig.return_type.clone(),
            body,
        })
    }
}

/// State for lowering the body of one method
pub struct MethodLowering<'a, 'c> {
    table: &'a SymbolTable,
    method: &'a MethodSignature,
    types: TypeResolver<'a>,
    ctx: &'c mut LoweringContext,
}

impl<'a, 'c> MethodLowering<'a, 'c> {
    pub fn new(
        table: &'a SymbolTable,
        method: &'a MethodSignature,
        ctx: &'c mut LoweringContext,
    ) -> Self {
        Self { table, method, types: TypeResolver::silent(table, method), ctx }
    }

    /// Fresh temporary of type `ty`, as a destination and as an operand
    fn temp(&mut self, ty: &Type) -> (Place, Operand) {
        let id = self.ctx.temp_id();
        (Place::Temp { id, ty: ty.clone() }, Operand::Temp { id, ty: ty.clone() })
    }

    fn this(&self) -> Operand {
        Operand::this(self.table.class_name())
    }
}

fn label(prefix: &str, n: usize) -> Label {
    Label::numbered(prefix, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{ClassDecl, Expr, Stmt, TypeExpr};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_counters_are_independent() {
        let mut ctx = LoweringContext::new();
        assert_eq!(ctx.temp_id(), 0);
        assert_eq!(ctx.temp_id(), 1);
        assert_eq!(ctx.if_label(), 0);
        assert_eq!(ctx.while_label(), 0);
        assert_eq!(ctx.if_label(), 1);
        assert_eq!(ctx.temps_allocated(), 2);
    }

    #[test]
    fn test_implicit_return_void() {
        let program = Program::new(
            ClassDecl::new("Foo").method(
                MethodDecl::new("m", TypeExpr::Void)
                    .local(TypeExpr::Int, "x")
                    .stmt(Stmt::assign("x", Expr::int(1))),
            ),
        );
        let table = SymbolTable::build(&program);
        let module = IRGenerator::new(&table).generate(&program).unwrap();
        let body = &module.methods[0].body;
        assert_eq!(
            body.last(),
            Some(&Instruction::Return { value: None, ty: Type::void() })
        );
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_explicit_return_not_duplicated() {
        let program = Program::new(
            ClassDecl::new("Foo")
                .method(MethodDecl::new("get", TypeExpr::Int).stmt(Stmt::ret(Expr::int(7)))),
        );
        let table = SymbolTable::build(&program);
        let module = IRGenerator::new(&table).generate(&program).unwrap();
        assert_eq!(
            module.methods[0].body,
            vec![Instruction::Return { value: Some(Operand::int(7)), ty: Type::int() }]
        );
    }

    #[test]
    fn test_return_inside_branch_still_gets_trailing_return() {
        let program = Program::new(
            ClassDecl::new("Foo").method(
                MethodDecl::new("m", TypeExpr::Void)
                    .param(TypeExpr::Boolean, "c")
                    .local(TypeExpr::Int, "x")
                    .stmt(Stmt::if_else(
                        Expr::var("c"),
                        Stmt::block(vec![Stmt::ret_void()]),
                        Stmt::block(vec![Stmt::assign("x", Expr::int(1))]),
                    )),
            ),
        );
        let table = SymbolTable::build(&program);
        let module = IRGenerator::new(&table).generate(&program).unwrap();
        let body = &module.methods[0].body;

        let n = body.len();
        assert_eq!(body[n - 2], Instruction::Label(Label("endif_0".to_string())));
        assert_eq!(body[n - 1], Instruction::Return { value: None, ty: Type::void() });
        assert_eq!(body.iter().filter(|i| i.is_return()).count(), 2);
    }

    #[test]
    fn test_generator_keeps_context_across_units() {
        let program = Program::new(ClassDecl::new("Foo").method(
            MethodDecl::new("m", TypeExpr::Int).stmt(Stmt::ret(Expr::binary(
                crate::frontend::ast::BinOp::Add,
                Expr::int(1),
                Expr::int(2),
            ))),
        ));
        let table = SymbolTable::build(&program);
        let mut ctx = LoweringContext::new();
        ctx.temp_id();

        let mut generator = IRGenerator::with_context(&table, ctx);
        let module = generator.generate(&program).unwrap();
        assert_eq!(generator.context().temps_allocated(), 2);
        assert!(matches!(
            module.methods[0].body[0],
            Instruction::Assign { dest: Place::Temp { id: 1, .. }, .. }
        ));
    }

    #[test]
    fn test_counters_continue_across_methods() {
        let cond = || Expr::binary(crate::frontend::ast::BinOp::Lt, Expr::int(1), Expr::int(2));
        let body = || Stmt::if_else(cond(), Stmt::block(vec![]), Stmt::block(vec![]));
        let program = Program::new(
            ClassDecl::new("Foo")
                .method(MethodDecl::new("a", TypeExpr::Void).stmt(body()))
                .method(MethodDecl::new("b", TypeExpr::Void).stmt(body())),
        );
        let table = SymbolTable::build(&program);
        let module = IRGenerator::new(&table).generate(&program).unwrap();

        let labels: Vec<String> = module
            .methods
            .iter()
            .flat_map(|m| m.labels().map(|l| l.to_string()).collect::<Vec<_>>())
            .collect();
        assert_eq!(labels, vec!["ifbody_0", "endif_0", "ifbody_1", "endif_1"]);
    }
}
