//! IR Printer - Pretty print Jmm IR
//!
//! Outputs the textual form consumed by the bytecode emitter and read by
//! humans when debugging: one class block, one `.method` block per method,
//! one instruction per line.

use crate::frontend::ast::BinOp;
use crate::middle::ir::*;

/// Pretty printer for Jmm IR
pub struct IRPrinter {
    output: String,
    indent: usize,
}

impl IRPrinter {
    pub fn new() -> Self {
        Self { output: String::new(), indent: 0 }
    }

    /// Print an IR module to string
    pub fn print_module(&mut self, module: &IRModule) -> String {
        self.output.clear();
        self.indent = 0;

        for import in &module.imports {
            self.line(&format!("import {};", import));
        }
        if !module.imports.is_empty() {
            self.output.push('\n');
        }

        let header = match &module.superclass {
            Some(superclass) => format!("{} extends {} {{", module.class_name, superclass),
            None => format!("{} {{", module.class_name),
        };
        self.line(&header);
        self.indent += 1;

        for field in &module.fields {
            self.line(&format!(".field public {}.{};", field.name, TypeSuffix(&field.ty)));
        }
        if !module.fields.is_empty() {
            self.output.push('\n');
        }

        self.line(&format!(".construct {}().V {{", module.class_name));
        self.indent += 1;
        self.line("invokespecial(this, \"<init>\").V;");
        self.indent -= 1;
        self.line("}");

        for method in &module.methods {
            self.output.push('\n');
            self.print_method(method);
        }

        self.indent -= 1;
        self.line("}");
        std::mem::take(&mut self.output)
    }

    /// Print a method
    fn print_method(&mut self, method: &IRMethod) {
        let mut modifiers = String::new();
        if method.is_public {
            modifiers.push_str("public ");
        }
        if method.is_static {
            modifiers.push_str("static ");
        }
        if method.has_varargs {
            modifiers.push_str("varargs ");
        }
        let params: Vec<String> = method
            .params
            .iter()
            .map(|p| format!("{}.{}", p.name, TypeSuffix(&p.ty)))
            .collect();

        self.line(&format!(
            ".method {}{}({}).{} {{",
            modifiers,
            method.name,
            params.join(", "),
            TypeSuffix(&method.ret_type)
        ));
        self.indent += 1;
        for inst in &method.body {
            if let Instruction::Label(label) = inst {
                // Labels hang one level left of the code they mark
                self.indent -= 1;
                self.line(&format!("{}:", label));
                self.indent += 1;
            } else {
                let text = instruction_str(inst);
                self.line(&text);
            }
        }
        self.indent -= 1;
        self.line("}");
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(text);
        self.output.push('\n');
    }
}

impl Default for IRPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to print IR
pub fn print_ir(module: &IRModule) -> String {
    IRPrinter::new().print_module(module)
}

/// One instruction, without indentation
pub fn instruction_str(inst: &Instruction) -> String {
    match inst {
        Instruction::Assign { dest, ty, value } => {
            format!("{} :=.{} {};", dest, TypeSuffix(ty), rvalue_str(value))
        }
        Instruction::Call(call) => format!("{};", call_str(call)),
        Instruction::PutField { field, ty, value } => {
            format!("putfield(this, {}.{}, {}).V;", field, TypeSuffix(ty), value)
        }
        Instruction::Goto(label) => format!("goto {};", label),
        Instruction::CondGoto { cond, target } => format!("if ({}) goto {};", cond_str(cond), target),
        Instruction::Label(label) => format!("{}:", label),
        Instruction::Return { value: Some(value), ty } => format!("ret.{} {};", TypeSuffix(ty), value),
        Instruction::Return { value: None, .. } => "ret.V;".to_string(),
    }
}

fn rvalue_str(value: &Rvalue) -> String {
    match value {
        Rvalue::Use(op) => op.to_string(),
        Rvalue::Binary { op, left, right } => binary_str(*op, left, right),
        Rvalue::Unary { op: UnaryOp::Not, operand } => format!("!.bool {}", operand),
        Rvalue::Call(call) => call_str(call),
        Rvalue::GetField { field, ty } => {
            format!("getfield(this, {}.{}).{}", field, TypeSuffix(ty), TypeSuffix(ty))
        }
        Rvalue::Element { array, index } => {
            let elem = array.ty().element();
            format!("{}[{}].{}", array.name(), index, TypeSuffix(&elem))
        }
        Rvalue::NewArray { elem, size } => {
            format!("new(array, {}).{}", size, TypeSuffix(&elem.array_of()))
        }
    }
}

fn binary_str(op: BinOp, left: &Operand, right: &Operand) -> String {
    let result = if op.is_arithmetic() { "i32" } else { "bool" };
    format!("{} {}.{} {}", left, op.symbol(), result, right)
}

fn cond_str(cond: &Cond) -> String {
    match cond {
        Cond::Truthy(op) => op.to_string(),
        Cond::Compare { op, left, right } => binary_str(*op, left, right),
    }
}

fn call_str(call: &Call) -> String {
    let ret = TypeSuffix(&call.ret);
    match call.kind {
        CallKind::New => format!("new({}).{}", call.receiver.name(), ret),
        CallKind::ArrayLength => format!("arraylength({}).{}", call.receiver, ret),
        kind => {
            // Static calls name the class, not an object
            let receiver = match kind {
                CallKind::Static => call.receiver.name(),
                _ => call.receiver.to_string(),
            };
            let mut parts = vec![receiver, format!("\"{}\"", call.method.as_deref().unwrap_or_default())];
            parts.extend(call.args.iter().map(Operand::to_string));
            format!("{}({}).{}", kind.mnemonic(), parts.join(", "), ret)
        }
    }
}
