//! Jmm IR definitions
//!
//! Three-address code: every instruction names its operands and its result,
//! nested expressions become numbered temporaries, and control flow is made
//! of labels and (conditional) gotos over one flat sequence per method.
//!
//! Every operand carries its [`Type`], so consumers never re-infer types.

use std::fmt;

use crate::frontend::ast::BinOp;
use crate::frontend::symbol_table::Symbol;
use crate::types::Type;

/// Name prefix of compiler temporaries
pub const TEMP_PREFIX: &str = "tmp";

/// IR Module - one lowered class
#[derive(Debug, Clone, PartialEq)]
pub struct IRModule {
    pub class_name: String,
    pub superclass: Option<String>,
    /// Qualified import names
    pub imports: Vec<String>,
    pub fields: Vec<Symbol>,
    pub methods: Vec<IRMethod>,
}

impl IRModule {
    pub fn method(&self, name: &str) -> Option<&IRMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// IR Method
#[derive(Debug, Clone, PartialEq)]
pub struct IRMethod {
    pub name: String,
    pub is_public: bool,
    pub is_static: bool,
    pub has_varargs: bool,
    /// Parameters in slot order; a varargs parameter is the trailing array
    pub params: Vec<Symbol>,
    pub locals: Vec<Symbol>,
    pub ret_type: Type,
    pub body: Vec<Instruction>,
}

impl IRMethod {
    /// Labels defined in the body, in order
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.body.iter().filter_map(|inst| match inst {
            Instruction::Label(label) => Some(label),
            _ => None,
        })
    }
}

/// Literal value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Int(i32),
    Bool(bool),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Bool(b) => write!(f, "{}", u8::from(*b)),
        }
    }
}

/// IR Value
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal { value: Constant, ty: Type },
    /// Local variable or parameter; also a class name used as a static receiver
    Var { name: String, ty: Type },
    Temp { id: usize, ty: Type },
}

impl Operand {
    pub fn int(value: i32) -> Self {
        Operand::Literal { value: Constant::Int(value), ty: Type::int() }
    }

    pub fn boolean(value: bool) -> Self {
        Operand::Literal { value: Constant::Bool(value), ty: Type::boolean() }
    }

    pub fn var(name: impl Into<String>, ty: Type) -> Self {
        Operand::Var { name: name.into(), ty }
    }

    pub fn this(class: &str) -> Self {
        Operand::var("this", Type::class(class))
    }

    pub fn ty(&self) -> &Type {
        match self {
            Operand::Literal { ty, .. } | Operand::Var { ty, .. } | Operand::Temp { ty, .. } => ty,
        }
    }

    /// Bare name without the type suffix
    pub fn name(&self) -> String {
        match self {
            Operand::Literal { value, .. } => value.to_string(),
            Operand::Var { name, .. } => name.clone(),
            Operand::Temp { id, .. } => format!("{}{}", TEMP_PREFIX, id),
        }
    }

    /// The storage behind a variable or temporary; literals have none
    pub fn as_place(&self) -> Option<Place> {
        match self {
            Operand::Var { name, ty } => Some(Place::Var { name: name.clone(), ty: ty.clone() }),
            Operand::Temp { id, ty } => Some(Place::Temp { id: *id, ty: ty.clone() }),
            Operand::Literal { .. } => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name(), TypeSuffix(self.ty()))
    }
}

/// Storage written by an `Assign`
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Var { name: String, ty: Type },
    Temp { id: usize, ty: Type },
    /// `array[index]`; `ty` is the element type
    Element { array: Operand, index: Operand, ty: Type },
}

impl Place {
    pub fn ty(&self) -> &Type {
        match self {
            Place::Var { ty, .. } | Place::Temp { ty, .. } | Place::Element { ty, .. } => ty,
        }
    }

    /// The value stored at this place, readable as an operand
    pub fn as_operand(&self) -> Option<Operand> {
        match self {
            Place::Var { name, ty } => Some(Operand::Var { name: name.clone(), ty: ty.clone() }),
            Place::Temp { id, ty } => Some(Operand::Temp { id: *id, ty: ty.clone() }),
            Place::Element { .. } => None,
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Var { name, ty } => write!(f, "{}.{}", name, TypeSuffix(ty)),
            Place::Temp { id, ty } => write!(f, "{}{}.{}", TEMP_PREFIX, id, TypeSuffix(ty)),
            Place::Element { array, index, ty } => {
                write!(f, "{}[{}].{}", array.name(), index, TypeSuffix(ty))
            }
        }
    }
}

/// Branch target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(pub String);

impl Label {
    pub fn numbered(prefix: &str, n: usize) -> Self {
        Label(format!("{}_{}", prefix, n))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// Invocation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Object allocation; always followed by a `Special` constructor call
    New,
    Virtual,
    Static,
    Special,
    Interface,
    ArrayLength,
}

impl CallKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CallKind::New => "new",
            CallKind::Virtual => "invokevirtual",
            CallKind::Static => "invokestatic",
            CallKind::Special => "invokespecial",
            CallKind::Interface => "invokeinterface",
            CallKind::ArrayLength => "arraylength",
        }
    }
}

/// One invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    /// Object for `Virtual`/`Special`/`Interface`, array for `ArrayLength`,
    /// class name for `Static`/`New`
    pub receiver: Operand,
    /// Method name literal; absent for `New` and `ArrayLength`
    pub method: Option<String>,
    pub args: Vec<Operand>,
    pub ret: Type,
}

/// Right-hand side of an `Assign`
#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    Use(Operand),
    Binary { op: BinOp, left: Operand, right: Operand },
    Unary { op: UnaryOp, operand: Operand },
    Call(Call),
    /// Field of `this`
    GetField { field: String, ty: Type },
    /// `array[index]`
    Element { array: Operand, index: Operand },
    NewArray { elem: Type, size: Operand },
}

/// Branch condition
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    /// Taken when the boolean operand is true
    Truthy(Operand),
    /// Taken when `left op right` holds; `op` is relational
    Compare { op: BinOp, left: Operand, right: Operand },
}

/// IR Instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// dest :=.ty value
    Assign { dest: Place, ty: Type, value: Rvalue },

    /// Call whose result is discarded
    Call(Call),

    /// this.field := value
    PutField { field: String, ty: Type, value: Operand },

    Goto(Label),

    CondGoto { cond: Cond, target: Label },

    Label(Label),

    Return { value: Option<Operand>, ty: Type },
}

impl Instruction {
    pub fn is_return(&self) -> bool {
        matches!(self, Instruction::Return { .. })
    }
}

/// Renders a [`Type`] as an IR type suffix: `i32`, `bool`, `V`, `array.i32`, ...
pub struct TypeSuffix<'a>(pub &'a Type);

impl fmt::Display for TypeSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = self.0;
        if ty.is_array {
            f.write_str("array.")?;
        }
        match ty.name.as_str() {
            "int" => f.write_str("i32"),
            "boolean" => f.write_str("bool"),
            "void" => f.write_str("V"),
            _ if ty.is_any() => f.write_str("?"),
            name => f.write_str(name),
        }
    }
}
