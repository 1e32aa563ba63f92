//! Symbol table for one compilation unit
//!
//! Built once from the whole class declaration, before any checking, and
//! read-only afterwards. It is the only state shared between the checker and
//! the lowering passes.

use crate::frontend::ast::{MethodDecl, Program, TypeExpr};
use crate::types::{Type, TypeEnvironment};
use log::debug;

/// A named, typed declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Where a bare identifier was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Local,
    Param,
    Field,
}

/// Signature and locals of one method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub name: String,
    pub return_type: Type,
    /// Declared parameters; a varargs parameter is the trailing array-typed entry
    pub params: Vec<Symbol>,
    pub locals: Vec<Symbol>,
    pub is_static: bool,
    pub is_public: bool,
    pub has_varargs: bool,
}

impl MethodSignature {
    /// Number of parameters before the varargs slot
    pub fn fixed_arity(&self) -> usize {
        if self.has_varargs {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }

    /// Element type accepted by the varargs slot
    pub fn varargs_element(&self) -> Option<Type> {
        if !self.has_varargs {
            return None;
        }
        self.params.last().map(|p| p.ty.element())
    }

    pub fn local(&self, name: &str) -> Option<&Symbol> {
        self.locals.iter().find(|s| s.name == name)
    }

    pub fn param(&self, name: &str) -> Option<&Symbol> {
        self.params.iter().find(|s| s.name == name)
    }
}

/// Symbol table of a class
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    class_name: String,
    superclass: Option<String>,
    imports: Vec<String>,
    fields: Vec<Symbol>,
    methods: Vec<MethodSignature>,
}

impl SymbolTable {
    /// Scan the compilation unit once and collect every declaration
    pub fn build(program: &Program) -> Self {
        let class = &program.class;
        let table = Self {
            class_name: class.name.clone(),
            superclass: class.superclass.clone(),
            imports: program.imports.iter().map(|i| i.qualified()).collect(),
            fields: class
                .fields
                .iter()
                .map(|f| Symbol::new(&f.name, resolve_type(&f.ty)))
                .collect(),
            methods: class.methods.iter().map(build_signature).collect(),
        };
        debug!(
            "symbol table for {}: {} import(s), {} field(s), {} method(s)",
            table.class_name,
            table.imports.len(),
            table.fields.len(),
            table.methods.len()
        );
        table
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    /// Imports as qualified, dotted names
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Significant identifier of every import
    pub fn import_names(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .map(|i| i.rsplit('.').next().unwrap_or(i.as_str()))
    }

    pub fn has_imports(&self) -> bool {
        !self.imports.is_empty()
    }

    pub fn is_imported(&self, name: &str) -> bool {
        self.import_names().any(|i| i == name)
    }

    pub fn fields(&self) -> &[Symbol] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Symbol> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Method names in declaration order
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|m| m.name.as_str())
    }

    /// Every method signature in declaration order, duplicates included
    pub fn signatures(&self) -> &[MethodSignature] {
        &self.methods
    }

    /// First method declared with `name`
    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn return_type(&self, method: &str) -> Option<&Type> {
        self.method(method).map(|m| &m.return_type)
    }

    pub fn parameters(&self, method: &str) -> &[Symbol] {
        self.method(method).map(|m| m.params.as_slice()).unwrap_or_default()
    }

    pub fn local_variables(&self, method: &str) -> &[Symbol] {
        self.method(method).map(|m| m.locals.as_slice()).unwrap_or_default()
    }

    /// Resolve a bare identifier inside `method`.
    ///
    /// Locals shadow parameters, which shadow fields. Imports are not
    /// variables and are left to the caller.
    pub fn lookup_variable<'a>(
        &'a self,
        method: &'a MethodSignature,
        name: &str,
    ) -> Option<(VarScope, &'a Symbol)> {
        if let Some(sym) = method.local(name) {
            return Some((VarScope::Local, sym));
        }
        if let Some(sym) = method.param(name) {
            return Some((VarScope::Param, sym));
        }
        self.field(name).map(|sym| (VarScope::Field, sym))
    }
}

impl TypeEnvironment for SymbolTable {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    fn is_imported(&self, name: &str) -> bool {
        SymbolTable::is_imported(self, name)
    }
}

fn build_signature(method: &MethodDecl) -> MethodSignature {
    let mut params: Vec<Symbol> = method
        .params
        .iter()
        .map(|p| Symbol::new(&p.name, resolve_type(&p.ty)))
        .collect();
    if let Some(varargs) = &method.varargs {
        params.push(Symbol::new(&varargs.name, resolve_type(&varargs.ty).array_of()));
    }

    MethodSignature {
        name: method.name.clone(),
        return_type: resolve_type(&method.return_type),
        params,
        locals: method
            .locals
            .iter()
            .map(|l| Symbol::new(&l.name, resolve_type(&l.ty)))
            .collect(),
        is_static: method.is_static,
        is_public: method.is_public,
        has_varargs: method.varargs.is_some(),
    }
}

/// Map a syntactic type onto a [`Type`]
pub fn resolve_type(ty: &TypeExpr) -> Type {
    match ty {
        TypeExpr::Int => Type::int(),
        TypeExpr::Boolean => Type::boolean(),
        TypeExpr::Void => Type::void(),
        TypeExpr::String => Type::string(),
        TypeExpr::Array(elem) => resolve_type(elem).array_of(),
        TypeExpr::Named(name) => Type::class(name.as_str()),
    }
}
