//! Frontend module - AST, Symbol Table, Type Resolution, Semantic Analysis

pub mod ast;
pub mod resolver;
pub mod semantic;
pub mod symbol_table;
