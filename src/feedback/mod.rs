//! Semantic diagnostics
//!
//! Every rule of the checker reports through a [`SemanticError`] wrapped in a
//! [`Diagnostic`]. Diagnostics are appended, never thrown; the caller decides
//! whether the collected list blocks lowering.
//!
//! The whole collection serializes to JSON for machine consumers.

use crate::types::Type;
use crate::utils::Span;
use serde::Serialize;
use thiserror::Error;

// ==================== Diagnostic ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Compiler stage that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Semantic,
}

/// One reported problem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub error: SemanticError,
}

impl Diagnostic {
    pub fn error(span: Span, error: SemanticError) -> Self {
        Self::with_severity(Severity::Error, span, error)
    }

    pub fn warning(span: Span, error: SemanticError) -> Self {
        Self::with_severity(Severity::Warning, span, error)
    }

    fn with_severity(severity: Severity, span: Span, error: SemanticError) -> Self {
        Self {
            severity,
            stage: Stage::Semantic,
            line: span.line,
            column: span.column,
            message: error.to_string(),
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}:{}: {}: {}", self.line, self.column, severity, self.message)
    }
}

// ==================== Semantic Errors ====================

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SemanticError {
    // ==================== Uniqueness ====================

    #[error("variable `{name}` already declared")]
    DuplicateLocal { name: String },

    #[error("parameter `{name}` already declared")]
    DuplicateParam { name: String },

    #[error("field `{name}` already declared")]
    DuplicateField { name: String },

    #[error("method `{name}` already declared")]
    DuplicateMethod { name: String },

    #[error("import `{name}` already declared")]
    DuplicateImport { name: String },

    #[error("class `{name}` has the same name as an import")]
    ClassNameClashesWithImport { name: String },

    // ==================== References ====================

    #[error("undeclared variable `{name}`")]
    UndeclaredVariable { name: String },

    #[error("undeclared method `{name}`")]
    UndeclaredMethod { name: String },

    #[error("cannot use instance member `{name}` in static method")]
    InstanceMemberInStaticContext { name: String },

    // ==================== Types ====================

    #[error("{construct} condition must be boolean, found {found}")]
    ConditionNotBoolean { construct: String, found: Type },

    #[error("array used as condition of {construct}")]
    ArrayAsCondition { construct: String },

    #[error("cannot assign {found} to `{target}` of type {expected}")]
    IncompatibleAssignment { target: String, expected: Type, found: Type },

    #[error("`{name}` is not an array")]
    NotAnArray { name: String },

    #[error("indexed expression is not an array, found {found}")]
    IndexedNonArray { found: Type },

    #[error("array index must be int, found {found}")]
    IndexNotInt { found: Type },

    #[error("array size must be int, found {found}")]
    ArraySizeNotInt { found: Type },

    #[error("array elements must share one type: expected {expected}, found {found}")]
    MixedArrayElements { expected: Type, found: Type },

    #[error("length requires an array, found {found}")]
    LengthOfNonArray { found: Type },

    #[error("negation requires boolean, found {found}")]
    InvalidNegation { found: Type },

    #[error("operator {op} not valid for {lhs_kind} ({lhs}) and {rhs_kind} ({rhs})")]
    InvalidOperands {
        op: String,
        lhs_kind: String,
        lhs: Type,
        rhs_kind: String,
        rhs: Type,
    },

    // ==================== Calls ====================

    #[error("method `{method}` expects {expected} argument(s), found {found}")]
    ArgumentCount { method: String, expected: usize, found: usize },

    #[error("argument {position} of method `{method}` is of the wrong type: expected {expected}, found {found}")]
    ArgumentType {
        method: String,
        position: usize,
        expected: Type,
        found: Type,
    },

    #[error("cannot call method `{method}` on {found}")]
    CallOnNonObject { method: String, found: Type },

    // ==================== Methods ====================

    #[error("method `main` must be static")]
    MainNotStatic,

    #[error("method `main` must take exactly one parameter `args` of type String[]")]
    MainParameters,

    #[error("method `{name}` must not be static")]
    StaticNonMain { name: String },

    #[error("return type mismatch: expected {expected}, found {found}")]
    ReturnType { expected: Type, found: Type },

    #[error("missing return value, expected {expected}")]
    MissingReturnValue { expected: Type },

    #[error("void method `{method}` cannot return a value")]
    VoidReturnsValue { method: String },

    #[error("unreachable statement after return")]
    UnreachableCode,
}

// ==================== Report ====================

/// Summary of one checking run
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport<'a> {
    pub class: &'a str,
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: &'a [Diagnostic],
}

impl<'a> DiagnosticReport<'a> {
    pub fn new(class: &'a str, diagnostics: &'a [Diagnostic]) -> Self {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            class,
            errors,
            warnings: diagnostics.len() - errors,
            diagnostics,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
