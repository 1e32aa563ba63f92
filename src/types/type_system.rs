//! Type System for Jmm
//!
//! A type is a name plus an array flag. There is no subtype lattice: the few
//! cases where two different class names are accepted for one another are
//! spelled out as named exemptions in [`is_assignable`].

use serde::{Deserialize, Serialize};
use std::fmt;

const INT: &str = "int";
const BOOLEAN: &str = "boolean";
const VOID: &str = "void";
const STRING: &str = "String";
/// Not a valid identifier, so no user class can collide with it
const ANY: &str = "<any>";

/// Static type of a declaration or an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub name: String,
    pub is_array: bool,
}

impl Type {
    pub fn new(name: impl Into<String>, is_array: bool) -> Self {
        Self { name: name.into(), is_array }
    }

    pub fn int() -> Self {
        Self::new(INT, false)
    }

    pub fn boolean() -> Self {
        Self::new(BOOLEAN, false)
    }

    pub fn void() -> Self {
        Self::new(VOID, false)
    }

    pub fn string() -> Self {
        Self::new(STRING, false)
    }

    pub fn int_array() -> Self {
        Self::new(INT, true)
    }

    /// Non-array type named after a class
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    /// The type produced by a sub-expression that failed to resolve.
    ///
    /// `Any` is accepted wherever a type is checked, which keeps one broken
    /// sub-expression from producing a diagnostic at every ancestor.
    pub fn any() -> Self {
        Self::new(ANY, false)
    }

    pub fn is_any(&self) -> bool {
        self.name == ANY
    }

    pub fn is_int(&self) -> bool {
        !self.is_array && self.name == INT
    }

    pub fn is_boolean(&self) -> bool {
        !self.is_array && self.name == BOOLEAN
    }

    pub fn is_void(&self) -> bool {
        !self.is_array && self.name == VOID
    }

    pub fn is_int_array(&self) -> bool {
        self.is_array && self.name == INT
    }

    /// Built-in value types and every array type
    pub fn is_primitive(&self) -> bool {
        self.is_array || matches!(self.name.as_str(), INT | BOOLEAN | VOID | STRING)
    }

    /// A non-array type naming a class (current, super or imported)
    pub fn is_class(&self) -> bool {
        !self.is_any() && !self.is_primitive()
    }

    /// Element type of an array type
    pub fn element(&self) -> Self {
        Self::new(self.name.clone(), false)
    }

    /// Array type whose elements have this type
    pub fn array_of(&self) -> Self {
        Self::new(self.name.clone(), true)
    }

    /// Structural equality that never holds for `Any`
    pub fn same_as(&self, other: &Type) -> bool {
        !self.is_any() && !other.is_any() && self == other
    }

    /// `Any`, or equal to `expected`
    pub fn accepts(&self, expected: &Type) -> bool {
        self.is_any() || self == expected
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return write!(f, "?");
        }
        write!(f, "{}", self.name)?;
        if self.is_array {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Class-level facts the compatibility rules depend on
pub trait TypeEnvironment {
    fn class_name(&self) -> &str;
    fn superclass(&self) -> Option<&str>;
    /// Whether `name` is the significant (last) segment of an import
    fn is_imported(&self, name: &str) -> bool;
}

/// Whether a value of type `src` may be stored into a slot of type `dest`
pub fn is_assignable(env: &impl TypeEnvironment, dest: &Type, src: &Type) -> bool {
    if dest.is_any() || src.is_any() || dest == src {
        return true;
    }
    if !dest.is_class() || !src.is_class() {
        return false;
    }
    external_types_compatible(env, dest, src) || superclass_compatible(env, dest, src)
}

/// Two imported types carry no information about each other, so both
/// directions are accepted.
fn external_types_compatible(env: &impl TypeEnvironment, dest: &Type, src: &Type) -> bool {
    env.is_imported(&dest.name) && env.is_imported(&src.name)
}

/// The current class and its declared superclass are accepted for one another.
fn superclass_compatible(env: &impl TypeEnvironment, dest: &Type, src: &Type) -> bool {
    let Some(superclass) = env.superclass() else {
        return false;
    };
    let class = env.class_name();
    (dest.name == class && src.name == superclass) || (dest.name == superclass && src.name == class)
}
