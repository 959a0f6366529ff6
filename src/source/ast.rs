//! AST for the unit-definition language.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::base::{AttrName, UnitName};

/// A parsed unit: the statement program plus the exact source text it came
/// from. The text is retained because downstream re-initialization must use
/// identical source to what was originally evaluated.
#[derive(Debug, Clone)]
pub struct UnitSource {
    pub text: Arc<str>,
    pub program: Vec<Stmt>,
}

impl UnitSource {
    /// True if the program carries the `package;` child-unit marker.
    pub fn is_package(&self) -> bool {
        self.program.iter().any(|s| matches!(s, Stmt::Package))
    }
}

// ============================================================================
// STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `package;` — marks the unit as having child units.
    Package,
    /// `doc "…";` — the unit's doc string.
    Doc(SmolStr),
    /// `export a, b;` — the unit's export list.
    Export(Vec<AttrName>),
    /// `use pkg.unit::name [as alias];`
    UseAttr {
        unit: UnitName,
        attr: AttrName,
        alias: Option<AttrName>,
    },
    /// `use pkg.unit [as alias];` — binds the unit object itself.
    UseUnit {
        unit: UnitName,
        alias: Option<AttrName>,
    },
    /// `use pkg.unit::*;` — imports everything on the export list.
    UseStar { unit: UnitName },
    /// `marker pkg.unit::Name: metaclass;` — declares that an external
    /// symbol must be synthesized as a special-form placeholder.
    Marker {
        unit: UnitName,
        attr: AttrName,
        kind: MarkerKind,
    },
    /// `let name = expr;`
    Let { name: AttrName, value: Expr },
    /// `if typecheck { … }` — evaluated only under the static-analysis flag.
    StaticOnly(Vec<Stmt>),
    Fn(FnDecl),
    Class(ClassDecl),
    /// `fail "message";` — aborts unit initialization.
    Fail(SmolStr),
}

/// Which special placeholder form an external symbol requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Metaclass,
    Decorator,
}

// ============================================================================
// DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: AttrName,
    pub params: Vec<ParamDecl>,
    /// Return annotation, captured as source text (never evaluated).
    pub ret: Option<SmolStr>,
    pub doc: Option<SmolStr>,
    pub decorators: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: AttrName,
    /// Annotation as source text (never evaluated).
    pub annotation: Option<SmolStr>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: AttrName,
    /// Base-class expressions. Evaluated at class creation.
    pub bases: Vec<Expr>,
    /// Metaclass expression, if any. Evaluated at class creation.
    pub metaclass: Option<Expr>,
    pub doc: Option<SmolStr>,
    pub members: Vec<Member>,
    pub decorators: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Let { name: AttrName, value: Expr },
    Fn(FnDecl),
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Str(SmolStr),
    Bool(bool),
    /// A dotted reference: head name looked up in scope, remaining segments
    /// resolved as attribute reads.
    Ref { path: Vec<AttrName> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

impl Expr {
    pub fn name(name: &str) -> Self {
        Expr::Ref {
            path: vec![AttrName::new(name)],
        }
    }
}
