//! The unit-definition language.
//!
//! Namespace units carry initialization code. This module defines that
//! code's surface: a small declarative language covering imports, constant
//! bindings, class and function declarations, export lists, child-unit
//! markers, static-analysis-only blocks, and explicit initialization
//! failure. Lexing uses logos; parsing is recursive descent.

mod ast;
mod lexer;
mod parser;

pub use ast::{
    ClassDecl, Expr, FnDecl, MarkerKind, Member, ParamDecl, Stmt, UnitSource,
};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{ParseError, parse_unit_source};
