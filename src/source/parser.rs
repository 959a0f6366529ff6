//! Recursive-descent parser for the unit-definition language.

use std::sync::Arc;

use smol_str::SmolStr;
use text_size::TextSize;
use thiserror::Error;

use crate::base::{AttrName, UnitName};

use super::ast::{
    ClassDecl, Expr, FnDecl, MarkerKind, Member, ParamDecl, Stmt, UnitSource,
};
use super::lexer::{Token, TokenKind, tokenize};

/// A unit source failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at offset {offset:?}: {message}")]
pub struct ParseError {
    pub message: String,
    pub offset: TextSize,
}

/// Parse a complete unit source, retaining the exact text.
pub fn parse_unit_source(text: &str) -> Result<UnitSource, ParseError> {
    let tokens = tokenize(text);
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: TextSize::new(text.len() as u32),
    };
    let program = parser.parse_program(/* nested: */ false)?;
    Ok(UnitSource {
        text: Arc::from(text),
        program,
    })
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    end: TextSize,
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    /// True if the next token is the identifier keyword `kw`.
    fn at_kw(&self, kw: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && t.text == kw)
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> TextSize {
        self.peek().map(|t| t.offset).unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            offset: self.offset(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'a>, ParseError> {
        if self.at(kind) {
            Ok(self.bump().unwrap())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.at_kw(kw) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected keyword `{kw}`")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<SmolStr, ParseError> {
        let token = self.expect(TokenKind::Ident, what)?;
        Ok(SmolStr::new(token.text))
    }

    fn expect_string(&mut self, what: &str) -> Result<SmolStr, ParseError> {
        let token = self.expect(TokenKind::String, what)?;
        Ok(unescape(token.text))
    }

    // ------------------------------------------------------------------
    // Grammar
    // ------------------------------------------------------------------

    fn parse_program(&mut self, nested: bool) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            if nested && self.at(TokenKind::RBrace) {
                break;
            }
            let Some(token) = self.peek() else {
                if nested {
                    return Err(self.error("unterminated block"));
                }
                break;
            };
            if token.kind == TokenKind::Error {
                return Err(self.error("unrecognized character"));
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.error("expected statement"));
        };
        match (token.kind, token.text) {
            (TokenKind::Ident, "package") => {
                self.bump();
                self.expect(TokenKind::Semi, "`;`")?;
                Ok(Stmt::Package)
            }
            (TokenKind::Ident, "doc") => {
                self.bump();
                let text = self.expect_string("doc string")?;
                self.expect(TokenKind::Semi, "`;`")?;
                Ok(Stmt::Doc(text))
            }
            (TokenKind::Ident, "export") => self.parse_export(),
            (TokenKind::Ident, "use") => self.parse_use(),
            (TokenKind::Ident, "marker") => self.parse_marker(),
            (TokenKind::Ident, "let") => {
                self.bump();
                let name = self.expect_ident("binding name")?;
                self.expect(TokenKind::Eq, "`=`")?;
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semi, "`;`")?;
                Ok(Stmt::Let { name, value })
            }
            (TokenKind::Ident, "if") => self.parse_static_only(),
            (TokenKind::Ident, "fail") => {
                self.bump();
                let message = self.expect_string("failure message")?;
                self.expect(TokenKind::Semi, "`;`")?;
                Ok(Stmt::Fail(message))
            }
            (TokenKind::At, _) | (TokenKind::Ident, "fn" | "class") => {
                let decorators = self.parse_decorators()?;
                if self.at_kw("fn") {
                    Ok(Stmt::Fn(self.parse_fn(decorators)?))
                } else if self.at_kw("class") {
                    Ok(Stmt::Class(self.parse_class(decorators)?))
                } else {
                    Err(self.error("expected `fn` or `class` after decorators"))
                }
            }
            _ => Err(self.error(format!("unexpected token {:?}", token.text))),
        }
    }

    fn parse_export(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("export")?;
        let mut names = vec![self.expect_ident("export name")?];
        while self.at(TokenKind::Comma) {
            self.bump();
            names.push(self.expect_ident("export name")?);
        }
        self.expect(TokenKind::Semi, "`;`")?;
        Ok(Stmt::Export(names))
    }

    fn parse_use(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("use")?;
        let unit = self.parse_unit_name()?;
        if self.at(TokenKind::ColonColon) {
            self.bump();
            if self.at(TokenKind::Star) {
                self.bump();
                self.expect(TokenKind::Semi, "`;`")?;
                return Ok(Stmt::UseStar { unit });
            }
            let attr = self.expect_ident("attribute name")?;
            let alias = self.parse_alias()?;
            self.expect(TokenKind::Semi, "`;`")?;
            Ok(Stmt::UseAttr { unit, attr, alias })
        } else {
            let alias = self.parse_alias()?;
            self.expect(TokenKind::Semi, "`;`")?;
            Ok(Stmt::UseUnit { unit, alias })
        }
    }

    fn parse_alias(&mut self) -> Result<Option<AttrName>, ParseError> {
        if self.at_kw("as") {
            self.bump();
            Ok(Some(self.expect_ident("alias")?))
        } else {
            Ok(None)
        }
    }

    fn parse_marker(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("marker")?;
        let unit = self.parse_unit_name()?;
        self.expect(TokenKind::ColonColon, "`::`")?;
        let attr = self.expect_ident("attribute name")?;
        self.expect(TokenKind::Colon, "`:`")?;
        let kind_name = self.expect_ident("marker kind")?;
        let kind = match kind_name.as_str() {
            "metaclass" => MarkerKind::Metaclass,
            "decorator" => MarkerKind::Decorator,
            other => {
                return Err(self.error(format!("unknown marker kind `{other}`")));
            }
        };
        self.expect(TokenKind::Semi, "`;`")?;
        Ok(Stmt::Marker { unit, attr, kind })
    }

    fn parse_static_only(&mut self) -> Result<Stmt, ParseError> {
        self.expect_kw("if")?;
        self.expect_kw("typecheck")?;
        self.expect(TokenKind::LBrace, "`{`")?;
        let body = self.parse_program(/* nested: */ true)?;
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Stmt::StaticOnly(body))
    }

    fn parse_decorators(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut decorators = Vec::new();
        while self.at(TokenKind::At) {
            self.bump();
            decorators.push(self.parse_ref_path()?);
        }
        Ok(decorators)
    }

    fn parse_fn(&mut self, decorators: Vec<Expr>) -> Result<FnDecl, ParseError> {
        self.expect_kw("fn")?;
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            params.push(self.parse_param()?);
            if self.at(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        let ret = if self.at(TokenKind::Arrow) {
            self.bump();
            Some(self.parse_annotation_text()?)
        } else {
            None
        };
        let doc = self.parse_decl_body()?;
        Ok(FnDecl {
            name,
            params,
            ret,
            doc,
            decorators,
        })
    }

    fn parse_param(&mut self) -> Result<ParamDecl, ParseError> {
        let name = self.expect_ident("parameter name")?;
        let annotation = if self.at(TokenKind::Colon) {
            self.bump();
            Some(self.parse_annotation_text()?)
        } else {
            None
        };
        let default = if self.at(TokenKind::Eq) {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(ParamDecl {
            name,
            annotation,
            default,
        })
    }

    /// Annotations are kept as source text, deliberately unevaluated.
    fn parse_annotation_text(&mut self) -> Result<SmolStr, ParseError> {
        let mut text = String::from(self.expect_ident("annotation")?.as_str());
        while self.at(TokenKind::Dot) {
            self.bump();
            text.push('.');
            text.push_str(self.expect_ident("annotation segment")?.as_str());
        }
        Ok(SmolStr::new(text))
    }

    /// Either `;` or `{ doc "…"; }` after a function signature.
    fn parse_decl_body(&mut self) -> Result<Option<SmolStr>, ParseError> {
        if self.at(TokenKind::Semi) {
            self.bump();
            return Ok(None);
        }
        self.expect(TokenKind::LBrace, "`;` or `{`")?;
        let mut doc = None;
        if self.at_kw("doc") {
            self.bump();
            doc = Some(self.expect_string("doc string")?);
            self.expect(TokenKind::Semi, "`;`")?;
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(doc)
    }

    fn parse_class(&mut self, decorators: Vec<Expr>) -> Result<ClassDecl, ParseError> {
        self.expect_kw("class")?;
        let name = self.expect_ident("class name")?;
        let mut bases = Vec::new();
        if self.at(TokenKind::LParen) {
            self.bump();
            while !self.at(TokenKind::RParen) {
                bases.push(self.parse_ref_path()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "`)`")?;
        }
        let metaclass = if self.at_kw("meta") {
            self.bump();
            Some(self.parse_ref_path()?)
        } else {
            None
        };
        let mut doc = None;
        let mut members = Vec::new();
        if self.at(TokenKind::Semi) {
            self.bump();
        } else {
            self.expect(TokenKind::LBrace, "`;` or `{`")?;
            if self.at_kw("doc") {
                self.bump();
                doc = Some(self.expect_string("doc string")?);
                self.expect(TokenKind::Semi, "`;`")?;
            }
            while !self.at(TokenKind::RBrace) {
                members.push(self.parse_member()?);
            }
            self.expect(TokenKind::RBrace, "`}`")?;
        }
        Ok(ClassDecl {
            name,
            bases,
            metaclass,
            doc,
            members,
            decorators,
        })
    }

    fn parse_member(&mut self) -> Result<Member, ParseError> {
        if self.at_kw("let") {
            self.bump();
            let name = self.expect_ident("member name")?;
            self.expect(TokenKind::Eq, "`=`")?;
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi, "`;`")?;
            Ok(Member::Let { name, value })
        } else if self.at_kw("fn") || self.at(TokenKind::At) {
            let decorators = self.parse_decorators()?;
            Ok(Member::Fn(self.parse_fn(decorators)?))
        } else {
            Err(self.error("expected class member (`let` or `fn`)"))
        }
    }

    fn parse_unit_name(&mut self) -> Result<UnitName, ParseError> {
        let start = self.offset();
        let mut text = String::from(self.expect_ident("unit name")?.as_str());
        while self.at(TokenKind::Dot) {
            self.bump();
            text.push('.');
            text.push_str(self.expect_ident("unit name segment")?.as_str());
        }
        UnitName::new(&text).map_err(|e| ParseError {
            message: e.to_string(),
            offset: start,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.error("expected expression"));
        };
        let mut expr = match token.kind {
            TokenKind::Integer => {
                let token = self.bump().unwrap();
                let value: i64 = token.text.parse().map_err(|_| ParseError {
                    message: format!("integer literal out of range: {}", token.text),
                    offset: token.offset,
                })?;
                Expr::Int(value)
            }
            TokenKind::String => Expr::Str(self.expect_string("string")?),
            TokenKind::Ident if token.text == "true" => {
                self.bump();
                Expr::Bool(true)
            }
            TokenKind::Ident if token.text == "false" => {
                self.bump();
                Expr::Bool(false)
            }
            TokenKind::Ident => self.parse_ref_path()?,
            _ => return Err(self.error("expected expression")),
        };
        while self.at(TokenKind::LParen) {
            self.bump();
            let mut args = Vec::new();
            while !self.at(TokenKind::RParen) {
                args.push(self.parse_expr()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "`)`")?;
            expr = Expr::Call {
                callee: Box::new(expr),
                args,
            };
        }
        Ok(expr)
    }

    fn parse_ref_path(&mut self) -> Result<Expr, ParseError> {
        let mut path = vec![self.expect_ident("name")?];
        while self.at(TokenKind::Dot) {
            self.bump();
            path.push(self.expect_ident("name segment")?);
        }
        Ok(Expr::Ref { path })
    }
}

fn unescape(quoted: &str) -> SmolStr {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    SmolStr::new(out)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("package;")]
    #[case("doc \"a unit\";")]
    #[case("export a, b, c;")]
    #[case("use pkg.sub::Name;")]
    #[case("use pkg.sub::Name as Alias;")]
    #[case("use pkg.sub;")]
    #[case("use pkg.sub as s;")]
    #[case("use pkg.sub::*;")]
    #[case("marker conf.meta::ConfigMeta: metaclass;")]
    #[case("marker deco.pkg::wraps: decorator;")]
    #[case("let x = 42;")]
    #[case("let s = \"text\";")]
    #[case("let f = flag(true, false);")]
    #[case("if typecheck { use hints::Hidden; }")]
    #[case("fn helper();")]
    #[case("fn helper(a, b: pkg.T, c = 3) -> out.T { doc \"does\"; }")]
    #[case("@wraps fn helper();")]
    #[case("class Foo;")]
    #[case("class Foo(Base, other.Base) meta Meta { doc \"d\"; let x = 1; fn m(a); }")]
    fn test_parses(#[case] input: &str) {
        parse_unit_source(input)
            .unwrap_or_else(|e| panic!("failed to parse {input:?}: {e}"));
    }

    #[rstest]
    #[case("let x = ;")]
    #[case("use ;")]
    #[case("use pkg..sub::Name;")]
    #[case("marker a.b::C: widget;")]
    #[case("if typecheck { let x = 1;")]
    #[case("class (Base);")]
    #[case("let ~ = 1;")]
    #[case("export;")]
    fn test_rejects(#[case] input: &str) {
        assert!(parse_unit_source(input).is_err(), "accepted {input:?}");
    }

    #[test]
    fn test_use_attr_shape() {
        let source = parse_unit_source("use pkg.sub::Name as N;").unwrap();
        match &source.program[0] {
            Stmt::UseAttr { unit, attr, alias } => {
                assert_eq!(unit.as_str(), "pkg.sub");
                assert_eq!(attr, "Name");
                assert_eq!(alias.as_deref(), Some("N"));
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn test_static_block_nesting() {
        let source =
            parse_unit_source("if typecheck { use hints::A; let x = 1; }").unwrap();
        match &source.program[0] {
            Stmt::StaticOnly(body) => assert_eq!(body.len(), 2),
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn test_package_marker_detected() {
        assert!(parse_unit_source("package;").unwrap().is_package());
        assert!(!parse_unit_source("let x = 1;").unwrap().is_package());
    }

    #[test]
    fn test_source_text_retained() {
        let text = "let x = 1; # keep me";
        let source = parse_unit_source(text).unwrap();
        assert_eq!(&*source.text, text);
    }
}
