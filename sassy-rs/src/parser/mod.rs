//! Patch parser.
//!
//! A hand-written recursive-descent parser over the token stream produced by
//! [`lexer::Lexer`].  Parsing is all-or-nothing: the first problem aborts with
//! [`SassyError::Syntax`] and no partial AST is returned.
//!
//! Selector precedence (lowest → highest):
//!   combination `,`  →  child `>`  →  intersection (juxtaposition)
//!
//! Expression precedence (lowest → highest):
//!   `||`  →  `&&`  →  equality  →  relational  →  additive  →
//!   multiplicative  →  unary  →  postfix `[]`  →  primary

pub mod lexer;

use std::rc::Rc;

use crate::ast::{
    BinaryOp, Block, Conditional, Else, Expr, ExprKind, Function, FunctionStatement, Mixin,
    Parameter, Patch, Selector, SelectionBlock, SelectorAttribute, SelectorStatement, TopLevel,
    UnaryOp, VariableDeclaration,
};
use crate::error::{Coordinate, SassyError};
use crate::value::Value;
use lexer::{Lexer, Spanned, Token};

/// Deepest nesting of blocks, brackets and unary operators the parser accepts.
pub const MAX_NESTING: usize = 64;

/// Turns patch source text into a [`Patch`].
///
/// The [`Universe`](crate::universe::Universe) owns one of these; hosts may
/// substitute their own front end.
pub trait PatchParser {
    fn parse(&self, source: &str) -> Result<Patch, SassyError>;
}

/// The stock parser for the `.patch` surface syntax.
#[derive(Debug, Default, Clone, Copy)]
pub struct SassyParser;

impl PatchParser for SassyParser {
    fn parse(&self, source: &str) -> Result<Patch, SassyError> {
        parse_patch(source)
    }
}

/// Parse a whole patch file.
pub fn parse_patch(src: &str) -> Result<Patch, SassyError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens);
    let at = parser.at();
    let mut statements = Vec::new();
    while parser.peek() != &Token::Eof {
        statements.push(parser.parse_top_level()?);
    }
    Ok(Patch { at, statements })
}

/// Parse a standalone expression; trailing tokens are an error.
pub fn parse_expr(src: &str) -> Result<Expr, SassyError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    parser.expect(&Token::Eof, "end of expression")?;
    Ok(expr)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Integer(n) => format!("integer {n}"),
        Token::Real(x) => format!("real {x}"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Ident(s) => format!("'{s}'"),
        Token::Variable(s) => format!("'${s}'"),
        Token::At(s) => format!("'@{s}'"),
        Token::Hash(s) => format!("'#{s}'"),
        Token::Dot(s) => format!("'.{s}'"),
        Token::ColonName(s) => format!("':{s}'"),
        Token::Eof => "end of input".into(),
        other => format!("{other:?}"),
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SassyError>,
    ) -> Result<T, SassyError> {
        if self.depth >= MAX_NESTING {
            return Err(SassyError::syntax(
                self.at(),
                format!("nesting deeper than {MAX_NESTING} levels"),
            ));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn at(&self) -> Coordinate {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.at)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_directive(&self, name: &str) -> bool {
        matches!(self.peek(), Token::At(d) if d == name)
    }

    fn error<T>(&self, expected: &str) -> Result<T, SassyError> {
        Err(SassyError::syntax(
            self.at(),
            format!("expected {expected}, found {}", describe(self.peek())),
        ))
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), SassyError> {
        if self.eat(expected) {
            Ok(())
        } else {
            self.error(what)
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, SassyError> {
        match self.peek() {
            Token::Str(_) => match self.advance() {
                Token::Str(s) => Ok(s),
                _ => unreachable!(),
            },
            _ => self.error(what),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, SassyError> {
        match self.peek() {
            Token::Ident(_) => match self.advance() {
                Token::Ident(s) => Ok(s),
                _ => unreachable!(),
            },
            _ => self.error(what),
        }
    }

    /// `{ item* }`
    fn parse_block<S>(
        &mut self,
        item: fn(&mut Self) -> Result<S, SassyError>,
    ) -> Result<Vec<S>, SassyError> {
        self.expect(&Token::LBrace, "'{'")?;
        self.nested(|p| {
            let mut body = Vec::new();
            while !p.eat(&Token::RBrace) {
                if p.peek() == &Token::Eof {
                    return p.error("'}'");
                }
                body.push(item(p)?);
            }
            Ok(body)
        })
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_top_level(&mut self) -> Result<TopLevel, SassyError> {
        let at = self.at();
        match self.peek() {
            Token::At(d) => match d.clone().as_str() {
                "use" => {
                    self.advance();
                    let library = self.expect_string("library name string")?;
                    self.expect(&Token::Semicolon, "';'")?;
                    Ok(TopLevel::Import { at, library })
                }
                "define-stage" => {
                    self.advance();
                    let name = self.expect_string("stage name string")?;
                    self.expect(&Token::Colon, "':'")?;
                    let priority = match self.peek() {
                        Token::Integer(n) if *n >= 0 => *n as u64,
                        _ => return self.error("non-negative stage priority"),
                    };
                    self.advance();
                    self.expect(&Token::Semicolon, "';'")?;
                    Ok(TopLevel::Stage { at, name, priority })
                }
                "function" => Ok(TopLevel::Function(Rc::new(self.parse_function()?))),
                "mixin" => Ok(TopLevel::Mixin(Rc::new(self.parse_mixin()?))),
                "if" => Ok(TopLevel::Conditional(
                    self.parse_conditional(Self::parse_top_level)?,
                )),
                "require" | "require-not" | "stage" => {
                    Ok(TopLevel::Selection(Rc::new(self.parse_selection()?)))
                }
                _ => self.error("statement"),
            },
            Token::Variable(_) => Ok(TopLevel::Variable(self.parse_variable()?)),
            _ => Ok(TopLevel::Selection(Rc::new(self.parse_selection()?))),
        }
    }

    /// `$name: expr;`
    fn parse_variable(&mut self) -> Result<VariableDeclaration, SassyError> {
        let at = self.at();
        let name = match self.advance() {
            Token::Variable(name) => name,
            _ => return Err(SassyError::syntax(at, "expected variable")),
        };
        self.expect(&Token::Colon, "':'")?;
        let value = self.parse_expr()?;
        self.expect(&Token::Semicolon, "';'")?;
        Ok(VariableDeclaration { at, name, value })
    }

    /// `( $a, $b: default )`
    fn parse_params(&mut self) -> Result<Vec<Parameter>, SassyError> {
        let mut params = Vec::new();
        if !self.eat(&Token::LParen) {
            return Ok(params);
        }
        while !self.eat(&Token::RParen) {
            let name = match self.peek() {
                Token::Variable(_) => match self.advance() {
                    Token::Variable(n) => n,
                    _ => unreachable!(),
                },
                _ => return self.error("parameter"),
            };
            let default = if self.eat(&Token::Colon) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Parameter { name, default });
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen, "')'")?;
                break;
            }
        }
        Ok(params)
    }

    fn parse_function(&mut self) -> Result<Function, SassyError> {
        let at = self.at();
        self.advance();
        let name = self.expect_ident("function name")?;
        let params = self.parse_params()?;
        let body = self.parse_block(Self::parse_function_statement)?;
        Ok(Function {
            at,
            name,
            params,
            body,
        })
    }

    fn parse_function_statement(&mut self) -> Result<FunctionStatement, SassyError> {
        let at = self.at();
        match self.peek() {
            Token::Variable(_) => Ok(FunctionStatement::Variable(self.parse_variable()?)),
            _ if self.is_directive("return") => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(&Token::Semicolon, "';'")?;
                Ok(FunctionStatement::Return { at, value })
            }
            _ if self.is_directive("if") => Ok(FunctionStatement::Conditional(
                self.parse_conditional(Self::parse_function_statement)?,
            )),
            _ => self.error("function statement"),
        }
    }

    fn parse_mixin(&mut self) -> Result<Mixin, SassyError> {
        let at = self.at();
        self.advance();
        let name = self.expect_ident("mixin name")?;
        let params = self.parse_params()?;
        let body = self.parse_block(Self::parse_selector_statement)?;
        Ok(Mixin {
            at,
            name,
            params,
            body,
        })
    }

    /// `@if cond { … } [@else if cond { … }]* [@else { … }]`
    fn parse_conditional<S>(
        &mut self,
        item: fn(&mut Self) -> Result<S, SassyError>,
    ) -> Result<Conditional<S>, SassyError> {
        let at = self.at();
        self.advance();
        let condition = self.parse_expr()?;
        let body = self.parse_block(item)?;
        let otherwise = if self.is_directive("else") {
            self.advance();
            let else_at = self.at();
            if matches!(self.peek(), Token::Ident(kw) if kw == "if") {
                Some(Box::new(Else::If(self.nested(|p| p.parse_conditional(item))?)))
            } else {
                let body = self.parse_block(item)?;
                Some(Box::new(Else::Block(Block { at: else_at, body })))
            }
        } else {
            None
        };
        Ok(Conditional {
            at,
            condition,
            body,
            otherwise,
        })
    }

    // ── Selection blocks ──────────────────────────────────────────────────────

    fn parse_selection(&mut self) -> Result<SelectionBlock, SassyError> {
        let at = self.at();
        let mut attributes = Vec::new();
        loop {
            let attr_at = self.at();
            let kind = match self.peek() {
                Token::At(d) if d == "require" || d == "require-not" || d == "stage" => d.clone(),
                _ => break,
            };
            self.advance();
            let arg = self.expect_string("string after attribute")?;
            attributes.push(match kind.as_str() {
                "require" => SelectorAttribute::RequireMod {
                    at: attr_at,
                    guid: arg,
                },
                "require-not" => SelectorAttribute::RequireNotMod {
                    at: attr_at,
                    guid: arg,
                },
                _ => SelectorAttribute::RunAtStage {
                    at: attr_at,
                    stage: arg,
                },
            });
        }
        let selector = self.parse_selector()?;
        let body = self.parse_block(Self::parse_selector_statement)?;
        Ok(SelectionBlock {
            at,
            attributes,
            selector,
            body,
        })
    }

    fn parse_selector_statement(&mut self) -> Result<SelectorStatement, SassyError> {
        let at = self.at();
        match self.peek() {
            Token::Variable(_) => Ok(SelectorStatement::Variable(self.parse_variable()?)),
            Token::At(d) => match d.clone().as_str() {
                "include" => {
                    self.advance();
                    let mixin = self.expect_ident("mixin name")?;
                    let args = if self.peek() == &Token::LParen {
                        self.parse_args()?
                    } else {
                        Vec::new()
                    };
                    self.expect(&Token::Semicolon, "';'")?;
                    Ok(SelectorStatement::Include { at, mixin, args })
                }
                "if" => Ok(SelectorStatement::Conditional(
                    self.parse_conditional(Self::parse_selector_statement)?,
                )),
                "require" | "require-not" | "stage" => {
                    Ok(SelectorStatement::Selection(Rc::new(self.parse_selection()?)))
                }
                _ => self.error("selector statement"),
            },
            Token::Ident(_) | Token::Str(_)
                if matches!(
                    self.peek_at(1),
                    Token::Colon | Token::PlusColon | Token::LBracket
                ) =>
            {
                let field = match self.advance() {
                    Token::Ident(s) | Token::Str(s) => s,
                    _ => unreachable!(),
                };
                let mut indices = Vec::new();
                while self.eat(&Token::LBracket) {
                    indices.push(self.parse_expr()?);
                    self.expect(&Token::RBracket, "']'")?;
                }
                let merge = match self.peek() {
                    Token::Colon => false,
                    Token::PlusColon => true,
                    _ => return self.error("':' or '+:' after field"),
                };
                self.advance();
                if !merge && self.is_directive("delete") {
                    self.advance();
                    self.expect(&Token::Semicolon, "';'")?;
                    return Ok(SelectorStatement::DeleteValue { at, field, indices });
                }
                let value = self.parse_expr()?;
                self.expect(&Token::Semicolon, "';'")?;
                Ok(if merge {
                    SelectorStatement::MergeValue {
                        at,
                        field,
                        indices,
                        value,
                    }
                } else {
                    SelectorStatement::SetValue {
                        at,
                        field,
                        indices,
                        value,
                    }
                })
            }
            _ => Ok(SelectorStatement::Selection(Rc::new(self.parse_selection()?))),
        }
    }

    // ── Selectors ─────────────────────────────────────────────────────────────

    fn parse_selector(&mut self) -> Result<Selector, SassyError> {
        let mut lhs = self.parse_child_selector()?;
        while self.eat(&Token::Comma) {
            let rhs = self.parse_child_selector()?;
            lhs = Selector::Combination(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_child_selector(&mut self) -> Result<Selector, SassyError> {
        let mut lhs = self.parse_compound_selector()?;
        while self.eat(&Token::Gt) {
            let rhs = self.parse_compound_selector()?;
            lhs = Selector::Child(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn starts_simple_selector(&self) -> bool {
        matches!(
            self.peek(),
            Token::Star
                | Token::Ident(_)
                | Token::Hash(_)
                | Token::Dot(_)
                | Token::ColonName(_)
                | Token::Tilde
                | Token::Plus
        )
    }

    fn parse_compound_selector(&mut self) -> Result<Selector, SassyError> {
        let mut lhs = self.parse_simple_selector()?;
        while self.starts_simple_selector() {
            let rhs = self.parse_simple_selector()?;
            lhs = Selector::Intersection(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_simple_selector(&mut self) -> Result<Selector, SassyError> {
        if !self.starts_simple_selector() {
            return self.error("selector");
        }
        Ok(match self.advance() {
            Token::Star => Selector::Wildcard,
            Token::Ident(e) => Selector::Element(e),
            Token::Hash(n) => Selector::Name(n),
            Token::Dot(c) => Selector::Class(c),
            Token::ColonName(r) => Selector::Ruleset(r),
            Token::Tilde => match self.peek() {
                Token::Hash(_) | Token::Dot(_) => match self.advance() {
                    Token::Hash(n) => Selector::WithoutName(n),
                    Token::Dot(c) => Selector::WithoutClass(c),
                    _ => unreachable!(),
                },
                _ => return self.error("'#name' or '.class' after '~'"),
            },
            Token::Plus => Selector::ElementAddition(self.expect_ident("element type after '+'")?),
            _ => unreachable!(),
        })
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, SassyError> {
        self.nested(Self::parse_or)
    }

    /// One left-associative precedence level.
    fn parse_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, SassyError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, SassyError> {
        let mut lhs = next(self)?;
        while let Some(op) = op_for(self.peek()) {
            let at = self.at();
            self.advance();
            let rhs = next(self)?;
            lhs = Expr::binary(at, op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, SassyError> {
        self.parse_level(Self::parse_and, |t| match t {
            Token::Or => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> Result<Expr, SassyError> {
        self.parse_level(Self::parse_equality, |t| match t {
            Token::And => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Result<Expr, SassyError> {
        self.parse_level(Self::parse_relational, |t| match t {
            Token::EqEq => Some(BinaryOp::Equal),
            Token::Ne => Some(BinaryOp::NotEqual),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> Result<Expr, SassyError> {
        self.parse_level(Self::parse_additive, |t| match t {
            Token::Lt => Some(BinaryOp::Less),
            Token::Le => Some(BinaryOp::LessEqual),
            Token::Gt => Some(BinaryOp::Greater),
            Token::Ge => Some(BinaryOp::GreaterEqual),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, SassyError> {
        self.parse_level(Self::parse_multiplicative, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SassyError> {
        self.parse_level(Self::parse_unary, |t| match t {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            Token::Percent => Some(BinaryOp::Modulus),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, SassyError> {
        let at = self.at();
        let op = match self.peek() {
            Token::Minus => UnaryOp::Negate,
            Token::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let inner = self.nested(Self::parse_unary)?;
        Ok(Expr::new(at, ExprKind::Unary(op, Box::new(inner))))
    }

    fn parse_postfix(&mut self) -> Result<Expr, SassyError> {
        let mut expr = self.parse_primary()?;
        while self.peek() == &Token::LBracket {
            let at = self.at();
            self.advance();
            let index = self.parse_expr()?;
            self.expect(&Token::RBracket, "']'")?;
            expr = Expr::binary(at, BinaryOp::Subscript, expr, index);
        }
        Ok(expr)
    }

    /// `( expr, … )`
    fn parse_args(&mut self) -> Result<Vec<Expr>, SassyError> {
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.eat(&Token::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen, "')'")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, SassyError> {
        let at = self.at();
        let kind = match self.advance() {
            Token::Integer(n) => ExprKind::Literal(Value::Integer(n)),
            Token::Real(x) => ExprKind::Literal(Value::Real(x)),
            Token::Str(s) => ExprKind::Literal(Value::String(s)),
            Token::Variable(name) => ExprKind::Variable(name),
            Token::Ident(name) => match name.as_str() {
                "true" => ExprKind::Literal(Value::Boolean(true)),
                "false" => ExprKind::Literal(Value::Boolean(false)),
                "null" => ExprKind::Literal(Value::Null),
                _ if self.peek() == &Token::LParen => ExprKind::Call {
                    args: self.parse_args()?,
                    function: name,
                },
                // A bare word is a string literal.
                _ => ExprKind::Literal(Value::String(name)),
            },
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while !self.eat(&Token::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBracket, "']'")?;
                        break;
                    }
                }
                ExprKind::List(items)
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                while !self.eat(&Token::RBrace) {
                    let key = match self.peek() {
                        Token::Ident(k) | Token::Str(k) => k.clone(),
                        _ => return self.error("dictionary key"),
                    };
                    self.advance();
                    self.expect(&Token::Colon, "':'")?;
                    entries.push((key, self.parse_expr()?));
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBrace, "'}'")?;
                        break;
                    }
                }
                ExprKind::Dictionary(entries)
            }
            other => {
                return Err(SassyError::syntax(
                    at,
                    format!("expected expression, found {}", describe(&other)),
                ))
            }
        };
        Ok(Expr::new(at, kind))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
