//! Patch AST.
//!
//! Produced once per source file by a [`PatchParser`](crate::parser::PatchParser)
//! and never mutated afterwards.  Function, mixin and selection-block nodes
//! are reference-counted so the interpreter can bind or defer them without
//! copying subtrees.

use std::rc::Rc;

use crate::error::Coordinate;
use crate::value::Value;

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub at: Coordinate,
    pub statements: Vec<TopLevel>,
}

// ── Declarations and control ──────────────────────────────────────────────────

/// A statement allowed at file level (and inside top-level conditionals).
#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    /// `@use "mod:library";`
    Import { at: Coordinate, library: String },
    /// `$name: expr;`
    Variable(VariableDeclaration),
    /// `@define-stage "name": priority;`
    Stage {
        at: Coordinate,
        name: String,
        priority: u64,
    },
    Function(Rc<Function>),
    Mixin(Rc<Mixin>),
    Conditional(Conditional<TopLevel>),
    Selection(Rc<SelectionBlock>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub at: Coordinate,
    pub name: String,
    pub value: Expr,
}

/// A declared parameter, with an optional default evaluated at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub at: Coordinate,
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Vec<FunctionStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mixin {
    pub at: Coordinate,
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Vec<SelectorStatement>,
}

/// A statement inside a `@function` body.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionStatement {
    Variable(VariableDeclaration),
    Return { at: Coordinate, value: Expr },
    Conditional(Conditional<FunctionStatement>),
}

/// `@if cond { body } [@else …]`, generic over the statement family it guards.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional<S> {
    pub at: Coordinate,
    pub condition: Expr,
    pub body: Vec<S>,
    pub otherwise: Option<Box<Else<S>>>,
}

/// The else-branch of a [`Conditional`]: another conditional or a plain block.
#[derive(Debug, Clone, PartialEq)]
pub enum Else<S> {
    If(Conditional<S>),
    Block(Block<S>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block<S> {
    pub at: Coordinate,
    pub body: Vec<S>,
}

// ── Selection ─────────────────────────────────────────────────────────────────

/// `attributes selector { statements }`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionBlock {
    pub at: Coordinate,
    pub attributes: Vec<SelectorAttribute>,
    pub selector: Selector,
    pub body: Vec<SelectorStatement>,
}

impl SelectionBlock {
    /// The stage named by a `@stage` attribute, if any (the last one wins).
    pub fn stage(&self) -> Option<&str> {
        self.attributes.iter().rev().find_map(|a| match a {
            SelectorAttribute::RunAtStage { stage, .. } => Some(stage.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorAttribute {
    /// `@require "guid"`: run only when the mod is present.
    RequireMod { at: Coordinate, guid: String },
    /// `@require-not "guid"`: run only when the mod is absent.
    RequireNotMod { at: Coordinate, guid: String },
    /// `@stage "name"`: defer to the named stage.
    RunAtStage { at: Coordinate, stage: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `*`
    Wildcard,
    /// `part`
    Element(String),
    /// `#name`
    Name(String),
    /// `.class`
    Class(String),
    /// `:ruleset`
    Ruleset(String),
    /// `~.class`
    WithoutClass(String),
    /// `~#name`
    WithoutName(String),
    /// `a.b`: both match the same node.
    Intersection(Box<Selector>, Box<Selector>),
    /// `parent > child`
    Child(Box<Selector>, Box<Selector>),
    /// `a, b`
    Combination(Box<Selector>, Box<Selector>),
    /// `+element`: synthesize a new child rather than match.
    ElementAddition(String),
}

/// A statement executed against each matched node.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorStatement {
    /// `key[index]*: expr;`
    SetValue {
        at: Coordinate,
        field: String,
        /// Subscripts addressing an element inside the field's value.
        indices: Vec<Expr>,
        value: Expr,
    },
    /// `key[index]* +: expr;`
    MergeValue {
        at: Coordinate,
        field: String,
        indices: Vec<Expr>,
        value: Expr,
    },
    /// `key[index]*: @delete;`
    DeleteValue {
        at: Coordinate,
        field: String,
        indices: Vec<Expr>,
    },
    /// `$name: expr;`
    Variable(VariableDeclaration),
    /// `@include name(args);`
    Include {
        at: Coordinate,
        mixin: String,
        args: Vec<Expr>,
    },
    Conditional(Conditional<SelectorStatement>),
    /// A nested selection, matched against the current node's descendants.
    Selection(Rc<SelectionBlock>),
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Subscript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Variable(String),
    List(Vec<Expr>),
    Dictionary(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call { function: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub at: Coordinate,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(at: Coordinate, kind: ExprKind) -> Self {
        Expr { at, kind }
    }

    pub fn literal(at: Coordinate, value: impl Into<Value>) -> Self {
        Expr::new(at, ExprKind::Literal(value.into()))
    }

    pub fn binary(at: Coordinate, op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::new(at, ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)))
    }
}
