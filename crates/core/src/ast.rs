//! Abstract Syntax Tree for moxy
//!
//! Declarations, statements and expressions are sum types wrapped in a
//! small struct carrying the source position of the construct. Types are
//! canonical strings in the DSL of [`crate::types`]. Anything the parser
//! does not structurally recognize survives as a `Raw` node holding the
//! reconstructed C text.

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub kind: DeclKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Var(VarDecl),
    Enum(EnumDecl),
    Func(FuncDecl),
    /// Verbatim C fragment reconstructed from its tokens
    Raw(String),
}

/// `type name = value;`, used both at top level and as a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: String,
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub ret: String,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub is_main: bool,
    /// `Future<T>` return type: lowers to args struct + thread fn + launcher
    pub returns_future: bool,
}

impl EnumDecl {
    /// A simple enum has no payload on any variant and lowers to a plain
    /// C enum; anything else is a tagged enum.
    pub fn is_simple(&self) -> bool {
        self.variants.iter().all(|v| v.fields.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Print(Expr),
    /// Argument plus the source line baked into the failure message
    Assert(Expr),
    Match(MatchStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    ForIn(ForInStmt),
    Return(Option<Expr>),
    Var(VarDecl),
    Assign(AssignStmt),
    Expr(Expr),
    Block(Vec<Stmt>),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchStmt {
    pub target: String,
    pub arms: Vec<MatchArm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Box<Stmt>,
}

/// `Enum::Variant(binding)`; an empty `enum_name` is the `Ok`/`Err`
/// shorthand for `Result` targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub enum_name: String,
    pub variant: String,
    pub binding: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Box<Stmt>,
    pub cond: Expr,
    pub step: Box<Stmt>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForInStmt {
    /// One or two loop variables; two bind (index, value) on a list and
    /// (key, value) on a map
    pub vars: Vec<String>,
    pub iter: ForIter,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForIter {
    /// Half-open `a..b`
    Range(Expr, Expr),
    /// A list or map value
    Value(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub target: Expr,
    pub op: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    /// Lexeme kept verbatim so suffixes and hex forms survive
    IntLit(String),
    FloatLit(String),
    /// Contents without quotes, escapes verbatim
    StrLit(String),
    CharLit(String),
    BoolLit(bool),
    Null,
    EnumInit {
        enum_name: String,
        variant: String,
        args: Vec<Expr>,
    },
    ListLit(Vec<Expr>),
    /// `{}`, an empty map initializer
    MapLit,
    OkExpr(Box<Expr>),
    ErrExpr(Box<Expr>),
    Field {
        target: Box<Expr>,
        name: String,
        /// `->` written in the source (preserved on emission)
        arrow: bool,
    },
    Method {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        arrow: bool,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
        /// Distinguishes `p++` from `++p`
        postfix: bool,
    },
    Paren(Box<Expr>),
    Ternary {
        cond: Box<Expr>,
        then_val: Box<Expr>,
        else_val: Box<Expr>,
    },
    Cast {
        ty: String,
        operand: Box<Expr>,
    },
    Await(Box<Expr>),
    Lambda {
        id: usize,
        params: Vec<Param>,
        body: LambdaBody,
    },
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize, col: usize) -> Self {
        Expr { kind, line, col }
    }

    /// The identifier name, if this expression is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind, line: usize, col: usize) -> Self {
        Stmt { kind, line, col }
    }
}

impl Decl {
    pub fn new(kind: DeclKind, line: usize, col: usize) -> Self {
        Decl { kind, line, col }
    }
}
