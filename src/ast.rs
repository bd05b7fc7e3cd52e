/// AST node types for minijs.
/// The parser produces these; the interpreter consumes them read-only.
/// Every node carries the source line it started on, for diagnostics.

#[derive(Clone, Debug)]
pub struct Script {
    /// The whole program is one top-level block.
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Int(i32),
    Str(String),
}

#[derive(Clone, Debug)]
pub enum Expr {
    Block {
        instrs: Vec<Expr>,
        line: u32,
    },
    Literal {
        value: Constant,
        line: u32,
    },
    FunCall {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    LocalVarAccess {
        name: String,
        line: u32,
    },
    LocalVarAssignment {
        name: String,
        expr: Box<Expr>,
        /// true for `var x = e;`, false for `x = e;`
        declaration: bool,
        line: u32,
    },
    Fun {
        name: Option<String>,
        params: Vec<String>,
        body: Box<Expr>,
        line: u32,
    },
    Return {
        expr: Option<Box<Expr>>,
        line: u32,
    },
    If {
        condition: Box<Expr>,
        true_block: Box<Expr>,
        false_block: Box<Expr>,
        line: u32,
    },
    ObjectLiteral {
        inits: Vec<(String, Expr)>,
        line: u32,
    },
    FieldAccess {
        receiver: Box<Expr>,
        name: String,
        line: u32,
    },
    FieldAssignment {
        receiver: Box<Expr>,
        name: String,
        expr: Box<Expr>,
        line: u32,
    },
    MethodCall {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        line: u32,
    },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::Block { line, .. }
            | Expr::Literal { line, .. }
            | Expr::FunCall { line, .. }
            | Expr::LocalVarAccess { line, .. }
            | Expr::LocalVarAssignment { line, .. }
            | Expr::Fun { line, .. }
            | Expr::Return { line, .. }
            | Expr::If { line, .. }
            | Expr::ObjectLiteral { line, .. }
            | Expr::FieldAccess { line, .. }
            | Expr::FieldAssignment { line, .. }
            | Expr::MethodCall { line, .. } => *line,
        }
    }
}
