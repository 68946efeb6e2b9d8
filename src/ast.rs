//! The tree data model shared by the parser and every later pass.
//!
//! Declarations live in a single arena owned by [`Program`]; everything else
//! refers to them through [`DeclId`] indices, so a declaration link is a
//! lookup and never an ownership edge. The parser builds the tree once; the
//! checker and the code generator only fill in annotation fields
//! (`decl`, `ty`, `offset`, `frame_size`) and never restructure it.

/// Index into [`Program::decls`].
pub type DeclId = usize;

/// Declared (written-down) type of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSpec {
  Int,
  Str,
  Void,
}

impl TypeSpec {
  pub fn name(self) -> &'static str {
    match self {
      TypeSpec::Int => "int",
      TypeSpec::Str => "string",
      TypeSpec::Void => "void",
    }
  }
}

/// Derived type of an expression, computed bottom-up by the checker.
/// `Void` only ever labels a call to a `void` function and is rejected
/// anywhere a value is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
  Int,
  Str,
  IntPtr,
  StrPtr,
  Void,
}

impl ValueType {
  pub fn name(self) -> &'static str {
    match self {
      ValueType::Int => "int",
      ValueType::Str => "string",
      ValueType::IntPtr => "pointer to int",
      ValueType::StrPtr => "pointer to string",
      ValueType::Void => "void",
    }
  }

  pub fn is_pointer(self) -> bool {
    matches!(self, ValueType::IntPtr | ValueType::StrPtr)
  }
}

/// What a declaration introduces. Size-less arrays only appear as function
/// parameters (`int a[]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
  Scalar,
  Array { size: Option<i64> },
  Func,
}

/// One declaration record in the arena: a global or local scalar, an array,
/// a parameter, or a function (where `type_spec` is the return type).
///
/// `offset` and `is_param` are filled in by the code generator's offset
/// pass; an `offset` of `None` after that pass means the name has static
/// storage (a global).
#[derive(Debug, Clone)]
pub struct Decl {
  pub name: String,
  pub line: usize,
  pub type_spec: TypeSpec,
  pub is_pointer: bool,
  pub kind: DeclKind,
  pub offset: Option<i64>,
  pub is_param: bool,
}

impl Decl {
  pub fn new(name: impl Into<String>, line: usize, type_spec: TypeSpec, is_pointer: bool, kind: DeclKind) -> Self {
    Self {
      name: name.into(),
      line,
      type_spec,
      is_pointer,
      kind,
      offset: None,
      is_param: false,
    }
  }

  pub fn is_function(&self) -> bool {
    matches!(self.kind, DeclKind::Func)
  }
}

/// A function body or nested `{ ... }` block: local declarations first,
/// then statements, both in source order.
#[derive(Debug, Clone)]
pub struct Block {
  pub line: usize,
  pub decls: Vec<DeclId>,
  pub stmts: Vec<Stmt>,
}

/// A declared function. `frame_size` is the total local-variable storage in
/// bytes, accumulated by the offset pass across all nested blocks.
#[derive(Debug, Clone)]
pub struct Function {
  pub decl: DeclId,
  pub params: Vec<DeclId>,
  pub body: Block,
  pub frame_size: i64,
}

/// Top-level item in source order. Order matters twice: names become
/// visible to the checker in this order, and functions are emitted in it.
#[derive(Debug, Clone, Copy)]
pub enum Item {
  Global(DeclId),
  Func(usize),
}

/// A whole translation unit: the declaration arena plus the top level.
#[derive(Debug, Clone, Default)]
pub struct Program {
  pub decls: Vec<Decl>,
  pub items: Vec<Item>,
  pub funcs: Vec<Function>,
}

impl Program {
  pub fn add_decl(&mut self, decl: Decl) -> DeclId {
    self.decls.push(decl);
    self.decls.len() - 1
  }
}

/// Statement forms of the language.
#[derive(Debug, Clone)]
pub enum Stmt {
  Expr { expr: Expr, line: usize },
  Compound(Block),
  If {
    cond: Expr,
    then_branch: Box<Stmt>,
    else_branch: Option<Box<Stmt>>,
    line: usize,
  },
  While {
    cond: Expr,
    body: Box<Stmt>,
    line: usize,
  },
  Return { value: Option<Expr>, line: usize },
  Write { expr: Expr, line: usize },
  Writeln { line: usize },
  Read { line: usize },
}

/// Binary operators. Arithmetic and comparison share one enum; the parser
/// keeps their precedence apart and the checker tells them apart again via
/// [`BinaryOp::is_comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl BinaryOp {
  pub fn is_comparison(self) -> bool {
    matches!(
      self,
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
    )
  }

  pub fn symbol(self) -> &'static str {
    match self {
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Mod => "%",
      BinaryOp::Eq => "==",
      BinaryOp::Ne => "!=",
      BinaryOp::Lt => "<",
      BinaryOp::Le => "<=",
      BinaryOp::Gt => ">",
      BinaryOp::Ge => ">=",
    }
  }
}

/// Expression tree node. `ty` is `None` out of the parser and `Some` after
/// the checker; the same goes for the `decl` links inside [`ExprKind`].
#[derive(Debug, Clone)]
pub struct Expr {
  pub kind: ExprKind,
  pub line: usize,
  pub ty: Option<ValueType>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
  Num { value: i64 },
  Str { value: String },
  /// The `read()` primary: consumes one integer from standard input.
  ReadInt,
  Var {
    name: String,
    decl: Option<DeclId>,
  },
  Index {
    name: String,
    decl: Option<DeclId>,
    index: Box<Expr>,
  },
  Call {
    name: String,
    decl: Option<DeclId>,
    args: Vec<Expr>,
  },
  Assign { lhs: Box<Expr>, rhs: Box<Expr> },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Neg { operand: Box<Expr> },
  AddrOf { operand: Box<Expr> },
  Deref { operand: Box<Expr> },
}

impl Expr {
  pub fn new(kind: ExprKind, line: usize) -> Self {
    Self {
      kind,
      line,
      ty: None,
    }
  }

  pub fn number(value: i64, line: usize) -> Self {
    Self::new(ExprKind::Num { value }, line)
  }

  pub fn string(value: impl Into<String>, line: usize) -> Self {
    Self::new(
      ExprKind::Str {
        value: value.into(),
      },
      line,
    )
  }

  pub fn var(name: impl Into<String>, line: usize) -> Self {
    Self::new(
      ExprKind::Var {
        name: name.into(),
        decl: None,
      },
      line,
    )
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, line: usize) -> Self {
    Self::new(
      ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      line,
    )
  }

  pub fn assign(lhs: Expr, rhs: Expr, line: usize) -> Self {
    Self::new(
      ExprKind::Assign {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      line,
    )
  }

  /// Type assigned by the checker. Panics when called before checking;
  /// reaching that is a compiler defect, not a user error.
  pub fn value_type(&self) -> ValueType {
    self.ty.expect("expression type is assigned before use")
  }
}
