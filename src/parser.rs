//! Recursive-descent parser producing the declaration/statement/expression
//! tree consumed by the later passes.
//!
//! One function per grammar production, a precedence-climbing ladder for
//! expressions, and a thin [`TokenStream`] cursor as the only shared state.
//! Tokens are pulled from the lexer on demand; a one-slot buffer gives the
//! two productions that need it a second token of lookahead. Parsing stops
//! at the first mismatch – there is no error recovery.

use crate::ast::{
  BinaryOp, Block, Decl, DeclId, DeclKind, Expr, ExprKind, Function, Item, Program, Stmt, TypeSpec,
};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Lexer, Token, TokenKind};
use log::debug;

/// Parse a whole translation unit.
pub fn parse(lexer: Lexer) -> CompileResult<Program> {
  let mut stream = TokenStream::new(lexer)?;
  let mut program = Program::default();

  if stream.at(TokenKind::Eof) {
    return Err(CompileError::parse(stream.line(), "program is empty"));
  }

  while !stream.at(TokenKind::Eof) {
    parse_declaration(&mut stream, &mut program)?;
  }

  debug!(
    "parsed {} top-level items ({} functions)",
    program.items.len(),
    program.funcs.len()
  );
  Ok(program)
}

/// `declaration := type '*'? ID ( ';' | '[' NUM ']' ';' | '(' params ')' block )`
///
/// The token after the identifier disambiguates the three forms.
fn parse_declaration(stream: &mut TokenStream, program: &mut Program) -> CompileResult<()> {
  let type_token = stream.current.clone();
  if !type_token.kind.is_type_spec() {
    return Err(CompileError::parse(
      type_token.line,
      format!(
        "expected a type name to start a declaration, but got {}",
        type_token.describe()
      ),
    ));
  }
  stream.advance()?;
  let type_spec = type_spec_of(type_token.kind);
  let is_pointer = stream.eat(TokenKind::Star)?;
  let name = stream.expect(TokenKind::Ident, "a name")?;

  match stream.current.kind {
    TokenKind::Semicolon => {
      stream.advance()?;
      let id = program.add_decl(Decl::new(name.lexeme, name.line, type_spec, is_pointer, DeclKind::Scalar));
      program.items.push(Item::Global(id));
    }
    TokenKind::LBracket => {
      stream.advance()?;
      let size = parse_array_size(stream)?;
      stream.expect(TokenKind::RBracket, "']'")?;
      stream.expect(TokenKind::Semicolon, "';'")?;
      let id = program.add_decl(Decl::new(
        name.lexeme,
        name.line,
        type_spec,
        is_pointer,
        DeclKind::Array { size: Some(size) },
      ));
      program.items.push(Item::Global(id));
    }
    TokenKind::LParen => {
      if is_pointer {
        return Err(CompileError::parse(
          name.line,
          format!("function {} cannot be declared as a pointer", name.lexeme),
        ));
      }
      stream.advance()?;
      let params = parse_params(stream, program)?;
      stream.expect(TokenKind::RParen, "')'")?;
      let body = parse_block(stream, program)?;
      let id = program.add_decl(Decl::new(name.lexeme, name.line, type_spec, false, DeclKind::Func));
      program.funcs.push(Function {
        decl: id,
        params,
        body,
        frame_size: 0,
      });
      program.items.push(Item::Func(program.funcs.len() - 1));
    }
    _ => {
      return Err(CompileError::parse(
        stream.line(),
        format!(
          "expected ';', '[' or '(' after {}, but got {}",
          name.lexeme,
          stream.current.describe()
        ),
      ));
    }
  }
  Ok(())
}

/// `params := 'void' | ε | param (',' param)*` where
/// `param := type '*'? ID ('[' ']')?`. `(void)` and `()` both mean no
/// parameters; a size-less array parameter is passed by reference.
fn parse_params(stream: &mut TokenStream, program: &mut Program) -> CompileResult<Vec<DeclId>> {
  let mut params = Vec::new();

  if stream.at(TokenKind::RParen) {
    return Ok(params);
  }
  if stream.at(TokenKind::Void) && stream.peek_second()?.kind == TokenKind::RParen {
    stream.advance()?;
    return Ok(params);
  }

  loop {
    let type_token = stream.current.clone();
    if !type_token.kind.is_type_spec() {
      return Err(CompileError::parse(
        type_token.line,
        format!("expected a parameter type, but got {}", type_token.describe()),
      ));
    }
    stream.advance()?;
    let is_pointer = stream.eat(TokenKind::Star)?;
    let name = stream.expect(TokenKind::Ident, "a parameter name")?;
    let kind = if stream.eat(TokenKind::LBracket)? {
      stream.expect(TokenKind::RBracket, "']'")?;
      DeclKind::Array { size: None }
    } else {
      DeclKind::Scalar
    };

    let mut decl = Decl::new(name.lexeme, name.line, type_spec_of(type_token.kind), is_pointer, kind);
    decl.is_param = true;
    params.push(program.add_decl(decl));

    if !stream.eat(TokenKind::Comma)? {
      return Ok(params);
    }
  }
}

/// `block := '{' declaration* statement* '}'` – local declarations must
/// precede statements, and functions cannot be declared here.
fn parse_block(stream: &mut TokenStream, program: &mut Program) -> CompileResult<Block> {
  let open = stream.expect(TokenKind::LBrace, "'{'")?;
  let mut decls = Vec::new();

  while stream.current.kind.is_type_spec() {
    decls.push(parse_local_decl(stream, program)?);
  }

  let mut stmts = Vec::new();
  while !stream.at(TokenKind::RBrace) {
    stmts.push(parse_statement(stream, program)?);
  }
  stream.expect(TokenKind::RBrace, "'}'")?;

  Ok(Block {
    line: open.line,
    decls,
    stmts,
  })
}

fn parse_local_decl(stream: &mut TokenStream, program: &mut Program) -> CompileResult<DeclId> {
  let type_token = stream.current.clone();
  stream.advance()?;
  let is_pointer = stream.eat(TokenKind::Star)?;
  let name = stream.expect(TokenKind::Ident, "a name")?;

  let kind = match stream.current.kind {
    TokenKind::LBracket => {
      stream.advance()?;
      let size = parse_array_size(stream)?;
      stream.expect(TokenKind::RBracket, "']'")?;
      DeclKind::Array { size: Some(size) }
    }
    TokenKind::LParen => {
      return Err(CompileError::parse(
        name.line,
        format!("function {} cannot be declared inside a block", name.lexeme),
      ));
    }
    _ => DeclKind::Scalar,
  };
  stream.expect(TokenKind::Semicolon, "';'")?;

  Ok(program.add_decl(Decl::new(
    name.lexeme,
    name.line,
    type_spec_of(type_token.kind),
    is_pointer,
    kind,
  )))
}

fn parse_array_size(stream: &mut TokenStream) -> CompileResult<i64> {
  let token = stream.expect(TokenKind::Num, "an array size")?;
  parse_number(&token)
}

fn parse_statement(stream: &mut TokenStream, program: &mut Program) -> CompileResult<Stmt> {
  let line = stream.line();
  let current_kind = stream.current.kind;
  match current_kind {
    TokenKind::LBrace => Ok(Stmt::Compound(parse_block(stream, program)?)),
    TokenKind::If => {
      stream.advance()?;
      stream.expect(TokenKind::LParen, "'(' after if")?;
      let cond = parse_expr(stream)?;
      stream.expect(TokenKind::RParen, "')'")?;
      let then_branch = Box::new(parse_statement(stream, program)?);
      let else_branch = if stream.eat(TokenKind::Else)? {
        Some(Box::new(parse_statement(stream, program)?))
      } else {
        None
      };
      Ok(Stmt::If {
        cond,
        then_branch,
        else_branch,
        line,
      })
    }
    TokenKind::While => {
      stream.advance()?;
      stream.expect(TokenKind::LParen, "'(' after while")?;
      let cond = parse_expr(stream)?;
      stream.expect(TokenKind::RParen, "')'")?;
      let body = Box::new(parse_statement(stream, program)?);
      Ok(Stmt::While { cond, body, line })
    }
    TokenKind::Return => {
      stream.advance()?;
      let value = if stream.at(TokenKind::Semicolon) {
        None
      } else {
        Some(parse_expr(stream)?)
      };
      stream.expect(TokenKind::Semicolon, "';'")?;
      Ok(Stmt::Return { value, line })
    }
    TokenKind::Write => {
      stream.advance()?;
      let expr = parse_expr(stream)?;
      stream.expect(TokenKind::Semicolon, "';'")?;
      Ok(Stmt::Write { expr, line })
    }
    TokenKind::Writeln => {
      stream.advance()?;
      stream.expect(TokenKind::Semicolon, "';'")?;
      Ok(Stmt::Writeln { line })
    }
    // `read;` is a statement; `read(` starts an expression statement, so
    // one more token of lookahead settles it.
    TokenKind::Read if stream.peek_second()?.kind == TokenKind::Semicolon => {
      stream.advance()?;
      stream.advance()?;
      Ok(Stmt::Read { line })
    }
    kind if kind.is_type_spec() => Err(CompileError::parse(
      line,
      "declarations must come before statements in a block",
    )),
    _ => {
      let expr = parse_expr(stream)?;
      stream.expect(TokenKind::Semicolon, "';'")?;
      Ok(Stmt::Expr { expr, line })
    }
  }
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_assign(stream)
}

/// Assignment is right-associative and binds loosest.
fn parse_assign(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_comparison(stream)?;

  if stream.at(TokenKind::Assign) {
    let line = stream.line();
    stream.advance()?;
    let rhs = parse_assign(stream)?;
    return Ok(Expr::assign(node, rhs, line));
  }

  Ok(node)
}

/// At most one comparison per expression – the operators do not associate.
fn parse_comparison(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_additive(stream)?;

  let op = match stream.current.kind {
    TokenKind::Less => BinaryOp::Lt,
    TokenKind::LessEq => BinaryOp::Le,
    TokenKind::EqEq => BinaryOp::Eq,
    TokenKind::NotEq => BinaryOp::Ne,
    TokenKind::GreaterEq => BinaryOp::Ge,
    TokenKind::Greater => BinaryOp::Gt,
    _ => return Ok(node),
  };
  let line = stream.line();
  stream.advance()?;
  let rhs = parse_additive(stream)?;
  Ok(Expr::binary(op, node, rhs, line))
}

fn parse_additive(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_term(stream)?;

  loop {
    let op = match stream.current.kind {
      TokenKind::Plus => BinaryOp::Add,
      TokenKind::Minus => BinaryOp::Sub,
      _ => return Ok(node),
    };
    let line = stream.line();
    stream.advance()?;
    let rhs = parse_term(stream)?;
    node = Expr::binary(op, node, rhs, line);
  }
}

fn parse_term(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_unary(stream)?;

  loop {
    let op = match stream.current.kind {
      TokenKind::Star => BinaryOp::Mul,
      TokenKind::Slash => BinaryOp::Div,
      TokenKind::Percent => BinaryOp::Mod,
      _ => return Ok(node),
    };
    let line = stream.line();
    stream.advance()?;
    let rhs = parse_unary(stream)?;
    node = Expr::binary(op, node, rhs, line);
  }
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let line = stream.line();

  if stream.eat(TokenKind::Amp)? {
    let operand = parse_unary(stream)?;
    return Ok(Expr::new(
      ExprKind::AddrOf {
        operand: Box::new(operand),
      },
      line,
    ));
  }
  if stream.eat(TokenKind::Star)? {
    let operand = parse_unary(stream)?;
    return Ok(Expr::new(
      ExprKind::Deref {
        operand: Box::new(operand),
      },
      line,
    ));
  }
  if stream.eat(TokenKind::Minus)? {
    let operand = parse_unary(stream)?;
    return Ok(Expr::new(
      ExprKind::Neg {
        operand: Box::new(operand),
      },
      line,
    ));
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let token = stream.current.clone();

  match token.kind {
    TokenKind::Num => {
      stream.advance()?;
      Ok(Expr::number(parse_number(&token)?, token.line))
    }
    TokenKind::StrLit => {
      stream.advance()?;
      Ok(Expr::string(token.lexeme, token.line))
    }
    TokenKind::Read => {
      stream.advance()?;
      stream.expect(TokenKind::LParen, "'(' after read")?;
      stream.expect(TokenKind::RParen, "')'")?;
      Ok(Expr::new(ExprKind::ReadInt, token.line))
    }
    TokenKind::LParen => {
      stream.advance()?;
      let node = parse_expr(stream)?;
      stream.expect(TokenKind::RParen, "')'")?;
      Ok(node)
    }
    TokenKind::Ident => {
      stream.advance()?;
      match stream.current.kind {
        TokenKind::LParen => {
          stream.advance()?;
          let args = parse_args(stream)?;
          stream.expect(TokenKind::RParen, "')'")?;
          Ok(Expr::new(
            ExprKind::Call {
              name: token.lexeme,
              decl: None,
              args,
            },
            token.line,
          ))
        }
        TokenKind::LBracket => {
          stream.advance()?;
          let index = parse_expr(stream)?;
          stream.expect(TokenKind::RBracket, "']'")?;
          Ok(Expr::new(
            ExprKind::Index {
              name: token.lexeme,
              decl: None,
              index: Box::new(index),
            },
            token.line,
          ))
        }
        _ => Ok(Expr::var(token.lexeme, token.line)),
      }
    }
    _ => Err(CompileError::parse(
      token.line,
      format!("expected an expression, but got {}", token.describe()),
    )),
  }
}

fn parse_args(stream: &mut TokenStream) -> CompileResult<Vec<Expr>> {
  let mut args = Vec::new();
  if stream.at(TokenKind::RParen) {
    return Ok(args);
  }
  loop {
    args.push(parse_expr(stream)?);
    if !stream.eat(TokenKind::Comma)? {
      return Ok(args);
    }
  }
}

fn parse_number(token: &Token) -> CompileResult<i64> {
  token
    .lexeme
    .parse::<i64>()
    .map_err(|_| CompileError::parse(token.line, format!("integer literal {} is too large", token.lexeme)))
}

fn type_spec_of(kind: TokenKind) -> TypeSpec {
  match kind {
    TokenKind::Int => TypeSpec::Int,
    TokenKind::Str => TypeSpec::Str,
    TokenKind::Void => TypeSpec::Void,
    _ => panic!("not a type keyword"),
  }
}

/// Cursor over the pulled token sequence: the current token plus an
/// optional buffered second one for the two spots that need more lookahead.
struct TokenStream<'a> {
  lexer: Lexer<'a>,
  current: Token,
  buffered: Option<Token>,
}

impl<'a> TokenStream<'a> {
  fn new(mut lexer: Lexer<'a>) -> CompileResult<Self> {
    let current = lexer.next_token()?;
    Ok(Self {
      lexer,
      current,
      buffered: None,
    })
  }

  fn line(&self) -> usize {
    self.current.line
  }

  fn at(&self, kind: TokenKind) -> bool {
    self.current.kind == kind
  }

  /// Consume the current token and pull the next one.
  fn advance(&mut self) -> CompileResult<Token> {
    let next = match self.buffered.take() {
      Some(token) => token,
      None => self.lexer.next_token()?,
    };
    Ok(std::mem::replace(&mut self.current, next))
  }

  /// Look one token past the current one without consuming anything.
  fn peek_second(&mut self) -> CompileResult<&Token> {
    if self.buffered.is_none() {
      self.buffered = Some(self.lexer.next_token()?);
    }
    Ok(self.buffered.as_ref().expect("just buffered"))
  }

  /// Consume the current token if it matches, reporting what was expected
  /// otherwise. This is the workhorse for punctuation and keywords.
  fn expect(&mut self, kind: TokenKind, what: &str) -> CompileResult<Token> {
    if self.current.kind == kind {
      return self.advance();
    }
    Err(CompileError::parse(
      self.current.line,
      format!("expected {what}, but got {}", self.current.describe()),
    ))
  }

  /// Consume the current token if it matches the given kind.
  fn eat(&mut self, kind: TokenKind) -> CompileResult<bool> {
    if self.current.kind == kind {
      self.advance()?;
      return Ok(true);
    }
    Ok(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse_source(source: &str) -> CompileResult<Program> {
    parse(Lexer::new(source))
  }

  fn first_function(program: &Program) -> &Function {
    &program.funcs[0]
  }

  #[test]
  fn splits_declarations_by_following_token() {
    let program = parse_source("int x; int a[4]; int main(void) { return 0; }").unwrap();
    assert_eq!(program.items.len(), 3);
    assert_eq!(program.decls[0].kind, DeclKind::Scalar);
    assert_eq!(program.decls[1].kind, DeclKind::Array { size: Some(4) });
    assert!(program.decls[program.funcs[0].decl].is_function());
  }

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    let program = parse_source("int main(void) { write 2 + 3 * 4; }").unwrap();
    let Stmt::Write { expr, .. } = &first_function(&program).body.stmts[0] else {
      panic!("expected a write statement");
    };
    let ExprKind::Binary { op: BinaryOp::Add, rhs, .. } = &expr.kind else {
      panic!("expected + at the root");
    };
    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
  }

  #[test]
  fn assignment_is_right_associative() {
    let program = parse_source("int main(void) { int x; int y; x = y = 1; }").unwrap();
    let Stmt::Expr { expr, .. } = &first_function(&program).body.stmts[0] else {
      panic!("expected an expression statement");
    };
    let ExprKind::Assign { rhs, .. } = &expr.kind else {
      panic!("expected assignment at the root");
    };
    assert!(matches!(rhs.kind, ExprKind::Assign { .. }));
  }

  #[test]
  fn comparisons_do_not_associate() {
    assert!(parse_source("int main(void) { write 1 < 2 < 3; }").is_err());
  }

  #[test]
  fn else_attaches_to_nearest_if() {
    let program =
      parse_source("int main(void) { if (1) if (2) write 1; else write 2; }").unwrap();
    let Stmt::If { then_branch, else_branch, .. } = &first_function(&program).body.stmts[0] else {
      panic!("expected an if");
    };
    assert!(else_branch.is_none());
    assert!(matches!(**then_branch, Stmt::If { ref else_branch, .. } if else_branch.is_some()));
  }

  #[test]
  fn void_and_empty_parameter_lists_are_equivalent() {
    let a = parse_source("int f(void) { return 1; }").unwrap();
    let b = parse_source("int f() { return 1; }").unwrap();
    assert!(first_function(&a).params.is_empty());
    assert!(first_function(&b).params.is_empty());
  }

  #[test]
  fn array_parameters_have_no_size() {
    let program = parse_source("int sum(int a[], int n) { return 0; }").unwrap();
    let params = &first_function(&program).params;
    assert_eq!(program.decls[params[0]].kind, DeclKind::Array { size: None });
    assert!(program.decls[params[0]].is_param);
    assert_eq!(program.decls[params[1]].kind, DeclKind::Scalar);
  }

  #[test]
  fn rejects_pointer_to_function() {
    let err = parse_source("int *f(void) { return 0; }").unwrap_err();
    assert!(err.to_string().contains("pointer"));
  }

  #[test]
  fn rejects_function_inside_block() {
    let err = parse_source("int main(void) { int g(void) { } }").unwrap_err();
    assert!(err.to_string().contains("inside a block"));
  }

  #[test]
  fn rejects_declaration_after_statement() {
    let err = parse_source("int main(void) { write 1; int x; }").unwrap_err();
    assert!(err.to_string().contains("before statements"));
  }

  #[test]
  fn read_statement_versus_read_expression() {
    let program = parse_source("int main(void) { int x; read; x = read(); }").unwrap();
    let body = &first_function(&program).body;
    assert!(matches!(body.stmts[0], Stmt::Read { .. }));
    let Stmt::Expr { expr, .. } = &body.stmts[1] else {
      panic!("expected an expression statement");
    };
    let ExprKind::Assign { rhs, .. } = &expr.kind else {
      panic!("expected an assignment");
    };
    assert!(matches!(rhs.kind, ExprKind::ReadInt));
  }

  #[test]
  fn rejects_oversized_integer_literal() {
    let err = parse_source("int main(void) { write 99999999999999999999; }").unwrap_err();
    assert!(err.to_string().contains("too large"));
  }

  #[test]
  fn reports_first_error_with_line_number() {
    let err = parse_source("int main(void) {\n  write 1\n}").unwrap_err();
    assert!(err.to_string().starts_with("Parse error on line 3"));
  }
}
