//! Lexical analysis: turns the raw input string into a stream of tokens.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond recognising keywords, operators and literals. It is pull-based:
//! the parser asks for one token at a time via [`Lexer::next_token`], and
//! the lexer keeps a cursor plus a running line counter so every token can
//! be blamed on a source line. Two-character operators are matched before
//! single-character ones to avoid ambiguity.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Ident,
  Num,
  StrLit,
  // keywords
  Int,
  Void,
  Str,
  If,
  Else,
  While,
  Return,
  Write,
  Writeln,
  Read,
  // punctuation
  Semicolon,
  Comma,
  LBracket,
  RBracket,
  LBrace,
  RBrace,
  LParen,
  RParen,
  // operators
  Less,
  LessEq,
  EqEq,
  NotEq,
  GreaterEq,
  Greater,
  Assign,
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  Amp,
  Eof,
}

impl TokenKind {
  /// True for the keywords that can open a declaration.
  pub fn is_type_spec(self) -> bool {
    matches!(self, TokenKind::Int | TokenKind::Void | TokenKind::Str)
  }
}

/// Thin wrapper for lexical information needed by later stages. Tokens are
/// immutable once produced.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub line: usize,
}

impl Token {
  /// Convenience constructor to keep the scanning loop readable.
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
    Self {
      kind,
      lexeme: lexeme.into(),
      line,
    }
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(&self) -> String {
    match self.kind {
      TokenKind::Eof => "end of input".to_string(),
      _ => format!("\"{}\"", self.lexeme),
    }
  }
}

/// Reclassify an identifier run as a keyword where it matches the fixed
/// keyword table.
fn keyword_kind(text: &str) -> Option<TokenKind> {
  let kind = match text {
    "int" => TokenKind::Int,
    "void" => TokenKind::Void,
    "string" => TokenKind::Str,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "return" => TokenKind::Return,
    "write" => TokenKind::Write,
    "writeln" => TokenKind::Writeln,
    "read" => TokenKind::Read,
    _ => return None,
  };
  Some(kind)
}

/// Pull-based scanner over a source string.
pub struct Lexer<'a> {
  source: &'a str,
  pos: usize,
  line: usize,
  line_start: usize,
}

impl<'a> Lexer<'a> {
  pub fn new(source: &'a str) -> Self {
    Self {
      source,
      pos: 0,
      line: 1,
      line_start: 0,
    }
  }

  /// Produce the next token, skipping whitespace and block comments. Once
  /// the end of input is reached every further call returns `Eof` again.
  pub fn next_token(&mut self) -> CompileResult<Token> {
    let bytes = self.source.as_bytes();

    loop {
      while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
        if bytes[self.pos] == b'\n' {
          self.line += 1;
          self.line_start = self.pos + 1;
        }
        self.pos += 1;
      }

      if self.pos >= bytes.len() {
        return Ok(Token::new(TokenKind::Eof, "", self.line));
      }

      if bytes[self.pos] == b'/' && bytes.get(self.pos + 1) == Some(&b'*') {
        self.skip_comment()?;
        continue;
      }

      return self.scan_token();
    }
  }

  /// Skip a `/* ... */` comment, keeping the line counter honest across
  /// embedded newlines. The error for an unterminated comment is anchored
  /// at the line where the comment began.
  fn skip_comment(&mut self) -> CompileResult<()> {
    let bytes = self.source.as_bytes();
    let start_line = self.line;
    self.pos += 2;

    loop {
      if self.pos >= bytes.len() {
        return Err(CompileError::lex(
          start_line,
          "block comment is never closed",
        ));
      }
      if bytes[self.pos] == b'*' && bytes.get(self.pos + 1) == Some(&b'/') {
        self.pos += 2;
        return Ok(());
      }
      if bytes[self.pos] == b'\n' {
        self.line += 1;
        self.line_start = self.pos + 1;
      }
      self.pos += 1;
    }
  }

  fn scan_token(&mut self) -> CompileResult<Token> {
    let bytes = self.source.as_bytes();
    let c = bytes[self.pos];

    if c.is_ascii_digit() {
      let start = self.pos;
      self.pos += 1;
      while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
        self.pos += 1;
      }
      let text = &self.source[start..self.pos];
      return Ok(Token::new(TokenKind::Num, text, self.line));
    }

    if c.is_ascii_alphabetic() {
      let start = self.pos;
      self.pos += 1;
      while self.pos < bytes.len() && bytes[self.pos].is_ascii_alphanumeric() {
        self.pos += 1;
      }
      let text = &self.source[start..self.pos];
      let kind = keyword_kind(text).unwrap_or(TokenKind::Ident);
      return Ok(Token::new(kind, text, self.line));
    }

    if c == b'"' {
      return self.scan_string();
    }

    // Two-character operators need one character of lookahead; each falls
    // back to its one-character form when the second character is absent.
    let two = |next: u8| bytes.get(self.pos + 1) == Some(&next);
    let (kind, len) = match c {
      b'<' if two(b'=') => (TokenKind::LessEq, 2),
      b'<' => (TokenKind::Less, 1),
      b'>' if two(b'=') => (TokenKind::GreaterEq, 2),
      b'>' => (TokenKind::Greater, 1),
      b'=' if two(b'=') => (TokenKind::EqEq, 2),
      b'=' => (TokenKind::Assign, 1),
      b'!' if two(b'=') => (TokenKind::NotEq, 2),
      b';' => (TokenKind::Semicolon, 1),
      b',' => (TokenKind::Comma, 1),
      b'[' => (TokenKind::LBracket, 1),
      b']' => (TokenKind::RBracket, 1),
      b'{' => (TokenKind::LBrace, 1),
      b'}' => (TokenKind::RBrace, 1),
      b'(' => (TokenKind::LParen, 1),
      b')' => (TokenKind::RParen, 1),
      b'+' => (TokenKind::Plus, 1),
      b'-' => (TokenKind::Minus, 1),
      b'*' => (TokenKind::Star, 1),
      b'/' => (TokenKind::Slash, 1),
      b'%' => (TokenKind::Percent, 1),
      b'&' => (TokenKind::Amp, 1),
      _ => {
        let column = self.pos - self.line_start + 1;
        let invalid = self.source[self.pos..].chars().next().unwrap_or('\0');
        return Err(CompileError::lex(
          self.line,
          format!("unrecognized character '{invalid}' at column {column}"),
        ));
      }
    };

    let text = &self.source[self.pos..self.pos + len];
    self.pos += len;
    Ok(Token::new(kind, text, self.line))
  }

  /// Scan a `"..."` literal. The lexeme is the content between the quotes;
  /// a newline or end of input before the closing quote is an error.
  fn scan_string(&mut self) -> CompileResult<Token> {
    let bytes = self.source.as_bytes();
    let start = self.pos + 1;
    let mut end = start;

    while end < bytes.len() && bytes[end] != b'"' && bytes[end] != b'\n' {
      end += 1;
    }
    if end >= bytes.len() || bytes[end] == b'\n' {
      return Err(CompileError::lex(self.line, "string literal is never closed"));
    }

    let text = &self.source[start..end];
    self.pos = end + 1;
    Ok(Token::new(TokenKind::StrLit, text, self.line))
  }
}

/// Lex the whole input into a flat vector of tokens terminated by an `Eof`
/// marker. The parser pulls tokens on demand instead; this is the
/// convenience entry point for tests and tooling.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
  let mut lexer = Lexer::new(source);
  let mut tokens = Vec::new();
  loop {
    let token = lexer.next_token()?;
    let done = token.kind == TokenKind::Eof;
    tokens.push(token);
    if done {
      return Ok(tokens);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|t| t.kind)
      .collect()
  }

  #[test]
  fn classifies_keywords_and_identifiers() {
    assert_eq!(
      kinds("int x while whilex"),
      vec![
        TokenKind::Int,
        TokenKind::Ident,
        TokenKind::While,
        TokenKind::Ident,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn maximal_munch_for_numbers_and_identifiers() {
    let tokens = tokenize("count12 345").unwrap();
    assert_eq!(tokens[0].lexeme, "count12");
    assert_eq!(tokens[1].lexeme, "345");
  }

  #[test]
  fn two_character_operators_fall_back_to_one() {
    assert_eq!(
      kinds("<= < == = >= > !="),
      vec![
        TokenKind::LessEq,
        TokenKind::Less,
        TokenKind::EqEq,
        TokenKind::Assign,
        TokenKind::GreaterEq,
        TokenKind::Greater,
        TokenKind::NotEq,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn lone_bang_is_an_error() {
    let err = tokenize("x ! y").unwrap_err();
    assert!(err.to_string().contains("Lexical error on line 1"));
    assert!(err.to_string().contains("column 3"));
  }

  #[test]
  fn division_is_not_a_comment() {
    assert_eq!(
      kinds("a / b"),
      vec![
        TokenKind::Ident,
        TokenKind::Slash,
        TokenKind::Ident,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn comments_may_span_lines_and_lines_keep_counting() {
    let tokens = tokenize("a /* one\ntwo\nthree */ b").unwrap();
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[1].kind, TokenKind::Ident);
    assert_eq!(tokens[1].line, 3);
  }

  #[test]
  fn unterminated_comment_reports_opening_line() {
    let err = tokenize("x;\n/* never closed\n\n").unwrap_err();
    assert_eq!(err.line(), 2);
    assert!(err.to_string().contains("never closed"));
  }

  #[test]
  fn string_literals_keep_their_content() {
    let tokens = tokenize("write \"hello there\";").unwrap();
    assert_eq!(tokens[1].kind, TokenKind::StrLit);
    assert_eq!(tokens[1].lexeme, "hello there");
  }

  #[test]
  fn unterminated_string_is_an_error() {
    assert!(tokenize("write \"oops;\n").is_err());
    assert!(tokenize("write \"oops").is_err());
  }

  #[test]
  fn eof_is_sticky() {
    let mut lexer = Lexer::new("x");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Ident);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
  }

  #[test]
  fn token_stream_is_invariant_under_relexing() {
    let source = "int  main ( void ) {\n  write 1+2 ; /* layout */\n}";
    let first = tokenize(source).unwrap();
    let pretty: Vec<String> = first.iter().map(|t| t.lexeme.clone()).collect();
    let second = tokenize(&pretty.join(" ")).unwrap();
    let a: Vec<_> = first.iter().map(|t| (t.kind, t.lexeme.clone())).collect();
    let b: Vec<_> = second.iter().map(|t| (t.kind, t.lexeme.clone())).collect();
    assert_eq!(a, b);
  }
}
