//! Semantic analysis: two sequential passes over the tree built by the
//! parser, both fail-fast.
//!
//! Pass 1 walks every statement with an explicit [`ScopeStack`] and binds
//! each variable, array and call expression to the [`DeclId`] that
//! introduced its name. Pass 2 derives a [`ValueType`] for every expression
//! bottom-up and enforces the statement rules (condition types, return
//! types, write operands). After a successful run every identifier-bearing
//! expression carries a declaration link and every expression a type.

use crate::ast::{
  Block, Decl, DeclId, DeclKind, Expr, ExprKind, Item, Program, Stmt, TypeSpec, ValueType,
};
use crate::error::{CompileError, CompileResult};
use log::{debug, trace};
use std::collections::HashMap;

/// Resolve references, then derive and validate types.
pub fn check(program: &mut Program) -> CompileResult<()> {
  resolve_references(program)?;
  check_types(program)?;
  debug!("checked {} declarations", program.decls.len());
  Ok(())
}

/// Ordered name-to-declaration mappings implementing lexical shadowing.
/// Lookup scans from the innermost scope outward; the first match wins.
/// Function names live only in the outermost scope, which is why calls are
/// resolved through [`ScopeStack::lookup_global`].
pub struct ScopeStack {
  scopes: Vec<HashMap<String, DeclId>>,
}

impl ScopeStack {
  pub fn new() -> Self {
    Self {
      scopes: vec![HashMap::new()],
    }
  }

  pub fn push_scope(&mut self) {
    self.scopes.push(HashMap::new());
  }

  pub fn pop_scope(&mut self) {
    if self.scopes.len() > 1 {
      self.scopes.pop();
    }
  }

  /// Bind a name in the innermost scope. Returns the previous binding when
  /// the name is already taken in that scope.
  pub fn declare(&mut self, name: &str, id: DeclId) -> Result<(), DeclId> {
    let scope = self.scopes.last_mut().expect("at least the global scope");
    if let Some(&prev) = scope.get(name) {
      return Err(prev);
    }
    scope.insert(name.to_string(), id);
    Ok(())
  }

  pub fn lookup(&self, name: &str) -> Option<DeclId> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).copied())
  }

  pub fn lookup_global(&self, name: &str) -> Option<DeclId> {
    self.scopes[0].get(name).copied()
  }
}

// --- Pass 1: reference resolution ---

fn resolve_references(program: &mut Program) -> CompileResult<()> {
  let Program { decls, items, funcs } = program;
  let mut scopes = ScopeStack::new();

  // Top-level names become visible in source order, and a function's own
  // name is bound before its body so direct recursion resolves.
  for item in items.iter() {
    match item {
      Item::Global(id) => declare(decls, &mut scopes, *id)?,
      Item::Func(index) => {
        let func = &mut funcs[*index];
        declare(decls, &mut scopes, func.decl)?;
        scopes.push_scope();
        for &param in &func.params {
          declare(decls, &mut scopes, param)?;
        }
        resolve_block(&mut func.body, decls, &mut scopes)?;
        scopes.pop_scope();
      }
    }
  }
  Ok(())
}

fn declare(decls: &[Decl], scopes: &mut ScopeStack, id: DeclId) -> CompileResult<()> {
  let decl = &decls[id];
  scopes.declare(&decl.name, id).map_err(|prev| {
    CompileError::type_error(
      decl.line,
      format!(
        "{} is already declared on line {}",
        decl.name, decls[prev].line
      ),
    )
  })
}

fn resolve_block(block: &mut Block, decls: &[Decl], scopes: &mut ScopeStack) -> CompileResult<()> {
  scopes.push_scope();
  for &local in &block.decls {
    declare(decls, scopes, local)?;
  }
  for stmt in &mut block.stmts {
    resolve_stmt(stmt, decls, scopes)?;
  }
  scopes.pop_scope();
  Ok(())
}

fn resolve_stmt(stmt: &mut Stmt, decls: &[Decl], scopes: &mut ScopeStack) -> CompileResult<()> {
  match stmt {
    Stmt::Expr { expr, .. } | Stmt::Write { expr, .. } => resolve_expr(expr, decls, scopes),
    Stmt::Compound(block) => resolve_block(block, decls, scopes),
    Stmt::If {
      cond,
      then_branch,
      else_branch,
      ..
    } => {
      resolve_expr(cond, decls, scopes)?;
      resolve_stmt(then_branch, decls, scopes)?;
      if let Some(else_branch) = else_branch {
        resolve_stmt(else_branch, decls, scopes)?;
      }
      Ok(())
    }
    Stmt::While { cond, body, .. } => {
      resolve_expr(cond, decls, scopes)?;
      resolve_stmt(body, decls, scopes)
    }
    Stmt::Return { value, .. } => {
      if let Some(value) = value {
        resolve_expr(value, decls, scopes)?;
      }
      Ok(())
    }
    Stmt::Writeln { .. } | Stmt::Read { .. } => Ok(()),
  }
}

fn resolve_expr(expr: &mut Expr, decls: &[Decl], scopes: &mut ScopeStack) -> CompileResult<()> {
  let line = expr.line;
  match &mut expr.kind {
    ExprKind::Var { name, decl } => {
      let id = scopes
        .lookup(name)
        .ok_or_else(|| CompileError::type_error(line, format!("undeclared variable {name}")))?;
      trace!(
        "variable {name} on line {line} linked to declaration on line {}",
        decls[id].line
      );
      *decl = Some(id);
      Ok(())
    }
    ExprKind::Index { name, decl, index } => {
      let id = scopes
        .lookup(name)
        .ok_or_else(|| CompileError::type_error(line, format!("undeclared array {name}")))?;
      trace!(
        "array {name} on line {line} linked to declaration on line {}",
        decls[id].line
      );
      *decl = Some(id);
      resolve_expr(index, decls, scopes)
    }
    ExprKind::Call { name, decl, args } => {
      let id = scopes
        .lookup_global(name)
        .ok_or_else(|| CompileError::type_error(line, format!("undeclared function {name}")))?;
      trace!(
        "call to {name} on line {line} linked to declaration on line {}",
        decls[id].line
      );
      *decl = Some(id);
      for arg in args {
        resolve_expr(arg, decls, scopes)?;
      }
      Ok(())
    }
    ExprKind::Assign { lhs, rhs } | ExprKind::Binary { lhs, rhs, .. } => {
      resolve_expr(lhs, decls, scopes)?;
      resolve_expr(rhs, decls, scopes)
    }
    ExprKind::Neg { operand } | ExprKind::AddrOf { operand } | ExprKind::Deref { operand } => {
      resolve_expr(operand, decls, scopes)
    }
    ExprKind::Num { .. } | ExprKind::Str { .. } | ExprKind::ReadInt => Ok(()),
  }
}

// --- Pass 2: type derivation and checking ---

/// Per-function signatures the call rule needs, keyed by the declaration
/// the call expression was linked to in pass 1.
type Signatures = HashMap<DeclId, Vec<DeclId>>;

fn check_types(program: &mut Program) -> CompileResult<()> {
  let Program { decls, items, funcs } = program;
  let signatures: Signatures = funcs
    .iter()
    .map(|func| (func.decl, func.params.clone()))
    .collect();

  // Every data declaration is validated before any body is looked at, so
  // call checking can assume all parameters are well-typed.
  for item in items.iter() {
    if let Item::Global(id) = item {
      check_data_decl(decls, *id)?;
    }
  }
  for func in funcs.iter() {
    for &param in &func.params {
      check_data_decl(decls, param)?;
    }
  }

  for func in funcs.iter_mut() {
    let return_type = decls[func.decl].type_spec;
    check_block(&mut func.body, decls, &signatures, return_type)?;
  }
  Ok(())
}

/// The declaration rules shared by globals, parameters and block locals:
/// nothing but a function may be `void`, and array elements are never
/// pointers.
fn check_data_decl(decls: &[Decl], id: DeclId) -> CompileResult<()> {
  let decl = &decls[id];
  if decl.type_spec == TypeSpec::Void {
    return Err(CompileError::type_error(
      decl.line,
      format!("{} cannot be declared void", decl.name),
    ));
  }
  if decl.is_pointer && matches!(decl.kind, DeclKind::Array { .. }) {
    return Err(CompileError::type_error(
      decl.line,
      format!("{} cannot be an array of pointers", decl.name),
    ));
  }
  Ok(())
}

fn check_block(
  block: &mut Block,
  decls: &[Decl],
  signatures: &Signatures,
  return_type: TypeSpec,
) -> CompileResult<()> {
  for &local in &block.decls {
    check_data_decl(decls, local)?;
  }
  for stmt in &mut block.stmts {
    check_stmt(stmt, decls, signatures, return_type)?;
  }
  Ok(())
}

fn check_stmt(
  stmt: &mut Stmt,
  decls: &[Decl],
  signatures: &Signatures,
  return_type: TypeSpec,
) -> CompileResult<()> {
  match stmt {
    Stmt::Expr { expr, .. } => {
      check_expr(expr, decls, signatures)?;
      Ok(())
    }
    Stmt::Compound(block) => check_block(block, decls, signatures, return_type),
    Stmt::If {
      cond,
      then_branch,
      else_branch,
      line,
    } => {
      let ty = check_expr(cond, decls, signatures)?;
      if ty != ValueType::Int {
        return Err(CompileError::type_error(
          *line,
          format!("if condition must be an int, not {}", ty.name()),
        ));
      }
      check_stmt(then_branch, decls, signatures, return_type)?;
      if let Some(else_branch) = else_branch {
        check_stmt(else_branch, decls, signatures, return_type)?;
      }
      Ok(())
    }
    Stmt::While { cond, body, line } => {
      let ty = check_expr(cond, decls, signatures)?;
      if ty != ValueType::Int {
        return Err(CompileError::type_error(
          *line,
          format!("while condition must be an int, not {}", ty.name()),
        ));
      }
      check_stmt(body, decls, signatures, return_type)
    }
    Stmt::Return { value, line } => check_return(value.as_mut(), *line, decls, signatures, return_type),
    Stmt::Write { expr, line } => {
      let ty = check_expr(expr, decls, signatures)?;
      if !matches!(ty, ValueType::Int | ValueType::Str) {
        return Err(CompileError::type_error(
          *line,
          format!("write requires an int or string value, not {}", ty.name()),
        ));
      }
      Ok(())
    }
    Stmt::Writeln { .. } | Stmt::Read { .. } => Ok(()),
  }
}

fn check_return(
  value: Option<&mut Expr>,
  line: usize,
  decls: &[Decl],
  signatures: &Signatures,
  return_type: TypeSpec,
) -> CompileResult<()> {
  match (return_type, value) {
    (TypeSpec::Void, None) => Ok(()),
    (TypeSpec::Void, Some(_)) => Err(CompileError::type_error(
      line,
      "a void function cannot return a value",
    )),
    (expected, None) => Err(CompileError::type_error(
      line,
      format!("a {} function must return a value", expected.name()),
    )),
    (expected, Some(value)) => {
      let ty = check_expr(value, decls, signatures)?;
      let wanted = match expected {
        TypeSpec::Int => ValueType::Int,
        TypeSpec::Str => ValueType::Str,
        TypeSpec::Void => unreachable!("handled above"),
      };
      if ty != wanted {
        return Err(CompileError::type_error(
          line,
          format!(
            "return type mismatch: expected {}, got {}",
            wanted.name(),
            ty.name()
          ),
        ));
      }
      Ok(())
    }
  }
}

/// The assignment compatibility rule: exact match, except a pointer on the
/// left also accepts a plain int (addresses are ints in this language, as
/// `&` produces them).
fn assignable(lhs: ValueType, rhs: ValueType) -> bool {
  lhs == rhs || (lhs.is_pointer() && rhs == ValueType::Int)
}

/// The type a use of this declaration has: scalars read as their base or
/// pointer type, array names decay to a pointer to their element type.
fn decl_value_type(decl: &Decl) -> ValueType {
  let base = match decl.type_spec {
    TypeSpec::Int => ValueType::Int,
    TypeSpec::Str => ValueType::Str,
    TypeSpec::Void => unreachable!("void data declarations are rejected"),
  };
  let pointerish = decl.is_pointer || matches!(decl.kind, DeclKind::Array { .. });
  if pointerish {
    match base {
      ValueType::Int => ValueType::IntPtr,
      ValueType::Str => ValueType::StrPtr,
      _ => unreachable!(),
    }
  } else {
    base
  }
}

/// Derive the type of an expression bottom-up, validating as we go and
/// leaving the result on the node.
fn check_expr(expr: &mut Expr, decls: &[Decl], signatures: &Signatures) -> CompileResult<ValueType> {
  let line = expr.line;
  let ty = match &mut expr.kind {
    ExprKind::Num { .. } | ExprKind::ReadInt => ValueType::Int,
    ExprKind::Str { .. } => ValueType::Str,

    ExprKind::Var { name, decl } => {
      let decl = &decls[decl.expect("reference resolution runs first")];
      if decl.is_function() {
        return Err(CompileError::type_error(
          line,
          format!("{name} is a function and cannot be used as a variable"),
        ));
      }
      decl_value_type(decl)
    }

    ExprKind::Index { name, decl, index } => {
      let array = &decls[decl.expect("reference resolution runs first")];
      if !matches!(array.kind, DeclKind::Array { .. }) {
        return Err(CompileError::type_error(
          line,
          format!("{name} is not an array"),
        ));
      }
      let index_ty = check_expr(index, decls, signatures)?;
      if index_ty != ValueType::Int {
        return Err(CompileError::type_error(
          line,
          format!("array index must be an int, not {}", index_ty.name()),
        ));
      }
      match array.type_spec {
        TypeSpec::Int => ValueType::Int,
        TypeSpec::Str => ValueType::Str,
        TypeSpec::Void => unreachable!("void data declarations are rejected"),
      }
    }

    ExprKind::Call { name, decl, args } => {
      let id = decl.expect("reference resolution runs first");
      let callee = &decls[id];
      if !callee.is_function() {
        return Err(CompileError::type_error(
          line,
          format!("{name} is not a function"),
        ));
      }
      let params = signatures.get(&id).expect("every function has a signature");
      if args.len() != params.len() {
        return Err(CompileError::type_error(
          line,
          format!(
            "{name} expects {} arguments, but got {}",
            params.len(),
            args.len()
          ),
        ));
      }
      let name = name.clone();
      for (position, (arg, &param)) in args.iter_mut().zip(params.iter()).enumerate() {
        let arg_ty = check_expr(arg, decls, signatures)?;
        let wanted = decl_value_type(&decls[param]);
        if !assignable(wanted, arg_ty) {
          return Err(CompileError::type_error(
            arg.line,
            format!(
              "argument {} to {name} must be {}, not {}",
              position + 1,
              wanted.name(),
              arg_ty.name()
            ),
          ));
        }
      }
      match callee.type_spec {
        TypeSpec::Int => ValueType::Int,
        TypeSpec::Str => ValueType::Str,
        TypeSpec::Void => ValueType::Void,
      }
    }

    ExprKind::Assign { lhs, rhs } => {
      let lhs_ty = check_expr(lhs, decls, signatures)?;
      match &lhs.kind {
        ExprKind::Var { name, decl } => {
          let decl = &decls[decl.expect("reference resolution runs first")];
          if matches!(decl.kind, DeclKind::Array { .. }) {
            return Err(CompileError::type_error(
              line,
              format!("cannot assign to array {name}"),
            ));
          }
        }
        ExprKind::Index { .. } | ExprKind::Deref { .. } => {}
        _ => {
          return Err(CompileError::type_error(
            line,
            "left side of assignment is not assignable",
          ));
        }
      }
      let rhs_ty = check_expr(rhs, decls, signatures)?;
      if !assignable(lhs_ty, rhs_ty) {
        return Err(CompileError::type_error(
          line,
          format!("cannot assign {} to {}", rhs_ty.name(), lhs_ty.name()),
        ));
      }
      lhs_ty
    }

    ExprKind::Binary { op, lhs, rhs } => {
      let op = *op;
      let lhs_ty = check_expr(lhs, decls, signatures)?;
      let rhs_ty = check_expr(rhs, decls, signatures)?;
      if op.is_comparison() {
        if lhs_ty == ValueType::Void || rhs_ty == ValueType::Void {
          return Err(CompileError::type_error(line, "cannot compare void values"));
        }
        if lhs_ty != rhs_ty {
          return Err(CompileError::type_error(
            line,
            format!(
              "operands of {} must have matching types, got {} and {}",
              op.symbol(),
              lhs_ty.name(),
              rhs_ty.name()
            ),
          ));
        }
        // The shared operand type; downstream only ever treats the result
        // as an int-shaped boolean.
        lhs_ty
      } else {
        if lhs_ty != ValueType::Int || rhs_ty != ValueType::Int {
          return Err(CompileError::type_error(
            line,
            format!(
              "operands of {} must be ints, got {} and {}",
              op.symbol(),
              lhs_ty.name(),
              rhs_ty.name()
            ),
          ));
        }
        ValueType::Int
      }
    }

    ExprKind::Neg { operand } => {
      let ty = check_expr(operand, decls, signatures)?;
      if ty != ValueType::Int {
        return Err(CompileError::type_error(
          line,
          format!("operand of unary - must be an int, not {}", ty.name()),
        ));
      }
      ValueType::Int
    }

    ExprKind::AddrOf { operand } => {
      check_expr(operand, decls, signatures)?;
      let is_lvalue = match &operand.kind {
        ExprKind::Var { decl, .. } => {
          let decl = &decls[decl.expect("reference resolution runs first")];
          matches!(decl.kind, DeclKind::Scalar)
        }
        ExprKind::Index { .. } => true,
        _ => false,
      };
      if !is_lvalue {
        return Err(CompileError::type_error(
          line,
          "& requires a variable or an array element",
        ));
      }
      // Addresses are plain integers in this language.
      ValueType::Int
    }

    ExprKind::Deref { operand } => {
      let ty = check_expr(operand, decls, signatures)?;
      match ty {
        ValueType::IntPtr => ValueType::Int,
        ValueType::StrPtr => ValueType::Str,
        other => {
          return Err(CompileError::type_error(
            line,
            format!("cannot dereference {}", other.name()),
          ));
        }
      }
    }
  };

  expr.ty = Some(ty);
  Ok(ty)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser;
  use crate::tokenizer::Lexer;

  fn check_source(source: &str) -> CompileResult<Program> {
    let mut program = parser::parse(Lexer::new(source))?;
    check(&mut program)?;
    Ok(program)
  }

  fn error_of(source: &str) -> String {
    check_source(source).unwrap_err().to_string()
  }

  #[test]
  fn shadowing_resolves_to_the_innermost_declaration() {
    let program =
      check_source("int x;\nint f(void) {\n  int x;\n  x = 1;\n  return x;\n}").unwrap();
    let Stmt::Expr { expr, .. } = &program.funcs[0].body.stmts[0] else {
      panic!("expected an expression statement");
    };
    let ExprKind::Assign { lhs, .. } = &expr.kind else {
      panic!("expected an assignment");
    };
    let ExprKind::Var { decl: Some(id), .. } = &lhs.kind else {
      panic!("expected a resolved variable");
    };
    assert_eq!(program.decls[*id].line, 3, "must link to the local x");
  }

  #[test]
  fn undeclared_identifier_is_reported_with_its_line() {
    let err = error_of("int main(void) {\n  y = 1;\n  return 0;\n}");
    assert_eq!(err, "Type error on line 2: undeclared variable y");
  }

  #[test]
  fn assignment_across_int_and_string_is_rejected() {
    let err = error_of("int x;\nvoid f(void) {\n  string s;\n  x = s;\n}");
    assert!(err.contains("cannot assign string to int"));
  }

  #[test]
  fn comparison_across_int_and_string_is_rejected() {
    let err = error_of("int main(void) { string s; if (s == 1) write 1; return 0; }");
    assert!(err.contains("matching types"));
  }

  #[test]
  fn non_integer_array_index_is_rejected() {
    let err = error_of("int a[3];\nint main(void) {\n  a[\"x\"];\n  return 0;\n}");
    assert!(err.contains("array index must be an int"));
  }

  #[test]
  fn string_function_cannot_return_an_int() {
    let err = error_of("string f(void) { return 5; }");
    assert!(err.contains("expected string, got int"));
  }

  #[test]
  fn void_function_cannot_return_a_value() {
    let err = error_of("void f(void) { return 5; }");
    assert!(err.contains("void function cannot return a value"));
  }

  #[test]
  fn non_void_function_must_return_a_value() {
    let err = error_of("int f(void) { return; }");
    assert!(err.contains("must return a value"));
  }

  #[test]
  fn void_variable_declarations_are_rejected() {
    assert!(error_of("void x; int main(void) { return 0; }").contains("declared void"));
    assert!(error_of("int main(void) { void y; return 0; }").contains("declared void"));
  }

  #[test]
  fn arrays_of_pointers_are_rejected() {
    assert!(error_of("int *a[3]; int main(void) { return 0; }").contains("array of pointers"));
  }

  #[test]
  fn pointer_accepts_an_address() {
    assert!(check_source("int main(void) { int x; int *p; p = &x; *p = 3; return x; }").is_ok());
  }

  #[test]
  fn address_of_requires_a_variable_or_element() {
    let err = error_of("int main(void) { int x; x = &(1 + 2); return 0; }");
    assert!(err.contains("& requires"));
  }

  #[test]
  fn dereferencing_a_non_pointer_is_rejected() {
    let err = error_of("int main(void) { int x; return *x; }");
    assert!(err.contains("cannot dereference int"));
  }

  #[test]
  fn condition_must_be_an_int() {
    assert!(error_of("int main(void) { if (\"s\") write 1; return 0; }").contains("if condition"));
    assert!(
      error_of("int main(void) { while (\"s\") write 1; return 0; }").contains("while condition")
    );
  }

  #[test]
  fn calls_resolve_through_the_global_scope() {
    let source = "int f(void) { return 1; }\nint main(void) {\n  int f;\n  f = 2;\n  return f();\n}";
    assert!(check_source(source).is_ok());
  }

  #[test]
  fn argument_count_must_match() {
    let err = error_of("int f(int a, int b) { return a; }\nint main(void) { return f(1); }");
    assert!(err.contains("expects 2 arguments, but got 1"));
  }

  #[test]
  fn argument_types_must_match() {
    let err = error_of("int f(int a) { return a; }\nint main(void) { return f(\"s\"); }");
    assert!(err.contains("argument 1 to f must be int"));
  }

  #[test]
  fn array_argument_matches_array_parameter() {
    let source = "int first(int a[]) { return a[0]; }\nint data[4];\nint main(void) { return first(data); }";
    assert!(check_source(source).is_ok());
  }

  #[test]
  fn void_call_is_a_statement_but_not_a_value() {
    assert!(check_source("void f(void) { return; }\nint main(void) { f(); return 0; }").is_ok());
    let err = error_of("void f(void) { return; }\nint main(void) { return 1 + f(); }");
    assert!(err.contains("must be ints"));
  }

  #[test]
  fn redeclaration_in_the_same_scope_is_rejected() {
    let err = error_of("int main(void) { int x; int x; return 0; }");
    assert!(err.contains("already declared"));
  }

  #[test]
  fn function_name_cannot_be_used_as_a_variable() {
    let err = error_of("int f(void) { return 1; }\nint main(void) { return f + 1; }");
    assert!(err.contains("cannot be used as a variable"));
  }

  #[test]
  fn every_expression_gets_a_type() {
    let program = check_source("int main(void) { int x; x = 1 + 2; return x; }").unwrap();
    let Stmt::Expr { expr, .. } = &program.funcs[0].body.stmts[0] else {
      panic!("expected an expression statement");
    };
    assert_eq!(expr.ty, Some(ValueType::Int));
  }
}
