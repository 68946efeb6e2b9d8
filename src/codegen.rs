//! Code generation: lower the checked tree into AT&T x86-64 assembly.
//!
//! Two passes. The offset pass assigns every parameter and local its frame
//! offset and caches each function's total local-storage size. The emission
//! pass then walks the annotated tree and writes assembly text.
//!
//! The emitter uses a fixed accumulator-plus-stack protocol: every
//! expression leaves its value in `%rax`, and binary operators park the
//! left operand on the machine stack while the right one is evaluated.
//! `%rbx` serves as the frame pointer and is saved by callers around every
//! call; locals sit below it at negative offsets, parameters above it.
//! Jump and string labels come from one monotonically increasing counter
//! owned by the emitter, so no label is ever produced twice.
//!
//! Input is assumed fully resolved and type-checked; a missing annotation
//! here is a compiler defect, not a user error.

use crate::ast::{BinaryOp, Block, Decl, DeclKind, Expr, ExprKind, Function, Item, Program, Stmt, ValueType};
use log::debug;
use std::collections::HashMap;

/// Assign frame offsets, then emit the whole translation unit.
pub fn generate(program: &mut Program) -> String {
  assign_offsets(program);
  let mut emitter = Emitter::new();
  emitter.run(program);
  emitter.asm
}

// --- Offset pass ---

fn assign_offsets(program: &mut Program) {
  let Program { decls, funcs, .. } = program;

  for func in funcs.iter_mut() {
    let mut offset = 0;
    for &param in &func.params {
      offset += 8;
      decls[param].offset = Some(offset);
    }

    let lowest = assign_block_offsets(&func.body, 0, decls);
    func.frame_size = -lowest;
    debug!(
      "function {}: {} parameters, frame size {}",
      decls[func.decl].name,
      func.params.len(),
      func.frame_size
    );
  }
}

/// Walk a block giving each local the next slot down, then find the lowest
/// offset any nested statement reaches. Sibling blocks reuse the same
/// region, so the frame only needs the deepest path.
fn assign_block_offsets(block: &Block, mut offset: i64, decls: &mut Vec<Decl>) -> i64 {
  for &local in &block.decls {
    let size = match decls[local].kind {
      DeclKind::Array { size } => 8 * size.expect("local arrays always carry a size"),
      _ => 8,
    };
    offset -= size;
    decls[local].offset = Some(offset);
  }

  let mut lowest = offset;
  for stmt in &block.stmts {
    lowest = lowest.min(assign_stmt_offsets(stmt, offset, decls));
  }
  lowest
}

fn assign_stmt_offsets(stmt: &Stmt, offset: i64, decls: &mut Vec<Decl>) -> i64 {
  match stmt {
    Stmt::Compound(block) => assign_block_offsets(block, offset, decls),
    Stmt::If {
      then_branch,
      else_branch,
      ..
    } => {
      let mut lowest = assign_stmt_offsets(then_branch, offset, decls);
      if let Some(else_branch) = else_branch {
        lowest = lowest.min(assign_stmt_offsets(else_branch, offset, decls));
      }
      lowest
    }
    Stmt::While { body, .. } => assign_stmt_offsets(body, offset, decls),
    _ => offset,
  }
}

// --- Emission pass ---

struct Emitter {
  asm: String,
  next_label: usize,
  string_labels: HashMap<String, String>,
  strings: Vec<(String, String)>,
}

impl Emitter {
  fn new() -> Self {
    Self {
      asm: String::new(),
      next_label: 0,
      string_labels: HashMap::new(),
      strings: Vec::new(),
    }
  }

  /// A fresh jump label; the counter is shared with string labels.
  fn fresh_label(&mut self) -> String {
    let label = format!(".L{}", self.next_label);
    self.next_label += 1;
    label
  }

  /// The label of an interned string literal, allocating one on first use.
  fn intern_string(&mut self, content: &str) -> String {
    if let Some(label) = self.string_labels.get(content) {
      return label.clone();
    }
    let label = format!(".LS{}", self.next_label);
    self.next_label += 1;
    self.string_labels.insert(content.to_string(), label.clone());
    self.strings.push((label.clone(), content.to_string()));
    label
  }

  fn ins(&mut self, text: impl AsRef<str>) {
    self.asm.push_str("    ");
    self.asm.push_str(text.as_ref());
    self.asm.push('\n');
  }

  fn raw(&mut self, text: impl AsRef<str>) {
    self.asm.push_str(text.as_ref());
    self.asm.push('\n');
  }

  fn label(&mut self, name: &str) {
    self.asm.push_str(name);
    self.asm.push_str(":\n");
  }

  fn run(&mut self, program: &Program) {
    // String literals must be known before the data section is written,
    // so they are interned in a pre-walk over every function body.
    for func in &program.funcs {
      self.collect_strings_block(&func.body);
    }

    self.emit_header(program);
    for item in &program.items {
      if let Item::Func(index) = item {
        self.emit_function(&program.funcs[*index], &program.decls);
      }
    }
  }

  fn collect_strings_block(&mut self, block: &Block) {
    for stmt in &block.stmts {
      self.collect_strings_stmt(stmt);
    }
  }

  fn collect_strings_stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::Expr { expr, .. } | Stmt::Write { expr, .. } => self.collect_strings_expr(expr),
      Stmt::Compound(block) => self.collect_strings_block(block),
      Stmt::If {
        cond,
        then_branch,
        else_branch,
        ..
      } => {
        self.collect_strings_expr(cond);
        self.collect_strings_stmt(then_branch);
        if let Some(else_branch) = else_branch {
          self.collect_strings_stmt(else_branch);
        }
      }
      Stmt::While { cond, body, .. } => {
        self.collect_strings_expr(cond);
        self.collect_strings_stmt(body);
      }
      Stmt::Return { value, .. } => {
        if let Some(value) = value {
          self.collect_strings_expr(value);
        }
      }
      Stmt::Writeln { .. } | Stmt::Read { .. } => {}
    }
  }

  fn collect_strings_expr(&mut self, expr: &Expr) {
    match &expr.kind {
      ExprKind::Str { value } => {
        self.intern_string(value);
      }
      ExprKind::Index { index, .. } => self.collect_strings_expr(index),
      ExprKind::Call { args, .. } => {
        for arg in args {
          self.collect_strings_expr(arg);
        }
      }
      ExprKind::Assign { lhs, rhs } | ExprKind::Binary { lhs, rhs, .. } => {
        self.collect_strings_expr(lhs);
        self.collect_strings_expr(rhs);
      }
      ExprKind::Neg { operand } | ExprKind::AddrOf { operand } | ExprKind::Deref { operand } => {
        self.collect_strings_expr(operand)
      }
      ExprKind::Num { .. } | ExprKind::Var { .. } | ExprKind::ReadInt => {}
    }
  }

  /// The fixed format strings, the interned literals, storage for the
  /// globals, and the entry-point marker.
  fn emit_header(&mut self, program: &Program) {
    self.raw(".section .rodata");
    self.raw(".WriteIntString: .string \"%d \"");
    self.raw(".WritelnString: .string \"\\n\"");
    self.raw(".WriteStringString: .string \"%s \"");
    self.raw(".ArrayOverflowString: .string \"You fell off the end of an array.\\n\"");
    self.raw(".ReadIntString: .string \"%d\"");

    let strings = std::mem::take(&mut self.strings);
    for (label, content) in &strings {
      self.raw(format!("{label}: .string \"{}\"", escape_string(content)));
    }

    for item in &program.items {
      if let Item::Global(id) = item {
        let decl = &program.decls[*id];
        let size = match decl.kind {
          DeclKind::Array { size } => 8 * size.expect("global arrays always carry a size"),
          _ => 8,
        };
        self.raw(format!(".comm {},{},8", decl.name, size));
      }
    }

    self.raw(".text");
    self.raw(".globl main");
  }

  fn emit_function(&mut self, func: &Function, decls: &[Decl]) {
    let name = &decls[func.decl].name;
    self.label(name);
    self.ins("movq %rsp, %rbx          # set up the frame pointer");
    if func.frame_size > 0 {
      self.ins(format!("subq ${}, %rsp          # allocate locals", func.frame_size));
    }

    // Every return funnels through this label so the deallocation below
    // always runs, whatever the path out of the body.
    let epilogue = self.fresh_label();
    self.emit_block(&func.body, decls, &epilogue);

    self.label(&epilogue);
    if func.frame_size > 0 {
      self.ins(format!("addq ${}, %rsp          # deallocate locals", func.frame_size));
    }
    self.ins("ret");
  }

  fn emit_block(&mut self, block: &Block, decls: &[Decl], epilogue: &str) {
    for stmt in &block.stmts {
      self.emit_stmt(stmt, decls, epilogue);
    }
  }

  fn emit_stmt(&mut self, stmt: &Stmt, decls: &[Decl], epilogue: &str) {
    match stmt {
      Stmt::Expr { expr, .. } => {
        self.emit_expr(expr, decls);
      }
      Stmt::Compound(block) => self.emit_block(block, decls, epilogue),

      Stmt::Write { expr, .. } => {
        self.emit_expr(expr, decls);
        let format = match expr.value_type() {
          ValueType::Int => ".WriteIntString",
          ValueType::Str => ".WriteStringString",
          other => panic!("write on a {} value survived checking", other.name()),
        };
        self.ins("movq %rax, %rsi");
        self.ins(format!("movq ${format}, %rdi"));
        self.ins("movl $0, %eax");
        self.ins("call printf");
      }
      Stmt::Writeln { .. } => {
        self.ins("movq $.WritelnString, %rdi");
        self.ins("movl $0, %eax");
        self.ins("call printf");
      }
      Stmt::Read { .. } => {
        self.emit_read();
      }

      Stmt::If {
        cond,
        then_branch,
        else_branch,
        ..
      } => {
        self.emit_expr(cond, decls);
        self.ins("cmpq $0, %rax");
        match else_branch {
          Some(else_branch) => {
            let else_label = self.fresh_label();
            let cont_label = self.fresh_label();
            self.ins(format!("je {else_label}"));
            self.emit_stmt(then_branch, decls, epilogue);
            self.ins(format!("jmp {cont_label}"));
            self.label(&else_label);
            self.emit_stmt(else_branch, decls, epilogue);
            self.label(&cont_label);
          }
          None => {
            let cont_label = self.fresh_label();
            self.ins(format!("je {cont_label}"));
            self.emit_stmt(then_branch, decls, epilogue);
            self.label(&cont_label);
          }
        }
      }

      Stmt::While { cond, body, .. } => {
        let top_label = self.fresh_label();
        let end_label = self.fresh_label();
        self.label(&top_label);
        self.emit_expr(cond, decls);
        self.ins("cmpq $0, %rax");
        self.ins(format!("je {end_label}"));
        self.emit_stmt(body, decls, epilogue);
        self.ins(format!("jmp {top_label}          # re-evaluate the condition"));
        self.label(&end_label);
      }

      Stmt::Return { value, .. } => {
        if let Some(value) = value {
          self.emit_expr(value, decls);
        }
        self.ins(format!("jmp {epilogue}"));
      }
    }
  }

  /// Evaluate an expression into `%rax`.
  fn emit_expr(&mut self, expr: &Expr, decls: &[Decl]) {
    match &expr.kind {
      ExprKind::Num { value } => {
        self.ins(format!("movq ${value}, %rax"));
      }
      ExprKind::Str { value } => {
        let label = self.intern_string(value);
        self.ins(format!("movq ${label}, %rax"));
      }
      ExprKind::ReadInt => self.emit_read(),

      ExprKind::Var { decl, .. } => {
        let decl = &decls[decl.expect("references are resolved before emission")];
        match decl.kind {
          DeclKind::Scalar => {
            let operand = scalar_operand(decl);
            self.ins(format!("movq {operand}, %rax"));
          }
          // A bare array name evaluates to the array's address.
          DeclKind::Array { .. } => self.emit_array_base(decl, "%rax"),
          DeclKind::Func => panic!("function name survived checking as a variable"),
        }
      }

      ExprKind::Index { decl, index, .. } => {
        let decl = &decls[decl.expect("references are resolved before emission")];
        self.emit_element_addr(decl, index, decls);
        self.ins("movq (%rax), %rax");
      }

      ExprKind::AddrOf { operand } => self.emit_addr(operand, decls),

      ExprKind::Deref { operand } => {
        self.emit_expr(operand, decls);
        self.ins("movq (%rax), %rax");
      }

      ExprKind::Assign { lhs, rhs } => {
        self.emit_addr(lhs, decls);
        self.ins("pushq %rax");
        self.emit_expr(rhs, decls);
        self.ins("popq %rdi");
        self.ins("movq %rax, (%rdi)");
      }

      ExprKind::Binary { op, lhs, rhs } => {
        self.emit_expr(lhs, decls);
        self.ins("pushq %rax");
        self.emit_expr(rhs, decls);
        self.emit_binary_op(*op);
      }

      ExprKind::Neg { operand } => {
        self.emit_expr(operand, decls);
        self.ins("negq %rax");
      }

      ExprKind::Call { name, args, .. } => {
        // Arguments go on the stack right-to-left so they sit in
        // declaration order above the saved frame pointer.
        for arg in args.iter().rev() {
          self.emit_expr(arg, decls);
          self.ins("pushq %rax");
        }
        self.ins("pushq %rbx          # save the frame pointer");
        self.ins(format!("call {name}"));
        self.ins("popq %rbx          # restore the frame pointer");
        if !args.is_empty() {
          self.ins(format!("addq ${}, %rsp          # pop the arguments", 8 * args.len()));
        }
      }
    }
  }

  /// Combine the pushed left operand with the right operand in `%rax`.
  fn emit_binary_op(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => {
        self.ins("popq %rdi");
        self.ins("addq %rdi, %rax");
      }
      BinaryOp::Sub => {
        self.ins("popq %rdi");
        self.ins("subq %rax, %rdi");
        self.ins("movq %rdi, %rax");
      }
      BinaryOp::Mul => {
        self.ins("popq %rdi");
        self.ins("imulq %rdi, %rax");
      }
      BinaryOp::Div | BinaryOp::Mod => {
        // The divisor must survive the sign extension, so it rides in a
        // callee-saved register while the dividend comes back off the
        // stack.
        self.ins("pushq %rbp");
        self.ins("movq %rax, %rbp          # divisor");
        self.ins("movq 8(%rsp), %rax          # dividend");
        self.ins("cqto");
        self.ins("idivq %rbp");
        if op == BinaryOp::Mod {
          self.ins("movq %rdx, %rax");
        }
        self.ins("popq %rbp");
        self.ins("addq $8, %rsp");
      }
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
        let false_label = self.fresh_label();
        let join_label = self.fresh_label();
        let jump = match op {
          BinaryOp::Eq => "jne",
          BinaryOp::Ne => "je",
          BinaryOp::Lt => "jge",
          BinaryOp::Le => "jg",
          BinaryOp::Gt => "jle",
          BinaryOp::Ge => "jl",
          _ => unreachable!(),
        };
        self.ins("popq %rdi");
        self.ins("cmpq %rax, %rdi");
        self.ins(format!("{jump} {false_label}"));
        self.ins("movq $1, %rax");
        self.ins(format!("jmp {join_label}"));
        self.label(&false_label);
        self.ins("movq $0, %rax");
        self.label(&join_label);
      }
    }
  }

  /// Evaluate an lvalue expression into `%rax` as an address.
  fn emit_addr(&mut self, expr: &Expr, decls: &[Decl]) {
    match &expr.kind {
      ExprKind::Var { decl, .. } => {
        let decl = &decls[decl.expect("references are resolved before emission")];
        match decl.offset {
          None => self.ins(format!("movq ${}, %rax", decl.name)),
          Some(offset) if decl.is_param => self.ins(format!("leaq {}(%rbx), %rax", offset + 8)),
          Some(offset) => self.ins(format!("leaq {offset}(%rbx), %rax")),
        }
      }
      ExprKind::Index { decl, index, .. } => {
        let decl = &decls[decl.expect("references are resolved before emission")];
        self.emit_element_addr(decl, index, decls);
      }
      ExprKind::Deref { operand } => self.emit_expr(operand, decls),
      _ => panic!("not an lvalue"),
    }
  }

  /// Address of `array[index]` into `%rax`.
  fn emit_element_addr(&mut self, array: &Decl, index: &Expr, decls: &[Decl]) {
    self.emit_expr(index, decls);
    self.ins("imulq $8, %rax");
    self.emit_array_base(array, "%rdi");
    self.ins("addq %rdi, %rax");
  }

  /// Base address of an array into the given register. A parameter slot
  /// already holds the address; locals and globals are addressed directly.
  fn emit_array_base(&mut self, decl: &Decl, reg: &str) {
    match decl.offset {
      None => self.ins(format!("movq ${}, {reg}", decl.name)),
      Some(offset) if decl.is_param => self.ins(format!("movq {}(%rbx), {reg}", offset + 8)),
      Some(offset) => self.ins(format!("leaq {offset}(%rbx), {reg}")),
    }
  }

  /// Read one integer from standard input via scanf, into `%rax`.
  fn emit_read(&mut self) {
    self.ins("subq $8, %rsp          # scratch slot for scanf");
    self.ins("movq %rsp, %rsi");
    self.ins("movq $.ReadIntString, %rdi");
    self.ins("movl $0, %eax");
    self.ins("call scanf");
    self.ins("movq (%rsp), %rax");
    self.ins("addq $8, %rsp");
  }
}

/// Memory operand for a scalar's current value.
fn scalar_operand(decl: &Decl) -> String {
  match decl.offset {
    None => decl.name.clone(),
    Some(offset) if decl.is_param => format!("{}(%rbx)", offset + 8),
    Some(offset) => format!("{offset}(%rbx)"),
  }
}

/// Escape a literal for a `.string` directive. The lexer already rules out
/// embedded quotes and newlines, so only backslashes need care.
fn escape_string(content: &str) -> String {
  content.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::checker;
  use crate::parser;
  use crate::tokenizer::Lexer;

  fn compile(source: &str) -> String {
    let mut program = parser::parse(Lexer::new(source)).unwrap();
    checker::check(&mut program).unwrap();
    generate(&mut program)
  }

  fn defined_labels(asm: &str) -> Vec<String> {
    asm
      .lines()
      .filter(|line| line.starts_with(".L") && line.ends_with(':'))
      .map(|line| line.trim_end_matches(':').to_string())
      .collect()
  }

  #[test]
  fn evaluates_products_before_sums_on_the_stack() {
    let asm = compile("int main(void) { write 2 + 3 * 4; writeln; return 0; }");
    let mul = asm.find("imulq %rdi, %rax").expect("product emitted");
    let add = asm.find("addq %rdi, %rax").expect("sum emitted");
    assert!(mul < add, "the inner product must combine before the outer sum");
    assert!(asm.find("movq $2, %rax").unwrap() < asm.find("pushq %rax").unwrap());
    assert!(asm.contains("movq $.WriteIntString, %rdi"));
    assert!(asm.contains("movq $.WritelnString, %rdi"));
  }

  #[test]
  fn generated_labels_are_never_reused() {
    let asm = compile(
      "int main(void) {\n  int x;\n  x = 1;\n  if (x) write 1; else write 2;\n  if (x < 2) write 3;\n  return 0;\n}",
    );
    let labels = defined_labels(&asm);
    let mut unique = labels.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(labels.len(), unique.len(), "duplicate label in:\n{asm}");
  }

  #[test]
  fn identical_functions_get_identical_offsets() {
    let source = "int f(int a, int b) { int x; int y; x = a; y = b; return x + y; }\n\
                  int extra;\n\
                  int g(int a, int b) { int x; int y; x = a; y = b; return x + y; }\n\
                  int main(void) { return f(1, 2) + g(1, 2); }";
    let mut program = parser::parse(Lexer::new(source)).unwrap();
    checker::check(&mut program).unwrap();
    generate(&mut program);
    let f = &program.funcs[0];
    let g = &program.funcs[1];
    assert_eq!(f.frame_size, g.frame_size);
    for (&a, &b) in f.params.iter().zip(&g.params) {
      assert_eq!(program.decls[a].offset, program.decls[b].offset);
    }
    for (&a, &b) in f.body.decls.iter().zip(&g.body.decls) {
      assert_eq!(program.decls[a].offset, program.decls[b].offset);
    }
  }

  #[test]
  fn sibling_blocks_share_their_frame_region() {
    let source = "int main(void) { { int a; int b; } { int c; } return 0; }";
    let mut program = parser::parse(Lexer::new(source)).unwrap();
    checker::check(&mut program).unwrap();
    generate(&mut program);
    assert_eq!(program.funcs[0].frame_size, 16);
  }

  #[test]
  fn array_locals_reserve_their_whole_extent() {
    let source = "int main(void) { int a[4]; int x; x = a[0]; return x; }";
    let mut program = parser::parse(Lexer::new(source)).unwrap();
    checker::check(&mut program).unwrap();
    generate(&mut program);
    assert_eq!(program.funcs[0].frame_size, 40);
  }

  #[test]
  fn while_jumps_back_to_reevaluate_the_condition() {
    let asm = compile("int main(void) { int i; i = 0; while (i < 3) i = i + 1; return i; }");
    let labels = defined_labels(&asm);
    let top = labels
      .iter()
      .find(|label| asm.contains(&format!("jmp {}", label)))
      .expect("a loop-back jump");
    let top_pos = asm.find(&format!("{top}:")).unwrap();
    let jump_pos = asm.rfind(&format!("jmp {top}")).unwrap();
    assert!(top_pos < jump_pos, "the loop-back jump must target an earlier label");
  }

  #[test]
  fn every_return_funnels_through_one_epilogue() {
    let asm = compile(
      "int main(void) { int x; x = read(); if (x) return 1; return 2; }",
    );
    let deallocate = asm.find("addq $8, %rsp          # deallocate locals").expect("epilogue deallocation");
    let ret = asm.rfind("ret").unwrap();
    assert!(deallocate < ret);
    // Both returns jump to the same label, which sits just before ret.
    let epilogue = defined_labels(&asm)
      .into_iter()
      .find(|label| asm.matches(&format!("jmp {label}")).count() == 2)
      .expect("two returns share the epilogue label");
    assert!(asm.find(&format!("{epilogue}:")).unwrap() < ret);
  }

  #[test]
  fn string_literals_are_interned_once() {
    let asm = compile(
      "int main(void) { write \"dup\"; write \"dup\"; write \"other\"; return 0; }",
    );
    assert_eq!(asm.matches(".string \"dup\"").count(), 1);
    assert_eq!(asm.matches(".string \"other\"").count(), 1);
    assert!(asm.contains("movq $.WriteStringString, %rdi"));
  }

  #[test]
  fn arguments_are_pushed_right_to_left() {
    let asm = compile(
      "int f(int a, int b) { return a - b; }\nint main(void) { return f(1, 2); }",
    );
    let second = asm.find("movq $2, %rax").unwrap();
    let first = asm.find("movq $1, %rax").unwrap();
    assert!(second < first, "the rightmost argument must be evaluated first");
    assert!(asm.contains("pushq %rbx"));
    assert!(asm.contains("call f"));
    assert!(asm.contains("addq $16, %rsp"));
  }

  #[test]
  fn parameters_are_read_above_the_saved_frame_pointer() {
    let asm = compile("int f(int a, int b) { return a + b; }\nint main(void) { return f(1, 2); }");
    assert!(asm.contains("movq 16(%rbx), %rax"));
    assert!(asm.contains("movq 24(%rbx), %rax"));
  }

  #[test]
  fn globals_get_common_storage() {
    let asm = compile("int x; int a[3]; int main(void) { x = 1; return a[0]; }");
    assert!(asm.contains(".comm x,8,8"));
    assert!(asm.contains(".comm a,24,8"));
    assert!(asm.contains("movq $x, %rax"));
  }

  #[test]
  fn division_saves_the_divisor_register() {
    let asm = compile("int main(void) { return 7 / 2; }");
    let save = asm.find("pushq %rbp").unwrap();
    let divide = asm.find("idivq %rbp").unwrap();
    let restore = asm.find("popq %rbp").unwrap();
    assert!(save < divide && divide < restore);
    assert!(asm.contains("cqto"));
  }

  #[test]
  fn remainder_selects_the_remainder_register() {
    let asm = compile("int main(void) { return 7 % 2; }");
    assert!(asm.contains("movq %rdx, %rax"));
  }

  #[test]
  fn comparison_produces_zero_or_one_via_labels() {
    let asm = compile("int main(void) { return 1 < 2; }");
    assert!(asm.contains("jge .L"));
    assert!(asm.contains("movq $1, %rax"));
    assert!(asm.contains("movq $0, %rax"));
  }

  #[test]
  fn header_lists_the_fixed_format_strings() {
    let asm = compile("int main(void) { return 0; }");
    assert!(asm.starts_with(".section .rodata"));
    for label in [
      ".WriteIntString",
      ".WritelnString",
      ".WriteStringString",
      ".ArrayOverflowString",
      ".ReadIntString",
    ] {
      assert!(asm.contains(label), "missing {label}");
    }
    assert!(asm.contains(".globl main"));
    assert!(asm.contains("\nmain:\n"));
  }
}
