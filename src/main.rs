//! Command-line driver: argument handling, file I/O and exit codes.
//!
//! The compiler core lives in the library; this binary only maps its single
//! error onto a message and an exit code.

use bplc::generate_assembly;
use log::debug;
use std::env;
use std::fs;
use std::process;

fn main() {
  env_logger::init();

  let args: Vec<String> = env::args().collect();
  if args.len() != 3 {
    let program = args.first().map(String::as_str).unwrap_or("bplc");
    eprintln!("usage: {program} <source.bpl> <output.s>");
    process::exit(1);
  }

  process::exit(run(&args[1], &args[2]));
}

/// Compile one file into another. Returns the process exit code: 0 on
/// success, 1 on any failure, with a single message on stderr. The output
/// file is only touched once compilation has succeeded.
fn run(source_path: &str, output_path: &str) -> i32 {
  if !source_path.ends_with(".bpl") {
    eprintln!("Error: {source_path} does not have a .bpl extension");
    return 1;
  }

  let source = match fs::read_to_string(source_path) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("Error: cannot open {source_path}: {err}");
      return 1;
    }
  };

  let asm = match generate_assembly(&source) {
    Ok(asm) => asm,
    Err(err) => {
      eprintln!("{err}");
      return 1;
    }
  };

  if let Err(err) = fs::write(output_path, &asm) {
    eprintln!("Error: cannot write {output_path}: {err}");
    return 1;
  }
  debug!("wrote {} bytes of assembly to {output_path}", asm.len());
  0
}
