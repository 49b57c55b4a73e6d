//! Integration tests for the lazyflow assembler.
//!
//! Tests cover:
//! - Listings that assemble and run on the VM
//! - Roundtrip (disassemble → assemble, assemble → disassemble)
//! - Error cases with line numbers

use lazyflow_assembler::{assemble, disassemble, AsmError};
use lazyflow_common::{ChunkBuilder, Literal, Opcode, Program, Value};
use lazyflow_vm::run;

fn assemble_and_run(text: &str) -> Value {
    let program = assemble(text).unwrap_or_else(|err| panic!("assembly failed: {err}"));
    run(&program).unwrap_or_else(|err| panic!("execution failed: {err}"))
}

// ---- Running listings ----

#[test]
fn constant_return() {
    let text = "\
.entry  (0-ary)
  0 42
  1 return
";
    assert_eq!(assemble_and_run(text), Value::Number(42.0));
}

#[test]
fn call_through_a_label() {
    let text = "\
.module::standard::add  (2-ary)
  0 0
  1 getarg
  2 evaluate
  3 1
  4 getarg
  5 evaluate
  6 nadd
  7 return

.entry  (0-ary)
  0 3
  1 thunk_id
  2 2
  3 thunk_id
  4 @module::standard::add
  5 call
  6 return
";
    assert_eq!(assemble_and_run(text), Value::Number(5.0));
}

#[test]
fn strings_with_escapes_survive() {
    let text = ".entry  (0-ary)\n  0 \"a\\tb \\\"c\\\"\"\n  1 return\n";
    assert_eq!(assemble_and_run(text), Value::string("a\tb \"c\""));
}

// ---- Roundtrip ----

fn sample_program() -> Program {
    let mut program = Program::new();

    let mut b = ChunkBuilder::new();
    b.get_arg(0).get_arg(1).force_top(2).op(Opcode::SConcat).op(Opcode::Return);
    program.add_chunk("module::standard::concat", b.finish(2)).unwrap();

    let mut b = ChunkBuilder::new();
    let done = b.new_label();
    b.lit(true).jump_if(done).lit(-1.5).op(Opcode::Return);
    b.bind(done);
    b.lit("line\nbreak").lit(Literal::Boolean(false)).op(Opcode::Pop);
    b.thunk("module::standard::concat").op(Opcode::Return);
    program.add_chunk("entry", b.finish(0)).unwrap();

    program
}

#[test]
fn roundtrip_disassemble_then_assemble() {
    let original = sample_program();
    let text = disassemble(&original);
    let reassembled = assemble(&text).unwrap();
    assert_eq!(original, reassembled);
}

#[test]
fn roundtrip_assemble_then_disassemble() {
    let canonical = disassemble(&sample_program());
    assert_eq!(disassemble(&assemble(&canonical).unwrap()), canonical);
}

#[test]
fn bare_listing_gains_indices() {
    let program = assemble(".entry  (0-ary)\n7\nreturn\n").unwrap();
    assert_eq!(disassemble(&program), ".entry  (0-ary)\n  0 7\n  1 return\n");
}

#[test]
fn listing_format() {
    let text = disassemble(&sample_program());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], ".module::standard::concat  (2-ary)");
    assert_eq!(lines[1], "  0 0");
    assert_eq!(lines[2], "  1 getarg");
    assert!(lines.contains(&""));
    assert!(lines.contains(&".entry  (0-ary)"));
    assert!(lines.contains(&"  8 @module::standard::concat"));
    assert!(lines.contains(&"  5 \"line\\nbreak\""));
}

#[test]
fn aggregate_literals_show_placeholders() {
    let mut b = ChunkBuilder::new();
    b.lit(Literal::Array(vec![Literal::Number(1.0)]))
        .lit(Literal::Object(Default::default()))
        .op(Opcode::Return);
    let mut program = Program::new();
    program.add_chunk("entry", b.finish(0)).unwrap();

    let text = disassemble(&program);
    assert_eq!(text, ".entry  (0-ary)\n  0 [...]\n  1 {...}\n  2 return\n");
    assert!(matches!(
        assemble(&text),
        Err(AsmError::Placeholder { line: 2, .. })
    ));
}

// ---- Errors ----

#[test]
fn error_unknown_opcode() {
    let err = assemble(".entry  (0-ary)\n  0 halt\n").unwrap_err();
    assert_eq!(
        err,
        AsmError::UnknownOpcode {
            line: 2,
            token: "halt".into()
        }
    );
}

#[test]
fn error_bad_header() {
    let err = assemble(".entry\nreturn\n").unwrap_err();
    assert!(matches!(err, AsmError::BadHeader { line: 1, .. }));
}

#[test]
fn error_index_mismatch() {
    let err = assemble(".entry  (0-ary)\n  0 1\n  5 return\n").unwrap_err();
    assert!(matches!(
        err,
        AsmError::IndexMismatch {
            line: 3,
            expected: 1,
            ..
        }
    ));
}

#[test]
fn error_unterminated_string() {
    let err = assemble(".entry  (0-ary)\n\n  0 \"open\n").unwrap_err();
    assert_eq!(err, AsmError::UnterminatedString { line: 3 });
}

#[test]
fn empty_text_is_an_empty_program() {
    assert!(assemble("; nothing here\n\n").unwrap().is_empty());
}
