//! Tests for the direct bytecode generator.

use super::*;
use crate::parser::Parser;

fn compile_source(src: &str) -> Result<Bytecode> {
    let program = Parser::new(src).parse_program()?;
    CodeGenerator::new().compile(&program)
}

fn compile_ok(src: &str) -> Bytecode {
    compile_source(src).expect("Compilation should succeed")
}

fn opcodes(code: &Bytecode) -> Vec<OpCode> {
    code.instructions.iter().map(|i| i.opcode).collect()
}

#[test]
fn test_compile_empty_program() {
    let bytecode = compile_ok("");
    assert_eq!(opcodes(&bytecode), vec![OpCode::PushUndefined, OpCode::Return]);
}

#[test]
fn test_last_expression_is_returned() {
    let bytecode = compile_ok("1 + 2");
    assert_eq!(
        opcodes(&bytecode),
        vec![OpCode::PushNumber, OpCode::PushNumber, OpCode::Add, OpCode::Return]
    );
}

#[test]
fn test_earlier_expressions_are_popped() {
    let bytecode = compile_ok("1; 2;");
    assert_eq!(
        opcodes(&bytecode),
        vec![OpCode::PushNumber, OpCode::Pop, OpCode::PushNumber, OpCode::Return]
    );
}

#[test]
fn test_var_declaration_always_declares() {
    let bytecode = compile_ok("var a, b = 2;");
    assert_eq!(
        opcodes(&bytecode),
        vec![
            OpCode::Declare,
            OpCode::Declare,
            OpCode::PushNumber,
            OpCode::Store,
            OpCode::PushUndefined,
            OpCode::Return,
        ]
    );
}

#[test]
fn test_if_else_jumps() {
    let bytecode = compile_ok("if (a) { 1; } else { 2; }");
    let listing = bytecode.to_string();
    let lines: Vec<_> = listing.lines().collect();
    assert_eq!(lines[0], "0000  LOAD \"a\"");
    assert_eq!(lines[1], "0001  JNE +3 (-> 0005)");
    assert_eq!(lines[4], "0004  JMP +2 (-> 0007)");
}

#[test]
fn test_while_loop_jumps_back_to_test() {
    let bytecode = compile_ok("while (a) { a = a - 1; }");
    let listing = bytecode.to_string();
    assert!(listing.starts_with("0000  LOAD \"a\"\n0001  JNE"));
    assert!(listing.contains("JMP -9 (-> 0000)"));
}

#[test]
fn test_do_while_loops_on_true() {
    let bytecode = compile_ok("do { a = 1; } while (b)");
    let ops = opcodes(&bytecode);
    let jne = ops.iter().position(|op| *op == OpCode::Jne).unwrap();
    assert_eq!(ops[jne - 1], OpCode::Not);
    let Some(Operand::Jump(delta)) = bytecode.instructions[jne].operand else {
        panic!("expected a jump operand");
    };
    assert_eq!(bytecode.jump_target(jne, delta), Some(0));
}

#[test]
fn test_no_zero_offset_conditional_jumps() {
    let bytecode = compile_ok("if (a) ; if (b) {} else {} while (c) {} a && b; x ? 1 : 2;");
    for instruction in &bytecode.instructions {
        if instruction.opcode == OpCode::Jne {
            assert_ne!(instruction.operand, Some(Operand::Jump(0)));
        }
    }
}

#[test]
fn test_jump_targets_stay_in_bounds() {
    let src = "var i; for (i = 0; i < 10; i++) { if (i % 2) { continue_ = i; } } do { i--; } while (i)";
    let bytecode = compile_ok(src);
    for (offset, instruction) in bytecode.instructions.iter().enumerate() {
        if let Some(Operand::Jump(delta)) = instruction.operand {
            assert!(bytecode.jump_target(offset, delta).is_some(), "jump at {}", offset);
        }
    }
}

#[test]
fn test_generation_is_deterministic() {
    let src = "function f(n) { return n < 2 ? n : f(n - 1) + f(n - 2); } var o = {a: [1,,3]}; f(5)";
    let program = Parser::new(src).parse_program().unwrap();
    let first = CodeGenerator::new().compile(&program).unwrap();
    let second = CodeGenerator::new().compile(&program).unwrap();
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first, second);
}

#[test]
fn test_array_holes_push_undefined() {
    let bytecode = compile_ok("[1,,2]");
    assert_eq!(
        opcodes(&bytecode),
        vec![
            OpCode::PushNumber,
            OpCode::PushUndefined,
            OpCode::PushNumber,
            OpCode::NewArray,
            OpCode::Return,
        ]
    );
    assert_eq!(bytecode.instructions[3].operand, Some(Operand::ArgCount(3)));
}

#[test]
fn test_object_literal_stores_each_property() {
    let bytecode = compile_ok("({a: 1, b: 2})");
    let ops = opcodes(&bytecode);
    assert_eq!(ops[0], OpCode::NewObject);
    assert_eq!(ops.iter().filter(|op| **op == OpCode::StoreMember).count(), 2);
}

#[test]
fn test_function_bodies_follow_top_level_return() {
    let bytecode = compile_ok("function f() { return 1; } f()");
    let first_return = opcodes(&bytecode)
        .iter()
        .position(|op| *op == OpCode::Return)
        .unwrap();
    let entry = bytecode.functions[0].entry;
    assert!(entry > first_return);

    // Guard return at the end of the body
    let n = bytecode.len();
    assert_eq!(bytecode.instructions[n - 2].opcode, OpCode::PushUndefined);
    assert_eq!(bytecode.instructions[n - 1].opcode, OpCode::Return);
}

#[test]
fn test_function_declarations_are_hoisted() {
    let bytecode = compile_ok("f(); function f() {}");
    let listing = bytecode.to_string();
    let lines: Vec<_> = listing.lines().collect();
    assert_eq!(lines[0], "0000  DECLARE \"f\"");
    assert!(lines[1].starts_with("0001  PUSH_FUNCTION #0 f"));
    assert_eq!(lines[2], "0002  STORE \"f\"");
    assert!(!bytecode.functions[0].self_binding);
}

#[test]
fn test_named_function_expression_binds_itself() {
    let bytecode = compile_ok("var g = function fact(n) { return n; };");
    assert!(bytecode.functions[0].self_binding);
}

#[test]
fn test_nested_functions_are_laid_out_in_order() {
    let bytecode = compile_ok("function outer() { return function () { return 1; }; }");
    assert_eq!(bytecode.functions.len(), 2);
    assert!(bytecode.functions[1].entry > bytecode.functions[0].entry);
}

#[test]
fn test_method_call_pushes_receiver_before_callee() {
    let bytecode = compile_ok("o.m(1)");
    assert_eq!(
        opcodes(&bytecode),
        vec![
            OpCode::PushNumber,
            OpCode::Load,
            OpCode::Dup,
            OpCode::PushString,
            OpCode::LoadMember,
            OpCode::CallMethod,
            OpCode::Return,
        ]
    );
    assert_eq!(bytecode.instructions[5].operand, Some(Operand::ArgCount(1)));
}

#[test]
fn test_plain_call_pushes_arguments_then_callee() {
    let bytecode = compile_ok("f(1, 2)");
    assert_eq!(
        opcodes(&bytecode),
        vec![
            OpCode::PushNumber,
            OpCode::PushNumber,
            OpCode::Load,
            OpCode::Call,
            OpCode::Return,
        ]
    );
}

#[test]
fn test_new_expression() {
    let bytecode = compile_ok("new F(1)");
    let ops = opcodes(&bytecode);
    assert_eq!(ops[2], OpCode::New);
}

#[test]
fn test_compound_member_assignment_uses_dup2() {
    let bytecode = compile_ok("o.x += 1");
    let ops = opcodes(&bytecode);
    assert!(ops.contains(&OpCode::Dup2));
    assert!(ops.contains(&OpCode::StoreMember));
}

#[test]
fn test_postfix_member_update_uses_hidden_slot() {
    let bytecode = compile_ok("o.x++");
    let listing = bytecode.to_string();
    assert!(listing.contains("DECLARE \"%update\""));
    assert!(listing.contains("LOAD \"%update\""));
}

#[test]
fn test_in_operator_is_a_compile_error() {
    assert!(matches!(compile_source("a in b"), Err(Error::CompileError(_))));
    assert!(matches!(
        compile_source("a instanceof b"),
        Err(Error::CompileError(_))
    ));
}

#[test]
fn test_logical_or_negates_before_jump() {
    let bytecode = compile_ok("a || b");
    assert_eq!(
        opcodes(&bytecode),
        vec![
            OpCode::Load,
            OpCode::Dup,
            OpCode::Not,
            OpCode::Jne,
            OpCode::Pop,
            OpCode::Load,
            OpCode::Return,
        ]
    );
}
