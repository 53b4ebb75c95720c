use std::io::Write;
use std::process::{Command, Stdio};

use kiln::codegen::instr::{rk_from_const, rk_is_const};
use kiln::{compile, CodegenError, Error, OpCode, Proto, Value};

fn ops(p: &Proto) -> Vec<OpCode> {
    p.code.iter().map(|i| i.opcode()).collect()
}

/// Every Jmp must land inside the function once compilation finishes.
fn assert_jumps_closed(p: &Proto) {
    for (pc, i) in p.code.iter().enumerate() {
        if i.opcode() == OpCode::Jmp {
            let dest = pc as i64 + 1 + i.sbx() as i64;
            assert!(
                dest >= 0 && (dest as usize) < p.code.len(),
                "Jmp at {pc} targets {dest}, outside [0, {})",
                p.code.len()
            );
        }
    }
    for nested in &p.protos {
        assert_jumps_closed(nested);
    }
}

// --- Constant folding and locals ---

#[test]
fn folded_arith_loads_one_constant() {
    let p = compile("local x = 2 + 3").unwrap();
    assert_eq!(ops(&p), vec![OpCode::LoadK, OpCode::Return]);
    assert_eq!(p.code[0].a(), 0);
    assert_eq!(p.constants, vec![Value::Number(5.0)]);
}

#[test]
fn local_arith_binds_destination_directly() {
    let p = compile("local a = 1 local b = 2 local c = a + b").unwrap();
    assert_eq!(
        ops(&p),
        vec![OpCode::LoadK, OpCode::LoadK, OpCode::Add, OpCode::Return]
    );
    let add = p.code[2];
    // result computed straight into c's register, no trailing Move
    assert_eq!((add.a(), add.b(), add.c()), (2, 0, 1));
}

#[test]
fn equal_literals_share_a_constant_slot() {
    let p = compile("local a = 7 local b = 7 local c = 7").unwrap();
    assert_eq!(p.constants.len(), 1);
    assert!(p.code[..3].iter().all(|i| i.bx() == 0));
}

#[test]
fn multi_local_pads_with_merged_loadnil() {
    let p = compile("local a = 1 local b, c, d").unwrap();
    // one LoadNil covers all three registers
    assert_eq!(ops(&p), vec![OpCode::LoadK, OpCode::LoadNil, OpCode::Return]);
    let nil = p.code[1];
    assert_eq!((nil.a(), nil.b()), (1, 3));
}

#[test]
fn registers_are_recycled_between_statements() {
    let p = compile("local a = 1 + 2 local b = 3 + 4").unwrap();
    // two statements, two registers: the frame never grows past the locals
    assert_eq!(p.max_stack, 2);
}

// --- Conditionals and jump patching ---

#[test]
fn if_statement_emits_test_jump_pair() {
    let p = compile("if a then f() end").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::GetGlobal,
            OpCode::Test,
            OpCode::Jmp,
            OpCode::GetGlobal,
            OpCode::Call,
            OpCode::Return,
        ]
    );
    // false exit skips the whole then-block
    assert_eq!(p.code[2].sbx(), 2);
    assert_jumps_closed(&p);
}

#[test]
fn condition_value_unused_demotes_testset() {
    let p = compile("local a = 1 if a then a = 2 end").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::LoadK,
            OpCode::Test,
            OpCode::Jmp,
            OpCode::LoadK,
            OpCode::Return,
        ]
    );
    assert_eq!(p.code[1].a(), 0); // tests a's register
    assert_eq!(p.code[2].sbx(), 1);
}

#[test]
fn comparison_materializes_boolean_pair() {
    let p = compile("local b = 1 < 2").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::Lt,
            OpCode::Jmp,
            OpCode::LoadBool,
            OpCode::LoadBool,
            OpCode::Return,
        ]
    );
    let lt = p.code[0];
    assert_eq!(lt.a(), 1);
    assert!(rk_is_const(lt.b()) && rk_is_const(lt.c()));
    // Jmp falls into the `true` label, skipping the `false` one
    assert_eq!(p.code[1].sbx(), 1);
    let (f, t) = (p.code[2], p.code[3]);
    assert_eq!((f.b(), f.c()), (0, 1)); // LoadBool false, skip next
    assert_eq!((t.b(), t.c()), (1, 0));
}

#[test]
fn greater_than_compiles_as_swapped_less_than() {
    let p = compile("local a = 1 local b = 2 if a > b then end").unwrap();
    let lt = p.code[2];
    assert_eq!(lt.opcode(), OpCode::Lt);
    assert_eq!((lt.b(), lt.c()), (1, 0)); // b < a
}

#[test]
fn and_keeps_testset_when_registers_differ() {
    let p = compile("local x = 1 local y = x and b").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::LoadK,
            OpCode::TestSet,
            OpCode::Jmp,
            OpCode::GetGlobal,
            OpCode::Return,
        ]
    );
    let ts = p.code[1];
    // short-circuit copies x into y's register
    assert_eq!((ts.a(), ts.b(), ts.c()), (1, 0, 0));
    assert_eq!(p.code[2].sbx(), 1);
}

#[test]
fn and_into_same_register_demotes_to_test() {
    let p = compile("local t = a and b").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::GetGlobal,
            OpCode::Test,
            OpCode::Jmp,
            OpCode::GetGlobal,
            OpCode::Return,
        ]
    );
}

#[test]
fn if_else_chains_close_every_jump() {
    let p = compile(
        "local r \
         if a then r = 1 elseif b then r = 2 else r = 3 end",
    )
    .unwrap();
    assert_jumps_closed(&p);
    // three arms, three LoadK stores into r
    let loads = ops(&p).iter().filter(|o| **o == OpCode::LoadK).count();
    assert_eq!(loads, 3);
}

// --- Loops ---

#[test]
fn while_loop_has_back_edge_and_exit() {
    let p = compile("local i = 0 while i < 10 do i = i + 1 break end").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::LoadK,
            OpCode::Lt,
            OpCode::Jmp, // exit when condition fails
            OpCode::Add,
            OpCode::Jmp, // break
            OpCode::Jmp, // back edge
            OpCode::Return,
        ]
    );
    assert_eq!(p.code[1].a(), 0); // inverted: jump taken when i < 10 is false
    assert_eq!(p.code[2].sbx(), 3);
    assert_eq!(p.code[4].sbx(), 1);
    assert_eq!(p.code[5].sbx(), -5);
    assert_jumps_closed(&p);
}

#[test]
fn repeat_jumps_back_when_condition_fails() {
    let p = compile("local i = 0 repeat i = i + 1 until i == 3").unwrap();
    assert_jumps_closed(&p);
    let last_jmp = p
        .code
        .iter()
        .rposition(|i| i.opcode() == OpCode::Jmp)
        .unwrap();
    assert!(p.code[last_jmp].sbx() < 0, "repeat needs a back edge");
}

#[test]
fn break_outside_loop_is_rejected() {
    assert!(compile("break").is_err());
    assert!(compile("if a then break end").is_err());
}

// --- Calls, returns, vararg ---

#[test]
fn call_statement_discards_results() {
    let p = compile("f(42)").unwrap();
    assert_eq!(
        ops(&p),
        vec![OpCode::GetGlobal, OpCode::LoadK, OpCode::Call, OpCode::Return]
    );
    let call = p.code[2];
    assert_eq!((call.a(), call.b(), call.c()), (0, 2, 1));
}

#[test]
fn nested_call_forwards_all_results() {
    let p = compile("f(g())").unwrap();
    let calls: Vec<_> = p
        .code
        .iter()
        .filter(|i| i.opcode() == OpCode::Call)
        .collect();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].c(), 0); // inner call: all results
    assert_eq!(calls[1].b(), 0); // outer call: open argument count
}

#[test]
fn return_forwards_vararg() {
    let p = compile("return ...").unwrap();
    let va = p.code[0];
    assert_eq!(va.opcode(), OpCode::Vararg);
    assert_eq!(va.b(), 0); // all values
    let ret = p.code[1];
    assert_eq!((ret.opcode(), ret.a(), ret.b()), (OpCode::Return, 0, 0));
}

#[test]
fn vararg_rejected_in_plain_function() {
    assert!(compile("local f = function() return ... end").is_err());
}

#[test]
fn multiple_return_values_sit_contiguously() {
    let p = compile("local a = 1 return a, 2, 3").unwrap();
    let ret = p.code.iter().find(|i| i.opcode() == OpCode::Return).unwrap();
    assert_eq!((ret.a(), ret.b()), (1, 4)); // three values from r1
}

// --- Globals, tables ---

#[test]
fn global_assignment_goes_through_a_register() {
    let p = compile("x = 10").unwrap();
    assert_eq!(ops(&p), vec![OpCode::LoadK, OpCode::SetGlobal, OpCode::Return]);
    assert_eq!(p.constants, vec![Value::Str("x".into()), Value::Number(10.0)]);
    assert_eq!(p.code[1].bx(), 0); // global name constant
}

#[test]
fn table_constructor_batches_setlist() {
    let p = compile("local t = {1, 2, 3}").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::NewTable,
            OpCode::LoadK,
            OpCode::LoadK,
            OpCode::LoadK,
            OpCode::SetList,
            OpCode::Return,
        ]
    );
    let sl = p.code[4];
    assert_eq!((sl.a(), sl.b(), sl.c()), (0, 3, 1));
    assert_eq!(p.code[0].b(), 3); // array-size hint
}

#[test]
fn table_write_uses_rk_operands() {
    let p = compile("local t = {} t[1] = 2").unwrap();
    let st = p.code[1];
    assert_eq!(st.opcode(), OpCode::SetTable);
    assert_eq!(st.a(), 0);
    assert_eq!(st.b(), rk_from_const(0));
    assert_eq!(st.c(), rk_from_const(1));
}

#[test]
fn trailing_call_in_table_streams_all_results() {
    let p = compile("local t = {1, f()}").unwrap();
    assert_eq!(
        ops(&p),
        vec![
            OpCode::NewTable,
            OpCode::LoadK,
            OpCode::GetGlobal,
            OpCode::Call,
            OpCode::SetList,
            OpCode::Return,
        ]
    );
    let call = p.code[3];
    assert_eq!(call.c(), 0); // all results
    let sl = p.code[4];
    assert_eq!((sl.a(), sl.b(), sl.c()), (0, 0, 1)); // open element count
    assert_eq!(p.code[0].b(), 1); // hint counts only the fixed items
}

#[test]
fn trailing_vararg_in_table_streams_all_values() {
    let p = compile("local t = {...}").unwrap();
    let va = p.code[1];
    assert_eq!((va.opcode(), va.b()), (OpCode::Vararg, 0));
    let sl = p.code[2];
    assert_eq!((sl.opcode(), sl.b()), (OpCode::SetList, 0));
}

#[test]
fn non_trailing_call_in_table_truncates_to_one() {
    let p = compile("local t = {f(), 2}").unwrap();
    let call = p.code.iter().find(|i| i.opcode() == OpCode::Call).unwrap();
    assert_eq!(call.c(), 2); // exactly one result
    let sl = p.code.iter().find(|i| i.opcode() == OpCode::SetList).unwrap();
    assert_eq!(sl.b(), 2);
}

#[test]
fn field_read_uses_constant_key() {
    let p = compile("local t = {} local v = t.size").unwrap();
    let gt = p.code.iter().find(|i| i.opcode() == OpCode::GetTable).unwrap();
    assert!(rk_is_const(gt.c()));
    assert!(p.constants.contains(&Value::Str("size".into())));
}

// --- Nested functions and upvalues ---

#[test]
fn closure_captures_parent_local() {
    let p = compile("local n = 1 local function get() return n end").unwrap();
    assert_eq!(
        ops(&p),
        vec![OpCode::LoadK, OpCode::Closure, OpCode::Move, OpCode::Return]
    );
    assert_eq!(p.code[1].a(), 1); // bound to get's register
    assert_eq!(p.code[2].b(), 0); // captures r0 (n)
    assert_eq!(p.protos.len(), 1);
    let inner = &p.protos[0];
    assert_eq!(inner.code[0].opcode(), OpCode::GetUpval);
    assert_jumps_closed(&p);
}

#[test]
fn capture_through_two_levels_uses_getupval() {
    let p = compile(
        "local n = 1 \
         local function outer() \
           local function inner() return n end \
           return inner \
         end",
    )
    .unwrap();
    let outer = &p.protos[0];
    // outer forwards its own upvalue to inner
    let cl = outer
        .code
        .iter()
        .position(|i| i.opcode() == OpCode::Closure)
        .unwrap();
    assert_eq!(outer.code[cl + 1].opcode(), OpCode::GetUpval);
}

#[test]
fn function_parameters_become_locals() {
    let p = compile("local function add(a, b) return a + b end").unwrap();
    let inner = &p.protos[0];
    assert_eq!(inner.num_params, 2);
    assert!(!inner.is_vararg);
    let add = inner.code[0];
    assert_eq!((add.opcode(), add.b(), add.c()), (OpCode::Add, 0, 1));
}

// --- Error paths ---

#[test]
fn parse_errors_carry_the_right_line() {
    let err = compile("local a = 1\nlocal b = 2\nlocal = 3").unwrap_err();
    assert!(err.to_string().contains("line 3"), "got: {err}");
}

#[test]
fn line_table_tracks_statements() {
    let p = compile("local a = 1\n\nlocal b = 2").unwrap();
    assert_eq!(p.lines[0], 1);
    assert_eq!(p.lines[1], 3);
}

#[test]
fn unbalanced_blocks_fail() {
    assert!(compile("if x then").is_err());
    assert!(compile("end").is_err());
    assert!(compile("local = 3").is_err());
}

#[test]
fn assignment_to_literal_fails() {
    assert!(compile("(x) = 1").is_err());
}

#[test]
fn oversized_branch_is_control_too_long() {
    // a then-block too big for the jump's signed offset field
    let mut src = String::from("if a then ");
    for _ in 0..70_000 {
        src.push_str("b = 1 "); // LoadK + SetGlobal per statement
    }
    src.push_str("end");
    let err = compile(&src).unwrap_err();
    assert!(matches!(
        err,
        Error::Codegen(CodegenError::ControlTooLong { .. })
    ));
}

// --- Binary surface ---

fn kiln_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kiln"))
}

#[test]
fn bin_emits_json_from_stdin() {
    let mut child = kiln_bin()
        .args(["-", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run kiln");
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(b"local x = 2 + 3")
        .unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(json["code"].is_array());
    assert_eq!(json["constants"][0], serde_json::json!(5.0));
}

#[test]
fn bin_reports_errors_on_stderr() {
    let mut child = kiln_bin()
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run kiln");
    child.stdin.as_mut().unwrap().write_all(b"if x then").unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(!out.status.success());
    assert!(!out.stderr.is_empty());
}
