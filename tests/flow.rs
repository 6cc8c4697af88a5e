//! Structured control flow, branching and call scenarios.

mod common;

use common::{read_i32, run, run_err};
use wasmite::error::{InterpreterError, TrapReason};
use wasmite::module::Module;
use wasmite::prelude::{Interpreter, Value};

#[test]
fn if_selects_the_true_arm() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            i32.const 1
            if (result i32)
              i32.const 100
            else
              i32.const 200
            end
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 100);
}

#[test]
fn if_selects_the_false_arm() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            i32.const 0
            if (result i32)
              i32.const 100
            else
              i32.const 200
            end
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 200);
}

#[test]
fn if_without_else_skips_the_body() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            i32.const 50
            i32.store
            i32.const 0
            if
              i32.const 0
              i32.const 99
              i32.store
            end))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 50);
}

#[test]
fn nested_ifs() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            i32.const 1
            if (result i32)
              i32.const 1
              if (result i32)
                i32.const 1
              else
                i32.const 2
              end
            else
              i32.const 3
            end
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 1);
}

#[test]
fn branch_leaves_a_block() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            i32.const 10
            i32.store
            block
              br 0
              i32.const 0
              i32.const 20
              i32.store
            end))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 10);
}

#[test]
fn fallthrough_runs_the_whole_block() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            block
              i32.const 0
              i32.const 20
              i32.store
            end))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 20);
}

#[test]
fn block_with_a_result_value() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            block (result i32)
              i32.const 50
            end
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 50);
}

#[test]
fn branch_to_the_function_depth_returns() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            i32.const 1
            i32.store
            block
              br 1
            end
            i32.const 0
            i32.const 2
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 1);
}

#[test]
fn loop_accumulates_a_sum() {
    // sum of 1..=5
    let wat = r#"
        (module
          (memory 1)
          (func (export "run") (local $i i32) (local $acc i32)
            block
              loop
                local.get $i
                i32.const 5
                i32.ge_s
                br_if 1
                local.get $i
                i32.const 1
                i32.add
                local.tee $i
                local.get $acc
                i32.add
                local.set $acc
                br 0
              end
            end
            i32.const 0
            local.get $acc
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 15);
}

#[test]
fn loop_with_an_early_break() {
    // Breaks out as soon as the running sum passes 10: 1+2+3+4+5 = 15.
    let wat = r#"
        (module
          (memory 1)
          (func (export "run") (local $i i32) (local $acc i32)
            block
              loop
                local.get $i
                i32.const 1
                i32.add
                local.tee $i
                local.get $acc
                i32.add
                local.set $acc
                local.get $acc
                i32.const 10
                i32.gt_s
                br_if 1
                br 0
              end
            end
            i32.const 0
            local.get $acc
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 15);
}

fn br_table_module() -> &'static str {
    r#"
    (module
      (memory 1)
      (func $case (param $x i32) (result i32)
        block
          block
            block
              block
                local.get $x
                br_table 0 1 2 3 3
              end
              i32.const 100
              return
            end
            i32.const 101
            return
          end
          i32.const 102
          return
        end
        i32.const 103)
      (func (export "sel0") i32.const 0 (call $case (i32.const 0)) i32.store)
      (func (export "sel2") i32.const 0 (call $case (i32.const 2)) i32.store)
      (func (export "sel9") i32.const 0 (call $case (i32.const 9)) i32.store))
    "#
}

#[test]
fn br_table_selects_by_index() {
    assert_eq!(read_i32(&run(br_table_module(), "sel0"), 0), 100);
    assert_eq!(read_i32(&run(br_table_module(), "sel2"), 0), 102);
}

#[test]
fn br_table_out_of_range_takes_the_default() {
    assert_eq!(read_i32(&run(br_table_module(), "sel9"), 0), 103);
}

#[test]
fn direct_calls_pass_arguments_and_return_values() {
    let wat = r#"
        (module
          (memory 1)
          (func $add (param i32 i32) (result i32)
            local.get 0
            local.get 1
            i32.add)
          (func $square (param i32) (result i32)
            local.get 0
            local.get 0
            i32.mul)
          (func (export "run")
            i32.const 0
            (call $square (call $add (i32.const 3) (i32.const 4)))
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 49);
}

#[test]
fn recursion_computes_a_factorial() {
    let wat = r#"
        (module
          (memory 1)
          (func $fact (param $n i32) (result i32)
            local.get $n
            i32.const 1
            i32.le_s
            if (result i32)
              i32.const 1
            else
              local.get $n
              local.get $n
              i32.const 1
              i32.sub
              call $fact
              i32.mul
            end)
          (func (export "run")
            i32.const 0
            (call $fact (i32.const 5))
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 120);
}

#[test]
fn return_abandons_the_rest_of_the_frame() {
    let wat = r#"
        (module
          (memory 1)
          (func $pick (param $c i32) (result i32)
            local.get $c
            if
              i32.const 100
              return
            end
            i32.const 200)
          (func (export "yes") i32.const 0 (call $pick (i32.const 1)) i32.store)
          (func (export "no") i32.const 0 (call $pick (i32.const 0)) i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "yes"), 0), 100);
    assert_eq!(read_i32(&run(wat, "no"), 0), 200);
}

#[test]
fn select_picks_by_condition() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "t")
            i32.const 0
            i32.const 10
            i32.const 20
            i32.const 1
            select
            i32.store)
          (func (export "f")
            i32.const 0
            i32.const 10
            i32.const 20
            i32.const 0
            select
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "t"), 0), 10);
    assert_eq!(read_i32(&run(wat, "f"), 0), 20);
}

#[test]
fn locals_and_tee() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run") (local $a i32) (local $b i32)
            i32.const 20
            local.set $a
            local.get $a
            i32.const 15
            i32.add
            local.tee $b
            drop
            i32.const 0
            local.get $b
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 35);
}

#[test]
fn globals_read_and_write() {
    let wat = r#"
        (module
          (memory 1)
          (global $counter (mut i32) (i32.const 0))
          (global $hundred i32 (i32.const 100))
          (func (export "incr")
            global.get $counter
            i32.const 1
            i32.add
            global.set $counter
            i32.const 0
            global.get $counter
            i32.store)
          (func (export "fixed")
            i32.const 0
            global.get $hundred
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "incr"), 0), 1);
    assert_eq!(read_i32(&run(wat, "fixed"), 0), 100);
}

#[test]
fn globals_record_type_and_initial_value() {
    let wat = r#"
        (module
          (global $a (mut i32) (i32.const 5))
          (global $b f64 (f64.const 1.5)))
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let module = Module::decode(&bytes).unwrap();
    let vm = Interpreter::instantiate(&module).unwrap();
    assert!(vm.globals()[0].ty.mutable);
    assert_eq!(vm.globals()[0].value, Value::I32(5));
    assert!(!vm.globals()[1].ty.mutable);
    assert_eq!(vm.globals()[1].value, Value::F64(1.5));
}

#[test]
fn global_initializer_can_read_an_earlier_global() {
    let wat = r#"
        (module
          (memory 1)
          (global $base i32 (i32.const 40))
          (global $derived i32 (global.get $base))
          (func (export "run")
            i32.const 0
            global.get $derived
            i32.const 2
            i32.add
            i32.store))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 42);
}

#[test]
fn unreachable_traps_only_when_executed() {
    let taken = r#"
        (module
          (memory 1)
          (func (export "run")
            i32.const 0
            i32.const 42
            i32.store
            i32.const 0
            if
              unreachable
            end))
    "#;
    assert_eq!(read_i32(&run(taken, "run"), 0), 42);

    let hit = r#"
        (module
          (memory 1)
          (func (export "run")
            unreachable))
    "#;
    assert_eq!(
        run_err(hit, "run"),
        InterpreterError::Trap(TrapReason::Unreachable)
    );
}

#[test]
fn drop_and_nop_have_no_observable_effect() {
    let wat = r#"
        (module
          (memory 1)
          (func (export "run")
            nop
            i32.const 0
            i32.const 99
            i32.const 7
            drop
            i32.store
            nop))
    "#;
    assert_eq!(read_i32(&run(wat, "run"), 0), 99);
}

#[test]
fn missing_export_is_reported_by_name() {
    let wat = r#"(module (func (export "here") nop))"#;
    assert_eq!(
        run_err(wat, "gone"),
        InterpreterError::ExportNotFound("gone".into())
    );
}

#[test]
fn non_function_export_is_rejected() {
    let wat = r#"(module (memory (export "memory") 1))"#;
    assert_eq!(
        run_err(wat, "memory"),
        InterpreterError::NotAFunction("memory".into())
    );
}

#[test]
fn start_function_runs_at_instantiation() {
    let wat = r#"
        (module
          (memory 1)
          (func $init
            i32.const 0
            i32.const 7
            i32.store)
          (start $init))
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let module = Module::decode(&bytes).unwrap();
    let vm = Interpreter::instantiate(&module).unwrap();
    assert_eq!(read_i32(vm.memory(), 0), 7);
}

#[test]
fn void_exports_leave_the_stack_balanced() {
    let wat = r#"
        (module
          (memory 1)
          (func $helper (result i32) i32.const 9)
          (func (export "run")
            i32.const 0
            call $helper
            i32.store))
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let module = Module::decode(&bytes).unwrap();
    let mut vm = Interpreter::instantiate(&module).unwrap();
    vm.run("run").unwrap();
    assert!(vm.stack().is_empty());
}

#[test]
fn result_exports_leave_their_value_on_the_stack() {
    let wat = r#"
        (module
          (func (export "answer") (result i32)
            i32.const 41
            i32.const 1
            i32.add))
    "#;
    let bytes = wat::parse_str(wat).unwrap();
    let module = Module::decode(&bytes).unwrap();
    let mut vm = Interpreter::instantiate(&module).unwrap();
    vm.run("answer").unwrap();
    assert_eq!(vm.stack(), &[Value::I32(42)]);
}
