//! End-to-end execution tests: WAT source in, typed results (or a specific
//! error) out.

use rstest::rstest;
use wasmexec::runtime::{CancelToken, RuntimeError, Value, Vm, VmOptions};
use wasmexec::wat;

fn run(source: &str, name: &str) -> Result<Vec<Value>, RuntimeError> {
    let module = wat::parse(source).expect("module should lower");
    Vm::new(&module).exec_func(name, None)
}

fn i32s(values: &[i32]) -> Vec<Value> {
    values.iter().map(|&v| Value::I32(v)).collect()
}

// ----------------------------------------------------------------------------
// Result-producing scenarios
// ----------------------------------------------------------------------------

#[rstest]
// Chained arithmetic with an early return; the trailing drop and const are
// never reached: ((5 + 20 - 4) * 3) / 7.
#[case::arithmetic_chain(
    r#"(module
        (func $m (result i32)
            i32.const 5
            i32.const 20
            i32.add
            i32.const 4
            i32.sub
            i32.const 3
            i32.mul
            i32.const 7
            i32.div_s
            return
            drop
            i32.const 0)
        (export "main" (func $m)))"#,
    &[9]
)]
// eq on (1,0) and (0,0), lt_s on (1,1) and (-1,1).
#[case::comparison_pairs(
    r#"(module
        (func $m (result i32) (result i32) (result i32) (result i32)
            i32.const 1 i32.const 0 i32.eq
            i32.const 0 i32.const 0 i32.eq
            i32.const 1 i32.const 1 i32.lt_s
            i32.const -1 i32.const 1 i32.lt_s)
        (export "main" (func $m)))"#,
    &[0, 1, 0, 1]
)]
#[case::call_with_arguments(
    r#"(module
        (func $add (param $a i32) (param $b i32) (result i32)
            local.get $a
            local.get $b
            i32.add)
        (func $main (result i32)
            i32.const 40
            i32.const 2
            call $add)
        (export "main" (func $main)))"#,
    &[42]
)]
// local.tee leaves the value on top and stores it: 7 + 3, then $x again.
#[case::locals_and_tee(
    r#"(module
        (func $m (result i32) (result i32) (local $x i32)
            i32.const 7
            local.tee $x
            i32.const 3
            i32.add
            local.get $x)
        (export "main" (func $m)))"#,
    &[10, 7]
)]
#[case::block_result(
    r#"(module
        (func $m (result i32)
            (block $b (result i32) i32.const 99)
            return)
        (export "main" (func $m)))"#,
    &[99]
)]
#[case::tee_equals_set_then_get(
    r#"(module
        (func $m (result i32) (result i32) (local $a i32) (local $b i32)
            i32.const 5 local.tee $a
            i32.const 5 local.set $b local.get $b
            i32.eq
            local.get $a)
        (export "main" (func $m)))"#,
    &[1, 5]
)]
// Declared result order is preserved for more than two results.
#[case::multi_result_order(
    r#"(module
        (func $m (result i32) (result i32) (result i32) (result i32)
            i32.const 40
            i32.const 30
            i32.const 20
            i32.const 10)
        (export "main" (func $m)))"#,
    &[40, 30, 20, 10]
)]
#[case::nested_blocks(
    r#"(module
        (func $m (result i32)
            (block $outer (result i32)
                (block $inner (result i32) i32.const 150)
                i32.const 150
                i32.add))
        (export "main" (func $m)))"#,
    &[300]
)]
#[case::block_with_parameters(
    r#"(module
        (func $m (result i32)
            i32.const 2
            i32.const 20
            (block $scale (param i32) (param i32) (result i32) i32.mul)
            i32.const 2
            i32.add)
        (export "main" (func $m)))"#,
    &[42]
)]
#[case::call_through_ordinal_and_id(
    r#"(module
        (func $inc (param i32) (result i32) local.get 0 i32.const 1 i32.add)
        (func $twice (param $v i32) (result i32)
            local.get $v call 0 call $inc)
        (func $main (result i32) i32.const 40 call $twice)
        (export "main" (func $main)))"#,
    &[42]
)]
#[case::parameters_arrive_in_declaration_order(
    r#"(module
        (func $sub (param $a i32) (param $b i32) (result i32)
            local.get $a
            local.get $b
            i32.sub)
        (func $main (result i32)
            i32.const 50
            i32.const 8
            call $sub)
        (export "main" (func $main)))"#,
    &[42]
)]
#[case::locals_default_to_zero(
    r#"(module
        (func $m (result i32) (local $x i32) (local $y i32)
            local.get $x
            local.get $y
            i32.add)
        (export "main" (func $m)))"#,
    &[0]
)]
#[case::eqz_boolean(
    r#"(module
        (func $m (result i32) (result i32) (result i32)
            i32.const 0 i32.eqz
            i32.const 7 i32.eqz
            i32.const -1 i32.eqz)
        (export "main" (func $m)))"#,
    &[1, 0, 0]
)]
#[case::drop_discards(
    r#"(module
        (func $m (result i32)
            i32.const 1
            i32.const 2
            drop)
        (export "main" (func $m)))"#,
    &[1]
)]
#[case::zero_results(
    r#"(module
        (func $m i32.const 3 drop)
        (export "main" (func $m)))"#,
    &[]
)]
fn executes_to_expected_results(#[case] source: &str, #[case] expected: &[i32]) {
    let results = run(source, "main").unwrap();
    assert_eq!(results, i32s(expected));
}

// ----------------------------------------------------------------------------
// Trapping scenarios
// ----------------------------------------------------------------------------

#[test]
fn divide_by_zero() {
    let err = run(
        r#"(module
            (func $m (result i32) i32.const 10 i32.const 0 i32.div_s)
            (export "main" (func $m)))"#,
        "main",
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::IntegerDivideByZero), "{err}");
}

#[test]
fn int_min_divided_by_minus_one() {
    let err = run(
        r#"(module
            (func $m (result i32) i32.const -2147483648 i32.const -1 i32.div_s)
            (export "main" (func $m)))"#,
        "main",
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::IntegerOverflow), "{err}");
}

#[test]
fn unknown_export() {
    let err = run(r#"(module (func $m) (export "main" (func $m)))"#, "nope").unwrap_err();
    assert!(matches!(err, RuntimeError::ExportNotFound(_)), "{err}");
}

#[test]
fn export_target_not_a_function() {
    let err = run(r#"(module (export "mem" (memory 0)))"#, "mem").unwrap_err();
    assert!(matches!(err, RuntimeError::ExportTargetNotFunction(_)), "{err}");
}

#[test]
fn export_points_at_missing_function() {
    let err = run(r#"(module (export "main" (func $ghost)))"#, "main").unwrap_err();
    assert!(matches!(err, RuntimeError::FunctionNotFound(_)), "{err}");
}

#[test]
fn call_to_missing_function() {
    let err = run(
        r#"(module (func $m call $ghost) (export "main" (func $m)))"#,
        "main",
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::FunctionNotFound(_)), "{err}");
}

#[test]
fn non_i32_parameters_are_unsupported() {
    let err = run(
        r#"(module
            (func $f (param $x f64))
            (func $m i32.const 0 call $f)
            (export "main" (func $m)))"#,
        "main",
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::UnsupportedType(_)), "{err}");
}

#[test]
fn set_of_undeclared_local() {
    let err = run(
        r#"(module
            (func $m i32.const 1 local.set 3)
            (export "main" (func $m)))"#,
        "main",
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::LocalVariableInconsistent(_)), "{err}");
}

// ----------------------------------------------------------------------------
// Host surface behaviour
// ----------------------------------------------------------------------------

#[test]
fn ordinal_and_id_exports_hit_the_same_function() {
    let source = r#"(module
        (func $answer (result i32) i32.const 42)
        (export "by-id" (func $answer))
        (export "by-ordinal" (func 0)))"#;

    assert_eq!(run(source, "by-id").unwrap(), i32s(&[42]));
    assert_eq!(run(source, "by-ordinal").unwrap(), i32s(&[42]));
}

#[test]
fn vm_can_execute_repeatedly() {
    let module = wat::parse(
        r#"(module
            (func $m (result i32) (local $x i32)
                i32.const 1 local.set $x local.get $x)
            (export "main" (func $m)))"#,
    )
    .unwrap();
    let mut vm = Vm::new(&module);

    for _ in 0..3 {
        assert_eq!(vm.exec_func("main", None).unwrap(), i32s(&[1]));
        assert_eq!(vm.stack_len(), 0);
    }
}

#[test]
fn stack_capacity_option_is_enforced() {
    let module = wat::parse(
        r#"(module
            (func $m i32.const 1 i32.const 2 i32.const 3 drop drop drop)
            (export "main" (func $m)))"#,
    )
    .unwrap();

    // Three operands plus the activation marker do not fit in three slots.
    let mut vm = Vm::with_options(&module, VmOptions { stack_capacity: 3 });
    let err = vm.exec_func("main", None).unwrap_err();
    assert!(matches!(err, RuntimeError::StackOverflow), "{err}");

    // The default capacity takes the same module in stride.
    let mut vm = Vm::new(&module);
    assert!(vm.exec_func("main", None).is_ok());
}

#[test]
fn pre_cancelled_token_stops_execution() {
    let module = wat::parse(
        r#"(module
            (func $m (result i32) i32.const 1)
            (export "main" (func $m)))"#,
    )
    .unwrap();
    let mut vm = Vm::new(&module);

    let token = CancelToken::new();
    token.cancel();
    let err = vm.exec_func("main", Some(&token)).unwrap_err();
    assert!(matches!(err, RuntimeError::Cancelled), "{err}");

    // A fresh token lets the same VM run the same export.
    assert_eq!(vm.exec_func("main", Some(&CancelToken::new())).unwrap(), i32s(&[1]));
}

#[test]
fn results_match_declared_types() {
    let module = wat::parse(
        r#"(module
            (func $m (result i32) i32.const -7)
            (export "main" (func $m)))"#,
    )
    .unwrap();
    let results = Vm::new(&module).exec_func("main", None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].ty(), wasmexec::module::ValueType::I32);
    assert_eq!(results[0].as_i32(), Some(-7));
}
