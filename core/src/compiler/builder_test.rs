//! Tests for the program builder's stack bookkeeping.

use pretty_assertions::assert_eq;

use crate::{
    compiler::ProgramBuilder,
    ops,
    vm::{Affine, Callable, CellRef, Op},
};

fn var(i: u32) -> Affine {
    Affine::variable(CellRef::new(i))
}

fn konst(v: f64) -> Affine {
    Affine::constant(v)
}

#[test]
fn test_value_appends_track_positions() {
    let mut b = ProgramBuilder::new();
    b.append_value(var(0));
    b.append_value(var(1));
    b.append_value(konst(3.0));

    assert_eq!(b.stack_pos, 3);
    assert_eq!(b.max_stack, 3);
    assert_eq!(b.rpn[0].stack_pos, 1);
    assert_eq!(b.rpn[1].stack_pos, 2);
    assert_eq!(b.rpn[2].stack_pos, 3);
}

#[test]
fn test_function_append_net_stack_effect() {
    let mut b = ProgramBuilder::new();
    b.append_value(var(0));
    b.append_value(var(1));
    // Two distinct variables: no fusion rule fires.
    b.append_function(Callable::infix("+", ops::add)).unwrap();

    assert_eq!(b.stack_pos, 1);
    assert_eq!(b.max_stack, 2);
    assert_eq!(b.rpn.len(), 3);
    match &b.rpn[2].op {
        Op::Call(call) => {
            assert_eq!(call.ident, "+");
            assert_eq!(call.argc, 2);
            assert!(call.extra.is_empty());
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn test_remove_last_restores_position() {
    let mut b = ProgramBuilder::new();
    b.append_value(var(0));
    b.append_value(var(1));
    b.append_function(Callable::infix("+", ops::add)).unwrap();
    assert_eq!(b.stack_pos, 1);

    let removed = b.remove_last();
    assert!(matches!(removed.op, Op::Call(_)));
    // Both operands are back on the stack.
    assert_eq!(b.stack_pos, 2);
    assert_eq!(b.rpn.len(), 2);
}

#[test]
fn test_assign_consumes_one_value() {
    let mut b = ProgramBuilder::new();
    b.append_value(var(0));
    b.append_value(konst(5.0));
    b.append_assign(CellRef::new(0));

    assert_eq!(b.stack_pos, 1);
    assert!(matches!(b.rpn.last().unwrap().op, Op::Assign { .. }));
    assert_eq!(b.rpn.last().unwrap().stack_pos, 1);
}

#[test]
fn test_if_else_depth_modeling() {
    let mut b = ProgramBuilder::new();
    b.append_value(var(0)); // condition
    b.append_if();
    assert_eq!(b.stack_pos, 0);

    b.append_value(konst(1.0)); // taken branch
    assert_eq!(b.stack_pos, 1);

    b.append_else();
    // Only one branch's value is live at run time.
    assert_eq!(b.stack_pos, 0);

    b.append_value(konst(2.0)); // alternative branch
    b.append_endif();
    assert_eq!(b.stack_pos, 1);
    assert_eq!(b.max_stack, 1);
}

#[test]
fn test_zero_arity_function_pushes_result() {
    fn two(args: &mut [f64]) {
        args[0] = 2.0;
    }

    let mut b = ProgramBuilder::new();
    b.append_function(Callable::function("two", two, 0)).unwrap();

    assert_eq!(b.stack_pos, 1);
    assert_eq!(b.max_stack, 1);
    match &b.rpn[0].op {
        Op::Call(call) => assert_eq!(call.argc, 0),
        other => panic!("expected a call, got {:?}", other),
    }
}
