// hand-assembled Prototypes, not a real luac chunk; bytecode::loader has its own tests

use std::rc::Rc;

use lua53_vm::VirtualMachine;
use lua53_vm::bytecode::{Instruction, OpCode, OpMode};
use lua53_vm::types::function::new_cell;
use lua53_vm::types::{LuaClosure, LuaValue, Prototype, UpvalueDesc};

const RK: usize = 0x100;

fn iabc(op: OpCode, a: usize, b: usize, c: usize) -> Instruction {
    Instruction { mode: OpMode::iABC, op, a, b, c, bx: 0, sbx: 0, ax: 0 }
}

fn iabx(op: OpCode, a: usize, bx: usize) -> Instruction {
    Instruction { mode: OpMode::iABx, op, a, b: 0, c: 0, bx, sbx: 0, ax: 0 }
}

fn iasbx(op: OpCode, a: usize, sbx: i64) -> Instruction {
    Instruction { mode: OpMode::iAsBx, op, a, b: 0, c: 0, bx: 0, sbx, ax: 0 }
}

// single _ENV upvalue pointing at the VM's globals table, same as a loaded chunk
fn with_env(vm: &VirtualMachine, mut proto: Prototype) -> Rc<LuaClosure> {
    proto.upvalues = vec![UpvalueDesc { in_stack: false, index: 0 }];
    let env_cell = new_cell(LuaValue::Table(vm.globals.clone()));
    Rc::new(LuaClosure { proto: Rc::new(proto), upvalues: vec![env_cell] })
}

#[test]
fn s1_integer_arithmetic_and_print() {
    let vm = VirtualMachine::new();
    let mut proto = Prototype::new();
    proto.max_stack_size = 7;
    proto.constants = vec![LuaValue::Integer(3), LuaValue::Integer(4), LuaValue::Integer(2), LuaValue::new_string("print")];
    proto.code = vec![
        iabx(OpCode::LoadK, 0, 0),         // R0 = 3
        iabx(OpCode::LoadK, 1, 1),         // R1 = 4
        iabx(OpCode::LoadK, 2, 2),         // R2 = 2
        iabc(OpCode::Mul, 3, 1, 2),        // R3 = R1 * R2
        iabc(OpCode::Add, 4, 0, 3),        // R4 = R0 + R3
        iabc(OpCode::GetTabUp, 5, 0, RK | 3), // R5 = _ENV["print"]
        iabc(OpCode::Move, 6, 4, 0),       // R6 = R4
        iabc(OpCode::Call, 5, 2, 1),       // print(R6); discard results
        iabc(OpCode::Return, 4, 2, 0),     // return R4
    ];

    let result = vm.execute(with_env(&vm, proto), &[]).unwrap();
    assert_eq!(result, vec![LuaValue::Integer(11)]);
}

#[test]
fn s2_string_concat_coercion() {
    let vm = VirtualMachine::new();
    let mut proto = Prototype::new();
    proto.max_stack_size = 3;
    proto.constants = vec![LuaValue::new_string("x = "), LuaValue::Integer(42)];
    proto.code = vec![
        iabx(OpCode::LoadK, 0, 0),
        iabx(OpCode::LoadK, 1, 1),
        iabc(OpCode::Concat, 2, 0, 1),
        iabc(OpCode::Return, 2, 2, 0),
    ];

    let result = vm.execute(with_env(&vm, proto), &[]).unwrap();
    assert_eq!(result, vec![LuaValue::new_string("x = 42")]);
}

#[test]
fn s3_numeric_for_loop_copies_counter_to_visible_slot() {
    let vm = VirtualMachine::new();
    let mut proto = Prototype::new();
    proto.max_stack_size = 6;
    proto.constants = vec![LuaValue::Integer(1), LuaValue::Integer(3), LuaValue::Integer(1), LuaValue::new_string("print")];
    proto.code = vec![
        iabx(OpCode::LoadK, 0, 0),           // 0: R0 = 1 (init)
        iabx(OpCode::LoadK, 1, 1),           // 1: R1 = 3 (limit)
        iabx(OpCode::LoadK, 2, 2),           // 2: R2 = 1 (step)
        iasbx(OpCode::ForPrep, 0, 3),        // 3: R0 -= step; jump to ForLoop (7)
        iabc(OpCode::GetTabUp, 4, 0, RK | 3), // 4: R4 = _ENV["print"]
        iabc(OpCode::Move, 5, 3, 0),         // 5: R5 = R3 (loop variable)
        iabc(OpCode::Call, 4, 2, 1),         // 6: print(R5)
        iasbx(OpCode::ForLoop, 0, -4),       // 7: R0 += step; maybe jump back to 4
        iabc(OpCode::Return, 0, 1, 0),       // 8: return
    ];

    let result = vm.execute(with_env(&vm, proto), &[]).unwrap();
    assert!(result.is_empty());
}

#[test]
fn s4_table_densification_and_shrink() {
    let vm = VirtualMachine::new();
    let mut proto = Prototype::new();
    proto.max_stack_size = 1;
    proto.constants =
        vec![LuaValue::Integer(1), LuaValue::Integer(10), LuaValue::Integer(3), LuaValue::Integer(30), LuaValue::Integer(2), LuaValue::Integer(20)];
    proto.code = vec![
        iabc(OpCode::NewTable, 0, 0, 0),
        iabc(OpCode::SetTable, 0, RK | 0, RK | 1), // t[1] = 10
        iabc(OpCode::SetTable, 0, RK | 2, RK | 3), // t[3] = 30 (goes to hash part)
        iabc(OpCode::SetTable, 0, RK | 4, RK | 5), // t[2] = 20 (densifies 2 and 3 into array)
        iabc(OpCode::Return, 0, 2, 0),
    ];

    let result = vm.execute(with_env(&vm, proto), &[]).unwrap();
    let LuaValue::Table(t) = &result[0] else { panic!("expected a table") };
    let t = t.borrow();
    assert_eq!(t.len(), 3);
    assert_eq!(t.get(&LuaValue::Integer(1)).unwrap(), LuaValue::Integer(10));
    assert_eq!(t.get(&LuaValue::Integer(2)).unwrap(), LuaValue::Integer(20));
    assert_eq!(t.get(&LuaValue::Integer(3)).unwrap(), LuaValue::Integer(30));
}

#[test]
fn s5_closure_upvalue_sharing_across_calls() {
    let vm = VirtualMachine::new();

    // The returned counter closure: c = c + 1; return c.
    let mut inner = Prototype::new();
    inner.max_stack_size = 3;
    inner.constants = vec![LuaValue::Integer(1)];
    inner.upvalues = vec![UpvalueDesc { in_stack: true, index: 0 }];
    inner.code = vec![
        iabc(OpCode::GetUpval, 0, 0, 0),
        iabx(OpCode::LoadK, 1, 0),
        iabc(OpCode::Add, 2, 0, 1),
        iabc(OpCode::SetUpval, 2, 0, 0),
        iabc(OpCode::Return, 2, 2, 0),
    ];

    // mk(): local c = 0; return function() ... end
    let mut outer = Prototype::new();
    outer.max_stack_size = 2;
    outer.constants = vec![LuaValue::Integer(0)];
    outer.prototypes = vec![Rc::new(inner)];
    outer.code = vec![iabx(OpCode::LoadK, 0, 0), iabx(OpCode::Closure, 1, 0), iabc(OpCode::Return, 1, 2, 0)];

    let mk_result = vm.execute(with_env(&vm, outer), &[]).unwrap();
    let LuaValue::Function(counter) = &mk_result[0] else { panic!("expected a closure") };

    let r1 = vm.call_closure(counter.clone(), &[]).unwrap();
    let r2 = vm.call_closure(counter.clone(), &[]).unwrap();
    let r3 = vm.call_closure(counter.clone(), &[]).unwrap();
    assert_eq!(r1, vec![LuaValue::Integer(1)]);
    assert_eq!(r2, vec![LuaValue::Integer(2)]);
    assert_eq!(r3, vec![LuaValue::Integer(3)]);
}

#[test]
fn s6_native_error_propagation() {
    let vm = VirtualMachine::new();
    let mut proto = Prototype::new();
    proto.max_stack_size = 2;
    proto.constants = vec![LuaValue::new_string("fail")];
    proto.code = vec![
        iabc(OpCode::GetTabUp, 0, 0, RK | 0), // R0 = _ENV["fail"]
        iabc(OpCode::LoadBool, 1, 0, 0), // R1 = false
        iabc(OpCode::Call, 0, 2, 1),
        iabc(OpCode::Return, 0, 1, 0),
    ];

    let err = vm.execute(with_env(&vm, proto), &[]).unwrap_err();
    assert!(err.to_string().contains("fail"));
}
