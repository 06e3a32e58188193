use std::rc::Rc;

use crate::bytecode::{FIELDS_PER_FLUSH, Instruction, OpCode};
use crate::error::{LuaError, LuaResult};
use crate::types::arith::{self, ArithOp, Ordering3};
use crate::types::{LuaClosure, LuaTable, LuaValue, number};

use super::frame::Frame;
use super::machine::VirtualMachine;

fn table_get(v: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
    match v {
        LuaValue::Table(t) => t.borrow().get(key),
        _ => Err(LuaError::InvalidOperand("index of non-table value")),
    }
}

fn table_set(v: &LuaValue, key: LuaValue, value: LuaValue) -> LuaResult<()> {
    match v {
        LuaValue::Table(t) => t.borrow_mut().set(key, value),
        _ => Err(LuaError::InvalidOperand("index of non-table value")),
    }
}

fn arith_op_for(op: OpCode) -> ArithOp {
    match op {
        OpCode::Add => ArithOp::Add,
        OpCode::Sub => ArithOp::Sub,
        OpCode::Mul => ArithOp::Mul,
        OpCode::Mod => ArithOp::Mod,
        OpCode::Pow => ArithOp::Pow,
        OpCode::Div => ArithOp::Div,
        OpCode::IDiv => ArithOp::IDiv,
        OpCode::BAnd => ArithOp::BAnd,
        OpCode::BOr => ArithOp::BOr,
        OpCode::BXor => ArithOp::BXor,
        OpCode::Shl => ArithOp::Shl,
        OpCode::Shr => ArithOp::Shr,
        _ => unreachable!("arith_op_for called with a non-arithmetic opcode"),
    }
}

// R[A+1..A+B-1] if B != 0, else R[A+1..dyn_top)
fn gather_args(frame: &Frame, a: usize, b: usize) -> Vec<LuaValue> {
    let end = if b != 0 { a + b } else { frame.dyn_top };
    (a + 1..end).map(|i| frame.reg(i)).collect()
}

// C == 0 adopts every result and extends dyn_top; C == 1 discards all;
// otherwise exactly C - 1 results are written, padded with Nil
fn store_results(frame: &mut Frame, a: usize, c: usize, results: &[LuaValue]) -> LuaResult<()> {
    if c == 0 {
        for (i, v) in results.iter().enumerate() {
            frame.set_reg(a + i, v.clone())?;
        }
        frame.dyn_top = a + results.len();
    } else {
        for i in 0..c - 1 {
            frame.set_reg(a + i, results.get(i).cloned().unwrap_or(LuaValue::Nil))?;
        }
    }
    Ok(())
}

impl VirtualMachine {
    pub fn call_value(&self, callee: &LuaValue, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        match callee {
            LuaValue::Function(closure) => self.call_closure(closure.clone(), args),
            LuaValue::Native(native) => native.call(args),
            _ => Err(LuaError::InvalidOperand("call of non-function value")),
        }
    }

    pub fn call_closure(&self, closure: Rc<LuaClosure>, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        let num_params = closure.proto.num_params as usize;
        let varargs =
            if closure.proto.is_vararg != 0 && args.len() > num_params { args[num_params..].to_vec() } else { Vec::new() };
        let mut frame = Frame::new(closure, args, varargs);
        self.run(&mut frame)
    }

    fn run(&self, frame: &mut Frame) -> LuaResult<Vec<LuaValue>> {
        loop {
            let op_pc = frame.pc;
            let ins = frame.fetch().map_err(|e| e.with_context(op_pc, frame.source_name()))?;
            self.fire_hook(op_pc).map_err(|e| e.with_context(op_pc, frame.source_name()))?;
            match self.step(frame, ins).map_err(|e| e.with_context(op_pc, frame.source_name()))? {
                Some(values) => return Ok(values),
                None => continue,
            }
        }
    }

    fn step(&self, frame: &mut Frame, ins: Instruction) -> LuaResult<Option<Vec<LuaValue>>> {
        match ins.op {
            OpCode::Move => {
                frame.set_reg(ins.a, frame.reg(ins.b))?;
            }
            OpCode::LoadK => {
                let v = frame.get_const(ins.bx)?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::LoadKx => {
                let extra = frame.fetch()?;
                let v = frame.get_const(extra.ax)?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::LoadBool => {
                frame.set_reg(ins.a, LuaValue::Boolean(ins.b != 0))?;
                if ins.c != 0 {
                    frame.add_pc(1);
                }
            }
            OpCode::LoadNil => {
                for i in ins.a..=ins.a + ins.b {
                    frame.set_reg(i, LuaValue::Nil)?;
                }
            }
            OpCode::GetUpval => {
                let v = frame.closure.upvalues[ins.b].borrow().clone();
                frame.set_reg(ins.a, v)?;
            }
            OpCode::SetUpval => {
                *frame.closure.upvalues[ins.b].borrow_mut() = frame.reg(ins.a);
            }
            OpCode::GetTabUp => {
                let table = frame.closure.upvalues[ins.b].borrow().clone();
                let key = frame.get_rk(ins.c)?;
                let v = table_get(&table, &key)?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::SetTabUp => {
                let table = frame.closure.upvalues[ins.a].borrow().clone();
                let key = frame.get_rk(ins.b)?;
                let value = frame.get_rk(ins.c)?;
                table_set(&table, key, value)?;
            }
            OpCode::GetTable => {
                let table = frame.reg(ins.b);
                let key = frame.get_rk(ins.c)?;
                let v = table_get(&table, &key)?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::SetTable => {
                let table = frame.reg(ins.a);
                let key = frame.get_rk(ins.b)?;
                let value = frame.get_rk(ins.c)?;
                table_set(&table, key, value)?;
            }
            OpCode::NewTable => {
                frame.set_reg(ins.a, LuaValue::new_table(LuaTable::new()))?;
            }
            OpCode::LSelf => {
                let table = frame.reg(ins.b);
                frame.set_reg(ins.a + 1, table.clone())?;
                let key = frame.get_rk(ins.c)?;
                let v = table_get(&table, &key)?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Mod
            | OpCode::Pow
            | OpCode::Div
            | OpCode::IDiv
            | OpCode::BAnd
            | OpCode::BOr
            | OpCode::BXor
            | OpCode::Shl
            | OpCode::Shr => {
                let b = frame.get_rk(ins.b)?;
                let c = frame.get_rk(ins.c)?;
                let v = arith::arith(arith_op_for(ins.op), &b, &c)?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::Unm => {
                let v = arith::unary_minus(&frame.reg(ins.b))?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::BNot => {
                let v = arith::bitwise_not(&frame.reg(ins.b))?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::Not => {
                let v = LuaValue::Boolean(!frame.reg(ins.b).to_boolean());
                frame.set_reg(ins.a, v)?;
            }
            OpCode::Len => {
                let v = arith::length(&frame.reg(ins.b))?;
                frame.set_reg(ins.a, v)?;
            }
            OpCode::Concat => {
                let mut acc = frame.reg(ins.b);
                for i in ins.b + 1..=ins.c {
                    acc = arith::concat(&acc, &frame.reg(i))?;
                }
                frame.set_reg(ins.a, acc)?;
            }
            OpCode::Jmp => {
                frame.add_pc(ins.sbx);
                if ins.a != 0 {
                    frame.close_from(ins.a - 1);
                }
            }
            OpCode::Eq | OpCode::Lt | OpCode::Le => {
                let b = frame.get_rk(ins.b)?;
                let c = frame.get_rk(ins.c)?;
                let test = if ins.op == OpCode::Eq {
                    arith::values_equal(&b, &c)
                } else {
                    let ord = arith::compare(&b, &c)?;
                    if ins.op == OpCode::Lt { ord == Ordering3::Lt } else { ord != Ordering3::Gt }
                };
                if test != (ins.a != 0) {
                    frame.add_pc(1);
                }
            }
            OpCode::Test => {
                if frame.reg(ins.a).to_boolean() != (ins.c != 0) {
                    frame.add_pc(1);
                }
            }
            OpCode::TestSet => {
                let b = frame.reg(ins.b);
                if b.to_boolean() == (ins.c != 0) {
                    frame.set_reg(ins.a, b)?;
                } else {
                    frame.add_pc(1);
                }
            }
            OpCode::Call | OpCode::TailCall => {
                let callee = frame.reg(ins.a);
                let args = gather_args(frame, ins.a, ins.b);
                let results = self.call_value(&callee, &args)?;
                store_results(frame, ins.a, ins.c, &results)?;
            }
            OpCode::Return => {
                let values = if ins.b == 0 {
                    (ins.a..frame.dyn_top).map(|i| frame.reg(i)).collect()
                } else if ins.b == 1 {
                    Vec::new()
                } else {
                    (ins.a..ins.a + ins.b - 1).map(|i| frame.reg(i)).collect()
                };
                return Ok(Some(values));
            }
            OpCode::ForPrep => {
                let init = arith::arith(ArithOp::Sub, &frame.reg(ins.a), &frame.reg(ins.a + 2))?;
                frame.set_reg(ins.a, init)?;
                frame.add_pc(ins.sbx);
            }
            OpCode::ForLoop => {
                let step = frame.reg(ins.a + 2);
                let counter = arith::arith(ArithOp::Add, &frame.reg(ins.a), &step)?;
                let limit = frame.reg(ins.a + 1);
                let step_nonneg = number::to_float(&step).unwrap_or(0.0) >= 0.0;
                let ord = arith::compare(&counter, &limit)?;
                let continues = if step_nonneg { ord != Ordering3::Gt } else { ord != Ordering3::Lt };
                frame.set_reg(ins.a, counter.clone())?;
                if continues {
                    frame.add_pc(ins.sbx);
                    frame.set_reg(ins.a + 3, counter)?;
                }
            }
            OpCode::TForCall => {
                return Err(LuaError::Unsupported("TFORCALL (generic-for protocol)"));
            }
            OpCode::TForLoop => {
                return Err(LuaError::Unsupported("TFORLOOP (generic-for protocol)"));
            }
            OpCode::SetList => {
                let c = if ins.c == 0 { frame.fetch()?.ax } else { ins.c };
                let n = if ins.b != 0 { ins.b } else { frame.dyn_top - ins.a - 1 };
                let table = frame.reg(ins.a);
                for i in 1..=n {
                    let key = LuaValue::Integer(((c - 1) * FIELDS_PER_FLUSH + i) as i64);
                    let value = frame.reg(ins.a + i);
                    table_set(&table, key, value)?;
                }
            }
            OpCode::Closure => {
                let child = frame.closure.proto.prototypes[ins.bx].clone();
                let mut upvalues = Vec::with_capacity(child.upvalues.len());
                for desc in &child.upvalues {
                    let cell = if desc.in_stack {
                        frame.reg_cell(desc.index as usize)
                    } else {
                        frame.closure.upvalues[desc.index as usize].clone()
                    };
                    upvalues.push(cell);
                }
                let closure = Rc::new(LuaClosure { proto: child, upvalues });
                frame.set_reg(ins.a, LuaValue::Function(closure))?;
            }
            OpCode::Vararg => {
                let n = if ins.b != 0 { ins.b - 1 } else { frame.varargs.len() };
                for i in 0..n {
                    let v = frame.varargs.get(i).cloned().unwrap_or(LuaValue::Nil);
                    frame.set_reg(ins.a + i, v)?;
                }
                if ins.b == 0 {
                    frame.dyn_top = ins.a + n;
                }
            }
            OpCode::ExtraArg => {
                return Err(LuaError::Unsupported("stray EXTRAARG"));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::bytecode::Instruction;
    use crate::types::{LuaClosure, Prototype};

    use super::*;

    fn ins(op: OpCode, a: usize, b: usize, c: usize) -> Instruction {
        Instruction { mode: crate::bytecode::OpMode::iABC, op, a, b, c, bx: 0, sbx: 0, ax: 0 }
    }

    fn jmp(sbx: i64) -> Instruction {
        Instruction { mode: crate::bytecode::OpMode::iAsBx, op: OpCode::Jmp, a: 0, b: 0, c: 0, bx: 0, sbx, ax: 0 }
    }

    fn bx(op: OpCode, a: usize, bx_val: usize) -> Instruction {
        Instruction { mode: crate::bytecode::OpMode::iABx, op, a, b: 0, c: 0, bx: bx_val, sbx: 0, ax: 0 }
    }

    fn closure_with(code: Vec<Instruction>, constants: Vec<LuaValue>, max_stack: u8) -> Rc<LuaClosure> {
        let mut proto = Prototype::new();
        proto.code = code;
        proto.constants = constants;
        proto.max_stack_size = max_stack;
        Rc::new(LuaClosure { proto: Rc::new(proto), upvalues: Vec::new() })
    }

    #[test]
    fn integer_add_and_return() {
        let vm = VirtualMachine::new();
        let code = vec![
            bx(OpCode::LoadK, 0, 0),
            bx(OpCode::LoadK, 1, 1),
            ins(OpCode::Add, 2, 0, 1),
            ins(OpCode::Return, 2, 2, 0),
        ];
        let closure = closure_with(code, vec![LuaValue::Integer(3), LuaValue::Integer(4)], 3);
        let result = vm.call_closure(closure, &[]).unwrap();
        assert_eq!(result, vec![LuaValue::Integer(7)]);
    }

    #[test]
    fn jmp_skips_forward() {
        let vm = VirtualMachine::new();
        let code = vec![
            jmp(1),
            bx(OpCode::LoadK, 0, 0), // skipped
            bx(OpCode::LoadK, 0, 1),
            ins(OpCode::Return, 0, 2, 0),
        ];
        let closure = closure_with(code, vec![LuaValue::Integer(1), LuaValue::Integer(2)], 1);
        let result = vm.call_closure(closure, &[]).unwrap();
        assert_eq!(result, vec![LuaValue::Integer(2)]);
    }

    #[test]
    fn call_with_c_zero_adopts_all_results() {
        let vm = VirtualMachine::new();
        let native = crate::types::NativeFunction::new("two", |_args| {
            Ok(vec![LuaValue::Integer(1), LuaValue::Integer(2)])
        });
        let mut proto = Prototype::new();
        proto.max_stack_size = 3;
        proto.code = vec![ins(OpCode::Call, 0, 1, 0), ins(OpCode::Return, 0, 0, 0)];
        let closure = Rc::new(LuaClosure { proto: Rc::new(proto), upvalues: Vec::new() });
        let mut frame = Frame::new(closure, &[LuaValue::Native(Rc::new(native))], Vec::new());
        let result = vm.run(&mut frame).unwrap();
        assert_eq!(result, vec![LuaValue::Integer(1), LuaValue::Integer(2)]);
    }

    #[test]
    fn tforcall_is_rejected() {
        let vm = VirtualMachine::new();
        let closure = closure_with(vec![ins(OpCode::TForCall, 0, 0, 1)], vec![], 3);
        let err = vm.call_closure(closure, &[]).unwrap_err();
        assert!(matches!(err, LuaError::WithContext { .. }));
    }

    #[test]
    fn closure_captures_enclosing_register_as_upvalue() {
        use crate::types::UpvalueDesc;

        let vm = VirtualMachine::new();
        let mut inner = Prototype::new();
        inner.max_stack_size = 1;
        inner.upvalues = vec![UpvalueDesc { in_stack: true, index: 0 }];
        inner.code = vec![ins(OpCode::GetUpval, 0, 0, 0), ins(OpCode::Return, 0, 2, 0)];

        let mut outer = Prototype::new();
        outer.max_stack_size = 2;
        outer.constants = vec![LuaValue::Integer(42)];
        outer.prototypes = vec![Rc::new(inner)];
        outer.code = vec![
            bx(OpCode::LoadK, 0, 0),
            bx(OpCode::Closure, 1, 0),
            ins(OpCode::Return, 1, 2, 0),
        ];
        let outer_closure = Rc::new(LuaClosure { proto: Rc::new(outer), upvalues: Vec::new() });
        let result = vm.call_closure(outer_closure, &[]).unwrap();
        let LuaValue::Function(captured) = &result[0] else { panic!("expected a closure") };
        let captured_result = vm.call_closure(captured.clone(), &[]).unwrap();
        assert_eq!(captured_result, vec![LuaValue::Integer(42)]);
    }
}
