use std::rc::Rc;

use crate::bytecode::Instruction;
use crate::error::{LuaError, LuaResult};
use crate::types::function::ValueCell;
use crate::types::{LuaClosure, LuaValue};

use super::register::Register;

pub struct Frame {
    pub closure: Rc<LuaClosure>,
    pub register: Register,
    pub pc: usize,
    pub varargs: Vec<LuaValue>,
    pub returned: Vec<LuaValue>,
    // exclusive end of the last C=0 CALL / B=0 VARARG result region
    pub dyn_top: usize,
}

impl Frame {
    pub fn new(closure: Rc<LuaClosure>, args: &[LuaValue], varargs: Vec<LuaValue>) -> Self {
        let mut register = Register::new();
        let num_params = closure.proto.num_params as usize;
        let size = num_params.max(closure.proto.max_stack_size as usize);
        register.push_n(size, args);
        Self { closure, register, pc: 0, varargs, returned: Vec::new(), dyn_top: size }
    }

    pub fn reg(&self, idx: usize) -> LuaValue {
        self.register.get(idx as i64 + 1)
    }

    pub fn set_reg(&mut self, idx: usize, value: LuaValue) -> LuaResult<()> {
        self.register.set(idx as i64 + 1, value)
    }

    pub fn reg_cell(&self, idx: usize) -> ValueCell {
        self.register.get_cell(idx as i64 + 1).expect("register index in range")
    }

    pub fn close_from(&mut self, from: usize) {
        let mut i = from as i64 + 1;
        let top = self.register.top();
        while i <= top {
            self.register.close(i);
            i += 1;
        }
    }

    pub fn fetch(&mut self) -> LuaResult<Instruction> {
        let ins = *self.closure.proto.code.get(self.pc).ok_or(LuaError::IndexOverflow)?;
        self.pc += 1;
        Ok(ins)
    }

    pub fn get_const(&self, idx: usize) -> LuaResult<LuaValue> {
        self.closure.proto.constants.get(idx).cloned().ok_or(LuaError::IndexOverflow)
    }

    pub fn get_rk(&self, rk: usize) -> LuaResult<LuaValue> {
        if crate::bytecode::instruction::is_constant(rk) {
            self.get_const(rk & 0xFF)
        } else {
            Ok(self.reg(rk))
        }
    }

    pub fn add_pc(&mut self, delta: i64) {
        self.pc = (self.pc as i64 + delta) as usize;
    }

    pub fn source_name(&self) -> Option<Rc<str>> {
        self.closure.proto.source.clone()
    }
}
