use std::cell::RefCell;
use std::rc::Rc;

use rand::RngCore;

use crate::bytecode::instruction::Instruction;
use crate::error::LuaResult;

use super::value::LuaValue;

#[derive(Debug, Clone, Copy)]
pub struct UpvalueDesc {
    pub in_stack: bool,
    pub index: u8,
}

#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: String,
    pub start_pc: i64,
    pub end_pc: i64,
}

#[derive(Debug)]
pub struct Prototype {
    pub source: Option<Rc<str>>,
    pub line_defined: i64,
    pub last_line_defined: i64,
    pub num_params: u8,
    pub is_vararg: u8,
    pub max_stack_size: u8,
    pub code: Vec<Instruction>,
    pub constants: Vec<LuaValue>,
    pub upvalues: Vec<UpvalueDesc>,
    pub prototypes: Vec<Rc<Prototype>>,
    pub line_info: Vec<i64>,
    pub locals: Vec<LocalVar>,
    pub upvalue_names: Vec<String>,
}

impl Prototype {
    pub fn new() -> Self {
        Self {
            source: None,
            line_defined: 0,
            last_line_defined: 0,
            num_params: 0,
            is_vararg: 0,
            max_stack_size: 2,
            code: Vec::new(),
            constants: Vec::new(),
            upvalues: Vec::new(),
            prototypes: Vec::new(),
            line_info: Vec::new(),
            locals: Vec::new(),
            upvalue_names: Vec::new(),
        }
    }
}

pub type ValueCell = Rc<RefCell<LuaValue>>;

pub fn new_cell(v: LuaValue) -> ValueCell {
    Rc::new(RefCell::new(v))
}

#[derive(Debug)]
pub struct LuaClosure {
    pub proto: Rc<Prototype>,
    pub upvalues: Vec<ValueCell>,
}

pub type NativeFn = dyn Fn(&[LuaValue]) -> LuaResult<Vec<LuaValue>>;

pub struct NativeFunction {
    pub name: &'static str,
    id: u64,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(name: &'static str, func: impl Fn(&[LuaValue]) -> LuaResult<Vec<LuaValue>> + 'static) -> Self {
        Self { name, id: rand::rng().next_u64(), func: Box::new(func) }
    }

    pub fn call(&self, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        (self.func)(args)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunction {{ name: {:?}, id: {} }}", self.name, self.id)
    }
}
