use std::cell::RefCell;
use std::rc::Rc;

use tokio::io::AsyncRead;
use tracing::{debug, instrument};

use crate::bytecode::load_chunk;
use crate::error::{LuaError, LuaResult};
use crate::libs;
use crate::types::function::new_cell;
use crate::types::{LuaClosure, LuaTable, LuaValue, Prototype};

// fired every hook_every opcodes; an Err return aborts execution with LuaError::Aborted
pub type InstructionHook = Box<dyn Fn(usize) -> LuaResult<()>>;

pub struct VirtualMachine {
    pub registry: Rc<RefCell<LuaTable>>,
    pub globals: Rc<RefCell<LuaTable>>,
    hook: Option<InstructionHook>,
    hook_every: u64,
    instr_count: RefCell<u64>,
}

impl VirtualMachine {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(LuaTable::new()));
        libs::global::install(&globals);

        let registry = Rc::new(RefCell::new(LuaTable::new()));
        registry
            .borrow_mut()
            .set(LuaValue::new_string("_ENV"), LuaValue::Table(globals.clone()))
            .expect("_ENV is never Nil/NaN");

        Self { registry, globals, hook: None, hook_every: 1, instr_count: RefCell::new(0) }
    }

    pub fn with_hook(mut self, every: u64, hook: InstructionHook) -> Self {
        self.hook_every = every.max(1);
        self.hook = Some(hook);
        self
    }

    pub(super) fn fire_hook(&self, pc: usize) -> LuaResult<()> {
        let Some(hook) = &self.hook else { return Ok(()) };
        let mut count = self.instr_count.borrow_mut();
        *count += 1;
        if *count % self.hook_every == 0 {
            return hook(pc).map_err(|_| LuaError::Aborted);
        }
        Ok(())
    }

    // main prototype wrapped as a closure with _ENV as its sole upvalue
    #[instrument(skip(self, reader))]
    pub async fn load<R: AsyncRead + Unpin>(&self, reader: R) -> LuaResult<Rc<LuaClosure>> {
        let proto = load_chunk(reader).await?;
        debug!(max_stack = proto.max_stack_size, num_params = proto.num_params, "chunk loaded");
        Ok(self.wrap_main(proto))
    }

    fn wrap_main(&self, proto: Prototype) -> Rc<LuaClosure> {
        let env_cell = new_cell(LuaValue::Table(self.globals.clone()));
        Rc::new(LuaClosure { proto: Rc::new(proto), upvalues: vec![env_cell] })
    }

    pub fn execute(&self, closure: Rc<LuaClosure>, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        self.call_closure(closure, args)
    }
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}
