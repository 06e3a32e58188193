pub mod bytecode;
pub mod error;
pub mod libs;
pub mod types;
pub mod vm;

pub use error::{LuaError, LuaResult};
pub use vm::VirtualMachine;
