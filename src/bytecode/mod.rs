pub mod instruction;
pub mod loader;
pub mod reader;

pub use instruction::{Instruction, OpCode, OpMode, FIELDS_PER_FLUSH};
pub use loader::load_chunk;
