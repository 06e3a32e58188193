pub mod dispatch;
pub mod frame;
pub mod machine;
pub mod register;

pub use machine::{InstructionHook, VirtualMachine};
