use std::rc::Rc;

use thiserror::Error;

// attached by the dispatch loop on the way out of Frame::run
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub pc: usize,
    pub source: Option<Rc<str>>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{source}:{}", self.pc),
            None => write!(f, "?:{}", self.pc),
        }
    }
}

#[derive(Debug, Error)]
pub enum LuaError {
    #[error("corrupt chunk: {0}")]
    CorruptChunk(&'static str),
    #[error("unexpected end of chunk")]
    UnexpectedEof,
    #[error("index overflow")]
    IndexOverflow,
    #[error("invalid operand: {0}")]
    InvalidOperand(&'static str),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("table index is NaN")]
    NaNIndex,
    #[error("execution aborted by hook")]
    Aborted,
    #[error("unsupported opcode: {0}")]
    Unsupported(&'static str),
    #[error("{0}")]
    NativeError(String),
    #[error("{inner} (at {context})")]
    WithContext {
        #[source]
        inner: Box<LuaError>,
        context: ErrorContext,
    },
}

impl LuaError {
    // first unwind through a frame attaches context; a callee's context wins on nesting
    pub fn with_context(self, pc: usize, source: Option<Rc<str>>) -> LuaError {
        match self {
            LuaError::WithContext { .. } => self,
            other => LuaError::WithContext {
                inner: Box::new(other),
                context: ErrorContext { pc, source },
            },
        }
    }
}

pub type LuaResult<T> = Result<T, LuaError>;
