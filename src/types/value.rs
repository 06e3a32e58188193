use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::function::{LuaClosure, NativeFunction};
use super::number;
use super::table::LuaTable;

#[derive(Clone)]
pub enum LuaValue {
    None,
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Rc<[u8]>),
    Table(Rc<RefCell<LuaTable>>),
    Function(Rc<LuaClosure>),
    Native(Rc<NativeFunction>),
}

impl LuaValue {
    pub fn new_string<S: AsRef<[u8]>>(bytes: S) -> Self {
        LuaValue::String(Rc::from(bytes.as_ref()))
    }

    pub fn new_table(table: LuaTable) -> Self {
        LuaValue::Table(Rc::new(RefCell::new(table)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::None => "no value",
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Integer(_) | LuaValue::Float(_) => "number",
            LuaValue::String(_) => "string",
            LuaValue::Table(_) => "table",
            LuaValue::Function(_) | LuaValue::Native(_) => "function",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, LuaValue::Function(_) | LuaValue::Native(_))
    }

    pub fn to_boolean(&self) -> bool {
        number::to_boolean(self)
    }
}

impl From<bool> for LuaValue {
    fn from(value: bool) -> Self {
        LuaValue::Boolean(value)
    }
}

impl From<i64> for LuaValue {
    fn from(value: i64) -> Self {
        LuaValue::Integer(value)
    }
}

impl From<f64> for LuaValue {
    fn from(value: f64) -> Self {
        LuaValue::Float(value)
    }
}

impl From<&str> for LuaValue {
    fn from(value: &str) -> Self {
        LuaValue::new_string(value.as_bytes())
    }
}

impl std::fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::fmt::Display for LuaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LuaValue::None => write!(f, "no value"),
            LuaValue::Nil => write!(f, "nil"),
            LuaValue::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            LuaValue::Integer(i) => write!(f, "{i}"),
            LuaValue::Float(n) => write!(f, "{}", number::format_float(*n)),
            LuaValue::String(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            LuaValue::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            LuaValue::Function(c) => write!(f, "function: {:p}", Rc::as_ptr(c)),
            LuaValue::Native(n) => write!(f, "function: builtin: {:p}", Rc::as_ptr(n)),
        }
    }
}

impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        use LuaValue::*;
        match (self, other) {
            (None, None) => true,
            (Nil, Nil) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (Table(a), Table(b)) => Rc::ptr_eq(a, b),
            (Function(a), Function(b)) => Rc::ptr_eq(a, b),
            (Native(a), Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for LuaValue {}

impl Hash for LuaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LuaValue::None => 0u8.hash(state),
            LuaValue::Nil => 1u8.hash(state),
            LuaValue::Boolean(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            LuaValue::Integer(i) => {
                3u8.hash(state);
                i.hash(state);
            }
            LuaValue::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            LuaValue::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            LuaValue::Table(t) => {
                5u8.hash(state);
                (Rc::as_ptr(t) as usize).hash(state);
            }
            LuaValue::Function(c) => {
                6u8.hash(state);
                (Rc::as_ptr(c) as usize).hash(state);
            }
            LuaValue::Native(n) => {
                7u8.hash(state);
                (Rc::as_ptr(n) as usize).hash(state);
            }
        }
    }
}
