use std::cell::RefCell;
use std::rc::Rc;

use phf::phf_map;

use crate::error::{LuaError, LuaResult};
use crate::types::{LuaTable, LuaValue, NativeFunction, number};

fn print(args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    for arg in args {
        println!("{arg}");
    }
    Ok(vec![LuaValue::Nil])
}

fn fail(args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    if args.iter().any(|a| !number::to_boolean(a)) {
        return Err(LuaError::NativeError("fail".to_string()));
    }
    println!("success");
    Ok(vec![LuaValue::Nil])
}

type Ctor = fn() -> NativeFunction;

static NATIVES: phf::Map<&'static str, Ctor> = phf_map! {
    "print" => || NativeFunction::new("print", print),
    "fail" => || NativeFunction::new("fail", fail),
};

pub fn install(globals: &Rc<RefCell<LuaTable>>) {
    let mut table = globals.borrow_mut();
    for (name, ctor) in NATIVES.entries() {
        let native = ctor();
        table.set(LuaValue::new_string(*name), LuaValue::Native(Rc::new(native))).expect("native name is never Nil/NaN");
    }
}
