use crate::error::{LuaError, LuaResult};

use super::number::{to_float, to_integer};
use super::value::LuaValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Mod,
    IDiv,
    Pow,
    Div,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering3 {
    Lt,
    Eq,
    Gt,
}

fn both_integers(a: &LuaValue, b: &LuaValue) -> Option<(i64, i64)> {
    match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => Some((*x, *y)),
        _ => None,
    }
}

fn floor_div_i64(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q }
}

fn mod_i64(a: i64, b: i64) -> i64 {
    a.wrapping_sub(floor_div_i64(a, b).wrapping_mul(b))
}

// result takes the sign of b, like Lua's %
fn fmod(a: f64, b: f64) -> f64 {
    if (a > 0.0 && b.is_infinite() && b > 0.0) || (a < 0.0 && b.is_infinite() && b < 0.0) {
        return a;
    }
    if (a > 0.0 && b.is_infinite() && b < 0.0) || (a < 0.0 && b.is_infinite() && b > 0.0) {
        return b;
    }
    a - (a / b).floor() * b
}

pub fn arith(op: ArithOp, a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
    use ArithOp::*;
    match op {
        Add | Sub | Mul | Mod | IDiv => {
            if let Some((x, y)) = both_integers(a, b) {
                return Ok(LuaValue::Integer(match op {
                    Add => x.wrapping_add(y),
                    Sub => x.wrapping_sub(y),
                    Mul => x.wrapping_mul(y),
                    Mod => {
                        if y == 0 {
                            return Err(LuaError::InvalidOperand("modulo by zero"));
                        }
                        mod_i64(x, y)
                    }
                    IDiv => {
                        if y == 0 {
                            return Err(LuaError::InvalidOperand("integer division by zero"));
                        }
                        floor_div_i64(x, y)
                    }
                    _ => unreachable!(),
                }));
            }
            let x = to_float(a).ok_or(LuaError::InvalidOperand("arithmetic on non-number"))?;
            let y = to_float(b).ok_or(LuaError::InvalidOperand("arithmetic on non-number"))?;
            Ok(LuaValue::Float(match op {
                Add => x + y,
                Sub => x - y,
                Mul => x * y,
                Mod => fmod(x, y),
                IDiv => (x / y).floor(),
                _ => unreachable!(),
            }))
        }
        Pow | Div => {
            let x = to_float(a).ok_or(LuaError::InvalidOperand("arithmetic on non-number"))?;
            let y = to_float(b).ok_or(LuaError::InvalidOperand("arithmetic on non-number"))?;
            Ok(LuaValue::Float(match op {
                Pow => x.powf(y),
                Div => x / y,
                _ => unreachable!(),
            }))
        }
        BAnd | BOr | BXor => {
            let x = to_integer(a).ok_or(LuaError::InvalidOperand("bitwise op on non-integer"))?;
            let y = to_integer(b).ok_or(LuaError::InvalidOperand("bitwise op on non-integer"))?;
            Ok(LuaValue::Integer(match op {
                BAnd => x & y,
                BOr => x | y,
                BXor => x ^ y,
                _ => unreachable!(),
            }))
        }
        Shl | Shr => {
            let x = to_integer(a).ok_or(LuaError::InvalidOperand("shift on non-integer"))? as u64;
            let y = to_integer(b).ok_or(LuaError::InvalidOperand("shift on non-integer"))?;
            let left = op == Shl;
            Ok(LuaValue::Integer(shift(x, y, left) as i64))
        }
    }
}

// negative count reverses direction, shifts of >=64 bits yield zero
fn shift(x: u64, count: i64, left: bool) -> u64 {
    let (left, count) = if count < 0 { (!left, count.unsigned_abs()) } else { (left, count as u64) };
    if count >= 64 {
        0
    } else if left {
        x << count
    } else {
        x >> count
    }
}

pub fn unary_minus(a: &LuaValue) -> LuaResult<LuaValue> {
    match a {
        LuaValue::Integer(i) => Ok(LuaValue::Integer(i.wrapping_neg())),
        LuaValue::Float(f) => Ok(LuaValue::Float(-f)),
        _ => match to_float(a) {
            Some(f) => Ok(LuaValue::Float(-f)),
            None => Err(LuaError::InvalidOperand("unary minus on non-number")),
        },
    }
}

pub fn bitwise_not(a: &LuaValue) -> LuaResult<LuaValue> {
    let i = to_integer(a).ok_or(LuaError::InvalidOperand("bitwise not on non-integer"))?;
    Ok(LuaValue::Integer(!i))
}

pub fn compare(a: &LuaValue, b: &LuaValue) -> LuaResult<Ordering3> {
    let ord = match (a, b) {
        (LuaValue::String(x), LuaValue::String(y)) => x.cmp(y),
        (LuaValue::Integer(x), LuaValue::Integer(y)) => x.cmp(y),
        (LuaValue::Float(x), LuaValue::Float(y)) => x.partial_cmp(y).ok_or(LuaError::InvalidOperand("NaN comparison"))?,
        (LuaValue::Integer(x), LuaValue::Float(y)) => (*x as f64).partial_cmp(y).ok_or(LuaError::InvalidOperand("NaN comparison"))?,
        (LuaValue::Float(x), LuaValue::Integer(y)) => x.partial_cmp(&(*y as f64)).ok_or(LuaError::InvalidOperand("NaN comparison"))?,
        _ => return Err(LuaError::InvalidOperand("comparison between incompatible types")),
    };
    Ok(match ord {
        std::cmp::Ordering::Less => Ordering3::Lt,
        std::cmp::Ordering::Equal => Ordering3::Eq,
        std::cmp::Ordering::Greater => Ordering3::Gt,
    })
}

pub fn values_equal(a: &LuaValue, b: &LuaValue) -> bool {
    a == b
}

pub fn length(a: &LuaValue) -> LuaResult<LuaValue> {
    match a {
        LuaValue::String(s) => Ok(LuaValue::Integer(s.len() as i64)),
        LuaValue::Table(t) => Ok(LuaValue::Integer(t.borrow().len())),
        _ => Err(LuaError::InvalidOperand("length of non-string/table")),
    }
}

pub fn concat(a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
    let mut bytes = super::number::to_lua_string(a).ok_or(LuaError::InvalidOperand("concat of non-coercible value"))?;
    let rhs = super::number::to_lua_string(b).ok_or(LuaError::InvalidOperand("concat of non-coercible value"))?;
    bytes.extend_from_slice(&rhs);
    Ok(LuaValue::new_string(bytes))
}
