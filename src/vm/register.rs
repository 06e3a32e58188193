// 1-based, negative-from-top indexing (-1 == top). opcodes address
// registers 0-based; Frame::reg/set_reg add the +1 at the boundary.

use crate::error::{LuaError, LuaResult};
use crate::types::function::{ValueCell, new_cell};
use crate::types::value::LuaValue;

#[derive(Default)]
pub struct Register {
    slots: Vec<ValueCell>,
}

impl Register {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn abs_index(&self, idx: i64) -> i64 {
        if idx >= 0 { idx } else { idx + self.slots.len() as i64 + 1 }
    }

    pub fn is_valid(&self, idx: i64) -> bool {
        let idx = self.abs_index(idx);
        idx >= 1 && (idx as usize) <= self.slots.len()
    }

    pub fn get(&self, idx: i64) -> LuaValue {
        let idx = self.abs_index(idx);
        if idx >= 1 && (idx as usize) <= self.slots.len() {
            self.slots[(idx - 1) as usize].borrow().clone()
        } else {
            LuaValue::Nil
        }
    }

    // the shared cell itself, for upvalue capture, not a value snapshot
    pub fn get_cell(&self, idx: i64) -> Option<ValueCell> {
        let idx = self.abs_index(idx);
        if idx >= 1 && (idx as usize) <= self.slots.len() {
            Some(self.slots[(idx - 1) as usize].clone())
        } else {
            None
        }
    }

    pub fn set(&mut self, idx: i64, value: LuaValue) -> LuaResult<()> {
        let idx = self.abs_index(idx);
        if idx < 1 {
            return Err(LuaError::IndexOverflow);
        }
        while (self.slots.len() as i64) < idx {
            self.slots.push(new_cell(LuaValue::Nil));
        }
        *self.slots[(idx - 1) as usize].borrow_mut() = value;
        Ok(())
    }

    // swaps in a fresh cell so already-captured closures keep the old one
    pub fn close(&mut self, idx: i64) {
        let idx = self.abs_index(idx);
        if idx >= 1 && (idx as usize) <= self.slots.len() {
            let current = self.slots[(idx - 1) as usize].borrow().clone();
            self.slots[(idx - 1) as usize] = new_cell(current);
        }
    }

    pub fn push(&mut self, value: LuaValue) {
        self.slots.push(new_cell(value));
    }

    pub fn pop(&mut self) -> LuaResult<LuaValue> {
        self.slots.pop().map(|c| c.borrow().clone()).ok_or(LuaError::StackUnderflow)
    }

    pub fn push_n(&mut self, n: usize, values: &[LuaValue]) {
        for i in 0..n {
            self.push(values.get(i).cloned().unwrap_or(LuaValue::Nil));
        }
    }

    pub fn pop_n(&mut self, n: usize) -> LuaResult<Vec<LuaValue>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.pop()?);
        }
        out.reverse();
        Ok(out)
    }

    pub fn top(&self) -> i64 {
        self.slots.len() as i64
    }

    pub fn set_top(&mut self, idx: i64) -> LuaResult<()> {
        let new_top = self.abs_index(idx);
        if new_top < 0 {
            return Err(LuaError::StackUnderflow);
        }
        let current = self.top();
        if new_top < current {
            self.pop_n((current - new_top) as usize)?;
        } else {
            for _ in 0..(new_top - current) {
                self.push(LuaValue::Nil);
            }
        }
        Ok(())
    }

    pub fn replace(&mut self, idx: i64) -> LuaResult<()> {
        let v = self.pop()?;
        self.set(idx, v)
    }

    fn reverse(&mut self, from: i64, to: i64) -> LuaResult<()> {
        if !self.is_valid(from) || !self.is_valid(to) {
            return Err(LuaError::IndexOverflow);
        }
        let (mut from, mut to) = (from as usize - 1, to as usize - 1);
        while from < to {
            self.slots.swap(from, to);
            from += 1;
            to -= 1;
        }
        Ok(())
    }

    // three sub-reverses; rotate(p, n) then rotate(p, -n) is identity
    pub fn rotate(&mut self, idx: i64, n: i64) -> LuaResult<()> {
        let t = self.top();
        let p = self.abs_index(idx);
        let m = if n >= 0 { t - n } else { p - n - 1 };
        self.reverse(p, m)?;
        self.reverse(m + 1, t)?;
        self.reverse(p, t)?;
        Ok(())
    }

    pub fn insert(&mut self, idx: i64) -> LuaResult<()> {
        self.rotate(idx, 1)
    }

    pub fn remove(&mut self, idx: i64) -> LuaResult<()> {
        self.rotate(idx, -1)?;
        self.pop()?;
        Ok(())
    }

    pub fn slice(&self, from: i64, to: i64) -> Vec<LuaValue> {
        let from = self.abs_index(from);
        let to = self.abs_index(to);
        (from..=to).map(|i| self.get(i)).collect()
    }
}
