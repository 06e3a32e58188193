use std::collections::HashMap;

use crate::error::{LuaError, LuaResult};

use super::value::LuaValue;

#[derive(Default)]
pub struct LuaTable {
    // array[i] holds integer key i + 1; never has a trailing Nil
    array: Vec<LuaValue>,
    hash: HashMap<LuaValue, LuaValue>,
}

impl LuaTable {
    pub fn new() -> Self {
        Self { array: Vec::new(), hash: HashMap::new() }
    }

    fn canonical_key(key: &LuaValue) -> LuaResult<LuaValue> {
        match key {
            LuaValue::Float(f) => {
                if f.is_nan() {
                    return Err(LuaError::NaNIndex);
                }
                match super::number::float_to_integer(*f) {
                    Some(i) => Ok(LuaValue::Integer(i)),
                    None => Ok(LuaValue::Float(*f)),
                }
            }
            other => Ok(other.clone()),
        }
    }

    pub fn get(&self, key: &LuaValue) -> LuaResult<LuaValue> {
        if matches!(key, LuaValue::Nil | LuaValue::None) {
            return Ok(LuaValue::Nil);
        }
        let key = Self::canonical_key(key)?;
        if let LuaValue::Integer(i) = key {
            if i >= 1 && (i as u64) <= self.array.len() as u64 {
                return Ok(self.array[(i - 1) as usize].clone());
            }
        }
        Ok(self.hash.get(&key).cloned().unwrap_or(LuaValue::Nil))
    }

    pub fn set(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        if matches!(key, LuaValue::Nil | LuaValue::None) {
            return Ok(());
        }
        let key = Self::canonical_key(&key)?;

        if let LuaValue::Integer(i) = key {
            let n = self.array.len() as i64;
            if i >= 1 && i <= n {
                if i == n && matches!(value, LuaValue::Nil) {
                    self.array.pop();
                    while matches!(self.array.last(), Some(LuaValue::Nil)) {
                        self.array.pop();
                    }
                } else {
                    self.array[(i - 1) as usize] = value;
                }
                return Ok(());
            }
            if i == n + 1 {
                if matches!(value, LuaValue::Nil) {
                    self.hash.remove(&key);
                    return Ok(());
                }
                self.array.push(value);
                self.densify();
                return Ok(());
            }
        }

        if matches!(value, LuaValue::Nil) {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
        Ok(())
    }

    // pulls contiguous integer keys out of the hash part after an append
    fn densify(&mut self) {
        loop {
            let next = LuaValue::Integer(self.array.len() as i64 + 1);
            match self.hash.remove(&next) {
                Some(v) => self.array.push(v),
                None => break,
            }
        }
    }

    pub fn len(&self) -> i64 {
        self.array.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn densifies_on_contiguous_append() {
        let mut t = LuaTable::new();
        t.set(LuaValue::Integer(1), LuaValue::Integer(10)).unwrap();
        t.set(LuaValue::Integer(3), LuaValue::Integer(30)).unwrap();
        assert_eq!(t.len(), 1);
        t.set(LuaValue::Integer(2), LuaValue::Integer(20)).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(&LuaValue::Integer(1)).unwrap(), LuaValue::Integer(10));
        assert_eq!(t.get(&LuaValue::Integer(2)).unwrap(), LuaValue::Integer(20));
        assert_eq!(t.get(&LuaValue::Integer(3)).unwrap(), LuaValue::Integer(30));
    }

    #[test]
    fn shrinks_on_tail_nil() {
        let mut t = LuaTable::new();
        for i in 1..=3 {
            t.set(LuaValue::Integer(i), LuaValue::Integer(i * 10)).unwrap();
        }
        t.set(LuaValue::Integer(3), LuaValue::Nil).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&LuaValue::Integer(3)).unwrap(), LuaValue::Nil);
    }

    #[test]
    fn float_key_canonicalises_to_integer_slot() {
        let mut t = LuaTable::new();
        t.set(LuaValue::Integer(1), LuaValue::new_string("a")).unwrap();
        assert_eq!(t.get(&LuaValue::Float(1.0)).unwrap(), LuaValue::new_string("a"));
    }

    #[test]
    fn nan_key_errors() {
        let mut t = LuaTable::new();
        assert!(t.set(LuaValue::Float(f64::NAN), LuaValue::Integer(1)).is_err());
        assert!(t.get(&LuaValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn nil_key_is_silent_noop() {
        let mut t = LuaTable::new();
        t.set(LuaValue::Nil, LuaValue::Integer(1)).unwrap();
        assert_eq!(t.get(&LuaValue::Nil).unwrap(), LuaValue::Nil);
    }
}
