use crate::chunk::value::{StringRef, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// 16-bit dense index assigned to a global variable name at first mention.
/// Stable for the lifetime of the `Heap` that issued it.
pub type GvIdx = u16;

/// Owns the interned-string set and the global-variable table. Threaded by
/// value through `compile` → `execute` → the next REPL turn; it is the one
/// piece of state that survives across turns (§5 of the spec).
pub struct Heap {
    intern_set: HashMap<Rc<str>, Rc<str>>,
    globals_by_name: HashMap<Rc<str>, GvIdx>,
    globals_by_index: Vec<Option<Value>>,
    next_index: GvIdx,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            intern_set: HashMap::new(),
            globals_by_name: HashMap::new(),
            globals_by_index: Vec::new(),
            next_index: 0,
        }
    }

    /// Returns an existing ref if a string with equal bytes is already
    /// interned, else inserts and returns a new one.
    pub fn intern(&mut self, bytes: &str) -> StringRef {
        if let Some(existing) = self.intern_set.get(bytes) {
            return StringRef(Rc::clone(existing));
        }
        let rc: Rc<str> = Rc::from(bytes);
        self.intern_set.insert(Rc::clone(&rc), Rc::clone(&rc));
        StringRef(rc)
    }

    /// Idempotent: the first call for a name assigns a fresh index, later
    /// calls return the same one.
    pub fn declare_global(&mut self, name: &str) -> GvIdx {
        if let Some(idx) = self.globals_by_name.get(name) {
            return *idx;
        }
        let idx = self.next_index;
        self.next_index += 1;
        let rc: Rc<str> = Rc::from(name);
        self.globals_by_name.insert(rc, idx);
        self.globals_by_index.push(None);
        idx
    }

    pub fn name_of(&self, idx: GvIdx) -> &str {
        self.globals_by_name
            .iter()
            .find(|(_, v)| **v == idx)
            .map(|(k, _)| k.as_ref())
            .unwrap_or("<unknown>")
    }

    pub fn get_global(&self, idx: GvIdx) -> Option<&Value> {
        self.globals_by_index.get(idx as usize).and_then(|slot| slot.as_ref())
    }

    pub fn set_global(&mut self, idx: GvIdx, value: Value) {
        if idx as usize >= self.globals_by_index.len() {
            self.globals_by_index.resize_with(idx as usize + 1, || None);
        }
        self.globals_by_index[idx as usize] = Some(value);
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
