// StringName: interned string identifiers.
// Cheap to copy, compare, and hash; creation and display go through the
// process-wide intern table.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

struct InternTable {
    by_str: HashMap<&'static str, u32>,
    by_id: Vec<&'static str>,
}

static TABLE: OnceLock<Mutex<InternTable>> = OnceLock::new();

fn table() -> &'static Mutex<InternTable> {
    TABLE.get_or_init(|| {
        Mutex::new(InternTable {
            // Id 0 is the empty name.
            by_str: HashMap::from([("", 0)]),
            by_id: vec![""],
        })
    })
}

/// An interned name. Copy-able, hashable, and comparable in O(1).
///
/// The intern table is append-only for the lifetime of the process, so the
/// backing `&'static str` never moves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringName(u32);

impl StringName {
    /// The empty name (id 0).
    pub const EMPTY: StringName = StringName(0);

    /// Intern a string, returning its stable id.
    pub fn new(name: &str) -> Self {
        let mut tbl = table().lock().expect("intern table poisoned");
        if let Some(&id) = tbl.by_str.get(name) {
            return StringName(id);
        }
        let id = tbl.by_id.len() as u32;
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        tbl.by_str.insert(leaked, id);
        tbl.by_id.push(leaked);
        StringName(id)
    }

    /// Resolve to the interned string slice.
    pub fn as_str(&self) -> &'static str {
        let tbl = table().lock().expect("intern table poisoned");
        tbl.by_id[self.0 as usize]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw intern id. Stable for the process lifetime only; never persist.
    #[inline]
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl Default for StringName {
    fn default() -> Self {
        StringName::EMPTY
    }
}

impl fmt::Display for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringName({:?})", self.as_str())
    }
}

impl From<&str> for StringName {
    fn from(s: &str) -> Self {
        StringName::new(s)
    }
}

impl From<&String> for StringName {
    fn from(s: &String) -> Self {
        StringName::new(s)
    }
}

impl PartialEq<&str> for StringName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = StringName::new("health");
        let b = StringName::new("health");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "health");
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let a = StringName::new("position");
        let b = StringName::new("rotation");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_name_is_id_zero() {
        assert_eq!(StringName::new(""), StringName::EMPTY);
        assert!(StringName::EMPTY.is_empty());
    }
}
