use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator between the segments of a [`Code`].
pub const CODE_SEPARATOR: char = '.';

/// Dot-delimited identifier of one resource file relative to an index root,
/// e.g. `orders.get` for `<root>/orders/get.sql`.
///
/// Equality, hashing and ordering fold case, so sets and maps keyed by `Code`
/// behave like case-insensitive containers. The original spelling is kept for
/// display and path derivation.
#[derive(Clone)]
pub struct Code(Arc<str>);

impl Code {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(CODE_SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Case-insensitive "starts with" on the raw text. Used for completion,
    /// where a partially typed segment must still match.
    pub fn starts_with_ignore_case(&self, prefix: &str) -> bool {
        let mut haystack = folded(&self.0);
        folded(prefix).all(|expected| haystack.next() == Some(expected))
    }

    /// Whether this code equals `prefix` or lives beneath it.
    ///
    /// Matching stops at segment boundaries: `orders` contains `orders.get`
    /// but not `orders2.get`. The empty code contains every code.
    pub fn is_within(&self, prefix: &Code) -> bool {
        self.strip_code_prefix(prefix).is_some()
    }

    /// Substitute the leading `old` segments with `new`, keeping the remainder.
    /// Returns `None` when this code is not within `old`.
    pub fn replace_prefix(&self, old: &Code, new: &Code) -> Option<Code> {
        let rest = self.strip_code_prefix(old)?;
        let rest = rest.strip_prefix(CODE_SEPARATOR).unwrap_or(rest);
        Some(match (new.is_empty(), rest.is_empty()) {
            (_, true) => new.clone(),
            (true, false) => Code::new(rest),
            (false, false) => Code::new(format!("{}{}{}", new, CODE_SEPARATOR, rest)),
        })
    }

    /// Remainder after `prefix` in original spelling: either empty or starting
    /// with the separator.
    fn strip_code_prefix(&self, prefix: &Code) -> Option<&str> {
        if prefix.is_empty() {
            return Some(&self.0);
        }

        let mut expected = folded(&prefix.0).peekable();
        let mut split = self.0.len();
        for (idx, ch) in self.0.char_indices() {
            if expected.peek().is_none() {
                split = idx;
                break;
            }
            for lower in ch.to_lowercase() {
                if expected.next() != Some(lower) {
                    return None;
                }
            }
        }
        if expected.next().is_some() {
            return None;
        }

        let rest = &self.0[split..];
        (rest.is_empty() || rest.starts_with(CODE_SEPARATOR)).then_some(rest)
    }
}

fn folded(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().flat_map(char::to_lowercase)
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || folded(&self.0).eq(folded(&other.0))
    }
}

impl Eq for Code {}

impl Hash for Code {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for ch in folded(&self.0) {
            state.write_u32(ch as u32);
        }
        state.write_u8(0xff);
    }
}

impl Ord for Code {
    fn cmp(&self, other: &Self) -> Ordering {
        folded(&self.0).cmp(folded(&other.0))
    }
}

impl PartialOrd for Code {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({:?})", &*self.0)
    }
}

impl From<&str> for Code {
    fn from(value: &str) -> Self {
        Code::new(value)
    }
}

impl From<String> for Code {
    fn from(value: String) -> Self {
        Code(Arc::from(value))
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Code::from(s))
    }
}
