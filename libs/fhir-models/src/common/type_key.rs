use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identity of one implementing type (`string`, `HumanName`, `Bundle.entry`, `Patient`, ...).
///
/// Keys are cheap to clone and compare by name, so a value built before a registry exists
/// can still be routed by the registry later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(key: &TypeKey) -> Self {
        key.clone()
    }
}

impl PartialEq<str> for TypeKey {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for TypeKey {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_by_borrowed_name() {
        let mut map = HashMap::new();
        map.insert(TypeKey::new("dateTime"), 1);
        assert_eq!(map.get("dateTime"), Some(&1));
        assert_eq!(TypeKey::from("dateTime"), "dateTime");
    }
}
