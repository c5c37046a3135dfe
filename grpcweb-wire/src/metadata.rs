//! Call metadata: a case-insensitive, insertion-ordered header multimap.

/// Metadata attached to the initial response and the terminal trailers.
///
/// Names are normalized to lowercase ASCII on insert. Repeated names are
/// kept in insertion order, matching how headers repeat on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Create an empty metadata map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `name`. Existing values for the name are kept.
    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries
            .push((name.to_ascii_lowercase(), value.to_string()));
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether any value exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every value for `name`, returning the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let mut first = None;
        self.entries.retain(|(k, v)| {
            if *k == name {
                if first.is_none() {
                    first = Some(v.clone());
                }
                false
            } else {
                true
            }
        });
        first
    }

    /// Overlay `other` on top of `self`: names present in `other` replace
    /// all values for that name in `self`; everything else is kept.
    pub fn merge_over(&self, other: &Metadata) -> Metadata {
        let mut merged = Metadata::new();
        for (k, v) in &self.entries {
            if !other.contains(k) {
                merged.entries.push((k.clone(), v.clone()));
            }
        }
        merged.entries.extend(other.entries.iter().cloned());
        merged
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries (counting repeats).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut meta = Metadata::new();
        for (k, v) in iter {
            meta.insert(k, v);
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut meta = Metadata::new();
        meta.insert("X-Custom", "a");
        assert_eq!(meta.get("x-custom"), Some("a"));
        assert_eq!(meta.get("X-CUSTOM"), Some("a"));
        assert_eq!(meta.get("missing"), None);
    }

    #[test]
    fn repeated_names_preserve_order() {
        let mut meta = Metadata::new();
        meta.insert("set-cookie", "a=1");
        meta.insert("other", "x");
        meta.insert("Set-Cookie", "b=2");

        assert_eq!(meta.get("set-cookie"), Some("a=1"));
        let all: Vec<_> = meta.get_all("set-cookie").collect();
        assert_eq!(all, vec!["a=1", "b=2"]);
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn remove_drops_all_values() {
        let mut meta = Metadata::new();
        meta.insert("k", "1");
        meta.insert("K", "2");
        assert_eq!(meta.remove("k"), Some("1".to_string()));
        assert!(!meta.contains("k"));
        assert_eq!(meta.remove("k"), None);
    }

    #[test]
    fn merge_over_per_name_replacement() {
        let defaults: Metadata = [("authorization", "token"), ("x-a", "1"), ("x-a", "2")]
            .into_iter()
            .collect();
        let per_call: Metadata = [("x-a", "3")].into_iter().collect();

        let merged = defaults.merge_over(&per_call);
        assert_eq!(merged.get("authorization"), Some("token"));
        let a: Vec<_> = merged.get_all("x-a").collect();
        assert_eq!(a, vec!["3"]);
    }
}
