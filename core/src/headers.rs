//! Ordered header multimap with case-insensitive names.
//!
//! # Design
//! Entries are kept as a flat `Vec` in arrival order so repeated headers keep
//! their relative position. Lookups compare names ASCII-case-insensitively;
//! the stored name keeps whatever case it was added with.

/// Ordered multimap of HTTP header names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a value, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value for `name` with a single `value`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// First value stored for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every value for `name`, returning them in order.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|(n, v)| {
            if n.eq_ignore_ascii_case(name) {
                removed.push(v.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// Recover the individual occurrences of a header the engine joined with
/// commas.
///
/// The value is split on `,` and each token trimmed. If that yields more than
/// one token and none of them is empty, the tokens are returned in order;
/// otherwise the value comes back untouched as a single entry.
///
/// This is a heuristic. A value that legitimately contains a comma, such as
/// `Set-Cookie: id=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT`, is split as well.
pub fn split_joined(value: &str) -> Vec<&str> {
    let tokens: Vec<&str> = value.split(',').map(str::trim).collect();
    if tokens.len() > 1 && tokens.iter().all(|t| !t.is_empty()) {
        tokens
    } else {
        vec![value]
    }
}
