//! Case-insensitive, ordered, multi-valued header map.

/// Header names keep the casing of their first insertion; lookups ignore
/// case. Each name maps to its values in insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// All values for `name`; empty when absent.
    pub fn get(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => &self.entries[i].1,
            None => &[],
        }
    }

    /// First value for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).first().map(String::as_str)
    }

    /// Values joined with `", "`; empty string when absent.
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(", ")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Replaces every value of `name`. The original position is kept.
    pub(crate) fn set(&mut self, name: &str, values: Vec<String>) {
        match self.position(name) {
            Some(i) => self.entries[i].1 = values,
            None => self.entries.push((name.to_owned(), values)),
        }
    }

    pub(crate) fn append(&mut self, name: &str, values: Vec<String>) {
        match self.position(name) {
            Some(i) => self.entries[i].1.extend(values),
            None => self.entries.push((name.to_owned(), values)),
        }
    }

    pub(crate) fn remove(&mut self, name: &str) {
        if let Some(i) = self.position(name) {
            self.entries.remove(i);
        }
    }
}

/// A single value or a list, accepted wherever a header value is set.
pub trait HeaderValues {
    fn into_values(self) -> Vec<String>;
}

impl HeaderValues for &str {
    fn into_values(self) -> Vec<String> { vec![self.to_owned()] }
}

impl HeaderValues for String {
    fn into_values(self) -> Vec<String> { vec![self] }
}

impl HeaderValues for &String {
    fn into_values(self) -> Vec<String> { vec![self.clone()] }
}

impl HeaderValues for Vec<String> {
    fn into_values(self) -> Vec<String> { self }
}

impl<const N: usize> HeaderValues for [&str; N] {
    fn into_values(self) -> Vec<String> { self.iter().map(|v| (*v).to_owned()).collect() }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, vec![value.to_owned()]);
        }
        headers
    }
}
