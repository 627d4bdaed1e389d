//! Transport-native header container.
//!
//! `Metadata` is what a transport hands to [`Listener::on_headers`] and what a
//! caller hands to [`ClientCall::start`]: an ordered, multi-valued list of
//! header fields. Names are matched byte-for-byte; the transport decides case
//! (HTTP/2 lowercases everything).
//!
//! [`Listener::on_headers`]: crate::Listener::on_headers
//! [`ClientCall::start`]: crate::ClientCall::start

/// A single header name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl HeaderField {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered header list. Repeated names are kept as separate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    fields: Vec<HeaderField>,
}

impl Metadata {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a value. Existing values under the same name are kept.
    pub fn insert(&mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_slice())
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.fields
            .iter()
            .filter(move |h| h.name == name)
            .map(|h| h.value.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_keep_order() {
        let mut md = Metadata::new();
        md.insert("testkey", "one");
        md.insert("anotherkey", "three");
        md.insert("testkey", "two");

        assert_eq!(md.len(), 3);
        assert_eq!(md.get(b"testkey"), Some(&b"one"[..]));
        let all: Vec<&[u8]> = md.get_all(b"testkey").collect();
        assert_eq!(all, vec![&b"one"[..], &b"two"[..]]);
        let names: Vec<&[u8]> = md.iter().map(|h| h.name.as_slice()).collect();
        assert_eq!(names, vec![&b"testkey"[..], &b"anotherkey"[..], &b"testkey"[..]]);
    }

    #[test]
    fn lookup_is_exact() {
        let mut md = Metadata::new();
        md.insert("testkey", "v");
        assert_eq!(md.get(b"testkey"), Some(&b"v"[..]));
        assert_eq!(md.get(b"TestKey"), None);
        assert_eq!(md.get_all(b"missing").count(), 0);
    }
}
