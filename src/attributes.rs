//!
//! Attributes are the user defined key-value pairs carried by every Pub/Sub message.
//!
use crate::error::InvalidArgument;
use std::collections::HashMap;

pub const MAX_KEY_BYTES: usize = 256;
pub const MAX_VALUE_BYTES: usize = 1024;
pub const MAX_ATTRIBUTES: usize = 100;

/// Validated attribute map.
///
/// Keys are unique. Enumeration follows first-insertion order; replacing the value of an
/// existing key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of all entries as a map.
    pub fn as_map(&self) -> HashMap<String, String> {
        self.entries.iter().cloned().collect()
    }

    /// Insert or replace a single entry.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<(), InvalidArgument> {
        check_entry(key, value)?;
        match self.position(key) {
            Some(i) => self.entries[i].1 = value.to_owned(),
            None => {
                if self.entries.len() + 1 > MAX_ATTRIBUTES {
                    return Err(InvalidArgument::TooManyAttributes(self.entries.len() + 1));
                }
                self.entries.push((key.to_owned(), value.to_owned()));
            }
        }
        Ok(())
    }

    /// Merge a batch of entries. Either every entry is applied or, on the first violation,
    /// none of them is.
    pub fn extend<'a, I>(&mut self, batch: I) -> Result<(), InvalidArgument>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let batch: Vec<(&str, &str)> = batch.into_iter().collect();
        for (key, value) in &batch {
            check_entry(key, value)?;
        }

        let mut added: Vec<&str> = Vec::new();
        for (key, _) in &batch {
            if self.position(key).is_none() && !added.contains(key) {
                added.push(*key);
            }
        }
        let total = self.entries.len() + added.len();
        if total > MAX_ATTRIBUTES {
            return Err(InvalidArgument::TooManyAttributes(total));
        }

        for (key, value) in batch {
            match self.position(key) {
                Some(i) => self.entries[i].1 = value.to_owned(),
                None => self.entries.push((key.to_owned(), value.to_owned())),
            }
        }
        Ok(())
    }

    /// Build from entries delivered by the bus, applying the same limits as the builder.
    pub(crate) fn from_map(map: &HashMap<String, String>) -> Result<Self, InvalidArgument> {
        let mut attributes = Attributes::new();
        attributes.extend(map.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
        Ok(attributes)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

fn check_entry(key: &str, value: &str) -> Result<(), InvalidArgument> {
    if key.len() > MAX_KEY_BYTES {
        return Err(InvalidArgument::KeyTooLarge(key.len()));
    }
    if value.len() > MAX_VALUE_BYTES {
        return Err(InvalidArgument::ValueTooLarge(value.len()));
    }
    Ok(())
}
