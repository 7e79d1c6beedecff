use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Ordered, multi-valued list of name-value pairs.
///
/// Used for MQTT user properties and for the custom settings of a binding. A name may occur
/// more than once.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Properties {
    items: Vec<Property>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: &str) {
        self.items.push(Property::new(name, value));
    }

    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn get_all_for_name(&self, name: &str) -> Vec<&str> {
        self.items
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.value.as_str())
            .collect()
    }

    pub fn as_list(&self) -> &[Property] {
        &self.items
    }

    /// First value for every name.
    pub fn as_single_value_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for p in &self.items {
            map.entry(p.name.clone())
                .or_insert_with(|| p.value.clone());
        }
        map
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<Property>> for Properties {
    fn from(items: Vec<Property>) -> Self {
        Self { items }
    }
}
