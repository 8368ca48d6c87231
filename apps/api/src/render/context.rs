use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Text(String),
    List(Vec<String>),
}

impl TemplateValue {
    pub fn is_empty(&self) -> bool {
        match self {
            TemplateValue::Text(text) => text.is_empty(),
            TemplateValue::List(items) => items.is_empty(),
        }
    }
}

/// Placeholder name -> value. The set of keys is a contract with the tags
/// used in the template document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, TemplateValue>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .insert(key.to_string(), TemplateValue::Text(value.into()));
    }

    pub fn insert_list(&mut self, key: &str, items: Vec<String>) {
        self.values.insert(key.to_string(), TemplateValue::List(items));
    }

    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        self.values.get(key)
    }
}
