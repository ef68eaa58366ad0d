//! JSON host model.
//!
//! [`JsonNode`] is a [`Selectable`] tree built from JSON objects and
//! [`JsonRuleset`] turns a raw document into one.  The `parts` preset mirrors
//! the game's part files: the root object is the part, and each entry of
//! `serializedPartModules` becomes a `module` child named by its `Name` key.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Number};

use crate::error::SassyError;
use crate::selectable::Selectable;
use crate::universe::Ruleset;
use crate::value::{Dictionary, Value};

// ── Value conversion ──────────────────────────────────────────────────────────

/// Convert parsed JSON into a [`Value`].  Numbers that fit `i64` become
/// integers, everything else numeric becomes a real.
pub fn value_from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(value_from_json).collect()),
        serde_json::Value::Object(map) => Value::Dictionary(
            map.into_iter()
                .map(|(k, v)| (k, value_from_json(v)))
                .collect::<Dictionary>(),
        ),
    }
}

/// Convert a [`Value`] back to JSON.  Non-finite reals have no JSON form and
/// become `null`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Real(x) => Number::from_f64(*x).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Dictionary(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect(),
        ),
    }
}

// ── JsonNode ──────────────────────────────────────────────────────────────────

const DEFAULT_CHILDREN_KEY: &str = "children";

#[derive(Debug, Clone, PartialEq)]
pub struct JsonNode {
    element: String,
    name: String,
    classes: Vec<String>,
    ruleset: Option<String>,
    fields: IndexMap<String, Value>,
    children: Vec<JsonNode>,
    /// Key the children array is written under.
    children_key: String,
    /// Key this node's name is written under, if it has one in the JSON.
    name_key: Option<String>,
    /// `name_key` given to children created by [`Selectable::add_child`].
    child_name_key: Option<String>,
}

impl JsonNode {
    pub fn new(element: impl Into<String>, name: impl Into<String>) -> Self {
        JsonNode {
            element: element.into(),
            name: name.into(),
            classes: Vec::new(),
            ruleset: None,
            fields: IndexMap::new(),
            children: Vec::new(),
            children_key: DEFAULT_CHILDREN_KEY.to_owned(),
            name_key: None,
            child_name_key: None,
        }
    }

    pub fn with_ruleset(mut self, ruleset: impl Into<String>) -> Self {
        self.ruleset = Some(ruleset.into());
        self
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_owned());
        }
    }

    pub fn push_child(&mut self, child: JsonNode) {
        self.children.push(child);
    }

    fn is_name_key(&self, key: &str) -> bool {
        self.name_key.as_deref() == Some(key)
    }

    /// True once the node lays out children under `key`.
    fn is_children_key(&self, key: &str) -> bool {
        key == self.children_key && (self.child_name_key.is_some() || !self.children.is_empty())
    }

    /// The node as a JSON object: name key first, then fields, then children.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = Map::new();
        if let Some(key) = &self.name_key {
            map.insert(key.clone(), serde_json::Value::String(self.name.clone()));
        }
        for (key, value) in &self.fields {
            map.insert(key.clone(), value_to_json(value));
        }
        if !self.children.is_empty() {
            map.insert(
                self.children_key.clone(),
                serde_json::Value::Array(self.children.iter().map(JsonNode::to_json).collect()),
            );
        }
        serde_json::Value::Object(map)
    }
}

impl Selectable for JsonNode {
    fn element_type(&self) -> &str {
        &self.element
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn in_ruleset(&self, ruleset: &str) -> bool {
        self.ruleset.as_deref() == Some(ruleset)
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        if self.is_name_key(key) {
            return Some(Value::String(self.name.clone()));
        }
        self.fields.get(key).cloned()
    }

    /// Writing the name key renames the node.  The children key is owned by
    /// the child list and cannot be written as a field.
    fn set_field(&mut self, key: &str, value: Value) {
        if self.is_name_key(key) {
            self.name = value.to_display_string();
        } else if self.is_children_key(key) {
            log::warn!("{} {}: ignoring write to child list key {key}", self.element, self.name);
        } else {
            self.fields.insert(key.to_owned(), value);
        }
    }

    fn delete_field(&mut self, key: &str) -> bool {
        if self.is_name_key(key) || self.is_children_key(key) {
            log::warn!("{} {}: cannot delete {key}", self.element, self.name);
            return false;
        }
        self.fields.shift_remove(key).is_some()
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> Option<&dyn Selectable> {
        self.children.get(index).map(|c| c as &dyn Selectable)
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut dyn Selectable> {
        self.children.get_mut(index).map(|c| c as &mut dyn Selectable)
    }

    fn add_child(&mut self, element_type: &str) -> usize {
        let mut child = JsonNode::new(element_type, "");
        child.ruleset = self.ruleset.clone();
        child.name_key = self.child_name_key.clone();
        self.children.push(child);
        self.children.len() - 1
    }

    fn serialize(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }
}

// ── JsonRuleset ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum LabelMatch {
    Exact(String),
    Pattern(Regex),
}

/// Converts JSON documents into [`JsonNode`] trees.
#[derive(Debug, Clone)]
pub struct JsonRuleset {
    name: String,
    label: LabelMatch,
    root_element: String,
    children: Option<ChildLayout>,
}

#[derive(Debug, Clone)]
struct ChildLayout {
    key: String,
    element: String,
    name_key: String,
}

impl JsonRuleset {
    /// A ruleset accepting exactly `label`.
    pub fn new(name: impl Into<String>, label: impl Into<String>, root_element: impl Into<String>) -> Self {
        JsonRuleset {
            name: name.into(),
            label: LabelMatch::Exact(label.into()),
            root_element: root_element.into(),
            children: None,
        }
    }

    /// A ruleset accepting every label matched by `pattern`.
    pub fn with_label_pattern(
        name: impl Into<String>,
        pattern: &str,
        root_element: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(JsonRuleset {
            name: name.into(),
            label: LabelMatch::Pattern(Regex::new(pattern)?),
            root_element: root_element.into(),
            children: None,
        })
    }

    /// Read child nodes from the array under `key`.
    pub fn with_children(mut self, key: &str, element: &str, name_key: &str) -> Self {
        self.children = Some(ChildLayout {
            key: key.to_owned(),
            element: element.to_owned(),
            name_key: name_key.to_owned(),
        });
        self
    }

    /// The `parts` ruleset.
    pub fn parts() -> Self {
        JsonRuleset::new("parts", "parts_data", "part").with_children("serializedPartModules", "module", "Name")
    }

    fn convert(&self, name: &str, raw: &str) -> Result<JsonNode, String> {
        let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let serde_json::Value::Object(object) = json else {
            return Err("top-level JSON value is not an object".into());
        };

        let mut root = JsonNode::new(self.root_element.as_str(), name).with_ruleset(self.name.as_str());
        if let Some(layout) = &self.children {
            root.children_key = layout.key.clone();
            root.child_name_key = Some(layout.name_key.clone());
        }
        for (key, value) in object {
            match &self.children {
                Some(layout) if key == layout.key => {
                    let serde_json::Value::Array(items) = value else {
                        return Err(format!("{} is not an array", layout.key));
                    };
                    for item in items {
                        root.push_child(self.convert_child(layout, item)?);
                    }
                }
                _ => root.set_field(&key, value_from_json(value)),
            }
        }
        let names: Vec<String> = root.children.iter().map(|c| c.name.clone()).collect();
        for child_name in names.iter().filter(|n| !n.is_empty()) {
            root.add_class(child_name);
        }
        Ok(root)
    }

    fn convert_child(&self, layout: &ChildLayout, item: serde_json::Value) -> Result<JsonNode, String> {
        let serde_json::Value::Object(object) = item else {
            return Err(format!("entry of {} is not an object", layout.key));
        };
        let mut child = JsonNode::new(layout.element.as_str(), "").with_ruleset(self.name.as_str());
        child.name_key = Some(layout.name_key.clone());
        for (key, value) in object {
            match value {
                serde_json::Value::String(s) if key == layout.name_key => child.name = s,
                other => child.set_field(&key, value_from_json(other)),
            }
        }
        Ok(child)
    }
}

impl Ruleset for JsonRuleset {
    fn matches(&self, label: &str) -> bool {
        match &self.label {
            LabelMatch::Exact(l) => l == label,
            LabelMatch::Pattern(re) => re.is_match(label),
        }
    }

    fn convert_to_selectable(
        &self,
        _label: &str,
        name: &str,
        raw: &str,
    ) -> Result<Box<dyn Selectable>, SassyError> {
        let root = self.convert(name, raw).map_err(|message| SassyError::Document {
            name: name.to_owned(),
            message,
        })?;
        Ok(Box::new(root))
    }
}
