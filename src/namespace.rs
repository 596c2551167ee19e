//! The user namespace that `%block` / `%blockrun` resolve names in

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::widgets::{Button, ValueControl};

/// Zero-argument break predicate
pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// An object bound to a name in the user namespace
#[derive(Clone)]
pub enum UserObject {
    Function(Predicate),
    Value(ValueControl),
    Button(Button),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl UserObject {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        UserObject::Function(Arc::new(f))
    }

    /// Short description of the object's kind, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            UserObject::Function(_) => "function",
            UserObject::Value(_) => "value control",
            UserObject::Button(_) => "button",
            UserObject::Bool(_) => "bool",
            UserObject::Int(_) => "int",
            UserObject::Float(_) => "float",
            UserObject::Text(_) => "str",
        }
    }
}

impl fmt::Debug for UserObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserObject::Function(_) => f.write_str("Function(..)"),
            UserObject::Value(v) => f.debug_tuple("Value").field(v).finish(),
            UserObject::Button(b) => f.debug_tuple("Button").field(b).finish(),
            UserObject::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            UserObject::Int(i) => f.debug_tuple("Int").field(i).finish(),
            UserObject::Float(x) => f.debug_tuple("Float").field(x).finish(),
            UserObject::Text(s) => f.debug_tuple("Text").field(s).finish(),
        }
    }
}

impl From<ValueControl> for UserObject {
    fn from(control: ValueControl) -> Self {
        UserObject::Value(control)
    }
}

impl From<Button> for UserObject {
    fn from(button: Button) -> Self {
        UserObject::Button(button)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    objects: HashMap<String, UserObject>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, object: impl Into<UserObject>) {
        self.objects.insert(name.into(), object.into());
    }

    pub fn get(&self, name: &str) -> Option<&UserObject> {
        self.objects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }
}
