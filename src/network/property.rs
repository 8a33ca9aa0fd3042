//! Observable, typed properties and the property-owner tree.
//!
//! A property raises its configured invalidation level when its value actually
//! changes. Composite properties sit between a child and the processor and may
//! elevate the level on the way up, never lower it. Paths use `.` to separate
//! identifiers, e.g. `transform.factor`.

use crate::network::error::{NetworkError, NetworkResult};
use crate::network::invalidation::InvalidationLevel;
use crate::observer::{AsObserver, Observable};
use serde::{Deserialize, Serialize};

/// A property value. Values of different variants are never assignable to each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Floats(Vec<f64>),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            PropertyValue::Floats(v) => Some(v),
            _ => None,
        }
    }

    /// Value equality where every NaN equals every other NaN.
    pub fn same_value(&self, other: &PropertyValue) -> bool {
        fn float_eq(a: f64, b: f64) -> bool {
            a == b || (a.is_nan() && b.is_nan())
        }
        match (self, other) {
            (PropertyValue::Float(a), PropertyValue::Float(b)) => float_eq(*a, *b),
            (PropertyValue::Floats(a), PropertyValue::Floats(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| float_eq(*a, *b))
            }
            _ => self == other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::Int(_) => "Int",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Text(_) => "Text",
            PropertyValue::Floats(_) => "Floats",
        }
    }

    pub fn same_type(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(v: Vec<f64>) -> Self {
        PropertyValue::Floats(v)
    }
}

/// Notified after a property value changed.
pub trait PropertyObserver: AsObserver {
    fn on_property_set(&self, property: &Property);
}

#[derive(Debug)]
enum PropertyData {
    Value {
        value: PropertyValue,
        default: PropertyValue,
    },
    Composite(Vec<Property>),
}

/// A named configuration value owned by a processor or a composite property.
#[derive(Debug)]
pub struct Property {
    identifier: String,
    display_name: String,
    data: PropertyData,
    invalidation_level: InvalidationLevel,
    modified: bool,
    serializable: bool,
    observers: Observable<dyn PropertyObserver>,
}

impl Property {
    /// A value property. Changing it invalidates the owner's outputs.
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        let value = value.into();
        Self::with_data(
            identifier.into(),
            display_name.into(),
            PropertyData::Value {
                default: value.clone(),
                value,
            },
            InvalidationLevel::InvalidOutput,
        )
    }

    /// A composite property. By default it forwards child invalidation unchanged.
    pub fn composite(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::with_data(
            identifier.into(),
            display_name.into(),
            PropertyData::Composite(Vec::new()),
            InvalidationLevel::Valid,
        )
    }

    fn with_data(
        identifier: String,
        display_name: String,
        data: PropertyData,
        invalidation_level: InvalidationLevel,
    ) -> Self {
        Self {
            identifier,
            display_name,
            data,
            invalidation_level,
            modified: false,
            serializable: true,
            observers: Observable::new(),
        }
    }

    pub fn with_invalidation_level(mut self, level: InvalidationLevel) -> Self {
        self.invalidation_level = level;
        self
    }

    pub fn with_child(mut self, child: Property) -> Self {
        if let Err(e) = self.add_child(child) {
            tracing::warn!("Ignoring child of '{}': {}", self.identifier, e);
        }
        self
    }

    pub fn transient(mut self) -> Self {
        self.serializable = false;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Current value, `None` for composites.
    pub fn value(&self) -> Option<&PropertyValue> {
        match &self.data {
            PropertyData::Value { value, .. } => Some(value),
            PropertyData::Composite(_) => None,
        }
    }

    pub fn default_value(&self) -> Option<&PropertyValue> {
        match &self.data {
            PropertyData::Value { default, .. } => Some(default),
            PropertyData::Composite(_) => None,
        }
    }

    pub fn invalidation_level(&self) -> InvalidationLevel {
        self.invalidation_level
    }

    /// Whether the value changed since the owner was last valid.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.data, PropertyData::Composite(_))
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    pub fn observers(&self) -> &Observable<dyn PropertyObserver> {
        &self.observers
    }

    pub fn children(&self) -> &[Property] {
        match &self.data {
            PropertyData::Composite(children) => children,
            PropertyData::Value { .. } => &[],
        }
    }

    pub fn children_mut(&mut self) -> &mut [Property] {
        match &mut self.data {
            PropertyData::Composite(children) => children,
            PropertyData::Value { .. } => &mut [],
        }
    }

    pub fn add_child(&mut self, child: Property) -> NetworkResult<()> {
        match &mut self.data {
            PropertyData::Composite(children) => insert_unique(children, child),
            PropertyData::Value { value, .. } => Err(NetworkError::PropertyTypeMismatch {
                property: self.identifier.clone(),
                expected: "Composite",
                found: value.type_name(),
            }),
        }
    }

    /// Assign a new value.
    ///
    /// Returns the level to raise on the owner, or `None` when the value is
    /// unchanged.
    pub fn set(
        &mut self,
        value: impl Into<PropertyValue>,
    ) -> NetworkResult<Option<InvalidationLevel>> {
        let value = value.into();
        let PropertyData::Value { value: current, .. } = &mut self.data else {
            return Err(NetworkError::PropertyTypeMismatch {
                property: self.identifier.clone(),
                expected: value.type_name(),
                found: "Composite",
            });
        };

        if !current.same_type(&value) {
            return Err(NetworkError::PropertyTypeMismatch {
                property: self.identifier.clone(),
                expected: current.type_name(),
                found: value.type_name(),
            });
        }
        if current.same_value(&value) {
            return Ok(None);
        }

        *current = value;
        self.modified = true;
        let this: &Property = self;
        this.observers.for_each_observer(|o| o.on_property_set(this));
        Ok(Some(self.invalidation_level))
    }

    /// Restore the default value (recursively for composites).
    pub fn reset_to_default(&mut self) -> Option<InvalidationLevel> {
        match &mut self.data {
            PropertyData::Value { default, .. } => {
                let default = default.clone();
                self.set(default).ok().flatten()
            }
            PropertyData::Composite(children) => {
                let level = children
                    .iter_mut()
                    .filter_map(Property::reset_to_default)
                    .max()?;
                Some(self.elevate(level))
            }
        }
    }

    /// Make the current value the default (recursively for composites).
    pub fn set_current_as_default(&mut self) {
        match &mut self.data {
            PropertyData::Value { value, default } => *default = value.clone(),
            PropertyData::Composite(children) => {
                children.iter_mut().for_each(Property::set_current_as_default)
            }
        }
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
        self.children_mut()
            .iter_mut()
            .for_each(Property::clear_modified);
    }

    /// Child invalidation passing through a composite.
    fn elevate(&mut self, level: InvalidationLevel) -> InvalidationLevel {
        self.modified = true;
        level.max(self.invalidation_level)
    }
}

fn insert_unique(properties: &mut Vec<Property>, property: Property) -> NetworkResult<()> {
    if property.identifier.is_empty() || property.identifier.contains('.') {
        return Err(NetworkError::UnknownProperty(property.identifier));
    }
    if properties
        .iter()
        .any(|p| p.identifier == property.identifier)
    {
        return Err(NetworkError::DuplicateProperty(property.identifier));
    }
    properties.push(property);
    Ok(())
}

fn lookup<'a>(properties: &'a [Property], path: &str) -> Option<&'a Property> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = properties.iter().find(|p| p.identifier == first)?;
    for segment in segments {
        current = current.children().iter().find(|p| p.identifier == segment)?;
    }
    Some(current)
}

fn lookup_mut<'a>(properties: &'a mut [Property], path: &str) -> Option<&'a mut Property> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = properties.iter_mut().find(|p| p.identifier == first)?;
    for segment in segments {
        let parent = current;
        current = parent
            .children_mut()
            .iter_mut()
            .find(|p| p.identifier == segment)?;
    }
    Some(current)
}

fn set_in(
    properties: &mut [Property],
    path: &str,
    full_path: &str,
    value: PropertyValue,
) -> NetworkResult<Option<InvalidationLevel>> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let property = properties
        .iter_mut()
        .find(|p| p.identifier == head)
        .ok_or_else(|| NetworkError::UnknownProperty(full_path.to_string()))?;

    match rest {
        None => property.set(value),
        Some(rest) => {
            if !property.is_composite() {
                return Err(NetworkError::UnknownProperty(full_path.to_string()));
            }
            let level = set_in(property.children_mut(), rest, full_path, value)?;
            Ok(level.map(|level| property.elevate(level)))
        }
    }
}

fn collect_recursive<'a>(properties: &'a [Property], out: &mut Vec<&'a Property>) {
    for property in properties {
        out.push(property);
        collect_recursive(property.children(), out);
    }
}

fn collect_defaults(properties: &[Property], prefix: &str, out: &mut Vec<(String, PropertyValue)>) {
    for property in properties {
        let path = if prefix.is_empty() {
            property.identifier.clone()
        } else {
            format!("{}.{}", prefix, property.identifier)
        };
        match &property.data {
            PropertyData::Value { default, .. } => out.push((path, default.clone())),
            PropertyData::Composite(children) => collect_defaults(children, &path, out),
        }
    }
}

fn collect_paths(properties: &[Property], prefix: &str, out: &mut Vec<(String, PropertyValue)>) {
    for property in properties {
        if !property.serializable {
            continue;
        }
        let path = if prefix.is_empty() {
            property.identifier.clone()
        } else {
            format!("{}.{}", prefix, property.identifier)
        };
        match &property.data {
            PropertyData::Value { value, .. } => out.push((path, value.clone())),
            PropertyData::Composite(children) => collect_paths(children, &path, out),
        }
    }
}

/// Anything that owns a list of top-level properties.
pub trait PropertyOwner {
    fn properties(&self) -> &[Property];

    fn properties_mut(&mut self) -> &mut Vec<Property>;

    fn add_property(&mut self, property: Property) -> NetworkResult<()> {
        insert_unique(self.properties_mut(), property)
    }

    fn remove_property(&mut self, identifier: &str) -> Option<Property> {
        let properties = self.properties_mut();
        let pos = properties.iter().position(|p| p.identifier == identifier)?;
        Some(properties.remove(pos))
    }

    /// Look up a property by dotted path.
    fn property(&self, path: &str) -> Option<&Property> {
        lookup(self.properties(), path)
    }

    fn property_mut(&mut self, path: &str) -> Option<&mut Property> {
        lookup_mut(self.properties_mut(), path)
    }

    /// Depth-first search by identifier through composites.
    fn find_property(&self, identifier: &str) -> Option<&Property> {
        self.properties_recursive()
            .into_iter()
            .find(|p| p.identifier == identifier)
    }

    fn properties_recursive(&self) -> Vec<&Property> {
        let mut out = Vec::new();
        collect_recursive(self.properties(), &mut out);
        out
    }

    /// Serializable value properties as `(path, value)` pairs.
    fn property_values(&self) -> Vec<(String, PropertyValue)> {
        let mut out = Vec::new();
        collect_paths(self.properties(), "", &mut out);
        out
    }

    /// Every value property as `(path, default)`, serializable or not.
    fn property_defaults(&self) -> Vec<(String, PropertyValue)> {
        let mut out = Vec::new();
        collect_defaults(self.properties(), "", &mut out);
        out
    }

    /// Set the property at `path`, elevating through composites.
    ///
    /// Returns the level to raise on this owner, `None` if nothing changed.
    fn set_property_value(
        &mut self,
        path: &str,
        value: PropertyValue,
    ) -> NetworkResult<Option<InvalidationLevel>> {
        set_in(self.properties_mut(), path, path, value)
    }

    fn reset_all_properties(&mut self) -> Option<InvalidationLevel> {
        self.properties_mut()
            .iter_mut()
            .filter_map(Property::reset_to_default)
            .max()
    }

    fn set_all_properties_current_as_default(&mut self) {
        self.properties_mut()
            .iter_mut()
            .for_each(Property::set_current_as_default);
    }
}

impl PropertyOwner for Vec<Property> {
    fn properties(&self) -> &[Property] {
        self
    }

    fn properties_mut(&mut self) -> &mut Vec<Property> {
        self
    }
}
