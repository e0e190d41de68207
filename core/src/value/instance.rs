use crate::{
    error::{Error, Result},
    schema::ModelId,
    value::record::{Number, Record},
};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Model-side value. Mirrors [`Record`] shape for shape, with one extra
/// variant: a property may hold a live [`InstanceRef`] produced by a nested
/// or reference conversion. Instances compare by identity, everything else
/// by content.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<Value>),
    Map(Vec<(String, Value)>),
    Instance(InstanceRef),
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

macro_rules! impl_as_ref_value {
    ($method:ident : $variant:ident => $type:ty) => {
        pub fn $method(&self) -> Option<&$type> {
            match self {
                Self::$variant(value) => Some(value),
                _ => None,
            }
        }
    };
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    impl_as_ref_value!(as_number : Number => Number);
    impl_as_ref_value!(as_str : String => str);
    impl_as_ref_value!(as_seq : Seq => [Value]);
    impl_as_ref_value!(as_map : Map => [(String, Value)]);
    impl_as_ref_value!(as_instance : Instance => InstanceRef);

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map
                .iter()
                .find_map(|(k, value)| if k == key { Some(value) } else { None }),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Instance(a), Self::Instance(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

macro_rules! impl_value_from {
    ($type:ty => $variant:ident) => {
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                Self::$variant(value.into())
            }
        }
    };
}

impl_value_from!(bool => Bool);
impl_value_from!(i8 => Number);
impl_value_from!(i16 => Number);
impl_value_from!(i32 => Number);
impl_value_from!(i64 => Number);
impl_value_from!(isize => Number);
impl_value_from!(u8 => Number);
impl_value_from!(u16 => Number);
impl_value_from!(u32 => Number);
impl_value_from!(u64 => Number);
impl_value_from!(usize => Number);
impl_value_from!(f32 => Number);
impl_value_from!(f64 => Number);
impl_value_from!(Number => Number);
impl_value_from!(&str => String);
impl_value_from!(String => String);
impl_value_from!(InstanceRef => Instance);

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Seq(value)
    }
}

impl From<&Record> for Value {
    fn from(record: &Record) -> Self {
        match record {
            Record::Null => Self::Null,
            Record::Bool(value) => Self::Bool(*value),
            Record::Number(value) => Self::Number(value.clone()),
            Record::String(value) => Self::String(value.clone()),
            Record::Seq(value) => Self::Seq(value.iter().map(Self::from).collect()),
            Record::Map(value) => Self::Map(
                value
                    .iter()
                    .map(|(key, item)| (key.clone(), Self::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::from(&record)
    }
}

/// Live instances cannot cross back into plain records wholesale, so the
/// reverse conversion is fallible.
impl TryFrom<&Value> for Record {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(value) => Ok(Self::Bool(*value)),
            Value::Number(value) => Ok(Self::Number(value.clone())),
            Value::String(value) => Ok(Self::String(value.clone())),
            Value::Seq(value) => Ok(Self::Seq(
                value.iter().map(Record::try_from).collect::<Result<_>>()?,
            )),
            Value::Map(value) => Ok(Self::Map(
                value
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), Record::try_from(item)?)))
                    .collect::<Result<_>>()?,
            )),
            Value::Instance(_) => Err(Error::CannotRepresent(value.clone())),
        }
    }
}

/// Mutable model object under conversion: a model id plus an ordered bag of
/// named properties.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Instance {
    model: ModelId,
    properties: Vec<(String, Value)>,
}

impl Instance {
    pub fn new(model: impl Into<ModelId>) -> Self {
        Self {
            model: model.into(),
            properties: vec![],
        }
    }

    pub fn model(&self) -> &ModelId {
        &self.model
    }

    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }

    pub fn has(&self, key: &str) -> bool {
        self.properties.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find_map(|(k, value)| if k == key { Some(value) } else { None })
    }

    pub fn set(&mut self, key: impl ToString, value: impl Into<Value>) {
        let key = key.to_string();
        let value = value.into();
        if let Some(entry) = self.properties.iter_mut().find(|(k, _)| k == &key) {
            entry.1 = value;
        } else {
            self.properties.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.properties.iter().position(|(k, _)| k == key)?;
        Some(self.properties.remove(index).1)
    }

    /// Builder flavor of [`Instance::set`].
    pub fn property(mut self, key: impl ToString, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }
}

/// Shared handle to an [`Instance`]. Conversions hand these out instead of
/// bare instances so that updates mutate the object callers already hold and
/// references resolve to the same object, not a copy. A lock poisoned by a
/// panicking completion callback is recovered, not propagated.
#[derive(Debug, Clone)]
pub struct InstanceRef(Arc<RwLock<Instance>>);

impl InstanceRef {
    pub fn new(instance: Instance) -> Self {
        Self(Arc::new(RwLock::new(instance)))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Instance> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Instance> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn model(&self) -> ModelId {
        self.read().model.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    pub fn set(&self, key: impl ToString, value: impl Into<Value>) {
        self.write().set(key, value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().remove(key)
    }

    pub fn snapshot(&self) -> Instance {
        self.read().clone()
    }
}

impl From<Instance> for InstanceRef {
    fn from(instance: Instance) -> Self {
        Self::new(instance)
    }
}
