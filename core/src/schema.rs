use crate::{
    context::ContextRef,
    contract::Converter,
    value::instance::{Instance, InstanceRef},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl ToString) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ModelId> for ModelId {
    fn from(id: &ModelId) -> Self {
        id.clone()
    }
}

pub type SchemaRef = Arc<ModelSchema>;
pub type Factory = Arc<dyn Fn(&ContextRef) -> InstanceRef + Send + Sync>;

/// Describes how instances of one model convert to and from records: an
/// ordered list of named properties with their converters, a factory that
/// makes fresh targets, and optionally a parent schema whose properties are
/// inherited.
pub struct ModelSchema {
    id: ModelId,
    props: Vec<(String, Converter)>,
    factory: Factory,
    extends: Option<SchemaRef>,
}

impl ModelSchema {
    pub fn new(id: impl Into<ModelId>) -> Self {
        let id = id.into();
        let model = id.clone();
        Self {
            id,
            props: vec![],
            factory: Arc::new(move |_| InstanceRef::new(Instance::new(model.clone()))),
            extends: None,
        }
    }

    pub fn prop(mut self, name: impl ToString, converter: Converter) -> Self {
        self.props.push((name.to_string(), converter));
        self
    }

    pub fn factory(
        mut self,
        factory: impl Fn(&ContextRef) -> InstanceRef + Send + Sync + 'static,
    ) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn extends(mut self, parent: impl Into<SchemaRef>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn into_ref(self) -> SchemaRef {
        Arc::new(self)
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn props(&self) -> &[(String, Converter)] {
        &self.props
    }

    pub fn parent(&self) -> Option<&SchemaRef> {
        self.extends.as_ref()
    }

    pub fn create(&self, ctx: &ContextRef) -> InstanceRef {
        (self.factory)(ctx)
    }

    /// First identifier property, own properties before inherited ones.
    pub fn identifier_prop(&self) -> Option<&str> {
        for (name, converter) in &self.props {
            if converter.is_identifier() {
                return Some(name);
            }
        }
        self.extends
            .as_ref()
            .and_then(|parent| parent.identifier_prop())
    }

    /// True when this schema is `other` or extends it, directly or not.
    pub fn is_assignable_to(&self, other: &ModelSchema) -> bool {
        if self.id == other.id {
            return true;
        }
        match &self.extends {
            Some(parent) => parent.is_assignable_to(other),
            None => false,
        }
    }
}

impl std::fmt::Debug for ModelSchema {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter
            .debug_struct("ModelSchema")
            .field("id", &self.id)
            .field("props", &self.props)
            .field("extends", &self.extends.as_ref().map(|parent| parent.id()))
            .finish_non_exhaustive()
    }
}
