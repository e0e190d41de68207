use crate::schema::{ModelId, SchemaRef};
use lazy_static::lazy_static;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref SCHEMAS: Arc<RwLock<Vec<SchemaRef>>> = Default::default();
}

/// Registers `schema` under its model id for id-driven conversions,
/// replacing any previous registration of the same id.
pub fn register(schema: impl Into<SchemaRef>) {
    let schema = schema.into();
    if let Ok(mut schemas) = SCHEMAS.write() {
        if let Some(slot) = schemas.iter_mut().find(|other| other.id() == schema.id()) {
            *slot = schema;
        } else {
            schemas.push(schema);
        }
    }
}

pub fn lookup(id: &ModelId) -> Option<SchemaRef> {
    if let Ok(schemas) = SCHEMAS.read() {
        schemas.iter().find(|schema| schema.id() == id).cloned()
    } else {
        None
    }
}

pub fn is_registered(id: &ModelId) -> bool {
    lookup(id).is_some()
}

pub fn unregister(id: &ModelId) -> Option<SchemaRef> {
    if let Ok(mut schemas) = SCHEMAS.write() {
        let index = schemas.iter().position(|schema| schema.id() == id)?;
        Some(schemas.remove(index))
    } else {
        None
    }
}

pub fn clear() {
    if let Ok(mut schemas) = SCHEMAS.write() {
        schemas.clear();
    }
}
