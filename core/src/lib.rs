pub mod context;
pub mod contract;
pub mod de;
pub mod error;
pub mod registry;
pub mod schema;
pub mod ser;
pub mod types;
pub mod value;


pub use crate::{
    context::{Args, BatchGuard, Context, ContextRef, Done, OnReady},
    contract::{Converter, Hooks, Site, Slot, SlotKey},
    de::{deserialize, deserialize_all, deserialize_model, update, update_inferred},
    error::{Error, Result},
    schema::{ModelId, ModelSchema, SchemaRef},
    ser::{serialize, serialize_all, serialize_inferred},
    value::instance::{Instance, InstanceRef, Value},
    value::record::{Number, Record},
};
