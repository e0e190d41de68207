use crate::{
    context::{ContextRef, Done, Gather},
    contract::{Converter, Slot, SlotKey},
    de,
    error::{Error, Result},
    schema::SchemaRef,
    value::{
        instance::{Instance, InstanceRef, Value},
        record::Record,
    },
};
use std::sync::Arc;

/// Scalar passthrough: null, booleans, numbers and strings convert to
/// themselves in both directions.
pub fn primitive() -> Converter {
    Converter::new(
        |value, _, _| match value {
            None => Ok(Slot::Omitted),
            Some(value) => scalar_to_record(value).map(Slot::Present),
        },
        |raw, done, _| match raw {
            Record::Seq(_) | Record::Map(_) => done.fail(Error::NotScalar(raw.clone())),
            _ => done.resolve(Value::from(raw)),
        },
    )
}

/// Whole-subtree passthrough. Keeps nested sequences and maps as plain
/// values without driving any schema. Live instances inside the value have
/// no record form, so the forward direction rejects them.
pub fn raw() -> Converter {
    Converter::new(
        |value, _, _| match value {
            None => Ok(Slot::Omitted),
            Some(value) => Record::try_from(value).map(Slot::Present),
        },
        |raw, done, _| done.resolve(Value::from(raw)),
    )
}

/// Absent model values serialize to an omitted slot without consulting
/// `inner`. Everything else, reverse direction included, passes through
/// untouched, alias and hooks included.
pub fn optional(inner: Converter) -> Converter {
    let serialize = inner.serialize.clone();
    Converter {
        serialize: Arc::new(move |value, key, instance| match value {
            None => Ok(Slot::Omitted),
            Some(_) => serialize(value, key, instance),
        }),
        ..inner
    }
}

/// Stores the property under `name` on the record side while the instance
/// keeps its own property name.
pub fn alias(name: impl ToString, inner: Converter) -> Converter {
    assert!(
        !inner.is_aliased(),
        "converter is already aliased, aliases do not stack"
    );
    Converter {
        alias: Some(name.to_string()),
        ..inner
    }
}

pub fn custom(
    serialize: impl Fn(Option<&Value>, &str, &Instance) -> Result<Slot<Record>>
        + Send
        + Sync
        + 'static,
    deserialize: impl Fn(&Record, Done, &ContextRef) + Send + Sync + 'static,
) -> Converter {
    Converter::new(serialize, deserialize)
}

/// [`custom`] for conversions that can answer inline: the plain reverse
/// function is lifted into the completion protocol.
pub fn custom_sync(
    serialize: impl Fn(Option<&Value>, &str, &Instance) -> Result<Slot<Record>>
        + Send
        + Sync
        + 'static,
    deserialize: impl Fn(&Record, &ContextRef) -> Result<Slot<Value>> + Send + Sync + 'static,
) -> Converter {
    Converter::new(serialize, move |raw, done, ctx| {
        done.finish(deserialize(raw, ctx))
    })
}

type RegisterFn = Arc<dyn Fn(&str, &InstanceRef, &ContextRef) + Send + Sync>;

/// Marks the property holding the instance id. The reverse direction
/// announces the id to the session's reference pool before storing it,
/// releasing every reference parked on that id.
pub fn identifier() -> Converter {
    make_identifier(None)
}

/// [`identifier`] with an extra registration callback invoked after the
/// announcement, typically to index the fresh instance in some store.
pub fn identifier_with(
    register: impl Fn(&str, &InstanceRef, &ContextRef) + Send + Sync + 'static,
) -> Converter {
    make_identifier(Some(Arc::new(register)))
}

fn make_identifier(register: Option<RegisterFn>) -> Converter {
    let mut converter = Converter::new(
        |value, _, _| match value {
            None => Ok(Slot::Omitted),
            Some(value) => scalar_to_record(value).map(Slot::Present),
        },
        move |raw, done, ctx| {
            let id = match ref_key(raw) {
                Some(id) => id,
                None => return done.fail(Error::NotScalar(raw.clone())),
            };
            let target = match ctx.target() {
                Some(target) => target,
                None => return done.fail(Error::NoTarget),
            };
            ctx.resolve_ref(ctx.schema(), &id, Value::Instance(target.clone()));
            if let Some(register) = &register {
                register(&id, &target, ctx);
            }
            done.resolve(Value::from(raw));
        },
    );
    converter.identifier = true;
    converter
}

/// Nested object: a record-side map converts through `schema` in a child
/// session and the child's instance becomes the property value. Null and
/// non-map records convert to a null property.
pub fn object(schema: impl Into<SchemaRef>) -> Converter {
    let schema = schema.into();
    let forward = Arc::clone(&schema);
    Converter::new(
        move |value, _, _| match value {
            None | Some(Value::Null) => Ok(Slot::Present(Record::Null)),
            Some(Value::Instance(target)) => {
                crate::ser::serialize(&forward, target).map(Slot::Present)
            }
            Some(other) => Err(Error::CannotRepresent(other.clone())),
        },
        move |raw, done, ctx| {
            if !raw.is_map() {
                return done.resolve(Value::Null);
            }
            de::child_session(ctx, &schema, raw, done);
        },
    )
}

/// Stores a pointer to another instance as that instance's id and restores
/// it by awaiting the id's announcement anywhere in the session tree. The
/// target schema must declare an identifier property.
pub fn reference(schema: impl Into<SchemaRef>) -> Converter {
    let schema = schema.into();
    let id_prop = match schema.identifier_prop() {
        Some(prop) => prop.to_owned(),
        None => panic!(
            "reference target schema: {} has no identifier property",
            schema.id()
        ),
    };
    let expected = Arc::clone(&schema);
    Converter::new(
        move |value, _, _| serialize_reference(value, &id_prop),
        move |raw, done, ctx| {
            if raw.is_null() {
                return done.resolve(Value::Null);
            }
            let id = match ref_key(raw) {
                Some(id) => id,
                None => return done.fail(Error::NotScalar(raw.clone())),
            };
            ctx.await_ref(&expected, id, done);
        },
    )
}

/// [`reference`] resolving through a caller-supplied lookup instead of the
/// session's reference pool.
pub fn reference_with_lookup(
    schema: impl Into<SchemaRef>,
    lookup: impl Fn(&str, Done, &ContextRef) + Send + Sync + 'static,
) -> Converter {
    let schema = schema.into();
    let id_prop = match schema.identifier_prop() {
        Some(prop) => prop.to_owned(),
        None => panic!(
            "reference target schema: {} has no identifier property",
            schema.id()
        ),
    };
    Converter::new(
        move |value, _, _| serialize_reference(value, &id_prop),
        move |raw, done, ctx| {
            if raw.is_null() {
                return done.resolve(Value::Null);
            }
            let id = match ref_key(raw) {
                Some(id) => id,
                None => return done.fail(Error::NotScalar(raw.clone())),
            };
            lookup(&id, done, ctx);
        },
    )
}

fn serialize_reference(value: Option<&Value>, id_prop: &str) -> Result<Slot<Record>> {
    match value {
        None | Some(Value::Null) => Ok(Slot::Present(Record::Null)),
        Some(Value::Instance(target)) => match target.get(id_prop) {
            Some(id) => scalar_to_record(&id).map(Slot::Present),
            None => Err(Error::NoIdentifier(target.model())),
        },
        Some(other) => Err(Error::CannotRepresent(other.clone())),
    }
}

/// Sequence of values converted element-wise through `inner`. The reverse
/// direction fans every element out as its own conversion and reassembles
/// results by element index, so slow elements cannot reorder the sequence;
/// omitted elements drop out without leaving holes. The first failing
/// element, in completion order, fails the whole property once every
/// sibling has reported.
pub fn list(inner: Converter) -> Converter {
    assert!(
        !inner.is_aliased(),
        "list element converter must not be aliased, alias the list property instead"
    );
    let forward = inner.clone();
    let reverse = inner;
    Converter::new(
        move |value, key, instance| match value {
            None => Ok(Slot::Omitted),
            Some(Value::Seq(items)) => {
                let mut result = Vec::with_capacity(items.len());
                for item in items {
                    if let Slot::Present(record) = forward.serialize(Some(item), key, instance)? {
                        result.push(record);
                    }
                }
                Ok(Slot::Present(Record::Seq(result)))
            }
            Some(other) => Err(Error::CannotRepresent(other.clone())),
        },
        move |raw, done, ctx| {
            let items = match raw.as_seq() {
                Some(items) => items,
                None => return done.fail(Error::NotSeq(raw.clone())),
            };
            let gather = Gather::new(items.len(), move |result| match result {
                Ok(slots) => done.resolve(Value::Seq(
                    slots.into_iter().filter_map(Slot::present).collect(),
                )),
                Err(error) => done.fail(error),
            });
            for (index, item) in items.iter().enumerate() {
                reverse.deserialize_with_hooks(
                    item,
                    raw,
                    SlotKey::Index(index),
                    ctx,
                    gather.slot(index),
                );
            }
        },
    )
}

/// String-keyed map of values converted element-wise through `inner`.
/// Entries whose value omits drop out together with their key; surviving
/// entries keep their key association and their order.
pub fn map(inner: Converter) -> Converter {
    assert!(
        !inner.is_aliased(),
        "map entry converter must not be aliased, alias the map property instead"
    );
    let forward = inner.clone();
    let reverse = inner;
    Converter::new(
        move |value, key, instance| match value {
            None => Ok(Slot::Omitted),
            Some(Value::Map(entries)) => {
                let mut result = Record::map();
                for (entry_key, item) in entries {
                    if let Slot::Present(record) = forward.serialize(Some(item), key, instance)? {
                        result = result.property(entry_key, record);
                    }
                }
                Ok(Slot::Present(result))
            }
            Some(other) => Err(Error::CannotRepresent(other.clone())),
        },
        move |raw, done, ctx| {
            let entries = match raw.as_map() {
                Some(entries) => entries,
                None => return done.fail(Error::NotMap(raw.clone())),
            };
            let keys = entries
                .iter()
                .map(|(key, _)| key.clone())
                .collect::<Vec<_>>();
            let gather = Gather::new(entries.len(), move |result| match result {
                Ok(slots) => done.resolve(Value::Map(
                    keys.into_iter()
                        .zip(slots)
                        .filter_map(|(key, slot)| slot.present().map(|value| (key, value)))
                        .collect(),
                )),
                Err(error) => done.fail(error),
            });
            for (index, (key, item)) in entries.iter().enumerate() {
                reverse.deserialize_with_hooks(
                    item,
                    raw,
                    SlotKey::Prop(key.clone()),
                    ctx,
                    gather.slot(index),
                );
            }
        },
    )
}

fn scalar_to_record(value: &Value) -> Result<Record> {
    match value {
        Value::Null => Ok(Record::Null),
        Value::Bool(value) => Ok(Record::Bool(*value)),
        Value::Number(value) => Ok(Record::Number(value.clone())),
        Value::String(value) => Ok(Record::String(value.clone())),
        other => Err(Error::CannotRepresent(other.clone())),
    }
}

fn ref_key(raw: &Record) -> Option<String> {
    match raw {
        Record::String(value) => Some(value.clone()),
        Record::Number(value) => Some(value.to_string()),
        _ => None,
    }
}
