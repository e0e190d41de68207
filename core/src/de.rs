use crate::{
    context::{Args, Context, ContextRef, Done, Gather, OnReady},
    contract::{Slot, SlotKey},
    error::{Error, Result},
    registry,
    schema::{ModelId, ModelSchema, SchemaRef},
    value::{
        instance::{InstanceRef, Value},
        record::Record,
    },
};
use std::sync::Arc;

/// Converts a plain record into a fresh instance of `schema`. The instance
/// is the conversion target and is returned immediately; `on_ready` fires
/// exactly once when every property unit has settled, with either the
/// session's first error or the finished instance. Fire-and-forget callers
/// pass `|_| ()`.
pub fn deserialize(
    schema: &SchemaRef,
    record: &Record,
    on_ready: impl FnOnce(Result<InstanceRef>) + Send + 'static,
    args: Args,
) -> Result<InstanceRef> {
    if !record.is_map() {
        return Err(Error::NotMap(record.clone()));
    }
    let ctx = Context::root(
        Arc::clone(schema),
        record.clone(),
        Some(Box::new(on_ready)),
        args,
    );
    let target = schema.create(&ctx);
    Ok(run_session(&ctx, schema, record, target))
}

/// [`deserialize`] resolving the schema from the registry. Fails
/// synchronously when the model id is not registered.
pub fn deserialize_model(
    model: impl Into<ModelId>,
    record: &Record,
    on_ready: impl FnOnce(Result<InstanceRef>) + Send + 'static,
    args: Args,
) -> Result<InstanceRef> {
    let model = model.into();
    let schema = registry::lookup(&model).ok_or(Error::NoSchema(model))?;
    deserialize(&schema, record, on_ready, args)
}

/// Converts a batch of records, one root session each, all live at once.
/// `on_ready` fires once after every session settles, with instances in
/// record order or the first error in completion order.
pub fn deserialize_all(
    schema: &SchemaRef,
    records: &[Record],
    on_ready: impl FnOnce(Result<Vec<InstanceRef>>) + Send + 'static,
    args: Args,
) -> Result<Vec<InstanceRef>> {
    for record in records {
        if !record.is_map() {
            return Err(Error::NotMap(record.clone()));
        }
    }
    let gather = Gather::new(records.len(), move |result| {
        on_ready(result.map(|slots| {
            slots
                .into_iter()
                .filter_map(Slot::present)
                .filter_map(|value| match value {
                    Value::Instance(instance) => Some(instance),
                    _ => None,
                })
                .collect()
        }))
    });
    let mut targets = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let slot = gather.slot(index);
        targets.push(deserialize(
            schema,
            record,
            move |result| match result {
                Ok(instance) => slot.resolve(Value::Instance(instance)),
                Err(error) => slot.fail(error),
            },
            args.clone(),
        )?);
    }
    Ok(targets)
}

/// Merges a record into an existing instance in place: specified properties
/// convert and overwrite, unspecified ones keep their prior values, and the
/// identity callers already hold stays the identity that is mutated.
/// Terminal delivery works as in [`deserialize`].
pub fn update(
    schema: &SchemaRef,
    target: &InstanceRef,
    record: &Record,
    on_ready: impl FnOnce(Result<InstanceRef>) + Send + 'static,
    args: Args,
) -> Result<InstanceRef> {
    if !record.is_map() {
        return Err(Error::NotMap(record.clone()));
    }
    let ctx = Context::root(
        Arc::clone(schema),
        record.clone(),
        Some(Box::new(on_ready)),
        args,
    );
    Ok(run_session(&ctx, schema, record, target.clone()))
}

/// [`update`] resolving the schema from the registry by the target's model
/// id. Fails synchronously when no schema is registered, without touching
/// the target or invoking the callback.
pub fn update_inferred(
    target: &InstanceRef,
    record: &Record,
    on_ready: impl FnOnce(Result<InstanceRef>) + Send + 'static,
    args: Args,
) -> Result<InstanceRef> {
    let model = target.model();
    let schema = registry::lookup(&model).ok_or(Error::NoSchema(model))?;
    update(&schema, target, record, on_ready, args)
}

/// Nested conversion: runs `record` through `schema` in a child session of
/// `parent` and feeds the child's terminal result into `done`.
pub(crate) fn child_session(parent: &ContextRef, schema: &SchemaRef, record: &Record, done: Done) {
    let on_ready: OnReady = Box::new(move |result| match result {
        Ok(instance) => done.resolve(Value::Instance(instance)),
        Err(error) => done.fail(error),
    });
    let ctx = Context::child(parent, Arc::clone(schema), record.clone(), on_ready);
    let target = schema.create(&ctx);
    run_session(&ctx, schema, record, target);
}

/// Binds `target` and drives one scheduling scan over the schema's
/// properties. The batch guard keeps the terminal callback parked until the
/// scan has registered every unit, even when all of them complete inline.
fn run_session(
    ctx: &ContextRef,
    schema: &SchemaRef,
    record: &Record,
    target: InstanceRef,
) -> InstanceRef {
    ctx.set_target(target.clone());
    let batch = ctx.begin_batch();
    scan_props(ctx, schema, record, &target);
    drop(batch);
    target
}

fn scan_props(ctx: &ContextRef, schema: &ModelSchema, record: &Record, target: &InstanceRef) {
    if let Some(parent) = schema.parent() {
        scan_props(ctx, parent, record, target);
    }
    for (prop, converter) in schema.props() {
        let raw = match record.get(converter.record_key(prop)) {
            Some(raw) => raw,
            None => continue,
        };
        let slot_target = target.clone();
        let slot_prop = prop.clone();
        let done = ctx.unit(move |value| slot_target.set(slot_prop, value));
        converter.deserialize_with_hooks(raw, record, SlotKey::Prop(prop.clone()), ctx, done);
    }
}
