use crate::{
    contract::Slot,
    error::{Error, Result},
    registry,
    schema::{ModelSchema, SchemaRef},
    value::{
        instance::{Instance, InstanceRef},
        record::Record,
    },
};

/// Converts a live instance into a plain record by driving every property
/// of `schema` forward, inherited properties first so own properties win on
/// key collisions.
pub fn serialize(schema: &SchemaRef, target: &InstanceRef) -> Result<Record> {
    let instance = target.snapshot();
    write_with_schema(Record::map(), schema, &instance)
}

/// [`serialize`] resolving the schema from the registry by the instance's
/// model id.
pub fn serialize_inferred(target: &InstanceRef) -> Result<Record> {
    let model = target.model();
    let schema = registry::lookup(&model).ok_or(Error::NoSchema(model))?;
    serialize(&schema, target)
}

/// Serializes a batch of instances into one record sequence.
pub fn serialize_all(schema: &SchemaRef, targets: &[InstanceRef]) -> Result<Record> {
    let mut result = Record::seq();
    for target in targets {
        result = result.item(serialize(schema, target)?);
    }
    Ok(result)
}

fn write_with_schema(out: Record, schema: &ModelSchema, instance: &Instance) -> Result<Record> {
    let mut out = match schema.parent() {
        Some(parent) => write_with_schema(out, parent, instance)?,
        None => out,
    };
    for (prop, converter) in schema.props() {
        match converter.serialize(instance.get(prop), prop, instance)? {
            Slot::Present(record) => {
                out = out.property(converter.record_key(prop), record);
            }
            Slot::Omitted => {}
        }
    }
    Ok(out)
}
