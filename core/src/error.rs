use crate::{schema::ModelId, value::instance::Value, value::record::Record};
use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub enum Error {
    Message(String),
    NotSeq(Record),
    NotMap(Record),
    NotScalar(Record),
    CannotRepresent(Value),
    NoSchema(ModelId),
    NoIdentifier(ModelId),
    /// (ids still awaited when the session ran out of work)
    UnresolvedReferences(Vec<String>),
    /// (id awaited by a unit whose session already failed)
    Canceled(String),
    NoTarget,
}

impl Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Message(msg) => formatter.write_str(msg),
            Error::NotSeq(_) => formatter.write_str("value is not a sequence"),
            Error::NotMap(_) => formatter.write_str("value is not a map"),
            Error::NotScalar(_) => formatter.write_str("value is not a scalar"),
            Error::CannotRepresent(_) => {
                formatter.write_str("value has no record representation")
            }
            Error::NoSchema(id) => write!(formatter, "no schema registered for model: {}", id),
            Error::NoIdentifier(id) => {
                write!(formatter, "schema of model: {} has no identifier property", id)
            }
            Error::UnresolvedReferences(ids) => {
                write!(formatter, "unresolved references: {}", ids.join(", "))
            }
            Error::Canceled(id) => write!(formatter, "canceled resolution of reference: {}", id),
            Error::NoTarget => formatter.write_str("conversion has no target instance"),
        }
    }
}

impl std::error::Error for Error {}
