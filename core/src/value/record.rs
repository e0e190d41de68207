use serde::{
    de::{MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
    Deserialize, Deserializer, Serialize, Serializer,
};

#[derive(Debug, Clone)]
pub enum Number {
    SignedInteger(i64),
    UnsignedInteger(u64),
    Float(f64),
}

impl Number {
    pub fn as_signed_integer(&self) -> Option<i64> {
        match self {
            Self::SignedInteger(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_unsigned_integer(&self) -> Option<u64> {
        match self {
            Self::UnsignedInteger(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

/// Numbers compare by numeric value, not by storage class, so records built
/// in code and records parsed back from a format agree on equality.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::SignedInteger(a), Self::SignedInteger(b)) => a == b,
            (Self::UnsignedInteger(a), Self::UnsignedInteger(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::SignedInteger(a), Self::UnsignedInteger(b))
            | (Self::UnsignedInteger(b), Self::SignedInteger(a)) => {
                *a >= 0 && *a as u64 == *b
            }
            (Self::SignedInteger(a), Self::Float(b)) | (Self::Float(b), Self::SignedInteger(a)) => {
                *a as f64 == *b
            }
            (Self::UnsignedInteger(a), Self::Float(b))
            | (Self::Float(b), Self::UnsignedInteger(a)) => *a as f64 == *b,
        }
    }
}

impl Eq for Number {}

impl std::fmt::Display for Number {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::SignedInteger(value) => write!(formatter, "{}", value),
            Self::UnsignedInteger(value) => write!(formatter, "{}", value),
            Self::Float(value) => write!(formatter, "{}", value),
        }
    }
}

macro_rules! impl_number_from {
    ($type:ty => $variant:ident as $target:ty) => {
        impl From<$type> for Number {
            fn from(value: $type) -> Self {
                Self::$variant(value as $target)
            }
        }
    };
}

impl_number_from!(i8 => SignedInteger as i64);
impl_number_from!(i16 => SignedInteger as i64);
impl_number_from!(i32 => SignedInteger as i64);
impl_number_from!(i64 => SignedInteger as i64);
impl_number_from!(isize => SignedInteger as i64);
impl_number_from!(u8 => UnsignedInteger as u64);
impl_number_from!(u16 => UnsignedInteger as u64);
impl_number_from!(u32 => UnsignedInteger as u64);
impl_number_from!(u64 => UnsignedInteger as u64);
impl_number_from!(usize => UnsignedInteger as u64);
impl_number_from!(f32 => Float as f64);
impl_number_from!(f64 => Float as f64);

/// Plain data record. This is the wire-facing half of every conversion:
/// scalars, ordered sequences and ordered string-keyed maps, nothing else.
/// Records serialize through any self-describing serde format.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<Record>),
    Map(Vec<(String, Record)>),
}

impl Default for Record {
    fn default() -> Self {
        Self::Null
    }
}

macro_rules! impl_as_ref_record {
    ($method:ident : $variant:ident => $type:ty) => {
        pub fn $method(&self) -> Option<&$type> {
            match self {
                Self::$variant(value) => Some(value),
                _ => None,
            }
        }
    };
}

impl Record {
    pub fn seq() -> Self {
        Self::Seq(vec![])
    }

    pub fn map() -> Self {
        Self::Map(vec![])
    }

    pub fn item(mut self, value: impl Into<Record>) -> Self {
        if let Self::Seq(seq) = &mut self {
            seq.push(value.into());
        }
        self
    }

    /// Writes a map entry, replacing an existing entry under the same key.
    pub fn property(mut self, key: impl ToString, value: impl Into<Record>) -> Self {
        if let Self::Map(map) = &mut self {
            let key = key.to_string();
            let value = value.into();
            if let Some(entry) = map.iter_mut().find(|(k, _)| k == &key) {
                entry.1 = value;
            } else {
                map.push((key, value));
            }
        }
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    impl_as_ref_record!(as_number : Number => Number);
    impl_as_ref_record!(as_str : String => str);
    impl_as_ref_record!(as_seq : Seq => [Record]);
    impl_as_ref_record!(as_map : Map => [(String, Record)]);

    pub fn get(&self, key: &str) -> Option<&Record> {
        match self {
            Self::Map(map) => map
                .iter()
                .find_map(|(k, value)| if k == key { Some(value) } else { None }),
            _ => None,
        }
    }
}

macro_rules! impl_record_from_number {
    ($type:ty) => {
        impl From<$type> for Record {
            fn from(value: $type) -> Self {
                Self::Number(value.into())
            }
        }
    };
}

impl_record_from_number!(i8);
impl_record_from_number!(i16);
impl_record_from_number!(i32);
impl_record_from_number!(i64);
impl_record_from_number!(isize);
impl_record_from_number!(u8);
impl_record_from_number!(u16);
impl_record_from_number!(u32);
impl_record_from_number!(u64);
impl_record_from_number!(usize);
impl_record_from_number!(f32);
impl_record_from_number!(f64);

impl From<()> for Record {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<bool> for Record {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Number> for Record {
    fn from(value: Number) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Record {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Record {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Record>> for Record {
    fn from(value: Vec<Record>) -> Self {
        Self::Seq(value)
    }
}

impl From<Vec<(String, Record)>> for Record {
    fn from(value: Vec<(String, Record)>) -> Self {
        Self::Map(value)
    }
}

impl<T> From<Option<T>> for Record
where
    T: Into<Record>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Self::Null,
        }
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Number(Number::SignedInteger(value)) => serializer.serialize_i64(*value),
            Self::Number(Number::UnsignedInteger(value)) => serializer.serialize_u64(*value),
            Self::Number(Number::Float(value)) => serializer.serialize_f64(*value),
            Self::String(value) => serializer.serialize_str(value),
            Self::Seq(value) => {
                let mut seq = serializer.serialize_seq(Some(value.len()))?;
                for item in value {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(value) => {
                let mut map = serializer.serialize_map(Some(value.len()))?;
                for (key, item) in value {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
        }
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("any self-describing value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Record::Bool(v))
    }

    fn visit_i8<E>(self, v: i8) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_i16<E>(self, v: i16) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_i32<E>(self, v: i32) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_u8<E>(self, v: u8) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_u16<E>(self, v: u16) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_u32<E>(self, v: u32) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_f32<E>(self, v: f32) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Record::Number(v.into()))
    }

    fn visit_char<E>(self, v: char) -> Result<Self::Value, E> {
        Ok(Record::String(v.to_string()))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Record::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
        Ok(Record::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Record::Seq(
            v.iter().map(|byte| Record::Number((*byte).into())).collect(),
        ))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Record::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RecordVisitor)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Record::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut result = Vec::with_capacity(seq.size_hint().unwrap_or_default());
        while let Some(item) = seq.next_element()? {
            result.push(item);
        }
        Ok(Record::Seq(result))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut result = Vec::with_capacity(map.size_hint().unwrap_or_default());
        while let Some((key, value)) = map.next_entry()? {
            result.push((key, value));
        }
        Ok(Record::Map(result))
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RecordVisitor)
    }
}
