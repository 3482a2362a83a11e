//! Tri-state field slot
//!
//! A fragment field is either absent (the source said nothing), explicitly
//! null, or a value. Absence and null resolve differently, so `Option<T>` is
//! not enough.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Slot<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Absent
    }
}

impl<T> From<Option<T>> for Slot<T> {
    /// `None` becomes `Absent`; adapters never emit explicit nulls
    fn from(value: Option<T>) -> Self {
        value.map_or(Slot::Absent, Slot::Value)
    }
}

impl<T: Serialize> Serialize for Slot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::Value(v) => v.serialize(serializer),
            Slot::Absent | Slot::Null => serializer.serialize_none(),
        }
    }
}

// Only invoked for keys that exist; missing keys fall back to `Default`
// (`Absent`) through `#[serde(default)]` on the field.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Slot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Slot::Value(v),
            None => Slot::Null,
        })
    }
}
