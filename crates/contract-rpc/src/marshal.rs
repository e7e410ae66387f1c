// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value codecs.
//!
//! A [`Marshaller`] pairs `pack` and `extract` for one concrete value type.
//! Descriptors never hold a marshaller directly: they hold a [`Codec`], the
//! type-erased, cloneable reference the dispatch layers work with. Wire values
//! are opaque to everything in this crate except the codec that produced them.
//!
//! The codecs at the bottom of this module (`IdMarshaller`, `StringMarshaller`,
//! `BoolMarshaller`, `JsonMarshaller`, `ArrayOf`) are the stock ones used by the
//! demo service and the tests. Real services are free to bring their own.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

/// Opaque unit of data carried across the transport boundary.
pub type WireValue = serde_json::Value;

/// A typed value travelling through the type-erased layers.
pub type AnyValue = Box<dyn Any + Send>;

/// A value could not be packed into, or extracted from, its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot marshal {expected}: {detail}")]
pub struct MarshalError {
    /// Rust type the codec works with
    pub expected: String,
    /// Human readable reason
    pub detail: String,
}

impl MarshalError {
    /// Create a marshal error for the given target type.
    pub fn new(expected: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            detail: detail.into(),
        }
    }
}

/// Asymmetric codec for one value type.
///
/// Both operations are pure. `extract` must reject any wire value that is not
/// structurally valid for `Value` rather than guessing.
pub trait Marshaller: Send + Sync + 'static {
    /// The Rust type this codec packs and extracts.
    type Value: Send + 'static;

    /// Convert a value to its wire representation.
    fn pack(&self, value: &Self::Value) -> Result<WireValue, MarshalError>;

    /// Rebuild a value from its wire representation.
    fn extract(&self, wire: &WireValue) -> Result<Self::Value, MarshalError>;

    /// Codec identity, used when comparing descriptors.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

trait ErasedCodec: Send + Sync {
    fn pack_any(&self, value: &(dyn Any + Send)) -> Result<WireValue, MarshalError>;
    fn extract_any(&self, wire: &WireValue) -> Result<AnyValue, MarshalError>;
    fn name(&self) -> &'static str;
    fn value_type(&self) -> &'static str;
}

impl<M: Marshaller> ErasedCodec for M {
    fn pack_any(&self, value: &(dyn Any + Send)) -> Result<WireValue, MarshalError> {
        let value = value.downcast_ref::<M::Value>().ok_or_else(|| {
            MarshalError::new(type_name::<M::Value>(), "value has a different Rust type")
        })?;
        self.pack(value)
    }

    fn extract_any(&self, wire: &WireValue) -> Result<AnyValue, MarshalError> {
        let value = self.extract(wire)?;
        Ok(Box::new(value))
    }

    fn name(&self) -> &'static str {
        Marshaller::name(self)
    }

    fn value_type(&self) -> &'static str {
        type_name::<M::Value>()
    }
}

/// Shared, type-erased codec reference carried by parameter and output
/// descriptors.
#[derive(Clone)]
pub struct Codec(Arc<dyn ErasedCodec>);

impl Codec {
    /// Wrap a marshaller.
    pub fn new<M: Marshaller>(marshaller: M) -> Self {
        Self(Arc::new(marshaller))
    }

    /// Wrap a default-constructed marshaller.
    pub fn of<M: Marshaller + Default>() -> Self {
        Self::new(M::default())
    }

    /// Pack a dynamically typed value. Fails if the value is not the codec's
    /// `Value` type or cannot be represented.
    pub fn pack(&self, value: &(dyn Any + Send)) -> Result<WireValue, MarshalError> {
        self.0.pack_any(value)
    }

    /// Extract a dynamically typed value.
    pub fn extract(&self, wire: &WireValue) -> Result<AnyValue, MarshalError> {
        self.0.extract_any(wire)
    }

    /// Codec identity.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Name of the Rust type the codec works with.
    pub fn value_type(&self) -> &'static str {
        self.0.value_type()
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Codec").field(&self.name()).finish()
    }
}

impl PartialEq for Codec {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Codec {}

/// Integer identifiers, carried as JSON integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdMarshaller;

impl Marshaller for IdMarshaller {
    type Value = i64;

    fn pack(&self, value: &i64) -> Result<WireValue, MarshalError> {
        Ok(WireValue::from(*value))
    }

    fn extract(&self, wire: &WireValue) -> Result<i64, MarshalError> {
        wire.as_i64().ok_or_else(|| {
            MarshalError::new("i64", format!("expected an integer id, got {}", wire))
        })
    }
}

/// UTF-8 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringMarshaller;

impl Marshaller for StringMarshaller {
    type Value = String;

    fn pack(&self, value: &String) -> Result<WireValue, MarshalError> {
        Ok(WireValue::String(value.clone()))
    }

    fn extract(&self, wire: &WireValue) -> Result<String, MarshalError> {
        wire.as_str()
            .map(str::to_owned)
            .ok_or_else(|| MarshalError::new("String", format!("expected a string, got {}", wire)))
    }
}

/// Booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolMarshaller;

impl Marshaller for BoolMarshaller {
    type Value = bool;

    fn pack(&self, value: &bool) -> Result<WireValue, MarshalError> {
        Ok(WireValue::Bool(*value))
    }

    fn extract(&self, wire: &WireValue) -> Result<bool, MarshalError> {
        wire.as_bool()
            .ok_or_else(|| MarshalError::new("bool", format!("expected a boolean, got {}", wire)))
    }
}

/// Structured records through their serde representation.
pub struct JsonMarshaller<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonMarshaller<T> {
    /// Create a marshaller for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonMarshaller<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonMarshaller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonMarshaller<{}>", type_name::<T>())
    }
}

impl<T> Marshaller for JsonMarshaller<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Value = T;

    fn pack(&self, value: &T) -> Result<WireValue, MarshalError> {
        serde_json::to_value(value).map_err(|e| MarshalError::new(type_name::<T>(), e.to_string()))
    }

    fn extract(&self, wire: &WireValue) -> Result<T, MarshalError> {
        T::deserialize(wire).map_err(|e| MarshalError::new(type_name::<T>(), e.to_string()))
    }
}

/// Ordered sequences of values handled by an inner codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayOf<M> {
    inner: M,
}

impl<M: Marshaller> ArrayOf<M> {
    /// Wrap the codec used for each element.
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<M: Marshaller> Marshaller for ArrayOf<M> {
    type Value = Vec<M::Value>;

    fn pack(&self, value: &Vec<M::Value>) -> Result<WireValue, MarshalError> {
        let items = value
            .iter()
            .map(|item| self.inner.pack(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WireValue::Array(items))
    }

    fn extract(&self, wire: &WireValue) -> Result<Vec<M::Value>, MarshalError> {
        let items = wire.as_array().ok_or_else(|| {
            MarshalError::new(
                type_name::<Vec<M::Value>>(),
                format!("expected an array, got {}", wire),
            )
        })?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                self.inner.extract(item).map_err(|e| {
                    MarshalError::new(e.expected, format!("element {}: {}", i, e.detail))
                })
            })
            .collect()
    }
}
