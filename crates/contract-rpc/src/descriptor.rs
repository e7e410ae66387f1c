// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service descriptor model.
//!
//! A [`ServiceDescriptor`] records the shape of one service: its methods, each
//! method's ordered parameters, its output and the error kinds it may surface
//! by name. Descriptors are assembled during a declaration phase (see
//! [`registry`](crate::registry)) and read-only afterwards; dispatchers and
//! proxies share them through an `Arc`.
//!
//! During declaration a parameter list may have holes, since parameter
//! metadata can arrive in any order. [`ServiceDescriptor::validate`] is what
//! rejects an incomplete descriptor, and it runs whenever a dispatcher or proxy
//! is built from one.

use crate::error::{DeclaredError, DeclaredFailure, RpcError, RpcResult};
use crate::marshal::Codec;
use crate::types::RESERVED_ERROR_KINDS;
use std::collections::BTreeMap;
use std::fmt;

/// Describes a whole service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service name (e.g., "LibraryService")
    pub name: String,
    /// Methods keyed by name
    pub methods: BTreeMap<String, MethodDescriptor>,
}

impl ServiceDescriptor {
    /// Create an empty descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeMap::new(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Check that the descriptor is complete enough to serve or call.
    ///
    /// Fails with [`RpcError::MalformedDescriptor`] if any method has a hole in
    /// its parameter list, a parameter whose index does not match its position,
    /// an output flag that disagrees with its codec, or declares a reserved
    /// error kind.
    pub fn validate(&self) -> RpcResult<()> {
        for method in self.methods.values() {
            method.validate(&self.name)?;
        }
        Ok(())
    }
}

/// Describes one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    /// Parameter slots in call-signature order. `None` marks a position no
    /// metadata has been attached to yet.
    pub params: Vec<Option<ParamDescriptor>>,
    pub output: Option<OutputDescriptor>,
    pub errors: Option<ErrorDescriptor>,
}

impl MethodDescriptor {
    /// Create an empty method: no parameters, no output, no errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            output: None,
            errors: None,
        }
    }

    /// Number of positional parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param(&self, index: usize) -> Option<&ParamDescriptor> {
        self.params.get(index).and_then(Option::as_ref)
    }

    /// Declared parameters in order. Only contiguous after validation.
    pub fn params(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.iter().flatten()
    }

    /// A method that never received output metadata has no output.
    pub fn has_output(&self) -> bool {
        self.output.as_ref().is_some_and(|o| o.has_output)
    }

    pub fn output_codec(&self) -> Option<&Codec> {
        self.output.as_ref().and_then(|o| o.codec.as_ref())
    }

    pub fn declared_errors(&self) -> Option<&ErrorDescriptor> {
        self.errors.as_ref()
    }

    /// True if `kind` is one of this method's declared error kinds.
    pub fn declares(&self, kind: &str) -> bool {
        self.errors.as_ref().is_some_and(|e| e.contains(kind))
    }

    fn validate(&self, service: &str) -> RpcResult<()> {
        for (position, slot) in self.params.iter().enumerate() {
            match slot {
                None => {
                    return Err(RpcError::MalformedDescriptor(format!(
                        "{}.{}: parameter {} is not declared",
                        service, self.name, position
                    )));
                }
                Some(param) if param.index != position => {
                    return Err(RpcError::MalformedDescriptor(format!(
                        "{}.{}: parameter at position {} claims index {}",
                        service, self.name, position, param.index
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(output) = &self.output {
            if output.has_output != output.codec.is_some() {
                return Err(RpcError::MalformedDescriptor(format!(
                    "{}.{}: output flag and codec disagree",
                    service, self.name
                )));
            }
        }

        if let Some(errors) = &self.errors {
            if let Some(kind) = errors.kinds().find(|k| RESERVED_ERROR_KINDS.contains(k)) {
                return Err(RpcError::MalformedDescriptor(format!(
                    "{}.{}: error kind '{}' is reserved",
                    service, self.name, kind
                )));
            }
        }

        Ok(())
    }
}

/// Describes one positional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    /// Position in the call signature
    pub index: usize,
    pub codec: Codec,
    /// Always true; optional parameters are not supported
    pub required: bool,
}

impl ParamDescriptor {
    pub fn new(index: usize, codec: Codec) -> Self {
        Self {
            index,
            codec,
            required: true,
        }
    }
}

/// Describes a method's return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub has_output: bool,
    /// Present iff `has_output`
    pub codec: Option<Codec>,
}

impl OutputDescriptor {
    /// A method returning a value packed with `codec`.
    pub fn value(codec: Codec) -> Self {
        Self {
            has_output: true,
            codec: Some(codec),
        }
    }

    /// A method with no return value.
    pub fn none() -> Self {
        Self {
            has_output: false,
            codec: None,
        }
    }
}

#[derive(Clone, Copy)]
struct DeclaredKind {
    classify: fn(&anyhow::Error) -> Option<String>,
    rehydrate: fn(&str) -> Box<dyn std::error::Error + Send + Sync>,
}

fn classify_as<E: DeclaredError>(err: &anyhow::Error) -> Option<String> {
    err.downcast_ref::<E>().map(DeclaredError::detail)
}

fn rehydrate_as<E: DeclaredError>(detail: &str) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(E::from_detail(detail))
}

/// The set of error kinds a method may surface by name.
#[derive(Clone, Default)]
pub struct ErrorDescriptor {
    kinds: BTreeMap<&'static str, DeclaredKind>,
}

impl ErrorDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `E` to the declared set.
    pub fn declare<E: DeclaredError>(mut self) -> Self {
        self.kinds.insert(
            E::KIND,
            DeclaredKind {
                classify: classify_as::<E>,
                rehydrate: rehydrate_as::<E>,
            },
        );
        self
    }

    /// Declared kind identifiers, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// The declared kind a raised error belongs to, with the declared
    /// error's own detail text.
    pub fn classify(&self, err: &anyhow::Error) -> Option<(&'static str, String)> {
        self.kinds
            .iter()
            .find_map(|(name, kind)| (kind.classify)(err).map(|detail| (*name, detail)))
    }

    /// Rebuild the typed error for a declared kind reported on the wire.
    pub fn rehydrate(&self, kind: &str, detail: &str) -> Option<DeclaredFailure> {
        let (name, declared) = self.kinds.get_key_value(kind)?;
        Some(DeclaredFailure::new(
            *name,
            detail,
            (declared.rehydrate)(detail),
        ))
    }
}

impl PartialEq for ErrorDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kinds().eq(other.kinds())
    }
}

impl Eq for ErrorDescriptor {}

impl fmt::Debug for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}
