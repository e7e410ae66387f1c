// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for descriptor construction and call dispatch.

use crate::marshal::MarshalError;
use std::fmt;
use thiserror::Error;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors surfaced by dispatcher/proxy construction and by calls.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Descriptor failed validation (parameter holes, bad output, reserved kinds)
    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// Same method registered twice on one dispatcher
    #[error("Handler already registered: {service}.{method}")]
    DuplicateHandler { service: String, method: String },

    /// Second descriptor for a service name already in the catalog
    #[error("Service already declared: {0}")]
    DuplicateService(String),

    /// Call for a method with no handler
    #[error("Unknown method: {service}.{method}")]
    UnknownMethod { service: String, method: String },

    /// Descriptor method the implementation does not provide
    #[error("No implementation bound for {service}.{method}")]
    UnboundMethod { service: String, method: String },

    /// Wrong number of positional arguments
    #[error("Method {method} takes {expected} argument(s), got {actual}")]
    Arity {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// Pack/extract failure on a parameter or result
    #[error("Marshal error: {0}")]
    Marshal(#[from] MarshalError),

    /// The method raised one of its declared errors
    #[error("Declared error: {0}")]
    Declared(DeclaredFailure),

    /// Any other failure reported by the remote side
    #[error("Remote error {kind}: {detail}")]
    Remote { kind: String, detail: String },

    /// No reply within the call timeout
    #[error("RPC request timed out")]
    Timeout,
}

impl RpcError {
    /// Taxonomy name, as used in logs.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::MalformedDescriptor(_) => "MalformedDescriptorError",
            Self::DuplicateHandler { .. } => "DuplicateHandlerError",
            Self::DuplicateService(_) => "DuplicateServiceError",
            Self::UnknownMethod { .. } => "UnknownMethodError",
            Self::UnboundMethod { .. } => "UnboundMethodError",
            Self::Arity { .. } => "ArityError",
            Self::Marshal(_) => "MarshalError",
            Self::Declared(failure) => failure.kind(),
            Self::Remote { kind, .. } => kind,
            Self::Timeout => "Timeout",
        }
    }

    /// The declared failure, if the method raised one of its declared errors.
    pub fn declared(&self) -> Option<&DeclaredFailure> {
        match self {
            Self::Declared(failure) => Some(failure),
            _ => None,
        }
    }

    /// True if this is the declared error `E`.
    pub fn is_declared<E: DeclaredError>(&self) -> bool {
        self.declared().is_some_and(DeclaredFailure::is::<E>)
    }
}

/// An error type a method may list as a named, expected outcome.
///
/// `KIND` is the identifier carried on the wire. `from_detail` rebuilds the
/// typed error on the calling side from the detail string.
pub trait DeclaredError: std::error::Error + Send + Sync + 'static {
    const KIND: &'static str;

    fn from_detail(detail: &str) -> Self;

    fn detail(&self) -> String {
        self.to_string()
    }
}

/// A declared error re-hydrated on the calling side.
pub struct DeclaredFailure {
    kind: String,
    detail: String,
    error: Box<dyn std::error::Error + Send + Sync>,
}

impl DeclaredFailure {
    pub(crate) fn new(
        kind: impl Into<String>,
        detail: impl Into<String>,
        error: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self {
            kind: kind.into(),
            detail: detail.into(),
            error,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// True if the re-hydrated error is an `E`.
    pub fn is<E: DeclaredError>(&self) -> bool {
        self.error.is::<E>()
    }

    pub fn downcast_ref<E: DeclaredError>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }

    /// Take the typed error out, or give the failure back if it is not an `E`.
    pub fn downcast<E: DeclaredError>(self) -> Result<E, Self> {
        let Self {
            kind,
            detail,
            error,
        } = self;
        match error.downcast::<E>() {
            Ok(error) => Ok(*error),
            Err(error) => Err(Self {
                kind,
                detail,
                error,
            }),
        }
    }
}

impl fmt::Debug for DeclaredFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredFailure")
            .field("kind", &self.kind)
            .field("detail", &self.detail)
            .finish()
    }
}

impl fmt::Display for DeclaredFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}
