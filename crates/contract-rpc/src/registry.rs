// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor registry.
//!
//! Builds [`ServiceDescriptor`]s from metadata fragments. Fragments (method
//! presence, parameter codecs, output, declared errors) may arrive in any
//! order and any of them may be attached more than once; each attachment is
//! an idempotent overwrite.
//!
//! There is no global state here. A service's descriptor is built once,
//! usually at startup, and handed by `Arc` to whatever builds dispatchers and
//! proxies. A [`Catalog`] groups finished descriptors for lookup and
//! introspection.

use crate::descriptor::{
    ErrorDescriptor, MethodDescriptor, OutputDescriptor, ParamDescriptor, ServiceDescriptor,
};
use crate::error::{RpcError, RpcResult};
use crate::marshal::Codec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Get a method entry, creating an empty one if it does not exist yet.
pub fn ensure_method<'a>(
    descriptor: &'a mut ServiceDescriptor,
    name: &str,
) -> &'a mut MethodDescriptor {
    let service = &descriptor.name;
    descriptor
        .methods
        .entry(name.to_string())
        .or_insert_with(|| {
            tracing::debug!("registry: declared method {}.{}", service, name);
            MethodDescriptor::new(name)
        })
}

/// Attach the codec for parameter `index`, overwriting any previous one.
///
/// Positions below `index` that have no metadata yet stay empty; the
/// descriptor fails validation until they are filled.
pub fn set_param(descriptor: &mut ServiceDescriptor, method: &str, index: usize, codec: Codec) {
    let entry = ensure_method(descriptor, method);
    if entry.params.len() <= index {
        entry.params.resize(index + 1, None);
    }
    entry.params[index] = Some(ParamDescriptor::new(index, codec));
}

/// Attach the output codec; `None` declares a method without return value.
pub fn set_output(descriptor: &mut ServiceDescriptor, method: &str, codec: Option<Codec>) {
    let entry = ensure_method(descriptor, method);
    entry.output = Some(match codec {
        Some(codec) => OutputDescriptor::value(codec),
        None => OutputDescriptor::none(),
    });
}

/// Attach the declared error set, replacing any previous one.
pub fn set_errors(descriptor: &mut ServiceDescriptor, method: &str, errors: ErrorDescriptor) {
    let entry = ensure_method(descriptor, method);
    entry.errors = Some(errors);
}

/// Fluent wrapper over the free functions above.
///
/// ```
/// use contract_rpc::marshal::{Codec, IdMarshaller, StringMarshaller};
/// use contract_rpc::registry::ServiceBuilder;
///
/// let descriptor = ServiceBuilder::new("Echo")
///     .param("echo", 0, Codec::of::<StringMarshaller>())
///     .output("echo", Codec::of::<StringMarshaller>())
///     .param("square", 0, Codec::of::<IdMarshaller>())
///     .output("square", Codec::of::<IdMarshaller>())
///     .build();
///
/// assert_eq!(descriptor.method_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    descriptor: ServiceDescriptor,
}

impl ServiceBuilder {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            descriptor: ServiceDescriptor::new(service_name),
        }
    }

    /// Continue building from an existing descriptor.
    pub fn from_descriptor(descriptor: ServiceDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn method(mut self, name: &str) -> Self {
        ensure_method(&mut self.descriptor, name);
        self
    }

    pub fn param(mut self, method: &str, index: usize, codec: Codec) -> Self {
        set_param(&mut self.descriptor, method, index, codec);
        self
    }

    pub fn output(mut self, method: &str, codec: Codec) -> Self {
        set_output(&mut self.descriptor, method, Some(codec));
        self
    }

    pub fn no_output(mut self, method: &str) -> Self {
        set_output(&mut self.descriptor, method, None);
        self
    }

    pub fn throws(mut self, method: &str, errors: ErrorDescriptor) -> Self {
        set_errors(&mut self.descriptor, method, errors);
        self
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Finish the declaration phase. Validation is deferred to dispatcher and
    /// proxy construction.
    pub fn build(self) -> Arc<ServiceDescriptor> {
        Arc::new(self.descriptor)
    }
}

/// Summary of one method, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    pub arity: usize,
    pub has_output: bool,
    pub errors: Vec<String>,
}

/// Summary of one service, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub methods: Vec<MethodInfo>,
}

impl From<&ServiceDescriptor> for ServiceInfo {
    fn from(descriptor: &ServiceDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            methods: descriptor
                .methods()
                .map(|m| MethodInfo {
                    name: m.name.clone(),
                    arity: m.arity(),
                    has_output: m.has_output(),
                    errors: m
                        .declared_errors()
                        .map(|e| e.kinds().map(str::to_string).collect())
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Finished descriptors, at most one per service name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    services: BTreeMap<String, Arc<ServiceDescriptor>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. A second descriptor for the same service name is
    /// rejected with [`RpcError::DuplicateService`].
    pub fn insert(&mut self, descriptor: Arc<ServiceDescriptor>) -> RpcResult<()> {
        if self.services.contains_key(&descriptor.name) {
            return Err(RpcError::DuplicateService(descriptor.name.clone()));
        }
        tracing::debug!("registry: cataloged service '{}'", descriptor.name);
        self.services.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, service_name: &str) -> Option<Arc<ServiceDescriptor>> {
        self.services.get(service_name).cloned()
    }

    /// List all cataloged services, sorted by name.
    pub fn list(&self) -> Vec<ServiceInfo> {
        self.services
            .values()
            .map(|d| ServiceInfo::from(d.as_ref()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
