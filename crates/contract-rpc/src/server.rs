// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatcher (server side).
//!
//! A [`Dispatcher`] exposes one name-addressed call surface,
//! [`Dispatcher::handle`], backed by one [`Handler`] per method. Handlers built
//! by [`Dispatcher::build`] close over the service descriptor and the
//! implementation, and turn every outcome of a call into an [`OutputData`]:
//! marshal failures, declared errors, undeclared errors and even panics come
//! back as error replies, never as a raised condition.
//!
//! Implementations expose their methods through [`ServiceImpl::bind`], which
//! fills a [`MethodTable`] mapping method names to typed async functions.

use crate::descriptor::{MethodDescriptor, ServiceDescriptor};
use crate::error::{RpcError, RpcResult};
use crate::marshal::AnyValue;
use crate::types::{InputData, OutputData, MARSHAL_ERROR_KIND, UNDECLARED_ERROR_KIND};
use anyhow::anyhow;
use async_trait::async_trait;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;

/// Handler for one method's wire-level calls.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handle a call. Failures are reported in the returned [`OutputData`].
    async fn call(&self, input: InputData) -> OutputData;
}

/// A function-based handler.
#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(InputData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OutputData> + Send + 'static,
{
    async fn call(&self, input: InputData) -> OutputData {
        self(input).await
    }
}

/// What an implementation method hands back: its result, or `None` for
/// methods without output.
pub type Returned = Option<AnyValue>;

/// Wrap a method result.
pub fn returns<T: Send + 'static>(value: T) -> Returned {
    Some(Box::new(value))
}

/// Result of a method without output.
pub fn no_return() -> Returned {
    None
}

/// Future returned by a bound implementation method.
pub type MethodFuture = Pin<Box<dyn Future<Output = anyhow::Result<Returned>> + Send>>;

type MethodFn<S> = Arc<dyn Fn(Arc<S>, Args) -> MethodFuture + Send + Sync>;

/// Extracted arguments of one call, in call-signature order.
pub struct Args {
    method: String,
    values: Vec<Option<AnyValue>>,
}

impl Args {
    fn new(method: &str, values: Vec<AnyValue>) -> Self {
        Self {
            method: method.to_string(),
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Move argument `index` out as a `T`.
    ///
    /// Fails if the index is out of range, the argument was already taken, or
    /// the parameter codec produces a different type.
    pub fn take<T: Any>(&mut self, index: usize) -> anyhow::Result<T> {
        let value = self
            .values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| anyhow!("{}: argument {} is missing", self.method, index))?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            anyhow!(
                "{}: argument {} is not a {}",
                self.method,
                index,
                type_name::<T>()
            )
        })
    }
}

/// Name to function mapping filled by [`ServiceImpl::bind`].
pub struct MethodTable<S> {
    methods: HashMap<String, MethodFn<S>>,
}

impl<S: Send + Sync + 'static> MethodTable<S> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Bind `name` to an async function of the implementation.
    ///
    /// Binding the same name again replaces the earlier function.
    pub fn add<F, Fut>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Arc<S>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Returned>> + Send + 'static,
    {
        let f: MethodFn<S> = Arc::new(move |service, args| Box::pin(f(service, args)));
        self.methods.insert(name.to_string(), f);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn get(&self, name: &str) -> Option<MethodFn<S>> {
        self.methods.get(name).cloned()
    }
}

impl<S: Send + Sync + 'static> Default for MethodTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A concrete service implementation that can be served by a [`Dispatcher`].
///
/// ```
/// use contract_rpc::server::{returns, MethodTable, ServiceImpl};
///
/// struct Echo;
///
/// impl ServiceImpl for Echo {
///     fn bind(table: &mut MethodTable<Self>) {
///         table.add("echo", |_svc, mut args| async move {
///             let text: String = args.take(0)?;
///             Ok(returns(text))
///         });
///     }
/// }
/// ```
pub trait ServiceImpl: Send + Sync + Sized + 'static {
    /// Register one function per descriptor method.
    fn bind(table: &mut MethodTable<Self>);
}

/// Handler produced by [`Dispatcher::build`] for one descriptor method.
struct BoundMethod<S> {
    descriptor: Arc<ServiceDescriptor>,
    method: String,
    service: Arc<S>,
    func: MethodFn<S>,
}

impl<S: Send + Sync + 'static> BoundMethod<S> {
    async fn invoke(&self, method: &MethodDescriptor, input: InputData) -> OutputData {
        if input.params.len() != method.arity() {
            tracing::warn!(
                "{}.{}: expected {} parameter(s), got {}",
                self.descriptor.name,
                self.method,
                method.arity(),
                input.params.len()
            );
            return OutputData::error(
                MARSHAL_ERROR_KIND,
                format!(
                    "expected {} parameter(s), got {}",
                    method.arity(),
                    input.params.len()
                ),
            );
        }

        let mut values = Vec::with_capacity(method.arity());
        for (param, wire) in method.params().zip(&input.params) {
            match param.codec.extract(wire) {
                Ok(value) => values.push(value),
                Err(e) => {
                    tracing::warn!(
                        "{}.{}: cannot extract parameter {}: {}",
                        self.descriptor.name,
                        self.method,
                        param.index,
                        e
                    );
                    return OutputData::error(
                        MARSHAL_ERROR_KIND,
                        format!("parameter {}: {}", param.index, e),
                    );
                }
            }
        }

        let args = Args::new(&self.method, values);
        match (self.func)(self.service.clone(), args).await {
            Ok(returned) => self.pack_result(method, returned),
            Err(err) => self.classify(method, &err),
        }
    }

    fn pack_result(&self, method: &MethodDescriptor, returned: Returned) -> OutputData {
        let Some(codec) = method.output_codec() else {
            return OutputData::ok_empty();
        };
        let Some(value) = returned else {
            tracing::warn!(
                "{}.{}: implementation returned no value",
                self.descriptor.name,
                self.method
            );
            return OutputData::error(MARSHAL_ERROR_KIND, "result: no value returned");
        };
        match codec.pack(&*value) {
            Ok(data) => OutputData::ok(data),
            Err(e) => {
                tracing::warn!(
                    "{}.{}: cannot pack result: {}",
                    self.descriptor.name,
                    self.method,
                    e
                );
                OutputData::error(MARSHAL_ERROR_KIND, format!("result: {}", e))
            }
        }
    }

    fn classify(&self, method: &MethodDescriptor, err: &anyhow::Error) -> OutputData {
        if let Some((kind, detail)) = method.declared_errors().and_then(|e| e.classify(err)) {
            tracing::debug!(
                "{}.{}: declared error {}: {}",
                self.descriptor.name,
                self.method,
                kind,
                detail
            );
            return OutputData::error(kind, detail);
        }
        tracing::warn!(
            "{}.{}: undeclared error: {:#}",
            self.descriptor.name,
            self.method,
            err
        );
        OutputData::error(UNDECLARED_ERROR_KIND, format!("{:#}", err))
    }
}

#[async_trait]
impl<S: Send + Sync + 'static> Handler for BoundMethod<S> {
    async fn call(&self, input: InputData) -> OutputData {
        match self.descriptor.method(&self.method) {
            Some(method) => self.invoke(method, input).await,
            None => OutputData::error(
                UNDECLARED_ERROR_KIND,
                format!("{} is not in the descriptor", self.method),
            ),
        }
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Name-addressed call surface for one service.
///
/// # Example
///
/// ```
/// use contract_rpc::types::{InputData, OutputData};
/// use contract_rpc::Dispatcher;
///
/// # async fn example() -> contract_rpc::RpcResult<()> {
/// let mut dispatcher = Dispatcher::new("Echo");
/// dispatcher.register_handler("echo", |input: InputData| async move {
///     OutputData::ok(input.params[0].clone())
/// })?;
///
/// let reply = dispatcher
///     .handle("echo", InputData::new(vec!["hi".into()]))
///     .await?;
/// assert!(reply.is_ok());
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    service_name: String,
    handlers: HashMap<String, Arc<dyn Handler>>,
    calls_handled: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher with no handlers.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            handlers: HashMap::new(),
            calls_handled: AtomicU64::new(0),
        }
    }

    /// Bind a descriptor to an implementation.
    ///
    /// Validates the descriptor, then registers one handler per descriptor
    /// method. Fails with [`RpcError::UnboundMethod`] if the implementation
    /// does not provide one of the methods.
    pub fn build<S: ServiceImpl>(
        descriptor: Arc<ServiceDescriptor>,
        service: Arc<S>,
    ) -> RpcResult<Self> {
        descriptor.validate()?;

        let mut table = MethodTable::new();
        S::bind(&mut table);

        let mut dispatcher = Self::new(descriptor.name.clone());
        for name in descriptor.method_names() {
            let func = table.get(name).ok_or_else(|| RpcError::UnboundMethod {
                service: descriptor.name.clone(),
                method: name.to_string(),
            })?;
            dispatcher.register_handler(
                name,
                BoundMethod {
                    descriptor: descriptor.clone(),
                    method: name.to_string(),
                    service: service.clone(),
                    func,
                },
            )?;
        }

        tracing::info!(
            "Dispatcher '{}' ready with {} handler(s)",
            dispatcher.service_name,
            dispatcher.handler_count()
        );
        Ok(dispatcher)
    }

    /// Register a handler for `method`.
    ///
    /// Fails with [`RpcError::DuplicateHandler`] if one is already registered.
    pub fn register_handler<H: Handler>(&mut self, method: &str, handler: H) -> RpcResult<()> {
        if self.handlers.contains_key(method) {
            return Err(RpcError::DuplicateHandler {
                service: self.service_name.clone(),
                method: method.to_string(),
            });
        }
        tracing::debug!("Dispatcher '{}': registered {}", self.service_name, method);
        self.handlers.insert(method.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Dispatch a call.
    ///
    /// Fails only with [`RpcError::UnknownMethod`]; every other outcome is an
    /// [`OutputData`]. The handler runs as its own task, so a panicking
    /// implementation is reported as an undeclared error. Dropping the returned
    /// future aborts the call.
    ///
    /// # Panics
    ///
    /// Panics if polled outside a Tokio runtime, since each call is spawned as
    /// a Tokio task.
    pub async fn handle(&self, method: &str, input: InputData) -> RpcResult<OutputData> {
        let handler = self
            .handlers
            .get(method)
            .cloned()
            .ok_or_else(|| RpcError::UnknownMethod {
                service: self.service_name.clone(),
                method: method.to_string(),
            })?;

        tracing::debug!(
            "Dispatcher '{}': call {} with {} parameter(s)",
            self.service_name,
            method,
            input.params.len()
        );

        let task = tokio::spawn(async move { handler.call(input).await });
        let _abort = AbortOnDrop(task.abort_handle());
        let output = match task.await {
            Ok(output) => output,
            Err(e) => {
                let detail = if e.is_panic() {
                    "handler panicked"
                } else {
                    "handler task cancelled"
                };
                tracing::error!("Dispatcher '{}': {} in {}", self.service_name, detail, method);
                OutputData::error(UNDECLARED_ERROR_KIND, detail)
            }
        };

        self.calls_handled.fetch_add(1, Ordering::Relaxed);
        Ok(output)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Number of calls that reached a handler.
    pub fn calls_handled(&self) -> u64 {
        self.calls_handled.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("service_name", &self.service_name)
            .field("methods", &methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(input: InputData) -> impl Future<Output = OutputData> {
        async move {
            match input.params.into_iter().next() {
                Some(first) => OutputData::ok(first),
                None => OutputData::ok_empty(),
            }
        }
    }

    #[tokio::test]
    async fn test_closure_handler_round_trip() {
        let mut dispatcher = Dispatcher::new("Echo");
        dispatcher.register_handler("echo", echo).expect("register");

        let out = dispatcher
            .handle("echo", InputData::new(vec![json!("hi")]))
            .await
            .expect("handle");
        assert_eq!(out, OutputData::ok(json!("hi")));
        assert_eq!(dispatcher.calls_handled(), 1);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut dispatcher = Dispatcher::new("Echo");
        dispatcher.register_handler("echo", echo).expect("register");
        let err = dispatcher.register_handler("echo", echo).unwrap_err();
        assert!(matches!(err, RpcError::DuplicateHandler { ref method, .. } if method == "echo"));
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_method_is_an_error_not_a_panic() {
        let dispatcher = Dispatcher::new("Echo");
        let err = dispatcher
            .handle("missing", InputData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::UnknownMethod { ref method, .. } if method == "missing"));
        assert_eq!(dispatcher.calls_handled(), 0);
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_undeclared_error() {
        let mut dispatcher = Dispatcher::new("Boom");
        dispatcher
            .register_handler("boom", |_input: InputData| async move {
                if true {
                    panic!("boom");
                }
                OutputData::ok_empty()
            })
            .expect("register");

        let out = dispatcher
            .handle("boom", InputData::default())
            .await
            .expect("handle");
        assert_eq!(out.error_kind(), Some(UNDECLARED_ERROR_KIND));
    }

    #[test]
    #[should_panic]
    fn test_handle_requires_tokio_runtime() {
        struct NoopWake;

        impl std::task::Wake for NoopWake {
            fn wake(self: Arc<Self>) {}
        }

        let mut dispatcher = Dispatcher::new("Echo");
        dispatcher.register_handler("echo", echo).expect("register");

        let waker = std::task::Waker::from(Arc::new(NoopWake));
        let mut cx = std::task::Context::from_waker(&waker);
        let mut call = Box::pin(dispatcher.handle("echo", InputData::default()));
        let _ = call.as_mut().poll(&mut cx);
    }

    #[test]
    fn test_args_take_checks_type_and_presence() {
        let mut args = Args::new("m", crate::args![5i64, "x".to_string()]);
        assert_eq!(args.len(), 2);
        assert!(args.take::<String>(0).is_err());

        let mut args = Args::new("m", crate::args![5i64]);
        assert_eq!(args.take::<i64>(0).expect("i64"), 5);
        assert!(args.take::<i64>(0).is_err());
        assert!(args.take::<i64>(3).is_err());
    }

    #[test]
    fn test_method_table_bindings() {
        struct Nothing;
        let mut table = MethodTable::<Nothing>::new();
        table
            .add("a", |_svc, _args| async move { Ok(no_return()) })
            .add("b", |_svc, _args| async move { Ok(returns(1i64)) });
        assert!(table.contains("a"));
        assert!(!table.contains("c"));
        assert_eq!(table.len(), 2);
    }
}
