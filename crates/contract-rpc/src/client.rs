// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Proxy (client side).
//!
//! The Proxy packs typed arguments, sends them through a [`Dispatcher`] and
//! turns the reply back into a typed result or a classified [`RpcError`].

use crate::config::ProxyConfig;
use crate::descriptor::{MethodDescriptor, ServiceDescriptor};
use crate::error::{RpcError, RpcResult};
use crate::marshal::{AnyValue, MarshalError};
use crate::server::Dispatcher;
use crate::types::{InputData, OutputData, WireError};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Build the positional argument vector for [`Proxy::call`].
///
/// ```
/// let args = contract_rpc::args![1i64, "title".to_string()];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::marshal::AnyValue>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$(::std::boxed::Box::new($arg) as $crate::marshal::AnyValue),+]
    };
}

/// Unmarshalled result of a call.
#[derive(Debug)]
pub struct Reply(Option<AnyValue>);

impl Reply {
    /// True for methods without output.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Take the result as a `T`.
    pub fn into_value<T: Any>(self) -> RpcResult<T> {
        let value = self
            .0
            .ok_or_else(|| MarshalError::new(type_name::<T>(), "call returned no value"))?;
        value
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| MarshalError::new(type_name::<T>(), "result has a different type").into())
    }
}

/// Client-side stand-in for a service, backed by a dispatcher.
///
/// # Example
///
/// ```
/// use contract_rpc::marshal::{Codec, StringMarshaller};
/// use contract_rpc::registry::ServiceBuilder;
/// use contract_rpc::server::{returns, MethodTable, ServiceImpl};
/// use contract_rpc::{args, Dispatcher, Proxy};
/// use std::sync::Arc;
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
///
/// # async fn example() -> contract_rpc::RpcResult<()> {
/// let descriptor = ServiceBuilder::new("Echo")
///     .param("echo", 0, Codec::of::<StringMarshaller>())
///     .output("echo", Codec::of::<StringMarshaller>())
///     .build();
/// let dispatcher = Arc::new(Dispatcher::build(descriptor.clone(), Arc::new(Echo))?);
/// let proxy = Proxy::new(descriptor, dispatcher)?;
///
/// let text: String = proxy.call("echo", args!["hi".to_string()]).await?.into_value()?;
/// assert_eq!(text, "hi");
/// # Ok(())
/// # }
/// ```
pub struct Proxy {
    descriptor: Arc<ServiceDescriptor>,
    dispatcher: Arc<Dispatcher>,
    default_timeout: Option<Duration>,
}

impl Proxy {
    /// Create a proxy with the default call timeout (10 seconds).
    pub fn new(descriptor: Arc<ServiceDescriptor>, dispatcher: Arc<Dispatcher>) -> RpcResult<Self> {
        Self::with_config(descriptor, dispatcher, &ProxyConfig::default())
    }

    /// Create a proxy with the timeout from `config`.
    pub fn with_config(
        descriptor: Arc<ServiceDescriptor>,
        dispatcher: Arc<Dispatcher>,
        config: &ProxyConfig,
    ) -> RpcResult<Self> {
        descriptor.validate()?;
        if dispatcher.service_name() != descriptor.name {
            tracing::warn!(
                "Proxy for '{}' bound to dispatcher '{}'",
                descriptor.name,
                dispatcher.service_name()
            );
        }
        tracing::info!(
            "Proxy for '{}' ready ({} method(s), timeout {:?})",
            descriptor.name,
            descriptor.method_count(),
            config.call_timeout()
        );
        Ok(Self {
            descriptor,
            dispatcher,
            default_timeout: config.call_timeout(),
        })
    }

    /// Call `method` with the default timeout.
    pub async fn call(&self, method: &str, args: Vec<AnyValue>) -> RpcResult<Reply> {
        self.call_with_timeout(method, args, self.default_timeout)
            .await
    }

    /// Call `method`, giving up after `timeout` (`None` waits indefinitely).
    ///
    /// Dropping the returned future cancels the call.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        args: Vec<AnyValue>,
        timeout: Option<Duration>,
    ) -> RpcResult<Reply> {
        let desc = self
            .descriptor
            .method(method)
            .ok_or_else(|| RpcError::UnknownMethod {
                service: self.descriptor.name.clone(),
                method: method.to_string(),
            })?;

        if args.len() != desc.arity() {
            return Err(RpcError::Arity {
                method: method.to_string(),
                expected: desc.arity(),
                actual: args.len(),
            });
        }

        let params = desc
            .params()
            .zip(&args)
            .map(|(param, arg)| param.codec.pack(&**arg))
            .collect::<Result<Vec<_>, _>>()?;

        let call = self.dispatcher.handle(method, InputData::new(params));
        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(
                        "{}.{}: no reply within {:?}",
                        self.descriptor.name,
                        method,
                        limit
                    );
                    return Err(RpcError::Timeout);
                }
            },
            None => call.await?,
        };

        self.unpack(desc, output)
    }

    fn unpack(&self, desc: &MethodDescriptor, output: OutputData) -> RpcResult<Reply> {
        if !output.is_ok() {
            let WireError { kind, detail } = output
                .error
                .unwrap_or_else(|| WireError::new("UnknownError", "error reply without error"));
            if let Some(failure) = desc
                .declared_errors()
                .and_then(|errors| errors.rehydrate(&kind, &detail))
            {
                return Err(RpcError::Declared(failure));
            }
            return Err(RpcError::Remote { kind, detail });
        }

        match desc.output_codec() {
            Some(codec) => {
                let data = output.data.ok_or_else(|| {
                    MarshalError::new(codec.value_type(), "reply carries no data")
                })?;
                Ok(Reply(Some(codec.extract(&data)?)))
            }
            None => Ok(Reply(None)),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        &self.descriptor
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.descriptor.method_names().collect();
        f.debug_struct("Proxy")
            .field("service_name", &self.descriptor.name)
            .field("methods", &methods)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::{Codec, IdMarshaller};
    use crate::registry::ServiceBuilder;
    use crate::types::UNDECLARED_ERROR_KIND;
    use serde_json::json;

    fn square_proxy() -> Proxy {
        let descriptor = ServiceBuilder::new("Math")
            .param("square", 0, Codec::of::<IdMarshaller>())
            .output("square", Codec::of::<IdMarshaller>())
            .no_output("reset")
            .build();
        let mut dispatcher = Dispatcher::new("Math");
        dispatcher
            .register_handler("square", |input: InputData| async move {
                let n = input.params[0].as_i64().unwrap_or_default();
                OutputData::ok(json!(n * n))
            })
            .expect("register");
        dispatcher
            .register_handler("reset", |_input: InputData| async move {
                OutputData::error(UNDECLARED_ERROR_KIND, "disk on fire")
            })
            .expect("register");
        Proxy::new(descriptor, Arc::new(dispatcher)).expect("proxy")
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let proxy = square_proxy();
        let reply = proxy.call("square", crate::args![7i64]).await.expect("call");
        assert_eq!(reply.into_value::<i64>().expect("i64"), 49);
    }

    #[tokio::test]
    async fn test_wrong_argument_type_never_reaches_dispatcher() {
        let proxy = square_proxy();
        let err = proxy
            .call("square", crate::args!["seven".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Marshal(_)));
        assert_eq!(proxy.dispatcher.calls_handled(), 0);
    }

    #[tokio::test]
    async fn test_undeclared_reply_is_remote_error() {
        let proxy = square_proxy();
        let err = proxy.call("reset", crate::args![]).await.unwrap_err();
        match err {
            RpcError::Remote { kind, detail } => {
                assert_eq!(kind, UNDECLARED_ERROR_KIND);
                assert_eq!(detail, "disk on fire");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn id_proxy(reply: OutputData) -> Proxy {
        let descriptor = ServiceBuilder::new("Ids")
            .output("next", Codec::of::<IdMarshaller>())
            .build();
        let mut dispatcher = Dispatcher::new("Ids");
        dispatcher
            .register_handler("next", move |_input: InputData| {
                let reply = reply.clone();
                async move { reply }
            })
            .expect("register");
        Proxy::new(descriptor, Arc::new(dispatcher)).expect("proxy")
    }

    #[tokio::test]
    async fn test_unextractable_reply_is_marshal_error() {
        let proxy = id_proxy(OutputData::ok(json!("nope")));
        let err = proxy.call("next", crate::args![]).await.unwrap_err();
        match err {
            RpcError::Marshal(e) => {
                assert_eq!(e.expected, "i64");
                assert!(e.detail.contains("nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reply_without_data_is_marshal_error() {
        let proxy = id_proxy(OutputData::ok_empty());
        let err = proxy.call("next", crate::args![]).await.unwrap_err();
        assert!(matches!(err, RpcError::Marshal(_)));
    }

    #[test]
    fn test_proxy_debug_lists_methods() {
        let text = format!("{:?}", square_proxy());
        assert!(text.contains("Math"));
        assert!(text.contains("square"));
        assert!(text.contains("reset"));
    }

    #[test]
    fn test_reply_conversion() {
        assert!(Reply(None).is_empty());
        assert!(Reply(None).into_value::<i64>().is_err());
        assert!(Reply(Some(Box::new(1i64))).into_value::<String>().is_err());
    }

    #[test]
    fn test_default_timeout_follows_config() {
        let proxy = square_proxy();
        assert_eq!(proxy.default_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(proxy.service_name(), "Math");
    }
}
