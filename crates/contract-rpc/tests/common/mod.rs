// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared library service fixture for the integration tests.

#![allow(dead_code)]

use contract_rpc::marshal::{
    ArrayOf, BoolMarshaller, IdMarshaller, JsonMarshaller, StringMarshaller,
};
use contract_rpc::server::{no_return, returns};
use contract_rpc::{
    args, Codec, DeclaredError, Dispatcher, ErrorDescriptor, MethodTable, Proxy, ProxyConfig,
    RpcResult, ServiceBuilder, ServiceDescriptor, ServiceImpl,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub const SERVICE: &str = "LibraryService";

/// Id that makes `updateBook` raise `TestBookError`.
pub const REJECTED_ID: i64 = -1;
/// Id that makes `updateBook` fail with an undeclared error.
pub const OFFLINE_ID: i64 = 0;
/// Id that makes `updateBook` panic.
pub const PANIC_ID: i64 = 13;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot update book: {0}")]
pub struct TestBookError(pub String);

impl DeclaredError for TestBookError {
    const KIND: &'static str = "TestBookError";

    fn from_detail(detail: &str) -> Self {
        Self(detail.to_string())
    }

    fn detail(&self) -> String {
        self.0.clone()
    }
}

/// In-memory library. `invocations` counts every method entry.
#[derive(Default)]
pub struct LibraryServer {
    books: Mutex<Vec<Book>>,
    invocations: AtomicUsize,
}

impl LibraryServer {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.invocations.fetch_add(1, Ordering::SeqCst);
    }

    fn books(&self) -> Vec<Book> {
        self.books.lock().map(|b| b.clone()).unwrap_or_default()
    }

    fn update(&self, id: i64, title: String) -> anyhow::Result<Book> {
        match id {
            REJECTED_ID => Err(TestBookError(format!("no book with id {}", id)).into()),
            OFFLINE_ID => anyhow::bail!("storage offline"),
            PANIC_ID => panic!("book {} is cursed", id),
            _ => {
                let book = Book { id, title };
                let mut books = self
                    .books
                    .lock()
                    .map_err(|_| anyhow::anyhow!("library lock poisoned"))?;
                books.retain(|b| b.id != id);
                books.push(book.clone());
                Ok(book)
            }
        }
    }
}

impl ServiceImpl for LibraryServer {
    fn bind(table: &mut MethodTable<Self>) {
        table
            .add("getBooks", |svc, _args| async move {
                svc.enter();
                Ok(returns(svc.books()))
            })
            .add("updateBook", |svc, mut args| async move {
                svc.enter();
                let id: i64 = args.take(0)?;
                let title: String = args.take(1)?;
                Ok(returns(svc.update(id, title)?))
            })
            .add("ping", |svc, _args| async move {
                svc.enter();
                Ok(no_return())
            })
            .add("wait", |svc, mut args| async move {
                svc.enter();
                let ms: i64 = args.take(0)?;
                tokio::time::sleep(Duration::from_millis(ms.max(0) as u64)).await;
                Ok(returns(true))
            });
    }
}

/// Descriptor for the library service.
pub fn library_descriptor() -> Arc<ServiceDescriptor> {
    ServiceBuilder::new(SERVICE)
        .output("getBooks", Codec::of::<ArrayOf<JsonMarshaller<Book>>>())
        .param("updateBook", 0, Codec::of::<IdMarshaller>())
        .param("updateBook", 1, Codec::of::<StringMarshaller>())
        .output("updateBook", Codec::of::<JsonMarshaller<Book>>())
        .throws("updateBook", ErrorDescriptor::new().declare::<TestBookError>())
        .no_output("ping")
        .param("wait", 0, Codec::of::<IdMarshaller>())
        .output("wait", Codec::of::<BoolMarshaller>())
        .build()
}

/// Server, dispatcher and proxy wired together.
pub struct Library {
    pub server: Arc<LibraryServer>,
    pub dispatcher: Arc<Dispatcher>,
    pub proxy: Proxy,
}

impl Library {
    pub fn new() -> Self {
        Self::with_config(&ProxyConfig::default())
    }

    pub fn with_config(config: &ProxyConfig) -> Self {
        let descriptor = library_descriptor();
        let server = Arc::new(LibraryServer::default());
        let dispatcher = Arc::new(
            Dispatcher::build(descriptor.clone(), server.clone()).expect("dispatcher"),
        );
        let proxy = Proxy::with_config(descriptor, dispatcher.clone(), config).expect("proxy");
        Self {
            server,
            dispatcher,
            proxy,
        }
    }

    /// Typed view of the proxy.
    pub fn client(&self) -> LibraryClient<'_> {
        LibraryClient { proxy: &self.proxy }
    }
}

/// Typed calling surface mirroring the service methods.
pub struct LibraryClient<'a> {
    proxy: &'a Proxy,
}

impl LibraryClient<'_> {
    pub async fn get_books(&self) -> RpcResult<Vec<Book>> {
        self.proxy.call("getBooks", args![]).await?.into_value()
    }

    pub async fn update_book(&self, id: i64, title: &str) -> RpcResult<Book> {
        self.proxy
            .call("updateBook", args![id, title.to_string()])
            .await?
            .into_value()
    }

    pub async fn ping(&self) -> RpcResult<()> {
        self.proxy.call("ping", args![]).await.map(|_| ())
    }

    pub async fn wait(&self, ms: i64) -> RpcResult<bool> {
        self.proxy.call("wait", args![ms]).await?.into_value()
    }
}
