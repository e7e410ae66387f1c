// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The demo library service: contract, implementation and typed client.

use contract_rpc::marshal::{ArrayOf, IdMarshaller, JsonMarshaller, StringMarshaller};
use contract_rpc::server::{no_return, returns};
use contract_rpc::{
    args, Codec, DeclaredError, ErrorDescriptor, MethodTable, Proxy, RpcResult, ServiceBuilder,
    ServiceDescriptor, ServiceImpl,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TestBookError(pub String);

impl DeclaredError for TestBookError {
    const KIND: &'static str = "TestBookError";

    fn from_detail(detail: &str) -> Self {
        Self(detail.to_string())
    }
}

/// Contract of the library service.
pub fn descriptor(service_name: &str) -> Arc<ServiceDescriptor> {
    ServiceBuilder::new(service_name)
        .output("getBooks", Codec::of::<ArrayOf<JsonMarshaller<Book>>>())
        .param("updateBook", 0, Codec::of::<IdMarshaller>())
        .param("updateBook", 1, Codec::of::<StringMarshaller>())
        .output("updateBook", Codec::of::<JsonMarshaller<Book>>())
        .throws("updateBook", ErrorDescriptor::new().declare::<TestBookError>())
        .no_output("ping")
        .build()
}

#[derive(Default)]
pub struct Library {
    books: RwLock<Vec<Book>>,
}

impl Library {
    fn books(&self) -> anyhow::Result<Vec<Book>> {
        let books = self
            .books
            .read()
            .map_err(|_| anyhow::anyhow!("library lock poisoned"))?;
        Ok(books.clone())
    }

    fn update(&self, id: i64, title: String) -> anyhow::Result<Book> {
        if id < 0 {
            return Err(TestBookError(format!("invalid book id {}", id)).into());
        }
        let mut books = self
            .books
            .write()
            .map_err(|_| anyhow::anyhow!("library lock poisoned"))?;
        let book = Book { id, title };
        match books.iter_mut().find(|b| b.id == id) {
            Some(existing) => *existing = book.clone(),
            None => books.push(book.clone()),
        }
        tracing::debug!("stored book {}", id);
        Ok(book)
    }
}

impl ServiceImpl for Library {
    fn bind(table: &mut MethodTable<Self>) {
        table
            .add("getBooks", |lib, _args| async move { Ok(returns(lib.books()?)) })
            .add("updateBook", |lib, mut args| async move {
                let id: i64 = args.take(0)?;
                let title: String = args.take(1)?;
                Ok(returns(lib.update(id, title)?))
            })
            .add("ping", |_lib, _args| async move { Ok(no_return()) });
    }
}

/// Typed calls over a library proxy.
pub struct LibraryClient {
    proxy: Proxy,
}

impl LibraryClient {
    pub fn new(proxy: Proxy) -> Self {
        Self { proxy }
    }

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
}
