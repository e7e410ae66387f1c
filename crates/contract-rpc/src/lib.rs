// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Contract RPC: typed service contracts over a transport-neutral wire form
//!
//! A service is declared once as a [`ServiceDescriptor`] (method names,
//! ordered parameter codecs, output codec, declared error kinds). The same
//! descriptor then drives both ends of a call:
//! - **Dispatcher** (server side): extracts wire parameters, invokes the
//!   implementation and packs the result or a classified error
//! - **Proxy** (client side): packs typed arguments, sends them through a
//!   dispatcher and re-hydrates the reply
//!
//! # Data Flow
//!
//! ```text
//! Proxy::call ──pack──► InputData ──► Dispatcher::handle ──extract──► impl
//!      ▲                                                              │
//!      └──extract / re-hydrate ◄── OutputData ◄──pack / classify──────┘
//! ```
//!
//! # Error Kinds
//!
//! Failures inside a call never escape the dispatcher as panics or raised
//! errors. They come back as [`OutputData`] with one of:
//! - a kind the method declared (re-raised by the proxy as
//!   [`RpcError::Declared`])
//! - `MarshalError` for a parameter or result that does not fit its codec
//! - `UndeclaredError` for anything else (surfaced as [`RpcError::Remote`])

pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod marshal;
pub mod registry;
pub mod server;
pub mod types;

pub use client::{Proxy, Reply};
pub use config::{ConfigError, ProxyConfig, RpcConfig};
pub use descriptor::{
    ErrorDescriptor, MethodDescriptor, OutputDescriptor, ParamDescriptor, ServiceDescriptor,
};
pub use error::{DeclaredError, DeclaredFailure, RpcError, RpcResult};
pub use marshal::{Codec, MarshalError, Marshaller};
pub use registry::{Catalog, ServiceBuilder, ServiceInfo};
pub use server::{Dispatcher, Handler, MethodTable, ServiceImpl};
pub use types::{InputData, OutputData, OutputStatus, WireError};
