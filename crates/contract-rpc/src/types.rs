// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport-neutral request/reply types.
//!
//! These are what a transport carries between a [`Proxy`](crate::Proxy) and a
//! [`Dispatcher`](crate::Dispatcher). They derive serde so any transport can
//! put them on the wire as-is.

use crate::marshal::WireValue;
use serde::{Deserialize, Serialize};

/// Wire kind reported when a parameter or result fails to marshal.
pub const MARSHAL_ERROR_KIND: &str = "MarshalError";

/// Wire kind reported for any failure the method did not declare.
pub const UNDECLARED_ERROR_KIND: &str = "UndeclaredError";

/// Kinds owned by the dispatch layer; services may not declare them.
pub const RESERVED_ERROR_KINDS: &[&str] = &[MARSHAL_ERROR_KIND, UNDECLARED_ERROR_KIND];

/// Request payload: packed arguments in call-signature order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputData {
    pub params: Vec<WireValue>,
}

impl InputData {
    pub fn new(params: Vec<WireValue>) -> Self {
        Self { params }
    }
}

/// Outcome of a dispatched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputStatus {
    /// The method completed normally
    #[default]
    Ok,
    /// The call failed; see [`OutputData::error`]
    Error,
}

/// Classified failure carried in an error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Declared kind identifier, or one of the reserved kinds
    pub kind: String,
    /// Human readable detail
    pub detail: String,
}

impl WireError {
    pub fn new(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    /// True for the kinds the dispatch layer itself produces.
    pub fn is_reserved(&self) -> bool {
        RESERVED_ERROR_KINDS.contains(&self.kind.as_str())
    }
}

/// Reply payload.
///
/// `data` is only ever set on success for methods that declare an output;
/// `error` is set exactly when `status` is [`OutputStatus::Error`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputData {
    pub status: OutputStatus,
    pub data: Option<WireValue>,
    pub error: Option<WireError>,
}

impl OutputData {
    /// Successful reply carrying a packed result.
    pub fn ok(data: WireValue) -> Self {
        Self {
            status: OutputStatus::Ok,
            data: Some(data),
            error: None,
        }
    }

    /// Successful reply for a method without output.
    pub fn ok_empty() -> Self {
        Self {
            status: OutputStatus::Ok,
            data: None,
            error: None,
        }
    }

    /// Error reply.
    pub fn error(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: OutputStatus::Error,
            data: None,
            error: Some(WireError::new(kind, detail)),
        }
    }

    /// Check if this reply indicates success
    pub fn is_ok(&self) -> bool {
        self.status == OutputStatus::Ok
    }

    /// Error kind, if this is an error reply.
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_reply_shape() {
        let out = OutputData::ok(json!([]));
        assert!(out.is_ok());
        assert_eq!(out.data, Some(json!([])));
        assert!(out.error.is_none());
        assert_eq!(out.error_kind(), None);
    }

    #[test]
    fn test_error_reply_shape() {
        let out = OutputData::error(MARSHAL_ERROR_KIND, "bad id");
        assert!(!out.is_ok());
        assert!(out.data.is_none());
        assert_eq!(out.error_kind(), Some(MARSHAL_ERROR_KIND));
        assert!(out.error.as_ref().is_some_and(WireError::is_reserved));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let text = serde_json::to_string(&OutputData::ok_empty()).expect("serialize");
        assert!(text.contains("\"OK\""));
        let back: OutputData = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, OutputData::ok_empty());
    }

    #[test]
    fn test_declared_kind_is_not_reserved() {
        assert!(!WireError::new("TestBookError", "").is_reserved());
    }
}
