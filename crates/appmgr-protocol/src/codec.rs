// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Byte encoding for protocol messages.
//!
//! Messages are JSON documents. Transports wrap these bytes however they
//! like; the only constraint enforced here is a size ceiling.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum encoded message size (4 MB).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Errors that can occur while encoding or decoding a message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Encoded message exceeds [`MAX_MESSAGE_SIZE`].
    #[error("message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    TooLarge(usize),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message to bytes.
pub fn encode<M: Serialize>(message: &M) -> Result<Vec<u8>, CodecError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge(bytes.len()));
    }
    Ok(bytes)
}

/// Decode a message from bytes.
pub fn decode<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, CodecError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge(bytes.len()));
    }
    Ok(serde_json::from_slice(bytes)?)
}
