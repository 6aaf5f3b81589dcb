//! Core error types for the storage overlay node.
//!
//! Mirrors the teacher crate's `DfsError` shape: a flat enum of string-carrying
//! variants, a `Display` impl, and `From` conversions at the boundaries that
//! produce them (io, serde_json, hex, libp2p's kad record store).

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub enum DfsError {
    /// File system I/O failures: ID.json / Bootstrap.txt access, db file, etc.
    Io(String),
    /// libp2p connectivity, dialing, and stream failures.
    Network(String),
    /// Persistence-sink (SQLite) failures.
    Database(String),
    /// Invalid or missing configuration.
    Config(String),
    /// Malformed input on a wire protocol (bad JSON, missing fields).
    BadRequest(String),
    /// General cryptographic failures (AEAD, Shamir).
    Crypto(String),
    /// AEAD seal failure.
    Encryption(String),
    /// AEAD open failure (wrong key, tampered ciphertext).
    Decryption(String),
    /// Identity (keypair) generation, loading, or parsing failures.
    KeyManagement(String),
    /// Distributed storage operation failures (quorum, dispersal).
    Storage(String),
    /// Requested block/fragment not present in the persistence sink.
    FileNotFound(String),
    /// Failed to encode a value for storage or transmission.
    Serialization(String),
    /// Failed to decode a value read from storage or the wire.
    Deserialization(String),
    /// Base64/hex/multibase encoding failures.
    Encoding(String),
    /// General resource-not-found condition.
    NotFound(String),
    /// Catch-all.
    Generic(String),
}

impl fmt::Display for DfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfsError::Io(e) => write!(f, "IO error: {}", e),
            DfsError::Network(e) => write!(f, "Network error: {}", e),
            DfsError::Database(e) => write!(f, "Database error: {}", e),
            DfsError::Config(e) => write!(f, "Configuration error: {}", e),
            DfsError::BadRequest(e) => write!(f, "Bad request: {}", e),
            DfsError::Crypto(e) => write!(f, "Cryptographic error: {}", e),
            DfsError::Encryption(e) => write!(f, "Encryption error: {}", e),
            DfsError::Decryption(e) => write!(f, "Decryption error: {}", e),
            DfsError::KeyManagement(e) => write!(f, "Key management error: {}", e),
            DfsError::Storage(e) => write!(f, "Storage error: {}", e),
            DfsError::FileNotFound(e) => write!(f, "File not found: {}", e),
            DfsError::Serialization(e) => write!(f, "Serialization error: {}", e),
            DfsError::Deserialization(e) => write!(f, "Deserialization error: {}", e),
            DfsError::Encoding(e) => write!(f, "Encoding error: {}", e),
            DfsError::NotFound(e) => write!(f, "Not found: {}", e),
            DfsError::Generic(e) => write!(f, "Error: {}", e),
        }
    }
}

impl StdError for DfsError {}

impl From<std::io::Error> for DfsError {
    fn from(error: std::io::Error) -> Self {
        DfsError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for DfsError {
    fn from(error: serde_json::Error) -> Self {
        DfsError::Serialization(error.to_string())
    }
}

impl From<hex::FromHexError> for DfsError {
    fn from(error: hex::FromHexError) -> Self {
        DfsError::Serialization(format!("hex decode error: {}", error))
    }
}

impl From<rusqlite::Error> for DfsError {
    fn from(error: rusqlite::Error) -> Self {
        DfsError::Database(error.to_string())
    }
}

impl From<libp2p::kad::store::Error> for DfsError {
    fn from(error: libp2p::kad::store::Error) -> Self {
        DfsError::Network(format!("kademlia store error: {:?}", error))
    }
}

impl From<base64::DecodeError> for DfsError {
    fn from(error: base64::DecodeError) -> Self {
        DfsError::Encoding(format!("base64 decode error: {}", error))
    }
}

impl From<anyhow::Error> for DfsError {
    fn from(error: anyhow::Error) -> Self {
        DfsError::Generic(error.to_string())
    }
}

pub type DfsResult<T> = Result<T, DfsError>;
