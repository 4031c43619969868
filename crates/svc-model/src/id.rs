//! `Id` is a sum over the two backend-native identity representations: a
//! 24-hex string (document backend) or a positive integer (relational
//! backend). On the wire it is always a string; `Id`'s `Deserialize`
//! accepts either representation permissively, the way `ModelSpec::decode`
//! is specified to.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use svc_errors::ServiceError;

/// Backend-chosen entity identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Id {
    /// 24-hex-character string, as produced by the document backend.
    Document(String),
    /// Positive integer identity, as produced by the relational backend.
    Relational(i64),
}

impl Id {
    /// Parse a raw wire string as a document-backend id. Fails
    /// `ErrorKind::BadRequest` if it is not exactly 24 lowercase hex chars.
    pub fn parse_document(raw: &str) -> Result<Self, ServiceError> {
        if raw.len() == 24 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Id::Document(raw.to_ascii_lowercase()))
        } else {
            Err(ServiceError::bad_request(format!(
                "malformed document id: {raw}"
            )))
        }
    }

    /// Parse a raw wire string as a relational-backend id. Fails
    /// `ErrorKind::BadRequest` if it is not a positive integer.
    pub fn parse_relational(raw: &str) -> Result<Self, ServiceError> {
        match raw.parse::<i64>() {
            Ok(n) if n > 0 => Ok(Id::Relational(n)),
            _ => Err(ServiceError::bad_request(format!(
                "malformed relational id: {raw}"
            ))),
        }
    }

    /// Permissive parse used by `decode`: try document-hex first, then a
    /// positive integer.
    pub fn parse_permissive(raw: &str) -> Result<Self, ServiceError> {
        Self::parse_document(raw).or_else(|_| Self::parse_relational(raw))
    }

    /// Generate a fresh random 24-hex document id (analogue of a native
    /// 12-byte object id, rendered as hex).
    #[must_use]
    pub fn new_document() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Id::Document(hex::encode(bytes))
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&str> {
        match self {
            Id::Document(s) => Some(s),
            Id::Relational(_) => None,
        }
    }

    #[must_use]
    pub fn as_relational(&self) -> Option<i64> {
        match self {
            Id::Relational(n) => Some(*n),
            Id::Document(_) => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Document(s) => write!(f, "{s}"),
            Id::Relational(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Id::parse_permissive(&raw).map_err(|e| DeError::custom(e.to_string()))
    }
}

/// A backend's strict id parser, used by the controller to translate the
/// path `:id` segment before invoking the service.
pub trait IdSchema: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Id, ServiceError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentIdSchema;

impl IdSchema for DocumentIdSchema {
    fn parse(&self, raw: &str) -> Result<Id, ServiceError> {
        Id::parse_document(raw)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelationalIdSchema;

impl IdSchema for RelationalIdSchema {
    fn parse(&self, raw: &str) -> Result<Id, ServiceError> {
        Id::parse_relational(raw)
    }
}
