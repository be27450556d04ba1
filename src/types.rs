//! Wire records exchanged with the ledger node.
//!
//! These mirror the node's JSON-RPC schema closely and are otherwise opaque to
//! the client; only the handful of fields the game logic reads are typed.

use crate::error::ClientError;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};
use std::{
    fmt,
    str::FromStr,
};

pub const ADDRESS_LENGTH: usize = 32;
pub const DIGEST_LENGTH: usize = 32;
pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

fn normalize_hex_id(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.is_empty() || body.len() > ADDRESS_LENGTH * 2 {
        return Err(ClientError::validation(format!(
            "'{raw}' is not a {ADDRESS_LENGTH}-byte hex identifier"
        )));
    }
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ClientError::validation(format!(
            "'{raw}' contains non-hex characters"
        )));
    }
    Ok(format!(
        "0x{:0>width$}",
        body.to_ascii_lowercase(),
        width = ADDRESS_LENGTH * 2
    ))
}

macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
                Self(format!("0x{}", hex::encode(bytes)))
            }
        }

        impl FromStr for $name {
            type Err = ClientError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                normalize_hex_id(raw).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ClientError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                raw.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

hex_identifier!(
    /// Account address, `0x` followed by 64 lowercase hex characters.
    Address
);
hex_identifier!(
    /// Identifier of an on-chain object or package.
    ObjectId
);

/// Base58 encoded 32-byte transaction digest.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionDigest(String);

impl TransactionDigest {
    pub fn from_bytes(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransactionDigest {
    type Err = ClientError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(raw.trim()).into_vec().map_err(|e| {
            ClientError::validation(format!("'{raw}' is not a base58 digest: {e}"))
        })?;
        if bytes.len() != DIGEST_LENGTH {
            return Err(ClientError::validation(format!(
                "digest '{raw}' decodes to {} bytes, expected {DIGEST_LENGTH}",
                bytes.len()
            )));
        }
        Ok(Self(raw.trim().to_string()))
    }
}

impl TryFrom<String> for TransactionDigest {
    type Error = ClientError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<TransactionDigest> for String {
    fn from(digest: TransactionDigest) -> String {
        digest.0
    }
}

impl fmt::Display for TransactionDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TransactionDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionDigest({})", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub coin_type: String,
    #[serde(default)]
    pub coin_object_count: u64,
    /// Decimal string; may exceed `u64`.
    pub total_balance: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub coin_type: String,
    pub coin_object_id: ObjectId,
    pub version: String,
    pub digest: String,
    pub balance: String,
    #[serde(default)]
    pub previous_transaction: Option<TransactionDigest>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T, C> {
    pub data: Vec<T>,
    pub next_cursor: Option<C>,
    #[serde(default)]
    pub has_next_page: bool,
}

impl<T, C> Page<T, C> {
    pub fn single(data: Vec<T>) -> Self {
        Self {
            data,
            next_cursor: None,
            has_next_page: false,
        }
    }
}

/// Which parts of an object the node should include in its response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDataOptions {
    pub show_type: bool,
    pub show_owner: bool,
    pub show_content: bool,
    pub show_previous_transaction: bool,
}

impl ObjectDataOptions {
    pub fn with_content() -> Self {
        Self {
            show_type: true,
            show_owner: true,
            show_content: true,
            show_previous_transaction: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResponse {
    #[serde(default)]
    pub data: Option<ObjectData>,
    #[serde(default)]
    pub error: Option<ObjectResponseError>,
}

impl ObjectResponse {
    /// Collapses the node's data-or-error envelope into a typed result.
    pub fn into_result(self, requested: &ObjectId) -> Result<ObjectData, ClientError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(err)) => Err(ClientError::not_found(format!(
                "object {requested}: {}",
                err.code
            ))),
            (None, None) => Err(ClientError::not_found(format!("object {requested}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectResponseError {
    pub code: String,
    #[serde(default)]
    pub object_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    pub object_id: ObjectId,
    pub version: String,
    pub digest: String,
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub owner: Option<Value>,
    #[serde(default)]
    pub content: Option<ObjectContent>,
}

impl ObjectData {
    pub fn move_fields(&self) -> Option<&Map<String, Value>> {
        match &self.content {
            Some(ObjectContent::MoveObject { fields, .. }) => Some(fields),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dataType", rename_all = "camelCase")]
pub enum ObjectContent {
    MoveObject {
        #[serde(rename = "type")]
        object_type: String,
        #[serde(default, rename = "hasPublicTransfer")]
        has_public_transfer: bool,
        fields: Map<String, Value>,
    },
    Package {
        #[serde(default)]
        disassembled: Value,
    },
}

/// One element of the game info `zombies` vector, kept as the node sent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZombieRecord(Value);

impl ZombieRecord {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Nested Move structs arrive as `{ "type": .., "fields": { .. } }`; flat
    /// records are accepted too.
    pub fn owner(&self) -> Option<&str> {
        let fields = self.0.get("fields").unwrap_or(&self.0);
        fields.get("zombie_owner").and_then(Value::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectChangeKind {
    Created,
    Mutated,
    Deleted,
    Published,
    Transferred,
    Wrapped,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChange {
    #[serde(rename = "type")]
    pub kind: ObjectChangeKind,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_id: Option<ObjectId>,
    #[serde(default)]
    pub package_id: Option<ObjectId>,
    #[serde(default)]
    pub sender: Option<Address>,
}

impl ObjectChange {
    pub fn is_created(&self, object_type: &str) -> bool {
        self.kind == ObjectChangeKind::Created
            && self.object_type.as_deref() == Some(object_type)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventId {
    pub tx_digest: TransactionDigest,
    pub event_seq: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub package_id: ObjectId,
    pub transaction_module: String,
    pub sender: Address,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub parsed_json: Value,
    #[serde(default)]
    pub timestamp_ms: Option<String>,
}

/// Event selector, serialized in the node's externally tagged form, e.g.
/// `{"MoveEventType": "0x2::display::DisplayCreated<..>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    MoveEventType(String),
    MoveModule { package: ObjectId, module: String },
    Transaction(TransactionDigest),
    Sender(Address),
    Package(ObjectId),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlockOptions {
    pub show_input: bool,
    pub show_effects: bool,
    pub show_events: bool,
    pub show_object_changes: bool,
}

impl TransactionBlockOptions {
    pub fn full() -> Self {
        Self {
            show_input: false,
            show_effects: true,
            show_events: true,
            show_object_changes: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Failure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: StatusKind,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlock {
    pub digest: TransactionDigest,
    #[serde(default)]
    pub effects: Option<TransactionEffects>,
    #[serde(default)]
    pub events: Option<Vec<Event>>,
    #[serde(default)]
    pub object_changes: Option<Vec<ObjectChange>>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: Value,
    pub digest: String,
}

/// Transaction bytes built by the node, base64 encoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBytes {
    pub tx_bytes: String,
    #[serde(default)]
    pub gas: Vec<ObjectRef>,
    #[serde(default)]
    pub input_objects: Vec<Value>,
}

/// Outcome of a submitted transaction. The node-reported digest and status
/// are surfaced as-is; checking them against expectations is up to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionResult {
    pub local_digest: TransactionDigest,
    pub block: TransactionBlock,
}

impl ExecutionResult {
    pub fn digest(&self) -> &TransactionDigest {
        &self.block.digest
    }

    pub fn status(&self) -> Option<&ExecutionStatus> {
        self.block.effects.as_ref().map(|effects| &effects.status)
    }

    pub fn digest_matches(&self) -> bool {
        self.local_digest == self.block.digest
    }

    pub fn is_success(&self) -> bool {
        self.status()
            .is_some_and(|status| status.status == StatusKind::Success)
    }
}
