use crate::{
    error::{
        ClientError,
        Result,
    },
    provider::{
        FaucetResponse,
        Provider,
    },
    transaction::Transaction,
    types::{
        Address,
        Balance,
        Coin,
        Event,
        EventFilter,
        EventId,
        ObjectDataOptions,
        ObjectId,
        ObjectResponse,
        Page,
        TransactionBlock,
        TransactionBlockOptions,
        TransactionBytes,
        TransactionDigest,
    },
};
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::{
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
    time::Duration,
};
use tracing::{
    debug,
    trace,
};

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

const MISSING_RESOURCE_PHRASES: [&str; 3] =
    ["could not find the referenced", "does not exist", "notexists"];

/// HTTP JSON-RPC client for a full node.
pub struct JsonRpcProvider {
    url: String,
    faucet_url: Option<String>,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, None)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            ClientError::transport(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            url: url.into(),
            faucet_url: None,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_faucet(mut self, faucet_url: impl Into<String>) -> Self {
        self.faucet_url = Some(faucet_url.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");
        trace!(%request, "rpc request body");

        let res = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("{method} request failed: {e}")))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| {
            ClientError::transport(format!("failed to read {method} response body: {e}"))
        })?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(ClientError::transport(format!(
                "node responded with {status} to {method}: {body}"
            )));
        }
        decode_response(method, &bytes)
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
pub(crate) struct RpcErrorObject {
    code: i64,
    message: String,
}

pub(crate) fn decode_response<T: DeserializeOwned>(method: &str, bytes: &[u8]) -> Result<T> {
    let response: RpcResponse = serde_json::from_slice(bytes).map_err(|e| {
        ClientError::transport(format!("malformed {method} response: {e}"))
    })?;
    decode_envelope(method, response.result, response.error)
}

pub(crate) fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    result: Option<Value>,
    error: Option<RpcErrorObject>,
) -> Result<T> {
    if let Some(err) = error {
        return Err(classify_rpc_error(err.code, err.message));
    }
    let result = result
        .ok_or_else(|| ClientError::transport(format!("{method} response had no result")))?;
    serde_json::from_value(result).map_err(|e| {
        ClientError::transport(format!("unexpected {method} result shape: {e}"))
    })
}

/// Protocol-level codes are failures regardless of their text. Past those,
/// nodes report missing resources as generic errors and the message is the
/// only reliable signal.
pub(crate) fn classify_rpc_error(code: i64, message: String) -> ClientError {
    if matches!(code, PARSE_ERROR | INVALID_REQUEST | METHOD_NOT_FOUND) {
        return ClientError::Rpc { code, message };
    }
    let lower = message.to_ascii_lowercase();
    let missing = MISSING_RESOURCE_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase));
    if missing {
        ClientError::NotFound(message)
    } else if code == INVALID_PARAMS {
        ClientError::Validation(message)
    } else {
        ClientError::Rpc { code, message }
    }
}

impl Provider for JsonRpcProvider {
    async fn get_balance(&self, owner: &Address, coin_type: Option<&str>) -> Result<Balance> {
        self.call("suix_getBalance", json!([owner, coin_type])).await
    }

    async fn get_coins(
        &self,
        owner: &Address,
        coin_type: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<Page<Coin, String>> {
        self.call("suix_getCoins", json!([owner, coin_type, cursor, Value::Null]))
            .await
    }

    async fn get_owned_objects(
        &self,
        owner: &Address,
        options: ObjectDataOptions,
        cursor: Option<&str>,
    ) -> Result<Page<ObjectResponse, String>> {
        let query = json!({ "filter": Value::Null, "options": options });
        self.call(
            "suix_getOwnedObjects",
            json!([owner, query, cursor, Value::Null]),
        )
        .await
    }

    async fn get_object(
        &self,
        id: &ObjectId,
        options: ObjectDataOptions,
    ) -> Result<ObjectResponse> {
        self.call("sui_getObject", json!([id, options])).await
    }

    async fn multi_get_objects(
        &self,
        ids: &[ObjectId],
        options: ObjectDataOptions,
    ) -> Result<Vec<ObjectResponse>> {
        self.call("sui_multiGetObjects", json!([ids, options])).await
    }

    async fn get_transaction_block(
        &self,
        digest: &TransactionDigest,
        options: TransactionBlockOptions,
    ) -> Result<TransactionBlock> {
        self.call("sui_getTransactionBlock", json!([digest, options]))
            .await
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        cursor: Option<&EventId>,
        limit: Option<usize>,
        descending: bool,
    ) -> Result<Page<Event, EventId>> {
        self.call(
            "suix_queryEvents",
            json!([filter, cursor, limit, descending]),
        )
        .await
    }

    async fn build_transaction(
        &self,
        sender: &Address,
        transaction: &Transaction,
        gas_budget: u64,
    ) -> Result<TransactionBytes> {
        self.call(
            "unsafe_batchTransaction",
            json!([
                sender,
                transaction.request_params(),
                Value::Null,
                gas_budget.to_string(),
                "Commit"
            ]),
        )
        .await
    }

    async fn execute_transaction(
        &self,
        tx_bytes: &str,
        signatures: &[String],
        options: TransactionBlockOptions,
    ) -> Result<TransactionBlock> {
        self.call(
            "sui_executeTransactionBlock",
            json!([tx_bytes, signatures, options, "WaitForLocalExecution"]),
        )
        .await
    }

    async fn request_faucet(&self, recipient: &Address) -> Result<FaucetResponse> {
        let url = self.faucet_url.as_deref().ok_or_else(|| {
            ClientError::validation("no faucet is configured for this network")
        })?;
        debug!(%recipient, url, "requesting faucet funds");
        let res = self
            .http
            .post(url)
            .json(&json!({ "FixedAmountRequest": { "recipient": recipient } }))
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("faucet request failed: {e}")))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| {
            ClientError::transport(format!("failed to read faucet response body: {e}"))
        })?;
        if !status.is_success() {
            return Err(ClientError::Rpc {
                code: i64::from(status.as_u16()),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let response: FaucetResponse = serde_json::from_slice(&bytes)?;
        if let Some(error) = &response.error {
            return Err(ClientError::Rpc {
                code: i64::from(status.as_u16()),
                message: error.clone(),
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn decode_response__returns_typed_result() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"coinType":"0x2::sui::SUI","coinObjectCount":2,"totalBalance":"5000000000","lockedBalance":{}}}"#;

        let balance: Balance = decode_response("suix_getBalance", body).unwrap();

        assert_eq!("5000000000", balance.total_balance);
        assert_eq!(2, balance.coin_object_count);
    }

    #[test]
    fn decode_response__missing_transaction_is_not_found() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Could not find the referenced transaction [TransactionDigest(abc)]."}}"#;

        let err = decode_response::<TransactionBlock>("sui_getTransactionBlock", body)
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn decode_response__method_not_found_is_rpc_error() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;

        let err = decode_response::<TransactionBytes>("unsafe_batchTransaction", body)
            .unwrap_err();

        assert!(!err.is_not_found());
        assert!(matches!(err, ClientError::Rpc { code: -32601, .. }));
    }

    #[test]
    fn decode_response__missing_object_phrase_is_not_found() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"Object 0x9 does not exist"}}"#;

        let err = decode_response::<ObjectResponse>("sui_getObject", body).unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn decode_response__invalid_params_is_validation() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid params"}}"#;

        let err = decode_response::<Balance>("suix_getBalance", body).unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn decode_response__other_node_errors_keep_code() {
        let body =
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32002,"message":"Transaction execution failed"}}"#;

        let err = decode_response::<TransactionBlock>("sui_executeTransactionBlock", body)
            .unwrap_err();

        assert!(matches!(err, ClientError::Rpc { code: -32002, .. }));
    }

    #[test]
    fn decode_response__garbage_is_transport_error() {
        let err = decode_response::<Balance>("suix_getBalance", b"<html>").unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));

        let err = decode_response::<Balance>("suix_getBalance", br#"{"result":{"x":1}}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn decode_response__event_page_with_cursor() {
        let digest = TransactionDigest::from_bytes([3u8; 32]);
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "id": 4,
            "result": {
                "data": [],
                "nextCursor": { "txDigest": digest.as_str(), "eventSeq": "0" },
                "hasNextPage": false
            }
        }))
        .unwrap();

        let page: Page<Event, EventId> = decode_response("suix_queryEvents", &body).unwrap();

        assert!(page.data.is_empty());
        assert_eq!(Some(digest), page.next_cursor.map(|c| c.tx_digest));
    }

    #[tokio::test]
    async fn request_faucet__without_url_is_validation_error() {
        let provider = JsonRpcProvider::new("http://127.0.0.1:9000").unwrap();
        let recipient = Address::from_bytes([1u8; 32]);

        let err = provider.request_faucet(&recipient).await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
    }
}
