use crate::{
    error::Result,
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
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;

/// Live, unbounded sequence of events for one subscription.
pub type EventStream = BoxStream<'static, Result<Event>>;

/// Request/response access to a ledger node.
pub trait Provider: Send + Sync {
    fn get_balance(
        &self,
        owner: &Address,
        coin_type: Option<&str>,
    ) -> impl Future<Output = Result<Balance>> + Send;

    fn get_coins(
        &self,
        owner: &Address,
        coin_type: Option<&str>,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page<Coin, String>>> + Send;

    fn get_owned_objects(
        &self,
        owner: &Address,
        options: ObjectDataOptions,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page<ObjectResponse, String>>> + Send;

    fn get_object(
        &self,
        id: &ObjectId,
        options: ObjectDataOptions,
    ) -> impl Future<Output = Result<ObjectResponse>> + Send;

    /// One response per id, in request order.
    fn multi_get_objects(
        &self,
        ids: &[ObjectId],
        options: ObjectDataOptions,
    ) -> impl Future<Output = Result<Vec<ObjectResponse>>> + Send;

    fn get_transaction_block(
        &self,
        digest: &TransactionDigest,
        options: TransactionBlockOptions,
    ) -> impl Future<Output = Result<TransactionBlock>> + Send;

    fn query_events(
        &self,
        filter: &EventFilter,
        cursor: Option<&EventId>,
        limit: Option<usize>,
        descending: bool,
    ) -> impl Future<Output = Result<Page<Event, EventId>>> + Send;

    /// Has the node serialize `transaction` for `sender`.
    fn build_transaction(
        &self,
        sender: &Address,
        transaction: &Transaction,
        gas_budget: u64,
    ) -> impl Future<Output = Result<TransactionBytes>> + Send;

    fn execute_transaction(
        &self,
        tx_bytes: &str,
        signatures: &[String],
        options: TransactionBlockOptions,
    ) -> impl Future<Output = Result<TransactionBlock>> + Send;

    fn request_faucet(
        &self,
        recipient: &Address,
    ) -> impl Future<Output = Result<FaucetResponse>> + Send;
}

/// Push access to a ledger node's event feed.
pub trait EventSource: Send + Sync {
    fn subscribe(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<EventStream>> + Send;
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetResponse {
    #[serde(default)]
    pub transferred_gas_objects: Vec<Value>,
    #[serde(default)]
    pub error: Option<String>,
}
