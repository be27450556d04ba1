//! In-memory stand-ins for a ledger node, shared by unit and integration
//! tests.

use crate::{
    error::{
        ClientError,
        Result,
    },
    provider::{
        EventSource,
        EventStream,
        FaucetResponse,
        Provider,
    },
    signing::{
        Ed25519Keypair,
        IntentScope,
        Signature,
        transaction_digest,
        verify_signature,
    },
    transaction::Transaction,
    types::{
        Address,
        Balance,
        Coin,
        Event,
        EventFilter,
        EventId,
        ExecutionStatus,
        ObjectChange,
        ObjectChangeKind,
        ObjectContent,
        ObjectData,
        ObjectDataOptions,
        ObjectId,
        ObjectResponse,
        ObjectResponseError,
        Page,
        SUI_COIN_TYPE,
        StatusKind,
        TransactionBlock,
        TransactionBlockOptions,
        TransactionBytes,
        TransactionDigest,
        TransactionEffects,
    },
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD as BASE64,
};
use futures::{
    StreamExt,
    stream,
};
use serde_json::{
    Map,
    Value,
    json,
};
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::mpsc;

pub fn address(n: u8) -> Address {
    Address::from_bytes([n; 32])
}

pub fn object_id(n: u8) -> ObjectId {
    ObjectId::from_bytes([n; 32])
}

pub fn digest(n: u8) -> TransactionDigest {
    TransactionDigest::from_bytes([n; 32])
}

pub fn keypair(n: u8) -> Ed25519Keypair {
    match Ed25519Keypair::from_secret_bytes(&[n; 32]) {
        Ok(keypair) => keypair,
        Err(err) => panic!("32 bytes is always a valid secret: {err}"),
    }
}

pub fn event(event_type: &str, tx_digest: TransactionDigest, parsed_json: Value) -> Event {
    Event {
        id: EventId {
            tx_digest,
            event_seq: "0".to_string(),
        },
        package_id: object_id(0xbf),
        transaction_module: "zombie_house".to_string(),
        sender: address(1),
        event_type: event_type.to_string(),
        parsed_json,
        timestamp_ms: None,
    }
}

pub fn coin(id: ObjectId, coin_type: &str, balance: u64) -> Coin {
    Coin {
        coin_type: coin_type.to_string(),
        coin_object_id: id,
        version: "1".to_string(),
        digest: digest(0).to_string(),
        balance: balance.to_string(),
        previous_transaction: None,
    }
}

/// A zombie entry in the nested Move struct form the node returns.
pub fn zombie(owner: &str, zombie_type: u8) -> Value {
    json!({
        "type": "0xbf::zombie_house::Zombie",
        "fields": {
            "zombie_owner": owner,
            "zombie_type": zombie_type.to_string(),
        }
    })
}

pub fn move_object(id: ObjectId, object_type: &str, owner: Value, fields: Value) -> ObjectData {
    let fields = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ObjectData {
        object_id: id,
        version: "1".to_string(),
        digest: digest(0).to_string(),
        object_type: Some(object_type.to_string()),
        owner: Some(owner),
        content: Some(ObjectContent::MoveObject {
            object_type: object_type.to_string(),
            has_public_transfer: false,
            fields,
        }),
    }
}

pub fn game_info_object(id: ObjectId, game_info_type: &str, zombies: Vec<Value>) -> ObjectData {
    let fields = json!({ "id": { "id": id.as_str() }, "zombies": zombies });
    move_object(
        id,
        game_info_type,
        json!({ "Shared": { "initial_shared_version": 3 } }),
        fields,
    )
}

/// Publish transaction whose object changes include the created game info.
pub fn publish_block(
    tx_digest: TransactionDigest,
    game_info_type: &str,
    game_info_id: ObjectId,
) -> TransactionBlock {
    let change = |kind, object_type: &str, id: ObjectId| ObjectChange {
        kind,
        object_type: Some(object_type.to_string()),
        object_id: Some(id),
        package_id: None,
        sender: Some(address(1)),
    };
    TransactionBlock {
        digest: tx_digest,
        effects: Some(success_effects()),
        events: Some(Vec::new()),
        object_changes: Some(vec![
            change(ObjectChangeKind::Mutated, "0x2::coin::Coin<0x2::sui::SUI>", object_id(2)),
            change(ObjectChangeKind::Created, "0x2::package::UpgradeCap", object_id(3)),
            change(ObjectChangeKind::Created, game_info_type, game_info_id),
        ]),
        errors: Vec::new(),
    }
}

fn success_effects() -> TransactionEffects {
    TransactionEffects {
        status: ExecutionStatus {
            status: StatusKind::Success,
            error: None,
        },
    }
}

#[derive(Default)]
struct FakeState {
    balances: HashMap<Address, HashMap<String, String>>,
    coin_pages: HashMap<(Address, String), Vec<Vec<Coin>>>,
    stuck_coin_cursor: bool,
    objects: HashMap<ObjectId, ObjectData>,
    transactions: HashMap<TransactionDigest, TransactionBlock>,
    events: Vec<Event>,
    event_cursor: Option<EventId>,
    event_queries: Vec<EventQuery>,
    built: Vec<BuiltTransaction>,
    executed: Vec<ExecutedTransaction>,
    faucet_requests: Vec<Address>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventQuery {
    pub filter: EventFilter,
    pub limit: Option<usize>,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuiltTransaction {
    pub sender: Address,
    pub transaction: Transaction,
    pub gas_budget: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExecutedTransaction {
    pub tx_bytes: String,
    pub signatures: Vec<String>,
    pub digest: TransactionDigest,
}

/// Node double. Executed transactions are accepted only when every signature
/// verifies over the built bytes under the transaction intent.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_balance(self, owner: Address, coin_type: &str, total: &str) -> Self {
        self.state()
            .balances
            .entry(owner)
            .or_default()
            .insert(coin_type.to_string(), total.to_string());
        self
    }

    /// Each inner vector is served as one page.
    pub fn with_coin_pages(self, owner: Address, coin_type: &str, pages: Vec<Vec<Coin>>) -> Self {
        self.state()
            .coin_pages
            .insert((owner, coin_type.to_string()), pages);
        self
    }

    /// Every coin page claims a next page behind the cursor it was asked for.
    pub fn with_stuck_coin_cursor(self) -> Self {
        self.state().stuck_coin_cursor = true;
        self
    }

    pub fn with_object(self, object: ObjectData) -> Self {
        self.state()
            .objects
            .insert(object.object_id.clone(), object);
        self
    }

    pub fn with_transaction(self, block: TransactionBlock) -> Self {
        self.state()
            .transactions
            .insert(block.digest.clone(), block);
        self
    }

    pub fn with_events(self, events: Vec<Event>) -> Self {
        self.state().events.extend(events);
        self
    }

    /// Cursor reported on every event page.
    pub fn with_event_cursor(self, cursor: EventId) -> Self {
        self.state().event_cursor = Some(cursor);
        self
    }

    pub fn event_queries(&self) -> Vec<EventQuery> {
        self.state().event_queries.clone()
    }

    pub fn built(&self) -> Vec<BuiltTransaction> {
        self.state().built.clone()
    }

    pub fn executed(&self) -> Vec<ExecutedTransaction> {
        self.state().executed.clone()
    }

    pub fn faucet_requests(&self) -> Vec<Address> {
        self.state().faucet_requests.clone()
    }
}

fn event_matches(filter: &EventFilter, event: &Event) -> bool {
    match filter {
        EventFilter::MoveEventType(event_type) => &event.event_type == event_type,
        EventFilter::MoveModule { package, module } => {
            &event.package_id == package && &event.transaction_module == module
        }
        EventFilter::Transaction(digest) => &event.id.tx_digest == digest,
        EventFilter::Sender(sender) => &event.sender == sender,
        EventFilter::Package(package) => &event.package_id == package,
    }
}

fn object_response(objects: &HashMap<ObjectId, ObjectData>, id: &ObjectId) -> ObjectResponse {
    match objects.get(id) {
        Some(object) => ObjectResponse {
            data: Some(object.clone()),
            error: None,
        },
        None => ObjectResponse {
            data: None,
            error: Some(ObjectResponseError {
                code: "notExists".to_string(),
                object_id: Some(id.to_string()),
            }),
        },
    }
}

impl Provider for FakeProvider {
    async fn get_balance(&self, owner: &Address, coin_type: Option<&str>) -> Result<Balance> {
        let state = self.state();
        let coin_type = coin_type.unwrap_or(SUI_COIN_TYPE);
        let by_type = state
            .balances
            .get(owner)
            .ok_or_else(|| ClientError::not_found(format!("address {owner}")))?;
        Ok(Balance {
            coin_type: coin_type.to_string(),
            coin_object_count: 1,
            total_balance: by_type
                .get(coin_type)
                .cloned()
                .unwrap_or_else(|| "0".to_string()),
        })
    }

    async fn get_coins(
        &self,
        owner: &Address,
        coin_type: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<Page<Coin, String>> {
        let state = self.state();
        let key = (owner.clone(), coin_type.unwrap_or(SUI_COIN_TYPE).to_string());
        let Some(pages) = state.coin_pages.get(&key) else {
            return Ok(Page::single(Vec::new()));
        };
        let index = match cursor {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| ClientError::validation(format!("bad cursor '{raw}'")))?,
            None => 0,
        };
        let data = pages.get(index).cloned().unwrap_or_default();
        if state.stuck_coin_cursor {
            return Ok(Page {
                data,
                next_cursor: Some(index.to_string()),
                has_next_page: true,
            });
        }
        let has_next_page = index + 1 < pages.len();
        Ok(Page {
            data,
            next_cursor: has_next_page.then(|| (index + 1).to_string()),
            has_next_page,
        })
    }

    async fn get_owned_objects(
        &self,
        owner: &Address,
        _options: ObjectDataOptions,
        _cursor: Option<&str>,
    ) -> Result<Page<ObjectResponse, String>> {
        let state = self.state();
        let expected = json!({ "AddressOwner": owner.as_str() });
        let mut owned: Vec<&ObjectData> = state
            .objects
            .values()
            .filter(|object| object.owner.as_ref() == Some(&expected))
            .collect();
        owned.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        Ok(Page::single(
            owned
                .into_iter()
                .map(|object| ObjectResponse {
                    data: Some(object.clone()),
                    error: None,
                })
                .collect(),
        ))
    }

    async fn get_object(
        &self,
        id: &ObjectId,
        _options: ObjectDataOptions,
    ) -> Result<ObjectResponse> {
        Ok(object_response(&self.state().objects, id))
    }

    async fn multi_get_objects(
        &self,
        ids: &[ObjectId],
        _options: ObjectDataOptions,
    ) -> Result<Vec<ObjectResponse>> {
        let state = self.state();
        Ok(ids
            .iter()
            .map(|id| object_response(&state.objects, id))
            .collect())
    }

    async fn get_transaction_block(
        &self,
        digest: &TransactionDigest,
        _options: TransactionBlockOptions,
    ) -> Result<TransactionBlock> {
        self.state()
            .transactions
            .get(digest)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("transaction {digest}")))
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        _cursor: Option<&EventId>,
        limit: Option<usize>,
        descending: bool,
    ) -> Result<Page<Event, EventId>> {
        let mut state = self.state();
        state.event_queries.push(EventQuery {
            filter: filter.clone(),
            limit,
            descending,
        });
        let mut data: Vec<Event> = state
            .events
            .iter()
            .filter(|event| event_matches(filter, event))
            .cloned()
            .collect();
        if descending {
            data.reverse();
        }
        if let Some(limit) = limit {
            data.truncate(limit);
        }
        Ok(Page {
            data,
            next_cursor: state.event_cursor.clone(),
            has_next_page: false,
        })
    }

    async fn build_transaction(
        &self,
        sender: &Address,
        transaction: &Transaction,
        gas_budget: u64,
    ) -> Result<TransactionBytes> {
        let mut state = self.state();
        let payload = json!({
            "sender": sender,
            "commands": transaction.request_params(),
            "gasBudget": gas_budget.to_string(),
        });
        let tx_bytes = BASE64.encode(payload.to_string());
        state.built.push(BuiltTransaction {
            sender: sender.clone(),
            transaction: transaction.clone(),
            gas_budget,
        });
        Ok(TransactionBytes {
            tx_bytes,
            gas: Vec::new(),
            input_objects: Vec::new(),
        })
    }

    async fn execute_transaction(
        &self,
        tx_bytes: &str,
        signatures: &[String],
        _options: TransactionBlockOptions,
    ) -> Result<TransactionBlock> {
        let bytes = BASE64
            .decode(tx_bytes)
            .map_err(|e| ClientError::validation(format!("bad tx bytes: {e}")))?;
        if signatures.is_empty() {
            return Err(ClientError::validation("transaction is not signed"));
        }
        for encoded in signatures {
            let signature = Signature::from_base64(encoded)?;
            if !verify_signature(&bytes, &signature, IntentScope::TransactionData)? {
                return Err(ClientError::validation("signature does not verify"));
            }
        }
        let digest = transaction_digest(&bytes);
        let block = TransactionBlock {
            digest: digest.clone(),
            effects: Some(success_effects()),
            events: Some(Vec::new()),
            object_changes: Some(Vec::new()),
            errors: Vec::new(),
        };
        let mut state = self.state();
        state.executed.push(ExecutedTransaction {
            tx_bytes: tx_bytes.to_string(),
            signatures: signatures.to_vec(),
            digest,
        });
        state
            .transactions
            .insert(block.digest.clone(), block.clone());
        Ok(block)
    }

    async fn request_faucet(&self, recipient: &Address) -> Result<FaucetResponse> {
        self.state().faucet_requests.push(recipient.clone());
        Ok(FaucetResponse {
            transferred_gas_objects: vec![json!({ "amount": 1_000_000_000u64 })],
            error: None,
        })
    }
}

/// Event feed driven by the paired sender. Supports a single subscription.
pub struct FakeEventSource {
    recv: Mutex<Option<mpsc::Receiver<Event>>>,
    filters: Mutex<Vec<EventFilter>>,
}

impl FakeEventSource {
    pub fn new_with_sender() -> (Self, mpsc::Sender<Event>) {
        let (send, recv) = mpsc::channel(10);
        let source = FakeEventSource {
            recv: Mutex::new(Some(recv)),
            filters: Mutex::new(Vec::new()),
        };
        (source, send)
    }

    pub fn filters(&self) -> Vec<EventFilter> {
        self.filters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EventSource for FakeEventSource {
    async fn subscribe(&self, filter: &EventFilter) -> Result<EventStream> {
        self.filters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(filter.clone());
        let recv = self
            .recv
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| ClientError::transport("fake event source already subscribed"))?;
        Ok(stream::unfold(recv, |mut recv| async move {
            recv.recv().await.map(|event| (Ok(event), recv))
        })
        .boxed())
    }
}
