use crate::{
    amount::{
        CoinBalance,
        format_amount,
    },
    config::{
        ContractConfig,
        DEFAULT_GAS_BUDGET,
    },
    error::{
        ClientError,
        Result,
    },
    provider::{
        EventSource,
        FaucetResponse,
        Provider,
    },
    signing::{
        IntentScope,
        Signature,
        Signer,
        sign_message,
        transaction_digest,
        verify_signature,
    },
    subscription::SubscriptionHandle,
    transaction::{
        Transaction,
        build_buy_entry_call,
    },
    types::{
        Address,
        Coin,
        Event,
        EventFilter,
        EventId,
        ExecutionResult,
        ObjectData,
        ObjectDataOptions,
        ObjectId,
        Page,
        TransactionBlock,
        TransactionBlockOptions,
        TransactionDigest,
        ZombieRecord,
    },
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD as BASE64,
};
use rand::Rng;
use serde_json::{
    Map,
    Value,
};
use tracing::{
    debug,
    info,
    warn,
};


const ZOMBIES_FIELD: &str = "zombies";

/// Reads and writes the zombie game's on-chain state through a node.
pub struct GameStateClient<P, E> {
    provider: P,
    events: E,
    contract: ContractConfig,
    gas_budget: u64,
}

impl<P: Provider, E: EventSource> GameStateClient<P, E> {
    pub fn new(provider: P, events: E, contract: ContractConfig) -> Self {
        Self {
            provider,
            events,
            contract,
            gas_budget: DEFAULT_GAS_BUDGET,
        }
    }

    pub fn with_gas_budget(mut self, gas_budget: u64) -> Self {
        self.gas_budget = gas_budget;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn contract(&self) -> &ContractConfig {
        &self.contract
    }

    pub fn gas_budget(&self) -> u64 {
        self.gas_budget
    }

    /// `coin_type` of `None` means the native coin.
    pub async fn get_balance(
        &self,
        owner: &Address,
        coin_type: Option<&str>,
        decimals: u32,
    ) -> Result<CoinBalance> {
        let balance = self.provider.get_balance(owner, coin_type).await?;
        CoinBalance::from_balance(owner.clone(), &balance, decimals)
    }

    pub async fn get_coin_amount(
        &self,
        owner: &Address,
        coin_type: Option<&str>,
        decimals: u32,
    ) -> Result<String> {
        let balance = self.provider.get_balance(owner, coin_type).await?;
        let amount = format_amount(&balance.total_balance, decimals)?;
        debug!(%owner, coin_type = %balance.coin_type, %amount, "fetched balance");
        Ok(amount)
    }

    /// Finds the game info object created when the package was published.
    /// `None` means no deployment has been observed yet.
    pub async fn locate_game_info_object(&self) -> Result<Option<ObjectId>> {
        let filter = EventFilter::MoveEventType(self.contract.display_created_event());
        let page = self
            .provider
            .query_events(&filter, None, Some(1), true)
            .await?;

        let digest = match page.data.first() {
            Some(event) => event.id.tx_digest.clone(),
            None => match page.next_cursor {
                Some(cursor) => cursor.tx_digest,
                None => {
                    debug!(package = %self.contract.package_id, "no display event found");
                    return Ok(None);
                }
            },
        };

        let block = self
            .provider
            .get_transaction_block(&digest, TransactionBlockOptions::full())
            .await?;
        let game_info_type = self.contract.game_info_type();
        let found = block
            .object_changes
            .unwrap_or_default()
            .into_iter()
            .find(|change| change.is_created(&game_info_type))
            .and_then(|change| change.object_id);
        debug!(%digest, game_info = ?found, "scanned publish transaction");
        Ok(found)
    }

    pub async fn get_game_info(&self, game_info_id: &ObjectId) -> Result<Map<String, Value>> {
        let object = self
            .provider
            .get_object(game_info_id, ObjectDataOptions::with_content())
            .await?
            .into_result(game_info_id)?;
        object.move_fields().cloned().ok_or_else(|| {
            ClientError::transport(format!("object {game_info_id} has no Move content"))
        })
    }

    pub async fn get_all_zombies(&self, game_info_id: &ObjectId) -> Result<Vec<ZombieRecord>> {
        let mut fields = self.get_game_info(game_info_id).await?;
        match fields.remove(ZOMBIES_FIELD) {
            Some(Value::Array(zombies)) => {
                Ok(zombies.into_iter().map(ZombieRecord::from_value).collect())
            }
            Some(other) => Err(ClientError::transport(format!(
                "'{ZOMBIES_FIELD}' of {game_info_id} is not a vector: {other}"
            ))),
            None => Err(ClientError::transport(format!(
                "object {game_info_id} has no '{ZOMBIES_FIELD}' field"
            ))),
        }
    }

    /// Exact, case-sensitive comparison against each zombie's owner.
    pub async fn count_zombies_owned_by(
        &self,
        game_info_id: &ObjectId,
        owner: &str,
    ) -> Result<usize> {
        let zombies = self.get_all_zombies(game_info_id).await?;
        Ok(count_owned_by(&zombies, owner))
    }

    /// Every coin of `coin_type`, following cursors to the last page.
    pub async fn get_coins(&self, owner: &Address, coin_type: Option<&str>) -> Result<Vec<Coin>> {
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .provider
                .get_coins(owner, coin_type, cursor.as_deref())
                .await?;
            coins.extend(page.data);
            match page.next_cursor {
                Some(next) if page.has_next_page => {
                    if cursor.as_deref() == Some(next.as_str()) {
                        return Err(ClientError::transport(format!(
                            "node repeated coin cursor '{next}' for {owner}"
                        )));
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        Ok(coins)
    }

    /// One page of objects owned by `owner`.
    pub async fn get_owned_objects(
        &self,
        owner: &Address,
        cursor: Option<&str>,
    ) -> Result<Page<ObjectData, String>> {
        let page = self
            .provider
            .get_owned_objects(owner, ObjectDataOptions::with_content(), cursor)
            .await?;
        Ok(Page {
            data: page.data.into_iter().filter_map(|r| r.data).collect(),
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }

    /// One result per id, in request order. A missing object does not fail
    /// the others.
    pub async fn get_objects(&self, ids: &[ObjectId]) -> Result<Vec<Result<ObjectData>>> {
        let responses = self
            .provider
            .multi_get_objects(ids, ObjectDataOptions::with_content())
            .await?;
        if responses.len() != ids.len() {
            return Err(ClientError::transport(format!(
                "asked for {} objects, node returned {}",
                ids.len(),
                responses.len()
            )));
        }
        Ok(responses
            .into_iter()
            .zip(ids)
            .map(|(response, id)| response.into_result(id))
            .collect())
    }

    pub async fn get_transaction_block(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionBlock> {
        self.provider
            .get_transaction_block(digest, TransactionBlockOptions::full())
            .await
    }

    pub fn build_buy_entry_call(
        &self,
        game_info_id: &ObjectId,
        coin_ids: &[ObjectId],
        count: u64,
    ) -> Result<Transaction> {
        self.build_buy_entry_call_with_rng(game_info_id, coin_ids, count, &mut rand::rng())
    }

    pub fn build_buy_entry_call_with_rng(
        &self,
        game_info_id: &ObjectId,
        coin_ids: &[ObjectId],
        count: u64,
        rng: &mut impl Rng,
    ) -> Result<Transaction> {
        build_buy_entry_call(
            &self.contract.buy_target(),
            game_info_id,
            coin_ids,
            count,
            rng,
        )
    }

    /// Builds, signs and executes `transaction`. The result carries both the
    /// local and the node-reported digest; neither is checked here.
    pub async fn submit_transaction(
        &self,
        signer: &impl Signer,
        transaction: &Transaction,
    ) -> Result<ExecutionResult> {
        let sender = signer.address();
        let built = self
            .provider
            .build_transaction(&sender, transaction, self.gas_budget)
            .await?;
        let tx_bytes = BASE64.decode(&built.tx_bytes).map_err(|e| {
            ClientError::transport(format!("node returned non-base64 transaction bytes: {e}"))
        })?;
        let local_digest = transaction_digest(&tx_bytes);
        let signature = sign_message(signer, &tx_bytes, IntentScope::TransactionData);

        info!(%sender, digest = %local_digest, commands = transaction.commands().len(), "submitting transaction");
        let block = self
            .provider
            .execute_transaction(
                &built.tx_bytes,
                &[signature.to_base64()],
                TransactionBlockOptions::full(),
            )
            .await?;

        let result = ExecutionResult {
            local_digest,
            block,
        };
        if !result.digest_matches() {
            warn!(
                local = %result.local_digest,
                remote = %result.digest(),
                "node reported a different transaction digest"
            );
        }
        info!(digest = %result.digest(), success = result.is_success(), "transaction executed");
        Ok(result)
    }

    /// Pays with every coin of the configured type the signer owns.
    pub async fn buy_zombies(
        &self,
        signer: &impl Signer,
        game_info_id: &ObjectId,
        count: u64,
    ) -> Result<ExecutionResult> {
        let owner = signer.address();
        let coins = self
            .get_coins(&owner, Some(self.contract.coin_type.as_str()))
            .await?;
        let coin_ids: Vec<ObjectId> = coins.into_iter().map(|c| c.coin_object_id).collect();
        let transaction = self.build_buy_entry_call(game_info_id, &coin_ids, count)?;
        self.submit_transaction(signer, &transaction).await
    }

    pub async fn query_events(
        &self,
        filter: &EventFilter,
        cursor: Option<&EventId>,
        limit: Option<usize>,
        descending: bool,
    ) -> Result<Page<Event, EventId>> {
        self.provider
            .query_events(filter, cursor, limit, descending)
            .await
    }

    pub async fn query_events_by_digest(&self, digest: &TransactionDigest) -> Result<Vec<Event>> {
        let filter = EventFilter::Transaction(digest.clone());
        Ok(self.query_events(&filter, None, None, false).await?.data)
    }

    pub async fn query_events_by_type(&self, event_type: &str) -> Result<Vec<Event>> {
        let filter = EventFilter::MoveEventType(event_type.to_string());
        Ok(self.query_events(&filter, None, None, false).await?.data)
    }

    /// `on_event` runs on a background task, once per event, in delivery
    /// order. It must not assume exclusion with other calls on this client.
    pub async fn subscribe_to_events<F>(
        &self,
        filter: &EventFilter,
        on_event: F,
    ) -> Result<SubscriptionHandle>
    where
        F: FnMut(Event) + Send + 'static,
    {
        let stream = self.events.subscribe(filter).await?;
        Ok(SubscriptionHandle::spawn(stream, on_event))
    }

    pub fn sign_message(
        &self,
        signer: &impl Signer,
        message: &[u8],
        scope: IntentScope,
    ) -> Signature {
        sign_message(signer, message, scope)
    }

    pub fn verify_signature(
        &self,
        message: &[u8],
        signature: &Signature,
        scope: IntentScope,
    ) -> Result<bool> {
        verify_signature(message, signature, scope)
    }

    pub async fn request_faucet(&self, recipient: &Address) -> Result<FaucetResponse> {
        let response = self.provider.request_faucet(recipient).await?;
        info!(
            %recipient,
            objects = response.transferred_gas_objects.len(),
            "faucet funded address"
        );
        Ok(response)
    }
}

fn count_owned_by(zombies: &[ZombieRecord], owner: &str) -> usize {
    zombies
        .iter()
        .filter(|zombie| zombie.owner() == Some(owner))
        .count()
}
