//! Local transaction descriptions.
//!
//! A [`Transaction`] is only a list of commands over object ids known when it
//! was built. The node turns it into bytes; those bytes are what gets hashed
//! and signed.

use crate::{
    error::{
        ClientError,
        Result,
    },
    types::ObjectId,
};
use rand::Rng;
use serde_json::{
    Value,
    json,
};

/// Number of distinct zombie types the contract accepts, `0..ZOMBIE_TYPE_COUNT`.
pub const ZOMBIE_TYPE_COUNT: u8 = 5;

const FRAMEWORK_PACKAGE: &str = "0x2";

#[derive(Clone, Debug, PartialEq)]
pub enum CallArg {
    Object(ObjectId),
    Pure(Value),
}

impl CallArg {
    fn to_json(&self) -> Value {
        match self {
            CallArg::Object(id) => Value::String(id.to_string()),
            CallArg::Pure(value) => value.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MoveCall {
    pub package: String,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<CallArg>,
}

impl MoveCall {
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Join every `sources` coin into `primary`.
    MergeCoins {
        coin_type: String,
        primary: ObjectId,
        sources: Vec<ObjectId>,
    },
    MoveCall(MoveCall),
}

impl Command {
    /// Request params understood by the node's batch transaction builder.
    /// Merges are expressed as `0x2::pay::join_vec<T>`.
    pub fn to_request_params(&self) -> Value {
        let call = match self {
            Command::MergeCoins {
                coin_type,
                primary,
                sources,
            } => MoveCall {
                package: FRAMEWORK_PACKAGE.to_string(),
                module: "pay".to_string(),
                function: "join_vec".to_string(),
                type_arguments: vec![coin_type.clone()],
                arguments: vec![
                    CallArg::Object(primary.clone()),
                    CallArg::Pure(Value::Array(
                        sources
                            .iter()
                            .map(|id| Value::String(id.to_string()))
                            .collect(),
                    )),
                ],
            },
            Command::MoveCall(call) => call.clone(),
        };
        json!({
            "moveCallRequestParams": {
                "packageObjectId": call.package,
                "module": call.module,
                "function": call.function,
                "typeArguments": call.type_arguments,
                "arguments": call.arguments.iter().map(CallArg::to_json).collect::<Vec<_>>(),
            }
        })
    }
}

/// Immutable once built; there are no mutating methods.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn merge_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::MergeCoins { .. }))
            .count()
    }

    pub fn request_params(&self) -> Vec<Value> {
        self.commands.iter().map(Command::to_request_params).collect()
    }
}

#[derive(Default)]
pub struct TransactionBuilder {
    commands: Vec<Command>,
}

impl TransactionBuilder {
    pub fn merge_coins(
        mut self,
        coin_type: impl Into<String>,
        primary: ObjectId,
        sources: Vec<ObjectId>,
    ) -> Self {
        self.commands.push(Command::MergeCoins {
            coin_type: coin_type.into(),
            primary,
            sources,
        });
        self
    }

    pub fn move_call(mut self, call: MoveCall) -> Self {
        self.commands.push(Command::MoveCall(call));
        self
    }

    pub fn finish(self) -> Result<Transaction> {
        if self.commands.is_empty() {
            return Err(ClientError::validation("transaction has no commands"));
        }
        Ok(Transaction {
            commands: self.commands,
        })
    }
}

/// Per-zombie type values for a purchase.
///
/// This is a gameplay parameter, not key material: any RNG will do, and it
/// must never be used for anything that touches signing.
pub fn random_zombie_types(rng: &mut impl Rng, count: u64) -> Vec<u8> {
    (0..count)
        .map(|_| rng.random_range(0..ZOMBIE_TYPE_COUNT))
        .collect()
}

/// Entry point the purchase calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuyTarget {
    pub package: String,
    pub module: String,
    pub function: String,
    pub coin_type: String,
}

/// Builds the purchase: one merge of every coin into the first when there is
/// more than one coin, then the buy call with the merged coin.
pub fn build_buy_entry_call(
    target: &BuyTarget,
    game_info_id: &ObjectId,
    coin_ids: &[ObjectId],
    count: u64,
    rng: &mut impl Rng,
) -> Result<Transaction> {
    let Some((primary, rest)) = coin_ids.split_first() else {
        return Err(ClientError::validation(
            "at least one coin object is required to pay for zombies",
        ));
    };
    if count == 0 {
        return Err(ClientError::validation("zombie count must be positive"));
    }

    let mut builder = Transaction::builder();
    if !rest.is_empty() {
        builder = builder.merge_coins(&target.coin_type, primary.clone(), rest.to_vec());
    }

    let types: Vec<Value> = random_zombie_types(rng, count)
        .into_iter()
        .map(|t| Value::String(t.to_string()))
        .collect();

    builder
        .move_call(MoveCall {
            package: target.package.clone(),
            module: target.module.clone(),
            function: target.function.clone(),
            type_arguments: Vec::new(),
            arguments: vec![
                CallArg::Object(game_info_id.clone()),
                CallArg::Object(primary.clone()),
                CallArg::Pure(Value::String(count.to_string())),
                CallArg::Pure(Value::Array(types.clone())),
                CallArg::Pure(Value::Array(types)),
            ],
        })
        .finish()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    fn target() -> BuyTarget {
        BuyTarget {
            package: "0xbf".to_string(),
            module: "zombie_house".to_string(),
            function: "buy_zombie".to_string(),
            coin_type: "0xbf::zpt_coin::ZPT_COIN".to_string(),
        }
    }

    fn id(n: u8) -> ObjectId {
        ObjectId::from_bytes([n; 32])
    }

    fn buy_call(tx: &Transaction) -> &MoveCall {
        match tx.commands().last() {
            Some(Command::MoveCall(call)) => call,
            other => panic!("expected move call, got {other:?}"),
        }
    }

    #[test]
    fn build_buy_entry_call__single_coin_never_merges() {
        let mut rng = StdRng::seed_from_u64(1);

        let tx = build_buy_entry_call(&target(), &id(9), &[id(1)], 3, &mut rng).unwrap();

        assert_eq!(0, tx.merge_count());
        assert_eq!(1, tx.commands().len());
    }

    #[test]
    fn build_buy_entry_call__merges_all_into_first_once() {
        // given
        let mut rng = StdRng::seed_from_u64(1);
        let coins = vec![id(1), id(2), id(3), id(4)];

        // when
        let tx = build_buy_entry_call(&target(), &id(9), &coins, 2, &mut rng).unwrap();

        // then
        assert_eq!(1, tx.merge_count());
        let expected = Command::MergeCoins {
            coin_type: "0xbf::zpt_coin::ZPT_COIN".to_string(),
            primary: id(1),
            sources: vec![id(2), id(3), id(4)],
        };
        assert_eq!(&expected, &tx.commands()[0]);
        assert_eq!(CallArg::Object(id(1)), buy_call(&tx).arguments[1]);
    }

    #[test]
    fn build_buy_entry_call__passes_count_and_parallel_types() {
        let mut rng = StdRng::seed_from_u64(42);

        let tx = build_buy_entry_call(&target(), &id(9), &[id(1)], 6, &mut rng).unwrap();

        let call = buy_call(&tx);
        assert_eq!("0xbf::zombie_house::buy_zombie", call.target());
        assert_eq!(CallArg::Object(id(9)), call.arguments[0]);
        assert_eq!(CallArg::Pure(Value::String("6".into())), call.arguments[2]);
        let CallArg::Pure(Value::Array(types)) = &call.arguments[3] else {
            panic!("types argument should be a vector");
        };
        assert_eq!(6, types.len());
        assert_eq!(call.arguments[3], call.arguments[4]);
        for t in types {
            let value: u8 = t.as_str().unwrap().parse().unwrap();
            assert!(value < ZOMBIE_TYPE_COUNT);
        }
    }

    #[test]
    fn build_buy_entry_call__rejects_empty_coins_and_zero_count() {
        let mut rng = StdRng::seed_from_u64(1);

        let no_coins = build_buy_entry_call(&target(), &id(9), &[], 1, &mut rng);
        let no_zombies = build_buy_entry_call(&target(), &id(9), &[id(1)], 0, &mut rng);

        assert!(matches!(no_coins, Err(ClientError::Validation(_))));
        assert!(matches!(no_zombies, Err(ClientError::Validation(_))));
    }

    #[test]
    fn request_params__merge_becomes_join_vec() {
        let tx = Transaction::builder()
            .merge_coins("0x2::sui::SUI", id(1), vec![id(2)])
            .finish()
            .unwrap();

        let params = tx.request_params();

        let call = &params[0]["moveCallRequestParams"];
        assert_eq!("join_vec", call["function"]);
        assert_eq!(json!(["0x2::sui::SUI"]), call["typeArguments"]);
        assert_eq!(json!([id(2).to_string()]), call["arguments"][1]);
    }

    #[test]
    fn random_zombie_types__stays_in_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);

        let types = random_zombie_types(&mut rng, 500);

        assert_eq!(500, types.len());
        assert!(types.iter().all(|t| *t < ZOMBIE_TYPE_COUNT));
    }
}
