use crate::{
    error::{
        ClientError,
        Result,
    },
    types::{
        Address,
        Balance,
    },
};
use bigdecimal::{
    BigDecimal,
    num_bigint::{
        BigInt,
        Sign,
    },
};
use std::str::FromStr;

pub const DEFAULT_DECIMALS: u32 = 9;

/// Parses a raw on-chain balance. Balances are unsigned; anything else is a
/// malformed response.
pub fn parse_raw_balance(raw: &str) -> Result<BigInt> {
    let value = BigInt::from_str(raw.trim()).map_err(|e| {
        ClientError::transport(format!("malformed balance '{raw}': {e}"))
    })?;
    if value.sign() == Sign::Minus {
        return Err(ClientError::transport(format!("negative balance '{raw}'")));
    }
    Ok(value)
}

/// `raw / 10^decimals` without going through floating point.
pub fn to_display_amount(raw: &BigInt, decimals: u32) -> BigDecimal {
    BigDecimal::new(raw.clone(), i64::from(decimals)).normalized()
}

/// Plain decimal rendering: no exponent, no trailing zeros.
pub fn format_amount(raw: &str, decimals: u32) -> Result<String> {
    let raw = parse_raw_balance(raw)?;
    Ok(to_display_amount(&raw, decimals).to_plain_string())
}

/// Balance of one coin type held by an owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinBalance {
    pub owner: Address,
    pub coin_type: String,
    pub total_balance: BigInt,
    pub decimals: u32,
}

impl CoinBalance {
    pub fn from_balance(owner: Address, balance: &Balance, decimals: u32) -> Result<Self> {
        Ok(Self {
            owner,
            coin_type: balance.coin_type.clone(),
            total_balance: parse_raw_balance(&balance.total_balance)?,
            decimals,
        })
    }

    pub fn display_amount(&self) -> BigDecimal {
        to_display_amount(&self.total_balance, self.decimals)
    }

    pub fn display(&self) -> String {
        self.display_amount().to_plain_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn format_amount__whole_units() {
        assert_eq!("5", format_amount("5000000000", 9).unwrap());
    }

    #[test]
    fn format_amount__keeps_fraction_without_trailing_zeros() {
        assert_eq!("1.5", format_amount("1500000000", 9).unwrap());
        assert_eq!("0.000000001", format_amount("1", 9).unwrap());
        assert_eq!("0", format_amount("0", 9).unwrap());
    }

    #[test]
    fn format_amount__large_balances_stay_exact() {
        let raw = "340282366920938463463374607431768211455";
        let expected = "340282366920938463463374607431.768211455";
        assert_eq!(expected, format_amount(raw, 9).unwrap());
    }

    #[test]
    fn format_amount__zero_decimals_is_identity() {
        assert_eq!("12000", format_amount("12000", 0).unwrap());
    }

    #[test]
    fn format_amount__rejects_garbage() {
        assert!(matches!(
            format_amount("-1", 9),
            Err(ClientError::Transport(_))
        ));
        assert!(matches!(
            format_amount("12.5", 9),
            Err(ClientError::Transport(_))
        ));
    }

    #[test]
    fn coin_balance__from_node_balance() {
        let balance = Balance {
            coin_type: "0x2::sui::SUI".to_string(),
            coin_object_count: 3,
            total_balance: "2500000000".to_string(),
        };

        let coin = CoinBalance::from_balance(Address::from_bytes([1; 32]), &balance, 9)
            .unwrap();

        assert_eq!(BigInt::from(2_500_000_000u64), coin.total_balance);
        assert_eq!("2.5", coin.display());
    }

    proptest! {
        #[test]
        fn format_amount__scaling_back_recovers_raw(raw in any::<u128>(), decimals in 0u32..=18) {
            let rendered = format_amount(&raw.to_string(), decimals).unwrap();
            let parsed = BigDecimal::from_str(&rendered).unwrap();
            let scale = BigDecimal::new(BigInt::from(1), -i64::from(decimals));
            let recovered = (parsed * scale).with_scale(0);
            prop_assert_eq!(BigDecimal::new(BigInt::from(raw), 0), recovered);
        }
    }
}
