use crate::{
    client::GameStateClient,
    rpc::JsonRpcProvider,
    subscription::WsEventSource,
    transaction::BuyTarget,
    types::ObjectId,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

pub const DEFAULT_DEVNET_RPC_URL: &str = "https://fullnode.devnet.sui.io:443";
pub const DEFAULT_DEVNET_WS_URL: &str = "wss://fullnode.devnet.sui.io:443";
pub const DEFAULT_DEVNET_FAUCET_URL: &str = "https://faucet.devnet.sui.io/gas";
pub const DEFAULT_TESTNET_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";
pub const DEFAULT_TESTNET_WS_URL: &str = "wss://fullnode.testnet.sui.io:443";
pub const DEFAULT_TESTNET_FAUCET_URL: &str = "https://faucet.testnet.sui.io/gas";
pub const DEFAULT_MAINNET_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";
pub const DEFAULT_MAINNET_WS_URL: &str = "wss://fullnode.mainnet.sui.io:443";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:9000";
pub const DEFAULT_LOCAL_WS_URL: &str = "ws://127.0.0.1:9000";
pub const DEFAULT_LOCAL_FAUCET_URL: &str = "http://127.0.0.1:9123/gas";

/// 0.01 SUI in MIST.
pub const DEFAULT_GAS_BUDGET: u64 = 10_000_000;
pub const DEFAULT_MODULE: &str = "zombie_house";
pub const BUY_FUNCTION: &str = "buy_zombie";

const ENV_NETWORK: &str = "ZOMBIE_HOUSE_NETWORK";
const ENV_RPC_URL: &str = "ZOMBIE_HOUSE_RPC_URL";
const ENV_WS_URL: &str = "ZOMBIE_HOUSE_WS_URL";
const ENV_FAUCET_URL: &str = "ZOMBIE_HOUSE_FAUCET_URL";
const ENV_PACKAGE_ID: &str = "ZOMBIE_HOUSE_PACKAGE_ID";
const ENV_COIN_TYPE: &str = "ZOMBIE_HOUSE_COIN_TYPE";
const ENV_GAS_BUDGET: &str = "ZOMBIE_HOUSE_GAS_BUDGET";
const ENV_TIMEOUT: &str = "ZOMBIE_HOUSE_REQUEST_TIMEOUT_SECS";
const ENV_DEPLOYMENTS_DIR: &str = "ZOMBIE_HOUSE_DEPLOYMENTS_DIR";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub fullnode: String,
    pub websocket: String,
    pub faucet: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Devnet,
    Testnet,
    Mainnet,
    Local,
}

impl NetworkTarget {
    pub fn default_endpoints(self) -> Endpoints {
        let (fullnode, websocket, faucet) = match self {
            NetworkTarget::Devnet => (
                DEFAULT_DEVNET_RPC_URL,
                DEFAULT_DEVNET_WS_URL,
                Some(DEFAULT_DEVNET_FAUCET_URL),
            ),
            NetworkTarget::Testnet => (
                DEFAULT_TESTNET_RPC_URL,
                DEFAULT_TESTNET_WS_URL,
                Some(DEFAULT_TESTNET_FAUCET_URL),
            ),
            NetworkTarget::Mainnet => {
                (DEFAULT_MAINNET_RPC_URL, DEFAULT_MAINNET_WS_URL, None)
            }
            NetworkTarget::Local => (
                DEFAULT_LOCAL_RPC_URL,
                DEFAULT_LOCAL_WS_URL,
                Some(DEFAULT_LOCAL_FAUCET_URL),
            ),
        };
        Endpoints {
            fullnode: fullnode.to_string(),
            websocket: websocket.to_string(),
            faucet: faucet.map(str::to_string),
        }
    }

    pub fn deployment_env(self) -> DeploymentEnv {
        match self {
            NetworkTarget::Devnet => DeploymentEnv::Dev,
            NetworkTarget::Testnet => DeploymentEnv::Test,
            NetworkTarget::Mainnet => DeploymentEnv::Main,
            NetworkTarget::Local => DeploymentEnv::Local,
        }
    }
}

impl From<DeploymentEnv> for NetworkTarget {
    fn from(env: DeploymentEnv) -> Self {
        match env {
            DeploymentEnv::Dev => NetworkTarget::Devnet,
            DeploymentEnv::Test => NetworkTarget::Testnet,
            DeploymentEnv::Main => NetworkTarget::Mainnet,
            DeploymentEnv::Local => NetworkTarget::Local,
        }
    }
}

/// Identifiers of the deployed game contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractConfig {
    pub package_id: ObjectId,
    pub coin_type: String,
    pub module: String,
}

impl ContractConfig {
    pub fn new(package_id: ObjectId, coin_type: impl Into<String>) -> Self {
        Self {
            package_id,
            coin_type: coin_type.into(),
            module: DEFAULT_MODULE.to_string(),
        }
    }

    pub fn game_info_type(&self) -> String {
        format!("{}::{}::GameInfo", self.package_id, self.module)
    }

    pub fn nft_type(&self) -> String {
        format!("{}::{}::ZombieNFT", self.package_id, self.module)
    }

    /// Emitted once when the package publishes its NFT display.
    pub fn display_created_event(&self) -> String {
        format!("0x2::display::DisplayCreated<{}>", self.nft_type())
    }

    pub fn buy_target(&self) -> BuyTarget {
        BuyTarget {
            package: self.package_id.to_string(),
            module: self.module.clone(),
            function: BUY_FUNCTION.to_string(),
            coin_type: self.coin_type.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub network: NetworkTarget,
    pub endpoints: Endpoints,
    pub contract: ContractConfig,
    pub gas_budget: u64,
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Reads `.env` and the process environment, falling back to the latest
    /// record in the deployments store for contract identifiers.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let network = match lookup(ENV_NETWORK) {
            Some(raw) => raw
                .parse::<DeploymentEnv>()
                .map_err(|e| eyre!(e))
                .wrap_err_with(|| format!("invalid {ENV_NETWORK}"))?
                .into(),
            None => NetworkTarget::Devnet,
        };

        let defaults = network.default_endpoints();
        let endpoints = Endpoints {
            fullnode: lookup(ENV_RPC_URL).unwrap_or(defaults.fullnode),
            websocket: lookup(ENV_WS_URL).unwrap_or(defaults.websocket),
            faucet: lookup(ENV_FAUCET_URL).or(defaults.faucet),
        };

        let deployments_root = lookup(ENV_DEPLOYMENTS_DIR)
            .map(|raw| PathBuf::from(shellexpand::tilde(&raw).into_owned()))
            .unwrap_or_else(|| PathBuf::from(deployments::DEPLOYMENTS_ROOT));
        let contract = resolve_contract(
            lookup(ENV_PACKAGE_ID),
            lookup(ENV_COIN_TYPE),
            &deployments_root,
            network,
        )?;

        let gas_budget = match lookup(ENV_GAS_BUDGET) {
            Some(raw) => raw
                .trim()
                .parse()
                .wrap_err_with(|| format!("invalid {ENV_GAS_BUDGET} '{raw}'"))?,
            None => DEFAULT_GAS_BUDGET,
        };
        let request_timeout = lookup(ENV_TIMEOUT)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .wrap_err_with(|| format!("invalid {ENV_TIMEOUT} '{raw}'"))
            })
            .transpose()?;

        Ok(Self {
            network,
            endpoints,
            contract,
            gas_budget,
            request_timeout,
        })
    }

    pub fn connect(&self) -> Result<GameStateClient<JsonRpcProvider, WsEventSource>> {
        tracing::info!(
            network = ?self.network,
            url = %self.endpoints.fullnode,
            package = %self.contract.package_id,
            "connecting to full node"
        );
        let mut provider =
            JsonRpcProvider::with_timeout(&self.endpoints.fullnode, self.request_timeout)
                .map_err(|e| eyre!(e))?;
        if let Some(faucet) = &self.endpoints.faucet {
            provider = provider.with_faucet(faucet);
        }
        let events = WsEventSource::new(&self.endpoints.websocket);
        Ok(GameStateClient::new(provider, events, self.contract.clone())
            .with_gas_budget(self.gas_budget))
    }
}

fn resolve_contract(
    package_id: Option<String>,
    coin_type: Option<String>,
    deployments_root: &Path,
    network: NetworkTarget,
) -> Result<ContractConfig> {
    let record = if package_id.is_none() || coin_type.is_none() {
        DeploymentStore::at(deployments_root, network.deployment_env())
            .load()
            .map_err(|e| eyre!(e))
            .wrap_err("loading deployment record")?
    } else {
        None
    };

    let package_id = package_id
        .or_else(|| record.as_ref().map(|r| r.package_id.clone()))
        .ok_or_else(|| {
            eyre!(
                "no package id: set {ENV_PACKAGE_ID} or record a {} deployment",
                network.deployment_env()
            )
        })?;
    let package_id: ObjectId = package_id
        .parse()
        .map_err(|e| eyre!("invalid package id '{package_id}': {e}"))?;
    let coin_type = coin_type
        .or_else(|| record.as_ref().and_then(|r| r.coin_type.clone()))
        .ok_or_else(|| {
            eyre!(
                "no coin type: set {ENV_COIN_TYPE} or record one with the {} deployment",
                network.deployment_env()
            )
        })?;

    Ok(ContractConfig::new(package_id, coin_type))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn from_lookup__uses_network_defaults_and_env_contract() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let env = env_from(&[
            (ENV_NETWORK, "testnet"),
            (ENV_PACKAGE_ID, "0xBF"),
            (ENV_COIN_TYPE, "0xbf::zpt_coin::ZPT_COIN"),
            (ENV_DEPLOYMENTS_DIR, root.as_str()),
        ]);

        let config = ClientConfig::from_lookup(|key| env.get(key).cloned()).unwrap();

        assert_eq!(NetworkTarget::Testnet, config.network);
        assert_eq!(DEFAULT_TESTNET_RPC_URL, config.endpoints.fullnode);
        assert_eq!(DEFAULT_GAS_BUDGET, config.gas_budget);
        assert_eq!(
            format!("0x{:0>64}::zombie_house::GameInfo", "bf"),
            config.contract.game_info_type()
        );
    }

    #[test]
    fn from_lookup__falls_back_to_deployment_record() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let store = DeploymentStore::at(dir.path(), DeploymentEnv::Local);
        std::fs::create_dir_all(dir.path().join("local")).unwrap();
        let record = json!([{
            "deployed_at": "2026-01-01T00:00:00Z",
            "package_id": "0xabc",
            "network_url": DEFAULT_LOCAL_RPC_URL,
            "coin_type": "0xabc::zpt_coin::ZPT_COIN",
        }]);
        std::fs::write(store.path(), record.to_string()).unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let env = env_from(&[
            (ENV_NETWORK, "local"),
            (ENV_DEPLOYMENTS_DIR, root.as_str()),
            (ENV_GAS_BUDGET, "5000"),
        ]);

        // when
        let config = ClientConfig::from_lookup(|key| env.get(key).cloned()).unwrap();

        // then
        assert_eq!("0xabc::zpt_coin::ZPT_COIN", config.contract.coin_type);
        assert_eq!(5000, config.gas_budget);
        assert_eq!(Some(DEFAULT_LOCAL_FAUCET_URL.to_string()), config.endpoints.faucet);
    }

    #[test]
    fn from_lookup__leaves_deployments_dir_untouched() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("deployments");
        let root_str = root.to_string_lossy().into_owned();
        let env = env_from(&[
            (ENV_NETWORK, "local"),
            (ENV_PACKAGE_ID, "0xbf"),
            (ENV_DEPLOYMENTS_DIR, root_str.as_str()),
        ]);

        // when
        let result = ClientConfig::from_lookup(|key| env.get(key).cloned());

        // then
        assert!(result.is_err());
        assert!(!root.exists());
    }

    #[test]
    fn from_lookup__errors_without_package_id() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let env = env_from(&[(ENV_DEPLOYMENTS_DIR, root.as_str())]);

        assert!(ClientConfig::from_lookup(|key| env.get(key).cloned()).is_err());
    }

    #[test]
    fn from_lookup__rejects_unknown_network() {
        let env = env_from(&[(ENV_NETWORK, "moonnet")]);

        assert!(ClientConfig::from_lookup(|key| env.get(key).cloned()).is_err());
    }

    #[test]
    fn display_created_event__wraps_nft_type() {
        let contract = ContractConfig::new(ObjectId::from_bytes([1; 32]), "0x2::sui::SUI");

        let expected = format!(
            "0x2::display::DisplayCreated<0x{}::zombie_house::ZombieNFT>",
            "01".repeat(32)
        );
        assert_eq!(expected, contract.display_created_event());
    }
}
