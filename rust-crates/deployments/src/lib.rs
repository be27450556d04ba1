use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Main,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Main => "main",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Main => "Mainnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

impl FromStr for DeploymentEnv {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "devnet" => Ok(DeploymentEnv::Dev),
            "test" | "testnet" => Ok(DeploymentEnv::Test),
            "main" | "mainnet" => Ok(DeploymentEnv::Main),
            "local" | "localnet" => Ok(DeploymentEnv::Local),
            other => Err(anyhow!("unknown deployment environment '{other}'")),
        }
    }
}

/// One published version of the zombie house package on a network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: DateTime<Utc>,
    pub package_id: String,
    pub network_url: String,
    #[serde(default)]
    pub coin_type: Option<String>,
    #[serde(default)]
    pub publish_digest: Option<String>,
}

#[derive(Debug)]
pub struct DeploymentStore {
    root: PathBuf,
    env: DeploymentEnv,
}

impl DeploymentStore {
    /// Points at `<root>/<env>/deployments.json`. Nothing is touched on disk.
    pub fn at(root: &Path, env: DeploymentEnv) -> Self {
        Self {
            root: root.to_path_buf(),
            env,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(self.env.dir_name()).join(DEPLOYMENTS_FILE)
    }

    /// Latest record, if any has been saved. A missing file is `None`.
    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(read_records(&path)?.pop())
    }
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    if let Ok(records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(vec![record]);
    }
    Err(anyhow!(
        "Failed to parse deployment records JSON; expected a list of deployment objects"
    ))
}
