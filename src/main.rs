use color_eyre::eyre::{
    Result,
    eyre,
};
use zombie_house::{
    ClientConfig,
    amount::DEFAULT_DECIMALS,
    signing::{
        Ed25519Keypair,
        Signer,
    },
    wallets,
};

const WALLET_ENV: &str = "ZOMBIE_HOUSE_WALLET";
const WALLET_DIR_ENV: &str = "ZOMBIE_HOUSE_WALLET_DIR";

fn load_keypair() -> Result<Ed25519Keypair> {
    if let Some(keypair) = wallets::keypair_from_env(|key| std::env::var(key).ok())? {
        return Ok(keypair);
    }
    let name = std::env::var(WALLET_ENV).map_err(|_| {
        eyre!(
            "no signer configured: set {} or {WALLET_ENV}",
            wallets::SECRET_KEY_ENV
        )
    })?;
    let dir = wallets::resolve_wallet_dir(std::env::var(WALLET_DIR_ENV).ok().as_deref())?;
    let descriptor = wallets::find_wallet(&dir, &name)?;
    wallets::unlock_wallet(&descriptor)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    zombie_house::init_tracing();

    let config = ClientConfig::from_env()?;
    let client = config.connect()?;
    let keypair = load_keypair()?;
    let owner = keypair.address();
    tracing::info!(%owner, "starting zombie-house client");

    let native = client
        .get_coin_amount(&owner, None, DEFAULT_DECIMALS)
        .await?;
    let coin_type = client.contract().coin_type.clone();
    let game_coin = client
        .get_coin_amount(&owner, Some(coin_type.as_str()), DEFAULT_DECIMALS)
        .await?;
    println!("address:    {owner}");
    println!("SUI:        {native}");
    println!("{coin_type}: {game_coin}");

    match client.locate_game_info_object().await? {
        Some(game_info_id) => {
            let owned = client
                .count_zombies_owned_by(&game_info_id, owner.as_str())
                .await?;
            println!("game info:  {game_info_id}");
            println!("zombies:    {owned}");
        }
        None => println!("game info:  not deployed"),
    }
    Ok(())
}
