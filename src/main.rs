use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use quorum_client::{
    BroadcastOutcome, ChainClient, Client, ClientConfig, Config, InMemorySigner, TxSigner,
};
use quorum_crypto::{create_threshold_public_key, derive_address, verify_multisignature, PublicKey};
use quorum_tx::{decode, encode_for_broadcast, tx_hash};
use std::path::{Path, PathBuf};

mod tx_file;

use tx_file::{envelope_view, load_signatures, parse_member_key, UnsignedTx};

#[derive(Parser)]
#[command(
    name = "quorum",
    about = "Threshold transaction signing client",
    version,
    author
)]
struct Cli {
    #[arg(long, global = true, value_name = "DIR", help = "Home directory for configuration")]
    home: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Log level (trace, debug, info, warn, error)")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Derive the address of a threshold key")]
    MultisigAddress {
        #[arg(long, value_name = "N", help = "Signatures required")]
        threshold: u32,

        #[arg(long = "pubkey", value_name = "KEY", required = true, help = "Member public key, hex or base64 (repeatable)")]
        pubkeys: Vec<String>,

        #[arg(long, value_name = "PREFIX", help = "Bech32 prefix, defaults to the configured one")]
        prefix: Option<String>,
    },

    #[command(about = "Sign an unsigned multisig transaction as one member")]
    Sign {
        #[arg(value_name = "FILE", help = "Unsigned transaction file")]
        unsigned: PathBuf,

        #[arg(long, value_name = "FILE", help = "File holding the hex private key")]
        key_file: PathBuf,

        #[arg(long, value_enum, default_value_t = KeyAlgo::Secp256k1)]
        algo: KeyAlgo,
    },

    #[command(about = "Combine member signatures into a broadcast-ready transaction")]
    Multisign {
        #[arg(value_name = "FILE", help = "Unsigned transaction file")]
        unsigned: PathBuf,

        #[arg(value_name = "SIGNATURE", required = true, help = "Member signature files")]
        signatures: Vec<PathBuf>,

        #[arg(long, help = "Skip local verification of the combined signature")]
        skip_verify: bool,
    },

    #[command(about = "Decode base64 transaction bytes")]
    Decode {
        #[arg(value_name = "TX", help = "Base64 encoded transaction")]
        tx: String,
    },

    #[command(about = "Broadcast base64 transaction bytes")]
    Broadcast {
        #[arg(value_name = "TX", help = "Base64 encoded transaction")]
        tx: String,

        #[arg(long, value_name = "URL", help = "Node RPC endpoint")]
        node: Option<String>,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(about = "Display version information")]
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, help = "Replace an existing configuration")]
        overwrite: bool,
    },

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Set a configuration value")]
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyAlgo {
    Secp256k1,
    Ed25519,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = get_home_dir(cli.home);
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::MultisigAddress {
            threshold,
            pubkeys,
            prefix,
        } => {
            let config = load_config(&home, log_level)?;
            let prefix = prefix.unwrap_or(config.bech32_prefix);
            multisig_address_command(threshold, &pubkeys, &prefix)
        }
        Commands::Sign {
            unsigned,
            key_file,
            algo,
        } => {
            load_config(&home, log_level)?;
            sign_command(&unsigned, &key_file, algo).await
        }
        Commands::Multisign {
            unsigned,
            signatures,
            skip_verify,
        } => {
            load_config(&home, log_level)?;
            multisign_command(&unsigned, &signatures, skip_verify)
        }
        Commands::Decode { tx } => {
            let config = load_config(&home, log_level)?;
            decode_command(&tx, &config.bech32_prefix)
        }
        Commands::Broadcast { tx, node } => {
            let config = load_config(&home, log_level)?;
            broadcast_command(&tx, node, config).await
        }
        Commands::Config { command } => config_command(&home, command),
        Commands::Version => version_command(),
    }
}

fn multisig_address_command(threshold: u32, pubkeys: &[String], prefix: &str) -> Result<()> {
    let members = pubkeys
        .iter()
        .map(|key| parse_member_key(key))
        .collect::<Result<Vec<_>>>()?;
    let key: PublicKey = create_threshold_public_key(members, threshold)?.into();
    let address = derive_address(&key, prefix)?;

    tracing::info!(%address, threshold, members = pubkeys.len(), "derived multisig address");
    let output = serde_json::json!({
        "address": address,
        "public_key": key,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn sign_command(unsigned: &Path, key_file: &Path, algo: KeyAlgo) -> Result<()> {
    let tx = UnsignedTx::load(unsigned)?;
    let threshold_key = tx.threshold_key()?;

    let key_hex = std::fs::read_to_string(key_file)
        .with_context(|| format!("failed to read {}", key_file.display()))?;
    let key_bytes = hex::decode(key_hex.trim()).context("private key is not valid hex")?;
    let signer = match algo {
        KeyAlgo::Secp256k1 => InMemorySigner::from_secp256k1_bytes(&key_bytes)?,
        KeyAlgo::Ed25519 => InMemorySigner::from_ed25519_bytes(&key_bytes)?,
    };

    let address = signer.address();
    if threshold_key.member_index(&address).is_none() {
        bail!("key {address} is not a member of the multisig");
    }

    let signature = tx.builder()?.collect_signature(&signer, &tx.signer).await?;
    println!("{}", serde_json::to_string_pretty(&signature)?);
    Ok(())
}

fn multisign_command(unsigned: &Path, signature_files: &[PathBuf], skip_verify: bool) -> Result<()> {
    let tx = UnsignedTx::load(unsigned)?;
    let threshold_key = tx.threshold_key()?;
    let builder = tx.builder()?;
    let signatures = load_signatures(signature_files)?;

    let envelope = builder.finalize_multisig(threshold_key, tx.signer.sequence, &signatures)?;

    if !skip_verify {
        let data = envelope
            .multisig_data(0)
            .context("envelope carries no multisignature")??;
        let sign_bytes = builder.sign_bytes(&tx.signer)?;
        verify_multisignature(threshold_key, &data, &sign_bytes)
            .context("combined signature does not verify")?;
    }

    let tx_bytes = encode_for_broadcast(&envelope);
    tracing::info!(txhash = %tx_hash(&tx_bytes), "multisig transaction ready");
    println!("{}", general_purpose::STANDARD.encode(tx_bytes));
    Ok(())
}

fn decode_command(tx: &str, prefix: &str) -> Result<()> {
    let tx_bytes = general_purpose::STANDARD
        .decode(tx.trim())
        .context("transaction is not valid base64")?;
    let envelope = decode(&tx_bytes)?;
    let view = envelope_view(&envelope, &tx_hash(&tx_bytes), prefix)?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn broadcast_command(tx: &str, node: Option<String>, mut config: ClientConfig) -> Result<()> {
    let tx_bytes = general_purpose::STANDARD
        .decode(tx.trim())
        .context("transaction is not valid base64")?;
    // Reject garbage before it reaches the node
    decode(&tx_bytes)?;

    if let Some(node) = node {
        config.node = node;
    }
    let client = Client::new(Config::try_from(&config)?)?;
    let response = client.broadcast_tx(&tx_bytes).await?;

    match response.outcome() {
        BroadcastOutcome::Accepted { txhash, .. } => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            tracing::info!(%txhash, "transaction accepted");
            Ok(())
        }
        BroadcastOutcome::Rejected {
            txhash,
            code,
            codespace,
            raw_log,
        } => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            bail!("transaction {txhash} rejected ({codespace} code {code}): {raw_log}")
        }
    }
}

fn config_command(home: &Path, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { overwrite } => {
            let config = ClientConfig::init_in(home, overwrite)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Show => {
            let config = ClientConfig::load_or_default_in(home)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Set { key, value } => {
            let path = ClientConfig::config_file_in(home);
            let mut config = ClientConfig::load_or_default_in(home)?;
            config.set(&key, &value)?;
            std::fs::create_dir_all(home)?;
            config.save_to_file(&path)?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}

fn version_command() -> Result<()> {
    println!("quorum {}", env!("CARGO_PKG_VERSION"));
    println!("build: {} ({})", env!("QUORUM_BUILD_COMMIT"), env!("QUORUM_BUILD_PROFILE"));
    Ok(())
}

// Helper functions

/// Load the client configuration under `home` and install the log subscriber
fn load_config(home: &Path, log_level: Option<&str>) -> Result<ClientConfig> {
    let config = ClientConfig::load_or_default_in(home)
        .with_context(|| format!("failed to load configuration from {}", home.display()))?;
    setup_logging(log_level, &config)?;
    Ok(config)
}

fn setup_logging(log_level: Option<&str>, config: &ClientConfig) -> Result<()> {
    let level = log_level.unwrap_or(&config.log_level);
    quorum_log::init_tracing_with_level(level, config.log_format)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

fn get_home_dir(home: Option<PathBuf>) -> PathBuf {
    home.unwrap_or_else(ClientConfig::default_config_dir)
}
