use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use wallet_router::app_dir::ensure_data_dir;
use wallet_router::config::Config;
use wallet_router::error::BoxError;
use wallet_router::logging::initialize_logger;
use wallet_router::model::{Address, KeyInfo, KeyType, MsgMeta, MsgType};
use wallet_router::WalletRouter;

#[derive(Debug, Parser)]
#[command(
    name = "wallet-router",
    version,
    about = "Manage keys across local, remote and hardware wallet backends"
)]
struct Cli {
    /// Keystore file of the local backend, overrides WALLET_KEYSTORE_PATH
    #[arg(long, global = true)]
    keystore: Option<PathBuf>,

    /// Keystore passphrase; unlocks the local keystore and is used by export and delete
    #[arg(long, env = "WALLET_PASSPHRASE", hide_env_values = true, global = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new key
    New {
        #[arg(default_value = "secp256k1")]
        key_type: KeyType,
    },
    /// List addresses across all backends
    List,
    /// Check whether any backend holds the key
    Has { address: Address },
    /// Sign a hex-encoded message
    Sign {
        address: Address,
        message: String,
        /// Sign with the local keystore using --passphrase, without unlocking it
        #[arg(long)]
        with_passphrase: bool,
    },
    /// Print the key as JSON
    Export { address: Address },
    /// Import a key from a JSON file, or stdin when no file is given
    Import { file: Option<PathBuf> },
    /// Delete a key from every backend holding it
    Delete { address: Address },
    /// Set a new local keystore passphrase
    SetPassphrase { new_passphrase: String },
    /// Remove the local keystore passphrase
    ClearPassphrase,
    /// Show configured backends and keystore lock state
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "command failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BoxError> {
    let mut config = Config::load()?;
    initialize_logger(&config)?;

    if let Some(keystore) = cli.keystore {
        config.keystore_path = Some(keystore);
    } else if config.keystore_path.is_none() {
        ensure_data_dir()?;
    }

    let router = WalletRouter::new(config.open_backends()?);
    let passphrase = cli.passphrase.unwrap_or_default();

    let unlock_first = !matches!(
        cli.command,
        Command::Status | Command::Sign {
            with_passphrase: true,
            ..
        }
    );
    if unlock_first && !passphrase.is_empty() && router.backends().local.is_some() {
        router.unlock(&passphrase)?;
    }

    match cli.command {
        Command::New { key_type } => {
            println!("{}", router.new_key(key_type)?);
        }
        Command::List => {
            for address in router.list()? {
                println!("{}", address);
            }
        }
        Command::Has { address } => {
            println!("{}", router.has(&address)?);
        }
        Command::Sign {
            address,
            message,
            with_passphrase,
        } => {
            let message = hex::decode(message.trim_start_matches("0x"))?;
            let signature = if with_passphrase {
                router.sign_with_passphrase(&address, &message, &passphrase)?
            } else {
                router.sign(&address, &message, &MsgMeta::new(MsgType::Unknown))?
            };
            println!("{}", serde_json::to_string_pretty(&signature)?);
        }
        Command::Export { address } => {
            let info = router.export(&address, &passphrase)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Import { file } => {
            let json = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut json = String::new();
                    std::io::stdin().read_to_string(&mut json)?;
                    json
                }
            };
            let info: KeyInfo = serde_json::from_str(&json)?;
            println!("{}", router.import(&info)?);
        }
        Command::Delete { address } => {
            router.delete(&address, &passphrase)?;
        }
        Command::SetPassphrase { new_passphrase } => {
            router.change_passphrase(&new_passphrase)?;
        }
        Command::ClearPassphrase => {
            if !router.clear_passphrase()? {
                println!("keystore has no passphrase");
            }
        }
        Command::Status => {
            println!("{:?}", router.backends());
            if router.backends().local.is_some() {
                println!("locked: {}", router.is_locked()?);
            }
        }
    }

    Ok(())
}
