//! kesc: split-key escrow client
//!
//! Modes (exactly one):
//!   -e, --encrypt   encrypt input, escrow the session key, write the JSON artifact
//!   -d, --decrypt   fetch the session key for an artifact and write the plaintext
//!   -r, --remove    delete the escrowed key for an artifact
//!   -I, --info      show fail count and remove-after for an artifact

use std::io::{Read, Write};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use kesc_client::{EscrowClient, HttpKeyStore};
use kesc_core::config::KescConfig;
use kesc_core::types::InfoBody;
use kesc_core::{Envelope, EscrowError, WireEnvelope};
use kesc_crypto::{Secret, MAX_SECRET_LEN};
use secrecy::{ExposeSecret, SecretString};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "kesc",
    version,
    about = "Encrypt data and escrow its key with a kesc keystore",
    group(
        ArgGroup::new("mode")
            .required(true)
            .args(["encrypt", "decrypt", "remove", "info"])
    )
)]
struct Cli {
    /// Encrypt the input and escrow its session key
    #[arg(long, short = 'e')]
    encrypt: bool,

    /// Decrypt an artifact produced by --encrypt
    #[arg(long, short = 'd')]
    decrypt: bool,

    /// Remove the escrowed key for an artifact
    #[arg(long, short = 'r')]
    remove: bool,

    /// Show keystore bookkeeping for an artifact
    #[arg(long, short = 'I')]
    info: bool,

    /// Input file (default: stdin)
    #[arg(long, short = 'i')]
    infile: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    outfile: Option<PathBuf>,

    /// Keystore base URL (overrides [client].server)
    #[arg(long, short = 's', env = "KESC_SERVER")]
    server: Option<String>,

    /// Escrow secret, at most 32 bytes; prompted for when absent
    #[arg(long, short = 'k', env = "KESC_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Evict the escrowed key after this many failed attempts
    #[arg(
        long,
        short = 'a',
        conflicts_with_all = ["decrypt", "remove", "info"],
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    remove_after: Option<u64>,

    /// Log progress to stderr
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Path to kesc.toml configuration file
    #[arg(long, short = 'c', env = "KESC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref()).await?;

    // resolve the secret before any I/O so a bad key fails fast
    let secret = if cli.info {
        None
    } else {
        Some(read_secret(cli.key.clone())?)
    };

    let server = cli.server.clone().unwrap_or(config.client.server);
    let store = HttpKeyStore::new(&server, Duration::from_secs(config.client.timeout_secs))
        .context("building keystore client")?;
    let client = EscrowClient::new(store);
    tracing::debug!(server = %server, "using keystore");

    let input = read_input(cli.infile.as_deref()).await?;

    let output = match (cli.encrypt, cli.decrypt, cli.remove, secret) {
        (true, _, _, Some(secret)) => {
            let remove_after = cli.remove_after.and_then(NonZeroU64::new);
            let message = client
                .encrypt_and_store(&secret, &input, remove_after)
                .await
                .context("escrow failed")?;
            serde_json::to_vec(&message.to_wire())?
        }
        (_, true, _, Some(secret)) => {
            let message = parse_artifact(&input)?;
            client
                .retrieve_and_decrypt(&secret, &message)
                .await
                .context("decryption failed")?
        }
        (_, _, true, Some(secret)) => {
            let message = parse_artifact(&input)?;
            client
                .remove(&secret, &message)
                .await
                .context("remove failed")?;
            tracing::info!("escrowed key removed");
            return Ok(());
        }
        _ => {
            let message = parse_artifact(&input)?;
            let info = client.info(&message).await.context("info failed")?;
            let mut pretty = serde_json::to_vec_pretty(&InfoBody::from(info))?;
            pretty.push(b'\n');
            pretty
        }
    };

    write_output(cli.outfile.as_deref(), &output).await
}

// ── Helpers ────────────────────────────────────────────────────────────────────

async fn load_config(path: Option<&Path>) -> Result<KescConfig> {
    let Some(path) = path else {
        return Ok(KescConfig::default());
    };
    if !path.exists() {
        tracing::warn!("config file not found: {}  (using defaults)", path.display());
        return Ok(KescConfig::default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config: {}", path.display()))?;
    KescConfig::from_toml_str(&content)
        .with_context(|| format!("parsing config: {}", path.display()))
}

/// Take the secret from `--key`/`KESC_KEY`, or prompt for it without echo.
fn read_secret(key: Option<String>) -> Result<Secret> {
    let key = match key {
        Some(k) => SecretString::from(k),
        None => SecretString::from(
            rpassword::prompt_password("Key: ").context("reading key from terminal")?,
        ),
    };
    Secret::new(key.expose_secret().as_bytes()).map_err(|e| match e {
        EscrowError::KeyLength(n) => {
            anyhow::anyhow!("key must be 1 to {MAX_SECRET_LEN} bytes, got {n}")
        }
        other => other.into(),
    })
}

fn parse_artifact(input: &[u8]) -> Result<Envelope> {
    let wire: WireEnvelope =
        serde_json::from_slice(input).context("input is not a kesc artifact (ct/tag/nonce JSON)")?;
    Ok(wire.decode()?)
}

async fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(p) => tokio::fs::read(p)
            .await
            .with_context(|| format!("reading {}", p.display())),
        None => tokio::task::spawn_blocking(|| {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).map(|_| buf)
        })
        .await?
        .context("reading stdin"),
    }
}

async fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(p) => tokio::fs::write(p, data)
            .await
            .with_context(|| format!("writing {}", p.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("KESC_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["kesc", "-e", "-d", "-k", "x"]).is_err());
        assert!(Cli::try_parse_from(["kesc", "-k", "x"]).is_err());
        assert!(Cli::try_parse_from(["kesc", "-I"]).is_ok());
    }

    #[test]
    fn test_remove_after_must_be_positive() {
        assert!(Cli::try_parse_from(["kesc", "-e", "-k", "x", "-a", "0"]).is_err());
        assert!(Cli::try_parse_from(["kesc", "-e", "-k", "x", "-a", "-1"]).is_err());
        let cli = Cli::try_parse_from(["kesc", "-e", "-k", "x", "-a", "3"]).unwrap();
        assert_eq!(cli.remove_after, Some(3));
    }

    #[test]
    fn test_remove_after_only_with_encrypt() {
        for mode in ["-d", "-r", "-I"] {
            assert!(
                Cli::try_parse_from(["kesc", mode, "-k", "x", "-a", "3"]).is_err(),
                "-a accepted with {mode}"
            );
        }
        assert!(Cli::try_parse_from(["kesc", "-a", "3", "-e", "-k", "x"]).is_ok());
    }

    #[test]
    fn test_read_secret_bounds() {
        assert!(read_secret(Some("k".into())).is_ok());
        assert!(read_secret(Some("a".repeat(32))).is_ok());
        let err = read_secret(Some("a".repeat(33))).unwrap_err();
        assert_eq!(err.to_string(), "key must be 1 to 32 bytes, got 33");
        let err = read_secret(Some(String::new())).unwrap_err();
        assert_eq!(err.to_string(), "key must be 1 to 32 bytes, got 0");
    }

    #[test]
    fn test_parse_artifact_rejects_garbage() {
        assert!(parse_artifact(b"not json").is_err());
        assert!(parse_artifact(br#"{"ct":"","tag":"AA==","nonce":"AA=="}"#).is_err());
    }
}
