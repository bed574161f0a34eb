//! eitxt: encrypt binary files into armored text and back
//!
//! Commands:
//!   encrypt <file>      - seal a file into `<file>.eitxt`
//!   decrypt <armored>   - recover the original file
//!   inspect <armored>   - show container metadata (no passphrase needed)
//!   config show         - display current configuration
//!
//! The passphrase comes from `EITXT_PASSPHRASE` when set, otherwise from a
//! TTY prompt.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use eitxt_core::config::EitxtConfig;
use eitxt_core::{Compression, EitxtError, EncryptOptions};

const PASSPHRASE_ENV: &str = "EITXT_PASSPHRASE";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "eitxt",
    version,
    about = "Passphrase-protected text containers for binary files",
    long_about = "eitxt: seal images and other binary files into copy-pasteable armored text"
)]
struct Cli {
    /// Path to eitxt.toml configuration file
    #[arg(long, short = 'c', env = "EITXT_CONFIG", default_value = "/etc/eitxt/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "EITXT_LOG", default_value = "warn")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "EITXT_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file into an armored container
    Encrypt {
        /// File to encrypt
        file: PathBuf,
        /// Output path (default: <FILE>.eitxt)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// MIME type to record (default: guessed from the extension)
        #[arg(long)]
        mime: Option<String>,
        /// File name to record (default: the file's base name)
        #[arg(long)]
        name: Option<String>,
        /// Compression applied before encryption (overrides config)
        #[arg(long)]
        compression: Option<Compression>,
        /// Plaintext bytes per chunk (overrides config)
        #[arg(long)]
        chunk_bytes: Option<usize>,
        /// PBKDF2 iterations (overrides config)
        #[arg(long)]
        iterations: Option<u32>,
        /// Replace the output file if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Decrypt an armored container
    Decrypt {
        /// Armored container file
        armored: PathBuf,
        /// Output path (default: embedded file name in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Replace the output file if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Show container metadata without decrypting
    Inspect {
        /// Armored container file
        armored: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, &cli.log_format);

    let config = EitxtConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    match cli.command {
        Commands::Encrypt {
            file,
            output,
            mime,
            name,
            compression,
            chunk_bytes,
            iterations,
            force,
        } => {
            let options = resolve_options(&config, compression, chunk_bytes, iterations)?;
            cmd_encrypt(&config, &file, output, mime, name, options, force).await
        }
        Commands::Decrypt {
            armored,
            output,
            force,
        } => cmd_decrypt(&config, &armored, output, force).await,
        Commands::Inspect { armored, json } => cmd_inspect(&config, &armored, json).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

/// Apply command-line overrides on top of the configured defaults.
fn resolve_options(
    config: &EitxtConfig,
    compression: Option<Compression>,
    chunk_bytes: Option<usize>,
    iterations: Option<u32>,
) -> Result<EncryptOptions> {
    let mut options = config.encrypt_defaults();
    if let Some(c) = compression {
        options.compression = c;
    }
    if let Some(n) = chunk_bytes {
        options.chunk_bytes = n;
    }
    if let Some(n) = iterations {
        config.crypto.check_iterations(n)?;
        options.iterations = n;
    }
    Ok(options)
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Passphrase + file helpers ─────────────────────────────────────────────────

fn read_passphrase(confirm: bool) -> Result<SecretString> {
    if let Ok(value) = std::env::var(PASSPHRASE_ENV) {
        tracing::debug!("passphrase taken from {PASSPHRASE_ENV}");
        return Ok(SecretString::from(value));
    }

    let first = SecretString::from(
        rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
    );
    if confirm {
        let second = SecretString::from(
            rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?,
        );
        if first.expose_secret() != second.expose_secret() {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(first)
}

/// Read `path` after checking its size against `limit`.
async fn read_limited(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("not a file: {}", path.display());
    }
    if meta.len() > limit {
        return Err(EitxtError::TooLarge {
            limit,
            actual: meta.len(),
        }
        .into());
    }
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    // The file may have grown between stat and read.
    EitxtError::check_size(data.len(), limit)?;
    Ok(data)
}

/// Read an armored file; anything that is not valid UTF-8 is rejected.
async fn read_armored(path: &Path, limit: u64) -> Result<String> {
    let raw = read_limited(path, limit).await?;
    let text = String::from_utf8(raw)
        .map_err(|_| EitxtError::InvalidInput("armored text must be UTF-8".into()))?;
    Ok(text)
}

/// Write `bytes` to `path`, refusing to replace an existing file unless `force`.
async fn write_output(path: &Path, bytes: &[u8], force: bool) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut open = tokio::fs::OpenOptions::new();
    open.write(true);
    if force {
        open.create(true).truncate(true);
    } else {
        open.create_new(true);
    }
    let mut file = match open.open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            anyhow::bail!("refusing to overwrite {}; pass -o or --force", path.display())
        }
        Err(e) => return Err(e).with_context(|| format!("writing {}", path.display())),
    };
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn default_armored_path(file: &Path) -> PathBuf {
    let mut out = file.as_os_str().to_owned();
    out.push(".eitxt");
    PathBuf::from(out)
}

/// Final path component of an embedded name, never a traversal.
fn safe_file_name(embedded: &str) -> &str {
    let base = embedded.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => eitxt_crypto::request::DEFAULT_NAME,
        name => name,
    }
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `eitxt encrypt` ───────────────────────────────────────────────────────────

async fn cmd_encrypt(
    config: &EitxtConfig,
    file: &Path,
    output: Option<PathBuf>,
    mime: Option<String>,
    name: Option<String>,
    options: EncryptOptions,
    force: bool,
) -> Result<()> {
    let data = read_limited(file, config.limits.max_file_bytes).await?;
    let mime = mime.unwrap_or_else(|| guess_mime(file));
    let name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    let output = output.unwrap_or_else(|| default_armored_path(file));

    let passphrase = read_passphrase(true)?;

    let pb = make_spinner("encrypt");
    pb.set_message(format!(
        "{} ({}, {} iterations)",
        file.display(),
        fmt_bytes(data.len() as u64),
        options.iterations
    ));

    let size = data.len() as u64;
    let record_mime = mime.clone();
    let armored = tokio::task::spawn_blocking(move || {
        eitxt_crypto::encrypt_request(&data, &record_mime, &name, &passphrase, &options)
    })
    .await
    .context("encrypt task failed")?;
    let armored = match armored {
        Ok(text) => text,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };
    pb.finish_with_message("done".to_string());

    write_output(&output, armored.as_bytes(), force).await?;

    println!("Encrypted {} → {}", file.display(), output.display());
    println!("  mime:    {mime}");
    println!("  input:   {}", fmt_bytes(size));
    println!("  output:  {}", fmt_bytes(armored.len() as u64));
    Ok(())
}

// ── `eitxt decrypt` ───────────────────────────────────────────────────────────

async fn cmd_decrypt(
    config: &EitxtConfig,
    armored: &Path,
    output: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let text = read_armored(armored, config.limits.max_text_bytes).await?;

    let passphrase = read_passphrase(false)?;

    let pb = make_spinner("decrypt");
    pb.set_message(armored.display().to_string());

    let result = tokio::task::spawn_blocking(move || eitxt_crypto::decrypt_request(&text, &passphrase))
        .await
        .context("decrypt task failed")?;
    let file = match result {
        Ok(file) => file,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };
    pb.finish_with_message("done".to_string());

    let output = output.unwrap_or_else(|| PathBuf::from(safe_file_name(&file.name)));
    write_output(&output, &file.bytes, force).await?;

    println!("Decrypted {} → {}", armored.display(), output.display());
    println!("  mime:    {}", file.mime);
    println!("  size:    {}", fmt_bytes(file.bytes.len() as u64));
    Ok(())
}

// ── `eitxt inspect` ───────────────────────────────────────────────────────────

async fn cmd_inspect(config: &EitxtConfig, armored: &Path, json: bool) -> Result<()> {
    let text = read_armored(armored, config.limits.max_text_bytes).await?;
    let summary = eitxt_crypto::inspect(&text)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serializing summary")?
        );
        return Ok(());
    }

    println!("name:         {}", summary.name);
    println!("mime:         {}", summary.mime);
    println!("size:         {} ({} bytes)", fmt_bytes(summary.size), summary.size);
    println!("created:      {}", summary.created_at);
    println!("compression:  {}", summary.compression);
    println!("cipher:       {}", summary.cipher);
    println!("kdf:          {} ({} iterations)", summary.kdf_alg, summary.iterations);
    println!("chunks:       {} x {}", summary.chunks, fmt_bytes(summary.chunk_bytes));
    Ok(())
}

// ── `eitxt config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &EitxtConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
