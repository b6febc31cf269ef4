//! crypto-cli - Encrypt and decrypt strings and files
//!
//! Usage:
//!   crypto-cli run --mode encrypt --scheme gcm --input hello --password-file pw.txt
//!   crypto-cli config [task.yaml]   - Run the task declared in a config file
//!   crypto-cli hash --file <path>   - Digest a string or file
//!   crypto-cli schemes              - List available schemes

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use crypto_cli::{
    batch::{
        count_failures, BatchOptions, BatchRunner, FileMode, FileOutcome, Operation, ProgressFn,
    },
    config::{expand_tilde, Config, InputType},
    crypto::{
        decode_salt, encode_salt, required_key_length, OsRandom, SchemeRegistry, SecretKey,
    },
    integrity::{hash_bytes, hash_file, ChecksumStatus, DigestAlgorithm},
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "crypto-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Encrypt and decrypt strings and files with pluggable schemes")]
struct Cli {
    /// Configuration file path (default: ~/.config/crypto-cli/config.yaml, if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt or decrypt strings or files
    Run(RunArgs),

    /// Run the task declared in a config file
    Config {
        /// Task file (defaults to --config)
        file: Option<PathBuf>,
    },

    /// Digest a string or a file
    Hash {
        /// String to digest
        #[arg(short, long, conflicts_with = "file")]
        input: Option<String>,

        /// File to digest
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Digest algorithm (sha256, sha384, sha512; md5 is intentionally unsupported)
        #[arg(short, long, default_value = "sha256")]
        algo: String,

        /// Expected hex digest to compare against
        #[arg(long)]
        compare: Option<String>,
    },

    /// List available schemes
    Schemes,
}

#[derive(Args)]
struct RunArgs {
    /// encrypt or decrypt
    #[arg(short, long)]
    mode: String,

    /// Scheme name (defaults to the config's default_scheme)
    #[arg(short, long)]
    scheme: Option<String>,

    /// What the inputs are: string or file
    #[arg(short = 't', long = "type", default_value = "string")]
    input_type: String,

    /// Inputs (repeatable or comma separated)
    #[arg(short, long, required = true, value_delimiter = ',')]
    input: Vec<String>,

    /// Raw key (must match the scheme's key length)
    #[arg(short, long, conflicts_with_all = ["password", "password_file", "prompt_password"])]
    key: Option<String>,

    /// Password for key derivation
    #[arg(short, long)]
    password: Option<String>,

    /// Read the password from a file
    #[arg(long, conflicts_with = "password")]
    password_file: Option<PathBuf>,

    /// Prompt for the password
    #[arg(long, conflicts_with_all = ["password", "password_file"])]
    prompt_password: bool,

    /// Salt (hex) used with the password; generated when omitted on encrypt
    #[arg(long)]
    salt: Option<String>,

    /// Process files with one worker per file
    #[arg(long)]
    concurrent: bool,

    /// Use the chunked CBC stream pipeline for files
    #[arg(long)]
    stream: bool,

    /// Output file (single input) or directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip writing and checking .sha256 sidecars
    #[arg(long)]
    no_checksum: bool,

    /// Write .meta.yaml sidecars on encrypt
    #[arg(long)]
    metadata: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    config.apply_env_overrides();

    if let Err(e) = init_logging(&cli, &config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    match run_command(cli.command, cli.config.as_deref(), &config) {
        Ok(0) => {}
        Ok(failures) => {
            error!("{} input(s) failed", failures);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let level = if cli.verbose {
        "debug"
    } else {
        cli.log_level.as_deref().unwrap_or(&config.logging.level)
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
    };

    let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let path = expand_tilde(&path);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to install logger: {}", e))
}

/// Returns the number of inputs that failed
fn run_command(
    command: Commands,
    config_path: Option<&Path>,
    config: &Config,
) -> anyhow::Result<usize> {
    match command {
        Commands::Run(args) => cmd_run(args, config),
        Commands::Config { file } => cmd_config(file.as_deref().or(config_path), config),
        Commands::Hash {
            input,
            file,
            algo,
            compare,
        } => cmd_hash(input, file, &algo, compare),
        Commands::Schemes => cmd_schemes(),
    }
}

/// Everything a batch needs, however it was requested
struct Job {
    op: Operation,
    scheme: String,
    input_type: InputType,
    inputs: Vec<String>,
    concurrent: bool,
    options: BatchOptions,
}

fn cmd_run(args: RunArgs, config: &Config) -> anyhow::Result<usize> {
    let op: Operation = args.mode.parse()?;
    let scheme = args
        .scheme
        .clone()
        .unwrap_or_else(|| config.default_scheme.clone())
        .to_lowercase();
    let input_type: InputType = args.input_type.parse()?;

    let password = read_password(&args, config)?;
    let salt = match &args.salt {
        Some(hex) => Some(decode_salt(hex)?),
        None => config.salt.clone(),
    };
    let key = resolve_key(args.key.as_deref(), password, salt, &scheme, op)?;

    let stream = args.stream || config.stream;
    let job = Job {
        op,
        scheme,
        input_type,
        inputs: args.input,
        concurrent: args.concurrent || config.concurrent,
        options: BatchOptions {
            file_mode: if stream { FileMode::Streamed } else { FileMode::Buffered },
            checksums: config.checksums && !args.no_checksum,
            metadata: config.metadata || args.metadata,
            output: args.output.map(|p| expand_tilde(&p)),
        },
    };

    execute(job, key)
}

fn cmd_config(path: Option<&Path>, base: &Config) -> anyhow::Result<usize> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load(expand_tilde(path))
                .with_context(|| format!("Failed to load task file {:?}", path))?;
            config.apply_env_overrides();
            config
        }
        None => base.clone(),
    };

    let task = config
        .task
        .clone()
        .ok_or_else(|| anyhow!("No task declared in the config file"))?;

    let password = config.default_password.clone().map(Zeroizing::new);
    let key = resolve_key(
        None,
        password,
        config.salt.clone(),
        &config.default_scheme,
        task.mode,
    )?;

    let job = Job {
        op: task.mode,
        scheme: config.default_scheme.clone(),
        input_type: task.input_type,
        inputs: task.inputs,
        concurrent: config.concurrent,
        options: BatchOptions {
            file_mode: if config.stream { FileMode::Streamed } else { FileMode::Buffered },
            checksums: config.checksums,
            metadata: config.metadata,
            output: task.output.map(|p| expand_tilde(&p)),
        },
    };

    execute(job, key)
}

fn read_password(args: &RunArgs, config: &Config) -> anyhow::Result<Option<Zeroizing<String>>> {
    if let Some(password) = &args.password {
        return Ok(Some(Zeroizing::new(password.clone())));
    }

    if let Some(path) = &args.password_file {
        let content = Zeroizing::new(
            std::fs::read_to_string(expand_tilde(path))
                .with_context(|| format!("Failed to read password file {:?}", path))?,
        );
        return Ok(Some(Zeroizing::new(content.trim().to_string())));
    }

    if args.prompt_password {
        let password = rpassword::prompt_password("Enter encryption password: ")
            .context("Failed to read password")?;
        return Ok(Some(Zeroizing::new(password)));
    }

    if args.key.is_none() {
        return Ok(config.default_password.clone().map(Zeroizing::new));
    }

    Ok(None)
}

fn resolve_key(
    raw: Option<&str>,
    password: Option<Zeroizing<String>>,
    salt: Option<Vec<u8>>,
    scheme: &str,
    op: Operation,
) -> anyhow::Result<SecretKey> {
    if let Some(raw) = raw {
        let key = SecretKey::from_bytes(raw.as_bytes().to_vec());
        key.validate_for(scheme)?;
        return Ok(key);
    }

    let password = password.ok_or_else(|| {
        anyhow!("A key or password is required (--key, --password, --password-file or --prompt-password)")
    })?;

    match salt {
        Some(salt) => Ok(SecretKey::from_password(password.as_bytes(), &salt, scheme)?),
        None if op == Operation::Decrypt => {
            bail!("Decrypting with a password needs the salt used to encrypt (--salt)")
        }
        None => {
            let key = SecretKey::from_password_with_new_salt(password.as_bytes(), scheme, &OsRandom)?;
            if let Some(salt) = key.salt() {
                let salt = encode_salt(salt);
                info!("Generated salt (save this for decryption): {}", salt);
                println!("Salt: {}", salt);
            }
            Ok(key)
        }
    }
}

fn execute(job: Job, key: SecretKey) -> anyhow::Result<usize> {
    let registry = SchemeRegistry::with_defaults();
    let runner = BatchRunner::new(&registry, &job.scheme, key, job.options)?;
    info!(
        "{} {} input(s) with {}",
        job.op,
        job.inputs.len(),
        runner.scheme_name()
    );

    let failures = match job.input_type {
        InputType::String => {
            let results = runner.process_strings(job.op, &job.inputs);
            let mut failures = 0;
            for (input, result) in job.inputs.iter().zip(results) {
                match result {
                    Ok(out) => match job.op {
                        Operation::Encrypt => println!("Encrypted: {}", out),
                        Operation::Decrypt => println!("Decrypted: {}", out),
                    },
                    Err(e) => {
                        failures += 1;
                        error!("Failed to {} '{}': {}", job.op, input, e);
                    }
                }
            }
            failures
        }
        InputType::File => {
            let paths = file_paths(&job.inputs);
            let runner = runner.with_progress(progress_bars());
            let outcomes = if job.concurrent {
                runner.process_files_concurrent(job.op, &paths)
            } else {
                runner.process_files(job.op, &paths)
            };
            report_files(job.op, &outcomes);
            count_failures(&outcomes)
        }
    };

    Ok(failures)
}

/// File inputs are paths; stray whitespace around them is dropped.
/// String inputs are never passed through here.
fn file_paths(inputs: &[String]) -> Vec<PathBuf> {
    inputs
        .iter()
        .map(|p| expand_tilde(Path::new(p.trim())))
        .collect()
}

/// One read-progress bar per input file
fn progress_bars() -> ProgressFn {
    let multi = MultiProgress::new();
    let bars: Mutex<HashMap<PathBuf, ProgressBar>> = Mutex::new(HashMap::new());
    let style = ProgressStyle::with_template(
        "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");

    Arc::new(move |input: &Path, read: u64, total: u64| {
        let Ok(mut bars) = bars.lock() else {
            return;
        };
        let bar = bars.entry(input.to_path_buf()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(total));
            bar.set_style(style.clone());
            bar.set_prefix(
                input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            bar
        });
        bar.set_length(total);
        bar.set_position(read);
        if read >= total {
            bar.finish_with_message("read");
        }
    })
}

fn report_files(op: Operation, outcomes: &[FileOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                println!(
                    "{}: {} -> {}",
                    op,
                    report.input.display(),
                    report.output.display()
                );
                match &report.checksum {
                    Some(ChecksumStatus::Match) => {
                        println!("Checksum OK: decrypted output matches the original")
                    }
                    Some(ChecksumStatus::Mismatch { .. }) => {
                        println!("WARNING: decrypted output does not match the recorded checksum")
                    }
                    _ => {}
                }
            }
            Err(e) => error!("Failed to {} {:?}: {}", op, outcome.input, e),
        }
    }
}

fn cmd_hash(
    input: Option<String>,
    file: Option<PathBuf>,
    algo: &str,
    compare: Option<String>,
) -> anyhow::Result<usize> {
    let algorithm: DigestAlgorithm = algo.parse()?;

    let digest = match (input, file) {
        (Some(input), _) => {
            let digest = hash_bytes(algorithm, input.as_bytes());
            println!("{} hash: {}", algorithm, digest);
            digest
        }
        (None, Some(file)) => {
            let path = expand_tilde(&file);
            let digest = hash_file(algorithm, &path)
                .with_context(|| format!("Failed to hash {:?}", path))?;
            println!("{} file hash: {}", algorithm, digest);
            digest
        }
        (None, None) => bail!("Provide either --input or --file"),
    };

    if let Some(expected) = compare {
        let expected = expected.trim().to_lowercase();
        if expected == digest {
            println!("Hash matches");
        } else {
            warn!("Hash mismatch");
            println!("Hash mismatch\nExpected: {}\nGot:      {}", expected, digest);
            return Ok(1);
        }
    }

    Ok(0)
}

fn cmd_schemes() -> anyhow::Result<usize> {
    let registry = SchemeRegistry::with_defaults();
    for name in registry.list() {
        let key_len = required_key_length(&name)?;
        let kind = match registry.resolve(&name) {
            Some(scheme) if scheme.is_authenticated() => "authenticated",
            _ => "confidentiality only",
        };
        println!("{:<8} {:>2}-byte key  {}", name, key_len, kind);
    }
    Ok(0)
}
