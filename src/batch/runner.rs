//! Scheme-agnostic batch runner

use super::progress::{ProgressFn, ProgressReader};
use super::{BatchOptions, FileMode, FileOutcome, FileReport, Operation};
use crate::crypto::{CipherScheme, OsRandom, RandomSource, SchemeRegistry, SecretKey, SCHEME_CBC};
use crate::error::{Error, Result};
use crate::integrity::{
    read_metadata, sha256_hex, verify_checksum, with_suffix, write_checksum, write_metadata,
    ChecksumStatus, Metadata,
};
use crate::stream;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Applies one scheme and one key to many inputs.
///
/// Cloning is cheap: the scheme, key and random source are shared read-only,
/// which is what lets every concurrent worker own a copy.
#[derive(Clone)]
pub struct BatchRunner {
    scheme: Arc<dyn CipherScheme>,
    scheme_name: String,
    key: Arc<SecretKey>,
    random: Arc<dyn RandomSource>,
    progress: Option<ProgressFn>,
    options: BatchOptions,
}

impl BatchRunner {
    /// Resolve `scheme` and validate `key` against it before any work starts
    pub fn new(
        registry: &SchemeRegistry,
        scheme: &str,
        key: SecretKey,
        options: BatchOptions,
    ) -> Result<Self> {
        let resolved = registry.require(scheme)?;
        resolved.check_key(key.as_bytes())?;

        if options.file_mode == FileMode::Streamed && resolved.name() != SCHEME_CBC {
            return Err(Error::UnsupportedScheme(format!(
                "streaming requires cbc, got {}",
                scheme
            )));
        }

        Ok(BatchRunner {
            scheme: resolved,
            scheme_name: scheme.to_string(),
            key: Arc::new(key),
            random: Arc::new(OsRandom),
            progress: None,
            options,
        })
    }

    /// Use a specific IV source for streamed files
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Report read progress for every input file
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn scheme_name(&self) -> &str {
        &self.scheme_name
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Encrypt to an envelope, or decrypt an envelope to text
    pub fn process_string(&self, op: Operation, input: &str) -> Result<String> {
        match op {
            Operation::Encrypt => self.scheme.encrypt(input.as_bytes(), self.key.as_bytes()),
            Operation::Decrypt => {
                let plain = self.scheme.decrypt(input, self.key.as_bytes())?;
                Ok(String::from_utf8_lossy(&plain).into_owned())
            }
        }
    }

    /// Process strings one at a time, in order
    pub fn process_strings(&self, op: Operation, inputs: &[String]) -> Vec<Result<String>> {
        inputs
            .iter()
            .map(|input| self.process_string(op, input))
            .collect()
    }

    /// Where the result for `input` is written
    pub fn output_path_for(&self, op: Operation, input: &Path) -> PathBuf {
        match &self.options.output {
            Some(dir) if dir.is_dir() => {
                let name = input
                    .file_name()
                    .map(|n| n.to_owned())
                    .unwrap_or_else(|| input.as_os_str().to_owned());
                with_suffix(&dir.join(name), op.output_suffix())
            }
            Some(path) => path.clone(),
            None => with_suffix(input, op.output_suffix()),
        }
    }

    /// Every output must belong to exactly one input and must not be read by
    /// another input of the same batch. Returns, per input, why it is refused.
    fn output_conflicts(&self, op: Operation, inputs: &[PathBuf]) -> Vec<Option<String>> {
        let outputs: Vec<PathBuf> = inputs
            .iter()
            .map(|input| resolved_path(&self.output_path_for(op, input)))
            .collect();

        let mut claims: HashMap<&Path, usize> = HashMap::new();
        for output in &outputs {
            *claims.entry(output.as_path()).or_insert(0) += 1;
        }
        let sources: HashSet<PathBuf> = inputs.iter().map(|input| resolved_path(input)).collect();

        outputs
            .iter()
            .map(|output| {
                let claimed = claims.get(output.as_path()).copied().unwrap_or(0);
                if claimed > 1 {
                    Some(format!(
                        "output {:?} would be written by {} inputs",
                        output, claimed
                    ))
                } else if sources.contains(output) {
                    Some(format!("output {:?} is also an input of this batch", output))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Process files one at a time, in input order
    pub fn process_files(&self, op: Operation, inputs: &[PathBuf]) -> Vec<FileOutcome> {
        let conflicts = self.output_conflicts(op, inputs);

        inputs
            .iter()
            .zip(conflicts)
            .map(|(input, conflict)| FileOutcome {
                input: input.clone(),
                result: match conflict {
                    Some(message) => Err(Error::InvalidConfig(message)),
                    None => self.process_file(op, input),
                },
            })
            .collect()
    }

    /// Process files with one blocking worker each, waiting for all of them.
    ///
    /// Must not be called from inside a Tokio runtime; use
    /// [`BatchRunner::process_files_async`] there.
    pub fn process_files_concurrent(&self, op: Operation, inputs: &[PathBuf]) -> Vec<FileOutcome> {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let message = format!("Failed to start worker runtime: {}", e);
                return inputs
                    .iter()
                    .map(|input| FileOutcome {
                        input: input.clone(),
                        result: Err(Error::Internal(message.clone())),
                    })
                    .collect();
            }
        };

        runtime.block_on(self.process_files_async(op, inputs))
    }

    /// Spawn one blocking worker per file and join them all.
    ///
    /// Inputs whose output collides with another input's are refused before
    /// any worker starts. Outcomes come back in input order; completion order
    /// is unspecified.
    pub async fn process_files_async(&self, op: Operation, inputs: &[PathBuf]) -> Vec<FileOutcome> {
        let conflicts = self.output_conflicts(op, inputs);

        let workers = inputs.iter().cloned().zip(conflicts).map(|(input, conflict)| {
            let handle = match conflict {
                Some(message) => Err(message),
                None => {
                    let runner = self.clone();
                    let path = input.clone();
                    Ok(tokio::task::spawn_blocking(move || runner.process_file(op, &path)))
                }
            };

            async move {
                let result = match handle {
                    Err(message) => Err(Error::InvalidConfig(message)),
                    Ok(handle) => match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(Error::Internal(format!(
                            "worker for {:?} did not finish: {}",
                            input, e
                        ))),
                    },
                };
                FileOutcome { input, result }
            }
        });

        join_all(workers).await
    }

    /// Encrypt or decrypt a single file
    pub fn process_file(&self, op: Operation, input: &Path) -> Result<FileReport> {
        let output = self.output_path_for(op, input);
        debug!("Worker start: {} {:?}", op, input);

        let report = match (op, self.options.file_mode) {
            (Operation::Encrypt, FileMode::Buffered) => self.encrypt_buffered(input, output)?,
            (Operation::Decrypt, FileMode::Buffered) => self.decrypt_buffered(input, output)?,
            (Operation::Encrypt, FileMode::Streamed) => {
                let reader = BufReader::new(self.open_input(input)?);
                let writer = BufWriter::new(File::create(&output)?);
                let summary =
                    stream::encrypt_stream(reader, writer, self.key.as_bytes(), self.random.as_ref())?;
                self.after_encrypt(input, &summary.plaintext_sha256)?;
                FileReport {
                    input: input.to_path_buf(),
                    output,
                    bytes_written: summary.bytes_written,
                    plaintext_sha256: summary.plaintext_sha256,
                    checksum: None,
                }
            }
            (Operation::Decrypt, FileMode::Streamed) => {
                let reader = BufReader::new(self.open_input(input)?);
                let writer = BufWriter::new(File::create(&output)?);
                let summary = stream::decrypt_stream(reader, writer, self.key.as_bytes())?;
                let checksum = self.after_decrypt(input, &summary.plaintext_sha256);
                FileReport {
                    input: input.to_path_buf(),
                    output,
                    bytes_written: summary.bytes_written,
                    plaintext_sha256: summary.plaintext_sha256,
                    checksum,
                }
            }
        };

        info!("{}: {:?} -> {:?}", op, report.input, report.output);
        Ok(report)
    }

    /// Open `input` for reading, reporting progress if a callback is set
    fn open_input(&self, input: &Path) -> Result<ProgressReader<File>> {
        let file = File::open(input)?;
        let total = file.metadata()?.len();
        Ok(ProgressReader::new(file, input, total, self.progress.clone()))
    }

    fn read_input(&self, input: &Path) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open_input(input)?.read_to_end(&mut data)?;
        Ok(data)
    }

    fn encrypt_buffered(&self, input: &Path, output: PathBuf) -> Result<FileReport> {
        let data = self.read_input(input)?;
        let envelope = self.scheme.encrypt(&data, self.key.as_bytes())?;
        fs::write(&output, envelope.as_bytes())?;

        let plaintext_sha256 = sha256_hex(&data);
        self.after_encrypt(input, &plaintext_sha256)?;

        Ok(FileReport {
            input: input.to_path_buf(),
            output,
            bytes_written: envelope.len() as u64,
            plaintext_sha256,
            checksum: None,
        })
    }

    fn decrypt_buffered(&self, input: &Path, output: PathBuf) -> Result<FileReport> {
        let raw = self.read_input(input)?;
        let envelope = String::from_utf8(raw)
            .map_err(|_| Error::MalformedEnvelope("envelope file is not text".to_string()))?;
        let plain = self.scheme.decrypt(&envelope, self.key.as_bytes())?;
        fs::write(&output, &plain)?;

        let plaintext_sha256 = sha256_hex(&plain);
        let checksum = self.after_decrypt(input, &plaintext_sha256);

        Ok(FileReport {
            input: input.to_path_buf(),
            output,
            bytes_written: plain.len() as u64,
            plaintext_sha256,
            checksum,
        })
    }

    /// Sidecars are keyed by the source path
    fn after_encrypt(&self, input: &Path, plaintext_sha256: &str) -> Result<()> {
        if self.options.checksums {
            write_checksum(input, plaintext_sha256)?;
            info!("SHA256 {} {:?}", plaintext_sha256, input);
        }
        if self.options.metadata {
            let meta = Metadata::new(input, &self.scheme_name, &self.key);
            write_metadata(input, &meta)?;
        }
        Ok(())
    }

    /// Best-effort verification; never fails the decrypt
    fn after_decrypt(&self, input: &Path, plaintext_sha256: &str) -> Option<ChecksumStatus> {
        let origin = original_path(input);

        if self.options.metadata || self.options.checksums {
            match read_metadata(&origin) {
                Ok(Some(meta)) if meta.scheme != self.scheme_name => warn!(
                    "{:?} was encrypted with {}, decrypting with {}",
                    origin, meta.scheme, self.scheme_name
                ),
                Ok(_) => {}
                Err(e) => debug!("Ignoring unreadable metadata for {:?}: {}", origin, e),
            }
        }

        if !self.options.checksums {
            return None;
        }

        let mut status = verify_checksum(&origin, plaintext_sha256);
        if matches!(status, Ok(ChecksumStatus::Missing)) && origin != input {
            status = verify_checksum(input, plaintext_sha256);
        }

        match status {
            Ok(ChecksumStatus::Match) => {
                info!("Decrypted output of {:?} matches the original checksum", input);
                Some(ChecksumStatus::Match)
            }
            Ok(ChecksumStatus::Missing) => {
                debug!("No checksum record for {:?}", origin);
                Some(ChecksumStatus::Missing)
            }
            Ok(mismatch) => {
                if let Some(err) = mismatch.to_error(&origin) {
                    warn!("{}", err);
                }
                Some(mismatch)
            }
            Err(e) => {
                warn!("Could not read checksum record for {:?}: {}", origin, e);
                None
            }
        }
    }
}

/// Lexically distinct spellings of one location (`./a`, `dir/../a`) compare
/// equal after this; paths whose directory does not exist are kept as given
fn resolved_path(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Plaintext path an encrypted input came from (`x.enc` -> `x`)
fn original_path(input: &Path) -> PathBuf {
    input
        .to_str()
        .and_then(|s| s.strip_suffix(".enc"))
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| input.to_path_buf())
}
