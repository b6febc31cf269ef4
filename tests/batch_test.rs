//! End-to-end batch behaviour through the public API

use crypto_cli::batch::{count_failures, BatchOptions, BatchRunner, FileMode, Operation};
use crypto_cli::crypto::{RandomSource, SchemeRegistry, SecretKey};
use crypto_cli::integrity::{checksum_path, sha256_hex, ChecksumStatus};
use crypto_cli::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Deterministic IVs and nonces so two runs can be compared byte for byte
struct FixedRandom;

impl RandomSource for FixedRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        dest.fill(0x42);
        Ok(())
    }
}

fn key_for(scheme: &str) -> SecretKey {
    match scheme {
        "chacha" => SecretKey::from_bytes(b"0123456789abcdef0123456789abcdef".to_vec()),
        _ => SecretKey::from_bytes(b"1234567890abcdef".to_vec()),
    }
}

fn fixed_runner(scheme: &str, options: BatchOptions) -> BatchRunner {
    let random: Arc<dyn RandomSource> = Arc::new(FixedRandom);
    let registry = SchemeRegistry::with_random(random.clone());
    BatchRunner::new(&registry, scheme, key_for(scheme), options)
        .unwrap()
        .with_random(random)
}

fn write_inputs(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("file-{}.txt", i));
            let body: Vec<u8> = (0..(i * 97 + 5)).map(|b| (b * 31 + i) as u8).collect();
            fs::write(&path, body).unwrap();
            path
        })
        .collect()
}

fn assert_concurrent_matches_sequential(scheme: &str, file_mode: FileMode, count: usize) {
    let seq_dir = TempDir::new().unwrap();
    let con_dir = TempDir::new().unwrap();
    let seq_inputs = write_inputs(seq_dir.path(), count);
    let con_inputs = write_inputs(con_dir.path(), count);

    let options = BatchOptions {
        file_mode,
        ..BatchOptions::default()
    };
    let runner = fixed_runner(scheme, options);

    let sequential = runner.process_files(Operation::Encrypt, &seq_inputs);
    let concurrent = runner.process_files_concurrent(Operation::Encrypt, &con_inputs);
    assert_eq!(count_failures(&sequential), 0);
    assert_eq!(count_failures(&concurrent), 0);

    for (seq, con) in sequential.iter().zip(&concurrent) {
        let seq_out = &seq.result.as_ref().unwrap().output;
        let con_out = &con.result.as_ref().unwrap().output;
        assert_eq!(
            fs::read(seq_out).unwrap(),
            fs::read(con_out).unwrap(),
            "{} {:?} with {} files",
            scheme,
            file_mode,
            count
        );
    }
}

#[test]
fn concurrent_batch_matches_sequential() {
    for count in [1, 2, 10] {
        for scheme in ["cbc", "gcm", "chacha"] {
            assert_concurrent_matches_sequential(scheme, FileMode::Buffered, count);
        }
        assert_concurrent_matches_sequential("cbc", FileMode::Streamed, count);
    }
}

#[test]
fn concurrent_round_trip_restores_every_file() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = write_inputs(temp_dir.path(), 10);
    let originals: Vec<Vec<u8>> = inputs.iter().map(|p| fs::read(p).unwrap()).collect();

    let registry = SchemeRegistry::with_defaults();
    let runner = BatchRunner::new(&registry, "chacha", key_for("chacha"), BatchOptions::default())
        .unwrap();

    let encrypted = runner.process_files_concurrent(Operation::Encrypt, &inputs);
    let enc_paths: Vec<PathBuf> = encrypted
        .iter()
        .map(|o| o.result.as_ref().unwrap().output.clone())
        .collect();

    let decrypted = runner.process_files_concurrent(Operation::Decrypt, &enc_paths);
    for (outcome, original) in decrypted.iter().zip(&originals) {
        let report = outcome.result.as_ref().unwrap();
        assert_eq!(&fs::read(&report.output).unwrap(), original);
        assert_eq!(report.checksum, Some(ChecksumStatus::Match));
    }
}

#[test]
fn one_bad_file_does_not_stop_the_others() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = write_inputs(temp_dir.path(), 3);

    let registry = SchemeRegistry::with_defaults();
    let runner =
        BatchRunner::new(&registry, "gcm", key_for("gcm"), BatchOptions::default()).unwrap();
    let encrypted = runner.process_files(Operation::Encrypt, &inputs);
    let mut enc_paths: Vec<PathBuf> = encrypted
        .iter()
        .map(|o| o.result.as_ref().unwrap().output.clone())
        .collect();

    // tamper with the middle envelope
    let mut raw = hex::decode(fs::read_to_string(&enc_paths[1]).unwrap()).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    fs::write(&enc_paths[1], hex::encode(raw)).unwrap();
    enc_paths.push(temp_dir.path().join("absent.enc"));

    let outcomes = runner.process_files_concurrent(Operation::Decrypt, &enc_paths);
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1].result, Err(Error::AuthenticationFailure)));
    assert!(outcomes[2].is_ok());
    assert!(matches!(outcomes[3].result, Err(Error::Io(_))));
    assert_eq!(count_failures(&outcomes), 2);
    assert!(!temp_dir.path().join("file-1.txt.enc.dec").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn async_batch_inside_a_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = write_inputs(temp_dir.path(), 4);

    let runner = fixed_runner("cbc", BatchOptions::default());
    let outcomes = runner.process_files_async(Operation::Encrypt, &inputs).await;

    let order: Vec<&PathBuf> = outcomes.iter().map(|o| &o.input).collect();
    assert_eq!(order, inputs.iter().collect::<Vec<_>>());
    assert_eq!(count_failures(&outcomes), 0);
}

#[test]
fn checksum_sidecar_written_and_verified() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("report.csv");
    fs::write(&plain, b"a,b\n1,2\n").unwrap();

    let registry = SchemeRegistry::with_defaults();
    let runner =
        BatchRunner::new(&registry, "cbc", key_for("cbc"), BatchOptions::default()).unwrap();

    let enc = runner.process_file(Operation::Encrypt, &plain).unwrap();
    assert_eq!(
        fs::read_to_string(checksum_path(&plain)).unwrap(),
        sha256_hex(b"a,b\n1,2\n")
    );

    // the plaintext can be gone; only its sidecar is needed
    fs::remove_file(&plain).unwrap();
    let dec = runner.process_file(Operation::Decrypt, &enc.output).unwrap();
    assert_eq!(dec.output, temp_dir.path().join("report.csv.enc.dec"));
    assert_eq!(dec.checksum, Some(ChecksumStatus::Match));
}

#[test]
fn wrong_password_reports_checksum_mismatch_for_cbc() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("notes.txt");
    fs::write(&plain, vec![b'x'; 64]).unwrap();
    let salt = [9u8; 16];

    let registry = SchemeRegistry::with_defaults();
    let good = SecretKey::from_password(b"right", &salt, "cbc").unwrap();
    let runner = BatchRunner::new(&registry, "cbc", good, BatchOptions::default()).unwrap();
    let enc = runner.process_file(Operation::Encrypt, &plain).unwrap();

    let bad = SecretKey::from_password(b"wrong", &salt, "cbc").unwrap();
    let runner = BatchRunner::new(&registry, "cbc", bad, BatchOptions::default()).unwrap();
    match runner.process_file(Operation::Decrypt, &enc.output) {
        // garbage usually fails padding validation
        Err(Error::InvalidPadding(_)) => {}
        Ok(report) => assert!(matches!(
            report.checksum,
            Some(ChecksumStatus::Mismatch { .. })
        )),
        Err(other) => panic!("unexpected error: {}", other),
    }
}

#[test]
fn checksums_can_be_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("quiet.txt");
    fs::write(&plain, b"shh").unwrap();

    let registry = SchemeRegistry::with_defaults();
    let options = BatchOptions {
        checksums: false,
        ..BatchOptions::default()
    };
    let runner = BatchRunner::new(&registry, "gcm", key_for("gcm"), options).unwrap();

    let enc = runner.process_file(Operation::Encrypt, &plain).unwrap();
    assert!(!checksum_path(&plain).exists());
    let dec = runner.process_file(Operation::Decrypt, &enc.output).unwrap();
    assert_eq!(dec.checksum, None);
}

#[test]
fn output_directory_collects_results() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();
    let inputs = write_inputs(temp_dir.path(), 3);

    let registry = SchemeRegistry::with_defaults();
    let options = BatchOptions {
        output: Some(out_dir.clone()),
        ..BatchOptions::default()
    };
    let runner = BatchRunner::new(&registry, "gcm", key_for("gcm"), options).unwrap();
    let outcomes = runner.process_files_concurrent(Operation::Encrypt, &inputs);

    assert_eq!(count_failures(&outcomes), 0);
    for i in 0..3 {
        assert!(out_dir.join(format!("file-{}.txt.enc", i)).exists());
    }
}

#[test]
fn colliding_outputs_fail_without_touching_the_rest() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = write_inputs(temp_dir.path(), 2);
    let batch = vec![inputs[0].clone(), inputs[1].clone(), inputs[0].clone()];

    let runner = fixed_runner("gcm", BatchOptions::default());
    let outcomes = runner.process_files_concurrent(Operation::Encrypt, &batch);

    assert!(matches!(outcomes[0].result, Err(Error::InvalidConfig(_))));
    assert!(outcomes[1].is_ok());
    assert!(matches!(outcomes[2].result, Err(Error::InvalidConfig(_))));
    assert_eq!(count_failures(&outcomes), 2);
    assert!(!temp_dir.path().join("file-0.txt.enc").exists());
}
