//! Streaming CBC pipeline for files too large to hold in memory
//!
//! On-disk format: `IV[16] || ciphertext blocks`, no length header. The final
//! plaintext chunk carries PKCS#7 padding, so end of data is end of file.
//!
//! Both directions also hash the plaintext (SHA-256) as it passes through, so
//! checksum sidecars never need a second read of a large file.

use crate::crypto::{
    pkcs7_pad, pkcs7_unpad, validate_key_length, CbcDecryptor, CbcEncryptor, RandomSource,
    BLOCK_SIZE, SCHEME_CBC,
};
use crate::error::{Error, Result};
use ring::digest::{Context, SHA256};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Plaintext bytes read per encryption step
pub const STREAM_CHUNK_SIZE: usize = 1024;

/// What a stream run moved, plus the plaintext digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Hex SHA-256 of the plaintext side of the stream
    pub plaintext_sha256: String,
}

/// Fill `buf` as far as the reader allows; a short count means end of stream
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypt `reader` into `writer` with AES-128-CBC
pub fn encrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    key: &[u8],
    random: &dyn RandomSource,
) -> Result<StreamSummary> {
    validate_key_length(key, SCHEME_CBC)?;

    let mut iv = [0u8; BLOCK_SIZE];
    random.fill(&mut iv)?;
    let mut encryptor = CbcEncryptor::new(key, &iv)?;

    writer.write_all(&iv)?;
    let mut bytes_written = BLOCK_SIZE as u64;
    let mut bytes_read = 0u64;
    let mut digest = Context::new(&SHA256);

    let mut buf = [0u8; STREAM_CHUNK_SIZE];
    loop {
        let n = read_full(&mut reader, &mut buf)?;
        bytes_read += n as u64;
        digest.update(&buf[..n]);

        if n == STREAM_CHUNK_SIZE {
            encryptor.encrypt_blocks(&mut buf)?;
            writer.write_all(&buf)?;
            bytes_written += n as u64;
            continue;
        }

        // Final chunk, possibly empty: pad to a block multiple
        let mut last = pkcs7_pad(&buf[..n], BLOCK_SIZE)?;
        encryptor.encrypt_blocks(&mut last)?;
        writer.write_all(&last)?;
        bytes_written += last.len() as u64;
        break;
    }

    writer.flush()?;
    debug!(
        "Stream encrypted: {} plaintext bytes -> {} bytes",
        bytes_read, bytes_written
    );

    Ok(StreamSummary {
        bytes_read,
        bytes_written,
        plaintext_sha256: hex::encode(digest.finish()),
    })
}

/// Decrypt a CBC stream produced by [`encrypt_stream`].
///
/// Each block is held back until the next one has been read, so only the
/// block that is truly last gets its padding stripped.
pub fn decrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    key: &[u8],
) -> Result<StreamSummary> {
    validate_key_length(key, SCHEME_CBC)?;

    let mut iv = [0u8; BLOCK_SIZE];
    if read_full(&mut reader, &mut iv)? != BLOCK_SIZE {
        return Err(Error::MalformedEnvelope(
            "stream ends before the IV".to_string(),
        ));
    }
    let mut decryptor = CbcDecryptor::new(key, &iv)?;

    let mut bytes_read = BLOCK_SIZE as u64;
    let mut bytes_written = 0u64;
    let mut digest = Context::new(&SHA256);
    let mut pending: Option<[u8; BLOCK_SIZE]> = None;

    loop {
        let mut block = [0u8; BLOCK_SIZE];
        let n = read_full(&mut reader, &mut block)?;
        if n == 0 {
            break;
        }
        if n != BLOCK_SIZE {
            return Err(Error::MalformedEnvelope(format!(
                "trailing {} bytes do not form a whole block",
                n
            )));
        }
        bytes_read += n as u64;
        decryptor.decrypt_blocks(&mut block)?;

        if let Some(prev) = pending.replace(block) {
            writer.write_all(&prev)?;
            digest.update(&prev);
            bytes_written += BLOCK_SIZE as u64;
        }
    }

    let last = pending.ok_or_else(|| {
        Error::MalformedEnvelope("stream holds no ciphertext blocks".to_string())
    })?;
    let tail = pkcs7_unpad(&last, BLOCK_SIZE)?;
    writer.write_all(tail)?;
    digest.update(tail);
    bytes_written += tail.len() as u64;

    writer.flush()?;
    debug!(
        "Stream decrypted: {} bytes -> {} plaintext bytes",
        bytes_read, bytes_written
    );

    Ok(StreamSummary {
        bytes_read,
        bytes_written,
        plaintext_sha256: hex::encode(digest.finish()),
    })
}

/// Stream-encrypt `input` into `output`.
///
/// On failure a partial `output` may remain; removing it is the caller's job.
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    key: &[u8],
    random: &dyn RandomSource,
) -> Result<StreamSummary> {
    validate_key_length(key, SCHEME_CBC)?;
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    encrypt_stream(reader, writer, key, random)
}

/// Stream-decrypt `input` into `output`; a partial `output` may remain on failure
pub fn decrypt_file(input: &Path, output: &Path, key: &[u8]) -> Result<StreamSummary> {
    validate_key_length(key, SCHEME_CBC)?;
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    decrypt_stream(reader, writer, key)
}
