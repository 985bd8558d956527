use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_BUF: usize = 64 * 1024;

/// Hex width of every supported digest (both are 256-bit).
pub const CHECKSUM_HEX_LEN: usize = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Blake3 => f.write_str("blake3"),
            HashAlgorithm::Sha256 => f.write_str("sha256"),
        }
    }
}

/// Stream `reader` to EOF and return the lowercase hex digest.
pub fn hash_reader<R: Read>(mut reader: R, algo: HashAlgorithm) -> io::Result<String> {
    let mut buf = vec![0u8; READ_BUF];
    match algo {
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            Ok(hasher.finalize().to_hex().to_string())
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            Ok(format!("{:x}", hasher.finalize()))
        }
    }
}

pub fn hash_file(path: &Path, algo: HashAlgorithm) -> io::Result<String> {
    hash_reader(File::open(path)?, algo)
}

/// Which algorithm, if any, produces `checksum` for the content of `reader`.
/// Reads the input once and feeds every digest.
pub fn identify<R: Read>(mut reader: R, checksum: &str) -> io::Result<Option<HashAlgorithm>> {
    let mut b3 = blake3::Hasher::new();
    let mut sha = Sha256::new();
    let mut buf = vec![0u8; READ_BUF];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        b3.update(&buf[..n]);
        sha.update(&buf[..n]);
    }
    if b3.finalize().to_hex().as_str().eq_ignore_ascii_case(checksum) {
        return Ok(Some(HashAlgorithm::Blake3));
    }
    if format!("{:x}", sha.finalize()).eq_ignore_ascii_case(checksum) {
        return Ok(Some(HashAlgorithm::Sha256));
    }
    Ok(None)
}
