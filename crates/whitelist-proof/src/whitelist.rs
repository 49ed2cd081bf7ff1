//! Whitelist loading.
//!
//! The address list is supplied externally, either as a JSON array of
//! address strings or as text with one address per line. Any malformed
//! entry fails the whole load so a corrupt root is never produced.

use crate::address::{Address, AddressError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Whitelist shipped with the original sale page.
///
/// The zero address and the low-value entries look like placeholders but are
/// kept as ordinary members until a real list replaces them.
pub const SAMPLE_WHITELIST: [&str; 15] = [
    "0x6cAfc07C1e6D37903aBd6b56A92e9b1DC985f903",
    "0xB64107Edd823F6B6E57FF99C4d8e2c7394C2e00E",
    "0xD20d11319e611e3208B3a0bfc2BB4163F9CC3A65",
    "0x0000004B8702bAaED343A17B3e240ddCEf88D6f0",
    "0x0000000000000000000000000000000000000000",
    "0x0000000000000000000000000000000000000001",
    "0x0000000000000000000000000000000000000002",
    "0x0000000000000000000000000000000000000003",
    "0x0000000000000000000000000000000000000004",
    "0x0000000000000000000000000000000000000005",
    "0x0000000000000000000000000000000000000006",
    "0x0000000000000000000000000000000000000007",
    "0x0000000000000000000000000000000000000008",
    "0x0000000000000000000000000000000000000009",
    "0x0000000000000000000000000000000000000010",
];

/// Errors from loading a whitelist.
#[derive(Error, Debug)]
pub enum WhitelistError {
    #[error("Failed to read whitelist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid address on line {line}: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: AddressError,
    },

    #[error("Invalid address at index {index}: {source}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: AddressError,
    },

    #[error("Invalid whitelist JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Whitelist contains no addresses")]
    Empty,
}

/// The built-in sample whitelist.
///
/// # Errors
/// Never fails for the shipped constants; kept fallible to share the parser.
pub fn sample_whitelist() -> Result<Vec<Address>, WhitelistError> {
    parse_entries(SAMPLE_WHITELIST.iter().copied())
}

/// Parse whitelist text. A leading `[` selects the JSON array format.
///
/// # Errors
/// Returns an error for malformed entries or an empty list.
pub fn parse_whitelist(content: &str) -> Result<Vec<Address>, WhitelistError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let entries: Vec<String> = serde_json::from_str(trimmed)?;
        return parse_entries(entries.iter().map(String::as_str));
    }

    let mut addresses = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let entry = line.split('#').next().unwrap_or_default().trim();
        if entry.is_empty() {
            continue;
        }
        let address = Address::parse(entry).map_err(|source| WhitelistError::InvalidLine {
            line: line_num + 1,
            source,
        })?;
        addresses.push(address);
    }

    if addresses.is_empty() {
        return Err(WhitelistError::Empty);
    }
    Ok(addresses)
}

/// Read and parse a whitelist file.
///
/// # Errors
/// Returns an error if the file cannot be read or fails to parse.
pub fn load_whitelist(path: &Path) -> Result<Vec<Address>, WhitelistError> {
    let content = std::fs::read_to_string(path).map_err(|source| WhitelistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let addresses = parse_whitelist(&content)?;
    info!(path = %path.display(), count = addresses.len(), "Loaded whitelist");
    Ok(addresses)
}

fn parse_entries<'a>(
    entries: impl Iterator<Item = &'a str>,
) -> Result<Vec<Address>, WhitelistError> {
    let addresses = entries
        .enumerate()
        .map(|(index, entry)| {
            Address::parse(entry).map_err(|source| WhitelistError::InvalidEntry { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if addresses.is_empty() {
        return Err(WhitelistError::Empty);
    }
    Ok(addresses)
}
