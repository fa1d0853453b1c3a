//! Wallet selection
//!
//! A small fixed map from wallet numbers to credential sources, built once
//! from configuration and handed to whoever needs a signer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use solana_sdk::signature::{read_keypair_file, Keypair};

use crate::error::{SwapError, SwapResult};

/// Environment variable consulted when no wallet entry matches
pub const WALLET_PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";

/// Where the secret key of one wallet comes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WalletSource {
    /// Solana CLI style JSON keypair file
    KeypairFile { keypair_path: String },
    /// Base58 secret key stored in an environment variable
    EnvPrivateKey { private_key_env: String },
}

#[derive(Debug, Clone, Default)]
pub struct WalletBook {
    sources: BTreeMap<u8, WalletSource>,
}

impl WalletBook {
    pub fn from_config(entries: &BTreeMap<String, WalletSource>) -> SwapResult<Self> {
        let mut sources = BTreeMap::new();
        for (key, source) in entries {
            let number: u8 = key.trim().parse().map_err(|_| {
                SwapError::Config(format!("Wallet key '{}' is not a wallet number", key))
            })?;
            sources.insert(number, source.clone());
        }
        Ok(Self { sources })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolve a wallet using the process environment
    pub fn load_keypair(&self, number: u8) -> SwapResult<Keypair> {
        self.load_keypair_with(number, |name| std::env::var(name).ok())
    }

    /// Resolve a wallet with an explicit environment lookup
    pub fn load_keypair_with<F>(&self, number: u8, env: F) -> SwapResult<Keypair>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self.sources.get(&number) {
            Some(WalletSource::KeypairFile { keypair_path }) => load_keypair_file(keypair_path),
            Some(WalletSource::EnvPrivateKey { private_key_env }) => {
                let secret = env(private_key_env).ok_or_else(|| {
                    SwapError::Wallet(format!(
                        "Wallet {} expects a private key in ${}",
                        number, private_key_env
                    ))
                })?;
                keypair_from_base58(&secret)
            }
            None => match env(WALLET_PRIVATE_KEY_ENV) {
                Some(secret) => keypair_from_base58(&secret),
                None => Err(SwapError::Wallet(format!(
                    "Wallet {} is not configured and ${} is not set",
                    number, WALLET_PRIVATE_KEY_ENV
                ))),
            },
        }
    }
}

/// Load a keypair from a file path, expanding ~ if needed
pub fn load_keypair_file(path: &str) -> SwapResult<Keypair> {
    let expanded_path = if let Some(rest) = path.strip_prefix('~') {
        let home = std::env::var("HOME")
            .map_err(|_| SwapError::Wallet("HOME environment variable not set".to_string()))?;
        format!("{}{}", home, rest)
    } else {
        path.to_string()
    };

    read_keypair_file(&expanded_path).map_err(|e| {
        SwapError::Wallet(format!("Failed to load keypair from {}: {}", expanded_path, e))
    })
}

/// Decode a base58 64-byte secret key
pub fn keypair_from_base58(secret: &str) -> SwapResult<Keypair> {
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .map_err(|e| SwapError::Wallet(format!("Private key is not valid base58: {}", e)))?;
    Keypair::from_bytes(&bytes)
        .map_err(|e| SwapError::Wallet(format!("Private key is not a valid keypair: {}", e)))
}
