//! Service Description
//!
//! JSON files naming the servers of a deployment and the local client's key.
//!
//! ```text
//! service.json:  { "service_type": "keyshard",
//!                  "servers": [ { "public_key": "<hex>", "address": "host:port" } ] }
//! identity.json: { "public_keys": [ "<hex>", ... ] }   (one per worker)
//! ```

use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KeyshardError, Result};
use crate::identity::{ClientIdentity, Endpoint, EndpointHasher, PublicKey, MAX_ENDPOINT_LEN};
use crate::transport::Directory;

/// Service type every description file must declare
pub const SERVICE_TYPE: &str = "keyshard";

/// One server entry as written in the file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerEntry {
    /// Hex-encoded public key
    pub public_key: String,

    /// `host:port`
    pub address: String,
}

/// Parsed service description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceDescription {
    pub service_type: String,
    pub servers: Vec<ServerEntry>,
}

/// A server ready to be addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub public_key: PublicKey,
    pub endpoint: Endpoint,
    pub address: SocketAddr,
}

impl ServiceDescription {
    /// Read and validate a service file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let description: Self = serde_json::from_str(&text)?;
        description.validate()?;
        Ok(description)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_type != SERVICE_TYPE {
            return Err(KeyshardError::Config(format!(
                "service is of type {}, not {}",
                self.service_type, SERVICE_TYPE
            )));
        }
        if self.servers.is_empty() {
            return Err(KeyshardError::Config("service lists no servers".to_string()));
        }
        Ok(())
    }

    /// Decode keys, hash them into endpoints and resolve addresses
    pub fn resolve<H: EndpointHasher>(&self, hasher: &H) -> Result<Vec<Server>> {
        self.servers
            .iter()
            .map(|entry| {
                let public_key = PublicKey::from_hex(&entry.public_key).ok_or_else(|| {
                    KeyshardError::Identity(format!(
                        "server {} has a malformed public key",
                        entry.address
                    ))
                })?;
                let address = entry
                    .address
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| {
                        KeyshardError::Config(format!("cannot resolve {}", entry.address))
                    })?;
                Ok(Server {
                    endpoint: hasher.hash_public_key(&public_key),
                    public_key,
                    address,
                })
            })
            .collect()
    }
}

/// Build the endpoint directory a UDP transport needs
pub fn directory(servers: &[Server]) -> Directory {
    let mut directory = Directory::new();
    for server in servers {
        directory.insert(server.endpoint.clone(), server.address);
    }
    directory
}

/// The local client's key file: one key per worker thread
///
/// Servers track sequence numbers per requester, so two workers must never
/// share a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityFile {
    /// Hex-encoded public keys
    pub public_keys: Vec<String>,
}

impl IdentityFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Decode and check every key
    pub fn public_keys(&self) -> Result<Vec<PublicKey>> {
        let mut keys: Vec<PublicKey> = Vec::with_capacity(self.public_keys.len());
        for (index, encoded) in self.public_keys.iter().enumerate() {
            let key = decode_client_key(index, encoded)?;
            if keys.contains(&key) {
                return Err(KeyshardError::Identity(format!(
                    "client public key {} repeats an earlier key",
                    index
                )));
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// One identity per worker, or an error if the file holds too few keys
    pub fn identities<H: EndpointHasher>(
        &self,
        hasher: &H,
        workers: usize,
    ) -> Result<Vec<ClientIdentity>> {
        let keys = self.public_keys()?;
        if keys.len() < workers {
            return Err(KeyshardError::Config(format!(
                "{} worker(s) need distinct keys but the identity file holds {}",
                workers,
                keys.len()
            )));
        }
        Ok(keys
            .into_iter()
            .take(workers)
            .map(|key| ClientIdentity::new(key, hasher))
            .collect())
    }
}

fn decode_client_key(index: usize, encoded: &str) -> Result<PublicKey> {
    let key = PublicKey::from_hex(encoded)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            KeyshardError::Identity(format!("client public key {} is malformed", index))
        })?;
    if key.len() > MAX_ENDPOINT_LEN {
        return Err(KeyshardError::Identity(format!(
            "client public key {} is too big ({} > {} bytes)",
            index,
            key.len(),
            MAX_ENDPOINT_LEN
        )));
    }
    Ok(key)
}
