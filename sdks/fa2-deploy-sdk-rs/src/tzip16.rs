//! TZIP-16 contract metadata resolution.
//!
//! The contract's `metadata` big-map holds, under the empty key, the UTF-8
//! bytes of a URI. `tezos-storage:` locations are read through the
//! [`MetadataSource`]; web, IPFS and hash-checked locations need a
//! [`RemoteFetch`].

use std::{borrow::Cow, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    address::Address,
    chain::ContractMetadata,
    error::{DeployError, Result},
};

/// Read access to metadata big-maps.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Bytes stored under `key`, in the contract being inspected (`None`) or in
    /// another contract.
    async fn metadata_entry(&self, contract: Option<&Address>, key: &str)
        -> Result<Option<Vec<u8>>>;
}

/// Location of a metadata document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataUri {
    TezosStorage {
        contract: Option<Address>,
        key: String,
    },
    Http(String),
    Ipfs(String),
    Sha256 {
        hash: String,
        target: String,
    },
}

impl MetadataUri {
    pub fn parse(uri: &str) -> Result<Self> {
        if let Some(rest) = uri.strip_prefix("tezos-storage:") {
            return parse_tezos_storage(rest);
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(MetadataUri::Http(uri.to_string()));
        }
        if let Some(cid) = uri.strip_prefix("ipfs://") {
            return Ok(MetadataUri::Ipfs(cid.to_string()));
        }
        if let Some(rest) = uri.strip_prefix("sha256://") {
            let (hash, target) = rest
                .split_once('/')
                .ok_or_else(|| DeployError::Metadata(format!("malformed sha256 uri: {uri}")))?;
            let hash = hash.strip_prefix("0x").unwrap_or(hash);
            return Ok(MetadataUri::Sha256 {
                hash: hash.to_string(),
                target: percent_decode(target)?,
            });
        }
        Err(DeployError::Metadata(format!("unknown metadata uri scheme: {uri}")))
    }
}

fn parse_tezos_storage(rest: &str) -> Result<MetadataUri> {
    let Some(authority_and_path) = rest.strip_prefix("//") else {
        return Ok(MetadataUri::TezosStorage {
            contract: None,
            key: percent_decode(rest)?,
        });
    };

    let (authority, key) = authority_and_path.split_once('/').ok_or_else(|| {
        DeployError::Metadata(format!("tezos-storage uri without key: {rest}"))
    })?;
    // The authority may carry a network suffix: KT1....ghostnet
    let contract = authority.split('.').next().unwrap_or(authority);
    let contract = Address::parse(contract)
        .map_err(|e| DeployError::Metadata(format!("tezos-storage authority: {e}")))?;

    Ok(MetadataUri::TezosStorage {
        contract: Some(contract),
        key: percent_decode(key)?,
    })
}

fn percent_decode(s: &str) -> Result<String> {
    urlencoding::decode(s)
        .map(Cow::into_owned)
        .map_err(|_| DeployError::Metadata(format!("non utf-8 key: {s}")))
}

/// Fetches metadata documents stored off chain.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    /// Body of a successful GET.
    async fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Gateway URL an IPFS content id is appended to.
    fn ipfs_gateway(&self) -> &str;
}

pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// [`RemoteFetch`] over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    ipfs_gateway: String,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
        })
    }

    pub fn with_ipfs_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.ipfs_gateway = gateway.into();
        self
    }
}

#[async_trait]
impl RemoteFetch for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DeployError::Metadata(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::Metadata(format!("GET {url}: {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| DeployError::Metadata(format!("GET {url}: {e}")))?;
        Ok(body.to_vec())
    }

    fn ipfs_gateway(&self) -> &str {
        &self.ipfs_gateway
    }
}

/// Fetch and decode the metadata document of the contract behind `source`.
/// Only `tezos-storage:` locations are followed.
pub async fn resolve<S>(source: &S) -> Result<ContractMetadata>
where
    S: MetadataSource + ?Sized,
{
    resolve_with(source, None).await
}

/// Like [`resolve`], also following `http(s)`, `ipfs` and `sha256` locations
/// through `remote`.
pub async fn resolve_with<S>(
    source: &S,
    remote: Option<&dyn RemoteFetch>,
) -> Result<ContractMetadata>
where
    S: MetadataSource + ?Sized,
{
    let uri_bytes = source
        .metadata_entry(None, "")
        .await?
        .ok_or_else(|| DeployError::Metadata("no metadata uri under the empty key".into()))?;
    let uri = String::from_utf8(uri_bytes)
        .map_err(|_| DeployError::Metadata("metadata uri is not utf-8".into()))?;
    debug!(%uri, "resolving contract metadata");

    let document = match MetadataUri::parse(&uri)? {
        MetadataUri::Sha256 { hash, target } => {
            let document = fetch(source, remote, &MetadataUri::parse(&target)?).await?;
            let actual = hex::encode(Sha256::digest(&document));
            if !actual.eq_ignore_ascii_case(&hash) {
                return Err(DeployError::Metadata(format!(
                    "sha256 mismatch for {target}: expected {hash}, got {actual}"
                )));
            }
            document
        }
        location => fetch(source, remote, &location).await?,
    };

    let metadata: Value = serde_json::from_slice(&document)
        .map_err(|e| DeployError::Metadata(format!("metadata document is not json: {e}")))?;

    Ok(ContractMetadata { uri, metadata })
}

async fn fetch<S>(
    source: &S,
    remote: Option<&dyn RemoteFetch>,
    location: &MetadataUri,
) -> Result<Vec<u8>>
where
    S: MetadataSource + ?Sized,
{
    let unsupported =
        |what: &str| DeployError::Metadata(format!("unsupported metadata location: {what}"));

    match location {
        MetadataUri::TezosStorage { contract, key } => source
            .metadata_entry(contract.as_ref(), key)
            .await?
            .ok_or_else(|| DeployError::Metadata(format!("no metadata under key {key:?}"))),
        MetadataUri::Http(url) => remote.ok_or_else(|| unsupported(url))?.get(url).await,
        MetadataUri::Ipfs(cid) => {
            let remote = remote.ok_or_else(|| unsupported(&format!("ipfs://{cid}")))?;
            let url = format!("{}/{cid}", remote.ipfs_gateway().trim_end_matches('/'));
            debug!(%url, "fetching ipfs metadata");
            remote.get(&url).await
        }
        MetadataUri::Sha256 { target, .. } => Err(DeployError::Metadata(format!(
            "nested sha256 location: {target}"
        ))),
    }
}
