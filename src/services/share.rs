//! Social share links and per-network share counters.

use std::{fmt, str::FromStr, sync::Arc};

use indexmap::IndexMap;
use tracing::debug;

use crate::dao::{
    models::{SHARES_KEY, TournamentId},
    storage::{KeyValueStore, StorageError, read_json, write_json},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareNetwork {
    Vk,
    Telegram,
    WhatsApp,
    Twitter,
    Facebook,
    Email,
}

impl ShareNetwork {
    pub const ALL: [ShareNetwork; 6] = [
        ShareNetwork::Vk,
        ShareNetwork::Telegram,
        ShareNetwork::WhatsApp,
        ShareNetwork::Twitter,
        ShareNetwork::Facebook,
        ShareNetwork::Email,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShareNetwork::Vk => "vk",
            ShareNetwork::Telegram => "telegram",
            ShareNetwork::WhatsApp => "whatsapp",
            ShareNetwork::Twitter => "twitter",
            ShareNetwork::Facebook => "facebook",
            ShareNetwork::Email => "email",
        }
    }

    /// Link opening the network's share dialog for `url` with `text`.
    pub fn share_url(self, url: &str, text: &str) -> String {
        let url = urlencoding::encode(url);
        let text = urlencoding::encode(text);
        match self {
            ShareNetwork::Vk => format!("https://vk.com/share.php?url={url}&title={text}"),
            ShareNetwork::Telegram => format!("https://t.me/share/url?url={url}&text={text}"),
            ShareNetwork::WhatsApp => format!("https://wa.me/?text={text}%20{url}"),
            ShareNetwork::Twitter => {
                format!("https://twitter.com/intent/tweet?url={url}&text={text}")
            }
            ShareNetwork::Facebook => format!("https://www.facebook.com/sharer/sharer.php?u={url}"),
            ShareNetwork::Email => format!("mailto:?subject={text}&body={url}"),
        }
    }
}

impl fmt::Display for ShareNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShareNetwork {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ShareNetwork::ALL
            .into_iter()
            .find(|network| network.as_str() == value)
            .ok_or_else(|| format!("unknown share network `{value}`"))
    }
}

/// Public page of a tournament.
pub fn tournament_url(origin: &str, id: TournamentId) -> String {
    format!("{}/tournament/{id}", origin.trim_end_matches('/'))
}

/// How the platform lets the user share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareCapability {
    /// The platform share sheet is available.
    Native,
    /// Fallback list of share links, one per network.
    Links(Vec<(ShareNetwork, String)>),
}

impl ShareCapability {
    pub fn select(native_supported: bool, url: &str, text: &str) -> Self {
        if native_supported {
            ShareCapability::Native
        } else {
            ShareCapability::Links(
                ShareNetwork::ALL
                    .into_iter()
                    .map(|network| (network, network.share_url(url, text)))
                    .collect(),
            )
        }
    }
}

/// Persisted count of shares per channel (`vk`, `telegram`, ..., `native`, `copy`).
pub struct ShareCounters {
    store: Arc<dyn KeyValueStore>,
    counts: IndexMap<String, u64>,
}

impl ShareCounters {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let counts = read_json(store.as_ref(), SHARES_KEY).unwrap_or_default();
        Self { store, counts }
    }

    pub fn counts(&self) -> &IndexMap<String, u64> {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Count one share on `channel` and return the new total across channels.
    pub fn record(&mut self, channel: &str) -> Result<u64, StorageError> {
        let mut candidate = self.counts.clone();
        *candidate.entry(channel.to_string()).or_insert(0) += 1;
        write_json(self.store.as_ref(), SHARES_KEY, &candidate)?;
        self.counts = candidate;
        debug!(channel, total = self.total(), "share recorded");
        Ok(self.total())
    }
}
