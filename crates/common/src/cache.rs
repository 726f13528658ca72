use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetcher::HiscoreFetcher;
use crate::ledger::RefetchLedger;
use crate::roster;
use crate::snapshot::{SnapshotStore, StoreError};
use crate::stats::{self, StatError};
use crate::subject::{Subject, SubjectKind};
use crate::types::{ClanRoster, PlayerCard};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("upstream unavailable for {subject} and nothing cached: {reason}")]
    Unavailable { subject: String, reason: String },
    #[error("stored snapshot for {subject} is corrupt: {source}")]
    Corrupt {
        subject: String,
        #[source]
        source: StatError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("refetch ledger: {0}")]
    Ledger(#[from] io::Error),
}

/// Seconds since the unix epoch.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One async mutex per subject, held across check -> fetch -> write -> read.
#[derive(Default)]
struct SubjectLocks {
    inner: Mutex<HashMap<Subject, Arc<tokio::sync::Mutex<()>>>>,
}

impl SubjectLocks {
    fn get(&self, subject: &Subject) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(subject.clone()).or_default().clone()
    }
}

/// Decides when to go upstream and serves the latest stored snapshot either way.
pub struct HiscoreCache<F> {
    ledger: RefetchLedger,
    store: SnapshotStore,
    fetcher: F,
    locks: SubjectLocks,
}

impl<F: HiscoreFetcher> HiscoreCache<F> {
    pub fn new(ledger: RefetchLedger, store: SnapshotStore, fetcher: F) -> Self {
        Self {
            ledger,
            store,
            fetcher,
            locks: SubjectLocks::default(),
        }
    }

    pub fn ledger(&self) -> &RefetchLedger {
        &self.ledger
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Derived stats for a player, refetching first if the cache is stale.
    pub async fn player(&self, player: &Subject, now: i64) -> Result<PlayerCard, CacheError> {
        let (bytes, last_updated) = self.load(player, now, false).await?;
        self.card(player, &bytes, last_updated)
    }

    /// Like [`Self::player`] but always attempts an upstream fetch.
    pub async fn refresh_player(&self, player: &Subject, now: i64) -> Result<PlayerCard, CacheError> {
        let (bytes, last_updated) = self.load(player, now, true).await?;
        self.card(player, &bytes, last_updated)
    }

    pub async fn clan(&self, clan: &Subject, now: i64) -> Result<ClanRoster, CacheError> {
        let (bytes, last_updated) = self.load(clan, now, false).await?;
        Ok(ClanRoster {
            name: clan.display_name().to_string(),
            members: roster::parse_members(&bytes),
            last_updated,
        })
    }

    fn card(&self, player: &Subject, bytes: &[u8], last_updated: i64) -> Result<PlayerCard, CacheError> {
        let summary = stats::derive(bytes).map_err(|source| CacheError::Corrupt {
            subject: player.to_string(),
            source,
        })?;
        Ok(PlayerCard {
            name: player.display_name().to_string(),
            summary,
            last_updated,
        })
    }

    async fn load(&self, subject: &Subject, now: i64, force: bool) -> Result<(Vec<u8>, i64), CacheError> {
        let lock = self.locks.get(subject);
        let _guard = lock.lock().await;

        let freshness = self.ledger.is_stale(subject, now)?;
        let mut last_updated = freshness.last_updated;

        // A fresh ledger record without its latest file still needs a fetch.
        if freshness.stale || force || !self.store.has_latest(subject) {
            match self.fetch(subject).await {
                Ok(bytes) => {
                    self.store.write(subject, now, &bytes)?;
                    self.ledger.record_success(subject, now)?;
                    metrics::counter!("sigbanner_cache_refreshes_total", "kind" => subject.kind().as_str())
                        .increment(1);
                    info!(subject = %subject, bytes = bytes.len(), "snapshot refreshed");
                    last_updated = now;
                }
                Err(e) => {
                    if !self.store.has_latest(subject) {
                        warn!(subject = %subject, error = %e, "upstream fetch failed with nothing cached");
                        return Err(CacheError::Unavailable {
                            subject: subject.to_string(),
                            reason: format!("{e:#}"),
                        });
                    }
                    warn!(subject = %subject, error = %e, "upstream fetch failed, serving cached snapshot");
                    metrics::counter!("sigbanner_cache_fallbacks_total", "kind" => subject.kind().as_str())
                        .increment(1);
                    last_updated = self.ledger.last_success(subject)?.unwrap_or(last_updated);
                }
            }
        } else {
            metrics::counter!("sigbanner_cache_hits_total", "kind" => subject.kind().as_str()).increment(1);
            debug!(subject = %subject, last_updated, "serving cached snapshot");
        }

        let bytes = self.store.read_latest(subject)?;
        Ok((bytes, last_updated))
    }

    async fn fetch(&self, subject: &Subject) -> anyhow::Result<Vec<u8>> {
        match subject.kind() {
            SubjectKind::Player => {
                let mut bytes = self.fetcher.fetch_stats(subject).await?;
                // Profile rides along as the snapshot's last line; losing it only degrades the banner.
                match self.fetcher.fetch_profile(subject).await {
                    Ok(profile) => {
                        if !bytes.ends_with(b"\n") {
                            bytes.push(b'\n');
                        }
                        bytes.extend_from_slice(profile.replace(['\r', '\n'], " ").as_bytes());
                        bytes.push(b'\n');
                    }
                    Err(e) => debug!(subject = %subject, error = %e, "profile lookup failed"),
                }
                Ok(bytes)
            }
            SubjectKind::Clan => self.fetcher.fetch_clan_members(subject).await,
        }
    }
}
