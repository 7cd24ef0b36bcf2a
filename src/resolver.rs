//! Identity resolution: free-text names to canonical ids already persisted.
//!
//! Team candidates are tried in order, first success wins:
//! 1. exact match on the short name (case-normalized)
//! 2. substring match in either direction
//! 3. manual override table (candidate -> canonical short name)

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, ResolveError};
use crate::model::{LeagueId, LeagueName, TeamId};
use crate::normalize::{lookup_key, strip_markup};
use crate::store::RelationalStore;

/// What to do when several persisted names qualify for a substring match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubstringPolicy {
    /// Take the first in store order (id order) and log the ambiguity.
    FirstByStoreOrder,
    /// Fail with `AmbiguousMatch`.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStrategy {
    Exact,
    Substring,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub team_id: TeamId,
    pub canonical: String,
    pub strategy: MatchStrategy,
    /// Other short names that also qualified (substring step only).
    pub ambiguous_with: Vec<String>,
}

/// Known persistent mismatches between sources.
#[derive(Debug, Clone)]
pub struct OverrideTable {
    entries: HashMap<String, String>,
}

impl Default for OverrideTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert("US Quevilly Rouen", "US Quevilly-Rouen");
        table
    }
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, candidate: &str, canonical: &str) {
        self.entries.insert(override_key(candidate), canonical.to_string());
    }

    /// Keys fold the same way as the exact step, so `(football)` suffixes
    /// and spacing variants still hit.
    pub fn get(&self, candidate: &str) -> Option<&str> {
        self.entries.get(&override_key(candidate)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn override_key(candidate: &str) -> String {
    lookup_key(&strip_markup(candidate))
}

/// Resolution cache with double-checked locking so two lookups for the same
/// name never race to the store.
#[derive(Clone, Default)]
pub struct ResolutionCache {
    inner: Arc<RwLock<HashMap<String, Resolution>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Resolution> {
        self.inner.read().await.get(key).cloned()
    }

    /// Successful resolutions are cached; failures are not.
    pub async fn get_or_try_insert_with<F, Fut>(
        &self,
        key: &str,
        factory: F,
    ) -> Result<Result<Resolution, ResolveError>, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Result<Resolution, ResolveError>, GatewayError>>,
    {
        {
            let cache = self.inner.read().await;
            if let Some(hit) = cache.get(key) {
                return Ok(Ok(hit.clone()));
            }
        }

        let mut cache = self.inner.write().await;
        if let Some(hit) = cache.get(key) {
            return Ok(Ok(hit.clone()));
        }

        let outcome = factory().await?;
        if let Ok(resolution) = &outcome {
            cache.insert(key.to_string(), resolution.clone());
        }
        Ok(outcome)
    }

    /// Drop everything; called after the team table changes.
    pub async fn clear(&self) {
        let mut cache = self.inner.write().await;
        if !cache.is_empty() {
            debug!("Cleared resolution cache ({} entries)", cache.len());
            cache.clear();
        }
    }
}

pub struct IdentityResolver {
    store: Arc<dyn RelationalStore>,
    overrides: OverrideTable,
    policy: SubstringPolicy,
    cache: ResolutionCache,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn RelationalStore>, overrides: OverrideTable, policy: SubstringPolicy) -> Self {
        Self {
            store,
            overrides,
            policy,
            cache: ResolutionCache::new(),
        }
    }

    pub fn policy(&self) -> SubstringPolicy {
        self.policy
    }

    pub async fn invalidate(&self) {
        self.cache.clear().await;
    }

    /// Resolve a team name variant to a persisted team.
    pub async fn resolve_team(&self, candidate: &str) -> Result<Result<Resolution, ResolveError>, GatewayError> {
        let key = lookup_key(&strip_markup(candidate));
        if key.is_empty() {
            return Ok(Err(ResolveError::NoMatchFound(candidate.to_string())));
        }

        self.cache
            .get_or_try_insert_with(&key, || self.resolve_team_uncached(candidate, &key))
            .await
    }

    async fn resolve_team_uncached(
        &self,
        candidate: &str,
        key: &str,
    ) -> Result<Result<Resolution, ResolveError>, GatewayError> {
        // Step 1: exact
        if let Some((team_id, canonical)) = self.store.find_team_exact(key).await? {
            return Ok(Ok(Resolution {
                team_id,
                canonical,
                strategy: MatchStrategy::Exact,
                ambiguous_with: Vec::new(),
            }));
        }

        // Step 2: substring, either direction
        let mut matches = self.store.find_teams_containing(key).await?;
        if !matches.is_empty() {
            if matches.len() > 1 && self.policy == SubstringPolicy::Strict {
                return Ok(Err(ResolveError::AmbiguousMatch {
                    candidate: candidate.to_string(),
                    matches: matches.into_iter().map(|(_, name)| name).collect(),
                }));
            }
            let (team_id, canonical) = matches.remove(0);
            let ambiguous_with: Vec<String> = matches.into_iter().map(|(_, name)| name).collect();
            if !ambiguous_with.is_empty() {
                warn!(
                    "Ambiguous team name '{}': took '{}' over {:?}",
                    candidate, canonical, ambiguous_with
                );
            }
            return Ok(Ok(Resolution {
                team_id,
                canonical,
                strategy: MatchStrategy::Substring,
                ambiguous_with,
            }));
        }

        // Step 3: manual overrides
        if let Some(target) = self.overrides.get(key) {
            if let Some((team_id, canonical)) = self.store.find_team_exact(&lookup_key(target)).await? {
                info!("Resolved '{}' through override to '{}'", candidate, canonical);
                return Ok(Ok(Resolution {
                    team_id,
                    canonical,
                    strategy: MatchStrategy::Override,
                    ambiguous_with: Vec::new(),
                }));
            }
            warn!("Override target '{}' for '{}' is not persisted", target, candidate);
        }

        Ok(Err(ResolveError::NoMatchFound(candidate.to_string())))
    }

    /// Leagues are keyed by (name, season); the name accepts source spellings
    /// such as `Ligue 1` or the competition code `FL1`.
    pub async fn resolve_league(
        &self,
        candidate: &str,
        season: i32,
    ) -> Result<Result<LeagueId, ResolveError>, GatewayError> {
        let Some(name) = LeagueName::parse(candidate) else {
            return Ok(Err(ResolveError::NoMatchFound(candidate.to_string())));
        };
        Ok(self
            .store
            .find_league(name, season)
            .await?
            .ok_or_else(|| ResolveError::NoMatchFound(format!("{} {}", name, season))))
    }
}
