//! In-memory repository collection that asynchronous results are folded into.
//!
//! The collection is only ever replaced by a full refetch. Every other update
//! targets the matching records and leaves the rest untouched; merges never
//! add or remove records.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::{DraftProposal, Repo, RepoHealth};

/// Ordered repository records as last fetched from the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoCache {
    repos: Vec<Repo>,
}

impl RepoCache {
    /// Create a cache holding the given records.
    pub fn new(repos: Vec<Repo>) -> Self {
        Self { repos }
    }

    /// All records in fetch order.
    pub fn repos(&self) -> &[Repo] {
        &self.repos
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.repos.len()
    }

    /// Whether the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Look up a record by identifier.
    pub fn get(&self, repo_id: u64) -> Option<&Repo> {
        self.repos.iter().find(|repo| repo.id == repo_id)
    }

    /// Whether a record with this identifier exists.
    pub fn contains(&self, repo_id: u64) -> bool {
        self.get(repo_id).is_some()
    }

    /// Overwrite the collection after a refetch.
    pub fn replace_all(&mut self, repos: Vec<Repo>) {
        self.repos = repos;
    }

    /// Attach a health snapshot to the record with this identifier.
    pub fn merge_health(&mut self, repo_id: u64, health: RepoHealth) -> bool {
        match self.get_mut(repo_id) {
            Some(repo) => {
                repo.health = Some(health);
                true
            }
            None => {
                log::debug!("dropping health update for unknown repo {repo_id}");
                false
            }
        }
    }

    /// Fold batch results into the matching records.
    ///
    /// Each result matches by echoed `repo_id` when present, then by
    /// owner-qualified name, then by short name. Returns how many records
    /// were updated.
    pub fn merge_batch_results(&mut self, results: &[RepoHealth]) -> usize {
        let mut updated = 0;
        for health in results {
            match self.position_for(health) {
                Some(index) => {
                    self.repos[index].health = Some(health.clone());
                    updated += 1;
                }
                None => log::debug!("no cached repo matches result {}", health.repo_name),
            }
        }
        updated
    }

    /// Record the remediation pull request on an existing health snapshot.
    pub fn attach_pull_request(&mut self, repo_id: u64, pr_url: &str) -> bool {
        let Some(health) = self
            .get_mut(repo_id)
            .and_then(|repo| repo.health.as_mut())
        else {
            return false;
        };
        health.pending_fix_url = Some(pr_url.to_string());
        true
    }

    /// Attach a draft proposal to the record with this identifier.
    pub fn set_draft(&mut self, repo_id: u64, draft: DraftProposal) -> bool {
        match self.get_mut(repo_id) {
            Some(repo) => {
                repo.draft_proposal = Some(draft);
                true
            }
            None => false,
        }
    }

    /// Drop the draft proposal of the record with this identifier.
    pub fn clear_draft(&mut self, repo_id: u64) -> bool {
        match self.get_mut(repo_id) {
            Some(repo) => repo.draft_proposal.take().is_some(),
            None => false,
        }
    }

    /// Take the health snapshot of one freshly fetched record, when present.
    ///
    /// Listing metadata and drafts stay as cached.
    pub fn absorb_remote_health(&mut self, remote: &Repo) -> bool {
        let Some(health) = remote.health.as_ref() else {
            return false;
        };
        match self.get_mut(remote.id) {
            Some(repo) => {
                repo.health = Some(health.clone());
                true
            }
            None => false,
        }
    }

    fn get_mut(&mut self, repo_id: u64) -> Option<&mut Repo> {
        self.repos.iter_mut().find(|repo| repo.id == repo_id)
    }

    fn position_for(&self, health: &RepoHealth) -> Option<usize> {
        if let Some(repo_id) = health.repo_id {
            return self.repos.iter().position(|repo| repo.id == repo_id);
        }
        self.repos
            .iter()
            .position(|repo| repo.full_name == health.repo_name)
            .or_else(|| {
                self.repos
                    .iter()
                    .position(|repo| repo.name == health.repo_name)
            })
    }
}

/// Repository cache shared by concurrent poll sequences.
///
/// Each merge takes the write lock for exactly one call, so a merge is
/// applied atomically; overlapping sequences on the same record are
/// last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct SharedRepoCache {
    inner: Arc<RwLock<RepoCache>>,
}

impl SharedRepoCache {
    /// Wrap an existing cache.
    pub fn new(cache: RepoCache) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cache)),
        }
    }

    /// Copy of the current records.
    pub fn snapshot(&self) -> Vec<Repo> {
        self.read().repos().to_vec()
    }

    /// Copy of one record.
    pub fn get(&self, repo_id: u64) -> Option<Repo> {
        self.read().get(repo_id).cloned()
    }

    /// Whether a record with this identifier exists.
    pub fn contains(&self, repo_id: u64) -> bool {
        self.read().contains(repo_id)
    }

    /// Apply one mutation under the write lock.
    pub fn update<T>(&self, apply: impl FnOnce(&mut RepoCache) -> T) -> T {
        let mut guard = self.write();
        apply(&mut *guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, RepoCache> {
        // A panic while merging leaves the records valid, only partially updated.
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RepoCache> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
