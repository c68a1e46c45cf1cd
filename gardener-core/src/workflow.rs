//! Trigger, poll and merge orchestration for backend workflows.
//!
//! Each operation issues one trigger request, then waits for the workflow
//! through [`poll_until`] and folds every response it sees into the shared
//! repository cache.

use std::sync::{Mutex, MutexGuard};

use crate::backend::GardenerBackend;
use crate::cache::SharedRepoCache;
use crate::domain::{
    BatchStatus, DraftProposal, HealthCheckResponse, PortfolioStage, PortfolioStatus, Repo,
    RepoHealth,
};
use crate::draft::DraftReview;
use crate::error::{GardenerError, Result};
use crate::fix::{FixStatus, FixTracker};
use crate::poll::{CancelHandle, PollPolicy, Sleeper, TokioSleeper, poll_until};
use crate::session::SessionStore;

/// What an auto-fix produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// Generated files awaiting review.
    Draft(DraftProposal),
    /// The backend opened a pull request directly.
    PullRequest(String),
}

/// Client-side orchestration over a [`GardenerBackend`].
pub struct Gardener<B, S = TokioSleeper> {
    backend: B,
    sleeper: S,
    cache: SharedRepoCache,
    fixes: Mutex<FixTracker>,
}

impl<B: GardenerBackend> Gardener<B> {
    /// Build an orchestrator that sleeps on the tokio timer.
    pub fn new(backend: B) -> Self {
        Self::with_sleeper(backend, TokioSleeper)
    }
}

impl<B: GardenerBackend, S: Sleeper> Gardener<B, S> {
    /// Build an orchestrator with an injected sleeper.
    pub fn with_sleeper(backend: B, sleeper: S) -> Self {
        Self {
            backend,
            sleeper,
            cache: SharedRepoCache::default(),
            fixes: Mutex::new(FixTracker::new()),
        }
    }

    /// Seed the repository cache.
    pub fn with_repos(self, repos: Vec<Repo>) -> Self {
        self.cache.update(|cache| cache.replace_all(repos));
        self
    }

    /// Backend handle.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shared repository cache.
    pub fn cache(&self) -> &SharedRepoCache {
        &self.cache
    }

    /// Fix status of a repository for this session.
    pub fn fix_status(&self, repo_id: u64) -> Option<FixStatus> {
        self.fixes().get(repo_id)
    }

    /// Probe backend connectivity.
    pub async fn check_health(&self) -> Result<HealthCheckResponse> {
        self.backend.check_health().await
    }

    /// Exchange an OAuth code once and store the bearer token.
    pub async fn sign_in<T: SessionStore + ?Sized>(&self, code: &str, session: &T) -> Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(GardenerError::InvalidInput(
                "No OAuth code received from GitHub.".to_string(),
            ));
        }
        let token = self.backend.exchange_code(code).await?;
        session.store(&token)?;
        log::info!("signed in; token stored");
        Ok(())
    }

    /// Refetch the repository list, overwriting the cache.
    pub async fn refresh_repos(&self) -> Result<Vec<Repo>> {
        let repos = self.backend.list_repos().await?;
        self.cache.update(|cache| cache.replace_all(repos.clone()));
        Ok(repos)
    }

    /// Start a batch analysis over up to `limit` repositories.
    pub async fn start_batch(&self, limit: u32) -> Result<String> {
        if limit == 0 {
            return Err(GardenerError::InvalidInput(
                "batch limit must be a positive integer".to_string(),
            ));
        }
        let response = self.backend.start_batch(limit).await?;
        log::info!("started batch analysis {}", response.workflow_id);
        Ok(response.workflow_id)
    }

    /// Poll a batch workflow until every item completed, merging results as they arrive.
    pub async fn poll_batch(&self, workflow_id: &str, cancel: &CancelHandle) -> Result<BatchStatus> {
        let backend = &self.backend;
        let cache = &self.cache;
        poll_until(
            "batch analysis",
            PollPolicy::BATCH,
            &self.sleeper,
            cancel,
            move |_| async move {
                let status = backend.batch_status(workflow_id).await?;
                log::info!(
                    "batch {workflow_id}: {}/{} ({}%)",
                    status.completed,
                    status.total,
                    status.progress_percent()
                );
                if !status.results.is_empty() {
                    cache.update(|cache| cache.merge_batch_results(&status.results));
                }
                Ok(status.is_complete().then_some(status))
            },
        )
        .await
    }

    /// Start a batch analysis and wait for it.
    pub async fn run_batch(&self, limit: u32, cancel: &CancelHandle) -> Result<BatchStatus> {
        let workflow_id = cancel.until_cancelled(self.start_batch(limit)).await?;
        self.poll_batch(&workflow_id, cancel).await
    }

    /// Analyze one repository and attach the resulting snapshot.
    pub async fn analyze(&self, repo_id: u64, cancel: &CancelHandle) -> Result<RepoHealth> {
        self.ensure_known(repo_id)?;
        let workflow = cancel
            .until_cancelled(self.backend.trigger_analysis(repo_id))
            .await?;
        let backend = &self.backend;
        let workflow_id = workflow.workflow_id.as_str();
        let health = poll_until(
            "analysis",
            PollPolicy::SINGLE_ANALYSIS,
            &self.sleeper,
            cancel,
            move |_| async move {
                let status = backend.batch_status(workflow_id).await?;
                Ok(status.results.into_iter().next())
            },
        )
        .await?;
        self.cache
            .update(|cache| cache.merge_health(repo_id, health.clone()));
        Ok(health)
    }

    /// Trigger an auto-fix and wait for its draft or pull request.
    ///
    /// Fix status moves to pending before the request and to done once the
    /// result is merged; any error clears it.
    pub async fn fix(&self, repo_id: u64, cancel: &CancelHandle) -> Result<FixOutcome> {
        self.ensure_known(repo_id)?;
        self.fixes().begin(repo_id);
        let outcome = self.wait_for_fix(repo_id, PollPolicy::DRAFT, true, cancel).await;
        self.settle_fix(repo_id, &outcome);
        outcome
    }

    /// Trigger an auto-fix and wait only for the pull request URL.
    pub async fn fix_pull_request(&self, repo_id: u64, cancel: &CancelHandle) -> Result<String> {
        self.ensure_known(repo_id)?;
        self.fixes().begin(repo_id);
        let outcome = self
            .wait_for_fix(repo_id, PollPolicy::FIX_URL, false, cancel)
            .await;
        self.settle_fix(repo_id, &outcome);
        match outcome? {
            FixOutcome::PullRequest(url) => Ok(url),
            FixOutcome::Draft(_) => Err(GardenerError::WorkflowFailed(
                "expected a pull request, received a draft".to_string(),
            )),
        }
    }

    /// Commit the selected draft files as a pull request.
    ///
    /// An empty selection is a no-op and issues no request.
    pub async fn commit(&self, repo_id: u64, selected_files: &[String]) -> Result<Option<String>> {
        if selected_files.is_empty() {
            return Ok(None);
        }
        self.ensure_known(repo_id)?;
        let response = self.backend.commit_docs(repo_id, selected_files).await?;
        self.cache.update(|cache| {
            cache.clear_draft(repo_id);
            cache.attach_pull_request(repo_id, &response.pr_url);
        });
        log::info!("committed {} file(s): {}", selected_files.len(), response.pr_url);
        Ok(Some(response.pr_url))
    }

    /// Commit the files selected in a review and close it.
    pub async fn commit_review(
        &self,
        repo_id: u64,
        review: &mut DraftReview,
    ) -> Result<Option<String>> {
        let selected = review.selected_files();
        let committed = self.commit(repo_id, &selected).await?;
        if let Some(pr_url) = committed.as_deref() {
            review.mark_committed(pr_url)?;
        }
        Ok(committed)
    }

    /// Generate the profile README and wait for the workflow to finish.
    pub async fn generate_portfolio(&self, cancel: &CancelHandle) -> Result<PortfolioStatus> {
        let workflow = cancel
            .until_cancelled(self.backend.generate_portfolio())
            .await?;
        let backend = &self.backend;
        let workflow_id = workflow.workflow_id.as_str();
        let status = poll_until(
            "portfolio",
            PollPolicy::PORTFOLIO,
            &self.sleeper,
            cancel,
            move |_| async move {
                let status = backend.portfolio_status(workflow_id).await?;
                log::info!(
                    "portfolio {workflow_id}: {} ({}/{})",
                    status.stage.as_str(),
                    status.analyzed,
                    status.total_repos
                );
                Ok(status.stage.is_terminal().then_some(status))
            },
        )
        .await?;
        if status.stage == PortfolioStage::Failed {
            let detail = if status.errors.is_empty() {
                "portfolio generation failed".to_string()
            } else {
                status.errors.join("; ")
            };
            return Err(GardenerError::WorkflowFailed(detail));
        }
        Ok(status)
    }

    /// Trigger a fix, then poll the listing for its draft or pull request.
    ///
    /// A pull request URL already cached before the trigger belongs to an
    /// earlier fix and does not end the wait.
    async fn wait_for_fix(
        &self,
        repo_id: u64,
        policy: PollPolicy,
        accept_draft: bool,
        cancel: &CancelHandle,
    ) -> Result<FixOutcome> {
        let stale_url = self
            .cache
            .get(repo_id)
            .and_then(|repo| repo.pending_fix_url().map(str::to_string));
        let workflow = cancel
            .until_cancelled(self.backend.trigger_fix(repo_id))
            .await?;
        log::info!("started fix {} for repo {repo_id}", workflow.workflow_id);
        let backend = &self.backend;
        let cache = &self.cache;
        let stale_url = stale_url.as_deref();
        poll_until("fix", policy, &self.sleeper, cancel, move |_| async move {
            let repos = backend.list_repos().await?;
            let Some(remote) = repos.into_iter().find(|repo| repo.id == repo_id) else {
                return Ok(None);
            };
            let fresh_url = remote.pending_fix_url().filter(|url| Some(*url) != stale_url);
            let outcome = match (remote.draft_proposal.as_ref(), fresh_url) {
                (Some(draft), _) if accept_draft && !draft.is_empty() => {
                    FixOutcome::Draft(draft.clone())
                }
                (_, Some(url)) => FixOutcome::PullRequest(url.to_string()),
                _ => return Ok(None),
            };
            cache.update(|cache| {
                cache.absorb_remote_health(&remote);
                match &outcome {
                    FixOutcome::Draft(draft) => cache.set_draft(repo_id, draft.clone()),
                    FixOutcome::PullRequest(url) => cache.attach_pull_request(repo_id, url),
                }
            });
            Ok(Some(outcome))
        })
        .await
    }

    fn settle_fix<T>(&self, repo_id: u64, outcome: &Result<T>) {
        let mut fixes = self.fixes();
        match outcome {
            Ok(_) => fixes.complete(repo_id),
            Err(err) => {
                log::warn!("fix for repo {repo_id} failed: {err}");
                fixes.fail(repo_id);
            }
        }
    }

    fn ensure_known(&self, repo_id: u64) -> Result<()> {
        if self.cache.contains(repo_id) {
            Ok(())
        } else {
            Err(GardenerError::NotFound(format!(
                "repository {repo_id} is not in the local collection"
            )))
        }
    }

    fn fixes(&self) -> MutexGuard<'_, FixTracker> {
        self.fixes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<B, S> Gardener<B, S> {
    /// Copy of the cached repositories.
    pub fn repos(&self) -> Vec<Repo> {
        self.cache.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendFuture;
    use crate::domain::{CommitResponse, WorkflowResponse};
    use crate::session::MemorySession;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    struct InstantSleeper;

    impl Sleeper for InstantSleeper {
        fn sleep<'a>(
            &'a self,
            _duration: Duration,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async {})
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        listings: Mutex<VecDeque<Result<Vec<Repo>>>>,
        fallback_listing: Vec<Repo>,
        batches: Mutex<VecDeque<Result<BatchStatus>>>,
        portfolios: Mutex<VecDeque<PortfolioStatus>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with_listing(mut self, repos: Vec<Repo>) -> Self {
            self.fallback_listing = repos;
            self
        }

        fn push_listing(&self, listing: Result<Vec<Repo>>) {
            self.listings.lock().expect("listings").push_back(listing);
        }

        fn push_batch(&self, status: Result<BatchStatus>) {
            self.batches.lock().expect("batches").push_back(status);
        }

        fn push_portfolio(&self, status: PortfolioStatus) {
            self.portfolios.lock().expect("portfolios").push_back(status);
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().expect("calls").push(call.into());
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .expect("calls")
                .iter()
                .filter(|call| call.starts_with(prefix))
                .count()
        }

        fn workflow(id: &str) -> Result<WorkflowResponse> {
            Ok(WorkflowResponse {
                workflow_id: id.to_string(),
            })
        }
    }

    impl GardenerBackend for FakeBackend {
        fn check_health(&self) -> BackendFuture<'_, HealthCheckResponse> {
            self.record("check_health");
            Box::pin(async {
                Ok(HealthCheckResponse {
                    status: "healthy".to_string(),
                    service: "Gardener Backend".to_string(),
                })
            })
        }

        fn exchange_code<'a>(&'a self, code: &'a str) -> BackendFuture<'a, String> {
            self.record(format!("exchange_code:{code}"));
            Box::pin(async move { Ok(format!("token-for-{code}")) })
        }

        fn list_repos(&self) -> BackendFuture<'_, Vec<Repo>> {
            self.record("list_repos");
            let next = self.listings.lock().expect("listings").pop_front();
            let fallback = self.fallback_listing.clone();
            Box::pin(async move { next.unwrap_or(Ok(fallback)) })
        }

        fn trigger_analysis(&self, repo_id: u64) -> BackendFuture<'_, WorkflowResponse> {
            self.record(format!("trigger_analysis:{repo_id}"));
            Box::pin(async { Self::workflow("analysis-1") })
        }

        fn start_batch(&self, limit: u32) -> BackendFuture<'_, WorkflowResponse> {
            self.record(format!("start_batch:{limit}"));
            Box::pin(async { Self::workflow("garden-1") })
        }

        fn batch_status<'a>(&'a self, workflow_id: &'a str) -> BackendFuture<'a, BatchStatus> {
            self.record(format!("batch_status:{workflow_id}"));
            let next = self.batches.lock().expect("batches").pop_front();
            Box::pin(async move { next.unwrap_or_else(|| Ok(BatchStatus::default())) })
        }

        fn trigger_fix(&self, repo_id: u64) -> BackendFuture<'_, WorkflowResponse> {
            self.record(format!("trigger_fix:{repo_id}"));
            Box::pin(async { Self::workflow("janitor-1") })
        }

        fn commit_docs<'a>(
            &'a self,
            repo_id: u64,
            selected_files: &'a [String],
        ) -> BackendFuture<'a, CommitResponse> {
            self.record(format!("commit_docs:{repo_id}:{}", selected_files.join(",")));
            Box::pin(async move {
                Ok(CommitResponse {
                    status: Some("committed".to_string()),
                    pr_url: format!("https://github.com/octo/r{repo_id}/pull/9"),
                })
            })
        }

        fn generate_portfolio(&self) -> BackendFuture<'_, WorkflowResponse> {
            self.record("generate_portfolio");
            Box::pin(async { Self::workflow("portfolio-1") })
        }

        fn portfolio_status<'a>(
            &'a self,
            workflow_id: &'a str,
        ) -> BackendFuture<'a, PortfolioStatus> {
            self.record(format!("portfolio_status:{workflow_id}"));
            let next = self.portfolios.lock().expect("portfolios").pop_front();
            Box::pin(async move {
                next.ok_or_else(|| GardenerError::Transport("no portfolio status".to_string()))
            })
        }
    }

    fn repo(id: u64, name: &str) -> Repo {
        Repo {
            id,
            name: name.to_string(),
            full_name: format!("octo/{name}"),
            private: false,
            html_url: format!("https://github.com/octo/{name}"),
            description: None,
            health: None,
            draft_proposal: None,
        }
    }

    fn health(repo_name: &str, score: u8) -> RepoHealth {
        RepoHealth {
            repo_name: repo_name.to_string(),
            repo_id: None,
            health_score: score,
            issues: Vec::new(),
            last_commit_date: "2024-01-01T00:00:00Z".parse().expect("date"),
            pending_fix_url: None,
        }
    }

    fn gardener(backend: FakeBackend) -> Gardener<FakeBackend, InstantSleeper> {
        Gardener::with_sleeper(backend, InstantSleeper).with_repos(vec![repo(1, "a"), repo(2, "b")])
    }

    #[tokio::test]
    async fn batch_poll_stops_after_complete_response() {
        let backend = FakeBackend::default();
        backend.push_batch(Ok(BatchStatus {
            total: 2,
            completed: 1,
            results: vec![health("a", 90)],
        }));
        backend.push_batch(Ok(BatchStatus {
            total: 2,
            completed: 2,
            results: vec![health("a", 90), health("octo/b", 60)],
        }));
        backend.push_batch(Ok(BatchStatus {
            total: 2,
            completed: 2,
            results: Vec::new(),
        }));
        let gardener = gardener(backend);

        let status = gardener
            .run_batch(5, &CancelHandle::new())
            .await
            .expect("batch");

        assert!(status.is_complete());
        assert_eq!(gardener.backend().count("start_batch:5"), 1);
        assert_eq!(gardener.backend().count("batch_status"), 2);
        let repos = gardener.repos();
        assert_eq!(repos[0].health.as_ref().map(|h| h.health_score), Some(90));
        assert_eq!(repos[1].health.as_ref().map(|h| h.health_score), Some(60));
    }

    #[tokio::test]
    async fn partial_batch_merge_leaves_other_repos_unchanged() {
        let backend = FakeBackend::default();
        backend.push_batch(Ok(BatchStatus {
            total: 1,
            completed: 1,
            results: vec![health("a", 90)],
        }));
        let gardener = gardener(backend);
        let before = gardener.cache().get(2);

        gardener
            .poll_batch("garden-1", &CancelHandle::new())
            .await
            .expect("batch");

        assert_eq!(
            gardener.cache().get(1).and_then(|r| r.health).map(|h| h.health_score),
            Some(90)
        );
        assert_eq!(gardener.cache().get(2), before);
    }

    #[tokio::test]
    async fn empty_batch_is_never_complete() {
        let gardener = gardener(FakeBackend::default());
        let err = gardener
            .poll_batch("garden-1", &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(
            gardener.backend().count("batch_status"),
            PollPolicy::BATCH.max_attempts as usize
        );
    }

    #[tokio::test]
    async fn zero_limit_is_rejected_without_request() {
        let gardener = gardener(FakeBackend::default());
        let err = gardener.start_batch(0).await.unwrap_err();
        assert!(matches!(err, GardenerError::InvalidInput(_)));
        assert_eq!(gardener.backend().count("start_batch"), 0);
    }

    #[tokio::test]
    async fn analyze_merges_first_result_by_id() {
        let backend = FakeBackend::default();
        backend.push_batch(Ok(BatchStatus::default()));
        backend.push_batch(Err(GardenerError::Transport("reset".to_string())));
        backend.push_batch(Ok(BatchStatus {
            total: 1,
            completed: 1,
            results: vec![health("renamed-upstream", 33)],
        }));
        let gardener = gardener(backend);

        let snapshot = gardener
            .analyze(2, &CancelHandle::new())
            .await
            .expect("analysis");

        assert_eq!(snapshot.health_score, 33);
        assert_eq!(
            gardener.cache().get(2).and_then(|r| r.health).map(|h| h.health_score),
            Some(33)
        );
        assert!(gardener.cache().get(1).and_then(|r| r.health).is_none());
        assert_eq!(gardener.backend().count("batch_status"), 3);
    }

    #[tokio::test]
    async fn analyze_times_out_after_thirty_attempts() {
        let gardener = gardener(FakeBackend::default());
        let err = gardener
            .analyze(1, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GardenerError::Timeout {
                operation: "analysis",
                attempts: 30
            }
        ));
        assert_eq!(gardener.backend().count("batch_status"), 30);
    }

    #[tokio::test]
    async fn analyze_rejects_unknown_repo() {
        let gardener = gardener(FakeBackend::default());
        let err = gardener
            .analyze(42, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GardenerError::NotFound(_)));
        assert_eq!(gardener.backend().count("trigger_analysis"), 0);
    }

    #[tokio::test]
    async fn fix_moves_status_to_done_when_draft_arrives() {
        let mut drafted = repo(1, "a");
        let mut draft = DraftProposal::new();
        draft.insert("README.md".to_string(), "# a".to_string());
        drafted.draft_proposal = Some(draft.clone());
        let backend = FakeBackend::default().with_listing(vec![drafted, repo(2, "b")]);
        backend.push_listing(Ok(vec![repo(1, "a"), repo(2, "b")]));
        let gardener = gardener(backend);
        assert_eq!(gardener.fix_status(1), None);

        let outcome = gardener
            .fix(1, &CancelHandle::new())
            .await
            .expect("fix");

        assert_eq!(outcome, FixOutcome::Draft(draft.clone()));
        assert_eq!(gardener.fix_status(1), Some(FixStatus::Done));
        assert_eq!(gardener.cache().get(1).and_then(|r| r.draft_proposal), Some(draft));
        assert_eq!(gardener.backend().count("list_repos"), 2);
    }

    struct YieldingSleeper;

    impl Sleeper for YieldingSleeper {
        fn sleep<'a>(
            &'a self,
            _duration: Duration,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(tokio::task::yield_now())
        }
    }

    #[tokio::test]
    async fn fix_status_is_pending_while_polling() {
        let backend = FakeBackend::default().with_listing(vec![repo(1, "a"), repo(2, "b")]);
        let gardener = Gardener::with_sleeper(backend, YieldingSleeper)
            .with_repos(vec![repo(1, "a"), repo(2, "b")]);
        let cancel = CancelHandle::new();
        let observer = async {
            loop {
                if let Some(status) = gardener.fix_status(1) {
                    cancel.cancel();
                    return status;
                }
                tokio::task::yield_now().await;
            }
        };

        let (outcome, observed) = tokio::join!(gardener.fix(1, &cancel), observer);

        assert_eq!(observed, FixStatus::Pending);
        assert!(matches!(outcome, Err(GardenerError::Cancelled)));
        assert_eq!(gardener.fix_status(1), None);
        assert_eq!(gardener.backend().count("trigger_fix:1"), 1);
    }

    #[tokio::test]
    async fn stale_pull_request_url_does_not_end_draft_wait() {
        let mut stale = repo(1, "a");
        let mut snapshot = health("octo/a", 40);
        snapshot.pending_fix_url = Some("https://github.com/octo/a/pull/1".to_string());
        stale.health = Some(snapshot);
        let mut drafted = stale.clone();
        let mut draft = DraftProposal::new();
        draft.insert("README.md".to_string(), "# a".to_string());
        drafted.draft_proposal = Some(draft.clone());
        let backend = FakeBackend::default().with_listing(vec![drafted, repo(2, "b")]);
        backend.push_listing(Ok(vec![stale.clone(), repo(2, "b")]));
        let gardener = Gardener::with_sleeper(backend, InstantSleeper)
            .with_repos(vec![stale, repo(2, "b")]);

        let outcome = gardener
            .fix(1, &CancelHandle::new())
            .await
            .expect("fix");

        assert_eq!(outcome, FixOutcome::Draft(draft));
        assert_eq!(gardener.backend().count("list_repos"), 2);
    }

    #[tokio::test]
    async fn fix_accepts_pull_request_url() {
        let mut fixed = repo(2, "b");
        let mut snapshot = health("octo/b", 50);
        snapshot.pending_fix_url = Some("https://github.com/octo/b/pull/4".to_string());
        fixed.health = Some(snapshot);
        let backend = FakeBackend::default().with_listing(vec![repo(1, "a"), fixed]);
        let gardener = gardener(backend);

        let url = gardener
            .fix_pull_request(2, &CancelHandle::new())
            .await
            .expect("fix");

        assert_eq!(url, "https://github.com/octo/b/pull/4");
        assert_eq!(
            gardener.cache().get(2).and_then(|r| r.pending_fix_url().map(str::to_string)),
            Some(url)
        );
        assert_eq!(gardener.fix_status(2), Some(FixStatus::Done));
    }

    #[tokio::test]
    async fn fix_error_clears_status() {
        let backend = FakeBackend::default().with_listing(vec![repo(1, "a")]);
        backend.push_listing(Err(GardenerError::unauthorized()));
        let gardener = gardener(backend);

        let err = gardener
            .fix(1, &CancelHandle::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GardenerError::Unauthorized { .. }));
        assert_eq!(gardener.fix_status(1), None);
    }

    #[tokio::test]
    async fn fix_timeout_after_draft_budget() {
        let backend = FakeBackend::default().with_listing(vec![repo(1, "a"), repo(2, "b")]);
        let gardener = gardener(backend);
        let err = gardener
            .fix(1, &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(gardener.backend().count("list_repos"), 90);
        assert_eq!(gardener.fix_status(1), None);
    }

    #[tokio::test]
    async fn empty_commit_issues_no_request() {
        let gardener = gardener(FakeBackend::default());
        let committed = gardener.commit(1, &[]).await.expect("commit");
        assert_eq!(committed, None);
        assert_eq!(gardener.backend().count("commit_docs"), 0);
    }

    #[tokio::test]
    async fn commit_review_clears_draft_and_attaches_url() {
        let mut drafted = repo(1, "a");
        drafted.health = Some(health("octo/a", 20));
        let mut draft = DraftProposal::new();
        draft.insert("README.md".to_string(), "# a".to_string());
        draft.insert("CONTRIBUTING.md".to_string(), "hi".to_string());
        drafted.draft_proposal = Some(draft.clone());
        let gardener = Gardener::with_sleeper(FakeBackend::default(), InstantSleeper)
            .with_repos(vec![drafted, repo(2, "b")]);
        let mut review = DraftReview::from_proposal(&draft);
        review.toggle("CONTRIBUTING.md").expect("toggle");

        let url = gardener
            .commit_review(1, &mut review)
            .await
            .expect("commit")
            .expect("url");

        assert_eq!(url, "https://github.com/octo/r1/pull/9");
        assert_eq!(gardener.backend().count("commit_docs:1:README.md"), 1);
        let cached = gardener.cache().get(1).expect("repo");
        assert!(cached.draft_proposal.is_none());
        assert_eq!(cached.pending_fix_url(), Some(url.as_str()));
        assert!(!review.is_pending());
    }

    #[tokio::test]
    async fn portfolio_completes() {
        let backend = FakeBackend::default();
        backend.push_portfolio(PortfolioStatus {
            stage: PortfolioStage::Analyzing,
            total_repos: 4,
            analyzed: 1,
            pr_url: None,
            profile_url: None,
            errors: Vec::new(),
        });
        backend.push_portfolio(PortfolioStatus {
            stage: PortfolioStage::Complete,
            total_repos: 4,
            analyzed: 4,
            pr_url: Some("https://github.com/octo/octo/pull/1".to_string()),
            profile_url: Some("https://github.com/octo".to_string()),
            errors: Vec::new(),
        });
        let gardener = gardener(backend);

        let status = gardener
            .generate_portfolio(&CancelHandle::new())
            .await
            .expect("portfolio");

        assert_eq!(status.stage, PortfolioStage::Complete);
        assert_eq!(gardener.backend().count("portfolio_status"), 2);
    }

    #[tokio::test]
    async fn failed_portfolio_surfaces_errors() {
        let backend = FakeBackend::default();
        backend.push_portfolio(PortfolioStatus {
            stage: PortfolioStage::Failed,
            total_repos: 0,
            analyzed: 0,
            pr_url: None,
            profile_url: None,
            errors: vec!["rate limited".to_string()],
        });
        let gardener = gardener(backend);
        let err = gardener
            .generate_portfolio(&CancelHandle::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "workflow failed: rate limited");
    }

    #[tokio::test]
    async fn sign_in_stores_token() {
        let gardener = gardener(FakeBackend::default());
        let session = MemorySession::new();
        gardener.sign_in(" abc ", &session).await.expect("sign in");
        assert_eq!(session.token().as_deref(), Some("token-for-abc"));
        assert!(gardener.sign_in("", &session).await.is_err());
        assert_eq!(gardener.backend().count("exchange_code"), 1);
    }

    #[tokio::test]
    async fn refresh_overwrites_cache() {
        let backend = FakeBackend::default().with_listing(vec![repo(7, "z")]);
        let gardener = gardener(backend);
        gardener.refresh_repos().await.expect("refresh");
        let ids: Vec<u64> = gardener.repos().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![7]);
    }
}
