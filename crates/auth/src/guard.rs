//! Route authorization guard.
//!
//! A guard sits in front of a group of routes. Every mount starts in
//! [`GuardState::Loading`] and settles once the session (and, if present, the
//! role) has been resolved. The guard keeps watching the session afterwards
//! and starts over from `Loading` whenever the identity behind it changes.
//!
//! ## Ordering
//!
//! Each evaluation is tagged with an epoch and the identity it targets. A
//! newer session notification bumps the epoch; results carrying an older epoch
//! or a different identity are discarded, so a slow lookup for a previous
//! identity can never overwrite the state computed for the current one.
//!
//! ## Cancellation
//!
//! Dropping the [`MountedGuard`] aborts its driver task. The session
//! subscription and every in-flight lookup are dropped with it; none of them
//! touches state afterwards.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use gympal_core::IdentityId;

use crate::provider::{SessionSubscription, SessionUpdate};
use crate::redirect::home_route_for;
use crate::{Role, RoleResolver, RoutePath, Session, SessionProvider};

/// Per-mount authorization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "role", rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    Unauthenticated,
    AuthorizedNoRoleRequirement,
    AuthorizedWrongRole(Role),
    AuthorizedCorrectRole(Role),
}

/// What the guard tells the renderer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "role", rename_all = "snake_case")]
pub enum Decision {
    /// Show a neutral waiting indicator; render nothing protected.
    Pending,
    /// Render the protected content.
    Allow,
    /// Replace the current history entry with the sign-in page.
    RedirectToLogin,
    /// Replace the current history entry with the role's home.
    RedirectToRoleHome(Role),
}

impl Decision {
    /// Target of a redirect decision. Redirects always replace history.
    pub fn redirect_target(&self) -> Option<RoutePath> {
        match self {
            Decision::RedirectToLogin => Some(RoutePath::AUTH),
            Decision::RedirectToRoleHome(role) => Some(home_route_for(*role)),
            Decision::Pending | Decision::Allow => None,
        }
    }
}

impl GuardState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, GuardState::Loading)
    }

    pub fn decision(&self) -> Decision {
        match self {
            GuardState::Loading => Decision::Pending,
            GuardState::Unauthenticated => Decision::RedirectToLogin,
            GuardState::AuthorizedWrongRole(role) => Decision::RedirectToRoleHome(*role),
            GuardState::AuthorizedNoRoleRequirement | GuardState::AuthorizedCorrectRole(_) => Decision::Allow,
        }
    }

    /// Terminal state for a resolved session and (if present) role.
    ///
    /// A present session without a role yet is still `Loading`.
    pub fn evaluate(session: &Session, role: Option<Role>, required_role: Option<Role>) -> GuardState {
        if !session.is_present() {
            return GuardState::Unauthenticated;
        }
        match (required_role, role) {
            (None, _) => GuardState::AuthorizedNoRoleRequirement,
            (Some(_), None) => GuardState::Loading,
            (Some(required), Some(role)) if role.satisfies(required) => GuardState::AuthorizedCorrectRole(role),
            (Some(_), Some(role)) => GuardState::AuthorizedWrongRole(role),
        }
    }
}

/// Pure decision for (session, role, required role).
pub fn decide(session: &Session, role: Option<Role>, required_role: Option<Role>) -> Decision {
    GuardState::evaluate(session, role, required_role).decision()
}

/// Guard configuration for one group of routes.
///
/// Cheap to clone. [`RouteGuard::mount`] creates an independent evaluation.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    provider: SessionProvider,
    resolver: Arc<RoleResolver>,
    required_role: Option<Role>,
}

impl RouteGuard {
    pub fn new(provider: SessionProvider, resolver: Arc<RoleResolver>, required_role: Option<Role>) -> Self {
        Self {
            provider,
            resolver,
            required_role,
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required_role
    }

    /// Start evaluating. Must be called inside a tokio runtime.
    ///
    /// The returned guard is in `Loading` until the first evaluation lands.
    pub fn mount(&self) -> MountedGuard {
        let (state_tx, state_rx) = watch::channel(GuardState::Loading);

        // Subscribe before the initial fetch so no transition can slip between.
        let changes = self.provider.subscribe();

        let driver = GuardDriver {
            provider: self.provider.clone(),
            resolver: self.resolver.clone(),
            required_role: self.required_role,
            state: state_tx,
            epoch: 0,
            target: Target::Unknown,
        };
        let task = tokio::spawn(driver.run(changes));

        MountedGuard { state: state_rx, task }
    }
}

/// A live guard evaluation. Dropping it unmounts the guard.
#[derive(Debug)]
pub struct MountedGuard {
    state: watch::Receiver<GuardState>,
    task: JoinHandle<()>,
}

impl MountedGuard {
    pub fn state(&self) -> GuardState {
        *self.state.borrow()
    }

    pub fn decision(&self) -> Decision {
        self.state().decision()
    }

    /// Wait until the guard leaves `Loading`.
    pub async fn settled(&mut self) -> GuardState {
        let settled = self.state.wait_for(GuardState::is_settled).await.map(|state| *state);
        settled.unwrap_or_else(|_| *self.state.borrow())
    }

    /// Wait for the next state change. `None` once the guard stopped.
    pub async fn changed(&mut self) -> Option<GuardState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }
}

impl Drop for MountedGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Which session the current epoch is evaluating.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// Mounted, initial fetch not applied yet.
    Unknown,
    Absent,
    Identity(IdentityId),
}

/// Result of one asynchronous evaluation step.
#[derive(Debug)]
struct Evaluation {
    epoch: u64,
    session: Session,
    role: Option<Role>,
}

struct GuardDriver {
    provider: SessionProvider,
    resolver: Arc<RoleResolver>,
    required_role: Option<Role>,
    state: watch::Sender<GuardState>,
    epoch: u64,
    target: Target,
}

impl GuardDriver {
    async fn run(mut self, changes: SessionSubscription) {
        let mut changes = Some(changes);
        let mut inflight: JoinSet<Evaluation> = JoinSet::new();

        self.epoch += 1;
        inflight.spawn(initial_evaluation(
            self.epoch,
            self.provider.clone(),
            self.resolver.clone(),
            self.required_role,
        ));

        loop {
            tokio::select! {
                update = next_change(&mut changes), if changes.is_some() => match update {
                    Some(update) => self.on_change(update, &mut inflight),
                    None => {
                        tracing::debug!("session feed closed; guard stops watching");
                        changes = None;
                    }
                },
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => match joined {
                    Ok(evaluation) => self.apply(evaluation),
                    Err(e) => tracing::warn!(error = %e, "guard evaluation task failed"),
                },
                else => break,
            }

            if self.state.is_closed() {
                break;
            }
        }
    }

    fn on_change(&mut self, update: SessionUpdate, inflight: &mut JoinSet<Evaluation>) {
        let next = match update.session.identity_id() {
            Some(id) => Target::Identity(id.clone()),
            None => Target::Absent,
        };

        if next == self.target {
            // Same identity (e.g. token refresh): the current evaluation stands.
            tracing::trace!(sequence = update.sequence_number, event = ?update.event, "session unchanged for guard");
            return;
        }

        self.epoch += 1;
        self.target = next;

        match &self.target {
            Target::Absent => self.transition(GuardState::Unauthenticated),
            Target::Identity(identity_id) => {
                let immediate = GuardState::evaluate(&update.session, None, self.required_role);
                self.transition(immediate);
                if !immediate.is_settled() {
                    inflight.spawn(role_evaluation(
                        self.epoch,
                        update.session.clone(),
                        identity_id.clone(),
                        self.resolver.clone(),
                    ));
                }
            }
            Target::Unknown => {}
        }
    }

    fn apply(&mut self, evaluation: Evaluation) {
        if evaluation.epoch != self.epoch {
            tracing::debug!(
                epoch = evaluation.epoch,
                current = self.epoch,
                "discarding superseded guard evaluation"
            );
            return;
        }

        let evaluated = match evaluation.session.identity_id() {
            Some(id) => Target::Identity(id.clone()),
            None => Target::Absent,
        };
        if self.target != Target::Unknown && self.target != evaluated {
            tracing::debug!("discarding guard evaluation for a different identity");
            return;
        }

        self.target = evaluated;
        self.transition(GuardState::evaluate(
            &evaluation.session,
            evaluation.role,
            self.required_role,
        ));
    }

    fn transition(&self, next: GuardState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!(from = ?*current, to = ?next, required = ?self.required_role, "guard transition");
            *current = next;
            true
        });
    }
}

async fn next_change(changes: &mut Option<SessionSubscription>) -> Option<SessionUpdate> {
    match changes {
        Some(changes) => changes.next().await,
        None => None,
    }
}

async fn initial_evaluation(
    epoch: u64,
    provider: SessionProvider,
    resolver: Arc<RoleResolver>,
    required_role: Option<Role>,
) -> Evaluation {
    let session = provider.get_current_session().await;
    let role = match (session.identity_id(), required_role) {
        (Some(id), Some(_)) => Some(resolver.resolve_role(id).await),
        _ => None,
    };
    Evaluation { epoch, session, role }
}

async fn role_evaluation(
    epoch: u64,
    session: Session,
    identity_id: IdentityId,
    resolver: Arc<RoleResolver>,
) -> Evaluation {
    let role = resolver.resolve_role(&identity_id).await;
    Evaluation {
        epoch,
        session,
        role: Some(role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionEvent;
    use crate::testing::{FakeIdentityBackend, FakeProfileStore, fresh_credential, identity};

    struct Harness {
        backend: Arc<FakeIdentityBackend>,
        profiles: Arc<FakeProfileStore>,
        provider: SessionProvider,
        resolver: Arc<RoleResolver>,
    }

    impl Harness {
        fn new() -> Self {
            let backend = FakeIdentityBackend::new();
            let profiles = FakeProfileStore::new();
            Self {
                provider: SessionProvider::new(backend.clone()),
                resolver: Arc::new(RoleResolver::new(profiles.clone())),
                backend,
                profiles,
            }
        }

        fn guard(&self, required_role: Option<Role>) -> RouteGuard {
            RouteGuard::new(self.provider.clone(), self.resolver.clone(), required_role)
        }

        fn sign_in_as(&self, id: &str, role: &str) -> Session {
            let session = Session::present(identity(id), fresh_credential());
            self.profiles.set_role(&identity(id), role);
            self.backend.set_session(session.clone());
            session
        }
    }

    #[test]
    fn evaluate_table() {
        let present = Session::present(identity("u"), fresh_credential());
        let absent = Session::Absent;

        assert_eq!(GuardState::evaluate(&absent, None, Some(Role::User)), GuardState::Unauthenticated);
        assert_eq!(GuardState::evaluate(&absent, Some(Role::Coach), None), GuardState::Unauthenticated);
        assert_eq!(GuardState::evaluate(&present, None, None), GuardState::AuthorizedNoRoleRequirement);
        assert_eq!(GuardState::evaluate(&present, None, Some(Role::User)), GuardState::Loading);
        assert_eq!(
            GuardState::evaluate(&present, Some(Role::Coach), Some(Role::Coach)),
            GuardState::AuthorizedCorrectRole(Role::Coach)
        );
        assert_eq!(
            GuardState::evaluate(&present, Some(Role::Coach), Some(Role::User)),
            GuardState::AuthorizedWrongRole(Role::Coach)
        );
    }

    #[test]
    fn decisions_redirect_with_policy_targets() {
        assert_eq!(Decision::RedirectToLogin.redirect_target(), Some(RoutePath::AUTH));
        assert_eq!(
            Decision::RedirectToRoleHome(Role::Moderator).redirect_target(),
            Some(RoutePath::MODERATOR_DASHBOARD)
        );
        assert_eq!(Decision::Allow.redirect_target(), None);
        assert_eq!(Decision::Pending.redirect_target(), None);
    }

    #[test]
    fn no_role_home_redirects_again_under_its_own_guard() {
        let present = Session::present(identity("u"), fresh_credential());
        for role in Role::ALL {
            let home = crate::Route::resolve(home_route_for(role).as_str());
            assert_eq!(
                decide(&present, Some(role), home.required_role()),
                Decision::Allow,
                "{role} would loop on {home:?}"
            );
        }
    }

    #[tokio::test]
    async fn unauthenticated_visit_redirects_to_login() {
        let h = Harness::new();
        let mut guard = h.guard(Some(Role::User)).mount();

        assert_eq!(guard.settled().await, GuardState::Unauthenticated);
        assert_eq!(guard.decision().redirect_target(), Some(RoutePath::AUTH));
    }

    #[tokio::test]
    async fn backend_error_fails_closed() {
        let h = Harness::new();
        h.sign_in_as("c-1", "coach");
        h.backend.fail_session_lookups(true);

        let mut guard = h.guard(Some(Role::Coach)).mount();
        assert_eq!(guard.settled().await, GuardState::Unauthenticated);
    }

    #[tokio::test]
    async fn coach_on_user_route_is_sent_to_coach_home() {
        let h = Harness::new();
        h.sign_in_as("c-1", "coach");

        let mut guard = h.guard(Some(Role::User)).mount();
        assert_eq!(guard.settled().await, GuardState::AuthorizedWrongRole(Role::Coach));
        assert_eq!(guard.decision().redirect_target(), Some(RoutePath::COACH_DASHBOARD));
    }

    #[tokio::test]
    async fn wrong_role_always_lands_on_that_roles_home() {
        for required in [Role::User, Role::Coach, Role::Moderator] {
            for actual in Role::ALL {
                if actual.satisfies(required) {
                    continue;
                }
                let h = Harness::new();
                h.sign_in_as("x", actual.as_str());

                let mut guard = h.guard(Some(required)).mount();
                guard.settled().await;
                assert_eq!(guard.decision().redirect_target(), Some(home_route_for(actual)));
            }
        }
    }

    #[tokio::test]
    async fn missing_profile_is_treated_as_user() {
        let h = Harness::new();
        let session = Session::present(identity("new"), fresh_credential());
        h.backend.set_session(session);

        let mut guard = h.guard(Some(Role::User)).mount();
        assert_eq!(guard.settled().await, GuardState::AuthorizedCorrectRole(Role::User));
    }

    #[tokio::test]
    async fn no_requirement_only_needs_a_session() {
        let h = Harness::new();
        h.sign_in_as("m-1", "moderator");

        let mut guard = h.guard(None).mount();
        assert_eq!(guard.settled().await, GuardState::AuthorizedNoRoleRequirement);
        assert_eq!(h.profiles.lookups(), 0);
    }

    #[tokio::test]
    async fn remounting_starts_from_loading_and_settles_identically() {
        let h = Harness::new();
        h.sign_in_as("c-1", "coach");
        let route = h.guard(Some(Role::Coach));

        for _ in 0..2 {
            let mut guard = route.mount();
            assert_eq!(guard.state(), GuardState::Loading);
            assert_eq!(guard.decision(), Decision::Pending);
            assert_eq!(guard.settled().await, GuardState::AuthorizedCorrectRole(Role::Coach));
        }
    }

    #[tokio::test]
    async fn sign_out_while_mounted_redirects_to_login() {
        let h = Harness::new();
        h.sign_in_as("c-1", "coach");

        let mut guard = h.guard(Some(Role::Coach)).mount();
        assert_eq!(guard.settled().await, GuardState::AuthorizedCorrectRole(Role::Coach));

        h.backend.push(SessionEvent::SignedOut, Session::Absent);
        assert_eq!(guard.changed().await, Some(GuardState::Unauthenticated));
        assert_eq!(guard.decision().redirect_target(), Some(RoutePath::AUTH));
    }

    #[tokio::test]
    async fn identity_switch_reevaluates_from_loading() {
        let h = Harness::new();
        h.sign_in_as("u-1", "user");

        let mut guard = h.guard(Some(Role::User)).mount();
        assert_eq!(guard.settled().await, GuardState::AuthorizedCorrectRole(Role::User));

        let gate = h.profiles.gate(&identity("c-1"));
        let coach = h.sign_in_as("c-1", "coach");
        h.backend.push(SessionEvent::SignedIn, coach);

        assert_eq!(guard.changed().await, Some(GuardState::Loading));
        gate.release();
        assert_eq!(guard.changed().await, Some(GuardState::AuthorizedWrongRole(Role::Coach)));
    }

    #[tokio::test]
    async fn token_refresh_for_same_identity_keeps_state() {
        let h = Harness::new();
        let session = h.sign_in_as("u-1", "user");

        let mut guard = h.guard(Some(Role::User)).mount();
        assert_eq!(guard.settled().await, GuardState::AuthorizedCorrectRole(Role::User));

        h.backend.push(SessionEvent::TokenRefreshed, session);
        h.backend.push(SessionEvent::SignedOut, Session::Absent);

        // The refresh produced no transition; the next one is the sign-out.
        assert_eq!(guard.changed().await, Some(GuardState::Unauthenticated));
    }

    #[tokio::test]
    async fn stale_role_resolution_never_overwrites_newer_identity() {
        let h = Harness::new();
        h.sign_in_as("a", "coach");
        let slow_a = h.profiles.gate(&identity("a"));

        let mut guard = h.guard(Some(Role::User)).mount();
        h.profiles.wait_for_lookups(1).await;
        assert_eq!(guard.state(), GuardState::Loading);

        // Session switches to B while A's lookup is parked.
        let b = h.sign_in_as("b", "user");
        h.backend.push(SessionEvent::SignedIn, b);
        assert_eq!(guard.settled().await, GuardState::AuthorizedCorrectRole(Role::User));

        // A's lookup completes after B's.
        slow_a.release();
        h.profiles.wait_for_lookups(2).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(guard.state(), GuardState::AuthorizedCorrectRole(Role::User));
    }

    #[tokio::test]
    async fn change_event_before_initial_fetch_wins() {
        let h = Harness::new();
        h.sign_in_as("old", "coach");
        let gate = h.backend.gate_session_lookups();

        let mut guard = h.guard(Some(Role::Moderator)).mount();
        tokio::task::yield_now().await;

        let fresh = h.sign_in_as("new", "moderator");
        h.backend.push(SessionEvent::SignedIn, fresh);
        assert_eq!(guard.settled().await, GuardState::AuthorizedCorrectRole(Role::Moderator));

        // The initial fetch now returns (it sees "new" too, but under a stale epoch).
        gate.release();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(guard.state(), GuardState::AuthorizedCorrectRole(Role::Moderator));
    }

    #[tokio::test]
    async fn unmount_releases_the_subscription() {
        let h = Harness::new();
        h.sign_in_as("u-1", "user");

        let mut guard = h.guard(Some(Role::User)).mount();
        assert_eq!(h.backend.subscriber_count(), 1);
        guard.settled().await;

        drop(guard);
        for _ in 0..10 {
            if h.backend.subscriber_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(h.backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unmount_mid_resolution_abandons_the_lookup() {
        let h = Harness::new();
        h.sign_in_as("c-1", "coach");
        let gate = h.profiles.gate(&identity("c-1"));

        let guard = h.guard(Some(Role::Coach)).mount();
        h.profiles.wait_for_lookups(1).await;
        assert_eq!(guard.state(), GuardState::Loading);

        drop(guard);
        while h.backend.subscriber_count() > 0 {
            tokio::task::yield_now().await;
        }
        gate.release();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        // The abandoned lookup never reached the resolver cache.
        h.profiles.ungate(&identity("c-1"));
        h.profiles.set_role(&identity("c-1"), "moderator");
        assert_eq!(h.resolver.resolve_role(&identity("c-1")).await, Role::Moderator);
    }
}
