//! ============================================================================
//! Access Gate - Role-gated rendering for dashboard pages
//! ============================================================================
//! Mediates between the wallet session, the async role check and what the
//! page renders. One driver task per mounted gate:
//!
//!   session watch ──┐
//!   commands mpsc ──┼──> driver (owns the in-flight check) ──> view watch
//!   check future ───┘
//!
//! At most one check is in flight. Disconnect, account switch and unmount
//! drop the pending check future, so a late result can never be applied.
//! ============================================================================

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::checker::RoleChecker;
use super::decision::{decide, AccessDecision, GateState, Rendered};
use super::types::{abbreviate_address, Requirement, RoleGrant};
use crate::clipboard::Clipboard;
use crate::error::RoleCheckError;
use crate::notify::{NotificationKind, Notifier};
use crate::wallet::WalletSession;

/// Depth of the command queue between handle and driver
const COMMAND_QUEUE_DEPTH: usize = 8;

/// Result of "Check Again" or a post-write refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecheckOutcome {
    Granted,
    Denied,
    /// Check failed; the gate shows the denied banner
    Failed(RoleCheckError),
    /// A check is already in flight; nothing was issued
    Busy,
    NotConnected,
    /// Wallet disconnected, switched account or a refresh replaced this check
    Superseded,
    Unmounted,
}

/// Everything a page needs to render the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateView {
    pub requirement: Requirement,
    pub session: WalletSession,
    pub grant: Option<RoleGrant>,
}

impl GateView {
    pub fn decision(&self) -> AccessDecision {
        decide(self.requirement, &self.session, self.grant.as_ref())
    }

    pub fn state(&self) -> GateState {
        self.decision().state()
    }

    /// No lookup in progress
    pub fn is_settled(&self) -> bool {
        let refreshing = self.grant.as_ref().map(|g| g.refreshing).unwrap_or(false);
        self.state() != GateState::Checking && !refreshing
    }

    /// Render `children` only when access is granted
    pub fn render<T>(&self, children: impl FnOnce() -> T) -> Rendered<T> {
        match self.decision() {
            AccessDecision::ShowContent => Rendered::Content(children()),
            fallback => Rendered::Fallback(fallback),
        }
    }
}

/// A gate configuration: what to require and how to check it
pub struct AccessGate {
    requirement: Requirement,
    checker: Arc<dyn RoleChecker>,
    notifier: Arc<dyn Notifier>,
}

impl AccessGate {
    pub fn new(
        requirement: impl Into<Requirement>,
        checker: Arc<dyn RoleChecker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            requirement: requirement.into(),
            checker,
            notifier,
        }
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    /// Start the gate for a page. Must be called inside a tokio runtime.
    pub fn mount(&self, session: watch::Receiver<WalletSession>) -> GateHandle {
        let id = Uuid::new_v4();
        let current = session.borrow().clone();

        let (view_tx, view_rx) = watch::channel(GateView {
            requirement: self.requirement,
            session: current.clone(),
            grant: None,
        });
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        info!("[gate {}] Mounting {} gate", id, self.requirement.display_name());

        let driver = Driver {
            id,
            requirement: self.requirement,
            checker: Arc::clone(&self.checker),
            notifier: Arc::clone(&self.notifier),
            session,
            commands: command_rx,
            view: view_tx,
            current,
            grant: None,
            pending: None,
        };

        GateHandle {
            id,
            view: view_rx,
            commands: command_tx,
            notifier: Arc::clone(&self.notifier),
            task: tokio::spawn(driver.run()),
        }
    }
}

/// A mounted gate. Dropping it unmounts the gate.
pub struct GateHandle {
    id: Uuid,
    view: watch::Receiver<GateView>,
    commands: mpsc::Sender<Command>,
    notifier: Arc<dyn Notifier>,
    task: JoinHandle<()>,
}

impl GateHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn view(&self) -> GateView {
        self.view.borrow().clone()
    }

    pub fn decision(&self) -> AccessDecision {
        self.view.borrow().decision()
    }

    pub fn state(&self) -> GateState {
        self.view.borrow().state()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateView> {
        self.view.clone()
    }

    /// Wait for a view matching `predicate`. None once the gate is gone.
    pub async fn wait_until(&self, predicate: impl FnMut(&GateView) -> bool) -> Option<GateView> {
        let mut rx = self.view.clone();
        let view = rx.wait_for(predicate).await.ok().map(|v| (*v).clone());
        view
    }

    /// "Check Again". Returns `Busy` without issuing a call while a check
    /// is in flight.
    pub async fn recheck(&self) -> RecheckOutcome {
        self.request(Command::Recheck).await
    }

    /// Drop the current grant and re-fetch it. Call after any role write
    /// (assign/revoke) that could affect the connected address.
    pub async fn invalidate(&self) -> RecheckOutcome {
        self.request(Command::Refresh).await
    }

    /// Copy the connected address. Failures are logged and swallowed.
    pub fn copy_address(&self, clipboard: &dyn Clipboard) -> bool {
        let view = self.view();
        let Some(address) = view.session.connected_address() else {
            return false;
        };

        match clipboard.copy_text(address) {
            Ok(()) => {
                self.notifier.notify(
                    NotificationKind::Info,
                    &format!("Copied {} to clipboard", abbreviate_address(address)),
                );
                true
            }
            Err(e) => {
                warn!("[gate {}] Failed to copy address: {}", self.id, e);
                false
            }
        }
    }

    pub fn unmount(self) {
        drop(self);
    }

    async fn request(&self, command: fn(oneshot::Sender<RecheckOutcome>) -> Command) -> RecheckOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(command(reply_tx)).await.is_err() {
            return RecheckOutcome::Unmounted;
        }
        reply_rx.await.unwrap_or(RecheckOutcome::Unmounted)
    }
}

impl Drop for GateHandle {
    fn drop(&mut self) {
        debug!("[gate {}] Unmounting", self.id);
        self.task.abort();
    }
}

enum Command {
    Recheck(oneshot::Sender<RecheckOutcome>),
    Refresh(oneshot::Sender<RecheckOutcome>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckOrigin {
    /// Connection or account switch
    Connect,
    /// User pressed "Check Again"
    Recheck,
    /// Grant invalidated after a role write
    Refresh,
}

type CheckResult = Result<bool, RoleCheckError>;

struct PendingCheck {
    address: String,
    origin: CheckOrigin,
    future: BoxFuture<'static, CheckResult>,
    reply: Option<oneshot::Sender<RecheckOutcome>>,
}

struct Driver {
    id: Uuid,
    requirement: Requirement,
    checker: Arc<dyn RoleChecker>,
    notifier: Arc<dyn Notifier>,
    session: watch::Receiver<WalletSession>,
    commands: mpsc::Receiver<Command>,
    view: watch::Sender<GateView>,
    current: WalletSession,
    grant: Option<RoleGrant>,
    pending: Option<PendingCheck>,
}

impl Driver {
    async fn run(mut self) {
        let initial = self.session.borrow_and_update().clone();
        self.on_session(initial);

        let mut session_open = true;

        loop {
            tokio::select! {
                changed = self.session.changed(), if session_open => {
                    if changed.is_err() {
                        // Provider gone: nothing can be connected anymore
                        session_open = false;
                        self.on_session(WalletSession::disconnected());
                        continue;
                    }
                    let session = self.session.borrow_and_update().clone();
                    self.on_session(session);
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                result = resolve(&mut self.pending), if self.pending.is_some() => {
                    if let Some(pending) = self.pending.take() {
                        self.on_result(pending, result);
                    }
                }
            }
        }

        debug!("[gate {}] Driver stopped", self.id);
    }

    fn on_session(&mut self, session: WalletSession) {
        let address = session.connected_address().map(str::to_string);
        let tracked = self.grant.as_ref().map(|g| g.address.clone());
        self.current = session;

        match address {
            None => {
                self.cancel_pending();
                if let Some(grant) = self.grant.take() {
                    info!(
                        "[gate {}] Wallet disconnected, discarding grant for {}",
                        self.id,
                        abbreviate_address(&grant.address)
                    );
                }
                self.publish();
            }
            Some(address) if tracked.as_deref() == Some(address.as_str()) => self.publish(),
            Some(address) => {
                self.cancel_pending();
                self.begin_check(address, CheckOrigin::Connect, None);
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        let (origin, reply) = match command {
            Command::Recheck(reply) => (CheckOrigin::Recheck, reply),
            Command::Refresh(reply) => (CheckOrigin::Refresh, reply),
        };

        let Some(address) = self.current.connected_address().map(str::to_string) else {
            let _ = reply.send(RecheckOutcome::NotConnected);
            return;
        };

        match origin {
            CheckOrigin::Recheck if self.pending.is_some() => {
                debug!("[gate {}] Check already in flight, ignoring recheck", self.id);
                let _ = reply.send(RecheckOutcome::Busy);
            }
            CheckOrigin::Recheck => self.begin_check(address, origin, Some(reply)),
            _ => {
                // The in-flight read may predate the write
                self.cancel_pending();
                info!("[gate {}] Grant invalidated, re-fetching", self.id);
                self.begin_check(address, origin, Some(reply));
            }
        }
    }

    fn begin_check(
        &mut self,
        address: String,
        origin: CheckOrigin,
        reply: Option<oneshot::Sender<RecheckOutcome>>,
    ) {
        let role = match self.requirement {
            Requirement::Role(role) => role,
            Requirement::Unrestricted => {
                let mut grant = RoleGrant::pending(self.requirement, address);
                grant.resolve(true, Utc::now());
                self.grant = Some(grant);
                if let Some(reply) = reply {
                    let _ = reply.send(RecheckOutcome::Granted);
                }
                self.publish();
                return;
            }
        };

        // "Check Again" keeps the last result on screen while it runs
        let keep_result = origin == CheckOrigin::Recheck
            && self.grant.as_ref().map(|g| g.address == address).unwrap_or(false);
        match self.grant.as_mut() {
            Some(grant) if keep_result => grant.refreshing = true,
            _ => self.grant = Some(RoleGrant::pending(self.requirement, address.clone())),
        }

        debug!(
            "[gate {}] Checking {} role for {} ({:?})",
            self.id,
            role,
            abbreviate_address(&address),
            origin
        );

        let checker = Arc::clone(&self.checker);
        let account = address.clone();
        let future = async move {
            // The call itself runs inside the guard: an impl may panic before
            // handing back its future.
            let call = async move { checker.has_role(role, &account).await };
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(RoleCheckError::Panicked(panic_message(&*panic))),
            }
        }
        .boxed();

        self.pending = Some(PendingCheck {
            address,
            origin,
            future,
            reply,
        });
        self.publish();
    }

    fn on_result(&mut self, pending: PendingCheck, result: CheckResult) {
        let PendingCheck {
            address,
            origin,
            reply,
            ..
        } = pending;

        let outcome = match result {
            Ok(true) => RecheckOutcome::Granted,
            Ok(false) => RecheckOutcome::Denied,
            Err(e) => RecheckOutcome::Failed(e),
        };

        if let Some(grant) = self.grant.as_mut().filter(|g| g.address == address) {
            match &outcome {
                RecheckOutcome::Failed(_) => grant.fail(),
                _ => grant.resolve(outcome == RecheckOutcome::Granted, Utc::now()),
            }
        }

        let role = self.requirement.display_name();
        let short = abbreviate_address(&address);

        match (&outcome, origin) {
            (RecheckOutcome::Failed(e), _) => {
                warn!("[gate {}] {} role check failed for {}: {}", self.id, role, short, e);
                self.notifier.notify(
                    NotificationKind::Error,
                    &format!("Could not verify {} role for {}: {}", role, short, e),
                );
            }
            (RecheckOutcome::Granted, CheckOrigin::Recheck) => self.notifier.notify(
                NotificationKind::Success,
                &format!("Access verified: {} holds the {} role", short, role),
            ),
            (RecheckOutcome::Denied, CheckOrigin::Recheck) => self.notifier.notify(
                NotificationKind::Error,
                &format!("Access still denied: {} does not hold the {} role", short, role),
            ),
            _ => {}
        }

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
        self.publish();
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(
                "[gate {}] Discarding in-flight check for {}",
                self.id,
                abbreviate_address(&pending.address)
            );
            if let Some(reply) = pending.reply {
                let _ = reply.send(RecheckOutcome::Superseded);
            }
        }
    }

    /// Publish the view if it changed
    fn publish(&self) {
        let next = GateView {
            requirement: self.requirement,
            session: self.current.clone(),
            grant: self.grant.clone(),
        };
        let id = self.id;

        self.view.send_if_modified(move |view| {
            if *view == next {
                return false;
            }
            let (from, to) = (view.state(), next.state());
            if from != to {
                info!("[gate {}] {:?} -> {:?}", id, from, to);
            }
            *view = next;
            true
        });
    }
}

async fn resolve(pending: &mut Option<PendingCheck>) -> CheckResult {
    match pending {
        Some(pending) => (&mut pending.future).await,
        None => std::future::pending().await,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "role checker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::checker::{FnRoleChecker, StaticRoleChecker};
    use crate::access::types::{GrantStatus, Role};
    use crate::clipboard::MemoryClipboard;
    use crate::error::{ClipboardError, ConnectionError};
    use crate::notify::RecordingNotifier;
    use crate::wallet::{WalletConnector, WalletProvider};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const ADDR: &str = "0xABCDEF0123456789ABCDEF0123456789ABCD1234";
    const OTHER: &str = "0x8617E340B3D01FA5F11F306F4090FD50E238070D";

    type Resolver = oneshot::Sender<CheckResult>;

    /// Checker whose calls resolve only when the test says so
    #[derive(Default)]
    struct DeferredChecker {
        waiting: Mutex<VecDeque<(String, Resolver)>>,
    }

    impl DeferredChecker {
        async fn next_call(&self) -> (String, Resolver) {
            for _ in 0..400 {
                let call = self.waiting.lock().unwrap().pop_front();
                if let Some(call) = call {
                    return call;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("role checker was never called");
        }
    }

    #[async_trait]
    impl RoleChecker for DeferredChecker {
        async fn has_role(&self, _role: Role, address: &str) -> CheckResult {
            let (tx, rx) = oneshot::channel();
            self.waiting.lock().unwrap().push_back((address.to_string(), tx));
            rx.await
                .unwrap_or_else(|_| Err(RoleCheckError::Network("resolver dropped".into())))
        }
    }

    struct PanickingChecker;

    #[async_trait]
    impl RoleChecker for PanickingChecker {
        async fn has_role(&self, _role: Role, _address: &str) -> CheckResult {
            panic!("rpc client exploded");
        }
    }

    /// Panics while building the future, before anything is polled
    struct EagerPanicChecker;

    impl RoleChecker for EagerPanicChecker {
        fn has_role<'a, 'b, 'f>(
            &'a self,
            _role: Role,
            _address: &'b str,
        ) -> Pin<Box<dyn Future<Output = CheckResult> + Send + 'f>>
        where
            'a: 'f,
            'b: 'f,
            Self: 'f,
        {
            panic!("rpc client failed to build request");
        }
    }

    struct FailingClipboard;

    impl Clipboard for FailingClipboard {
        fn copy_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Unavailable("no display".into()))
        }
    }

    struct RejectingConnector;

    #[async_trait]
    impl WalletConnector for RejectingConnector {
        async fn request_account(&self) -> Result<String, ConnectionError> {
            Err(ConnectionError::Rejected)
        }
    }

    fn mount(
        requirement: impl Into<Requirement>,
        checker: Arc<dyn RoleChecker>,
        notifier: Arc<RecordingNotifier>,
        wallet: &WalletProvider,
    ) -> GateHandle {
        AccessGate::new(requirement, checker, notifier).mount(wallet.subscribe())
    }

    async fn wait_state(handle: &GateHandle, state: GateState) -> GateView {
        tokio::time::timeout(Duration::from_secs(2), handle.wait_until(|v| v.state() == state))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {:?}, at {:?}", state, handle.state()))
            .expect("gate unmounted")
    }

    fn counting_checker(calls: Arc<AtomicUsize>, granted: bool) -> Arc<dyn RoleChecker> {
        Arc::new(FnRoleChecker::new(move |_role: Role, _address: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, RoleCheckError>(granted) }
        }))
    }

    #[tokio::test]
    async fn test_scenario_a_granted_renders_children() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(StaticRoleChecker::new().with_grant(ADDR, Role::Miner));
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Miner, checker, notifier.clone(), &wallet);
        let view = wait_state(&handle, GateState::Granted).await;

        assert_eq!(view.render(|| "miner dashboard"), Rendered::Content("miner dashboard"));
        let grant = view.grant.unwrap();
        assert_eq!(grant.granted, GrantStatus::Granted);
        assert!(grant.last_checked_at.is_some());
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_b_denied_banner_copy_and_check_again() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(StaticRoleChecker::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Refiner, checker.clone(), notifier.clone(), &wallet);
        let view = wait_state(&handle, GateState::Denied).await;

        let AccessDecision::ShowDeniedBanner(banner) = view.decision() else {
            panic!("expected denied banner");
        };
        assert_eq!(banner.display_address, "0xABCD...1234");
        assert!(matches!(view.render(|| ()), Rendered::Fallback(_)));

        let clipboard = MemoryClipboard::new();
        assert!(handle.copy_address(&clipboard));
        assert_eq!(clipboard.contents().as_deref(), Some(ADDR));
        assert_eq!(notifier.count(NotificationKind::Info), 1);

        // Still lacking the role: stays denied and re-notifies
        assert_eq!(handle.recheck().await, RecheckOutcome::Denied);
        assert_eq!(handle.state(), GateState::Denied);
        assert_eq!(notifier.count(NotificationKind::Error), 1);

        checker.grant(ADDR, Role::Refiner);
        assert_eq!(handle.recheck().await, RecheckOutcome::Granted);
        wait_state(&handle, GateState::Granted).await;
        assert_eq!(notifier.count(NotificationKind::Success), 1);
    }

    #[tokio::test]
    async fn test_scenario_c_check_error_denies_with_one_notification() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(FnRoleChecker::new(|_role: Role, _address: String| async {
            Err::<bool, _>(RoleCheckError::Network("connection refused".into()))
        }));
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Inspector, checker, notifier.clone(), &wallet);
        let view = wait_state(&handle, GateState::Denied).await;
        // Nothing was read successfully
        assert_eq!(view.grant.and_then(|g| g.last_checked_at), None);

        let notifications = notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Error);
        assert!(notifications[0].message.contains("connection refused"));

        // Check Again stays usable after a failure
        assert!(matches!(
            handle.recheck().await,
            RecheckOutcome::Failed(RoleCheckError::Network(_))
        ));
        assert_eq!(handle.state(), GateState::Denied);
    }

    #[tokio::test]
    async fn test_scenario_d_disconnect_discards_grant() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(StaticRoleChecker::new().with_grant(ADDR, Role::Buyer));
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Buyer, checker, notifier, &wallet);
        wait_state(&handle, GateState::Granted).await;

        wallet.disconnect();
        let view = wait_state(&handle, GateState::Disconnected).await;

        assert!(view.grant.is_none());
        assert_eq!(
            view.decision(),
            AccessDecision::ShowConnectPrompt {
                requirement: Role::Buyer.into(),
                connecting: false
            }
        );
        assert_eq!(handle.recheck().await, RecheckOutcome::NotConnected);
    }

    #[tokio::test]
    async fn test_disconnected_session_never_checks() {
        let wallet = WalletProvider::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Admin, counting_checker(calls.clone(), true), notifier, &wallet);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(handle.state(), GateState::Disconnected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_connection_keeps_connect_prompt() {
        let wallet = WalletProvider::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Miner, counting_checker(calls.clone(), true), notifier, &wallet);

        assert!(wallet.connect(&RejectingConnector).await.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            handle.decision(),
            AccessDecision::ShowConnectPrompt { connecting: false, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_granted_resolution_publishes_once() {
        let wallet = WalletProvider::new();
        let checker = Arc::new(DeferredChecker::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Auditor, checker.clone(), notifier, &wallet);

        let mut rx = handle.subscribe();
        wallet.set_connected(ADDR);
        let (_, resolver) = checker.next_call().await;
        wait_state(&handle, GateState::Checking).await;
        let _ = rx.borrow_and_update();

        resolver.send(Ok(true)).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state(), GateState::Granted);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_recheck_while_pending_is_busy() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(DeferredChecker::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Transporter, checker.clone(), notifier.clone(), &wallet);

        let (_, initial) = checker.next_call().await;
        initial.send(Ok(false)).unwrap();
        wait_state(&handle, GateState::Denied).await;

        let first = handle.recheck();
        let second = async {
            let (_, resolver) = checker.next_call().await;

            let view = handle.wait_until(|v| !v.is_settled()).await.unwrap();
            let AccessDecision::ShowDeniedBanner(banner) = view.decision() else {
                panic!("banner should stay up during Check Again");
            };
            assert!(banner.rechecking);

            assert_eq!(handle.recheck().await, RecheckOutcome::Busy);
            resolver.send(Ok(true)).unwrap();
        };

        let (outcome, ()) = tokio::join!(first, second);
        assert_eq!(outcome, RecheckOutcome::Granted);
        assert_eq!(handle.state(), GateState::Granted);
        assert_eq!(notifier.count(NotificationKind::Success), 1);
    }

    #[tokio::test]
    async fn test_repeated_rechecks_always_terminate() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(StaticRoleChecker::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Miner, checker.clone(), notifier, &wallet);
        wait_state(&handle, GateState::Denied).await;

        for round in 0..6 {
            let holds = round % 2 == 1;
            if holds {
                checker.grant(ADDR, Role::Miner);
            } else {
                checker.revoke(ADDR, Role::Miner);
            }

            let outcome = handle.recheck().await;
            let expected = if holds { RecheckOutcome::Granted } else { RecheckOutcome::Denied };
            assert_eq!(outcome, expected);
            assert!(handle.view().is_settled());
        }
    }

    #[tokio::test]
    async fn test_unmount_while_pending_discards_result() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(DeferredChecker::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Admin, checker.clone(), notifier.clone(), &wallet);

        let (_, resolver) = checker.next_call().await;
        let mut rx = handle.subscribe();
        wait_state(&handle, GateState::Checking).await;

        handle.unmount();
        let _ = resolver.send(Ok(true));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(rx.borrow_and_update().state(), GateState::Checking);
        assert!(rx.changed().await.is_err());
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_account_switch_discards_stale_result() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(DeferredChecker::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Miner, checker.clone(), notifier, &wallet);

        let (first_address, first) = checker.next_call().await;
        assert_eq!(first_address, ADDR);

        wallet.switch_account(OTHER);
        let (second_address, second) = checker.next_call().await;
        assert_eq!(second_address, OTHER);

        // The first lookup was dropped with the old account
        assert!(first.send(Ok(true)).is_err());

        second.send(Ok(false)).unwrap();
        let view = wait_state(&handle, GateState::Denied).await;
        assert_eq!(view.grant.unwrap().address, OTHER);
    }

    #[tokio::test]
    async fn test_invalidate_after_revoke_refetches() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(StaticRoleChecker::new().with_grant(ADDR, Role::Inspector));
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Inspector, checker.clone(), notifier, &wallet);
        wait_state(&handle, GateState::Granted).await;

        checker.revoke(ADDR, Role::Inspector);
        // Cached grant is stale until re-fetched
        assert_eq!(handle.state(), GateState::Granted);

        assert_eq!(handle.invalidate().await, RecheckOutcome::Denied);
        assert_eq!(handle.state(), GateState::Denied);
    }

    #[tokio::test]
    async fn test_invalidate_supersedes_pending_recheck() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(DeferredChecker::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Buyer, checker.clone(), notifier, &wallet);

        let (_, initial) = checker.next_call().await;
        initial.send(Ok(false)).unwrap();
        wait_state(&handle, GateState::Denied).await;

        let recheck = handle.recheck();
        let refresh = async {
            let (_, stale) = checker.next_call().await;
            let refresh = handle.invalidate();
            let resolve = async {
                let (_, fresh) = checker.next_call().await;
                assert!(stale.send(Ok(false)).is_err());
                fresh.send(Ok(true)).unwrap();
            };
            let (outcome, ()) = tokio::join!(refresh, resolve);
            outcome
        };

        let (recheck_outcome, refresh_outcome) = tokio::join!(recheck, refresh);
        assert_eq!(recheck_outcome, RecheckOutcome::Superseded);
        assert_eq!(refresh_outcome, RecheckOutcome::Granted);
    }

    #[tokio::test]
    async fn test_unrestricted_gate_skips_checker() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(
            Requirement::Unrestricted,
            counting_checker(calls.clone(), false),
            notifier,
            &wallet,
        );
        wait_state(&handle, GateState::Granted).await;
        assert_eq!(handle.recheck().await, RecheckOutcome::Granted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_checker_panic_collapses_to_denied() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Auditor, Arc::new(PanickingChecker), notifier.clone(), &wallet);
        wait_state(&handle, GateState::Denied).await;

        let errors: Vec<_> = notifier
            .notifications()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("rpc client exploded"));
    }

    #[tokio::test]
    async fn test_checker_panic_before_future_collapses_to_denied() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Miner, Arc::new(EagerPanicChecker), notifier.clone(), &wallet);
        wait_state(&handle, GateState::Denied).await;
        assert_eq!(notifier.count(NotificationKind::Error), 1);

        // The driver survived: Check Again still answers
        assert!(matches!(
            handle.recheck().await,
            RecheckOutcome::Failed(RoleCheckError::Panicked(_))
        ));
        assert_eq!(handle.state(), GateState::Denied);
        assert_eq!(notifier.count(NotificationKind::Error), 2);
    }

    #[tokio::test]
    async fn test_clipboard_failure_is_swallowed() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = mount(Role::Refiner, Arc::new(StaticRoleChecker::new()), notifier.clone(), &wallet);
        wait_state(&handle, GateState::Denied).await;

        assert!(!handle.copy_address(&FailingClipboard));
        assert_eq!(notifier.count(NotificationKind::Info), 0);
        assert_eq!(handle.state(), GateState::Denied);
    }

    #[tokio::test]
    async fn test_provider_dropped_acts_as_disconnect() {
        let wallet = WalletProvider::new();
        wallet.set_connected(ADDR);
        let checker = Arc::new(StaticRoleChecker::new().with_grant(ADDR, Role::Miner));
        let notifier = Arc::new(RecordingNotifier::new());
        let handle = mount(Role::Miner, checker, notifier, &wallet);
        wait_state(&handle, GateState::Granted).await;

        drop(wallet);
        wait_state(&handle, GateState::Disconnected).await;
    }
}
