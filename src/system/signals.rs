// src/system/signals.rs

//! Interrupt handling.
//!
//! The REPL asks the [`InterruptController`] for a fresh [`InterruptScope`] at the
//! start of every cycle. The scope's token is cancelled when the process
//! receives `SIGINT`, `SIGTERM` or `SIGQUIT` (`Ctrl+C` on Windows) while the scope
//! is current, or when the scope is dropped. An interrupt therefore aborts only
//! the line being executed; the next cycle starts with a clean scope.
//!
//! The signal streams are registered once, when the controller is created. From
//! then on the shell owns these signals, so they no longer terminate the shell
//! process itself.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::CancellationToken;

type CurrentScope = Arc<Mutex<Option<CancellationToken>>>;

/// Hands out one cancellation scope per REPL cycle.
#[derive(Debug, Clone)]
pub struct InterruptController {
    current: CurrentScope,
    listener: Option<Arc<Listener>>,
}

/// The task that turns received signals into cancellations. Stops with the last
/// controller clone.
#[derive(Debug)]
struct Listener(JoinHandle<()>);

impl Drop for Listener {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl InterruptController {
    /// A controller bound to the process's termination signals.
    ///
    /// Registers the signal streams and starts the listener task, so it must be
    /// called inside a Tokio runtime.
    pub fn new() -> io::Result<Self> {
        let mut signals = OsSignals::register()?;
        let current = CurrentScope::default();
        let target = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            while let Some(name) = signals.recv().await {
                log::debug!("Received {}, cancelling the current line", name);
                cancel_current(&target);
            }
            log::warn!("Signal streams closed, interrupts are no longer delivered");
        });

        Ok(Self {
            current,
            listener: Some(Arc::new(Listener(handle))),
        })
    }

    /// A controller that ignores OS signals; scopes only end through
    /// [`InterruptController::interrupt`] or by being dropped.
    pub fn detached() -> Self {
        Self {
            current: CurrentScope::default(),
            listener: None,
        }
    }

    /// Interrupts the most recently created scope, as if a signal had arrived.
    pub fn interrupt(&self) {
        log::debug!("Interrupt requested programmatically");
        cancel_current(&self.current);
    }

    /// Creates the scope for one REPL cycle.
    pub fn scope(&self) -> InterruptScope {
        let token = CancellationToken::new();
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(token.clone());
        InterruptScope { token }
    }
}

fn cancel_current(current: &CurrentScope) {
    let guard = current.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(token) = guard.as_ref() {
        token.cancel();
    }
}

/// The cancellation boundary for one REPL cycle. Dropping it releases the scope.
#[derive(Debug)]
pub struct InterruptScope {
    token: CancellationToken,
}

impl InterruptScope {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(unix)]
struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Waits for the next signal. `None` once every stream has closed.
    async fn recv(&mut self) -> Option<&'static str> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some("SIGINT"),
            Some(()) = self.terminate.recv() => Some("SIGTERM"),
            Some(()) = self.quit.recv() => Some("SIGQUIT"),
            else => None,
        }
    }
}

#[cfg(windows)]
struct OsSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl OsSignals {
    fn register() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> Option<&'static str> {
        self.ctrl_c.recv().await.map(|()| "Ctrl+C")
    }
}

/// Serializes tests that raise real signals or listen for them, since every
/// registered listener in the process sees a raised signal.
#[cfg(test)]
pub(crate) static OS_SIGNAL_TESTS: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dropping_scope_releases_token() {
        let controller = InterruptController::detached();
        let scope = controller.scope();
        let token = scope.token().clone();

        assert!(!token.is_cancelled());
        drop(scope);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_interrupt_only_hits_current_scope() {
        let controller = InterruptController::detached();

        let first = controller.scope();
        let first_token = first.token().clone();
        controller.interrupt();
        assert!(first.is_interrupted());
        drop(first);

        let second = controller.scope();
        assert!(!second.is_interrupted());
        assert!(first_token.is_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_sigint_cancels_only_current_scope() {
        use nix::sys::signal::{Signal, raise};

        let _serial = OS_SIGNAL_TESTS.lock().await;

        // --- Setup ---
        let controller = InterruptController::new().unwrap();
        let scope = controller.scope();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!scope.is_interrupted());

        // --- Execute ---
        raise(Signal::SIGINT).unwrap();

        // --- Assert ---
        tokio::time::timeout(Duration::from_secs(5), scope.token().cancelled())
            .await
            .unwrap();
        drop(scope);

        let next = controller.scope();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!next.is_interrupted());
    }
}
