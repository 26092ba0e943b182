//! Roots manager (spec §4.6, component G): an actor task owning the
//! root list, reachable only via a mailbox of request messages.
//!
//! Grounded on the teacher's actor-with-reply-channel idiom (the same
//! shape as `turbomcp-client/src/client/dispatcher.rs`'s background
//! task, here applied to mutable state instead of message routing) and
//! on spec §4.6/§9 ("actor with channel mailbox for roots ... avoids
//! sharing mutable state across tasks").

use std::path::Path;

use mcpc_core::error::{McpError, McpResult};
use mcpc_protocol::roots::Root;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use url::Url;

/// Emits the list-changed notification; installed by the owning
/// `Client` so the actor never depends on the session engine directly.
/// Must never propagate a panic (spec §4.6): the actor calls it inside
/// `catch_unwind`.
pub type ListChangedNotifier = std::sync::Arc<dyn Fn() + Send + Sync>;

enum Op {
    Add { uri: String, name: Option<String>, reply: oneshot::Sender<McpResult<Root>> },
    Remove { uri: String, reply: oneshot::Sender<McpResult<()>> },
    Get { reply: oneshot::Sender<Vec<Root>> },
}

/// A handle to the roots actor. Cloning shares the same mailbox; the
/// actor itself stops when every handle (and the mailbox sender side)
/// is dropped, which happens when the owning session closes.
#[derive(Clone)]
pub struct RootsManager {
    mailbox: mpsc::Sender<Op>,
}

/// Canonicalizes a root path/URI to a `file://` URI (spec §4.6, §8
/// property 5). Rejects non-file schemes explicitly; a bare path
/// (relative or absolute) is treated as a filesystem path and made
/// absolute against the current working directory first.
///
/// # Errors
/// Returns `ErrorKind::InvalidParams` for a non-file URI scheme.
pub fn canonicalize_root_uri(input: &str) -> McpResult<String> {
    if let Ok(url) = Url::parse(input) {
        if url.scheme() != "file" {
            return Err(McpError::invalid_params(format!(
                "root uri scheme '{}' is not supported; only file:// roots are allowed",
                url.scheme()
            )));
        }
        return Ok(url.to_string());
    }
    let path = Path::new(input);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| McpError::internal(format!("cannot resolve relative root path: {e}")))?
            .join(path)
    };
    Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|()| McpError::invalid_params(format!("cannot convert '{input}' to a file:// uri")))
}

impl RootsManager {
    /// Spawns the actor task and returns a handle plus the bounded
    /// mailbox's join handle (dropped by the caller to detach, or kept
    /// to await a clean shutdown).
    #[must_use]
    pub fn spawn(notifier: ListChangedNotifier) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(Self::run(rx, notifier));
        (Self { mailbox: tx }, task)
    }

    async fn run(mut mailbox: mpsc::Receiver<Op>, notifier: ListChangedNotifier) {
        let mut roots: Vec<Root> = Vec::new();
        while let Some(op) = mailbox.recv().await {
            match op {
                Op::Add { uri, name, reply } => {
                    let result = Self::do_add(&mut roots, uri, name);
                    if result.is_ok() {
                        Self::notify(&notifier);
                    }
                    let _ = reply.send(result);
                }
                Op::Remove { uri, reply } => {
                    let result = Self::do_remove(&mut roots, &uri);
                    if result.is_ok() {
                        Self::notify(&notifier);
                    }
                    let _ = reply.send(result);
                }
                Op::Get { reply } => {
                    let _ = reply.send(roots.clone());
                }
            }
        }
    }

    fn do_add(roots: &mut Vec<Root>, uri: String, name: Option<String>) -> McpResult<Root> {
        let canonical = canonicalize_root_uri(&uri)?;
        if roots.iter().any(|r| r.uri == canonical) {
            return Err(McpError::invalid_params(format!("root with URI {canonical} already exists")));
        }
        let root = Root::new(canonical, name);
        roots.push(root.clone());
        Ok(root)
    }

    fn do_remove(roots: &mut Vec<Root>, uri: &str) -> McpResult<()> {
        let canonical = canonicalize_root_uri(uri)?;
        let before = roots.len();
        roots.retain(|r| r.uri != canonical);
        if roots.len() == before {
            return Err(McpError::invalid_params(format!("root with URI {canonical} does not exist")));
        }
        Ok(())
    }

    /// A panicking notifier must not bring down the actor task (spec
    /// §4.6, §7). `catch_unwind` requires `UnwindSafe`; the notifier is
    /// a plain `Fn()` closure so this holds in practice.
    fn notify(notifier: &ListChangedNotifier) {
        let notifier = notifier.clone();
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| notifier())).is_err() {
            warn!("roots manager: list-changed notifier panicked, ignoring");
        }
    }

    /// Add a root, canonicalizing `uri_or_path` to a `file://` URI.
    ///
    /// # Errors
    /// Returns an error if the mailbox is gone (session closed) or the
    /// URI is rejected (bad scheme, duplicate).
    pub async fn add(&self, uri_or_path: impl Into<String>, name: Option<String>) -> McpResult<Root> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox
            .send(Op::Add { uri: uri_or_path.into(), name, reply: reply_tx })
            .await
            .map_err(|_| McpError::internal("roots manager actor has stopped"))?;
        reply_rx.await.map_err(|_| McpError::internal("roots manager actor dropped the reply"))?
    }

    /// Remove a root by its original path or normalized URI.
    ///
    /// # Errors
    /// Returns an error if the mailbox is gone or no matching root exists.
    pub async fn remove(&self, uri_or_path: impl Into<String>) -> McpResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox
            .send(Op::Remove { uri: uri_or_path.into(), reply: reply_tx })
            .await
            .map_err(|_| McpError::internal("roots manager actor has stopped"))?;
        reply_rx.await.map_err(|_| McpError::internal("roots manager actor dropped the reply"))?
    }

    /// A defensive copy of the current root list.
    ///
    /// # Errors
    /// Returns an error if the mailbox is gone (session closed).
    pub async fn get(&self) -> McpResult<Vec<Root>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox
            .send(Op::Get { reply: reply_tx })
            .await
            .map_err(|_| McpError::internal("roots manager actor has stopped"))?;
        reply_rx.await.map_err(|_| McpError::internal("roots manager actor dropped the reply"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_notifier() -> (ListChangedNotifier, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let notifier: ListChangedNotifier = Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        (notifier, count)
    }

    #[tokio::test]
    async fn add_canonicalizes_to_file_uri() {
        let (notifier, count) = counting_notifier();
        let (manager, _task) = RootsManager::spawn(notifier);
        let root = manager.add("/Users/x/proj", Some("proj".to_string())).await.unwrap();
        assert_eq!(root.uri, "file:///Users/x/proj");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_add_returns_exact_diagnostic_and_no_extra_notification() {
        let (notifier, count) = counting_notifier();
        let (manager, _task) = RootsManager::spawn(notifier);
        manager.add("/Users/x/proj", Some("proj".to_string())).await.unwrap();
        let err = manager.add("/Users/x/proj", Some("proj".to_string())).await.unwrap_err();
        assert_eq!(err.message, "root with URI file:///Users/x/proj already exists");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_file_scheme_is_rejected() {
        let (notifier, _count) = counting_notifier();
        let (manager, _task) = RootsManager::spawn(notifier);
        let err = manager.add("https://example.com/proj", None).await.unwrap_err();
        assert!(err.message.contains("not supported"));
    }

    #[tokio::test]
    async fn remove_accepts_original_path_and_clears_get() {
        let (notifier, _count) = counting_notifier();
        let (manager, _task) = RootsManager::spawn(notifier);
        manager.add("/Users/x/proj", None).await.unwrap();
        manager.remove("/Users/x/proj").await.unwrap();
        assert!(manager.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_never_triggers_a_notification() {
        let (notifier, count) = counting_notifier();
        let (manager, _task) = RootsManager::spawn(notifier);
        manager.add("/Users/x/proj", None).await.unwrap();
        manager.get().await.unwrap();
        manager.get().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_notifier_does_not_kill_the_actor() {
        let notifier: ListChangedNotifier = Arc::new(|| panic!("boom"));
        let (manager, _task) = RootsManager::spawn(notifier);
        manager.add("/tmp/a", None).await.unwrap();
        // The actor is still alive to answer a second call.
        assert_eq!(manager.get().await.unwrap().len(), 1);
    }
}
