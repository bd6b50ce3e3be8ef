//! Permission to open private conversations.
//!
//! Private messages go out only to nicks an administrative bot has cleared.
//! The bot answers `ALLOW <nick>` or `DENY <nick>` over IRC; the reader task
//! records those verdicts here and wakes any gate waiting on them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

/// Total verdict checks before giving up.
pub const GATE_ATTEMPTS: u32 = 6;
pub const GATE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct AccessLists {
    allowed: HashSet<String>,
    refused: HashSet<String>,
}

/// Append-only allow/refuse sets owned by one IRC session.
#[derive(Debug, Clone, Default)]
pub struct AccessCache {
    lists: Arc<Mutex<AccessLists>>,
    changed: Arc<Notify>,
}

impl AccessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, nick: &str) {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allowed
            .insert(nick.to_lowercase());
        self.changed.notify_waiters();
    }

    pub fn deny(&self, nick: &str) {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .refused
            .insert(nick.to_lowercase());
        self.changed.notify_waiters();
    }

    /// `Some(true)` if allowed, `Some(false)` if refused, `None` if unknown.
    pub fn verdict(&self, nick: &str) -> Option<bool> {
        let key = nick.to_lowercase();
        let lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        if lists.allowed.contains(&key) {
            Some(true)
        } else if lists.refused.contains(&key) {
            Some(false)
        } else {
            None
        }
    }

    /// Record an `ALLOW <nick>` / `DENY <nick>` line from the admin bot.
    /// Returns false if the text is not a verdict.
    pub fn apply_admin_line(&self, text: &str) -> bool {
        let mut words = text.split_whitespace();
        let (Some(verb), Some(nick), None) = (words.next(), words.next(), words.next()) else {
            return false;
        };
        match verb {
            "ALLOW" => self.allow(nick),
            "DENY" => self.deny(nick),
            _ => return false,
        }
        debug!(verb, nick, "access verdict recorded");
        true
    }
}

/// Asks the admin bot about a nick and waits for the verdict.
#[derive(Debug, Clone)]
pub struct AccessGate {
    cache: AccessCache,
    admin_nick: String,
    attempts: u32,
    interval: Duration,
}

impl AccessGate {
    pub fn new(cache: AccessCache, admin_nick: impl Into<String>) -> Self {
        Self {
            cache,
            admin_nick: admin_nick.into(),
            attempts: GATE_ATTEMPTS,
            interval: GATE_INTERVAL,
        }
    }

    /// Resolve whether `target` may be messaged. The request to the admin
    /// bot is sent once; the cache is re-checked after each interval (or
    /// sooner when a verdict lands). Unresolved after all attempts: false.
    pub async fn check_access(&self, target: &str, outbound: &mpsc::Sender<String>) -> bool {
        for attempt in 0..self.attempts {
            let changed = self.cache.changed.notified();
            if let Some(verdict) = self.cache.verdict(target) {
                return verdict;
            }
            if attempt == 0 {
                let request = format!("PRIVMSG {} :CHECK {target}", self.admin_nick);
                if outbound.send(request).await.is_err() {
                    return false;
                }
            }
            let _ = tokio::time::timeout(self.interval, changed).await;
        }
        self.cache.verdict(target).unwrap_or(false)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_lines_update_verdicts() {
        let cache = AccessCache::new();
        assert!(cache.apply_admin_line("ALLOW Alice"));
        assert!(cache.apply_admin_line("DENY mallory"));
        assert!(!cache.apply_admin_line("hello there"));
        assert!(!cache.apply_admin_line("ALLOW"));
        assert!(!cache.apply_admin_line("ALLOW a b"));

        assert_eq!(cache.verdict("alice"), Some(true));
        assert_eq!(cache.verdict("MALLORY"), Some(false));
        assert_eq!(cache.verdict("bob"), None);
    }

    #[tokio::test]
    async fn cached_verdict_skips_request() {
        let cache = AccessCache::new();
        cache.allow("alice");
        let gate = AccessGate::new(cache, "CellarBot");
        let (tx, mut rx) = mpsc::channel(4);

        assert!(gate.check_access("alice", &tx).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out_false() {
        let gate = AccessGate::new(AccessCache::new(), "CellarBot");
        let (tx, mut rx) = mpsc::channel(4);

        let started = tokio::time::Instant::now();
        assert!(!gate.check_access("ghost", &tx).await);
        assert_eq!(started.elapsed(), GATE_INTERVAL * GATE_ATTEMPTS);

        assert_eq!(rx.recv().await.unwrap(), "PRIVMSG CellarBot :CHECK ghost");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn late_verdict_wakes_the_gate() {
        let cache = AccessCache::new();
        let gate = AccessGate::new(cache.clone(), "CellarBot");
        let (tx, mut rx) = mpsc::channel(4);

        let check = tokio::spawn(async move { gate.check_access("bob", &tx).await });
        assert_eq!(rx.recv().await.unwrap(), "PRIVMSG CellarBot :CHECK bob");

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cache.apply_admin_line("DENY bob");
        assert!(!check.await.unwrap());
    }
}
