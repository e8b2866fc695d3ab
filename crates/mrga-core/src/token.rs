//! Session tokens: cancellation by comparison.
//!
//! Every piece of asynchronous work carries the token of the resource it was
//! started for.  When the work reports back, the owner compares that token with
//! the one it currently holds and drops the result on mismatch.  Nothing is
//! interrupted at the source.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Shared across all sources so a token is never valid for two resources.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

const NO_TOKEN: u64 = 0;

/// Opaque identifier of one resource instance (playback session, chat turn,
/// list generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues tokens and remembers which one is current.
///
/// Cloning shares the "current" cell, so a spawned task can hold a clone and
/// stop early once its token has been superseded.
#[derive(Debug, Clone, Default)]
pub struct TokenSource {
    current: Arc<AtomicU64>,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh token and make it current, invalidating the previous one.
    pub fn issue(&self) -> Token {
        let id = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        self.current.store(id, Ordering::Release);
        Token(id)
    }

    /// Invalidate the current token without issuing a new one.
    pub fn revoke(&self) {
        self.current.store(NO_TOKEN, Ordering::Release);
    }

    pub fn is_current(&self, token: Token) -> bool {
        self.current.load(Ordering::Acquire) == token.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_supersedes_previous() {
        let source = TokenSource::new();
        let first = source.issue();
        assert!(source.is_current(first));
        let second = source.issue();
        assert_ne!(first, second);
        assert!(!source.is_current(first));
        assert!(source.is_current(second));
    }

    #[test]
    fn test_revoke_leaves_nothing_current() {
        let source = TokenSource::new();
        let token = source.issue();
        source.revoke();
        assert!(!source.is_current(token));
    }

    #[test]
    fn test_clones_share_current() {
        let source = TokenSource::new();
        let watcher = source.clone();
        let token = source.issue();
        assert!(watcher.is_current(token));
        source.issue();
        assert!(!watcher.is_current(token));
    }

    #[test]
    fn test_tokens_unique_across_sources() {
        let a = TokenSource::new();
        let b = TokenSource::new();
        let ta = a.issue();
        let tb = b.issue();
        assert_ne!(ta, tb);
        assert!(!b.is_current(ta));
    }
}
