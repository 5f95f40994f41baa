/**
 * Typing Indicator State
 *
 * Ephemeral per-channel set of users currently typing. Entries expire
 * automatically after a short idle timeout so a dropped connection never
 * leaves a stuck "is typing" indicator; an explicit stop just expires the
 * entry early.
 *
 * The tracker is a plain synchronous structure driven by an injected
 * `Instant` so expiry is deterministic under test; the channel manager's
 * sweeper task feeds it real time.
 */
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Tracks who is typing in one channel
#[derive(Debug)]
pub struct TypingTracker {
    typing: HashMap<Uuid, Instant>,
    idle: Duration,
}

impl TypingTracker {
    pub fn new(idle: Duration) -> Self {
        Self {
            typing: HashMap::new(),
            idle,
        }
    }

    /// Record typing activity; returns whether the user was not previously
    /// typing (i.e. whether a `user-typing` event should go out)
    pub fn start(&mut self, user_id: Uuid, now: Instant) -> bool {
        self.typing.insert(user_id, now).is_none()
    }

    /// Explicit stop; returns whether the user had been typing
    pub fn stop(&mut self, user_id: Uuid) -> bool {
        self.typing.remove(&user_id).is_some()
    }

    /// Remove entries idle past the timeout, returning the expired users
    pub fn expire(&mut self, now: Instant) -> Vec<Uuid> {
        let idle = self.idle;
        let expired: Vec<Uuid> = self
            .typing
            .iter()
            .filter(|(_, last)| now.duration_since(**last) >= idle)
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in &expired {
            self.typing.remove(user_id);
        }
        expired
    }

    pub fn is_typing(&self, user_id: Uuid) -> bool {
        self.typing.contains_key(&user_id)
    }

    pub fn typing_users(&self) -> Vec<Uuid> {
        self.typing.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.typing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TypingTracker {
        TypingTracker::new(Duration::from_millis(1_000))
    }

    #[test]
    fn test_start_reports_new_typist_once() {
        let mut tracker = tracker();
        let alice = Uuid::new_v4();
        let now = Instant::now();
        assert!(tracker.start(alice, now));
        // Continued keystrokes refresh without re-announcing.
        assert!(!tracker.start(alice, now + Duration::from_millis(200)));
        assert!(tracker.is_typing(alice));
    }

    #[test]
    fn test_explicit_stop() {
        let mut tracker = tracker();
        let alice = Uuid::new_v4();
        tracker.start(alice, Instant::now());
        assert!(tracker.stop(alice));
        assert!(!tracker.is_typing(alice));
        assert!(!tracker.stop(alice));
    }

    #[test]
    fn test_idle_entries_expire() {
        let mut tracker = tracker();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let start = Instant::now();
        tracker.start(alice, start);
        tracker.start(bob, start + Duration::from_millis(800));

        // Only alice has been idle past the timeout.
        let expired = tracker.expire(start + Duration::from_millis(1_100));
        assert_eq!(expired, vec![alice]);
        assert!(tracker.is_typing(bob));
    }

    #[test]
    fn test_refresh_defers_expiry() {
        let mut tracker = tracker();
        let alice = Uuid::new_v4();
        let start = Instant::now();
        tracker.start(alice, start);
        tracker.start(alice, start + Duration::from_millis(900));
        assert!(tracker.expire(start + Duration::from_millis(1_200)).is_empty());
        assert_eq!(
            tracker.expire(start + Duration::from_millis(2_000)),
            vec![alice]
        );
    }
}
