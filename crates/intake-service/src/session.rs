//! Ephemeral per-user conversation sessions.
//!
//! One session per user, held only in process memory: a restart loses open
//! sessions and the user simply begins again. The map hands out a per-user
//! async mutex so one user's events are applied strictly in receipt order
//! while different users proceed fully in parallel. The outer lock is held
//! only long enough to clone the per-user handle, never across a ledger
//! call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use intake_core::{FlowState, UserId};

/// The state of one user's open conversation.
#[derive(Debug, Clone)]
pub enum Conversation {
    /// Waiting for a promo code string.
    AwaitingPromoCode,

    /// Somewhere inside the intake flow.
    Intake(FlowState),
}

/// A per-user session slot. `None` means idle.
pub type SessionSlot = Arc<tokio::sync::Mutex<Option<Conversation>>>;

/// The session map.
#[derive(Debug, Default)]
pub struct SessionMap {
    inner: Mutex<HashMap<UserId, SessionSlot>>,
}

impl SessionMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the slot for a user.
    ///
    /// The caller locks the returned slot for the duration of one event, so
    /// slots cloned while another event is in flight simply queue behind it.
    pub fn acquire(&self, user_id: UserId) -> SessionSlot {
        let mut map = self.inner.lock().expect("session map lock poisoned");
        Arc::clone(map.entry(user_id).or_default())
    }

    /// Drop the slot again if the conversation ended and nobody is waiting.
    ///
    /// Slot handles are only ever cloned under the map lock, so checking the
    /// reference count here cannot race with a concurrent `acquire`.
    pub fn release(&self, user_id: UserId, slot: &SessionSlot) {
        let mut map = self.inner.lock().expect("session map lock poisoned");
        // Two handles: the map's entry and the caller's.
        if Arc::strong_count(slot) > 2 {
            return;
        }
        if let Ok(guard) = slot.try_lock() {
            if guard.is_none() {
                map.remove(&user_id);
            }
        }
    }

    /// Number of users currently holding a slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("session map lock poisoned").len()
    }

    /// True when no user holds a slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_slots_are_pruned_on_release() {
        let map = SessionMap::new();
        let user = UserId::new(1);

        let slot = map.acquire(user);
        {
            let mut session = slot.lock().await;
            *session = Some(Conversation::AwaitingPromoCode);
        }
        map.release(user, &slot);
        assert_eq!(map.len(), 1, "active session must survive release");

        {
            let mut session = slot.lock().await;
            *session = None;
        }
        map.release(user, &slot);
        assert!(map.is_empty(), "idle session must be pruned");
    }

    #[tokio::test]
    async fn release_keeps_slots_with_waiters() {
        let map = SessionMap::new();
        let user = UserId::new(1);

        let slot = map.acquire(user);
        let waiter = map.acquire(user);
        map.release(user, &slot);
        assert_eq!(map.len(), 1, "slot with an outstanding handle must stay");
        drop(waiter);
    }

    #[tokio::test]
    async fn sessions_are_independent_per_user() {
        let map = SessionMap::new();
        let a = map.acquire(UserId::new(1));
        let b = map.acquire(UserId::new(2));

        let _guard_a = a.lock().await;
        // A held lock on user 1 must not block user 2.
        let guard_b = b.try_lock();
        assert!(guard_b.is_ok());
    }
}
