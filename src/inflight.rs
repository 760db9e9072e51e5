//! Duplicate-submission guard. One outstanding request per action key;
//! the key is released when the returned guard is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

#[derive(Clone, Default)]
pub struct InFlight {
  keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
  /// `None` when `key` is already in flight.
  pub fn try_acquire(&self, key: impl Into<String>) -> Option<InFlightGuard> {
    let key = key.into();
    let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
    if !keys.insert(key.clone()) {
      debug!(target: "tutor_backend", %key, "Rejecting duplicate submission");
      return None;
    }
    Some(InFlightGuard { keys: Arc::clone(&self.keys), key })
  }
}

#[must_use = "the key is released as soon as the guard is dropped"]
pub struct InFlightGuard {
  keys: Arc<Mutex<HashSet<String>>>,
  key: String,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    self.keys.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.key);
  }
}

pub fn lesson_key(client: &str) -> String {
  format!("lesson:{}", client)
}

pub fn tutor_key(client: &str) -> String {
  format!("tutor:{}", client)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_submission_is_rejected_until_release() {
    let inflight = InFlight::default();
    let first = inflight.try_acquire(lesson_key("alice"));
    assert!(first.is_some());
    assert!(inflight.try_acquire(lesson_key("alice")).is_none());

    drop(first);
    assert!(inflight.try_acquire(lesson_key("alice")).is_some());
  }

  #[test]
  fn keys_are_independent() {
    let inflight = InFlight::default();
    let _a = inflight.try_acquire(lesson_key("alice")).unwrap();
    let _b = inflight.try_acquire(tutor_key("alice")).unwrap();
    let _c = inflight.try_acquire(lesson_key("bob")).unwrap();
  }

  #[tokio::test]
  async fn guard_held_across_await_blocks_concurrent_task() {
    let inflight = InFlight::default();
    let guard = inflight.try_acquire("lesson:x").unwrap();

    let other = inflight.clone();
    let rejected = tokio::spawn(async move { other.try_acquire("lesson:x").is_none() }).await.unwrap();
    assert!(rejected);

    drop(guard);
    assert!(inflight.try_acquire("lesson:x").is_some());
  }
}
