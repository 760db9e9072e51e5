//! In-memory record store for learner profiles and lesson progress.
//! Same shape as a hosted table store: insert, select by filter, upsert by conflict key.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{ProgressRecord, Subject, UserProfile};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("user {0} already exists")]
  DuplicateUser(String),
  #[error("unknown user {0}")]
  UnknownUser(String),
  #[error("invalid record: {0}")]
  Invalid(&'static str),
}

/// Profile fields supplied by the client; id and timestamp are assigned here.
#[derive(Clone, Debug)]
pub struct NewUser {
  pub id: Option<String>,
  pub name: String,
  pub culture: String,
  pub subjects: Vec<Subject>,
  pub topics: Vec<String>,
  pub level: String,
}

type ProgressKey = (String, Subject, String);

#[derive(Clone, Default)]
pub struct RecordStore {
  users: Arc<RwLock<HashMap<String, UserProfile>>>,
  progress: Arc<RwLock<HashMap<ProgressKey, ProgressRecord>>>,
}

impl RecordStore {
  #[instrument(level = "info", skip(self, new), fields(name = %new.name))]
  pub async fn insert_user(&self, new: NewUser) -> Result<UserProfile, StoreError> {
    if new.name.trim().is_empty() {
      return Err(StoreError::Invalid("name must not be empty"));
    }
    if new.culture.trim().is_empty() {
      return Err(StoreError::Invalid("culture must not be empty"));
    }
    let id = new.id.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut users = self.users.write().await;
    if users.contains_key(&id) {
      return Err(StoreError::DuplicateUser(id));
    }
    let profile = UserProfile {
      id: id.clone(),
      name: new.name.trim().to_string(),
      culture: new.culture.trim().to_string(),
      subjects: new.subjects,
      topics: new.topics,
      level: new.level,
      created_at: Utc::now(),
    };
    users.insert(id.clone(), profile.clone());
    info!(target: "tutor_backend", user_id = %id, "User created");
    Ok(profile)
  }

  pub async fn get_user(&self, id: &str) -> Option<UserProfile> {
    self.users.read().await.get(id).cloned()
  }

  /// Record one completed lesson. Conflict key is (user_id, subject, topic).
  #[instrument(level = "info", skip(self))]
  pub async fn upsert_progress(&self, user_id: &str, subject: Subject, topic: &str) -> Result<ProgressRecord, StoreError> {
    if topic.trim().is_empty() {
      return Err(StoreError::Invalid("topic must not be empty"));
    }
    if !self.users.read().await.contains_key(user_id) {
      return Err(StoreError::UnknownUser(user_id.to_string()));
    }

    let key = (user_id.to_string(), subject, topic.trim().to_string());
    let mut progress = self.progress.write().await;
    let record = progress
      .entry(key)
      .and_modify(|r| {
        r.lessons_completed += 1;
        r.updated_at = Utc::now();
      })
      .or_insert_with(|| ProgressRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        subject,
        topic: topic.trim().to_string(),
        lessons_completed: 1,
        updated_at: Utc::now(),
      })
      .clone();
    Ok(record)
  }

  /// Progress rows for one user, most recently updated first.
  pub async fn select_progress(&self, user_id: &str) -> Vec<ProgressRecord> {
    let mut rows: Vec<ProgressRecord> = self
      .progress
      .read()
      .await
      .values()
      .filter(|r| r.user_id == user_id)
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.topic.cmp(&b.topic)));
    rows
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_user(id: Option<&str>) -> NewUser {
    NewUser {
      id: id.map(str::to_string),
      name: "Meera".into(),
      culture: "tamil".into(),
      subjects: vec![Subject::Math],
      topics: vec!["algebra_basics".into()],
      level: "middle school".into(),
    }
  }

  #[tokio::test]
  async fn insert_and_fetch_user() {
    let store = RecordStore::default();
    let u = store.insert_user(new_user(None)).await.unwrap();
    assert_eq!(store.get_user(&u.id).await.unwrap().name, "Meera");
    assert!(store.get_user("nobody").await.is_none());
  }

  #[tokio::test]
  async fn duplicate_id_is_rejected() {
    let store = RecordStore::default();
    store.insert_user(new_user(Some("u1"))).await.unwrap();
    let err = store.insert_user(new_user(Some("u1"))).await.unwrap_err();
    assert_eq!(err, StoreError::DuplicateUser("u1".into()));
  }

  #[tokio::test]
  async fn upsert_increments_on_conflict_key() {
    let store = RecordStore::default();
    store.insert_user(new_user(Some("u1"))).await.unwrap();
    store.upsert_progress("u1", Subject::Math, "geometry").await.unwrap();
    let r = store.upsert_progress("u1", Subject::Math, "geometry").await.unwrap();
    assert_eq!(r.lessons_completed, 2);
    store.upsert_progress("u1", Subject::Science, "geometry").await.unwrap();

    let rows = store.select_progress("u1").await;
    assert_eq!(rows.len(), 2);
    assert!(store.select_progress("u2").await.is_empty());
  }

  #[tokio::test]
  async fn progress_requires_known_user() {
    let store = RecordStore::default();
    let err = store.upsert_progress("ghost", Subject::History, "world_wars").await.unwrap_err();
    assert_eq!(err, StoreError::UnknownUser("ghost".into()));
  }
}
