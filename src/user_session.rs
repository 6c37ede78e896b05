use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::mailing::MailingContent;
use crate::scenario::FunctionCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    // purchase flow
    AwaitingEmail,
    // deep link wizard (admins)
    DeeplinkSelectingSource,
    DeeplinkSelectingTarget {
        source: String,
    },
    DeeplinkAwaitingLink {
        source: String,
        target: String,
    },
    // broadcast flow (admins)
    BroadcastAwaitingContent,
    BroadcastConfirm {
        content: MailingContent,
    },
}

/// values carried between updates that are not part of the conversation state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub deeplink: Option<i32>,
    pub callbacks: HashMap<String, Vec<FunctionCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: i64,
    pub state: SessionState,
    pub data: SessionData,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl UserSession {
    fn new(user_id: i64) -> Self {
        Self {
            user_id,
            state: SessionState::Idle,
            data: SessionData::default(),
            last_updated: chrono::Utc::now(),
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<i64, UserSession>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_state(&self, user_id: i64) -> SessionState {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user_id)
            .map(|session| session.state.clone())
            .unwrap_or(SessionState::Idle)
    }

    pub async fn set_state(&self, user_id: i64, state: SessionState) {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| UserSession::new(user_id));
        session.state = state;
        session.last_updated = chrono::Utc::now();
    }

    pub async fn get_data(&self, user_id: i64) -> SessionData {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user_id)
            .map(|session| session.data.clone())
            .unwrap_or_default()
    }

    pub async fn set_deeplink(&self, user_id: i64, deeplink: Option<i32>) {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| UserSession::new(user_id));
        session.data.deeplink = deeplink;
        session.last_updated = chrono::Utc::now();
    }

    /// merges scenario callbacks into the session; existing ids are overwritten
    pub async fn store_callbacks(&self, user_id: i64, callbacks: HashMap<String, Vec<FunctionCall>>) {
        if callbacks.is_empty() {
            return;
        }
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| UserSession::new(user_id));
        session.data.callbacks.extend(callbacks);
        session.last_updated = chrono::Utc::now();
    }

    pub async fn callback(&self, user_id: i64, callback_id: &str) -> Option<Vec<FunctionCall>> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user_id)
            .and_then(|session| session.data.callbacks.get(callback_id).cloned())
    }

    pub async fn clear_session(&self, user_id: i64) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&user_id);
    }

    // cleanup old sessions (older than 1 day)
    pub async fn cleanup_old_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        let cutoff = chrono::Utc::now() - chrono::Duration::days(1);
        sessions.retain(|_, session| session.last_updated > cutoff);
        before - sessions.len()
    }
}

