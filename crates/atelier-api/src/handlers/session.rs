//! Anonymous session creation.

use axum::Json;
use serde::Serialize;

use super::now_ms;

/// A freshly minted anonymous session. Nothing is persisted server side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: i64,
    pub last_active_at: i64,
}

impl Session {
    pub fn new() -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            last_active_at: now,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn create_session() -> Json<Session> {
    Json(Session::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_are_unique_and_fresh() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.last_active_at);
        let v = serde_json::to_value(&a).unwrap();
        assert!(v.get("lastActiveAt").is_some());
    }
}
