use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AuditLogId, CompanyId, UserId};

/// Cross-entity append-only audit record.
///
/// `entity_id` is the string form of whatever id the action touched, so one
/// table covers every entity type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub company_id: CompanyId,
    pub actor_user_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        company_id: CompanyId,
        actor_user_id: Option<UserId>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl ToString,
        metadata: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditLogId::generate(),
            company_id,
            actor_user_id,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            metadata,
            at,
        }
    }
}
