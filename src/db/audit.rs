//! Append-only audit trail

use sqlx::PgPool;
use uuid::Uuid;

/// One row of the audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent<'a> {
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<String>,
    pub actor_id: Option<Uuid>,
    pub actor_ip: Option<&'a str>,
    pub details: Option<serde_json::Value>,
}

impl<'a> AuditEvent<'a> {
    pub fn new(action: &'a str, entity_type: &'a str) -> Self {
        Self {
            action,
            entity_type,
            entity_id: None,
            actor_id: None,
            actor_ip: None,
            details: None,
        }
    }

    pub fn entity(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Who acted and from which client address
    pub fn actor(mut self, id: Option<Uuid>, ip: Option<&'a str>) -> Self {
        self.actor_id = id;
        self.actor_ip = ip;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Record an audit event. Failures are logged, never surfaced: the action the
/// event describes has already happened.
pub async fn log_audit(pool: &PgPool, event: AuditEvent<'_>) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_log (action, entity_type, entity_id, actor_id, actor_ip, details)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(event.action)
    .bind(event.entity_type)
    .bind(&event.entity_id)
    .bind(event.actor_id)
    .bind(event.actor_ip)
    .bind(&event.details)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!("Failed to write audit event {}: {}", event.action, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_carries_actor_and_ip() {
        let user = Uuid::new_v4();
        let event = AuditEvent::new("complaint_submitted", "complaint")
            .entity(42)
            .actor(Some(user), Some("203.0.113.9"))
            .details(serde_json::json!({ "urgency": 4 }));

        assert_eq!(event.entity_id.as_deref(), Some("42"));
        assert_eq!(event.actor_id, Some(user));
        assert_eq!(event.actor_ip, Some("203.0.113.9"));
        assert_eq!(event.details, Some(serde_json::json!({ "urgency": 4 })));
    }

    #[test]
    fn test_bare_event_has_no_actor() {
        let event = AuditEvent::new("escalation_sweep", "complaint");
        assert!(event.entity_id.is_none());
        assert!(event.actor_id.is_none());
        assert!(event.actor_ip.is_none());
    }
}
