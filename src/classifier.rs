//! Turns a validated payload into a typed event and decides ban-worthiness.

use serde_json::Value;

use crate::domain::{Bounce, Complaint, Delivery, NotificationKind, Recipient};

/// Outcome of classification: who was affected, why, when, and whether the
/// recipients should be banned from further outbound mail.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    pub kind: NotificationKind,
    pub recipients: Vec<Recipient>,
    pub reason: String,
    pub timestamp: String,
    pub ban_worthy: bool,
}

/// Builds a `ClassifiedEvent` from a validator-approved payload.
///
/// Ban policy:
/// - bounces ban only when permanent or undetermined; transient bounces pass
/// - complaints always ban, whatever the feedback type
/// - deliveries never ban
pub fn classify(payload: &Value, kind: NotificationKind) -> Result<ClassifiedEvent, serde_json::Error> {
    let detail = payload
        .get(kind.payload_key())
        .cloned()
        .unwrap_or(Value::Null);

    match kind {
        NotificationKind::Bounce => {
            let bounce: Bounce = serde_json::from_value(detail)?;
            let ban_worthy = is_hard_bounce(&bounce) || is_undetermined_bounce(&bounce);
            let diagnostic = bounce
                .bounced_recipients
                .first()
                .and_then(|r| r.diagnostic_code.clone())
                .unwrap_or_default();
            let reason = format!(
                "Bounce {} {} from {}",
                diagnostic, bounce.bounce_sub_type, bounce.reporting_mta
            );
            Ok(ClassifiedEvent {
                kind,
                recipients: bounce.bounced_recipients,
                reason,
                timestamp: bounce.timestamp,
                ban_worthy,
            })
        }
        NotificationKind::Complaint => {
            let complaint: Complaint = serde_json::from_value(detail)?;
            let reason = format!(
                "Complaint {} {}",
                complaint.user_agent, complaint.complaint_feedback_type
            );
            Ok(ClassifiedEvent {
                kind,
                recipients: complaint.complained_recipients,
                reason,
                timestamp: complaint.timestamp,
                // complaints are ALWAYS bad enough
                ban_worthy: true,
            })
        }
        NotificationKind::Delivery => {
            let delivery: Delivery = serde_json::from_value(detail)?;
            Ok(ClassifiedEvent {
                kind,
                recipients: Vec::new(),
                reason: String::new(),
                timestamp: delivery.timestamp,
                ban_worthy: false,
            })
        }
    }
}

fn is_hard_bounce(bounce: &Bounce) -> bool {
    bounce.bounce_type.eq_ignore_ascii_case("permanent")
}

fn is_undetermined_bounce(bounce: &Bounce) -> bool {
    bounce.bounce_type.eq_ignore_ascii_case("undetermined")
}
