use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::Serialize;

/// Outer transport envelope: the SQS message body is JSON whose `Message`
/// field carries the SES notification payload as a second JSON-encoded string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Message")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Bounce,
    Complaint,
    Delivery,
}

impl NotificationKind {
    /// Matches the `notificationType` tag case-insensitively. Unknown tags
    /// have no kind; the validator rejects them before classification.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "bounce" => Some(NotificationKind::Bounce),
            "complaint" => Some(NotificationKind::Complaint),
            "delivery" => Some(NotificationKind::Delivery),
            _ => None,
        }
    }

    /// The lowercase payload key holding the type-specific object.
    pub fn payload_key(self) -> &'static str {
        match self {
            NotificationKind::Bounce => "bounce",
            NotificationKind::Complaint => "complaint",
            NotificationKind::Delivery => "delivery",
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounce {
    pub feedback_id: String,
    pub bounce_type: String,
    pub bounce_sub_type: String,
    pub bounced_recipients: Vec<Recipient>,
    pub timestamp: String,
    #[serde(rename = "reportingMTA", default)]
    pub reporting_mta: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub feedback_id: String,
    pub complained_recipients: Vec<Recipient>,
    pub timestamp: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub complaint_feedback_type: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub timestamp: String,
    pub processing_time_millis: i64,
    pub recipients: Vec<String>,
    pub smtp_response: String,
    #[serde(rename = "reportingMTA")]
    pub reporting_mta: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: String,
    pub action: Option<String>,
    pub status: Option<String>,
    pub diagnostic_code: Option<String>,
}

/// One banned address. `email` is lowercase-normalized and unique in the
/// store; repeated bans overwrite timestamp and reason, last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl BanRecord {
    pub fn new(email: &str, timestamp: DateTime<Utc>, reason: &str) -> Self {
        BanRecord {
            email: email.to_lowercase(),
            timestamp,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kind_tag_is_case_insensitive() {
        assert_eq!(NotificationKind::from_tag("Bounce"), Some(NotificationKind::Bounce));
        assert_eq!(NotificationKind::from_tag("COMPLAINT"), Some(NotificationKind::Complaint));
        assert_eq!(NotificationKind::from_tag("delivery"), Some(NotificationKind::Delivery));
        assert_eq!(NotificationKind::from_tag("Received"), None);
    }

    #[test]
    fn ban_record_normalizes_email() {
        let ts = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        let ban = BanRecord::new("User@Example.COM", ts, "Complaint");
        assert_eq!(ban.email, "user@example.com");
    }

    #[test]
    fn envelope_tolerates_missing_message() {
        let env: Envelope = serde_json::from_str(r#"{"Type":"Notification"}"#).unwrap();
        assert_eq!(env.message, None);
    }
}
