//! Required-field schema validation for decoded SES notification payloads.
//! Pure: looks at the JSON value only, never touches a store.

use serde_json::Value;
use thiserror::Error;

use crate::domain::NotificationKind;

const REQUIRED_TOP_LEVEL_FIELDS: &[&str] = &["notificationType", "mail"];

const REQUIRED_MAIL_FIELDS: &[&str] = &[
    "timestamp",
    "messageId",
    "source",
    "sourceArn",
    "sendingAccountId",
    "destination",
];

const REQUIRED_BOUNCE_FIELDS: &[&str] = &[
    "bounceType",
    "bounceSubType",
    "bouncedRecipients",
    "timestamp",
    "feedbackId",
];

const REQUIRED_COMPLAINT_FIELDS: &[&str] = &["complainedRecipients", "timestamp", "feedbackId"];

const REQUIRED_DELIVERY_FIELDS: &[&str] = &[
    "timestamp",
    "processingTimeMillis",
    "recipients",
    "smtpResponse",
    "reportingMTA",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("`{object}` is missing required field `{field}`")]
    MissingObjectField {
        object: &'static str,
        field: &'static str,
    },
    #[error("unknown notification type `{0}`")]
    UnknownType(String),
}

/// Checks a decoded payload against the per-type required-field schema,
/// reporting the first missing field encountered.
pub fn validate(payload: &Value) -> Result<NotificationKind, ValidationError> {
    let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;
    if object.is_empty() {
        return Err(ValidationError::NotAnObject);
    }

    for &field in REQUIRED_TOP_LEVEL_FIELDS {
        if !object.contains_key(field) {
            return Err(ValidationError::MissingField(field));
        }
    }

    let tag = object
        .get("notificationType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let kind = NotificationKind::from_tag(tag)
        .ok_or_else(|| ValidationError::UnknownType(tag.to_string()))?;

    if !object.contains_key(kind.payload_key()) {
        return Err(ValidationError::MissingField(kind.payload_key()));
    }

    validate_object(payload, "mail", REQUIRED_MAIL_FIELDS)?;

    let required = match kind {
        NotificationKind::Bounce => REQUIRED_BOUNCE_FIELDS,
        NotificationKind::Complaint => REQUIRED_COMPLAINT_FIELDS,
        NotificationKind::Delivery => REQUIRED_DELIVERY_FIELDS,
    };
    validate_object(payload, kind.payload_key(), required)?;

    Ok(kind)
}

fn validate_object(
    payload: &Value,
    key: &'static str,
    required: &[&'static str],
) -> Result<(), ValidationError> {
    let object = payload
        .get(key)
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingField(key))?;

    for &field in required {
        if !object.contains_key(field) {
            return Err(ValidationError::MissingObjectField { object: key, field });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bounce_payload() -> Value {
        json!({
            "notificationType": "Bounce",
            "mail": {
                "timestamp": "2023-05-01T12:00:00.000Z",
                "messageId": "0000014a-f4d4-4f89-b8c4-consumertest",
                "source": "sender@example.com",
                "sourceArn": "arn:aws:ses:us-east-1:123456789012:identity/example.com",
                "sendingAccountId": "123456789012",
                "destination": ["a@example.com"]
            },
            "bounce": {
                "bounceType": "Permanent",
                "bounceSubType": "General",
                "bouncedRecipients": [{"emailAddress": "a@example.com"}],
                "timestamp": "2023-05-01T12:00:01.000Z",
                "feedbackId": "feedback-id"
            }
        })
    }

    #[test]
    fn accepts_complete_bounce() {
        assert_eq!(validate(&bounce_payload()), Ok(NotificationKind::Bounce));
    }

    #[test]
    fn accepts_complete_complaint() {
        let mut payload = bounce_payload();
        payload["notificationType"] = json!("Complaint");
        payload.as_object_mut().unwrap().remove("bounce");
        payload["complaint"] = json!({
            "complainedRecipients": [{"emailAddress": "b@example.com"}],
            "timestamp": "2023-05-01T12:00:01.000Z",
            "feedbackId": "feedback-id"
        });
        assert_eq!(validate(&payload), Ok(NotificationKind::Complaint));
    }

    #[test]
    fn accepts_complete_delivery() {
        let mut payload = bounce_payload();
        payload["notificationType"] = json!("Delivery");
        payload.as_object_mut().unwrap().remove("bounce");
        payload["delivery"] = json!({
            "timestamp": "2023-05-01T12:00:01.000Z",
            "processingTimeMillis": 831,
            "recipients": ["c@example.com"],
            "smtpResponse": "250 2.6.0 queued",
            "reportingMTA": "a8-70.smtp-out.amazonses.com"
        });
        assert_eq!(validate(&payload), Ok(NotificationKind::Delivery));
    }

    #[test]
    fn rejects_missing_mail() {
        let mut payload = bounce_payload();
        payload.as_object_mut().unwrap().remove("mail");
        assert_eq!(validate(&payload), Err(ValidationError::MissingField("mail")));
    }

    #[test]
    fn rejects_missing_nested_field() {
        let mut payload = bounce_payload();
        payload["bounce"].as_object_mut().unwrap().remove("feedbackId");
        assert_eq!(
            validate(&payload),
            Err(ValidationError::MissingObjectField {
                object: "bounce",
                field: "feedbackId"
            })
        );
    }

    #[test]
    fn rejects_unknown_notification_type() {
        let mut payload = bounce_payload();
        payload["notificationType"] = json!("Received");
        assert_eq!(
            validate(&payload),
            Err(ValidationError::UnknownType("Received".to_string()))
        );
    }

    #[test]
    fn rejects_missing_type_specific_object() {
        let mut payload = bounce_payload();
        payload.as_object_mut().unwrap().remove("bounce");
        assert_eq!(validate(&payload), Err(ValidationError::MissingField("bounce")));
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert_eq!(validate(&json!("bounce")), Err(ValidationError::NotAnObject));
        assert_eq!(validate(&json!({})), Err(ValidationError::NotAnObject));
    }

    #[test]
    fn rejects_mail_of_wrong_shape() {
        let mut payload = bounce_payload();
        payload["mail"] = json!("not an object");
        assert_eq!(validate(&payload), Err(ValidationError::MissingField("mail")));
    }
}
