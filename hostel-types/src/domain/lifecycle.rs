//! Status lifecycles and the guards that enforce them.
//!
//! Every workflow entity (payments, bookings, refunds, schedules, complaints,
//! inquiries) moves through a small state machine. Once a record reaches a
//! terminal state it is frozen, except for an explicit whitelist of fields.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::DomainError;

/// A status enum with a transition table.
pub trait Lifecycle: Copy + Eq + std::fmt::Display {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    fn is_terminal(&self) -> bool;

    /// Whether `self -> next` is a legal forward move. Staying put is not a transition.
    fn can_transition_to(&self, next: Self) -> bool;

    /// Fields that stay editable after the record reaches a terminal status.
    fn terminal_editable_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Rejects an illegal status change.
pub fn ensure_transition<S: Lifecycle>(from: S, to: S) -> Result<(), DomainError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(DomainError::InvalidTransition {
            entity: S::ENTITY,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Validates a partial update against the current status.
///
/// `changed_fields` lists the non-status fields the update touches.
pub fn validate_update<S: Lifecycle>(
    current: S,
    next_status: Option<S>,
    changed_fields: &[&str],
) -> Result<(), DomainError> {
    if current.is_terminal() {
        if let Some(next) = next_status {
            if next != current {
                return ensure_transition(current, next);
            }
        }
        let allowed = S::terminal_editable_fields();
        if changed_fields.iter().any(|f| !allowed.contains(f)) {
            return Err(DomainError::TerminalState {
                entity: S::ENTITY,
                status: current.to_string(),
                allowed: allowed.to_vec(),
            });
        }
        return Ok(());
    }

    match next_status {
        Some(next) if next != current => ensure_transition(current, next),
        _ => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Complaints
// ─────────────────────────────────────────────────────────────────────────────

string_enum! {
    /// Complaint workflow status.
    ComplaintStatus {
        Open => "open",
        InProgress => "in_progress",
        OnHold => "on_hold",
        Resolved => "resolved",
        Reopened => "reopened",
        Closed => "closed",
    }
}

impl Lifecycle for ComplaintStatus {
    const ENTITY: &'static str = "complaint";

    fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Closed)
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use ComplaintStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | OnHold | Resolved | Closed)
                | (InProgress, OnHold | Resolved | Closed)
                | (OnHold, InProgress | Closed)
                | (Resolved, Reopened | Closed)
                | (Reopened, InProgress | Resolved | Closed)
        )
    }

    fn terminal_editable_fields() -> &'static [&'static str] {
        &["internal_notes", "feedback_rating", "feedback_comment"]
    }
}

/// Partial update of a complaint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ComplaintUpdate {
    pub status: Option<ComplaintStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<uuid::Uuid>,
    pub internal_notes: Option<String>,
    pub feedback_rating: Option<u8>,
    pub feedback_comment: Option<String>,
}

impl ComplaintUpdate {
    /// Names of the non-status fields this update sets.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.assigned_to.is_some() {
            fields.push("assigned_to");
        }
        if self.internal_notes.is_some() {
            fields.push("internal_notes");
        }
        if self.feedback_rating.is_some() {
            fields.push("feedback_rating");
        }
        if self.feedback_comment.is_some() {
            fields.push("feedback_comment");
        }
        fields
    }

    pub fn validate(&self, current: ComplaintStatus) -> Result<(), DomainError> {
        if let Some(rating) = self.feedback_rating {
            if !(1..=5).contains(&rating) {
                return Err(DomainError::validation("feedback_rating must be 1-5"));
            }
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(DomainError::validation("Complaint title cannot be empty"));
            }
        }
        validate_update(current, self.status, &self.changed_fields())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inquiries
// ─────────────────────────────────────────────────────────────────────────────

string_enum! {
    /// Visitor inquiry pipeline status.
    InquiryStatus {
        New => "new",
        Contacted => "contacted",
        Interested => "interested",
        NotInterested => "not_interested",
        Converted => "converted",
    }
}

impl Lifecycle for InquiryStatus {
    const ENTITY: &'static str = "inquiry";

    fn is_terminal(&self) -> bool {
        matches!(self, InquiryStatus::Converted)
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use InquiryStatus::*;
        matches!(
            (self, next),
            (New, Contacted | NotInterested | Converted)
                | (Contacted, Interested | NotInterested | Converted)
                | (Interested, NotInterested | Converted)
                | (NotInterested, Contacted)
        )
    }

    fn terminal_editable_fields() -> &'static [&'static str] {
        &["notes"]
    }
}

/// Partial update of a visitor inquiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InquiryUpdate {
    pub status: Option<InquiryStatus>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub preferred_room_type: Option<String>,
    pub notes: Option<String>,
}

impl InquiryUpdate {
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("contact_name", self.contact_name.is_some()),
            ("contact_phone", self.contact_phone.is_some()),
            ("preferred_room_type", self.preferred_room_type.is_some()),
            ("notes", self.notes.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    pub fn validate(&self, current: InquiryStatus) -> Result<(), DomainError> {
        validate_update(current, self.status, &self.changed_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_complaint_rejects_reopen() {
        let update = ComplaintUpdate {
            status: Some(ComplaintStatus::InProgress),
            ..Default::default()
        };
        assert!(matches!(
            update.validate(ComplaintStatus::Closed),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_closed_complaint_allows_feedback() {
        let update = ComplaintUpdate {
            feedback_rating: Some(4),
            feedback_comment: Some("Fixed quickly".into()),
            internal_notes: Some("verified".into()),
            ..Default::default()
        };
        assert!(update.validate(ComplaintStatus::Closed).is_ok());
    }

    #[test]
    fn test_closed_complaint_rejects_other_fields() {
        let update = ComplaintUpdate {
            title: Some("New title".into()),
            ..Default::default()
        };
        match update.validate(ComplaintStatus::Closed) {
            Err(DomainError::TerminalState { allowed, .. }) => {
                assert!(allowed.contains(&"feedback_rating"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_feedback_rating_range() {
        let update = ComplaintUpdate {
            feedback_rating: Some(6),
            ..Default::default()
        };
        assert!(update.validate(ComplaintStatus::Resolved).is_err());
    }

    #[test]
    fn test_open_complaint_moves_forward() {
        let update = ComplaintUpdate {
            status: Some(ComplaintStatus::Resolved),
            title: Some("Leaking tap".into()),
            ..Default::default()
        };
        assert!(update.validate(ComplaintStatus::Open).is_ok());
        assert!(ComplaintStatus::Resolved.can_transition_to(ComplaintStatus::Reopened));
    }

    #[test]
    fn test_converted_inquiry_is_frozen_except_notes() {
        let notes_only = InquiryUpdate {
            notes: Some("moved in on the 3rd".into()),
            ..Default::default()
        };
        assert!(notes_only.validate(InquiryStatus::Converted).is_ok());

        let status_change = InquiryUpdate {
            status: Some(InquiryStatus::Contacted),
            ..Default::default()
        };
        assert!(status_change.validate(InquiryStatus::Converted).is_err());

        let phone = InquiryUpdate {
            contact_phone: Some("+91 90000 00000".into()),
            ..Default::default()
        };
        assert!(matches!(
            phone.validate(InquiryStatus::Converted),
            Err(DomainError::TerminalState { .. })
        ));
    }

    #[test]
    fn test_same_status_is_not_a_transition() {
        let update = InquiryUpdate {
            status: Some(InquiryStatus::Converted),
            notes: Some("x".into()),
            ..Default::default()
        };
        assert!(update.validate(InquiryStatus::Converted).is_ok());
    }

    #[test]
    fn test_status_strings_roundtrip() {
        for status in ComplaintStatus::ALL {
            let parsed: ComplaintStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
        assert!("archived".parse::<InquiryStatus>().is_err());
    }
}
