use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Attachment, Comment, DocumentPage, EfilingFile, FileMovement, Signature};

/// One entry of a file's audit trail. The timeline is never stored; it is
/// assembled at read time from the underlying stores.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimelineEvent {
    pub kind: EventKind,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Uuid>,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    PageAdded,
    PageUpdated,
    MarkedTo,
    Returned,
    Signed,
    Commented,
    AttachmentAdded,
}

pub fn assemble_timeline(
    file: &EfilingFile,
    pages: &[DocumentPage],
    signatures: &[Signature],
    comments: &[Comment],
    attachments: &[Attachment],
    movements: &[FileMovement],
) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(
        1 + pages.len() * 2 + signatures.len() + comments.len() + attachments.len()
            + movements.len(),
    );

    events.push(TimelineEvent {
        kind: EventKind::Created,
        summary: format!("File {} created", file.file_number),
        actor: Some(file.created_by),
        timestamp: file.created_at,
    });

    for page in pages {
        events.push(TimelineEvent {
            kind: EventKind::PageAdded,
            summary: format!("Page {} added", page.page_number),
            actor: None,
            timestamp: page.created_at,
        });
        if page.updated_at > page.created_at {
            events.push(TimelineEvent {
                kind: EventKind::PageUpdated,
                summary: format!("Page {} updated", page.page_number),
                actor: None,
                timestamp: page.updated_at,
            });
        }
    }

    for movement in movements {
        events.push(TimelineEvent {
            kind: if movement.returned {
                EventKind::Returned
            } else {
                EventKind::MarkedTo
            },
            summary: match (&movement.remarks, movement.returned) {
                (Some(remarks), true) => format!("Returned to creator: {remarks}"),
                (Some(remarks), false) => format!("Marked forward: {remarks}"),
                (None, true) => "Returned to creator".to_string(),
                (None, false) => "Marked forward".to_string(),
            },
            actor: Some(movement.from_user),
            timestamp: movement.created_at,
        });
    }

    for signature in signatures {
        events.push(TimelineEvent {
            kind: EventKind::Signed,
            summary: format!("Signed as {}", signature.user_role),
            actor: Some(signature.user_id),
            timestamp: signature.created_at,
        });
    }

    for comment in comments {
        events.push(TimelineEvent {
            kind: EventKind::Commented,
            summary: format!("{} commented", comment.user_name),
            actor: Some(comment.user_id),
            timestamp: comment.created_at,
        });
    }

    for attachment in attachments {
        events.push(TimelineEvent {
            kind: EventKind::AttachmentAdded,
            summary: format!("Attachment {} uploaded", attachment.file_name),
            actor: Some(attachment.uploaded_by),
            timestamp: attachment.uploaded_at,
        });
    }

    events.sort_by_key(|event| event.timestamp);
    events
}
