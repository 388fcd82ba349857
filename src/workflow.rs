use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow state of an e-filing file. Stored as text in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Draft,
    InReview,
    External,
    ReturnedToCreator,
    Archived,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Draft => "DRAFT",
            WorkflowState::InReview => "IN_REVIEW",
            WorkflowState::External => "EXTERNAL",
            WorkflowState::ReturnedToCreator => "RETURNED_TO_CREATOR",
            WorkflowState::Archived => "ARCHIVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(WorkflowState::Draft),
            "IN_REVIEW" => Some(WorkflowState::InReview),
            "EXTERNAL" => Some(WorkflowState::External),
            "RETURNED_TO_CREATOR" => Some(WorkflowState::ReturnedToCreator),
            "ARCHIVED" => Some(WorkflowState::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ROLE_CLERK: &str = "clerk";
pub const ROLE_JUNIOR_ENGINEER: &str = "junior_engineer";
pub const ROLE_ASSISTANT_ENGINEER: &str = "assistant_engineer";
pub const ROLE_EXECUTIVE_ENGINEER: &str = "executive_engineer";
pub const ROLE_SE_ASSISTANT: &str = "se_assistant";
pub const ROLE_SUPERINTENDING_ENGINEER: &str = "superintending_engineer";
pub const ROLE_CE_ASSISTANT: &str = "ce_assistant";
pub const ROLE_CHIEF_ENGINEER: &str = "chief_engineer";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SM_AGENT: &str = "sm_agent";

/// Roles allowed to edit or delete another author's comment.
pub const COMMENT_MODERATOR_ROLES: &[&str] =
    &[ROLE_SUPERINTENDING_ENGINEER, ROLE_CHIEF_ENGINEER, ROLE_ADMIN];

/// Rank on the approval ladder. Unknown roles rank below everything, so a
/// record with a garbage role can never be treated as a higher authority.
pub fn role_rank(role: &str) -> i32 {
    match role {
        ROLE_CLERK => 10,
        ROLE_JUNIOR_ENGINEER => 20,
        ROLE_ASSISTANT_ENGINEER => 30,
        ROLE_EXECUTIVE_ENGINEER => 40,
        ROLE_SE_ASSISTANT => 45,
        ROLE_SUPERINTENDING_ENGINEER => 50,
        ROLE_CE_ASSISTANT => 55,
        ROLE_CHIEF_ENGINEER => 60,
        ROLE_ADMIN => 70,
        _ => 0,
    }
}

/// SE/CE tier and their assistants may always append pages.
pub fn is_senior_tier(role: &str) -> bool {
    matches!(
        role,
        ROLE_SE_ASSISTANT
            | ROLE_SUPERINTENDING_ENGINEER
            | ROLE_CE_ASSISTANT
            | ROLE_CHIEF_ENGINEER
            | ROLE_ADMIN
    )
}

/// Everything the resolver needs, pre-fetched by the caller. Keeping the
/// resolver itself free of database access lets the same rules run anywhere
/// and makes the rule set one function to audit.
#[derive(Debug, Clone)]
pub struct ResolveInput {
    pub file_created_by: Uuid,
    pub file_assigned_to: Option<Uuid>,
    pub state: WorkflowState,
    pub requester_id: Uuid,
    pub requester_role: String,
    pub requester_department: Option<i32>,
    pub holder_department: Option<i32>,
    /// Rank of the user who issued the most recent return movement, if any.
    pub returned_by_rank: Option<i32>,
    pub creator_rank: i32,
    /// Whether the requester already holds an active signature on this file.
    pub has_active_signature: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionSet {
    #[serde(rename = "canEdit")]
    pub can_edit: bool,
    #[serde(rename = "canAddPage")]
    pub can_add_page: bool,
    #[serde(rename = "canAddAttachment")]
    pub can_add_attachment: bool,
    #[serde(rename = "canSign")]
    pub can_sign: bool,
    #[serde(rename = "canComment")]
    pub can_comment: bool,
    #[serde(rename = "isCreator")]
    pub is_creator: bool,
    #[serde(rename = "isHigherAuthority")]
    pub is_higher_authority: bool,
    #[serde(rename = "wasMarkedBackByHigherAuthority")]
    pub was_marked_back_by_higher_authority: bool,
    // Field name kept as the client consumes it.
    pub is_within_team: bool,
    #[serde(rename = "fileAtHigherLevel")]
    pub file_at_higher_level: bool,
    pub workflow_state: WorkflowState,
}

impl PermissionSet {
    /// Most restrictive set. Returned whenever resolution cannot complete,
    /// so a failed lookup never grants anything.
    pub fn denied(state: WorkflowState) -> Self {
        Self {
            can_edit: false,
            can_add_page: false,
            can_add_attachment: false,
            can_sign: false,
            can_comment: false,
            is_creator: false,
            is_higher_authority: false,
            was_marked_back_by_higher_authority: false,
            is_within_team: false,
            file_at_higher_level: false,
            workflow_state: state,
        }
    }
}

pub fn resolve_permissions(input: &ResolveInput) -> PermissionSet {
    let is_creator = input.file_created_by == input.requester_id;
    let requester_rank = role_rank(&input.requester_role);
    let is_higher_authority = requester_rank > input.creator_rank;

    let is_within_team = match (input.requester_department, input.holder_department) {
        (Some(mine), Some(theirs)) => mine == theirs,
        _ => false,
    };

    let is_holder = input.file_assigned_to == Some(input.requester_id);
    let assigned_elsewhere = input.file_assigned_to.is_some() && !is_holder;

    // The creator keeps edit rights while the file is unassigned, with them,
    // or circulating inside their own team.
    let base_can_edit = is_holder || (is_creator && (!assigned_elsewhere || is_within_team));

    let was_marked_back = is_creator
        && input.state == WorkflowState::ReturnedToCreator
        && input
            .returned_by_rank
            .map(|rank| rank > input.creator_rank)
            .unwrap_or(false);

    let file_at_higher_level = is_creator
        && assigned_elsewhere
        && !is_within_team
        && input.state != WorkflowState::ReturnedToCreator
        && (input.state == WorkflowState::External || !base_can_edit);

    if file_at_higher_level {
        // Everything is locked while the file sits above the creator.
        return PermissionSet {
            is_creator,
            is_higher_authority,
            is_within_team,
            file_at_higher_level: true,
            workflow_state: input.state,
            ..PermissionSet::denied(input.state)
        };
    }

    // Marked-back files freeze the existing pages; appending stays open.
    let can_edit = base_can_edit && !was_marked_back;
    let can_add_page = is_senior_tier(&input.requester_role) || is_creator;
    let can_add_attachment = base_can_edit || was_marked_back;
    let can_sign = (is_holder || was_marked_back) && (!input.has_active_signature || was_marked_back);
    let can_comment = true;

    PermissionSet {
        can_edit,
        can_add_page,
        can_add_attachment,
        can_sign,
        can_comment,
        is_creator,
        is_higher_authority,
        was_marked_back_by_higher_authority: was_marked_back,
        is_within_team,
        file_at_higher_level: false,
        workflow_state: input.state,
    }
}
