use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub department_id: Option<i32>,
    pub division_id: Option<i32>,
    pub town_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub department_id: Option<i32>,
    pub division_id: Option<i32>,
    pub town_id: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub division_id: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = divisions)]
pub struct Division {
    pub id: i32,
    pub name: String,
    pub department_id: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = towns)]
pub struct Town {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = subtowns)]
#[diesel(belongs_to(Town))]
pub struct Subtown {
    pub id: i32,
    pub town_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = complaint_types)]
pub struct ComplaintType {
    pub id: i32,
    pub name: String,
    pub department_id: Option<i32>,
    pub default_division_id: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = complaint_subtypes)]
#[diesel(belongs_to(ComplaintType))]
pub struct ComplaintSubtype {
    pub id: i32,
    pub complaint_type_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = file_categories)]
pub struct FileCategory {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = work_requests)]
pub struct WorkRequest {
    pub id: Uuid,
    pub request_number: String,
    pub description: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub department_id: i32,
    pub complaint_type_id: Option<i32>,
    pub complaint_subtype_id: Option<i32>,
    pub town_id: Option<i32>,
    pub subtown_id: Option<i32>,
    pub division_id: Option<i32>,
    pub subtown_ids: serde_json::Value,
    pub assigned_sm_agents: serde_json::Value,
    pub executive_engineer_id: Option<Uuid>,
    pub contractor_id: Option<Uuid>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = work_requests)]
pub struct NewWorkRequest {
    pub id: Uuid,
    pub request_number: String,
    pub description: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub department_id: i32,
    pub complaint_type_id: Option<i32>,
    pub complaint_subtype_id: Option<i32>,
    pub town_id: Option<i32>,
    pub subtown_id: Option<i32>,
    pub division_id: Option<i32>,
    pub subtown_ids: serde_json::Value,
    pub assigned_sm_agents: serde_json::Value,
    pub executive_engineer_id: Option<Uuid>,
    pub contractor_id: Option<Uuid>,
    pub status: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = files)]
pub struct EfilingFile {
    pub id: Uuid,
    pub file_number: String,
    pub subject: String,
    pub department_id: i32,
    pub category_id: Option<i32>,
    pub priority: String,
    pub status: String,
    pub workflow_state: String,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub work_request_id: Option<Uuid>,
    pub sla_deadline: Option<NaiveDateTime>,
    pub sla_status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewEfilingFile {
    pub id: Uuid,
    pub file_number: String,
    pub subject: String,
    pub department_id: i32,
    pub category_id: Option<i32>,
    pub priority: String,
    pub status: String,
    pub workflow_state: String,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub work_request_id: Option<Uuid>,
    pub sla_deadline: Option<NaiveDateTime>,
    pub sla_status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_pages)]
#[diesel(belongs_to(EfilingFile, foreign_key = file_id))]
pub struct DocumentPage {
    pub id: Uuid,
    pub file_id: Uuid,
    pub page_number: i32,
    pub title: String,
    pub content: serde_json::Value,
    pub page_type: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_pages)]
pub struct NewDocumentPage {
    pub id: Uuid,
    pub file_id: Uuid,
    pub page_number: i32,
    pub title: String,
    pub content: serde_json::Value,
    pub page_type: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = signatures)]
#[diesel(belongs_to(EfilingFile, foreign_key = file_id))]
pub struct Signature {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub user_role: String,
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = signatures)]
pub struct NewSignature {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub user_role: String,
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = signature_templates)]
#[diesel(belongs_to(User))]
pub struct SignatureTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = signature_templates)]
pub struct NewSignatureTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = staged_signatures)]
#[diesel(belongs_to(User))]
pub struct StagedSignature {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub consumed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = staged_signatures)]
pub struct NewStagedSignature {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payload: serde_json::Value,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = verification_challenges)]
#[diesel(belongs_to(User))]
pub struct VerificationChallenge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method: String,
    pub code_hash: String,
    pub expires_at: NaiveDateTime,
    pub consumed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = verification_challenges)]
pub struct NewVerificationChallenge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method: String,
    pub code_hash: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = comments)]
#[diesel(belongs_to(EfilingFile, foreign_key = file_id))]
pub struct Comment {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_role: String,
    pub body: String,
    pub edited: bool,
    pub edited_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_role: String,
    pub body: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = attachments)]
#[diesel(belongs_to(EfilingFile, foreign_key = file_id))]
pub struct Attachment {
    pub id: Uuid,
    pub file_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub uploaded_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attachments)]
pub struct NewAttachment {
    pub id: Uuid,
    pub file_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = file_movements)]
#[diesel(belongs_to(EfilingFile, foreign_key = file_id))]
pub struct FileMovement {
    pub id: Uuid,
    pub file_id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub remarks: Option<String>,
    pub returned: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = file_movements)]
pub struct NewFileMovement {
    pub id: Uuid,
    pub file_id: Uuid,
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub remarks: Option<String>,
    pub returned: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = doc_templates)]
pub struct DocTemplate {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub subject: String,
    pub main_content: String,
    pub usage_count: i32,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = doc_templates)]
pub struct NewDocTemplate {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub subject: String,
    pub main_content: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}
