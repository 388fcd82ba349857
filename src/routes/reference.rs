use axum::{
    extract::{Query, State},
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ComplaintSubtype, ComplaintType, Division, Subtown, Town, User};
use crate::schema::{complaint_subtypes, complaint_types, divisions, subtowns, towns, users};
use crate::state::AppState;
use crate::workflow::{ROLE_EXECUTIVE_ENGINEER, ROLE_SM_AGENT};

#[derive(Serialize)]
pub struct TownResponse {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize)]
pub struct SubtownResponse {
    pub id: i32,
    pub town_id: i32,
    pub name: String,
}

#[derive(Serialize)]
pub struct ComplaintTypeResponse {
    pub id: i32,
    pub name: String,
    pub department_id: Option<i32>,
    pub default_division_id: Option<i32>,
}

#[derive(Serialize)]
pub struct ComplaintSubtypeResponse {
    pub id: i32,
    pub complaint_type_id: i32,
    pub name: String,
}

#[derive(Serialize)]
pub struct DivisionResponse {
    pub id: i32,
    pub name: String,
    pub department_id: Option<i32>,
}

#[derive(Serialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub full_name: String,
    pub role: String,
    pub department_id: Option<i32>,
    pub division_id: Option<i32>,
    pub town_id: Option<i32>,
}

impl From<User> for AgentResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            role: user.role,
            department_id: user.department_id,
            division_id: user.division_id,
            town_id: user.town_id,
        }
    }
}

pub async fn list_towns(State(state): State<AppState>) -> AppResult<Json<Vec<TownResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Town> = towns::table.order(towns::name.asc()).load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|town| TownResponse {
                id: town.id,
                name: town.name,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct SubtownQuery {
    pub town_id: Option<i32>,
}

pub async fn list_subtowns(
    State(state): State<AppState>,
    Query(query): Query<SubtownQuery>,
) -> AppResult<Json<Vec<SubtownResponse>>> {
    let mut conn = state.db()?;
    let mut subtowns_query = subtowns::table.order(subtowns::name.asc()).into_boxed();
    if let Some(town_id) = query.town_id {
        subtowns_query = subtowns_query.filter(subtowns::town_id.eq(town_id));
    }
    let rows: Vec<Subtown> = subtowns_query.load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|subtown| SubtownResponse {
                id: subtown.id,
                town_id: subtown.town_id,
                name: subtown.name,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct ComplaintTypeQuery {
    pub department_id: Option<i32>,
}

pub async fn list_complaint_types(
    State(state): State<AppState>,
    Query(query): Query<ComplaintTypeQuery>,
) -> AppResult<Json<Vec<ComplaintTypeResponse>>> {
    let mut conn = state.db()?;
    let mut types_query = complaint_types::table
        .order(complaint_types::name.asc())
        .into_boxed();
    if let Some(department_id) = query.department_id {
        types_query = types_query.filter(complaint_types::department_id.eq(department_id));
    }
    let rows: Vec<ComplaintType> = types_query.load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|ct| ComplaintTypeResponse {
                id: ct.id,
                name: ct.name,
                department_id: ct.department_id,
                default_division_id: ct.default_division_id,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct ComplaintSubtypeQuery {
    pub type_id: Option<i32>,
}

pub async fn list_complaint_subtypes(
    State(state): State<AppState>,
    Query(query): Query<ComplaintSubtypeQuery>,
) -> AppResult<Json<Vec<ComplaintSubtypeResponse>>> {
    let mut conn = state.db()?;
    let mut subtypes_query = complaint_subtypes::table
        .order(complaint_subtypes::name.asc())
        .into_boxed();
    if let Some(type_id) = query.type_id {
        subtypes_query =
            subtypes_query.filter(complaint_subtypes::complaint_type_id.eq(type_id));
    }
    let rows: Vec<ComplaintSubtype> = subtypes_query.load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|st| ComplaintSubtypeResponse {
                id: st.id,
                complaint_type_id: st.complaint_type_id,
                name: st.name,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct DivisionQuery {
    pub department_id: Option<i32>,
}

pub async fn list_divisions(
    State(state): State<AppState>,
    Query(query): Query<DivisionQuery>,
) -> AppResult<Json<Vec<DivisionResponse>>> {
    let mut conn = state.db()?;
    let mut divisions_query = divisions::table.order(divisions::name.asc()).into_boxed();
    if let Some(department_id) = query.department_id {
        divisions_query = divisions_query.filter(divisions::department_id.eq(department_id));
    }
    let rows: Vec<Division> = divisions_query.load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|division| DivisionResponse {
                id: division.id,
                name: division.name,
                department_id: division.department_id,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct AgentQuery {
    pub department_id: Option<i32>,
    pub town_id: Option<i32>,
    pub division_id: Option<i32>,
}

/// Executive engineers eligible for a work request, narrowed by department
/// plus either town or division depending on the department's mode.
pub async fn list_executive_engineers(
    State(state): State<AppState>,
    Query(query): Query<AgentQuery>,
) -> AppResult<Json<Vec<AgentResponse>>> {
    let mut conn = state.db()?;
    let mut agents_query = users::table
        .filter(users::role.eq(ROLE_EXECUTIVE_ENGINEER))
        .order(users::full_name.asc())
        .into_boxed();

    if let Some(department_id) = query.department_id {
        agents_query = agents_query.filter(users::department_id.eq(department_id));
    }
    if let Some(town_id) = query.town_id {
        agents_query = agents_query.filter(users::town_id.eq(town_id));
    }
    if let Some(division_id) = query.division_id {
        agents_query = agents_query.filter(users::division_id.eq(division_id));
    }

    let rows: Vec<User> = agents_query.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(AgentResponse::from).collect()))
}

pub async fn list_social_media_agents(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<AgentResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<User> = users::table
        .filter(users::role.eq(ROLE_SM_AGENT))
        .order(users::full_name.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(AgentResponse::from).collect()))
}
