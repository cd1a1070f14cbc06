//! 用户与患者管理

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use skindex_core::access;
use skindex_core::validation::{normalize_email, validate_email, validate_name, validate_password};
use skindex_core::{Principal, Role, SkindexError, User};
use skindex_database::{NewLogEntry, NewUser};
use tracing::info;

use crate::audit;
use crate::error::ApiResult;
use crate::extract::{ApiJson, IdPath};
use crate::state::AppState;

/// 用户信息（不包含密码哈希）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub doctor_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            name: user.name,
            doctor_id: user.doctor_id,
            created_at: user.created_at,
        }
    }
}

/// 患者列表项
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub doctor_id: Option<i32>,
}

impl From<User> for PatientView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            doctor_id: user.doctor_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: String,
    pub password: Option<String>,
    pub doctor_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPatientRequest {
    pub email: String,
    pub name: String,
    pub password: Option<String>,
    /// 仅管理员可指定；医生添加时固定为本人
    pub doctor_id: Option<i32>,
}

/// 校验 `doctorId` 指向一名医生
async fn ensure_doctor(state: &AppState, doctor_id: i32) -> Result<(), SkindexError> {
    let doctor = state
        .repo
        .get_user_by_id(doctor_id)
        .await?
        .ok_or_else(|| SkindexError::not_found("Doctor not found"))?;
    if doctor.role != Role::Doctor {
        return Err(SkindexError::validation("doctorId must reference a doctor"));
    }
    Ok(())
}

/// 密码可选的账号（由医生代建的患者）使用空哈希，无法直接登录
async fn optional_password_hash(state: &AppState, password: Option<&str>) -> Result<String, SkindexError> {
    match password {
        Some(password) => {
            validate_password(password)?;
            state.auth.hash_password(password).await
        }
        None => Ok(String::new()),
    }
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    access::require_admin(&principal)?;

    let users: Vec<UserView> = state.repo.list_users().await?.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "data": users })))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    access::require_admin(&principal)?;

    validate_email(&request.email)?;
    let role: Role = request.role.parse()?;
    validate_name(&request.name)?;

    if role != Role::Patient && request.password.is_none() {
        return Err(SkindexError::validation("Password must be at least 6 characters").into());
    }
    if let Some(doctor_id) = request.doctor_id {
        if role != Role::Patient {
            return Err(SkindexError::validation("Only patients can be assigned a doctor").into());
        }
        ensure_doctor(&state, doctor_id).await?;
    }

    let email = normalize_email(&request.email);
    let password_hash = optional_password_hash(&state, request.password.as_deref()).await?;
    let user_id = state
        .repo
        .create_user(&NewUser {
            role,
            name: request.name.trim().to_string(),
            email: email.clone(),
            password_hash,
            doctor_id: request.doctor_id,
        })
        .await?;

    info!("Admin {} created user {} ({})", principal.id, user_id, role);
    audit::record(
        &state,
        NewLogEntry::new(principal.id, "Created user", format!("User ID: {}, role: {}", user_id, role)),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("User created with ID: {}", user_id) })),
    ))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .repo
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| SkindexError::not_found("User not found"))?;
    access::can_view_user(&principal, &user)?;

    Ok(Json(json!({ "data": UserView::from(user) })))
}

/// PUT /users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    access::can_update_user(&principal, id)?;

    let name = request
        .name
        .ok_or_else(|| SkindexError::validation("Name required"))?;
    validate_name(&name)?;

    if !state.repo.update_user_name(id, name.trim()).await? {
        return Err(SkindexError::not_found("User not found").into());
    }

    audit::record(&state, NewLogEntry::new(principal.id, "Updated user", format!("User ID: {}", id))).await;
    Ok(Json(json!({ "message": "User updated" })))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let target = state
        .repo
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| SkindexError::not_found("User not found"))?;
    access::can_delete_user(&principal, &target)?;

    let file_paths = state
        .repo
        .delete_user(id)
        .await?
        .ok_or_else(|| SkindexError::not_found("User not found"))?;
    state.store.delete_all(&file_paths).await;

    info!("User {} deleted by {} ({} images removed)", id, principal.id, file_paths.len());

    // 删除自己时日志不再关联用户
    let actor = (principal.id != id).then_some(principal.id);
    audit::record(
        &state,
        NewLogEntry {
            user_id: actor,
            action: "Deleted user".to_string(),
            details: Some(format!("User ID: {}", id)),
        },
    )
    .await;

    Ok(Json(json!({ "message": "User deleted" })))
}

/// GET /patients
pub async fn list_patients(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    let doctor_id = access::patient_list_scope(&principal)?;

    let patients: Vec<PatientView> = state
        .repo
        .list_patients(doctor_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(json!({ "data": patients })))
}

/// POST /add-patient
pub async fn add_patient(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(request): ApiJson<AddPatientRequest>,
) -> ApiResult<impl IntoResponse> {
    access::can_add_patient(&principal)?;

    validate_email(&request.email)?;
    validate_name(&request.name)?;

    let doctor_id = if principal.is_doctor() {
        Some(principal.id)
    } else {
        if let Some(doctor_id) = request.doctor_id {
            ensure_doctor(&state, doctor_id).await?;
        }
        request.doctor_id
    };

    let email = normalize_email(&request.email);
    let password_hash = optional_password_hash(&state, request.password.as_deref()).await?;
    let patient_id = state
        .repo
        .create_user(&NewUser {
            role: Role::Patient,
            name: request.name.trim().to_string(),
            email,
            password_hash,
            doctor_id,
        })
        .await?;

    info!("Patient {} added by {}", patient_id, principal.id);
    audit::record(
        &state,
        NewLogEntry::new(principal.id, "Added patient", format!("Patient ID: {}", patient_id)),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Patient created with ID: {}", patient_id) })),
    ))
}
