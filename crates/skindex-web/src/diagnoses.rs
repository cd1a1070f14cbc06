//! 诊断记录

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use skindex_core::access::{self, ImageScope};
use skindex_core::validation::round_probability;
use skindex_core::{Diagnosis, Image, Principal, QualityStatus, SkindexError};
use skindex_database::{DiagnosisFilter, DiagnosisUpdate, NewDiagnosis, NewLogEntry};
use tracing::info;

use crate::audit;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, IdPath};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisView {
    pub id: i32,
    pub image_id: i32,
    pub diagnosis: String,
    pub probability: f64,
    pub doctor_comment: Option<String>,
    pub date_added: DateTime<Utc>,
}

impl From<Diagnosis> for DiagnosisView {
    fn from(d: Diagnosis) -> Self {
        Self {
            id: d.id,
            image_id: d.image_id,
            diagnosis: d.diagnosis,
            probability: d.probability,
            doctor_comment: d.doctor_comment,
            date_added: d.date_added,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisQuery {
    pub image_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiagnosisRequest {
    pub image_id: i32,
    pub diagnosis: String,
    pub probability: f64,
    pub doctor_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDiagnosisRequest {
    pub diagnosis: Option<String>,
    pub probability: Option<f64>,
    pub doctor_comment: Option<String>,
}

fn required_label(label: Option<&str>) -> Result<String, SkindexError> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SkindexError::validation("Diagnosis required"))
}

fn require_accepted(image: &Image) -> Result<(), SkindexError> {
    if image.quality_status != QualityStatus::Accepted {
        return Err(SkindexError::validation("Image must be accepted before adding a diagnosis"));
    }
    Ok(())
}

/// 加载诊断及其影像
async fn diagnosis_with_image(state: &AppState, id: i32) -> Result<(Diagnosis, Image), SkindexError> {
    let diagnosis = state
        .repo
        .get_diagnosis(id)
        .await?
        .ok_or_else(|| SkindexError::not_found("Diagnosis not found"))?;
    let image = state.image_or_404(diagnosis.image_id).await?;
    Ok((diagnosis, image))
}

/// POST /diagnoses
pub async fn create_diagnosis(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(request): ApiJson<CreateDiagnosisRequest>,
) -> ApiResult<impl IntoResponse> {
    let label = required_label(Some(&request.diagnosis))?;
    let probability = round_probability(request.probability)?;

    let image = state.image_or_404(request.image_id).await?;
    access::can_manage_diagnosis(&principal, &image)?;

    require_accepted(&image)?;

    let diagnosis_id = state
        .repo
        .create_diagnosis(&NewDiagnosis {
            image_id: image.id,
            diagnosis: label,
            probability,
            doctor_comment: request.doctor_comment,
        })
        .await?;

    info!("Diagnosis {} added to image {} by {}", diagnosis_id, image.id, principal.id);
    audit::record(
        &state,
        NewLogEntry::new(
            principal.id,
            "Added diagnosis",
            format!("Diagnosis ID: {}, image ID: {}", diagnosis_id, image.id),
        ),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Diagnosis created with ID: {}", diagnosis_id) })),
    ))
}

/// GET /diagnoses
pub async fn list_diagnoses(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<DiagnosisQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = DiagnosisFilter {
        scope: ImageScope::for_principal(&principal),
        image_id: query.image_id,
    };

    let diagnoses: Vec<DiagnosisView> = state
        .repo
        .list_diagnoses(&filter)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(json!({ "data": diagnoses })))
}

/// GET /diagnoses/{id}
pub async fn get_diagnosis(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let (diagnosis, image) = diagnosis_with_image(&state, id).await?;
    let doctor_id = state.patient_doctor(&image).await?;
    access::can_view_image(&principal, &image, doctor_id)?;

    Ok(Json(json!({ "data": DiagnosisView::from(diagnosis) })))
}

/// PUT /diagnoses/{id}
pub async fn update_diagnosis(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
    ApiJson(request): ApiJson<UpdateDiagnosisRequest>,
) -> ApiResult<impl IntoResponse> {
    let (_, image) = diagnosis_with_image(&state, id).await?;
    access::can_manage_diagnosis(&principal, &image)?;
    require_accepted(&image)?;

    let update = DiagnosisUpdate {
        diagnosis: required_label(request.diagnosis.as_deref())?,
        probability: round_probability(request.probability.unwrap_or(1.0))?,
        doctor_comment: request.doctor_comment,
    };

    if !state.repo.update_diagnosis(id, &update).await? {
        return Err(SkindexError::not_found("Diagnosis not found").into());
    }

    audit::record(
        &state,
        NewLogEntry::new(principal.id, "Updated diagnosis", format!("Diagnosis ID: {}", id)),
    )
    .await;
    Ok(Json(json!({ "message": "Diagnosis updated" })))
}

/// DELETE /diagnoses/{id}
pub async fn delete_diagnosis(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let (_, image) = diagnosis_with_image(&state, id).await?;
    access::can_manage_diagnosis(&principal, &image)?;

    if !state.repo.delete_diagnosis(id).await? {
        return Err(SkindexError::not_found("Diagnosis not found").into());
    }

    audit::record(
        &state,
        NewLogEntry::new(principal.id, "Deleted diagnosis", format!("Diagnosis ID: {}", id)),
    )
    .await;
    Ok(Json(json!({ "message": "Diagnosis deleted" })))
}
