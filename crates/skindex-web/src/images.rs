//! 影像上传与管理

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use skindex_core::access::{self, ImageScope};
use skindex_core::{Image, Principal, QualityStatus, Role, SkindexError};
use skindex_database::{DiagnosisFilter, ImageFilter, NewImage, NewLogEntry};
use tracing::{debug, info, warn};

use crate::audit;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery, IdPath};
use crate::state::AppState;

/// 影像信息
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: i32,
    pub file_path: String,
    pub quality_status: QualityStatus,
    pub quality_comment: Option<String>,
    pub user_id: Option<i32>,
    pub patient_id: Option<i32>,
    pub upload_date: DateTime<Utc>,
}

impl From<Image> for ImageView {
    fn from(image: Image) -> Self {
        Self {
            id: image.id,
            file_path: image.file_path,
            quality_status: image.quality_status,
            quality_comment: image.quality_comment,
            user_id: image.user_id,
            patient_id: image.patient_id,
            upload_date: image.upload_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageQuery {
    pub patient_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateImageRequest {
    pub quality_status: Option<String>,
    pub quality_comment: Option<String>,
}

/// 上传表单内容
#[derive(Debug, Default)]
struct UploadForm {
    file_name: Option<String>,
    data: Option<Bytes>,
    patient_id: Option<String>,
}

/// 请求体超过 `DefaultBodyLimit` 时的错误
fn exceeds_body_limit(e: &MultipartError) -> bool {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return true;
    }
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if err.to_string().contains("length limit exceeded") {
            return true;
        }
        source = err.source();
    }
    false
}

fn multipart_error(e: MultipartError) -> ApiError {
    if exceeds_body_limit(&e) {
        return ApiError::bad_request("Image exceeds upload limit");
    }
    ApiError::bad_request(format!("Invalid input: {}", e.body_text()))
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            // 第一个文件字段即为影像
            Some(file_name) if form.data.is_none() => {
                let data = field.bytes().await.map_err(multipart_error)?;
                debug!("Received upload field '{}' ({} bytes)", name, data.len());
                form.file_name = Some(file_name);
                form.data = Some(data);
            }
            Some(_) => {
                debug!("Ignoring extra file field '{}'", name);
            }
            None if name == "patientId" => {
                form.patient_id = Some(field.text().await.map_err(multipart_error)?);
            }
            None => {
                debug!("Ignoring form field '{}'", name);
            }
        }
    }

    Ok(form)
}

/// 根据上传者角色确定影像所属患者
async fn resolve_upload_patient(
    state: &AppState,
    principal: &Principal,
    raw_patient_id: Option<&str>,
) -> Result<i32, SkindexError> {
    let requested = match raw_patient_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| SkindexError::validation("Invalid patientId"))?,
        ),
        None => None,
    };

    let patient_id = match (principal.role, requested) {
        (Role::Patient, None) => return Ok(principal.id),
        (_, Some(id)) => id,
        (_, None) => return Err(SkindexError::validation("patientId is required")),
    };

    let patient = state
        .repo
        .get_user_by_id(patient_id)
        .await?
        .ok_or_else(|| SkindexError::not_found("Patient not found"))?;
    access::can_upload_for(principal, &patient)?;
    Ok(patient.id)
}

/// POST /upload-image
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_upload_form(multipart).await?;
    let data = form
        .data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::bad_request("No image provided"))?;

    let patient_id = resolve_upload_patient(&state, &principal, form.patient_id.as_deref()).await?;

    let size = data.len();
    let file_name = form.file_name.unwrap_or_default();
    let key = state.store.store_upload(&file_name, data).await?;

    let image_id = match state
        .repo
        .create_image(&NewImage {
            user_id: Some(principal.id),
            patient_id: Some(patient_id),
            file_path: key.clone(),
        })
        .await
    {
        Ok(id) => id,
        Err(e) => {
            // 记录写入失败时清理已保存的文件
            state.store.delete_all(&[key]).await;
            return Err(e.into());
        }
    };

    state.metrics.record_upload(size);
    info!("Image {} uploaded by {} for patient {}", image_id, principal.id, patient_id);
    audit::record(
        &state,
        NewLogEntry::new(principal.id, "Uploaded image", format!("Image ID: {}", image_id)),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Image uploaded with ID: {}", image_id) })),
    ))
}

/// GET /images
pub async fn list_images(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<ImageQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = ImageFilter {
        scope: ImageScope::for_principal(&principal),
        patient_id: query.patient_id,
    };

    let images: Vec<ImageView> = state
        .repo
        .list_images(&filter)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(json!({ "data": images })))
}

async fn viewable_image(state: &AppState, principal: &Principal, id: i32) -> Result<Image, SkindexError> {
    let image = state.image_or_404(id).await?;
    let doctor_id = state.patient_doctor(&image).await?;
    access::can_view_image(principal, &image, doctor_id)?;
    Ok(image)
}

/// GET /images/{id}
pub async fn get_image(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let image = viewable_image(&state, &principal, id).await?;
    Ok(Json(json!({ "data": ImageView::from(image) })))
}

/// GET /images/{id}/file
pub async fn get_image_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let image = viewable_image(&state, &principal, id).await?;
    let data = state.store.read(&image.file_path).await?;
    let mime = mime_guess::from_path(&image.file_path).first_or_octet_stream();

    Ok(([(header::CONTENT_TYPE, mime.to_string())], data))
}

/// PUT /images/{id}
pub async fn update_image(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
    ApiJson(request): ApiJson<UpdateImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let image = state.image_or_404(id).await?;
    access::can_manage_image(&principal, &image)?;

    let status: QualityStatus = request
        .quality_status
        .ok_or_else(|| SkindexError::validation("Quality status required"))?
        .parse()?;

    // 已有诊断的影像必须保持 accepted
    if status != QualityStatus::Accepted {
        let diagnoses = state
            .repo
            .list_diagnoses(&DiagnosisFilter {
                scope: ImageScope::All,
                image_id: Some(id),
            })
            .await?;
        if !diagnoses.is_empty() {
            return Err(SkindexError::validation(
                "Image has diagnoses; delete them before changing its status",
            )
            .into());
        }
    }

    if !state
        .repo
        .update_image_quality(id, status, request.quality_comment.as_deref())
        .await?
    {
        return Err(SkindexError::not_found("Image not found").into());
    }

    audit::record(
        &state,
        NewLogEntry::new(principal.id, "Updated image", format!("Image ID: {}, status: {}", id, status)),
    )
    .await;
    Ok(Json(json!({ "message": "Image updated" })))
}

/// DELETE /images/{id}
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let image = state.image_or_404(id).await?;
    access::can_manage_image(&principal, &image)?;

    if !state.repo.delete_image(id).await? {
        return Err(SkindexError::not_found("Image not found").into());
    }
    if let Err(e) = state.store.delete(&image.file_path).await {
        warn!("Image {} removed but its file could not be deleted: {}", id, e);
    }

    audit::record(&state, NewLogEntry::new(principal.id, "Deleted image", format!("Image ID: {}", id))).await;
    Ok(Json(json!({ "message": "Image deleted" })))
}
