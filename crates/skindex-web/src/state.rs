//! 应用共享状态

use skindex_core::{Image, Result, SkindexError};
use skindex_database::Repository;
use skindex_storage::ImageStore;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::metrics::ApiMetrics;

/// 默认上传大小上限：10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub store: ImageStore,
    pub auth: Arc<AuthService>,
    pub metrics: Arc<ApiMetrics>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, store: ImageStore, auth: AuthService) -> Result<Self> {
        Ok(Self {
            repo,
            store,
            auth: Arc::new(auth),
            metrics: Arc::new(ApiMetrics::new()?),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        })
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub(crate) async fn image_or_404(&self, id: i32) -> Result<Image> {
        self.repo
            .get_image(id)
            .await?
            .ok_or_else(|| SkindexError::not_found("Image not found"))
    }

    /// 影像所属患者的主治医生
    pub(crate) async fn patient_doctor(&self, image: &Image) -> Result<Option<i32>> {
        match image.patient_id {
            Some(patient_id) => Ok(self
                .repo
                .get_user_by_id(patient_id)
                .await?
                .and_then(|patient| patient.doctor_id)),
            None => Ok(None),
        }
    }
}
