//! # SkinDex客户端
//!
//! 访问 SkinDex REST 服务、保存会话令牌，并在本地分类后完成影像分诊流程。

pub mod api;
pub mod error;
pub mod models;
pub mod session;
pub mod token;
pub mod triage;

pub use api::ApiClient;
pub use error::{ClientError, Result};
pub use session::TokenStore;
pub use token::TokenInfo;
pub use triage::{ApprovedUpload, Capture, DiagnosisDetail, ImageWithDiagnosis, PatientOverview, TriageWorkflow};
