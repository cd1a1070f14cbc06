//! 用户认证和授权系统

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use skindex_core::validation::{normalize_email, validate_email, validate_name, validate_password};
use skindex_core::{Principal, Result, Role, SkindexError, User};
use skindex_database::{NewLogEntry, NewUser};
use tracing::{debug, info, warn};

use crate::audit;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

/// 默认令牌有效期：7天
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 604_800;

/// 认证参数
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl_secs: u64,
    pub bcrypt_cost: u32,
    /// 是否允许公开注册管理员账号
    pub allow_admin_registration: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "some_unique_secret".to_string(),
            issuer: "http://localhost:8080".to_string(),
            audience: "http://localhost:8080".to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            allow_admin_registration: false,
        }
    }
}

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub name: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// 认证服务
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    settings: AuthSettings,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.settings.issuer)
            .field("audience", &self.settings.audience)
            .field("token_ttl_secs", &self.settings.token_ttl_secs)
            .finish()
    }
}

impl AuthService {
    pub fn new(settings: AuthSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            validation,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// 计算密码哈希，bcrypt在阻塞线程池中执行
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.settings.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| SkindexError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| SkindexError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// 校验密码；哈希为空或格式错误时视为不匹配
    pub async fn verify_password(&self, password: &str, hash: &str) -> bool {
        if hash.is_empty() {
            return false;
        }
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }

    /// 签发JWT
    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            user_id: user.id,
            name: user.name.clone(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: now,
            exp: now + self.settings.token_ttl_secs as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SkindexError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// 验证JWT并返回其中的声明
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                SkindexError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

/// 认证中间件：校验Bearer令牌，并把当前用户写入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Missing token"))?;

    let claims = state.auth.verify_token(token)?;

    // 以数据库中的当前记录为准，已删除的账号令牌失效
    let user = state
        .repo
        .get_user_by_id(claims.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    request.extensions_mut().insert(Principal {
        id: user.id,
        email: user.email,
        role: user.role,
        name: user.name,
    });
    Ok(next.run(request).await)
}

fn default_role() -> String {
    "doctor".to_string()
}

/// 注册请求
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
}

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 注册处理器
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_email(&request.email)?;
    validate_password(&request.password)?;
    let role: Role = request.role.parse()?;
    validate_name(&request.name)?;

    if role == Role::Admin && !state.auth.settings().allow_admin_registration {
        return Err(SkindexError::forbidden("Admin accounts cannot be self-registered").into());
    }

    let email = normalize_email(&request.email);
    info!("Registering user with email: {}", email);

    if state.repo.get_user_by_email(&email).await?.is_some() {
        return Err(SkindexError::Conflict("Email already registered".to_string()).into());
    }

    let password_hash = state.auth.hash_password(&request.password).await?;
    let user_id = state
        .repo
        .create_user(&NewUser {
            role,
            name: request.name.trim().to_string(),
            email: email.clone(),
            password_hash,
            doctor_id: None,
        })
        .await?;

    audit::record(
        &state,
        NewLogEntry::new(user_id, "Registered", format!("User {} registered as {}", email, role)),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("User created with ID: {}", user_id) })),
    ))
}

/// 登录处理器
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&request.email);
    info!("Login attempt for user: {}", email);

    let user = state.repo.get_user_by_email(&email).await?;
    let user = match user {
        Some(user) if state.auth.verify_password(&request.password, &user.password_hash).await => user,
        _ => {
            warn!("Login failed for {}", email);
            state.metrics.record_login(false);
            return Err(ApiError::unauthorized("Wrong email or password"));
        }
    };

    let token = state.auth.issue_token(&user)?;
    state.metrics.record_login(true);
    info!("User logged in successfully: {}", user.email);

    Ok(Json(json!({
        "token": token,
        "message": format!("Successful entry for {}", user.email),
    })))
}
