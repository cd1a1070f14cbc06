//! 启动时创建初始管理员

use skindex_admin::config::SeedAdminConfig;
use skindex_core::validation::normalize_email;
use skindex_core::{Result, Role};
use skindex_database::{NewUser, Repository};
use skindex_web::AuthService;
use tracing::info;

/// 账号已存在时不做任何修改；返回是否新建
pub async fn ensure_admin(repo: &dyn Repository, auth: &AuthService, seed: &SeedAdminConfig) -> Result<bool> {
    let email = normalize_email(&seed.email);
    if repo.get_user_by_email(&email).await?.is_some() {
        info!("Seed admin {} already exists", email);
        return Ok(false);
    }

    let password_hash = auth.hash_password(&seed.password).await?;
    let id = repo
        .create_user(&NewUser {
            role: Role::Admin,
            name: seed.name.clone(),
            email: email.clone(),
            password_hash,
            doctor_id: None,
        })
        .await?;

    info!("Created seed admin {} with ID {}", email, id);
    Ok(true)
}
