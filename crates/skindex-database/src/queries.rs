//! 数据库查询操作

use async_trait::async_trait;
use skindex_core::{Diagnosis, Image, LogEntry, QualityStatus, Result, User};

use crate::connection::DatabasePool;
use crate::models::*;
use crate::repository::Repository;

const USER_COLUMNS: &str = "id, role, name, email, password_hash, doctor_id, created_at";
const IMAGE_COLUMNS: &str =
    "i.id, i.user_id, i.patient_id, i.file_path, i.upload_date, i.quality_status, i.quality_comment";
const DIAGNOSIS_COLUMNS: &str =
    "d.id, d.image_id, d.diagnosis, d.probability, d.doctor_comment, d.date_added";

// $1 = 范围类型, $2 = 范围主体ID；images 别名 i，患者 users 别名 p
const SCOPE_PREDICATE: &str = r#"
    ($1 = 'all'
     OR ($1 = 'doctor' AND (i.user_id = $2 OR (i.patient_id IS NOT NULL AND p.doctor_id = $2)))
     OR ($1 = 'patient' AND i.patient_id = $2))
"#;

/// PostgreSQL 数据访问实现
#[derive(Clone)]
pub struct PgRepository {
    pool: DatabasePool,
}

impl PgRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建用户表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                role VARCHAR(20) NOT NULL,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                doctor_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建影像表，上传者或患者被删除时级联删除
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS images (
                id SERIAL PRIMARY KEY,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                patient_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                file_path VARCHAR(512) NOT NULL,
                upload_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                quality_status VARCHAR(20) NOT NULL DEFAULT 'pending',
                quality_comment TEXT
            )
        "#).execute(pool).await?;

        // 创建诊断表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS diagnoses (
                id SERIAL PRIMARY KEY,
                image_id INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
                diagnosis VARCHAR(255) NOT NULL,
                probability DOUBLE PRECISION NOT NULL,
                doctor_comment TEXT,
                date_added TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建日志表，保留历史记录
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS logs (
                id SERIAL PRIMARY KEY,
                user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                action VARCHAR(255) NOT NULL,
                details TEXT,
                timestamp TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
            "CREATE INDEX IF NOT EXISTS idx_users_doctor_id ON users(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_images_user_id ON images(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_images_patient_id ON images(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_diagnoses_image_id ON diagnoses(image_id)",
            "CREATE INDEX IF NOT EXISTS idx_logs_user_id ON logs(user_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

#[async_trait]
impl Repository for PgRepository {
    // ========== 用户相关操作 ==========

    async fn create_user(&self, user: &NewUser) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(r#"
            INSERT INTO users (role, name, email, password_hash, doctor_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#)
        .bind(user.role.as_str())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.doctor_id)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(id)
    }

    async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let result = sqlx::query_as::<_, DbUser>(&sql)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        result.map(User::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let result = sqlx::query_as::<_, DbUser>(&sql)
            .bind(email)
            .fetch_optional(self.pool.pool())
            .await?;

        result.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let results = sqlx::query_as::<_, DbUser>(&sql)
            .fetch_all(self.pool.pool())
            .await?;

        results.into_iter().map(User::try_from).collect()
    }

    async fn list_patients(&self, doctor_id: Option<i32>) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = 'patient' AND ($1::INTEGER IS NULL OR doctor_id = $1) ORDER BY id",
            USER_COLUMNS
        );
        let results = sqlx::query_as::<_, DbUser>(&sql)
            .bind(doctor_id)
            .fetch_all(self.pool.pool())
            .await?;

        results.into_iter().map(User::try_from).collect()
    }

    async fn update_user_name(&self, id: i32, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: i32) -> Result<Option<Vec<String>>> {
        let mut tx = self.pool.pool().begin().await?;

        let file_paths = sqlx::query_scalar::<_, String>(
            "SELECT file_path FROM images WHERE user_id = $1 OR patient_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        // 影像与诊断由外键级联删除，日志与患者的医生引用置空
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        tracing::debug!(user_id = id, images = file_paths.len(), "User deleted with cascade");
        Ok(Some(file_paths))
    }

    async fn count_users(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.pool())
            .await?;
        Ok(count)
    }

    // ========== 影像相关操作 ==========

    async fn create_image(&self, image: &NewImage) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(r#"
            INSERT INTO images (user_id, patient_id, file_path, quality_status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        "#)
        .bind(image.user_id)
        .bind(image.patient_id)
        .bind(&image.file_path)
        .bind(QualityStatus::Pending.as_str())
        .fetch_one(self.pool.pool())
        .await?;

        Ok(id)
    }

    async fn get_image(&self, id: i32) -> Result<Option<Image>> {
        let sql = format!("SELECT {} FROM images i WHERE i.id = $1", IMAGE_COLUMNS);
        let result = sqlx::query_as::<_, DbImage>(&sql)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(result.map(Image::from))
    }

    async fn list_images(&self, filter: &ImageFilter) -> Result<Vec<Image>> {
        let (kind, scope_id) = scope_params(filter.scope);
        let sql = format!(
            "SELECT {} FROM images i LEFT JOIN users p ON p.id = i.patient_id \
             WHERE {} AND ($3::INTEGER IS NULL OR i.patient_id = $3) ORDER BY i.id",
            IMAGE_COLUMNS, SCOPE_PREDICATE
        );
        let results = sqlx::query_as::<_, DbImage>(&sql)
            .bind(kind)
            .bind(scope_id)
            .bind(filter.patient_id)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(results.into_iter().map(Image::from).collect())
    }

    async fn update_image_quality(
        &self,
        id: i32,
        status: QualityStatus,
        comment: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE images SET quality_status = $1, quality_comment = COALESCE($2, quality_comment) WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(comment)
        .bind(id)
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_image(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========== 诊断相关操作 ==========

    async fn create_diagnosis(&self, diagnosis: &NewDiagnosis) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(r#"
            INSERT INTO diagnoses (image_id, diagnosis, probability, doctor_comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        "#)
        .bind(diagnosis.image_id)
        .bind(&diagnosis.diagnosis)
        .bind(diagnosis.probability)
        .bind(&diagnosis.doctor_comment)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(id)
    }

    async fn get_diagnosis(&self, id: i32) -> Result<Option<Diagnosis>> {
        let sql = format!("SELECT {} FROM diagnoses d WHERE d.id = $1", DIAGNOSIS_COLUMNS);
        let result = sqlx::query_as::<_, DbDiagnosis>(&sql)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(result.map(Diagnosis::from))
    }

    async fn list_diagnoses(&self, filter: &DiagnosisFilter) -> Result<Vec<Diagnosis>> {
        let (kind, scope_id) = scope_params(filter.scope);
        let sql = format!(
            "SELECT {} FROM diagnoses d \
             JOIN images i ON i.id = d.image_id \
             LEFT JOIN users p ON p.id = i.patient_id \
             WHERE {} AND ($3::INTEGER IS NULL OR d.image_id = $3) ORDER BY d.id",
            DIAGNOSIS_COLUMNS, SCOPE_PREDICATE
        );
        let results = sqlx::query_as::<_, DbDiagnosis>(&sql)
            .bind(kind)
            .bind(scope_id)
            .bind(filter.image_id)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(results.into_iter().map(Diagnosis::from).collect())
    }

    async fn update_diagnosis(&self, id: i32, update: &DiagnosisUpdate) -> Result<bool> {
        let result = sqlx::query(r#"
            UPDATE diagnoses
            SET diagnosis = $1, probability = $2, doctor_comment = COALESCE($3, doctor_comment)
            WHERE id = $4
        "#)
        .bind(&update.diagnosis)
        .bind(update.probability)
        .bind(&update.doctor_comment)
        .bind(id)
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_diagnosis(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM diagnoses WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========== 日志相关操作 ==========

    async fn append_log(&self, entry: &NewLogEntry) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO logs (user_id, action, details) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.details)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(id)
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>> {
        let results = sqlx::query_as::<_, DbLogEntry>(
            "SELECT id, user_id, action, details, timestamp FROM logs ORDER BY id",
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(LogEntry::from).collect())
    }

    async fn get_log(&self, id: i32) -> Result<Option<LogEntry>> {
        let result = sqlx::query_as::<_, DbLogEntry>(
            "SELECT id, user_id, action, details, timestamp FROM logs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(result.map(LogEntry::from))
    }
}
