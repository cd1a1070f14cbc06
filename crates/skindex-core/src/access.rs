//! 访问控制规则
//!
//! 所有基于角色与归属关系的授权判断集中在这里，处理器只负责加载数据并调用。

use crate::error::{Result, SkindexError};
use crate::models::{Image, Principal, Role, User};

const ACCESS_DENIED: &str = "Access denied";
const ADMIN_ONLY: &str = "Only admins can access";

/// 列表查询时的影像可见范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScope {
    /// 全部影像（管理员）
    All,
    /// 医生本人上传的，或属于其患者的影像
    Doctor(i32),
    /// 患者本人的影像
    Patient(i32),
}

impl ImageScope {
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Admin => ImageScope::All,
            Role::Doctor => ImageScope::Doctor(principal.id),
            Role::Patient => ImageScope::Patient(principal.id),
        }
    }

    /// 判断影像是否在范围内；`patient_doctor_id` 为影像所属患者的主治医生
    pub fn contains(&self, image: &Image, patient_doctor_id: Option<i32>) -> bool {
        match *self {
            ImageScope::All => true,
            ImageScope::Doctor(id) => {
                image.user_id == Some(id) || (image.patient_id.is_some() && patient_doctor_id == Some(id))
            }
            ImageScope::Patient(id) => image.patient_id == Some(id),
        }
    }
}

pub fn require_admin(principal: &Principal) -> Result<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(SkindexError::forbidden(ADMIN_ONLY))
    }
}

/// 查看用户：管理员、本人或该患者的主治医生
pub fn can_view_user(principal: &Principal, target: &User) -> Result<()> {
    if principal.is_admin() || principal.id == target.id {
        return Ok(());
    }
    if principal.is_doctor() && target.role == Role::Patient && target.doctor_id == Some(principal.id) {
        return Ok(());
    }
    Err(SkindexError::forbidden(ACCESS_DENIED))
}

/// 修改用户资料：管理员或本人
pub fn can_update_user(principal: &Principal, target_id: i32) -> Result<()> {
    if principal.is_admin() || principal.id == target_id {
        Ok(())
    } else {
        Err(SkindexError::forbidden(ACCESS_DENIED))
    }
}

/// 删除用户：管理员，或医生删除自己名下的患者
pub fn can_delete_user(principal: &Principal, target: &User) -> Result<()> {
    if principal.is_admin() {
        return Ok(());
    }
    if principal.is_doctor() && target.role == Role::Patient && target.doctor_id == Some(principal.id) {
        return Ok(());
    }
    Err(SkindexError::forbidden("Only admins or the patient's doctor can delete"))
}

/// 患者列表：管理员看全部，医生只看自己的患者
pub fn patient_list_scope(principal: &Principal) -> Result<Option<i32>> {
    match principal.role {
        Role::Admin => Ok(None),
        Role::Doctor => Ok(Some(principal.id)),
        Role::Patient => Err(SkindexError::forbidden("Only doctors and admins can list patients")),
    }
}

pub fn can_add_patient(principal: &Principal) -> Result<()> {
    match principal.role {
        Role::Admin | Role::Doctor => Ok(()),
        Role::Patient => Err(SkindexError::forbidden("Only doctors and admins can add patients")),
    }
}

/// 为患者上传影像：患者只能给自己上传，医生只能给自己的患者上传
pub fn can_upload_for(principal: &Principal, patient: &User) -> Result<()> {
    if patient.role != Role::Patient {
        return Err(SkindexError::validation("patientId must reference a patient"));
    }
    match principal.role {
        Role::Admin => Ok(()),
        Role::Doctor if patient.doctor_id == Some(principal.id) => Ok(()),
        Role::Patient if patient.id == principal.id => Ok(()),
        _ => Err(SkindexError::forbidden(ACCESS_DENIED)),
    }
}

/// 查看影像（及其诊断）
pub fn can_view_image(principal: &Principal, image: &Image, patient_doctor_id: Option<i32>) -> Result<()> {
    if ImageScope::for_principal(principal).contains(image, patient_doctor_id) {
        Ok(())
    } else {
        Err(SkindexError::forbidden(ACCESS_DENIED))
    }
}

/// 修改质量状态或删除影像：管理员或上传者
pub fn can_manage_image(principal: &Principal, image: &Image) -> Result<()> {
    if principal.is_admin() || image.user_id == Some(principal.id) {
        Ok(())
    } else {
        Err(SkindexError::forbidden(ACCESS_DENIED))
    }
}

/// 创建、修改、删除诊断：管理员，或上传该影像的医生
pub fn can_manage_diagnosis(principal: &Principal, image: &Image) -> Result<()> {
    if principal.is_admin() || (principal.is_doctor() && image.user_id == Some(principal.id)) {
        Ok(())
    } else {
        Err(SkindexError::forbidden(ACCESS_DENIED))
    }
}
