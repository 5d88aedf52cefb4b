use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UploadSignatureQuery {
    /// 覆盖默认上传目录
    pub folder: Option<String>,
}

/// 前端直传 Cloudinary 所需参数
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadSignatureResponse {
    pub cloud_name: String,
    pub api_key: String,
    pub timestamp: i64,
    pub folder: Option<String>,
    pub signature: String,
    pub upload_url: String,
}
