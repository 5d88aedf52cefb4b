use crate::external::cloudinary::CloudinarySigner;
use crate::middlewares::require_staff;
use crate::models::*;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;
use serde_json::json;

/// 商品图片前端直传，服务端只负责签名
#[utoipa::path(
    get,
    path = "/uploads/signature",
    tag = "uploads",
    params(
        ("folder" = Option<String>, Query, description = "上传目录，默认取配置")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "签名参数", body = UploadSignatureResponse),
        (status = 500, description = "Cloudinary 未配置")
    )
)]
pub async fn upload_signature(
    signer: web::Data<CloudinarySigner>,
    req: HttpRequest,
    query: web::Query<UploadSignatureQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match signer.sign_upload(query.into_inner().folder, Utc::now().timestamp()) {
        Ok(signature) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": signature
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn upload_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/uploads").route("/signature", web::get().to(upload_signature)));
}
