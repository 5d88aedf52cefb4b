use actix_cors::Cors;
use actix_web::http::header;

pub fn create_cors() -> Cors {
    Cors::default()
        // 店面与后台前端部署在不同域名下
        .allowed_origin_fn(|_, _req_head| true)
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("stripe-signature"),
        ])
        .expose_headers(vec![header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}
