use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// 通过认证的当前用户，放在请求扩展中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    // 只有 GET 请求公开
    get_prefix_paths: Vec<&'static str>,
    // 只有 POST 请求公开（完全匹配）
    post_exact_paths: Vec<&'static str>,
    excluded_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec!["/swagger-ui", "/swagger-ui/", "/api-docs/openapi.json"],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/api/v1/auth/", "/webhook/"],
            get_prefix_paths: vec!["/api/v1/products", "/api/v1/diamonds"],
            post_exact_paths: vec!["/api/v1/appointments"],
            // 即使在公开前缀下也需要认证
            excluded_paths: vec!["/api/v1/auth/me"],
        }
    }

    fn is_public_path(&self, method: &Method, path: &str) -> bool {
        if self
            .excluded_paths
            .iter()
            .any(|&excluded| path.starts_with(excluded))
        {
            return false;
        }

        if self.exact_paths.contains(&path) {
            return true;
        }

        if *method == Method::GET
            && self
                .get_prefix_paths
                .iter()
                .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        if *method == Method::POST && self.post_exact_paths.contains(&path) {
            return true;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    if let Some(token) = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    // EventSource 无法设置请求头，SSE 路径允许 query 传 token
    if req.path().ends_with("/stream") {
        return req.query_string().split('&').find_map(|pair| {
            pair.strip_prefix("access_token=")
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string())
        });
    }

    None
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S> AuthMiddlewareService<S> {
    fn authenticate(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.jwt_service.verify_access_token(token)?;
        Ok(AuthUser {
            id: claims.user_id()?,
            role: claims.role,
        })
    }
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        let token = bearer_token(&req);

        if self.public_paths.is_public_path(req.method(), req.path()) {
            // 公开路径上带了有效 token 时同样附加用户（例如登录用户预约）
            if let Some(user) = token.as_deref().and_then(|t| self.authenticate(t).ok()) {
                req.extensions_mut().insert(user);
            }
            return Box::pin(self.service.call(req));
        }

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        match self.authenticate(&token) {
            Ok(user) => {
                req.extensions_mut().insert(user);
                Box::pin(self.service.call(req))
            }
            Err(_) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// 公开接口上的可选用户
pub fn optional_user(req: &HttpRequest) -> Option<AuthUser> {
    req.extensions().get::<AuthUser>().copied()
}

pub fn current_user(req: &HttpRequest) -> AppResult<AuthUser> {
    optional_user(req).ok_or_else(|| AppError::AuthError("Authentication required".to_string()))
}

/// 管理员或员工
pub fn require_staff(req: &HttpRequest) -> AppResult<AuthUser> {
    let user = current_user(req)?;
    if !user.is_staff() {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

pub fn require_admin(req: &HttpRequest) -> AppResult<AuthUser> {
    let user = current_user(req)?;
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};

    fn jwt() -> JwtService {
        JwtService::new("middleware-secret", 3600, 86400)
    }

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match optional_user(&req) {
            Some(u) => HttpResponse::Ok().body(format!("{}:{}", u.id, u.role)),
            None => HttpResponse::Ok().body("anonymous"),
        }
    }

    async fn staff_only(req: HttpRequest) -> actix_web::Result<HttpResponse> {
        require_staff(&req)?;
        Ok(HttpResponse::Ok().finish())
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .wrap(AuthMiddleware::new(jwt()))
                    .route("/api/v1/products", web::get().to(whoami))
                    .route("/api/v1/products", web::post().to(whoami))
                    .route("/api/v1/appointments", web::post().to(whoami))
                    .route("/api/v1/cart", web::get().to(whoami))
                    .route("/api/v1/inventory", web::get().to(staff_only))
                    .route("/api/v1/chat/chats/1/stream", web::get().to(whoami)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_public_get_without_token() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/v1/products").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "anonymous");
    }

    #[actix_web::test]
    async fn test_public_path_attaches_user_when_token_present() {
        let app = app!();
        let token = jwt().generate_access_token(5, UserRole::Customer).unwrap();
        let req = test::TestRequest::post()
            .uri("/api/v1/appointments")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "5:customer");
    }

    #[actix_web::test]
    async fn test_get_only_prefix_does_not_open_writes() {
        let app = app!();
        let req = test::TestRequest::post().uri("/api/v1/products").to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_protected_path_requires_valid_token() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/v1/cart").to_request();
        assert!(test::try_call_service(&app, req).await.is_err());

        let req = test::TestRequest::get()
            .uri("/api/v1/cart")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        assert!(test::try_call_service(&app, req).await.is_err());

        let refresh = jwt().generate_refresh_token(5, UserRole::Customer).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/cart")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        assert!(test::try_call_service(&app, req).await.is_err());
    }

    #[actix_web::test]
    async fn test_role_guard() {
        let app = app!();
        let customer = jwt().generate_access_token(9, UserRole::Customer).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/inventory")
            .insert_header(("Authorization", format!("Bearer {customer}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let employee = jwt().generate_access_token(3, UserRole::Employee).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/inventory")
            .insert_header(("Authorization", format!("Bearer {employee}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_stream_accepts_query_token() {
        let app = app!();
        let token = jwt().generate_access_token(11, UserRole::Employee).unwrap();
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/chat/chats/1/stream?access_token={token}"))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "11:employee");
    }
}
