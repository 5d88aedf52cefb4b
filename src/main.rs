use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use gemstore_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{CloudinarySigner, CranberriClient, KyrahClient, StripeService},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // 创建JWT服务
    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    // 创建外部服务
    let stripe_service = StripeService::new(config.stripe.clone());
    if !stripe_service.is_configured() {
        log::warn!("Stripe is not configured, checkout will fail");
    }
    let cloudinary_signer = CloudinarySigner::new(config.cloudinary.clone());
    let cranberri_client = CranberriClient::new(config.cranberri.clone());
    let kyrah_client = KyrahClient::new(config.kyrah.clone());
    let chat_hub = ChatHub::new();

    // 创建服务
    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let user_service = UserService::new(pool.clone());
    let product_service = ProductService::new(pool.clone());
    let cart_service = CartService::new(pool.clone());
    let wishlist_service = WishlistService::new(pool.clone());
    let order_service = OrderService::new(pool.clone(), stripe_service.clone());
    let appointment_service = AppointmentService::new(pool.clone());
    let master_service = MasterService::new(pool.clone());
    let inventory_service = InventoryService::new(pool.clone());
    let ledger_service = LedgerService::new(pool.clone());
    let invoice_service = InvoiceService::new(pool.clone());
    let memo_service = MemoService::new(pool.clone());
    let report_service = ReportService::new(pool.clone());
    let task_service = TaskService::new(pool.clone());
    let notification_service = NotificationService::new(pool.clone());
    let chat_service = ChatService::new(pool.clone(), chat_hub);
    let diamond_sync_service = DiamondSyncService::new(pool.clone(), cranberri_client, kyrah_client);

    if let Err(e) = auth_service.ensure_bootstrap_admin(&config.bootstrap).await {
        log::error!("Failed to bootstrap admin account: {e:?}");
    }

    // 上次进程退出时未完成的同步
    match diamond_sync_service.reset_stale().await {
        Ok(n) if n > 0 => log::warn!("Reset {n} interrupted diamond syncs"),
        Ok(_) => {}
        Err(e) => log::error!("Failed to reset stale diamond syncs: {e:?}"),
    }

    // 启动后台任务
    tasks::spawn_all(diamond_sync_service.clone(), config.sync.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(product_service.clone()))
            .app_data(web::Data::new(cart_service.clone()))
            .app_data(web::Data::new(wishlist_service.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(appointment_service.clone()))
            .app_data(web::Data::new(master_service.clone()))
            .app_data(web::Data::new(inventory_service.clone()))
            .app_data(web::Data::new(ledger_service.clone()))
            .app_data(web::Data::new(invoice_service.clone()))
            .app_data(web::Data::new(memo_service.clone()))
            .app_data(web::Data::new(report_service.clone()))
            .app_data(web::Data::new(task_service.clone()))
            .app_data(web::Data::new(notification_service.clone()))
            .app_data(web::Data::new(chat_service.clone()))
            .app_data(web::Data::new(diamond_sync_service.clone()))
            .app_data(web::Data::new(stripe_service.clone()))
            .app_data(web::Data::new(cloudinary_signer.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::user_config)
                    .configure(handlers::product_config)
                    .configure(handlers::cart_config)
                    .configure(handlers::wishlist_config)
                    .configure(handlers::order_config)
                    .configure(handlers::appointment_config)
                    .configure(handlers::master_config)
                    .configure(handlers::inventory_config)
                    .configure(handlers::ledger_config)
                    .configure(handlers::invoice_config)
                    .configure(handlers::memo_config)
                    .configure(handlers::report_config)
                    .configure(handlers::task_config)
                    .configure(handlers::notification_config)
                    .configure(handlers::chat_config)
                    .configure(handlers::upload_config)
                    .configure(handlers::diamond_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
