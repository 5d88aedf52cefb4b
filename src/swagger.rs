use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::me,
        handlers::user::list_users,
        handlers::user::get_user,
        handlers::user::create_staff,
        handlers::user::update_user,
        handlers::user::delete_user,
        handlers::product::list_products,
        handlers::product::get_product,
        handlers::product::create_product,
        handlers::product::update_product,
        handlers::product::delete_product,
        handlers::cart::get_cart,
        handlers::cart::add_item,
        handlers::cart::update_item,
        handlers::cart::remove_item,
        handlers::cart::clear_cart,
        handlers::wishlist::list_wishlist,
        handlers::wishlist::add_to_wishlist,
        handlers::wishlist::remove_from_wishlist,
        handlers::wishlist::move_to_cart,
        handlers::order::checkout,
        handlers::order::list_my_orders,
        handlers::order::get_my_order,
        handlers::order::pay_order,
        handlers::order::cancel_order,
        handlers::order::list_all_orders,
        handlers::order::get_order,
        handlers::order::update_order_status,
        handlers::appointment::create_appointment,
        handlers::appointment::list_my_appointments,
        handlers::appointment::list_all_appointments,
        handlers::appointment::update_appointment,
        handlers::diamond::list_partner_diamonds,
        handlers::diamond::trigger_sync,
        handlers::diamond::sync_status,
        handlers::master::list_masters,
        handlers::master::get_master,
        handlers::master::create_master,
        handlers::master::update_master,
        handlers::master::deactivate_master,
        handlers::master::delete_master,
        handlers::inventory::list_inventory,
        handlers::inventory::inventory_summary,
        handlers::inventory::get_inventory,
        handlers::inventory::create_inventory,
        handlers::inventory::update_inventory,
        handlers::inventory::change_inventory_status,
        handlers::inventory::delete_inventory,
        handlers::ledger::ledger_summary,
        handlers::ledger::master_statement,
        handlers::ledger::create_ledger_entry,
        handlers::ledger::master_outstanding,
        handlers::invoice::next_invoice_number,
        handlers::invoice::list_invoices,
        handlers::invoice::get_invoice,
        handlers::invoice::create_invoice,
        handlers::invoice::record_invoice_payment,
        handlers::invoice::void_invoice,
        handlers::memo::next_memo_number,
        handlers::memo::list_memos,
        handlers::memo::get_memo,
        handlers::memo::create_memo,
        handlers::memo::return_memo_items,
        handlers::memo::convert_memo,
        handlers::report::sales_report,
        handlers::report::generate_performance_report,
        handlers::report::list_performance_reports,
        handlers::task::create_task,
        handlers::task::list_tasks,
        handlers::task::list_assigned_tasks,
        handlers::task::get_task,
        handlers::task::update_task,
        handlers::task::update_task_status,
        handlers::task::delete_task,
        handlers::notification::list_notifications,
        handlers::notification::unread_count,
        handlers::notification::mark_read,
        handlers::notification::mark_all_read,
        handlers::chat::open_chat_request,
        handlers::chat::list_my_chat_requests,
        handlers::chat::list_pending_chat_requests,
        handlers::chat::accept_chat_request,
        handlers::chat::list_chats,
        handlers::chat::close_chat,
        handlers::chat::list_messages,
        handlers::chat::post_message,
        handlers::chat::stream_messages,
        handlers::upload::upload_signature,
    ),
    components(
        schemas(
            ErrorResponse,
            ApiError,
            DateRangeQuery,
            RegisterRequest,
            LoginRequest,
            RefreshTokenRequest,
            AuthResponse,
            UserResponse,
            CreateStaffRequest,
            UpdateUserRequest,
            CreateProductRequest,
            UpdateProductRequest,
            AddCartItemRequest,
            UpdateCartItemRequest,
            CartLine,
            CartResponse,
            AddWishlistItemRequest,
            WishlistEntry,
            CheckoutRequest,
            CheckoutResponse,
            OrderDetail,
            UpdateOrderStatusRequest,
            CreateAppointmentRequest,
            UpdateAppointmentRequest,
            DiamondSource,
            PartnerDiamond,
            SyncOutcome,
            CreateMasterRequest,
            UpdateMasterRequest,
            CreateInventoryRequest,
            UpdateInventoryRequest,
            ChangeInventoryStatusRequest,
            InventoryDetail,
            InventorySummary,
            ManualLedgerEntryRequest,
            LedgerStatement,
            OutstandingBalance,
            MasterBalance,
            InvoiceLineRequest,
            CreateInvoiceRequest,
            RecordPaymentRequest,
            VoidInvoiceRequest,
            InvoiceDetail,
            NextNumberResponse,
            MemoLineRequest,
            CreateMemoRequest,
            ReturnMemoItemsRequest,
            ConvertMemoRequest,
            MemoDetail,
            SalesReport,
            EmployeeSales,
            DailySales,
            GeneratePerformanceReportRequest,
            CreateTaskRequest,
            UpdateTaskRequest,
            UpdateTaskStatusRequest,
            TaskDetail,
            UnreadCountResponse,
            MarkAllReadResponse,
            OpenChatRequest,
            PostMessageRequest,
            UploadSignatureResponse,
            entities::UserRole,
            entities::OrderStatus,
            entities::AppointmentStatus,
            entities::MasterType,
            entities::InventoryStatus,
            entities::LedgerEntryType,
            entities::InvoiceStatus,
            entities::MemoStatus,
            entities::MemoItemStatus,
            entities::TaskPriority,
            entities::TaskStatus,
            entities::ChatRequestStatus,
            entities::SyncState,
            entities::users::Model,
            entities::products::Model,
            entities::cart_items::Model,
            entities::wishlist_items::Model,
            entities::orders::Model,
            entities::order_items::Model,
            entities::appointments::Model,
            entities::masters::Model,
            entities::inventory::Model,
            entities::inventory_history::Model,
            entities::ledgers::Model,
            entities::invoices::Model,
            entities::invoice_items::Model,
            entities::memos::Model,
            entities::memo_items::Model,
            entities::performance_reports::Model,
            entities::tasks::Model,
            entities::notifications::Model,
            entities::chat_requests::Model,
            entities::chats::Model,
            entities::messages::Model,
            entities::diamond_sync_status::Model,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication API"),
        (name = "users", description = "Staff and customer account management"),
        (name = "products", description = "Storefront catalog"),
        (name = "cart", description = "Shopping cart"),
        (name = "wishlist", description = "Customer wishlist"),
        (name = "orders", description = "Checkout and order management"),
        (name = "appointments", description = "Showroom appointments"),
        (name = "diamonds", description = "Partner diamond feeds"),
        (name = "masters", description = "Customer and vendor master records"),
        (name = "inventory", description = "Stock items and status history"),
        (name = "ledger", description = "Accounts receivable ledger"),
        (name = "invoices", description = "Invoicing and payments"),
        (name = "memos", description = "Consignment memos"),
        (name = "reports", description = "Sales and performance reports"),
        (name = "tasks", description = "Staff task assignment"),
        (name = "notifications", description = "In-app notifications"),
        (name = "chat", description = "Customer support chat"),
        (name = "uploads", description = "Signed media uploads"),
    ),
    info(
        title = "Gemstore Backend API",
        version = "1.0.0",
        description = "Jewelry storefront and back office REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/orders/checkout"));
        assert!(doc.paths.paths.contains_key("/chat/{id}/stream"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("Invoice"));
    }
}
