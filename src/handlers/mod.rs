pub mod appointment;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod diamond;
pub mod inventory;
pub mod invoice;
pub mod ledger;
pub mod master;
pub mod memo;
pub mod notification;
pub mod order;
pub mod product;
pub mod report;
pub mod task;
pub mod upload;
pub mod user;
pub mod webhook;
pub mod wishlist;

pub use appointment::appointment_config;
pub use auth::auth_config;
pub use cart::cart_config;
pub use chat::chat_config;
pub use diamond::diamond_config;
pub use inventory::inventory_config;
pub use invoice::invoice_config;
pub use ledger::ledger_config;
pub use master::master_config;
pub use memo::memo_config;
pub use notification::notification_config;
pub use order::order_config;
pub use product::product_config;
pub use report::report_config;
pub use task::task_config;
pub use upload::upload_config;
pub use user::user_config;
pub use webhook::webhook_config;
pub use wishlist::wishlist_config;
