pub mod appointments;
pub mod cart_items;
pub mod chat_requests;
pub mod chats;
pub mod cranberri_diamonds;
pub mod diamond_sync_status;
pub mod inventory;
pub mod inventory_history;
pub mod invoice_items;
pub mod invoices;
pub mod kyrah_diamonds;
pub mod ledgers;
pub mod masters;
pub mod memo_items;
pub mod memos;
pub mod messages;
pub mod notifications;
pub mod order_items;
pub mod orders;
pub mod performance_reports;
pub mod products;
pub mod task_assignments;
pub mod tasks;
pub mod users;
pub mod wishlist_items;

pub use appointments::AppointmentStatus;
pub use chat_requests::ChatRequestStatus;
pub use diamond_sync_status::SyncState;
pub use inventory::InventoryStatus;
pub use invoices::InvoiceStatus;
pub use ledgers::LedgerEntryType;
pub use masters::MasterType;
pub use memo_items::MemoItemStatus;
pub use memos::MemoStatus;
pub use orders::OrderStatus;
pub use tasks::{TaskPriority, TaskStatus};
pub use users::UserRole;
