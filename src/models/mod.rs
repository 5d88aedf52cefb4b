pub mod appointment;
pub mod catalog;
pub mod chat;
pub mod common;
pub mod diamond;
pub mod inventory;
pub mod invoice;
pub mod ledger;
pub mod master;
pub mod memo;
pub mod notification;
pub mod order;
pub mod report;
pub mod task;
pub mod upload;
pub mod user;

pub use appointment::*;
pub use catalog::*;
pub use chat::*;
pub use common::*;
pub use diamond::*;
pub use inventory::*;
pub use invoice::*;
pub use ledger::*;
pub use master::*;
pub use memo::*;
pub use notification::*;
pub use order::*;
pub use report::*;
pub use task::*;
pub use upload::*;
pub use user::*;
