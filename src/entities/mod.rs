//! sea-orm entities for the POS schema created by [`crate::migrator`].

pub mod category;
pub mod identity;
pub mod product;
pub mod staff;
pub mod stock_transfer;
pub mod transaction;
pub mod transaction_item;

pub use staff::StaffRole;
pub use stock_transfer::TransferType;
