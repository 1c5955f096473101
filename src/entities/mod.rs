pub mod customer;
pub mod dealer;
pub mod inventory;
pub mod order;
pub mod order_item;
pub mod provider;
pub mod provider_transport;
pub mod purchase_order;
pub mod shipment;
pub mod substance;
pub mod transaction;

pub use order::{OrderStatus, PaymentStatus};
pub use provider_transport::TransportMethod;
pub use purchase_order::PurchaseOrderStatus;
pub use shipment::ShipmentStatus;
pub use transaction::TransactionKind;
