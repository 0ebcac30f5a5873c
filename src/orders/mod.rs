pub mod reaper;
pub mod store;
pub mod types;

pub use store::{InMemoryOrderStore, OrderStore, StoreError};
pub use types::{new_order_id, NewOrder, OrderPatch, OrderRecord, OrderStatus};
