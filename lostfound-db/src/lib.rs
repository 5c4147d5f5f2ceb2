pub mod memory;
pub mod postgres;
mod record;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{DbError, Result, Store};
