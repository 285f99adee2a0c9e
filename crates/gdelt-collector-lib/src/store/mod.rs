mod hash_store;
mod status_store;

pub use hash_store::{HashStore, RedisHashStore};
pub use status_store::{FileSendRecord, RedisStatusStore, StatusStore};
