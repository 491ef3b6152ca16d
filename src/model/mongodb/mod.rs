mod bson;
mod collection;
mod errors;
mod store;

pub use bson::{optional_chrono_datetime_as_bson_datetime, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::is_duplicate_key_error;
pub use store::MongoStore;
