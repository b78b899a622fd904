mod record;
pub use self::record::{CodelistValue, FullName, Identifier, RegistryRecord, SearchResponse};
