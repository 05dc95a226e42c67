pub mod extract;
pub mod party;
pub mod schema;

pub use extract::extract_page;
pub use schema::CompiledSchema;
