mod chunking;
mod pdf_text;
mod run;
mod store;
#[cfg(test)]
mod tests;

pub use run::run;
pub(crate) use store::{DB_SCHEMA_VERSION, configure_connection, count_rows, ensure_vector_schema};
