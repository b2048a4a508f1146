pub mod embed;
pub mod export;
pub mod ingest;
pub mod inventory;
pub mod query;
pub mod status;
