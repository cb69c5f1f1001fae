pub mod db;
mod files;
mod folders;
pub mod models;
mod shares;
mod tables;
mod usage;

pub use db::{Database, DatabaseError, PurgeStats};
pub use shares::generate_share_token;
pub use tables::*;
