pub mod admin;
pub mod files;
pub mod shared;
pub mod user;
