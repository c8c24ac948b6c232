pub mod admin;
pub mod files;
pub mod health;
pub mod public;
pub mod user;
