pub mod filename;
pub mod jwt;
pub mod share_id;
