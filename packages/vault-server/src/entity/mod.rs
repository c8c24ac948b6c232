pub mod content_record;
pub mod ownership_record;
pub mod share_link;
pub mod vault_user;
