pub mod add;
pub mod common;
pub mod connect;
pub mod delete;
pub mod edit;
pub mod list;
pub mod repos;
pub mod status;
pub mod sync;
