pub mod create;
pub mod drain;
pub mod info;
pub mod status;
pub mod update;
pub mod version;
