pub mod code;
pub mod jwt;
pub mod mail;
pub mod search;
