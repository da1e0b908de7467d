pub mod message;
pub mod parts;
