pub mod backend;
pub mod error;
pub mod shape;
pub mod source;
