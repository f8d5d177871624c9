pub mod behaviors;
pub mod domain;
pub mod error;
pub mod protocol;
