pub mod error;
mod mapping;
