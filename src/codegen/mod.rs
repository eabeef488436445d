// src/codegen/mod.rs

pub mod artifact;
pub mod generator;

pub use artifact::{ActionScript, Step};
pub use generator::CodeGenerator;
