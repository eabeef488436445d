// src/lookup/mod.rs

pub mod locators;
pub mod urls;

pub use locators::{locators, LocatorBook};
pub use urls::{urls, UrlBook};
