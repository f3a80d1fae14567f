//! HTTP Handlers

pub mod account;
pub mod coffee;
pub mod download;
pub mod orders;
pub mod products;
pub mod upload;
pub mod webhook;
