//! HTTP request handlers organized by functionality

pub mod automation;
