pub mod app;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fimfiction;
pub mod fs_util;
pub mod output;
pub mod registry;
pub mod template;
