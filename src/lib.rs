#![forbid(unsafe_code)]

pub mod assemble;
pub mod cli;
pub mod commands;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod listing;
pub mod locate;
pub mod logging;
pub mod mobo;
pub mod pipeline;
pub mod profile;
pub mod router;
pub mod strip;
pub mod translate;
pub mod translation_cache;
pub mod translator;
pub mod workspace;
