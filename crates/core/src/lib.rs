//! Domain logic for forecast workflow dispatch: slugs, request
//! normalization and run matching. No I/O happens in this crate.

pub mod error;
pub mod run_match;
pub mod run_request;
pub mod slug;
