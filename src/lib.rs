/// X Engagement Bot Library
///
/// Fetches recent posts from X, picks the ones with strong engagement and
/// likes/reposts them, remembering what it already handled between runs.

pub mod actions;
pub mod config;
pub mod controller;
pub mod criteria;
pub mod error;
pub mod feed;
pub mod mock;
pub mod oauth;
pub mod post;
pub mod processed;
pub mod x_api;
