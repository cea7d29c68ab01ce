//! Generic HTTP collaborators

mod json_feed;
mod upload_gateway;

pub use json_feed::JsonFeedAdapter;
pub use upload_gateway::HttpUploadClient;
