//! Request-intercepting cache gateway.
//!
//! Every outbound request goes through a dedicated task that owns three
//! named cache buckets (story list, story detail, images) and the HTTP
//! backend. The task is reached only by message passing; callers hold a
//! [`GatewayHandle`] and wait on reply channels, so no cache state is shared
//! with the rest of the program.

mod backend;
mod bucket;
mod worker;

pub use backend::{
  Backend, Destination, GatewayRequest, GatewayResponse, HttpBackend, Method, RequestBody,
  StoryForm,
};
pub use bucket::{CacheBucket, CachePolicy, Matcher, IMAGE_CACHE, STORY_DETAIL_CACHE, STORY_LIST_CACHE};
pub use worker::{BucketPurge, GatewayHandle, PurgeReport};

#[cfg(test)]
pub use backend::testing;
