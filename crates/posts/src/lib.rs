//! # Kinnect Posts Crate
//!
//! Posts shared with one or more families, optionally tagged with events and
//! carrying the author's uploads, plus threaded comments and likes.

pub mod services;
pub mod types;

pub use services::{CommentService, LikeService, PostService, MAX_REPLY_DEPTH};
pub use types::{CommentNode, FeedPage, LikeToggle, NewComment, NewPost, PostDetails};
