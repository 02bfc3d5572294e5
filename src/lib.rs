//! The library code for the `quill` static blog generator. A build goes
//! through these steps:
//!
//! 1. Loading the theme's layouts and partials ([`crate::template`])
//! 2. Preparing a fresh output tree and copying the static assets
//!    ([`crate::build`])
//! 3. Parsing each post source file ([`crate::frontmatter`], [`crate::post`],
//!    [`crate::markdown`]) and writing its page ([`crate::write`])
//! 4. Ordering the posts by date and grouping them by tag
//!    ([`crate::registry`], [`crate::tag`])
//! 5. Writing the index, one page per tag, and the tag index, then
//!    publishing the tree
//!
//! A bad post is logged and skipped; a broken theme or an unwritable output
//! directory stops the build before anything is published. Once built, the
//! site can be previewed with [`crate::serve`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod frontmatter;
pub mod markdown;
pub mod post;
pub mod registry;
pub mod serve;
pub mod tag;
pub mod template;
pub mod write;
