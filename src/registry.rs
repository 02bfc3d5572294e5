//! Collects parsed [`Post`]s and turns them into a [`Catalog`]: the posts
//! ordered by date plus the posts grouped by tag.

use crate::post::Post;
use crate::tag::{self, TagGroup};
use std::collections::HashMap;
use std::path::PathBuf;

/// Accumulates posts in discovery order.
#[derive(Debug, Default)]
pub struct Registry {
    posts: Vec<Post>,

    /// The source of the first post registered under each slug.
    slugs: HashMap<String, PathBuf>,
}

/// The sorted posts and tag groups of a [`Registry`].
#[derive(Clone, Debug)]
pub struct Catalog<'a> {
    /// All posts, most recent first.
    pub posts: Vec<&'a Post>,

    /// One group per tag, in the order each tag is first seen in `posts`.
    pub tags: Vec<TagGroup<'a>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Appends a post. Posts sharing a slug are all kept, but they render to
    /// the same file, so the collision is logged.
    pub fn add(&mut self, post: Post) {
        match self.slugs.get(&post.meta.slug) {
            Some(first) => tracing::warn!(
                slug = %post.meta.slug,
                first = %first.display(),
                second = %post.source.display(),
                "duplicate permalink; the later post overwrites the earlier one"
            ),
            None => {
                self.slugs
                    .insert(post.meta.slug.clone(), post.source.clone());
            }
        }
        self.posts.push(post);
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Sorts the posts by date, most recent first, and groups them by tag.
    ///
    /// Dates are compared byte-wise and the sort is stable, so posts with
    /// equal dates keep the order they were added in. Each post is appended to
    /// the group of every tag it carries while walking the sorted list, so
    /// every group is itself sorted. Calling this repeatedly yields the same
    /// catalog.
    pub fn finalize(&self) -> Catalog<'_> {
        let mut posts: Vec<&Post> = self.posts.iter().collect();
        posts.sort_by(|a, b| b.meta.date.cmp(&a.meta.date));

        let mut tags: Vec<TagGroup> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for &post in posts.iter() {
            for name in post.meta.tags.iter() {
                match positions.get(name.as_str()) {
                    Some(&i) => tags[i].posts.push(post),
                    None => {
                        positions.insert(name.as_str(), tags.len());
                        tags.push(TagGroup {
                            name,
                            slug: tag::slugify(name),
                            posts: vec![post],
                        });
                    }
                }
            }
        }

        Catalog { posts, tags }
    }
}
