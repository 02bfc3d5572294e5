//! Renders [`Post`]s and [`TagGroup`]s into pages on disk. Each page gets a
//! template value with `site` (site-wide settings), `prefix` (the relative
//! path from the page back to the site root), and one page-specific field.

use crate::post::Post;
use crate::tag::{TagGroup, TAG_DIRECTORY};
use crate::template::{Error, TemplateSet};
use gtmpl::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The layout used for post pages.
pub const POST_LAYOUT: &str = "post.html";

/// The layout used for the main index page.
pub const INDEX_LAYOUT: &str = "index.html";

/// The layout used for the page of a single tag.
pub const TAG_LAYOUT: &str = "tag.html";

/// The layout used for the page listing every tag.
pub const TAGS_LAYOUT: &str = "tags.html";

/// Every layout a theme has to provide.
pub const REQUIRED_LAYOUTS: [&str; 4] = [POST_LAYOUT, INDEX_LAYOUT, TAG_LAYOUT, TAGS_LAYOUT];

const ROOT_PREFIX: &str = ".";
const TAG_PREFIX: &str = "..";

/// Responsible for templating and writing HTML pages into an output
/// directory that already exists (including its [`TAG_DIRECTORY`]).
pub struct Writer<'a> {
    /// The compiled layouts.
    pub templates: &'a TemplateSet,

    /// The directory pages are written into.
    pub output_directory: &'a Path,

    /// The site title. This is made available to every template as
    /// `site.title`.
    pub title: &'a str,
}

impl Writer<'_> {
    /// Writes `{slug}.html` for `post` and returns its path.
    pub fn write_post(&self, post: &Post) -> Result<PathBuf, Error> {
        let path = self.output_directory.join(post.file_name());
        self.write_page(
            POST_LAYOUT,
            &path,
            ROOT_PREFIX,
            "post",
            post.to_value(ROOT_PREFIX),
        )?;
        Ok(path)
    }

    /// Writes `index.html` listing `posts` in the given order.
    pub fn write_index(&self, posts: &[&Post]) -> Result<PathBuf, Error> {
        let path = self.output_directory.join(INDEX_LAYOUT);
        self.write_page(
            INDEX_LAYOUT,
            &path,
            ROOT_PREFIX,
            "posts",
            Value::Array(posts.iter().map(|p| p.to_value(ROOT_PREFIX)).collect()),
        )?;
        Ok(path)
    }

    /// Writes `tag/{slug}.html` for `group`.
    pub fn write_tag(&self, group: &TagGroup) -> Result<PathBuf, Error> {
        let path = self
            .output_directory
            .join(TAG_DIRECTORY)
            .join(group.file_name());
        self.write_page(
            TAG_LAYOUT,
            &path,
            TAG_PREFIX,
            "tag",
            group.to_value(TAG_PREFIX),
        )?;
        Ok(path)
    }

    /// Writes `tags.html` listing every group in the given order.
    pub fn write_tags_index(&self, groups: &[TagGroup]) -> Result<PathBuf, Error> {
        let path = self.output_directory.join(TAGS_LAYOUT);
        self.write_page(
            TAGS_LAYOUT,
            &path,
            ROOT_PREFIX,
            "tags",
            Value::Array(groups.iter().map(|g| g.to_value(ROOT_PREFIX)).collect()),
        )?;
        Ok(path)
    }

    fn write_page(
        &self,
        layout: &str,
        path: &Path,
        prefix: &str,
        key: &str,
        item: Value,
    ) -> Result<(), Error> {
        let mut site: HashMap<String, Value> = HashMap::new();
        site.insert("title".to_owned(), Value::String(self.title.to_owned()));

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site".to_owned(), Value::Object(site));
        m.insert("prefix".to_owned(), Value::String(prefix.to_owned()));
        m.insert(key.to_owned(), item);

        tracing::debug!(layout, path = %path.display(), "writing page");
        self.templates.render(layout, path, Value::Object(m))
    }
}
