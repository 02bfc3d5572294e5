//! Defines the [`TagGroup`] type, which collects the [`Post`]s carrying a
//! given tag, along with the helpers for turning tag names into file names
//! and URLs.

use crate::post::Post;
use gtmpl::Value;
use serde::de::Error;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use url::form_urlencoded;

/// The output subdirectory holding one page per tag.
pub const TAG_DIRECTORY: &str = "tag";

/// Converts a tag name into the stem of its page's file name. The encoding
/// is one-to-one, so distinct names like `C`, `C#`, and `C++` never share a
/// page, and the result never contains a path separator. The output only
/// uses ASCII letters, digits, and `*-._+%`.
pub fn slugify(name: &str) -> String {
    form_urlencoded::byte_serialize(name.as_bytes()).collect()
}

/// The URL of a tag's page relative to a page whose path back to the site root
/// is `prefix`. `%` is the only character a slug can contain that needs
/// escaping in a URL path.
pub fn url(prefix: &str, tag_slug: &str) -> String {
    format!(
        "{}/{}/{}.html",
        prefix,
        TAG_DIRECTORY,
        tag_slug.replace('%', "%25")
    )
}

/// Converts a tag name into a `{name, slug, url}` template value.
pub fn link_value(prefix: &str, name: &str) -> Value {
    let slug = slugify(name);
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("url".to_owned(), Value::String(url(prefix, &slug)));
    m.insert("name".to_owned(), Value::String(name.to_owned()));
    m.insert("slug".to_owned(), Value::String(slug));
    Value::Object(m)
}

/// Deserializes a post's tag list. Repeated names are dropped (the first
/// occurrence keeps its position) so that a post shows up at most once per
/// tag page. Empty names are rejected.
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    let mut tags: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(D::Error::custom("tag names can't be empty"));
        }
        if !tags.contains(&name) {
            tags.push(name);
        }
    }
    Ok(tags)
}

/// A tag and every post carrying it, in the order of the sorted post list.
#[derive(Clone, Debug)]
pub struct TagGroup<'a> {
    /// The tag name.
    pub name: &'a str,

    /// The encoded tag name. See [`slugify`].
    pub slug: String,

    /// The posts carrying this tag.
    pub posts: Vec<&'a Post>,
}

impl TagGroup<'_> {
    /// The file name of this tag's page inside [`TAG_DIRECTORY`].
    pub fn file_name(&self) -> String {
        format!("{}.html", self.slug)
    }

    /// Converts the group into a template value with fields `name`, `slug`,
    /// `url`, `count`, and `posts`. URLs are relative to a page whose path
    /// back to the site root is `prefix`.
    pub fn to_value(&self, prefix: &str) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("name".to_owned(), Value::String(self.name.to_owned()));
        m.insert("slug".to_owned(), Value::String(self.slug.clone()));
        m.insert("url".to_owned(), Value::String(url(prefix, &self.slug)));
        m.insert(
            "count".to_owned(),
            Value::String(self.posts.len().to_string()),
        );
        m.insert(
            "posts".to_owned(),
            Value::Array(self.posts.iter().map(|p| p.to_value(prefix)).collect()),
        );
        Value::Object(m)
    }
}
