//! Defines the [`Post`], [`Meta`], and [`Error`] types, and the logic for
//! parsing posts from source files on disk. A source file looks like this:
//!
//! ```md
//! ---
//! title: Hello, world!
//! date: 2021-04-16
//! tags: [greet]
//! permalink: hello-world
//! ---
//! # Hello
//!
//! World
//! ```
//!
//! See [`crate::frontmatter::split`] for how the front matter is located and
//! [`Post::to_value`] for how posts are handed to templates.

use crate::frontmatter::{self, MissingSeparator};
use crate::markdown;
use crate::tag;
use gtmpl::Value;
use gtmpl_derive::Gtmpl;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Excerpts are cut to this many characters.
pub const EXCERPT_LENGTH: usize = 100;

/// The decoded front matter of a post.
#[derive(Clone, Debug, PartialEq, Deserialize, Gtmpl)]
pub struct Meta {
    #[serde(default)]
    pub title: String,

    /// Tag names, de-duplicated. See [`tag::deserialize_tags`].
    #[serde(default, deserialize_with = "tag::deserialize_tags")]
    pub tags: Vec<String>,

    /// Compared byte-wise when sorting, so `YYYY-MM-DD` is expected.
    #[serde(default)]
    pub date: String,

    /// The output file stem, e.g. `hello-world` for `hello-world.html`.
    #[serde(rename = "permalink", deserialize_with = "deserialize_slug")]
    pub slug: String,

    /// Passed through to templates. Drafts are still built.
    #[serde(default)]
    pub draft: bool,
}

fn deserialize_slug<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let slug = String::deserialize(deserializer)?;
    if slug.is_empty() || slug == "." || slug == ".." || slug.contains(&['/', '\\'][..]) {
        return Err(D::Error::custom(format!(
            "permalink `{}` is not usable as a file name",
            slug
        )));
    }
    Ok(slug)
}

/// A parsed post: its metadata, its rendered body, and an excerpt for
/// listing pages.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    pub meta: Meta,

    /// The body rendered to HTML.
    pub content: String,

    /// The first [`EXCERPT_LENGTH`] characters of the markdown body. See
    /// [`excerpt`].
    pub excerpt: String,

    /// The source file the post was parsed from.
    pub source: PathBuf,
}

impl Post {
    /// Reads and parses the post at `path`.
    pub fn parse(path: &Path) -> Result<Post> {
        let input = std::fs::read_to_string(path).map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })?;
        Post::from_source(path, &input)
    }

    /// Parses a post from the contents of a source file. `path` is only
    /// recorded on the post and used in errors.
    pub fn from_source(path: &Path, input: &str) -> Result<Post> {
        let split = frontmatter::split(input).map_err(|err| Error::MalformedSource {
            path: path.to_owned(),
            err,
        })?;
        let meta: Meta = serde_yaml::from_str(split.metadata).map_err(|err| {
            Error::MetadataDecode {
                path: path.to_owned(),
                err,
            }
        })?;
        Ok(Post::assemble(path, meta, split.body))
    }

    /// Builds a post from already decoded metadata and the markdown body.
    pub fn assemble(path: &Path, meta: Meta, body: &str) -> Post {
        Post {
            meta,
            content: markdown::to_html(body),
            excerpt: excerpt(body).to_owned(),
            source: path.to_owned(),
        }
    }

    /// The post's output file name, `{slug}.html`.
    pub fn file_name(&self) -> String {
        format!("{}.html", self.meta.slug)
    }

    /// Converts the post into a template value with fields `meta`, `content`,
    /// `excerpt`, `url`, and `tags` (a list of `{name, slug, url}`). URLs are
    /// relative to a page whose path back to the site root is `prefix`.
    pub fn to_value(&self, prefix: &str) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("meta".to_owned(), self.meta.clone().into());
        m.insert("content".to_owned(), Value::String(self.content.clone()));
        m.insert("excerpt".to_owned(), Value::String(self.excerpt.clone()));
        m.insert(
            "url".to_owned(),
            Value::String(format!("{}/{}", prefix, self.file_name())),
        );
        m.insert(
            "tags".to_owned(),
            Value::Array(
                self.meta
                    .tags
                    .iter()
                    .map(|name| tag::link_value(prefix, name))
                    .collect(),
            ),
        );
        Value::Object(m)
    }
}

/// Returns the first [`EXCERPT_LENGTH`] characters of `body`, or all of
/// `body` if it is shorter than that.
pub fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(EXCERPT_LENGTH) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Lists the files directly inside `dir` whose extension is `extension`,
/// sorted by file name. Subdirectories are not searched.
pub fn discover(dir: &Path, extension: &str) -> std::result::Result<Vec<PathBuf>, walkdir::Error> {
    let mut sources = Vec::new();
    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result?;
        if entry.file_type().is_file()
            && entry.path().extension().map_or(false, |ext| ext == extension)
        {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a single [`Post`]. None of these stop a
/// build; the offending file is skipped.
#[derive(Debug)]
pub enum Error {
    /// Returned when the front matter has no closing separator.
    MalformedSource {
        path: PathBuf,
        err: MissingSeparator,
    },

    /// Returned when the front matter isn't valid YAML or doesn't fit
    /// [`Meta`].
    MetadataDecode {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when the source file can't be read.
    Io { path: PathBuf, err: std::io::Error },
}

impl Error {
    /// The source file the error is about.
    pub fn path(&self) -> &Path {
        match self {
            Error::MalformedSource { path, .. } => path,
            Error::MetadataDecode { path, .. } => path,
            Error::Io { path, .. } => path,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedSource { path, err } => {
                write!(f, "parsing post `{}`: {}", path.display(), err)
            }
            Error::MetadataDecode { path, err } => {
                write!(f, "decoding front matter of `{}`: {}", path.display(), err)
            }
            Error::Io { path, err } => {
                write!(f, "reading post `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MalformedSource { err, .. } => Some(err),
            Error::MetadataDecode { err, .. } => Some(err),
            Error::Io { err, .. } => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SIMPLE: &str = "---
title: Simple
date: 2021-01-01
tags: [intro, rust]
permalink: simple
---
Today is the first day of the Common Era.
";

    #[test]
    fn test_from_source() -> Result<()> {
        let post = Post::from_source(Path::new("simple.md"), SIMPLE)?;
        assert_eq!(
            Meta {
                title: String::from("Simple"),
                tags: vec![String::from("intro"), String::from("rust")],
                date: String::from("2021-01-01"),
                slug: String::from("simple"),
                draft: false,
            },
            post.meta
        );
        assert_eq!(
            "<p>Today is the first day of the Common Era.</p>\n",
            post.content
        );
        assert_eq!("Today is the first day of the Common Era.\n", post.excerpt);
        assert_eq!(PathBuf::from("simple.md"), post.source);
        assert_eq!("simple.html", post.file_name());
        Ok(())
    }

    #[test]
    fn test_from_source_defaults() -> Result<()> {
        let post = Post::from_source(Path::new("bare.md"), "---\npermalink: bare\n---\n")?;
        assert_eq!("", post.meta.title);
        assert!(post.meta.tags.is_empty());
        assert_eq!("", post.meta.date);
        assert!(!post.meta.draft);
        Ok(())
    }

    #[test]
    fn test_from_source_draft() -> Result<()> {
        let post = Post::from_source(
            Path::new("wip.md"),
            "---\npermalink: wip\ndraft: true\n---\nsoon",
        )?;
        assert!(post.meta.draft);
        Ok(())
    }

    #[test]
    fn test_from_source_missing_closing_separator() {
        match Post::from_source(Path::new("broken.md"), "---\npermalink: x\nbody\n") {
            Err(Error::MalformedSource { path, .. }) => {
                assert_eq!(PathBuf::from("broken.md"), path)
            }
            other => panic!("expected MalformedSource, got {:?}", other),
        }
    }

    #[test]
    fn test_from_source_bad_yaml() {
        match Post::from_source(Path::new("bad.md"), "---\ntitle: [unclosed\n---\nbody") {
            Err(Error::MetadataDecode { path, .. }) => assert_eq!(PathBuf::from("bad.md"), path),
            other => panic!("expected MetadataDecode, got {:?}", other),
        }
    }

    #[test]
    fn test_from_source_rejects_missing_or_unsafe_permalink() {
        for input in [
            "---\ntitle: no permalink\n---\nbody",
            "---\npermalink: ''\n---\nbody",
            "---\npermalink: ../escape\n---\nbody",
            "---\npermalink: ..\n---\nbody",
        ]
        .iter()
        {
            assert!(
                matches!(
                    Post::from_source(Path::new("x.md"), input),
                    Err(Error::MetadataDecode { .. })
                ),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_excerpt_short_body_is_verbatim() {
        let body = "short body\nwith two lines";
        assert_eq!(body, excerpt(body));
        assert_eq!("", excerpt(""));
    }

    #[test]
    fn test_excerpt_cuts_at_limit() {
        let exact = "x".repeat(EXCERPT_LENGTH);
        assert_eq!(exact, excerpt(&exact));

        let long = format!("{}tail", "y".repeat(EXCERPT_LENGTH));
        assert_eq!("y".repeat(EXCERPT_LENGTH), excerpt(&long));
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let long = "é".repeat(EXCERPT_LENGTH + 5);
        let cut = excerpt(&long);
        assert_eq!(EXCERPT_LENGTH, cut.chars().count());
    }

    #[test]
    fn test_excerpt_uses_markdown_not_html() -> Result<()> {
        let body = format!("**{}**", "z".repeat(EXCERPT_LENGTH));
        let post = Post::from_source(
            Path::new("long.md"),
            &format!("---\npermalink: long\n---\n{}", body),
        )?;
        assert!(post.excerpt.starts_with("**z"));
        assert_eq!(EXCERPT_LENGTH, post.excerpt.chars().count());
        Ok(())
    }

    #[test]
    fn test_discover() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.md", "a.md", "notes.txt"].iter() {
            std::fs::write(dir.path().join(name), "")?;
        }
        std::fs::create_dir(dir.path().join("nested.md"))?;
        std::fs::write(dir.path().join("nested.md").join("c.md"), "")?;

        let found = discover(dir.path(), "md").map_err(std::io::Error::from)?;
        assert_eq!(
            vec![dir.path().join("a.md"), dir.path().join("b.md")],
            found
        );
        Ok(())
    }
}
