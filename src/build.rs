//! Exports the [`SiteBuilder`], which stitches together the high-level steps
//! of building the output static site: loading the templates
//! ([`crate::template`]), preparing the output tree and copying the static
//! assets, parsing and writing each post ([`crate::post`],
//! [`crate::write`]), writing the index and tag pages from the
//! [`crate::registry::Catalog`], and finally publishing the new tree.
//!
//! The tree is built in a staging directory next to the output directory and
//! only swapped into place once every page has been written, so a failed
//! build leaves the previously published site untouched.

use crate::config::Config;
use crate::post::{self, Post};
use crate::registry::Registry;
use crate::tag::TAG_DIRECTORY;
use crate::template::{Error as TemplateError, TemplateSet};
use crate::write::{Writer, REQUIRED_LAYOUTS};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The name of the static assets directory, both inside the template
/// directory and inside the output directory.
pub const STATIC_DIRECTORY: &str = "static";

/// The steps of a build, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    TemplatesLoaded,
    OutputPrepared,
    PostsWritten,
    IndexWritten,
    TagsWritten,
    Done,
}

/// What a finished build produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// Post pages written.
    pub posts: usize,

    /// Source files or pages skipped because of an error.
    pub skipped: usize,

    /// Tag pages written.
    pub tags: usize,
}

/// Builds the site described by a [`Config`]. See the module documentation
/// for the overall flow.
pub struct SiteBuilder<'a> {
    config: &'a Config,
    stage: Stage,
}

impl<'a> SiteBuilder<'a> {
    pub fn new(config: &'a Config) -> SiteBuilder<'a> {
        SiteBuilder {
            config,
            stage: Stage::Init,
        }
    }

    /// The last stage reached.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs every stage. Errors in individual source files or post and tag
    /// pages are logged and skipped; anything else stops the build before
    /// the output directory is replaced.
    pub fn build(&mut self) -> Result<Report> {
        let config = self.config;
        let mut report = Report::default();

        let templates = TemplateSet::from_directory(
            &config.layouts_directory(),
            &config.partials_directory(),
        )?;
        for layout in REQUIRED_LAYOUTS.iter() {
            if !templates.contains(layout) {
                return Err(Error::MissingLayout {
                    name: (*layout).to_owned(),
                    directory: config.layouts_directory(),
                });
            }
        }
        self.advance(Stage::TemplatesLoaded);

        check_output_directory(&config.output_directory)?;
        let staging = staging_directory(&config.output_directory)?;
        let result = prepare_output(&staging, &config.static_directory())
            .map(|_| self.advance(Stage::OutputPrepared))
            .and_then(|_| self.write_pages(&templates, &staging, &mut report))
            .and_then(|_| publish(&staging, &config.output_directory));
        if let Err(err) = result {
            // the published site is untouched; only the staging tree goes
            if let Err(cleanup) = rmdir(&staging) {
                tracing::error!(
                    path = %staging.display(),
                    "removing the staging directory: {}",
                    cleanup
                );
            }
            return Err(err);
        }
        self.advance(Stage::Done);

        tracing::info!(
            posts = report.posts,
            tags = report.tags,
            skipped = report.skipped,
            output = %config.output_directory.display(),
            "site built"
        );
        Ok(report)
    }

    /// Writes every page into `output_directory`, advancing from
    /// [`Stage::OutputPrepared`] to [`Stage::TagsWritten`].
    fn write_pages(
        &mut self,
        templates: &TemplateSet,
        output_directory: &Path,
        report: &mut Report,
    ) -> Result<()> {
        let config = self.config;
        let writer = Writer {
            templates,
            output_directory,
            title: &config.title,
        };

        let sources = post::discover(&config.source_directory, &config.source_extension)
            .map_err(|err| Error::Discover {
                path: config.source_directory.clone(),
                err,
            })?;
        let mut registry = Registry::new();
        for source in sources.iter() {
            let post = match Post::parse(source) {
                Ok(post) => post,
                Err(err) => {
                    tracing::warn!(path = %err.path().display(), "skipping post: {}", err);
                    report.skipped += 1;
                    continue;
                }
            };
            match writer.write_post(&post) {
                Ok(path) => {
                    tracing::debug!(source = %source.display(), output = %path.display(), "wrote post");
                    report.posts += 1;
                }
                Err(err) => {
                    // unwritten posts aren't listed, so no page links to them
                    skip_page(err)?;
                    report.skipped += 1;
                    continue;
                }
            }
            registry.add(post);
        }
        self.advance(Stage::PostsWritten);

        let catalog = registry.finalize();
        writer.write_index(&catalog.posts)?;
        self.advance(Stage::IndexWritten);

        for group in catalog.tags.iter() {
            match writer.write_tag(group) {
                Ok(_) => report.tags += 1,
                Err(err) => {
                    skip_page(err)?;
                    report.skipped += 1;
                }
            }
        }
        writer.write_tags_index(&catalog.tags)?;
        self.advance(Stage::TagsWritten);

        Ok(())
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "build stage");
        self.stage = stage;
    }
}

/// Builds the site from a [`Config`]. Shorthand for [`SiteBuilder::build`].
pub fn build_site(config: &Config) -> Result<Report> {
    SiteBuilder::new(config).build()
}

// Unknown layouts are a bug in the theme and affect every page, so they stop
// the build; anything else only affects the page at hand.
fn skip_page(err: TemplateError) -> Result<()> {
    match err {
        TemplateError::UnknownTemplate { .. } => Err(Error::Template(err)),
        err => {
            tracing::warn!("skipping page: {}", err);
            Ok(())
        }
    }
}

/// Fails if `output_directory` exists but isn't a directory. Publishing only
/// ever replaces directories.
fn check_output_directory(output_directory: &Path) -> Result<()> {
    match std::fs::metadata(output_directory) {
        Ok(metadata) if !metadata.is_dir() => {
            Err(Error::InvalidOutputDirectory(output_directory.to_owned()))
        }
        _ => Ok(()),
    }
}

/// Returns the sibling directory the site is built in before publishing,
/// e.g. `/srv/.public.staging` for `/srv/public`.
fn staging_directory(output_directory: &Path) -> Result<PathBuf> {
    sibling(output_directory, "staging")
}

fn sibling(output_directory: &Path, suffix: &str) -> Result<PathBuf> {
    let name = output_directory
        .file_name()
        .ok_or_else(|| Error::InvalidOutputDirectory(output_directory.to_owned()))?;
    let mut hidden = OsString::from(".");
    hidden.push(name);
    hidden.push(".");
    hidden.push(suffix);
    Ok(output_directory.with_file_name(hidden))
}

/// Empties `staging`, copies `static_source` into it as [`STATIC_DIRECTORY`],
/// and creates the [`TAG_DIRECTORY`] so pages can be rendered straight into
/// it.
fn prepare_output(staging: &Path, static_source: &Path) -> Result<()> {
    rmdir(staging)?;
    mkdir(staging)?;
    if static_source.is_dir() {
        copy_dir(static_source, &staging.join(STATIC_DIRECTORY))?;
    } else {
        tracing::info!(path = %static_source.display(), "no static directory; skipping");
    }
    mkdir(&staging.join(TAG_DIRECTORY))
}

/// Replaces `output_directory` with `staging`. The old tree is moved aside
/// first and only removed once the new one is in place.
fn publish(staging: &Path, output_directory: &Path) -> Result<()> {
    let publish_error = |err: std::io::Error| Error::Publish {
        path: output_directory.to_owned(),
        err,
    };

    check_output_directory(output_directory)?;
    if !output_directory.exists() {
        return std::fs::rename(staging, output_directory).map_err(publish_error);
    }

    let previous = sibling(output_directory, "previous")?;
    rmdir(&previous)?;
    std::fs::rename(output_directory, &previous).map_err(publish_error)?;
    if let Err(err) = std::fs::rename(staging, output_directory) {
        // put the old site back
        if let Err(restore) = std::fs::rename(&previous, output_directory) {
            tracing::error!(
                previous = %previous.display(),
                output = %output_directory.display(),
                "restoring the previous site: {}",
                restore
            );
            return Err(Error::Restore {
                path: output_directory.to_owned(),
                previous,
                err,
                restore,
            });
        }
        return Err(publish_error(err));
    }
    if let Err(err) = rmdir(&previous) {
        tracing::warn!("site published, but the old tree remains: {}", err);
    }
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src) {
        let entry = result.map_err(|err| Error::Walk {
            path: src.to_owned(),
            err,
        })?;
        // strip_prefix shouldn't fail since `src` is always an ancestor of
        // the entry
        let relative = entry.path().strip_prefix(src).unwrap_or_else(|_| entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            mkdir(&target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|err| Error::Copy {
                from: entry.path().to_owned(),
                to: target.clone(),
                err,
            })?;
        }
    }
    Ok(())
}

fn mkdir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| Error::CreateDir {
        path: dir.to_owned(),
        err,
    })
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Every variant stops the build.
/// Per-post problems never surface here; they're logged and skipped.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors loading templates or rendering a page the build
    /// can't do without (the index pages, or any page using a layout that
    /// doesn't exist).
    Template(TemplateError),

    /// Returned when the theme lacks one of the layouts the build renders.
    MissingLayout { name: String, directory: PathBuf },

    /// Returned when the output directory has no final path component or
    /// exists as something other than a directory.
    InvalidOutputDirectory(PathBuf),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while creating output directories.
    CreateDir { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while copying static assets.
    Copy {
        from: PathBuf,
        to: PathBuf,
        err: std::io::Error,
    },

    /// Returned when the static directory can't be walked.
    Walk { path: PathBuf, err: walkdir::Error },

    /// Returned when the posts directory can't be listed.
    Discover { path: PathBuf, err: walkdir::Error },

    /// Returned when the finished tree can't be moved into place.
    Publish { path: PathBuf, err: std::io::Error },

    /// Returned when the finished tree can't be moved into place and the
    /// previous site can't be moved back either. The previous site is left
    /// at `previous`.
    Restore {
        path: PathBuf,
        previous: PathBuf,
        err: std::io::Error,
        restore: std::io::Error,
    },
}

impl Error {
    /// Whether the error happened while preparing the output tree, i.e.
    /// cleaning, creating, or copying into it.
    pub fn is_directory_prep(&self) -> bool {
        matches!(
            self,
            Error::InvalidOutputDirectory(_)
                | Error::Clean { .. }
                | Error::CreateDir { .. }
                | Error::Copy { .. }
                | Error::Walk { .. }
        )
    }
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::MissingLayout { name, directory } => write!(
                f,
                "Layout '{}' not found in '{}'",
                name,
                directory.display()
            ),
            Error::InvalidOutputDirectory(path) => {
                write!(f, "Invalid output directory '{}'", path.display())
            }
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::CreateDir { path, err } => {
                write!(f, "Creating directory '{}': {}", path.display(), err)
            }
            Error::Copy { from, to, err } => write!(
                f,
                "Copying '{}' to '{}': {}",
                from.display(),
                to.display(),
                err
            ),
            Error::Walk { path, err } => {
                write!(f, "Walking directory '{}': {}", path.display(), err)
            }
            Error::Discover { path, err } => {
                write!(f, "Listing posts in '{}': {}", path.display(), err)
            }
            Error::Publish { path, err } => {
                write!(f, "Publishing '{}': {}", path.display(), err)
            }
            Error::Restore {
                path,
                previous,
                err,
                restore,
            } => write!(
                f,
                "Publishing '{}': {}; restoring the previous site from '{}' also failed: {}",
                path.display(),
                err,
                previous.display(),
                restore
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(err) => Some(err),
            Error::MissingLayout { .. } => None,
            Error::InvalidOutputDirectory(_) => None,
            Error::Clean { err, .. } => Some(err),
            Error::CreateDir { err, .. } => Some(err),
            Error::Copy { err, .. } => Some(err),
            Error::Walk { err, .. } => Some(err),
            Error::Discover { err, .. } => Some(err),
            Error::Publish { err, .. } => Some(err),
            Error::Restore { err, .. } => Some(err),
        }
    }
}

impl From<TemplateError> for Error {
    /// Converts [`TemplateError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: TemplateError) -> Error {
        Error::Template(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn testdata() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata")
    }

    fn config(output_directory: &Path) -> anyhow::Result<Config> {
        let mut config = Config::from_directory(&testdata().join("site"))?;
        config.output_directory = output_directory.to_owned();
        Ok(config)
    }

    fn read(path: PathBuf) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }

    #[test]
    fn test_build_site() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");
        let config = config(&output)?;

        let mut builder = SiteBuilder::new(&config);
        assert_eq!(Stage::Init, builder.stage());
        let report = builder.build()?;
        assert_eq!(Stage::Done, builder.stage());
        assert_eq!(
            Report {
                posts: 2,
                skipped: 2,
                tags: 2
            },
            report
        );

        let index = read(output.join("index.html"))?;
        let july = index.find("Serving the web").ok_or("July post missing from index")?;
        let june = index.find("Hello, Go").ok_or("June post missing from index")?;
        assert!(july < june, "posts out of order:\n{}", index);

        let go = read(output.join(TAG_DIRECTORY).join("go.html"))?;
        assert!(go.contains("Hello, Go") && go.contains("Serving the web"));
        let go_july = go.find("Serving the web").ok_or("missing")?;
        let go_june = go.find("Hello, Go").ok_or("missing")?;
        assert!(go_july < go_june);

        let web = read(output.join(TAG_DIRECTORY).join("web.html"))?;
        assert!(web.contains("Serving the web"));
        assert!(!web.contains("Hello, Go"));

        let tags = read(output.join("tags.html"))?;
        assert!(tags.contains(">go<") && tags.contains(">web<"));

        let post = read(output.join("hello-go.html"))?;
        assert!(post.contains("<h1>Hello, Go</h1>"));
        assert!(post.contains("<em>first</em>"));

        assert!(output.join(STATIC_DIRECTORY).join("style.css").is_file());
        assert!(output
            .join(STATIC_DIRECTORY)
            .join("img")
            .join("logo.svg")
            .is_file());

        assert!(!output.join("broken.html").exists());
        assert!(!output.join("unquoted-colon.html").exists());

        assert!(!staging_directory(&output)?.exists());
        assert!(!sibling(&output, "previous")?.exists());
        Ok(())
    }

    #[test]
    fn test_build_site_leaves_unwritten_posts_unlisted() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");

        let layouts = dir.path().join("theme").join("layouts");
        std::fs::create_dir_all(&layouts)?;
        // `len` fails on a bool, so draft pages fail to render
        std::fs::write(
            layouts.join("post.html"),
            "{{if .post.meta.draft}}{{len .post.meta.draft}}{{end}}{{.post.content}}",
        )?;
        std::fs::write(layouts.join("index.html"), "{{range .posts}}[{{.url}}]{{end}}")?;
        std::fs::write(layouts.join("tag.html"), "{{range .tag.posts}}[{{.url}}]{{end}}")?;
        std::fs::write(layouts.join("tags.html"), "{{range .tags}}[{{.name}}]{{end}}")?;

        let sources = dir.path().join("posts");
        std::fs::create_dir_all(&sources)?;
        std::fs::write(
            sources.join("done.md"),
            "---
permalink: done
date: 2022-01-02
tags: [x]
---
done",
        )?;
        std::fs::write(
            sources.join("wip.md"),
            "---
permalink: wip
date: 2022-01-01
tags: [x, y]
draft: true
---
wip",
        )?;

        let mut config = config(&output)?;
        config.template_directory = dir.path().join("theme");
        config.source_directory = sources;

        let report = build_site(&config)?;
        assert_eq!(
            Report {
                posts: 1,
                skipped: 1,
                tags: 1
            },
            report
        );
        assert!(output.join("done.html").is_file());
        assert!(!output.join("wip.html").exists());
        assert_eq!("[./done.html]", read(output.join("index.html"))?.trim_end());
        assert_eq!(
            "[../done.html]",
            read(output.join(TAG_DIRECTORY).join("x.html"))?.trim_end()
        );
        assert!(!output.join(TAG_DIRECTORY).join("y.html").exists());
        assert_eq!("[x]", read(output.join("tags.html"))?.trim_end());
        Ok(())
    }

    #[test]
    fn test_build_site_refuses_file_as_output() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");
        std::fs::write(&output, "not a directory")?;

        match build_site(&config(&output)?) {
            Err(Error::InvalidOutputDirectory(path)) => assert_eq!(output, path),
            other => panic!("expected InvalidOutputDirectory, got {:?}", other),
        }
        assert_eq!("not a directory", read(output.clone())?);
        assert!(!staging_directory(&output)?.exists());
        Ok(())
    }

    #[test]
    fn test_publish_onto_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");
        let staging = staging_directory(&output)?;
        std::fs::create_dir_all(&staging)?;
        std::fs::write(&output, "not a directory")?;

        assert!(matches!(
            publish(&staging, &output),
            Err(Error::InvalidOutputDirectory(_))
        ));
        assert!(output.is_file());
        assert!(staging.is_dir());
        Ok(())
    }

    #[test]
    fn test_publish_failure_restores_previous_site() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");
        std::fs::create_dir_all(&output)?;
        std::fs::write(output.join("index.html"), "previous")?;

        // the staging tree doesn't exist, so moving it into place fails
        let staging = staging_directory(&output)?;
        match publish(&staging, &output) {
            Err(Error::Publish { path, .. }) => assert_eq!(output, path),
            other => panic!("expected Publish, got {:?}", other),
        }
        assert_eq!("previous", read(output.join("index.html"))?);
        assert!(!sibling(&output, "previous")?.exists());
        Ok(())
    }

    #[test]
    fn test_build_site_replaces_previous_output() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");
        std::fs::create_dir_all(&output)?;
        std::fs::write(output.join("stale.html"), "stale")?;

        build_site(&config(&output)?)?;
        assert!(!output.join("stale.html").exists());
        assert!(output.join("index.html").is_file());
        Ok(())
    }

    #[test]
    fn test_build_site_missing_layout_keeps_previous_output() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");
        std::fs::create_dir_all(&output)?;
        std::fs::write(output.join("index.html"), "previous")?;

        let layouts = dir.path().join("theme").join("layouts");
        std::fs::create_dir_all(&layouts)?;
        std::fs::write(layouts.join("post.html"), "{{.post.content}}")?;

        let mut config = config(&output)?;
        config.template_directory = dir.path().join("theme");

        let mut builder = SiteBuilder::new(&config);
        match builder.build() {
            Err(Error::MissingLayout { name, .. }) => assert_eq!("index.html", name),
            other => panic!("expected MissingLayout, got {:?}", other),
        }
        assert_eq!(Stage::Init, builder.stage());
        assert_eq!("previous", read(output.join("index.html"))?);
        assert!(!staging_directory(&output)?.exists());
        Ok(())
    }

    #[test]
    fn test_build_site_without_posts() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("public");
        let mut config = config(&output)?;
        config.source_directory = dir.path().join("empty");
        std::fs::create_dir_all(&config.source_directory)?;

        let report = build_site(&config)?;
        assert_eq!(Report::default(), report);
        assert!(output.join("index.html").is_file());
        assert!(output.join("tags.html").is_file());
        assert!(output.join(TAG_DIRECTORY).is_dir());
        Ok(())
    }

    #[test]
    fn test_staging_directory() -> Result<()> {
        assert_eq!(
            PathBuf::from("/srv/.public.staging"),
            staging_directory(Path::new("/srv/public"))?
        );
        match staging_directory(Path::new("/")) {
            Err(err) => assert!(err.is_directory_prep(), "unexpected error: {}", err),
            Ok(path) => panic!("expected an error, got `{}`", path.display()),
        }
        Ok(())
    }
}
