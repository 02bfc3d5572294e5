//! Resolves a [`Config`] from an optional `quill.yaml` project file.
//!
//! ```yaml
//! title: My Blog
//! source_directory: srcs
//! source_extension: md
//! template_directory: templates
//! output_directory: public
//! address: 127.0.0.1:8080
//! ```
//!
//! Every key is optional. Relative paths are resolved against the directory
//! containing the project file.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "quill.yaml";

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Project {
    title: String,
    source_directory: PathBuf,
    source_extension: String,
    template_directory: PathBuf,
    output_directory: PathBuf,
    address: SocketAddr,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            title: String::new(),
            source_directory: PathBuf::from("srcs"),
            source_extension: String::from("md"),
            template_directory: PathBuf::from("templates"),
            output_directory: PathBuf::from("public"),
            address: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// Site-wide settings with every path resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Made available to templates as `site.title`.
    pub title: String,

    /// The directory holding the post source files.
    pub source_directory: PathBuf,

    /// The extension (without the dot) of post source files.
    pub source_extension: String,

    /// The directory holding `layouts/`, `partials/`, and `static/`.
    pub template_directory: PathBuf,

    /// The directory the site is published into.
    pub output_directory: PathBuf,

    /// The address the development server listens on.
    pub address: SocketAddr,

    /// The directory relative paths are resolved against: the directory
    /// holding the project file, or the starting directory without one.
    pub project_root: PathBuf,
}

impl Config {
    /// Looks for [`PROJECT_FILE`] in `dir` and then in each of its parents.
    /// Without a project file, the defaults are resolved against `dir`.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        for ancestor in dir.ancestors() {
            let path = ancestor.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path)
                    .with_context(|| format!("Loading configuration `{}`", path.display()));
            }
        }
        tracing::debug!(directory = %dir.display(), "no {} found; using defaults", PROJECT_FILE);
        Ok(Config::rooted_at(dir))
    }

    /// Loads the project file at `path`.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = File::open(path)
            .map_err(|e| anyhow!("Opening project file `{}`: {}", path.display(), e))?;
        let project: Project = serde_yaml::from_reader(file)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => Ok(Config::resolve(project, project_root)),
        }
    }

    /// The default configuration with paths relative to `root`.
    pub fn rooted_at(root: &Path) -> Config {
        Config::resolve(Project::default(), root)
    }

    fn resolve(project: Project, root: &Path) -> Config {
        Config {
            title: project.title,
            source_directory: root.join(project.source_directory),
            source_extension: project.source_extension,
            template_directory: root.join(project.template_directory),
            output_directory: root.join(project.output_directory),
            address: project.address,
            project_root: root.to_owned(),
        }
    }

    /// Replaces the output directory, resolving `dir` against the project
    /// root like the paths in the project file.
    pub fn set_output_directory(&mut self, dir: &Path) {
        self.output_directory = self.project_root.join(dir);
    }

    pub fn layouts_directory(&self) -> PathBuf {
        self.template_directory.join("layouts")
    }

    pub fn partials_directory(&self) -> PathBuf {
        self.template_directory.join("partials")
    }

    pub fn static_directory(&self) -> PathBuf {
        self.template_directory.join("static")
    }
}
