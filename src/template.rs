//! Defines the [`TemplateSet`], the compiled layouts a site is rendered with.
//!
//! A theme is a directory of layouts (full pages, e.g. `post.html`) and a
//! directory of partials (fragments shared by the layouts, typically a set of
//! `{{define "name"}}...{{end}}` blocks). Every layout is compiled together
//! with every partial, so any layout can `{{template "name" .}}` any partial.
//! Layouts are looked up by file name.

use gtmpl::{Context, Template, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const TEMPLATE_EXTENSION: &str = "html";

/// Compiled layouts keyed by file name. Immutable once loaded.
pub struct TemplateSet {
    layouts: BTreeMap<String, Template>,
}

impl TemplateSet {
    /// Compiles each of `layouts` together with all of `partials`. Fails if
    /// any file can't be read or doesn't parse.
    pub fn load<L, P>(layouts: &[L], partials: &[P]) -> Result<TemplateSet>
    where
        L: AsRef<Path>,
        P: AsRef<Path>,
    {
        let mut shared = String::new();
        for partial in partials {
            shared.push_str(&read(partial.as_ref())?);
            shared.push('\n');
        }

        let mut compiled = BTreeMap::new();
        for layout in layouts {
            let layout = layout.as_ref();
            let name = layout
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::ParseTemplate {
                    path: layout.to_owned(),
                    err: String::from("layout path has no file name"),
                })?;

            // The layout goes first so that its text is the root template;
            // partials only contribute definitions.
            let mut contents = read(layout)?;
            contents.push('\n');
            contents.push_str(&shared);

            let mut template = Template::default();
            template
                .parse(&contents)
                .map_err(|err| Error::ParseTemplate {
                    path: layout.to_owned(),
                    err,
                })?;
            tracing::debug!(layout = %name, "compiled layout");
            compiled.insert(name, template);
        }

        Ok(TemplateSet { layouts: compiled })
    }

    /// Loads every `*.html` file in `layouts_directory` as a layout, bound to
    /// every `*.html` file in `partials_directory`. The partials directory is
    /// optional; the layouts directory is not.
    pub fn from_directory(layouts_directory: &Path, partials_directory: &Path) -> Result<TemplateSet> {
        let layouts = list(layouts_directory)?;
        let partials = if partials_directory.is_dir() {
            list(partials_directory)?
        } else {
            Vec::new()
        };
        TemplateSet::load(&layouts, &partials)
    }

    /// Whether a layout called `name` was loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.layouts.contains_key(name)
    }

    /// The names of the loaded layouts in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    /// Renders the layout `name` against `data` into `w`.
    pub fn execute<W: Write>(&self, name: &str, w: &mut W, data: Value) -> Result<()> {
        let template = self.get(name)?;
        let context = Context::from(data).map_err(|err| Error::Execute {
            name: name.to_owned(),
            err,
        })?;
        template.execute(w, &context).map_err(|err| Error::Execute {
            name: name.to_owned(),
            err,
        })
    }

    /// Renders the layout `name` against `data` into the file `destination`,
    /// creating or truncating it. The page is rendered in memory before the
    /// file is touched, so an unknown layout or a failed execution leaves no
    /// file behind.
    pub fn render(&self, name: &str, destination: &Path, data: Value) -> Result<()> {
        let mut page = Vec::new();
        self.execute(name, &mut page, data)?;
        std::fs::write(destination, &page).map_err(|err| Error::OutputWrite {
            path: destination.to_owned(),
            err,
        })
    }

    fn get(&self, name: &str) -> Result<&Template> {
        self.layouts.get(name).ok_or_else(|| Error::UnknownTemplate {
            name: name.to_owned(),
        })
    }
}

impl fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.layouts.keys()).finish()
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| Error::OpenTemplateFile {
        path: path.to_owned(),
        err,
    })
}

fn list(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for result in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result.map_err(|err| Error::ListTemplates {
            path: directory.to_owned(),
            err,
        })?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .map_or(false, |ext| ext == TEMPLATE_EXTENSION)
        {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// The result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or rendering templates.
///
/// [`Error::ListTemplates`], [`Error::OpenTemplateFile`], and
/// [`Error::ParseTemplate`] come from loading and mean the theme is broken.
/// The rest come from rendering a single page.
#[derive(Debug)]
pub enum Error {
    /// Returned when a template directory can't be listed.
    ListTemplates { path: PathBuf, err: walkdir::Error },

    /// Returned for I/O problems while reading template files.
    OpenTemplateFile { path: PathBuf, err: io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate { path: PathBuf, err: String },

    /// Returned when rendering a layout that wasn't loaded.
    UnknownTemplate { name: String },

    /// Returned when the output file can't be created or written.
    OutputWrite { path: PathBuf, err: io::Error },

    /// Returned when a layout fails while executing.
    Execute { name: String, err: String },
}

impl Error {
    /// Whether this error came from loading the templates.
    pub fn is_load(&self) -> bool {
        matches!(
            self,
            Error::ListTemplates { .. } | Error::OpenTemplateFile { .. } | Error::ParseTemplate { .. }
        )
    }
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ListTemplates { path, err } => {
                write!(f, "Listing template directory '{}': {}", path.display(), err)
            }
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate { path, err } => {
                write!(f, "Parsing template file '{}': {}", path.display(), err)
            }
            Error::UnknownTemplate { name } => {
                write!(f, "The template '{}' does not exist", name)
            }
            Error::OutputWrite { path, err } => {
                write!(f, "Writing '{}': {}", path.display(), err)
            }
            Error::Execute { name, err } => {
                write!(f, "Executing template '{}': {}", name, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ListTemplates { err, .. } => Some(err),
            Error::OpenTemplateFile { err, .. } => Some(err),
            Error::ParseTemplate { .. } => None,
            Error::UnknownTemplate { .. } => None,
            Error::OutputWrite { err, .. } => Some(err),
            Error::Execute { .. } => None,
        }
    }
}
