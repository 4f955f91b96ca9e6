use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;


/// Problems collected while rendering. None of them stops the render: the
/// failing include renders empty and the error is appended to the list.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("views directory not configured")]
    MissingViewsDirectory,

    #[error("invalid include file path `{target}`")]
    PathTraversal { target: String },

    #[error("include file name `{target}` contains illegal characters")]
    IllegalCharacters { target: String },

    #[error("view file `{}` not found", path.display())]
    FileNotFound { path: PathBuf },

    #[error("cannot read view file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("include of `{target}` nested deeper than {limit} levels")]
    IncludeTooDeep { target: String, limit: usize },

    #[error("html scheme `{name}` not found")]
    UnresolvedScheme { name: String },
}

impl RenderError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            RenderError::FileNotFound { path: path.to_owned() }
        } else {
            RenderError::Io { path: path.to_owned(), source }
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load schemes from `{}`: {source}", dir.display())]
    Schemes {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Syntax(#[from] serde_yaml::Error),
}
