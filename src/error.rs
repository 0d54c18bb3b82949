use std::path::PathBuf;

/// Errors raised while locating, rewriting or assembling a traced function.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid option `{key}`: {reason}")]
    Config { key: String, reason: String },

    #[error("source for `{name}` is unavailable{hint}")]
    SourceUnavailable { name: String, hint: String },

    #[error("no line starting with `fn` found in the source of `{name}`")]
    DefinitionNotFound { name: String },

    #[error("`{name}` is defined in more than one file: {}", paths.join(", "))]
    AmbiguousTarget { name: String, paths: Vec<String> },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("synthesized statement `{template}` is not valid Rust: {source}")]
    TreeMutation {
        template: String,
        #[source]
        source: syn::Error,
    },

    #[error("instrumented `{name}` failed to compile: {source}")]
    Compile {
        name: String,
        #[source]
        source: syn::Error,
    },

    #[error("cannot trace `{name}`: {reason}")]
    Unsupported { name: String, reason: String },

    #[error("rewrite cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
