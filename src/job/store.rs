use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// A movie that has already been posted. Only these three fields are persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostedMovie {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not write post state to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not encode post state {0}")]
    Encode(#[from] serde_json::Error),
}

/// Posted movies, persisted as a JSON array and rewritten whole on every append.
#[derive(Debug)]
pub struct PostStore {
    path: PathBuf,
    posted: Vec<PostedMovie>,
}

impl PostStore {
    /// Reads the store, starting over with an empty (and immediately persisted) list when the
    /// file is missing or unreadable.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let read: Result<Vec<PostedMovie>, String> = fs::read(&path)
            .map_err(|err| err.to_string())
            .and_then(|raw| serde_json::from_slice(&raw).map_err(|err| err.to_string()));

        match read {
            Ok(posted) => Ok(PostStore { path, posted }),
            Err(reason) => {
                warn!(path = %path.display(), %reason, "Starting with an empty post state");
                let store = PostStore {
                    path,
                    posted: vec![],
                };
                store.save()?;
                Ok(store)
            }
        }
    }

    pub fn contains(&self, movie: &PostedMovie) -> bool {
        self.posted.iter().any(|posted| posted == movie)
    }

    pub fn append(&mut self, movie: PostedMovie) -> Result<(), StoreError> {
        if self.contains(&movie) {
            return Ok(());
        }
        self.posted.push(movie);
        self.save()
    }

    pub fn len(&self) -> usize {
        self.posted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posted.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(&self.posted)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, encoded).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}
