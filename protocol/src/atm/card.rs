//! Card storage on the terminal side.
//!
//! Each user's card is a file `<user>.card` in the card directory. The first
//! line is the shared card secret the bank also holds. Inserting a card is
//! modelled as reading that file.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::CARD_FILE_EXTENSION;
use crate::message::is_valid_user;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("invalid user name for a card: {0:?}")]
    InvalidUser(String),

    #[error("could not read card {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("card {0} is empty")]
    Empty(PathBuf),
}

/// Looks up a user's card secret.
pub trait CardStore: Send + Sync {
    fn card_secret(&self, user: &str) -> Result<String, CardError>;
}

/// Cards as files in one directory.
#[derive(Debug, Clone)]
pub struct CardDirectory {
    dir: PathBuf,
}

impl CardDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `user`'s card. Refuses names that could escape the directory.
    pub fn card_path(&self, user: &str) -> Result<PathBuf, CardError> {
        if !is_valid_user(user) || user.starts_with('.') || user.contains(['/', '\\']) {
            return Err(CardError::InvalidUser(user.to_string()));
        }
        Ok(self.dir.join(format!("{user}.{CARD_FILE_EXTENSION}")))
    }

    /// Writes a card file holding `secret`.
    pub fn write_card(&self, user: &str, secret: &str) -> Result<PathBuf, CardError> {
        let path = self.card_path(user)?;
        std::fs::write(&path, format!("{secret}\n")).map_err(|source| CardError::Unreadable {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl CardStore for CardDirectory {
    fn card_secret(&self, user: &str) -> Result<String, CardError> {
        let path = self.card_path(user)?;
        let contents = std::fs::read_to_string(&path).map_err(|source| CardError::Unreadable {
            path: path.clone(),
            source,
        })?;
        match contents.lines().next().map(str::trim) {
            Some(secret) if !secret.is_empty() => Ok(secret.to_string()),
            _ => Err(CardError::Empty(path)),
        }
    }
}
