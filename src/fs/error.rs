//! The projection layer's error taxonomy (§7), translated to errno exactly
//! once, at the `fuser::Filesystem` boundary.

use thiserror::Error;

use crate::catalog::CatalogError;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("read-only filesystem")]
    ReadOnly,
    #[error("i/o error: {0}")]
    Io(String),
}

impl FsError {
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Catalog(_) => libc::EIO,
            FsError::ReadOnly => libc::EROFS,
            FsError::Io(_) => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::ReadOnly.errno(), libc::EROFS);
        assert_eq!(
            FsError::Catalog(CatalogError::Request("x".into())).errno(),
            libc::EIO
        );
    }
}
