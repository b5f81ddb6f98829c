// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::InstanceDirError;

/// Shared handle onto the on-disk server instance directory the watchdog
/// registered itself in. Opening attaches to an existing directory; handles
/// never create or delete registry state, and dropping one only releases
/// the reference.
#[derive(Debug)]
pub struct InstanceDir {
    path: PathBuf,
}

impl InstanceDir {
    /// Attaches to the instance directory at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>, InstanceDirError> {
        let path = path.into();
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => Ok(Arc::new(Self { path })),
            Ok(_) => Err(InstanceDirError::Missing(path)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(InstanceDirError::Missing(path))
            }
            Err(source) => Err(InstanceDirError::Io { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves the generation subdirectory with the given index.
    pub fn generation(self: &Arc<Self>, index: u32) -> Result<Arc<Generation>, InstanceDirError> {
        let path = self.path.join(format!("generation-{index}"));
        if !path.is_dir() {
            return Err(InstanceDirError::MissingGeneration {
                dir: self.path.clone(),
                index,
            });
        }
        Ok(Arc::new(Generation {
            dir: Arc::clone(self),
            index,
            path,
        }))
    }
}

/// A single generation inside an instance directory. Keeps its parent
/// handle alive for as long as the generation is referenced.
#[derive(Debug)]
pub struct Generation {
    dir: Arc<InstanceDir>,
    index: u32,
    path: PathBuf,
}

impl Generation {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn instance_dir(&self) -> &InstanceDir {
        &self.dir
    }
}
