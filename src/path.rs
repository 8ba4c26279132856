//! Path resolution.
//!
//! Paths are '/'-separated. A path is walked from the root when it starts with '/' or when the
//! current directory is the root, and from the current directory otherwise. A leading "./",
//! empty components and "." components are ignored; ".." moves to the parent directory.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::debug;

use crate::config::*;
use crate::directory::{dir_lookup, dir_name, parent_of};
use crate::{BlockDevice, CurrentDir, DirEntry, Error, Result};

/// An existing entry found by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    pub slot: usize,
    pub entry: DirEntry,
}

/// Outcome of resolving a path to its containing directory and final component.
///
/// Whether the containing directory exists and whether the final entry exists are reported
/// separately, so each operation applies its own existence policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Deepest containing directory reached.
    pub dir_block: u32,
    pub dir_name: String,
    /// False if some directory on the way does not exist.
    pub dir_found: bool,
    /// Final component, empty if the path names its starting directory (e.g. "/" or ".").
    pub name: String,
    pub entry: Option<EntryRef>,
}

impl Resolution {
    /// Fails with `PathNotFound` unless the containing directory exists.
    pub fn require_dir(self) -> Result<Self> {
        if !self.dir_found {
            return Err(Error::PathNotFound);
        }
        Ok(self)
    }

    pub fn names_start_dir(&self) -> bool {
        self.name.is_empty()
    }
}

/// Splits a path into its meaningful components.
/// Returns whether the path is absolute, and the components.
pub fn split(path: &str) -> Result<(bool, Vec<&str>)> {
    if path.is_empty() {
        return Err(Error::PathNotFound);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(Error::NameTooLong);
    }
    let path = path.strip_prefix("./").unwrap_or(path);
    let absolute = path.starts_with('/');
    let components = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != DOT_NAME)
        .collect();
    Ok((absolute, components))
}

fn start_block(absolute: bool, cwd: &CurrentDir) -> u32 {
    if absolute || cwd.is_root() {
        ROOT_DIR_BLOCK
    } else {
        cwd.block()
    }
}

/// Moves from the directory at `dir_block` through `component`.
/// Returns `None` if no entry with that name exists.
fn step(device: &impl BlockDevice, dir_block: u32, component: &str) -> Result<Option<u32>> {
    if component == DOTDOT_NAME {
        if dir_block == ROOT_DIR_BLOCK {
            return Err(Error::CannotAscendAboveRoot);
        }
        return Ok(Some(parent_of(device, dir_block)?));
    }
    match dir_lookup(device, dir_block, component.as_bytes()) {
        Ok((_, entry)) if entry.is_dir => Ok(Some(entry.first_block)),
        Ok(_) => Err(Error::NotADirectory),
        Err(Error::EntryNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolves the containing directory of `path` and looks up its final component.
pub fn resolve(device: &impl BlockDevice, cwd: &CurrentDir, path: &str) -> Result<Resolution> {
    let (absolute, components) = split(path)?;
    let mut current = start_block(absolute, cwd);

    let Some((last, parents)) = components.split_last() else {
        return Ok(Resolution {
            dir_block: current,
            dir_name: dir_name(device, current)?,
            dir_found: true,
            name: String::new(),
            entry: None,
        });
    };

    let mut dir_found = true;
    for component in parents {
        match step(device, current, component)? {
            Some(next) => current = next,
            None => {
                debug!("[resolve] {}: directory {} not found", path, component);
                dir_found = false;
                break;
            }
        }
    }

    let entry = if dir_found {
        match dir_lookup(device, current, last.as_bytes()) {
            Ok((slot, entry)) => Some(EntryRef { slot, entry }),
            Err(Error::EntryNotFound) => None,
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    Ok(Resolution {
        dir_block: current,
        dir_name: dir_name(device, current)?,
        dir_found,
        name: last.to_string(),
        entry,
    })
}

/// Resolves a path that must name a directory, every component included.
/// Returns the directory's block.
pub fn resolve_dir(device: &impl BlockDevice, cwd: &CurrentDir, path: &str) -> Result<u32> {
    let (absolute, components) = split(path)?;
    let mut current = start_block(absolute, cwd);
    for (i, component) in components.iter().enumerate() {
        current = match step(device, current, component)? {
            Some(next) => next,
            None if i == components.len() - 1 => return Err(Error::EntryNotFound),
            None => return Err(Error::PathNotFound),
        };
    }
    Ok(current)
}
