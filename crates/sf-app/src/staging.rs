//! Filesystem helpers for moving inputs and outputs between the experiment
//! directory and a solver tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Recursively copy `src` into `dst`, skipping any entry whose path relative
/// to `src` is listed in `exclude`.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[&Path]) -> io::Result<()> {
    copy_tree_inner(src, dst, Path::new(""), exclude)
}

fn copy_tree_inner(src: &Path, dst: &Path, rel: &Path, exclude: &[&Path]) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let rel_child = rel.join(entry.file_name());
        if exclude.iter().any(|x| *x == rel_child.as_path()) {
            continue;
        }
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree_inner(&entry.path(), &target, &rel_child, exclude)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copy the contents of `src` (not `src` itself) into `dst`.
pub fn copy_dir_contents(src: &Path, dst: &Path) -> io::Result<()> {
    copy_tree(src, dst, &[])
}

/// Remove everything inside `dir`, keeping `dir` and any entry named in
/// `keep`. Missing `dir` is not an error.
pub fn clear_dir(dir: &Path, keep: &[&str]) -> io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if keep.iter().any(|k| entry.file_name() == *k) {
            continue;
        }
        remove_path(&entry.path())?;
    }
    Ok(())
}

/// Remove a file or directory tree if it exists.
pub fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Copy each of `files` into `dst_dir`, keeping file names.
pub fn copy_files_into(files: &[PathBuf], dst_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dst_dir)?;
    for file in files {
        if let Some(name) = file.file_name() {
            fs::copy(file, dst_dir.join(name))?;
        }
    }
    Ok(())
}
