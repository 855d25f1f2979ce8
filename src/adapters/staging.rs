//! Run directory plumbing. Every function takes explicit paths and never
//! touches the process working directory.

use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub const GRIB_LINK_PREFIX: &str = "GRIBFILE.";

pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copies the regular files (symlinks followed) of `src` into `dst`.
pub fn copy_regular_files(src: &Path, dst: &Path, skip: &[&str]) -> Result<usize> {
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if skip.iter().any(|s| name.to_str() == Some(*s)) || !entry.path().is_file() {
            continue;
        }
        fs::copy(entry.path(), dst.join(&name))?;
        copied += 1;
    }
    Ok(copied)
}

/// Points `link` at `target`, replacing whatever `link` was.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if fs::symlink_metadata(link).is_ok() {
        fs::remove_file(link)?;
    }
    symlink(target, link)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link)?;
    Ok(())
}

/// Removes every file in `dir` whose name starts with `prefix`.
pub fn remove_matching(dir: &Path, prefix: &str) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let matches = entry
            .file_name()
            .to_str()
            .map(|n| n.starts_with(prefix))
            .unwrap_or(false);
        if matches && !entry.file_type()?.is_dir() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Three-letter suffix `AAA`, `AAB`, ... for the `index`-th GRIB link.
pub fn grib_suffix(index: usize) -> String {
    let letter = |i: usize| char::from(b'A' + (i % 26) as u8);
    [letter(index / 676), letter(index / 26), letter(index)]
        .iter()
        .collect()
}

/// Links `files` into `dir` as `GRIBFILE.AAA`, `GRIBFILE.AAB`, ...
pub fn link_grib_files(dir: &Path, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            let link = dir.join(format!("{}{}", GRIB_LINK_PREFIX, grib_suffix(i)));
            replace_symlink(file, &link)?;
            Ok(link)
        })
        .collect()
}

/// Interpolation outputs (`met_em*.nc`) in name order.
pub fn met_em_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("met_em") && n.ends_with(".nc"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
