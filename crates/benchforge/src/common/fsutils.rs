use std::path::{Path, PathBuf};

/// Immediate subdirectory names of `base`, sorted.
pub fn subdirs(base: &Path) -> std::io::Result<Vec<String>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Collects `/`-joined relative paths of directories exactly `max_depth`
/// levels below `root`, skipping any subtree whose directory name equals
/// `skip`. Iterative with an explicit work list so a malformed tree cannot
/// blow the stack.
pub fn walk_to_depth(root: &Path, max_depth: usize, skip: &str) -> std::io::Result<Vec<String>> {
    let mut found = Vec::new();
    let mut work: Vec<(PathBuf, Vec<String>)> = vec![(root.to_path_buf(), Vec::new())];

    while let Some((dir, segments)) = work.pop() {
        for name in subdirs(&dir)? {
            if name == skip {
                continue;
            }
            let mut child_segments = segments.clone();
            child_segments.push(name.clone());
            if child_segments.len() == max_depth {
                found.push(child_segments.join("/"));
            } else {
                work.push((dir.join(&name), child_segments));
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Files in `dir` (non-recursive) whose name ends with `extension`, sorted.
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(extension))
            {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

#[cfg(test)]
mod test {
    use super::walk_to_depth;

    #[test]
    fn test_walk_to_depth() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sys/gcc/impi/gromacs/x86/2021")).unwrap();
        std::fs::create_dir_all(root.join("sys/gcc/impi/lammps/x86/2022")).unwrap();
        std::fs::create_dir_all(root.join("modulefiles/sys/gcc")).unwrap();
        std::fs::create_dir_all(root.join("sys/gcc/shallow")).unwrap();

        let found = walk_to_depth(root, 6, "modulefiles").unwrap();
        assert_eq!(
            found,
            vec![
                "sys/gcc/impi/gromacs/x86/2021".to_string(),
                "sys/gcc/impi/lammps/x86/2022".to_string(),
            ]
        );
    }
}
