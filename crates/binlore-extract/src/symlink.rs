//! Symlink sanitization: extracted trees must not smuggle a path out of
//! their own directory.

use std::path::{Path, PathBuf};

/// Replace every symlink in `files` whose resolved target escapes
/// `extraction_dir` with a link to the null device. Warns once per link
/// replaced; never fails the extraction.
pub fn sanitize(files: &[PathBuf], extraction_dir: &Path) {
    let root = match extraction_dir.canonicalize() {
        Ok(p) => p,
        Err(_) => return,
    };
    for file in files {
        if !file.is_symlink() {
            continue;
        }
        let target = match file.canonicalize() {
            Ok(p) => p,
            // A dangling symlink can't be canonicalized; treat it as
            // escaping (fail closed) rather than leaving it unexamined.
            Err(_) => {
                replace_with_devnull(file);
                continue;
            }
        };
        let devnull = Path::new(devnull_path());
        if target.starts_with(&root) || target == devnull {
            continue;
        }
        tracing::warn!(
            link = %file.display(),
            target = %target.display(),
            "symlink escapes extraction directory; redirecting to the null device"
        );
        replace_with_devnull(file);
    }
}

#[cfg(unix)]
fn devnull_path() -> &'static str {
    "/dev/null"
}

#[cfg(not(unix))]
fn devnull_path() -> &'static str {
    "NUL"
}

fn replace_with_devnull(link: &Path) {
    if std::fs::remove_file(link).is_err() {
        return;
    }
    #[cfg(unix)]
    let _ = std::os::unix::fs::symlink(devnull_path(), link);
    #[cfg(not(unix))]
    let _ = std::os::windows::fs::symlink_file(devnull_path(), link);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn escaping_symlink_is_redirected_to_devnull() {
        let dir = tempfile::tempdir().unwrap();
        let extraction_dir = dir.path().join("out.extracted");
        std::fs::create_dir(&extraction_dir).unwrap();
        let outside = dir.path().join("secret");
        std::fs::write(&outside, b"x").unwrap();
        let link = extraction_dir.join("escape");
        symlink(&outside, &link).unwrap();

        sanitize(&[link.clone()], &extraction_dir);

        let resolved = link.canonicalize().unwrap();
        assert_eq!(resolved, PathBuf::from("/dev/null"));
    }

    #[test]
    fn internal_symlink_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let extraction_dir = dir.path().join("out.extracted");
        std::fs::create_dir(&extraction_dir).unwrap();
        let target = extraction_dir.join("real.txt");
        std::fs::write(&target, b"x").unwrap();
        let link = extraction_dir.join("README_link");
        symlink(&target, &link).unwrap();

        sanitize(&[link.clone()], &extraction_dir);

        assert_eq!(link.canonicalize().unwrap(), target.canonicalize().unwrap());
    }
}
