//! Module id path handling
//!
//! Module ids are plain strings so that custom resolvers can use any naming
//! scheme. These helpers treat `/` and `\` alike and always produce `/`.

use std::path::Path;

pub fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'/' | b'\\')
}

/// `./x` or `../x`
pub fn is_relative(path: &str) -> bool {
    path.starts_with("./") || path.starts_with("../") || path.starts_with(".\\") || path.starts_with("..\\")
}

pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub fn dirname(path: &str) -> String {
    match path.rfind(['/', '\\']) {
        None => ".".to_string(),
        Some(0) => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

/// Extension including the dot, or `""`.
pub fn extname(path: &str) -> &str {
    let name = basename(path);
    match name.rfind('.') {
        Some(index) if index + 1 < name.len() => &name[index..],
        _ => "",
    }
}

pub fn unixize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Resolve `path` against the directory `base`, normalizing `.` and `..`.
pub fn resolve_path(base: &str, path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let sources: Vec<&str> = if is_absolute(path) { vec![path] } else { vec![base, path] };

    for source in sources {
        for part in source.split(['/', '\\']) {
            match part {
                "." => {}
                "" if !parts.is_empty() => {}
                ".." => match parts.last() {
                    Some(&"") if parts.len() == 1 => {}
                    Some(&last) if last != ".." => {
                        parts.pop();
                    }
                    _ => parts.push(".."),
                },
                part => parts.push(part),
            }
        }
    }

    match parts.as_slice() {
        [] => ".".to_string(),
        [""] => "/".to_string(),
        _ => parts.join("/"),
    }
}

/// Path from the directory containing `from_file` to `to`.
pub fn relative_path(from_file: &str, to: &str) -> String {
    let mut from: Vec<&str> = from_file.split(['/', '\\']).collect();
    let mut to: Vec<&str> = to.split(['/', '\\']).collect();
    from.pop();

    while !from.is_empty() && !to.is_empty() && from[0] == to[0] {
        from.remove(0);
        to.remove(0);
    }

    let mut parts: Vec<&str> = from.iter().map(|_| "..").collect();
    parts.extend(to);
    parts.join("/")
}

/// The working directory as a module id.
pub fn current_dir() -> std::io::Result<String> {
    Ok(unixize(&std::env::current_dir()?.to_string_lossy()))
}

pub fn to_id(path: &Path) -> String {
    unixize(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_ids() {
        assert_eq!(resolve_path("/src/lib", "./a.js"), "/src/lib/a.js");
        assert_eq!(resolve_path("/src/lib", "../a.js"), "/src/a.js");
        assert_eq!(resolve_path("/src", "../../a.js"), "/a.js");
        assert_eq!(resolve_path("/src", "/abs/x.js"), "/abs/x.js");
        assert_eq!(resolve_path("src", "../../a.js"), "../a.js");
        assert_eq!(resolve_path("C:\\work", "./a.js"), "C:/work/a.js");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/out/bundle.js", "/src/a.js"), "../src/a.js");
        assert_eq!(relative_path("bundle.js", "src/a.js"), "src/a.js");
        assert_eq!(relative_path("/a/b/out.js", "/a/b/c.js"), "c.js");
    }

    #[test]
    fn test_path_parts() {
        assert_eq!(basename("/a/b/c.js"), "c.js");
        assert_eq!(dirname("/a/b/c.js"), "/a/b");
        assert_eq!(dirname("/c.js"), "/");
        assert_eq!(dirname("c.js"), ".");
        assert_eq!(extname("/a/b.min.js"), ".js");
        assert_eq!(extname("/a/b"), "");
        assert!(is_absolute("/x") && is_absolute("C:\\x") && !is_absolute("./x"));
        assert!(is_relative("./x") && is_relative("../x") && !is_relative("x"));
    }
}
