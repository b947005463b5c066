//! Helpers for slash-separated store paths.

/// Joins a relative store path under a root prefix.
///
/// Empty segments collapse, so duplicate and trailing slashes are
/// tolerated in both inputs. The result is always absolute.
pub fn join_path(root: &str, rel: &str) -> String {
    let mut joined = String::with_capacity(root.len() + rel.len() + 2);
    joined.push('/');
    for segment in root.split('/').chain(rel.split('/')) {
        if segment.is_empty() {
            continue;
        }
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(segment);
    }
    joined
}
