const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_NAME_CHARS: usize = 200;

/// Make a list title usable as a directory name on every platform.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = name
        .chars()
        .map(|ch| if INVALID_CHARS.contains(&ch) { '_' } else { ch })
        .collect::<String>();
    replaced
        .trim_matches(|ch| ch == '.' || ch == ' ')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Directory name for a list; falls back to the list id when the title
/// sanitizes to nothing.
pub fn list_dir_name(title: &str, list_id: &str) -> String {
    let name = sanitize_filename(title);
    if name.is_empty() {
        sanitize_filename(list_id)
    } else {
        name
    }
}
