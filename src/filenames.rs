const CLEANED_MARKER: &str = "_cleaned";
const CSV_EXTENSION: &str = ".csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderUnitName {
    pub code: String,
    pub name: String,
}

pub fn file_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() < suffix.len() || !s.is_char_boundary(s.len() - suffix.len()) {
        return None;
    }
    let (head, tail) = s.split_at(s.len() - suffix.len());
    if tail.eq_ignore_ascii_case(suffix) {
        Some(head)
    } else {
        None
    }
}

fn folder_stem(file_name: &str) -> &str {
    strip_suffix_ignore_case(file_name, CSV_EXTENSION).unwrap_or(file_name)
}

pub fn has_cleaned_marker(file_name: &str) -> bool {
    strip_suffix_ignore_case(folder_stem(file_name), CLEANED_MARKER).is_some()
}

pub fn parse_folder_file_name(file_name: &str) -> Option<FolderUnitName> {
    let base = strip_suffix_ignore_case(folder_stem(file_name), CLEANED_MARKER)?;
    let mut tokens = base.split('_');
    let code = tokens.next()?.trim();
    if code.is_empty() {
        return None;
    }
    let name = tokens
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        return None;
    }
    Some(FolderUnitName {
        code: code.to_string(),
        name,
    })
}

fn leading_digits(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

/// Extracts the roster position encoded in an image file name.
///
/// With a `-`, the token is the numeric prefix of the segment after the
/// first `-`, extension removed. Without one, the whole stem must be
/// numeric. Zero is never a valid position.
pub fn parse_media_ref_index(file_name: &str) -> Option<i64> {
    let token = if file_name.contains('-') {
        let segment = file_name.split('-').nth(1)?;
        let segment = segment.split('.').next().unwrap_or("");
        leading_digits(segment)
    } else {
        file_name.split('.').next().unwrap_or("")
    };
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match token.parse::<i64>() {
        Ok(v) if v >= 1 => Some(v),
        _ => None,
    }
}
