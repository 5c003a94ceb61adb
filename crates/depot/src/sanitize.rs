//! Upload filename sanitization.
//!
//! Browsers may send a bare name, a full client path (`C:\Users\me\a.txt`),
//! or something hostile (`../../etc/passwd`). Only the final component is
//! kept, and it is made safe to show in HTML and to echo back in a
//! `Content-Disposition` header.

/// Used when nothing survives sanitization.
pub const FALLBACK_NAME: &str = "file";

const NAME_MAX: usize = 255;

/// Sanitize a client-supplied filename.
///
/// - Keeps only the part after the last `/` or `\`
/// - Replaces control characters, whitespace and `"` with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots, spaces and underscores (no hidden files, no `..`)
/// - Limits length to 255 bytes, keeping the extension where possible
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    let mut prev_underscore = false;

    for c in base.chars() {
        let replacement = if c.is_control() || c.is_whitespace() || c == '"' {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    truncate_keeping_extension(trimmed, NAME_MAX)
}

fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() < max / 2 => (stem, Some(ext)),
        _ => (name, None),
    };

    let budget = match ext {
        Some(ext) => max - ext.len() - 1,
        None => max,
    };
    let mut take = budget.min(stem.len());
    while take > 0 && !stem.is_char_boundary(take) {
        take -= 1;
    }

    match ext {
        Some(ext) => format!("{}.{}", &stem[..take], ext),
        None => stem[..take].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(sanitize_filename("a.txt"), "a.txt");
        assert_eq!(sanitize_filename("Report-2024.PDF"), "Report-2024.PDF");
    }

    #[test]
    fn strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("dir/"), FALLBACK_NAME);
    }

    #[test]
    fn replaces_whitespace_and_controls() {
        assert_eq!(sanitize_filename("my  file.txt"), "my_file.txt");
        assert_eq!(sanitize_filename("file\x00name.txt"), "file_name.txt");
        assert_eq!(sanitize_filename("evil\r\nheader.txt"), "evil_header.txt");
        assert_eq!(sanitize_filename("say \"hi\".txt"), "say_hi_.txt");
    }

    #[test]
    fn trims_dots() {
        assert_eq!(sanitize_filename("  ..  file.txt  ..  "), "file.txt");
        assert_eq!(sanitize_filename(".bashrc"), "bashrc");
        assert_eq!(sanitize_filename(".."), FALLBACK_NAME);
        assert_eq!(sanitize_filename(""), FALLBACK_NAME);
    }

    #[test]
    fn keeps_unicode() {
        assert_eq!(sanitize_filename("résumé.pdf"), "résumé.pdf");
    }

    #[test]
    fn long_names_keep_extension() {
        let long = format!("{}.docx", "x".repeat(400));
        let out = sanitize_filename(&long);
        assert_eq!(out.len(), NAME_MAX);
        assert!(out.ends_with(".docx"));
    }

    #[test]
    fn long_multibyte_names_cut_on_char_boundary() {
        let long = "é".repeat(300);
        let out = sanitize_filename(&long);
        assert!(out.len() <= NAME_MAX);
        assert!(out.chars().all(|c| c == 'é'));
    }
}
