//! Track-name sanitizing: file paths, player-internal handles and free text
//! come in, a safe per-track file identifier comes out.

use once_cell::sync::Lazy;
use regex::Regex;

static URI_SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap());

/// Normalize a raw track-name candidate into a safe identifier.
///
/// Returns `None` when the input is empty, carries a URI scheme (a raw
/// `content://` or `https://` handle is not a track name), or reduces to
/// nothing after stripping. The result only ever contains characters from
/// `[A-Za-z0-9._-]`, and feeding the output back in returns it unchanged.
pub fn sanitize(raw: &str) -> Option<String> {
    if raw.is_empty() || URI_SCHEME_RE.is_match(raw) {
        return None;
    }

    // Drop any path prefix, accepting both separator conventions.
    let name = match raw.rfind(['/', '\\']) {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    };

    // Drop the extension by truncating at the first dot after the leading
    // character. One pass of this is its own fixed point, so re-sanitizing
    // a stored name cannot eat it one suffix at a time.
    let name = match name.char_indices().find(|&(i, c)| i > 0 && c == '.') {
        Some((idx, _)) => &name[..idx],
        None => name,
    };

    // Trim before replacing, so edge whitespace disappears instead of
    // turning into underscores.
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_path_and_extension() {
        assert_eq!(
            sanitize("/sdcard/Music/My Song.mp3").as_deref(),
            Some("My_Song")
        );
        assert_eq!(sanitize("C:\\Music\\track.flac").as_deref(), Some("track"));
        assert_eq!(sanitize("plain name").as_deref(), Some("plain_name"));
    }

    #[test]
    fn rejects_uri_handles() {
        assert_eq!(sanitize("content://media/external/audio/123"), None);
        assert_eq!(sanitize("https://example.com/stream.mp3"), None);
        assert_eq!(sanitize("file:///home/u/song.ogg"), None);
    }

    #[test]
    fn rejects_empty_and_all_whitespace() {
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("   "), None);
        // A bare directory prefix leaves nothing behind.
        assert_eq!(sanitize("/music/"), None);
    }

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(
            sanitize("My Song (Live!)").as_deref(),
            Some("My_Song__Live__")
        );
        assert_eq!(sanitize("a:b*c?d").as_deref(), Some("a_b_c_d"));
    }

    #[test]
    fn first_dot_truncation_is_a_fixed_point() {
        assert_eq!(sanitize("Back.In.Black.mp3").as_deref(), Some("Back"));
        // Leading dots are not extension separators.
        assert_eq!(sanitize(".hidden").as_deref(), Some(".hidden"));
    }

    #[test]
    fn idempotent_on_its_own_output() {
        for raw in [
            "/sdcard/Music/01 - My Song.mp3",
            "Track (feat. Someone).flac",
            "weird  name \t.ogg",
            ".dotfile",
            "!!!",
        ] {
            let once = sanitize(raw).unwrap();
            assert_eq!(sanitize(&once).as_deref(), Some(once.as_str()), "raw = {raw:?}");
        }
    }

    #[test]
    fn output_stays_inside_the_safe_alphabet() {
        for raw in ["/a/b/c d.mp3", "x y z", "Ünïcødé Søng.opus", "tab\tname"] {
            let out = sanitize(raw).unwrap();
            assert!(
                out.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
                "unsafe character in {out:?}"
            );
        }
    }
}
