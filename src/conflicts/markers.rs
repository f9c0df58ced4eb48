use regex::Regex;
use std::sync::LazyLock;

/// One conflict hunk: `<<<<<<<` line, the first side (and any diff3 base
/// section), a bare `=======` line, the incoming side, then the `>>>>>>>` line.
/// Capture 1 is the incoming side.
static CONFLICT_HUNK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^<<<<<<<(?: [^\n]*)?\n.*?^=======\r?\n(.*?)^>>>>>>>(?: [^\n]*)?(?:\n|\z)")
        .expect("conflict hunk pattern is valid")
});

/// Two or more consecutive blank lines. Capture 1 is the line ending in use.
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\r?\n)(?:[ \t]*\r?\n){2,}").expect("blank run pattern is valid"));

static ANY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:<<<<<<<|=======\r?$|>>>>>>>)").expect("marker pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub hunks_removed: usize,
}

impl Resolution {
    pub fn changed(&self) -> bool {
        self.hunks_removed > 0
    }
}

/// Whether any line of `text` starts with a conflict marker
pub fn has_conflict_markers(text: &str) -> bool {
    ANY_MARKER.is_match(text)
}

/// Strip every well-formed conflict hunk, keeping the incoming side.
///
/// Text without hunks comes back untouched. When hunks were removed, blank-line
/// runs left behind collapse to a single blank line. Unpaired or nested markers
/// are left where the pattern does not match them.
pub fn resolve_conflict_markers(text: &str) -> Resolution {
    let hunks_removed = CONFLICT_HUNK.find_iter(text).count();
    if hunks_removed == 0 {
        return Resolution {
            text: text.to_string(),
            hunks_removed,
        };
    }

    let kept = CONFLICT_HUNK.replace_all(text, "${1}");
    let collapsed = BLANK_RUN.replace_all(&kept, "${1}${1}");

    Resolution {
        text: collapsed.into_owned(),
        hunks_removed,
    }
}
