//! Escalating deletion ladder
//!
//! When a merge keeps failing after marker removal, lines matching an
//! expanding set of suspicious patterns are deleted, one level per retry.
//! Levels are cumulative: level `n` deletes everything levels `1..=n` match.
//! Nothing here checks that the remaining code still builds.

use regex::RegexSet;
use std::sync::LazyLock;

pub const MAX_LEVEL: u8 = 10;

#[derive(Debug, Clone, Copy)]
pub struct LadderLevel {
    pub level: u8,
    pub name: &'static str,
    patterns: &'static [&'static str],
}

pub const LEVELS: [LadderLevel; MAX_LEVEL as usize] = [
    LadderLevel {
        level: 1,
        name: "conflict-residue",
        patterns: &[r"^(<<<<<<<|>>>>>>>|\|\|\|\|\|\|\|)(\s.*)?$", r"^=======\s*$"],
    },
    LadderLevel {
        level: 2,
        name: "debug-output",
        patterns: &[
            r"^\s*console\.(log|debug|trace)\s*\(",
            r"^\s*debugger\s*;?\s*$",
            r"^\s*dbg!\s*\(",
            r"^\s*(Write-Debug|Write-Host)\b",
            r"^\s*(println|eprintln)!\s*\(\s*.DEBUG",
            r#"^\s*print\s*\(\s*["']DEBUG"#,
        ],
    },
    LadderLevel {
        level: 3,
        name: "todo-notes",
        patterns: &[r"^\s*(//|#|--|/\*|\*)\s*(TODO|FIXME|XXX|HACK)\b"],
    },
    LadderLevel {
        level: 4,
        name: "disabled-tests",
        patterns: &[
            r"^\s*#\[ignore(\s*=.*)?\]\s*$",
            r"^\s*@(Ignore|Disabled)\b",
            r"^\s*@pytest\.mark\.skip",
            r"^\s*x(it|describe|test)\s*\(",
            r"^\s*(it|describe|test)\.skip\s*\(",
        ],
    },
    LadderLevel {
        level: 5,
        name: "vcs-artifacts",
        patterns: &[
            r"^diff --git ",
            r"^index [0-9a-f]{7,}\.\.[0-9a-f]{7,}",
            r"^(\+\+\+|---) (a|b)/",
            r"^@@ -\d+(,\d+)? \+\d+(,\d+)? @@",
        ],
    },
    LadderLevel {
        level: 6,
        name: "empty-blocks",
        patterns: &[
            r"^\s*\{\s*\}\s*;?\s*$",
            r"^\s*(if|else|try|catch|finally|for|while)\b[^{]*\{\s*\}\s*$",
        ],
    },
    LadderLevel {
        level: 7,
        name: "commented-code",
        patterns: &[
            r"^\s*//.*[;{}]\s*$",
            r"^\s*#\s*(import|from|def|class|return|print)\b",
        ],
    },
    LadderLevel {
        level: 8,
        name: "debug-logging",
        patterns: &[
            r"^\s*(log|logger|logging|tracing)(::|\.)(debug|trace)\b",
            r"^\s*(debug|trace)!\s*\(",
        ],
    },
    LadderLevel {
        level: 9,
        name: "assertions",
        patterns: &[
            r"^\s*(debug_)?assert(_eq|_ne)?!\s*\(",
            r"^\s*console\.assert\s*\(",
            r"^\s*assert\s",
        ],
    },
    LadderLevel {
        level: 10,
        name: "blank-and-stray-lines",
        patterns: &[r"^\s*$", r"^\s*;\s*$"],
    },
];

/// One cumulative pattern set per level, index 0 = level 1
static LEVEL_SETS: LazyLock<Vec<RegexSet>> = LazyLock::new(|| {
    (1..=MAX_LEVEL)
        .map(|level| {
            let patterns = LEVELS
                .iter()
                .take(level as usize)
                .flat_map(|l| l.patterns.iter().copied());
            RegexSet::new(patterns).expect("ladder patterns are valid")
        })
        .collect()
});

pub fn level_name(level: u8) -> &'static str {
    LEVELS[(level.clamp(1, MAX_LEVEL) - 1) as usize].name
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderPass {
    pub level: u8,
    pub text: String,
    pub removed_lines: usize,
}

/// Delete every line of `text` matched at `level` (clamped to `1..=10`).
/// Kept lines keep their original line endings.
pub fn apply_level(text: &str, level: u8) -> LadderPass {
    let level = level.clamp(1, MAX_LEVEL);
    let set = &LEVEL_SETS[(level - 1) as usize];

    let mut out = String::with_capacity(text.len());
    let mut removed_lines = 0;
    for line in text.split_inclusive('\n') {
        if set.is_match(line.trim_end_matches(['\r', '\n'])) {
            removed_lines += 1;
        } else {
            out.push_str(line);
        }
    }

    LadderPass {
        level,
        text: out,
        removed_lines,
    }
}

/// Yields the level for each retry. Levels only ever go up, capped at
/// [`MAX_LEVEL`], and the schedule ends after `max_iterations` retries.
#[derive(Debug, Clone)]
pub struct EscalationSchedule {
    next: u8,
    remaining: u32,
    applied: Vec<u8>,
}

impl EscalationSchedule {
    pub fn new(start_level: u8, max_iterations: u32) -> Self {
        Self {
            next: start_level.clamp(1, MAX_LEVEL),
            remaining: max_iterations,
            applied: Vec::new(),
        }
    }

    /// Levels handed out so far, in order
    pub fn applied(&self) -> &[u8] {
        &self.applied
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl Iterator for EscalationSchedule {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let level = self.next;
        self.next = (self.next + 1).min(MAX_LEVEL);
        self.applied.push(level);
        Some(level)
    }
}
