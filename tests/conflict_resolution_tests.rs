//! Property tests for marker stripping and the deletion ladder

use pr_sweep::conflicts::{
    apply_level, has_conflict_markers, resolve_conflict_markers, EscalationSchedule, MAX_LEVEL,
};
use proptest::prelude::*;

/// Lines that can never be mistaken for a conflict marker
fn plain_line() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9 ;(){}.]{0,24}"
}

#[derive(Debug, Clone)]
enum Chunk {
    Plain(Vec<String>),
    Hunk { ours: Vec<String>, theirs: Vec<String> },
}

fn chunk() -> impl Strategy<Value = Chunk> {
    prop_oneof![
        prop::collection::vec(plain_line(), 0..4).prop_map(Chunk::Plain),
        (
            prop::collection::vec(plain_line(), 0..4),
            prop::collection::vec(plain_line(), 0..4)
        )
            .prop_map(|(ours, theirs)| Chunk::Hunk { ours, theirs }),
    ]
}

fn render(chunks: &[Chunk]) -> (String, usize) {
    let mut text = String::new();
    let mut hunks = 0;
    for chunk in chunks {
        match chunk {
            Chunk::Plain(lines) => {
                for line in lines {
                    text.push_str(line);
                    text.push('\n');
                }
            }
            Chunk::Hunk { ours, theirs } => {
                hunks += 1;
                text.push_str("<<<<<<< HEAD\n");
                for line in ours {
                    text.push_str(line);
                    text.push('\n');
                }
                text.push_str("=======\n");
                for line in theirs {
                    text.push_str(line);
                    text.push('\n');
                }
                text.push_str(">>>>>>> origin/main\n");
            }
        }
    }
    (text, hunks)
}

proptest! {
    #[test]
    fn stripping_leaves_no_markers(chunks in prop::collection::vec(chunk(), 0..8)) {
        let (text, hunks) = render(&chunks);
        let resolution = resolve_conflict_markers(&text);
        prop_assert_eq!(resolution.hunks_removed, hunks);
        prop_assert!(!has_conflict_markers(&resolution.text));
    }

    #[test]
    fn stripping_twice_changes_nothing(chunks in prop::collection::vec(chunk(), 0..8)) {
        let (text, _) = render(&chunks);
        let once = resolve_conflict_markers(&text);
        let twice = resolve_conflict_markers(&once.text);
        prop_assert_eq!(twice.hunks_removed, 0);
        prop_assert_eq!(once.text, twice.text);
    }

    #[test]
    fn incoming_lines_survive(chunks in prop::collection::vec(chunk(), 1..6)) {
        let (text, _) = render(&chunks);
        let resolved = resolve_conflict_markers(&text).text;
        for chunk in &chunks {
            if let Chunk::Hunk { theirs, .. } = chunk {
                for line in theirs {
                    prop_assert!(resolved.contains(line.as_str()));
                }
            }
        }
    }

    #[test]
    fn higher_levels_never_keep_more(lines in prop::collection::vec(
        prop_oneof![
            plain_line(),
            Just("// TODO: tidy".to_string()),
            Just("    console.log(x);".to_string()),
            Just("#[ignore]".to_string()),
            Just("    assert_eq!(a, b);".to_string()),
            Just(String::new()),
            Just("=======".to_string()),
        ],
        0..30,
    )) {
        let text = lines.join("\n");
        let mut previous = text.len();
        for level in 1..=MAX_LEVEL {
            let pass = apply_level(&text, level);
            prop_assert!(pass.text.len() <= previous);
            previous = pass.text.len();

            let again = apply_level(&pass.text, level);
            prop_assert_eq!(again.removed_lines, 0);
        }
    }

    #[test]
    fn schedule_is_monotonic_and_capped(start in 1u8..=MAX_LEVEL, iterations in 0u32..25) {
        let levels: Vec<u8> = EscalationSchedule::new(start, iterations).collect();
        prop_assert_eq!(levels.len(), iterations as usize);
        prop_assert!(levels.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(levels.iter().all(|&l| (start..=MAX_LEVEL).contains(&l)));
    }
}

#[test]
fn test_ladder_levels_escalate_on_a_realistic_file() {
    let source = "\
fn total(items: &[u32]) -> u32 {
    // TODO: overflow
    dbg!(items.len());
    let sum = items.iter().sum();
    debug_assert!(sum >= 0);
    sum
}
";
    let level_two = apply_level(source, 2);
    assert!(!level_two.text.contains("dbg!"));
    assert!(level_two.text.contains("TODO"));

    let level_three = apply_level(source, 3);
    assert!(!level_three.text.contains("TODO"));
    assert!(level_three.text.contains("debug_assert!"));

    let level_nine = apply_level(source, 9);
    assert!(!level_nine.text.contains("debug_assert!"));
    assert!(level_nine.text.contains("let sum"));
}
