use unicode_normalization::UnicodeNormalization;

/// Characters removed from anywhere in a line, on top of Unicode whitespace.
const INVISIBLE: &[char] = &['\u{200B}', '\u{200E}', '\u{200F}', '\u{FEFF}', '\u{00A0}', '\t'];

/// Characters stripped as a leading run.
const LEADING_MARKERS: &[char] = &['+', '@'];

/// Upper bound on canonical passes; real input settles after two.
const MAX_PASSES: usize = 4;

/// Turns a raw input line into its canonical identifier form.
///
/// Compatibility normalization (NFKC) runs first, so that code points it
/// maps onto whitespace or onto `+`/`@` are removed by the later passes.
/// Removing an invisible character can leave a base letter next to a
/// combining mark, so the pass is repeated until its output is stable.
/// The result may be empty; empty strings are rejected by the validator.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut current = canonical_pass(raw);
    for _ in 1..MAX_PASSES {
        let next = canonical_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn canonical_pass(input: &str) -> String {
    let composed: String = input.nfkc().collect();
    let visible: String = composed.chars().filter(|c| !is_stripped(*c)).collect();
    visible.trim_start_matches(LEADING_MARKERS).to_lowercase()
}

fn is_stripped(c: char) -> bool {
    c.is_whitespace() || INVISIBLE.contains(&c)
}

/// Splits a decoded record on universal line boundaries.
///
/// Records arrive split on `\n`; this also honours `\r`, vertical tab, form
/// feed, the ASCII separators, NEL and the Unicode line/paragraph separators.
pub fn logical_lines(record: &str) -> impl Iterator<Item = &str> {
    record.split(is_line_boundary)
}

fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0B}'
            | '\u{0C}'
            | '\u{1C}'
            | '\u{1D}'
            | '\u{1E}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}
