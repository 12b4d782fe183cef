use regex::Regex;
use std::sync::OnceLock;

fn star_emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("valid regex"))
}

fn underscore_emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_{1,2}([^_]+)_{1,2}").expect("valid regex"))
}

fn chapter_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Chapter \d+:?\s*").expect("valid regex"))
}

/// Prepares a raw story paragraph for synthesis: straightens typographic
/// quotes, strips markdown emphasis markers, drops chapter headings and
/// trims the result. Pure and idempotent; an all-markup paragraph cleans
/// to the empty string, which callers treat as "nothing to speak".
pub fn clean(raw: &str) -> String {
    let mut text: String = raw
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            c => c,
        })
        .collect();

    // Each pass unwraps one level of markup, so run to a fixpoint; doubled
    // markers like **bold** would otherwise survive a single pass, and a
    // removed heading can splice the surrounding text into a new one.
    loop {
        let pass = star_emphasis_re().replace_all(&text, "$1");
        let pass = underscore_emphasis_re().replace_all(&pass, "$1");
        let pass = chapter_heading_re().replace_all(&pass, "").into_owned();
        if pass == text {
            break;
        }
        text = pass;
    }

    text.trim().to_string()
}
