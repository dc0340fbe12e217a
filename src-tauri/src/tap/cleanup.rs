use std::sync::OnceLock;
use regex::Regex;

static RECEIPTS: OnceLock<Regex> = OnceLock::new();
static TIMESTAMPS: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn receipts() -> &'static Regex {
    RECEIPTS.get_or_init(|| Regex::new(r"[✓✔]{1,2}").expect("valid receipt pattern"))
}

fn timestamps() -> &'static Regex {
    TIMESTAMPS.get_or_init(|| {
        Regex::new(r"[0-9]{1,2}:[0-9]{2}(\s?(AM|PM))?").expect("valid timestamp pattern")
    })
}

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn clean_once(text: &str) -> String {
    let text = receipts().replace_all(text, "");
    let text = text.replace('\u{00A0}', " ");
    let text = timestamps().replace_all(&text, "");
    whitespace().replace_all(&text, " ").trim().to_string()
}

/// Strips WhatsApp chrome (read receipts, timestamps, nbsp) from rendered
/// message text and collapses whitespace.
///
/// Removing a timestamp can splice its neighbours into a new one
/// (`"1:2:3456"` -> `"1:56"`), so the rules run until nothing changes.
pub fn clean_message_text(text: &str) -> String {
    let mut current = clean_once(text);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
