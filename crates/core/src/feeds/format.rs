//! Assistant reply formatting.
//!
//! [`format_reply`] renders the full raw text accumulated so far into HTML.
//! It is recomputed from scratch on every fragment, never patched, so markup
//! that only closes later (a code fence, a bold run) is picked up as soon as
//! its closing marker arrives.
//!
//! Raw text is escaped before any markup is inserted. Fenced code blocks are
//! cut out first and highlighted token by token; the remaining passes only
//! ever see prose.

use std::sync::LazyLock;

use regex::{Captures, Regex};

#[expect(clippy::expect_used)]
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(\w*)\n?(.*?)```").expect("valid fence regex"));

#[expect(clippy::expect_used)]
static CODE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<comment>(?:#|//)[^\n]*)",
        r#"|(?P<string>"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*')"#,
        r"|(?P<ip>\b\d{1,3}(?:\.\d{1,3}){3}\b)",
        r"|(?P<number>\b\d+(?:\.\d+)?\b)",
        r"|(?P<flag>--?[A-Za-z][A-Za-z0-9-]*)",
        r"|(?P<keyword>\b(?:if|else|for|while|return|function|def|class|import|from|try|except|catch|const|let|var|async|await|sudo|echo|cat|grep|awk|sed)\b)",
    ))
    .expect("valid code token regex")
});

#[expect(clippy::expect_used)]
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid inline code regex"));
#[expect(clippy::expect_used)]
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
#[expect(clippy::expect_used)]
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid italic regex"));
#[expect(clippy::expect_used)]
static COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Command:\s*(.+)").expect("valid command regex"));
#[expect(clippy::expect_used)]
static PRODUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(X-AI|X-Recon)").expect("valid product regex"));
#[expect(clippy::expect_used)]
static TOOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(nmap|nikto|dirb|gobuster|hydra|sqlmap|burp|metasploit|wireshark)\b")
        .expect("valid tool regex")
});
#[expect(clippy::expect_used)]
static CVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(CVE-\d{4}-\d+)\b").expect("valid CVE regex"));
#[expect(clippy::expect_used)]
static SEVERITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(critical|high|medium|low)\s+(severity|risk|vulnerability)?\b")
        .expect("valid severity regex")
});
#[expect(clippy::expect_used)]
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?://[^\s<]+)").expect("valid URL regex"));
#[expect(clippy::expect_used)]
static LIST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\d+\.\s)").expect("valid list regex"));

/// Escape text for inclusion in HTML body or attribute content.
///
/// Entities are named, never numeric, so later digit-matching passes cannot
/// reach inside them.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Render accumulated assistant text to HTML.
pub fn format_reply(raw: &str) -> String {
    let mut html = String::with_capacity(raw.len().saturating_mul(2));
    let mut last = 0;
    for fence in FENCE.captures_iter(raw) {
        let Some(whole) = fence.get(0) else {
            continue;
        };
        html.push_str(&format_prose(raw.get(last..whole.start()).unwrap_or_default()));
        let lang = fence.get(1).map_or("", |m| m.as_str());
        let code = fence.get(2).map_or("", |m| m.as_str());
        html.push_str(&code_block(lang, code));
        last = whole.end();
    }
    html.push_str(&format_prose(raw.get(last..).unwrap_or_default()));
    html
}

/// Highlight a code snippet in a single left-to-right pass.
pub fn highlight_code(code: &str) -> String {
    let mut out = String::with_capacity(code.len().saturating_mul(2));
    let mut last = 0;
    for token in CODE_TOKEN.captures_iter(code) {
        let Some(whole) = token.get(0) else {
            continue;
        };
        let Some(class) = token_class(&token, code, whole.start()) else {
            continue;
        };
        out.push_str(&escape_html(code.get(last..whole.start()).unwrap_or_default()));
        out.push_str(&format!(
            r#"<span class="syn-{class}">{}</span>"#,
            escape_html(whole.as_str())
        ));
        last = whole.end();
    }
    out.push_str(&escape_html(code.get(last..).unwrap_or_default()));
    out
}

fn token_class(token: &Captures<'_>, code: &str, start: usize) -> Option<&'static str> {
    const CLASSES: [&str; 5] = ["comment", "string", "ip", "number", "keyword"];
    if token.name("flag").is_some() {
        // Flags count only as whole words: `-p`, not the dash in `x-recon`.
        let preceded_by_space = code
            .get(..start)
            .and_then(|before| before.chars().next_back())
            .is_none_or(char::is_whitespace);
        return preceded_by_space.then_some("flag");
    }
    CLASSES.into_iter().find(|class| token.name(class).is_some())
}

fn code_block(lang: &str, code: &str) -> String {
    let label = if lang.is_empty() { "code" } else { lang };
    format!(
        r#"<div class="code-wrapper"><div class="code-lang">{}</div><pre class="code-block">{}</pre></div>"#,
        escape_html(label),
        highlight_code(code)
    )
}

fn format_prose(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let escaped = escape_html(raw);

    // Links are cut out first so term highlighting never lands inside a URL.
    let mut html = String::with_capacity(escaped.len().saturating_mul(2));
    let mut last = 0;
    for url in URL.find_iter(&escaped) {
        html.push_str(&decorate(escaped.get(last..url.start()).unwrap_or_default()));
        html.push_str(&format!(
            r#"<a href="{0}" target="_blank" class="hl-link">{0}</a>"#,
            url.as_str()
        ));
        last = url.end();
    }
    html.push_str(&decorate(escaped.get(last..).unwrap_or_default()));

    LIST_NUMBER
        .replace_all(&html, r#"<span class="list-num">$1</span>"#)
        .replace('\n', "<br>")
}

fn decorate(text: &str) -> String {
    let html = INLINE_CODE.replace_all(text, r#"<code class="inline-code">$1</code>"#);
    let html = BOLD.replace_all(&html, "<strong>$1</strong>");
    let html = ITALIC.replace_all(&html, "<em>$1</em>");
    let html = COMMAND.replace_all(
        &html,
        r#"<div class="cmd-box"><span class="cmd-prefix">$$</span> <span class="cmd-text">$1</span></div>"#,
    );
    let html = PRODUCT.replace_all(&html, r#"<span class="hl-name">$1</span>"#);
    let html = TOOL.replace_all(&html, r#"<span class="hl-tool">$1</span>"#);
    let html = CVE.replace_all(&html, r#"<span class="hl-cve">$1</span>"#);
    SEVERITY
        .replace_all(&html, |caps: &Captures<'_>| {
            let level = caps.get(1).map_or("", |m| m.as_str());
            let noun = caps.get(2).map_or("", |m| m.as_str());
            format!(
                r#"<span class="hl-severity hl-{}">{level} {noun}</span>"#,
                level.to_lowercase()
            )
        })
        .into_owned()
}
