// src/compose.rs
//! # Post composition
//!
//! Turns `(topic, fact, source)` into post text for the platform. Whatever the
//! writer returns, the final text satisfies the same shape:
//!
//! - body paragraphs separated by exactly one blank line,
//! - an optional hashtag paragraph,
//! - exactly one citation, last before the trailer: `Source: <url>`,
//! - the optional promotional trailer,
//! - at most `max_words` words in total.
//!
//! When the writer fails or returns nothing usable, a deterministic fallback
//! (`TOPIC`, fact, citation) is produced instead, so a post always exists.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::{PostRequest, PostWriter};
use crate::summarize::Fact;

pub const CITATION_LABEL: &str = "Source:";

/// Writing style of the post.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Standard,
    Conversational,
}

impl Tone {
    /// Suffix for the post file name; standard posts carry none.
    pub fn file_suffix(self) -> Option<&'static str> {
        match self {
            Tone::Standard => None,
            Tone::Conversational => Some("conversational"),
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Standard => f.write_str("standard"),
            Tone::Conversational => f.write_str("conversational"),
        }
    }
}

/// Final post text plus how it came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub text: String,
    pub tone: Tone,
    /// The deterministic fallback was used instead of generated text.
    pub used_fallback: bool,
    /// The generated text already carried the citation in the canonical form.
    pub citation_detected: bool,
}

impl PostDraft {
    pub fn word_count(&self) -> usize {
        count_words(&self.text)
    }
}

pub struct PostComposer {
    writer: Arc<dyn PostWriter>,
    max_words: usize,
    trailer: Option<String>,
}

impl PostComposer {
    pub fn new(writer: Arc<dyn PostWriter>, max_words: usize) -> Self {
        Self {
            writer,
            max_words,
            trailer: None,
        }
    }

    /// Promotional text appended after the citation.
    pub fn with_trailer(mut self, trailer: Option<String>) -> Self {
        self.trailer = trailer
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    pub async fn compose(
        &self,
        topic: &str,
        fact: &Fact,
        source_url: &str,
        tone: Tone,
    ) -> PostDraft {
        let request = PostRequest {
            topic: topic.to_string(),
            fact: fact.as_str().to_string(),
            source_url: source_url.to_string(),
            tone,
            max_words: self.max_words,
        };

        match self.writer.write_post(&request).await {
            Ok(raw) => {
                let formatted = format_post(
                    &raw,
                    topic,
                    source_url,
                    tone,
                    self.max_words,
                    self.trailer.as_deref(),
                );
                if let Some(post) = formatted {
                    if post.citation_detected {
                        debug!("writer already cited the source; not appending a second citation");
                    }
                    let draft = PostDraft {
                        text: post.text,
                        tone,
                        used_fallback: false,
                        citation_detected: post.citation_detected,
                    };
                    info!(%tone, words = draft.word_count(), "post composed");
                    return draft;
                }
                warn!(%tone, "generated post was empty after cleanup, using fallback");
            }
            Err(e) => {
                warn!(%tone, error = %e, "post generation failed, using fallback");
            }
        }

        PostDraft {
            text: fallback_post(
                topic,
                fact.as_str(),
                source_url,
                self.max_words,
                self.trailer.as_deref(),
            ),
            tone,
            used_fallback: true,
            citation_detected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPost {
    pub text: String,
    pub citation_detected: bool,
}

/// Clean generated text into the final post shape. `None` if no body survives.
pub fn format_post(
    raw: &str,
    topic: &str,
    source_url: &str,
    tone: Tone,
    max_words: usize,
    trailer: Option<&str>,
) -> Option<FormattedPost> {
    let text = raw.replace("\r\n", "\n");
    let (text, citation_detected) = extract_citation(&text, source_url);
    let text = flatten_links(&text);
    let text = strip_reference_markers(&text);
    let text = match tone {
        Tone::Standard => text,
        Tone::Conversational => strip_markdown(&text),
    };
    let text = remove_url(&text, source_url);

    let mut body = paragraphs(&text);
    let tags = if body.last().is_some_and(|p| is_hashtag_paragraph(p)) {
        body.pop()
    } else if body.iter().any(|p| p.split_whitespace().any(is_hashtag)) {
        None
    } else {
        Some(topic_hashtag(topic))
    };

    let text = assemble(body, tags, source_url, max_words, trailer)?;
    Some(FormattedPost {
        text,
        citation_detected,
    })
}

/// `TOPIC` + blank line + fact + blank line + citation (+ trailer).
pub fn fallback_post(
    topic: &str,
    fact: &str,
    source_url: &str,
    max_words: usize,
    trailer: Option<&str>,
) -> String {
    let heading = topic.trim().to_uppercase();
    let fact = tidy_line(&remove_url(fact, source_url));
    let mut body = vec![heading.clone()];
    if !fact.is_empty() {
        body.push(fact);
    }
    assemble(body, None, source_url, max_words, trailer)
        .unwrap_or_else(|| format!("{heading}\n\n{}", citation(source_url)))
}

pub fn citation(source_url: &str) -> String {
    format!("{CITATION_LABEL} {source_url}")
}

pub fn count_words(s: &str) -> usize {
    s.split_whitespace().count()
}

/// `"ocean life"` → `#OceanLife`.
pub fn topic_hashtag(topic: &str) -> String {
    let mut tag = String::from("#");
    for word in topic.split(|c: char| !c.is_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            tag.extend(first.to_uppercase());
            tag.push_str(chars.as_str());
        }
    }
    if tag.len() == 1 {
        tag.push_str("DailyKnowledge");
    }
    tag
}

fn assemble(
    body: Vec<String>,
    tags: Option<String>,
    source_url: &str,
    max_words: usize,
    trailer: Option<&str>,
) -> Option<String> {
    let citation = citation(source_url);
    let trailer = trailer.map(str::trim).filter(|t| !t.is_empty());
    let fixed = count_words(&citation) + trailer.map(count_words).unwrap_or(0);

    // Hashtags go first when the budget is too tight for body + tags.
    let tags = tags.filter(|t| fixed + count_words(t) < max_words);
    let reserved = fixed + tags.as_deref().map(count_words).unwrap_or(0);
    let body = fit_paragraphs(&body, max_words.saturating_sub(reserved));
    if body.is_empty() {
        return None;
    }

    let mut parts = body;
    parts.extend(tags);
    parts.push(citation);
    parts.extend(trailer.map(str::to_string));
    Some(parts.join("\n\n"))
}

/// Keep whole paragraphs while they fit; cut the first one that doesn't at a
/// word boundary and mark the cut.
fn fit_paragraphs(paras: &[String], budget: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut used = 0usize;
    for p in paras {
        let n = count_words(p);
        if used + n <= budget {
            out.push(p.clone());
            used += n;
            continue;
        }
        let room = budget - used;
        if room > 0 {
            let mut cut = p.split_whitespace().take(room).collect::<Vec<_>>().join(" ");
            cut.push('…');
            out.push(cut);
        }
        break;
    }
    out
}

/// Letters of a line once the URL and all decoration are gone, lower-cased.
fn label_residue(line: &str, url: Option<&Regex>) -> String {
    let without = match url {
        Some(re) => strip_token(line, re),
        None => line.to_string(),
    };
    without
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_label(residue: &str) -> bool {
    residue == "source" || residue == "sources"
}

/// Remove citation lines for `url`. Returns the remaining text and whether a
/// citation in the canonical `Source: <url>` form (same line or label line
/// followed by the URL) was present. Label matching ignores case and
/// decoration; the URL itself must match exactly.
fn extract_citation(text: &str, url: &str) -> (String, bool) {
    let Some(re) = url_token(url) else {
        return (text.to_string(), false);
    };
    let lines: Vec<&str> = text.lines().collect();
    let mut keep = vec![true; lines.len()];
    let mut detected = false;

    for i in 0..lines.len() {
        if !re.is_match(lines[i]) {
            continue;
        }
        let residue = label_residue(lines[i], Some(&re));
        if is_label(&residue) {
            keep[i] = false;
            detected = true;
        } else if residue.is_empty() {
            keep[i] = false;
            let prev = (0..i).rev().find(|&j| !lines[j].trim().is_empty());
            if let Some(j) = prev {
                if is_label(&label_residue(lines[j], None)) {
                    keep[j] = false;
                    detected = true;
                }
            }
        } else if residue.starts_with("source") {
            keep[i] = false;
        }
    }

    // Dangling label lines whose URL was elsewhere or missing.
    for (i, line) in lines.iter().enumerate() {
        if keep[i] && !line.trim().is_empty() && is_label(&label_residue(line, None)) {
            keep[i] = false;
        }
    }

    let out = lines
        .iter()
        .zip(keep)
        .filter_map(|(l, k)| k.then_some(*l))
        .collect::<Vec<_>>()
        .join("\n");
    (out, detected)
}

/// `url` as a whole token: bounded by whitespace, brackets, quotes or
/// trailing punctuation, so a longer URL sharing the prefix never matches.
fn url_token(url: &str) -> Option<Regex> {
    if url.is_empty() {
        return None;
    }
    Regex::new(&format!(
        r#"(^|[\s(<\[:"'])({})($|[\s)\]>.,;:!?"'])"#,
        regex::escape(url)
    ))
    .ok()
}

/// Repeat until stable: adjacent matches share a boundary character, and
/// a removal may splice a new occurrence together.
fn strip_token(text: &str, re: &Regex) -> String {
    let mut out = text.to_string();
    loop {
        let next = re.replace_all(&out, "${1}${3}").into_owned();
        if next == out {
            return out;
        }
        out = next;
    }
}

/// Drop every whole-token occurrence of `url`.
fn remove_url(text: &str, url: &str) -> String {
    static RE_EMPTY_WRAP: OnceCell<Regex> = OnceCell::new();
    let re_empty = RE_EMPTY_WRAP.get_or_init(|| Regex::new(r"\(\s*\)|<\s*>|\[\s*\]").unwrap());

    let Some(re) = url_token(url) else {
        return text.to_string();
    };
    re_empty.replace_all(&strip_token(text, &re), "").into_owned()
}

/// `[label](link)` → `label`.
fn flatten_links(text: &str) -> String {
    static RE_LINK: OnceCell<Regex> = OnceCell::new();
    let re = RE_LINK.get_or_init(|| Regex::new(r"\[([^\]\n]+)\]\((?:[^)\s]+)\)").unwrap());
    re.replace_all(text, "$1").into_owned()
}

/// `[1]`, `[12]`, `[X]` footnote artifacts.
fn strip_reference_markers(text: &str) -> String {
    static RE_REFS: OnceCell<Regex> = OnceCell::new();
    let re = RE_REFS.get_or_init(|| Regex::new(r"[ \t]*\[(?:\d+|[xX])\]").unwrap());
    re.replace_all(text, "").into_owned()
}

/// Emphasis, headings, and star bullets, for plain-text tone.
fn strip_markdown(text: &str) -> String {
    static RE_HEADING: OnceCell<Regex> = OnceCell::new();
    static RE_BULLET: OnceCell<Regex> = OnceCell::new();
    static RE_BOLD: OnceCell<Regex> = OnceCell::new();
    static RE_STAR: OnceCell<Regex> = OnceCell::new();
    static RE_UNDERSCORE: OnceCell<Regex> = OnceCell::new();

    let re_heading = RE_HEADING.get_or_init(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap());
    let re_bullet = RE_BULLET.get_or_init(|| Regex::new(r"(?m)^[ \t]*[*•][ \t]+").unwrap());
    let re_bold = RE_BOLD.get_or_init(|| Regex::new(r"(\*\*|__)(.+?)(\*\*|__)").unwrap());
    let re_star = RE_STAR.get_or_init(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
    let re_underscore =
        RE_UNDERSCORE.get_or_init(|| Regex::new(r"(^|[^\w])_([^_\n]+)_([^\w]|$)").unwrap());

    let out = re_heading.replace_all(text, "");
    let out = re_bullet.replace_all(&out, "- ");
    let out = re_bold.replace_all(&out, "$2");
    let out = re_star.replace_all(&out, "$1");
    let out = re_underscore.replace_all(&out, "$1$2$3");
    out.replace("**", "").replace("__", "")
}

fn tidy_line(line: &str) -> String {
    static RE_SPACES: OnceCell<Regex> = OnceCell::new();
    static RE_SPACE_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re_spaces = RE_SPACES.get_or_init(|| Regex::new(r"[ \t]{2,}").unwrap());
    let re_space_punct = RE_SPACE_PUNCT.get_or_init(|| Regex::new(r" +([.,!?;:])").unwrap());

    let out = re_spaces.replace_all(line.trim(), " ");
    re_space_punct.replace_all(&out, "$1").into_owned()
}

/// Group non-blank lines into paragraphs.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = tidy_line(line);
        if line.is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

fn is_hashtag(word: &str) -> bool {
    word.len() > 1 && word.starts_with('#') && !word.starts_with("##")
}

fn is_hashtag_paragraph(p: &str) -> bool {
    let mut words = p.split_whitespace().peekable();
    words.peek().is_some() && words.all(is_hashtag)
}
