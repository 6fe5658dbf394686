//! Formatting in both directions.
//!
//! Messaging to microblog: [`ThreadFormatter`] splits text into numbered fragments
//! that fit the platform's length limit, and [`post_thread`] posts them as a reply chain.
//!
//! Microblog to messaging: [`format_status`] strips hashtags and appends links.

use crate::{
    microblog::{Microblog, MicroblogError},
    status::Status,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Appended to every fragment of a thread but the last
pub const ELLIPSIS: &str = "…";

const STATUS_URL_PREFIX: &str = "https://twitter.com/i/web/status/";

/// One piece of a thread, in posting order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TweetFragment {
    /// The text to post, with all decoration
    pub text: String,
    /// Zero-based position in the thread
    pub position: usize,
    /// Number of fragments in the thread
    pub total: usize,
}

/// Splits outbound text into fragments of bounded length
#[derive(Clone, Debug)]
pub struct ThreadFormatter {
    max_length: usize,
    padding: usize,
    hashtag_block: String,
}

impl ThreadFormatter {
    /// `hashtags` may be given with or without the leading `#`
    pub fn new<S: AsRef<str>>(max_length: usize, padding: usize, hashtags: &[S]) -> Self {
        let hashtag_block = hashtags
            .iter()
            .map(|tag| tag.as_ref().trim())
            .filter(|tag| !tag.is_empty())
            .map(|tag| {
                if tag.starts_with('#') {
                    tag.to_owned()
                } else {
                    format!("#{tag}")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            max_length,
            padding,
            hashtag_block,
        }
    }

    /// The hashtags appended to the first fragment
    pub fn hashtag_block(&self) -> &str {
        &self.hashtag_block
    }

    /// Split `text` into a thread. The first fragment is prefixed with `stamp`, if given,
    /// and carries the hashtag block.
    ///
    /// Text short enough to fit is returned as a single fragment without numbering.
    /// Otherwise words are packed greedily, every fragment gets an ` i/n` suffix and all
    /// but the last an ellipsis, and each fragment fits in `max_length - padding`.
    /// A single word longer than that is never broken and overflows.
    pub fn format(&self, text: &str, stamp: Option<&str>) -> Vec<TweetFragment> {
        let prefix = stamp.map(|s| format!("[{s}] ")).unwrap_or_default();
        let tail = if self.hashtag_block.is_empty() {
            String::new()
        } else {
            format!("\n\n{}", self.hashtag_block)
        };
        let limit = self.max_length.saturating_sub(self.padding);

        let single = format!("{prefix}{text}{tail}");
        let words = split_words(text);
        let fits = char_len(text) + char_len(&self.hashtag_block) < limit
            && char_len(&single) <= self.max_length;
        if fits || words.is_empty() {
            return vec![TweetFragment {
                text: single,
                position: 0,
                total: 1,
            }];
        }

        // The suffix width depends on the fragment count, so repack until it is stable
        let mut digits = 1;
        loop {
            let bodies = pack(text, &words, char_len(&prefix) + char_len(&tail), limit, digits);
            let total = bodies.len();
            if digit_count(total) <= digits {
                debug!("Split {} chars into {total} fragments", char_len(text));
                return bodies
                    .into_iter()
                    .enumerate()
                    .map(|(position, body)| {
                        let last = position + 1 == total;
                        let mut out = String::new();
                        if position == 0 {
                            out.push_str(&prefix);
                        }
                        // Whitespace at the junction stays, so stripped fragments rejoin exactly
                        out.push_str(body);
                        if !last {
                            out.push_str(ELLIPSIS);
                        }
                        out.push_str(&format!(" {}/{}", position + 1, total));
                        if position == 0 {
                            out.push_str(&tail);
                        }
                        TweetFragment {
                            text: out,
                            position,
                            total,
                        }
                    })
                    .collect();
            }
            digits = digit_count(total);
        }
    }
}

/// Greedily pack words into bodies. `first_extra` is the decoration only the first
/// fragment carries. Each fragment takes at least one word.
fn pack<'a>(
    text: &'a str,
    words: &[(usize, usize)],
    first_extra: usize,
    limit: usize,
    digits: usize,
) -> Vec<&'a str> {
    // ellipsis, plus " i/n" with both numbers at full width
    let numbering = ELLIPSIS.chars().count() + 2 + 2 * digits;
    let mut bodies = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    for &(word_start, word_end) in words {
        let Some(current_start) = start else {
            start = Some(word_start);
            end = word_end;
            continue;
        };
        let decoration = numbering + if bodies.is_empty() { first_extra } else { 0 };
        let budget = limit.saturating_sub(decoration);
        if char_len(&text[current_start..word_end]) > budget {
            bodies.push(&text[current_start..end]);
            start = Some(word_start);
        }
        end = word_end;
    }
    if let Some(current_start) = start {
        bodies.push(&text[current_start..end]);
    }
    bodies
}

/// Byte ranges covering `text` completely, one per word with its trailing whitespace.
/// Leading whitespace belongs to the first word.
fn split_words(text: &str) -> Vec<(usize, usize)> {
    let mut words = Vec::new();
    let mut start = 0;
    let mut in_space = false;
    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            in_space = true;
        } else if in_space {
            if text[start..idx].trim().is_empty() {
                // Only leading whitespace so far, keep it with the first word
                in_space = false;
                continue;
            }
            words.push((start, idx));
            start = idx;
            in_space = false;
        }
    }
    if start < text.len() {
        words.push((start, text.len()));
    }
    words
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn digit_count(n: usize) -> usize {
    n.max(1).ilog10() as usize + 1
}

/// Render a message time for a post, e.g. `1:01:01AM`
pub fn render_time(timestamp: DateTime<Utc>, tz: Tz) -> String {
    timestamp.with_timezone(&tz).format("%-I:%M:%S%p").to_string()
}

/// Post fragments as a reply chain. Returns the ids in posting order.
pub async fn post_thread<M: Microblog + ?Sized>(
    microblog: &M,
    fragments: &[TweetFragment],
) -> Result<Vec<String>, MicroblogError> {
    let mut ids: Vec<String> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let id = microblog
            .post(&fragment.text, ids.last().map(String::as_str))
            .await?;
        debug!(
            "Posted fragment {}/{} as {id}",
            fragment.position + 1,
            fragment.total
        );
        ids.push(id);
    }
    Ok(ids)
}

/// Remove every whitespace-separated token starting with `#`, keeping line structure
pub fn strip_hashtags(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split_whitespace()
                .filter(|word| !word.starts_with('#'))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

/// Link to a status on the platform
pub fn status_url(id: &str) -> String {
    format!("{STATUS_URL_PREFIX}{id}")
}

/// Format a status for the messaging channel: hashtags stripped, the quoted status
/// appended, and a link to the original.
pub fn format_status(status: &Status) -> String {
    let mut out = strip_hashtags(status.full_text());
    if let Some(quoted) = &status.quoted_status {
        out.push_str("\n\nQuoting: ");
        out.push_str(&strip_hashtags(quoted.full_text()));
    }
    if !status.id.is_empty() {
        out.push_str("\n\n");
        out.push_str(&status_url(&status.id));
    }
    out
}
