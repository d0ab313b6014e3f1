//! Deterministic extraction over a project's clips.
//!
//! Four independent, side-effect-free functions derive the non-generative
//! parts of a bridge directly from clip text:
//!
//! | Function | Output |
//! |----------|--------|
//! | [`build_meta`] | source platforms, clip count, project name, version |
//! | [`build_timeline`] | one dated event per clip, oldest first |
//! | [`extract_entities`] | capitalized-phrase people, domain-derived companies |
//! | [`extract_key_exchanges`] | `[Speaker]: ...` and `> quote` lines |
//!
//! The entity heuristic matches any run of two to four capitalized words,
//! so sentence-initial phrases and non-person proper nouns show up as
//! "people". Downstream consumers rely on this output shape.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::models::{BridgeMeta, Clip, Entities, KeyExchange, TimelineEvent};

pub const BRIDGE_VERSION: &str = "1.0";

const TIMELINE_EVENT_CHARS: usize = 120;
const MAX_PEOPLE: usize = 10;
const MAX_COMPANIES: usize = 5;
const MAX_EXCHANGES: usize = 10;
const QUOTE_CHARS: usize = 200;

static PERSON_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3}\b").unwrap());

static CHAT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[([^\]\n]+)\]:[ \t]*(.+)$").unwrap());

static QUOTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>[ \t]*(.+)$").unwrap());

/// Take the first `n` characters of `s` (not bytes).
pub fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Build the `meta` section.
///
/// `exported_at` is supplied by the caller so the function stays pure.
pub fn build_meta(clips: &[Clip], project_name: &str, exported_at: DateTime<Utc>) -> BridgeMeta {
    let domains: BTreeSet<&str> = clips
        .iter()
        .filter_map(|c| c.domain.as_deref())
        .filter(|d| !d.is_empty())
        .collect();

    let source_platform = if domains.is_empty() {
        "Unknown".to_string()
    } else {
        domains.into_iter().collect::<Vec<_>>().join(", ")
    };

    BridgeMeta {
        source_platform,
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        total_clips: clips.len(),
        project_name: project_name.to_string(),
        bridge_version: BRIDGE_VERSION.to_string(),
    }
}

/// One event per clip, sorted ascending by timestamp.
///
/// The sort is stable, so clips sharing a timestamp keep insertion order.
pub fn build_timeline(clips: &[Clip]) -> Vec<TimelineEvent> {
    let mut sorted: Vec<&Clip> = clips.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    sorted
        .into_iter()
        .map(|clip| {
            let date = if clip.timestamp.chars().count() >= 10 {
                truncate_chars(&clip.timestamp, 10)
            } else {
                "Unknown".to_string()
            };
            let event = match clip.title_text() {
                Some(title) => title.to_string(),
                None => truncate_chars(&clip.content_text(), TIMELINE_EVENT_CHARS),
            };
            TimelineEvent {
                date,
                event,
                source: clip.domain.clone().unwrap_or_default(),
            }
        })
        .collect()
}

/// Derive a company name from a domain: `www.github.com` → `Github`.
///
/// Returns `None` when the label is too short to be meaningful.
pub fn company_from_domain(domain: &str) -> Option<String> {
    let host = domain.strip_prefix("www.").unwrap_or(domain);
    let label = host.split('.').next().unwrap_or("");
    let mut chars = label.chars();
    let first = chars.next()?;
    let name: String = first
        .to_uppercase()
        .chain(chars.flat_map(|c| c.to_lowercase()))
        .collect();
    if name.chars().count() > 2 {
        Some(name)
    } else {
        None
    }
}

/// Collect candidate people and companies, sorted and deduplicated.
pub fn extract_entities(clips: &[Clip]) -> Entities {
    let mut people = BTreeSet::new();
    let mut companies = BTreeSet::new();

    for clip in clips {
        let text = clip.content_text();
        for m in PERSON_PATTERN.find_iter(&text) {
            people.insert(m.as_str().to_string());
        }
        if let Some(company) = clip.domain.as_deref().and_then(company_from_domain) {
            companies.insert(company);
        }
    }

    Entities {
        people: people.into_iter().take(MAX_PEOPLE).collect(),
        companies: companies.into_iter().take(MAX_COMPANIES).collect(),
    }
}

/// Pull chat-style and block-quoted lines out of clip text.
///
/// Scans clip by clip; within a clip all `[Speaker]: ...` lines come before
/// all `> quote` lines. Collection stops at the tenth exchange.
pub fn extract_key_exchanges(clips: &[Clip]) -> Vec<KeyExchange> {
    let mut exchanges = Vec::new();

    for clip in clips {
        let text = clip.content_text();

        for caps in CHAT_PATTERN.captures_iter(&text) {
            exchanges.push(KeyExchange {
                speaker: caps[1].trim().to_string(),
                quote: truncate_chars(caps[2].trim(), QUOTE_CHARS),
            });
            if exchanges.len() >= MAX_EXCHANGES {
                return exchanges;
            }
        }

        for caps in QUOTE_PATTERN.captures_iter(&text) {
            exchanges.push(KeyExchange {
                speaker: "quoted".to_string(),
                quote: truncate_chars(caps[1].trim(), QUOTE_CHARS),
            });
            if exchanges.len() >= MAX_EXCHANGES {
                return exchanges;
            }
        }
    }

    exchanges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use chrono::TimeZone;

    fn clip(ts: &str, title: &str, text: &str, domain: &str) -> Clip {
        Clip {
            id: format!("clip-{}", ts),
            text: Some(text.to_string()),
            url: format!("https://{}/page", domain),
            title: Some(title.to_string()),
            domain: Some(domain.to_string()),
            word_count: text.split_whitespace().count() as i64,
            timestamp: ts.to_string(),
            project_id: Some("launch".to_string()),
            media_type: MediaType::Text,
            image_url: None,
            file_name: None,
            screenshot_data: None,
        }
    }

    #[test]
    fn test_meta_sorted_distinct_domains() {
        let clips = vec![
            clip("2024-01-01T00:00:00", "a", "x", "slack.com"),
            clip("2024-01-02T00:00:00", "b", "y", "github.com"),
            clip("2024-01-03T00:00:00", "c", "z", "slack.com"),
        ];
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap();
        let meta = build_meta(&clips, "Launch", now);
        assert_eq!(meta.source_platform, "github.com, slack.com");
        assert_eq!(meta.total_clips, 3);
        assert_eq!(meta.project_name, "Launch");
        assert_eq!(meta.bridge_version, "1.0");
        assert_eq!(meta.exported_at, "2024-02-01T08:30:00Z");
    }

    #[test]
    fn test_meta_unknown_platform_without_domains() {
        let mut c = clip("2024-01-01T00:00:00", "a", "x", "");
        c.domain = None;
        let meta = build_meta(&[c], "P", Utc::now());
        assert_eq!(meta.source_platform, "Unknown");
    }

    #[test]
    fn test_timeline_launch_scenario() {
        let clips = vec![
            clip("2024-01-01T10:00:00", "Kickoff", "start", "a.com"),
            clip("2024-01-03T09:00:00", "Ship Decision", "ship", "a.com"),
            clip("2024-01-02T12:00:00", "Mid Review", "review", "a.com"),
        ];
        let timeline = build_timeline(&clips);
        let dates: Vec<&str> = timeline.iter().map(|e| e.date.as_str()).collect();
        let events: Vec<&str> = timeline.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
        assert_eq!(events, vec!["Kickoff", "Mid Review", "Ship Decision"]);
    }

    #[test]
    fn test_timeline_sorted_for_many_clips() {
        let clips: Vec<Clip> = (0..40)
            .map(|i| {
                let day = (i * 7) % 28 + 1;
                clip(&format!("2024-03-{:02}T00:00:00", day), "t", "x", "a.com")
            })
            .collect();
        let timeline = build_timeline(&clips);
        assert!(timeline.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn test_timeline_event_falls_back_to_text() {
        let long = "word ".repeat(60);
        let mut c = clip("2024-01-01T00:00:00", "", &long, "a.com");
        c.title = None;
        let timeline = build_timeline(&[c]);
        assert_eq!(timeline[0].event.chars().count(), 120);
    }

    #[test]
    fn test_timeline_short_timestamp_is_unknown() {
        let c = clip("2024", "t", "x", "a.com");
        assert_eq!(build_timeline(&[c])[0].date, "Unknown");
    }

    #[test]
    fn test_company_from_domain() {
        assert_eq!(company_from_domain("www.github.com"), Some("Github".into()));
        assert_eq!(company_from_domain("news.ycombinator.com"), Some("News".into()));
        assert_eq!(company_from_domain("x.ai"), None);
        assert_eq!(company_from_domain(""), None);
    }

    #[test]
    fn test_entities_people_and_companies() {
        let clips = vec![
            clip(
                "2024-01-01T00:00:00",
                "t",
                "Met with Jane Doe and John Smith about the plan.",
                "www.linear.app",
            ),
            clip("2024-01-02T00:00:00", "t", "Jane Doe agreed.", "notion.so"),
        ];
        let entities = extract_entities(&clips);
        assert_eq!(entities.people, vec!["Jane Doe", "John Smith"]);
        assert_eq!(entities.companies, vec!["Linear", "Notion"]);
    }

    #[test]
    fn test_entities_bounded_sorted_unique() {
        let names = [
            "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India",
            "Juliet", "Kilo", "Lima",
        ];
        let text = names
            .iter()
            .map(|n| format!("{} Person met us.", n))
            .collect::<Vec<_>>()
            .join(" and ");
        let domains = [
            "aaa.com", "bbb.com", "ccc.com", "ddd.com", "eee.com", "fff.com", "ggg.com",
        ];
        let clips: Vec<Clip> = domains
            .iter()
            .enumerate()
            .map(|(i, d)| clip(&format!("2024-01-0{}T00:00:00", i + 1), "t", &text, d))
            .collect();

        let entities = extract_entities(&clips);
        assert_eq!(entities.people.len(), 10);
        assert_eq!(entities.companies.len(), 5);

        let mut sorted = entities.people.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, entities.people);
        assert_eq!(entities.companies, vec!["Aaa", "Bbb", "Ccc", "Ddd", "Eee"]);
    }

    #[test]
    fn test_key_exchanges_chat_then_quote() {
        let c = clip(
            "2024-01-01T00:00:00",
            "t",
            "[Alice]: we should ship Friday\n> earlier note",
            "a.com",
        );
        let exchanges = extract_key_exchanges(&[c]);
        assert_eq!(
            exchanges,
            vec![
                KeyExchange {
                    speaker: "Alice".into(),
                    quote: "we should ship Friday".into()
                },
                KeyExchange {
                    speaker: "quoted".into(),
                    quote: "earlier note".into()
                },
            ]
        );
    }

    #[test]
    fn test_key_exchanges_chat_lines_precede_quotes_within_clip() {
        let c = clip(
            "2024-01-01T00:00:00",
            "t",
            "> first quote\n[Bob]: reply\n> second quote",
            "a.com",
        );
        let speakers: Vec<String> = extract_key_exchanges(&[c])
            .into_iter()
            .map(|e| e.speaker)
            .collect();
        assert_eq!(speakers, vec!["Bob", "quoted", "quoted"]);
    }

    #[test]
    fn test_key_exchanges_capped_at_ten() {
        let text = (0..8)
            .map(|i| format!("[User{}]: message {}\n> quote {}", i, i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let clips: Vec<Clip> = (0..5)
            .map(|i| clip(&format!("2024-01-0{}T00:00:00", i + 1), "t", &text, "a.com"))
            .collect();
        let exchanges = extract_key_exchanges(&clips);
        assert_eq!(exchanges.len(), 10);
        // The first clip alone supplies all ten: eight chat lines, then two quotes.
        assert_eq!(exchanges[7].speaker, "User7");
        assert_eq!(exchanges[8].speaker, "quoted");
        assert_eq!(exchanges[9].quote, "quote 1");
    }

    #[test]
    fn test_key_exchange_quote_truncated() {
        let text = format!("[Carol]: {}", "x".repeat(500));
        let c = clip("2024-01-01T00:00:00", "t", &text, "a.com");
        let exchanges = extract_key_exchanges(&[c]);
        assert_eq!(exchanges[0].quote.len(), 200);
    }
}
