//! Intent classification
//!
//! Maps free-form utterance text to one of a fixed set of intents plus
//! extracted slot values. Classification is an ordered rule scan: the rules
//! run top to bottom and the first match wins, so the order in `RULES` is a
//! contract, not an implementation detail. More specific phrasings sit above
//! the generic ones ("shuffle off" above "shuffle", "unlike" above "like",
//! "repeat one" above "repeat") and the resume words sit above the pause
//! words so that "unpause" and "resume playing" never read as PAUSE or
//! PLAY_SONG.
//!
//! `classify` is a pure function: no side effects, no hidden state, same
//! text in, same intent out.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of recognized user goals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    PlaySong,
    Pause,
    Resume,
    SkipNext,
    SkipPrev,
    AddToPlaylist,
    CreatePlaylist,
    Search,
    GetCurrent,
    LikeSong,
    UnlikeSong,
    ShuffleOn,
    ShuffleOff,
    RepeatOne,
    RepeatAll,
    Unknown,
}

impl IntentKind {
    /// Tag string used in logs and the demo console
    pub fn as_tag(&self) -> &'static str {
        match self {
            IntentKind::PlaySong => "PLAY_SONG",
            IntentKind::Pause => "PAUSE",
            IntentKind::Resume => "RESUME",
            IntentKind::SkipNext => "SKIP_NEXT",
            IntentKind::SkipPrev => "SKIP_PREV",
            IntentKind::AddToPlaylist => "ADD_TO_PLAYLIST",
            IntentKind::CreatePlaylist => "CREATE_PLAYLIST",
            IntentKind::Search => "SEARCH",
            IntentKind::GetCurrent => "GET_CURRENT",
            IntentKind::LikeSong => "LIKE_SONG",
            IntentKind::UnlikeSong => "UNLIKE_SONG",
            IntentKind::ShuffleOn => "SHUFFLE_ON",
            IntentKind::ShuffleOff => "SHUFFLE_OFF",
            IntentKind::RepeatOne => "REPEAT_ONE",
            IntentKind::RepeatAll => "REPEAT_ALL",
            IntentKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// A classified utterance: intent tag, extracted slots, confidence in [0,1]
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub kind: IntentKind,
    pub slots: HashMap<String, String>,
    pub confidence: f32,
}

impl Intent {
    /// Slot value by name, empty string when absent
    pub fn slot(&self, name: &str) -> &str {
        self.slots.get(name).map(String::as_str).unwrap_or("")
    }
}

// ============ Rule Table ============

lazy_static! {
    static ref RESUME_RE: Regex = Regex::new(r"\b(?:resume|continue|unpause)\b").unwrap();
    static ref PAUSE_RE: Regex = Regex::new(r"\b(?:pause|hold)\b").unwrap();
    static ref STOP_RE: Regex = Regex::new(r"\bstop\b").unwrap();
    static ref PLAY_RE: Regex = Regex::new(r"\bplay\b").unwrap();
    static ref SONG_SLOT_RE: Regex =
        Regex::new(r"\bplay\s+(.+?)(?:\s+by\s+.+|\s+from\s+.+)?$").unwrap();
    static ref NEXT_RE: Regex = Regex::new(r"\b(?:next|skip|forward)\b").unwrap();
    static ref PREV_RE: Regex = Regex::new(r"\b(?:previous|back)\b|last\s+song").unwrap();
    static ref ADD_RE: Regex =
        Regex::new(r"\badd\s+(.+?)\s+to\s+(?:my\s+)?(.+?)(?:\s+playlist)?$").unwrap();
    static ref CREATE_RE: Regex = Regex::new(r"\b(?:create|make|new)\b.*\bplaylist\b").unwrap();
    static ref PLAYLIST_NAME_RE: Regex =
        Regex::new(r"playlist\s+(?:called|named)\s+(.+)$").unwrap();
    static ref SEARCH_RE: Regex = Regex::new(r"\b(?:search|find)\b").unwrap();
    static ref QUERY_SLOT_RE: Regex =
        Regex::new(r"\b(?:search|find)\s+(?:for\s+)?(.+)$").unwrap();
    static ref CURRENT_RE: Regex =
        Regex::new(r"what(?:'s|\s+is)\s+playing|current\s+song|what\s+is\s+this|now\s+playing")
            .unwrap();
    static ref UNLIKE_RE: Regex =
        Regex::new(r"\bunlike\b|remove\s+from\s+(?:my\s+)?favorites").unwrap();
    static ref LIKE_RE: Regex = Regex::new(r"\b(?:like|love|favorite)\b").unwrap();
    static ref SHUFFLE_OFF_RE: Regex =
        Regex::new(r"shuffle\s+off|off\s+(?:the\s+)?shuffle|stop\s+shuffling").unwrap();
    static ref REPEAT_ONE_RE: Regex = Regex::new(r"repeat\s+(?:one|this)").unwrap();
    static ref REPEAT_RE: Regex = Regex::new(r"\b(?:repeat|loop)\b").unwrap();
}

struct Rule {
    kind: IntentKind,
    confidence: f32,
    matches: fn(&str) -> bool,
    extract: fn(&str) -> HashMap<String, String>,
}

/// Ordered classification rules, first match wins
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            kind: IntentKind::Resume,
            confidence: 0.90,
            matches: |t| RESUME_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::Pause,
            confidence: 0.98,
            // Bare "stop" pauses; "stop shuffling" belongs to SHUFFLE_OFF
            matches: |t| PAUSE_RE.is_match(t) || (STOP_RE.is_match(t) && !t.contains("shuffl")),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::PlaySong,
            confidence: 0.92,
            matches: |t| PLAY_RE.is_match(t),
            extract: song_slot,
        },
        Rule {
            kind: IntentKind::SkipNext,
            confidence: 0.95,
            matches: |t| NEXT_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::SkipPrev,
            confidence: 0.95,
            matches: |t| PREV_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::AddToPlaylist,
            confidence: 0.88,
            matches: |t| ADD_RE.is_match(t),
            extract: add_slots,
        },
        Rule {
            kind: IntentKind::CreatePlaylist,
            confidence: 0.90,
            matches: |t| CREATE_RE.is_match(t),
            extract: playlist_name_slot,
        },
        Rule {
            kind: IntentKind::Search,
            confidence: 0.85,
            matches: |t| SEARCH_RE.is_match(t),
            extract: query_slot,
        },
        Rule {
            kind: IntentKind::GetCurrent,
            confidence: 0.93,
            matches: |t| CURRENT_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::UnlikeSong,
            confidence: 0.88,
            matches: |t| UNLIKE_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::LikeSong,
            confidence: 0.88,
            matches: |t| LIKE_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::ShuffleOff,
            confidence: 0.93,
            matches: |t| SHUFFLE_OFF_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::ShuffleOn,
            confidence: 0.92,
            matches: |t| t.contains("shuffl"),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::RepeatOne,
            confidence: 0.93,
            matches: |t| REPEAT_ONE_RE.is_match(t),
            extract: no_slots,
        },
        Rule {
            kind: IntentKind::RepeatAll,
            confidence: 0.92,
            matches: |t| REPEAT_RE.is_match(t),
            extract: no_slots,
        },
    ]
});

// ============ Slot Extractors ============

fn no_slots(_text: &str) -> HashMap<String, String> {
    HashMap::new()
}

/// Text between "play" and an optional trailing "by"/"from" clause
fn song_slot(text: &str) -> HashMap<String, String> {
    let song = SONG_SLOT_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    HashMap::from([("song".to_string(), song)])
}

/// "add <song> to <playlist>", tolerating "my" and a trailing "playlist"
fn add_slots(text: &str) -> HashMap<String, String> {
    let (song, playlist) = match ADD_RE.captures(text) {
        Some(caps) => (
            caps.get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            caps.get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };
    HashMap::from([
        ("song".to_string(), song),
        ("playlist".to_string(), playlist),
    ])
}

fn playlist_name_slot(text: &str) -> HashMap<String, String> {
    let name = PLAYLIST_NAME_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    HashMap::from([("name".to_string(), name)])
}

fn query_slot(text: &str) -> HashMap<String, String> {
    let query = QUERY_SLOT_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    HashMap::from([("query".to_string(), query)])
}

// ============ Classification ============

/// Classify an utterance into an intent with slots and confidence.
///
/// Unmatched text yields UNKNOWN at confidence 0.5 with the raw input
/// preserved in the `raw_text` slot. Extraction failures yield empty slot
/// values, never an error.
pub fn classify(text: &str) -> Intent {
    let normalized = text.trim().to_lowercase();
    for rule in RULES.iter() {
        if (rule.matches)(&normalized) {
            return Intent {
                kind: rule.kind,
                slots: (rule.extract)(&normalized),
                confidence: rule.confidence,
            };
        }
    }
    Intent {
        kind: IntentKind::Unknown,
        slots: HashMap::from([("raw_text".to_string(), text.to_string())]),
        confidence: 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_determinism {
        use super::*;

        #[test]
        fn same_text_same_intent() {
            let inputs = [
                "play shape of you",
                "pause the music",
                "shuffle off",
                "add levitating to road trip",
                "complete gibberish here",
            ];
            for text in inputs {
                let first = classify(text);
                let second = classify(text);
                assert_eq!(first, second, "classify must be deterministic for {:?}", text);
            }
        }

        #[test]
        fn case_and_whitespace_normalize() {
            let a = classify("  PLAY Shape Of You  ");
            let b = classify("play shape of you");
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.slot("song"), b.slot("song"));
        }
    }

    mod property_rule_order {
        use super::*;

        #[test]
        fn shuffle_off_beats_shuffle() {
            let off = classify("shuffle off");
            assert_eq!(off.kind, IntentKind::ShuffleOff);
            assert_eq!(off.confidence, 0.93);

            let on = classify("shuffle");
            assert_eq!(on.kind, IntentKind::ShuffleOn);
            assert_eq!(on.confidence, 0.92);
        }

        #[test]
        fn stop_shuffling_is_not_pause() {
            assert_eq!(classify("stop shuffling").kind, IntentKind::ShuffleOff);
            assert_eq!(classify("stop").kind, IntentKind::Pause);
            assert_eq!(classify("stop the music").kind, IntentKind::Pause);
        }

        #[test]
        fn repeat_one_beats_repeat() {
            assert_eq!(classify("repeat one").kind, IntentKind::RepeatOne);
            assert_eq!(classify("repeat this").kind, IntentKind::RepeatOne);
            assert_eq!(classify("repeat").kind, IntentKind::RepeatAll);
            assert_eq!(classify("loop the queue").kind, IntentKind::RepeatAll);
        }

        #[test]
        fn resume_words_beat_pause_and_play() {
            assert_eq!(classify("unpause").kind, IntentKind::Resume);
            assert_eq!(classify("resume playing").kind, IntentKind::Resume);
            assert_eq!(classify("continue the music").kind, IntentKind::Resume);
            assert_eq!(classify("pause").kind, IntentKind::Pause);
        }

        #[test]
        fn unlike_beats_like() {
            assert_eq!(classify("unlike this song").kind, IntentKind::UnlikeSong);
            assert_eq!(
                classify("remove from my favorites").kind,
                IntentKind::UnlikeSong
            );
            assert_eq!(classify("i like this song").kind, IntentKind::LikeSong);
            assert_eq!(classify("love this").kind, IntentKind::LikeSong);
        }

        #[test]
        fn whats_playing_is_not_play_song() {
            assert_eq!(classify("what's playing").kind, IntentKind::GetCurrent);
            assert_eq!(classify("what is playing").kind, IntentKind::GetCurrent);
            assert_eq!(classify("current song").kind, IntentKind::GetCurrent);
        }
    }

    mod property_slots {
        use super::*;

        #[test]
        fn play_extracts_song() {
            let intent = classify("play shape of you");
            assert_eq!(intent.kind, IntentKind::PlaySong);
            assert_eq!(intent.slot("song"), "shape of you");
            assert_eq!(intent.confidence, 0.92);
        }

        #[test]
        fn play_strips_trailing_by_clause() {
            let intent = classify("play shape of you by ed sheeran");
            assert_eq!(intent.slot("song"), "shape of you");

            let intent = classify("play dreams from the 1977 album");
            assert_eq!(intent.slot("song"), "dreams");
        }

        #[test]
        fn bare_play_yields_empty_song_slot() {
            // Extraction failure is not an error, just a useless slot
            let intent = classify("play");
            assert_eq!(intent.kind, IntentKind::PlaySong);
            assert_eq!(intent.slot("song"), "");
        }

        #[test]
        fn add_extracts_song_and_playlist() {
            let intent = classify("add shape of you to road trip");
            assert_eq!(intent.kind, IntentKind::AddToPlaylist);
            assert_eq!(intent.slot("song"), "shape of you");
            assert_eq!(intent.slot("playlist"), "road trip");
        }

        #[test]
        fn add_tolerates_my_and_trailing_playlist_word() {
            let intent = classify("add levitating to my road trip playlist");
            assert_eq!(intent.slot("song"), "levitating");
            assert_eq!(intent.slot("playlist"), "road trip");
        }

        #[test]
        fn create_extracts_optional_name() {
            let intent = classify("create a playlist called gym hits");
            assert_eq!(intent.kind, IntentKind::CreatePlaylist);
            assert_eq!(intent.slot("name"), "gym hits");

            let intent = classify("make a new playlist");
            assert_eq!(intent.kind, IntentKind::CreatePlaylist);
            assert_eq!(intent.slot("name"), "", "missing name is filled downstream");
        }

        #[test]
        fn search_extracts_query() {
            let intent = classify("search for taylor swift");
            assert_eq!(intent.kind, IntentKind::Search);
            assert_eq!(intent.slot("query"), "taylor swift");
            assert_eq!(intent.confidence, 0.85);

            let intent = classify("find bohemian rhapsody");
            assert_eq!(intent.slot("query"), "bohemian rhapsody");
        }
    }

    mod property_unknown {
        use super::*;

        #[test]
        fn unmatched_text_is_unknown_with_raw_text() {
            let intent = classify("Tell me a joke");
            assert_eq!(intent.kind, IntentKind::Unknown);
            assert_eq!(intent.confidence, 0.5);
            assert_eq!(
                intent.slot("raw_text"),
                "Tell me a joke",
                "raw input preserved verbatim"
            );
        }
    }

    #[test]
    fn test_confidence_table() {
        let cases = [
            ("resume", IntentKind::Resume, 0.90),
            ("pause", IntentKind::Pause, 0.98),
            ("play despacito", IntentKind::PlaySong, 0.92),
            ("next", IntentKind::SkipNext, 0.95),
            ("skip this one", IntentKind::SkipNext, 0.95),
            ("previous", IntentKind::SkipPrev, 0.95),
            ("go back", IntentKind::SkipPrev, 0.95),
            ("add humble to workout", IntentKind::AddToPlaylist, 0.88),
            ("new playlist", IntentKind::CreatePlaylist, 0.90),
            ("search for jazz", IntentKind::Search, 0.85),
            ("what's playing", IntentKind::GetCurrent, 0.93),
            ("unlike this", IntentKind::UnlikeSong, 0.88),
            ("favorite this song", IntentKind::LikeSong, 0.88),
            ("shuffle off", IntentKind::ShuffleOff, 0.93),
            ("shuffle", IntentKind::ShuffleOn, 0.92),
            ("repeat one", IntentKind::RepeatOne, 0.93),
            ("repeat", IntentKind::RepeatAll, 0.92),
        ];
        for (text, kind, confidence) in cases {
            let intent = classify(text);
            assert_eq!(intent.kind, kind, "intent for {:?}", text);
            assert_eq!(intent.confidence, confidence, "confidence for {:?}", text);
        }
    }

    #[test]
    fn test_tags_round_trip_screaming_snake() {
        assert_eq!(IntentKind::PlaySong.as_tag(), "PLAY_SONG");
        assert_eq!(IntentKind::ShuffleOff.to_string(), "SHUFFLE_OFF");
        let json = serde_json::to_string(&IntentKind::SkipPrev).unwrap();
        assert_eq!(json, "\"SKIP_PREV\"");
    }
}
