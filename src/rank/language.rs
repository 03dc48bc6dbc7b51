//! Language-preference signal for scoring.
//!
//! A signal returns the confidence (in [0,1]) that an event is offered in the
//! preferred language, or `None` when the text says nothing useful.

use crate::event::Event;

pub trait LanguageSignal: Send + Sync {
    fn confidence(&self, event: &Event) -> Option<f64>;
}

/// Never has an opinion; scores are left untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLanguageSignal;

impl LanguageSignal for NoLanguageSignal {
    fn confidence(&self, _event: &Event) -> Option<f64> {
        None
    }
}

/// Weak text heuristic for an English-preferring audience in a French city.
///
/// - `"Fête / Party"` style titles or flag emoji: bilingual, 1.0
/// - French stop-words without English ones: 0.5
/// - anything else: no signal
#[derive(Debug, Default, Clone, Copy)]
pub struct BilingualHeuristic;

const FRENCH_WORDS: &[&str] = &[
    "le", "la", "les", "des", "du", "et", "avec", "pour", "dans", "au", "aux", "une", "sur",
    "gratuit", "soirée",
];
const ENGLISH_WORDS: &[&str] = &[
    "the", "and", "with", "for", "in", "of", "at", "on", "free", "night", "tonight",
];

impl LanguageSignal for BilingualHeuristic {
    fn confidence(&self, event: &Event) -> Option<f64> {
        if is_bilingual_title(&event.title) {
            return Some(1.0);
        }
        let text = format!("{} {}", event.title, event.description).to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();
        let french = words.iter().any(|w| FRENCH_WORDS.contains(w));
        let english = words.iter().any(|w| ENGLISH_WORDS.contains(w));
        (french && !english).then_some(0.5)
    }
}

fn is_bilingual_title(title: &str) -> bool {
    let has_flag = title
        .chars()
        .any(|c| ('\u{1F1E6}'..='\u{1F1FF}').contains(&c));
    if has_flag {
        return true;
    }
    let mut halves = title.splitn(2, '/');
    match (halves.next(), halves.next()) {
        (Some(a), Some(b)) => has_word(a) && has_word(b) && !title.contains("://"),
        _ => false,
    }
}

fn has_word(s: &str) -> bool {
    s.chars().filter(|c| c.is_alphabetic()).count() >= 2
}
