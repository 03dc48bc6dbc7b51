//! Composite event score.
//!
//! `score = w_source*source + w_keyword*keyword + w_popularity*popularity
//!          + w_duration*duration`, then optionally discounted by the
//! language signal: `score * (1 - w_language * (1 - confidence))`.

use super::{RankContext, RankWeights};
use crate::event::Event;

const LONG_EVENT_HOURS: f64 = 4.0;
const LONG_EVENT_BONUS: f64 = 0.1;
const ALL_DAY_BONUS: f64 = 0.15;

/// Per-event signals before weighting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreInputs {
    pub source: f64,
    pub keyword: f64,
    pub popularity: f64,
    pub duration: f64,
}

impl ScoreInputs {
    pub fn for_event(event: &Event, ctx: &RankContext) -> Self {
        Self {
            source: ctx.source_weights.weight_for(event.source),
            keyword: ctx.keywords.score(&event.title, &event.description),
            popularity: event.popularity().unwrap_or(0.0),
            duration: duration_bonus(event),
        }
    }
}

/// +0.1 past four hours, +0.15 for all-day; additive, not clamped.
pub fn duration_bonus(event: &Event) -> f64 {
    let mut bonus = 0.0;
    if event.duration_hours() > LONG_EVENT_HOURS {
        bonus += LONG_EVENT_BONUS;
    }
    if event.is_all_day {
        bonus += ALL_DAY_BONUS;
    }
    bonus
}

pub fn base_score(inputs: &ScoreInputs, w: &RankWeights) -> f64 {
    w.source * inputs.source
        + w.keyword * inputs.keyword
        + w.popularity * inputs.popularity
        + w.duration * inputs.duration
}

/// Scale a score by language confidence; no signal leaves it unchanged.
pub fn apply_language(score: f64, confidence: Option<f64>, w_language: f64) -> f64 {
    match confidence {
        Some(c) => score * (1.0 - w_language * (1.0 - c.clamp(0.0, 1.0))),
        None => score,
    }
}

/// Score one event and write the result back onto it.
pub fn score_event(event: &mut Event, ctx: &RankContext) -> f64 {
    let inputs = ScoreInputs::for_event(event, ctx);
    let base = base_score(&inputs, &ctx.weights);
    let score = apply_language(base, ctx.language.confidence(event), ctx.weights.language);
    event.score = Some(score);
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, MONTREAL};
    use chrono::{Duration, TimeZone};

    fn ev(hours: i64) -> Event {
        let start = MONTREAL.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        Event::new("Gala", start, start + Duration::hours(hours), EventSource::Reddit, "g").unwrap()
    }

    #[test]
    fn duration_bonus_thresholds() {
        assert_eq!(duration_bonus(&ev(4)), 0.0);
        assert_eq!(duration_bonus(&ev(5)), 0.1);
        assert!((duration_bonus(&ev(5).all_day(true)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn base_score_is_weighted_sum() {
        let inputs = ScoreInputs {
            source: 0.5,
            keyword: 1.0,
            popularity: 0.25,
            duration: 0.1,
        };
        let s = base_score(&inputs, &RankWeights::default());
        assert!((s - (0.2 + 0.3 + 0.05 + 0.01)).abs() < 1e-12);
    }

    #[test]
    fn language_discount() {
        assert_eq!(apply_language(0.8, None, 0.5), 0.8);
        assert_eq!(apply_language(0.8, Some(1.0), 0.5), 0.8);
        assert!((apply_language(0.8, Some(0.5), 0.5) - 0.6).abs() < 1e-12);
        assert_eq!(apply_language(0.8, Some(0.0), 0.0), 0.8);
    }

    #[test]
    fn score_is_written_back() {
        let ctx = RankContext::default();
        let mut e = ev(2).with_popularity(Some(0.5));
        let s = score_event(&mut e, &ctx);
        assert_eq!(e.score, Some(s));
        // reddit 0.55 source, no keyword, 0.5 popularity, no duration bonus
        assert!((s - (0.4 * 0.55 + 0.2 * 0.5)).abs() < 1e-12);
    }
}
