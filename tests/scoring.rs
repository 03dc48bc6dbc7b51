// tests/scoring.rs
use chrono::{Duration, TimeZone};
use mtl_events_agent::event::{Event, EventSource, MONTREAL};
use mtl_events_agent::rank::{rank_and_filter, score_event, KeywordMap, RankContext, RankWeights};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn ev(title: &str, hour: u32, hours: i64, popularity: Option<f64>) -> Event {
    let start = MONTREAL.with_ymd_and_hms(2025, 10, 4, hour, 0, 0).unwrap();
    Event::new(title, start, start + Duration::hours(hours), EventSource::Reddit, title)
        .unwrap()
        .with_popularity(popularity)
}

#[test]
fn improv_beats_gala_with_default_weights() {
    let ctx = RankContext::default();
    let mut a = ev("Improv Night", 19, 2, Some(0.5));
    let mut b = ev("Gala", 19, 2, Some(0.8));
    let sa = score_event(&mut a, &ctx);
    let sb = score_event(&mut b, &ctx);
    // 0.4*0.55 + 0.3*1.0 + 0.2*0.5 vs 0.4*0.55 + 0.2*0.8
    assert!((sa - 0.62).abs() < 1e-9);
    assert!((sb - 0.38).abs() < 1e-9);
    assert!(sa > sb);
}

#[test]
fn gala_wins_when_keywords_are_switched_off() {
    let ctx = RankContext {
        weights: RankWeights {
            source: 0.4,
            keyword: 0.0,
            popularity: 0.5,
            duration: 0.1,
            language: 0.0,
        },
        ..RankContext::default()
    };
    let mut a = ev("Improv Night", 19, 2, Some(0.5));
    let mut b = ev("Gala", 19, 2, Some(0.8));
    assert!(score_event(&mut b, &ctx) > score_event(&mut a, &ctx));
}

#[test]
fn keyword_in_description_counts() {
    let ctx = RankContext {
        keywords: KeywordMap::from_pairs([("vernissage", 0.9)]),
        ..RankContext::default()
    };
    let mut plain = ev("Opening", 12, 2, None);
    let mut tagged = ev("Opening", 12, 2, None).with_description("Vernissage at 6pm");
    assert!(score_event(&mut tagged, &ctx) > score_event(&mut plain, &ctx));
}

#[test]
fn raising_popularity_never_lowers_score() {
    let ctx = RankContext {
        weights: RankWeights {
            language: 0.5,
            ..RankWeights::default()
        },
        ..RankContext::default()
    };
    let titles = ["Improv Night", "Fête / Party", "Soirée de contes", "Gala", "Free trail run"];
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..500 {
        let title = titles[rng.random_range(0..titles.len())];
        let hours = rng.random_range(0..8);
        let p1: f64 = rng.random();
        let p2 = (p1 + rng.random::<f64>()).min(1.0);
        let mut lo = ev(title, 10, hours, Some(p1));
        let mut hi = ev(title, 10, hours, Some(p2));
        assert!(score_event(&mut hi, &ctx) >= score_event(&mut lo, &ctx));
    }
}

#[test]
fn language_weight_discounts_french_only_listings() {
    let ctx = RankContext {
        weights: RankWeights {
            language: 1.0,
            ..RankWeights::default()
        },
        ..RankContext::default()
    };
    let mut fr = ev("Soirée de contes", 19, 2, None).with_description("pour les enfants");
    let mut bi = ev("Contes / Stories", 19, 2, None);
    let base = 0.4 * 0.55;
    assert!((score_event(&mut fr, &ctx) - base * 0.5).abs() < 1e-9);
    assert!((score_event(&mut bi, &ctx) - base).abs() < 1e-9);
}

#[test]
fn below_threshold_never_reaches_selection() {
    let ctx = RankContext {
        min_score: 0.5,
        ..RankContext::default()
    };
    let out = rank_and_filter(
        vec![ev("Improv Night", 19, 2, Some(0.5)), ev("Gala", 20, 2, Some(0.8))],
        &ctx,
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "Improv Night");
    assert!(out[0].score.unwrap() >= 0.5);
}
