// Property-based tests for the dedup and relevance filter primitives

use common::dedup::{dedup_key, normalize_title, similarity_ratio};
use common::models::Candidate;
use proptest::prelude::*;

fn candidate(tender_id: Option<&str>, title: &str) -> Candidate {
    Candidate {
        tender_id: tender_id.map(str::to_string),
        title: title.to_string(),
        description: String::new(),
        source: "vestnik".to_string(),
        source_url: String::new(),
        posting_date: None,
        deadline: None,
        estimated_value: None,
        location: None,
        keywords_found: Vec::new(),
        relevance_score: 0.5,
    }
}

proptest! {
    // Similarity is a ratio; it never leaves [0, 1]
    #[test]
    fn property_similarity_ratio_bounded(a in ".{0,40}", b in ".{0,40}") {
        let ratio = similarity_ratio(&a, &b);
        prop_assert!((0.0..=1.0).contains(&ratio), "ratio {} out of range", ratio);
    }

    // Argument order must not matter
    #[test]
    fn property_similarity_ratio_symmetric(a in ".{0,40}", b in ".{0,40}") {
        let forward = similarity_ratio(&a, &b);
        let backward = similarity_ratio(&b, &a);
        prop_assert!((forward - backward).abs() < f64::EPSILON);
    }

    // A string is always identical to itself
    #[test]
    fn property_similarity_ratio_identity(a in ".{1,40}") {
        prop_assert_eq!(similarity_ratio(&a, &a), 1.0);
    }

    // Normalization is idempotent: a second pass changes nothing
    #[test]
    fn property_normalize_title_idempotent(title in ".{0,60}") {
        let once = normalize_title(&title);
        let twice = normalize_title(&once);
        prop_assert_eq!(once, twice);
    }

    // Normalized output contains only lowercase alphanumerics and single spaces
    #[test]
    fn property_normalize_title_canonical_form(title in ".{0,60}") {
        let normalized = normalize_title(&title);
        prop_assert!(!normalized.starts_with(' '));
        prop_assert!(!normalized.ends_with(' '));
        prop_assert!(!normalized.contains("  "));
        for c in normalized.chars() {
            prop_assert!(c == ' ' || (c.is_alphanumeric() && !c.is_uppercase()));
        }
    }

    // The key is a pure function of the candidate
    #[test]
    fn property_dedup_key_deterministic(
        id in proptest::option::of("[A-Z0-9-]{1,12}"),
        title in ".{1,60}",
    ) {
        let c = candidate(id.as_deref(), &title);
        prop_assert_eq!(dedup_key(&c), dedup_key(&c));
    }

    // With a tender id present, formatting noise in the title is irrelevant
    #[test]
    fn property_dedup_key_ignores_title_when_id_present(
        id in "[A-Z0-9-]{1,12}",
        title_a in ".{1,60}",
        title_b in ".{1,60}",
    ) {
        let a = candidate(Some(&id), &title_a);
        let b = candidate(Some(&id), &title_b);
        prop_assert_eq!(dedup_key(&a), dedup_key(&b));
    }

    // Without an id, titles that normalize the same way collide
    #[test]
    fn property_dedup_key_title_fallback_normalizes(title in "[a-zA-Z ]{1,40}") {
        let lower = candidate(None, &title.to_lowercase());
        let upper = candidate(None, &title.to_uppercase());
        prop_assert_eq!(dedup_key(&lower), dedup_key(&upper));
    }

    // Keys always carry the source prefix, so sources never collide
    #[test]
    fn property_dedup_key_scoped_by_source(
        id in proptest::option::of("[A-Z0-9-]{1,12}"),
        title in "[a-z ]{1,40}",
    ) {
        let mut a = candidate(id.as_deref(), &title);
        a.source = "vestnik".to_string();
        let mut b = candidate(id.as_deref(), &title);
        b.source = "nen".to_string();
        prop_assert!(dedup_key(&a).starts_with("vestnik:"));
        prop_assert!(dedup_key(&b).starts_with("nen:"));
        prop_assert_ne!(dedup_key(&a), dedup_key(&b));
    }
}
