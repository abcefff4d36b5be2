use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tierdex_core::intersect::positional_intersect;
use tierdex_core::{DocVector, Term};

type Postings = BTreeMap<u32, BTreeSet<u32>>;

fn postings() -> impl Strategy<Value = Postings> {
    prop::collection::btree_map(0u32..6, prop::collection::btree_set(0u32..40, 1..8), 0..5)
}

fn term(stem: &str, postings: &Postings) -> Term {
    let mut t = Term::new(stem);
    for (&doc, positions) in postings {
        t.add_document(doc).unwrap();
        for &pos in positions {
            t.add_position(doc, pos).unwrap();
        }
    }
    t
}

// Every pair checked, no merge and no early exit.
fn pairwise(a: &Postings, b: &Postings, proximity: u32) -> Postings {
    let mut out = Postings::new();
    for (doc, pos_a) in a {
        let Some(pos_b) = b.get(doc) else { continue };
        let kept: BTreeSet<u32> = pos_a
            .iter()
            .copied()
            .filter(|p| pos_b.iter().any(|q| p.abs_diff(*q) <= proximity))
            .collect();
        if !kept.is_empty() {
            out.insert(*doc, kept);
        }
    }
    out
}

fn weights() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop::collection::vec(("[a-e]{1,2}", 0.0f64..100.0), 0..12)
}

proptest! {
    #[test]
    fn intersection_matches_pairwise_scan(a in postings(), b in postings(), proximity in 0u32..6) {
        let got = positional_intersect(&term("a", &a), &term("b", &b), proximity).unwrap();
        let expected = pairwise(&a, &b, proximity);
        match got {
            None => prop_assert!(expected.is_empty()),
            Some(result) => {
                let got: Postings = result
                    .postings()
                    .map(|(doc, positions)| (doc, positions.iter().copied().collect()))
                    .collect();
                prop_assert_eq!(got, expected);
            }
        }
    }

    #[test]
    fn intersection_positions_come_from_the_first_term(a in postings(), b in postings()) {
        if let Some(result) = positional_intersect(&term("a", &a), &term("b", &b), 2).unwrap() {
            for (doc, positions) in result.postings() {
                prop_assert!(!positions.is_empty());
                prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
                prop_assert!(positions.iter().all(|p| a[&doc].contains(p)));
                prop_assert!(b.contains_key(&doc));
            }
        }
    }

    #[test]
    fn normalize_gives_unit_length_once(components in weights()) {
        let mut v: DocVector = components.into_iter().collect();
        v.normalize();
        prop_assert!(v.normalized);
        if !v.is_empty() {
            prop_assert!((v.norm() - 1.0).abs() < 1e-9);
        }
        let once = v.clone();
        v.normalize();
        prop_assert_eq!(v, once);
    }

    #[test]
    fn cosine_of_normalized_vectors_is_bounded(doc in weights(), query in weights()) {
        let mut doc: DocVector = doc.into_iter().collect();
        let mut query: DocVector = query.into_iter().collect();
        doc.normalize();
        query.normalize();
        let sim = doc.cosine(&query);
        prop_assert!(sim >= 0.0);
        prop_assert!(sim <= 1.0 + 1e-9);
        if !doc.is_empty() {
            prop_assert!((doc.cosine(&doc) - 1.0).abs() < 1e-9);
        }
    }
}
