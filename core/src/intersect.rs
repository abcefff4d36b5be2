use crate::index::Term;
use crate::Result;
use std::cmp::Ordering;

/// Stem given to the synthetic term that carries an intersection result.
pub const INTERSECTOR_STEM: &str = "intersector";
pub const DEFAULT_PROXIMITY: u32 = 1;

/// Positions of `a` that lie within `proximity` words of some position of `b`,
/// per document the two terms share.
///
/// Documents are merge-walked in ascending id order. Returns `None` when
/// nothing matched.
pub fn positional_intersect(a: &Term, b: &Term, proximity: u32) -> Result<Option<Term>> {
    let mut result = Term::new(INTERSECTOR_STEM);
    let mut docs_a = a.postings().peekable();
    let mut docs_b = b.postings().peekable();

    while let (Some(&(doc_a, pos_a)), Some(&(doc_b, pos_b))) = (docs_a.peek(), docs_b.peek()) {
        match doc_a.cmp(&doc_b) {
            Ordering::Less => {
                docs_a.next();
            }
            Ordering::Greater => {
                docs_b.next();
            }
            Ordering::Equal => {
                result.add_document(doc_a)?;
                for &p in pos_a {
                    for &q in pos_b {
                        if p.abs_diff(q) <= proximity {
                            if !result.has_position(doc_a, p) {
                                result.add_position(doc_a, p)?;
                            }
                        } else if q > p {
                            // Later positions of `b` are further away still.
                            break;
                        }
                    }
                }
                if result.frequency(doc_a) == 0 {
                    result.remove_document(doc_a);
                }
                docs_a.next();
                docs_b.next();
            }
        }
    }

    Ok((result.total_frequency() > 0).then_some(result))
}
