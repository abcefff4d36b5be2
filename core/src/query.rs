use crate::intersect::DEFAULT_PROXIMITY;
use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PROXIMITY_MARKER: Regex = Regex::new(r"^/(\d+)$").expect("valid regex");
}

/// A positional query: one term, or two terms within some word distance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    Term(String),
    Proximity { first: String, second: String, distance: u32 },
}

fn starts_with_let_or_num(term: &str) -> bool {
    term.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
}

/// Parse `term`, `term1 term2` (distance 1) or `term1 /N term2`.
pub fn parse_query(text: &str) -> Result<QueryExpr> {
    let lowered = text.trim().to_lowercase();
    let terms: Vec<&str> = lowered.split_whitespace().collect();
    let invalid = || Error::InvalidQuery(text.trim().to_string());

    for (i, term) in terms.iter().enumerate() {
        if term.contains('/') {
            if i == 0 || i == terms.len() - 1 || !PROXIMITY_MARKER.is_match(term) {
                return Err(invalid());
            }
        } else if !starts_with_let_or_num(term) {
            return Err(invalid());
        }
    }

    match terms.as_slice() {
        [term] => Ok(QueryExpr::Term(term.to_string())),
        [first, second] => Ok(QueryExpr::Proximity {
            first: first.to_string(),
            second: second.to_string(),
            distance: DEFAULT_PROXIMITY,
        }),
        [first, marker, second] => {
            let distance = PROXIMITY_MARKER
                .captures(marker)
                .and_then(|c| c[1].parse().ok())
                .ok_or_else(invalid)?;
            Ok(QueryExpr::Proximity {
                first: first.to_string(),
                second: second.to_string(),
                distance,
            })
        }
        _ => Err(invalid()),
    }
}
