//! Tiered positional index and TF-IDF vector space retrieval.
//!
//! A corpus is indexed into two tiers, titles and bodies. Ranked search
//! filters candidates on the title tier and ranks them on the body tier;
//! proximity queries intersect body-tier positions.

pub mod builder;
pub mod error;
pub mod index;
pub mod intersect;
pub mod persist;
pub mod query;
pub mod search;
pub mod tokenizer;
pub mod vsm;

pub use error::{Error, Result};
pub use index::{DocId, Term, TermDictionary, TermId, Tier, TieredIndex};
pub use search::{Engine, SearchHit, Tunables};
pub use vsm::{DocVector, TieredVsm, VectorSpaceModel};
