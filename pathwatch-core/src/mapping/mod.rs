//! Mapping
//!
//! Bookkeeping for collections derived from other collections: each source
//! item maps to a derived value that lives exactly as long as something
//! refers to it. See [`RefCountedCache`].

mod ref_counter;

pub use ref_counter::{RefCountedCache, RefreshTransaction};
