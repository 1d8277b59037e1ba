//! Search parameter values: deriving them from sample resources and
//! interpreting date searches.

pub mod date;
pub mod values;

pub use date::{DatePrecision, DateRange, DateSearch, FhirDateTime, SearchPrefix};
pub use values::{comparator_value, representative_value, value_for_search_param};
