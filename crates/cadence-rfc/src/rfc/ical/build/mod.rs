//! iCalendar serialization (RFC 5545).
//!
//! - Fold: content line folding at 75 octets
//! - Serializer: recurrence properties in a fixed order

mod fold;
mod serializer;

pub use fold::fold_line;
pub use serializer::{
    serialize_date_property, serialize_period_list, serialize_period_property,
    serialize_recurrence, serialize_rrule,
};
