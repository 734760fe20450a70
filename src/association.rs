//! Person ↔ equipment association.
//!
//! Pure threshold membership: a person counts as wearing a helmet when *any*
//! helmet box center lies strictly closer than the threshold to the person's
//! box center. One item may satisfy several people and nobody competes for it.
//! This is deliberately not an assignment problem; see
//! `one_helmet_covers_everyone_in_range` below.

use crate::detect::ObjectClass;
use crate::entity::FrameEntities;
use crate::geometry::distance;

/// Set equipment flags on every person. Returns the number of in-range
/// (person, item) pairs that set a flag.
pub fn associate(entities: &mut FrameEntities, threshold: f64) -> usize {
    let mut matched = 0;
    for person in entities.persons.values_mut() {
        for item in &entities.equipment {
            if distance(&person.bbox, &item.bbox) >= threshold {
                continue;
            }
            match item.kind {
                ObjectClass::Helmet => person.has_helmet = true,
                ObjectClass::Mask => person.has_mask = true,
                _ => continue,
            }
            matched += 1;
        }
    }
    matched
}
