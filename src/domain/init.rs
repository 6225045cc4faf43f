use crate::domain::class::{ALL_CLASS, Class, FARM_CLASS};
use crate::domain::model::Model;

/// Ensure the two well-known default classes exist: `ALL` (used when a host
/// is added with no classes) and `FARM` (used when `rsvp_class` is called
/// with no class). Idempotent; safe to call on every startup after loading
/// the state file.
pub fn ensure_default_classes(model: &mut Model) {
    model.classes.entry(ALL_CLASS.to_string()).or_insert_with(|| Class::new(ALL_CLASS, "default host class", false));
    model.classes.entry(FARM_CLASS.to_string()).or_insert_with(|| Class::new(FARM_CLASS, "default reserve class", false));
}
