//! Object model types, linking and lookup

mod elements;
mod linker;
mod lookup;

pub use elements::*;
pub use linker::{build_model, link_classes_and_objects, link_classes_and_properties, sort_model};
pub use lookup::{EntityInfo, EntityKind, ModelIndex};
