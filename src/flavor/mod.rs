//! Invoice XML standards ("flavors"), their conformance levels, the
//! abstract field table and the resources (templates, schemas, XMP
//! extension descriptions) shipped for each level.
//!
//! | Flavor | Attachment | Levels |
//! |--------|------------|--------|
//! | `factur-x` | `factur-x.xml` | minimum, basicwl, basic, en16931, extended |
//! | `zugferd` | `ZUGFeRD-invoice.xml` | basic, comfort, extended |

mod detect;
mod fields;
mod registry;
mod resources;

pub use detect::Flavor;
pub use fields::{FieldDef, FieldTable, is_date_field};
pub use registry::{FlavorRegistry, FlavorSpec, LevelSpec, XmpSpec};
pub use resources::Resources;
