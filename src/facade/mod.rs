pub mod session;

pub use session::{
    Affordance, Breadcrumbs, DescriptionTooltip, RowActions, TableSession, camel_case,
};
