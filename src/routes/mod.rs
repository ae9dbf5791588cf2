pub mod common;
pub mod tenant;

pub use common::{common_routes, common_routes_with_ready};
pub use tenant::{tenant_routes, with_tenancy};
