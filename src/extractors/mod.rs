pub mod tenant;

pub use tenant::CurrentTenant;
