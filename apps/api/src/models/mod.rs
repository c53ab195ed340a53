pub mod preference;
pub mod profile;
pub mod proposal;
pub mod user;
