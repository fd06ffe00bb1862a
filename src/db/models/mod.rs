pub mod preference;

pub use preference::StoredPreference;
