//! Core domain types and operations for Punchlist.

pub mod audit;
pub mod config;
pub mod doctor;
pub mod export;
pub mod init;
pub mod ledger;
pub mod lock;
pub mod ops;
pub mod plan;
pub mod store;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_env;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::version;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
