//! Build and version metadata, baked in at compile time by `build.rs`.

/// Crate version from Cargo.toml.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Package name from Cargo.toml.
pub fn package_version() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

/// Short git commit SHA at build time, or "unknown" outside a git checkout.
pub fn build_commit() -> &'static str {
    env!("DUPLEXD_COMMIT_SHA")
}

/// Build date (YYYY-MM-DD), or "unknown" if `date` was unavailable.
pub fn build_date() -> &'static str {
    env!("DUPLEXD_BUILD_DATE")
}

/// rustc version used to build this binary, or "unknown".
pub fn rustc_version() -> &'static str {
    env!("DUPLEXD_RUSTC_VERSION")
}

/// Full multi-line version banner for `duplexd --version`.
pub fn full_version_string() -> String {
    format!(
        "{}\ncommit: {}\nbuilt: {}\nrustc: {}",
        package_version(),
        build_commit(),
        build_date(),
        rustc_version()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_nonempty() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_package_version_contains_name() {
        assert!(package_version().contains("duplexd"));
    }

    #[test]
    fn test_full_version_string_has_all_fields() {
        let s = full_version_string();
        assert!(s.contains("commit:"));
        assert!(s.contains("built:"));
        assert!(s.contains("rustc:"));
    }
}
