//! User-Agent string for stream requests.

/// Product token sent with every request.
const PRODUCT: &str = "radio-dumper";

/// Default User-Agent for capture requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_capture_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_capture_user_agent();
        assert_eq!(
            ua.strip_prefix("radio-dumper/"),
            Some(env!("CARGO_PKG_VERSION")),
            "UA must be product/version: {ua}"
        );
    }
}
