//! Resource URI parsing.
//!
//! Two URI forms address a resource inside a data source:
//!
//! | Form | Example |
//! |------|---------|
//! | Direct | `filesystem-local:./src/lib.rs` |
//! | Multi-instance | `bb+filesystem+docs://notes/a.md` |
//!
//! The direct form's scheme is `<providerType>-<name>`. The multi-instance
//! form carries a leading scheme (`bb` for direct access, `mcp` for
//! protocol-bridged access) followed by the provider type and the data
//! source name. Paths are percent-decoded and always relative to the data
//! source root.

use crate::error::{Operation, ResourceError, ResourceResult};

/// Scheme prefix of multi-instance URIs for directly accessed providers.
pub const DIRECT_SCHEME: &str = "bb";
/// Scheme prefix of multi-instance URIs for protocol-bridged providers.
pub const BRIDGED_SCHEME: &str = "mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriForm {
    /// `scheme:./relative/path`
    Direct,
    /// `scheme+providerType+name://relative/path`
    MultiInstance,
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUri {
    /// Raw scheme: `filesystem-local` or `bb`.
    pub scheme: String,
    /// Provider type for multi-instance URIs; `None` for the direct form.
    pub provider_type: Option<String>,
    /// Data source name for multi-instance URIs; `None` for the direct form.
    pub name: Option<String>,
    /// Decoded path relative to the data source root, without a leading `./`.
    pub path: String,
    pub form: UriForm,
}

impl ResourceUri {
    pub fn parse(uri: &str) -> ResourceResult<Self> {
        if let Some((scheme_part, rest)) = uri.split_once("://") {
            let parts: Vec<&str> = scheme_part.splitn(3, '+').collect();
            if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
                return Err(ResourceError::invalid_uri(
                    uri,
                    Operation::Resolve,
                    "expected scheme+providerType+name://path",
                ));
            }
            return Ok(Self {
                scheme: parts[0].to_string(),
                provider_type: Some(parts[1].to_string()),
                name: Some(parts[2].to_string()),
                path: decode_path(uri, rest)?,
                form: UriForm::MultiInstance,
            });
        }

        match uri.split_once(':') {
            Some((scheme, rest)) if !scheme.is_empty() => Ok(Self {
                scheme: scheme.to_string(),
                provider_type: None,
                name: None,
                path: decode_path(uri, rest)?,
                form: UriForm::Direct,
            }),
            _ => Err(ResourceError::invalid_uri(
                uri,
                Operation::Resolve,
                "missing scheme",
            )),
        }
    }

    /// Build a direct-form URI for a path.
    pub fn direct(scheme: &str, path: &str) -> String {
        format!("{}:./{}", scheme, trim_relative(path))
    }

    /// Build a multi-instance URI for a path.
    pub fn multi_instance(scheme: &str, provider_type: &str, name: &str, path: &str) -> String {
        format!(
            "{}+{}+{}://{}",
            scheme,
            provider_type,
            name,
            trim_relative(path)
        )
    }
}

fn trim_relative(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_start_matches('/')
}

fn decode_path(uri: &str, raw: &str) -> ResourceResult<String> {
    let decoded = urlencoding::decode(raw)
        .map_err(|e| ResourceError::invalid_uri(uri, Operation::Resolve, e.to_string()))?;
    Ok(trim_relative(&decoded).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_form() {
        let uri = ResourceUri::parse("filesystem-local:./src/lib.rs").unwrap();
        assert_eq!(uri.form, UriForm::Direct);
        assert_eq!(uri.scheme, "filesystem-local");
        assert_eq!(uri.path, "src/lib.rs");
        assert!(uri.name.is_none());
    }

    #[test]
    fn parses_multi_instance_form() {
        let uri = ResourceUri::parse("bb+filesystem+docs://notes/a%20b.md").unwrap();
        assert_eq!(uri.form, UriForm::MultiInstance);
        assert_eq!(uri.scheme, "bb");
        assert_eq!(uri.provider_type.as_deref(), Some("filesystem"));
        assert_eq!(uri.name.as_deref(), Some("docs"));
        assert_eq!(uri.path, "notes/a b.md");
    }

    #[test]
    fn name_may_contain_plus() {
        let uri = ResourceUri::parse("mcp+gdrive+work+shared://doc/123").unwrap();
        assert_eq!(uri.name.as_deref(), Some("work+shared"));
    }

    #[test]
    fn rejects_incomplete_scheme() {
        assert!(ResourceUri::parse("bb+filesystem://x").is_err());
        assert!(ResourceUri::parse("no-scheme-here").is_err());
    }

    #[test]
    fn builders_emit_parseable_uris() {
        let direct = ResourceUri::direct("filesystem-local", "./a/b.txt");
        assert_eq!(direct, "filesystem-local:./a/b.txt");
        let multi = ResourceUri::multi_instance("bb", "filesystem", "docs", "/a.md");
        assert_eq!(multi, "bb+filesystem+docs://a.md");
        assert_eq!(ResourceUri::parse(&multi).unwrap().path, "a.md");
    }
}
