//! Scope resolution
//!
//! Turns user-supplied scope strings such as
//! `https://contoso.sharepoint.com/sites/hr/Shared Documents/Policies/2024`
//! into a site URL, an optional drive (document library) name, and an
//! optional folder path inside that drive.

use serde::{Deserialize, Serialize};
use tracing::debug;

const SITES_SEGMENT: &str = "sites";

/// A site-level traversal target.
///
/// `root_url` always names a site (`.../sites/<name>`), never a drive or a
/// file. `folder_path` is relative to the root of the selected drive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeTarget {
    pub root_url: String,
    pub drive_name: Option<String>,
    pub folder_path: Option<String>,
}

impl ScopeTarget {
    /// Target covering every drive of a site.
    pub fn site(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            drive_name: None,
            folder_path: None,
        }
    }

    /// Parse one scope string.
    ///
    /// Returns `None` when the string has no `sites` segment, or when nothing
    /// follows that segment.
    ///
    /// ```
    /// use provider_sharepoint::ScopeTarget;
    ///
    /// let target = ScopeTarget::parse("https://host/sites/A/Shared Documents/sub folder").unwrap();
    /// assert_eq!(target.root_url, "https://host/sites/A");
    /// assert_eq!(target.drive_name.as_deref(), Some("Shared Documents"));
    /// assert_eq!(target.folder_path.as_deref(), Some("sub folder"));
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.trim().split('/').collect();
        let sites_index = parts.iter().position(|part| *part == SITES_SEGMENT)?;

        // `.../sites` with no site name cannot address a site
        let site_name = parts.get(sites_index + 1)?;
        if site_name.is_empty() {
            return None;
        }

        let root_url = parts[..sites_index + 2].join("/");
        let mut remaining = parts[sites_index + 2..]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| percent_decode(part));

        let drive_name = remaining.next();
        let folder: Vec<String> = remaining.collect();
        let folder_path = if folder.is_empty() {
            None
        } else {
            Some(folder.join("/"))
        };

        Some(Self {
            root_url,
            drive_name,
            folder_path,
        })
    }
}

/// Resolve scope strings into targets, dropping the ones that do not name a
/// site. An empty result means every site in the tenant.
pub fn resolve_scope<I, S>(raw_scopes: I) -> Vec<ScopeTarget>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw_scopes
        .into_iter()
        .filter_map(|raw| {
            let raw = raw.as_ref();
            let target = ScopeTarget::parse(raw);
            if target.is_none() {
                debug!(scope = raw, "Ignoring scope without a site segment");
            }
            target
        })
        .collect()
}

/// Percent-decode one path segment, keeping the raw text when the escapes do
/// not form valid UTF-8.
pub(crate) fn percent_decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_scope_without_sites_segment() {
        assert!(resolve_scope(["https://host/teams/x"]).is_empty());
        assert!(resolve_scope(["not a url"]).is_empty());
    }

    #[test]
    fn test_site_only() {
        let targets = resolve_scope(["  https://contoso.sharepoint.com/sites/hr  "]);

        assert_eq!(
            targets,
            vec![ScopeTarget::site("https://contoso.sharepoint.com/sites/hr")]
        );
    }

    #[test]
    fn test_drive_and_folder() {
        let target =
            ScopeTarget::parse("https://host/sites/A/Shared Documents/sub folder").unwrap();

        assert_eq!(target.root_url, "https://host/sites/A");
        assert_eq!(target.drive_name.as_deref(), Some("Shared Documents"));
        assert_eq!(target.folder_path.as_deref(), Some("sub folder"));
    }

    #[test]
    fn test_percent_encoded_segments_are_decoded() {
        let target = ScopeTarget::parse(
            "https://host/sites/A/Shared%20Documents/test/nested%20with%20spaces",
        )
        .unwrap();

        assert_eq!(target.drive_name.as_deref(), Some("Shared Documents"));
        assert_eq!(target.folder_path.as_deref(), Some("test/nested with spaces"));
    }

    #[test]
    fn test_trailing_slash_has_no_drive() {
        let target = ScopeTarget::parse("https://host/sites/A/").unwrap();

        assert_eq!(target.root_url, "https://host/sites/A");
        assert_eq!(target.drive_name, None);
        assert_eq!(target.folder_path, None);
    }

    #[test]
    fn test_sites_without_name_is_dropped() {
        assert!(ScopeTarget::parse("https://host/sites").is_none());
        assert!(ScopeTarget::parse("https://host/sites/").is_none());
    }

    #[test]
    fn test_first_sites_segment_wins() {
        let target = ScopeTarget::parse("https://host/sites/A/Docs/sites/B").unwrap();

        assert_eq!(target.root_url, "https://host/sites/A");
        assert_eq!(target.drive_name.as_deref(), Some("Docs"));
        assert_eq!(target.folder_path.as_deref(), Some("sites/B"));
    }

    #[test]
    fn test_order_is_preserved_and_empty_input_is_empty() {
        let targets = resolve_scope([
            "https://host/sites/B",
            "https://host/teams/skip",
            "https://host/sites/A/Policies",
        ]);

        let roots: Vec<_> = targets.iter().map(|t| t.root_url.as_str()).collect();
        assert_eq!(roots, vec!["https://host/sites/B", "https://host/sites/A"]);

        assert!(resolve_scope(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_invalid_escape_is_kept_verbatim() {
        assert_eq!(percent_decode("100%25"), "100%");
        assert_eq!(percent_decode("bad%FF"), "bad%FF");
    }
}
