//! Microsoft Graph API response types
//!
//! Data structures for deserializing the site, drive, and driveItem
//! resources the connector reads. Only the fields the connector needs are
//! modelled; everything else in the payload is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Graph site resource
///
/// See: https://learn.microsoft.com/graph/api/resources/site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,

    /// Absolute URL of the site
    pub web_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// One page of `GET /sites/getAllSites`
#[derive(Debug, Deserialize)]
pub struct SitesPage {
    #[serde(default)]
    pub value: Vec<Site>,

    /// Absolute URL of the next page
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Graph drive (document library) resource
///
/// See: https://learn.microsoft.com/graph/api/resources/drive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

/// Response of `GET /sites/{id}/drives`
#[derive(Debug, Deserialize)]
pub struct DrivesPage {
    #[serde(default)]
    pub value: Vec<Drive>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Graph driveItem resource
///
/// See: https://learn.microsoft.com/graph/api/resources/driveitem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,

    /// Size in bytes; not guaranteed to be present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    pub last_modified_date_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    #[serde(default)]
    pub parent_reference: ItemReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<IdentitySet>,

    /// Present when the item is a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileFacet>,

    /// Present when the item is a folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderFacet>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }

    /// Drive holding this item, as reported by the parent reference.
    pub fn drive_id(&self) -> Option<&str> {
        self.parent_reference.drive_id.as_deref()
    }

    /// Raw Graph path of the parent, e.g. `/drives/b!x/root:/Reports/2024`.
    pub fn parent_path(&self) -> Option<&str> {
        self.parent_reference.path.as_deref()
    }

    /// The user who last modified the item, if the service reported one.
    pub fn last_modifier(&self) -> Option<&Identity> {
        self.last_modified_by.as_ref().and_then(|set| set.user.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentitySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: u64,
}

/// One page of `GET /drives/{id}/items/{id}/children`
#[derive(Debug, Deserialize)]
pub struct DriveItemsPage {
    #[serde(default)]
    pub value: Vec<DriveItem>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Graph error envelope
#[derive(Debug, Default, Deserialize)]
pub struct GraphErrorResponse {
    #[serde(default)]
    pub error: GraphErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphErrorBody {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,
}
