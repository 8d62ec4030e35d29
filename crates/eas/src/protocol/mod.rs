//! ActiveSync protocol surface
//!
//! This module provides:
//! - Wire constants for the Sync command
//! - Structured request/response types exchanged with the remote client
//! - The [`EasClient`] trait the engine sends requests through
//!
//! Encoding these types to WBXML over HTTP is the client's concern.

mod client;

pub use client::{EasClient, check_provisioning};

/// Folder extra under which the sync key is persisted
pub const EXTRA_SYNC_KEY: &str = "EXTRA_SYNC_KEY";

/// Sync key meaning "no sync state yet"
pub const INITIAL_SYNC_KEY: &str = "0";

/// Collection class for mail folders
pub const SYNC_CLASS_EMAIL: &str = "Email";

/// Collection status for a successful exchange
pub const STATUS_OK: u32 = 1;

/// Send MIME for all messages
pub const SYNC_OPTION_MIME_SUPPORT_FULL: u32 = 2;

/// Body preference type requesting the raw MIME message
pub const SYNC_BODY_PREF_TYPE_MIME: u32 = 4;

/// Server-imposed cap on items per window
pub const MAX_WINDOW_SIZE: usize = 30;

/// `GetChanges` value asking the server for pending deltas
pub const SYNC_GET_CHANGES: u32 = 1;

/// Status codes signalling that the device must be (re)provisioned
pub const STATUS_PROVISION_REQUIRED: [u32; 3] = [142, 143, 144];

/// Sync command request/response types
///
/// Field names serialize to the ActiveSync element names.
pub mod api {
    use serde::{Deserialize, Serialize};

    use super::{
        MAX_WINDOW_SIZE, SYNC_BODY_PREF_TYPE_MIME, SYNC_CLASS_EMAIL, SYNC_GET_CHANGES,
        SYNC_OPTION_MIME_SUPPORT_FULL,
    };

    /// Top-level Sync element, used for both requests and responses
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct Sync {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub status: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub collections: Option<SyncCollections>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncCollections {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub collection: Option<SyncCollection>,
    }

    /// One folder's worth of sync state and commands
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncCollection {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub class: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub sync_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub collection_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub status: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub get_changes: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub window_size: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub options: Option<SyncOptions>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub commands: Option<SyncCommands>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub responses: Option<SyncResponses>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub more_available: Option<bool>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncOptions {
        #[serde(rename = "MIMESupport", skip_serializing_if = "Option::is_none")]
        pub mime_support: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub body_preference: Option<SyncBodyPreference>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncBodyPreference {
        #[serde(rename = "Type")]
        pub body_type: u32,
        /// No cap when absent
        #[serde(skip_serializing_if = "Option::is_none")]
        pub truncation_size: Option<u64>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncCommands {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub add: Option<Vec<SyncItem>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub fetch: Option<Vec<SyncItem>>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncResponses {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub fetch: Option<Vec<SyncItem>>,
    }

    /// A single delta item (Add) or fetch request/result
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncItem {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub server_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub status: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub application_data: Option<SyncData>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncData {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub read: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub body: Option<SyncBody>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct SyncBody {
        #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
        pub body_type: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub estimated_data_size: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub truncated: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub data: Option<String>,
    }

    impl Sync {
        fn single(collection: SyncCollection) -> Self {
            Self {
                status: None,
                collections: Some(SyncCollections {
                    collection: Some(collection),
                }),
            }
        }

        /// Request establishing sync state for a folder: sentinel key, no options
        pub fn handshake(folder: &str, sync_key: &str) -> Self {
            Self::single(SyncCollection {
                class: Some(SYNC_CLASS_EMAIL.to_string()),
                sync_key: Some(sync_key.to_string()),
                collection_id: Some(folder.to_string()),
                ..Default::default()
            })
        }

        /// Request for the next window of deltas
        ///
        /// `window_size` is clamped to `[1, MAX_WINDOW_SIZE]`.
        pub fn window(folder: &str, sync_key: &str, window_size: usize, max_body_size: u64) -> Self {
            let window_size = window_size.clamp(1, MAX_WINDOW_SIZE) as u32;
            Self::single(SyncCollection {
                class: Some(SYNC_CLASS_EMAIL.to_string()),
                sync_key: Some(sync_key.to_string()),
                collection_id: Some(folder.to_string()),
                get_changes: Some(SYNC_GET_CHANGES),
                window_size: Some(window_size),
                options: Some(SyncOptions {
                    mime_support: Some(SYNC_OPTION_MIME_SUPPORT_FULL),
                    body_preference: Some(SyncBodyPreference {
                        body_type: SYNC_BODY_PREF_TYPE_MIME,
                        truncation_size: Some(max_body_size),
                    }),
                }),
                ..Default::default()
            })
        }

        /// Request for one message's full MIME body by server id
        pub fn fetch(folder: &str, sync_key: &str, server_id: &str) -> Self {
            Self::single(SyncCollection {
                class: Some(SYNC_CLASS_EMAIL.to_string()),
                sync_key: Some(sync_key.to_string()),
                collection_id: Some(folder.to_string()),
                options: Some(SyncOptions {
                    mime_support: Some(SYNC_OPTION_MIME_SUPPORT_FULL),
                    body_preference: Some(SyncBodyPreference {
                        body_type: SYNC_BODY_PREF_TYPE_MIME,
                        truncation_size: None,
                    }),
                }),
                commands: Some(SyncCommands {
                    add: None,
                    fetch: Some(vec![SyncItem {
                        server_id: Some(server_id.to_string()),
                        ..Default::default()
                    }]),
                }),
                ..Default::default()
            })
        }

        /// The single collection carried by this request or response
        pub fn collection(&self) -> Option<&SyncCollection> {
            self.collections.as_ref()?.collection.as_ref()
        }
    }

    impl SyncCollection {
        /// Items the server added since the last sync key
        pub fn added(&self) -> &[SyncItem] {
            self.commands
                .as_ref()
                .and_then(|c| c.add.as_deref())
                .unwrap_or_default()
        }

        /// Results of explicit fetch requests
        pub fn fetched(&self) -> &[SyncItem] {
            self.responses
                .as_ref()
                .and_then(|r| r.fetch.as_deref())
                .unwrap_or_default()
        }

        /// Whether the server has more deltas queued beyond this window
        pub fn has_more(&self) -> bool {
            self.more_available == Some(true)
        }
    }

    impl SyncItem {
        /// Body payload is a prefix of the real message
        pub fn is_truncated(&self) -> bool {
            self.body().and_then(|b| b.truncated) == Some(1)
        }

        /// Source marked the message as read
        pub fn is_read(&self) -> bool {
            self.application_data.as_ref().and_then(|d| d.read) == Some(1)
        }

        /// Raw MIME payload, empty when the server sent no body
        pub fn body_bytes(&self) -> &[u8] {
            self.body()
                .and_then(|b| b.data.as_deref())
                .unwrap_or_default()
                .as_bytes()
        }

        fn body(&self) -> Option<&SyncBody> {
            self.application_data.as_ref()?.body.as_ref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;
    use super::*;

    #[test]
    fn test_window_request_shape() {
        let request = Sync::window("inbox", "abc", 12, 51200);
        let json = serde_json::to_value(&request).unwrap();
        let collection = &json["Collections"]["Collection"];

        assert_eq!(collection["Class"], "Email");
        assert_eq!(collection["SyncKey"], "abc");
        assert_eq!(collection["CollectionId"], "inbox");
        assert_eq!(collection["GetChanges"], 1);
        assert_eq!(collection["WindowSize"], 12);
        assert_eq!(collection["Options"]["MIMESupport"], 2);
        assert_eq!(collection["Options"]["BodyPreference"]["Type"], 4);
        assert_eq!(collection["Options"]["BodyPreference"]["TruncationSize"], 51200);
    }

    #[test]
    fn test_window_size_clamped() {
        let big = Sync::window("inbox", "k", 500, 0);
        assert_eq!(big.collection().unwrap().window_size, Some(30));

        let zero = Sync::window("inbox", "k", 0, 0);
        assert_eq!(zero.collection().unwrap().window_size, Some(1));
    }

    #[test]
    fn test_handshake_has_no_options() {
        let request = Sync::handshake("inbox", INITIAL_SYNC_KEY);
        let collection = request.collection().unwrap();
        assert_eq!(collection.sync_key.as_deref(), Some("0"));
        assert!(collection.options.is_none());
        assert!(collection.window_size.is_none());
        assert!(collection.get_changes.is_none());
    }

    #[test]
    fn test_fetch_request_has_no_truncation() {
        let request = Sync::fetch("inbox", "k", "5:12");
        let json = serde_json::to_value(&request).unwrap();
        let collection = &json["Collections"]["Collection"];

        assert_eq!(collection["Commands"]["Fetch"][0]["ServerId"], "5:12");
        assert_eq!(collection["Options"]["BodyPreference"]["Type"], 4);
        assert!(collection["Options"]["BodyPreference"].get("TruncationSize").is_none());
        assert!(collection.get("WindowSize").is_none());
    }

    #[test]
    fn test_parse_response_items() {
        let json = r#"{
            "Collections": { "Collection": {
                "SyncKey": "k2",
                "CollectionId": "inbox",
                "Status": 1,
                "MoreAvailable": true,
                "Commands": { "Add": [
                    { "ServerId": "5:1", "ApplicationData": {
                        "Read": 1,
                        "Body": { "Type": 4, "Truncated": 1, "Data": "Subject: a\r\n\r\nhi" }
                    } },
                    { "ServerId": "5:2", "ApplicationData": {
                        "Body": { "Type": 4, "Truncated": 0, "Data": "Subject: b\r\n\r\nyo" }
                    } }
                ] }
            } }
        }"#;

        let response: Sync = serde_json::from_str(json).unwrap();
        let collection = response.collection().unwrap();
        assert!(collection.has_more());

        let added = collection.added();
        assert_eq!(added.len(), 2);
        assert!(added[0].is_truncated());
        assert!(added[0].is_read());
        assert!(!added[1].is_truncated());
        assert!(!added[1].is_read());
        assert_eq!(added[1].body_bytes(), b"Subject: b\r\n\r\nyo");
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let collection = SyncCollection::default();
        assert!(collection.added().is_empty());
        assert!(collection.fetched().is_empty());
        assert!(!collection.has_more());
        assert!(SyncItem::default().body_bytes().is_empty());
    }
}
