//! Build-time worker manifest.
//!
//! These values ship with a deployment and change only by releasing a new
//! worker. Bumping [`CACHE_NAME`] starts a new store generation; the previous
//! one is deleted on activation.

use crate::store::GenerationId;

/// Current store generation.
pub const CACHE_NAME: &str = "dougcast-v1";

/// Same-origin assets, relative to the worker scope. Always cached on install.
pub const STATIC_ASSETS: &[&str] = &["./", "./index.html", "./manifest.json"];

/// Third-party bundles the app loads from CDNs. Cached opportunistically on install.
pub const CDN_ASSETS: &[&str] = &[
    "https://unpkg.com/react@18/umd/react.development.js",
    "https://unpkg.com/react-dom@18/umd/react-dom.development.js",
    "https://unpkg.com/@babel/standalone/babel.min.js",
    "https://cdn.tailwindcss.com",
];

/// Podcast directory and CORS proxy hosts; always fetched fresh.
pub const API_PROXY_HOSTS: &[&str] = &["api.allorigins.win", "itunes.apple.com"];

pub const AUDIO_MARKERS: &[&str] = &[".mp3", ".m4a"];

pub const IMAGE_CDN_HOST: &str = "is1-ssl.mzstatic.com";

pub const ARTWORK_MARKER: &str = "artwork";

/// Cross-origin hosts whose successful responses may be persisted.
pub const ASSET_ALLOWLIST_HOSTS: &[&str] = &["unpkg.com", "cdn.tailwindcss.com"];

pub const PRODUCT_NAME: &str = "DougCast";

pub const NOTIFICATION_ICON: &str = "./icon-192.png";

pub const NOTIFICATION_BADGE: &str = "./icon-192.png";

pub const VIBRATE_PATTERN: &[u32] = &[100, 50, 100];

/// Marker identifying an open window showing the app.
pub const HOME_DOCUMENT: &str = "index.html";

/// Document served to offline navigations.
pub const OFFLINE_DOCUMENT: &str = "./index.html";

pub const DEFAULT_NOTIFICATION_URL: &str = "./";

pub const SYNC_DOWNLOADS_TAG: &str = "sync-downloads";

/// Immutable worker manifest, injected into every component at construction.
///
/// [`Manifest::builtin`] carries the shipped constants; tests build variants
/// with struct update syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub cache_name: GenerationId,
    pub static_assets: Vec<String>,
    pub cdn_assets: Vec<String>,
    pub api_proxy_hosts: Vec<String>,
    pub audio_markers: Vec<String>,
    pub image_cdn_host: String,
    pub artwork_marker: String,
    pub asset_allowlist_hosts: Vec<String>,
    pub product_name: String,
    pub notification_icon: String,
    pub notification_badge: String,
    pub vibrate_pattern: Vec<u32>,
    pub home_document: String,
    pub offline_document: String,
    pub default_notification_url: String,
    pub sync_downloads_tag: String,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Manifest {
    pub fn builtin() -> Self {
        Self {
            cache_name: GenerationId::new(CACHE_NAME),
            static_assets: owned(STATIC_ASSETS),
            cdn_assets: owned(CDN_ASSETS),
            api_proxy_hosts: owned(API_PROXY_HOSTS),
            audio_markers: owned(AUDIO_MARKERS),
            image_cdn_host: IMAGE_CDN_HOST.into(),
            artwork_marker: ARTWORK_MARKER.into(),
            asset_allowlist_hosts: owned(ASSET_ALLOWLIST_HOSTS),
            product_name: PRODUCT_NAME.into(),
            notification_icon: NOTIFICATION_ICON.into(),
            notification_badge: NOTIFICATION_BADGE.into(),
            vibrate_pattern: VIBRATE_PATTERN.to_vec(),
            home_document: HOME_DOCUMENT.into(),
            offline_document: OFFLINE_DOCUMENT.into(),
            default_notification_url: DEFAULT_NOTIFICATION_URL.into(),
            sync_downloads_tag: SYNC_DOWNLOADS_TAG.into(),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::builtin()
    }
}
