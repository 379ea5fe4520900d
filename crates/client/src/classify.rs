//! Request classification.
//!
//! Rules are an ordered list evaluated top to bottom; the first match wins.
//! URL patterns overlap (an iTunes lookup can mention `artwork`, an episode
//! URL can sit on the image CDN), so the order is part of the contract:
//!
//! 1. `api-proxy`: URL contains an API proxy host
//! 2. `audio`: URL contains an audio extension, or `Accept` mentions audio
//! 3. `artwork`: URL contains the image CDN host or `artwork`, or destination is image
//! 4. `generic-cacheable`: everything else

use dougcast_core::{Destination, Manifest, Method, Request};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing label for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ApiProxy,
    Audio,
    Artwork,
    GenericCacheable,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiProxy => "api-proxy",
            Self::Audio => "audio",
            Self::Artwork => "artwork",
            Self::GenericCacheable => "generic-cacheable",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL and header markers the rules match against.
#[derive(Debug, Clone)]
pub struct Markers {
    pub api_proxy_hosts: Vec<String>,
    pub audio_markers: Vec<String>,
    pub image_cdn_host: String,
    pub artwork_marker: String,
}

impl From<&Manifest> for Markers {
    fn from(manifest: &Manifest) -> Self {
        Self {
            api_proxy_hosts: manifest.api_proxy_hosts.clone(),
            audio_markers: manifest.audio_markers.clone(),
            image_cdn_host: manifest.image_cdn_host.clone(),
            artwork_marker: manifest.artwork_marker.clone(),
        }
    }
}

/// One classification rule.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub category: Category,
    predicate: fn(&Request, &Markers) -> bool,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).field("category", &self.category).finish()
    }
}

impl Rule {
    pub fn matches(&self, request: &Request, markers: &Markers) -> bool {
        (self.predicate)(request, markers)
    }
}

fn is_api_proxy(request: &Request, markers: &Markers) -> bool {
    let href = request.url.as_str();
    markers.api_proxy_hosts.iter().any(|host| href.contains(host.as_str()))
}

fn is_audio(request: &Request, markers: &Markers) -> bool {
    let href = request.url.as_str();
    markers.audio_markers.iter().any(|ext| href.contains(ext.as_str()))
        || request.header("accept").is_some_and(|accept| accept.contains("audio"))
}

fn is_artwork(request: &Request, markers: &Markers) -> bool {
    let href = request.url.as_str();
    href.contains(markers.image_cdn_host.as_str())
        || href.contains(markers.artwork_marker.as_str())
        || request.destination == Destination::Image
}

/// Evaluation order. Do not reorder without updating the module docs.
const RULES: &[Rule] = &[
    Rule { name: "api-proxy-host", category: Category::ApiProxy, predicate: is_api_proxy },
    Rule { name: "audio-extension-or-accept", category: Category::Audio, predicate: is_audio },
    Rule { name: "artwork-host-or-image", category: Category::Artwork, predicate: is_artwork },
];

/// Assigns a [`Category`] to intercepted requests.
#[derive(Debug, Clone)]
pub struct Classifier {
    markers: Markers,
}

impl Classifier {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }

    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self::new(Markers::from(manifest))
    }

    /// The ordered rule list, ending before the `generic-cacheable` fallback.
    pub fn rules(&self) -> &'static [Rule] {
        RULES
    }

    /// Only GET requests are intercepted; everything else goes straight to the network.
    pub fn intercepts(&self, request: &Request) -> bool {
        request.method == Method::Get
    }

    pub fn classify(&self, request: &Request) -> Category {
        RULES
            .iter()
            .find(|rule| rule.matches(request, &self.markers))
            .map_or(Category::GenericCacheable, |rule| rule.category)
    }
}
