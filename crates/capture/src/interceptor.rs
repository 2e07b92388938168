//! Network-request observation: records the first manifest-like URL.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::spec::ManifestUrl;

/// Callback handed to the rendering session, invoked once per outbound
/// request with the request's target URL. Must never block the request.
pub type RequestObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Marker substring identifying a stream-manifest request.
pub const DEFAULT_MARKER: &str = "m3u8";

/// Watches the page's outbound requests for the stream manifest.
///
/// The first URL containing the marker wins; later matches are ignored,
/// so the captured value is stable for the whole discovery run. The cell
/// is read only after the rendering session has been released.
pub struct ManifestInterceptor {
    marker: String,
    slot: Arc<OnceLock<ManifestUrl>>,
}

impl ManifestInterceptor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            slot: Arc::new(OnceLock::new()),
        }
    }

    /// The observation callback to register with the rendering session.
    /// Purely observational: the session lets every request proceed.
    pub fn observer(&self) -> RequestObserver {
        let marker = self.marker.clone();
        let slot = Arc::clone(&self.slot);
        Arc::new(move |url: &str| {
            if url.contains(&marker) && slot.set(ManifestUrl::new(url)).is_ok() {
                debug!(url, "manifest request observed");
            }
        })
    }

    /// The captured manifest URL, if any request matched.
    pub fn manifest(&self) -> Option<ManifestUrl> {
        self.slot.get().cloned()
    }
}

impl Default for ManifestInterceptor {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_request_wins() {
        let interceptor = ManifestInterceptor::default();
        let observer = interceptor.observer();

        observer("https://cdn.example/player.js");
        observer("https://cdn.example/stream/index.m3u8?token=first");
        observer("https://cdn.example/stream/index.m3u8?token=second");

        assert_eq!(
            interceptor.manifest(),
            Some(ManifestUrl::new(
                "https://cdn.example/stream/index.m3u8?token=first"
            )),
        );
    }

    #[test]
    fn no_match_leaves_the_cell_empty() {
        let interceptor = ManifestInterceptor::default();
        let observer = interceptor.observer();

        observer("https://cdn.example/player.js");
        observer("https://cdn.example/logo.png");

        assert!(interceptor.manifest().is_none());
    }

    #[test]
    fn custom_marker_is_honoured() {
        let interceptor = ManifestInterceptor::new(".mpd");
        let observer = interceptor.observer();

        observer("https://cdn.example/stream/index.m3u8");
        observer("https://cdn.example/stream/manifest.mpd");

        assert_eq!(
            interceptor.manifest(),
            Some(ManifestUrl::new("https://cdn.example/stream/manifest.mpd")),
        );
    }
}
