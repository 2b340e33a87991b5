//! Client-side assets and external viewer links.

use maud::html;

/// Bokeh release used when assets are enabled without a pinned version.
pub const DEFAULT_BOKEH_VERSION: &str = "3.4.1";

const BOKEH_CDN: &str = "https://cdn.bokeh.org/bokeh/release";

/// Decides which include tags a rendered document needs.
///
/// Returning `None` leaves the document untouched. The tags are inserted once,
/// immediately before the first surviving input block.
pub trait AssetInjector {
    fn prelude(&self, document: &str) -> Option<String>;
}

/// Bokeh style sheet and scripts, for documents that mention bokeh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BokehAssets {
    /// Version of the core bundle, `None` to leave it out.
    pub version: Option<String>,
    /// Version of the widgets bundle, `None` to leave it out.
    pub widgets_version: Option<String>,
}

impl BokehAssets {
    pub fn new(version: Option<&str>, widgets_version: Option<&str>) -> Self {
        Self {
            version: version.map(str::to_string),
            widgets_version: widgets_version.map(str::to_string),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.version.is_some() || self.widgets_version.is_some()
    }
}

impl AssetInjector for BokehAssets {
    fn prelude(&self, document: &str) -> Option<String> {
        if !self.is_enabled() || !document.contains("bokeh") {
            return None;
        }
        let markup = html! {
            @if let Some(v) = &self.version {
                link href=(format!("{BOKEH_CDN}/bokeh-{v}.min.css")) rel="stylesheet" type="text/css";
                script src=(format!("{BOKEH_CDN}/bokeh-{v}.min.js")) {}
            }
            @if let Some(v) = &self.widgets_version {
                script src=(format!("{BOKEH_CDN}/bokeh-widgets-{v}.min.js")) {}
            }
        };
        Some(markup.into_string())
    }
}

/// Public Jupyter viewer URL for a notebook hosted at `url`.
///
/// GitHub URLs use the viewer's `github` route with the original path; any
/// other host is fetched through the `url` route. Returns `None` when `url`
/// has no scheme and host.
pub fn nbviewer_link(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (host, path) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    if host.is_empty() {
        return None;
    }
    let link = if host.eq_ignore_ascii_case("github.com") || host.eq_ignore_ascii_case("www.github.com") {
        format!("https://nbviewer.org/github{path}")
    } else {
        format!("https://nbviewer.org/url/{host}{path}")
    };
    Some(link)
}
