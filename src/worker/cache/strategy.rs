//! Cache strategy selection
//!
//! | Resource class            | Strategy               |
//! |---------------------------|------------------------|
//! | API call                  | network-first          |
//! | Navigation document       | network-first          |
//! | Image                     | cache-first            |
//! | Style / script / font     | stale-while-revalidate |
//!
//! Cross-origin and non-GET requests are not intercepted.

use super::fetch::{Destination, FetchRequest};
use reqwest::{Method, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Api,
    Document,
    Image,
    Asset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl ResourceClass {
    pub fn strategy(&self) -> CacheStrategy {
        match self {
            ResourceClass::Api | ResourceClass::Document => CacheStrategy::NetworkFirst,
            ResourceClass::Image => CacheStrategy::CacheFirst,
            ResourceClass::Asset => CacheStrategy::StaleWhileRevalidate,
        }
    }
}

/// Origins the router may intercept
#[derive(Debug, Clone)]
pub struct Scope {
    app_origin: Url,
    api_base: Url,
}

impl Scope {
    pub fn new(app_origin: Url, api_base: Url) -> Self {
        Self { app_origin, api_base }
    }

    pub fn app_origin(&self) -> &Url {
        &self.app_origin
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Whether `url` is an API call
    pub fn is_api(&self, url: &Url) -> bool {
        let base = self.api_base.path().trim_end_matches('/');
        url.origin() == self.api_base.origin()
            && (base.is_empty() || url.path() == base || url.path().starts_with(&format!("{}/", base)))
    }

    /// Path segments of an API url below the API base
    pub fn api_segments<'a>(&self, url: &'a Url) -> Vec<&'a str> {
        let base_depth = self
            .api_base
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).count())
            .unwrap_or(0);
        url.path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).skip(base_depth).collect())
            .unwrap_or_default()
    }

    /// Class of a request, or `None` if it must pass through untouched
    pub fn classify(&self, request: &FetchRequest) -> Option<ResourceClass> {
        if request.method != Method::GET {
            return None;
        }
        if self.is_api(&request.url) {
            return Some(ResourceClass::Api);
        }
        if request.url.origin() != self.app_origin.origin() {
            return None;
        }
        match request.destination {
            Destination::Document => Some(ResourceClass::Document),
            Destination::Image => Some(ResourceClass::Image),
            Destination::Style | Destination::Script | Destination::Font => Some(ResourceClass::Asset),
            Destination::Empty => None,
        }
    }
}
