use crate::urls::{file_name, resource_type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a fetched resource, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Html,
    Css,
    Js,
    Image,
    Video,
    Audio,
    Font,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Html => "html",
            ResourceType::Css => "css",
            ResourceType::Js => "js",
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Audio => "audio",
            ResourceType::Font => "font",
            ResourceType::Other => "other",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource that was fetched with a non-zero size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub size: u64,
}

impl ResourceRecord {
    pub fn new(url: String, size: u64) -> Self {
        Self {
            name: file_name(&url),
            resource_type: resource_type(&url),
            url,
            size,
        }
    }

    /// The analyzed page itself. Always typed as html regardless of its file name.
    pub fn root(url: String, size: u64) -> Self {
        Self {
            name: file_name(&url),
            resource_type: ResourceType::Html,
            url,
            size,
        }
    }
}

/// Full content of the root document.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub content: String,
    pub size_bytes: u64,
    /// Name of the relay that served the document.
    pub relay: String,
}
