//! Splits a selected resource URL into the identifier parts the script
//! generators address it by.

use serde::Serialize;

use crate::normalize::{path_of, path_segments, resource_id_of};
use crate::operation::HttpMethod;

// Positions within the path segments, `/subscriptions/{id}/resourceGroups/
// {rg}/providers/{namespace}/{type}/{name}/...`.
const SUBSCRIPTION_VALUE: usize = 1;
const RESOURCE_GROUP_KEY: usize = 2;
const RESOURCE_GROUP_VALUE: usize = 3;
const PROVIDER_KEY: usize = 4;
const PROVIDER_VALUE: usize = 5;
const RESOURCE_TYPE: usize = 6;
const RESOURCE_NAME: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ResourceIdentifier {
    /// Too shallow to carry a typed resource; addressed by its path.
    IdOnly { resource_id: String },
    GroupType {
        resource_group: String,
        resource_type: String,
    },
    /// `resource_type` and `resource_name` grow into `a/b` paths for nested
    /// types.
    GroupTypeName {
        resource_group: String,
        resource_type: String,
        resource_name: String,
    },
}

impl ResourceIdentifier {
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            ResourceIdentifier::IdOnly { resource_id } => Some(resource_id),
            _ => None,
        }
    }

    pub fn resource_group(&self) -> Option<&str> {
        match self {
            ResourceIdentifier::IdOnly { .. } => None,
            ResourceIdentifier::GroupType { resource_group, .. }
            | ResourceIdentifier::GroupTypeName { resource_group, .. } => Some(resource_group),
        }
    }

    pub fn resource_type(&self) -> Option<&str> {
        match self {
            ResourceIdentifier::IdOnly { .. } => None,
            ResourceIdentifier::GroupType { resource_type, .. }
            | ResourceIdentifier::GroupTypeName { resource_type, .. } => Some(resource_type),
        }
    }

    pub fn resource_name(&self) -> Option<&str> {
        match self {
            ResourceIdentifier::GroupTypeName { resource_name, .. } => Some(resource_name),
            _ => None,
        }
    }
}

/// A selected URL and the segments it is addressed by. POST list
/// selections are parsed as the listed resource itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmUrl {
    original_url: String,
    url: String,
    http_method: HttpMethod,
    segments: Vec<String>,
}

impl ArmUrl {
    pub fn parse(url: &str, http_method: HttpMethod) -> Self {
        let stripped = match url.len().checked_sub("/list".len()) {
            Some(cut)
                if http_method == HttpMethod::Post
                    && url.is_char_boundary(cut)
                    && url[cut..].eq_ignore_ascii_case("/list") =>
            {
                &url[..cut]
            }
            _ => url,
        };
        Self {
            original_url: url.to_string(),
            url: stripped.to_string(),
            http_method,
            segments: path_segments(stripped).into_iter().map(str::to_string).collect(),
        }
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// The URL with any list suffix removed.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.segment(SUBSCRIPTION_VALUE)
    }

    pub fn resource_group(&self) -> Option<&str> {
        self.segment(RESOURCE_GROUP_VALUE)
    }

    pub fn has_resource_type(&self) -> bool {
        self.segments.len() > RESOURCE_TYPE
    }

    pub fn has_resource_name(&self) -> bool {
        self.segments.len() > RESOURCE_NAME
    }

    pub fn has_resource_provider(&self) -> bool {
        self.segments.len() > PROVIDER_KEY
    }

    /// `/subscriptions/{id}/resourceGroups`, the collection new groups are
    /// created in.
    pub fn is_resource_group_url(&self) -> bool {
        self.segments.len() == RESOURCE_GROUP_KEY + 1
    }

    /// `/subscriptions/...` part of the original URL.
    pub fn complete_resource_id(&self) -> &str {
        resource_id_of(&self.original_url)
    }

    pub fn resource_identifier(&self) -> ResourceIdentifier {
        if !self.has_resource_type() {
            return ResourceIdentifier::IdOnly {
                resource_id: path_of(&self.url).to_string(),
            };
        }

        let resource_group = self.segments[RESOURCE_GROUP_VALUE].clone();
        let mut resource_type = format!(
            "{}/{}",
            self.segments[PROVIDER_VALUE], self.segments[RESOURCE_TYPE]
        );
        if !self.has_resource_name() {
            return ResourceIdentifier::GroupType {
                resource_group,
                resource_type,
            };
        }

        let mut resource_name = self.segments[RESOURCE_NAME].clone();
        for (idx, segment) in self.segments.iter().enumerate().skip(RESOURCE_NAME + 1) {
            let target = if idx % 2 == 0 {
                &mut resource_type
            } else {
                &mut resource_name
            };
            target.push('/');
            target.push_str(segment);
        }
        ResourceIdentifier::GroupTypeName {
            resource_group,
            resource_type,
            resource_name,
        }
    }

    fn segment(&self, idx: usize) -> Option<&str> {
        self.segments.get(idx).map(String::as_str)
    }
}
