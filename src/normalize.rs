//! Canonical URL templates and the path helpers shared by the builder, the
//! tree and the identifier parser.

/// Literal segment spellings that differ across vendor catalogs.
const CASING_FIXES: &[(&str, &str)] = &[("resourcegroups", "resourceGroups")];

pub const PLACEHOLDER: &str = "{name}";

/// Canonical form of an operation URL template.
///
/// Every `{...}` placeholder becomes `{name}`, known vendor casing slips are
/// corrected, and a single trailing slash is dropped. Anything else passes
/// through unchanged. Historical placeholder renames (`serverFarms/{name}`
/// vs `serverFarms/{webHostingPlanName}`) are subsumed by the collapse.
pub fn normalize_template(template: &str) -> String {
    let collapsed = collapse_placeholders(template);
    let mut out = collapsed
        .split('/')
        .map(fix_casing)
        .collect::<Vec<_>>()
        .join("/");
    if out.ends_with('/') {
        out.pop();
    }
    out
}

fn collapse_placeholders(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(PLACEHOLDER);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

fn fix_casing(segment: &str) -> &str {
    CASING_FIXES
        .iter()
        .find(|(from, _)| *from == segment)
        .map(|(_, to)| *to)
        .unwrap_or(segment)
}

pub fn is_placeholder(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Splits `https://host/path` into (`https://host`, `/path`). URLs without a
/// scheme are all path.
pub fn split_origin(url: &str) -> (&str, &str) {
    match url.find("://") {
        Some(scheme_end) => {
            let host_start = scheme_end + 3;
            match url[host_start..].find('/') {
                Some(offset) => url.split_at(host_start + offset),
                None => (url, ""),
            }
        }
        None => ("", url),
    }
}

pub fn path_of(url: &str) -> &str {
    split_origin(url).1
}

pub fn path_segments(url: &str) -> Vec<&str> {
    path_of(url).split('/').filter(|s| !s.is_empty()).collect()
}

pub fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Parent of a path, or `None` once the path has a single segment left.
pub fn parent_path(url: &str) -> Option<&str> {
    let (origin, path) = split_origin(url);
    let trimmed = path.trim_end_matches('/');
    let cut = trimmed.rfind('/')?;
    if trimmed[..cut].trim_matches('/').is_empty() {
        return None;
    }
    Some(&url[..origin.len() + cut])
}

/// The part of a resource URL from `/subscriptions` on, or its whole path
/// when it is not subscription scoped.
pub fn resource_id_of(url: &str) -> &str {
    match url.find("/subscriptions") {
        Some(idx) => &url[idx..],
        None => path_of(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_placeholders() {
        assert_eq!(
            normalize_template("/subscriptions/{subscriptionId}/resourcegroups/{resourceGroupName}/"),
            "/subscriptions/{name}/resourceGroups/{name}"
        );
    }

    #[test]
    fn keeps_host_and_only_strips_one_slash() {
        assert_eq!(
            normalize_template("https://management.azure.com/providers/{ns}//"),
            "https://management.azure.com/providers/{name}/"
        );
    }

    #[test]
    fn malformed_templates_pass_through() {
        assert_eq!(normalize_template("/a/{unterminated"), "/a/{unterminated");
        assert_eq!(normalize_template(""), "");
    }

    #[test]
    fn casing_fix_is_segment_exact() {
        assert_eq!(normalize_template("/x/myresourcegroups"), "/x/myresourcegroups");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_template("/subscriptions/{id}/resourcegroups/{rg}/providers/Microsoft.Web/sites/{site}/");
        assert_eq!(normalize_template(&once), once);
    }

    #[test]
    fn parent_paths() {
        assert_eq!(parent_path("/subscriptions/{name}"), Some("/subscriptions"));
        assert_eq!(parent_path("/subscriptions"), None);
        assert_eq!(
            parent_path("https://h.example/subscriptions/{name}"),
            Some("https://h.example/subscriptions")
        );
        assert_eq!(parent_path("https://h.example/subscriptions"), None);
    }

    #[test]
    fn segments_ignore_origin() {
        assert_eq!(
            path_segments("https://h.example/subscriptions/abc"),
            vec!["subscriptions", "abc"]
        );
        assert_eq!(resource_id_of("https://h.example/subscriptions/abc"), "/subscriptions/abc");
        assert_eq!(resource_id_of("https://h.example/providers"), "/providers");
    }
}
