// Optimization suggestions derived from a resource list

use crate::format::format_bytes;
use pageweight_scanner::{ResourceRecord, ResourceType};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

const KB: u64 = 1024;
const LARGE_IMAGE_BYTES: u64 = 200 * KB;
const IMAGE_HEAVY_BYTES: u64 = 2 * 1024 * KB;
const MINIFY_MIN_BYTES: u64 = 10 * KB;
const COMPRESSIBLE_MIN_BYTES: u64 = 100 * KB;
const TOO_MANY_REQUESTS: usize = 50;
const TARGET_REQUESTS: usize = 30;

const CDN_MARKERS: [&str; 9] = [
    "cdn.",
    "cloudfront.net",
    "cloudflare.com",
    "fastly.net",
    "akamai.net",
    "jsdelivr.net",
    "unpkg.com",
    "cdnjs.com",
    "gstatic.com",
];

/// Suggestion priority; sorts high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedResource {
    pub url: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: &'static str,
    pub category: &'static str,
    pub priority: Priority,
    pub title: &'static str,
    pub description: String,
    /// Estimated byte savings; 0 when the benefit is not measured in bytes.
    pub impact: u64,
    pub impact_text: String,
    pub actions: Vec<&'static str>,
    pub resources: Vec<AffectedResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionSummary {
    pub total_suggestions: usize,
    pub potential_savings: u64,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
    pub categories: Vec<String>,
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn fraction(bytes: u64, ratio: f64) -> u64 {
    (bytes as f64 * ratio).round() as u64
}

fn total(resources: &[&ResourceRecord]) -> u64 {
    resources.iter().map(|r| r.size).sum()
}

fn affected(resources: &[&ResourceRecord], keep_ratio: Option<f64>) -> Vec<AffectedResource> {
    resources
        .iter()
        .map(|r| AffectedResource {
            url: r.url.clone(),
            size: r.size,
            potential_size: keep_ratio.map(|ratio| fraction(r.size, ratio)),
        })
        .collect()
}

/// Run every check and return suggestions ordered high, medium, low.
pub fn suggest(resources: &[ResourceRecord]) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    check_images(resources, &mut suggestions);
    check_minification(resources, &mut suggestions);
    check_compression(resources, &mut suggestions);
    check_request_count(resources, &mut suggestions);
    check_cdn(resources, &mut suggestions);
    check_modern_formats(resources, &mut suggestions);
    check_https(resources, &mut suggestions);
    check_duplicates(resources, &mut suggestions);

    // stable, so checks keep their order within a priority
    suggestions.sort_by_key(|s| s.priority);
    suggestions
}

pub fn summarize(suggestions: &[Suggestion]) -> SuggestionSummary {
    let count = |priority: Priority| suggestions.iter().filter(|s| s.priority == priority).count();

    let mut seen = BTreeSet::new();
    let categories = suggestions
        .iter()
        .filter(|s| seen.insert(s.category))
        .map(|s| s.category.to_string())
        .collect();

    SuggestionSummary {
        total_suggestions: suggestions.len(),
        potential_savings: suggestions.iter().map(|s| s.impact).sum(),
        high_priority: count(Priority::High),
        medium_priority: count(Priority::Medium),
        low_priority: count(Priority::Low),
        categories,
    }
}

fn check_images(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let images: Vec<&ResourceRecord> = resources
        .iter()
        .filter(|r| r.resource_type == ResourceType::Image)
        .collect();
    if images.is_empty() {
        return;
    }

    let large: Vec<&ResourceRecord> = images
        .iter()
        .copied()
        .filter(|r| r.size > LARGE_IMAGE_BYTES)
        .collect();
    if !large.is_empty() {
        let savings = fraction(total(&large), 0.4);
        out.push(Suggestion {
            id: "compress-images",
            category: "Images",
            priority: Priority::High,
            title: "Compress Images",
            description: format!(
                "{} large image{} detected. Compressing images could reduce size by {}.",
                large.len(),
                plural(large.len()),
                format_bytes(savings)
            ),
            impact: savings,
            impact_text: format!("~{} savings", format_bytes(savings)),
            actions: vec![
                "Use image compression tools (TinyPNG, ImageOptim, Squoosh)",
                "Optimize images before uploading to your website",
                "Use appropriate quality settings (80-85% for JPEG)",
                "Remove unnecessary metadata from images",
            ],
            resources: affected(&large, Some(0.6)),
        });
    }

    let image_bytes = total(&images);
    if image_bytes > IMAGE_HEAVY_BYTES {
        let page_bytes: u64 = resources.iter().map(|r| r.size).sum();
        let percent = image_bytes as f64 / page_bytes as f64 * 100.0;
        out.push(Suggestion {
            id: "image-heavy",
            category: "Images",
            priority: Priority::Medium,
            title: "Image-Heavy Page",
            description: format!(
                "Images account for {:.1}% of total page size ({}). Consider lazy loading or responsive images.",
                percent,
                format_bytes(image_bytes)
            ),
            impact: fraction(image_bytes, 0.3),
            impact_text: "Potential improvement".to_string(),
            actions: vec![
                "Implement lazy loading for below-the-fold images",
                "Use responsive images with srcset attribute",
                "Consider using CSS sprites for small icons",
                "Load images progressively (progressive JPEG, interlaced PNG)",
            ],
            resources: Vec::new(),
        });
    }
}

fn check_minification(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let unminified: Vec<&ResourceRecord> = resources
        .iter()
        .filter(|r| matches!(r.resource_type, ResourceType::Css | ResourceType::Js))
        .filter(|r| !r.url.contains(".min.") && r.size > MINIFY_MIN_BYTES)
        .collect();
    if unminified.is_empty() {
        return;
    }

    let savings = fraction(total(&unminified), 0.3);
    out.push(Suggestion {
        id: "minify-files",
        category: "Code Optimization",
        priority: Priority::High,
        title: "Minify CSS/JavaScript Files",
        description: format!(
            "{} CSS/JS file{} appear to be unminified. Minification could reduce size by {}.",
            unminified.len(),
            plural(unminified.len()),
            format_bytes(savings)
        ),
        impact: savings,
        impact_text: format!("~{} savings", format_bytes(savings)),
        actions: vec![
            "Minify JavaScript files using terser or uglify-js",
            "Minify CSS files using cssnano or clean-css",
            "Use build tools (Webpack, Rollup, Parcel) for automatic minification",
            "Remove comments, whitespace, and unused code",
        ],
        resources: affected(&unminified, Some(0.7)),
    });
}

fn check_compression(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let text_bytes: u64 = resources
        .iter()
        .filter(|r| {
            matches!(
                r.resource_type,
                ResourceType::Html | ResourceType::Css | ResourceType::Js
            )
        })
        .map(|r| r.size)
        .sum();
    if text_bytes <= COMPRESSIBLE_MIN_BYTES {
        return;
    }

    let savings = fraction(text_bytes, 0.3);
    out.push(Suggestion {
        id: "enable-compression",
        category: "Server Configuration",
        priority: Priority::High,
        title: "Enable Gzip/Brotli Compression",
        description: format!(
            "Text-based resources ({}) could benefit from server compression. Enable gzip or brotli to reduce bandwidth by ~{}.",
            format_bytes(text_bytes),
            format_bytes(savings)
        ),
        impact: savings,
        impact_text: format!("~{} savings", format_bytes(savings)),
        actions: vec![
            "Enable Brotli compression on your web server",
            "Configure gzip compression as fallback for older browsers",
            "Compress HTML, CSS, JavaScript, JSON, XML, and SVG files",
            "Set appropriate compression levels (4-6 for good balance)",
        ],
        resources: Vec::new(),
    });
}

fn check_request_count(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let requests = resources.len();
    if requests <= TOO_MANY_REQUESTS {
        return;
    }

    out.push(Suggestion {
        id: "reduce-requests",
        category: "Network Optimization",
        priority: Priority::Medium,
        title: "Reduce HTTP Requests",
        description: format!(
            "Page makes {} HTTP requests. Each request adds latency. Consider combining resources to reduce requests.",
            requests
        ),
        impact: 0,
        impact_text: format!("Reduce by {} requests", requests - TARGET_REQUESTS),
        actions: vec![
            "Combine multiple CSS files into one",
            "Combine multiple JavaScript files into one",
            "Use CSS sprites for multiple small images",
            "Use HTTP/2 or HTTP/3 for multiplexing",
            "Remove unused third-party scripts",
        ],
        resources: Vec::new(),
    });
}

fn check_cdn(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let count = resources.len();
    if count <= 10 {
        return;
    }

    let on_cdn = resources
        .iter()
        .filter(|r| {
            let url = r.url.to_lowercase();
            CDN_MARKERS.iter().any(|marker| url.contains(marker))
        })
        .count();
    let percent = on_cdn as f64 / count as f64 * 100.0;
    if percent >= 20.0 {
        return;
    }

    out.push(Suggestion {
        id: "use-cdn",
        category: "Network Optimization",
        priority: Priority::Medium,
        title: "Consider Using a CDN",
        description: format!(
            "Only {:.0}% of resources are served from a CDN. Using a CDN can significantly improve load times globally.",
            percent
        ),
        impact: 0,
        impact_text: "Faster global delivery".to_string(),
        actions: vec![
            "Use a CDN for static assets (images, CSS, JavaScript)",
            "Serve libraries from public CDNs (cdnjs, jsdelivr, unpkg)",
            "Enable CDN caching with appropriate cache headers",
        ],
        resources: Vec::new(),
    });
}

fn check_modern_formats(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let images: Vec<&ResourceRecord> = resources
        .iter()
        .filter(|r| r.resource_type == ResourceType::Image)
        .collect();

    let has_modern = images.iter().any(|r| {
        let url = r.url.to_lowercase();
        url.contains(".webp") || url.contains(".avif")
    });
    let legacy: Vec<&ResourceRecord> = images
        .iter()
        .copied()
        .filter(|r| {
            let url = r.url.to_lowercase();
            url.contains(".jpg") || url.contains(".jpeg") || url.contains(".png")
        })
        .collect();

    if legacy.len() <= 3 || has_modern {
        return;
    }

    let savings = fraction(total(&legacy), 0.3);
    out.push(Suggestion {
        id: "modern-formats",
        category: "Images",
        priority: Priority::Medium,
        title: "Convert Images to WebP/AVIF",
        description: format!(
            "{} images use older formats (JPEG/PNG). Converting to WebP/AVIF could save ~{}.",
            legacy.len(),
            format_bytes(savings)
        ),
        impact: savings,
        impact_text: format!("~{} savings", format_bytes(savings)),
        actions: vec![
            "Convert images to WebP format (widely supported)",
            "Use AVIF for even better compression",
            "Provide fallbacks for older browsers using <picture> tag",
        ],
        resources: affected(&legacy, None),
    });
}

fn check_https(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let insecure: Vec<&ResourceRecord> = resources
        .iter()
        .filter(|r| r.url.to_lowercase().starts_with("http://"))
        .collect();
    if insecure.is_empty() {
        return;
    }

    out.push(Suggestion {
        id: "use-https",
        category: "Security",
        priority: Priority::High,
        title: "Use HTTPS for All Resources",
        description: format!(
            "{} resource{} loaded over insecure HTTP. This can cause security warnings and mixed content issues.",
            insecure.len(),
            if insecure.len() == 1 { " is" } else { "s are" }
        ),
        impact: 0,
        impact_text: "Security & SEO improvement".to_string(),
        actions: vec![
            "Update all resource URLs to use HTTPS",
            "Use Content Security Policy to enforce HTTPS",
            "Update third-party resources to HTTPS versions",
        ],
        resources: affected(&insecure, None),
    });
}

/// Coarser than `duplicates::analyze`: matches on the trailing URL file name only.
fn check_duplicates(resources: &[ResourceRecord], out: &mut Vec<Suggestion>) {
    let mut by_name: Vec<(&str, Vec<&ResourceRecord>)> = Vec::new();
    for resource in resources {
        let last = resource.url.rsplit('/').next().unwrap_or(&resource.url);
        let name = last.split('?').next().unwrap_or(last);
        match by_name.iter_mut().find(|(n, _)| *n == name) {
            Some((_, members)) => members.push(resource),
            None => by_name.push((name, vec![resource])),
        }
    }

    let repeated: Vec<&(&str, Vec<&ResourceRecord>)> =
        by_name.iter().filter(|(_, members)| members.len() > 1).collect();
    if repeated.is_empty() {
        return;
    }

    let wasted: u64 = repeated
        .iter()
        .map(|(_, members)| members[0].size * (members.len() as u64 - 1))
        .sum();
    let resources = repeated
        .iter()
        .flat_map(|(_, members)| affected(members, None))
        .collect();

    out.push(Suggestion {
        id: "remove-duplicates",
        category: "Code Optimization",
        priority: Priority::Medium,
        title: "Remove Duplicate Resources",
        description: format!(
            "{} resource{} loaded multiple times, wasting {} of bandwidth.",
            repeated.len(),
            if repeated.len() == 1 { " is" } else { "s are" },
            format_bytes(wasted)
        ),
        impact: wasted,
        impact_text: format!("~{} wasted", format_bytes(wasted)),
        actions: vec![
            "Check for duplicate script/link tags in HTML",
            "Ensure libraries are loaded only once",
            "Use a module bundler to prevent duplicate includes",
        ],
        resources,
    });
}
