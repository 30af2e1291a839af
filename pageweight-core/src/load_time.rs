// Load time estimation under simulated network profiles

use pageweight_scanner::{ResourceRecord, ResourceType};
use serde::Serialize;
use std::fmt;

/// A simulated connection class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkProfile {
    pub key: &'static str,
    pub name: &'static str,
    /// Megabits per second
    pub download_mbps: f64,
    /// Round trip latency in milliseconds
    pub latency_ms: f64,
    pub max_connections: usize,
}

impl NetworkProfile {
    pub fn bytes_per_ms(&self) -> f64 {
        self.download_mbps * 1024.0 * 1024.0 / 8000.0
    }
}

pub const NETWORK_PROFILES: [NetworkProfile; 5] = [
    NetworkProfile {
        key: "3G",
        name: "3G",
        download_mbps: 0.75,
        latency_ms: 100.0,
        max_connections: 6,
    },
    NetworkProfile {
        key: "4G",
        name: "4G/LTE",
        download_mbps: 10.0,
        latency_ms: 50.0,
        max_connections: 6,
    },
    NetworkProfile {
        key: "5G",
        name: "5G",
        download_mbps: 100.0,
        latency_ms: 10.0,
        max_connections: 10,
    },
    NetworkProfile {
        key: "WiFi",
        name: "WiFi",
        download_mbps: 50.0,
        latency_ms: 20.0,
        max_connections: 8,
    },
    NetworkProfile {
        key: "Cable",
        name: "Cable/Fiber",
        download_mbps: 200.0,
        latency_ms: 10.0,
        max_connections: 10,
    },
];

/// Time breakdown for one profile; all times in whole milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadTimeEstimate {
    pub profile: &'static str,
    pub download_time: u64,
    pub latency_time: u64,
    pub parse_render_time: u64,
    pub total_time: u64,
    pub total_with_render: u64,
    pub total_size: u64,
    pub resource_count: usize,
    pub average_speed: f64,
    pub max_connections: usize,
}

impl LoadTimeEstimate {
    pub fn speed_category(&self) -> SpeedCategory {
        SpeedCategory::for_ms(self.total_with_render as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedCategory {
    Excellent,
    Good,
    Fair,
    Slow,
    VerySlow,
}

impl SpeedCategory {
    pub fn for_ms(ms: f64) -> Self {
        if ms < 1000.0 {
            SpeedCategory::Excellent
        } else if ms < 2500.0 {
            SpeedCategory::Good
        } else if ms < 5000.0 {
            SpeedCategory::Fair
        } else if ms < 10_000.0 {
            SpeedCategory::Slow
        } else {
            SpeedCategory::VerySlow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpeedCategory::Excellent => "Excellent",
            SpeedCategory::Good => "Good",
            SpeedCategory::Fair => "Fair",
            SpeedCategory::Slow => "Slow",
            SpeedCategory::VerySlow => "Very Slow",
        }
    }
}

impl fmt::Display for SpeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One estimate per catalog profile; empty when there is nothing to load.
pub fn estimate_all(resources: &[ResourceRecord]) -> Vec<LoadTimeEstimate> {
    if resources.is_empty() {
        return Vec::new();
    }
    NETWORK_PROFILES
        .iter()
        .map(|profile| estimate(resources, profile))
        .collect()
}

pub fn estimate(resources: &[ResourceRecord], profile: &NetworkProfile) -> LoadTimeEstimate {
    let total_size: u64 = resources.iter().map(|r| r.size).sum();
    let count = resources.len();
    let connections = profile.max_connections.max(1);

    let download = parallel_download_ms(resources, profile.bytes_per_ms(), connections);

    let batches = count.div_ceil(connections).max(1);
    let latency = profile.latency_ms * 3.0 + profile.latency_ms * (batches - 1) as f64;

    let parse_render = parse_render_ms(resources);
    let total = latency + download;

    LoadTimeEstimate {
        profile: profile.name,
        download_time: download.round() as u64,
        latency_time: latency.round() as u64,
        parse_render_time: parse_render.round() as u64,
        total_time: total.round() as u64,
        total_with_render: (total + parse_render).round() as u64,
        total_size,
        resource_count: count,
        average_speed: profile.download_mbps,
        max_connections: profile.max_connections,
    }
}

/// Largest first, each resource goes to the least loaded connection.
/// The page is done when the busiest connection finishes.
pub fn parallel_download_ms(
    resources: &[ResourceRecord],
    bytes_per_ms: f64,
    connections: usize,
) -> f64 {
    let mut sizes: Vec<u64> = resources.iter().map(|r| r.size).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));

    let mut queues = vec![0.0_f64; connections.max(1)];
    for size in sizes {
        let mut idle = 0;
        for (i, queued) in queues.iter().enumerate() {
            if *queued < queues[idle] {
                idle = i;
            }
        }
        queues[idle] += size as f64 / bytes_per_ms;
    }

    queues.into_iter().fold(0.0, f64::max)
}

/// Per-type parse cost per KB plus a fixed render base of 100ms.
pub fn parse_render_ms(resources: &[ResourceRecord]) -> f64 {
    let parse: f64 = resources
        .iter()
        .map(|r| {
            let kb = r.size as f64 / 1024.0;
            match r.resource_type {
                ResourceType::Html => kb * 0.5,
                ResourceType::Css => kb * 0.3 + 50.0,
                ResourceType::Js => kb,
                ResourceType::Image => kb * 0.1,
                _ => kb * 0.05,
            }
        })
        .sum();
    parse + 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_ms() {
        // 8 Mbps is exactly 1024 * 1024 bytes per second
        let profile = NetworkProfile {
            key: "t",
            name: "t",
            download_mbps: 8.0,
            latency_ms: 0.0,
            max_connections: 1,
        };
        assert!((profile.bytes_per_ms() - 1048.576).abs() < 1e-9);
    }

    #[test]
    fn test_speed_category_thresholds() {
        assert_eq!(SpeedCategory::for_ms(999.0), SpeedCategory::Excellent);
        assert_eq!(SpeedCategory::for_ms(1000.0), SpeedCategory::Good);
        assert_eq!(SpeedCategory::for_ms(2500.0), SpeedCategory::Fair);
        assert_eq!(SpeedCategory::for_ms(5000.0), SpeedCategory::Slow);
        assert_eq!(SpeedCategory::for_ms(10_000.0), SpeedCategory::VerySlow);
        assert_eq!(SpeedCategory::VerySlow.to_string(), "Very Slow");
    }

    #[test]
    fn test_catalog() {
        let names: Vec<&str> = NETWORK_PROFILES.iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["3G", "4G/LTE", "5G", "WiFi", "Cable/Fiber"]);
    }
}
