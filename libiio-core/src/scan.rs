// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The discovery/scan aggregator (spec.md §4.9 / C9): merges results from
//! per-backend discovery plugins behind a single filter grammar.

use libiio_common::IioError;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// A parsed `"local,usb=VID:PID,ip"` filter (spec.md §4.9). Per-backend
/// arguments are optional; `usb` defaults to `"*"` (any VID:PID) when given
/// with no argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub local: bool,
    pub usb: Option<String>,
    pub ip: bool,
}

impl ScanFilter {
    /// An empty filter string means "scan everything".
    pub fn parse(filter: &str) -> Result<ScanFilter, IioError> {
        if filter.trim().is_empty() {
            return Ok(ScanFilter { local: true, usb: Some("*".into()), ip: true });
        }
        let mut sf = ScanFilter::default();
        for part in filter.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, arg) = match part.split_once('=') {
                Some((n, a)) => (n, Some(a.to_string())),
                None => (part, None),
            };
            match name {
                "local" => sf.local = true,
                "usb" => sf.usb = Some(arg.unwrap_or_else(|| "*".into())),
                "ip" => sf.ip = true,
                other => {
                    return Err(IioError::BadArgument(format!("unknown scan backend: {other:?}")))
                }
            }
        }
        Ok(sf)
    }
}

/// One backend's discovery hook (spec.md §4.9): local sysfs enumeration,
/// USB VID/PID matching, or DNS-SD browsing. Returns `(uri, description)`
/// pairs.
pub trait ScanBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn scan(&self, filter: &ScanFilter) -> Result<Vec<(String, String)>, IioError>;
}

/// Fans a scan request out to every registered backend and merges the
/// results. A failing backend doesn't abort the scan, only its own
/// contribution (spec.md §7 propagation policy).
#[derive(Default)]
pub struct ScanAggregator {
    backends: Vec<Arc<dyn ScanBackend>>,
}

impl ScanAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn ScanBackend>) {
        self.backends.push(backend);
    }

    /// Runs every registered backend's discovery hook, de-duplicates by
    /// URI, and returns an ordered sequence of `(uri, description)` pairs.
    pub fn scan(&self, filter: &str) -> Result<Vec<(String, String)>, IioError> {
        let sf = ScanFilter::parse(filter)?;
        let mut results = Vec::new();
        for backend in &self.backends {
            match backend.scan(&sf) {
                Ok(mut found) => results.append(&mut found),
                Err(e) => warn!(backend = backend.name(), error = %e, "scan backend failed"),
            }
        }
        let mut seen = HashSet::new();
        results.retain(|(uri, _)| seen.insert(uri.clone()));
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        name: &'static str,
        entries: Vec<(String, String)>,
        fail: bool,
    }

    impl ScanBackend for FixedBackend {
        fn name(&self) -> &'static str {
            self.name
        }
        fn scan(&self, _filter: &ScanFilter) -> Result<Vec<(String, String)>, IioError> {
            if self.fail {
                Err(IioError::Io(std::io::Error::other("discovery failed")))
            } else {
                Ok(self.entries.clone())
            }
        }
    }

    #[test]
    fn parses_filter_grammar() {
        let sf = ScanFilter::parse("local,usb=0456:b673,ip").unwrap();
        assert!(sf.local);
        assert!(sf.ip);
        assert_eq!(sf.usb.as_deref(), Some("0456:b673"));
    }

    #[test]
    fn empty_filter_means_scan_everything() {
        let sf = ScanFilter::parse("").unwrap();
        assert!(sf.local && sf.ip && sf.usb.is_some());
    }

    #[test]
    fn rejects_unknown_backend_name() {
        assert!(ScanFilter::parse("bluetooth").is_err());
    }

    #[test]
    fn dedupes_by_uri_and_a_failing_backend_does_not_abort_the_scan() {
        let mut agg = ScanAggregator::new();
        agg.register(Arc::new(FixedBackend {
            name: "local",
            entries: vec![("local:".into(), "Local device".into())],
            fail: false,
        }));
        agg.register(Arc::new(FixedBackend {
            name: "ip",
            entries: vec![("ip:192.0.2.1".into(), "Remote".into())],
            fail: false,
        }));
        agg.register(Arc::new(FixedBackend { name: "usb", entries: vec![], fail: true }));
        // Same URI surfacing twice (e.g. two interfaces of the same host).
        agg.register(Arc::new(FixedBackend {
            name: "ip-dup",
            entries: vec![("ip:192.0.2.1".into(), "Remote (dup)".into())],
            fail: false,
        }));

        let results = agg.scan("local,usb,ip").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "ip:192.0.2.1");
        assert_eq!(results[1].0, "local:");
    }
}
