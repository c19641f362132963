//! # Bucket Registry
//!
//! Derives the fixed set of fairness buckets from the monitored namenode
//! list. Each `nameservice.namenode` entry contributes its nameservice once,
//! and the shared `concurrent` bucket is always appended last.

use std::collections::HashSet;

use super::errors::{FairnessError, FairnessResult};

/// Reserved bucket for calls that span more than one namespace
pub const CONCURRENT_NS: &str = "concurrent";

/// Split a comma separated monitor list (`"ns1.nn1, ns1.nn2, ns2.nn1"`)
/// into trimmed, non-empty entries.
pub fn parse_monitor_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ordered, de-duplicated bucket set plus the capacity bounds that apply
/// to it.
#[derive(Debug, Clone)]
pub struct BucketRegistry {
    buckets: Vec<String>,
    handler_count: u32,
    minimum_per_bucket: u32,
}

impl BucketRegistry {
    /// Build the registry.
    ///
    /// Fails when no tenant can be derived, when `handler_count` is zero, or
    /// when there are fewer handlers than buckets.
    pub fn new(
        monitored: &[String],
        handler_count: u32,
        minimum_per_bucket: u32,
    ) -> FairnessResult<Self> {
        let mut seen = HashSet::new();
        let mut buckets = Vec::new();

        for entry in monitored.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            let namespace = entry.split('.').next().unwrap_or("").trim();
            if namespace.is_empty() {
                return Err(FairnessError::InvalidNameService {
                    entry: entry.to_string(),
                });
            }
            if namespace != CONCURRENT_NS && seen.insert(namespace.to_string()) {
                buckets.push(namespace.to_string());
            }
        }

        if buckets.is_empty() {
            return Err(FairnessError::NoNameServices);
        }
        buckets.push(CONCURRENT_NS.to_string());

        if handler_count == 0 {
            return Err(FairnessError::InvalidHandlerCount {
                handlers: handler_count,
            });
        }
        if (handler_count as usize) < buckets.len() {
            return Err(FairnessError::InsufficientHandlers {
                handlers: handler_count,
                buckets: buckets.len(),
            });
        }

        Ok(Self {
            buckets,
            handler_count,
            minimum_per_bucket,
        })
    }

    /// All buckets, tenants first and the shared bucket last
    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn contains(&self, bucket: &str) -> bool {
        self.buckets.iter().any(|b| b == bucket)
    }

    /// Map an identifier to a known bucket, falling back to the shared
    /// bucket for anything unrecognized.
    pub fn resolve<'a>(&'a self, bucket: &'a str) -> &'a str {
        if self.contains(bucket) {
            bucket
        } else {
            CONCURRENT_NS
        }
    }

    /// Total handler capacity (`H`)
    pub fn handler_count(&self) -> u32 {
        self.handler_count
    }

    /// Guaranteed floor per bucket (`m`)
    pub fn minimum_per_bucket(&self) -> u32 {
        self.minimum_per_bucket
    }

    /// Even split `H / n`, rounded down
    pub fn even_share(&self) -> i64 {
        self.handler_count as i64 / self.buckets.len() as i64
    }
}
