//! In-place rewrite of backend addresses in a published document.
//!
//! The patcher touches nothing but the host segment of matching target
//! URLs: router rules, health checks, and services that reference neither
//! id list are preserved verbatim.

use std::collections::HashMap;
use std::path::Path;

use log::info;

use super::model::DynamicConfig;
use crate::error::Result;
use crate::types::short_id;

/// Rewrite every target whose host equals `old_ids[i]` to `new_ids[i]`.
///
/// Pairing is strictly positional and stops at the shorter list; the
/// unmatched tail is ignored. Target URLs that do not parse as
/// `scheme://host:port` are left untouched. Returns the number of
/// rewritten targets.
pub fn patch_addresses(config: &mut DynamicConfig, old_ids: &[String], new_ids: &[String]) -> usize {
    let replacements: HashMap<&str, &str> = old_ids
        .iter()
        .zip(new_ids.iter())
        .map(|(old, new)| (short_id(old), short_id(new)))
        .collect();

    let mut rewritten = 0;
    for (service, backend) in &mut config.http.services {
        for server in &mut backend.load_balancer.servers {
            let rewrite = split_target(&server.url).and_then(|(scheme, host, port)| {
                replacements.get(host).map(|new_host| {
                    info!(
                        "Updated backend for service {}: {} -> {}",
                        service, host, new_host
                    );
                    format!("{scheme}://{new_host}:{port}")
                })
            });
            if let Some(url) = rewrite {
                server.url = url;
                rewritten += 1;
            }
        }
    }
    rewritten
}

/// Load the published document, patch it, and republish atomically.
pub fn patch_file(path: &Path, old_ids: &[String], new_ids: &[String]) -> Result<usize> {
    let mut config = super::load(path)?;
    let rewritten = patch_addresses(&mut config, old_ids, new_ids);
    super::publish(path, &config)?;
    Ok(rewritten)
}

/// Split a target URL of the expected `scheme://host:port` shape.
fn split_target(url: &str) -> Option<(&str, &str, &str)> {
    let (scheme, rest) = url.split_once("://")?;
    let (host, port) = rest.rsplit_once(':')?;
    if scheme.is_empty() || host.is_empty() || port.is_empty() {
        return None;
    }
    Some((scheme, host, port))
}
