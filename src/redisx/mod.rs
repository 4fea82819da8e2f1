//! Redis master discovery through sentinel.
//!
//! `REDIS_IPS` lists the sentinel hosts (default port 26379); the actual
//! master for the `mymaster` service is resolved through them. The main
//! connection is multiplexed; pub/sub needs its own dedicated connection
//! and is opened separately from the same resolved client.

use redis::sentinel::Sentinel;

use crate::error::HarnessError;

pub const SENTINEL_PORT: u16 = 26379;
pub const SERVICE_NAME: &str = "mymaster";

/// Resolve the current master for [`SERVICE_NAME`] via the given sentinels.
pub async fn master_client(sentinel_hosts: &[String]) -> Result<redis::Client, HarnessError> {
    let urls: Vec<String> = sentinel_hosts.iter().map(|h| sentinel_url(h)).collect();
    let mut sentinel = Sentinel::build(urls)?;
    let client = sentinel.async_master_for(SERVICE_NAME, None).await?;
    Ok(client)
}

fn sentinel_url(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else if host.contains(':') {
        format!("redis://{host}")
    } else {
        format!("redis://{host}:{SENTINEL_PORT}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_become_sentinel_urls() {
        assert_eq!(sentinel_url("10.0.0.9"), "redis://10.0.0.9:26379");
        assert_eq!(sentinel_url("10.0.0.9:26380"), "redis://10.0.0.9:26380");
        assert_eq!(sentinel_url("redis://already"), "redis://already");
    }
}
