//! `[serve]`: where the dev server listens and what `/@fs/` may read.
//!
//! ```toml
//! [serve]
//! interface = "0.0.0.0"   # reachable from the LAN
//! port = 5173             # websocket takes the next free port after it
//! allow = ["../shared"]
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub interface: IpAddr,
    pub port: u16,
    /// Root-relative directories served under `/@fs/` besides the root.
    pub allow: Vec<PathBuf>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5173,
            allow: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::path::PathBuf;

    use crate::config::test_parse_config;

    #[test]
    fn test_defaults_bind_loopback() {
        let serve = test_parse_config("").serve;
        assert_eq!(serve.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(serve.port, 5173);
        assert!(serve.allow.is_empty());
    }

    #[test]
    fn test_lan_interface_and_allow_list() {
        let serve = test_parse_config(
            r#"
            [serve]
            interface = "0.0.0.0"
            port = 3000
            allow = ["../shared", "vendor"]
            "#,
        )
        .serve;
        assert!(serve.interface.is_unspecified());
        assert_eq!(serve.port, 3000);
        assert_eq!(
            serve.allow,
            [PathBuf::from("../shared"), PathBuf::from("vendor")]
        );
    }

    #[test]
    fn test_ipv6_interface() {
        let serve = test_parse_config("[serve]\ninterface = \"::1\"").serve;
        assert_eq!(serve.interface, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }
}
