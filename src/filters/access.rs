//! IP deny-list access control.

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::StatusCode;

use crate::config::AccessFilterConfig;
use crate::filters::{Filter, FilterContext, FilterError, FilterResult, Rejection};

/// Rejects callers whose IP is on the deny list with 403.
#[derive(Debug, Default)]
pub struct IpAccessFilter {
    deny: HashSet<IpAddr>,
}

impl IpAccessFilter {
    pub const NAME: &'static str = "ip-access";

    pub fn from_config(config: &AccessFilterConfig) -> Result<Self, FilterError> {
        let deny = config
            .deny
            .iter()
            .map(|ip| {
                ip.parse::<IpAddr>().map_err(|e| FilterError::InvalidSettings {
                    filter: Self::NAME,
                    reason: format!("bad deny entry {ip:?}: {e}"),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { deny })
    }
}

impl Filter for IpAccessFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn pre(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        match ctx.inbound().client_addr() {
            Some(addr) if self.deny.contains(&addr.ip()) => Err(Rejection::new(
                StatusCode::FORBIDDEN,
                format!("client {} is denied", addr.ip()),
            )),
            _ => Ok(()),
        }
    }
}
