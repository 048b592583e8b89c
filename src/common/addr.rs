use std::net::{IpAddr, SocketAddr};

use anyhow::Result;

/// 候选 IP 的地址族，按字面形式判断（含 `:` 即 IPv6）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn of(ip: &str) -> Self {
        if is_ipv6(ip) {
            IpFamily::V6
        } else {
            IpFamily::V4
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IpFamily::V4 => "ipv4",
            IpFamily::V6 => "ipv6",
        }
    }
}

pub fn is_ipv6(ip: &str) -> bool {
    ip.contains(':')
}

/// 解析 "ip" 或 "ip:port" 或 "[ipv6]" 或 "[ipv6]:port" 格式
pub fn parse_ip_port(s: &str, default_port: u16) -> Result<(IpAddr, u16)> {
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Ok((ip, default_port));
    }
    // 尝试 ip:port 或 [ipv6]:port
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok((addr.ip(), addr.port()));
    }
    // 尝试 [ipv6] 无端口
    let stripped = s.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = stripped.parse::<IpAddr>() {
        return Ok((ip, default_port));
    }
    anyhow::bail!("invalid DNS address: {}", s)
}
