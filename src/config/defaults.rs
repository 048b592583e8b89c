//! 内置的域名组、DNS 服务器与默认路径

use std::path::PathBuf;

use super::types::{DomainGroup, GroupPolicy};

/// 按优先级排列的公共 DNS 服务器
pub const DNS_SERVERS: &[&str] = &[
    "2402:4e00::",          // DNSPod (IPv6)
    "223.5.5.5",            // Alibaba DNS (IPv4)
    "119.29.29.29",         // DNSPod (IPv4)
    "2400:3200::1",         // Alibaba DNS (IPv6)
    "8.8.8.8",              // Google Public DNS (IPv4)
    "2001:4860:4860::8888", // Google Public DNS (IPv6)
    "114.114.114.114",      // 114 DNS
    "208.67.222.222",       // OpenDNS (IPv4)
    "2620:0:ccc::2",        // OpenDNS (IPv6)
];

pub fn dns_servers() -> Vec<String> {
    DNS_SERVERS.iter().map(|s| s.to_string()).collect()
}

pub fn domain_groups() -> Vec<DomainGroup> {
    use GroupPolicy::{Separate, Shared};

    vec![
        DomainGroup::new(
            "GitHub Services",
            Separate,
            &[
                "github.com",
                "api.github.com",
                "gist.github.com",
                "alive.github.com",
                "github.community",
                "central.github.com",
                "codeload.github.com",
                "collector.github.com",
                "vscode.dev",
                "github.blog",
                "live.github.com",
                "education.github.com",
                "github.global.ssl.fastly.net",
                "pipelines.actions.githubusercontent.com",
                "github-com.s3.amazonaws.com",
                "github-cloud.s3.amazonaws.com",
                "github-production-user-asset-6210df.s3.amazonaws.com",
                "github-production-release-asset-2e65be.s3.amazonaws.com",
                "github-production-repository-file-5c1aeb.s3.amazonaws.com",
            ],
        ),
        DomainGroup::new(
            "GitHub Asset",
            Shared,
            &[
                "github.io",
                "githubstatus.com",
                "assets-cdn.github.com",
                "github.githubassets.com",
            ],
        ),
        DomainGroup::new(
            "GitHub Static",
            Shared,
            &[
                "avatars.githubusercontent.com",
                "avatars0.githubusercontent.com",
                "avatars1.githubusercontent.com",
                "avatars2.githubusercontent.com",
                "avatars3.githubusercontent.com",
                "avatars4.githubusercontent.com",
                "avatars5.githubusercontent.com",
                "camo.githubusercontent.com",
                "cloud.githubusercontent.com",
                "desktop.githubusercontent.com",
                "favicons.githubusercontent.com",
                "github.map.fastly.net",
                "raw.githubusercontent.com",
                "media.githubusercontent.com",
                "objects.githubusercontent.com",
                "user-images.githubusercontent.com",
                "private-user-images.githubusercontent.com",
            ],
        ),
        DomainGroup::new("TMDB API", Shared, &["tmdb.org", "api.tmdb.org", "files.tmdb.org"]),
        DomainGroup::new(
            "THE MOVIEDB",
            Shared,
            &[
                "themoviedb.org",
                "api.themoviedb.org",
                "www.themoviedb.org",
                "auth.themoviedb.org",
            ],
        ),
        DomainGroup::new("TMDB Covers", Shared, &["image.tmdb.org", "images.tmdb.org"]),
        DomainGroup::new(
            "IMDB Web",
            Separate,
            &[
                "imdb.com",
                "www.imdb.com",
                "secure.imdb.com",
                "s.media-imdb.com",
                "us.dd.imdb.com",
                "www.imdb.to",
                "imdb-webservice.amazon.com",
                "origin-www.imdb.com",
                "origin.www.geo.imdb.com",
            ],
        ),
        DomainGroup::new(
            "IMDB Media",
            Separate,
            &[
                "m.media-amazon.com",
                "Images-na.ssl-images-amazon.com",
                "images-fe.ssl-images-amazon.com",
                "images-eu.ssl-images-amazon.com",
                "ia.media-imdb.com",
                "f.media-amazon.com",
                "imdb-video.media-imdb.com",
                "dqpnq362acqdi.cloudfront.net",
            ],
        ),
        DomainGroup::new(
            "Google Translate",
            Shared,
            &[
                "translate.google.com",
                "translate.googleapis.com",
                "translate-pa.googleapis.com",
            ],
        )
        .with_static_ips(&[
            "35.196.72.166",
            "209.85.232.195",
            "34.105.140.105",
            "216.239.32.40",
            "2404:6800:4008:c15::94",
            "2a00:1450:4001:829::201a",
            "2404:6800:4008:c13::5a",
            "2607:f8b0:4004:c07::66",
            "2607:f8b0:4004:c07::71",
            "2607:f8b0:4004:c07::8a",
            "2607:f8b0:4004:c07::8b",
            "172.253.62.100",
            "172.253.62.101",
            "172.253.62.102",
            "172.253.62.103",
        ]),
        DomainGroup::new(
            "JetBrains Plugins",
            Shared,
            &[
                "plugins.jetbrains.com",
                "download.jetbrains.com",
                "cache-redirector.jetbrains.com",
            ],
        ),
    ]
}

pub fn hosts_file_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}

/// `~/.setHosts/dns_cache/dns_records.json`
pub fn cache_file_path() -> PathBuf {
    let home = std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".setHosts").join("dns_cache").join("dns_records.json")
}
