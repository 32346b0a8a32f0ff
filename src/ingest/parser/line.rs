// SPDX-License-Identifier: Apache-2.0

//! Grammar for the detailed nginx access log format.
//!
//! ```nginx
//! log_format detailed '[$time_local] | $host | $remote_addr | $remote_user | '
//!                     '"$request" Status="$status" BodyBytesSent="$body_bytes_sent" '
//!                     'Referer="$http_referer" UserAgent="$http_user_agent" '
//!                     'RequestTime="$request_time" '
//!                     'UpstreamResponseTime="$upstream_response_time" '
//!                     'GzipRatio="$gzip_ratio"';
//! ```
//!
//! Example:
//! ```text
//! [10/Oct/2023:13:55:36 +0000] | example.com | 127.0.0.1 | - | "GET /x HTTP/1.1" Status="200" BodyBytesSent="1024" Referer="-" UserAgent="curl/7.0" RequestTime="0.002" UpstreamResponseTime="-" GzipRatio="-"
//! ```

use regex::Regex;

use crate::ingest::error::{Error, Result};

/// Regex pattern for the detailed access log format.
///
/// Captures:
/// - `time_local`: Timestamp in nginx format
/// - `host`: Virtual host that served the request
/// - `remote_addr`: Client IP address
/// - `remote_user`: Authenticated user (or `-`)
/// - `request`: Full request line (method + path + protocol)
/// - `status`: HTTP status code (or `-`)
/// - `body_bytes_sent`: Response body size (or `-`)
/// - `http_referer`: Referer header (or `-`)
/// - `http_user_agent`: User agent string (or `-`)
/// - `request_time`, `upstream_response_time`, `gzip_ratio`: decimals (or `-`)
pub const DETAILED_PATTERN: &str = concat!(
    r#"^\[(?P<time_local>[^\]]+)\]\s*\|\s*(?P<host>[^|]+?)\s*\|\s*"#,
    r#"(?P<remote_addr>[^|]+?)\s*\|\s*(?P<remote_user>[^|]+?)\s*\|\s*"#,
    r#""(?P<request>.*?)"\s*Status="(?P<status>[\d-]*)"\s*"#,
    r#"BodyBytesSent="(?P<body_bytes_sent>[\d-]*)"\s*"#,
    r#"Referer="(?P<http_referer>[^"]*)"\s*"#,
    r#"UserAgent="(?P<http_user_agent>[^"]*)"\s*"#,
    r#"RequestTime="(?P<request_time>[\d.\-]*)"\s*"#,
    r#"UpstreamResponseTime="(?P<upstream_response_time>[\d.\-]*)"\s*"#,
    r#"GzipRatio="(?P<gzip_ratio>[\d.\-]*)""#,
);

/// The raw strings captured from one matching line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCaptures<'a> {
    pub time_local: &'a str,
    pub host: &'a str,
    pub remote_addr: &'a str,
    pub remote_user: &'a str,
    pub request: &'a str,
    pub status: &'a str,
    pub body_bytes_sent: &'a str,
    pub http_referer: &'a str,
    pub http_user_agent: &'a str,
    pub request_time: &'a str,
    pub upstream_response_time: &'a str,
    pub gzip_ratio: &'a str,
}

/// Matches lines against [`DETAILED_PATTERN`]. Stateless and reusable.
#[derive(Debug, Clone)]
pub struct LineParser {
    regex: Regex,
}

impl LineParser {
    pub fn new() -> Result<Self> {
        let regex = Regex::new(DETAILED_PATTERN)
            .map_err(|e| Error::Config(format!("invalid regex pattern: {}", e)))?;
        Ok(Self { regex })
    }

    /// Match a single line (without its newline). Returns `None` when the
    /// line does not fit the grammar.
    pub fn parse<'a>(&self, line: &'a str) -> Option<RawCaptures<'a>> {
        let caps = self.regex.captures(line)?;
        let field = |name: &str| caps.name(name).map(|m| m.as_str()).unwrap_or_default();

        Some(RawCaptures {
            time_local: field("time_local"),
            host: field("host"),
            remote_addr: field("remote_addr"),
            remote_user: field("remote_user"),
            request: field("request"),
            status: field("status"),
            body_bytes_sent: field("body_bytes_sent"),
            http_referer: field("http_referer"),
            http_user_agent: field("http_user_agent"),
            request_time: field("request_time"),
            upstream_response_time: field("upstream_response_time"),
            gzip_ratio: field("gzip_ratio"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        r#"[10/Oct/2023:13:55:36 +0000] | example.com | 127.0.0.1 | - | "GET /x HTTP/1.1" Status="200" BodyBytesSent="1024" Referer="-" UserAgent="curl/7.0" RequestTime="0.002" UpstreamResponseTime="-" GzipRatio="-""#,
        r#"[17/Dec/2025:10:15:33 +0100] | api.example.com | 10.0.0.50 | alice | "POST /api/login HTTP/2.0" Status="302" BodyBytesSent="0" Referer="https://example.com/login" UserAgent="Mozilla/5.0 (X11; Linux x86_64)" RequestTime="0.120" UpstreamResponseTime="0.118" GzipRatio="2.45""#,
        r#"[17/Dec/2025:10:15:34 -0500]|static.example.com|172.16.0.1|-|"GET /static/app.css HTTP/1.1"Status="304"BodyBytesSent="-"Referer="-"UserAgent="-"RequestTime="0.000"UpstreamResponseTime="-"GzipRatio="-""#,
    ];

    #[test]
    fn test_parse_basic() {
        let parser = LineParser::new().unwrap();
        let caps = parser.parse(SAMPLES[0]).unwrap();

        assert_eq!(caps.time_local, "10/Oct/2023:13:55:36 +0000");
        assert_eq!(caps.host, "example.com");
        assert_eq!(caps.remote_addr, "127.0.0.1");
        assert_eq!(caps.remote_user, "-");
        assert_eq!(caps.request, "GET /x HTTP/1.1");
        assert_eq!(caps.status, "200");
        assert_eq!(caps.body_bytes_sent, "1024");
        assert_eq!(caps.http_referer, "-");
        assert_eq!(caps.http_user_agent, "curl/7.0");
        assert_eq!(caps.request_time, "0.002");
        assert_eq!(caps.upstream_response_time, "-");
        assert_eq!(caps.gzip_ratio, "-");
    }

    #[test]
    fn test_parse_with_user_and_spaces_in_agent() {
        let parser = LineParser::new().unwrap();
        let caps = parser.parse(SAMPLES[1]).unwrap();

        assert_eq!(caps.host, "api.example.com");
        assert_eq!(caps.remote_user, "alice");
        assert_eq!(caps.http_referer, "https://example.com/login");
        assert_eq!(caps.http_user_agent, "Mozilla/5.0 (X11; Linux x86_64)");
        assert_eq!(caps.upstream_response_time, "0.118");
        assert_eq!(caps.gzip_ratio, "2.45");
    }

    #[test]
    fn test_parse_without_optional_whitespace() {
        let parser = LineParser::new().unwrap();
        let caps = parser.parse(SAMPLES[2]).unwrap();

        assert_eq!(caps.host, "static.example.com");
        assert_eq!(caps.remote_addr, "172.16.0.1");
        assert_eq!(caps.status, "304");
        assert_eq!(caps.body_bytes_sent, "-");
    }

    #[test]
    fn test_parse_placeholder_status() {
        let parser = LineParser::new().unwrap();
        let line = SAMPLES[0].replace(r#"Status="200""#, r#"Status="-""#);
        assert_eq!(parser.parse(&line).unwrap().status, "-");

        let line = SAMPLES[0].replace(r#"Status="200""#, r#"Status="""#);
        assert_eq!(parser.parse(&line).unwrap().status, "");
    }

    #[test]
    fn test_parse_missing_key_is_no_match() {
        let parser = LineParser::new().unwrap();
        let line = SAMPLES[0].replace(r#"Referer="-" "#, "");
        assert!(parser.parse(&line).is_none());
    }

    #[test]
    fn test_parse_out_of_order_keys_is_no_match() {
        let parser = LineParser::new().unwrap();
        let line = SAMPLES[0].replace(
            r#"Referer="-" UserAgent="curl/7.0""#,
            r#"UserAgent="curl/7.0" Referer="-""#,
        );
        assert!(parser.parse(&line).is_none());
    }

    #[test]
    fn test_parse_never_panics() {
        let parser = LineParser::new().unwrap();
        let inputs = [
            "",
            " ",
            "[",
            "[]",
            "[x] | | | |",
            r#"[x] | a | b | c | "unterminated"#,
            "192.168.1.1 - - [17/Dec/2025:10:15:32 +0000] \"GET / HTTP/1.1\" 200 1 \"-\" \"curl\"",
            "\u{fffd}\u{fffd} garbage \0 bytes",
            "||||||||||||||||||||||||||||",
        ];
        for input in inputs {
            assert!(parser.parse(input).is_none(), "unexpected match for {:?}", input);
        }
    }

    #[test]
    fn test_parse_all_samples() {
        let parser = LineParser::new().unwrap();
        for (i, sample) in SAMPLES.iter().enumerate() {
            assert!(parser.parse(sample).is_some(), "sample {} did not match", i);
        }
    }
}
