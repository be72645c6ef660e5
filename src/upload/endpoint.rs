use crate::error::{RecorderError, RecorderResult};

/// Where uploads are sent, resolved from the configured URL and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Parse `http://host[:port][/path]` and check it against the configured port
    ///
    /// A URL without an explicit port is taken to mean the configured one.
    pub fn resolve(url: &str, port: u16) -> RecorderResult<Self> {
        let invalid = |reason: &str| RecorderError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let rest = url
            .strip_prefix("http://")
            .ok_or_else(|| invalid("only plain http:// URLs are supported"))?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port_text) = match authority.strip_prefix('[') {
            // Bracketed IPv6 literal, `[::1]:8080`
            Some(bracketed) => {
                let (host, after) = bracketed
                    .split_once(']')
                    .ok_or_else(|| invalid("unterminated IPv6 address"))?;
                let port_text = match after {
                    "" => None,
                    _ => Some(
                        after
                            .strip_prefix(':')
                            .ok_or_else(|| invalid("unexpected text after IPv6 address"))?,
                    ),
                };
                (host, port_text)
            }
            None => match authority.rsplit_once(':') {
                Some((host, port_text)) => (host, Some(port_text)),
                None => (authority, None),
            },
        };

        let url_port = port_text
            .map(|text| text.parse::<u16>().map_err(|_| invalid("port is not a number")))
            .transpose()?;

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        if let Some(url_port) = url_port {
            if url_port != port {
                return Err(RecorderError::PortMismatch {
                    url_port,
                    configured: port,
                });
            }
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Value of the `Host` header
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
