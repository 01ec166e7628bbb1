//! Parsing of PASV/PASVEX/EPSV reply text into a connectable endpoint
//! (RFC 959 Section 4.1.2, RFC 2428 Section 3)
//!
//! Both parsers are pure: they never perform I/O and never resolve DNS. The
//! caller supplies the control channel's remote address so EPSV replies (which
//! carry only a port) and NAT-obscured PASV replies can be corrected without a
//! second network round trip.

use std::net::IpAddr;

use crate::error::{FtpError, Result};

/// Whether the caller is operating through an explicit proxy, which disables
/// the private-IP substitution applied to PASV replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// No proxy; apply NAT workarounds
    Direct,
    /// A proxy is in use; trust the server's reported address as-is
    Proxied,
}

/// A host/port pair resolved from a PASV/PASVEX/EPSV reply, ready to dial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEndpoint {
    pub host: IpAddr,
    pub port: u16,
}

fn is_private_v4(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 10
                || (o[0] == 172 && (16..=31).contains(&o[1]))
                || (o[0] == 192 && o[1] == 168)
                || *v4 == std::net::Ipv4Addr::new(127, 0, 0, 1)
                || *v4 == std::net::Ipv4Addr::new(0, 0, 0, 0)
        }
        IpAddr::V6(_) => false,
    }
}

/// Extract six comma-separated decimal octets `h1,h2,h3,h4,p1,p2` from a
/// PASV-family reply message, tolerant of surrounding text, parentheses, and
/// incidental whitespace around the commas.
fn extract_pasv_octets(message: &str) -> Result<[u16; 6]> {
    let start = message.find('(');
    let end = message.rfind(')');
    let inner = match (start, end) {
        (Some(s), Some(e)) if e > s => &message[s + 1..e],
        _ => message,
    };

    let parts: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 6 {
        return Err(FtpError::Parse(format!(
            "expected 6 octets in PASV reply, found {}: {message:?}",
            parts.len()
        )));
    }

    let mut octets = [0u16; 6];
    for (i, part) in parts.iter().enumerate() {
        octets[i] = part
            .parse::<u16>()
            .map_err(|_| FtpError::Parse(format!("non-numeric octet in PASV reply: {message:?}")))?;
        if octets[i] > 255 {
            return Err(FtpError::Parse(format!(
                "octet out of range in PASV reply: {message:?}"
            )));
        }
    }
    Ok(octets)
}

/// Parse a `227`/`228`-style PASV or PASVEX reply.
///
/// `control_remote` is the control channel's peer address, substituted for
/// the parsed host whenever `pasvex` is set, or whenever the parsed host is a
/// private/obviously-NATed address and `proxy` is [`ProxyState::Direct`].
pub fn parse_pasv_reply(
    message: &str,
    control_remote: IpAddr,
    pasvex: bool,
    proxy: ProxyState,
) -> Result<DataEndpoint> {
    let o = extract_pasv_octets(message)?;
    let parsed_host = IpAddr::V4(std::net::Ipv4Addr::new(
        o[0] as u8, o[1] as u8, o[2] as u8, o[3] as u8,
    ));
    let port = o[4] * 256 + o[5];

    let host = if pasvex {
        control_remote
    } else if proxy == ProxyState::Direct && is_private_v4(&parsed_host) {
        control_remote
    } else {
        parsed_host
    };

    Ok(DataEndpoint { host, port })
}

/// Parse a `229` EPSV reply of the form `(|||port|)` (the delimiter character
/// may vary but is consistent within one reply). Falls back to the PASV
/// parser on the same text for servers that answer EPSV with a PASV-shaped
/// reply.
///
/// Per RFC 2428, the host is never taken from the reply: EPSV conveys only a
/// port, and using a separately-resolved hostname risks a different address
/// than the one the control connection is actually talking to (DNS
/// round-robin). `control_remote` is always used.
pub fn parse_epsv_reply(message: &str, control_remote: IpAddr) -> Result<DataEndpoint> {
    if let Some(port) = extract_epsv_port(message) {
        return Ok(DataEndpoint {
            host: control_remote,
            port,
        });
    }
    // Some servers answer EPSV with PASV-shaped text; recover by falling back.
    parse_pasv_reply(message, control_remote, false, ProxyState::Direct)
}

fn extract_epsv_port(message: &str) -> Option<u16> {
    let open = message.find('(')?;
    let close = message[open..].find(')')? + open;
    let inner = &message[open + 1..close];
    // inner looks like |||50000| -- delimiter repeated 3x then port then delimiter
    let delim = inner.chars().next()?;
    let rest = inner.strip_prefix(delim)?;
    let rest = rest.strip_prefix(delim)?;
    let rest = rest.strip_prefix(delim)?;
    let port_str = rest.strip_suffix(delim).unwrap_or(rest);
    port_str.parse::<u16>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_pasv_roundtrip_public_ip() {
        let control = v4(203, 0, 113, 9);
        let msg = "227 Entering Passive Mode (198,51,100,7,195,80)";
        let ep = parse_pasv_reply(msg, control, false, ProxyState::Direct).unwrap();
        assert_eq!(ep.host, v4(198, 51, 100, 7));
        assert_eq!(ep.port, 195 * 256 + 80);
    }

    #[test]
    fn test_pasv_private_ip_substituted_with_control_remote() {
        let control = v4(203, 0, 113, 9);
        let msg = "227 Entering Passive Mode (10,0,0,5,195,80)";
        let ep = parse_pasv_reply(msg, control, false, ProxyState::Direct).unwrap();
        assert_eq!(ep.host, control);
        assert_eq!(ep.port, 195 * 256 + 80);
    }

    #[test]
    fn test_pasv_private_ip_kept_when_proxied() {
        let control = v4(203, 0, 113, 9);
        let msg = "227 Entering Passive Mode (192,168,1,5,195,80)";
        let ep = parse_pasv_reply(msg, control, false, ProxyState::Proxied).unwrap();
        assert_eq!(ep.host, v4(192, 168, 1, 5));
    }

    #[test]
    fn test_pasvex_always_uses_control_remote() {
        let control = v4(203, 0, 113, 9);
        let msg = "227 Entering Passive Mode (198,51,100,7,195,80)";
        let ep = parse_pasv_reply(msg, control, true, ProxyState::Direct).unwrap();
        assert_eq!(ep.host, control);
    }

    #[test]
    fn test_pasv_all_private_ranges() {
        let control = v4(203, 0, 113, 9);
        for candidate in [
            "(10,1,2,3,0,21)",
            "(172,16,0,1,0,21)",
            "(172,31,255,254,0,21)",
            "(192,168,0,1,0,21)",
            "(127,0,0,1,0,21)",
            "(0,0,0,0,0,21)",
        ] {
            let msg = format!("227 Entering Passive Mode {candidate}");
            let ep = parse_pasv_reply(&msg, control, false, ProxyState::Direct).unwrap();
            assert_eq!(ep.host, control, "candidate {candidate} should be substituted");
        }
    }

    #[test]
    fn test_pasv_malformed_reply_is_parse_error() {
        let control = v4(203, 0, 113, 9);
        assert!(parse_pasv_reply("227 nope", control, false, ProxyState::Direct).is_err());
        assert!(parse_pasv_reply("227 (1,2,3,4,5)", control, false, ProxyState::Direct).is_err());
        assert!(
            parse_pasv_reply("227 (1,2,3,4,5,300)", control, false, ProxyState::Direct).is_err()
        );
    }

    #[test]
    fn test_epsv_uses_control_remote_never_parsed_host() {
        let control = v4(203, 0, 113, 9);
        let msg = "229 Entering Extended Passive Mode (|||50000|)";
        let ep = parse_epsv_reply(msg, control).unwrap();
        assert_eq!(ep.host, control);
        assert_eq!(ep.port, 50000);
    }

    #[test]
    fn test_epsv_port_boundaries() {
        let control = v4(203, 0, 113, 9);
        for port in [1u16, 1024, 49152, 65535] {
            let msg = format!("229 Extended Passive Mode Entered (|||{port}|)");
            let ep = parse_epsv_reply(&msg, control).unwrap();
            assert_eq!(ep.port, port);
        }
    }

    #[test]
    fn test_epsv_falls_back_to_pasv_shape() {
        let control = v4(203, 0, 113, 9);
        let msg = "229 (198,51,100,7,195,80)";
        let ep = parse_epsv_reply(msg, control).unwrap();
        // host still forced to control_remote via the PASV path's NAT rule
        // only if private; here the parsed host is public so it is kept
        assert_eq!(ep.host, v4(198, 51, 100, 7));
        assert_eq!(ep.port, 195 * 256 + 80);
    }
}
