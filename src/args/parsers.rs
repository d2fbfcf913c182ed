use std::net::SocketAddrV4;

use crate::error::ValidationError;

/// Parses a control group endpoint such as `239.255.77.77:47077`.
///
/// # Errors
///
/// Returns an error when the value is not `a.b.c.d:port` or the address is
/// outside 224.0.0.0/4.
pub fn parse_group(s: &str) -> Result<SocketAddrV4, ValidationError> {
    let group: SocketAddrV4 = s
        .trim()
        .parse()
        .map_err(|_err| ValidationError::InvalidEndpoint {
            value: s.to_owned(),
        })?;
    if !group.ip().is_multicast() {
        return Err(ValidationError::NotMulticast {
            value: s.to_owned(),
        });
    }
    Ok(group)
}

/// # Errors
///
/// Returns an error for anything other than true/false, yes/no, on/off or
/// 1/0.
pub fn parse_bool(s: &str) -> Result<bool, ValidationError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(ValidationError::InvalidBoolean {
            value: s.to_owned(),
        }),
    }
}
