//! Caller side of the wizard protocol, as used by installer scripts.

use crate::protocol::FIELD_SEPARATOR;
use anyhow::{Context, Result};
use std::net::Ipv4Addr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// One request line, without its terminator.
pub fn encode_request<S: AsRef<str>>(cookie: &str, verb: &str, args: &[S]) -> String {
    let mut line = String::with_capacity(cookie.len() + verb.len() + 1);
    line.push_str(cookie);
    line.push(FIELD_SEPARATOR);
    line.push_str(verb);
    for arg in args {
        line.push(FIELD_SEPARATOR);
        line.push_str(arg.as_ref());
    }
    line
}

/// Send one request to the local wizard server and return its answer.
pub async fn call<S: AsRef<str>>(port: u16, cookie: &str, verb: &str, args: &[S]) -> Result<String> {
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))
        .await
        .with_context(|| format!("failed to connect to wizard server on port {port}"))?;

    let mut request = encode_request(cookie, verb, args);
    request.push('\n');
    stream
        .write_all(request.as_bytes())
        .await
        .context("failed to write wizard request")?;
    stream.flush().await.context("failed to flush wizard request")?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .context("failed to read wizard response")?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_tab_separated_fields() {
        assert_eq!(
            encode_request("C", "POL_SetupWindow_Close", &["win1"]),
            "C\tPOL_SetupWindow_Close\twin1"
        );
        let none: [&str; 0] = [];
        assert_eq!(encode_request("C", "POL_Die", &none), "C\tPOL_Die");
    }
}
