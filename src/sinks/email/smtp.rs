//! 阻塞式 SMTP 客户端
//!
//! 支持 EHLO/HELO、STARTTLS（需要 `tls` feature）、AUTH PLAIN/LOGIN、
//! MAIL/RCPT/DATA 以及 QUIT。所有操作都阻塞调用线程；只有配置了超时时
//! 才设置套接字超时。

use crate::error::{FanlogError, Result};
use crate::owner::local_hostname;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// 服务器应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// 底层传输通道
enum Channel {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
}

impl Read for Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Channel::Plain(stream) => stream.read(buf),
            #[cfg(feature = "tls")]
            Channel::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Channel::Plain(stream) => stream.write(buf),
            #[cfg(feature = "tls")]
            Channel::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Channel::Plain(stream) => stream.flush(),
            #[cfg(feature = "tls")]
            Channel::Tls(stream) => stream.flush(),
        }
    }
}

/// 已建立的 SMTP 会话
pub struct SmtpSession {
    stream: BufReader<Channel>,
    hello_name: String,
    /// EHLO 应答中宣告的扩展（大写）
    extensions: Vec<String>,
    encrypted: bool,
}

impl SmtpSession {
    /// 建立连接并完成问候
    ///
    /// `timeout` 为 `None` 时使用系统默认的阻塞行为。
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let mut last_error = None;
        let mut stream = None;

        for addr in (host, port).to_socket_addrs()? {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(tcp) => {
                    stream = Some(tcp);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }

        let tcp = match (stream, last_error) {
            (Some(tcp), _) => tcp,
            (None, Some(e)) => return Err(e.into()),
            (None, None) => {
                return Err(FanlogError::smtp(format!(
                    "no address resolved for {}:{}",
                    host, port
                )))
            }
        };
        tcp.set_read_timeout(timeout)?;
        tcp.set_write_timeout(timeout)?;

        let mut session = Self {
            stream: BufReader::new(Channel::Plain(tcp)),
            hello_name: local_hostname(),
            extensions: Vec::new(),
            encrypted: false,
        };

        session.expect(&[220])?;
        session.hello()?;
        tracing::debug!("SMTP session opened with {}:{}", host, port);
        Ok(session)
    }

    fn hello(&mut self) -> Result<()> {
        let ehlo = format!("EHLO {}", self.hello_name);
        let reply = self.command(&ehlo)?;
        if reply.code == 250 {
            self.extensions = reply
                .lines
                .iter()
                .skip(1)
                .map(|line| line.to_ascii_uppercase())
                .collect();
            return Ok(());
        }

        let helo = format!("HELO {}", self.hello_name);
        self.command_expect(&helo, &[250])?;
        self.extensions.clear();
        Ok(())
    }

    /// 服务器是否宣告了某个扩展
    pub fn supports(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_uppercase();
        self.extensions
            .iter()
            .any(|line| line.split_whitespace().next() == Some(extension.as_str()))
    }

    fn auth_mechanisms(&self) -> Vec<String> {
        self.extensions
            .iter()
            .filter_map(|line| {
                let mut words = line.split_whitespace();
                match words.next() {
                    Some("AUTH") => Some(words.map(str::to_string).collect::<Vec<_>>()),
                    _ => None,
                }
            })
            .flatten()
            .collect()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// 升级为 TLS 通道并重新问候
    #[cfg(feature = "tls")]
    pub fn starttls(mut self, host: &str) -> Result<Self> {
        use rustls::pki_types::ServerName;
        use std::sync::Arc;

        self.command_expect("STARTTLS", &[220])?;

        let tcp = match self.stream.into_inner() {
            Channel::Plain(tcp) => tcp,
            Channel::Tls(_) => return Err(FanlogError::smtp("TLS already active")),
        };

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| FanlogError::smtp(format!("TLS configuration failed: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| FanlogError::smtp(format!("Invalid server name: {}", e)))?;
        let connection = rustls::ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| FanlogError::smtp(format!("TLS handshake failed: {}", e)))?;

        let mut session = Self {
            stream: BufReader::new(Channel::Tls(Box::new(rustls::StreamOwned::new(
                connection, tcp,
            )))),
            hello_name: self.hello_name,
            extensions: Vec::new(),
            encrypted: true,
        };
        session.hello()?;
        tracing::debug!("SMTP session upgraded to TLS");
        Ok(session)
    }

    /// 未启用 `tls` feature 时无法升级
    #[cfg(not(feature = "tls"))]
    pub fn starttls(self, _host: &str) -> Result<Self> {
        Err(FanlogError::smtp(
            "STARTTLS requested but fanlog was built without the `tls` feature",
        ))
    }

    /// 登录，优先使用 AUTH PLAIN
    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let mechanisms = self.auth_mechanisms();

        if mechanisms.iter().any(|m| m == "PLAIN") || !mechanisms.iter().any(|m| m == "LOGIN") {
            let token = STANDARD.encode(format!("\0{}\0{}", user, password));
            self.command_expect(&format!("AUTH PLAIN {}", token), &[235])?;
        } else {
            self.command_expect("AUTH LOGIN", &[334])?;
            self.command_expect(&STANDARD.encode(user), &[334])?;
            self.command_expect(&STANDARD.encode(password), &[235])?;
        }
        Ok(())
    }

    /// 投递一封已组装好的邮件
    ///
    /// `MAIL FROM` 被接受之后的任何失败都会先发送 `RSET`，会话可以继续使用。
    pub fn send_mail(&mut self, from: Option<&str>, to: &[String], data: &str) -> Result<()> {
        let from = from.unwrap_or("");
        check_address(from)?;
        for recipient in to {
            check_address(recipient)?;
        }

        self.command_expect(&format!("MAIL FROM:<{}>", from), &[250])?;
        let result = self.transaction(to, data);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn transaction(&mut self, to: &[String], data: &str) -> Result<()> {
        for recipient in to {
            self.command_expect(&format!("RCPT TO:<{}>", recipient), &[250, 251])?;
        }
        self.command_expect("DATA", &[354])?;

        let mut body = String::with_capacity(data.len() + 8);
        for line in data.split_inclusive('\n') {
            if line.starts_with('.') {
                body.push('.');
            }
            body.push_str(line);
        }
        if !body.ends_with("\r\n") {
            body.push_str("\r\n");
        }
        body.push_str(".\r\n");

        self.send_raw(&body)?;
        self.expect(&[250])?;
        Ok(())
    }

    fn reset(&mut self) {
        if let Err(e) = self.command_expect("RSET", &[250]) {
            tracing::debug!("SMTP RSET failed: {}", e);
        }
    }

    /// 结束会话
    pub fn quit(mut self) -> Result<()> {
        self.command_expect("QUIT", &[221])?;
        Ok(())
    }

    fn send_raw(&mut self, data: &str) -> Result<()> {
        let channel = self.stream.get_mut();
        channel.write_all(data.as_bytes())?;
        channel.flush()?;
        Ok(())
    }

    fn command(&mut self, line: &str) -> Result<Reply> {
        self.send_raw(&format!("{}\r\n", line))?;
        self.read_reply()
    }

    fn command_expect(&mut self, line: &str, codes: &[u16]) -> Result<Reply> {
        self.send_raw(&format!("{}\r\n", line))?;
        self.expect(codes)
    }

    fn expect(&mut self, codes: &[u16]) -> Result<Reply> {
        let reply = self.read_reply()?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(FanlogError::SmtpReply {
                code: reply.code,
                message: reply.message(),
            })
        }
    }

    fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut raw = String::new();
            if self.stream.read_line(&mut raw)? == 0 {
                return Err(FanlogError::smtp("connection closed by server"));
            }
            let line = raw.trim_end_matches(['\r', '\n']);

            let code = line
                .get(..3)
                .and_then(|code| code.parse::<u16>().ok())
                .ok_or_else(|| FanlogError::smtp(format!("malformed reply: {}", line)))?;
            let more = line.as_bytes().get(3) == Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());

            if !more {
                return Ok(Reply { code, lines });
            }
        }
    }
}

/// 地址中的换行会把参数变成新的 SMTP 命令
fn check_address(address: &str) -> Result<()> {
    if address.contains(['\r', '\n']) {
        return Err(FanlogError::config(format!(
            "email address contains a line break: {:?}",
            address
        )));
    }
    Ok(())
}

impl std::fmt::Debug for SmtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSession")
            .field("hello_name", &self.hello_name)
            .field("extensions", &self.extensions)
            .field("encrypted", &self.encrypted)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{closed_port, FakeSmtpServer};
    use super::*;

    fn timeout() -> Option<Duration> {
        Some(Duration::from_secs(5))
    }

    #[test]
    fn test_connect_parses_extensions() {
        let server = FakeSmtpServer::start();
        let session = SmtpSession::connect("127.0.0.1", server.port, timeout()).unwrap();

        assert!(session.supports("AUTH"));
        assert!(session.supports("size"));
        assert!(!session.supports("STARTTLS"));
        assert!(!session.is_encrypted());
        assert_eq!(server.count("EHLO "), 1);
    }

    #[test]
    fn test_full_transaction_with_dot_stuffing() {
        let server = FakeSmtpServer::start();
        let mut session = SmtpSession::connect("127.0.0.1", server.port, timeout()).unwrap();

        session.login("robot", "pw").unwrap();
        let to = vec!["a@x.com".to_string(), "b@x.com".to_string()];
        session
            .send_mail(Some("robot@x.com"), &to, "Subject: t\r\n\r\n.hidden\r\nend\r\n")
            .unwrap();
        session.quit().unwrap();

        let lines = server.lines();
        let token = STANDARD.encode("\0robot\0pw");
        assert!(lines.contains(&format!("AUTH PLAIN {}", token)));
        assert!(lines.contains(&"MAIL FROM:<robot@x.com>".to_string()));
        assert_eq!(server.count("RCPT TO:"), 2);
        assert!(lines.contains(&"..hidden".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("QUIT"));
    }

    #[test]
    fn test_rejected_recipient_resets_transaction() {
        let server = FakeSmtpServer::start();
        let mut session = SmtpSession::connect("127.0.0.1", server.port, timeout()).unwrap();

        let bad = vec!["nobody@x.com".to_string()];
        let err = session
            .send_mail(Some("robot@x.com"), &bad, "Subject: t\r\n\r\nbody\r\n")
            .unwrap_err();
        assert!(matches!(err, FanlogError::SmtpReply { code: 550, .. }));
        assert_eq!(server.count("RSET"), 1);

        let good = vec!["a@x.com".to_string()];
        session
            .send_mail(Some("robot@x.com"), &good, "Subject: t\r\n\r\nbody\r\n")
            .unwrap();
        assert_eq!(server.count("MAIL FROM:"), 2);
    }

    #[test]
    fn test_line_break_in_address_is_rejected_before_sending() {
        let server = FakeSmtpServer::start();
        let mut session = SmtpSession::connect("127.0.0.1", server.port, timeout()).unwrap();

        let to = vec!["a@x.com>\r\nRCPT TO:<evil@x.com".to_string()];
        let err = session.send_mail(Some("robot@x.com"), &to, "body\r\n").unwrap_err();

        assert!(err.is_config());
        assert_eq!(server.count("MAIL"), 0);
        assert_eq!(server.count("RCPT"), 0);
    }

    #[test]
    fn test_connect_without_timeout() {
        let server = FakeSmtpServer::start();
        let session = SmtpSession::connect("127.0.0.1", server.port, None).unwrap();
        assert!(session.supports("AUTH"));
    }

    #[test]
    fn test_rejected_login_is_reply_error() {
        let server = FakeSmtpServer::rejecting_auth();
        let mut session = SmtpSession::connect("127.0.0.1", server.port, timeout()).unwrap();

        let err = session.login("robot", "wrong").unwrap_err();
        assert!(matches!(err, FanlogError::SmtpReply { code: 535, .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unreachable_server_is_io_error() {
        let port = closed_port();
        let err = SmtpSession::connect("127.0.0.1", port, timeout()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn test_starttls_without_feature() {
        let server = FakeSmtpServer::start();
        let session = SmtpSession::connect("127.0.0.1", server.port, timeout()).unwrap();
        let err = session.starttls("127.0.0.1").unwrap_err();
        assert!(matches!(err, FanlogError::SmtpError(_)));
    }

    #[cfg(feature = "tls")]
    #[test]
    fn test_starttls_refused_by_server() {
        let server = FakeSmtpServer::start();
        let session = SmtpSession::connect("127.0.0.1", server.port, timeout()).unwrap();
        let err = session.starttls("127.0.0.1").unwrap_err();
        assert!(matches!(err, FanlogError::SmtpReply { code: 454, .. }));
    }
}
