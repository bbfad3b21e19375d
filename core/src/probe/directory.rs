//! Directory (LDAP) bind probing

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings};
use schema::{ConnectionConfig, ProbeSubject};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{error_chain, Probe, ProbeError};

/// Placeholder substituted with the username in a bind-DN template
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Build the bind DN for `username`
///
/// A template containing [`USERNAME_PLACEHOLDER`] is filled in directly.
/// Any other value is treated as a base DN and prefixed with `cn=<username>`.
/// The username is lower-cased in both forms.
pub fn bind_dn(template: &str, username: &str) -> String {
    let user = username.trim().to_lowercase();
    let template = template.trim();
    if template.contains(USERNAME_PLACEHOLDER) {
        template.replace(USERNAME_PLACEHOLDER, &user)
    } else if template.is_empty() {
        format!("cn={user}")
    } else {
        format!("cn={user},{template}")
    }
}

/// Directory probe: connect (TLS for `ldaps`) and perform a simple bind
///
/// Certificate verification is only skipped when the config is explicitly
/// marked insecure. The connection is unbound before returning whether or
/// not the bind succeeded.
#[derive(Debug, Clone)]
pub struct DirectoryProbe {
    config: ConnectionConfig,
    bind_dn: String,
}

impl DirectoryProbe {
    /// Create a probe binding as `config.user()` through `bind_dn_template`
    pub fn new(config: ConnectionConfig, bind_dn_template: &str) -> Self {
        let bind_dn = bind_dn(bind_dn_template, config.user());
        Self { config, bind_dn }
    }

    /// The distinguished name used for the bind
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// `scheme://host:port` of the directory
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.config.engine(),
            self.config.host(),
            self.config.port()
        )
    }
}

#[async_trait]
impl Probe for DirectoryProbe {
    fn subject(&self) -> ProbeSubject {
        ProbeSubject::Connection(self.config.clone())
    }

    fn secrets(&self) -> Vec<&str> {
        vec![self.config.password().expose()]
    }

    async fn check(&self) -> Result<String, ProbeError> {
        if self.config.user().trim().is_empty() || self.config.password().is_empty() {
            // an empty password would be an anonymous bind on most servers
            return Err(ProbeError::Auth("missing username or password".to_string()));
        }

        let url = self.url();
        let limit = self.config.timeout();
        info!("[LDAP] login={} BindDN={} url={}", self.config.user(), self.bind_dn, url);
        if self.config.insecure() {
            warn!("[LDAP] certificate verification disabled for {}", url);
        }

        let settings = LdapConnSettings::new()
            .set_conn_timeout(limit)
            .set_no_tls_verify(self.config.insecure());

        let connected = timeout(limit, LdapConnAsync::with_settings(settings, &url)).await;
        let (conn, mut ldap) = match connected {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(ProbeError::Dial(format!("dial {url}: {}", error_chain(&e))));
            }
            Err(_elapsed) => return Err(ProbeError::Timeout(limit)),
        };
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                debug!("[LDAP] connection closed: {}", e);
            }
        });

        let bound = timeout(
            limit,
            ldap.simple_bind(&self.bind_dn, self.config.password().expose()),
        )
        .await;
        let outcome = match bound {
            Ok(Ok(result)) => result
                .success()
                .map(|_| ())
                .map_err(|e| ProbeError::Auth(format!("bind {}: {e}", self.bind_dn))),
            Ok(Err(e)) => Err(ProbeError::Dial(format!("bind: {}", error_chain(&e)))),
            Err(_elapsed) => Err(ProbeError::Timeout(limit)),
        };

        if let Ok(Err(e)) = timeout(limit, ldap.unbind()).await {
            debug!("[LDAP] unbind: {}", e);
        }

        outcome.map(|()| "LDAP Connection and Bind are OK".to_string())
    }

    fn failure_message(&self, err: &ProbeError) -> String {
        format!("[LDAP] {} : {}", self.url(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::ErrorKind;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PASSWORD: &str = "Corr3ct-Horse";

    /// Minimal directory server answering every bind with `result_code`
    async fn fake_directory(result_code: u8) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let Some(id) = message_id(&buf[..n]) else { return };
                    let mut reply = vec![0x30, (2 + id.len() + 9) as u8, 0x02, id.len() as u8];
                    reply.extend_from_slice(&id);
                    reply.extend_from_slice(&[0x61, 0x07, 0x0a, 0x01, result_code, 0x04, 0x00, 0x04, 0x00]);
                    let _ = stream.write_all(&reply).await;
                    // drain until the client unbinds and closes
                    while let Ok(n) = stream.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                });
            }
        });
        port
    }

    /// Extract the messageID bytes from a BER-encoded LDAPMessage
    fn message_id(frame: &[u8]) -> Option<Vec<u8>> {
        if frame.first() != Some(&0x30) {
            return None;
        }
        let len_byte = *frame.get(1)?;
        let mut pos = 2;
        if len_byte & 0x80 != 0 {
            pos += (len_byte & 0x7f) as usize;
        }
        if frame.get(pos) != Some(&0x02) {
            return None;
        }
        let id_len = *frame.get(pos + 1)? as usize;
        frame.get(pos + 2..pos + 2 + id_len).map(<[u8]>::to_vec)
    }

    fn config(port: u16, user: &str, password: &str) -> ConnectionConfig {
        ConnectionConfig::new("ldap", "127.0.0.1", port.to_string())
            .with_credentials(user, password)
            .with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_bind_dn_forms() {
        assert_eq!(bind_dn("ou=people,dc=example,dc=org", "Alice"), "cn=alice,ou=people,dc=example,dc=org");
        assert_eq!(bind_dn("uid={username},ou=people", "BOB"), "uid=bob,ou=people");
        assert_eq!(bind_dn("", "carol"), "cn=carol");
    }

    #[test]
    fn test_message_id_parsing() {
        assert_eq!(message_id(&[0x30, 0x05, 0x02, 0x01, 0x01, 0x60, 0x00]), Some(vec![1]));
        assert_eq!(message_id(&[0x30, 0x81, 0x05, 0x02, 0x01, 0x07]), Some(vec![7]));
        assert_eq!(message_id(&[0x04]), None);
    }

    #[tokio::test]
    async fn test_successful_bind() {
        let port = fake_directory(0).await;
        let probe = DirectoryProbe::new(config(port, "alice", PASSWORD), "dc=example,dc=org");
        let result = probe.probe().await;
        assert!(result.success(), "bind should succeed: {result:?}");
        assert_eq!(result.message(), "LDAP Connection and Bind are OK");
        assert!(!result.challenge());
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_with_challenge() {
        // 49 = invalidCredentials
        let port = fake_directory(49).await;
        let probe = DirectoryProbe::new(config(port, "alice", PASSWORD), "dc=example,dc=org");
        let result = probe.probe().await;

        assert!(!result.success());
        assert_eq!(result.error_kind(), ErrorKind::Auth);
        assert!(result.challenge());
        assert!(result.message().contains("cn=alice,dc=example,dc=org"));
        assert!(!result.message().contains(PASSWORD));
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_dial() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let probe = DirectoryProbe::new(config(port, "alice", PASSWORD), "");
        let result = probe.probe().await;
        assert!(!result.success());
        assert!(matches!(result.error_kind(), ErrorKind::Dial | ErrorKind::Timeout));
        assert!(!result.challenge());
        assert!(!result.message().contains(PASSWORD));
    }

    #[tokio::test]
    async fn test_missing_password_rejected_without_dialing() {
        let probe = DirectoryProbe::new(config(1, "alice", ""), "");
        let result = probe.probe().await;
        assert_eq!(result.error_kind(), ErrorKind::Auth);
        assert!(result.challenge());
    }
}
