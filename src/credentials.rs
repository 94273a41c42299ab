use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// A password that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// Public key authentication with the given identity file.
    Key(PathBuf),
    /// Password authentication through `sshpass`.
    Password(Secret),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub auth: Auth,
    /// Fed to `sudo -S` on the device. Without it, sudo must not ask (`-n`).
    pub sudo_password: Option<Secret>,
}

impl Credentials {
    /// Key auth when an identity is given, otherwise the password, prompting for it if absent.
    pub fn resolve<F>(
        user: String,
        password: Option<String>,
        identity: Option<PathBuf>,
        prompt: F,
    ) -> Result<Self>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let password = password.map(Secret::new);

        match identity {
            Some(path) => Ok(Credentials {
                user,
                auth: Auth::Key(path),
                sudo_password: password,
            }),
            None => {
                let password = match password {
                    Some(p) => p,
                    None => Secret::new(prompt(&format!("Password for {}", user))?),
                };
                Ok(Credentials {
                    user,
                    auth: Auth::Password(password.clone()),
                    sudo_password: Some(password),
                })
            }
        }
    }
}
