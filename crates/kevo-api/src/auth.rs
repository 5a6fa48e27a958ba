use secrecy::{ExposeSecret, SecretString};

/// Portal login credentials.
///
/// Immutable once built. The password is only exposed while the login form
/// is being assembled and is redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The `/signin` form body: `user[username]`, `user[password]`,
    /// `authenticity_token`.
    pub(crate) fn login_form<'a>(&'a self, token: &'a str) -> [(&'static str, &'a str); 3] {
        [
            ("user[username]", self.username.as_str()),
            ("user[password]", self.password.expose_secret()),
            ("authenticity_token", token),
        ]
    }
}
