//! # Key-value configuration management.

use anyhow::{Context as _, Result};
use strum::EnumProperty as _;
use strum_macros::{AsRefStr, Display, EnumIter, EnumProperty, EnumString};

use crate::context::Context;

/// The available configuration keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, EnumIter, EnumProperty,
)]
#[strum(serialize_all = "snake_case")]
pub enum Config {
    /// Email address, configured by the user.
    Addr,

    /// The email address the core actually sends from, set once
    /// configuration succeeded.
    ConfiguredAddr,

    /// Whether configuration succeeded; `1` once it did.
    Configured,

    /// Whether we send the `prefer-encrypt=mutual` Autocrypt preference
    /// and opportunistically encrypt outgoing messages.
    #[strum(props(default = "1"))]
    E2eeEnabled,

    /// Whether read receipts are sent and requested. Not interpreted by
    /// this crate, but part of the persisted configuration contract.
    #[strum(props(default = "1"))]
    MdnsEnabled,
}

impl Config {
    fn default_value(&self) -> Option<&'static str> {
        self.get_str("default")
    }
}

impl Context {
    /// Gets the configured value for the given key, falling back to the
    /// key's default.
    pub async fn get_config(&self, key: Config) -> Result<Option<String>> {
        let value = self.sql.get_raw_config(key.as_ref()).await?;

        if value.is_some() {
            return Ok(value);
        }

        Ok(key.default_value().map(|s| s.to_string()))
    }

    /// Gets the configured value interpreted as an integer.
    pub async fn get_config_int(&self, key: Config) -> Result<i32> {
        Ok(self
            .get_config(key)
            .await?
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }

    /// Gets the configured value interpreted as a boolean.
    pub async fn get_config_bool(&self, key: Config) -> Result<bool> {
        Ok(self.get_config_int(key).await? != 0)
    }

    /// Sets the given config key to the given value, or deletes it when
    /// `value` is `None`.
    pub async fn set_config(&self, key: Config, value: Option<&str>) -> Result<()> {
        self.sql.set_raw_config(key.as_ref(), value).await?;
        Ok(())
    }

    /// Sets the given config key to a boolean value.
    pub async fn set_config_bool(&self, key: Config, value: bool) -> Result<()> {
        self.set_config(key, Some(if value { "1" } else { "0" }))
            .await
    }

    /// Returns the address the core sends from.
    ///
    /// Fails when the context is not configured.
    pub async fn get_primary_self_addr(&self) -> Result<String> {
        self.get_config(Config::ConfiguredAddr)
            .await?
            .context("No self addr configured")
    }

    /// Returns whether `addr` is the configured self address.
    pub async fn is_self_addr(&self, addr: &str) -> Result<bool> {
        let self_addr = match self.get_config(Config::ConfiguredAddr).await? {
            Some(self_addr) => self_addr,
            None => return Ok(false),
        };

        Ok(crate::tools::addr_cmp(&self_addr, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestContext;

    #[test]
    fn test_to_string() {
        assert_eq!(Config::E2eeEnabled.to_string(), "e2ee_enabled");
        assert_eq!("e2ee_enabled".parse(), Ok(Config::E2eeEnabled));
        assert_eq!(Config::ConfiguredAddr.to_string(), "configured_addr");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_default_values() {
        let t = TestContext::new().await;
        assert_eq!(t.ctx.get_config_bool(Config::E2eeEnabled).await.unwrap(), true);
        assert_eq!(t.ctx.get_config_bool(Config::MdnsEnabled).await.unwrap(), true);
        assert_eq!(t.ctx.get_config(Config::Addr).await.unwrap(), None);

        t.ctx
            .set_config_bool(Config::E2eeEnabled, false)
            .await
            .unwrap();
        assert_eq!(
            t.ctx.get_config_bool(Config::E2eeEnabled).await.unwrap(),
            false
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_is_self_addr() {
        let t = TestContext::new_alice().await;
        assert!(t.ctx.is_self_addr("alice@example.org").await.unwrap());
        assert!(t.ctx.is_self_addr("mailto:ALICE@example.org").await.unwrap());
        assert!(!t.ctx.is_self_addr("bob@example.net").await.unwrap());
    }
}
