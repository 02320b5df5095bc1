//! Module to work with translatable stock strings.

use anyhow::Result;
use strum::EnumProperty as _;
use strum_macros::EnumProperty;

use crate::context::Context;

/// Some strings are needed in a translated form and the core cannot
/// translate on its own; the embedding application may replace any of
/// them via [Context::set_stock_translation].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumProperty)]
#[repr(usize)]
pub enum StockMessage {
    #[strum(props(fallback = "Encrypted message"))]
    EncryptedMsg = 24,

    #[strum(props(fallback = "This message was encrypted for another setup or key."))]
    CantDecryptMsgBody = 29,

    #[strum(props(fallback = "Autocrypt Setup Message"))]
    AcSetupMsgSubject = 42,

    #[strum(props(
        fallback = "This is the Autocrypt Setup Message used to transfer your \
                    key between clients.\n\nTo decrypt and use your key, open \
                    the message in an Autocrypt-compliant client and enter the \
                    setup code presented on the generating device."
    ))]
    AcSetupMsgBody = 43,
}

impl StockMessage {
    fn fallback(self) -> &'static str {
        self.get_str("fallback").unwrap_or_default()
    }
}

async fn translated(context: &Context, id: StockMessage) -> String {
    context
        .translated_stockstrings
        .read()
        .await
        .get(&(id as usize))
        .cloned()
        .unwrap_or_else(|| id.fallback().to_string())
}

/// Stock string: `Encrypted message`, the outer subject placeholder.
pub(crate) async fn encrypted_msg(context: &Context) -> String {
    translated(context, StockMessage::EncryptedMsg).await
}

/// Stock string: `This message was encrypted for another setup or key.`.
pub(crate) async fn cant_decrypt_msg_body(context: &Context) -> String {
    translated(context, StockMessage::CantDecryptMsgBody).await
}

/// Stock string: `Autocrypt Setup Message`.
pub(crate) async fn ac_setup_msg_subject(context: &Context) -> String {
    translated(context, StockMessage::AcSetupMsgSubject).await
}

/// Stock string: the explanatory body of the Autocrypt Setup Message.
pub(crate) async fn ac_setup_msg_body(context: &Context) -> String {
    translated(context, StockMessage::AcSetupMsgBody).await
}

impl Context {
    /// Sets the translated version of the given stock string.
    pub async fn set_stock_translation(&self, id: StockMessage, stockstring: String) -> Result<()> {
        self.translated_stockstrings
            .write()
            .await
            .insert(id as usize, stockstring);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestContext;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_set_stock_translation() {
        let t = TestContext::new().await;
        assert_eq!(encrypted_msg(&t.ctx).await, "Encrypted message");

        t.ctx
            .set_stock_translation(StockMessage::EncryptedMsg, "Verschlüsselte Nachricht".into())
            .await
            .unwrap();
        assert_eq!(encrypted_msg(&t.ctx).await, "Verschlüsselte Nachricht");
    }
}
