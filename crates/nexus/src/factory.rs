// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter factory over the compiled-in platform crates.

use std::sync::Arc;

use nexus_config::model::PlatformsConfig;
use nexus_core::{
    AdapterFactory, Credentials, NexusError, ParsedWebhook, Platform, PlatformAdapter, TenantId,
};
use nexus_meta::MessengerAdapter;
use nexus_signal::SignalAdapter;
use nexus_telegram::TelegramAdapter;
use nexus_whatsapp::WhatsAppAdapter;
use serde_json::Value;
use tracing::debug;

/// Builds real platform adapters. Every [`Platform`] variant is handled here.
pub struct BuiltinAdapterFactory {
    platforms: PlatformsConfig,
}

impl BuiltinAdapterFactory {
    pub fn new(platforms: PlatformsConfig) -> Self {
        Self { platforms }
    }
}

impl AdapterFactory for BuiltinAdapterFactory {
    fn build(
        &self,
        tenant: &TenantId,
        platform: Platform,
        credentials: &Credentials,
    ) -> Result<Arc<dyn PlatformAdapter>, NexusError> {
        credentials.validate_for(platform)?;
        let adapter: Arc<dyn PlatformAdapter> = match platform {
            Platform::WhatsApp => Arc::new(WhatsAppAdapter::new(credentials, &self.platforms)?),
            Platform::Telegram => Arc::new(TelegramAdapter::new(credentials, &self.platforms)?),
            Platform::Instagram | Platform::Facebook => Arc::new(MessengerAdapter::new(
                platform,
                credentials,
                &self.platforms,
            )?),
            Platform::Signal => Arc::new(SignalAdapter::new(credentials, &self.platforms)?),
        };
        debug!(tenant = %tenant, platform = %platform, "platform adapter built");
        Ok(adapter)
    }

    fn parse_webhook(&self, platform: Platform, payload: &Value) -> Result<ParsedWebhook, NexusError> {
        match platform {
            Platform::WhatsApp => nexus_whatsapp::normalize::parse_webhook(payload),
            Platform::Telegram => nexus_telegram::normalize::parse_update(payload),
            Platform::Instagram | Platform::Facebook => {
                nexus_meta::normalize::parse_messaging(platform, payload)
            }
            Platform::Signal => nexus_signal::normalize::parse_envelopes(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_test_utils::valid_credentials;
    use serde_json::json;

    fn factory() -> BuiltinAdapterFactory {
        BuiltinAdapterFactory::new(PlatformsConfig::default())
    }

    #[test]
    fn builds_an_adapter_for_every_platform() {
        let tenant = TenantId::from("acme");
        for platform in [
            Platform::WhatsApp,
            Platform::Telegram,
            Platform::Instagram,
            Platform::Facebook,
            Platform::Signal,
        ] {
            let mut creds = valid_credentials(platform);
            if platform == Platform::Telegram {
                creds.insert("bot_token", "123456:ABC-DEF");
            }
            if platform == Platform::Signal {
                creds.insert("phone_number", "+15550001111");
            }
            let adapter = factory().build(&tenant, platform, &creds).unwrap();
            assert_eq!(adapter.platform(), platform);
        }
    }

    #[test]
    fn missing_fields_are_a_config_error() {
        let err = factory()
            .build(&TenantId::from("acme"), Platform::Facebook, &Credentials::new())
            .err()
            .unwrap();
        assert!(matches!(err, NexusError::Config(_)));
        assert!(err.to_string().contains("page_access_token"));
    }

    #[test]
    fn webhooks_reach_the_matching_normalizer() {
        let telegram = json!({
            "update_id": 1,
            "message": {
                "message_id": 7,
                "date": 1_767_225_600,
                "chat": {"id": 42},
                "from": {"id": 42, "first_name": "Dana"},
                "text": "hi"
            }
        });
        let parsed = factory().parse_webhook(Platform::Telegram, &telegram).unwrap();
        assert_eq!(parsed.events[0].external_sender_id, "42");

        let messenger = json!({"object": "page", "entry": [{"id": "PAGE", "time": 1, "messaging": [{
            "sender": {"id": "PSID-1"},
            "timestamp": 1_767_225_600_000i64,
            "message": {"mid": "m_1", "text": "open?"}
        }]}]});
        let parsed = factory().parse_webhook(Platform::Instagram, &messenger).unwrap();
        assert_eq!(parsed.events[0].content, "open?");

        let signal = json!({"envelope": {
            "source": "+15550001111",
            "timestamp": 1_767_225_600_000i64,
            "dataMessage": {"timestamp": 1_767_225_600_000i64, "message": "yo"}
        }});
        let parsed = factory().parse_webhook(Platform::Signal, &signal).unwrap();
        assert_eq!(parsed.events[0].content, "yo");

        let whatsapp = json!({"object": "whatsapp_business_account", "entry": [{"id": "WABA", "changes": [{
            "field": "messages",
            "value": {"messages": [{"from": "1555", "id": "wamid.1", "timestamp": "1767225600", "type": "text", "text": {"body": "hello"}}]}
        }]}]});
        let parsed = factory().parse_webhook(Platform::WhatsApp, &whatsapp).unwrap();
        assert_eq!(parsed.events[0].content, "hello");
    }
}
