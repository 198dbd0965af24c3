//! Channel resolution: routing selectors to concrete delivery endpoints.
//!
//! The resolver works on values loaded eagerly by the storage gateway. It
//! decrypts delivery URLs only for channels that made the final selection,
//! and endpoints never leave the resolver → driver path.

use eventcast_store::{Channel, SubscriptionBundle, UrlCipher, AUTOSUB_PREFIX};
use url::Url;

use crate::dispatcher::{DeliveryUrl, Endpoint};
use crate::error::DeliveryError;

/// Service SMTP credentials for the no-channel fallback. Which account is
/// used depends on whether the subscriber's address is verified.
#[derive(Debug, Clone)]
pub struct SmtpFallback {
    pub host: String,
    pub port: u16,
    pub unverified: SmtpAccount,
    pub verified: SmtpAccount,
}

#[derive(Clone)]
pub struct SmtpAccount {
    pub user: String,
    pub app_password: String,
}

impl std::fmt::Debug for SmtpAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpAccount")
            .field("user", &self.user)
            .field("app_password", &"..")
            .finish()
    }
}

/// Outcome of resolving one subscription.
#[derive(Debug)]
pub struct Resolution {
    pub endpoints: Vec<Endpoint>,
    /// True when nothing resolved and no fallback applied; the caller
    /// records the subscription as pending rather than failed.
    pub pending: bool,
}

/// Expand a subscription's selectors into an ordered, de-duplicated endpoint
/// list over the subscriber's active channels.
///
/// `tag_filter`, when present, restricts the selectors considered: tag
/// selectors must name a tag in the filter, and explicit channel selectors
/// must reference a channel whose tag is in the filter.
pub fn resolve_channels(
    bundle: &SubscriptionBundle,
    channels: &[Channel],
    cipher: &UrlCipher,
    smtp: Option<&SmtpFallback>,
    tag_filter: Option<&[String]>,
) -> Result<Resolution, DeliveryError> {
    let filter: Option<Vec<String>> =
        tag_filter.map(|tags| tags.iter().map(|t| t.to_lowercase()).collect());

    let mut explicit_ids = Vec::new();
    let mut tag_selectors = Vec::new();
    for selector in &bundle.selectors {
        match (&selector.channel_id, &selector.tag) {
            (Some(channel_id), None) => {
                if let Some(filter) = &filter {
                    let tag = channels
                        .iter()
                        .find(|c| &c.id == channel_id)
                        .and_then(|c| c.tag.as_deref());
                    if !tag.is_some_and(|t| filter.iter().any(|f| f == t)) {
                        continue;
                    }
                }
                explicit_ids.push(channel_id.clone());
            }
            (None, Some(tag)) => {
                let tag = tag.to_lowercase();
                if filter.as_ref().is_some_and(|f| !f.contains(&tag)) {
                    continue;
                }
                tag_selectors.push(tag);
            }
            // One of the two must be set; a malformed row is skipped.
            _ => continue,
        }
    }

    let mut selected: Vec<&Channel> = Vec::new();

    for id in &explicit_ids {
        if let Some(channel) = channels.iter().find(|c| &c.id == id && c.active) {
            if selected.iter().all(|c| c.id != channel.id) {
                selected.push(channel);
            }
        }
    }

    for tag in &tag_selectors {
        for channel in channels.iter().filter(|c| c.active) {
            let Some(channel_tag) = channel.tag.as_deref() else {
                continue;
            };
            // `autosub:` tags are an enrollment namespace, never a routing
            // target for tag selectors.
            if channel_tag.starts_with(AUTOSUB_PREFIX) {
                continue;
            }
            if channel_tag.eq_ignore_ascii_case(tag) && selected.iter().all(|c| c.id != channel.id)
            {
                selected.push(channel);
            }
        }
    }

    let mut endpoints = Vec::with_capacity(selected.len());
    for channel in selected {
        let url = cipher.decrypt(&channel.url)?;
        endpoints.push(Endpoint {
            channel_id: Some(channel.id.clone()),
            url: DeliveryUrl::new(url),
        });
    }

    if endpoints.is_empty() {
        if let Some(smtp) = smtp {
            endpoints.push(fallback_endpoint(bundle, smtp)?);
        }
    }

    let pending = endpoints.is_empty();
    if pending {
        tracing::debug!(
            subscription_id = %bundle.subscription.id,
            "no channels resolved and no smtp fallback configured"
        );
    }

    Ok(Resolution { endpoints, pending })
}

/// Synthesize a `mailto` endpoint from the service SMTP configuration,
/// addressed to the subscriber.
fn fallback_endpoint(
    bundle: &SubscriptionBundle,
    smtp: &SmtpFallback,
) -> Result<Endpoint, DeliveryError> {
    let account = if bundle.subscriber.verified {
        &smtp.verified
    } else {
        &smtp.unverified
    };

    let mut url = Url::parse(&format!("mailtos://{}:{}/", smtp.host, smtp.port))
        .map_err(|err| DeliveryError::InvalidUrl(err.to_string()))?;
    url.set_username(&account.user)
        .map_err(|_| DeliveryError::InvalidUrl("invalid smtp user".into()))?;
    url.set_password(Some(&account.app_password))
        .map_err(|_| DeliveryError::InvalidUrl("invalid smtp password".into()))?;
    url.query_pairs_mut()
        .append_pair("to", &bundle.subscriber.email);

    Ok(Endpoint {
        channel_id: None,
        url: DeliveryUrl::new(url.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as B64, Engine};
    use eventcast_store::{RoutingSelector, Subscriber, Subscription};

    fn cipher() -> UrlCipher {
        UrlCipher::from_base64_key(&B64.encode([9u8; 32])).unwrap()
    }

    fn channel(cipher: &UrlCipher, id: &str, url: &str, tag: Option<&str>, active: bool) -> Channel {
        Channel {
            id: id.to_string(),
            subscriber_id: Some("user1".to_string()),
            organization_id: None,
            name: id.to_string(),
            url: cipher.encrypt(url).unwrap(),
            tag: tag.map(|t| t.to_lowercase()),
            active,
        }
    }

    fn bundle(selectors: Vec<RoutingSelector>, verified: bool) -> SubscriptionBundle {
        SubscriptionBundle {
            subscription: Subscription {
                id: "sub1".to_string(),
                event_id: "ev1".to_string(),
                subscriber_id: "user1".to_string(),
                auto_subscribed: false,
            },
            subscriber: Subscriber {
                id: "user1".to_string(),
                email: "ada@example.com".to_string(),
                verified,
            },
            selectors,
            reminder_offsets: vec![],
        }
    }

    fn channel_selector(id: &str) -> RoutingSelector {
        RoutingSelector {
            id: format!("sel-{id}"),
            subscription_id: "sub1".to_string(),
            channel_id: Some(id.to_string()),
            tag: None,
        }
    }

    fn tag_selector(tag: &str) -> RoutingSelector {
        RoutingSelector {
            id: format!("sel-{tag}"),
            subscription_id: "sub1".to_string(),
            channel_id: None,
            tag: Some(tag.to_string()),
        }
    }

    fn smtp() -> SmtpFallback {
        SmtpFallback {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            unverified: SmtpAccount {
                user: "unverified@svc.example.com".to_string(),
                app_password: "unverified-pass".to_string(),
            },
            verified: SmtpAccount {
                user: "verified@svc.example.com".to_string(),
                app_password: "verified-pass".to_string(),
            },
        }
    }

    #[test]
    fn explicit_then_tag_union_preserving_first_seen_order() {
        let cipher = cipher();
        let channels = vec![
            channel(&cipher, "c1", "ntfy://ntfy.sh/one", Some("mobile"), true),
            channel(&cipher, "c2", "ntfy://ntfy.sh/two", Some("mobile"), true),
            channel(&cipher, "c3", "gotify://g/x", Some("desk"), true),
        ];
        let bundle = bundle(
            vec![channel_selector("c2"), tag_selector("MOBILE")],
            true,
        );

        let resolution =
            resolve_channels(&bundle, &channels, &cipher, None, None).unwrap();
        let ids: Vec<_> = resolution
            .endpoints
            .iter()
            .map(|e| e.channel_id.clone().unwrap())
            .collect();
        // c2 first (explicit), then c1 by tag; c2 not repeated.
        assert_eq!(ids, vec!["c2", "c1"]);
        assert!(!resolution.pending);
    }

    #[test]
    fn resolution_is_a_subset_of_active_channels() {
        let cipher = cipher();
        let channels = vec![
            channel(&cipher, "c1", "ntfy://ntfy.sh/one", Some("mobile"), false),
            channel(&cipher, "c2", "ntfy://ntfy.sh/two", Some("mobile"), true),
        ];
        let bundle = bundle(vec![tag_selector("mobile"), channel_selector("c1")], true);

        let resolution = resolve_channels(&bundle, &channels, &cipher, None, None).unwrap();
        let ids: Vec<_> = resolution
            .endpoints
            .iter()
            .map(|e| e.channel_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["c2"], "inactive channels never resolve");
    }

    #[test]
    fn tag_selectors_never_match_autosub_tags() {
        let cipher = cipher();
        let channels = vec![channel(
            &cipher,
            "c1",
            "ntfy://ntfy.sh/one",
            Some("autosub:critical"),
            true,
        )];
        let bundle = bundle(vec![tag_selector("autosub:critical")], true);

        let resolution =
            resolve_channels(&bundle, &channels, &cipher, None, None).unwrap();
        assert!(resolution.endpoints.is_empty());
        assert!(resolution.pending);
    }

    #[test]
    fn empty_resolution_without_fallback_is_pending_not_failed() {
        let cipher = cipher();
        let bundle = bundle(vec![], true);
        let resolution = resolve_channels(&bundle, &[], &cipher, None, None).unwrap();
        assert!(resolution.pending);
        assert!(resolution.endpoints.is_empty());
    }

    #[test]
    fn fallback_synthesizes_mail_endpoint_gated_on_verification() {
        let cipher = cipher();
        let smtp = smtp();

        let unverified = bundle(vec![], false);
        let resolution =
            resolve_channels(&unverified, &[], &cipher, Some(&smtp), None).unwrap();
        assert!(!resolution.pending);
        assert_eq!(resolution.endpoints.len(), 1);
        let endpoint = &resolution.endpoints[0];
        assert!(endpoint.channel_id.is_none());
        assert_eq!(endpoint.url.scheme(), "mailtos");
        let exposed = format!("{:?}", endpoint.url);
        assert!(!exposed.contains("unverified-pass"), "debug must redact");

        let verified = bundle(vec![], true);
        let resolution =
            resolve_channels(&verified, &[], &cipher, Some(&smtp), None).unwrap();
        assert_eq!(resolution.endpoints.len(), 1);
    }

    #[test]
    fn tag_filter_restricts_selectors_per_subscription() {
        let cipher = cipher();
        let channels = vec![
            channel(&cipher, "c1", "ntfy://ntfy.sh/one", Some("mobile"), true),
            channel(&cipher, "c2", "gotify://g/x", Some("desk"), true),
        ];
        let bundle = bundle(
            vec![tag_selector("mobile"), tag_selector("desk"), channel_selector("c1")],
            true,
        );

        let filter = vec!["desk".to_string()];
        let resolution =
            resolve_channels(&bundle, &channels, &cipher, None, Some(&filter)).unwrap();
        let ids: Vec<_> = resolution
            .endpoints
            .iter()
            .map(|e| e.channel_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["c2"]);

        // A filter intersecting nothing resolves empty (recorded pending by
        // the caller), even though selectors exist.
        let filter = vec!["watch".to_string()];
        let resolution =
            resolve_channels(&bundle, &channels, &cipher, None, Some(&filter)).unwrap();
        assert!(resolution.pending);
    }

    #[test]
    fn decrypt_failure_surfaces_as_error() {
        let cipher = cipher();
        let other = UrlCipher::from_base64_key(&B64.encode([1u8; 32])).unwrap();
        let bad = channel(&other, "c1", "ntfy://ntfy.sh/one", None, true);
        let bundle = bundle(vec![channel_selector("c1")], true);

        let err = resolve_channels(&bundle, &[bad], &cipher, None, None).unwrap_err();
        assert!(matches!(err, DeliveryError::Store(_)));
    }
}
