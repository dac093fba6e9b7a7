//! Channel families: per-feature subscription configuration.
//!
//! Each feature that streams updates (generic broadcast, mapping updates,
//! contacts, docs, WebEx messages) is a [`ChannelFamily`]: a channel-name
//! template plus an optional scope parameter. Families only describe how a
//! subscribe or publish request maps onto a [`Channel`] and scope; all of
//! them share the same registry and publisher.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use utoipa::ToSchema;

use super::channel::WILDCARD_CHANNEL;
use super::Channel;
use crate::error::GatewayError;

/// Placeholder substituted with the scope value in a channel template.
pub const SCOPE_PLACEHOLDER: &str = "{scope}";

/// Resolved target of a subscribe or publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Registry channel.
    pub channel: Channel,
    /// Scope filter within the channel.
    pub scope: Option<String>,
}

/// Configuration of one channel family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChannelFamily {
    /// Family name as it appears in URLs (`/events/{name}`).
    pub name: String,
    /// Channel name, optionally containing [`SCOPE_PLACEHOLDER`].
    pub channel_template: String,
    /// Query parameter carrying the scope. When set it is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_param: Option<String>,
}

impl ChannelFamily {
    /// A family whose channel is its own name and which takes no scope.
    #[must_use]
    pub fn unscoped(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            channel_template: name.clone(),
            name,
            scope_param: None,
        }
    }

    /// A family sharing one channel, filtered by the `scope_param` value.
    #[must_use]
    pub fn scoped(name: impl Into<String>, scope_param: impl Into<String>) -> Self {
        Self {
            scope_param: Some(scope_param.into()),
            ..Self::unscoped(name)
        }
    }

    /// Replaces the channel template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.channel_template = template.into();
        self
    }

    /// Returns `true` if requests must carry a scope value.
    #[must_use]
    pub const fn is_scoped(&self) -> bool {
        self.scope_param.is_some()
    }

    /// Resolves request query parameters into a channel and scope.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingParameter`] if the family is scoped
    /// and the scope parameter is absent or blank.
    pub fn resolve(&self, params: &HashMap<String, String>) -> Result<Subscription, GatewayError> {
        let Some(param) = &self.scope_param else {
            return Ok(Subscription {
                channel: Channel::new(self.channel_template.as_str()),
                scope: None,
            });
        };

        let scope = params
            .get(param)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::MissingParameter(param.clone()))?;

        Ok(Subscription {
            channel: Channel::new(self.channel_template.replace(SCOPE_PLACEHOLDER, scope)),
            scope: Some(scope.to_string()),
        })
    }
}

/// Set of channel families known to the gateway, keyed by name.
#[derive(Debug, Clone)]
pub struct ChannelCatalog {
    families: BTreeMap<String, ChannelFamily>,
}

impl ChannelCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }

    /// The built-in families: `all`, `mapping` (scoped by `groupId`),
    /// `contacts`, `docs` and `webex`.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with_family(ChannelFamily::unscoped(WILDCARD_CHANNEL))
            .with_family(ChannelFamily::scoped("mapping", "groupId"))
            .with_family(ChannelFamily::unscoped("contacts"))
            .with_family(ChannelFamily::unscoped("docs"))
            .with_family(ChannelFamily::unscoped("webex"))
    }

    /// Adds or replaces a family.
    #[must_use]
    pub fn with_family(mut self, family: ChannelFamily) -> Self {
        self.families.insert(family.name.clone(), family);
        self
    }

    /// Looks up a family by name.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownChannelFamily`] if no such family is
    /// configured.
    pub fn get(&self, name: &str) -> Result<&ChannelFamily, GatewayError> {
        self.families
            .get(name)
            .ok_or_else(|| GatewayError::UnknownChannelFamily(name.to_string()))
    }

    /// Iterates families in name order.
    pub fn families(&self) -> impl Iterator<Item = &ChannelFamily> {
        self.families.values()
    }
}

impl Default for ChannelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
