//! Completion watcher: waits for the owner to join and grants the role.

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::{Dispatch, GatewayEvent, GUILD_MEMBER_ADD};
use crate::http::DiscordApi;
use crate::notify::Notifier;
use crate::pipeline::ProvisioningResult;
use crate::session::{EventHandler, Watch};
use crate::types::Snowflake;

/// The (guild, user) pair whose join completes the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCondition {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
}

impl CompletionCondition {
    pub fn matches(&self, dispatch: &Dispatch) -> bool {
        dispatch.is(GUILD_MEMBER_ADD)
            && dispatch.guild_id.as_deref() == Some(self.guild_id.as_str())
            && dispatch.user_id.as_deref() == Some(self.user_id.as_str())
    }
}

/// Grants the admin role the first time the expected member joins.
///
/// The grant is attempted at most once: the guard flips before the REST call,
/// so neither a failure nor a duplicate join event can trigger a second one.
pub struct CompletionWatcher<'a, A, N> {
    api: &'a A,
    notifier: &'a N,
    condition: CompletionCondition,
    admin_role_id: Snowflake,
    granted: bool,
}

impl<'a, A, N> CompletionWatcher<'a, A, N>
where
    A: DiscordApi + Sync,
    N: Notifier,
{
    pub fn new(api: &'a A, notifier: &'a N, result: &ProvisioningResult) -> Self {
        Self {
            api,
            notifier,
            condition: CompletionCondition {
                guild_id: result.guild_id.clone(),
                user_id: result.owner_id.clone(),
            },
            admin_role_id: result.admin_role_id.clone(),
            granted: false,
        }
    }

    pub fn condition(&self) -> &CompletionCondition {
        &self.condition
    }

    /// Whether the grant has been attempted.
    pub fn granted(&self) -> bool {
        self.granted
    }
}

impl<A, N> EventHandler for CompletionWatcher<'_, A, N>
where
    A: DiscordApi + Sync,
    N: Notifier,
{
    async fn on_event(&mut self, event: &GatewayEvent) -> Result<Watch, Error> {
        let GatewayEvent::Dispatch(dispatch) = event else {
            return Ok(Watch::Pending);
        };
        if !dispatch.is(GUILD_MEMBER_ADD) {
            return Ok(Watch::Pending);
        }
        if !self.condition.matches(dispatch) {
            debug!(
                guild_id = ?dispatch.guild_id,
                user_id = ?dispatch.user_id,
                "member joined, not the expected owner"
            );
            return Ok(Watch::Pending);
        }
        if self.granted {
            warn!(user_id = %self.condition.user_id, "duplicate owner join ignored");
            return Ok(Watch::Pending);
        }

        self.granted = true;
        let CompletionCondition { guild_id, user_id } = &self.condition;
        info!(%guild_id, %user_id, role_id = %self.admin_role_id, "owner joined, granting admin role");
        self.api
            .add_member_role(guild_id, user_id, &self.admin_role_id)
            .await?;

        self.notifier.owner_granted(guild_id, user_id);
        Ok(Watch::Complete)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
