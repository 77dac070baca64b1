use tracing::info;

use super::{summary, Context, Outcome};
use crate::auth::Role;
use crate::error::Result;
use crate::instruction::{self, AdminOperation};

pub(super) async fn run(ctx: &Context<'_>, pause: bool) -> Result<Outcome> {
    let op = if pause { AdminOperation::Pause } else { AdminOperation::Unpause };

    let registry = ctx.registry()?;
    let config = ctx.require_config(&registry).await?;

    // Nothing to change is a clean exit, not a failure.
    if config.paused == pause {
        let notice = if pause { "Program is already paused." } else { "Program is not paused." };
        info!(paused = config.paused, "pause flag already in requested state");
        return Ok(Outcome::Unchanged(notice.to_string()));
    }

    let signer = ctx.gated_credential(Role::EmergencyAdmin, &config)?;
    let ix = instruction::set_paused(registry.deriver(), pause, &signer.pubkey())?;

    ctx.prompter.show(&summary(
        op.name(),
        &[
            ("Network", ctx.network.name.to_string()),
            ("Program ID", registry.deriver().program_id().to_string()),
            ("Emergency admin", signer.pubkey().to_string()),
        ],
    ));
    if pause {
        ctx.prompter.show("Pausing halts every payment until unpause.");
    }
    ctx.prompter.confirm_or_abort(&format!("Proceed with {op}?"))?;

    ctx.submit(op, ix, &signer).await
}
