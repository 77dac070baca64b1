use solana_program::pubkey::Pubkey;

use super::{require_nonzero, resolve_pubkey, summary, Context, Outcome};
use crate::auth::Role;
use crate::error::{AdminError, Result};
use crate::instruction::{self, AdminOperation};
use crate::state::ConfigRecord;

const TRANSFER_PHRASE: &str = "TRANSFER";

/// Label and current value of the field `op` rewrites.
fn field(op: AdminOperation, config: &ConfigRecord) -> Result<(&'static str, Pubkey)> {
    Ok(match op {
        AdminOperation::SetEmergencyAdmin => ("emergency admin", config.emergency_admin),
        AdminOperation::SetFeeRecipient => ("fee recipient", config.fee_recipient),
        AdminOperation::TransferAuthority => ("authority", config.authority),
        other => return Err(AdminError::InvalidInput(format!("{other} is not a config update"))),
    })
}

/// `set-emergency-admin`, `set-fee-recipient`, `transfer-authority`.
pub(super) async fn run(
    ctx: &Context<'_>,
    op: AdminOperation,
    new_value: Option<Pubkey>,
) -> Result<Outcome> {
    let transfer = op == AdminOperation::TransferAuthority;

    let registry = ctx.registry()?;
    let config = ctx.require_config(&registry).await?;
    let (label, current) = field(op, &config)?;

    if transfer {
        ctx.prompter.show("WARNING: transferring authority is irreversible.");
    }
    ctx.prompter.show(&format!("Current {label}: {current}"));

    let new_value = resolve_pubkey(ctx, new_value, &format!("New {label} address"), None)?;
    require_nonzero(label, &new_value)?;
    if new_value == current {
        return Err(AdminError::AlreadyInState(format!("{label} is already {current}")));
    }

    let signer = ctx.gated_credential(Role::Authority, &config)?;
    let ix = instruction::update_config(registry.deriver(), op, &signer.pubkey(), &new_value)?;

    ctx.prompter.show(&summary(
        op.name(),
        &[
            ("Network", ctx.network.name.to_string()),
            ("Current", current.to_string()),
            ("New", new_value.to_string()),
        ],
    ));

    if transfer {
        ctx.prompter.show(
            "You lose control of this program unless you hold the new authority's key.",
        );
        ctx.prompter.confirm_or_abort("Do you understand this is irreversible?")?;
        let message = format!("Type '{TRANSFER_PHRASE}' to confirm");
        if !ctx.prompter.typed_confirmation(&message, TRANSFER_PHRASE)? {
            return Err(AdminError::UserAborted);
        }
    } else {
        ctx.prompter.confirm_or_abort(&format!("Proceed with {op}?"))?;
    }

    ctx.submit(op, ix, &signer).await
}
