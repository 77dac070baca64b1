use solana_program::pubkey::Pubkey;

use super::{require_nonzero, resolve_pubkey, summary, Context, Outcome};
use crate::error::{AdminError, Result};
use crate::instruction::{self, AdminOperation, MembershipChange};

/// Add or remove one server signer or relayer.
pub(super) async fn run(
    ctx: &Context<'_>,
    op: AdminOperation,
    member: Option<Pubkey>,
) -> Result<Outcome> {
    let (kind, change) = op
        .membership()
        .ok_or_else(|| AdminError::InvalidInput(format!("{op} is not a membership change")))?;
    let role = op
        .required_role()
        .ok_or_else(|| AdminError::InvalidInput(format!("{op} has no gating role")))?;

    let registry = ctx.registry()?;
    let config = ctx.require_config(&registry).await?;

    let verb = match change {
        MembershipChange::Add => "add",
        MembershipChange::Remove => "remove",
    };
    let member = resolve_pubkey(ctx, member, &format!("{} address to {verb}", kind.label()), None)?;
    require_nonzero(kind.label(), &member)?;

    let registered = registry.is_registered(kind, &member).await?;
    match (change, registered) {
        (MembershipChange::Add, true) => {
            return Err(AdminError::AlreadyRegistered { kind: kind.label(), identity: member })
        }
        (MembershipChange::Remove, false) => {
            return Err(AdminError::NotRegistered { kind: kind.label(), identity: member })
        }
        _ => {}
    }

    let signer = ctx.gated_credential(role, &config)?;
    let ix = instruction::change_membership(registry.deriver(), op, &signer.pubkey(), &member)?;

    ctx.prompter.show(&summary(
        op.name(),
        &[
            ("Network", ctx.network.name.to_string()),
            (kind.label(), member.to_string()),
            ("Signed by", format!("{} ({role})", signer.pubkey())),
        ],
    ));
    ctx.prompter.confirm_or_abort(&format!("Proceed with {op}?"))?;

    ctx.submit(op, ix, &signer).await
}
