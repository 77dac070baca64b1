use tracing::info;

use super::{require_nonzero, status::program_state, summary, Context, Outcome};
use crate::error::{AdminError, Result};
use crate::instruction::{self, AdminOperation, InitializeParams};
use crate::registry::Lookup;

/// Create the config singleton plus the first server signer and relayer. The payer
/// becomes the authority.
pub(super) async fn run(ctx: &Context<'_>) -> Result<Outcome> {
    let registry = ctx.registry()?;
    let deriver = *registry.deriver();

    program_state(ctx, deriver.program_id()).await?;

    if let Lookup::Present { address, .. } = registry.config().await? {
        return Err(AdminError::AlreadyInitialized { config: address });
    }

    let authority = ctx.prompter.keypair("authority (pays fees)")?;
    let authority_key = authority.pubkey();
    info!(authority = %authority_key, "initializing config");

    let emergency_admin = ctx.prompter.pubkey("Emergency admin address", Some(authority_key))?;
    let server_signer = ctx.prompter.pubkey("Initial server signer address", None)?;
    let relayer = ctx.prompter.pubkey("Initial relayer address", None)?;
    let fee_recipient = ctx.prompter.pubkey("Fee recipient address", None)?;

    require_nonzero("emergency admin", &emergency_admin)?;
    require_nonzero("server signer", &server_signer)?;
    require_nonzero("relayer", &relayer)?;
    require_nonzero("fee recipient", &fee_recipient)?;

    let params = InitializeParams {
        authority: authority_key,
        emergency_admin,
        server_signer,
        fee_recipient,
        relayer,
    };
    let ix = instruction::initialize(&deriver, &params)?;

    ctx.prompter.show(&summary(
        "Initialize",
        &[
            ("Network", ctx.network.name.to_string()),
            ("Program ID", deriver.program_id().to_string()),
            ("Config PDA", deriver.config()?.address.to_string()),
            ("Authority", authority_key.to_string()),
            ("Emergency admin", emergency_admin.to_string()),
            ("Server signer", server_signer.to_string()),
            ("Relayer", relayer.to_string()),
            ("Fee recipient", fee_recipient.to_string()),
        ],
    ));
    ctx.prompter.confirm_or_abort("Proceed with initialization?")?;

    ctx.submit(AdminOperation::Initialize, ix, &authority).await
}
