//! Program deployment through the `solana` CLI.
//!
//! The CLI signs from keypair files, so the deployer (and, for a first deploy, the
//! program keypair) are staged for the duration of the child process only. The build
//! artifact is checked before any credential is read.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::Utc;
use solana_program::pubkey::Pubkey;
use tracing::{info, warn};

use super::status::{program_state, ProgramState};
use super::{summary, Context, Outcome};
use crate::auth::authorize_upgrade;
use crate::error::{AdminError, Result};
use crate::keypair::Keypair;
use crate::pda::AddressDeriver;
use crate::process::Invocation;
use crate::project::DeploymentRecord;
use crate::rpc::lamports_to_sol;
use crate::staging::{with_staged_credential, with_staged_credentials};

fn deploy_invocation(
    ctx: &Context<'_>,
    artifact: &Path,
    keypair: &Path,
    program_id: impl Into<OsString>,
) -> Invocation {
    Invocation::new(ctx.deploy.solana_cli.clone(), ctx.project.root())
        .arg("program")
        .arg("deploy")
        .arg(artifact.as_os_str())
        .arg("--url")
        .arg(ctx.network.rpc_url.clone())
        .arg("--keypair")
        .arg(keypair.as_os_str())
        .arg("--program-id")
        .arg(program_id)
        .arg("--commitment")
        .arg("confirmed")
}

fn confirm_mainnet(ctx: &Context<'_>, action: &str) -> Result<()> {
    if ctx.network.key.is_mainnet() {
        ctx.prompter.show(&format!("WARNING: this is a MAINNET {action}."));
        ctx.prompter.confirm_or_abort(&format!("Are you sure you want to {action} on MAINNET?"))?;
    }
    Ok(())
}

/// Log and show a failed post-deploy update. Returns whether it succeeded.
fn best_effort(ctx: &Context<'_>, what: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "failed to update {what}");
            ctx.prompter.show(&format!("WARNING: could not update {what}: {e}"));
            false
        }
    }
}

/// Warn and ask when the payer's balance is under `min_sol`.
async fn check_balance(ctx: &Context<'_>, payer: &Pubkey, min_sol: f64) -> Result<f64> {
    let balance = lamports_to_sol(ctx.fetcher.get_balance(payer).await?);
    ctx.prompter.show(&format!("Balance: {balance:.4} SOL"));
    if balance < min_sol {
        warn!(%payer, balance, min_sol, "payer balance below recommended minimum");
        ctx.prompter
            .show(&format!("WARNING: balance might be low; this needs about {min_sol} SOL."));
        ctx.prompter.confirm_or_abort("Continue anyway?")?;
    }
    Ok(balance)
}

/// First deployment of the program, from an existing or freshly generated program key.
pub(super) async fn deploy(ctx: &Context<'_>) -> Result<Outcome> {
    let artifact = ctx.project.require_artifact()?;
    confirm_mainnet(ctx, "deploy")?;

    let (program, generated) = match ctx
        .prompter
        .optional_keypair("program (leave empty to generate a new program id)")?
    {
        Some(existing) => (existing, false),
        None => (Keypair::generate(), true),
    };
    let program_id = program.pubkey();

    if generated {
        // Shown once on stdout; never logged.
        ctx.prompter.show(&format!("Generated new program id: {program_id}"));
        ctx.prompter.show("SAVE THIS PROGRAM PRIVATE KEY SECURELY. It is not shown again:");
        ctx.prompter.show(&format!("  {}", program.to_base58().as_str()));
        ctx.prompter.confirm_or_abort("Have you saved the program private key?")?;
    }

    let deployer = ctx.prompter.keypair("deployer (pays fees)")?;
    let deployer_key = deployer.pubkey();
    check_balance(ctx, &deployer_key, ctx.deploy.deploy_min_balance_sol).await?;

    ctx.prompter.show(&summary(
        "Deploy",
        &[
            ("Network", ctx.network.name.to_string()),
            (
                "Program ID",
                format!("{program_id} ({})", if generated { "NEW" } else { "EXISTING" }),
            ),
            ("Deployer", deployer_key.to_string()),
            ("Artifact", artifact.display().to_string()),
        ],
    ));
    ctx.prompter.confirm_or_abort("Proceed with deployment?")?;

    let runner = ctx.runner;
    with_staged_credentials(
        &ctx.staging_dir,
        &[("deployer", &deployer), ("program", &program)],
        |paths: Vec<PathBuf>| {
            let invocation = deploy_invocation(ctx, &artifact, &paths[0], paths[1].as_os_str());
            async move { runner.run(&invocation).await }
        },
    )
    .await?;
    info!(%program_id, network = %ctx.network.key, "program deployed");

    // The program is live from here on; local bookkeeping failures only warn.
    let mut sources_updated = true;
    sources_updated &= best_effort(ctx, "declare_id!", ctx.project.set_declared_id(&program_id));
    sources_updated &= best_effort(
        ctx,
        "Anchor.toml",
        ctx.project.set_anchor_program_id(ctx.network.key, &program_id),
    );
    sources_updated &= best_effort(ctx, "IDL", ctx.project.set_idl_address(&program_id).map(drop));
    if sources_updated {
        ctx.prompter.show("Program id written to the sources; rebuild before the next upgrade.");
    } else {
        ctx.prompter.show(&format!(
            "Set the program id to {program_id} by hand where the update failed, then rebuild."
        ));
    }

    let record = ctx
        .project
        .write_deployment_record(
            ctx.network.key,
            &DeploymentRecord {
                network: ctx.network.name.to_string(),
                program_id: program_id.to_string(),
                deployer: deployer_key.to_string(),
                timestamp: Utc::now(),
            },
        )
        .map_err(|e| {
            warn!(%program_id, error = %e, "failed to write deployment record");
            ctx.prompter.show(&format!("WARNING: deployment record not written: {e}"));
        })
        .ok();

    let config = AddressDeriver::new(program_id, ctx.seeds).config().ok();
    Ok(Outcome::Deployed {
        program_id,
        upgraded: false,
        program_link: ctx.account_link(&program_id),
        config_link: config.map(|c| ctx.account_link(&c.address)),
        record,
    })
}

/// Replace the code of a deployed program. The credential must be the loader's
/// recorded upgrade authority.
pub(super) async fn upgrade(ctx: &Context<'_>) -> Result<Outcome> {
    let artifact = ctx.project.require_artifact()?;
    confirm_mainnet(ctx, "upgrade")?;

    let program_id = match ctx.program_id {
        Some(id) => id,
        None => ctx.prompter.pubkey("Program ID to upgrade", None)?,
    };

    let header = match program_state(ctx, &program_id).await? {
        ProgramState::Upgradeable { header, .. } => header,
        ProgramState::Other { owner } => {
            return Err(AdminError::InvalidInput(format!(
                "program {program_id} is owned by {owner}, not the upgradeable loader"
            )))
        }
    };
    info!(%program_id, "program found");

    let authority = ctx.prompter.keypair("upgrade authority")?;
    authorize_upgrade(&authority.pubkey(), &header).into_result()?;

    let balance =
        check_balance(ctx, &authority.pubkey(), ctx.deploy.upgrade_min_balance_sol).await?;

    ctx.prompter.show(&summary(
        "Upgrade",
        &[
            ("Network", ctx.network.name.to_string()),
            ("Program ID", program_id.to_string()),
            ("Authority", authority.pubkey().to_string()),
            ("Balance", format!("{balance:.4} SOL")),
        ],
    ));
    ctx.prompter.confirm_or_abort("Proceed with upgrade?")?;

    let runner = ctx.runner;
    with_staged_credential(&ctx.staging_dir, "upgrade-authority", &authority, |path: PathBuf| {
        // A pubkey (not a keypair file) for --program-id selects upgrade mode.
        let invocation = deploy_invocation(ctx, &artifact, &path, program_id.to_string());
        async move { runner.run(&invocation).await }
    })
    .await?;
    info!(%program_id, network = %ctx.network.key, "program upgraded");

    match ctx.project.set_idl_address(&program_id) {
        Ok(true) => ctx.prompter.show("IDL address updated to match the program id."),
        Ok(false) => {}
        Err(e) => {
            best_effort(ctx, "IDL", Err(e));
        }
    }

    Ok(Outcome::Deployed {
        program_id,
        upgraded: true,
        program_link: ctx.account_link(&program_id),
        config_link: None,
        record: None,
    })
}
