use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use nu_ansi_term::Color::Red;

use vendorlock::analyzer::Analyzer;
use vendorlock::bridge::{Bridge, CancelToken, SourceManager};
use vendorlock::cli::{Cli, Opt};
use vendorlock::context::Context;
use vendorlock::errors::VendorlockError;
use vendorlock::lock::{compute_inputs_digest, Lock};
use vendorlock::manifest::Manifest;
use vendorlock::project::ProjectIdentifier;
use vendorlock::solver;
use vendorlock::transaction::{self, VendorMode};
use vendorlock::{vendorlock_info, vendorlock_warn};

/// The concrete VCS-backed adapter is outside this crate's scope (§4.3) —
/// `ensure`/`check` fail clearly with [`VendorlockError::MissingSource`]
/// rather than silently doing nothing. `init`/`status`/`prune` never touch
/// a source manager, since they only read local state.
struct UnconfiguredSourceManager;

impl SourceManager for UnconfiguredSourceManager {
    fn deduce_project_root(&self, import_path: &str) -> vendorlock::project::ProjectRoot {
        vendorlock::project::ProjectRoot(import_path.to_string())
    }

    fn list_versions(&self, id: &ProjectIdentifier, _cancel: &CancelToken) -> vendorlock::errors::Result<Vec<vendorlock::version::Version>> {
        Err(unconfigured(id))
    }

    fn revision_present_in(&self, id: &ProjectIdentifier, _revision: &str, _cancel: &CancelToken) -> vendorlock::errors::Result<bool> {
        Err(unconfigured(id))
    }

    fn get_manifest_and_lock(
        &self,
        id: &ProjectIdentifier,
        _version: &vendorlock::version::Version,
        _cancel: &CancelToken,
    ) -> vendorlock::errors::Result<(Option<Manifest>, Option<Lock>)> {
        Err(unconfigured(id))
    }

    fn list_packages(
        &self,
        id: &ProjectIdentifier,
        _version: &vendorlock::version::Version,
        _cancel: &CancelToken,
    ) -> vendorlock::errors::Result<vendorlock::analyzer::PackageTree> {
        Err(unconfigured(id))
    }

    fn export_project(
        &self,
        id: &ProjectIdentifier,
        _version: &vendorlock::version::Version,
        _dest: &std::path::Path,
        _cancel: &CancelToken,
    ) -> vendorlock::errors::Result<()> {
        Err(unconfigured(id))
    }
}

fn unconfigured(id: &ProjectIdentifier) -> VendorlockError {
    VendorlockError::MissingSource {
        root: id.root.clone(),
        detail: "no source-manager adapter is configured in this build".to_string(),
    }
}

fn root_identity(ctx: &Context) -> ProjectIdentifier {
    let name = ctx
        .project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("root")
        .to_string();
    ProjectIdentifier::new(name)
}

fn analyze_root(ctx: &Context, manifest: &Manifest) -> (vendorlock::analyzer::PackageTree, std::collections::BTreeSet<vendorlock::project::ProjectRoot>) {
    let analyzer = Analyzer::default();
    let tree = analyzer.list_packages(&ctx.project_root, true);
    for (path, detail) in tree.warnings() {
        vendorlock_warn!("{path}: {detail}");
    }
    let root_id = root_identity(ctx);
    let reach = analyzer.external_reach(&root_id.root, &tree, &manifest.ignored, &manifest.required);
    (tree, reach)
}

fn cmd_init(ctx: &Context) -> Result<()> {
    if ctx.manifest_path().exists() {
        anyhow::bail!("Manifest.toml already exists at {}", ctx.manifest_path().display());
    }
    let manifest = Manifest::default();
    let (_tree, reach) = analyze_root(ctx, &manifest);
    for root in &reach {
        vendorlock_info!("discovered {root}");
    }
    std::fs::write(ctx.manifest_path(), manifest.to_toml_string()?).context("writing Manifest.toml")?;
    vendorlock_info!("wrote {}", ctx.manifest_path().display());
    Ok(())
}

fn load_manifest_and_lock(ctx: &Context) -> Result<(Manifest, Option<Lock>)> {
    let manifest = Manifest::load(&ctx.manifest_path()).with_context(|| format!("loading {}", ctx.manifest_path().display()))?;
    let lock = match Lock::load(&ctx.lock_path()) {
        Ok(lock) => Some(lock),
        Err(e) => {
            if ctx.lock_path().exists() {
                vendorlock_warn!("ignoring malformed lock: {e}");
            }
            None
        }
    };
    Ok((manifest, lock))
}

fn cmd_ensure(ctx: &Context, force: bool, no_vendor: bool) -> Result<()> {
    let (manifest, prior_lock) = load_manifest_and_lock(ctx)?;
    let (tree, reach) = analyze_root(ctx, &manifest);
    let digest = compute_inputs_digest(&manifest, &tree);

    let up_to_date = !force && prior_lock.as_ref().is_some_and(|l| l.solve_meta.inputs_digest == Some(digest));
    if up_to_date {
        vendorlock_info!("Lock.toml is current, nothing to solve");
        return Ok(());
    }

    let bridge = Bridge::new(Arc::new(UnconfiguredSourceManager));
    let root_id = root_identity(ctx);
    let mut lock = solver::solve(&bridge, CancelToken::new(), &root_id, &manifest, &tree, &reach, prior_lock.as_ref()).context("solving dependencies")?;
    lock.solve_meta.inputs_digest = Some(digest);

    let mode = if no_vendor { VendorMode::Never } else { VendorMode::OnChanged };
    transaction::commit(&bridge, &ctx.project_root, &manifest, &lock, prior_lock.as_ref(), mode, &CancelToken::new(), |p, s| {
        vendorlock_info!("{:?} {}", s, p.id.root);
    })
    .context("writing manifest/lock/vendor")?;

    vendorlock_info!("solved {} project(s)", lock.projects.len());
    Ok(())
}

fn cmd_check(ctx: &Context) -> Result<()> {
    let (manifest, prior_lock) = load_manifest_and_lock(ctx)?;
    let (tree, reach) = analyze_root(ctx, &manifest);
    let digest = compute_inputs_digest(&manifest, &tree);
    if prior_lock.as_ref().is_some_and(|l| l.solve_meta.inputs_digest == Some(digest)) {
        vendorlock_info!("up to date");
        return Ok(());
    }

    let bridge = Bridge::new(Arc::new(UnconfiguredSourceManager));
    let root_id = root_identity(ctx);
    match solver::solve(&bridge, CancelToken::new(), &root_id, &manifest, &tree, &reach, prior_lock.as_ref()) {
        Ok(lock) => {
            vendorlock_info!("solvable: {} project(s)", lock.projects.len());
            Ok(())
        }
        Err(VendorlockError::UnresolvableConflict { root, detail, .. }) => {
            eprintln!("{}", Red.bold().paint(format!("no solution for {root}: {detail}")));
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_status(ctx: &Context) -> Result<()> {
    let (manifest, prior_lock) = load_manifest_and_lock(ctx)?;
    let Some(lock) = prior_lock else {
        println!("no Lock.toml yet; run `vendorlock ensure`");
        return Ok(());
    };
    let (tree, _reach) = analyze_root(ctx, &manifest);
    let digest = compute_inputs_digest(&manifest, &tree);
    let current = lock.solve_meta.inputs_digest == Some(digest);
    println!("{} project(s) locked, digest {}", lock.projects.len(), if current { "current" } else { "stale" });
    for p in &lock.projects {
        println!("  {} {}", p.id.root, p.version);
    }
    Ok(())
}

fn cmd_prune(ctx: &Context) -> Result<()> {
    let (manifest, prior_lock) = load_manifest_and_lock(ctx)?;
    let Some(lock) = prior_lock else {
        anyhow::bail!("no Lock.toml to prune against");
    };
    // Pruning never calls into the bridge: it only re-derives the local
    // vendor tree from the already-locked projects on disk.
    for project in &lock.projects {
        let dest = ctx.vendor_path().join(&project.id.root.0);
        if !dest.exists() {
            continue;
        }
        let prune = manifest.prune_for(&project.id.root);
        vendorlock::vendor::apply_prune_in_place(&dest, project, &prune)?;
    }
    vendorlock_info!("re-applied prune settings to {}", ctx.vendor_path().display());
    Ok(())
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::discover(cli.project.as_deref())?;
    match cli.command {
        Opt::Init => cmd_init(&ctx),
        Opt::Ensure { force, no_vendor } => cmd_ensure(&ctx, force, no_vendor),
        Opt::Check => cmd_check(&ctx),
        Opt::Status => cmd_status(&ctx),
        Opt::Prune => cmd_prune(&ctx),
    }
}

/// Exit codes per §6: 0 success, 1 solver failure, 2 I/O failure, 3 usage
/// error. Clap itself already exits with its own usage-error code before
/// `real_main` ever runs, so this only classifies errors the core raises.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<VendorlockError>() {
        Some(VendorlockError::UnresolvableConflict { .. }) => 1,
        Some(VendorlockError::WriteFailure(_)) | Some(VendorlockError::MissingSource { .. }) => 2,
        Some(VendorlockError::MalformedManifest(_)) | Some(VendorlockError::MalformedLock(_)) => 3,
        _ => 1,
    }
}

fn main() {
    env_logger::init();
    if let Err(e) = real_main() {
        eprintln!("{}", Red.bold().paint(format!("vendorlock failed: {e:?}")));
        std::process::exit(exit_code_for(&e));
    }
}

#[test]
fn verify_app() {
    use clap::CommandFactory;
    Cli::command().debug_assert()
}
