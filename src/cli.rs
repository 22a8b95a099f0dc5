//! Command implementations for the `padcursor` binary

use anyhow::{bail, Context, Result};
use colored::*;
use padcursor::arbitration::{hooks, ArbitrationEngine};
use padcursor::config::{ControllerConfig, RewriterConfig};
use padcursor::host::console::{ConsoleGame, ConsoleHost, ConsolePointer};
use padcursor::host::SurfaceMetrics;
use padcursor::input::device::NullPoller;
use padcursor::input::layout::{button_name, AXIS_COUNT, BUTTON_COUNT, UNBOUND};
use padcursor::input::provider::{list_gamepads, GilrsPoller};
use padcursor::input::{Action, Binding, BindingRegistry, BindingStore, DevicePoller};
use padcursor::rewriter::{CallSiteRewriter, RewriteOutcome};
use padcursor::session::InputSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rewrite one class file or every `.class` under a directory
///
/// Without `output` nothing is written; the run only reports what would
/// change.
pub fn rewrite(
    config: &RewriterConfig,
    path: &Path,
    output: Option<&Path>,
    class_name: Option<&str>,
) -> Result<()> {
    let rewriter = CallSiteRewriter::from_config(config);

    println!("\n{}", "=== Call-Site Rewriter ===".bold().cyan());
    println!(
        "  Redirecting {} → {}",
        config.target_owner.bright_white(),
        config.hook_owner.bright_white()
    );

    if path.is_dir() {
        let mut files = Vec::new();
        collect_class_files(path, &mut files)?;
        files.sort();
        debug!("Found {} class file(s) under {}", files.len(), path.display());

        for file in &files {
            let relative = file.strip_prefix(path).unwrap_or(file);
            let name = class_name_for(relative);
            let target = output.map(|out| out.join(relative));
            rewrite_file(&rewriter, file, &name, target.as_deref())?;
        }
    } else {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read class file: {}", path.display()))?;
        let name = match class_name {
            Some(name) => name.to_string(),
            None => derive_class_name(path, &bytes),
        };
        rewrite_bytes(&rewriter, &bytes, &name, output)?;
    }

    let stats = rewriter.stats();
    println!("\n{}", "Summary:".bold());
    println!("  Rewritten: {} ({} call sites)", stats.rewritten.to_string().green(), stats.call_sites);
    println!("  Unchanged: {}", stats.unchanged);
    println!("  Skipped:   {}", stats.skipped.to_string().dimmed());
    println!("  Failed:    {}", stats.failed.to_string().red());
    if output.is_none() {
        println!("\n  {}", "Dry run: pass -o to write the rewritten classes".dimmed());
    }
    println!();

    Ok(())
}

fn rewrite_file(rewriter: &CallSiteRewriter, file: &Path, name: &str, target: Option<&Path>) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read class file: {}", file.display()))?;
    rewrite_bytes(rewriter, &bytes, name, target)
}

fn rewrite_bytes(rewriter: &CallSiteRewriter, bytes: &[u8], name: &str, target: Option<&Path>) -> Result<()> {
    let outcome = rewriter.rewrite(name, bytes);
    let out: &[u8] = match &outcome {
        RewriteOutcome::Rewritten { bytes: rewritten, call_sites } => {
            println!("  {} {}", "[REWRITTEN]".green(), name);
            for site in call_sites {
                println!(
                    "      {}@{} {}{} → {}",
                    site.method, site.pc, site.name, site.descriptor, site.hook_name.cyan()
                );
            }
            rewritten
        }
        RewriteOutcome::Failed(e) => {
            println!("  {} {} ({})", "[FAILED]".red(), name, e);
            bytes
        }
        RewriteOutcome::Skipped => {
            debug!("Skipped {}", name);
            bytes
        }
        RewriteOutcome::Unchanged => bytes,
    };

    if let Some(target) = target {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(target, out)
            .with_context(|| format!("Failed to write class file: {}", target.display()))?;
    }
    Ok(())
}

fn collect_class_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_class_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "class") {
            files.push(path);
        }
    }
    Ok(())
}

/// `net/example/Foo.class` → `net.example.Foo`
fn class_name_for(relative: &Path) -> String {
    relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

/// Name for a lone class file: its own `this_class`, else the file stem
fn derive_class_name(path: &Path, bytes: &[u8]) -> String {
    padcursor::rewriter::classfile::ClassFile::parse(bytes)
        .and_then(|class| class.name())
        .map(|name| name.replace('/', "."))
        .unwrap_or_else(|_| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}

/// Show, edit and persist the binding table
pub fn bindings(store: &BindingStore, set: &[String], unbind: &[String], reset: bool) -> Result<()> {
    let mut registry = BindingRegistry::new();
    store.load_into(&mut registry);
    let mut edited = false;

    if reset {
        registry.reset_all();
        edited = true;
    }

    for edit in set {
        let Some((id, index)) = edit.split_once('=') else {
            bail!("Expected ID=INDEX, got '{}'", edit);
        };
        let action: Action = id.trim().parse().map_err(anyhow::Error::msg)?;
        let index = parse_index(registry.get(action), index.trim())?;

        if let Some(conflict) = registry.find_conflict(index, action) {
            println!(
                "  {} {} is also bound to {}",
                "[CONFLICT]".yellow(),
                button_name(index, conflict.is_trigger()),
                conflict.id()
            );
        }
        registry.rebind(action, index);
        edited = true;
    }

    for id in unbind {
        let action: Action = id.trim().parse().map_err(anyhow::Error::msg)?;
        registry.unbind(action);
        edited = true;
    }

    if edited {
        store.save(&registry)?;
        info!("Saved bindings to {}", store.path().display());
    }

    print_bindings(&registry);
    Ok(())
}

/// A physical index by number or by display name (`A`, `RB`, `LT`, `---`)
fn parse_index(binding: &Binding, value: &str) -> Result<i32> {
    let limit = if binding.is_trigger() { AXIS_COUNT } else { BUTTON_COUNT };
    let limit = limit as i32;

    if let Ok(index) = value.parse::<i32>() {
        if index != UNBOUND && !(0..limit).contains(&index) {
            bail!("Index {} is out of range for {}", index, binding.id());
        }
        return Ok(index);
    }

    std::iter::once(UNBOUND)
        .chain(0..limit)
        .find(|&i| button_name(i, binding.is_trigger()).eq_ignore_ascii_case(value))
        .with_context(|| format!("Unknown input '{}' for {}", value, binding.id()))
}

fn print_bindings(registry: &BindingRegistry) {
    println!("\n{}", "=== Controller Bindings ===".bold().cyan());
    for category in registry.categories() {
        println!("\n{}", format!("{}:", category).bold());
        for binding in registry.by_category(*category) {
            let name = binding.index_name();
            let shown = if binding.is_unbound() {
                name.dimmed()
            } else if binding.is_modified() {
                name.yellow()
            } else {
                name.green()
            };
            let marker = if binding.is_modified() { "*" } else { " " };
            println!("  {:<20} {:<8}{}", binding.id(), shown, marker);
        }
    }
    println!();
}

/// Parse `WIDTHxHEIGHT@SCALE`, e.g. `427x240@3`
pub fn parse_surface(value: &str) -> Result<SurfaceMetrics> {
    let (size, scale) = value.split_once('@').unwrap_or((value, "1"));
    let Some((width, height)) = size.split_once('x') else {
        bail!("Expected WIDTHxHEIGHT@SCALE, got '{}'", value);
    };

    let width: f32 = width.trim().parse().context("Invalid surface width")?;
    let height: f32 = height.trim().parse().context("Invalid surface height")?;
    let scale: f32 = scale.trim().parse().context("Invalid surface scale")?;
    if width <= 0.0 || height <= 0.0 || scale <= 0.0 {
        bail!("Surface dimensions must be positive, got '{}'", value);
    }
    Ok(SurfaceMetrics::new(width, height, scale))
}

/// Headless frame loop against the console host until Ctrl+C
pub async fn run(
    config: ControllerConfig,
    store: &BindingStore,
    fps: u32,
    metrics: SurfaceMetrics,
    open_surface: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let mut registry = BindingRegistry::new();
    let loaded = store.load_into(&mut registry);
    debug!("{} binding override(s) loaded", loaded);

    let poller: Box<dyn DevicePoller> = match GilrsPoller::start() {
        Ok(poller) => Box::new(poller),
        Err(e) => {
            warn!("Gamepad backend unavailable ({}), running without a controller", e);
            Box::new(NullPoller)
        }
    };

    let host = Arc::new(ConsoleHost::new(metrics));
    if open_surface {
        host.open_surface("main menu");
    }
    let pointer = Arc::new(ConsolePointer::default());
    let engine = Arc::new(ArbitrationEngine::new(pointer));
    hooks::install(engine.clone());

    let mut session = InputSession::new(
        poller,
        registry,
        host.clone(),
        Box::new(ConsoleGame::new(host.clone())),
        engine.clone(),
        &config,
    );

    let fps = fps.clamp(1, 1000);
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!("Running at {} fps, press Ctrl+C to stop", fps);

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                session.frame();
                if session.frames() % (u64::from(fps) * 5) == 0 {
                    if let Some(cursor) = engine.cursor_state().filter(|c| c.active) {
                        debug!(
                            "Cursor ({:.0}, {:.0}), hooks report ({}, {})",
                            cursor.x,
                            cursor.y,
                            hooks::hook_pointer_x(),
                            hooks::hook_pointer_y()
                        );
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }

    session.shutdown();
    hooks::uninstall();
    info!("{} pointer event(s) delivered to console surfaces", host.delivered());
    Ok(())
}

/// Print connected gamepads
pub fn devices() -> Result<()> {
    let pads = list_gamepads(Duration::from_millis(300))?;

    println!("\n{}", "=== Gamepads ===".bold().cyan());
    if pads.is_empty() {
        println!("  {}", "No gamepads found".dimmed());
    }
    for pad in pads {
        let marker = if pad.connected {
            "[CONNECTED]".green()
        } else {
            "[GONE]".yellow()
        };
        println!("  {} #{} {}", marker, pad.id, pad.name);
    }
    println!();
    Ok(())
}
