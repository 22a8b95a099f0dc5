//! Call-site rewriter
//!
//! Retargets `invokestatic` calls to the real pointer API onto the
//! interception hooks, one class at a time, at load time.
//!
//! A call site matches only when all of these hold:
//! - the instruction is `invokestatic`
//! - it references a `CONSTANT_Methodref` owned by the target class
//! - its (name, descriptor) is one of the redirect table's entries,
//!   compared exactly
//!
//! The rewrite swaps the instruction's constant pool operand for a
//! Methodref on the hook owner. Hook entries are appended to the pool (or
//! reused), so existing indices, the code length and any StackMapTable
//! stay valid. The hook has the same descriptor as the call it replaces,
//! so `max_stack`/`max_locals` carry over unchanged; the encoder
//! recomputes every attribute length and count.

pub mod bytecode;
pub mod classfile;
pub mod constant_pool;

use crate::arbitration::hooks::{HOOK_BUTTON_DOWN, HOOK_POINTER_X, HOOK_POINTER_Y};
use crate::config::RewriterConfig;
use crate::error::ClassFileError;
use classfile::ClassFile;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// One redirected method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub name: String,
    pub descriptor: String,
    pub hook_name: String,
}

impl Redirect {
    pub fn new(name: &str, descriptor: &str, hook_name: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            hook_name: hook_name.to_string(),
        }
    }
}

/// Which calls are redirected, and where to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTable {
    target_owner: String,
    hook_owner: String,
    entries: Vec<Redirect>,
}

impl RedirectTable {
    /// The three pointer queries on `target_owner`, redirected to the
    /// exported hooks on `hook_owner`
    pub fn pointer_queries(target_owner: &str, hook_owner: &str) -> Self {
        Self {
            target_owner: target_owner.to_string(),
            hook_owner: hook_owner.to_string(),
            entries: vec![
                Redirect::new("getX", "()I", HOOK_POINTER_X),
                Redirect::new("getY", "()I", HOOK_POINTER_Y),
                Redirect::new("isButtonDown", "(I)Z", HOOK_BUTTON_DOWN),
            ],
        }
    }

    pub fn target_owner(&self) -> &str {
        &self.target_owner
    }

    pub fn hook_owner(&self) -> &str {
        &self.hook_owner
    }

    pub fn entries(&self) -> &[Redirect] {
        &self.entries
    }

    /// The redirect for an exact (owner, name, descriptor) match
    pub fn lookup(&self, owner: &[u8], name: &[u8], descriptor: &[u8]) -> Option<&Redirect> {
        if owner != self.target_owner.as_bytes() {
            return None;
        }
        self.entries
            .iter()
            .find(|r| r.name.as_bytes() == name && r.descriptor.as_bytes() == descriptor)
    }
}

impl Default for RedirectTable {
    fn default() -> Self {
        let config = RewriterConfig::default();
        Self::pointer_queries(&config.target_owner, &config.hook_owner)
    }
}

/// Class-name prefixes that are never rewritten
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipPolicy {
    prefixes: Vec<String>,
}

impl SkipPolicy {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Accepts dotted (`a.b.C`) or internal (`a/b/C`) names
    pub fn should_skip(&self, class_name: &str) -> bool {
        let dotted = class_name.replace('/', ".");
        self.prefixes.iter().any(|p| dotted.starts_with(p.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

/// A rewritten call, reported for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub method: String,
    pub pc: usize,
    pub name: String,
    pub descriptor: String,
    pub hook_name: String,
}

/// Result of one rewrite attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The class matched the skip list
    Skipped,
    /// No eligible call sites; the input stands as is
    Unchanged,
    Rewritten { bytes: Vec<u8>, call_sites: Vec<CallSite> },
    Failed(ClassFileError),
}

/// Counters over the rewriter's lifetime
#[derive(Debug, Default)]
pub struct RewriteStats {
    rewritten: AtomicU64,
    unchanged: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    call_sites: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStatsSnapshot {
    pub rewritten: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub failed: u64,
    pub call_sites: u64,
}

impl RewriteStats {
    pub fn snapshot(&self) -> RewriteStatsSnapshot {
        RewriteStatsSnapshot {
            rewritten: self.rewritten.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            call_sites: self.call_sites.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &RewriteOutcome) {
        let counter = match outcome {
            RewriteOutcome::Skipped => &self.skipped,
            RewriteOutcome::Unchanged => &self.unchanged,
            RewriteOutcome::Rewritten { call_sites, .. } => {
                self.call_sites
                    .fetch_add(call_sites.len() as u64, Ordering::Relaxed);
                &self.rewritten
            }
            RewriteOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct CallSiteRewriter {
    table: RedirectTable,
    skip: SkipPolicy,
    stats: RewriteStats,
}

impl CallSiteRewriter {
    pub fn new(table: RedirectTable, skip: SkipPolicy) -> Self {
        Self {
            table,
            skip,
            stats: RewriteStats::default(),
        }
    }

    pub fn from_config(config: &RewriterConfig) -> Self {
        Self::new(
            RedirectTable::pointer_queries(&config.target_owner, &config.hook_owner),
            SkipPolicy::new(config.skip_prefixes.iter().cloned()),
        )
    }

    pub fn table(&self) -> &RedirectTable {
        &self.table
    }

    pub fn stats(&self) -> RewriteStatsSnapshot {
        self.stats.snapshot()
    }

    /// Load-time entry point: rewritten bytes, or the input untouched
    ///
    /// Never fails. A class that cannot be parsed or re-encoded is logged
    /// and passed through.
    pub fn transform<'a>(&self, class_name: &str, bytes: &'a [u8]) -> Cow<'a, [u8]> {
        match self.rewrite(class_name, bytes) {
            RewriteOutcome::Rewritten { bytes, .. } => Cow::Owned(bytes),
            RewriteOutcome::Failed(e) => {
                warn!("Leaving {} unmodified, rewrite failed: {}", class_name, e);
                Cow::Borrowed(bytes)
            }
            RewriteOutcome::Skipped | RewriteOutcome::Unchanged => Cow::Borrowed(bytes),
        }
    }

    /// Rewrite one class and report what happened
    pub fn rewrite(&self, class_name: &str, bytes: &[u8]) -> RewriteOutcome {
        let outcome = if self.skip.should_skip(class_name) {
            RewriteOutcome::Skipped
        } else {
            match self.rewrite_class(bytes) {
                Ok(Some((bytes, call_sites))) => {
                    debug!("Rewrote {} call site(s) in {}", call_sites.len(), class_name);
                    RewriteOutcome::Rewritten { bytes, call_sites }
                }
                Ok(None) => RewriteOutcome::Unchanged,
                Err(e) => RewriteOutcome::Failed(e),
            }
        };

        self.stats.record(&outcome);
        outcome
    }

    fn rewrite_class(&self, bytes: &[u8]) -> Result<Option<(Vec<u8>, Vec<CallSite>)>, ClassFileError> {
        let mut class = ClassFile::parse(bytes)?;

        // (method, pc, redirect) for every eligible call
        let mut patches: Vec<(usize, usize, &Redirect)> = Vec::new();
        for (method_index, method) in class.methods.iter().enumerate() {
            let Some(code) = method.code() else {
                continue;
            };
            for (pc, cp_index) in bytecode::invokestatic_sites(&code.code)? {
                let Some(target) = class.constant_pool.method_ref(cp_index)? else {
                    continue;
                };
                if let Some(redirect) = self.table.lookup(target.owner, target.name, target.descriptor) {
                    patches.push((method_index, pc, redirect));
                }
            }
        }

        if patches.is_empty() {
            return Ok(None);
        }

        let mut hook_indices: HashMap<&str, u16> = HashMap::new();
        let mut call_sites = Vec::with_capacity(patches.len());

        for (method_index, pc, redirect) in patches {
            let hook_index = match hook_indices.get(redirect.hook_name.as_str()) {
                Some(index) => *index,
                None => {
                    let index = class.constant_pool.intern_method_ref(
                        &self.table.hook_owner,
                        &redirect.hook_name,
                        &redirect.descriptor,
                    )?;
                    hook_indices.insert(&redirect.hook_name, index);
                    index
                }
            };

            let method = &mut class.methods[method_index];
            let method_name =
                String::from_utf8_lossy(class.constant_pool.utf8(method.name_index)?).into_owned();
            if let Some(code) = method.code_mut() {
                bytecode::patch_invokestatic(&mut code.code, pc, hook_index)?;
            }

            call_sites.push(CallSite {
                method: method_name,
                pc,
                name: redirect.name.clone(),
                descriptor: redirect.descriptor.clone(),
                hook_name: redirect.hook_name.clone(),
            });
        }

        Ok(Some((class.encode()?, call_sites)))
    }
}

impl Default for CallSiteRewriter {
    fn default() -> Self {
        Self::from_config(&RewriterConfig::default())
    }
}
