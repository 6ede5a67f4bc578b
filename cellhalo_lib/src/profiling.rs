//! Implementation details for the [`profile`](crate::profile) macro
//!
//! Every thread records its scopes in its own [`Profiler`]. As the ranks of a decomposed run are
//! threads, the report shows for each scope the accumulated time of all threads together with the
//! slowest and the fastest thread, which makes load imbalance between subdomains visible.

use std::error::Error;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use fxhash::FxHasher64;
use parking_lot::Mutex;
use thread_local::ThreadLocal;

use crate::{MapType, new_map};

/// Thread local storage of the [`Profiler`]s of all threads
pub static PROFILER: LazyLock<ThreadLocal<Mutex<Profiler>>> = LazyLock::new(ThreadLocal::new);

/// Implementation of the profile macro, use [`profile`](crate::profile) instead
#[doc(hidden)]
#[macro_export]
macro_rules! profile_impl {
    ($name:expr) => {
        let (_profiling_scope_guard, _) = $crate::profiling::PROFILER
            .get_or(Default::default)
            .lock()
            .enter($name, None);
    };
    ($scope_id:ident, $name:expr) => {
        let (_profiling_scope_guard, $scope_id) = $crate::profiling::PROFILER
            .get_or(Default::default)
            .lock()
            .enter($name, None);
    };
    ($name:expr, parent = $parent_id:ident) => {
        let (_profiling_scope_guard, _) = $crate::profiling::PROFILER
            .get_or(Default::default)
            .lock()
            .enter($name, Some(&$parent_id));
    };
}

/// Identifies a scope by its name and the path of scopes enclosing it
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ScopeId {
    name: &'static str,
    depth: usize,
    path_hash: u64,
}

impl ScopeId {
    fn root_hash() -> u64 {
        0
    }

    fn child_of(name: &'static str, parent: Option<&ScopeId>) -> Self {
        let mut hasher = FxHasher64::default();
        parent.map(|p| p.path_hash).unwrap_or(Self::root_hash()).hash(&mut hasher);
        name.hash(&mut hasher);
        ScopeId {
            name,
            depth: parent.map(|p| p.depth + 1).unwrap_or(0),
            path_hash: hasher.finish(),
        }
    }
}

/// Guard that adds the time until it is dropped to the innermost open scope of its thread
pub struct Guard {
    enter_time: Instant,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let elapsed = self.enter_time.elapsed();
        if let Some(profiler) = PROFILER.get() {
            profiler.lock().leave(elapsed);
        }
    }
}

#[derive(Clone, Debug)]
struct Timing {
    parent: Option<ScopeId>,
    calls: usize,
    total: Duration,
    first_call: Instant,
}

/// Scopes recorded by one thread
#[derive(Default)]
pub struct Profiler {
    timings: MapType<ScopeId, Timing>,
    open: Vec<ScopeId>,
}

impl Profiler {
    /// Opens a scope nested in the innermost open scope or in the given parent
    pub fn enter(&mut self, name: &'static str, parent: Option<&ScopeId>) -> (Guard, ScopeId) {
        let parent = parent.or(self.open.last()).copied();
        let id = ScopeId::child_of(name, parent.as_ref());
        self.timings.entry(id).or_insert_with(|| Timing {
            parent,
            calls: 0,
            total: Duration::ZERO,
            first_call: Instant::now(),
        });
        self.open.push(id);
        (
            Guard {
                enter_time: Instant::now(),
            },
            id,
        )
    }

    fn leave(&mut self, elapsed: Duration) {
        if let Some(id) = self.open.pop() {
            if let Some(timing) = self.timings.get_mut(&id) {
                timing.calls += 1;
                timing.total += elapsed;
            }
        }
    }

    /// Discards all recorded timings
    pub fn reset(&mut self) {
        self.timings.clear();
        self.open.clear();
    }
}

/// Timings of one scope accumulated over all threads
#[derive(Clone, Debug)]
pub struct ScopeSummary {
    pub name: &'static str,
    pub depth: usize,
    pub calls: usize,
    pub threads: usize,
    pub total: Duration,
    pub slowest_thread: Duration,
    pub fastest_thread: Duration,
    id: ScopeId,
    parent: Option<ScopeId>,
    first_call: Instant,
}

/// Merges the timings of all threads, returns the scopes in depth first order
pub fn summarize() -> Vec<ScopeSummary> {
    let mut merged: MapType<ScopeId, ScopeSummary> = new_map();
    for profiler in PROFILER.iter() {
        let profiler = profiler.lock();
        for (&id, timing) in &profiler.timings {
            let summary = merged.entry(id).or_insert_with(|| ScopeSummary {
                name: id.name,
                depth: id.depth,
                calls: 0,
                threads: 0,
                total: Duration::ZERO,
                slowest_thread: Duration::ZERO,
                fastest_thread: Duration::MAX,
                id,
                parent: timing.parent,
                first_call: timing.first_call,
            });
            summary.calls += timing.calls;
            summary.threads += 1;
            summary.total += timing.total;
            summary.slowest_thread = summary.slowest_thread.max(timing.total);
            summary.fastest_thread = summary.fastest_thread.min(timing.total);
            summary.first_call = summary.first_call.min(timing.first_call);
        }
    }

    let mut scopes: Vec<_> = merged.into_values().collect();
    scopes.sort_unstable_by_key(|s| s.first_call);

    let mut ordered = Vec::with_capacity(scopes.len());
    let mut stack: Vec<_> = scopes
        .iter()
        .filter(|s| s.parent.is_none())
        .rev()
        .cloned()
        .collect();
    while let Some(scope) = stack.pop() {
        stack.extend(
            scopes
                .iter()
                .filter(|s| s.parent == Some(scope.id))
                .rev()
                .cloned(),
        );
        ordered.push(scope);
    }
    ordered
}

/// Writes a hierarchical report of the collected timings of all threads
pub fn write<W: io::Write>(out: &mut W) -> io::Result<()> {
    for scope in summarize() {
        let total = scope.total.as_secs_f64();
        writeln!(
            out,
            "{:indent$}{}: {:.3}s in {} {} on {} {} (slowest {:.3}s, fastest {:.3}s, {:.3}ms avg)",
            "",
            scope.name,
            total,
            scope.calls,
            if scope.calls == 1 { "call" } else { "calls" },
            scope.threads,
            if scope.threads == 1 { "thread" } else { "threads" },
            scope.slowest_thread.as_secs_f64(),
            scope.fastest_thread.as_secs_f64(),
            total * 1000.0 / scope.calls.max(1) as f64,
            indent = 2 * scope.depth,
        )?;
    }
    Ok(())
}

/// Returns the report of [`write`] as a `String`
pub fn write_to_string() -> Result<String, Box<dyn Error>> {
    let mut buffer = Vec::new();
    write(&mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Discards the timings of all threads, should be called outside of any profiled scope
pub fn reset() {
    for profiler in PROFILER.iter() {
        profiler.lock().reset();
    }
}
