//! Provides the [`profile`](crate::profile) macro or a no-op version depending on the `profiling` feature

#[cfg(feature = "profiling")]
/// Opens a profiling scope that lasts until the end of the enclosing block
///
/// Timings are collected per thread by the [`Profiler`](crate::profiling::Profiler) in
/// [`PROFILER`](static@crate::profiling::PROFILER) and reported by [`write`](crate::profiling::write).
/// Scopes nest along the call graph of a thread. A scope opened on another thread (e.g. inside a
/// rayon closure) can be attached to a parent by passing the parent's id explicitly:
/// ```ignore
/// profile!(step_id, "step");
/// cells.par_iter().for_each(|cell| {
///     profile!("cell forces", parent = step_id);
/// });
/// ```
/// The guard is stored in a local variable called `_profiling_scope_guard`.
#[macro_export]
#[cfg_attr(docsrs, doc(cfg(feature = "profiling")))]
macro_rules! profile {
    ($name:expr) => {
        use $crate::profile_impl;
        profile_impl!($name);
    };
    ($scope_id:ident, $name:expr) => {
        use $crate::profile_impl;
        profile_impl!($scope_id, $name);
    };
    ($name:expr, parent = $parent_id:ident) => {
        use $crate::profile_impl;
        profile_impl!($name, parent = $parent_id);
    };
}

#[cfg(not(feature = "profiling"))]
/// No-op macro if profiling is disabled
#[macro_export]
macro_rules! profile {
    ($name:expr) => {};
    ($scope_id:ident, $name:expr) => {};
    ($name:expr, parent = $parent_id:ident) => {};
}
