// target.rs — choosing the surface to capture

use std::collections::VecDeque;
use std::fmt;

use log::{info, warn};

/// Opaque identifier of a capturable surface (a window, or the whole desktop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(pub u32);

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Read-only view of the window hierarchy.
pub trait WindowTree {
    fn root(&self) -> TargetHandle;
    /// Direct children in the windowing system's order. Errors read as "no children".
    fn children(&self, window: TargetHandle) -> Vec<TargetHandle>;
    fn title(&self, window: TargetHandle) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSpec {
    /// Explicit window id; takes priority over everything else.
    pub window_id: Option<u32>,
    /// Substring of the window title to search for.
    pub title_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    ExplicitId,
    TitleMatch,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub handle: TargetHandle,
    pub source: TargetSource,
}

/// Breadth-first search below the root for the first window whose title
/// contains `fragment`. Shallower windows win; siblings are visited in the
/// order the tree reports them.
pub fn find_by_title<T>(tree: &T, fragment: &str) -> Option<TargetHandle>
where
    T: WindowTree + ?Sized,
{
    let mut queue: VecDeque<TargetHandle> = tree.children(tree.root()).into();
    while let Some(window) = queue.pop_front() {
        if tree
            .title(window)
            .is_some_and(|title| title.contains(fragment))
        {
            return Some(window);
        }
        queue.extend(tree.children(window));
    }
    None
}

/// Picks the capture target: explicit id, else title match, else the desktop root.
pub fn resolve_target<T>(spec: &TargetSpec, tree: &T) -> ResolvedTarget
where
    T: WindowTree + ?Sized,
{
    if let Some(id) = spec.window_id.filter(|&id| id != 0) {
        let handle = TargetHandle(id);
        info!("Using window by ID: {handle}");
        return ResolvedTarget {
            handle,
            source: TargetSource::ExplicitId,
        };
    }

    if let Some(fragment) = spec.title_filter.as_deref().filter(|f| !f.is_empty()) {
        info!("Searching window by name fragment: {fragment:?}");
        match find_by_title(tree, fragment) {
            Some(handle) => {
                info!("Found window: {handle}");
                return ResolvedTarget {
                    handle,
                    source: TargetSource::TitleMatch,
                };
            }
            None => warn!("Window with name fragment {fragment:?} not found, falling back to the desktop"),
        }
    }

    info!("Using the desktop root window as source");
    ResolvedTarget {
        handle: tree.root(),
        source: TargetSource::Desktop,
    }
}
