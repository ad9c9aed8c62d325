use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::data::column_config::ColumnConfig;
use crate::data::row_source::RowSource;
use crate::data::sort_spec::{nested_sort_key, ColumnSort};
use crate::error::{GridError, GridResult};

/// Outcome of a header click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortToggle {
    /// The proposed sort; still needs validation before it is committed
    Proposed(Vec<ColumnSort>),
    /// A nested column with several visible sub-columns was clicked; the
    /// caller has to let the user pick one and call [`toggle_sort_key`]
    NeedsSubColumn { column: String, choices: Vec<String> },
}

impl SortToggle {
    pub fn into_result(self) -> GridResult<Vec<ColumnSort>> {
        match self {
            SortToggle::Proposed(sort) => Ok(sort),
            SortToggle::NeedsSubColumn { column, choices } => Err(GridError::SortNeedsSubColumn {
                column,
                choices: choices.len(),
            }),
        }
    }
}

/// Applies a click on `column`'s header to `current`.
///
/// Each column cycles unsorted, ascending (nulls last), descending, unsorted.
/// Without shift the result holds at most the clicked column; with shift the
/// other entries are kept in place.
pub fn toggle_sort(column: &ColumnConfig, current: &[ColumnSort], shift: bool) -> SortToggle {
    let Some(nested) = &column.nested else {
        return SortToggle::Proposed(toggle_sort_key(&column.name, current, shift));
    };

    // Clicking a nested header again keeps cycling the sub-column in use
    if let Some(existing) = current.iter().find(|entry| {
        entry
            .sub_column_of(&column.name)
            .map_or(false, |sub| nested.columns.iter().any(|c| c.name == sub))
    }) {
        let key = existing.key.clone();
        return SortToggle::Proposed(toggle_sort_key(&key, current, shift));
    }

    let choices: Vec<String> = nested.visible_columns().map(|c| c.name.clone()).collect();
    match choices.as_slice() {
        [] => {
            debug!(target: "sort", "Nested column '{}' has no visible sub-columns", column.name);
            SortToggle::Proposed(current.to_vec())
        }
        [only] => {
            let key = nested_sort_key(&column.name, only);
            SortToggle::Proposed(toggle_sort_key(&key, current, shift))
        }
        _ => SortToggle::NeedsSubColumn {
            column: column.name.clone(),
            choices,
        },
    }
}

/// Cycles the sort entry for an explicit key (`column` or `parent.sub`)
pub fn toggle_sort_key(key: &str, current: &[ColumnSort], shift: bool) -> Vec<ColumnSort> {
    let position = current.iter().position(|entry| entry.key == key);
    let next = match position.map(|idx| &current[idx]) {
        None => Some(ColumnSort::ascending(key)),
        Some(entry) if entry.asc => Some(ColumnSort {
            asc: false,
            ..entry.clone()
        }),
        Some(_) => None,
    };

    debug!(target: "sort",
        "Toggle '{}' (shift={}): {:?} -> {:?}",
        key, shift, position.map(|idx| current[idx].asc), next.as_ref().map(|n| n.asc)
    );

    if !shift {
        return next.into_iter().collect();
    }

    let mut sort = current.to_vec();
    match (position, next) {
        (Some(idx), Some(entry)) => sort[idx] = entry,
        (Some(idx), None) => {
            sort.remove(idx);
        }
        (None, Some(entry)) => sort.push(entry),
        (None, None) => {}
    }
    sort
}

#[derive(Debug, Default)]
struct SortState {
    committed: Vec<ColumnSort>,
    last_error: Option<String>,
    in_flight: usize,
}

/// Holds the committed sort of a view and validates proposals against the
/// row source before committing them.
///
/// Validations are not fenced: when two overlap, whichever resolves last
/// decides the committed sort. A rejected proposal leaves the previous sort
/// in place and is remembered as `last_error`.
#[derive(Debug, Clone, Default)]
pub struct SortCoordinator {
    state: Arc<Mutex<SortState>>,
}

impl SortCoordinator {
    pub fn new(initial: Vec<ColumnSort>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SortState {
                committed: initial,
                ..SortState::default()
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SortState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn current(&self) -> Vec<ColumnSort> {
        self.with_state(|s| s.committed.clone())
    }

    pub fn last_error(&self) -> Option<String> {
        self.with_state(|s| s.last_error.clone())
    }

    pub fn clear_error(&self) {
        self.with_state(|s| s.last_error = None);
    }

    pub fn is_validating(&self) -> bool {
        self.with_state(|s| s.in_flight > 0)
    }

    /// Replaces the committed sort without validation, for entries dropped
    /// because their column went away
    pub fn replace(&self, sort: Vec<ColumnSort>) {
        self.with_state(|s| s.committed = sort);
    }

    pub fn toggle(&self, column: &ColumnConfig, shift: bool) -> SortToggle {
        toggle_sort(column, &self.current(), shift)
    }

    /// Validates `proposed` with a zero-row fetch and commits it on success.
    ///
    /// Returns the sort that is committed once this validation resolved.
    pub async fn commit<S: RowSource>(
        &self,
        source: &S,
        proposed: Vec<ColumnSort>,
    ) -> GridResult<Vec<ColumnSort>> {
        self.with_state(|s| s.in_flight += 1);

        let outcome = if proposed.is_empty() {
            Ok(())
        } else {
            source.validate(&proposed).await
        };

        self.with_state(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            match outcome {
                Ok(()) => {
                    info!(target: "sort", "Committed sort with {} entries", proposed.len());
                    s.committed = proposed;
                    s.last_error = None;
                    Ok(s.committed.clone())
                }
                Err(e) => {
                    warn!(target: "sort", "Sort rejected, keeping previous: {}", e);
                    let reason = e.to_string();
                    s.last_error = Some(reason.clone());
                    Err(GridError::SortValidation { proposed, reason })
                }
            }
        })
    }
}
