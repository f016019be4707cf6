//! Group hierarchy operations.
//!
//! Groups are never stored as a tree. An entry's group is a dotted path
//! string, and a group without entries survives only as an empty-group
//! header record. Every operation here works over the flat
//! `(entries, headers)` pair of one document and either applies fully or
//! leaves both untouched.

use std::collections::HashSet;

use crate::entry::{Entry, HeaderKind, HeaderRecord};
use passvault_common::{Error, GroupPath, Result};

fn empty_name() -> Error {
    Error::InvalidInput("Group name cannot be empty.".to_string())
}

fn not_found() -> Error {
    Error::NotFound("Group not found.".to_string())
}

fn has_entries_in(entries: &[Entry], group: &GroupPath) -> bool {
    entries.iter().any(|e| e.is_in(group))
}

fn has_marker(headers: &[HeaderRecord], group: &GroupPath) -> bool {
    headers
        .iter()
        .filter_map(HeaderRecord::group_marker)
        .any(|m| &m == group)
}

/// Add an empty-group marker for `path`.
///
/// # Errors
/// - `InvalidInput` if the normalized path is empty
/// - `AlreadyExists` if an entry lives at or below the path, or the
///   marker already exists
pub fn create_group(entries: &[Entry], headers: &mut Vec<HeaderRecord>, path: &str) -> Result<GroupPath> {
    let group = GroupPath::parse(path);
    if group.is_root() {
        return Err(empty_name());
    }

    if has_entries_in(entries, &group) || has_marker(headers, &group) {
        return Err(Error::AlreadyExists("Group already exists.".to_string()));
    }

    headers.push(HeaderRecord::empty_group(&group));
    Ok(group)
}

/// Move every entry and marker at or below `old` to the same place under `new`.
///
/// Renaming onto an existing group merges the two. Returns the number of
/// entries moved.
///
/// # Errors
/// - `InvalidInput` if either path is empty, or `new` lies inside `old`
/// - `NotFound` if nothing lives at or below `old`
pub fn rename_group(
    entries: &mut [Entry],
    headers: &mut Vec<HeaderRecord>,
    old: &str,
    new: &str,
) -> Result<usize> {
    let old = GroupPath::parse(old);
    let new = GroupPath::parse(new);
    if old.is_root() || new.is_root() {
        return Err(empty_name());
    }

    if old.as_string() == new.as_string() {
        return Ok(0);
    }

    if new.is_strict_child_of(&old) {
        return Err(Error::InvalidInput(
            "Cannot move a group into itself.".to_string(),
        ));
    }

    if !has_entries_in(entries, &old)
        && !headers
            .iter()
            .filter_map(HeaderRecord::group_marker)
            .any(|m| m.is_same_or_child(&old))
    {
        return Err(not_found());
    }

    let mut moved = 0;
    for entry in entries.iter_mut() {
        if let Some(rebased) = entry.group_path().rebase(&old, &new) {
            entry.group = rebased.as_string();
            moved += 1;
        }
    }

    for header in headers.iter_mut() {
        if let Some(rebased) = header.group_marker().and_then(|m| m.rebase(&old, &new)) {
            header.text = Some(rebased.as_string());
        }
    }

    dedupe_markers(headers);
    prune_markers(entries, headers);
    Ok(moved)
}

/// Remove the marker of an empty group.
///
/// # Errors
/// - `InvalidInput` ("Group is not empty.") if any entry lives at or below the path
/// - `NotFound` if no marker exists for the path
/// - `InvalidInput` ("Group contains subgroups.") if a marker lives below it
pub fn delete_empty_group(entries: &[Entry], headers: &mut Vec<HeaderRecord>, path: &str) -> Result<()> {
    let group = GroupPath::parse(path);
    if group.is_root() {
        return Err(empty_name());
    }

    if has_entries_in(entries, &group) {
        return Err(Error::InvalidInput("Group is not empty.".to_string()));
    }

    if !has_marker(headers, &group) {
        return Err(not_found());
    }

    if headers
        .iter()
        .filter_map(HeaderRecord::group_marker)
        .any(|m| m.is_strict_child_of(&group))
    {
        return Err(Error::InvalidInput("Group contains subgroups.".to_string()));
    }

    headers.retain(|h| h.group_marker().map_or(true, |m| m != group));
    Ok(())
}

/// Assign entry `index` to `group`.
///
/// # Errors
/// - `InvalidInput` if the index is out of range
pub fn move_entry(
    entries: &mut [Entry],
    headers: &mut Vec<HeaderRecord>,
    index: usize,
    group: &str,
) -> Result<()> {
    let entry = entries.get_mut(index).ok_or_else(|| out_of_range(index))?;
    entry.group = GroupPath::normalize(group);
    entry.modified = chrono::Utc::now();

    prune_markers(entries, headers);
    Ok(())
}

pub(crate) fn out_of_range(index: usize) -> Error {
    Error::InvalidInput(format!("Entry index {} is out of range.", index))
}

/// Every group implied by entries and markers, ancestors included.
///
/// Sorted case-insensitively; the first spelling seen wins.
pub fn list_groups(entries: &[Entry], headers: &[HeaderRecord]) -> Vec<GroupPath> {
    let mut seen = HashSet::new();
    let mut groups = Vec::new();

    let paths = entries
        .iter()
        .map(Entry::group_path)
        .chain(headers.iter().filter_map(HeaderRecord::group_marker));

    for path in paths.filter(|p| !p.is_root()) {
        for group in path.ancestors().into_iter().chain(std::iter::once(path)) {
            if seen.insert(group.clone()) {
                groups.push(group);
            }
        }
    }

    groups.sort_by_key(|g| g.as_string().to_lowercase());
    groups
}

/// Drop markers for groups that now hold entries.
pub fn prune_markers(entries: &[Entry], headers: &mut Vec<HeaderRecord>) {
    headers.retain(|h| match h.group_marker() {
        Some(marker) => !marker.is_root() && !has_entries_in(entries, &marker),
        None => true,
    });
}

fn dedupe_markers(headers: &mut Vec<HeaderRecord>) {
    let mut seen = HashSet::new();
    headers.retain(|h| match h.kind {
        HeaderKind::EmptyGroup => h.group_marker().map_or(false, |m| seen.insert(m)),
        HeaderKind::DefaultPolicy => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryRequest;
    use proptest::prelude::*;

    fn entry(title: &str, group: &str) -> Entry {
        Entry::new(EntryRequest::new(title, "pw").with_group(group), None)
    }

    fn markers(headers: &[HeaderRecord]) -> Vec<String> {
        headers
            .iter()
            .filter_map(HeaderRecord::group_marker)
            .map(|m| m.as_string())
            .collect()
    }

    #[test]
    fn test_create_group_twice_fails() {
        let mut headers = Vec::new();
        create_group(&[], &mut headers, "Travel").unwrap();

        let err = create_group(&[], &mut headers, " travel ").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(err.message(), "Group already exists.");
        assert_eq!(markers(&headers), vec!["Travel"]);
    }

    #[test]
    fn test_create_group_with_entries_fails() {
        let entries = vec![entry("Mail", "Work.Mail")];
        let mut headers = Vec::new();

        assert!(create_group(&entries, &mut headers, "Work").is_err());
        assert!(create_group(&entries, &mut headers, "Work.Mail").is_err());
        assert!(create_group(&entries, &mut headers, "Work.Chat").is_ok());
        assert!(matches!(
            create_group(&entries, &mut headers, " . "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rename_moves_entries_and_markers() {
        let mut entries = vec![entry("A", "Work.Personal"), entry("B", "Home")];
        let mut headers = vec![HeaderRecord::empty_group(&GroupPath::parse("Work.Empty"))];

        let moved = rename_group(&mut entries, &mut headers, "Work", "Office").unwrap();
        assert_eq!(moved, 1);
        assert_eq!(entries[0].group, "Office.Personal");
        assert_eq!(entries[1].group, "Home");
        assert_eq!(markers(&headers), vec!["Office.Empty"]);
    }

    #[test]
    fn test_rename_marker_only_group() {
        let mut entries = Vec::new();
        let mut headers = vec![HeaderRecord::empty_group(&GroupPath::parse("Work"))];

        rename_group(&mut entries, &mut headers, "Work", "Office").unwrap();
        assert_eq!(markers(&headers), vec!["Office"]);
    }

    #[test]
    fn test_rename_into_itself_fails() {
        let mut entries = vec![entry("A", "Work")];
        let mut headers = Vec::new();

        let err = rename_group(&mut entries, &mut headers, "Work", "work.Sub").unwrap_err();
        assert_eq!(err.message(), "Cannot move a group into itself.");
        assert_eq!(entries[0].group, "Work");
    }

    #[test]
    fn test_rename_identical_is_noop() {
        let mut entries = vec![entry("A", "Work")];
        let mut headers = Vec::new();
        assert_eq!(rename_group(&mut entries, &mut headers, "Work", " Work ").unwrap(), 0);
    }

    #[test]
    fn test_rename_unknown_group() {
        let mut entries = vec![entry("A", "Work")];
        let mut headers = Vec::new();
        assert!(matches!(
            rename_group(&mut entries, &mut headers, "Play", "Fun"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_merge_drops_covered_markers() {
        let mut entries = vec![entry("A", "Old")];
        let mut headers = vec![
            HeaderRecord::empty_group(&GroupPath::parse("New")),
            HeaderRecord::empty_group(&GroupPath::parse("Old.Sub")),
            HeaderRecord::empty_group(&GroupPath::parse("New.Sub")),
        ];

        rename_group(&mut entries, &mut headers, "Old", "New").unwrap();
        assert_eq!(entries[0].group, "New");
        assert_eq!(markers(&headers), vec!["New.Sub"]);
    }

    #[test]
    fn test_delete_empty_group() {
        let entries = vec![entry("A", "Work.Mail")];
        let mut headers = vec![
            HeaderRecord::empty_group(&GroupPath::parse("Travel")),
            HeaderRecord::empty_group(&GroupPath::parse("Travel.Asia")),
            HeaderRecord::default_policy("Web"),
        ];

        assert_eq!(
            delete_empty_group(&entries, &mut headers, "Work").unwrap_err().message(),
            "Group is not empty."
        );
        assert_eq!(
            delete_empty_group(&entries, &mut headers, "Travel").unwrap_err().message(),
            "Group contains subgroups."
        );
        assert!(matches!(
            delete_empty_group(&entries, &mut headers, "Nowhere"),
            Err(Error::NotFound(_))
        ));

        delete_empty_group(&entries, &mut headers, "travel.asia").unwrap();
        delete_empty_group(&entries, &mut headers, "Travel").unwrap();
        assert!(markers(&headers).is_empty());
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_move_entry_clears_destination_marker() {
        let mut entries = vec![entry("A", "")];
        let mut headers = vec![HeaderRecord::empty_group(&GroupPath::parse("Travel"))];

        move_entry(&mut entries, &mut headers, 0, " Travel . Asia ").unwrap();
        assert_eq!(entries[0].group, "Travel.Asia");
        assert!(headers.is_empty());

        assert!(move_entry(&mut entries, &mut headers, 5, "X").is_err());
    }

    #[test]
    fn test_list_groups() {
        let entries = vec![entry("A", "Work.Mail"), entry("B", "work"), entry("C", "")];
        let headers = vec![HeaderRecord::empty_group(&GroupPath::parse("Archive.2020"))];

        let groups: Vec<String> = list_groups(&entries, &headers)
            .iter()
            .map(|g| g.as_string())
            .collect();
        assert_eq!(groups, vec!["Archive", "Archive.2020", "Work", "Work.Mail"]);
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z]{1,6}"
    }

    proptest! {
        #[test]
        fn prop_rename_round_trip_restores_groups(
            a in segment(),
            b in segment(),
            suffixes in proptest::collection::vec(proptest::option::of(segment()), 1..6),
        ) {
            prop_assume!(a.to_lowercase() != b.to_lowercase());

            let mut entries: Vec<Entry> = suffixes
                .iter()
                .map(|s| match s {
                    Some(s) => entry("x", &format!("{}.{}", a, s)),
                    None => entry("x", &a),
                })
                .collect();
            let original: Vec<String> = entries.iter().map(|e| e.group.clone()).collect();
            let mut headers = Vec::new();

            rename_group(&mut entries, &mut headers, &a, &b).unwrap();
            rename_group(&mut entries, &mut headers, &b, &a).unwrap();

            let restored: Vec<String> = entries.iter().map(|e| e.group.clone()).collect();
            prop_assert_eq!(restored, original);
        }

        #[test]
        fn prop_delete_fails_when_entries_below(group in segment(), child in segment()) {
            let entries = vec![entry("x", &format!("{}.{}", group, child))];
            let mut headers = vec![HeaderRecord::empty_group(&GroupPath::parse(&group))];

            let err = delete_empty_group(&entries, &mut headers, &group).unwrap_err();
            prop_assert_eq!(err.message(), "Group is not empty.");
            prop_assert_eq!(headers.len(), 1);
        }
    }
}
