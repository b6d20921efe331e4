use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use anyhow::Result;
use itertools::Itertools;

use crate::duplicates::{drop_same_well_duplicates, MaskedRecord, Reduction};
use crate::group::{partition, Group, Partition};
use crate::options::{ClassifyOpts, IDENTICAL_MATCH_IDENTITY};
use crate::record::EMPTY_EPITOPE;
use crate::summary::{count_labels, ClassifyStats};
use crate::table::{Schema, Table, OPTIONAL_COLS};

/// Names of the derived label columns, before the subset suffix is appended.
pub const LABEL_COLS: [&str; 3] = ["unique_within_fna", "cross_donor_fna", "cross_epitope_fna"];

/// A categorical label value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Yes,
    No,
    YesAndNo,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Yes, Label::No, Label::YesAndNo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Yes => "yes",
            Label::No => "no",
            Label::YesAndNo => "yes and no",
        }
    }

    pub fn parse(s: &str) -> Option<Label> {
        Label::ALL.into_iter().find(|l| l.as_str() == s.trim())
    }

    /// Group-level decision over whether each qualifying comparison "matches" (same donor, same
    /// epitope, ...): "no" if every comparison matches, "yes" if none do, "yes and no" otherwise.
    /// Returns `None` when there are no comparisons.
    pub fn from_matches(matches: impl IntoIterator<Item = bool>) -> Option<Label> {
        let (mut any, mut all, mut seen) = (false, true, false);
        for m in matches {
            seen = true;
            any |= m;
            all &= m;
        }

        match (seen, all, any) {
            (false, _, _) => None,
            (true, true, _) => Some(Label::No),
            (true, false, true) => Some(Label::YesAndNo),
            (true, false, false) => Some(Label::Yes),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The labels assigned to a single row. An unset label is `None`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RowLabels {
    pub unique_within: Option<Label>,
    pub cross_donor: Option<Label>,
    pub cross_epitope: Option<Label>,
}

impl RowLabels {
    /// Labels in the same order as `LABEL_COLS`.
    pub fn values(&self) -> [Option<Label>; 3] {
        [self.unique_within, self.cross_donor, self.cross_epitope]
    }
}

/// Diagnostic counts produced by a single group. These are summed over all groups.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupCounts {
    pub rows_removed: usize,
    /// 1 if the group resolved to "no" cross-epitope because both sides lacked an epitope
    pub empty_epitope_matches: usize,
    /// 1 if the group's qualifying rows disagree on the first epitope
    pub epitope_conflicts: usize,
}

impl Add for GroupCounts {
    type Output = GroupCounts;

    fn add(self, other: GroupCounts) -> GroupCounts {
        GroupCounts {
            rows_removed: self.rows_removed + other.rows_removed,
            empty_epitope_matches: self.empty_epitope_matches + other.empty_epitope_matches,
            epitope_conflicts: self.epitope_conflicts + other.epitope_conflicts,
        }
    }
}

impl Sum for GroupCounts {
    fn sum<I: Iterator<Item = GroupCounts>>(iter: I) -> Self {
        iter.fold(GroupCounts::default(), Add::add)
    }
}

#[derive(Debug)]
pub struct GroupOutcome {
    /// `(table row, labels)` for every row surviving deduplication
    pub labels: Vec<(usize, RowLabels)>,
    pub counts: GroupCounts,
}

/// Classifies a single group. Each group is independent of every other, so this only reads
/// the group's own rows.
pub fn classify_group(group: Group, opts: &ClassifyOpts) -> GroupOutcome {
    let rows = group
        .records
        .into_iter()
        .map(|rec| MaskedRecord::new(rec, opts))
        .collect();

    let Reduction { kept, removed } = drop_same_well_duplicates(rows);
    if !removed.is_empty() {
        debug!("group {}: removed {} same-well duplicates", group.key, removed.len());
    }

    let uniqueness = unique_within(&kept, opts);

    let qualifying: Vec<&MaskedRecord> = kept.iter().filter(|r| r.mask.qualifying()).collect();
    let cross_donor = Label::from_matches(qualifying.iter().map(|r| r.mask.same_donor));
    let epitope = cross_epitope(&group.key, &qualifying);

    let labels = kept
        .iter()
        .map(|r| {
            let qualifying = r.mask.qualifying();
            let labels = RowLabels {
                unique_within: opts
                    .is_subset(r.rec.first_cell_type.as_deref())
                    .then_some(uniqueness),
                cross_donor: cross_donor.filter(|_| qualifying),
                cross_epitope: epitope.label.filter(|_| qualifying),
            };
            (r.rec.row, labels)
        })
        .collect();

    GroupOutcome {
        labels,
        counts: GroupCounts {
            rows_removed: removed.len(),
            empty_epitope_matches: epitope.empty_match as usize,
            epitope_conflicts: epitope.is_conflicting() as usize,
        },
    }
}

/// "no" if the group holds an identical comparison between two subset sequences, else "yes".
/// Identical means an exact identity of 100, which is stricter than the qualifying threshold.
fn unique_within(rows: &[MaskedRecord], opts: &ClassifyOpts) -> Label {
    let has_identical = rows.iter().any(|r| {
        opts.is_subset(r.rec.first_cell_type.as_deref())
            && opts.is_subset(r.rec.second_cell_type.as_deref())
            && r.rec.identity == Some(IDENTICAL_MATCH_IDENTITY)
            && r.mask.high_global
    });

    if has_identical {
        Label::No
    } else {
        Label::Yes
    }
}

/// The cross-epitope decision for one group.
///
/// # Fields
///
/// * `label` - The group label, or `None` without qualifying rows
/// * `empty_match` - Whether `label` is "no" only because both sides lacked an epitope
/// * `first_epitopes` - Distinct normalized first epitopes in row order; the first is canonical
#[derive(Debug, Default, PartialEq)]
struct EpitopeCall<'a> {
    label: Option<Label>,
    empty_match: bool,
    first_epitopes: Vec<&'a str>,
}

impl EpitopeCall<'_> {
    fn is_conflicting(&self) -> bool {
        self.first_epitopes.len() > 1
    }
}

/// Compares the second epitope of every qualifying row against the group's first epitope.
fn cross_epitope<'a>(key: &str, qualifying: &[&'a MaskedRecord]) -> EpitopeCall<'a> {
    let first_epitopes: Vec<&'a str> = qualifying
        .iter()
        .map(|&r| r.rec.first_epitope_normalized())
        .unique()
        .collect();

    let Some(&canonical) = first_epitopes.first() else {
        return EpitopeCall::default();
    };

    if first_epitopes.len() > 1 {
        warn!(
            "Multiple distinct first epitope values found for group {key:?}: [{}]. Using `{canonical}`",
            first_epitopes.join(", ")
        );
    }

    let label = Label::from_matches(
        qualifying
            .iter()
            .map(|r| r.rec.second_epitope_normalized() == canonical),
    );
    let empty_match = label == Some(Label::No) && canonical == EMPTY_EPITOPE;

    EpitopeCall {
        label,
        empty_match,
        first_epitopes,
    }
}

/// Classifies every group of `table`, then writes the labels back into the table under
/// suffixed column names (e.g. `cross_donor_fna_Bcell`).
///
/// Only rows whose first cell type is the subset type are written to. For these rows a label
/// which was not assigned (row dropped as a duplicate, or not qualifying) is written as an
/// empty cell. All other rows keep whatever the column held before, or an empty cell if the
/// column is new.
///
/// # Errors
///
/// This function will return an error if a required column is missing or a numeric column
/// holds a non-numeric value. Both indicate a malformed input table, so no labels are written.
pub fn classify_table(table: &mut Table, opts: &ClassifyOpts) -> Result<ClassifyStats> {
    let schema = Schema::resolve(table, opts)?;
    let records = schema.records(table)?;

    for col in OPTIONAL_COLS {
        table.ensure_column(col);
    }

    let rows_input = records.len();
    let subset: Vec<bool> = records
        .iter()
        .map(|r| opts.is_subset(r.first_cell_type.as_deref()))
        .collect();

    let Partition { groups, ungrouped } = partition(records);
    if !ungrouped.is_empty() {
        warn!(
            "{} rows have no value for `{}` and will not be classified",
            ungrouped.len(),
            opts.groupby_col
        );
    }

    let group_count = groups.len();
    info!("Classifying {group_count} groups from {rows_input} rows");

    let outcomes: Vec<GroupOutcome> = groups
        .into_iter()
        .map(|group| classify_group(group, opts))
        .collect();
    let counts: GroupCounts = outcomes.iter().map(|o| o.counts).sum();

    let mut labels = vec![RowLabels::default(); rows_input];
    for outcome in outcomes {
        for (row, row_labels) in outcome.labels {
            labels[row] = row_labels;
        }
    }

    let suffix = opts.suffix();
    let cols = LABEL_COLS.map(|name| table.ensure_column(&format!("{name}{suffix}")));

    for (row, row_labels) in labels.iter().enumerate().filter(|(row, _)| subset[*row]) {
        for (&col, value) in cols.iter().zip(row_labels.values()) {
            table.set(row, col, value.map_or("", |l| l.as_str()));
        }
    }

    Ok(ClassifyStats {
        rows_input,
        rows_removed: counts.rows_removed,
        rows_remaining: rows_input - counts.rows_removed,
        subset_rows: subset.iter().filter(|s| **s).count(),
        groups: group_count,
        ungrouped_rows: ungrouped.len(),
        empty_epitope_matches: counts.empty_epitope_matches,
        epitope_conflicts: counts.epitope_conflicts,
        labels: count_labels(table, opts)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::TableFormat;
    use crate::record::ComparisonRecord;
    use indoc::indoc;

    /// Builder for a qualifying comparison row, with every field set.
    fn pair(row: usize) -> ComparisonRecord {
        ComparisonRecord {
            row,
            group_key: Some("s1".to_string()),
            identity: Some(99.5),
            global_score: Some(80.0),
            first_well_id: Some(format!("W{row}")),
            second_well_id: Some(format!("X{row}")),
            first_donor_id: Some("D1".to_string()),
            second_donor_id: Some("D1".to_string()),
            first_cell_type: Some("Bcell".to_string()),
            second_cell_type: Some("Tcell".to_string()),
            first_read_support: Some(10.0),
            first_epitope: Some("BG505+".to_string()),
            second_epitope: Some("BG505+".to_string()),
        }
    }

    fn group(records: Vec<ComparisonRecord>) -> Group {
        Group {
            key: "s1".to_string(),
            records,
        }
    }

    fn labels_of(outcome: &GroupOutcome) -> Vec<RowLabels> {
        outcome.labels.iter().map(|(_, l)| *l).collect()
    }

    #[test]
    fn tri_state() {
        assert_eq!(Label::from_matches([true, true]), Some(Label::No));
        assert_eq!(Label::from_matches([false, false]), Some(Label::Yes));
        assert_eq!(Label::from_matches([true, false]), Some(Label::YesAndNo));
        assert_eq!(Label::from_matches([]), None);
    }

    #[test]
    fn label_text() {
        for label in Label::ALL {
            assert_eq!(Label::parse(&label.to_string()), Some(label));
        }
        assert_eq!(Label::parse(""), None);
        assert_eq!(Label::parse("maybe"), None);
    }

    #[test]
    fn same_well_duplicate_is_dropped() {
        let mut low = pair(0);
        let mut high = pair(1);
        for (rec, support) in [(&mut low, 10.0), (&mut high, 20.0)] {
            rec.first_well_id = Some("W1".to_string());
            rec.second_well_id = Some("W1".to_string());
            rec.first_read_support = Some(support);
        }

        let outcome = classify_group(group(vec![low, high]), &ClassifyOpts::default());

        assert_eq!(outcome.counts.rows_removed, 1);
        let rows: Vec<usize> = outcome.labels.iter().map(|(row, _)| *row).collect();
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn all_same_donor_is_not_cross_donor() {
        let outcome = classify_group(group(vec![pair(0), pair(1)]), &ClassifyOpts::default());

        for labels in labels_of(&outcome) {
            assert_eq!(labels.cross_donor, Some(Label::No));
        }
    }

    #[test]
    fn mixed_donors_are_yes_and_no() {
        let mut other = pair(1);
        other.second_donor_id = Some("D2".to_string());

        let outcome = classify_group(group(vec![pair(0), other]), &ClassifyOpts::default());

        for labels in labels_of(&outcome) {
            assert_eq!(labels.cross_donor, Some(Label::YesAndNo));
        }
    }

    #[test]
    fn all_other_donors_are_cross_donor() {
        let mut a = pair(0);
        let mut b = pair(1);
        a.second_donor_id = Some("D2".to_string());
        b.second_donor_id = None;

        let outcome = classify_group(group(vec![a, b]), &ClassifyOpts::default());

        for labels in labels_of(&outcome) {
            assert_eq!(labels.cross_donor, Some(Label::Yes));
        }
    }

    #[test]
    fn non_qualifying_rows_are_not_labelled() {
        let mut weak = pair(1);
        weak.identity = Some(90.0);
        weak.second_donor_id = Some("D2".to_string());

        let outcome = classify_group(group(vec![pair(0), weak]), &ClassifyOpts::default());
        let labels = labels_of(&outcome);

        assert_eq!(labels[0].cross_donor, Some(Label::No));
        assert_eq!(labels[1].cross_donor, None);
        assert_eq!(labels[1].cross_epitope, None);
        // uniqueness only depends on the cell type
        assert_eq!(labels[1].unique_within, Some(Label::Yes));
    }

    #[test]
    fn no_qualifying_rows_means_no_group_labels() {
        let mut weak = pair(0);
        weak.global_score = Some(10.0);

        let outcome = classify_group(group(vec![weak]), &ClassifyOpts::default());
        let labels = labels_of(&outcome);

        assert_eq!(labels[0].cross_donor, None);
        assert_eq!(labels[0].cross_epitope, None);
        assert_eq!(outcome.counts.empty_epitope_matches, 0);
    }

    #[test]
    fn both_epitopes_empty_is_counted() {
        let mut a = pair(0);
        let mut b = pair(1);
        a.first_epitope = None;
        a.second_epitope = Some("  ".to_string());
        b.first_epitope = Some("".to_string());
        b.second_epitope = None;

        let outcome = classify_group(group(vec![a, b]), &ClassifyOpts::default());

        for labels in labels_of(&outcome) {
            assert_eq!(labels.cross_epitope, Some(Label::No));
        }
        assert_eq!(outcome.counts.empty_epitope_matches, 1);
    }

    #[test]
    fn same_epitope_is_not_counted_as_empty() {
        let outcome = classify_group(group(vec![pair(0)]), &ClassifyOpts::default());

        assert_eq!(labels_of(&outcome)[0].cross_epitope, Some(Label::No));
        assert_eq!(outcome.counts.empty_epitope_matches, 0);
    }

    #[test]
    fn epitope_compared_to_first_seen_value() {
        let mut a = pair(0);
        let mut b = pair(1);
        let mut c = pair(2);
        a.second_epitope = Some("BG505-".to_string());
        // conflicting first epitope, the first seen ("BG505+") wins
        b.first_epitope = Some("BG505-".to_string());
        b.second_epitope = Some("BG505-".to_string());
        c.second_epitope = None;

        let outcome = classify_group(group(vec![a, b, c]), &ClassifyOpts::default());
        for labels in labels_of(&outcome) {
            assert_eq!(labels.cross_epitope, Some(Label::Yes));
        }
        assert_eq!(outcome.counts.epitope_conflicts, 1);

        let mut d = pair(3);
        d.second_epitope = Some(" BG505+ ".to_string());
        let mut e = pair(4);
        e.second_epitope = Some("BG505-".to_string());

        let outcome = classify_group(group(vec![d, e]), &ClassifyOpts::default());
        for labels in labels_of(&outcome) {
            assert_eq!(labels.cross_epitope, Some(Label::YesAndNo));
        }
        assert_eq!(outcome.counts.epitope_conflicts, 0);
    }

    #[test]
    fn conflicting_first_epitopes_are_reported() {
        let mut a = pair(0);
        let mut b = pair(1);
        let mut c = pair(2);
        a.first_epitope = None;
        b.first_epitope = Some(" BG505- ".to_string());
        c.first_epitope = Some("".to_string());
        let rows: Vec<MaskedRecord> = [a, b, c]
            .into_iter()
            .map(|rec| MaskedRecord::new(rec, &ClassifyOpts::default()))
            .collect();
        let qualifying: Vec<&MaskedRecord> = rows.iter().collect();

        let call = cross_epitope("s1", &qualifying);

        assert!(call.is_conflicting());
        assert_eq!(call.first_epitopes, vec![EMPTY_EPITOPE, "BG505-"]);
        // every second epitope is BG505+, none match the canonical "empty"
        assert_eq!(call.label, Some(Label::Yes));
        assert!(!call.empty_match);

        assert_eq!(cross_epitope("s1", &[]), EpitopeCall::default());
    }

    #[test]
    fn identical_subset_pair_is_not_unique() {
        let mut identical = pair(1);
        identical.identity = Some(100.0);
        identical.second_cell_type = Some("Bcell".to_string());
        let mut other_type = pair(2);
        other_type.first_cell_type = Some("Tcell".to_string());

        let outcome = classify_group(
            group(vec![pair(0), identical, other_type]),
            &ClassifyOpts::default(),
        );
        let labels = labels_of(&outcome);

        assert_eq!(labels[0].unique_within, Some(Label::No));
        assert_eq!(labels[1].unique_within, Some(Label::No));
        assert_eq!(labels[2].unique_within, None);
    }

    #[test]
    fn near_identical_subset_pair_is_unique() {
        let mut near = pair(1);
        near.identity = Some(99.9);
        near.second_cell_type = Some("Bcell".to_string());

        let outcome = classify_group(group(vec![pair(0), near]), &ClassifyOpts::default());

        for labels in labels_of(&outcome) {
            assert_eq!(labels.unique_within, Some(Label::Yes));
        }
    }

    const TABLE: &str = indoc! {"
        1st_sequence_id,identity,global,1st_sequence_or_well_id,2nd_sequence_or_well_id,1st_real_subjectid,2nd_real_subjectid,1st_cell_type,2nd_cell_type,1st_mixcr_read,1st_flowindex_epitope,2nd_flowindex_epitope
        s1,100,80,W1,W1,D1,D1,Bcell,Bcell,10,BG505+,BG505+
        s1,100,80,W1,W1,D1,D1,Bcell,Bcell,20,BG505+,BG505+
        s1,99,80,W1,W2,D1,D2,Bcell,Tcell,5,BG505+,
        s2,99.5,70,W3,W4,D2,D2,Bcell,Bcell,3,,
        s2,80,70,W3,W5,D2,D3,Tcell,Bcell,3,,
        ,100,90,W6,W6,D4,D4,Bcell,Bcell,1,,
    "};

    fn column<'a>(table: &'a Table, name: &str) -> Vec<&'a str> {
        let col = table.column(name).unwrap();
        table.rows.iter().map(|r| r[col].as_str()).collect()
    }

    #[test]
    fn classifies_table() {
        let mut table = Table::from_reader(TABLE.as_bytes(), TableFormat::Csv).unwrap();
        let stats = classify_table(&mut table, &ClassifyOpts::default()).unwrap();

        assert_eq!(stats.rows_input, 6);
        assert_eq!(stats.rows_removed, 1);
        assert_eq!(stats.rows_remaining + stats.rows_removed, stats.rows_input);
        assert_eq!(stats.subset_rows, 5);
        assert_eq!(stats.groups, 2);
        assert_eq!(stats.ungrouped_rows, 1);
        assert_eq!(stats.empty_epitope_matches, 1);
        assert_eq!(stats.epitope_conflicts, 0);

        assert_eq!(
            column(&table, "unique_within_fna_Bcell"),
            vec!["", "no", "no", "yes", "", ""]
        );
        assert_eq!(
            column(&table, "cross_donor_fna_Bcell"),
            vec!["", "yes and no", "yes and no", "no", "", ""]
        );
        assert_eq!(
            column(&table, "cross_epitope_fna_Bcell"),
            vec!["", "yes and no", "yes and no", "no", "", ""]
        );

        for col in OPTIONAL_COLS {
            assert_eq!(column(&table, col), vec![""; 6]);
        }

        let donor = &stats.labels["cross_donor_fna_Bcell"];
        assert_eq!((donor.yes, donor.no, donor.yes_and_no), (0, 1, 1));
    }

    #[test]
    fn existing_label_columns_are_kept_for_other_rows() {
        let text = TABLE.replacen(
            "2nd_flowindex_epitope\n",
            "2nd_flowindex_epitope,cross_donor_fna_Bcell\n",
            1,
        );
        let text: String = text
            .lines()
            .enumerate()
            .map(|(i, line)| if i == 0 { format!("{line}\n") } else { format!("{line},old\n") })
            .collect();

        let mut table = Table::from_reader(text.as_bytes(), TableFormat::Csv).unwrap();
        classify_table(&mut table, &ClassifyOpts::default()).unwrap();

        assert_eq!(
            column(&table, "cross_donor_fna_Bcell"),
            vec!["", "yes and no", "yes and no", "no", "old", ""]
        );
    }

    #[test]
    fn dropped_duplicate_does_not_affect_labels() {
        let text = indoc! {"
            1st_sequence_id,identity,global,1st_sequence_or_well_id,2nd_sequence_or_well_id,1st_real_subjectid,2nd_real_subjectid,1st_cell_type,2nd_cell_type,1st_mixcr_read,1st_flowindex_epitope,2nd_flowindex_epitope
            s1,100,80,W1,W1,D1,D2,Bcell,Tcell,5,A,B
            s1,100,80,W1,W1,D1,D1,Bcell,Tcell,9,A,A
        "};

        let mut table = Table::from_reader(text.as_bytes(), TableFormat::Csv).unwrap();
        let stats = classify_table(&mut table, &ClassifyOpts::default()).unwrap();

        assert_eq!(stats.rows_removed, 1);
        // the lower-support row alone disagrees on donor and epitope
        assert_eq!(column(&table, "unique_within_fna_Bcell"), vec!["", "yes"]);
        assert_eq!(column(&table, "cross_donor_fna_Bcell"), vec!["", "no"]);
        assert_eq!(column(&table, "cross_epitope_fna_Bcell"), vec!["", "no"]);
    }

    #[test]
    fn missing_column_is_fatal() {
        let text = TABLE.replace("1st_mixcr_read", "reads");
        let mut table = Table::from_reader(text.as_bytes(), TableFormat::Csv).unwrap();

        let err = classify_table(&mut table, &ClassifyOpts::default()).unwrap_err();
        assert!(err.to_string().contains("`1st_mixcr_read`"));
        assert!(table.column("cross_donor_fna_Bcell").is_none());
    }
}
