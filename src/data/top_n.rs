use super::aggregate::{AggregationResult, GroupCount};

/// Label of the folded bucket when none is configured.
pub const OTHER_LABEL: &str = "Other";

/// Keep the `n` largest categories and fold the rest into one `other_label`
/// entry.
///
/// Inputs with at most `n` entries come back unchanged.  Otherwise entries
/// are ordered by count (stable, so equal counts keep their input order), the
/// first `n` are kept and the remainder is summed into a single trailing
/// entry.  With `n == 0` that entry holds everything.  The total is conserved.
pub fn top_n_with_others(result: AggregationResult, n: usize, other_label: &str) -> AggregationResult {
    if result.len() <= n {
        return result;
    }

    let AggregationResult { field, mut groups } = result;
    groups.sort_by(|a, b| b.count.cmp(&a.count));

    let rest: usize = groups.drain(n..).map(|g| g.count).sum();
    groups.push(GroupCount::new(other_label, rest));
    AggregationResult::new(field, groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descending(n: usize) -> AggregationResult {
        // counts n, n-1, ..., 1
        let groups = (0..n)
            .map(|i| GroupCount::new(format!("EPS {i}"), n - i))
            .collect();
        AggregationResult::new("EPS1", groups)
    }

    #[test]
    fn fifteen_categories_fold_into_eleven() {
        let input = descending(15);
        let smallest_five: usize = input.groups[10..].iter().map(|g| g.count).sum();

        let out = top_n_with_others(input.clone(), 10, OTHER_LABEL);
        assert_eq!(out.len(), 11);
        assert_eq!(&out.groups[..10], &input.groups[..10]);
        assert_eq!(out.groups[10], GroupCount::new("Other", smallest_five));
        assert_eq!(out.total(), input.total());
    }

    #[test]
    fn short_inputs_are_unchanged() {
        let input = descending(4);
        assert_eq!(top_n_with_others(input.clone(), 4, OTHER_LABEL), input);
        assert_eq!(top_n_with_others(input.clone(), 10, OTHER_LABEL), input);
    }

    #[test]
    fn zero_keeps_only_the_other_bucket() {
        let input = descending(3);
        let out = top_n_with_others(input, 0, "Otros");
        assert_eq!(out.groups, vec![GroupCount::new("Otros", 6)]);

        let empty = AggregationResult::new("EPS1", Vec::new());
        assert!(top_n_with_others(empty, 0, OTHER_LABEL).is_empty());
    }

    #[test]
    fn totals_are_conserved_for_every_cut() {
        let input = AggregationResult::new(
            "prescriptor",
            vec![
                GroupCount::new("a", 5),
                GroupCount::new("b", 5),
                GroupCount::new("c", 2),
                GroupCount::new("d", 9),
                GroupCount::new("e", 1),
            ],
        );
        for n in 0..=6 {
            let out = top_n_with_others(input.clone(), n, OTHER_LABEL);
            assert_eq!(out.total(), input.total(), "n = {n}");
            let expected_len = n.min(input.len()) + usize::from(n < input.len());
            assert_eq!(out.len(), expected_len, "n = {n}");
        }
    }

    #[test]
    fn ties_at_the_cut_keep_input_order() {
        let input = AggregationResult::new(
            "prescriptor",
            vec![
                GroupCount::new("first", 4),
                GroupCount::new("second", 4),
                GroupCount::new("third", 4),
            ],
        );
        let out = top_n_with_others(input, 2, OTHER_LABEL);
        let labels: Vec<_> = out.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["first", "second", "Other"]);
        assert_eq!(out.groups[2].count, 4);
    }
}
